//! Map-backed [`AnimationTarget`] used for plain property bags, tests and tools.

use cadence_api_core::{PropertyPath, Value};
use hashbrown::HashSet;

use crate::binding::{AnimationPropertiesOverride, AnimationTarget, PropertySlot};

/// How a scene resolves a target by serialized id.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum TargetKind {
    #[default]
    Node,
    Bone,
    /// Looked up through the morph-target registry (`influence` tracks).
    MorphTarget,
    Other,
}

/// A named bag of properties addressed by their full dotted path.
#[derive(Clone, Debug, Default)]
pub struct PropertyTarget {
    name: String,
    properties: Vec<(PropertyPath, Value)>,
    dirty: HashSet<String>,
    overrides: Option<AnimationPropertiesOverride>,
}

impl PropertyTarget {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Builder form of [`set_property`](Self::set_property); invalid paths are ignored.
    pub fn with_property(mut self, path: &str, value: impl Into<Value>) -> Self {
        if let Ok(path) = PropertyPath::parse(path) {
            self.set_property(path, value.into());
        }
        self
    }

    pub fn with_override(mut self, overrides: AnimationPropertiesOverride) -> Self {
        self.overrides = Some(overrides);
        self
    }

    pub fn set_property(&mut self, path: PropertyPath, value: Value) {
        match self.properties.iter_mut().find(|(p, _)| *p == path) {
            Some((_, v)) => *v = value,
            None => self.properties.push((path, value)),
        }
    }

    pub fn property(&self, path: &str) -> Option<Value> {
        self.properties
            .iter()
            .find(|(p, _)| p.to_string() == path)
            .map(|(_, v)| *v)
    }

    pub fn set_animation_properties_override(
        &mut self,
        overrides: Option<AnimationPropertiesOverride>,
    ) {
        self.overrides = overrides;
    }

    pub fn is_dirty(&self, property: &str) -> bool {
        self.dirty.contains(property)
    }

    /// Drain the set of properties animated since the last call.
    pub fn take_dirty(&mut self) -> Vec<String> {
        self.dirty.drain().collect()
    }
}

impl AnimationTarget for PropertyTarget {
    fn name(&self) -> &str {
        &self.name
    }

    fn bind_property(&self, path: &PropertyPath) -> Option<PropertySlot> {
        self.properties
            .iter()
            .position(|(p, _)| p == path)
            .map(|i| PropertySlot(i as u32))
    }

    fn read(&self, slot: PropertySlot) -> Option<Value> {
        self.properties.get(slot.0 as usize).map(|(_, v)| *v)
    }

    fn write(&mut self, slot: PropertySlot, value: Value) {
        if let Some((_, v)) = self.properties.get_mut(slot.0 as usize) {
            *v = value;
        }
    }

    fn mark_dirty(&mut self, property: &str) {
        if !self.dirty.contains(property) {
            self.dirty.insert(property.to_string());
        }
    }

    fn animation_properties_override(&self) -> Option<AnimationPropertiesOverride> {
        self.overrides
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slots_are_stable_per_property() {
        let mut t = PropertyTarget::new("box")
            .with_property("position", Value::Vector3([0.0; 3]))
            .with_property("visibility", 1.0);
        let path = PropertyPath::parse("visibility").unwrap();
        let slot = t.bind_property(&path).unwrap();
        t.write(slot, Value::Float(0.25));
        assert_eq!(t.read(slot), Some(Value::Float(0.25)));
        assert_eq!(t.property("visibility"), Some(Value::Float(0.25)));
        assert!(t
            .bind_property(&PropertyPath::parse("rotation").unwrap())
            .is_none());
    }

    #[test]
    fn dirty_set_drains() {
        let mut t = PropertyTarget::new("box").with_property("visibility", 1.0);
        t.mark_dirty("visibility");
        t.mark_dirty("visibility");
        assert!(t.is_dirty("visibility"));
        assert_eq!(t.take_dirty(), vec!["visibility".to_string()]);
        assert!(!t.is_dirty("visibility"));
    }
}
