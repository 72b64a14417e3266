//! Target binding: the seam between the runtime and whatever owns the animated properties.
//!
//! A target resolves a [`PropertyPath`] once into an opaque [`PropertySlot`];
//! every later read/write goes through the slot.

use cadence_api_core::{PropertyPath, Value};
use serde::{Deserialize, Serialize};

use crate::ids::TargetId;
use crate::track::{LoopMode, DEFAULT_BLENDING_SPEED};

/// Opaque handle to a bound property on a target.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct PropertySlot(pub u32);

/// A bound property: which target, which slot.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct BindingKey {
    pub target: TargetId,
    pub slot: PropertySlot,
}

/// Per-target overrides consulted when a runtime animation is created.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnimationPropertiesOverride {
    pub enable_blending: bool,
    pub blending_speed: f32,
    pub loop_mode: LoopMode,
}

impl Default for AnimationPropertiesOverride {
    fn default() -> Self {
        Self {
            enable_blending: false,
            blending_speed: DEFAULT_BLENDING_SPEED,
            loop_mode: LoopMode::Cycle,
        }
    }
}

/// An object whose properties can be animated.
pub trait AnimationTarget {
    fn name(&self) -> &str;

    /// Resolve `path` to a slot, or `None` when the property does not exist.
    fn bind_property(&self, path: &PropertyPath) -> Option<PropertySlot>;

    fn read(&self, slot: PropertySlot) -> Option<Value>;

    fn write(&mut self, slot: PropertySlot, value: Value);

    /// Called after a property was animated this tick.
    fn mark_dirty(&mut self, _property: &str) {}

    fn animation_properties_override(&self) -> Option<AnimationPropertiesOverride> {
        None
    }
}

/// Resolves serialized target ids during group parsing and back during serialization.
pub trait TargetResolver {
    fn resolve_node(&self, id: &str) -> Option<TargetId>;
    fn resolve_morph_target(&self, id: &str) -> Option<TargetId>;
    fn serialized_id(&self, target: TargetId) -> Option<&str>;
}
