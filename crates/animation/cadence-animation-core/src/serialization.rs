//! JSON object graph for tracks and animation groups.
//!
//! Targets are never embedded: a serialized group stores each target's
//! serialized id and parsing re-resolves it through a [`TargetResolver`].
//! Entries animating `influence` are looked up as morph targets, everything
//! else as nodes. Unresolvable entries are skipped.

use std::sync::Arc;

use cadence_api_core::{DataType, Value, ValueError};
use log::warn;
use serde::{Deserialize, Serialize};

use crate::binding::TargetResolver;
use crate::error::AnimationError;
use crate::group::AnimationGroup;
use crate::ids::GroupId;
use crate::scene::Scene;
use crate::track::{AnimationRange, KeyInterpolation, Keyframe, KeyframeEvent, LoopMode, Track};

/// Property name routed through morph-target lookup.
pub const MORPH_INFLUENCE_PROPERTY: &str = "influence";

/// A key value as stored in JSON: a bare number for floats, a component array otherwise.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawValue {
    Scalar(f32),
    Components(Vec<f32>),
}

impl RawValue {
    fn to_value(&self, data_type: DataType) -> Result<Value, ValueError> {
        match self {
            RawValue::Scalar(x) => Value::from_components(data_type, std::slice::from_ref(x)),
            RawValue::Components(c) => Value::from_components(data_type, c),
        }
    }
}

impl From<&Value> for RawValue {
    fn from(value: &Value) -> Self {
        match value {
            Value::Float(x) => RawValue::Scalar(*x),
            other => RawValue::Components(other.components().to_vec()),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SerializedKey {
    pub frame: f32,
    pub value: RawValue,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub in_tangent: Option<RawValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub out_tangent: Option<RawValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interpolation: Option<KeyInterpolation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locked_tangent: Option<bool>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SerializedTrack {
    pub name: String,
    pub property: String,
    pub data_type: DataType,
    #[serde(default)]
    pub loop_mode: LoopMode,
    pub frame_per_second: f32,
    pub keys: Vec<SerializedKey>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enable_blending: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blending_speed: Option<f32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub events: Vec<KeyframeEvent>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ranges: Vec<AnimationRange>,
}

impl From<&Track> for SerializedTrack {
    fn from(track: &Track) -> Self {
        let keys = track
            .keys()
            .iter()
            .map(|k| SerializedKey {
                frame: k.frame,
                value: RawValue::from(&k.value),
                in_tangent: k.in_tangent.as_ref().map(RawValue::from),
                out_tangent: k.out_tangent.as_ref().map(RawValue::from),
                interpolation: (k.interpolation != KeyInterpolation::None).then_some(k.interpolation),
                locked_tangent: k.locked_tangent.then_some(true),
            })
            .collect();
        Self {
            name: track.name.clone(),
            property: track.target_property().to_string(),
            data_type: track.data_type(),
            loop_mode: track.loop_mode,
            frame_per_second: track.frames_per_second,
            keys,
            enable_blending: track.enable_blending.then_some(true),
            blending_speed: Some(track.blending_speed),
            events: track.events().to_vec(),
            ranges: track.ranges().to_vec(),
        }
    }
}

impl TryFrom<&SerializedTrack> for Track {
    type Error = AnimationError;

    fn try_from(s: &SerializedTrack) -> Result<Self, Self::Error> {
        let dt = s.data_type;
        let mut track = Track::new(s.name.clone(), &s.property, s.frame_per_second, dt, s.loop_mode)?;
        let keys = s
            .keys
            .iter()
            .map(|k| {
                Ok(Keyframe {
                    frame: k.frame,
                    value: k.value.to_value(dt)?,
                    in_tangent: k.in_tangent.as_ref().map(|t| t.to_value(dt)).transpose()?,
                    out_tangent: k.out_tangent.as_ref().map(|t| t.to_value(dt)).transpose()?,
                    interpolation: k.interpolation.unwrap_or_default(),
                    locked_tangent: k.locked_tangent.unwrap_or(false),
                })
            })
            .collect::<Result<Vec<_>, ValueError>>()?;
        track.set_keys(keys)?;
        if let Some(enable) = s.enable_blending {
            track.enable_blending = enable;
        }
        if let Some(speed) = s.blending_speed {
            track.blending_speed = speed;
        }
        for event in &s.events {
            track.add_event(event.clone());
        }
        for range in &s.ranges {
            track.create_range(range.name.clone(), range.from, range.to);
        }
        Ok(track)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SerializedTargetedAnimation {
    pub animation: SerializedTrack,
    pub target_id: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SerializedAnimationGroup {
    pub name: String,
    pub from: f32,
    pub to: f32,
    pub targeted_animations: Vec<SerializedTargetedAnimation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed_ratio: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loop_animation: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_additive: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub play_order: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enable_blending: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blending_speed: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

/// Serialize `group`; entries whose target has no serialized id are left out.
pub fn serialize_group(group: &AnimationGroup, resolver: &dyn TargetResolver) -> SerializedAnimationGroup {
    let targeted_animations = group
        .targeted_animations()
        .iter()
        .filter_map(|ta| {
            let Some(id) = resolver.serialized_id(ta.target) else {
                warn!(
                    "group '{}': target {:?} has no serialized id, entry not serialized",
                    group.name, ta.target
                );
                return None;
            };
            Some(SerializedTargetedAnimation {
                animation: SerializedTrack::from(ta.animation.as_ref()),
                target_id: id.to_string(),
            })
        })
        .collect();

    SerializedAnimationGroup {
        name: group.name.clone(),
        from: group.from(),
        to: group.to(),
        targeted_animations,
        speed_ratio: Some(group.speed_ratio()),
        loop_animation: Some(group.loop_animation()),
        is_additive: Some(group.is_additive()),
        weight: Some(group.weight()),
        play_order: Some(group.play_order()),
        enable_blending: group.enable_blending(),
        blending_speed: group.blending_speed(),
        metadata: group.metadata.clone(),
        tags: group.tags.clone(),
    }
}

/// Rebuild a group, re-resolving targets by serialized id, then normalize it to `[from, to]`.
pub fn parse_group(
    serialized: &SerializedAnimationGroup,
    resolver: &dyn TargetResolver,
) -> Result<AnimationGroup, AnimationError> {
    let mut group = AnimationGroup::new(serialized.name.clone());
    if let Some(enable) = serialized.enable_blending {
        group.set_enable_blending(enable);
    }
    if let Some(speed) = serialized.blending_speed {
        group.set_blending_speed(speed);
    }

    for ta in &serialized.targeted_animations {
        let track = Track::try_from(&ta.animation)?;
        let target = if ta.animation.property == MORPH_INFLUENCE_PROPERTY {
            resolver.resolve_morph_target(&ta.target_id)
        } else {
            resolver.resolve_node(&ta.target_id)
        };
        match target {
            Some(target) => {
                group.add_targeted_animation(Arc::new(track), target);
            }
            None => warn!(
                "group '{}': target '{}' not found, skipping track '{}'",
                serialized.name, ta.target_id, track.name
            ),
        }
    }

    group.normalize(Some(serialized.from), Some(serialized.to));
    if let Some(speed) = serialized.speed_ratio {
        group.set_speed_ratio(speed);
    }
    if let Some(looping) = serialized.loop_animation {
        group.set_loop_animation(looping);
    }
    if let Some(additive) = serialized.is_additive {
        group.set_is_additive(additive);
    }
    if let Some(weight) = serialized.weight {
        group.set_weight(weight);
    }
    if let Some(order) = serialized.play_order {
        group.set_play_order(order);
    }
    group.metadata = serialized.metadata.clone();
    group.tags = serialized.tags.clone();
    Ok(group)
}

pub fn track_to_json(track: &Track) -> Result<String, AnimationError> {
    Ok(serde_json::to_string(&SerializedTrack::from(track))?)
}

pub fn parse_track_json(json: &str) -> Result<Track, AnimationError> {
    let serialized: SerializedTrack = serde_json::from_str(json)?;
    Track::try_from(&serialized)
}

pub fn group_to_json(group: &AnimationGroup, resolver: &dyn TargetResolver) -> Result<String, AnimationError> {
    Ok(serde_json::to_string(&serialize_group(group, resolver))?)
}

pub fn parse_group_json(json: &str, resolver: &dyn TargetResolver) -> Result<AnimationGroup, AnimationError> {
    let serialized: SerializedAnimationGroup = serde_json::from_str(json)?;
    parse_group(&serialized, resolver)
}

impl Scene {
    /// Parse a serialized group against this scene's targets and register it.
    pub fn load_group_json(&mut self, json: &str) -> Result<GroupId, AnimationError> {
        let group = parse_group_json(json, &*self)?;
        Ok(self.add_animation_group(group))
    }

    /// Serialize a registered group.
    pub fn group_to_json(&self, id: GroupId) -> Result<String, AnimationError> {
        let group = self.group(id).ok_or(AnimationError::UnknownGroup(id))?;
        group_to_json(group, self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::TargetId;

    struct Names;

    impl TargetResolver for Names {
        fn resolve_node(&self, id: &str) -> Option<TargetId> {
            (id == "cube").then_some(TargetId(1))
        }
        fn resolve_morph_target(&self, id: &str) -> Option<TargetId> {
            (id == "smile").then_some(TargetId(2))
        }
        fn serialized_id(&self, target: TargetId) -> Option<&str> {
            match target.0 {
                1 => Some("cube"),
                2 => Some("smile"),
                _ => None,
            }
        }
    }

    #[test]
    fn raw_values_follow_the_track_kind() {
        let json = r#"{"name":"p","property":"position","dataType":"vector3","framePerSecond":30,
            "keys":[{"frame":0,"value":[0,1,2]},{"frame":10,"value":[3,4,5],"interpolation":"step"}]}"#;
        let track = parse_track_json(json).unwrap();
        assert_eq!(track.keys()[1].value, Value::Vector3([3.0, 4.0, 5.0]));
        assert_eq!(track.keys()[1].interpolation, KeyInterpolation::Step);
        assert_eq!(track.loop_mode, LoopMode::Cycle);

        let bad = r#"{"name":"p","property":"position","dataType":"vector3","framePerSecond":30,
            "keys":[{"frame":0,"value":1}]}"#;
        assert!(matches!(parse_track_json(bad), Err(AnimationError::Value(_))));
        assert!(matches!(parse_track_json("{"), Err(AnimationError::Json(_))));
    }

    #[test]
    fn influence_uses_morph_lookup_and_missing_targets_are_skipped() {
        let json = r#"{"name":"g","from":0,"to":20,"targetedAnimations":[
            {"targetId":"smile","animation":{"name":"m","property":"influence","dataType":"float",
                "framePerSecond":30,"keys":[{"frame":0,"value":0},{"frame":10,"value":1}]}},
            {"targetId":"cube","animation":{"name":"i","property":"influence","dataType":"float",
                "framePerSecond":30,"keys":[{"frame":0,"value":0}]}},
            {"targetId":"ghost","animation":{"name":"x","property":"x","dataType":"float",
                "framePerSecond":30,"keys":[{"frame":0,"value":0}]}}]}"#;
        let group = parse_group_json(json, &Names).unwrap();
        assert_eq!(group.targeted_animations().len(), 1);
        assert_eq!(group.targeted_animations()[0].target, TargetId(2));
        // normalized to the serialized range
        assert_eq!((group.from(), group.to()), (0.0, 20.0));
        assert_eq!(group.targeted_animations()[0].animation.last_frame(), Some(20.0));
    }
}
