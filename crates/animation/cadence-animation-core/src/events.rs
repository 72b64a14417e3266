//! Output contracts from a scene tick.
//!
//! Outputs carry every property write of the tick (after compositing) and the
//! semantic events raised while stepping. Events are also dispatched to
//! subscribers once the tick has finished.

use cadence_api_core::Value;
use serde::{Deserialize, Serialize};

use crate::binding::PropertySlot;
use crate::ids::{AnimatableId, GroupId, TargetId};

/// One property write applied to a target this tick.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Change {
    pub target: TargetId,
    pub slot: PropertySlot,
    pub value: Value,
}

/// Discrete semantic signals emitted by animatables and groups.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum AnimationEvent {
    /// A keyframe marker on a track was crossed.
    KeyframeReached {
        animatable: AnimatableId,
        target: TargetId,
        track: String,
        name: String,
        frame: f32,
    },
    AnimatableLooped {
        animatable: AnimatableId,
        target: TargetId,
    },
    AnimatableEnded {
        animatable: AnimatableId,
        target: TargetId,
    },
    /// One targeted animation of a group looped; `index` is its position in the group.
    TargetedAnimationLooped {
        group: GroupId,
        index: usize,
        target: TargetId,
    },
    TargetedAnimationEnded {
        group: GroupId,
        index: usize,
        target: TargetId,
    },
    /// Every animatable of the group has looped at least once since the last group loop.
    GroupLooped {
        group: GroupId,
    },
    GroupEnded {
        group: GroupId,
    },
    GroupPlayed {
        group: GroupId,
    },
    GroupPaused {
        group: GroupId,
    },
}

impl AnimationEvent {
    /// The group this event belongs to, if any.
    pub fn group(&self) -> Option<GroupId> {
        match self {
            AnimationEvent::TargetedAnimationLooped { group, .. }
            | AnimationEvent::TargetedAnimationEnded { group, .. }
            | AnimationEvent::GroupLooped { group }
            | AnimationEvent::GroupEnded { group }
            | AnimationEvent::GroupPlayed { group }
            | AnimationEvent::GroupPaused { group } => Some(*group),
            _ => None,
        }
    }
}

/// Outputs returned by `Scene::tick()`.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Outputs {
    #[serde(default)]
    pub changes: Vec<Change>,
    #[serde(default)]
    pub events: Vec<AnimationEvent>,
}

impl Outputs {
    #[inline]
    pub fn clear(&mut self) {
        self.changes.clear();
        self.events.clear();
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty() && self.events.is_empty()
    }

    /// Latest value written to `slot` on `target` this tick.
    pub fn last_change(&self, target: TargetId, slot: PropertySlot) -> Option<&Value> {
        self.changes
            .iter()
            .rev()
            .find(|c| c.target == target && c.slot == slot)
            .map(|c| &c.value)
    }
}
