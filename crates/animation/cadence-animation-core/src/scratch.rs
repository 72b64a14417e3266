//! Scratch buffers reused across ticks.

use cadence_api_core::Value;

use crate::binding::BindingKey;
use crate::config::Config;
use crate::ids::AnimatableId;
use crate::runtime::FiredEvent;

#[derive(Debug, Default)]
pub struct Scratch {
    /// Snapshot of the active list iterated by the tick.
    pub order: Vec<AnimatableId>,
    /// Resolved late-binding values awaiting write-back.
    pub resolved: Vec<(BindingKey, Value)>,
    /// Keyframe events fired by the animatable currently stepping.
    pub fired: Vec<FiredEvent>,
}

impl Scratch {
    pub fn new(cfg: &Config) -> Self {
        Self {
            order: Vec::with_capacity(cfg.scratch_animatables),
            resolved: Vec::with_capacity(cfg.scratch_bindings),
            fired: Vec::new(),
        }
    }

    #[inline]
    pub fn begin_frame(&mut self) {
        self.order.clear();
        self.resolved.clear();
        self.fired.clear();
    }
}
