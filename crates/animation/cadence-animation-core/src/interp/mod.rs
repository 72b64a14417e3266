//! Curve evaluation.
//!
//! `interpolate` samples a [`Track`](crate::track::Track) at a fractional frame,
//! walking a key cursor kept in [`EvaluationState`] so sequential playback is
//! amortized O(1) per sample.

mod curve;

pub use curve::interpolate;

use cadence_api_core::Value;

use crate::track::LoopMode;

/// Mutable evaluation context owned by one running animation.
#[derive(Clone, Debug, PartialEq)]
pub struct EvaluationState {
    /// Index of the key at or before the last sampled frame.
    pub key: usize,
    /// Completed loops; negative while playing backwards.
    pub repeat_count: i32,
    pub loop_mode: LoopMode,
    /// Per-loop delta added in relative mode.
    pub offset_value: Option<Value>,
    /// Value held by constant mode once `repeat_count > 0`.
    pub high_limit_value: Option<Value>,
}

impl EvaluationState {
    pub fn new(loop_mode: LoopMode) -> Self {
        Self {
            key: 0,
            repeat_count: 0,
            loop_mode,
            offset_value: None,
            high_limit_value: None,
        }
    }
}
