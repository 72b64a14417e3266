//! Scene configuration.

use cadence_api_core::MatrixBlend;
use serde::{Deserialize, Serialize};

/// Configuration for scene sizing and evaluation flags.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// When false, matrix tracks hold the value of the previous key.
    pub allow_matrices_interpolation: bool,
    /// Interpolate matrices by decomposing them instead of element-wise.
    pub matrix_decompose_interpolation: bool,

    /// Multiplier applied to every tick delta.
    pub animation_time_scale: f64,
    /// Ignore the tick delta and advance by `constant_delta_ms` instead.
    pub use_constant_delta_time: bool,
    pub constant_delta_ms: f64,

    /// Upper bound on events dispatched per flush.
    pub max_events_per_tick: usize,

    /// Initial capacity hints for scratch buffers.
    pub scratch_animatables: usize,
    pub scratch_bindings: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            allow_matrices_interpolation: true,
            matrix_decompose_interpolation: false,
            animation_time_scale: 1.0,
            use_constant_delta_time: false,
            constant_delta_ms: 1000.0 / 60.0,
            max_events_per_tick: 1024,
            scratch_animatables: 64,
            scratch_bindings: 256,
        }
    }
}

impl Config {
    pub fn interp_settings(&self) -> InterpSettings {
        InterpSettings {
            allow_matrices_interpolation: self.allow_matrices_interpolation,
            matrix_blend: if self.matrix_decompose_interpolation {
                MatrixBlend::DecomposeLerp
            } else {
                MatrixBlend::Lerp
            },
        }
    }
}

/// The subset of [`Config`] the curve evaluator and blending need.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct InterpSettings {
    pub allow_matrices_interpolation: bool,
    pub matrix_blend: MatrixBlend,
}

impl Default for InterpSettings {
    fn default() -> Self {
        Config::default().interp_settings()
    }
}
