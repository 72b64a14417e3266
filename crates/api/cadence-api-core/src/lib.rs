//! cadence-api-core: shared value types and math for the Cadence animation runtime.
//!
//! Exposes:
//! - `Value` / `DataType`: the animatable value kinds (floats, vectors, quaternions, matrices, colors, sizes)
//! - `blend`: lerp / hermite / slerp and value arithmetic used by the curve evaluator and compositor
//! - `matrix`: column-major 4x4 decompose / compose helpers
//! - `PropertyPath`: dotted property addresses ("position.x")

pub mod blend;
pub mod matrix;
pub mod property_path;
pub mod value;

pub use blend::{
    add_values, hermite_values, lerp_values, scale_value, subtract_values, values_close,
};
pub use matrix::MatrixBlend;
pub use property_path::PropertyPath;
pub use value::{DataType, Value, ValueError, IDENTITY_MATRIX, IDENTITY_QUAT};
