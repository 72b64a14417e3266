//! Animatable value kinds.
//!
//! Every keyframe value, tangent, offset and blended result is a [`Value`]. The
//! variant always matches the owning track's [`DataType`]; components are stored
//! as fixed-size `f32` arrays so values stay `Copy`.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The kind of value a track animates.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DataType {
    Float,
    Vector2,
    Vector3,
    Quaternion,
    Matrix,
    Color3,
    Color4,
    Size,
}

impl DataType {
    /// Number of `f32` components a value of this kind carries.
    pub fn component_count(self) -> usize {
        match self {
            DataType::Float => 1,
            DataType::Vector2 | DataType::Size => 2,
            DataType::Vector3 | DataType::Color3 => 3,
            DataType::Quaternion | DataType::Color4 => 4,
            DataType::Matrix => 16,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValueError {
    #[error("{data_type:?} expects {expected} components, got {actual}")]
    ComponentCount {
        data_type: DataType,
        expected: usize,
        actual: usize,
    },
    #[error("expected a {expected:?} value, got {actual:?}")]
    KindMismatch { expected: DataType, actual: DataType },
    #[error("invalid property path '{0}'")]
    InvalidPath(String),
}

/// A sampled or keyed value.
///
/// Quaternions are stored `(x, y, z, w)`. Matrices are 4x4 column-major with the
/// translation in elements 12..15.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "camelCase")]
pub enum Value {
    Float(f32),
    Vector2([f32; 2]),
    Vector3([f32; 3]),
    Quaternion([f32; 4]),
    Matrix([f32; 16]),
    Color3([f32; 3]),
    Color4([f32; 4]),
    /// Width, height.
    Size([f32; 2]),
}

pub const IDENTITY_QUAT: [f32; 4] = [0.0, 0.0, 0.0, 1.0];

pub const IDENTITY_MATRIX: [f32; 16] = [
    1.0, 0.0, 0.0, 0.0, //
    0.0, 1.0, 0.0, 0.0, //
    0.0, 0.0, 1.0, 0.0, //
    0.0, 0.0, 0.0, 1.0,
];

impl Value {
    pub fn kind(&self) -> DataType {
        match self {
            Value::Float(_) => DataType::Float,
            Value::Vector2(_) => DataType::Vector2,
            Value::Vector3(_) => DataType::Vector3,
            Value::Quaternion(_) => DataType::Quaternion,
            Value::Matrix(_) => DataType::Matrix,
            Value::Color3(_) => DataType::Color3,
            Value::Color4(_) => DataType::Color4,
            Value::Size(_) => DataType::Size,
        }
    }

    /// All components zero. Used as the starting point of offsets and sums.
    pub fn zero(data_type: DataType) -> Value {
        match data_type {
            DataType::Float => Value::Float(0.0),
            DataType::Vector2 => Value::Vector2([0.0; 2]),
            DataType::Vector3 => Value::Vector3([0.0; 3]),
            DataType::Quaternion => Value::Quaternion([0.0; 4]),
            DataType::Matrix => Value::Matrix([0.0; 16]),
            DataType::Color3 => Value::Color3([0.0; 3]),
            DataType::Color4 => Value::Color4([0.0; 4]),
            DataType::Size => Value::Size([0.0; 2]),
        }
    }

    /// The neutral pose: identity rotation / matrix, zero for everything else.
    pub fn identity(data_type: DataType) -> Value {
        match data_type {
            DataType::Quaternion => Value::Quaternion(IDENTITY_QUAT),
            DataType::Matrix => Value::Matrix(IDENTITY_MATRIX),
            other => Value::zero(other),
        }
    }

    pub fn components(&self) -> &[f32] {
        match self {
            Value::Float(f) => std::slice::from_ref(f),
            Value::Vector2(a) | Value::Size(a) => a,
            Value::Vector3(a) | Value::Color3(a) => a,
            Value::Quaternion(a) | Value::Color4(a) => a,
            Value::Matrix(a) => a,
        }
    }

    pub fn components_mut(&mut self) -> &mut [f32] {
        match self {
            Value::Float(f) => std::slice::from_mut(f),
            Value::Vector2(a) | Value::Size(a) => a,
            Value::Vector3(a) | Value::Color3(a) => a,
            Value::Quaternion(a) | Value::Color4(a) => a,
            Value::Matrix(a) => a,
        }
    }

    /// Build a value of `data_type` from a flat component list.
    pub fn from_components(data_type: DataType, components: &[f32]) -> Result<Value, ValueError> {
        let expected = data_type.component_count();
        if components.len() != expected {
            return Err(ValueError::ComponentCount {
                data_type,
                expected,
                actual: components.len(),
            });
        }
        let mut value = Value::zero(data_type);
        value.components_mut().copy_from_slice(components);
        Ok(value)
    }

    pub fn as_float(&self) -> Option<f32> {
        match self {
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_quaternion(&self) -> Option<[f32; 4]> {
        match self {
            Value::Quaternion(q) => Some(*q),
            _ => None,
        }
    }

    pub fn as_matrix(&self) -> Option<&[f32; 16]> {
        match self {
            Value::Matrix(m) => Some(m),
            _ => None,
        }
    }

    /// Ok when this value is of `expected` kind.
    pub fn expect_kind(&self, expected: DataType) -> Result<(), ValueError> {
        let actual = self.kind();
        if actual == expected {
            Ok(())
        } else {
            Err(ValueError::KindMismatch { expected, actual })
        }
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(v)
    }
}
