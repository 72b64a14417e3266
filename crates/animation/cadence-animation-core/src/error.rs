use cadence_api_core::{DataType, ValueError};
use thiserror::Error;

use crate::ids::{AnimatableId, GroupId, TargetId};

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AnimationError {
    #[error("track '{track}' has no keys")]
    EmptyTrack { track: String },

    #[error("target '{target}' has no animatable property '{property}'")]
    UnboundProperty { target: String, property: String },

    #[error("unknown target {0:?}")]
    UnknownTarget(TargetId),

    #[error("unknown animatable {0:?}")]
    UnknownAnimatable(AnimatableId),

    #[error("unknown animation group {0:?}")]
    UnknownGroup(GroupId),

    #[error("key at frame {frame} of track '{track}' is {actual:?}, expected {expected:?}")]
    KeyKind {
        track: String,
        frame: f32,
        expected: DataType,
        actual: DataType,
    },

    #[error("invalid value: {0}")]
    Value(#[from] ValueError),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}
