//! Cadence Animation Core
//!
//! Keyframe animation runtime: typed keyframe tracks, a curve evaluator with
//! hermite / linear / spherical interpolation and four loop modes, per-target
//! runtime playback, animatables sharing one clock, animation groups with
//! masking / merging / clipping / additive conversion, and a late-binding
//! compositor that blends every weighted write to a property once per tick.
//!
//! A host owns a [`Scene`], registers its animatable objects through the
//! [`AnimationTarget`] trait and calls [`Scene::tick`] once per frame.

mod additive;
pub mod animatable;
pub mod binding;
pub mod compositor;
pub mod config;
pub mod error;
pub mod events;
pub mod group;
pub mod ids;
pub mod interp;
pub mod mask;
pub mod playback;
pub mod runtime;
pub mod scene;
pub mod scratch;
pub mod serialization;
pub mod target;
pub mod track;

// Re-exports for hosts
pub use animatable::{Animatable, AnimatableStep, GroupLink};
pub use binding::{
    AnimationPropertiesOverride, AnimationTarget, BindingKey, PropertySlot, TargetResolver,
};
pub use compositor::Compositor;
pub use config::{Config, InterpSettings};
pub use error::AnimationError;
pub use events::{AnimationEvent, Change, Outputs};
pub use group::{AdditiveOptions, AnimationGroup, TargetedAnimation};
pub use ids::{AnimatableId, GroupId, SubscriptionId, TargetId};
pub use interp::{interpolate, EvaluationState};
pub use mask::{AnimationGroupMask, MaskMode};
pub use playback::GroupStart;
pub use runtime::{yoyo_map, RuntimeAnimation, NO_WEIGHT};
pub use scene::{EventHandler, Scene};
pub use serialization::{
    group_to_json, parse_group, parse_group_json, parse_track_json, serialize_group,
    track_to_json, SerializedAnimationGroup, SerializedTrack,
};
pub use target::{PropertyTarget, TargetKind};
pub use track::{
    AnimationRange, KeyInterpolation, Keyframe, KeyframeEvent, LoopMode, Track,
    DEFAULT_BLENDING_SPEED,
};
pub use cadence_api_core::{DataType, PropertyPath, Value};
