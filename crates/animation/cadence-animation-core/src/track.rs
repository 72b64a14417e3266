//! Track data model: keyframes, loop modes, named ranges and keyframe events.

use cadence_api_core::{DataType, PropertyPath, Value};
use serde::{Deserialize, Serialize};

use crate::config::InterpSettings;
use crate::error::AnimationError;
use crate::interp::{interpolate, EvaluationState};

/// Default rate at which a blending track converges on its animated value.
pub const DEFAULT_BLENDING_SPEED: f32 = 0.01;

/// Per-key interpolation override.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum KeyInterpolation {
    /// Use the curve's interpolation (lerp / slerp / hermite).
    #[default]
    None,
    /// Hold this key's value until the next key.
    Step,
}

/// What happens once the playhead runs past the end of a loop.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LoopMode {
    /// Each repetition is offset by (end value - start value).
    Relative,
    #[default]
    Cycle,
    /// After the first pass, hold the end value.
    Constant,
    /// Ping-pong along a sine-eased path.
    Yoyo,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Keyframe {
    pub frame: f32,
    pub value: Value,
    pub in_tangent: Option<Value>,
    pub out_tangent: Option<Value>,
    pub interpolation: KeyInterpolation,
    pub locked_tangent: bool,
}

impl Keyframe {
    pub fn new(frame: f32, value: impl Into<Value>) -> Self {
        Self {
            frame,
            value: value.into(),
            in_tangent: None,
            out_tangent: None,
            interpolation: KeyInterpolation::None,
            locked_tangent: false,
        }
    }

    pub fn with_tangents(mut self, in_tangent: Value, out_tangent: Value) -> Self {
        self.in_tangent = Some(in_tangent);
        self.out_tangent = Some(out_tangent);
        self
    }

    pub fn with_interpolation(mut self, interpolation: KeyInterpolation) -> Self {
        self.interpolation = interpolation;
        self
    }

    /// Same key data placed at another frame.
    pub fn at_frame(&self, frame: f32) -> Self {
        Self {
            frame,
            ..self.clone()
        }
    }
}

/// A named `[from, to]` frame span on a track.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnimationRange {
    pub name: String,
    pub from: f32,
    pub to: f32,
}

/// A named marker raised when the playhead crosses `frame`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyframeEvent {
    pub frame: f32,
    pub name: String,
    #[serde(default)]
    pub only_once: bool,
}

impl KeyframeEvent {
    pub fn new(frame: f32, name: impl Into<String>, only_once: bool) -> Self {
        Self {
            frame,
            name: name.into(),
            only_once,
        }
    }
}

/// A keyframe curve for one property.
///
/// Keys are kept sorted by frame and every key value (and tangent) has the
/// track's [`DataType`].
#[derive(Clone, Debug, PartialEq)]
pub struct Track {
    pub name: String,
    target_property: PropertyPath,
    data_type: DataType,
    pub loop_mode: LoopMode,
    pub frames_per_second: f32,
    keys: Vec<Keyframe>,
    pub enable_blending: bool,
    pub blending_speed: f32,
    events: Vec<KeyframeEvent>,
    ranges: Vec<AnimationRange>,
}

impl Track {
    pub fn new(
        name: impl Into<String>,
        target_property: &str,
        frames_per_second: f32,
        data_type: DataType,
        loop_mode: LoopMode,
    ) -> Result<Self, AnimationError> {
        Ok(Self {
            name: name.into(),
            target_property: PropertyPath::parse(target_property)?,
            data_type,
            loop_mode,
            frames_per_second,
            keys: Vec::new(),
            enable_blending: false,
            blending_speed: DEFAULT_BLENDING_SPEED,
            events: Vec::new(),
            ranges: Vec::new(),
        })
    }

    pub fn target_property(&self) -> &PropertyPath {
        &self.target_property
    }

    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    pub fn keys(&self) -> &[Keyframe] {
        &self.keys
    }

    /// Replace all keys. Keys are sorted by frame (stable); every value and tangent must match the track kind.
    pub fn set_keys(&mut self, mut keys: Vec<Keyframe>) -> Result<(), AnimationError> {
        for key in &keys {
            let values = std::iter::once(&key.value)
                .chain(key.in_tangent.iter())
                .chain(key.out_tangent.iter());
            for value in values {
                if value.kind() != self.data_type {
                    return Err(AnimationError::KeyKind {
                        track: self.name.clone(),
                        frame: key.frame,
                        expected: self.data_type,
                        actual: value.kind(),
                    });
                }
            }
        }
        keys.sort_by(|a, b| a.frame.total_cmp(&b.frame));
        self.keys = keys;
        Ok(())
    }

    pub(crate) fn keys_mut(&mut self) -> &mut Vec<Keyframe> {
        &mut self.keys
    }

    pub fn first_frame(&self) -> Option<f32> {
        self.keys.first().map(|k| k.frame)
    }

    pub fn last_frame(&self) -> Option<f32> {
        self.keys.last().map(|k| k.frame)
    }

    /// Last key frame, or 0 for an empty track.
    pub fn highest_frame(&self) -> f32 {
        self.last_frame().unwrap_or(0.0)
    }

    pub fn events(&self) -> &[KeyframeEvent] {
        &self.events
    }

    pub fn add_event(&mut self, event: KeyframeEvent) {
        self.events.push(event);
        self.events.sort_by(|a, b| a.frame.total_cmp(&b.frame));
    }

    /// Remove every event placed at `frame`.
    pub fn remove_events(&mut self, frame: f32) {
        self.events.retain(|e| e.frame != frame);
    }

    pub fn ranges(&self) -> &[AnimationRange] {
        &self.ranges
    }

    /// Register a named range; an existing range with the same name is kept.
    /// A reversed pair is stored in ascending order.
    pub fn create_range(&mut self, name: impl Into<String>, from: f32, to: f32) {
        let name = name.into();
        if self.range(&name).is_none() {
            let (from, to) = (from.min(to), from.max(to));
            self.ranges.push(AnimationRange { name, from, to });
        }
    }

    /// Drop a named range, optionally deleting the keys inside it.
    pub fn delete_range(&mut self, name: &str, delete_frames: bool) {
        let Some(pos) = self.ranges.iter().position(|r| r.name == name) else {
            return;
        };
        let range = self.ranges.remove(pos);
        if delete_frames {
            self.keys
                .retain(|k| k.frame < range.from || k.frame > range.to);
        }
    }

    pub fn range(&self, name: &str) -> Option<&AnimationRange> {
        self.ranges.iter().find(|r| r.name == name)
    }

    /// Stateless sample at `frame` (cycle mode, default settings).
    pub fn evaluate(&self, frame: f32) -> Value {
        let mut state = EvaluationState::new(LoopMode::Cycle);
        interpolate(self, frame, &mut state, &InterpSettings::default())
    }

    /// Index of the key at `frame`, inserting an interpolated key when none exists.
    ///
    /// Frames outside the key range are not inserted; the nearest end index is returned.
    pub fn create_key_for_frame(&mut self, frame: f32) -> usize {
        let (Some(first), Some(last)) = (self.first_frame(), self.last_frame()) else {
            return 0;
        };
        if let Some(index) = self.keys.iter().position(|k| k.frame == frame) {
            return index;
        }
        if frame < first {
            return 0;
        }
        if frame > last {
            return self.keys.len() - 1;
        }

        let value = self.evaluate(frame);
        let index = self.keys.partition_point(|k| k.frame < frame);
        let interpolation = self.keys[index - 1].interpolation;
        self.keys
            .insert(index, Keyframe::new(frame, value).with_interpolation(interpolation));
        index
    }

    /// Rewrite the keys as deltas against the pose at `reference_frame`.
    ///
    /// With `range`, only the keys inside that named range are converted.
    pub fn make_additive(&mut self, reference_frame: f32, range: Option<&str>) {
        crate::additive::make_track_additive(self, reference_frame, range);
    }
}
