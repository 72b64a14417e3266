//! Per-(track, target) playback state.
//!
//! A [`RuntimeAnimation`] maps elapsed time to a frame (honoring range, speed,
//! looping, yoyo and sync roots), samples its track, blends the sample into the
//! target (directly or through the [`Compositor`]) and raises keyframe events.

use std::f32::consts::PI;
use std::sync::Arc;

use cadence_api_core::blend::{lerp_values, subtract_values};
use cadence_api_core::Value;

use crate::binding::{AnimationTarget, BindingKey, PropertySlot};
use crate::compositor::Compositor;
use crate::config::InterpSettings;
use crate::error::AnimationError;
use crate::events::Change;
use crate::ids::TargetId;
use crate::interp::{interpolate, EvaluationState};
use crate::track::{Keyframe, LoopMode, Track};

/// Weight sentinel meaning "write directly, bypass the compositor".
pub const NO_WEIGHT: f32 = -1.0;

/// A keyframe event crossed during `animate`.
#[derive(Clone, Debug, PartialEq)]
pub struct FiredEvent {
    pub track: String,
    pub name: String,
    pub frame: f32,
}

#[derive(Clone, Debug)]
struct RuntimeEvent {
    frame: f32,
    name: String,
    only_once: bool,
    is_done: bool,
}

/// Playhead of the animatable another one is synchronized with.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct SyncRoot {
    pub master_frame: f32,
    pub from: f32,
    pub to: f32,
}

/// Playback parameters shared by every runtime of one animatable for one tick.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Playback {
    pub from: f32,
    pub to: f32,
    pub looping: bool,
    pub speed_ratio: f32,
    pub weight: f32,
    pub sync: Option<SyncRoot>,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct AnimateOutcome {
    pub running: bool,
    pub looped: bool,
}

/// Where `set_value` sends its result.
pub struct WriteContext<'a> {
    pub target: &'a mut dyn AnimationTarget,
    pub compositor: &'a mut Compositor,
    pub changes: &'a mut Vec<Change>,
    pub settings: InterpSettings,
    pub is_additive: bool,
}

/// Track values at the loop boundaries of one `(from, to)` pair.
#[derive(Copy, Clone, Debug)]
struct LoopLimits {
    offset: Value,
    low: Value,
    high: Value,
}

#[derive(Clone, Debug)]
pub struct RuntimeAnimation {
    /// The track as supplied by the caller; identity for lookups.
    source: Arc<Track>,
    /// The track actually sampled (a leading frame-0 key is added when the first key is later).
    track: Arc<Track>,
    binding: BindingKey,
    property: String,
    state: EvaluationState,
    current_frame: f32,
    primed: bool,
    min_frame: f32,
    max_frame: f32,
    original_value: Option<Value>,
    original_blend_value: Option<Value>,
    current_value: Option<Value>,
    blending_factor: f32,
    pub enable_blending: bool,
    pub blending_speed: f32,
    weight: f32,
    frame_offset: f32,
    previous_elapsed_ms: f64,
    previous_absolute_frame: f32,
    yoyo_direction: i8,
    loop_cache: Option<((u32, u32), LoopLimits)>,
    events: Vec<RuntimeEvent>,
}

impl RuntimeAnimation {
    /// Bind `track` to `target`. Fails on an empty track or a property the target does not expose.
    pub fn new(
        track: Arc<Track>,
        target_id: TargetId,
        target: &dyn AnimationTarget,
    ) -> Result<Self, AnimationError> {
        let (Some(first), Some(last)) = (track.keys().first(), track.keys().last()) else {
            return Err(AnimationError::EmptyTrack {
                track: track.name.clone(),
            });
        };
        let slot = target
            .bind_property(track.target_property())
            .ok_or_else(|| AnimationError::UnboundProperty {
                target: target.name().to_string(),
                property: track.target_property().to_string(),
            })?;

        let overrides = target.animation_properties_override();
        let loop_mode = overrides.map_or(track.loop_mode, |o| o.loop_mode);
        let enable_blending = overrides.map_or(track.enable_blending, |o| o.enable_blending);
        let blending_speed = overrides.map_or(track.blending_speed, |o| o.blending_speed);

        let min_frame = first.frame;
        let max_frame = last.frame;
        let sampled = if min_frame > 0.0 {
            let mut with_start = (*track).clone();
            with_start
                .keys_mut()
                .insert(0, Keyframe::new(0.0, first.value));
            Arc::new(with_start)
        } else {
            Arc::clone(&track)
        };

        let events = track
            .events()
            .iter()
            .map(|e| RuntimeEvent {
                frame: e.frame,
                name: e.name.clone(),
                only_once: e.only_once,
                is_done: false,
            })
            .collect();

        Ok(Self {
            property: track.target_property().to_string(),
            binding: BindingKey {
                target: target_id,
                slot,
            },
            original_value: target.read(slot),
            source: track,
            track: sampled,
            state: EvaluationState::new(loop_mode),
            current_frame: 0.0,
            primed: false,
            min_frame,
            max_frame,
            original_blend_value: None,
            current_value: None,
            blending_factor: 0.0,
            enable_blending,
            blending_speed,
            weight: NO_WEIGHT,
            frame_offset: 0.0,
            previous_elapsed_ms: 0.0,
            previous_absolute_frame: 0.0,
            yoyo_direction: 1,
            loop_cache: None,
            events,
        })
    }

    pub fn animation(&self) -> &Arc<Track> {
        &self.source
    }

    pub fn target(&self) -> TargetId {
        self.binding.target
    }

    pub fn slot(&self) -> PropertySlot {
        self.binding.slot
    }

    pub fn target_property(&self) -> &str {
        &self.property
    }

    pub fn current_frame(&self) -> f32 {
        self.current_frame
    }

    pub fn current_value(&self) -> Option<Value> {
        self.current_value
    }

    pub fn original_value(&self) -> Option<Value> {
        self.original_value
    }

    pub fn weight(&self) -> f32 {
        self.weight
    }

    pub fn loop_mode(&self) -> LoopMode {
        self.state.loop_mode
    }

    pub fn blending_factor(&self) -> f32 {
        self.blending_factor
    }

    /// Frames per second of the underlying track.
    pub fn frames_per_second(&self) -> f32 {
        self.track.frames_per_second
    }

    /// Advance to `elapsed_ms` since the animatable started and write the sampled value.
    pub fn animate(
        &mut self,
        elapsed_ms: f64,
        playback: &Playback,
        ctx: &mut WriteContext<'_>,
        fired: &mut Vec<FiredEvent>,
    ) -> AnimateOutcome {
        let mut from = playback.from;
        let mut to = playback.to;
        if from < self.min_frame || from > self.max_frame {
            from = self.min_frame;
        }
        if to < self.min_frame || to > self.max_frame {
            to = self.max_frame;
        }
        let lo = from.min(to);
        let hi = from.max(to);
        let span = hi - lo;
        let speed = playback.speed_ratio;

        let absolute_frame = (elapsed_ms
            * f64::from(self.track.frames_per_second)
            * f64::from(speed)
            / 1000.0) as f32
            + self.frame_offset;
        self.previous_elapsed_ms = elapsed_ms;
        self.previous_absolute_frame = absolute_frame;
        let ascending = if absolute_frame != 0.0 {
            absolute_frame > 0.0
        } else {
            speed >= 0.0
        };

        let yoyo = playback.looping && self.state.loop_mode == LoopMode::Yoyo && span > 0.0;
        let mut yoyo_frame = None;
        let mut looped = false;
        if yoyo {
            let (frame, direction) = yoyo_map(absolute_frame, from, to);
            if direction != self.yoyo_direction {
                looped = true;
            }
            self.yoyo_direction = direction;
            yoyo_frame = Some(frame);
        }

        let running = playback.looping
            || if ascending {
                absolute_frame < span
            } else {
                absolute_frame > -span
            };

        if self.state.loop_mode != LoopMode::Cycle {
            let limits = self.loop_limits(lo, hi, &ctx.settings);
            self.state.offset_value = Some(limits.offset);
            self.state.high_limit_value = Some(if ascending { limits.high } else { limits.low });
        }

        let current_frame = match playback.sync.filter(|s| s.to != s.from) {
            Some(root) => from + (to - from) * (root.master_frame - root.from) / (root.to - root.from),
            None => match yoyo_frame {
                Some(frame) => frame,
                None if !running => {
                    if ascending {
                        hi
                    } else {
                        lo
                    }
                }
                None if span == 0.0 => lo,
                None if ascending => lo + absolute_frame % span,
                None => hi + absolute_frame % span,
            },
        };

        self.state.repeat_count = if !running || yoyo || span == 0.0 {
            0
        } else {
            (absolute_frame / span).trunc() as i32
        };

        if self.primed && !yoyo {
            let wrapped = if ascending {
                self.current_frame > current_frame
            } else {
                self.current_frame < current_frame
            };
            looped |= wrapped;
        }
        if looped {
            for event in self.events.iter_mut().filter(|e| !e.only_once) {
                event.is_done = false;
            }
            self.state.key = if ascending {
                0
            } else {
                self.track.keys().len().saturating_sub(1)
            };
        }
        self.current_frame = current_frame;
        self.primed = true;

        let value = interpolate(&self.track, current_frame, &mut self.state, &ctx.settings);
        self.set_value(value, playback.weight, ctx);

        for event in &mut self.events {
            let crossed = if ascending {
                current_frame >= event.frame && event.frame >= lo
            } else {
                current_frame <= event.frame && event.frame <= hi
            };
            if crossed && !event.is_done {
                event.is_done = true;
                fired.push(FiredEvent {
                    track: self.source.name.clone(),
                    name: event.name.clone(),
                    frame: event.frame,
                });
            }
        }
        self.events.retain(|e| !(e.only_once && e.is_done));

        AnimateOutcome { running, looped }
    }

    /// Loop boundary values for `[lo, hi]`, sampled in cycle mode. Only the last pair is kept.
    fn loop_limits(&mut self, lo: f32, hi: f32, settings: &InterpSettings) -> LoopLimits {
        let key = (lo.to_bits(), hi.to_bits());
        if let Some((cached, limits)) = self.loop_cache {
            if cached == key {
                return limits;
            }
        }
        let mut state = EvaluationState::new(LoopMode::Cycle);
        let low = interpolate(&self.track, lo, &mut state, settings);
        let high = interpolate(&self.track, hi, &mut state, settings);
        let limits = LoopLimits {
            offset: subtract_values(&high, &low),
            low,
            high,
        };
        self.loop_cache = Some((key, limits));
        limits
    }

    /// Blend `value` toward the target and either write it or hand it to the compositor.
    ///
    /// `weight == NO_WEIGHT` writes directly unless the animatable is additive.
    pub fn set_value(&mut self, value: Value, weight: f32, ctx: &mut WriteContext<'_>) {
        self.weight = weight;
        let slot = self.binding.slot;

        let value = if self.enable_blending && self.blending_factor <= 1.0 {
            let original = match self.original_blend_value {
                Some(v) => v,
                None => {
                    let v = ctx.target.read(slot).unwrap_or(value);
                    self.original_blend_value = Some(v);
                    v
                }
            };
            let blended = lerp_values(
                &original,
                &value,
                self.blending_factor,
                ctx.settings.matrix_blend,
            );
            self.blending_factor += self.blending_speed;
            blended
        } else {
            value
        };
        self.current_value = Some(value);

        let effective_weight = if ctx.is_additive && weight == NO_WEIGHT {
            1.0
        } else {
            weight
        };
        if effective_weight != NO_WEIGHT {
            ctx.compositor.register(
                self.binding,
                self.original_value,
                value,
                effective_weight,
                ctx.is_additive,
            );
        } else {
            ctx.target.write(slot, value);
            ctx.changes.push(Change {
                target: self.binding.target,
                slot,
                value,
            });
        }
        ctx.target.mark_dirty(&self.property);
    }

    /// Re-anchor the frame offset so the playhead stays continuous when the speed ratio changes.
    pub fn prepare_for_speed_ratio_change(&mut self, new_speed_ratio: f32) {
        let new_ratio = (self.previous_elapsed_ms
            * f64::from(self.track.frames_per_second)
            * f64::from(new_speed_ratio)
            / 1000.0) as f32;
        self.frame_offset = self.previous_absolute_frame - new_ratio;
    }

    /// Jump to `frame` (clamped to the key range) and write the value there.
    pub fn go_to_frame(&mut self, frame: f32, weight: f32, ctx: &mut WriteContext<'_>) {
        let keys = self.track.keys();
        let (Some(first), Some(last)) = (keys.first(), keys.last()) else {
            return;
        };
        let frame = frame.clamp(first.frame, last.frame);

        for event in self.events.iter_mut().filter(|e| !e.only_once) {
            event.is_done = event.frame < frame;
        }
        self.current_frame = frame;
        let value = interpolate(&self.track, frame, &mut self.state, &ctx.settings);
        self.set_value(value, weight, ctx);
    }

    /// Back to the initial state; with `restore_original`, write the pre-animation value back.
    pub fn reset(&mut self, restore_original: bool, ctx: &mut WriteContext<'_>) {
        if restore_original {
            if let Some(original) = self.original_value {
                ctx.target.write(self.binding.slot, original);
                ctx.changes.push(Change {
                    target: self.binding.target,
                    slot: self.binding.slot,
                    value: original,
                });
                ctx.target.mark_dirty(&self.property);
            }
        }
        self.loop_cache = None;
        self.state = EvaluationState::new(self.state.loop_mode);
        self.current_frame = 0.0;
        self.primed = false;
        self.blending_factor = 0.0;
        self.frame_offset = 0.0;
        self.previous_elapsed_ms = 0.0;
        self.previous_absolute_frame = 0.0;
        self.yoyo_direction = 1;
        for event in &mut self.events {
            event.is_done = false;
        }
    }
}

/// Map raw progress onto a sine ping-pong between `from` and `to`.
/// Returns the frame and the sign of the sine (flips once per there-and-back).
pub fn yoyo_map(absolute_frame: f32, from: f32, to: f32) -> (f32, i8) {
    let range = to - from;
    let position = (absolute_frame - from) / range;
    let wave = (position * PI).sin();
    let direction = if wave >= 0.0 { 1 } else { -1 };
    (wave.abs() * range + from, direction)
}
