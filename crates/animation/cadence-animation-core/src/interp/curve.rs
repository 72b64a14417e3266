use cadence_api_core::blend::{add_values, hermite_values, lerp_values, scale_value};
use cadence_api_core::{DataType, Value};

use super::EvaluationState;
use crate::config::InterpSettings;
use crate::track::{KeyInterpolation, Keyframe, LoopMode, Track};

/// Move the cursor so that `keys[key].frame <= frame < keys[key + 1].frame`.
/// Returns `None` when `frame` precedes the first key.
fn seek(keys: &[Keyframe], frame: f32, cursor: usize) -> Option<usize> {
    let mut key = cursor.min(keys.len() - 1);
    while key > 0 && frame < keys[key].frame {
        key -= 1;
    }
    if frame < keys[key].frame {
        return None;
    }
    while key + 1 < keys.len() && frame >= keys[key + 1].frame {
        key += 1;
    }
    Some(key)
}

/// Tangent scaled by the frame delta of its segment.
fn scaled_tangent(tangent: Option<&Value>, frame_delta: f32) -> Option<Value> {
    tangent.map(|t| scale_value(t, frame_delta))
}

/// Sample `track` at `frame`.
///
/// - before the first key: the first key value
/// - at or past the last key: the last key value
/// - exactly on a key: that key's value, bit for bit (plus relative offsets past the first loop)
/// - step keys hold their value; tangent pairs use cubic hermite; otherwise lerp / slerp
/// - matrices hold the previous key when interpolation is disabled or the loop mode is relative
pub fn interpolate(
    track: &Track,
    frame: f32,
    state: &mut EvaluationState,
    settings: &InterpSettings,
) -> Value {
    let keys = track.keys();
    let data_type = track.data_type();
    if keys.is_empty() {
        // Fail-soft neutral value; running animations never carry an empty track.
        return Value::identity(data_type);
    }

    let Some(key) = seek(keys, frame, state.key) else {
        state.key = 0;
        return keys[0].value;
    };
    state.key = key;
    if key + 1 >= keys.len() {
        return keys[key].value;
    }

    let start = &keys[key];
    let end = &keys[key + 1];

    if start.interpolation == KeyInterpolation::Step {
        return if end.frame > frame { start.value } else { end.value };
    }

    if data_type == DataType::Matrix
        && (!settings.allow_matrices_interpolation || state.loop_mode == LoopMode::Relative)
    {
        return start.value;
    }

    let base = if frame == start.frame {
        start.value
    } else {
        let frame_delta = end.frame - start.frame;
        let gradient = (frame - start.frame) / frame_delta;
        let out_tangent = scaled_tangent(start.out_tangent.as_ref(), frame_delta);
        let in_tangent = scaled_tangent(end.in_tangent.as_ref(), frame_delta);
        match (out_tangent, in_tangent) {
            (Some(out_t), Some(in_t)) if data_type != DataType::Matrix => {
                hermite_values(&start.value, &out_t, &end.value, &in_t, gradient)
            }
            _ => lerp_values(&start.value, &end.value, gradient, settings.matrix_blend),
        }
    };

    match state.loop_mode {
        LoopMode::Relative if state.repeat_count != 0 => match state.offset_value {
            Some(offset) => add_values(
                &base,
                &scale_value(&offset, state.repeat_count as f32),
            ),
            None => base,
        },
        LoopMode::Constant if state.repeat_count > 0 => state.high_limit_value.unwrap_or(base),
        _ => base,
    }
}
