//! Conversion of absolute key values into deltas against a reference pose.

use cadence_api_core::blend::{normalize_quat, quat_conjugate, quat_multiply, subtract_values};
use cadence_api_core::matrix::{compose, decompose, Decomposed};
use cadence_api_core::Value;

use crate::track::Track;

/// Reference pose handed to the per-kind conversion.
enum Reference {
    /// Conjugated reference rotation.
    Rotation([f32; 4]),
    /// Decomposed reference transform with a conjugated rotation.
    Transform(Decomposed),
    Plain(Value),
}

impl Reference {
    fn new(value: Value) -> Self {
        match value {
            Value::Quaternion(q) => Reference::Rotation(quat_conjugate(normalize_quat(q))),
            Value::Matrix(m) => {
                let mut d = decompose(&m);
                d.rotation = quat_conjugate(normalize_quat(d.rotation));
                Reference::Transform(d)
            }
            other => Reference::Plain(other),
        }
    }

    fn delta(&self, value: &Value) -> Value {
        match (self, value) {
            (Reference::Rotation(inv), Value::Quaternion(q)) => {
                Value::Quaternion(quat_multiply(*inv, *q))
            }
            (Reference::Transform(r), Value::Matrix(m)) => {
                let k = decompose(m);
                let mut out = Decomposed::IDENTITY;
                for i in 0..3 {
                    out.translation[i] = k.translation[i] - r.translation[i];
                    out.scale[i] = if r.scale[i] == 0.0 {
                        k.scale[i]
                    } else {
                        k.scale[i] / r.scale[i]
                    };
                }
                out.rotation = quat_multiply(r.rotation, k.rotation);
                Value::Matrix(compose(&out))
            }
            (Reference::Plain(r), v) => subtract_values(v, r),
            _ => *value,
        }
    }
}

pub(crate) fn make_track_additive(track: &mut Track, reference_frame: f32, range: Option<&str>) {
    let (Some(first_frame), Some(last_frame)) = (track.first_frame(), track.last_frame()) else {
        return;
    };
    let reference_frame = reference_frame.max(0.0);

    let (mut from, mut to) = (first_frame, last_frame);
    if let Some(r) = range.and_then(|name| track.range(name)) {
        from = r.from;
        to = r.to;
    }

    let keys = track.keys();
    let reference = if keys.len() == 1 || reference_frame <= first_frame {
        keys[0].value
    } else if reference_frame >= last_frame {
        keys[keys.len() - 1].value
    } else {
        track.evaluate(reference_frame)
    };
    let reference = Reference::new(reference);

    let start_index = if from != first_frame {
        track.create_key_for_frame(from)
    } else {
        0
    };
    let end_index = if to != last_frame {
        track.create_key_for_frame(to)
    } else {
        track.keys().len() - 1
    };

    if start_index > end_index {
        return;
    }
    for key in &mut track.keys_mut()[start_index..=end_index] {
        key.value = reference.delta(&key.value);
    }
}
