//! Late-binding compositor: collects weighted contributions per bound property
//! during a tick and resolves each property once after every animation ran.
//!
//! Resolution per property:
//! - total weight < 1: the original value fills the remainder, `orig * (1 - total) + sum(v * w)`
//! - total weight > 1: contributions are normalized by the total
//! - quaternions are summed on one hemisphere and renormalized; matrices are
//!   decomposed, accumulated and recomposed
//! - additive contributions are then layered on top, scaled by their weight

use cadence_api_core::blend::{add_values, normalize_quat, quat_dot, quat_multiply, scale_value, slerp};
use cadence_api_core::matrix::{compose, decompose, DecomposedSum};
use cadence_api_core::{DataType, Value, IDENTITY_QUAT};
use hashbrown::HashMap;

use crate::binding::BindingKey;
use crate::ids::TargetId;

#[derive(Clone, Debug, Default)]
struct LateBinding {
    original: Option<Value>,
    total_weight: f32,
    total_additive_weight: f32,
    animations: Vec<(Value, f32)>,
    additive: Vec<(Value, f32)>,
    active: bool,
}

impl LateBinding {
    fn reset(&mut self) {
        self.original = None;
        self.total_weight = 0.0;
        self.total_additive_weight = 0.0;
        self.animations.clear();
        self.additive.clear();
        self.active = false;
    }

    fn kind(&self) -> Option<DataType> {
        self.animations
            .first()
            .or_else(|| self.additive.first())
            .map(|(v, _)| v.kind())
            .or_else(|| self.original.map(|o| o.kind()))
    }

    fn resolve(&self) -> Option<Value> {
        let kind = self.kind()?;
        let mut result = if self.animations.is_empty() || self.total_weight == 0.0 {
            self.original.unwrap_or(Value::identity(kind))
        } else {
            let (fill, normalizer) = if self.total_weight < 1.0 {
                (
                    self.original.map(|o| (o, 1.0 - self.total_weight)),
                    1.0,
                )
            } else {
                (None, self.total_weight)
            };
            let contributions = fill.into_iter().chain(
                self.animations
                    .iter()
                    .map(|(v, w)| (*v, *w / normalizer)),
            );
            weighted_sum(kind, contributions)
        };

        if self.total_additive_weight != 0.0 {
            for (value, weight) in &self.additive {
                result = add_scaled(&result, value, *weight);
            }
        }
        Some(result)
    }
}

/// Weighted sum of same-kind values.
fn weighted_sum(kind: DataType, contributions: impl Iterator<Item = (Value, f32)>) -> Value {
    match kind {
        DataType::Quaternion => {
            let mut sum = [0.0f32; 4];
            let mut reference: Option<[f32; 4]> = None;
            for (value, weight) in contributions {
                let Some(q) = value.as_quaternion() else {
                    continue;
                };
                let r = *reference.get_or_insert(q);
                let sign = if quat_dot(&r, &q) < 0.0 { -1.0 } else { 1.0 };
                for i in 0..4 {
                    sum[i] += q[i] * weight * sign;
                }
            }
            Value::Quaternion(normalize_quat(sum))
        }
        DataType::Matrix => {
            let mut sum = DecomposedSum::default();
            for (value, weight) in contributions {
                if let Some(m) = value.as_matrix() {
                    sum.add(&decompose(m), weight);
                }
            }
            Value::Matrix(compose(&sum.finish()))
        }
        _ => contributions.fold(Value::zero(kind), |acc, (value, weight)| {
            add_values(&acc, &scale_value(&value, weight))
        }),
    }
}

/// Layer `delta` on top of `base` at `weight`.
fn add_scaled(base: &Value, delta: &Value, weight: f32) -> Value {
    match (base, delta) {
        (Value::Quaternion(b), Value::Quaternion(d)) => {
            Value::Quaternion(quat_multiply(slerp(IDENTITY_QUAT, *d, weight), *b))
        }
        (Value::Matrix(b), Value::Matrix(d)) => {
            let base = decompose(b);
            let delta = decompose(d);
            let mut out = base;
            for i in 0..3 {
                out.scale[i] *= 1.0 + (delta.scale[i] - 1.0) * weight;
                out.translation[i] += delta.translation[i] * weight;
            }
            out.rotation = quat_multiply(slerp(IDENTITY_QUAT, delta.rotation, weight), base.rotation);
            Value::Matrix(compose(&out))
        }
        _ => add_values(base, &scale_value(delta, weight)),
    }
}

/// Per-tick late-binding holders keyed by bound property.
///
/// Holders are reused across ticks; `active` lists the properties touched this tick in registration order.
#[derive(Debug, Default)]
pub struct Compositor {
    holders: HashMap<BindingKey, LateBinding>,
    active: Vec<BindingKey>,
}

impl Compositor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(bindings: usize) -> Self {
        Self {
            holders: HashMap::with_capacity(bindings),
            active: Vec::with_capacity(bindings),
        }
    }

    /// Add one contribution for `key`. `original` is the property's value before any animation touched it.
    pub fn register(
        &mut self,
        key: BindingKey,
        original: Option<Value>,
        value: Value,
        weight: f32,
        additive: bool,
    ) {
        let holder = self.holders.entry(key).or_default();
        if !holder.active {
            holder.reset();
            holder.original = original;
            holder.active = true;
            self.active.push(key);
        }
        if additive {
            holder.additive.push((value, weight));
            holder.total_additive_weight += weight;
        } else {
            holder.animations.push((value, weight));
            holder.total_weight += weight;
        }
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    /// Total non-additive weight registered for `key` this tick.
    pub fn total_weight(&self, key: &BindingKey) -> f32 {
        self.holders
            .get(key)
            .filter(|h| h.active)
            .map_or(0.0, |h| h.total_weight)
    }

    /// Resolve every property touched this tick into `out` and clear the tick state.
    pub fn resolve_into(&mut self, out: &mut Vec<(BindingKey, Value)>) {
        for key in self.active.drain(..) {
            let Some(holder) = self.holders.get_mut(&key) else {
                continue;
            };
            if let Some(value) = holder.resolve() {
                out.push((key, value));
            }
            holder.reset();
        }
    }

    /// Drop holders for properties that are no longer animated.
    pub fn forget_target(&mut self, target: TargetId) {
        self.holders.retain(|k, _| k.target != target);
        self.active.retain(|k| k.target != target);
    }
}
