//! Interpolation and arithmetic over [`Value`]s.
//!
//! - f32 lerp / cubic hermite for floats and vector components
//! - quaternion slerp (shortest-arc), multiply, conjugate
//! - matrices: component lerp or decompose-lerp (see [`MatrixBlend`])
//! - add / subtract / scale used for loop offsets, additive layers and weighted sums
//!
//! Mismatched kinds are fail-soft: the left operand is returned unchanged.

use crate::matrix::{self, MatrixBlend};
use crate::value::{Value, IDENTITY_QUAT};

/// Linear interpolation for f32
#[inline]
pub fn lerp_f(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// Lerp for fixed-size arrays
pub fn lerp_array<const N: usize>(a: &[f32; N], b: &[f32; N], t: f32) -> [f32; N] {
    let mut out = [0.0f32; N];
    for i in 0..N {
        out[i] = lerp_f(a[i], b[i], t);
    }
    out
}

/// Cubic hermite between `v1` and `v2` with already frame-scaled tangents.
#[inline]
pub fn hermite_f(v1: f32, t1: f32, v2: f32, t2: f32, amount: f32) -> f32 {
    let squared = amount * amount;
    let cubed = amount * squared;
    let part1 = 2.0 * cubed - 3.0 * squared + 1.0;
    let part2 = -2.0 * cubed + 3.0 * squared;
    let part3 = cubed - 2.0 * squared + amount;
    let part4 = cubed - squared;
    v1 * part1 + v2 * part2 + t1 * part3 + t2 * part4
}

fn hermite_array<const N: usize>(
    v1: &[f32; N],
    t1: &[f32; N],
    v2: &[f32; N],
    t2: &[f32; N],
    amount: f32,
) -> [f32; N] {
    let mut out = [0.0f32; N];
    for i in 0..N {
        out[i] = hermite_f(v1[i], t1[i], v2[i], t2[i], amount);
    }
    out
}

/// Normalize a quaternion represented as [x,y,z,w]
pub fn normalize_quat(q: [f32; 4]) -> [f32; 4] {
    let mag = (q[0] * q[0] + q[1] * q[1] + q[2] * q[2] + q[3] * q[3]).sqrt();
    if mag == 0.0 {
        IDENTITY_QUAT
    } else {
        [q[0] / mag, q[1] / mag, q[2] / mag, q[3] / mag]
    }
}

#[inline]
pub fn quat_dot(a: &[f32; 4], b: &[f32; 4]) -> f32 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2] + a[3] * b[3]
}

/// Slerp between two unit quaternions q1, q2
pub fn slerp(q1: [f32; 4], q2: [f32; 4], t: f32) -> [f32; 4] {
    let qa = normalize_quat(q1);
    let mut qb = normalize_quat(q2);

    let mut dot = quat_dot(&qa, &qb);

    // Take the short path.
    if dot < 0.0 {
        qb = [-qb[0], -qb[1], -qb[2], -qb[3]];
        dot = -dot;
    }

    // Close quaternions: lerp + renormalize
    const DOT_THRESHOLD: f32 = 0.9995;
    if dot > DOT_THRESHOLD {
        return normalize_quat(lerp_array(&qa, &qb, t));
    }

    let theta_0 = dot.acos();
    let theta = theta_0 * t;
    let sin_theta = theta.sin();
    let sin_theta_0 = theta_0.sin();

    let s0 = (theta_0 - theta).sin() / sin_theta_0;
    let s1 = sin_theta / sin_theta_0;

    [
        s0 * qa[0] + s1 * qb[0],
        s0 * qa[1] + s1 * qb[1],
        s0 * qa[2] + s1 * qb[2],
        s0 * qa[3] + s1 * qb[3],
    ]
}

/// Hamilton product `a * b`.
pub fn quat_multiply(a: [f32; 4], b: [f32; 4]) -> [f32; 4] {
    let [ax, ay, az, aw] = a;
    let [bx, by, bz, bw] = b;
    [
        aw * bx + ax * bw + ay * bz - az * by,
        aw * by - ax * bz + ay * bw + az * bx,
        aw * bz + ax * by - ay * bx + az * bw,
        aw * bw - ax * bx - ay * by - az * bz,
    ]
}

#[inline]
pub fn quat_conjugate(q: [f32; 4]) -> [f32; 4] {
    [-q[0], -q[1], -q[2], q[3]]
}

/// Interpolate two values of the same kind. Quaternions slerp; matrices follow `matrix_blend`.
pub fn lerp_values(a: &Value, b: &Value, t: f32, matrix_blend: MatrixBlend) -> Value {
    match (a, b) {
        (Value::Float(x), Value::Float(y)) => Value::Float(lerp_f(*x, *y, t)),
        (Value::Vector2(x), Value::Vector2(y)) => Value::Vector2(lerp_array(x, y, t)),
        (Value::Vector3(x), Value::Vector3(y)) => Value::Vector3(lerp_array(x, y, t)),
        (Value::Color3(x), Value::Color3(y)) => Value::Color3(lerp_array(x, y, t)),
        (Value::Color4(x), Value::Color4(y)) => Value::Color4(lerp_array(x, y, t)),
        (Value::Size(x), Value::Size(y)) => Value::Size(lerp_array(x, y, t)),
        (Value::Quaternion(x), Value::Quaternion(y)) => Value::Quaternion(slerp(*x, *y, t)),
        (Value::Matrix(x), Value::Matrix(y)) => Value::Matrix(matrix::blend(x, y, t, matrix_blend)),
        _ => *a,
    }
}

/// Cubic hermite between `v1` and `v2`. Tangents must already be scaled by the key frame delta.
pub fn hermite_values(v1: &Value, t1: &Value, v2: &Value, t2: &Value, amount: f32) -> Value {
    match (v1, t1, v2, t2) {
        (Value::Float(a), Value::Float(ta), Value::Float(b), Value::Float(tb)) => {
            Value::Float(hermite_f(*a, *ta, *b, *tb, amount))
        }
        (Value::Vector2(a), Value::Vector2(ta), Value::Vector2(b), Value::Vector2(tb)) => {
            Value::Vector2(hermite_array(a, ta, b, tb, amount))
        }
        (Value::Vector3(a), Value::Vector3(ta), Value::Vector3(b), Value::Vector3(tb)) => {
            Value::Vector3(hermite_array(a, ta, b, tb, amount))
        }
        (Value::Color3(a), Value::Color3(ta), Value::Color3(b), Value::Color3(tb)) => {
            Value::Color3(hermite_array(a, ta, b, tb, amount))
        }
        (Value::Color4(a), Value::Color4(ta), Value::Color4(b), Value::Color4(tb)) => {
            Value::Color4(hermite_array(a, ta, b, tb, amount))
        }
        (Value::Size(a), Value::Size(ta), Value::Size(b), Value::Size(tb)) => {
            Value::Size(hermite_array(a, ta, b, tb, amount))
        }
        (Value::Quaternion(a), Value::Quaternion(ta), Value::Quaternion(b), Value::Quaternion(tb)) => {
            Value::Quaternion(normalize_quat(hermite_array(a, ta, b, tb, amount)))
        }
        (Value::Matrix(a), Value::Matrix(ta), Value::Matrix(b), Value::Matrix(tb)) => {
            Value::Matrix(hermite_array(a, ta, b, tb, amount))
        }
        _ => *v1,
    }
}

fn zip_components(a: &Value, b: &Value, op: impl Fn(f32, f32) -> f32) -> Value {
    if a.kind() != b.kind() {
        return *a;
    }
    let mut out = *a;
    for (o, r) in out.components_mut().iter_mut().zip(b.components()) {
        *o = op(*o, *r);
    }
    out
}

/// Component-wise `a + b`.
pub fn add_values(a: &Value, b: &Value) -> Value {
    zip_components(a, b, |x, y| x + y)
}

/// Component-wise `a - b`.
pub fn subtract_values(a: &Value, b: &Value) -> Value {
    zip_components(a, b, |x, y| x - y)
}

/// Component-wise `v * s`.
pub fn scale_value(v: &Value, s: f32) -> Value {
    let mut out = *v;
    for c in out.components_mut() {
        *c *= s;
    }
    out
}

/// True when both values share a kind and every component is within `eps`.
pub fn values_close(a: &Value, b: &Value, eps: f32) -> bool {
    a.kind() == b.kind()
        && a
            .components()
            .iter()
            .zip(b.components())
            .all(|(x, y)| (x - y).abs() <= eps)
}
