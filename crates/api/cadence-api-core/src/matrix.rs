//! 4x4 column-major matrix helpers: decompose into scale / rotation / translation and back.

use serde::{Deserialize, Serialize};

use crate::blend::{lerp_array, normalize_quat, quat_dot, slerp};
use crate::value::IDENTITY_QUAT;

/// How two matrices are interpolated.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MatrixBlend {
    /// Element-wise lerp.
    #[default]
    Lerp,
    /// Decompose both, lerp scale and translation, slerp rotation, recompose.
    DecomposeLerp,
}

/// Scale, rotation `(x, y, z, w)` and translation of an affine matrix.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Decomposed {
    pub scale: [f32; 3],
    pub rotation: [f32; 4],
    pub translation: [f32; 3],
}

impl Decomposed {
    pub const IDENTITY: Decomposed = Decomposed {
        scale: [1.0; 3],
        rotation: IDENTITY_QUAT,
        translation: [0.0; 3],
    };
}

#[inline]
fn at(m: &[f32; 16], row: usize, col: usize) -> f32 {
    m[col * 4 + row]
}

fn column_length(m: &[f32; 16], col: usize) -> f32 {
    let c = &m[col * 4..col * 4 + 3];
    (c[0] * c[0] + c[1] * c[1] + c[2] * c[2]).sqrt()
}

fn determinant3(m: &[f32; 16]) -> f32 {
    at(m, 0, 0) * (at(m, 1, 1) * at(m, 2, 2) - at(m, 1, 2) * at(m, 2, 1))
        - at(m, 0, 1) * (at(m, 1, 0) * at(m, 2, 2) - at(m, 1, 2) * at(m, 2, 0))
        + at(m, 0, 2) * (at(m, 1, 0) * at(m, 2, 1) - at(m, 1, 1) * at(m, 2, 0))
}

/// Rotation matrix (row, col accessor) to quaternion.
fn quat_from_rotation(r: impl Fn(usize, usize) -> f32) -> [f32; 4] {
    let (m00, m01, m02) = (r(0, 0), r(0, 1), r(0, 2));
    let (m10, m11, m12) = (r(1, 0), r(1, 1), r(1, 2));
    let (m20, m21, m22) = (r(2, 0), r(2, 1), r(2, 2));
    let trace = m00 + m11 + m22;

    let q = if trace > 0.0 {
        let s = 0.5 / (trace + 1.0).sqrt();
        [(m21 - m12) * s, (m02 - m20) * s, (m10 - m01) * s, 0.25 / s]
    } else if m00 > m11 && m00 > m22 {
        let s = 2.0 * (1.0 + m00 - m11 - m22).sqrt();
        [0.25 * s, (m01 + m10) / s, (m02 + m20) / s, (m21 - m12) / s]
    } else if m11 > m22 {
        let s = 2.0 * (1.0 + m11 - m00 - m22).sqrt();
        [(m01 + m10) / s, 0.25 * s, (m12 + m21) / s, (m02 - m20) / s]
    } else {
        let s = 2.0 * (1.0 + m22 - m00 - m11).sqrt();
        [(m02 + m20) / s, (m12 + m21) / s, 0.25 * s, (m10 - m01) / s]
    };
    normalize_quat(q)
}

/// Split `m` into scale, rotation and translation. A negative determinant flips the y scale.
pub fn decompose(m: &[f32; 16]) -> Decomposed {
    let translation = [m[12], m[13], m[14]];
    let mut scale = [column_length(m, 0), column_length(m, 1), column_length(m, 2)];
    if determinant3(m) <= 0.0 {
        scale[1] = -scale[1];
    }

    if scale.iter().any(|s| *s == 0.0) {
        return Decomposed {
            scale,
            rotation: IDENTITY_QUAT,
            translation,
        };
    }

    let rotation = quat_from_rotation(|row, col| at(m, row, col) / scale[col]);
    Decomposed {
        scale,
        rotation,
        translation,
    }
}

/// Inverse of [`decompose`].
pub fn compose(d: &Decomposed) -> [f32; 16] {
    let [x, y, z, w] = normalize_quat(d.rotation);
    let (xx, yy, zz) = (x * x, y * y, z * z);
    let (xy, xz, yz) = (x * y, x * z, y * z);
    let (wx, wy, wz) = (w * x, w * y, w * z);
    let [sx, sy, sz] = d.scale;
    let [tx, ty, tz] = d.translation;

    [
        (1.0 - 2.0 * (yy + zz)) * sx,
        2.0 * (xy + wz) * sx,
        2.0 * (xz - wy) * sx,
        0.0,
        2.0 * (xy - wz) * sy,
        (1.0 - 2.0 * (xx + zz)) * sy,
        2.0 * (yz + wx) * sy,
        0.0,
        2.0 * (xz + wy) * sz,
        2.0 * (yz - wx) * sz,
        (1.0 - 2.0 * (xx + yy)) * sz,
        0.0,
        tx,
        ty,
        tz,
        1.0,
    ]
}

/// Interpolate two matrices according to `mode`.
pub fn blend(a: &[f32; 16], b: &[f32; 16], t: f32, mode: MatrixBlend) -> [f32; 16] {
    match mode {
        MatrixBlend::Lerp => lerp_array(a, b, t),
        MatrixBlend::DecomposeLerp => {
            let da = decompose(a);
            let db = decompose(b);
            compose(&Decomposed {
                scale: lerp_array(&da.scale, &db.scale, t),
                rotation: slerp(da.rotation, db.rotation, t),
                translation: lerp_array(&da.translation, &db.translation, t),
            })
        }
    }
}

/// Running weighted sum of decomposed transforms; rotations are summed on the
/// hemisphere of the first contribution and normalized at the end.
#[derive(Clone, Debug, Default)]
pub struct DecomposedSum {
    scale: [f32; 3],
    rotation: [f32; 4],
    translation: [f32; 3],
    reference: Option<[f32; 4]>,
}

impl DecomposedSum {
    pub fn add(&mut self, d: &Decomposed, weight: f32) {
        for i in 0..3 {
            self.scale[i] += d.scale[i] * weight;
            self.translation[i] += d.translation[i] * weight;
        }
        let reference = *self.reference.get_or_insert(d.rotation);
        let sign = if quat_dot(&reference, &d.rotation) < 0.0 {
            -1.0
        } else {
            1.0
        };
        for i in 0..4 {
            self.rotation[i] += d.rotation[i] * weight * sign;
        }
    }

    pub fn finish(&self) -> Decomposed {
        Decomposed {
            scale: self.scale,
            rotation: normalize_quat(self.rotation),
            translation: self.translation,
        }
    }
}
