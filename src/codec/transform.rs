//! 4x3 object transforms.
//!
//! Stored as twelve floats: a row-major 3x3 linear part followed by the
//! translation in elements 9-11.

use serde::Serialize;

const EPSILON: f64 = 1e-6;

/// Euler angles in degrees.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Rotation {
    pub pitch: f64,
    pub yaw: f64,
    pub roll: f64,
}

/// Decomposed object pose.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Pose {
    pub position: [f64; 3],
    pub rotation: Rotation,
    pub scale: f64,
}

impl Default for Pose {
    fn default() -> Self {
        Self { position: [0.0; 3], rotation: Rotation::default(), scale: 1.0 }
    }
}

/// Split a transform into position, Euler rotation and uniform scale.
///
/// Never fails: non-finite elements are treated as zero, and a matrix with
/// no finite element at all yields the identity pose.
pub fn decompose_transform(matrix: &[f32; 12]) -> Pose {
    if matrix.iter().all(|v| !v.is_finite()) {
        return Pose::default();
    }
    let m: [f64; 12] = std::array::from_fn(|i| {
        let v = matrix[i];
        if v.is_finite() { v as f64 } else { 0.0 }
    });

    let position = [m[9], m[10], m[11]];

    let mut r = [0f64; 9];
    let mut scale_sum = 0.0;
    for col in 0..3 {
        let (a, b, c) = (m[col], m[col + 3], m[col + 6]);
        let len = (a * a + b * b + c * c).sqrt();
        scale_sum += len;
        if len >= EPSILON {
            r[col] = a / len;
            r[col + 3] = b / len;
            r[col + 6] = c / len;
        }
    }
    let scale = scale_sum / 3.0;

    let pitch = r[8].clamp(-1.0, 1.0).acos();
    let sin_pitch = pitch.sin();
    let (yaw, roll) = if sin_pitch.abs() > EPSILON {
        (
            (r[6] / sin_pitch).clamp(-1.0, 1.0).asin(),
            (r[5] / sin_pitch).clamp(-1.0, 1.0).asin(),
        )
    } else {
        // Gimbal lock: only the combined angle is recoverable.
        ((-r[1]).atan2(r[0]), 0.0)
    };

    Pose {
        position,
        rotation: Rotation {
            pitch: pitch.to_degrees(),
            yaw: yaw.to_degrees(),
            roll: roll.to_degrees(),
        },
        scale,
    }
}

/// Build a transform that [`decompose_transform`] maps back to `pose`.
///
/// Exact for yaw and roll in [-90, 90] and pitch in (0, 180); outside that
/// range the decomposition folds the angles.
pub fn compose_transform(pose: &Pose) -> [f32; 12] {
    let alpha = pose.rotation.yaw.to_radians();
    let beta = pose.rotation.pitch.to_radians();
    let gamma = (90.0 - pose.rotation.roll).to_radians();
    let (s1, c1) = alpha.sin_cos();
    let (s2, c2) = beta.sin_cos();
    let (s3, c3) = gamma.sin_cos();

    // Transposed Z-X-Z rotation.
    let r = [
        c1 * c3 - c2 * s1 * s3,
        c3 * s1 + c1 * c2 * s3,
        s2 * s3,
        -c1 * s3 - c2 * c3 * s1,
        c1 * c2 * c3 - s1 * s3,
        c3 * s2,
        s1 * s2,
        -c1 * s2,
        c2,
    ];

    let mut out = [0f32; 12];
    for i in 0..9 {
        out[i] = (r[i] * pose.scale) as f32;
    }
    for i in 0..3 {
        out[9 + i] = pose.position[i] as f32;
    }
    out
}

/// Transform for a placement given only a position and a heading in degrees
/// about the vertical axis.
pub fn heading_transform(position: [f32; 3], heading_degrees: f32) -> [f32; 12] {
    let (s, c) = heading_degrees.to_radians().sin_cos();
    [
        c, 0.0, -s,
        0.0, 1.0, 0.0,
        s, 0.0, c,
        position[0], position[1], position[2],
    ]
}
