//! Interpolation utilities.
//!
//! None of these functions clamp or validate their inputs: `t` outside
//! `[0, 1]` extrapolates, and NaN or infinite inputs propagate to the result.

use glam::{Quat, Vec3, Vec4};
use serde::{Deserialize, Serialize};
use smallvec::smallvec;

use cadence_core::value::{AnimValue, ValueKind, WeightArray};

/// Below this arc (radians) slerp degrades to a normalized lerp.
pub const SLERP_ANGLE_THRESHOLD: f32 = 1e-3;

/// Shaping curve applied to the bracketing fraction before interpolating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Easing {
    #[default]
    Linear,
    EaseIn,
    EaseOut,
    EaseInOut,
}

/// Remaps `t` in `[0, 1]` onto `[0, 1]` with the given curve.
#[inline]
#[must_use]
pub fn ease(t: f32, mode: Easing) -> f32 {
    match mode {
        Easing::Linear => t,
        Easing::EaseIn => t * t,
        Easing::EaseOut => t * (2.0 - t),
        Easing::EaseInOut => {
            if t < 0.5 {
                2.0 * t * t
            } else {
                -1.0 + (4.0 - 2.0 * t) * t
            }
        }
    }
}

#[inline]
#[must_use]
pub fn linear(t: f32, a: f32, b: f32) -> f32 {
    a + (b - a) * t
}

#[inline]
#[must_use]
pub fn vector3_lerp(t: f32, a: Vec3, b: Vec3) -> Vec3 {
    a + (b - a) * t
}

/// Shortest-arc spherical interpolation between two unit rotations.
///
/// `b` is negated when the rotations lie in opposite hemispheres, so `q` and
/// `-q` (the same rotation) blend without a detour. Nearly identical
/// rotations fall back to a normalized lerp. The result is renormalized.
#[must_use]
pub fn quaternion_slerp(t: f32, a: Quat, b: Quat) -> Quat {
    let va = Vec4::from(a);
    let mut vb = Vec4::from(b);

    let mut dot = va.dot(vb);
    if dot < 0.0 {
        vb = -vb;
        dot = -dot;
    }

    let theta = dot.min(1.0).acos();
    let blended = if theta < SLERP_ANGLE_THRESHOLD {
        va + (vb - va) * t
    } else {
        let sin_theta = theta.sin();
        let wa = ((1.0 - t) * theta).sin() / sin_theta;
        let wb = (t * theta).sin() / sin_theta;
        va * wa + vb * wb
    };

    Quat::from_vec4(blended).normalize()
}

/// Hermite basis weights `(s0, s1, s2, s3)` for value0, tangent0, value1, tangent1.
#[inline]
fn hermite_basis(t: f32) -> (f32, f32, f32, f32) {
    let t2 = t * t;
    let t3 = t2 * t;

    let s2 = -2.0 * t3 + 3.0 * t2;
    let s3 = t3 - t2;
    let s0 = 1.0 - s2;
    let s1 = s3 - t2 + t;
    (s0, s1, s2, s3)
}

/// A keyframe sample type.
pub trait Interpolatable: Clone + Sized {
    const KIND: ValueKind;

    fn interpolate_linear(start: &Self, end: &Self, t: f32) -> Self;

    fn interpolate_cubic(
        v0: &Self,
        out_tangent0: &Self,
        in_tangent1: &Self,
        v1: &Self,
        t: f32,
        dt: f32,
    ) -> Self;

    fn into_value(self) -> AnimValue;

    /// Component count for variable-width samples; `None` for fixed-size types.
    fn width(&self) -> Option<usize> {
        None
    }
}

impl Interpolatable for f32 {
    const KIND: ValueKind = ValueKind::Scalar;

    fn interpolate_linear(start: &Self, end: &Self, t: f32) -> Self {
        linear(t, *start, *end)
    }

    fn interpolate_cubic(
        v0: &Self,
        out_tangent0: &Self,
        in_tangent1: &Self,
        v1: &Self,
        t: f32,
        dt: f32,
    ) -> Self {
        let (s0, s1, s2, s3) = hermite_basis(t);
        let m0 = out_tangent0 * dt;
        let m1 = in_tangent1 * dt;

        s0 * v0 + s1 * m0 + s2 * v1 + s3 * m1
    }

    fn into_value(self) -> AnimValue {
        AnimValue::Scalar(self)
    }
}

impl Interpolatable for Vec3 {
    const KIND: ValueKind = ValueKind::Vector3;

    fn interpolate_linear(start: &Self, end: &Self, t: f32) -> Self {
        vector3_lerp(t, *start, *end)
    }

    fn interpolate_cubic(
        v0: &Self,
        out_tangent0: &Self,
        in_tangent1: &Self,
        v1: &Self,
        t: f32,
        dt: f32,
    ) -> Self {
        let (s0, s1, s2, s3) = hermite_basis(t);
        let m0 = *out_tangent0 * dt;
        let m1 = *in_tangent1 * dt;

        *v0 * s0 + m0 * s1 + *v1 * s2 + m1 * s3
    }

    fn into_value(self) -> AnimValue {
        AnimValue::Vector3(self)
    }
}

impl Interpolatable for Quat {
    const KIND: ValueKind = ValueKind::Quaternion;

    fn interpolate_linear(start: &Self, end: &Self, t: f32) -> Self {
        quaternion_slerp(t, *start, *end)
    }

    fn interpolate_cubic(
        v0: &Self,
        out_tangent0: &Self,
        in_tangent1: &Self,
        v1: &Self,
        t: f32,
        dt: f32,
    ) -> Self {
        let (s0, s1, s2, s3) = hermite_basis(t);

        let v0_v = Vec4::from(*v0);
        let v1_v = Vec4::from(*v1);
        let m0_v = Vec4::from(*out_tangent0) * dt;
        let m1_v = Vec4::from(*in_tangent1) * dt;

        let result = v0_v * s0 + m0_v * s1 + v1_v * s2 + m1_v * s3;

        Quat::from_vec4(result).normalize()
    }

    fn into_value(self) -> AnimValue {
        AnimValue::Quaternion(self)
    }
}

/// Morph-target weights for one keyframe. Every sample of a track has the
/// same width.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MorphWeights {
    pub weights: WeightArray,
}

impl MorphWeights {
    #[must_use]
    pub fn allocate(count: usize) -> Self {
        Self {
            weights: smallvec![0.0; count],
        }
    }

    #[must_use]
    pub fn from_slice(weights: &[f32]) -> Self {
        Self {
            weights: WeightArray::from_slice(weights),
        }
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.weights.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }
}

impl Interpolatable for MorphWeights {
    const KIND: ValueKind = ValueKind::Weights;

    fn interpolate_linear(start: &Self, end: &Self, t: f32) -> Self {
        let weights = start
            .weights
            .iter()
            .zip(&end.weights)
            .map(|(&a, &b)| linear(t, a, b))
            .collect();
        Self { weights }
    }

    fn interpolate_cubic(
        v0: &Self,
        out_tangent0: &Self,
        in_tangent1: &Self,
        v1: &Self,
        t: f32,
        dt: f32,
    ) -> Self {
        let (s0, s1, s2, s3) = hermite_basis(t);

        let weights = (0..v0.len().min(v1.len()))
            .map(|i| {
                let m0 = out_tangent0.weights.get(i).copied().unwrap_or(0.0) * dt;
                let m1 = in_tangent1.weights.get(i).copied().unwrap_or(0.0) * dt;
                s0 * v0.weights[i] + s1 * m0 + s2 * v1.weights[i] + s3 * m1
            })
            .collect();
        Self { weights }
    }

    fn into_value(self) -> AnimValue {
        AnimValue::Weights(self.weights)
    }

    fn width(&self) -> Option<usize> {
        Some(self.weights.len())
    }
}
