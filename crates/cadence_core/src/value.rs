use std::fmt;

use glam::{Quat, Vec3};
use smallvec::SmallVec;

/// Inline capacity for morph-weight arrays before spilling to the heap.
pub const INLINE_WEIGHTS: usize = 8;

/// Storage for a morph-weight sample.
pub type WeightArray = SmallVec<[f32; INLINE_WEIGHTS]>;

/// The type of value a channel carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Scalar,
    Vector3,
    Quaternion,
    Weights,
}

impl ValueKind {
    /// Number of `f32` components a single sample of this kind occupies,
    /// or `None` for variable-width arrays.
    #[must_use]
    pub fn stride(self) -> Option<usize> {
        match self {
            Self::Scalar => Some(1),
            Self::Vector3 => Some(3),
            Self::Quaternion => Some(4),
            Self::Weights => None,
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Scalar => "scalar",
            Self::Vector3 => "vector3",
            Self::Quaternion => "quaternion",
            Self::Weights => "weights",
        };
        f.write_str(name)
    }
}

/// An evaluated animation value, ready to be written into a target.
#[derive(Debug, Clone, PartialEq)]
pub enum AnimValue {
    Scalar(f32),
    Vector3(Vec3),
    Quaternion(Quat),
    Weights(WeightArray),
}

impl AnimValue {
    #[must_use]
    pub fn kind(&self) -> ValueKind {
        match self {
            Self::Scalar(_) => ValueKind::Scalar,
            Self::Vector3(_) => ValueKind::Vector3,
            Self::Quaternion(_) => ValueKind::Quaternion,
            Self::Weights(_) => ValueKind::Weights,
        }
    }

    #[must_use]
    pub fn as_scalar(&self) -> Option<f32> {
        match self {
            Self::Scalar(v) => Some(*v),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_vec3(&self) -> Option<Vec3> {
        match self {
            Self::Vector3(v) => Some(*v),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_quat(&self) -> Option<Quat> {
        match self {
            Self::Quaternion(q) => Some(*q),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_weights(&self) -> Option<&[f32]> {
        match self {
            Self::Weights(w) => Some(w),
            _ => None,
        }
    }

    /// Multiplies the amplitude of scalar and array channels by `factor`.
    ///
    /// Vectors and rotations are left untouched: scaling a position or a
    /// rotation towards zero has no meaningful "fade" interpretation.
    pub fn scale_amplitude(&mut self, factor: f32) {
        match self {
            Self::Scalar(v) => *v *= factor,
            Self::Weights(w) => w.iter_mut().for_each(|x| *x *= factor),
            Self::Vector3(_) | Self::Quaternion(_) => {}
        }
    }
}

impl From<f32> for AnimValue {
    fn from(v: f32) -> Self {
        Self::Scalar(v)
    }
}

impl From<Vec3> for AnimValue {
    fn from(v: Vec3) -> Self {
        Self::Vector3(v)
    }
}

impl From<Quat> for AnimValue {
    fn from(q: Quat) -> Self {
        Self::Quaternion(q)
    }
}
