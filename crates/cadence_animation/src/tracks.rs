use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::values::{Easing, Interpolatable, ease};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterpolationMode {
    #[default]
    Linear,
    Step,
    CubicSpline,
}

impl InterpolationMode {
    /// Number of stored values per keyframe.
    #[must_use]
    pub fn values_per_key(self) -> usize {
        match self {
            Self::CubicSpline => 3,
            Self::Linear | Self::Step => 1,
        }
    }
}

/// Why a set of keyframes was rejected.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum KeyframeError {
    #[error("track has no keyframes")]
    Empty,
    #[error("{times} keyframe times but {values} values (expected {expected})")]
    LengthMismatch {
        times: usize,
        values: usize,
        expected: usize,
    },
    #[error("keyframe time at index {index} is not finite")]
    NonFiniteTime { index: usize },
    #[error("keyframe times decrease at index {index}")]
    DecreasingTime { index: usize },
    #[error("samples have zero width")]
    ZeroWidth,
    #[error("value {index} has width {found}, expected {expected}")]
    InconsistentWidth {
        index: usize,
        expected: usize,
        found: usize,
    },
}

const MAX_SCAN_OFFSET: usize = 3;

/// Playback-locality hint for [`KeyframeTrack::sample_with_cursor`].
///
/// Holds the index of the first keyframe at or after the last queried time.
/// A stale or foreign cursor only costs a binary search, never correctness.
#[derive(Debug, Clone, Default)]
pub struct KeyframeCursor {
    pub last_index: usize,
}

/// Where a query time falls relative to the keyframes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Bracket {
    /// Return the sample at this keyframe as-is.
    Exact(usize),
    /// Interpolate between this keyframe and the next.
    Between(usize),
}

/// The time series of one animated property.
///
/// Times are non-decreasing. A repeated time is an instantaneous step: the
/// first sample of the pair is returned at that exact time and the second
/// one starts the following segment.
#[derive(Debug, Clone)]
pub struct KeyframeTrack<T: Interpolatable> {
    times: Vec<f32>,
    values: Vec<T>, // For CubicSpline, length is times.len() * 3
    interpolation: InterpolationMode,
    easing: Easing,
}

impl<T: Interpolatable> KeyframeTrack<T> {
    pub fn new(
        times: Vec<f32>,
        values: Vec<T>,
        interpolation: InterpolationMode,
    ) -> Result<Self, KeyframeError> {
        if times.is_empty() {
            return Err(KeyframeError::Empty);
        }

        let expected = times.len() * interpolation.values_per_key();
        if values.len() != expected {
            return Err(KeyframeError::LengthMismatch {
                times: times.len(),
                values: values.len(),
                expected,
            });
        }

        if let Some(index) = times.iter().position(|t| !t.is_finite()) {
            return Err(KeyframeError::NonFiniteTime { index });
        }
        if let Some(index) = times.windows(2).position(|w| w[1] < w[0]) {
            return Err(KeyframeError::DecreasingTime { index: index + 1 });
        }

        if let Some(width) = values.first().and_then(Interpolatable::width) {
            if width == 0 {
                return Err(KeyframeError::ZeroWidth);
            }
            for (index, value) in values.iter().enumerate() {
                let found = value.width().unwrap_or(width);
                if found != width {
                    return Err(KeyframeError::InconsistentWidth {
                        index,
                        expected: width,
                        found,
                    });
                }
            }
        }

        Ok(Self {
            times,
            values,
            interpolation,
            easing: Easing::Linear,
        })
    }

    #[must_use]
    pub fn with_easing(mut self, easing: Easing) -> Self {
        self.easing = easing;
        self
    }

    #[inline]
    #[must_use]
    pub fn times(&self) -> &[f32] {
        &self.times
    }

    /// Raw stored values (tangent triplets included for cubic tracks).
    #[inline]
    #[must_use]
    pub fn values(&self) -> &[T] {
        &self.values
    }

    #[inline]
    #[must_use]
    pub fn interpolation(&self) -> InterpolationMode {
        self.interpolation
    }

    #[inline]
    #[must_use]
    pub fn easing(&self) -> Easing {
        self.easing
    }

    /// Number of keyframes.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.times.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    /// Time of the last keyframe.
    #[must_use]
    pub fn duration(&self) -> f32 {
        self.times.last().copied().unwrap_or(0.0)
    }

    /// Keyframe sample at `index` (the value, not a tangent, for cubic tracks).
    #[must_use]
    pub fn keyframe_value(&self, index: usize) -> Option<&T> {
        if index >= self.times.len() {
            return None;
        }
        Some(self.get_value_at(index))
    }

    /// Stateless sampling by binary search.
    #[must_use]
    pub fn sample(&self, time: f32) -> T {
        let bracket = self.clamp_to_range(time).unwrap_or_else(|| {
            let next_idx = self.times.partition_point(|&t| t < time);
            Self::bracket_from_upper(&self.times, next_idx, time)
        });
        self.sample_bracket(bracket, time)
    }

    /// Core optimization: sampling with cursor.
    ///
    /// Monotonic playback resolves in O(1) by scanning a few keyframes around
    /// the cursor. Large jumps (seeking, loop resets) fall back to binary
    /// search. Always agrees with [`sample`](Self::sample).
    pub fn sample_with_cursor(&self, time: f32, cursor: &mut KeyframeCursor) -> T {
        let bracket = self.clamp_to_range(time).unwrap_or_else(|| {
            let next_idx = self.seek(time, cursor);
            Self::bracket_from_upper(&self.times, next_idx, time)
        });
        self.sample_bracket(bracket, time)
    }

    /// Steps 1 and 2 of the lookup: times outside the keyed range clamp to
    /// the first or last sample.
    fn clamp_to_range(&self, time: f32) -> Option<Bracket> {
        let last = self.times.len() - 1;
        if last == 0 || time <= self.times[0] {
            Some(Bracket::Exact(0))
        } else if time >= self.times[last] {
            Some(Bracket::Exact(last))
        } else {
            None
        }
    }

    /// `next_idx` is the first keyframe with `times[next_idx] >= time`.
    fn bracket_from_upper(times: &[f32], next_idx: usize, time: f32) -> Bracket {
        if next_idx == 0 {
            // Only reachable for NaN, which then propagates through interpolation.
            return Bracket::Between(0);
        }
        if times[next_idx] == time {
            Bracket::Exact(next_idx)
        } else {
            Bracket::Between(next_idx - 1)
        }
    }

    /// Finds the first keyframe at or after `time`, seeded from the cursor.
    /// Requires `times[0] < time < times[last]`.
    fn seek(&self, time: f32, cursor: &mut KeyframeCursor) -> usize {
        let times = &self.times;
        let len = times.len();
        let is_upper = |idx: usize| times[idx - 1] < time && time <= times[idx];

        // Safety check: a cursor from another track may be out of bounds
        let start = cursor.last_index.clamp(1, len - 1);

        let found = if time > times[start - 1] {
            // === Case A: Normal playback or fast-forward ===
            (start..len.min(start + MAX_SCAN_OFFSET + 1)).find(|&idx| is_upper(idx))
        } else {
            // === Case B: Reverse playback or small step back ===
            let lowest = start.saturating_sub(MAX_SCAN_OFFSET + 1).max(1);
            (lowest..start).rev().find(|&idx| is_upper(idx))
        };

        // === Case C: Large jump (scrubbing / loop reset) ===
        let next_idx = found.unwrap_or_else(|| times.partition_point(|&t| t < time));

        cursor.last_index = next_idx;
        next_idx
    }

    /// Helper method: unified value accessor.
    /// For Linear/Step, the index is used directly.
    /// For CubicSpline, the value is at index * 3 + 1.
    fn get_value_at(&self, index: usize) -> &T {
        match self.interpolation {
            InterpolationMode::CubicSpline => &self.values[index * 3 + 1],
            InterpolationMode::Linear | InterpolationMode::Step => &self.values[index],
        }
    }

    fn sample_bracket(&self, bracket: Bracket, time: f32) -> T {
        let index = match bracket {
            Bracket::Exact(index) => return self.get_value_at(index).clone(),
            Bracket::Between(index) => index,
        };

        let next_idx = index + 1;
        let t0 = self.times[index];
        let t1 = self.times[next_idx];
        let dt = t1 - t0;

        // Duplicate timestamps: hold the left sample
        if dt <= 0.0 {
            return self.get_value_at(index).clone();
        }

        let t = ease((time - t0) / dt, self.easing);

        match self.interpolation {
            InterpolationMode::Step => self.get_value_at(index).clone(),
            InterpolationMode::Linear => {
                T::interpolate_linear(self.get_value_at(index), self.get_value_at(next_idx), t)
            }
            InterpolationMode::CubicSpline => {
                let i_prev = index * 3;
                let i_next = next_idx * 3;

                let v0 = &self.values[i_prev + 1];
                let out_tangent0 = &self.values[i_prev + 2];
                let in_tangent1 = &self.values[i_next];
                let v1 = &self.values[i_next + 1];

                T::interpolate_cubic(v0, out_tangent0, in_tangent1, v1, t, dt)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::values::MorphWeights;

    fn scalar(times: &[f32], values: &[f32]) -> KeyframeTrack<f32> {
        KeyframeTrack::new(times.to_vec(), values.to_vec(), InterpolationMode::Linear).unwrap()
    }

    #[test]
    fn rejects_malformed_input() {
        let empty = KeyframeTrack::<f32>::new(vec![], vec![], InterpolationMode::Linear);
        assert_eq!(empty.unwrap_err(), KeyframeError::Empty);

        let mismatch = KeyframeTrack::new(vec![0.0, 1.0], vec![0.0_f32], InterpolationMode::Linear);
        assert!(matches!(mismatch, Err(KeyframeError::LengthMismatch { expected: 2, .. })));

        let decreasing =
            KeyframeTrack::new(vec![0.0, 2.0, 1.0], vec![0.0_f32; 3], InterpolationMode::Linear);
        assert_eq!(decreasing.unwrap_err(), KeyframeError::DecreasingTime { index: 2 });

        let nan =
            KeyframeTrack::new(vec![0.0, f32::NAN], vec![0.0_f32; 2], InterpolationMode::Linear);
        assert_eq!(nan.unwrap_err(), KeyframeError::NonFiniteTime { index: 1 });

        let cubic =
            KeyframeTrack::new(vec![0.0, 1.0], vec![0.0_f32; 2], InterpolationMode::CubicSpline);
        assert!(matches!(cubic, Err(KeyframeError::LengthMismatch { expected: 6, .. })));

        let weights = vec![MorphWeights::allocate(0), MorphWeights::allocate(0)];
        let zero_width = KeyframeTrack::new(vec![0.0, 1.0], weights, InterpolationMode::Linear);
        assert_eq!(zero_width.unwrap_err(), KeyframeError::ZeroWidth);
    }

    #[test]
    fn exact_hit_returns_first_of_duplicate_pair() {
        let track = scalar(&[0.0, 1.0, 1.0, 2.0], &[0.0, 5.0, 9.0, 10.0]);
        assert_eq!(track.sample(1.0), 5.0);
        assert!((track.sample(0.5) - 2.5).abs() < 1e-6);
        assert!((track.sample(1.5) - 9.5).abs() < 1e-6);

        let mut cursor = KeyframeCursor::default();
        assert_eq!(track.sample_with_cursor(1.0, &mut cursor), 5.0);
    }

    #[test]
    fn cursor_recovers_from_out_of_bounds_index() {
        let track = scalar(&[0.0, 1.0, 2.0], &[0.0, 10.0, 20.0]);
        let mut cursor = KeyframeCursor { last_index: 99 };
        assert!((track.sample_with_cursor(0.5, &mut cursor) - 5.0).abs() < 1e-6);
        assert_eq!(cursor.last_index, 1);
    }

    #[test]
    fn backward_scan_finds_nearby_segment() {
        let times: Vec<f32> = (0..10).map(|i| i as f32).collect();
        let track = scalar(&times, &times);
        let mut cursor = KeyframeCursor::default();

        for t in [8.5, 7.5, 6.5, 2.5, 2.25] {
            assert!((track.sample_with_cursor(t, &mut cursor) - t).abs() < 1e-6, "t={t}");
        }
    }

    #[test]
    fn nan_time_propagates() {
        let track = scalar(&[0.0, 1.0], &[0.0, 1.0]);
        assert!(track.sample(f32::NAN).is_nan());
    }

    #[test]
    fn easing_reshapes_fraction() {
        let track = scalar(&[0.0, 1.0], &[0.0, 10.0]).with_easing(Easing::EaseIn);
        assert!((track.sample(0.5) - 2.5).abs() < 1e-6);
        assert_eq!(track.sample(1.0), 10.0);
    }
}
