use glam::{Quat, Vec3};
use rustc_hash::FxHashMap;

use cadence_core::errors::{CadenceError, Result};
use cadence_core::property::{PropertyPath, PropertySink};
use cadence_core::value::{AnimValue, ValueKind};

use crate::action::LoopMode;
use crate::pose::Pose;
use crate::tracks::{InterpolationMode, KeyframeCursor, KeyframeTrack};
use crate::values::{Easing, Interpolatable, MorphWeights};

#[derive(Debug, Clone)]
pub enum TrackData {
    Scalar(KeyframeTrack<f32>),
    Vector3(KeyframeTrack<Vec3>),
    Quaternion(KeyframeTrack<Quat>),
    MorphWeights(KeyframeTrack<MorphWeights>),
}

macro_rules! each_track {
    ($data:expr, $track:ident => $body:expr) => {
        match $data {
            TrackData::Scalar($track) => $body,
            TrackData::Vector3($track) => $body,
            TrackData::Quaternion($track) => $body,
            TrackData::MorphWeights($track) => $body,
        }
    };
}

impl TrackData {
    #[must_use]
    pub fn kind(&self) -> ValueKind {
        match self {
            Self::Scalar(_) => ValueKind::Scalar,
            Self::Vector3(_) => ValueKind::Vector3,
            Self::Quaternion(_) => ValueKind::Quaternion,
            Self::MorphWeights(_) => ValueKind::Weights,
        }
    }

    #[must_use]
    pub fn times(&self) -> &[f32] {
        each_track!(self, t => t.times())
    }

    #[must_use]
    pub fn duration(&self) -> f32 {
        each_track!(self, t => t.duration())
    }

    #[must_use]
    pub fn interpolation(&self) -> InterpolationMode {
        each_track!(self, t => t.interpolation())
    }

    #[must_use]
    pub fn easing(&self) -> Easing {
        each_track!(self, t => t.easing())
    }

    #[must_use]
    pub fn sample(&self, time: f32) -> AnimValue {
        each_track!(self, t => t.sample(time).into_value())
    }

    pub fn sample_with_cursor(&self, time: f32, cursor: &mut KeyframeCursor) -> AnimValue {
        each_track!(self, t => t.sample_with_cursor(time, cursor).into_value())
    }
}

impl From<KeyframeTrack<f32>> for TrackData {
    fn from(track: KeyframeTrack<f32>) -> Self {
        Self::Scalar(track)
    }
}

impl From<KeyframeTrack<Vec3>> for TrackData {
    fn from(track: KeyframeTrack<Vec3>) -> Self {
        Self::Vector3(track)
    }
}

impl From<KeyframeTrack<Quat>> for TrackData {
    fn from(track: KeyframeTrack<Quat>) -> Self {
        Self::Quaternion(track)
    }
}

impl From<KeyframeTrack<MorphWeights>> for TrackData {
    fn from(track: KeyframeTrack<MorphWeights>) -> Self {
        Self::MorphWeights(track)
    }
}

/// A named property and its keyframes.
#[derive(Debug, Clone)]
pub struct Track {
    pub name: PropertyPath,
    pub enabled: bool,
    pub data: TrackData,
}

impl Track {
    pub fn new(name: &str, data: impl Into<TrackData>) -> Result<Self> {
        Ok(Self {
            name: PropertyPath::parse(name)?,
            enabled: true,
            data: data.into(),
        })
    }

    /// Builds a track from raw keyframes, labelling any rejection with `name`.
    pub fn from_keyframes<T>(
        name: &str,
        times: Vec<f32>,
        values: Vec<T>,
        interpolation: InterpolationMode,
    ) -> Result<Self>
    where
        T: Interpolatable,
        KeyframeTrack<T>: Into<TrackData>,
    {
        let track = KeyframeTrack::new(times, values, interpolation)
            .map_err(|e| CadenceError::invalid_track(name, e.to_string()))?;
        Self::new(name, track)
    }

    pub fn scalar(name: &str, times: Vec<f32>, values: Vec<f32>) -> Result<Self> {
        Self::from_keyframes(name, times, values, InterpolationMode::Linear)
    }

    pub fn vector3(name: &str, times: Vec<f32>, values: Vec<Vec3>) -> Result<Self> {
        Self::from_keyframes(name, times, values, InterpolationMode::Linear)
    }

    pub fn quaternion(name: &str, times: Vec<f32>, values: Vec<Quat>) -> Result<Self> {
        Self::from_keyframes(name, times, values, InterpolationMode::Linear)
    }

    pub fn morph_weights(name: &str, times: Vec<f32>, values: Vec<MorphWeights>) -> Result<Self> {
        Self::from_keyframes(name, times, values, InterpolationMode::Linear)
    }

    #[must_use]
    pub fn kind(&self) -> ValueKind {
        self.data.kind()
    }
}

/// Fade envelope and weight multiplier at `time`.
///
/// Fade-in ramps `0 -> 1` over `[0, fade_in)`, fade-out ramps `1 -> 0` over
/// the last `fade_out` seconds, and both are multiplied by `weight`.
#[must_use]
pub fn amplitude_at(time: f32, duration: f32, fade_in: f32, fade_out: f32, weight: f32) -> f32 {
    let mut factor = weight;
    if fade_in > 0.0 && time < fade_in {
        factor *= (time / fade_in).max(0.0);
    }
    if fade_out > 0.0 {
        let remaining = duration - time;
        if remaining < fade_out {
            factor *= (remaining / fade_out).max(0.0);
        }
    }
    factor
}

/// A named bundle of tracks plus the playback defaults that actions created
/// from it start with.
///
/// Clips are immutable once built and are shared between actions through
/// `Arc`; all playback state lives on [`AnimationAction`](crate::AnimationAction).
#[derive(Debug, Clone)]
pub struct AnimationClip {
    pub name: String,
    pub duration: f32,
    tracks: Vec<Track>,
    track_index: FxHashMap<PropertyPath, usize>,

    pub loop_mode: LoopMode,
    pub time_scale: f32,
    pub fade_in: f32,
    pub fade_out: f32,
    pub weight: f32,
    pub enabled: bool,
}

impl AnimationClip {
    /// Builds a clip whose duration is the latest keyframe time across all
    /// tracks. Track names must be unique within a clip.
    pub fn new(name: impl Into<String>, tracks: Vec<Track>) -> Result<Self> {
        let name = name.into();

        let mut track_index = FxHashMap::default();
        track_index.reserve(tracks.len());
        for (index, track) in tracks.iter().enumerate() {
            if track_index.insert(track.name.clone(), index).is_some() {
                return Err(CadenceError::invalid_track(
                    track.name.as_str(),
                    format!("duplicate track name in clip '{name}'"),
                ));
            }
        }

        let duration = tracks
            .iter()
            .map(|t| t.data.duration())
            .fold(0.0_f32, f32::max);

        Ok(Self {
            name,
            duration,
            tracks,
            track_index,
            loop_mode: LoopMode::default(),
            time_scale: 1.0,
            fade_in: 0.0,
            fade_out: 0.0,
            weight: 1.0,
            enabled: true,
        })
    }

    /// Overrides the derived duration. Negative or NaN values become zero.
    #[must_use]
    pub fn with_duration(mut self, duration: f32) -> Self {
        self.duration = duration.max(0.0);
        self
    }

    #[must_use]
    pub fn with_loop_mode(mut self, loop_mode: LoopMode) -> Self {
        self.loop_mode = loop_mode;
        self
    }

    #[must_use]
    pub fn with_time_scale(mut self, time_scale: f32) -> Self {
        self.time_scale = time_scale;
        self
    }

    #[must_use]
    pub fn with_fade(mut self, fade_in: f32, fade_out: f32) -> Self {
        self.fade_in = fade_in;
        self.fade_out = fade_out;
        self
    }

    #[must_use]
    pub fn with_weight(mut self, weight: f32) -> Self {
        self.weight = weight;
        self
    }

    #[must_use]
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    #[inline]
    #[must_use]
    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    #[must_use]
    pub fn track(&self, name: &str) -> Option<&Track> {
        self.track_index.get(name).map(|&i| &self.tracks[i])
    }

    /// Enables or disables a track; returns `false` if no such track exists.
    pub fn set_track_enabled(&mut self, name: &str, enabled: bool) -> bool {
        match self.track_index.get(name) {
            Some(&i) => {
                self.tracks[i].enabled = enabled;
                true
            }
            None => false,
        }
    }

    /// Every keyframe time used by any track, sorted and deduplicated.
    #[must_use]
    pub fn key_times(&self) -> Vec<f32> {
        let mut times: Vec<f32> = self
            .tracks
            .iter()
            .flat_map(|t| t.data.times().iter().copied())
            .collect();
        times.sort_by(f32::total_cmp);
        times.dedup();
        times
    }

    /// Evaluates every enabled track at `time` using the clip's own fade and
    /// weight settings.
    #[must_use]
    pub fn evaluate(&self, time: f32) -> Pose {
        let amplitude = amplitude_at(time, self.duration, self.fade_in, self.fade_out, self.weight);
        self.sample_tracks(amplitude, |_, data| data.sample(time))
    }

    /// [`evaluate`](Self::evaluate), then write the result into `target`.
    pub fn evaluate_into<S: PropertySink + ?Sized>(&self, time: f32, target: &mut S) -> Pose {
        let pose = self.evaluate(time);
        pose.apply_to(target);
        pose
    }

    /// Samples enabled tracks via `sample(track_index, data)` and applies the
    /// amplitude to scalar and array channels.
    pub(crate) fn sample_tracks<F>(&self, amplitude: f32, mut sample: F) -> Pose
    where
        F: FnMut(usize, &TrackData) -> AnimValue,
    {
        let mut pose = Pose::with_capacity(self.tracks.len());
        for (index, track) in self.tracks.iter().enumerate() {
            if !track.enabled {
                continue;
            }
            let mut value = sample(index, &track.data);
            value.scale_amplitude(amplitude);
            pose.push(track.name.clone(), value);
        }
        pose
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fade_envelope() {
        assert_eq!(amplitude_at(1.0, 4.0, 2.0, 0.0, 1.0), 0.5);
        assert_eq!(amplitude_at(2.0, 4.0, 2.0, 0.0, 1.0), 1.0);
        assert_eq!(amplitude_at(3.5, 4.0, 0.0, 1.0, 1.0), 0.5);
        assert_eq!(amplitude_at(4.0, 4.0, 0.0, 1.0, 1.0), 0.0);
        assert_eq!(amplitude_at(2.0, 4.0, 0.0, 0.0, 0.25), 0.25);
    }

    #[test]
    fn duplicate_track_names_are_rejected() {
        let a = Track::scalar("opacity", vec![0.0], vec![1.0]).unwrap();
        let b = Track::scalar("opacity", vec![0.0], vec![0.0]).unwrap();
        let err = AnimationClip::new("clip", vec![a, b]).unwrap_err();
        assert!(matches!(err, CadenceError::InvalidTrackData { .. }));
    }

    #[test]
    fn disabled_tracks_are_skipped() {
        let a = Track::scalar("a", vec![0.0], vec![1.0]).unwrap();
        let b = Track::scalar("b", vec![0.0], vec![2.0]).unwrap();
        let mut clip = AnimationClip::new("clip", vec![a, b]).unwrap();
        assert!(clip.set_track_enabled("b", false));
        assert!(!clip.set_track_enabled("missing", false));

        let pose = clip.evaluate(0.0);
        assert_eq!(pose.len(), 1);
        assert_eq!(pose.get_scalar("a"), Some(1.0));
        assert!(pose.get("b").is_none());
    }

    #[test]
    fn key_times_are_merged() {
        let a = Track::scalar("a", vec![0.0, 1.0], vec![0.0, 1.0]).unwrap();
        let b = Track::scalar("b", vec![0.5, 1.0, 3.0], vec![0.0, 1.0, 2.0]).unwrap();
        let clip = AnimationClip::new("clip", vec![a, b]).unwrap();
        assert_eq!(clip.key_times(), vec![0.0, 0.5, 1.0, 3.0]);
        assert_eq!(clip.duration, 3.0);
    }
}
