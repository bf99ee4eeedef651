//! Clip Serialization
//!
//! [`ClipData`] is the plain, serde-friendly form of an [`AnimationClip`]:
//! clip metadata plus a flat list of tracks whose samples are stored as a
//! single `f32` array (`x, y, z` for vectors, `x, y, z, w` for rotations,
//! `width` consecutive weights for morph tracks, tangent triplets included
//! for cubic tracks).
//!
//! When reading, vector and rotation samples may also be written as
//! `{"x", "y", "z"}` and `{"x", "y", "z", "w"}` records, and the `type` tag
//! may be omitted, in which case it is inferred from the first sample.
//!
//! ```json
//! {
//!   "name": "bounce",
//!   "duration": 2.0,
//!   "loop": true,
//!   "tracks": [
//!     { "name": "position", "type": "vector3",
//!       "times": [0, 1, 2], "values": [0,0,0, 0,1,0, 0,0,0] }
//!   ]
//! }
//! ```

use glam::{Quat, Vec3};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use cadence_core::errors::{CadenceError, Result};
use cadence_core::value::ValueKind;

use crate::action::LoopMode;
use crate::clip::{AnimationClip, Track, TrackData};
use crate::tracks::{InterpolationMode, KeyframeTrack};
use crate::values::{Easing, Interpolatable, MorphWeights};

/// Wire name of a track's value type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackType {
    Number,
    Vector3,
    Quaternion,
    Weights,
}

impl From<ValueKind> for TrackType {
    fn from(kind: ValueKind) -> Self {
        match kind {
            ValueKind::Scalar => Self::Number,
            ValueKind::Vector3 => Self::Vector3,
            ValueKind::Quaternion => Self::Quaternion,
            ValueKind::Weights => Self::Weights,
        }
    }
}

/// One entry of a track's `values` array.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SampleValue {
    Number(f32),
    // Listed before `Vector3` so a `w` component is never silently dropped
    Quaternion { x: f32, y: f32, z: f32, w: f32 },
    Vector3 { x: f32, y: f32, z: f32 },
}

impl From<f32> for SampleValue {
    fn from(value: f32) -> Self {
        Self::Number(value)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackDescriptor {
    pub name: String,
    /// Omitted: inferred from the first sample.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<TrackType>,
    pub times: Vec<f32>,
    pub values: Vec<SampleValue>,
    #[serde(default)]
    pub interpolation: InterpolationMode,
    #[serde(default)]
    pub easing: Easing,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClipData {
    pub name: String,
    /// Omitted: derived from the latest keyframe time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f32>,
    #[serde(default)]
    pub tracks: Vec<TrackDescriptor>,
    /// Accepts a boolean (`true` = loop, `false` = once) or a mode name.
    #[serde(
        rename = "loop",
        default,
        serialize_with = "serialize_loop",
        deserialize_with = "deserialize_loop"
    )]
    pub loop_mode: LoopMode,
    #[serde(default = "default_one")]
    pub time_scale: f32,
    #[serde(default)]
    pub fade_in: f32,
    #[serde(default)]
    pub fade_out: f32,
    #[serde(default = "default_one")]
    pub weight: f32,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_true() -> bool {
    true
}

fn default_one() -> f32 {
    1.0
}

#[derive(Deserialize)]
#[serde(untagged)]
enum LoopSetting {
    Flag(bool),
    Mode(LoopMode),
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn serialize_loop<S: Serializer>(
    mode: &LoopMode,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    match mode {
        LoopMode::Once => serializer.serialize_bool(false),
        LoopMode::Loop => serializer.serialize_bool(true),
        LoopMode::PingPong => mode.serialize(serializer),
    }
}

fn deserialize_loop<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<LoopMode, D::Error> {
    Ok(match LoopSetting::deserialize(deserializer)? {
        LoopSetting::Flag(true) => LoopMode::Loop,
        LoopSetting::Flag(false) => LoopMode::Once,
        LoopSetting::Mode(mode) => mode,
    })
}

// ============================================================================
// Clip -> data
// ============================================================================

fn flatten<T: Interpolatable>(
    track: &KeyframeTrack<T>,
    push: impl Fn(&T, &mut Vec<f32>),
) -> Vec<SampleValue> {
    let mut flat = Vec::with_capacity(track.values().len() * 4);
    for value in track.values() {
        push(value, &mut flat);
    }
    flat.into_iter().map(SampleValue::Number).collect()
}

impl TrackDescriptor {
    #[must_use]
    pub fn from_track(track: &Track) -> Self {
        let values = match &track.data {
            TrackData::Scalar(t) => flatten(t, |v, out| out.push(*v)),
            TrackData::Vector3(t) => flatten(t, |v, out| out.extend_from_slice(&v.to_array())),
            TrackData::Quaternion(t) => flatten(t, |q, out| out.extend_from_slice(&q.to_array())),
            TrackData::MorphWeights(t) => flatten(t, |w, out| out.extend_from_slice(&w.weights)),
        };

        Self {
            name: track.name.to_string(),
            kind: Some(track.kind().into()),
            times: track.data.times().to_vec(),
            values,
            interpolation: track.data.interpolation(),
            easing: track.data.easing(),
            enabled: track.enabled,
        }
    }

    /// The declared track type, or the one implied by the first sample.
    pub fn track_type(&self) -> Result<TrackType> {
        if let Some(kind) = self.kind {
            return Ok(kind);
        }
        match self.values.first() {
            Some(SampleValue::Number(_)) => Ok(TrackType::Number),
            Some(SampleValue::Vector3 { .. }) => Ok(TrackType::Vector3),
            Some(SampleValue::Quaternion { .. }) => Ok(TrackType::Quaternion),
            None => Err(CadenceError::invalid_track(
                self.name.as_str(),
                "track has no values and no type",
            )),
        }
    }

    /// Rebuilds the track, validating the sample array.
    pub fn to_track(&self) -> Result<Track> {
        let kind = self.track_type()?;
        let samples = self.times.len() * self.interpolation.values_per_key();

        let mut track = match kind {
            TrackType::Number => {
                let flat = self.flat_values(kind, None)?;
                self.build(&flat, samples, 1, |c| c[0])?
            }
            TrackType::Vector3 => {
                let flat = self.flat_values(kind, Some(3))?;
                self.build(&flat, samples, 3, Vec3::from_slice)?
            }
            TrackType::Quaternion => {
                let flat = self.flat_values(kind, Some(4))?;
                self.build(&flat, samples, 4, Quat::from_slice)?
            }
            TrackType::Weights => {
                let flat = self.flat_values(kind, None)?;
                if samples == 0 || flat.is_empty() || flat.len() % samples != 0 {
                    return Err(CadenceError::invalid_track(
                        self.name.as_str(),
                        format!(
                            "{} weight values cannot be split evenly across {samples} samples",
                            flat.len()
                        ),
                    ));
                }
                self.build(&flat, samples, flat.len() / samples, MorphWeights::from_slice)?
            }
        };
        track.enabled = self.enabled;
        Ok(track)
    }

    /// Expands records into components. `record_width` is the number of
    /// components a record must have for this track type, if any.
    fn flat_values(&self, kind: TrackType, record_width: Option<usize>) -> Result<Vec<f32>> {
        let mut flat = Vec::with_capacity(self.values.len() * record_width.unwrap_or(1));
        for (index, sample) in self.values.iter().enumerate() {
            match (*sample, record_width) {
                (SampleValue::Number(v), _) => flat.push(v),
                (SampleValue::Vector3 { x, y, z }, Some(3)) => flat.extend_from_slice(&[x, y, z]),
                (SampleValue::Quaternion { x, y, z, w }, Some(4)) => {
                    flat.extend_from_slice(&[x, y, z, w]);
                }
                (SampleValue::Vector3 { .. } | SampleValue::Quaternion { .. }, _) => {
                    return Err(CadenceError::invalid_track(
                        self.name.as_str(),
                        format!(
                            "value {index} is a record of the wrong shape for a {kind:?} track"
                        ),
                    ));
                }
            }
        }
        Ok(flat)
    }

    fn build<T>(
        &self,
        flat: &[f32],
        samples: usize,
        stride: usize,
        decode: impl Fn(&[f32]) -> T,
    ) -> Result<Track>
    where
        T: Interpolatable,
        KeyframeTrack<T>: Into<TrackData>,
    {
        if flat.len() != samples * stride {
            return Err(CadenceError::invalid_track(
                self.name.as_str(),
                format!(
                    "expected {} values ({samples} samples of {stride}), found {}",
                    samples * stride,
                    flat.len()
                ),
            ));
        }

        let values = flat.chunks_exact(stride).map(decode).collect();
        let keyframes = KeyframeTrack::new(self.times.clone(), values, self.interpolation)
            .map_err(|e| CadenceError::invalid_track(self.name.as_str(), e.to_string()))?
            .with_easing(self.easing);
        Track::new(&self.name, keyframes)
    }
}

impl AnimationClip {
    /// Flattens the clip into its serializable form.
    #[must_use]
    pub fn to_data(&self) -> ClipData {
        ClipData {
            name: self.name.clone(),
            duration: Some(self.duration),
            tracks: self.tracks().iter().map(TrackDescriptor::from_track).collect(),
            loop_mode: self.loop_mode,
            time_scale: self.time_scale,
            fade_in: self.fade_in,
            fade_out: self.fade_out,
            weight: self.weight,
            enabled: self.enabled,
        }
    }

    pub fn from_data(data: &ClipData) -> Result<Self> {
        let tracks = data
            .tracks
            .iter()
            .map(TrackDescriptor::to_track)
            .collect::<Result<Vec<_>>>()?;

        let mut clip = Self::new(data.name.clone(), tracks)?
            .with_loop_mode(data.loop_mode)
            .with_time_scale(data.time_scale)
            .with_fade(data.fade_in, data.fade_out)
            .with_weight(data.weight)
            .with_enabled(data.enabled);

        if let Some(duration) = data.duration {
            clip = clip.with_duration(duration);
        }
        Ok(clip)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.to_data())?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let data: ClipData = serde_json::from_str(json)?;
        Self::from_data(&data)
    }
}
