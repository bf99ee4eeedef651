//! Keyframe animation for the Cadence engine.
//!
//! Data flows leaf-first:
//!
//! - [`KeyframeTrack`] stores one property's samples and answers "value at
//!   time t" with cursor-accelerated lookup.
//! - [`AnimationClip`] bundles named tracks with playback defaults and
//!   round-trips through [`ClipData`].
//! - [`AnimationAction`] is one playing instance of a clip: time, loop
//!   handling, pause/stop and playback events.
//! - [`AnimationMixer`] advances several actions per tick, blends their
//!   output by weight (with timed cross-fades) and writes it to a
//!   [`PropertySink`](cadence_core::PropertySink).

pub mod values;
pub mod tracks;
pub mod clip;
pub mod data;
pub mod pose;
pub mod action;
pub mod mixer;

pub use action::{ActionEvent, ActionEvents, AnimationAction, LoopMode, PlaybackState};
pub use clip::{AnimationClip, Track, TrackData, amplitude_at};
pub use data::{ClipData, SampleValue, TrackDescriptor, TrackType};
pub use mixer::{
    ActionKey, AnimationMixer, ClipOptions, FailurePolicy, MixerConfig, MixerEvent, WeightPolicy,
};
pub use pose::Pose;
pub use tracks::{InterpolationMode, KeyframeCursor, KeyframeError, KeyframeTrack};
pub use values::{
    Easing, Interpolatable, MorphWeights, ease, linear, quaternion_slerp, vector3_lerp,
};
