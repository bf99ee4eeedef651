//! # Cadence
//!
//! Keyframe-track evaluation, clip playback and multi-clip blending.
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use cadence::prelude::*;
//!
//! let walk = Arc::new(AnimationClip::from_json(WALK_JSON)?);
//! let run = Arc::new(AnimationClip::from_json(RUN_JSON)?);
//!
//! let mut mixer = AnimationMixer::new();
//! mixer.add_clip(walk, ClipOptions::default())?;
//! mixer.add_clip(run, ClipOptions::default().with_weight(0.0))?;
//! mixer.play("walk")?;
//! mixer.cross_fade("walk", "run", 0.3)?;
//!
//! // Once per frame, from the host render loop:
//! mixer.update(dt, &mut character)?;
//! for event in mixer.drain_events() { /* ... */ }
//! ```

pub use cadence_animation as animation;
pub use cadence_core::{errors, property, value};

pub use cadence_animation::{AnimationAction, AnimationClip, AnimationMixer, LoopMode};
pub use cadence_core::{AnimValue, CadenceError, PropertyBag, PropertyPath, PropertySink, Result};

pub mod prelude {
    pub use cadence_animation::{
        ActionEvent, AnimationAction, AnimationClip, AnimationMixer, ClipData, ClipOptions, Easing,
        InterpolationMode, KeyframeTrack, LoopMode, MixerConfig, MorphWeights, Pose, Track,
        WeightPolicy,
    };
    pub use cadence_core::{AnimValue, CadenceError, PropertyBag, PropertyPath, PropertySink};
}
