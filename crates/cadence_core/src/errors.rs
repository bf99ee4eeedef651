//! Error Types
//!
//! This module defines the error types used throughout the engine.
//!
//! # Overview
//!
//! The main error type [`CadenceError`] covers all failure modes including:
//! - Malformed keyframe data rejected at construction time
//! - Mixer calls that reference clips which were never registered
//! - Runtime blending failures (two clips driving one property with different types)
//! - Clip (de)serialization errors
//!
//! Numeric degeneracy (NaN propagation, zero-length clips, duplicate keyframe
//! times) is *not* an error: those cases have defined fallback behavior.
//!
//! # Usage
//!
//! All fallible public APIs return [`Result<T>`], an alias for
//! `std::result::Result<T, CadenceError>`.
//!
//! ```rust,ignore
//! use cadence::errors::{CadenceError, Result};
//!
//! fn start(mixer: &mut AnimationMixer) -> Result<()> {
//!     mixer.play("walk")?;
//!     Ok(())
//! }
//! ```

use thiserror::Error;

use crate::value::ValueKind;

/// The main error type for the Cadence engine.
#[derive(Error, Debug)]
pub enum CadenceError {
    // ========================================================================
    // Construction Errors
    // ========================================================================
    /// Keyframe data could not be turned into a track or clip.
    #[error("Invalid track data for '{track}': {reason}")]
    InvalidTrackData {
        /// Name of the offending track (or clip, for clip-level problems)
        track: String,
        /// What was wrong with the data
        reason: String,
    },

    // ========================================================================
    // Mixer Errors
    // ========================================================================
    /// A mixer operation referenced a clip name that was never registered.
    #[error("Unknown clip: {0}")]
    UnknownClip(String),

    /// `add_clip` was called with a name that is already registered.
    #[error("Clip already registered: {0}")]
    DuplicateClip(String),

    /// Two active clips animate the same property with different value types.
    #[error("Channel '{track}' type mismatch: expected {expected}, found {found}")]
    ChannelTypeMismatch {
        /// Property path of the channel
        track: String,
        /// Kind established by the first contributing clip
        expected: ValueKind,
        /// Kind supplied by the conflicting clip
        found: ValueKind,
    },

    // ========================================================================
    // Format & Parsing Errors
    // ========================================================================
    /// JSON encode/decode error for clip data.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl CadenceError {
    /// Shorthand for building an [`InvalidTrackData`](Self::InvalidTrackData) error.
    pub fn invalid_track(track: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidTrackData {
            track: track.into(),
            reason: reason.into(),
        }
    }
}

/// Alias for `Result<T, CadenceError>`.
pub type Result<T> = std::result::Result<T, CadenceError>;
