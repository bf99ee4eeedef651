use std::sync::Arc;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use cadence_core::property::PropertySink;

use crate::clip::{AnimationClip, amplitude_at};
use crate::pose::Pose;
use crate::tracks::KeyframeCursor;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopMode {
    Once,
    #[default]
    Loop,
    PingPong,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackState {
    #[default]
    Stopped,
    Playing,
    Paused,
}

/// Playback transitions observed by an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionEvent {
    /// `play` was called.
    Started,
    /// Time wrapped around the clip end (or bounced, for ping-pong).
    Looped,
    /// A non-looping action ran off either end of the clip.
    Finished,
}

pub type ActionEvents = SmallVec<[ActionEvent; 2]>;

/// One playing instance of a clip.
///
/// The clip itself is shared and immutable; the action owns the playback
/// cursor, so any number of actions (possibly in different mixers) can play
/// the same clip independently. Playback settings start as copies of the
/// clip's defaults and may be changed per action.
///
/// Events are kept for one [`update`](Self::update): each update first drops
/// whatever was already queued when the previous update returned.
#[derive(Debug, Clone)]
pub struct AnimationAction {
    clip: Arc<AnimationClip>,

    time: f32,
    /// Unfolded position in `[0, 2 * duration)` for ping-pong playback.
    ping_pong_phase: f32,
    state: PlaybackState,

    pub time_scale: f32,
    pub weight: f32,
    pub fade_in: f32,
    pub fade_out: f32,
    loop_mode: LoopMode,
    pub enabled: bool,

    pub(crate) track_cursors: Vec<KeyframeCursor>,
    events: ActionEvents,
    /// Events queued before the last update returned.
    stale_events: usize,
}

impl AnimationAction {
    #[must_use]
    pub fn new(clip: Arc<AnimationClip>) -> Self {
        let track_count = clip.tracks().len();
        Self {
            time: 0.0,
            ping_pong_phase: 0.0,
            state: PlaybackState::Stopped,
            time_scale: clip.time_scale,
            weight: clip.weight,
            fade_in: clip.fade_in,
            fade_out: clip.fade_out,
            loop_mode: clip.loop_mode,
            enabled: clip.enabled,
            // Initialize corresponding number of cursors
            track_cursors: vec![KeyframeCursor::default(); track_count],
            events: ActionEvents::new(),
            stale_events: 0,
            clip,
        }
    }

    #[must_use]
    pub fn clip(&self) -> &Arc<AnimationClip> {
        &self.clip
    }

    #[inline]
    #[must_use]
    pub fn time(&self) -> f32 {
        self.time
    }

    #[inline]
    #[must_use]
    pub fn state(&self) -> PlaybackState {
        self.state
    }

    #[inline]
    #[must_use]
    pub fn is_playing(&self) -> bool {
        self.state == PlaybackState::Playing
    }

    #[inline]
    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.state == PlaybackState::Paused
    }

    #[inline]
    #[must_use]
    pub fn loop_mode(&self) -> LoopMode {
        self.loop_mode
    }

    /// Changes the loop mode mid-playback. Playback continues from the
    /// current time, heading forward.
    pub fn set_loop_mode(&mut self, loop_mode: LoopMode) {
        self.loop_mode = loop_mode;
        self.ping_pong_phase = self.time;
    }

    /// Starts (or restarts) playback at `start_time`.
    pub fn play(&mut self, start_time: f32) {
        self.set_time(start_time);
        self.state = PlaybackState::Playing;
        self.push_event(ActionEvent::Started);
    }

    pub fn pause(&mut self) {
        if self.state == PlaybackState::Playing {
            self.state = PlaybackState::Paused;
        }
    }

    pub fn resume(&mut self) {
        if self.state == PlaybackState::Paused {
            self.state = PlaybackState::Playing;
        }
    }

    pub fn stop(&mut self) {
        self.state = PlaybackState::Stopped;
        self.set_time(0.0);
    }

    /// Seeks without changing the playback state. The time is folded into
    /// the clip range according to the loop mode.
    pub fn set_time(&mut self, time: f32) {
        let duration = self.clip.duration;
        if duration <= 0.0 || !time.is_finite() {
            self.time = 0.0;
            self.ping_pong_phase = 0.0;
            return;
        }

        match self.loop_mode {
            LoopMode::Once => self.time = time.clamp(0.0, duration),
            LoopMode::Loop => self.time = wrap(time, duration),
            LoopMode::PingPong => {
                self.ping_pong_phase = wrap(time, duration * 2.0);
                self.time = fold(self.ping_pong_phase, duration);
            }
        }
    }

    /// Core logic: advance time.
    pub fn update(&mut self, dt: f32) {
        let stale = self.stale_events.min(self.events.len());
        self.events.drain(..stale);

        self.advance(dt);
        self.stale_events = self.events.len();
    }

    fn advance(&mut self, dt: f32) {
        if self.state != PlaybackState::Playing || !self.enabled {
            return;
        }

        let duration = self.clip.duration;
        if duration <= 0.0 {
            // Zero-length clips never advance
            self.time = 0.0;
            return;
        }

        // 1. Accumulate time
        let delta = dt * self.time_scale;
        if !delta.is_finite() {
            log::warn!(
                "AnimationAction '{}': ignoring non-finite time step {delta}",
                self.clip.name
            );
            return;
        }

        // 2. Handle loop mode
        match self.loop_mode {
            LoopMode::Once => {
                let raw = self.time + delta;
                if raw > duration {
                    self.time = duration;
                    self.finish();
                } else if raw < 0.0 {
                    self.time = 0.0;
                    self.finish();
                } else {
                    self.time = raw;
                }
            }
            LoopMode::Loop => {
                let wrapped = wrap(self.time + delta, duration);
                // A wrap moves time against the direction of playback
                let wrapped_back = if delta >= 0.0 {
                    wrapped < self.time
                } else {
                    wrapped > self.time
                };
                self.time = wrapped;
                if wrapped_back || delta.abs() >= duration {
                    self.push_event(ActionEvent::Looped);
                }
            }
            LoopMode::PingPong => {
                let phase = wrap(self.ping_pong_phase + delta, duration * 2.0);
                // The forward half of the phase is [0, duration)
                let bounced = (phase >= duration) != (self.ping_pong_phase >= duration);
                self.ping_pong_phase = phase;
                self.time = fold(phase, duration);
                if bounced || delta.abs() >= duration {
                    self.push_event(ActionEvent::Looped);
                }
            }
        }
    }

    /// Evaluates the clip at the current time using this action's cursors
    /// and envelope.
    pub fn evaluate(&mut self) -> Pose {
        let time = self.time;
        let amplitude = amplitude_at(
            time,
            self.clip.duration,
            self.fade_in,
            self.fade_out,
            self.weight,
        );
        let cursors = &mut self.track_cursors;
        self.clip
            .sample_tracks(amplitude, |index, data| {
                data.sample_with_cursor(time, &mut cursors[index])
            })
    }

    /// [`evaluate`](Self::evaluate), then write the result into `target`.
    pub fn evaluate_into<S: PropertySink + ?Sized>(&mut self, target: &mut S) -> Pose {
        let pose = self.evaluate();
        pose.apply_to(target);
        pose
    }

    /// Takes the events fired by the last update and by any control calls
    /// made since.
    pub fn drain_events(&mut self) -> ActionEvents {
        self.stale_events = 0;
        std::mem::take(&mut self.events)
    }

    fn finish(&mut self) {
        self.state = PlaybackState::Stopped;
        self.push_event(ActionEvent::Finished);
    }

    fn push_event(&mut self, event: ActionEvent) {
        log::trace!("AnimationAction '{}': {event:?} at t={}", self.clip.name, self.time);
        self.events.push(event);
    }
}

/// Wraps `time` into `[0, period)`.
fn wrap(time: f32, period: f32) -> f32 {
    let t = time.rem_euclid(period);
    // rem_euclid can round up to `period` for tiny negative inputs
    if t >= period { 0.0 } else { t }
}

/// Maps a ping-pong phase in `[0, 2 * duration)` onto `[0, duration]`.
fn fold(phase: f32, duration: f32) -> f32 {
    if phase > duration { duration * 2.0 - phase } else { phase }
}
