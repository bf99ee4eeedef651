//! Animation Mixer Tests
//!
//! Tests for:
//! - Clip registry: add/uncache, duplicate and unknown names
//! - Weighted compositing (normalized and raw) and rotation slerp chains
//! - Cross-fades: endpoint, midpoint, replacement and cancellation
//! - Channel type mismatches under Isolate and Abort policies
//! - Event queue draining and reacting after the tick
//! - Writing into a host-defined PropertySink

use std::sync::Arc;

use anyhow::Result;
use glam::{Quat, Vec3};

use cadence::animation::{
    ActionEvent, AnimationClip, AnimationMixer, ClipOptions, FailurePolicy, LoopMode, MixerConfig,
    MixerEvent, PlaybackState, Track, WeightPolicy,
};
use cadence::{AnimValue, CadenceError, PropertyBag, PropertyPath, PropertySink};

const EPSILON: f32 = 1e-3;

fn approx(a: f32, b: f32) -> bool {
    (a - b).abs() < EPSILON
}

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn constant_clip(name: &str, track: &str, value: f32) -> Arc<AnimationClip> {
    let track = Track::scalar(track, vec![0.0, 2.0], vec![value, value]).unwrap();
    Arc::new(AnimationClip::new(name, vec![track]).unwrap())
}

fn ramp_clip(name: &str, duration: f32, loop_mode: LoopMode) -> Arc<AnimationClip> {
    let track = Track::scalar("x", vec![0.0, duration], vec![0.0, 10.0]).unwrap();
    Arc::new(
        AnimationClip::new(name, vec![track])
            .unwrap()
            .with_loop_mode(loop_mode),
    )
}

/// A host object with typed fields instead of a generic bag.
#[derive(Debug, Default)]
struct Character {
    position: Vec3,
    rotation: Quat,
    opacity: f32,
    writes: Vec<String>,
}

impl PropertySink for Character {
    fn set_property(&mut self, path: &PropertyPath, value: &AnimValue) {
        match (path.as_str(), value) {
            ("position", AnimValue::Vector3(v)) => self.position = *v,
            ("rotation", AnimValue::Quaternion(q)) => self.rotation = *q,
            ("material.opacity", AnimValue::Scalar(s)) => self.opacity = *s,
            _ => {}
        }
        self.writes.push(path.to_string());
    }
}

// ============================================================================
// Registry
// ============================================================================

#[test]
fn mixer_unknown_clip_errors() {
    let mut mixer = AnimationMixer::new();
    mixer.add_clip(constant_clip("idle", "x", 1.0), ClipOptions::default()).unwrap();

    assert!(matches!(
        mixer.play("missing"),
        Err(CadenceError::UnknownClip(name)) if name == "missing"
    ));
    assert!(matches!(mixer.cross_fade("idle", "missing", 1.0), Err(CadenceError::UnknownClip(_))));
    assert!(matches!(mixer.cross_fade("missing", "idle", 1.0), Err(CadenceError::UnknownClip(_))));
    assert!(matches!(mixer.stop("missing"), Err(CadenceError::UnknownClip(_))));
    assert!(matches!(mixer.set_weight("missing", 0.5), Err(CadenceError::UnknownClip(_))));

    // A failed call changes nothing
    assert!(!mixer.is_active("idle"));
    assert!(!mixer.is_cross_fading());
}

#[test]
fn mixer_duplicate_clip_name() {
    let mut mixer = AnimationMixer::new();
    let clip = constant_clip("walk", "x", 1.0);
    mixer.add_clip(Arc::clone(&clip), ClipOptions::default()).unwrap();

    let err = mixer.add_clip(Arc::clone(&clip), ClipOptions::default()).unwrap_err();
    assert!(matches!(err, CadenceError::DuplicateClip(name) if name == "walk"));

    // Same clip, different registry name
    mixer.add_clip(clip, ClipOptions::named("walk_copy")).unwrap();
    assert_eq!(mixer.clip_names().collect::<Vec<_>>(), vec!["walk", "walk_copy"]);
}

#[test]
fn mixer_uncache_clip() -> Result<()> {
    let mut mixer = AnimationMixer::new();
    mixer.add_clip(constant_clip("a", "x", 0.0), ClipOptions::default())?;
    mixer.add_clip(constant_clip("b", "x", 10.0), ClipOptions::default())?;
    mixer.play("a")?;
    mixer.cross_fade("a", "b", 1.0)?;

    let clip = mixer.uncache_clip("b")?;
    assert_eq!(clip.name, "b");
    assert!(!mixer.is_cross_fading(), "fade involving an uncached clip is cancelled");
    assert!(matches!(mixer.play("b"), Err(CadenceError::UnknownClip(_))));
    assert!(mixer.action("b").is_none());

    // Re-registering under the freed name works
    mixer.add_clip(clip, ClipOptions::default())?;
    Ok(())
}

#[test]
fn mixer_weight_is_clamped() -> Result<()> {
    let mut mixer = AnimationMixer::new();
    mixer.add_clip(constant_clip("a", "x", 0.0), ClipOptions::default().with_weight(3.0))?;
    assert_eq!(mixer.weight("a")?, 1.0);

    mixer.set_weight("a", -0.5)?;
    assert_eq!(mixer.weight("a")?, 0.0);
    mixer.set_weight("a", 0.3)?;
    assert!(approx(mixer.weight("a")?, 0.3));
    Ok(())
}

// ============================================================================
// Compositing
// ============================================================================

#[test]
fn mixer_single_clip_passthrough() -> Result<()> {
    let mut mixer = AnimationMixer::new();
    mixer.add_clip(ramp_clip("ramp", 2.0, LoopMode::Loop), ClipOptions::default())?;
    mixer.play("ramp")?;

    let mut bag = PropertyBag::new();
    mixer.update(0.5, &mut bag)?;
    assert!(approx(bag.get_scalar("x").unwrap(), 2.5));

    mixer.update(0.5, &mut bag)?;
    assert!(approx(bag.get_scalar("x").unwrap(), 5.0));
    Ok(())
}

#[test]
fn mixer_inactive_clips_are_not_written() -> Result<()> {
    let mut mixer = AnimationMixer::new();
    mixer.add_clip(constant_clip("a", "x", 4.0), ClipOptions::default())?;
    mixer.add_clip(constant_clip("b", "y", 9.0), ClipOptions::default())?;
    mixer.play("a")?;

    let mut bag = PropertyBag::new();
    mixer.update(0.1, &mut bag)?;
    assert_eq!(bag.get_scalar("x"), Some(4.0));
    assert!(!bag.contains("y"));
    Ok(())
}

#[test]
fn mixer_zero_weight_clip_contributes_nothing() -> Result<()> {
    let mut mixer = AnimationMixer::new();
    mixer.add_clip(constant_clip("a", "x", 4.0), ClipOptions::default())?;
    mixer.add_clip(constant_clip("b", "x", 100.0), ClipOptions::default().with_weight(0.0))?;
    mixer.play("a")?;
    mixer.play("b")?;

    let mut bag = PropertyBag::new();
    mixer.update(0.1, &mut bag)?;
    assert!(approx(bag.get_scalar("x").unwrap(), 4.0));
    Ok(())
}

#[test]
fn mixer_raw_policy_does_not_normalize() -> Result<()> {
    let mut mixer = AnimationMixer::with_config(MixerConfig {
        weight_policy: WeightPolicy::Raw,
        ..Default::default()
    });
    mixer.add_clip(constant_clip("a", "x", 10.0), ClipOptions::default().with_weight(0.5))?;
    mixer.play("a")?;

    let mut bag = PropertyBag::new();
    mixer.update(0.1, &mut bag)?;
    assert!(approx(bag.get_scalar("x").unwrap(), 5.0));

    mixer.config_mut().weight_policy = WeightPolicy::Normalized;
    mixer.update(0.1, &mut bag)?;
    assert!(approx(bag.get_scalar("x").unwrap(), 10.0));
    Ok(())
}

#[test]
fn mixer_blends_rotations_and_vectors() -> Result<()> {
    let rest = AnimationClip::new(
        "rest",
        vec![
            Track::quaternion("rotation", vec![0.0, 1.0], vec![Quat::IDENTITY; 2])?,
            Track::vector3("position", vec![0.0, 1.0], vec![Vec3::ZERO; 2])?,
        ],
    )?;
    let turned = AnimationClip::new(
        "turned",
        vec![
            Track::quaternion("rotation", vec![0.0, 1.0], vec![Quat::from_rotation_z(1.0); 2])?,
            Track::vector3("position", vec![0.0, 1.0], vec![Vec3::new(2.0, 4.0, 6.0); 2])?,
        ],
    )?;

    let mut mixer = AnimationMixer::new();
    mixer.add_clip(Arc::new(rest), ClipOptions::default().with_weight(0.5))?;
    mixer.add_clip(Arc::new(turned), ClipOptions::default().with_weight(0.5))?;
    mixer.play("rest")?;
    mixer.play("turned")?;

    let mut character = Character::default();
    mixer.update(0.25, &mut character)?;

    assert!(character.position.abs_diff_eq(Vec3::new(1.0, 2.0, 3.0), EPSILON));
    assert!(character.rotation.angle_between(Quat::from_rotation_z(0.5)) < EPSILON);
    assert!(approx(character.rotation.length(), 1.0));
    Ok(())
}

#[test]
fn mixer_paused_clip_still_composites() -> Result<()> {
    let mut mixer = AnimationMixer::new();
    mixer.add_clip(ramp_clip("ramp", 2.0, LoopMode::Loop), ClipOptions::default())?;
    mixer.play("ramp")?;

    let mut bag = PropertyBag::new();
    mixer.update(1.0, &mut bag)?;
    mixer.pause("ramp")?;
    mixer.update(0.5, &mut bag)?;

    assert!(approx(bag.get_scalar("x").unwrap(), 5.0));
    assert_eq!(mixer.action("ramp").unwrap().state(), PlaybackState::Paused);

    mixer.resume("ramp")?;
    mixer.update(0.5, &mut bag)?;
    assert!(approx(bag.get_scalar("x").unwrap(), 7.5));
    Ok(())
}

#[test]
fn mixer_non_finite_dt_keeps_time() -> Result<()> {
    init_logging();
    let mut mixer = AnimationMixer::new();
    mixer.add_clip(ramp_clip("ramp", 2.0, LoopMode::Loop), ClipOptions::default())?;
    mixer.play("ramp")?;

    let mut bag = PropertyBag::new();
    mixer.update(0.5, &mut bag)?;
    mixer.update(f32::NAN, &mut bag)?;
    mixer.update(f32::INFINITY, &mut bag)?;

    assert!(approx(mixer.action("ramp").unwrap().time(), 0.5));
    assert!(approx(bag.get_scalar("x").unwrap(), 2.5));
    Ok(())
}

// ============================================================================
// Channel Type Mismatch
// ============================================================================

fn mismatched_mixer(failure_policy: FailurePolicy) -> AnimationMixer {
    let scalar = AnimationClip::new(
        "scalar",
        vec![
            Track::scalar("material.opacity", vec![0.0, 1.0], vec![0.5, 0.5]).unwrap(),
            Track::scalar("position", vec![0.0, 1.0], vec![1.0, 1.0]).unwrap(),
        ],
    )
    .unwrap();
    let vector = AnimationClip::new(
        "vector",
        vec![Track::vector3("position", vec![0.0, 1.0], vec![Vec3::ONE, Vec3::ONE]).unwrap()],
    )
    .unwrap();

    let mut mixer = AnimationMixer::with_config(MixerConfig {
        failure_policy,
        ..Default::default()
    });
    mixer.add_clip(Arc::new(scalar), ClipOptions::default()).unwrap();
    mixer.add_clip(Arc::new(vector), ClipOptions::default()).unwrap();
    mixer.play("scalar").unwrap();
    mixer.play("vector").unwrap();
    mixer
}

#[test]
fn mixer_isolate_skips_mismatched_channel() -> Result<()> {
    init_logging();
    let mut mixer = mismatched_mixer(FailurePolicy::Isolate);

    let mut bag = PropertyBag::new();
    mixer.update(0.1, &mut bag)?;

    // First registered clip decides the channel type; the rest still blends
    assert_eq!(bag.get("position"), Some(&AnimValue::Scalar(1.0)));
    assert!(approx(bag.get_scalar("material.opacity").unwrap(), 0.5));
    Ok(())
}

#[test]
fn mixer_abort_writes_nothing() {
    let mut mixer = mismatched_mixer(FailurePolicy::Abort);

    let mut character = Character::default();
    let err = mixer.update(0.1, &mut character).unwrap_err();

    match err {
        CadenceError::ChannelTypeMismatch { track, expected, found } => {
            assert_eq!(track, "position");
            assert_eq!(expected.to_string(), "scalar");
            assert_eq!(found.to_string(), "vector3");
        }
        other => panic!("unexpected error {other:?}"),
    }
    assert!(character.writes.is_empty(), "aborted tick must not write: {:?}", character.writes);
}

// ============================================================================
// Cross-Fade
// ============================================================================

fn fade_mixer() -> AnimationMixer {
    let mut mixer = AnimationMixer::new();
    mixer.add_clip(constant_clip("a", "x", 0.0), ClipOptions::default()).unwrap();
    mixer.add_clip(constant_clip("b", "x", 10.0), ClipOptions::default().with_weight(0.0)).unwrap();
    mixer.add_clip(constant_clip("c", "x", 20.0), ClipOptions::default()).unwrap();
    mixer.play("a").unwrap();
    mixer
}

#[test]
fn cross_fade_endpoint() -> Result<()> {
    let mut mixer = AnimationMixer::new();
    mixer.add_clip(ramp_clip("a", 4.0, LoopMode::Loop), ClipOptions::default())?;
    mixer.add_clip(constant_clip("b", "x", 7.0), ClipOptions::default().with_weight(0.0))?;
    mixer.play("a")?;

    mixer.cross_fade("a", "b", 1.0)?;
    assert!(mixer.is_cross_fading());
    assert!(mixer.is_active("b"), "destination is started by the fade");

    let mut bag = PropertyBag::new();
    mixer.update(1.0, &mut bag)?;

    assert!(approx(mixer.weight("a")?, 0.0));
    assert!(approx(mixer.weight("b")?, 1.0));
    assert!(!mixer.is_cross_fading());

    let b = mixer.action("b").unwrap();
    let expected = b.clip().evaluate(b.time()).get_scalar("x").unwrap();
    assert!(approx(bag.get_scalar("x").unwrap(), expected));
    Ok(())
}

#[test]
fn cross_fade_midpoint_blends_both() -> Result<()> {
    let mut mixer = fade_mixer();
    mixer.cross_fade("a", "b", 1.0)?;

    let mut bag = PropertyBag::new();
    mixer.update(0.5, &mut bag)?;

    assert!(approx(mixer.weight("a")?, 0.5));
    assert!(approx(mixer.weight("b")?, 0.5));
    assert!(approx(bag.get_scalar("x").unwrap(), 5.0));
    Ok(())
}

#[test]
fn cross_fade_deactivates_source_without_stopping() -> Result<()> {
    let mut mixer = fade_mixer();
    mixer.cross_fade("a", "b", 0.5)?;

    let mut bag = PropertyBag::new();
    mixer.update(0.25, &mut bag)?;
    mixer.update(0.25, &mut bag)?;

    assert!(!mixer.is_active("a"));
    assert!(mixer.is_active("b"));
    let a = mixer.action("a").unwrap();
    assert!(a.is_playing(), "source keeps its own playback state");
    assert!(approx(a.time(), 0.5));

    // Inactive clips no longer advance
    mixer.update(0.25, &mut bag)?;
    assert!(approx(mixer.action("a").unwrap().time(), 0.5));
    assert!(approx(bag.get_scalar("x").unwrap(), 10.0));
    Ok(())
}

#[test]
fn cross_fade_zero_duration_is_instant() -> Result<()> {
    let mut mixer = fade_mixer();
    mixer.cross_fade("a", "b", 0.0)?;

    assert!(!mixer.is_cross_fading());
    assert!(!mixer.is_active("a"));
    assert_eq!(mixer.weight("b")?, 1.0);

    let mut bag = PropertyBag::new();
    mixer.update(0.1, &mut bag)?;
    assert!(approx(bag.get_scalar("x").unwrap(), 10.0));
    Ok(())
}

#[test]
fn cross_fade_overlap_completes_previous() -> Result<()> {
    let mut mixer = fade_mixer();
    mixer.cross_fade("a", "b", 1.0)?;

    let mut bag = PropertyBag::new();
    mixer.update(0.5, &mut bag)?;

    mixer.cross_fade("b", "c", 1.0)?;
    assert!(!mixer.is_active("a"), "previous fade source is retired");
    assert_eq!(mixer.weight("a")?, 0.0);
    assert_eq!(mixer.weight("b")?, 1.0);
    assert_eq!(mixer.weight("c")?, 0.0);

    mixer.update(0.5, &mut bag)?;
    assert!(approx(mixer.weight("b")?, 0.5));
    assert!(approx(mixer.weight("c")?, 0.5));
    assert!(approx(bag.get_scalar("x").unwrap(), 15.0));
    Ok(())
}

#[test]
fn cross_fade_cancelled_by_stop() -> Result<()> {
    let mut mixer = fade_mixer();
    mixer.cross_fade("a", "b", 1.0)?;

    let mut bag = PropertyBag::new();
    mixer.update(0.25, &mut bag)?;
    mixer.stop("b")?;

    assert!(!mixer.is_cross_fading());
    assert!(!mixer.is_active("b"));
    assert_eq!(mixer.action("b").unwrap().state(), PlaybackState::Stopped);

    // Weights stay where the fade left them
    assert!(approx(mixer.weight("a")?, 0.75));
    mixer.update(0.25, &mut bag)?;
    assert!(approx(mixer.weight("a")?, 0.75));
    assert!(approx(bag.get_scalar("x").unwrap(), 0.0));
    Ok(())
}

// ============================================================================
// Events
// ============================================================================

#[test]
fn mixer_events_are_drained_after_tick() -> Result<()> {
    let mut mixer = AnimationMixer::new();
    mixer.add_clip(ramp_clip("loop", 1.0, LoopMode::Loop), ClipOptions::default())?;
    mixer.add_clip(ramp_clip("once", 1.0, LoopMode::Once), ClipOptions::default())?;
    mixer.play("loop")?;
    mixer.play("once")?;

    let started: Vec<MixerEvent> = mixer.drain_events().collect();
    assert_eq!(
        started,
        vec![
            MixerEvent { clip: "loop".into(), event: ActionEvent::Started },
            MixerEvent { clip: "once".into(), event: ActionEvent::Started },
        ]
    );

    let mut bag = PropertyBag::new();
    mixer.update(1.25, &mut bag)?;

    let events: Vec<MixerEvent> = mixer.drain_events().collect();
    assert_eq!(
        events,
        vec![
            MixerEvent { clip: "loop".into(), event: ActionEvent::Looped },
            MixerEvent { clip: "once".into(), event: ActionEvent::Finished },
        ]
    );
    assert_eq!(mixer.drain_events().count(), 0);

    // Reacting to an event after the tick is safe
    for event in events {
        if event.event == ActionEvent::Finished {
            mixer.stop(&event.clip)?;
        }
    }
    assert!(!mixer.is_active("once"));
    assert!(mixer.is_active("loop"));
    Ok(())
}

#[test]
fn mixer_undrained_events_do_not_accumulate() -> Result<()> {
    let mut mixer = AnimationMixer::new();
    mixer.add_clip(ramp_clip("loop", 1.0, LoopMode::Loop), ClipOptions::default())?;
    mixer.play("loop")?;

    let mut bag = PropertyBag::new();
    for _ in 0..10_000 {
        mixer.update(1.5, &mut bag)?;
    }

    let events: Vec<MixerEvent> = mixer.drain_events().collect();
    assert_eq!(
        events,
        vec![MixerEvent { clip: "loop".into(), event: ActionEvent::Looped }]
    );
    Ok(())
}

#[test]
fn mixer_control_events_survive_until_next_tick() -> Result<()> {
    let mut mixer = AnimationMixer::new();
    mixer.add_clip(ramp_clip("ramp", 4.0, LoopMode::Loop), ClipOptions::default())?;

    let mut bag = PropertyBag::new();
    mixer.update(0.1, &mut bag)?;
    mixer.play("ramp")?;
    mixer.update(0.1, &mut bag)?;

    let events: Vec<MixerEvent> = mixer.drain_events().collect();
    assert_eq!(
        events,
        vec![MixerEvent { clip: "ramp".into(), event: ActionEvent::Started }]
    );

    // Drained events are gone; new ones queue normally
    mixer.stop("ramp")?;
    mixer.play("ramp")?;
    assert_eq!(mixer.drain_events().count(), 1);
    Ok(())
}

#[test]
fn mixer_finished_once_clip_holds_last_pose() -> Result<()> {
    let mut mixer = AnimationMixer::new();
    mixer.add_clip(ramp_clip("once", 1.0, LoopMode::Once), ClipOptions::default())?;
    mixer.play("once")?;

    let mut bag = PropertyBag::new();
    mixer.update(3.0, &mut bag)?;
    assert!(approx(bag.get_scalar("x").unwrap(), 10.0));

    mixer.update(1.0, &mut bag)?;
    assert!(mixer.is_active("once"));
    assert!(approx(bag.get_scalar("x").unwrap(), 10.0));

    // Replaying restarts from the beginning
    mixer.play("once")?;
    mixer.update(0.5, &mut bag)?;
    assert!(approx(bag.get_scalar("x").unwrap(), 5.0));
    Ok(())
}

#[test]
fn mixer_writes_into_custom_sink() -> Result<()> {
    let clip = AnimationClip::new(
        "fade",
        vec![
            Track::scalar("material.opacity", vec![0.0, 1.0], vec![1.0, 0.0])?,
            Track::vector3("position", vec![0.0, 1.0], vec![Vec3::ZERO, Vec3::Y])?,
        ],
    )?;

    let mut mixer = AnimationMixer::new();
    mixer.add_clip(Arc::new(clip), ClipOptions::default())?;
    mixer.play("fade")?;

    let mut character = Character::default();
    mixer.update(0.5, &mut character)?;

    assert!(approx(character.opacity, 0.5));
    assert!(character.position.abs_diff_eq(Vec3::new(0.0, 0.5, 0.0), EPSILON));
    assert_eq!(character.writes, vec!["material.opacity", "position"]);
    Ok(())
}
