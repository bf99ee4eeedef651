//! Animation Mixer
//!
//! Drives a set of [`AnimationAction`]s against one shared target. Each
//! [`update`](AnimationMixer::update) runs three strictly ordered phases:
//!
//! 1. advance every active action's time (registration order),
//! 2. evaluate every active action and accumulate its channels per property,
//! 3. write the composited values into the target.
//!
//! Nothing is written to the target until every property has been fully
//! composited, so no reader (or later clip) can observe a partial blend.
//!
//! # Blending
//!
//! Scalar, vector and morph-weight channels are combined by weighted sum,
//! normalized by the total weight of the clips touching that property
//! ([`WeightPolicy::Normalized`], the default) or left raw
//! ([`WeightPolicy::Raw`]). Rotations are blended by a weighted slerp chain:
//! each further rotation is slerped in by `w_i / (w_0 + .. + w_i)`, which is
//! normalized by construction.
//!
//! # Events
//!
//! Playback events are queued with the clip name and handed out by
//! [`drain_events`](AnimationMixer::drain_events) after the tick, so reacting
//! to them (stopping or removing clips) never races the update loop. The
//! queue only spans one tick: each update first discards the events that
//! were already queued when the previous update returned, so a host that
//! never drains does not accumulate them.

use std::sync::Arc;

use glam::{Quat, Vec3};
use rustc_hash::FxHashMap;
use slotmap::{SlotMap, new_key_type};
use smallvec::SmallVec;

use cadence_core::errors::{CadenceError, Result};
use cadence_core::property::{PropertyPath, PropertySink};
use cadence_core::value::{AnimValue, ValueKind, WeightArray};

use crate::action::{ActionEvent, AnimationAction};
use crate::clip::AnimationClip;
use crate::values::quaternion_slerp;

new_key_type! {
    /// Stable handle to a clip registered with an [`AnimationMixer`].
    pub struct ActionKey;
}

/// How per-clip weights combine when several clips drive one property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WeightPolicy {
    /// Divide the weighted sum by the total contributing weight.
    #[default]
    Normalized,
    /// Use the weighted sum as-is.
    Raw,
}

/// What to do when a channel cannot be composited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Log and drop the offending contribution; everything else still blends.
    #[default]
    Isolate,
    /// Fail the whole update; nothing is written to the target.
    Abort,
}

/// Mixer configuration.
///
/// ```rust,ignore
/// let mixer = AnimationMixer::with_config(MixerConfig {
///     weight_policy: WeightPolicy::Raw,
///     ..Default::default()
/// });
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MixerConfig {
    pub weight_policy: WeightPolicy,
    pub failure_policy: FailurePolicy,
}

/// Registration options for [`AnimationMixer::add_clip`].
#[derive(Debug, Clone)]
pub struct ClipOptions {
    /// Registry name; defaults to the clip's own name.
    pub name: Option<String>,
    /// Mixer weight in `[0, 1]`.
    pub weight: f32,
}

impl Default for ClipOptions {
    fn default() -> Self {
        Self {
            name: None,
            weight: 1.0,
        }
    }
}

impl ClipOptions {
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_weight(mut self, weight: f32) -> Self {
        self.weight = weight;
        self
    }
}

/// A playback event tagged with the registry name of its clip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MixerEvent {
    pub clip: String,
    pub event: ActionEvent,
}

#[derive(Debug)]
struct MixerEntry {
    name: String,
    action: AnimationAction,
    weight: f32,
    active: bool,
}

#[derive(Debug, Clone, Copy)]
struct CrossFade {
    from: ActionKey,
    to: ActionKey,
    from_start_weight: f32,
    duration: f32,
    elapsed: f32,
}

impl CrossFade {
    fn progress(&self) -> f32 {
        (self.elapsed / self.duration).clamp(0.0, 1.0)
    }
}

/// Per-property accumulator for one tick.
#[derive(Debug, Clone)]
enum Blend {
    Scalar { sum: f32, weight: f32 },
    Vector3 { sum: Vec3, weight: f32 },
    Quaternion { value: Quat, weight: f32 },
    Weights { sum: WeightArray, weight: f32 },
}

impl Blend {
    fn start(value: AnimValue, weight: f32) -> Self {
        match value {
            AnimValue::Scalar(v) => Self::Scalar { sum: v * weight, weight },
            AnimValue::Vector3(v) => Self::Vector3 { sum: v * weight, weight },
            AnimValue::Quaternion(q) => Self::Quaternion { value: q, weight },
            AnimValue::Weights(mut w) => {
                w.iter_mut().for_each(|x| *x *= weight);
                Self::Weights { sum: w, weight }
            }
        }
    }

    fn kind(&self) -> ValueKind {
        match self {
            Self::Scalar { .. } => ValueKind::Scalar,
            Self::Vector3 { .. } => ValueKind::Vector3,
            Self::Quaternion { .. } => ValueKind::Quaternion,
            Self::Weights { .. } => ValueKind::Weights,
        }
    }

    /// Folds in another contribution. Returns `false` on a type mismatch.
    fn accumulate(&mut self, value: &AnimValue, w: f32) -> bool {
        match (self, value) {
            (Self::Scalar { sum, weight }, AnimValue::Scalar(v)) => {
                *sum += v * w;
                *weight += w;
            }
            (Self::Vector3 { sum, weight }, AnimValue::Vector3(v)) => {
                *sum += *v * w;
                *weight += w;
            }
            (Self::Quaternion { value, weight }, AnimValue::Quaternion(q)) => {
                let total = *weight + w;
                *value = quaternion_slerp(w / total, *value, *q);
                *weight = total;
            }
            (Self::Weights { sum, weight }, AnimValue::Weights(v)) => {
                if sum.len() < v.len() {
                    sum.resize(v.len(), 0.0);
                }
                for (acc, x) in sum.iter_mut().zip(v) {
                    *acc += x * w;
                }
                *weight += w;
            }
            _ => return false,
        }
        true
    }

    fn resolve(self, policy: WeightPolicy) -> AnimValue {
        let scale = |weight: f32| match policy {
            WeightPolicy::Normalized => weight.recip(),
            WeightPolicy::Raw => 1.0,
        };
        match self {
            Self::Scalar { sum, weight } => AnimValue::Scalar(sum * scale(weight)),
            Self::Vector3 { sum, weight } => AnimValue::Vector3(sum * scale(weight)),
            Self::Quaternion { value, .. } => AnimValue::Quaternion(value),
            Self::Weights { mut sum, weight } => {
                let s = scale(weight);
                sum.iter_mut().for_each(|x| *x *= s);
                AnimValue::Weights(sum)
            }
        }
    }
}

/// Drives and blends multiple clips onto one target.
#[derive(Debug, Default)]
pub struct AnimationMixer {
    config: MixerConfig,
    entries: SlotMap<ActionKey, MixerEntry>,
    /// Registration order; compositing follows it.
    order: Vec<ActionKey>,
    by_name: FxHashMap<String, ActionKey>,
    cross_fade: Option<CrossFade>,
    events: Vec<MixerEvent>,
    /// Events queued before the last update returned.
    stale_events: usize,

    // Per-tick scratch, kept to reuse allocations
    blend_index: FxHashMap<PropertyPath, usize>,
    blends: Vec<(PropertyPath, Blend)>,
}

impl AnimationMixer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_config(config: MixerConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn config(&self) -> &MixerConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut MixerConfig {
        &mut self.config
    }

    // ========================================================================
    // Registry
    // ========================================================================

    /// Registers a clip. Playback does not start until [`play`](Self::play).
    pub fn add_clip(
        &mut self,
        clip: Arc<AnimationClip>,
        options: ClipOptions,
    ) -> Result<ActionKey> {
        let name = options.name.unwrap_or_else(|| clip.name.clone());
        if self.by_name.contains_key(&name) {
            return Err(CadenceError::DuplicateClip(name));
        }

        log::debug!("AnimationMixer: registering clip '{name}' (weight {})", options.weight);

        let key = self.entries.insert(MixerEntry {
            name: name.clone(),
            action: AnimationAction::new(clip),
            weight: options.weight.clamp(0.0, 1.0),
            active: false,
        });
        self.order.push(key);
        self.by_name.insert(name, key);
        Ok(key)
    }

    /// Unregisters a clip, cancelling any cross-fade that involves it.
    pub fn uncache_clip(&mut self, name: &str) -> Result<Arc<AnimationClip>> {
        let key = self.key(name)?;
        if self.cross_fade.is_some_and(|f| f.from == key || f.to == key) {
            self.cross_fade = None;
        }
        self.by_name.remove(name);
        self.order.retain(|&k| k != key);
        let entry = self
            .entries
            .remove(key)
            .ok_or_else(|| CadenceError::UnknownClip(name.to_owned()))?;
        Ok(Arc::clone(entry.action.clip()))
    }

    pub fn key(&self, name: &str) -> Result<ActionKey> {
        self.by_name
            .get(name)
            .copied()
            .ok_or_else(|| CadenceError::UnknownClip(name.to_owned()))
    }

    /// Registered clip names in registration order.
    pub fn clip_names(&self) -> impl Iterator<Item = &str> {
        self.order.iter().filter_map(|&k| self.entries.get(k)).map(|e| e.name.as_str())
    }

    #[must_use]
    pub fn action(&self, name: &str) -> Option<&AnimationAction> {
        let key = *self.by_name.get(name)?;
        self.entries.get(key).map(|e| &e.action)
    }

    pub fn action_mut(&mut self, name: &str) -> Option<&mut AnimationAction> {
        let key = *self.by_name.get(name)?;
        self.entries.get_mut(key).map(|e| &mut e.action)
    }

    // ========================================================================
    // Playback control
    // ========================================================================

    /// Starts the clip from the beginning and includes it in compositing.
    pub fn play(&mut self, name: &str) -> Result<()> {
        let key = self.key(name)?;
        self.activate(key);
        Ok(())
    }

    /// Stops the clip and removes it from compositing. A cross-fade
    /// involving it is cancelled, leaving weights where they are.
    pub fn stop(&mut self, name: &str) -> Result<()> {
        let key = self.key(name)?;
        if self.cross_fade.is_some_and(|f| f.from == key || f.to == key) {
            log::debug!("AnimationMixer: cross-fade cancelled by stopping '{name}'");
            self.cross_fade = None;
        }
        let entry = &mut self.entries[key];
        entry.action.stop();
        entry.active = false;
        Ok(())
    }

    pub fn pause(&mut self, name: &str) -> Result<()> {
        let key = self.key(name)?;
        self.entries[key].action.pause();
        Ok(())
    }

    pub fn resume(&mut self, name: &str) -> Result<()> {
        let key = self.key(name)?;
        self.entries[key].action.resume();
        Ok(())
    }

    /// Sets the mixer weight, clamped to `[0, 1]`.
    pub fn set_weight(&mut self, name: &str, weight: f32) -> Result<()> {
        let key = self.key(name)?;
        self.entries[key].weight = weight.clamp(0.0, 1.0);
        Ok(())
    }

    pub fn weight(&self, name: &str) -> Result<f32> {
        let key = self.key(name)?;
        Ok(self.entries[key].weight)
    }

    /// Whether the clip currently takes part in compositing.
    #[must_use]
    pub fn is_active(&self, name: &str) -> bool {
        self.by_name
            .get(name)
            .and_then(|&k| self.entries.get(k))
            .is_some_and(|e| e.active)
    }

    #[must_use]
    pub fn is_cross_fading(&self) -> bool {
        self.cross_fade.is_some()
    }

    /// Fades `from` out and `to` in over `duration` seconds of `update` time.
    ///
    /// `from` goes from its current weight to 0, `to` from 0 to 1. `to` is
    /// started if it is not already active. Both clips keep advancing their
    /// own time; when the fade completes `from` is dropped from compositing
    /// (but not stopped). A fade already in flight is completed immediately
    /// before the new one begins.
    pub fn cross_fade(&mut self, from: &str, to: &str, duration: f32) -> Result<()> {
        let from_key = self.key(from)?;
        let to_key = self.key(to)?;

        if let Some(previous) = self.cross_fade.take() {
            log::debug!("AnimationMixer: replacing in-flight cross-fade");
            self.complete_cross_fade(previous);
        }

        if from_key == to_key {
            self.entries[to_key].weight = 1.0;
            return Ok(());
        }

        if !self.entries[to_key].active {
            self.activate(to_key);
        }
        self.entries[to_key].weight = 0.0;

        let fade = CrossFade {
            from: from_key,
            to: to_key,
            from_start_weight: self.entries[from_key].weight,
            duration,
            elapsed: 0.0,
        };

        if duration > 0.0 {
            log::debug!("AnimationMixer: cross-fade '{from}' -> '{to}' over {duration}s");
            self.cross_fade = Some(fade);
        } else {
            self.complete_cross_fade(fade);
        }
        Ok(())
    }

    /// Takes the events fired by the last update and by any control calls
    /// made since.
    pub fn drain_events(&mut self) -> std::vec::Drain<'_, MixerEvent> {
        self.stale_events = 0;
        self.events.drain(..)
    }

    // ========================================================================
    // Tick
    // ========================================================================

    /// Advances all active clips by `dt` seconds and writes the blended
    /// result into `target`.
    ///
    /// A non-finite `dt` is logged and treated as zero: the current pose is
    /// still written, but no time passes.
    pub fn update<S: PropertySink + ?Sized>(&mut self, dt: f32, target: &mut S) -> Result<()> {
        let stale = self.stale_events.min(self.events.len());
        self.events.drain(..stale);

        let result = self.tick(dt, target);
        self.stale_events = self.events.len();
        result
    }

    fn tick<S: PropertySink + ?Sized>(&mut self, dt: f32, target: &mut S) -> Result<()> {
        let dt = if dt.is_finite() {
            dt
        } else {
            log::warn!("AnimationMixer: ignoring non-finite time step {dt}");
            0.0
        };

        // Snapshot: callers react to events only after this returns
        let active: SmallVec<[ActionKey; 8]> = self
            .order
            .iter()
            .copied()
            .filter(|&k| self.entries.get(k).is_some_and(|e| e.active))
            .collect();

        // 1. Advance time
        for &key in &active {
            self.entries[key].action.update(dt);
            self.collect_events(key);
        }

        let completed_fade = self.advance_cross_fade(dt);

        // 2. Evaluate and accumulate
        let composited = self.composite(&active);

        // 3. Write, then retire a finished fade
        if let Some(fade) = completed_fade {
            self.cross_fade = None;
            self.complete_cross_fade(fade);
        }

        composited?;
        for (path, blend) in self.blends.drain(..) {
            target.set_property(&path, &blend.resolve(self.config.weight_policy));
        }
        Ok(())
    }

    fn composite(&mut self, active: &[ActionKey]) -> Result<()> {
        self.blends.clear();
        self.blend_index.clear();

        for &key in active {
            let entry = &mut self.entries[key];
            if !entry.action.enabled || entry.weight <= 0.0 {
                continue;
            }
            let weight = entry.weight;

            for (path, value) in entry.action.evaluate() {
                if let Some(&slot) = self.blend_index.get(&path) {
                    let blend = &mut self.blends[slot].1;
                    if blend.accumulate(&value, weight) {
                        continue;
                    }

                    let error = CadenceError::ChannelTypeMismatch {
                        track: path.to_string(),
                        expected: blend.kind(),
                        found: value.kind(),
                    };
                    match self.config.failure_policy {
                        FailurePolicy::Isolate => {
                            log::warn!(
                                "AnimationMixer: skipping '{}' from clip '{}': {error}",
                                path,
                                entry.name
                            );
                        }
                        FailurePolicy::Abort => {
                            self.blends.clear();
                            return Err(error);
                        }
                    }
                } else {
                    self.blend_index.insert(path.clone(), self.blends.len());
                    self.blends.push((path, Blend::start(value, weight)));
                }
            }
        }
        Ok(())
    }

    /// Moves fade weights forward; returns the fade if it just completed.
    fn advance_cross_fade(&mut self, dt: f32) -> Option<CrossFade> {
        let fade = self.cross_fade.as_mut()?;
        fade.elapsed += dt;
        let fade = *fade;

        let t = fade.progress();
        if let Some(from) = self.entries.get_mut(fade.from) {
            from.weight = fade.from_start_weight * (1.0 - t);
        }
        if let Some(to) = self.entries.get_mut(fade.to) {
            to.weight = t;
        }

        (t >= 1.0).then_some(fade)
    }

    fn complete_cross_fade(&mut self, fade: CrossFade) {
        if let Some(from) = self.entries.get_mut(fade.from) {
            from.weight = 0.0;
            from.active = false;
            log::debug!("AnimationMixer: cross-fade complete, '{}' deactivated", from.name);
        }
        if let Some(to) = self.entries.get_mut(fade.to) {
            to.weight = 1.0;
        }
    }

    fn activate(&mut self, key: ActionKey) {
        let entry = &mut self.entries[key];
        entry.action.play(0.0);
        entry.active = true;
        self.collect_events(key);
    }

    fn collect_events(&mut self, key: ActionKey) {
        let Some(entry) = self.entries.get_mut(key) else {
            return;
        };
        let name = &entry.name;
        self.events.extend(entry.action.drain_events().into_iter().map(|event| MixerEvent {
            clip: name.clone(),
            event,
        }));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clip::Track;
    use cadence_core::property::PropertyBag;

    fn constant_clip(name: &str, track: &str, value: f32) -> Arc<AnimationClip> {
        let track = Track::scalar(track, vec![0.0, 1.0], vec![value, value]).unwrap();
        Arc::new(AnimationClip::new(name, vec![track]).unwrap())
    }

    #[test]
    fn normalized_blend_averages_by_weight() {
        let mut mixer = AnimationMixer::new();
        let quarter = ClipOptions::default().with_weight(0.25);
        let rest = ClipOptions::default().with_weight(0.75);
        mixer.add_clip(constant_clip("a", "x", 0.0), quarter).unwrap();
        mixer.add_clip(constant_clip("b", "x", 10.0), rest).unwrap();
        mixer.play("a").unwrap();
        mixer.play("b").unwrap();

        let mut bag = PropertyBag::new();
        mixer.update(0.1, &mut bag).unwrap();
        assert!((bag.get_scalar("x").unwrap() - 7.5).abs() < 1e-5);
    }

    #[test]
    fn raw_blend_sums_weighted_values() {
        let mut mixer = AnimationMixer::with_config(MixerConfig {
            weight_policy: WeightPolicy::Raw,
            ..Default::default()
        });
        let half = ClipOptions::default().with_weight(0.5);
        mixer.add_clip(constant_clip("a", "x", 4.0), half.clone()).unwrap();
        mixer.add_clip(constant_clip("b", "x", 10.0), half).unwrap();
        mixer.play("a").unwrap();
        mixer.play("b").unwrap();

        let mut bag = PropertyBag::new();
        mixer.update(0.1, &mut bag).unwrap();
        assert!((bag.get_scalar("x").unwrap() - 7.0).abs() < 1e-5);
    }

    #[test]
    fn quaternion_chain_respects_relative_weights() {
        let mut blend = Blend::start(AnimValue::Quaternion(Quat::IDENTITY), 1.0);
        assert!(blend.accumulate(&AnimValue::Quaternion(Quat::from_rotation_z(1.0)), 1.0));
        let AnimValue::Quaternion(q) = blend.resolve(WeightPolicy::Normalized) else {
            panic!("expected a rotation");
        };
        assert!(q.dot(Quat::from_rotation_z(0.5)).abs() > 1.0 - 1e-5);
    }

    #[test]
    fn mismatched_kinds_do_not_accumulate() {
        let mut blend = Blend::start(AnimValue::Scalar(1.0), 1.0);
        assert!(!blend.accumulate(&AnimValue::Vector3(Vec3::ONE), 1.0));
        assert_eq!(blend.kind(), ValueKind::Scalar);
    }
}
