use smallvec::SmallVec;

use cadence_core::property::{PropertyPath, PropertySink};
use cadence_core::value::AnimValue;

/// The evaluated output of one clip at one instant: a value per enabled
/// track, in track order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Pose {
    channels: SmallVec<[(PropertyPath, AnimValue); 8]>,
}

impl Pose {
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            channels: SmallVec::with_capacity(capacity),
        }
    }

    pub(crate) fn push(&mut self, path: PropertyPath, value: AnimValue) {
        self.channels.push((path, value));
    }

    #[must_use]
    pub fn get(&self, path: &str) -> Option<&AnimValue> {
        self.channels
            .iter()
            .find(|(p, _)| p.as_str() == path)
            .map(|(_, v)| v)
    }

    #[must_use]
    pub fn get_scalar(&self, path: &str) -> Option<f32> {
        self.get(path).and_then(AnimValue::as_scalar)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&PropertyPath, &AnimValue)> {
        self.channels.iter().map(|(p, v)| (p, v))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.channels.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Writes every channel into `target`.
    pub fn apply_to<S: PropertySink + ?Sized>(&self, target: &mut S) {
        for (path, value) in &self.channels {
            target.set_property(path, value);
        }
    }
}

impl IntoIterator for Pose {
    type Item = (PropertyPath, AnimValue);
    type IntoIter = smallvec::IntoIter<[(PropertyPath, AnimValue); 8]>;

    fn into_iter(self) -> Self::IntoIter {
        self.channels.into_iter()
    }
}
