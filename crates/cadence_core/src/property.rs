//! Animation Targets
//!
//! The animation core never touches scene objects directly. Evaluated values
//! are delivered to a [`PropertySink`], addressed by a dot-separated
//! [`PropertyPath`] such as `"position"` or `"material.opacity"`.
//!
//! Hosts implement [`PropertySink`] on whatever owns the animated state (a
//! transform, a material, a uniform block) and map the paths they understand
//! onto their own fields. [`PropertyBag`] is a generic nested property tree
//! that accepts any path and is convenient for tooling and tests.

use std::borrow::Borrow;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::errors::{CadenceError, Result};
use crate::value::AnimValue;

/// A validated, cheaply clonable dot-separated property path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PropertyPath(Arc<str>);

impl PropertyPath {
    /// Parses a dot-separated path. Empty paths and empty segments
    /// (`"a..b"`, `".a"`, `"a."`) are rejected.
    pub fn parse(path: &str) -> Result<Self> {
        if path.is_empty() {
            return Err(CadenceError::invalid_track(path, "property path is empty"));
        }
        if path.split('.').any(str::is_empty) {
            return Err(CadenceError::invalid_track(
                path,
                "property path contains an empty segment",
            ));
        }
        Ok(Self(Arc::from(path)))
    }

    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Iterates the path segments from the root outwards.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('.')
    }

    /// The final segment (the property name itself).
    #[must_use]
    pub fn leaf(&self) -> &str {
        self.0.rsplit('.').next().unwrap_or(&self.0)
    }
}

impl Borrow<str> for PropertyPath {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PropertyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Something evaluated animation values can be written into.
///
/// Implementations decide how to treat paths they do not recognise;
/// ignoring them is the usual choice.
pub trait PropertySink {
    fn set_property(&mut self, path: &PropertyPath, value: &AnimValue);
}

impl<T: PropertySink + ?Sized> PropertySink for &mut T {
    fn set_property(&mut self, path: &PropertyPath, value: &AnimValue) {
        (**self).set_property(path, value);
    }
}

/// A node in a [`PropertyBag`].
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyNode {
    Value(AnimValue),
    Group(BTreeMap<String, PropertyNode>),
}

/// A nested, string-keyed property tree.
///
/// Writing `"a.b.c"` creates the groups `a` and `a.b` on demand. If a leaf
/// value sits where a group is needed, the leaf is replaced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PropertyBag {
    root: BTreeMap<String, PropertyNode>,
}

impl PropertyBag {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, path: &PropertyPath, value: AnimValue) {
        let (parents, leaf) = match path.as_str().rsplit_once('.') {
            Some((parents, leaf)) => (Some(parents), leaf),
            None => (None, path.as_str()),
        };

        let mut children = &mut self.root;
        for segment in parents.into_iter().flat_map(|p| p.split('.')) {
            let node = children
                .entry(segment.to_owned())
                .or_insert_with(|| PropertyNode::Group(BTreeMap::new()));

            if matches!(node, PropertyNode::Value(_)) {
                log::debug!("PropertyBag: replacing leaf '{segment}' with a group for '{path}'");
                *node = PropertyNode::Group(BTreeMap::new());
            }

            let PropertyNode::Group(next) = node else {
                return;
            };
            children = next;
        }

        children.insert(leaf.to_owned(), PropertyNode::Value(value));
    }

    /// Looks up a node (leaf or group) by dot-separated path.
    #[must_use]
    pub fn node(&self, path: &str) -> Option<&PropertyNode> {
        let mut segments = path.split('.');
        let mut node = self.root.get(segments.next()?)?;
        for segment in segments {
            match node {
                PropertyNode::Group(children) => node = children.get(segment)?,
                PropertyNode::Value(_) => return None,
            }
        }
        Some(node)
    }

    /// Looks up a leaf value by dot-separated path.
    #[must_use]
    pub fn get(&self, path: &str) -> Option<&AnimValue> {
        match self.node(path)? {
            PropertyNode::Value(v) => Some(v),
            PropertyNode::Group(_) => None,
        }
    }

    #[must_use]
    pub fn get_scalar(&self, path: &str) -> Option<f32> {
        self.get(path).and_then(AnimValue::as_scalar)
    }

    #[must_use]
    pub fn contains(&self, path: &str) -> bool {
        self.get(path).is_some()
    }

    /// Number of leaf values in the tree.
    #[must_use]
    pub fn len(&self) -> usize {
        fn count(children: &BTreeMap<String, PropertyNode>) -> usize {
            children
                .values()
                .map(|node| match node {
                    PropertyNode::Value(_) => 1,
                    PropertyNode::Group(inner) => count(inner),
                })
                .sum()
        }
        count(&self.root)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&mut self) {
        self.root.clear();
    }
}

impl PropertySink for PropertyBag {
    fn set_property(&mut self, path: &PropertyPath, value: &AnimValue) {
        self.set(path, value.clone());
    }
}

#[cfg(test)]
mod tests {
    use glam::Vec3;

    use super::*;

    fn path(s: &str) -> PropertyPath {
        PropertyPath::parse(s).unwrap()
    }

    #[test]
    fn parse_rejects_empty_segments() {
        assert!(PropertyPath::parse("").is_err());
        assert!(PropertyPath::parse("a..b").is_err());
        assert!(PropertyPath::parse(".a").is_err());
        assert!(PropertyPath::parse("a.").is_err());
        assert!(PropertyPath::parse("material.opacity").is_ok());
    }

    #[test]
    fn segments_and_leaf() {
        let p = path("body.material.opacity");
        assert_eq!(p.segments().collect::<Vec<_>>(), ["body", "material", "opacity"]);
        assert_eq!(p.leaf(), "opacity");
        assert_eq!(path("position").leaf(), "position");
    }

    #[test]
    fn bag_creates_intermediate_groups() {
        let mut bag = PropertyBag::new();
        bag.set(&path("material.opacity"), AnimValue::Scalar(0.5));
        bag.set(&path("position"), AnimValue::Vector3(Vec3::X));

        assert_eq!(bag.get_scalar("material.opacity"), Some(0.5));
        assert_eq!(bag.get("position"), Some(&AnimValue::Vector3(Vec3::X)));
        assert!(matches!(bag.node("material"), Some(PropertyNode::Group(_))));
        assert!(bag.get("material").is_none());
        assert_eq!(bag.len(), 2);
    }

    #[test]
    fn bag_replaces_leaf_in_the_way() {
        let mut bag = PropertyBag::new();
        bag.set(&path("position"), AnimValue::Scalar(1.0));
        bag.set(&path("position.y"), AnimValue::Scalar(2.0));

        assert_eq!(bag.get_scalar("position.y"), Some(2.0));
        assert_eq!(bag.len(), 1);
    }

    #[test]
    fn bag_overwrites_existing_value() {
        let mut bag = PropertyBag::new();
        bag.set_property(&path("a.b"), &AnimValue::Scalar(1.0));
        bag.set_property(&path("a.b"), &AnimValue::Scalar(3.0));
        assert_eq!(bag.get_scalar("a.b"), Some(3.0));
        assert!(bag.get("a.b.c").is_none());
    }
}
