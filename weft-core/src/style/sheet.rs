//! Style records produced by a style worklet.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use indexmap::IndexMap;

use crate::value::Scalar;

/// Numeric state of one animated property.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnimationState {
    pub current: f64,
    pub velocity: f64,
    pub target: f64,
}

/// Advances an animation by one frame.
///
/// Returns `true` once the animation has finished. Curve math lives entirely
/// in the driver; the engine only keeps state between frames.
pub trait Driver: Send + Sync {
    fn advance(&self, state: &mut AnimationState, dt: Duration) -> bool;
}

impl<F> Driver for F
where
    F: Fn(&mut AnimationState, Duration) -> bool + Send + Sync,
{
    fn advance(&self, state: &mut AnimationState, dt: Duration) -> bool {
        self(state, dt)
    }
}

/// Request to animate a property towards `target`.
///
/// `initial` seeds the animation only when the property was not already
/// animating; otherwise it continues from its current value and velocity.
#[derive(Clone)]
pub struct AnimationDescriptor {
    pub initial: f64,
    pub target: f64,
    pub driver: Arc<dyn Driver>,
}

impl AnimationDescriptor {
    pub fn new(initial: f64, target: f64, driver: impl Driver + 'static) -> Self {
        Self {
            initial,
            target,
            driver: Arc::new(driver),
        }
    }
}

impl fmt::Debug for AnimationDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnimationDescriptor")
            .field("initial", &self.initial)
            .field("target", &self.target)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone)]
pub enum StyleEntry {
    Static(Scalar),
    Animated(AnimationDescriptor),
}

/// Output of one style evaluation, in insertion order.
#[derive(Debug, Clone, Default)]
pub struct Style {
    entries: IndexMap<String, StyleEntry>,
}

impl Style {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a static property.
    pub fn set(mut self, key: impl Into<String>, value: impl Into<Scalar>) -> Self {
        self.entries
            .insert(key.into(), StyleEntry::Static(value.into()));
        self
    }

    /// Animate a property.
    pub fn animate(mut self, key: impl Into<String>, animation: AnimationDescriptor) -> Self {
        self.entries
            .insert(key.into(), StyleEntry::Animated(animation));
        self
    }

    pub fn get(&self, key: &str) -> Option<&StyleEntry> {
        self.entries.get(key)
    }

    pub fn is_animated(&self, key: &str) -> bool {
        matches!(self.entries.get(key), Some(StyleEntry::Animated(_)))
    }

    pub fn animations(&self) -> impl Iterator<Item = (&str, &AnimationDescriptor)> {
        self.entries.iter().filter_map(|(key, entry)| match entry {
            StyleEntry::Animated(animation) => Some((key.as_str(), animation)),
            StyleEntry::Static(_) => None,
        })
    }

    pub fn statics(&self) -> impl Iterator<Item = (&str, &Scalar)> {
        self.entries.iter().filter_map(|(key, entry)| match entry {
            StyleEntry::Static(value) => Some((key.as_str(), value)),
            StyleEntry::Animated(_) => None,
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &StyleEntry)> {
        self.entries.iter().map(|(key, entry)| (key.as_str(), entry))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
