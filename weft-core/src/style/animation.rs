//! Animation Engine
//!
//! Keeps one [`AnimationRecord`] per animated property across evaluations
//! of the same style.
//!
//! # Reconciliation
//!
//! After each evaluation the engine is reconciled against the fresh style:
//!
//! 1. Records whose key is no longer animated are dropped.
//! 2. Each animated key continues from its previous record, finished or
//!    not, keeping current value and velocity. Keys without a record start
//!    from the descriptor's `initial` value at rest.
//! 3. Every record touched by the evaluation is marked unfinished.
//!
//! # Ticks
//!
//! Each frame, every unfinished record is advanced by its driver and its
//! current value is reported, including on the frame it finishes. Finished
//! records stay until the next evaluation.

use std::sync::Arc;
use std::time::Duration;

use indexmap::IndexMap;
use tracing::trace;

use crate::style::{AnimationState, Driver, PropertyDiff, Style};
use crate::value::Scalar;

/// Live state of one animated property.
#[derive(Clone)]
pub struct AnimationRecord {
    state: AnimationState,
    driver: Arc<dyn Driver>,
    finished: bool,
}

impl AnimationRecord {
    pub fn state(&self) -> AnimationState {
        self.state
    }

    pub fn current(&self) -> f64 {
        self.state.current
    }

    pub fn velocity(&self) -> f64 {
        self.state.velocity
    }

    pub fn target(&self) -> f64 {
        self.state.target
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }
}

impl std::fmt::Debug for AnimationRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnimationRecord")
            .field("state", &self.state)
            .field("finished", &self.finished)
            .finish_non_exhaustive()
    }
}

/// Result of one frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Tick {
    /// Current value of every record that advanced this frame.
    pub updates: PropertyDiff,
    pub all_finished: bool,
}

#[derive(Debug, Default)]
pub struct AnimationEngine {
    records: IndexMap<String, AnimationRecord>,
}

impl AnimationEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bring the records in line with a fresh style.
    ///
    /// Returns whether any record is active afterwards.
    pub fn reconcile(&mut self, style: &Style) -> bool {
        self.records.retain(|key, _| style.is_animated(key));

        for (key, animation) in style.animations() {
            let (current, velocity) = match self.records.get(key) {
                Some(prior) => (prior.state.current, prior.state.velocity),
                None => (animation.initial, 0.0),
            };
            trace!(key, current, target = animation.target, "animation reconciled");
            self.records.insert(
                key.to_owned(),
                AnimationRecord {
                    state: AnimationState {
                        current,
                        velocity,
                        target: animation.target,
                    },
                    driver: Arc::clone(&animation.driver),
                    finished: false,
                },
            );
        }

        self.is_active()
    }

    /// Advance every unfinished record by `dt`.
    pub fn tick(&mut self, dt: Duration) -> Tick {
        let mut updates = PropertyDiff::new();
        for (key, record) in self.records.iter_mut().filter(|(_, r)| !r.finished) {
            record.finished = record.driver.advance(&mut record.state, dt);
            updates.insert(key.clone(), Scalar::Number(record.state.current));
        }
        Tick {
            updates,
            all_finished: !self.is_active(),
        }
    }

    /// Whether any record still needs ticks.
    pub fn is_active(&self) -> bool {
        self.records.values().any(|record| !record.finished)
    }

    pub fn get(&self, key: &str) -> Option<&AnimationRecord> {
        self.records.get(key)
    }

    /// Keys of the records that still need ticks.
    pub fn active_keys(&self) -> Vec<String> {
        self.records
            .iter()
            .filter(|(_, record)| !record.finished)
            .map(|(key, _)| key.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
