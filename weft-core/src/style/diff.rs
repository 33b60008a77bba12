//! Property diffing against the last applied values.

use indexmap::IndexMap;

use crate::style::Style;
use crate::value::Scalar;

/// Changed properties, in style order. [`Scalar::Unset`] marks a removal.
pub type PropertyDiff = IndexMap<String, Scalar>;

/// Remembers what was last applied to a render target.
#[derive(Debug, Default, Clone)]
pub struct PropertyDiffer {
    last: IndexMap<String, Scalar>,
}

impl PropertyDiffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// The minimal set of changes that brings the target from the last
    /// applied values to `style`.
    ///
    /// Animated keys are left to the animation engine: they are neither
    /// diffed nor reported as removed.
    pub fn diff(&self, style: &Style) -> PropertyDiff {
        let mut diff = PropertyDiff::new();

        for (key, value) in style.statics() {
            let changed = match self.last.get(key) {
                Some(previous) => previous != value,
                None => !value.is_unset(),
            };
            if changed {
                diff.insert(key.to_owned(), value.clone());
            }
        }

        for key in self.last.keys() {
            if style.get(key).is_none() {
                diff.insert(key.clone(), Scalar::Unset);
            }
        }

        diff
    }

    /// Record `diff` as applied.
    pub fn commit(&mut self, diff: &PropertyDiff) {
        for (key, value) in diff {
            if value.is_unset() {
                self.last.shift_remove(key);
            } else {
                self.last.insert(key.clone(), value.clone());
            }
        }
    }

    pub fn last_applied(&self) -> &IndexMap<String, Scalar> {
        &self.last
    }

    pub fn get(&self, key: &str) -> Option<&Scalar> {
        self.last.get(key)
    }
}
