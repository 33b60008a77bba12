//! Identifier types for runtime resources.
//!
//! Every cell, worklet, mapper and frame-loop enrollment gets an identifier
//! that is unique for the lifetime of the process. Identifiers are never
//! reused, so a lookup that misses can always be reported as a use after
//! release.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(u64);

        impl $name {
            /// Generate a new unique ID.
            ///
            /// Uses an atomic counter to ensure uniqueness across threads.
            pub fn new() -> Self {
                static COUNTER: AtomicU64 = AtomicU64::new(0);
                Self(COUNTER.fetch_add(1, Ordering::Relaxed))
            }

            /// Get the raw ID value.
            pub fn raw(&self) -> u64 {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "#{}"), self.0)
            }
        }
    };
}

define_id!(
    /// Unique identifier for a value cell.
    CellId,
    "cell"
);

define_id!(
    /// Unique identifier for a packaged worklet.
    WorkletId,
    "worklet"
);

define_id!(
    /// Unique identifier for a mapper registration.
    ///
    /// A mapper that is stopped and started again gets a fresh ID, so a
    /// queued evaluation for the old registration can never run the new one.
    MapperId,
    "mapper"
);

define_id!(
    /// Unique identifier for a frame-loop enrollment.
    RepeatId,
    "repeat"
);

/// Identifier of a render target (a view instance) owned by the view layer.
///
/// Unlike the other IDs this one is not generated here: the view layer
/// resolves it once the target exists and hands it to the style pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TargetId(pub u64);

impl fmt::Display for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "target#{}", self.0)
    }
}
