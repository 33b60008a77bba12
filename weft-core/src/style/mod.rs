//! Styles and animations
//!
//! A style worklet yields a [`Style`] per evaluation: static properties plus
//! animation requests. The [`AnimationEngine`] keeps animation state across
//! evaluations, the [`PropertyDiffer`] reduces each evaluation to the
//! properties that changed, and the [`StyleApplier`] wires both to a
//! [`RenderTarget`].

mod animation;
mod applier;
mod diff;
mod sheet;
mod target;

pub use animation::{AnimationEngine, AnimationRecord, Tick};
pub use applier::{StyleApplier, StyleFn};
pub use diff::{PropertyDiff, PropertyDiffer};
pub use sheet::{AnimationDescriptor, AnimationState, Driver, Style, StyleEntry};
pub use target::{EncodingTarget, PropertyUpdate, RecordingTarget, RenderTarget};
