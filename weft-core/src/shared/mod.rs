//! Shared Values
//!
//! This module implements the value store that both sides of the execution
//! boundary observe: cells, the packaged handle trees built from them, and
//! the packaging step that turns a control-side [`Value`](crate::Value) into
//! such a tree.
//!
//! # Cells
//!
//! A [`Cell`] holds exactly one [`CellContent`]. Leaves hold a scalar;
//! sequences and records hold the IDs of their child cells; a callable holds
//! the ID of the worklet it was wrapped into. Composites are never stored as
//! plain data, so every leaf of a packaged tree is independently observable
//! and releasable.
//!
//! # Ownership
//!
//! Packaging returns a [`Package`]. The package owns every cell and worklet
//! created while packaging (but not subtrees that were already shared) and
//! releases all of them with one call to [`Package::release`]. The package
//! remembers whether it was released, so a second call does nothing.

mod cell;
mod package;
mod tree;

pub use cell::{Cell, CellContent};
pub use package::Package;
pub use tree::Shared;

pub(crate) use cell::CellSlot;
