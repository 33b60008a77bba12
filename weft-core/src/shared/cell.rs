//! Value cells and the reference-counted cell store.

use std::fmt;
use std::sync::Weak;

use indexmap::IndexMap;
use tracing::{debug, trace};

use crate::error::{Error, Resource, Result};
use crate::ids::{CellId, WorkletId};
use crate::runtime::{Runtime, RuntimeInner};
use crate::value::Scalar;

/// What a cell holds.
#[derive(Debug, Clone, PartialEq)]
pub enum CellContent {
    Leaf(Scalar),
    Sequence(Vec<CellId>),
    Record(IndexMap<String, CellId>),
    Worklet(WorkletId),
}

impl CellContent {
    /// Name of the variant, used in logs and error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            CellContent::Leaf(_) => "leaf",
            CellContent::Sequence(_) => "sequence",
            CellContent::Record(_) => "record",
            CellContent::Worklet(_) => "worklet",
        }
    }
}

/// Storage for one live cell.
#[derive(Debug)]
pub(crate) struct CellSlot {
    pub(crate) content: CellContent,
    /// Reference count. The slot is removed when it reaches zero.
    pub(crate) refs: usize,
}

/// Handle to a cell owned by a [`Runtime`].
///
/// Handles are cheap to clone and do not keep the cell alive; the reference
/// count is adjusted only through [`retain`](Cell::retain) and
/// [`release`](Cell::release).
#[derive(Clone)]
pub struct Cell {
    id: CellId,
    rt: Weak<RuntimeInner>,
}

impl Cell {
    pub(crate) fn new(id: CellId, rt: Weak<RuntimeInner>) -> Self {
        Self { id, rt }
    }

    /// Get the cell's unique ID.
    pub fn id(&self) -> CellId {
        self.id
    }

    /// The runtime that owns this cell.
    pub fn runtime(&self) -> Result<Runtime> {
        Runtime::upgrade(&self.rt)
    }

    pub(crate) fn runtime_ref(&self) -> &Weak<RuntimeInner> {
        &self.rt
    }

    /// Whether the cell is still alive.
    pub fn is_alive(&self) -> bool {
        self.runtime()
            .map(|rt| rt.cell_alive(self.id))
            .unwrap_or(false)
    }

    /// Current content of the cell.
    pub fn content(&self) -> Result<CellContent> {
        self.runtime()?.cell_content(self.id)
    }

    /// Read the scalar held by a leaf cell.
    pub fn read(&self) -> Result<Scalar> {
        match self.content()? {
            CellContent::Leaf(value) => Ok(value),
            _ => Err(Error::NotALeaf(self.id)),
        }
    }

    /// Write a new scalar into a leaf cell.
    ///
    /// Every mapper subscribed to this cell is re-evaluated before this call
    /// returns, unless the write happens inside an open batch, in which case
    /// the batch drains when it closes.
    pub fn write(&self, value: impl Into<Scalar>) -> Result<()> {
        self.runtime()?.write_cell(self.id, value.into())
    }

    /// Increment the reference count.
    pub fn retain(&self) -> Result<()> {
        self.runtime()?.retain_cell(self.id).map(|_| ())
    }

    /// Decrement the reference count, freeing the cell at zero.
    pub fn release(&self) -> Result<()> {
        self.runtime()?.release_cell(self.id).map(|_| ())
    }
}

impl PartialEq for Cell {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl fmt::Debug for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Cell").field(&self.id).finish()
    }
}

// ----------------------------------------------------------------------------
// Cell store
// ----------------------------------------------------------------------------

impl Runtime {
    /// Create a standalone leaf cell.
    ///
    /// The caller owns the returned cell and must release it.
    pub fn cell(&self, value: impl Into<Scalar>) -> Cell {
        let id = self.alloc_cell(CellContent::Leaf(value.into()));
        Cell::new(id, self.downgrade())
    }

    pub(crate) fn alloc_cell(&self, content: CellContent) -> CellId {
        let id = CellId::new();
        trace!(cell = %id, kind = content.kind(), "cell created");
        self.with_state(|state| {
            state.cells.insert(id, CellSlot { content, refs: 1 });
        });
        id
    }

    pub(crate) fn cell_alive(&self, id: CellId) -> bool {
        self.with_state(|state| state.cells.contains_key(&id))
    }

    pub(crate) fn cell_content(&self, id: CellId) -> Result<CellContent> {
        self.with_state(|state| {
            state
                .cells
                .get(&id)
                .map(|slot| slot.content.clone())
                .ok_or(Error::UseAfterRelease(Resource::Cell(id)))
        })
    }

    pub(crate) fn retain_cell(&self, id: CellId) -> Result<usize> {
        self.with_state(|state| {
            let slot = state
                .cells
                .get_mut(&id)
                .ok_or(Error::UseAfterRelease(Resource::Cell(id)))?;
            slot.refs += 1;
            Ok(slot.refs)
        })
    }

    /// Returns `true` when this release freed the cell.
    pub(crate) fn release_cell(&self, id: CellId) -> Result<bool> {
        let freed = self.with_state(|state| {
            let slot = state
                .cells
                .get_mut(&id)
                .ok_or(Error::UseAfterRelease(Resource::Cell(id)))?;
            slot.refs -= 1;
            if slot.refs > 0 {
                return Ok::<_, Error>(false);
            }
            state.cells.remove(&id);
            state.mappers.forget_cell(id);
            Ok(true)
        })?;
        if freed {
            debug!(cell = %id, "cell freed");
        }
        Ok(freed)
    }
}
