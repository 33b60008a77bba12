//! Packaging control-side values into cell trees.

use std::fmt;
use std::sync::Weak;

use tracing::{debug, trace, warn};

use crate::error::{Error, Resource, Result};
use crate::ids::{CellId, WorkletId};
use crate::runtime::{Runtime, RuntimeInner};
use crate::shared::{Cell, CellContent, Shared};
use crate::value::Value;

/// The owned result of packaging one or more values.
///
/// A package owns the cells and worklets created while packaging. Subtrees
/// that were passed in already shared are referenced, not owned. Dropping a
/// package that was not released releases it.
pub struct Package {
    roots: Vec<Shared>,
    cells: Vec<CellId>,
    worklets: Vec<WorkletId>,
    alive: bool,
    rt: Weak<RuntimeInner>,
}

impl Package {
    /// The first packaged value.
    ///
    /// Always present for packages built by [`Runtime::create`].
    pub fn root(&self) -> Option<&Shared> {
        self.roots.first()
    }

    /// All packaged values, in the order they were given.
    pub fn roots(&self) -> &[Shared] {
        &self.roots
    }

    /// Whether the package has not been released yet.
    pub fn is_alive(&self) -> bool {
        self.alive
    }

    /// Number of cells this package owns.
    pub fn owned_cells(&self) -> usize {
        self.cells.len()
    }

    /// Number of worklets this package wrapped and therefore owns.
    pub fn owned_worklets(&self) -> usize {
        self.worklets.len()
    }

    /// Release every cell and worklet the package owns.
    ///
    /// Calling this again is a no-op. If some owned resources were already
    /// released elsewhere, the remaining ones are still released and the
    /// first error is returned.
    pub fn release(&mut self) -> Result<()> {
        if !self.alive {
            trace!("package already released");
            return Ok(());
        }
        self.alive = false;

        // Nothing to free once the runtime is gone.
        let Ok(rt) = Runtime::upgrade(&self.rt) else {
            return Ok(());
        };

        let mut first_error = None;
        for id in self.cells.iter().rev() {
            if let Err(err) = rt.release_cell(*id) {
                first_error.get_or_insert(err);
            }
        }
        for id in &self.worklets {
            if let Err(err) = rt.release_worklet(*id) {
                first_error.get_or_insert(err);
            }
        }

        debug!(
            cells = self.cells.len(),
            worklets = self.worklets.len(),
            "package released"
        );
        first_error.map_or(Ok(()), Err)
    }
}

impl Drop for Package {
    fn drop(&mut self) {
        if let Err(err) = self.release() {
            warn!(error = %err, "releasing dropped package failed");
        }
    }
}

impl fmt::Debug for Package {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Package")
            .field("roots", &self.roots)
            .field("owned_cells", &self.cells.len())
            .field("owned_worklets", &self.worklets.len())
            .field("alive", &self.alive)
            .finish()
    }
}

/// Collects what one packaging call creates, so a failure can undo it.
struct Packer<'a> {
    rt: &'a Runtime,
    cells: Vec<CellId>,
    worklets: Vec<WorkletId>,
}

impl<'a> Packer<'a> {
    fn new(rt: &'a Runtime) -> Self {
        Self {
            rt,
            cells: Vec::new(),
            worklets: Vec::new(),
        }
    }

    fn pack(&mut self, value: Value) -> Result<Shared> {
        match value {
            Value::Leaf(scalar) => {
                if !scalar.is_transportable() {
                    return Err(Error::NotTransportable {
                        reason: format!("{scalar:?} has no source representation"),
                    });
                }
                Ok(Shared::Leaf(self.alloc(CellContent::Leaf(scalar))))
            }
            Value::Sequence(items) => {
                let children = items
                    .into_iter()
                    .map(|item| self.pack(item))
                    .collect::<Result<Vec<_>>>()?;
                let ids = children.iter().map(|child| child.cell().id()).collect();
                let cell = self.alloc(CellContent::Sequence(ids));
                Ok(Shared::Sequence(cell, children))
            }
            Value::Record(fields) => {
                let children = fields
                    .into_iter()
                    .map(|(name, field)| -> Result<(String, Shared)> { Ok((name, self.pack(field)?)) })
                    .collect::<Result<indexmap::IndexMap<_, _>>>()?;
                let ids = children
                    .iter()
                    .map(|(name, child)| (name.clone(), child.cell().id()))
                    .collect();
                let cell = self.alloc(CellContent::Record(ids));
                Ok(Shared::Record(cell, children))
            }
            Value::Callable(body) => {
                let (worklet, owned) = self.rt.wrap(body)?;
                if owned {
                    self.worklets.push(worklet.id());
                }
                let cell = self.alloc(CellContent::Worklet(worklet.id()));
                Ok(Shared::Worklet(cell, worklet))
            }
            Value::Shared(shared) => {
                if !self.rt.owns(shared.cell().runtime_ref()) {
                    return Err(Error::ForeignRuntime);
                }
                if !shared.cell().is_alive() {
                    return Err(Error::UseAfterRelease(Resource::Cell(shared.cell().id())));
                }
                Ok(shared)
            }
        }
    }

    fn alloc(&mut self, content: CellContent) -> Cell {
        let id = self.rt.alloc_cell(content);
        self.cells.push(id);
        Cell::new(id, self.rt.downgrade())
    }

    fn finish(self, roots: Vec<Shared>) -> Package {
        Package {
            roots,
            cells: self.cells,
            worklets: self.worklets,
            alive: true,
            rt: self.rt.downgrade(),
        }
    }
}

impl Runtime {
    /// Package one value into a tree of cells.
    pub fn create(&self, value: Value) -> Result<Package> {
        self.create_all(vec![value])
    }

    /// Package a list of values, typically the arguments of a worklet.
    ///
    /// On failure every cell and worklet created so far is released again.
    pub fn create_all(&self, values: Vec<Value>) -> Result<Package> {
        let mut packer = Packer::new(self);
        let mut roots = Vec::with_capacity(values.len());
        let mut failure = None;
        for value in values {
            match packer.pack(value) {
                Ok(root) => roots.push(root),
                Err(err) => {
                    failure = Some(err);
                    break;
                }
            }
        }

        let mut package = packer.finish(roots);
        match failure {
            None => {
                trace!(
                    cells = package.owned_cells(),
                    worklets = package.owned_worklets(),
                    "values packaged"
                );
                Ok(package)
            }
            Some(err) => {
                debug!(error = %err, "packaging failed, unwinding");
                if let Err(release_err) = package.release() {
                    warn!(error = %release_err, "unwinding a failed packaging left resources behind");
                }
                Err(err)
            }
        }
    }
}
