//! Packaged handle trees.

use indexmap::{IndexMap, IndexSet};

use crate::error::{Error, Result};
use crate::ids::CellId;
use crate::shared::Cell;
use crate::value::{Scalar, Value};
use crate::worklet::{Body, Worklet};

/// A packaged value: a tree of cells mirroring the shape of the original.
///
/// Every node has its own cell. This is what worklets receive as arguments.
#[derive(Debug, Clone, PartialEq)]
pub enum Shared {
    Leaf(Cell),
    Sequence(Cell, Vec<Shared>),
    Record(Cell, IndexMap<String, Shared>),
    Worklet(Cell, Worklet),
}

impl Shared {
    /// The cell backing this node.
    pub fn cell(&self) -> &Cell {
        match self {
            Shared::Leaf(cell)
            | Shared::Sequence(cell, _)
            | Shared::Record(cell, _)
            | Shared::Worklet(cell, _) => cell,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Shared::Leaf(_) => "leaf",
            Shared::Sequence(..) => "sequence",
            Shared::Record(..) => "record",
            Shared::Worklet(..) => "worklet",
        }
    }

    /// Read the current scalar of a leaf node.
    pub fn read(&self) -> Result<Scalar> {
        match self {
            Shared::Leaf(cell) => cell.read(),
            other => Err(Error::TypeMismatch {
                expected: "leaf",
                found: other.kind(),
            }),
        }
    }

    /// Read the current value of a numeric leaf node.
    pub fn number(&self) -> Result<f64> {
        match self.read()? {
            Scalar::Number(n) => Ok(n),
            other => Err(Error::TypeMismatch {
                expected: "number",
                found: other.kind(),
            }),
        }
    }

    /// Write a leaf node.
    pub fn write(&self, value: impl Into<Scalar>) -> Result<()> {
        match self {
            Shared::Leaf(cell) => cell.write(value),
            other => Err(Error::TypeMismatch {
                expected: "leaf",
                found: other.kind(),
            }),
        }
    }

    /// Look up a field of a record node.
    pub fn field(&self, name: &str) -> Result<&Shared> {
        match self {
            Shared::Record(_, fields) => fields.get(name).ok_or_else(|| Error::MissingField {
                name: name.to_string(),
            }),
            other => Err(Error::TypeMismatch {
                expected: "record",
                found: other.kind(),
            }),
        }
    }

    /// Look up an element of a sequence node.
    pub fn item(&self, index: usize) -> Result<&Shared> {
        match self {
            Shared::Sequence(_, items) => items.get(index).ok_or_else(|| Error::MissingField {
                name: format!("[{index}]"),
            }),
            other => Err(Error::TypeMismatch {
                expected: "sequence",
                found: other.kind(),
            }),
        }
    }

    /// The worklet of a callable node.
    pub fn worklet(&self) -> Result<&Worklet> {
        match self {
            Shared::Worklet(_, worklet) => Ok(worklet),
            other => Err(Error::TypeMismatch {
                expected: "worklet",
                found: other.kind(),
            }),
        }
    }

    /// All cells of the tree, parents before children.
    pub fn cells(&self) -> Vec<Cell> {
        let mut out = Vec::new();
        self.walk(&mut |cell| out.push(cell.clone()));
        out
    }

    /// Collect the tree's cell IDs into `out`, keeping first-seen order.
    pub(crate) fn collect_ids(&self, out: &mut IndexSet<CellId>) {
        self.walk(&mut |cell| {
            out.insert(cell.id());
        });
    }

    fn walk(&self, visit: &mut impl FnMut(&Cell)) {
        visit(self.cell());
        match self {
            Shared::Leaf(_) | Shared::Worklet(..) => {}
            Shared::Sequence(_, items) => items.iter().for_each(|item| item.walk(visit)),
            Shared::Record(_, fields) => fields.values().for_each(|field| field.walk(visit)),
        }
    }

    /// Rebuild a plain [`Value`] from the current contents of the tree.
    ///
    /// Leaves are read from their cells, so this reflects writes made after
    /// packaging. Callable nodes come back as their wrapped worklet.
    pub fn to_value(&self) -> Result<Value> {
        match self {
            Shared::Leaf(cell) => cell.read().map(Value::Leaf),
            Shared::Sequence(_, items) => items
                .iter()
                .map(Shared::to_value)
                .collect::<Result<Vec<_>>>()
                .map(Value::Sequence),
            Shared::Record(_, fields) => fields
                .iter()
                .map(|(name, field)| -> Result<(String, Value)> {
                    Ok((name.clone(), field.to_value()?))
                })
                .collect::<Result<IndexMap<_, _>>>()
                .map(Value::Record),
            Shared::Worklet(cell, worklet) => {
                cell.content()?;
                Ok(Value::Callable(Body::Wrapped(worklet.clone())))
            }
        }
    }
}
