//! Values
//!
//! Two layers of values exist. A [`Scalar`] is a leaf: the only kind of data
//! a cell can hold directly and the only kind that is pushed to a render
//! target. A [`Value`] is what the control side builds before packaging: a
//! tree of scalars, sequences, records and callables, possibly with subtrees
//! that are already shared.
//!
//! The variants of [`Value`] are the packaging tag: leaf, sequence, record,
//! callable or already shared. Packaging matches on them exactly once
//! instead of probing a value's shape at every use site.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::shared::Shared;
use crate::worklet::{Body, Callable, Worklet};

/// A leaf value.
///
/// `Unset` is the canonical "absent" value. Property diffs use it to say that
/// a key was removed, and installation uses it for an undefined slot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    #[default]
    Unset,
    Bool(bool),
    Number(f64),
    Text(String),
}

impl Scalar {
    /// Name of the variant, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Scalar::Unset => "unset",
            Scalar::Bool(_) => "bool",
            Scalar::Number(_) => "number",
            Scalar::Text(_) => "text",
        }
    }

    pub fn is_unset(&self) -> bool {
        matches!(self, Scalar::Unset)
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Scalar::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Scalar::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Scalar::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Whether the scalar can cross the execution boundary.
    ///
    /// Non-finite numbers have no source representation.
    pub fn is_transportable(&self) -> bool {
        match self {
            Scalar::Number(n) => n.is_finite(),
            _ => true,
        }
    }

    /// Source text used when installing this scalar on the execution side.
    ///
    /// Returns `None` for scalars that are not transportable.
    pub fn to_source(&self) -> Option<String> {
        match self {
            Scalar::Unset => Some("{}".to_string()),
            Scalar::Bool(b) => Some(b.to_string()),
            Scalar::Number(n) if n.is_finite() => Some(n.to_string()),
            Scalar::Number(_) => None,
            Scalar::Text(s) => serde_json::to_string(s).ok(),
        }
    }
}

impl From<f64> for Scalar {
    fn from(n: f64) -> Self {
        Scalar::Number(n)
    }
}

impl From<i32> for Scalar {
    fn from(n: i32) -> Self {
        Scalar::Number(f64::from(n))
    }
}

impl From<bool> for Scalar {
    fn from(b: bool) -> Self {
        Scalar::Bool(b)
    }
}

impl From<&str> for Scalar {
    fn from(s: &str) -> Self {
        Scalar::Text(s.to_string())
    }
}

impl From<String> for Scalar {
    fn from(s: String) -> Self {
        Scalar::Text(s)
    }
}

/// A control-side value, before or after packaging.
///
/// The variant is the packaging tag; packaging dispatches on it once.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// A scalar; packaged into a single leaf cell.
    Leaf(Scalar),
    /// An ordered sequence; every element gets its own cell.
    Sequence(Vec<Value>),
    /// A record with ordered fields; every field gets its own cell.
    Record(IndexMap<String, Value>),
    /// A plain callable or an already wrapped worklet.
    Callable(Body),
    /// A subtree that was packaged earlier and is reused as-is.
    Shared(Shared),
}

impl Value {
    /// The unset scalar.
    pub fn unset() -> Self {
        Value::Leaf(Scalar::Unset)
    }

    /// Build a record from `(name, value)` pairs, keeping their order.
    pub fn record<K, V, I>(fields: I) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        Value::Record(
            fields
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Build a sequence from values.
    pub fn sequence<V, I>(items: I) -> Self
    where
        V: Into<Value>,
        I: IntoIterator<Item = V>,
    {
        Value::Sequence(items.into_iter().map(Into::into).collect())
    }

    /// Name of the variant, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Leaf(s) => s.kind(),
            Value::Sequence(_) => "sequence",
            Value::Record(_) => "record",
            Value::Callable(_) => "callable",
            Value::Shared(_) => "shared",
        }
    }

    pub fn as_scalar(&self) -> Option<&Scalar> {
        match self {
            Value::Leaf(s) => Some(s),
            _ => None,
        }
    }

    /// Whether this is the boolean `true`.
    ///
    /// Repeating worklets return `true` to signal completion.
    pub fn is_true(&self) -> bool {
        matches!(self, Value::Leaf(Scalar::Bool(true)))
    }
}

impl Default for Value {
    fn default() -> Self {
        Value::unset()
    }
}

impl From<Scalar> for Value {
    fn from(s: Scalar) -> Self {
        Value::Leaf(s)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Leaf(n.into())
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Leaf(n.into())
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Leaf(b.into())
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Leaf(s.into())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Leaf(s.into())
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Sequence(items)
    }
}

impl From<IndexMap<String, Value>> for Value {
    fn from(fields: IndexMap<String, Value>) -> Self {
        Value::Record(fields)
    }
}

impl From<Body> for Value {
    fn from(body: Body) -> Self {
        Value::Callable(body)
    }
}

impl From<Callable> for Value {
    fn from(callable: Callable) -> Self {
        Value::Callable(Body::Plain(callable))
    }
}

impl From<Worklet> for Value {
    fn from(worklet: Worklet) -> Self {
        Value::Callable(Body::Wrapped(worklet))
    }
}

impl From<Shared> for Value {
    fn from(shared: Shared) -> Self {
        Value::Shared(shared)
    }
}
