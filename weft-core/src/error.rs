//! Error types for the runtime.
//!
//! Every failure in this crate is immediate and synchronous; nothing is
//! retried. Registering or stopping something twice is not an error, and a
//! write that reaches a mapper which was already stopped is silently dropped.

use std::fmt;

use crate::ids::{CellId, WorkletId};

/// A resource that can be released.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Cell(CellId),
    Worklet(WorkletId),
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resource::Cell(id) => id.fmt(f),
            Resource::Worklet(id) => id.fmt(f),
        }
    }
}

/// Errors produced by the runtime.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A released cell or worklet was read, written, invoked or released again.
    #[error("use after release: {0}")]
    UseAfterRelease(Resource),

    /// A value cannot be packaged for the execution context.
    #[error("value is not transportable: {reason}")]
    NotTransportable { reason: String },

    /// A leaf write or read was attempted on a cell holding a sequence,
    /// record or worklet.
    #[error("{0} does not hold a leaf value")]
    NotALeaf(CellId),

    /// The worklet's single listener slot is already taken.
    #[error("{0} already has a completion listener")]
    ListenerOccupied(WorkletId),

    /// A worklet asked for an argument that was not supplied.
    #[error("missing argument at index {index}")]
    MissingArgument { index: usize },

    /// A record has no field with the requested name.
    #[error("missing field `{name}`")]
    MissingField { name: String },

    /// A shared value or scalar has a different shape than expected.
    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },

    /// A handle created by one runtime was passed to another.
    #[error("handle belongs to a different runtime")]
    ForeignRuntime,

    /// A drain ran more mappers than the configured limit allows, which
    /// means mappers keep re-triggering each other.
    #[error("batch stopped after {runs} mapper runs; mappers likely form a cycle")]
    BatchLimit { runs: usize },

    /// The runtime that created a handle no longer exists.
    #[error("runtime has been dropped")]
    RuntimeDropped,

    /// The runtime configuration could not be parsed.
    #[error("invalid configuration: {0}")]
    Config(#[from] serde_json::Error),

    /// A property update could not be encoded for the wire.
    #[error("failed to encode property update: {0}")]
    Encode(#[from] rmp_serde::encode::Error),

    /// A property update could not be decoded from the wire.
    #[error("failed to decode property update: {0}")]
    Decode(#[from] rmp_serde::decode::Error),
}

/// Result alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
    /// Whether this error reports a use of a released resource.
    pub fn is_use_after_release(&self) -> bool {
        matches!(self, Error::UseAfterRelease(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn use_after_release_names_the_resource() {
        let id = CellId::new();
        let err = Error::UseAfterRelease(Resource::Cell(id));
        assert!(err.is_use_after_release());
        assert_eq!(err.to_string(), format!("use after release: {id}"));
    }

    #[test]
    fn config_errors_convert() {
        let parse = serde_json::from_str::<u32>("nope").unwrap_err();
        let err: Error = parse.into();
        assert!(matches!(err, Error::Config(_)));
        assert!(!err.is_use_after_release());
    }
}
