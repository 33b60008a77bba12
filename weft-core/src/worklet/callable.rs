//! Callables, bodies and the invocation context.

use std::fmt;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::runtime::Runtime;
use crate::shared::Shared;
use crate::value::Value;
use crate::worklet::Worklet;

/// Signature of a worklet's implementation.
pub type WorkletFn = dyn Fn(&Invocation<'_>) -> Result<Value> + Send + Sync;

/// A plain callable: source text plus the closure that implements it.
///
/// The source text is the callable's transportable form; it is what gets
/// deployed to the execution side.
#[derive(Clone)]
pub struct Callable {
    source: Arc<str>,
    func: Arc<WorkletFn>,
}

impl Callable {
    pub fn new<F>(source: impl Into<Arc<str>>, func: F) -> Self
    where
        F: Fn(&Invocation<'_>) -> Result<Value> + Send + Sync + 'static,
    {
        Self {
            source: source.into(),
            func: Arc::new(func),
        }
    }

    /// The callable's source text.
    pub fn source(&self) -> &str {
        &self.source
    }

    pub(crate) fn shared_source(&self) -> Arc<str> {
        Arc::clone(&self.source)
    }

    pub(crate) fn func(&self) -> Arc<WorkletFn> {
        Arc::clone(&self.func)
    }
}

impl PartialEq for Callable {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(
            Arc::as_ptr(&self.func) as *const (),
            Arc::as_ptr(&other.func) as *const (),
        )
    }
}

impl fmt::Debug for Callable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callable")
            .field("source", &self.source)
            .finish_non_exhaustive()
    }
}

/// Something that can be run as a worklet: either still plain, or wrapped.
#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    Plain(Callable),
    Wrapped(Worklet),
}

impl From<Callable> for Body {
    fn from(callable: Callable) -> Self {
        Body::Plain(callable)
    }
}

impl From<Worklet> for Body {
    fn from(worklet: Worklet) -> Self {
        Body::Wrapped(worklet)
    }
}

/// Context handed to a worklet when it runs.
pub struct Invocation<'a> {
    runtime: &'a Runtime,
    args: &'a [Shared],
    event: Option<&'a Value>,
}

impl<'a> Invocation<'a> {
    pub(crate) fn new(runtime: &'a Runtime, args: &'a [Shared], event: Option<&'a Value>) -> Self {
        Self {
            runtime,
            args,
            event,
        }
    }

    /// The runtime the worklet runs on.
    pub fn runtime(&self) -> &'a Runtime {
        self.runtime
    }

    /// All arguments.
    pub fn args(&self) -> &'a [Shared] {
        self.args
    }

    /// The argument at `index`.
    pub fn arg(&self, index: usize) -> Result<&'a Shared> {
        self.args
            .get(index)
            .ok_or(Error::MissingArgument { index })
    }

    /// The event payload, for worklets run as event handlers.
    pub fn event(&self) -> Option<&'a Value> {
        self.event
    }
}
