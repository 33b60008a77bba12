//! Runtime
//!
//! The runtime is the execution context. It owns every cell and worklet,
//! the mapper registry, the batch that coalesces mapper re-evaluations, the
//! frame clock that drives repeating worklets, and the bound transport.
//!
//! # How It Works
//!
//! 1. The control side packages values into cells and wraps callables into
//!    worklets.
//!
//! 2. Mappers are registered over the cells of their arguments. Registration
//!    evaluates the mapper once, then subscribes it.
//!
//! 3. A write to a cell enqueues every subscribed mapper into the current
//!    batch and, unless a batch is open or already draining, drains it
//!    before returning.
//!
//! 4. Each frame, the frame clock invokes every enrolled repeating worklet
//!    once. A worklet that returns `true` is unenrolled and its listener
//!    fires.
//!
//! # Thread Safety
//!
//! All state sits behind one mutex. The lock is never held while user code
//! runs (worklets, listeners, render targets, transports), so user code may
//! call back into the runtime freely.

mod batch;
mod context;
mod frame;

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::debug;

use crate::config::RuntimeConfig;
use crate::error::{Error, Result};
use crate::ids::{CellId, WorkletId};
use crate::mapper::MapperRegistry;
use crate::shared::CellSlot;
use crate::transport::Transport;
use crate::worklet::WorkletSlot;

pub use context::EvaluationContext;

pub(crate) use batch::Batch;
pub(crate) use frame::FrameClock;

/// Shared state of a runtime. Handles keep a weak reference to it.
pub struct RuntimeInner {
    config: RuntimeConfig,
    state: Mutex<State>,
}

#[derive(Default)]
pub(crate) struct State {
    pub(crate) cells: HashMap<CellId, CellSlot>,
    pub(crate) worklets: HashMap<WorkletId, WorkletSlot>,
    pub(crate) mappers: MapperRegistry,
    pub(crate) batch: Batch,
    pub(crate) frames: FrameClock,
    pub(crate) transport: Option<Arc<dyn Transport>>,
}

/// Counts of live resources, for diagnostics and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RuntimeStats {
    pub cells: usize,
    pub worklets: usize,
    pub mappers: usize,
    pub repeats: usize,
}

/// Handle to an execution context.
///
/// Cloning is cheap and yields a handle to the same runtime.
#[derive(Clone)]
pub struct Runtime {
    inner: Arc<RuntimeInner>,
}

impl Runtime {
    /// Create a runtime with the default configuration.
    pub fn new() -> Self {
        Self::with_config(RuntimeConfig::default())
    }

    pub fn with_config(config: RuntimeConfig) -> Self {
        debug!(?config, "runtime created");
        Self {
            inner: Arc::new(RuntimeInner {
                config,
                state: Mutex::new(State::default()),
            }),
        }
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.inner.config
    }

    /// Counts of live cells, worklets, mappers and frame-loop enrollments.
    pub fn stats(&self) -> RuntimeStats {
        self.with_state(|state| RuntimeStats {
            cells: state.cells.len(),
            worklets: state.worklets.len(),
            mappers: state.mappers.len(),
            repeats: state.frames.len(),
        })
    }

    pub(crate) fn downgrade(&self) -> Weak<RuntimeInner> {
        Arc::downgrade(&self.inner)
    }

    pub(crate) fn upgrade(weak: &Weak<RuntimeInner>) -> Result<Self> {
        weak.upgrade()
            .map(|inner| Self { inner })
            .ok_or(Error::RuntimeDropped)
    }

    /// Whether a handle's weak reference points at this runtime.
    pub(crate) fn owns(&self, weak: &Weak<RuntimeInner>) -> bool {
        std::ptr::eq(Arc::as_ptr(&self.inner), weak.as_ptr())
    }

    /// Run `f` with the state locked.
    ///
    /// `f` must not call user code or anything that locks the state again.
    pub(crate) fn with_state<R>(&self, f: impl FnOnce(&mut State) -> R) -> R {
        let mut guard = self.inner.state.lock();
        f(&mut guard)
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("config", &self.inner.config)
            .field("stats", &self.stats())
            .finish()
    }
}
