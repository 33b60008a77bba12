//! Worklets
//!
//! A worklet is a callable packaged so that it can run on the execution
//! context. The control side describes the computation as a [`Callable`]
//! (its source text plus the Rust closure that implements it); wrapping
//! registers it with the runtime and yields a [`Worklet`] handle.
//!
//! # Deployment
//!
//! The first time a worklet is invoked while a transport is bound, its source
//! text is deployed through the transport exactly once. Invocation itself is
//! always synchronous on the calling thread.
//!
//! # Ownership
//!
//! Wrapping is idempotent: wrapping a [`Body::Wrapped`] returns the same
//! worklet and reports that the caller does not own it. Only worklets the
//! runtime wrapped on the caller's behalf are released along with their
//! registration.
//!
//! # Listener
//!
//! Each worklet has one listener slot, fired when the worklet signals
//! completion. The slot accepts at most one listener; registering a second
//! one fails instead of replacing the first.

mod callable;
mod handle;
mod listener;

pub use callable::{Body, Callable, Invocation, WorkletFn};
pub use handle::Worklet;
pub use listener::{Listener, ListenerSlot};

pub(crate) use handle::WorkletSlot;
