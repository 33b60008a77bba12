//! Continuous invocation
//!
//! A [`Registration`] owns a packaged argument list and a worklet body and
//! drives the body with one of three activation strategies:
//!
//! - [`Repeat`]: invoked once per frame until it returns `true`
//! - [`Mapping`]: re-evaluated whenever one of its argument cells is written
//! - [`EventHandler`]: invoked for every dispatched event
//!
//! Registrations start inactive. `start` and `stop` are idempotent.
//! Tearing a registration down stops it, releases its arguments, and
//! releases the body if the registration wrapped it itself.

mod event;
mod mapping;
mod repeat;

use std::fmt;
use std::sync::Weak;

use tracing::{debug, warn};

use crate::error::Result;
use crate::runtime::{Runtime, RuntimeInner};
use crate::shared::{Package, Shared};
use crate::value::Value;
use crate::worklet::{Body, Worklet};

pub use event::EventHandler;
pub use mapping::Mapping;
pub use repeat::Repeat;

/// A strategy for invoking a registration's body.
pub trait Activation: Send + Default {
    /// Name used in logs.
    const KIND: &'static str;

    fn start(&mut self, rt: &Runtime, body: &Worklet, args: &[Shared]) -> Result<()>;

    fn stop(&mut self, rt: &Runtime) -> Result<()>;

    fn is_active(&self, rt: &Runtime) -> bool;

    /// Whether the body is being evaluated by this activation right now.
    fn evaluating(&self) -> bool {
        false
    }
}

/// A body plus its packaged arguments, driven by an [`Activation`].
pub struct Registration<A: Activation> {
    rt: Weak<RuntimeInner>,
    body: Worklet,
    owns_body: bool,
    args: Package,
    activation: A,
    torn_down: bool,
}

impl<A: Activation> Registration<A> {
    /// Start invoking the body. Starting an active registration does nothing.
    pub fn start(&mut self) -> Result<()> {
        let rt = Runtime::upgrade(&self.rt)?;
        if self.activation.is_active(&rt) {
            return Ok(());
        }
        debug!(kind = A::KIND, worklet = %self.body.id(), "starting");
        self.activation.start(&rt, &self.body, self.args.roots())
    }

    /// Stop invoking the body. Stopping an inactive registration does nothing.
    pub fn stop(&mut self) -> Result<()> {
        let rt = Runtime::upgrade(&self.rt)?;
        self.activation.stop(&rt)
    }

    pub fn is_active(&self) -> bool {
        Runtime::upgrade(&self.rt)
            .map(|rt| self.activation.is_active(&rt))
            .unwrap_or(false)
    }

    /// Register the body's completion listener.
    pub fn set_listener<F>(&self, listener: F) -> Result<()>
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.body.set_listener(listener)
    }

    pub fn body(&self) -> &Worklet {
        &self.body
    }

    pub fn args(&self) -> &[Shared] {
        self.args.roots()
    }

    /// Whether the body was wrapped by this registration and is released
    /// with it.
    pub fn owns_body(&self) -> bool {
        self.owns_body
    }

    pub fn activation(&self) -> &A {
        &self.activation
    }

    /// Stop the registration and release what it owns.
    ///
    /// Must not be called from within this registration's own evaluation.
    pub fn teardown(mut self) -> Result<()> {
        self.shutdown()
    }

    fn shutdown(&mut self) -> Result<()> {
        if self.torn_down {
            return Ok(());
        }
        self.torn_down = true;

        if self.activation.evaluating() {
            warn!(
                kind = A::KIND,
                worklet = %self.body.id(),
                "registration torn down during its own evaluation"
            );
        }

        // Nothing is left to release once the runtime is gone.
        let Ok(rt) = Runtime::upgrade(&self.rt) else {
            return Ok(());
        };

        let mut first_error = self.activation.stop(&rt).err();
        if let Err(err) = self.args.release() {
            first_error.get_or_insert(err);
        }
        if self.owns_body {
            if let Err(err) = self.body.release() {
                first_error.get_or_insert(err);
            }
        }
        debug!(kind = A::KIND, worklet = %self.body.id(), "registration torn down");
        first_error.map_or(Ok(()), Err)
    }
}

impl<A: Activation> Drop for Registration<A> {
    fn drop(&mut self) {
        if let Err(err) = self.shutdown() {
            warn!(kind = A::KIND, error = %err, "teardown on drop failed");
        }
    }
}

impl<A: Activation> fmt::Debug for Registration<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("kind", &A::KIND)
            .field("body", &self.body)
            .field("owns_body", &self.owns_body)
            .field("active", &self.is_active())
            .finish()
    }
}

impl Runtime {
    /// Register `body` to run once per frame with `args`.
    pub fn repeat(&self, body: impl Into<Body>, args: Vec<Value>) -> Result<Registration<Repeat>> {
        self.registration(body, args)
    }

    /// Register `body` as a mapper over the cells of `args`.
    pub fn mapper(&self, body: impl Into<Body>, args: Vec<Value>) -> Result<Registration<Mapping>> {
        self.registration(body, args)
    }

    /// Register `body` as an event handler with `args` as its context.
    pub fn event_handler(
        &self,
        body: impl Into<Body>,
        args: Vec<Value>,
    ) -> Result<Registration<EventHandler>> {
        self.registration(body, args)
    }

    fn registration<A: Activation>(
        &self,
        body: impl Into<Body>,
        args: Vec<Value>,
    ) -> Result<Registration<A>> {
        // Arguments first, so a packaging failure leaves the body untouched.
        let args = self.create_all(args)?;
        let (body, owns_body) = self.wrap(body)?;
        Ok(Registration {
            rt: self.downgrade(),
            body,
            owns_body,
            args,
            activation: A::default(),
            torn_down: false,
        })
    }
}
