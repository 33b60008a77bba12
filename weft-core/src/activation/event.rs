use tracing::trace;

use crate::activation::{Activation, Registration};
use crate::error::Result;
use crate::runtime::Runtime;
use crate::shared::Shared;
use crate::value::Value;
use crate::worklet::Worklet;

/// Invokes the body for every event dispatched while started.
#[derive(Debug, Default)]
pub struct EventHandler {
    started: bool,
}

impl Activation for EventHandler {
    const KIND: &'static str = "event";

    fn start(&mut self, _rt: &Runtime, _body: &Worklet, _args: &[Shared]) -> Result<()> {
        self.started = true;
        Ok(())
    }

    fn stop(&mut self, _rt: &Runtime) -> Result<()> {
        self.started = false;
        Ok(())
    }

    fn is_active(&self, _rt: &Runtime) -> bool {
        self.started
    }
}

impl Registration<EventHandler> {
    /// Deliver an event to the body.
    ///
    /// Returns `None` without running the body if the handler is stopped.
    pub fn dispatch(&self, payload: impl Into<Value>) -> Result<Option<Value>> {
        if !self.activation.started {
            trace!(worklet = %self.body.id(), "event dropped; handler stopped");
            return Ok(None);
        }
        let payload = payload.into();
        self.body
            .invoke_with_event(self.args.roots(), &payload)
            .map(Some)
    }
}
