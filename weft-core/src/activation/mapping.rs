use crate::activation::{Activation, Registration};
use crate::error::Result;
use crate::mapper::MapperHandle;
use crate::runtime::{EvaluationContext, Runtime};
use crate::shared::Shared;
use crate::worklet::Worklet;

/// Re-evaluates the body whenever one of its argument cells is written.
///
/// Starting evaluates the body once.
#[derive(Debug, Default)]
pub struct Mapping {
    handle: Option<MapperHandle>,
}

impl Activation for Mapping {
    const KIND: &'static str = "mapper";

    fn start(&mut self, rt: &Runtime, body: &Worklet, args: &[Shared]) -> Result<()> {
        self.handle = Some(rt.register_mapper(body, args)?);
        Ok(())
    }

    fn stop(&mut self, _rt: &Runtime) -> Result<()> {
        if let Some(handle) = self.handle.take() {
            handle.stop();
        }
        Ok(())
    }

    fn is_active(&self, _rt: &Runtime) -> bool {
        self.handle.as_ref().is_some_and(MapperHandle::is_active)
    }

    fn evaluating(&self) -> bool {
        self.handle
            .as_ref()
            .is_some_and(|handle| EvaluationContext::is_evaluating(handle.id()))
    }
}

impl Registration<Mapping> {
    /// The mapper backing this registration while it is started.
    pub fn mapper(&self) -> Option<&MapperHandle> {
        self.activation.handle.as_ref()
    }
}
