use std::sync::Arc;

use crate::activation::{Activation, Registration};
use crate::error::Result;
use crate::ids::RepeatId;
use crate::runtime::Runtime;
use crate::shared::Shared;
use crate::worklet::Worklet;

/// Runs the body once per frame until it returns `true`.
///
/// A finished repeat is inactive and can be started again.
#[derive(Debug, Default)]
pub struct Repeat {
    enrollment: Option<RepeatId>,
}

impl Activation for Repeat {
    const KIND: &'static str = "repeat";

    fn start(&mut self, rt: &Runtime, body: &Worklet, args: &[Shared]) -> Result<()> {
        self.enrollment = Some(rt.enroll(body.clone(), Arc::from(args)));
        Ok(())
    }

    fn stop(&mut self, rt: &Runtime) -> Result<()> {
        if let Some(id) = self.enrollment.take() {
            rt.unenroll(id);
        }
        Ok(())
    }

    fn is_active(&self, rt: &Runtime) -> bool {
        self.enrollment.is_some_and(|id| rt.is_enrolled(id))
    }
}

impl Registration<Repeat> {
    pub fn enrollment(&self) -> Option<RepeatId> {
        self.activation.enrollment
    }
}
