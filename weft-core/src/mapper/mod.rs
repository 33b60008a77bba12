//! Mappers
//!
//! A mapper is a worklet re-evaluated whenever any cell it reads is written.
//! Its dependencies are every cell of every argument tree, flattened in
//! pre-order when it is registered.
//!
//! # How It Works
//!
//! 1. Registration checks that every dependency is alive, evaluates the
//!    mapper once, then subscribes it to its dependencies.
//!
//! 2. A write to a dependency enqueues the mapper in the current batch,
//!    unless it is already queued or is the mapper doing the writing.
//!
//! 3. The batch drains in FIFO order. A mapper stopped while queued is
//!    skipped when its turn comes. A mapper that already ran is queued
//!    again if a later mapper writes one of its dependencies.

mod handle;
mod registry;

use std::sync::Arc;

use indexmap::IndexSet;
use tracing::debug;

use crate::error::{Error, Resource, Result};
use crate::ids::{CellId, MapperId};
use crate::runtime::Runtime;
use crate::shared::Shared;
use crate::worklet::Worklet;

pub use handle::MapperHandle;

pub(crate) use registry::{MapperJob, MapperRegistry, MapperSlot};

impl Runtime {
    /// Register `worklet` as a mapper over `args`.
    ///
    /// The mapper is evaluated once before this returns. If that evaluation
    /// fails, nothing is registered.
    pub fn register_mapper(&self, worklet: &Worklet, args: &[Shared]) -> Result<MapperHandle> {
        if !self.owns(worklet.runtime_ref())
            || args.iter().any(|arg| !self.owns(arg.cell().runtime_ref()))
        {
            return Err(Error::ForeignRuntime);
        }

        let mut dependencies = IndexSet::<CellId>::new();
        for arg in args {
            arg.collect_ids(&mut dependencies);
        }
        let released = self.with_state(|state| {
            dependencies
                .iter()
                .find(|id| !state.cells.contains_key(*id))
                .copied()
        });
        if let Some(id) = released {
            return Err(Error::UseAfterRelease(Resource::Cell(id)));
        }

        let job = MapperJob {
            id: MapperId::new(),
            worklet: worklet.clone(),
            args: Arc::from(args),
        };
        self.evaluate_mapper(&job)?;

        // The first evaluation may have released some of its inputs.
        self.with_state(|state| {
            let dependencies = dependencies
                .into_iter()
                .filter(|id| state.cells.contains_key(id))
                .collect();
            state.mappers.insert(
                job.id,
                MapperSlot {
                    worklet: job.worklet.clone(),
                    args: Arc::clone(&job.args),
                    dependencies,
                },
            );
        });

        debug!(mapper = %job.id, worklet = %worklet.id(), "mapper registered");
        Ok(MapperHandle::new(job.id, self.downgrade()))
    }
}
