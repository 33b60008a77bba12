//! Write batching and the drain loop.
//!
//! A write enqueues every mapper subscribed to the written cell. The queue
//! drains once the outermost write (or [`Runtime::batch`]) finishes, in
//! FIFO order.
//!
//! A mapper sits in the queue at most once. Writes made while the batch is
//! open collapse into a single run per subscriber. Once a mapper has been
//! popped it can be queued again, so a write made by one mapper while the
//! batch drains reaches every subscriber, including those that already ran.
//!
//! A mapper's writes to its own dependencies never re-queue it. Mappers that
//! feed each other can still loop, so a drain stops with
//! [`Error::BatchLimit`] after [`RuntimeConfig::max_batch_runs`] runs.
//!
//! [`RuntimeConfig::max_batch_runs`]: crate::RuntimeConfig::max_batch_runs

use std::collections::{HashSet, VecDeque};

use tracing::{debug, trace, warn};

use crate::error::{Error, Resource, Result};
use crate::ids::{CellId, MapperId};
use crate::mapper::MapperJob;
use crate::runtime::{EvaluationContext, Runtime};
use crate::shared::CellContent;
use crate::value::Scalar;

#[derive(Debug, Default)]
pub(crate) struct Batch {
    depth: usize,
    draining: bool,
    queue: VecDeque<MapperId>,
    queued: HashSet<MapperId>,
}

impl Batch {
    /// Queue `mapper` unless it is already waiting in the queue.
    pub(crate) fn enqueue(&mut self, mapper: MapperId) -> bool {
        if !self.queued.insert(mapper) {
            return false;
        }
        self.queue.push_back(mapper);
        true
    }

    /// Take responsibility for draining. Only one caller wins, and only once
    /// no batch is open.
    pub(crate) fn claim_drain(&mut self) -> bool {
        if self.depth > 0 || self.draining || self.queue.is_empty() {
            return false;
        }
        self.draining = true;
        true
    }

    pub(crate) fn is_open(&self) -> bool {
        self.depth > 0 || self.draining
    }

    fn next(&mut self) -> Option<MapperId> {
        let mapper = self.queue.pop_front()?;
        self.queued.remove(&mapper);
        Some(mapper)
    }

    fn finish(&mut self) {
        self.draining = false;
        self.queue.clear();
        self.queued.clear();
    }
}

/// Keeps a batch open until dropped.
struct OpenBatch<'a> {
    rt: &'a Runtime,
}

impl<'a> OpenBatch<'a> {
    fn new(rt: &'a Runtime) -> Self {
        rt.with_state(|state| state.batch.depth += 1);
        Self { rt }
    }
}

impl Drop for OpenBatch<'_> {
    fn drop(&mut self) {
        self.rt.with_state(|state| state.batch.depth -= 1);
    }
}

/// Resets the drain flag if a mapper panics mid-drain.
struct Draining<'a> {
    rt: &'a Runtime,
}

impl Drop for Draining<'_> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            self.rt.with_state(|state| state.batch.finish());
        }
    }
}

impl Runtime {
    /// Run `f` with writes batched.
    ///
    /// Mappers subscribed to cells written inside `f` run once, after `f`
    /// returns. Batches nest; only the outermost one drains.
    pub fn batch<R>(&self, f: impl FnOnce() -> R) -> Result<R> {
        let out = {
            let _open = OpenBatch::new(self);
            f()
        };
        if self.with_state(|state| state.batch.claim_drain()) {
            self.drain()?;
        }
        Ok(out)
    }

    /// Whether a batch is open or draining.
    pub fn is_batching(&self) -> bool {
        self.with_state(|state| state.batch.is_open())
    }

    pub(crate) fn write_cell(&self, id: CellId, value: Scalar) -> Result<()> {
        let drain = self.with_state(|state| {
            let slot = state
                .cells
                .get_mut(&id)
                .ok_or(Error::UseAfterRelease(Resource::Cell(id)))?;
            match &mut slot.content {
                CellContent::Leaf(current) => *current = value,
                _ => return Err(Error::NotALeaf(id)),
            }

            let subscribers = state.mappers.subscribers(id);
            for mapper in subscribers {
                if EvaluationContext::is_evaluating(mapper) {
                    trace!(mapper = %mapper, cell = %id, "skipping self-write");
                    continue;
                }
                state.batch.enqueue(mapper);
            }
            Ok(state.batch.claim_drain())
        })?;

        trace!(cell = %id, drain, "cell written");
        if drain {
            self.drain()?;
        }
        Ok(())
    }

    /// Run queued mappers until the queue is empty.
    ///
    /// A failing mapper does not stop the drain; the first error is returned
    /// once every queued mapper has had its turn. Exceeding the run limit
    /// drops whatever is still queued and fails with [`Error::BatchLimit`].
    fn drain(&self) -> Result<()> {
        let _guard = Draining { rt: self };
        let limit = self.config().max_batch_runs;
        let mut first_error = None;
        let mut runs = 0usize;

        loop {
            let job = self.with_state(|state| loop {
                let Some(id) = state.batch.next() else {
                    state.batch.finish();
                    return None;
                };
                match state.mappers.job(id) {
                    Some(job) => return Some(job),
                    None => trace!(mapper = %id, "skipping stopped mapper"),
                }
            });
            let Some(job) = job else { break };

            if runs == limit {
                let dropped = self.with_state(|state| {
                    let dropped = state.batch.queue.len() + 1;
                    state.batch.finish();
                    dropped
                });
                warn!(runs, dropped, "batch run limit reached, dropping queued mappers");
                return Err(Error::BatchLimit { runs });
            }
            runs += 1;
            if let Err(err) = self.evaluate_mapper(&job) {
                warn!(mapper = %job.id, error = %err, "mapper evaluation failed");
                first_error.get_or_insert(err);
            }
        }

        debug!(runs, "batch drained");
        first_error.map_or(Ok(()), Err)
    }

    /// Evaluate one mapper with its evaluation on the context stack.
    pub(crate) fn evaluate_mapper(&self, job: &MapperJob) -> Result<()> {
        let _ctx = EvaluationContext::enter(job.id);
        trace!(mapper = %job.id, "evaluating mapper");
        job.worklet.invoke(&job.args).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enqueue_dedupes_while_queued() {
        let mut batch = Batch::default();
        let id = MapperId::new();

        assert!(batch.enqueue(id));
        assert!(!batch.enqueue(id));
        assert_eq!(batch.next(), Some(id));
        assert_eq!(batch.next(), None);

        // Popped mappers can be queued again.
        assert!(batch.enqueue(id));
        assert!(!batch.enqueue(id));
        batch.finish();
        assert!(batch.enqueue(id));
    }

    #[test]
    fn drain_is_claimed_once() {
        let mut batch = Batch::default();
        assert!(!batch.claim_drain());

        batch.enqueue(MapperId::new());
        assert!(batch.claim_drain());
        assert!(!batch.claim_drain());
        assert!(batch.is_open());
    }

    #[test]
    fn open_batch_defers_drain() {
        let mut batch = Batch::default();
        batch.depth = 1;
        batch.enqueue(MapperId::new());
        assert!(!batch.claim_drain());

        batch.depth = 0;
        assert!(batch.claim_drain());
    }

    #[test]
    fn write_rejects_structural_cells() {
        let rt = Runtime::new();
        let pkg = rt.create(crate::value::Value::sequence([1.0])).unwrap();
        let root = pkg.root().unwrap().cell().clone();

        let err = root.write(2.0).unwrap_err();
        assert!(matches!(err, Error::NotALeaf(id) if id == root.id()));
    }

    #[test]
    fn batch_returns_closure_output() {
        let rt = Runtime::new();
        let cell = rt.cell(1.0);

        let out = rt
            .batch(|| {
                cell.write(2.0).unwrap();
                assert!(rt.is_batching());
                "done"
            })
            .unwrap();

        assert_eq!(out, "done");
        assert!(!rt.is_batching());
        assert_eq!(cell.read().unwrap(), Scalar::Number(2.0));
    }
}
