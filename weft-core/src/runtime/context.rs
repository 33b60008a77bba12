//! Evaluation Context
//!
//! Tracks which mapper is currently being evaluated on this thread.
//!
//! # Implementation
//!
//! A thread-local stack holds the IDs of mappers whose evaluation is on the
//! call stack. Entering an evaluation pushes; dropping the guard pops. A
//! mapper that writes a cell can cause another registration or teardown to
//! run while its own evaluation is still in progress, and the stack makes
//! that visible.

use std::cell::RefCell;

use crate::ids::MapperId;

thread_local! {
    static EVALUATION_STACK: RefCell<Vec<MapperId>> = const { RefCell::new(Vec::new()) };
}

/// Guard that pops the evaluation when dropped.
///
/// This keeps the stack balanced even if the evaluation panics.
pub struct EvaluationContext {
    mapper: MapperId,
}

impl EvaluationContext {
    /// Mark `mapper` as being evaluated until the returned guard is dropped.
    pub fn enter(mapper: MapperId) -> Self {
        EVALUATION_STACK.with(|stack| stack.borrow_mut().push(mapper));
        Self { mapper }
    }

    /// Check if any mapper is being evaluated.
    pub fn is_active() -> bool {
        EVALUATION_STACK.with(|stack| !stack.borrow().is_empty())
    }

    /// The innermost mapper being evaluated, if any.
    pub fn current() -> Option<MapperId> {
        EVALUATION_STACK.with(|stack| stack.borrow().last().copied())
    }

    /// Whether `mapper`'s evaluation is anywhere on the call stack.
    pub fn is_evaluating(mapper: MapperId) -> bool {
        EVALUATION_STACK.with(|stack| stack.borrow().contains(&mapper))
    }

    pub fn depth() -> usize {
        EVALUATION_STACK.with(|stack| stack.borrow().len())
    }
}

impl Drop for EvaluationContext {
    fn drop(&mut self) {
        EVALUATION_STACK.with(|stack| {
            let popped = stack.borrow_mut().pop();

            if let Some(mapper) = popped {
                debug_assert_eq!(
                    mapper, self.mapper,
                    "EvaluationContext mismatch: expected {:?}, got {:?}",
                    self.mapper, mapper
                );
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_tracks_mapper() {
        let id = MapperId::new();

        assert!(!EvaluationContext::is_active());
        assert!(EvaluationContext::current().is_none());

        {
            let _ctx = EvaluationContext::enter(id);

            assert!(EvaluationContext::is_active());
            assert_eq!(EvaluationContext::current(), Some(id));
            assert!(EvaluationContext::is_evaluating(id));
        }

        assert!(!EvaluationContext::is_active());
        assert!(!EvaluationContext::is_evaluating(id));
    }

    #[test]
    fn nested_evaluations() {
        let outer = MapperId::new();
        let inner = MapperId::new();

        {
            let _outer = EvaluationContext::enter(outer);
            {
                let _inner = EvaluationContext::enter(inner);
                assert_eq!(EvaluationContext::current(), Some(inner));
                assert!(EvaluationContext::is_evaluating(outer));
                assert_eq!(EvaluationContext::depth(), 2);
            }

            assert_eq!(EvaluationContext::current(), Some(outer));
        }

        assert_eq!(EvaluationContext::depth(), 0);
    }
}
