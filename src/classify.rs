//! Decides whether an action value renders now or completes later.
//!
//! Classification happens before any rendering decision so synchronous values
//! never touch the async machinery.

use serde_json::Value;

use crate::deferred::{ActionValue, Deadline, PendingComputation};

/// An action value split by how it must be rendered.
#[derive(Debug)]
pub enum Classified {
    /// Render immediately on the calling thread
    Sync(Value),
    /// Hand over to the completion coordinator.
    ///
    /// The deadline is `None` for bare pending computations, which complete
    /// under the configured default.
    Async(PendingComputation, Option<Deadline>),
}

/// Classify an action value by its shape.
pub fn classify(value: ActionValue) -> Classified {
    match value {
        ActionValue::Ready(value) => Classified::Sync(value),
        ActionValue::Pending(pending) => Classified::Async(pending, None),
        ActionValue::Deferred(deferred) => {
            Classified::Async(deferred.pending, Some(deferred.deadline))
        }
    }
}

/// Returns `true` if the value is a pending computation or a deferred result.
pub fn is_async(value: &ActionValue) -> bool {
    !matches!(value, ActionValue::Ready(_))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deferred::DeferredResult;
    use serde_json::json;
    use std::time::Duration;

    #[test]
    fn concrete_values_are_sync() {
        assert!(!is_async(&ActionValue::Ready(json!(null))));
        match classify(ActionValue::Ready(json!("hi"))) {
            Classified::Sync(value) => assert_eq!(value, json!("hi")),
            other => panic!("expected sync, got {:?}", other),
        }
    }

    #[test]
    fn pending_computations_use_default_deadline() {
        let value = ActionValue::Pending(PendingComputation::ready(json!(1)));
        assert!(is_async(&value));
        assert!(matches!(classify(value), Classified::Async(_, None)));
    }

    #[test]
    fn deferred_results_carry_their_deadline() {
        let value = ActionValue::Deferred(DeferredResult::within(
            PendingComputation::never(),
            Duration::from_millis(75),
        ));
        assert!(is_async(&value));
        match classify(value) {
            Classified::Async(_, Some(deadline)) => {
                assert_eq!(deadline, Deadline::from_millis(75))
            }
            other => panic!("expected async with deadline, got {:?}", other),
        }
    }
}
