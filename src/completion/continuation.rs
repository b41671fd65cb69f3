//! Drives a pending computation to a concrete value.
//!
//! A computation may resolve to another computation (or a deferred result),
//! layer after layer. Each layer is awaited only once the previous one has
//! resolved, in a loop, so nesting depth costs neither stack nor eager work.

use log::{debug, trace};
use serde_json::Value;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use crate::deferred::{ActionValue, PendingComputation};
use crate::outcome::{Failure, Outcome};

/// Await `pending` and every computation it resolves to.
///
/// The deadline of a nested deferred result is ignored; the deadline armed
/// when the request was suspended governs.
pub async fn settle(pending: PendingComputation) -> Result<Value, Failure> {
    let mut current = pending;
    let mut depth = 0usize;
    loop {
        match current.await? {
            ActionValue::Ready(value) => {
                trace!(
                    target: "yakusoku::completion",
                    "Settled after {} nested layer(s)",
                    depth
                );
                return Ok(value);
            }
            ActionValue::Pending(inner) => current = inner,
            ActionValue::Deferred(deferred) => {
                debug!(
                    target: "yakusoku::completion",
                    "Ignoring nested deadline {} at depth {}",
                    deferred.deadline,
                    depth
                );
                current = deferred.pending;
            }
        }
        depth += 1;
    }
}

/// Settle `pending` on `runtime` and hand the terminal outcome to `reaction`.
pub fn attach<F>(runtime: &Handle, pending: PendingComputation, reaction: F) -> JoinHandle<()>
where
    F: FnOnce(Outcome) + Send + 'static,
{
    runtime.spawn(async move {
        let outcome = Outcome::from(settle(pending).await);
        reaction(outcome);
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deferred::DeferredResult;
    use crate::outcome::HaltSignal;
    use serde_json::json;

    fn nest(depth: usize, value: Value) -> PendingComputation {
        let mut pending = PendingComputation::ready(value);
        for level in 0..depth {
            pending = if level % 2 == 0 {
                PendingComputation::ready(pending)
            } else {
                PendingComputation::ready(DeferredResult::unbounded(pending))
            };
        }
        pending
    }

    #[tokio::test]
    async fn settles_concrete_value() {
        assert_eq!(settle(nest(0, json!(7))).await.unwrap(), json!(7));
    }

    #[tokio::test]
    async fn unwraps_mixed_nesting() {
        assert_eq!(settle(nest(6, json!("deep"))).await.unwrap(), json!("deep"));
    }

    #[tokio::test]
    async fn deep_nesting_does_not_grow_the_stack() {
        assert_eq!(settle(nest(10_000, json!(1))).await.unwrap(), json!(1));
    }

    #[tokio::test]
    async fn failure_in_inner_layer_is_terminal() {
        let pending = PendingComputation::ready(PendingComputation::failed(
            HaltSignal::with_status(302),
        ));
        assert!(matches!(settle(pending).await, Err(Failure::Halt(_))));
    }

    #[tokio::test]
    async fn inner_layers_are_awaited_lazily() {
        let (outer, outer_pending) = crate::deferred::promise();
        let handle = tokio::spawn(settle(outer_pending));

        // The inner layer does not exist until the outer one resolves.
        let (inner, inner_pending) = crate::deferred::promise();
        outer.resolve(inner_pending);
        inner.resolve(json!("late"));

        assert_eq!(handle.await.unwrap().unwrap(), json!("late"));
    }

    #[tokio::test]
    async fn attach_hands_outcome_to_reaction() {
        let (tx, rx) = tokio::sync::oneshot::channel();
        attach(&Handle::current(), nest(2, json!(3)), move |outcome| {
            let _ = tx.send(outcome);
        });

        match rx.await.unwrap() {
            Outcome::Value(value) => assert_eq!(value, json!(3)),
            other => panic!("unexpected outcome: {:?}", other),
        }
    }
}
