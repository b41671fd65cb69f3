//! Process-wide completion callbacks.
//!
//! Callbacks are observability hooks: they are fire-and-forget, a panicking
//! callback is logged and skipped, and nothing a callback does can block or
//! change the response.

use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use arc_swap::ArcSwap;
use log::warn;
use serde_json::Value;

use crate::outcome::ActionError;

/// What a callback observes: the value produced, or the failure that escaped.
pub type CallbackOutcome<'a> = Result<&'a Value, &'a ActionError>;

type Callback = Arc<dyn Fn(CallbackOutcome<'_>) + Send + Sync>;

struct Callbacks {
    complete: ArcSwap<Vec<Callback>>,
    render: ArcSwap<Vec<Callback>>,
}

/// Registration handle for completion callbacks.
///
/// Cheap to clone; clones share the same callback lists. Registration swaps
/// the list atomically so invocation never takes a lock.
///
/// # Pairing
///
/// `on_complete` observes each outcome as soon as it is known, and
/// `on_render` observes only the outcome that was actually written. The two
/// are not always paired: when the renderer fails on a produced value,
/// `on_complete(Ok)` has already run and no `on_render(Ok)` follows. If that
/// failure then escalates to the uncaught path, `on_complete(Err)` and
/// `on_render(Err)` run for it as well. A failure recovered by the error
/// handler, or ending in a halt, runs no further callbacks.
#[derive(Clone)]
pub struct CallbackRegistry {
    inner: Arc<Callbacks>,
}

impl CallbackRegistry {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Callbacks {
                complete: ArcSwap::from_pointee(Vec::new()),
                render: ArcSwap::from_pointee(Vec::new()),
            }),
        }
    }

    /// Register a callback run once an outcome is known, before it is rendered.
    pub fn on_complete<F>(&self, callback: F)
    where
        F: Fn(CallbackOutcome<'_>) + Send + Sync + 'static,
    {
        Self::push(&self.inner.complete, Arc::new(callback));
    }

    /// Register a callback run after an outcome has been rendered.
    pub fn on_render<F>(&self, callback: F)
    where
        F: Fn(CallbackOutcome<'_>) + Send + Sync + 'static,
    {
        Self::push(&self.inner.render, Arc::new(callback));
    }

    pub(crate) fn run_complete(&self, outcome: CallbackOutcome<'_>) {
        Self::run(&self.inner.complete, outcome, "complete");
    }

    pub(crate) fn run_render(&self, outcome: CallbackOutcome<'_>) {
        Self::run(&self.inner.render, outcome, "render");
    }

    fn push(list: &ArcSwap<Vec<Callback>>, callback: Callback) {
        list.rcu(|current| {
            let mut next = Vec::clone(current);
            next.push(Arc::clone(&callback));
            next
        });
    }

    fn run(list: &ArcSwap<Vec<Callback>>, outcome: CallbackOutcome<'_>, phase: &str) {
        for callback in list.load().iter() {
            if catch_unwind(AssertUnwindSafe(|| callback(outcome))).is_err() {
                warn!(
                    target: "yakusoku::pipeline",
                    "A {} callback panicked; continuing",
                    phase
                );
            }
        }
    }
}

impl Default for CallbackRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CallbackRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackRegistry")
            .field("complete", &self.inner.complete.load().len())
            .field("render", &self.inner.render.load().len())
            .finish()
    }
}
