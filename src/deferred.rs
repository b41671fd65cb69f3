//! Deferred values returned by actions.
//!
//! An action returns an [`ActionValue`]. Anything other than
//! [`ActionValue::Ready`] resolves later, on whatever execution context drives
//! the underlying future, and is completed through the
//! [`CompletionCoordinator`](crate::completion::CompletionCoordinator).

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::oneshot;

use crate::error::ConfigError;
use crate::outcome::{ActionError, Failure};

/// Completion deadline for a deferred result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "DeadlineRepr", into = "DeadlineRepr")]
pub enum Deadline {
    Bounded(Duration),
    /// No deadline: the host idle timeout is disabled.
    Unbounded,
}

impl Deadline {
    pub fn from_millis(millis: u64) -> Self {
        Deadline::Bounded(Duration::from_millis(millis))
    }

    /// The timeout to arm on the host, truncated to whole milliseconds.
    ///
    /// `None` disables the host timeout entirely.
    pub fn host_timeout(&self) -> Option<Duration> {
        match self {
            Deadline::Bounded(duration) => {
                let millis = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
                Some(Duration::from_millis(millis))
            }
            Deadline::Unbounded => None,
        }
    }

    pub fn is_unbounded(&self) -> bool {
        matches!(self, Deadline::Unbounded)
    }
}

impl Default for Deadline {
    fn default() -> Self {
        Deadline::Bounded(Duration::from_secs(30))
    }
}

impl fmt::Display for Deadline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Deadline::Bounded(duration) => write!(f, "{}ms", duration.as_millis()),
            Deadline::Unbounded => f.write_str(UNBOUNDED),
        }
    }
}

const UNBOUNDED: &str = "unbounded";

/// On-disk form of a deadline: milliseconds or the keyword `"unbounded"`.
#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum DeadlineRepr {
    Millis(u64),
    Keyword(String),
}

impl TryFrom<DeadlineRepr> for Deadline {
    type Error = ConfigError;

    fn try_from(repr: DeadlineRepr) -> Result<Self, Self::Error> {
        match repr {
            DeadlineRepr::Millis(millis) => Ok(Deadline::from_millis(millis)),
            DeadlineRepr::Keyword(keyword) if keyword == UNBOUNDED => Ok(Deadline::Unbounded),
            DeadlineRepr::Keyword(value) => Err(ConfigError::InvalidDeadline { value }),
        }
    }
}

impl From<Deadline> for DeadlineRepr {
    fn from(deadline: Deadline) -> Self {
        match deadline.host_timeout() {
            Some(timeout) => {
                DeadlineRepr::Millis(u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX))
            }
            None => DeadlineRepr::Keyword(UNBOUNDED.to_string()),
        }
    }
}

type BoxedComputation = Pin<Box<dyn Future<Output = Result<ActionValue, Failure>> + Send>>;

/// A value that becomes available later, exactly once.
///
/// The computation may itself resolve to another pending computation or a
/// [`DeferredResult`]; the continuation chain unwraps those layers lazily.
pub struct PendingComputation {
    inner: BoxedComputation,
}

impl PendingComputation {
    pub fn new<F>(future: F) -> Self
    where
        F: Future<Output = Result<ActionValue, Failure>> + Send + 'static,
    {
        Self {
            inner: Box::pin(future),
        }
    }

    /// A computation that is already resolved with `value`.
    pub fn ready(value: impl Into<ActionValue>) -> Self {
        let value = value.into();
        Self::new(async move { Ok(value) })
    }

    /// A computation that is already resolved with `failure`.
    pub fn failed(failure: impl Into<Failure>) -> Self {
        let failure = failure.into();
        Self::new(async move { Err(failure) })
    }

    /// A computation that never resolves.
    pub fn never() -> Self {
        Self::new(std::future::pending())
    }
}

impl Future for PendingComputation {
    type Output = Result<ActionValue, Failure>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.inner.as_mut().poll(cx)
    }
}

impl fmt::Debug for PendingComputation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingComputation").finish_non_exhaustive()
    }
}

/// Completes a [`PendingComputation`] from another execution context.
#[derive(Debug)]
pub struct Promise {
    sender: oneshot::Sender<Result<ActionValue, Failure>>,
}

impl Promise {
    /// Resolve the paired computation. Returns `false` if nobody is waiting.
    pub fn resolve(self, value: impl Into<ActionValue>) -> bool {
        self.sender.send(Ok(value.into())).is_ok()
    }

    /// Fail the paired computation. Returns `false` if nobody is waiting.
    pub fn fail(self, failure: impl Into<Failure>) -> bool {
        self.sender.send(Err(failure.into())).is_ok()
    }
}

/// Create a promise and the computation it completes.
///
/// Dropping the promise without completing it fails the computation.
pub fn promise() -> (Promise, PendingComputation) {
    let (sender, receiver) = oneshot::channel();
    let pending = PendingComputation::new(async move {
        match receiver.await {
            Ok(result) => result,
            Err(_) => Err(Failure::Error(ActionError::msg(
                "promise dropped without completion",
            ))),
        }
    });
    (Promise { sender }, pending)
}

/// A pending computation paired with its completion deadline.
#[derive(Debug)]
pub struct DeferredResult {
    pub pending: PendingComputation,
    pub deadline: Deadline,
}

impl DeferredResult {
    pub fn new(pending: PendingComputation, deadline: Deadline) -> Self {
        Self { pending, deadline }
    }

    pub fn within(pending: PendingComputation, timeout: Duration) -> Self {
        Self::new(pending, Deadline::Bounded(timeout))
    }

    pub fn unbounded(pending: PendingComputation) -> Self {
        Self::new(pending, Deadline::Unbounded)
    }
}

/// The value produced by an action.
#[derive(Debug)]
pub enum ActionValue {
    /// Render immediately
    Ready(Value),
    /// Resolve later under the default deadline
    Pending(PendingComputation),
    /// Resolve later under the given deadline
    Deferred(DeferredResult),
}

impl From<Value> for ActionValue {
    fn from(value: Value) -> Self {
        ActionValue::Ready(value)
    }
}

impl From<PendingComputation> for ActionValue {
    fn from(pending: PendingComputation) -> Self {
        ActionValue::Pending(pending)
    }
}

impl From<DeferredResult> for ActionValue {
    fn from(deferred: DeferredResult) -> Self {
        ActionValue::Deferred(deferred)
    }
}
