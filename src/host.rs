//! In-memory request host with an opt-in async extension.
//!
//! The host owns one request/response pair per [`Exchange`]. A handler runs on
//! the calling thread; unless it calls [`Exchange::start_async`], the exchange
//! is finished as soon as the handler returns. A suspended exchange stays open
//! until its [`AsyncContext`] is completed, and the host raises timeout and
//! error events on its own tasks, concurrently with the application.

mod exchange;
mod session;

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use log::debug;
use tokio::runtime::Handle;
use ulid::Ulid;

use crate::error::HostError;
use crate::outcome::Failure;

pub use exchange::{Exchange, Request, Response};
pub use session::AsyncSession;

/// The host's async session for one suspended request.
pub trait AsyncContext: Send + Sync {
    /// Request/response identity of the suspended request.
    fn exchange(&self) -> &Exchange;

    /// Set the idle timeout. `None` disables it.
    fn set_timeout(&self, timeout: Option<Duration>);

    fn timeout(&self) -> Option<Duration>;

    fn add_listener(&self, listener: Arc<dyn AsyncListener>);

    /// Finalize the session. Fails if it was already finalized.
    fn complete(&self) -> Result<(), HostError>;

    fn is_completed(&self) -> bool;
}

/// Receives host-driven events for a suspended request.
pub trait AsyncListener: Send + Sync {
    fn on_start_async(&self, _event: &AsyncEvent) {}

    fn on_complete(&self, _event: &AsyncEvent) {}

    /// The armed timeout elapsed before the session was completed.
    fn on_timeout(&self, event: &AsyncEvent);

    /// The host's async machinery failed.
    fn on_error(&self, event: &AsyncEvent);
}

/// Payload of a host event.
#[derive(Debug, Clone)]
pub struct AsyncEvent {
    pub exchange: Exchange,
    /// Set for error events only.
    pub cause: Option<Failure>,
}

/// State shared by a host and every exchange it serves.
pub(crate) struct HostShared {
    runtime: Option<Handle>,
    default_timeout: Option<Duration>,
    active: DashMap<Ulid, Arc<AsyncSession>>,
}

impl HostShared {
    fn new(default_timeout: Option<Duration>) -> Self {
        Self {
            runtime: Handle::try_current().ok(),
            default_timeout,
            active: DashMap::new(),
        }
    }

    fn detached() -> Arc<Self> {
        Arc::new(Self::new(Some(Host::DEFAULT_TIMEOUT)))
    }
}

/// Serves requests and drives async sessions.
///
/// Cheap to clone; clones share the same session registry.
#[derive(Clone)]
pub struct Host {
    shared: Arc<HostShared>,
}

impl Host {
    /// Default idle timeout applied to new async sessions.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

    /// Create a host bound to the current tokio runtime (if any).
    pub fn new(default_timeout: Option<Duration>) -> Self {
        Self {
            shared: Arc::new(HostShared::new(default_timeout)),
        }
    }

    /// Create a host that spawns its timer and error tasks on `runtime`.
    pub fn with_runtime(runtime: Handle, default_timeout: Option<Duration>) -> Self {
        let mut shared = HostShared::new(default_timeout);
        shared.runtime = Some(runtime);
        Self {
            shared: Arc::new(shared),
        }
    }

    /// Serve one request with `handler`.
    ///
    /// Returns once the handler returns; for suspended exchanges the response
    /// may still be pending, see [`Served::finished`].
    pub fn serve<F>(&self, request: Request, handler: F) -> Served
    where
        F: FnOnce(&Exchange),
    {
        let exchange = Exchange::attached(request, Arc::clone(&self.shared));
        handler(&exchange);

        if !exchange.is_async() {
            exchange.finish();
        } else if let Some(session) = self.session(&exchange) {
            // The host starts timing only once the handler thread is released.
            session.arm();
        } else {
            debug!(
                target: "yakusoku::host",
                "Exchange {} completed before its handler returned",
                exchange.id()
            );
        }

        Served { exchange }
    }

    /// Inject a host-level async error for a suspended exchange.
    pub fn raise_error(&self, exchange: &Exchange, cause: Failure) -> Result<(), HostError> {
        let session = self.session(exchange).ok_or_else(|| HostError::NotAsync {
            id: exchange.id().to_string(),
        })?;
        session.dispatch_error(cause);
        Ok(())
    }

    /// Number of async sessions that have not been completed yet.
    pub fn active_sessions(&self) -> usize {
        self.shared.active.len()
    }

    fn session(&self, exchange: &Exchange) -> Option<Arc<AsyncSession>> {
        self.shared
            .active
            .get(&exchange.id())
            .map(|entry| Arc::clone(entry.value()))
    }
}

impl Default for Host {
    fn default() -> Self {
        Self::new(Some(Self::DEFAULT_TIMEOUT))
    }
}

/// A request whose handler has returned.
pub struct Served {
    exchange: Exchange,
}

impl Served {
    pub fn exchange(&self) -> &Exchange {
        &self.exchange
    }

    /// Wait until the exchange is finished and return it.
    pub async fn finished(self) -> Exchange {
        self.exchange.finished().await;
        self.exchange
    }
}
