//! Request/response identity for one request.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use log::debug;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::watch;
use ulid::Ulid;

use super::session::AsyncSession;
use super::{AsyncContext, HostShared};
use crate::error::{HostError, LockResultExt};

/// An incoming request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Request {
    pub method: String,
    pub path: String,
    pub headers: BTreeMap<String, String>,
}

impl Request {
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            headers: BTreeMap::new(),
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new("GET", path)
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }
}

/// A response written to an exchange.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Response {
    pub status: u16,
    pub headers: BTreeMap<String, String>,
    pub body: Value,
}

impl Response {
    pub fn new(status: u16, body: impl Into<Value>) -> Self {
        Self {
            status,
            headers: BTreeMap::new(),
            body: body.into(),
        }
    }

    pub fn ok(body: impl Into<Value>) -> Self {
        Self::new(200, body)
    }
}

struct ExchangeInner {
    id: Ulid,
    request: Request,
    /// Every response written, in order. More than one entry is a protocol violation.
    writes: Mutex<Vec<Response>>,
    async_started: AtomicBool,
    finished: watch::Sender<bool>,
    /// Served by a [`Host`](super::Host), which arms timers once the handler returns.
    hosted: bool,
    host: Arc<HostShared>,
}

/// One request/response pair.
///
/// Cheap to clone; clones refer to the same pair.
#[derive(Clone)]
pub struct Exchange {
    inner: Arc<ExchangeInner>,
}

impl Exchange {
    /// Create an exchange that does not belong to a [`Host`](super::Host).
    ///
    /// There is no handler frame to wait for, so [`start_async`](Self::start_async)
    /// arms the session timer right away on the current tokio runtime.
    pub fn new(request: Request) -> Self {
        Self::build(request, HostShared::detached(), false)
    }

    pub(crate) fn attached(request: Request, host: Arc<HostShared>) -> Self {
        Self::build(request, host, true)
    }

    fn build(request: Request, host: Arc<HostShared>, hosted: bool) -> Self {
        let (finished, _) = watch::channel(false);
        Self {
            inner: Arc::new(ExchangeInner {
                id: Ulid::new(),
                request,
                writes: Mutex::new(Vec::new()),
                async_started: AtomicBool::new(false),
                finished,
                hosted,
                host,
            }),
        }
    }

    pub fn id(&self) -> Ulid {
        self.inner.id
    }

    pub fn request(&self) -> &Request {
        &self.inner.request
    }

    /// Write a response.
    pub fn write(&self, response: Response) {
        debug!(
            target: "yakusoku::host",
            "Exchange {} writing status {}",
            self.inner.id,
            response.status
        );
        self.inner
            .writes
            .lock()
            .recover_poison("Exchange::write")
            .push(response);
    }

    /// Number of responses written so far.
    pub fn write_count(&self) -> usize {
        self.inner
            .writes
            .lock()
            .recover_poison("Exchange::write_count")
            .len()
    }

    /// The first response written, if any.
    pub fn response(&self) -> Option<Response> {
        self.inner
            .writes
            .lock()
            .recover_poison("Exchange::response")
            .first()
            .cloned()
    }

    pub fn responses(&self) -> Vec<Response> {
        self.inner
            .writes
            .lock()
            .recover_poison("Exchange::responses")
            .clone()
    }

    /// Suspend the synchronous lifecycle of this exchange.
    ///
    /// The returned context keeps the exchange open until it is completed.
    /// Only the first call succeeds.
    pub fn start_async(&self) -> Result<Arc<dyn AsyncContext>, HostError> {
        if self.inner.async_started.swap(true, Ordering::AcqRel) {
            return Err(HostError::AsyncAlreadyStarted {
                id: self.inner.id.to_string(),
            });
        }

        let session = AsyncSession::new(self.clone(), Arc::clone(&self.inner.host));
        self.inner
            .host
            .active
            .insert(self.inner.id, Arc::clone(&session));
        if !self.inner.hosted {
            session.arm();
        }
        Ok(session)
    }

    pub fn is_async(&self) -> bool {
        self.inner.async_started.load(Ordering::Acquire)
    }

    pub fn is_finished(&self) -> bool {
        *self.inner.finished.borrow()
    }

    /// Wait until the exchange is finished.
    pub async fn finished(&self) {
        let mut receiver = self.inner.finished.subscribe();
        // The sender lives as long as `self`, so this cannot fail.
        let _ = receiver.wait_for(|finished| *finished).await;
    }

    pub(crate) fn finish(&self) {
        self.inner.finished.send_replace(true);
    }
}

impl fmt::Debug for Exchange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Exchange")
            .field("id", &self.inner.id)
            .field("request", &self.inner.request)
            .field("async", &self.is_async())
            .finish()
    }
}
