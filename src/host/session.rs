//! The host side of a suspended exchange.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use log::{debug, warn};
use tokio_util::sync::CancellationToken;

use super::{AsyncContext, AsyncEvent, AsyncListener, Exchange, HostShared};
use crate::error::{HostError, LockResultExt};
use crate::outcome::Failure;

/// Async session for one suspended exchange.
///
/// Listeners are dropped when the session completes, which also releases
/// anything they hold on to (including the session itself).
pub struct AsyncSession {
    exchange: Exchange,
    timeout: Mutex<Option<Duration>>,
    listeners: Mutex<Vec<Arc<dyn AsyncListener>>>,
    completed: AtomicBool,
    /// Parent of every armed timer; cancelled on completion.
    timer: CancellationToken,
    /// The running timer, if the session has been armed.
    armed: Mutex<Option<CancellationToken>>,
    this: Weak<AsyncSession>,
    host: Arc<HostShared>,
}

impl AsyncSession {
    pub(crate) fn new(exchange: Exchange, host: Arc<HostShared>) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            exchange,
            timeout: Mutex::new(host.default_timeout),
            listeners: Mutex::new(Vec::new()),
            completed: AtomicBool::new(false),
            timer: CancellationToken::new(),
            armed: Mutex::new(None),
            this: this.clone(),
            host,
        })
    }

    /// Start the idle timer with the currently configured timeout.
    ///
    /// Arming again replaces the running timer.
    pub(crate) fn arm(&self) {
        if self.is_completed() {
            return;
        }
        let mut armed = self.armed.lock().recover_poison("AsyncSession::arm");
        if let Some(previous) = armed.take() {
            previous.cancel();
        }

        let Some(timeout) = self.timeout() else {
            debug!(
                target: "yakusoku::host",
                "Exchange {} suspended without timeout",
                self.exchange.id()
            );
            return;
        };
        let Some(runtime) = self.host.runtime.as_ref() else {
            warn!(
                target: "yakusoku::host",
                "No runtime available to arm timeout for exchange {}",
                self.exchange.id()
            );
            return;
        };
        let Some(session) = self.this.upgrade() else {
            return;
        };

        let cancelled = self.timer.child_token();
        *armed = Some(cancelled.clone());
        runtime.spawn(async move {
            tokio::select! {
                _ = cancelled.cancelled() => {}
                _ = tokio::time::sleep(timeout) => session.fire_timeout(),
            }
        });
    }

    fn is_armed(&self) -> bool {
        self.armed
            .lock()
            .recover_poison("AsyncSession::is_armed")
            .is_some()
    }

    fn fire_timeout(&self) {
        if self.is_completed() {
            return;
        }
        debug!(
            target: "yakusoku::host",
            "Exchange {} timed out",
            self.exchange.id()
        );

        let event = AsyncEvent {
            exchange: self.exchange.clone(),
            cause: None,
        };
        for listener in self.listeners_snapshot() {
            listener.on_timeout(&event);
        }

        if !self.is_completed() {
            warn!(
                target: "yakusoku::host",
                "Exchange {} still open after timeout listeners ran",
                self.exchange.id()
            );
        }
    }

    /// Deliver a host-level error to every listener on a host task.
    pub(crate) fn dispatch_error(self: &Arc<Self>, cause: Failure) {
        let session = Arc::clone(self);
        let deliver = move || {
            if session.is_completed() {
                return;
            }
            let event = AsyncEvent {
                exchange: session.exchange.clone(),
                cause: Some(cause),
            };
            for listener in session.listeners_snapshot() {
                listener.on_error(&event);
            }
        };

        match self.host.runtime.as_ref() {
            Some(runtime) => {
                runtime.spawn(async move { deliver() });
            }
            None => deliver(),
        }
    }

    /// Copy the listener list so no lock is held while listeners run.
    fn listeners_snapshot(&self) -> Vec<Arc<dyn AsyncListener>> {
        self.listeners
            .lock()
            .recover_poison("AsyncSession::listeners_snapshot")
            .clone()
    }
}

impl AsyncContext for AsyncSession {
    fn exchange(&self) -> &Exchange {
        &self.exchange
    }

    fn set_timeout(&self, timeout: Option<Duration>) {
        *self
            .timeout
            .lock()
            .recover_poison("AsyncSession::set_timeout") = timeout;
        if self.is_armed() {
            self.arm();
        }
    }

    fn timeout(&self) -> Option<Duration> {
        *self.timeout.lock().recover_poison("AsyncSession::timeout")
    }

    fn add_listener(&self, listener: Arc<dyn AsyncListener>) {
        self.listeners
            .lock()
            .recover_poison("AsyncSession::add_listener")
            .push(listener);
    }

    fn complete(&self) -> Result<(), HostError> {
        if self.completed.swap(true, Ordering::AcqRel) {
            return Err(HostError::AlreadyCompleted {
                id: self.exchange.id().to_string(),
            });
        }
        self.timer.cancel();

        let listeners = std::mem::take(
            &mut *self
                .listeners
                .lock()
                .recover_poison("AsyncSession::complete"),
        );
        let event = AsyncEvent {
            exchange: self.exchange.clone(),
            cause: None,
        };
        for listener in listeners {
            listener.on_complete(&event);
        }

        self.host.active.remove(&self.exchange.id());
        self.exchange.finish();
        debug!(
            target: "yakusoku::host",
            "Exchange {} completed",
            self.exchange.id()
        );
        Ok(())
    }

    fn is_completed(&self) -> bool {
        self.completed.load(Ordering::Acquire)
    }
}
