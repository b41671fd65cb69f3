//! Execution-context binding for the current exchange.
//!
//! Rendering writes to "the current response", so every trigger that renders
//! must first bind the exchange it owns. The binding is task-local and is
//! visible to synchronous code running inside [`within`].

use crate::host::Exchange;

tokio::task_local! {
    /// The exchange whose response is being rendered.
    static CURRENT_EXCHANGE: Exchange;
}

/// Run `f` with `exchange` bound as the current exchange.
pub fn within<R>(exchange: &Exchange, f: impl FnOnce() -> R) -> R {
    CURRENT_EXCHANGE.sync_scope(exchange.clone(), f)
}

/// Get the exchange bound to the current execution context.
///
/// Returns None when called outside of [`within`].
pub fn current_exchange() -> Option<Exchange> {
    CURRENT_EXCHANGE.try_with(Exchange::clone).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::Request;

    #[test]
    fn exchange_not_available_outside_context() {
        assert!(current_exchange().is_none());
    }

    #[test]
    fn within_binds_the_exchange() {
        let exchange = Exchange::new(Request::get("/bound"));
        let seen = within(&exchange, || current_exchange().map(|e| e.id()));
        assert_eq!(seen, Some(exchange.id()));
        assert!(current_exchange().is_none(), "binding must not leak");
    }

    #[test]
    fn nested_binding_restores_outer() {
        let outer = Exchange::new(Request::get("/outer"));
        let inner = Exchange::new(Request::get("/inner"));

        within(&outer, || {
            let nested = within(&inner, || current_exchange().map(|e| e.id()));
            assert_eq!(nested, Some(inner.id()));
            assert_eq!(current_exchange().map(|e| e.id()), Some(outer.id()));
        });
    }
}
