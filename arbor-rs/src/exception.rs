//! Routing of execution failures to host-provided handlers.

use crate::error::{CommandError, FailureKind};
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

type ExceptionHandler<S> = Arc<dyn Fn(&S, &CommandError) + Send + Sync>;

/// Ordered chain of failure handlers.
///
/// When an execution fails, the first handler registered for the failure's
/// [`FailureKind`] runs. The caller of `execute` receives the error either way.
pub struct ExceptionController<S> {
    handlers: RwLock<Vec<(FailureKind, ExceptionHandler<S>)>>,
}

impl<S> ExceptionController<S> {
    pub fn new() -> Self {
        Self {
            handlers: RwLock::new(Vec::new()),
        }
    }

    /// Append a handler for `kind`. Handlers registered earlier win.
    pub fn register<F>(&self, kind: FailureKind, handler: F)
    where
        F: Fn(&S, &CommandError) + Send + Sync + 'static,
    {
        self.handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push((kind, Arc::new(handler)));
    }

    pub fn is_handled(&self, kind: FailureKind) -> bool {
        self.handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .any(|(k, _)| *k == kind)
    }

    /// Dispatch `error`; returns whether a handler ran.
    pub fn handle(&self, sender: &S, error: &CommandError) -> bool {
        let kind = error.kind();
        // Clone out so the handler can register further handlers.
        let handler = self
            .handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, handler)| Arc::clone(handler));

        match handler {
            Some(handler) => {
                tracing::debug!(kind = %kind, "dispatching command failure");
                handler(sender, error);
                true
            }
            None => {
                tracing::warn!(kind = %kind, error = %error, "unhandled command failure");
                false
            }
        }
    }
}

impl<S> Default for ExceptionController<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> fmt::Debug for ExceptionController<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kinds: Vec<FailureKind> = self
            .handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(kind, _)| *kind)
            .collect();
        f.debug_struct("ExceptionController")
            .field("handlers", &kinds)
            .finish()
    }
}
