use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use tracing::trace;

use crate::event::EchoResponse;

/// Callback for an echo tag. Returning `false` unregisters it.
pub type EchoHandler = Arc<dyn Fn(&EchoResponse) -> bool + Send + Sync>;

/// Per-client table of echo handlers.
#[derive(Default)]
pub struct EchoRegistry {
    handlers: RwLock<FxHashMap<String, EchoHandler>>,
}

impl EchoRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&self, echo: impl Into<String>, handler: F)
    where
        F: Fn(&EchoResponse) -> bool + Send + Sync + 'static,
    {
        self.handlers.write().insert(echo.into(), Arc::new(handler));
    }

    pub fn contains(&self, echo: &str) -> bool {
        self.handlers.read().contains_key(echo)
    }

    /// Run the handler registered for the response's echo tag, if any.
    pub fn dispatch(&self, response: &EchoResponse) {
        let Some(echo) = response.echo.as_deref().filter(|e| !e.is_empty()) else {
            return;
        };
        // handler runs without the lock held so it may register others
        let handler = self.handlers.read().get(echo).cloned();
        let Some(handler) = handler else {
            trace!(echo, "no handler for echo");
            return;
        };

        if !handler(response) {
            self.handlers.write().remove(echo);
        }
    }
}

impl std::fmt::Debug for EchoRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EchoRegistry")
            .field("handlers", &self.handlers.read().len())
            .finish()
    }
}
