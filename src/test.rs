//! This provides testing functionality for building tests.
//!
//! **Feature:** `test` (*disabled by default*)
//!
//! If the crate has been compiled with the test support feature this module
//! becomes available and provides a client that records every call it
//! receives.
//!
//! [`with_captured_calls`] runs a block against a fresh hub bound to a
//! [`TestClient`] and hands back everything the client received.

use std::error::Error;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use futures::FutureExt;

use crate::protocol::{Event, Level};
use crate::{
    Backend, BackendError, Client, ClientError, ClientFuture, Dispatcher, DispatcherOptions, Hint,
    Hub, HubOptions, Scope,
};

/// A call received by a [`TestClient`].
#[derive(Debug, Clone)]
pub enum Captured {
    /// A `capture_exception` call, with the error's display output.
    Exception {
        /// The error rendered through `Display`.
        error: String,
        /// The hint passed by the hub.
        hint: Hint,
        /// The scope of the top layer at the time of the call.
        scope: Scope,
    },
    /// A `capture_message` call.
    Message {
        /// The captured message.
        message: String,
        /// The level passed through by the hub.
        level: Option<Level>,
        /// The hint passed by the hub.
        hint: Hint,
        /// The scope of the top layer at the time of the call.
        scope: Scope,
    },
    /// A `capture_event` call.
    Event {
        /// The captured event.
        event: Box<Event<'static>>,
        /// The hint passed by the hub.
        hint: Hint,
        /// The scope of the top layer at the time of the call.
        scope: Scope,
    },
}

impl Captured {
    /// The hint the call carried.
    pub fn hint(&self) -> &Hint {
        match self {
            Captured::Exception { hint, .. }
            | Captured::Message { hint, .. }
            | Captured::Event { hint, .. } => hint,
        }
    }

    /// The scope the call was made with.
    pub fn scope(&self) -> &Scope {
        match self {
            Captured::Exception { scope, .. }
            | Captured::Message { scope, .. }
            | Captured::Event { scope, .. } => scope,
        }
    }

    /// The message of a `capture_message` call.
    pub fn message(&self) -> Option<&str> {
        match self {
            Captured::Message { message, .. } => Some(message),
            _ => None,
        }
    }
}

/// A backend that keeps every scope it is asked to store.
#[derive(Default)]
pub struct TestBackend {
    stored: Mutex<Vec<Scope>>,
    failing: bool,
}

impl TestBackend {
    /// Fetches and clears the stored scopes.
    pub fn fetch_and_clear_scopes(&self) -> Vec<Scope> {
        let mut guard = self.stored.lock().unwrap_or_else(PoisonError::into_inner);
        std::mem::take(&mut *guard)
    }
}

impl Backend for TestBackend {
    fn store_scope(&self, scope: &Scope) -> Result<(), BackendError> {
        if self.failing {
            return Err(BackendError("test backend refuses scopes".into()));
        }
        self.stored
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(scope.clone());
        Ok(())
    }
}

/// A client that records calls instead of sending anything.
///
/// Calls are recorded synchronously, so they can be inspected right after
/// the capture returned.
#[derive(Default)]
pub struct TestClient {
    captured: Mutex<Vec<Captured>>,
    backend: Option<TestBackend>,
    rejecting: bool,
}

impl TestClient {
    /// Creates a new test client.
    #[allow(clippy::new_ret_no_self)]
    pub fn new() -> Arc<TestClient> {
        Arc::new(TestClient::default())
    }

    /// Creates a test client whose captures all fail asynchronously.
    pub fn rejecting() -> Arc<TestClient> {
        Arc::new(TestClient {
            rejecting: true,
            ..Default::default()
        })
    }

    /// Creates a test client with a [`TestBackend`].
    ///
    /// With `failing` set the backend refuses every scope.
    pub fn with_backend(failing: bool) -> Arc<TestClient> {
        Arc::new(TestClient {
            backend: Some(TestBackend {
                failing,
                ..Default::default()
            }),
            ..Default::default()
        })
    }

    /// The backend of this client, if it has one.
    pub fn test_backend(&self) -> Option<&TestBackend> {
        self.backend.as_ref()
    }

    /// Fetches and clears the recorded calls.
    pub fn fetch_and_clear_calls(&self) -> Vec<Captured> {
        let mut guard = self.captured.lock().unwrap_or_else(PoisonError::into_inner);
        std::mem::take(&mut *guard)
    }

    fn record(&self, captured: Captured) -> ClientFuture {
        let event_id = captured.hint().event_id.unwrap_or_default();
        self.captured
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(captured);
        let rejecting = self.rejecting;
        async move {
            if rejecting {
                Err(ClientError::Rejected(event_id))
            } else {
                Ok(())
            }
        }
        .boxed()
    }
}

impl Client for TestClient {
    fn capture_exception(
        &self,
        exception: &(dyn Error + 'static),
        hint: Hint,
        scope: &Scope,
    ) -> ClientFuture {
        self.record(Captured::Exception {
            error: exception.to_string(),
            hint,
            scope: scope.clone(),
        })
    }

    fn capture_message(
        &self,
        message: &str,
        level: Option<Level>,
        hint: Hint,
        scope: &Scope,
    ) -> ClientFuture {
        self.record(Captured::Message {
            message: message.to_string(),
            level,
            hint,
            scope: scope.clone(),
        })
    }

    fn capture_event(&self, event: Event<'static>, hint: Hint, scope: &Scope) -> ClientFuture {
        self.record(Captured::Event {
            event: Box::new(event),
            hint,
            scope: scope.clone(),
        })
    }

    fn backend(&self) -> Option<&dyn Backend> {
        self.backend.as_ref().map(|backend| backend as &dyn Backend)
    }
}

/// Creates a hub bound to the given test client with its own dispatcher.
pub fn create_testable_hub(client: Arc<TestClient>) -> Arc<Hub> {
    Arc::new(Hub::with_options(
        Some(client),
        Default::default(),
        HubOptions {
            dispatcher: Some(Arc::new(Dispatcher::new(DispatcherOptions::default()))),
            ..Default::default()
        },
    ))
}

/// Runs some code with a fresh test hub bound to the current thread and
/// returns the recorded calls.
pub fn with_captured_calls<F: FnOnce(&Arc<Hub>)>(f: F) -> Vec<Captured> {
    let client = TestClient::new();
    let hub = create_testable_hub(client.clone());
    Hub::run(hub.clone(), || f(&hub));
    hub.flush(Duration::from_secs(5));
    client.fetch_and_clear_calls()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn with_captured_calls_binds_the_test_hub() {
        let calls = with_captured_calls(|hub| {
            assert!(Arc::ptr_eq(&Hub::current(), hub));
            crate::capture_message("recorded", None, None);
        });
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].message(), Some("recorded"));
    }
}
