use std::error::Error;

use futures::future::BoxFuture;

use crate::constants::DEFAULT_MAX_BREADCRUMBS;
use crate::protocol::{Breadcrumb, Event, Level, Map, Value};
use crate::{BackendError, ClientError, Scope, Uuid};

/// The future returned by the asynchronous client operations.
///
/// The hub never awaits it itself: it is driven by a
/// [`Dispatcher`](crate::Dispatcher) and only its failure is observed.
pub type ClientFuture = BoxFuture<'static, Result<(), ClientError>>;

/// Additional information handed to the client next to the payload.
///
/// For captures the hub always fills in `event_id` with the id it returned
/// to the caller.  Breadcrumb hints never carry an event id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Hint {
    /// The event id generated by the hub.
    pub event_id: Option<Uuid>,
    /// Arbitrary data supplied by the producer.
    pub data: Map<String, Value>,
}

impl Hint {
    /// Creates a hint carrying a single data entry.
    pub fn with_data<V: Into<Value>>(key: &str, value: V) -> Hint {
        let mut hint = Hint::default();
        hint.data.insert(key.to_string(), value.into());
        hint
    }

    pub(crate) fn for_event(hint: Option<Hint>, event_id: Uuid) -> Hint {
        Hint {
            event_id: Some(event_id),
            ..hint.unwrap_or_default()
        }
    }
}

/// Storage mirroring the scope of the layer a client is bound to.
pub trait Backend: Send + Sync {
    /// Persists a copy of the scope.
    ///
    /// The hub calls this after releasing its stack lock, so a backend may
    /// read from the hub it mirrors.
    fn store_scope(&self, scope: &Scope) -> Result<(), BackendError>;
}

/// The capture handling object a [`Hub`](crate::Hub) forwards to.
///
/// Building events, filtering, serialization and transport all happen behind
/// this trait.  The asynchronous operations must not block: the hub calls
/// them synchronously and hands the returned future to its dispatcher.
pub trait Client: Send + Sync {
    /// Captures an error.
    fn capture_exception(
        &self,
        exception: &(dyn Error + 'static),
        hint: Hint,
        scope: &Scope,
    ) -> ClientFuture;

    /// Captures a message with an optional severity.
    fn capture_message(
        &self,
        message: &str,
        level: Option<Level>,
        hint: Hint,
        scope: &Scope,
    ) -> ClientFuture;

    /// Captures a fully assembled event.
    fn capture_event(&self, event: Event<'static>, hint: Hint, scope: &Scope) -> ClientFuture;

    /// Records a breadcrumb on the scope of the active layer.
    ///
    /// This runs synchronously so that the breadcrumb is visible to the next
    /// capture.
    fn add_breadcrumb(&self, breadcrumb: Breadcrumb, hint: Hint, scope: &mut Scope) {
        let _hint = hint;
        scope.add_breadcrumb(breadcrumb, DEFAULT_MAX_BREADCRUMBS);
    }

    /// The backend scope changes are mirrored into, if the client has one.
    fn backend(&self) -> Option<&dyn Backend> {
        None
    }
}
