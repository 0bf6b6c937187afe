use std::error::Error;

use crate::protocol::{Breadcrumb, Event, Level};
use crate::{Hint, Hub, Scope, Uuid};

/// Captures an error on the current hub.
///
/// The return value is the generated event ID, which is available even if
/// no client is bound.
///
/// # Example
///
/// ```
/// # use sentry_hub as sentry;
/// let err = "NaN".parse::<usize>().unwrap_err();
/// let event_id = sentry::capture_exception(&err, None);
/// assert_eq!(sentry::last_event_id(), Some(event_id));
/// ```
pub fn capture_exception(exception: &(dyn Error + 'static), hint: Option<Hint>) -> Uuid {
    Hub::with(|hub| hub.capture_exception(exception, hint))
}

/// Captures an arbitrary message.
///
/// This hands the message and optional level to the client of the current
/// hub.
pub fn capture_message(message: &str, level: Option<Level>, hint: Option<Hint>) -> Uuid {
    Hub::with(|hub| hub.capture_message(message, level, hint))
}

/// Captures an event on the current hub.
///
/// The event must already be assembled.  Typically code would instead use
/// the utility methods like [`capture_exception`].
///
/// # Example
///
/// ```
/// # use sentry_hub as sentry;
/// use sentry::protocol::{Event, Level};
///
/// sentry::capture_event(
///     Event {
///         message: Some("Hello World!".into()),
///         level: Level::Info,
///         ..Default::default()
///     },
///     None,
/// );
/// ```
pub fn capture_event(event: Event<'static>, hint: Option<Hint>) -> Uuid {
    Hub::with(|hub| hub.capture_event(event, hint))
}

/// Records a breadcrumb on the current scope.
///
/// Breadcrumbs are only recorded while a client is bound.  They are added
/// before this function returns, so the next capture includes them.
///
/// # Example
///
/// ```
/// # use sentry_hub as sentry;
/// use sentry::protocol::{Breadcrumb, Map};
///
/// sentry::add_breadcrumb(
///     Breadcrumb {
///         ty: "http".into(),
///         category: Some("request".into()),
///         data: {
///             let mut map = Map::new();
///             map.insert("method".into(), "GET".into());
///             map.insert("url".into(), "https://example.com/".into());
///             map
///         },
///         ..Default::default()
///     },
///     None,
/// );
/// ```
pub fn add_breadcrumb(breadcrumb: Breadcrumb, hint: Option<Hint>) {
    Hub::with(|hub| hub.add_breadcrumb(breadcrumb, hint))
}

/// Invokes a function that can modify the current scope.
///
/// Because there might currently not be a client active it's possible that
/// the callback is not called at all.  As a result of this the return value
/// of this closure must have a default that is returned in such cases.
///
/// # Example
///
/// ```
/// # use sentry_hub as sentry;
/// sentry::configure_scope(|scope| {
///     scope.set_user(Some(sentry::User {
///         username: Some("john_doe".into()),
///         ..Default::default()
///     }));
/// });
/// ```
///
/// # Deadlocks
///
/// The hub's stack is locked while the callback runs.  Calling back into the
/// hub from within the callback blocks forever.
pub fn configure_scope<F, R>(f: F) -> R
where
    R: Default,
    F: FnOnce(&mut Scope) -> R,
{
    Hub::with(|hub| hub.configure_scope(f))
}

/// Temporarily pushes a scope for a single call optionally reconfiguring it.
///
/// This function takes two arguments: the first is a callback that is passed
/// a scope and can reconfigure it.  The second is callback that then executes
/// in the context of that scope.
///
/// This is useful when extra data should be send with a single capture call
/// for instance a different level or tags:
///
/// ```
/// # use sentry_hub as sentry;
/// use sentry::{capture_message, with_scope, Level};
///
/// with_scope(
///     |scope| scope.set_level(Some(Level::Warning)),
///     || capture_message("some error", Some(Level::Info), None),
/// );
/// ```
pub fn with_scope<C, F, R>(scope_config: C, callback: F) -> R
where
    C: FnOnce(&mut Scope),
    F: FnOnce() -> R,
{
    Hub::current().with_scope(scope_config, callback)
}

/// Returns the last event ID captured.
///
/// This uses the current thread local hub.
pub fn last_event_id() -> Option<Uuid> {
    Hub::with(|hub| hub.last_event_id())
}
