/// The version of the library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// API compatibility version of the hub.
///
/// This number is only increased when the interface of the hub changes and
/// new methods are introduced.  Embedders compare it with
/// [`Hub::is_older_than`](crate::Hub::is_older_than) to detect a hub created
/// by an older copy of this crate.
pub const API_VERSION: u32 = 3;

/// The number of breadcrumbs a scope retains unless a client decides otherwise.
pub const DEFAULT_MAX_BREADCRUMBS: usize = 100;

/// The name of the thread running the dispatch worker.
pub(crate) const DISPATCH_THREAD_NAME: &str = "sentry-hub-dispatch";

/// The number of pending client calls the dispatch worker buffers.
pub(crate) const DEFAULT_DISPATCH_QUEUE_SIZE: usize = 64;
