//! This crate provides the hub of the Sentry SDK: the layered context stack
//! that tracks the active client and scope, and dispatches captured
//! exceptions, messages, events and breadcrumbs to that client.
//!
//! It does not decide whether an event is sent, how it is serialized or how
//! it travels over the network.  Those concerns live behind the [`Client`]
//! trait.  Sources of events live behind the [`Integration`] trait.
//!
//! # Core Concepts
//!
//! A [`Hub`] owns a stack of [`Layer`]s.  Each layer pairs an optional client
//! with a [`Scope`].  The top layer is the active one: every capture goes to
//! its client together with its scope.  Pushing a scope clones the current
//! one, so any context attached afterwards is discarded again when the scope
//! is popped.
//!
//! ```
//! use sentry_hub::{Hub, Level};
//!
//! let hub = Hub::new(None, Default::default());
//! hub.with_scope(
//!     |scope| scope.set_tag("worker", "worker1"),
//!     || hub.capture_message("Hello World!", Some(Level::Info), None),
//! );
//! assert!(hub.last_event_id().is_some());
//! ```
//!
//! # Dispatch
//!
//! `capture_*` calls hand the future returned by the client to a background
//! [`Dispatcher`] and return the generated event id right away.  Failures are
//! only reported to the dispatcher's diagnostic hook, never to the caller.
//!
//! # Features
//!
//! - `feature = "test"`: Activates the [`test`] module, which comes with a
//!   recording client to inspect captured calls.
//!
//! [`test`]: test/index.html

#![doc(html_favicon_url = "https://sentry-brand.storage.googleapis.com/favicon.ico")]
#![doc(html_logo_url = "https://sentry-brand.storage.googleapis.com/sentry-glyph-black.png")]
#![warn(missing_docs)]

// macros; these need to be first to be used by other modules
#[macro_use]
mod macros;

mod api;
mod client;
mod constants;
mod dispatch;
mod error;
mod hub;
mod hub_impl;
mod integration;
mod scope;
mod stack;

// public api or exports from this crate
pub use crate::api::*;
pub use crate::client::{Backend, Client, ClientFuture, Hint};
pub use crate::constants::{API_VERSION, DEFAULT_MAX_BREADCRUMBS, VERSION};
pub use crate::dispatch::{DiagnosticHook, DispatchFailure, Dispatcher, DispatcherOptions};
pub use crate::error::{BackendError, ClientError};
pub use crate::hub::{Hub, HubOptions};
pub use crate::hub_impl::SwitchGuard;
pub use crate::integration::{install_integrations, Integration};
pub use crate::scope::{Scope, ScopeGuard, ScopeListener};
pub use crate::stack::Layer;

// test utilities
#[cfg(any(test, feature = "test"))]
pub mod test;

// public api from other crates
#[doc(inline)]
pub use sentry_types as types;
pub use sentry_types::protocol::v7 as protocol;
pub use sentry_types::protocol::v7::{Breadcrumb, Event, Level, Map, User, Value};
pub use uuid::Uuid;
