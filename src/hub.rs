use std::error::Error;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use crate::hub_impl::HubImpl;
use crate::protocol::{Breadcrumb, Event, Level};
use crate::stack::Stack;
use crate::{Client, ClientFuture, Dispatcher, Hint, Layer, Scope, ScopeGuard, Uuid, API_VERSION};

/// Configuration of a [`Hub`] beyond its initial client and scope.
#[derive(Debug, Clone)]
pub struct HubOptions {
    /// The API version the hub reports to [`Hub::is_older_than`].
    pub version: u32,
    /// The dispatcher driving client futures.  Defaults to
    /// [`Dispatcher::shared`].
    pub dispatcher: Option<Arc<Dispatcher>>,
}

impl Default for HubOptions {
    fn default() -> HubOptions {
        HubOptions {
            version: API_VERSION,
            dispatcher: None,
        }
    }
}

/// The central object that manages scopes and clients.
///
/// This can be used to capture events and manage the scope.  This object is
/// internally synchronized so it can be used from multiple threads if needed,
/// but the stack is meant to be used cooperatively: code must only pop the
/// scopes it pushed itself.
///
/// Every capture goes to the client of the layer that is on top of the stack
/// at the moment of the call.  Without a client, captures still produce an
/// event id but are otherwise ignored.
///
/// See the
/// [Unified API](https://develop.sentry.dev/sdk/unified-api/#hub)
/// documentation for further details.
pub struct Hub {
    pub(crate) inner: HubImpl,
    last_event_id: RwLock<Option<Uuid>>,
    version: u32,
    dispatcher: Arc<Dispatcher>,
}

impl fmt::Debug for Hub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hub")
            .field("version", &self.version)
            .field("depth", &self.depth())
            .field("last_event_id", &self.last_event_id())
            .finish()
    }
}

impl Hub {
    /// Creates a new hub from the given client and scope.
    ///
    /// The hub starts with a single layer which stays in place for the
    /// lifetime of the hub.
    pub fn new(client: Option<Arc<dyn Client>>, scope: Scope) -> Hub {
        Hub::with_options(client, scope, HubOptions::default())
    }

    /// Creates a new hub with explicit options.
    pub fn with_options(client: Option<Arc<dyn Client>>, scope: Scope, options: HubOptions) -> Hub {
        Hub::from_layer(client, Arc::new(scope), options)
    }

    fn from_layer(client: Option<Arc<dyn Client>>, scope: Arc<Scope>, options: HubOptions) -> Hub {
        Hub {
            inner: HubImpl::new(Stack::from_client_and_scope(client, scope)),
            last_event_id: RwLock::new(None),
            version: options.version,
            dispatcher: options.dispatcher.unwrap_or_else(Dispatcher::shared),
        }
    }

    /// Creates a new hub based on the top scope of the given hub.
    ///
    /// The new hub shares the client and dispatcher of `other` and starts out
    /// with a copy of its current scope.
    pub fn new_from_top<H: AsRef<Hub>>(other: H) -> Hub {
        let hub = other.as_ref();
        let (client, scope) = hub.inner.with(|stack| {
            let top = stack.top();
            (top.client.clone(), Arc::new(top.scope.fork()))
        });
        Hub::from_layer(
            client,
            scope,
            HubOptions {
                version: hub.version,
                dispatcher: Some(hub.dispatcher.clone()),
            },
        )
    }

    /// Checks if this hub's version is older than the given version.
    pub fn is_older_than(&self, version: u32) -> bool {
        self.version < version
    }

    /// Binds a client to the top layer.
    ///
    /// Layers below the top keep their client.  When a client is bound,
    /// every later change the hub makes to this layer's scope is mirrored
    /// into the client's [`Backend`](crate::Backend), if it has one.  The
    /// backend is called after the stack lock is released.  Mirroring
    /// failures are ignored.
    pub fn bind_client(&self, client: Option<Arc<dyn Client>>) {
        self.inner.with_mut(|stack| {
            let top = stack.top_mut();
            sentry_debug!("[Hub] Binding client (bound: {})", client.is_some());
            top.mirrored = client.is_some();
            top.client = client;
        })
    }

    /// Pushes a new scope.
    ///
    /// The new layer keeps the current client and starts with a copy of the
    /// current scope, so context added from now on is discarded again when
    /// the scope is popped.  This returns a guard that pops the scope when
    /// dropped.
    pub fn push_scope(&self) -> ScopeGuard {
        self.inner.with_mut(|stack| {
            let id = stack.push();
            sentry_debug!("[Hub] Pushed scope (depth: {})", stack.depth());
            ScopeGuard(Some((self.inner.stack.clone(), id)))
        })
    }

    /// Removes the top layer.
    ///
    /// Returns `false` and leaves the stack untouched if only the base layer
    /// is left.
    pub fn pop_scope(&self) -> bool {
        self.inner.with_mut(|stack| {
            let popped = stack.pop();
            if !popped {
                sentry_debug!("[Hub] Refusing to pop the base layer");
            }
            popped
        })
    }

    /// Temporarily pushes a scope for a single call, configuring it first.
    ///
    /// `scope_config` always runs on the new scope, whether or not a client
    /// is bound.  The scope is popped once `callback` returns or unwinds.
    pub fn with_scope<C, F, R>(&self, scope_config: C, callback: F) -> R
    where
        C: FnOnce(&mut Scope),
        F: FnOnce() -> R,
    {
        let _guard = self.push_scope();
        self.with_current_scope_mut(scope_config);
        callback()
    }

    /// Invokes a function that can modify the current scope.
    ///
    /// The function only runs if a client is bound to the top layer,
    /// otherwise `R::default()` is returned.  It must not call back into
    /// this hub.
    pub fn configure_scope<F, R>(&self, f: F) -> R
    where
        R: Default,
        F: FnOnce(&mut Scope) -> R,
    {
        self.modify_top(|top| {
            if top.client.is_none() {
                sentry_debug!("[Hub] No client bound, skipping scope configuration");
                return Default::default();
            }
            f(Arc::make_mut(&mut top.scope))
        })
    }

    /// Returns the currently bound client.
    pub fn client(&self) -> Option<Arc<dyn Client>> {
        self.inner.with(|stack| stack.top().client.clone())
    }

    /// Returns the scope of the top layer.
    pub fn scope(&self) -> Arc<Scope> {
        self.inner.with(|stack| stack.top().scope.clone())
    }

    /// Returns all layers, from the base to the top.
    pub fn stack(&self) -> Vec<Layer> {
        self.inner.with(|stack| stack.layers().cloned().collect())
    }

    /// Returns the top layer.
    pub fn stack_top(&self) -> Layer {
        self.inner.with(|stack| stack.top().clone())
    }

    /// The number of layers, including the base layer.
    pub fn depth(&self) -> usize {
        self.inner.with(|stack| stack.depth())
    }

    /// Captures an error and returns the generated event id.
    ///
    /// The client handles the error asynchronously.  The id is returned
    /// before that happens and the outcome is not reported back.
    pub fn capture_exception(&self, exception: &(dyn Error + 'static), hint: Option<Hint>) -> Uuid {
        let event_id = self.new_event_id();
        let hint = Hint::for_event(hint, event_id);
        self.invoke_client_async("capture_exception", event_id, |client, scope| {
            client.capture_exception(exception, hint, scope)
        });
        event_id
    }

    /// Captures a message and returns the generated event id.
    ///
    /// `level` is passed to the client unchanged.
    pub fn capture_message(&self, message: &str, level: Option<Level>, hint: Option<Hint>) -> Uuid {
        let event_id = self.new_event_id();
        let hint = Hint::for_event(hint, event_id);
        self.invoke_client_async("capture_message", event_id, |client, scope| {
            client.capture_message(message, level, hint, scope)
        });
        event_id
    }

    /// Captures a fully assembled event and returns the generated event id.
    ///
    /// The event's own id is replaced by the generated one.
    pub fn capture_event(&self, mut event: Event<'static>, hint: Option<Hint>) -> Uuid {
        let event_id = self.new_event_id();
        event.event_id = event_id;
        let hint = Hint::for_event(hint, event_id);
        self.invoke_client_async("capture_event", event_id, |client, scope| {
            client.capture_event(event, hint, scope)
        });
        event_id
    }

    /// Adds a breadcrumb to the current scope through the bound client.
    ///
    /// This happens synchronously, so the breadcrumb is part of the scope
    /// any following capture sees.  Without a client this does nothing.
    pub fn add_breadcrumb(&self, breadcrumb: Breadcrumb, hint: Option<Hint>) {
        self.modify_top(|top| {
            if let Some(client) = top.client.clone() {
                client.add_breadcrumb(breadcrumb, hint.unwrap_or_default(), Arc::make_mut(&mut top.scope));
            }
        })
    }

    /// Returns the id generated by the most recent capture.
    pub fn last_event_id(&self) -> Option<Uuid> {
        *self.last_event_id.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Waits for the dispatcher to finish every capture queued so far.
    ///
    /// Returns `false` if that did not happen within `timeout`.
    pub fn flush(&self, timeout: Duration) -> bool {
        self.dispatcher.flush(timeout)
    }

    pub(crate) fn with_current_scope_mut<F: FnOnce(&mut Scope) -> R, R>(&self, f: F) -> R {
        self.modify_top(|top| f(Arc::make_mut(&mut top.scope)))
    }

    /// Runs `f` on the top layer under the write lock, then mirrors the
    /// resulting scope into the bound client's backend without the lock.
    fn modify_top<F: FnOnce(&mut Layer) -> R, R>(&self, f: F) -> R {
        let (rv, mirror) = self.inner.with_mut(|stack| {
            let top = stack.top_mut();
            let rv = f(top);
            let mirror = match &top.client {
                Some(client) if top.mirrored => Some((client.clone(), top.scope.clone())),
                _ => None,
            };
            (rv, mirror)
        });
        if let Some((client, scope)) = mirror {
            if let Some(backend) = client.backend() {
                backend.store_scope(&scope).ok();
            }
        }
        rv
    }

    fn new_event_id(&self) -> Uuid {
        let event_id = Uuid::new_v4();
        *self.last_event_id.write().unwrap_or_else(PoisonError::into_inner) = Some(event_id);
        event_id
    }

    fn invoke_client_async<F>(&self, method: &'static str, event_id: Uuid, f: F)
    where
        F: FnOnce(&dyn Client, &Scope) -> ClientFuture,
    {
        // the client is called without holding the stack lock so that it may
        // use the hub itself
        let (client, scope) = self.inner.with(|stack| {
            let top = stack.top();
            (top.client.clone(), top.scope.clone())
        });
        match client {
            Some(client) => {
                let future = f(&*client, &scope);
                self.dispatcher.dispatch(method, event_id, future);
            }
            None => sentry_debug!("[Hub] No client bound, {} for event {} is a no-op", method, event_id),
        }
    }
}

impl AsRef<Hub> for Hub {
    fn as_ref(&self) -> &Hub {
        self
    }
}
