use std::borrow::Cow;
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use crate::protocol::{Breadcrumb, Event, Level, User, Value};
use crate::stack::Stack;

/// A callback notified after every mutation of the scope it is attached to.
pub type ScopeListener = Arc<dyn Fn(&Scope) + Send + Sync>;

/// Holds contextual data for the current scope.
///
/// The scope is an object that can be cloned efficiently and stores data that
/// is locally relevant to an event.  For instance the scope will hold recorded
/// breadcrumbs and similar information.
///
/// The scope can be interacted with in two ways:
///
/// 1. the scope is routinely updated with information by functions such as
///    [`add_breadcrumb`] which will modify the currently top-most scope.
/// 2. the topmost scope can also be configured through the [`configure_scope`]
///    method.
///
/// All data is held behind `Arc`s, so cloning a scope is cheap and the first
/// mutation of a clone copies only the touched collection.
///
/// [`add_breadcrumb`]: fn.add_breadcrumb.html
/// [`configure_scope`]: fn.configure_scope.html
#[derive(Clone, Default)]
pub struct Scope {
    pub(crate) level: Option<Level>,
    pub(crate) fingerprint: Option<Arc<[Cow<'static, str>]>>,
    pub(crate) breadcrumbs: Arc<VecDeque<Breadcrumb>>,
    pub(crate) user: Option<Arc<User>>,
    pub(crate) extra: Arc<HashMap<String, Value>>,
    pub(crate) tags: Arc<HashMap<String, String>>,
    pub(crate) listeners: Arc<Vec<ScopeListener>>,
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope")
            .field("level", &self.level)
            .field("fingerprint", &self.fingerprint)
            .field("breadcrumbs", &self.breadcrumbs)
            .field("user", &self.user)
            .field("extra", &self.extra)
            .field("tags", &self.tags)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

/// A scope guard.
///
/// This is returned from [`Hub::push_scope`] and will automatically pop the
/// scope on drop.
///
/// [`Hub::push_scope`]: struct.Hub.html#method.push_scope
#[derive(Default)]
pub struct ScopeGuard(pub(crate) Option<(Arc<RwLock<Stack>>, u64)>);

impl fmt::Debug for ScopeGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ScopeGuard")
    }
}

impl Drop for ScopeGuard {
    fn drop(&mut self) {
        if let Some((stack, id)) = self.0.take() {
            let mut stack = stack.write().unwrap_or_else(PoisonError::into_inner);
            // The layer this guard pushed was already popped explicitly, or a
            // nested guard outlived it.  Popping now would discard a layer
            // somebody else owns.
            if stack.top().id != id {
                sentry_debug!(
                    "[ScopeGuard] Not popping out of order scope (expected layer {}, found {})",
                    id,
                    stack.top().id
                );
                return;
            }
            stack.pop();
        }
    }
}

impl Scope {
    /// Creates the scope for a freshly pushed layer.
    ///
    /// All context is carried over, listeners are not: they belong to the
    /// layer they were registered on.
    pub(crate) fn fork(&self) -> Scope {
        Scope {
            listeners: Default::default(),
            ..self.clone()
        }
    }

    /// Clear the scope.
    ///
    /// By default a scope will inherit all values from the higher scope.
    /// In some situations this might not be what a user wants.  Calling
    /// this method will wipe all data contained within.
    pub fn clear(&mut self) {
        sentry_debug!("[Scope] Clearing all scope data");
        let listeners = std::mem::take(&mut self.listeners);
        *self = Scope {
            listeners,
            ..Default::default()
        };
        self.notify_scope_listeners();
    }

    /// Registers a listener that is invoked after every change to this scope.
    pub fn add_scope_listener<F>(&mut self, listener: F)
    where
        F: Fn(&Scope) + Send + Sync + 'static,
    {
        Arc::make_mut(&mut self.listeners).push(Arc::new(listener));
        sentry_debug!("[Scope] Added scope listener (total: {})", self.listeners.len());
    }

    /// Sets a level override.
    pub fn set_level(&mut self, level: Option<Level>) {
        self.level = level;
        self.notify_scope_listeners();
    }

    /// Returns the level override, if any.
    pub fn level(&self) -> Option<Level> {
        self.level
    }

    /// Sets the fingerprint.
    pub fn set_fingerprint(&mut self, fingerprint: Option<&[&str]>) {
        self.fingerprint =
            fingerprint.map(|fp| fp.iter().map(|s| Cow::Owned((*s).into())).collect());
        self.notify_scope_listeners();
    }

    /// Sets the user for the current scope.
    pub fn set_user(&mut self, user: Option<User>) {
        match &user {
            Some(user) => sentry_debug!("[Scope] Setting user: id={:?}", user.id),
            None => sentry_debug!("[Scope] Removing user"),
        }
        self.user = user.map(Arc::new);
        self.notify_scope_listeners();
    }

    /// Retrieves the user of the current scope.
    pub fn user(&self) -> Option<&User> {
        self.user.as_deref()
    }

    /// Sets a tag to a specific value.
    pub fn set_tag<V: ToString>(&mut self, key: &str, value: V) {
        let value = value.to_string();
        sentry_debug!("[Scope] Setting tag: {} = {}", key, value);
        Arc::make_mut(&mut self.tags).insert(key.to_string(), value);
        self.notify_scope_listeners();
    }

    /// Removes a tag.
    ///
    /// If the tag is not set, does nothing.
    pub fn remove_tag(&mut self, key: &str) {
        if Arc::make_mut(&mut self.tags).remove(key).is_some() {
            sentry_debug!("[Scope] Removed tag: {}", key);
            self.notify_scope_listeners();
        }
    }

    /// Returns the value of a tag.
    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags.get(key).map(String::as_str)
    }

    /// Sets a extra to a specific value.
    pub fn set_extra(&mut self, key: &str, value: Value) {
        sentry_debug!("[Scope] Setting extra: {} = {:?}", key, value);
        Arc::make_mut(&mut self.extra).insert(key.to_string(), value);
        self.notify_scope_listeners();
    }

    /// Removes a extra.
    pub fn remove_extra(&mut self, key: &str) {
        if Arc::make_mut(&mut self.extra).remove(key).is_some() {
            sentry_debug!("[Scope] Removed extra: {}", key);
            self.notify_scope_listeners();
        }
    }

    /// Returns the value of an extra.
    pub fn extra(&self, key: &str) -> Option<&Value> {
        self.extra.get(key)
    }

    /// Records a breadcrumb, dropping the oldest ones beyond `max_breadcrumbs`.
    pub fn add_breadcrumb(&mut self, breadcrumb: Breadcrumb, max_breadcrumbs: usize) {
        let breadcrumbs = Arc::make_mut(&mut self.breadcrumbs);
        breadcrumbs.push_back(breadcrumb);
        while breadcrumbs.len() > max_breadcrumbs {
            breadcrumbs.pop_front();
        }
        self.notify_scope_listeners();
    }

    /// Deletes current breadcrumbs from the scope.
    pub fn clear_breadcrumbs(&mut self) {
        let previous_count = self.breadcrumbs.len();
        self.breadcrumbs = Default::default();
        sentry_debug!("[Scope] Cleared {} breadcrumbs", previous_count);
        self.notify_scope_listeners();
    }

    /// Iterates over the recorded breadcrumbs, oldest first.
    pub fn breadcrumbs(&self) -> impl Iterator<Item = &Breadcrumb> {
        self.breadcrumbs.iter()
    }

    /// Applies the contained scoped data to fill an event.
    pub fn apply_to_event(&self, mut event: Event<'static>) -> Event<'static> {
        if let Some(level) = self.level {
            event.level = level;
        }

        if event.user.is_none() {
            if let Some(user) = self.user.as_deref() {
                event.user = Some(user.clone());
            }
        }

        event.breadcrumbs.extend(self.breadcrumbs.iter().cloned());
        event
            .extra
            .extend(self.extra.iter().map(|(k, v)| (k.to_owned(), v.to_owned())));
        event
            .tags
            .extend(self.tags.iter().map(|(k, v)| (k.to_owned(), v.to_owned())));

        if event.fingerprint.len() == 1
            && (event.fingerprint[0] == "{{ default }}" || event.fingerprint[0] == "{{default}}")
        {
            if let Some(fp) = self.fingerprint.as_ref() {
                event.fingerprint = Cow::Owned(fp.iter().cloned().collect());
            }
        }

        event
    }

    fn notify_scope_listeners(&self) {
        for listener in self.listeners.iter() {
            listener(self);
        }
    }
}
