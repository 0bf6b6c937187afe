//! Integrations and their installation.

use std::any::{type_name, Any, TypeId};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use crate::Hub;

lazy_static::lazy_static! {
    static ref INSTALLED_INTEGRATIONS: Mutex<HashSet<TypeId>> = Mutex::new(HashSet::new());
}

/// Integration abstraction.
///
/// An integration observes some source of signals outside of the SDK and
/// turns what it sees into captures on the hub it was installed with.
// NOTE: we need `Any` here so that the `TypeId` machinery works correctly.
pub trait Integration: Sync + Send + Any {
    /// Name of this integration.
    fn name(&self) -> &'static str {
        type_name::<Self>()
    }

    /// Hooks the integration into its signal source.
    ///
    /// This is called at most once per integration type and process.  An
    /// integration whose source is not available must return without effect.
    fn install(&self, hub: &Arc<Hub>);
}

/// Installs the given integrations in order and returns the names of those
/// that were installed by this call.
///
/// An integration type that was already installed, by an earlier call or
/// earlier in the same list, is skipped.
pub fn install_integrations(hub: &Arc<Hub>, integrations: &[Arc<dyn Integration>]) -> Vec<&'static str> {
    let mut installed = INSTALLED_INTEGRATIONS
        .lock()
        .unwrap_or_else(PoisonError::into_inner);
    let mut names = vec![];
    for integration in integrations {
        let id = integration.as_ref().type_id();
        if !installed.insert(id) {
            sentry_debug!("[Integration] {} is already installed", integration.name());
            continue;
        }
        sentry_debug!("[Integration] Installing {}", integration.name());
        integration.install(hub);
        names.push(integration.name());
    }
    names
}
