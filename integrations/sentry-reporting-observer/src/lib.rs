//! The Sentry reporting observer integration.
//!
//! Browsers deliver crash, deprecation and intervention reports through
//! their reporting API.  The [`ReportingObserverIntegration`] listens to a
//! [`ReportQueue`] standing in for that API and turns every report into a
//! captured message carrying the report's URL and body as extra data.
//!
//! # Configuration
//!
//! By default every kind of report is captured.  The integration can be
//! restricted to a subset:
//!
//! ```
//! use std::sync::Arc;
//!
//! use sentry_hub::{Hub, Integration};
//! use sentry_reporting_observer::{ReportQueue, ReportType, ReportingObserverIntegration};
//!
//! let queue = ReportQueue::new();
//! let integration = ReportingObserverIntegration::new(queue.clone())
//!     .with_types(vec![ReportType::Crash]);
//! integration.install(&Arc::new(Hub::new(None, Default::default())));
//! ```

#![doc(html_favicon_url = "https://sentry-brand.storage.googleapis.com/favicon.ico")]
#![doc(html_logo_url = "https://sentry-brand.storage.googleapis.com/sentry-glyph-black.png")]
#![warn(missing_docs)]
#![deny(unsafe_code)]

use std::sync::Arc;

use sentry_hub::{sentry_debug, Hub, Integration, Value};

mod queue;
mod report;

pub use crate::queue::{ObserveOptions, ReportQueue, DEFAULT_BUFFER_SIZE};
pub use crate::report::{
    CrashReportBody, DeprecationReportBody, InterventionReportBody, Report, ReportBody,
    ReportParseError, ReportType, NO_DETAILS,
};

/// Configures the report kinds the integration captures.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportingObserverConfig {
    /// The report kinds to capture.  Defaults to every known kind.
    pub types: Vec<ReportType>,
}

impl Default for ReportingObserverConfig {
    fn default() -> ReportingObserverConfig {
        ReportingObserverConfig {
            types: ReportType::ALL.to_vec(),
        }
    }
}

/// Captures reports delivered by a [`ReportQueue`].
#[derive(Debug, Default)]
pub struct ReportingObserverIntegration {
    config: ReportingObserverConfig,
    source: Option<Arc<ReportQueue>>,
}

impl ReportingObserverIntegration {
    /// Creates the integration observing the given queue.
    pub fn new(source: Arc<ReportQueue>) -> ReportingObserverIntegration {
        ReportingObserverIntegration {
            config: Default::default(),
            source: Some(source),
        }
    }

    /// Replaces the configuration.
    #[must_use]
    pub fn with_config(mut self, config: ReportingObserverConfig) -> Self {
        self.config = config;
        self
    }

    /// Restricts the captured report kinds.
    #[must_use]
    pub fn with_types(mut self, types: Vec<ReportType>) -> Self {
        self.config.types = types;
        self
    }

    /// The active configuration.
    pub fn config(&self) -> &ReportingObserverConfig {
        &self.config
    }

    /// Captures one message per report on `hub`.
    ///
    /// Each report gets its own scope carrying the `url` extra and, if the
    /// report has a body, a `body` extra with every body field.
    pub fn handler(hub: &Hub, reports: &[Report]) {
        for report in reports {
            hub.with_scope(
                |scope| {
                    scope.set_extra("url", Value::from(report.url.as_str()));
                    if let Some(body) = &report.body {
                        scope.set_extra("body", Value::Object(body.normalize().into_iter().collect()));
                    }
                },
                || {
                    let label = format!("ReportingObserver [{}]", report.ty);
                    hub.capture_message(&format!("{}: {}", label, report.details()), None, None)
                },
            );
        }
    }
}

impl Integration for ReportingObserverIntegration {
    fn name(&self) -> &'static str {
        "ReportingObserver"
    }

    fn install(&self, hub: &Arc<Hub>) {
        let source = match &self.source {
            Some(source) if source.supports_reporting() => source,
            _ => {
                sentry_debug!("[ReportingObserver] Reporting is not supported, skipping install");
                return;
            }
        };
        let hub = hub.clone();
        source.observe(
            ObserveOptions {
                types: self.config.types.clone(),
                buffered: true,
            },
            move |reports| ReportingObserverIntegration::handler(&hub, reports),
        );
        sentry_debug!("[ReportingObserver] Observing {:?}", self.config.types);
    }
}
