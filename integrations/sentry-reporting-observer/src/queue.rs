use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use sentry_hub::sentry_debug;

use crate::report::{Report, ReportType};

/// Maximum number of reports kept for buffered delivery.
pub const DEFAULT_BUFFER_SIZE: usize = 100;

type ReportHandler = Arc<dyn Fn(&[Report]) + Send + Sync>;

/// What an observer wants to receive.
#[derive(Debug, Clone)]
pub struct ObserveOptions {
    /// Report kinds delivered to the observer.
    pub types: Vec<ReportType>,
    /// Deliver the reports queued before the observer was registered.
    pub buffered: bool,
}

impl Default for ObserveOptions {
    fn default() -> ObserveOptions {
        ObserveOptions {
            types: ReportType::ALL.to_vec(),
            buffered: false,
        }
    }
}

struct Observer {
    types: Vec<ReportType>,
    handler: ReportHandler,
}

impl Observer {
    fn matching(&self, reports: &[Report]) -> Vec<Report> {
        reports
            .iter()
            .filter(|report| self.types.contains(&report.ty))
            .cloned()
            .collect()
    }
}

#[derive(Default)]
struct QueueState {
    buffer: VecDeque<Report>,
    observers: Vec<Observer>,
}

/// The source reports are delivered from.
///
/// Platforms feed reports in with [`ReportQueue::queue_report`].  Every
/// report is handed to each registered observer that asked for its kind and
/// is kept in a bounded buffer for observers registered later.
pub struct ReportQueue {
    state: Mutex<QueueState>,
    supported: bool,
    buffer_size: usize,
}

impl fmt::Debug for ReportQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        f.debug_struct("ReportQueue")
            .field("supported", &self.supported)
            .field("buffered", &state.buffer.len())
            .field("observers", &state.observers.len())
            .finish()
    }
}

impl ReportQueue {
    /// Creates a queue on a platform that supports reporting.
    #[allow(clippy::new_ret_no_self)]
    pub fn new() -> Arc<ReportQueue> {
        Arc::new(ReportQueue::with_support(true))
    }

    /// Creates a queue standing in for a platform without reporting.
    ///
    /// Observers can not be registered and reports are dropped.
    pub fn unsupported() -> Arc<ReportQueue> {
        Arc::new(ReportQueue::with_support(false))
    }

    fn with_support(supported: bool) -> ReportQueue {
        ReportQueue {
            state: Mutex::new(QueueState::default()),
            supported,
            buffer_size: DEFAULT_BUFFER_SIZE,
        }
    }

    /// Whether this platform delivers reports at all.
    pub fn supports_reporting(&self) -> bool {
        self.supported
    }

    /// Registers an observer.
    ///
    /// With `options.buffered` set, the reports already in the buffer that
    /// match `options.types` are delivered as one batch before this returns.
    pub fn observe<F>(&self, options: ObserveOptions, handler: F)
    where
        F: Fn(&[Report]) + Send + Sync + 'static,
    {
        if !self.supported {
            sentry_debug!("[ReportQueue] Reporting is not supported, ignoring observer");
            return;
        }
        let handler: ReportHandler = Arc::new(handler);
        let observer = Observer {
            types: options.types,
            handler: handler.clone(),
        };
        let backlog = {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            let backlog = if options.buffered {
                observer.matching(state.buffer.make_contiguous())
            } else {
                vec![]
            };
            state.observers.push(observer);
            backlog
        };
        if !backlog.is_empty() {
            sentry_debug!("[ReportQueue] Delivering {} buffered reports", backlog.len());
            handler(&backlog);
        }
    }

    /// Queues a report and delivers it to every interested observer.
    ///
    /// Handlers run on the calling thread, after the queue's lock has been
    /// released.
    pub fn queue_report(&self, report: Report) {
        if !self.supported {
            return;
        }
        let deliveries: Vec<(ReportHandler, Vec<Report>)> = {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            if state.buffer.len() == self.buffer_size {
                state.buffer.pop_front();
            }
            state.buffer.push_back(report.clone());
            state
                .observers
                .iter()
                .filter(|observer| observer.types.contains(&report.ty))
                .map(|observer| (observer.handler.clone(), vec![report.clone()]))
                .collect()
        };
        for (handler, reports) in deliveries {
            handler(&reports);
        }
    }
}
