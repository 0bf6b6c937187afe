use std::collections::BTreeSet;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{sync_channel, SyncSender};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use futures::FutureExt;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::mpsc::{channel, Sender};
use tokio::sync::Notify;

use crate::constants::{DEFAULT_DISPATCH_QUEUE_SIZE, DISPATCH_THREAD_NAME};
use crate::{ClientError, ClientFuture, Uuid};

const FLUSH_RETRY_INTERVAL: Duration = Duration::from_millis(1);

lazy_static::lazy_static! {
    static ref DEFAULT_DISPATCHER: Arc<Dispatcher> =
        Arc::new(Dispatcher::new(DispatcherOptions::default()));
}

/// A client capture that completed with an error.
#[derive(Debug)]
pub struct DispatchFailure {
    /// The client operation, e.g. `capture_message`.
    pub method: &'static str,
    /// The event id the hub returned for the capture.
    pub event_id: Uuid,
    /// The error the client future resolved to.
    pub error: ClientError,
}

impl fmt::Display for DispatchFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} for event {} failed: {}", self.method, self.event_id, self.error)
    }
}

/// Receives the failures of client captures.
pub type DiagnosticHook = Arc<dyn Fn(&DispatchFailure) + Send + Sync>;

/// Configuration of a [`Dispatcher`].
#[derive(Clone)]
pub struct DispatcherOptions {
    /// The number of captures that may wait for the worker.  Further captures
    /// are dropped until the worker catches up.
    pub queue_size: usize,
    /// Where failures go.  Defaults to logging them at error level.
    pub diagnostic: Option<DiagnosticHook>,
}

impl Default for DispatcherOptions {
    fn default() -> DispatcherOptions {
        DispatcherOptions {
            queue_size: DEFAULT_DISPATCH_QUEUE_SIZE,
            diagnostic: None,
        }
    }
}

impl fmt::Debug for DispatcherOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatcherOptions")
            .field("queue_size", &self.queue_size)
            .field("diagnostic", &self.diagnostic.is_some())
            .finish()
    }
}

fn log_failure(failure: &DispatchFailure) {
    log::error!(target: "sentry_hub", "[Dispatcher] {}", failure);
}

struct Dispatch {
    method: &'static str,
    event_id: Uuid,
    future: ClientFuture,
}

enum Task {
    Dispatch(Dispatch),
    Flush(SyncSender<()>),
    Shutdown,
}

/// Sequence numbers of the dispatched futures that have not completed yet.
#[derive(Default)]
struct InFlight {
    pending: Mutex<BTreeSet<u64>>,
    done: Notify,
}

impl InFlight {
    fn start(&self, seq: u64) {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(seq);
    }

    fn finish(&self, seq: u64) {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&seq);
        self.done.notify_waiters();
    }

    fn any_through(&self, seq: u64) -> bool {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .range(..=seq)
            .next()
            .is_some()
    }

    /// Resolves once every future up to and including `seq` has completed.
    async fn wait_through(&self, seq: u64) {
        loop {
            let done = self.done.notified();
            if !self.any_through(seq) {
                return;
            }
            done.await;
        }
    }
}

/// Marks a dispatch as completed when dropped, including on panic.
struct Finished(Arc<InFlight>, u64);

impl Drop for Finished {
    fn drop(&mut self) {
        self.0.finish(self.1);
    }
}

async fn drive(dispatch: Dispatch, diagnostic: &DiagnosticHook) {
    let Dispatch {
        method,
        event_id,
        future,
    } = dispatch;
    let error = match AssertUnwindSafe(future).catch_unwind().await {
        Ok(Ok(())) => {
            sentry_debug!("[Dispatcher] {} for event {} completed", method, event_id);
            return;
        }
        Ok(Err(error)) => error,
        Err(_) => ClientError::Other("client panicked while capturing".into()),
    };
    diagnostic(&DispatchFailure {
        method,
        event_id,
        error,
    });
}

/// Drives client futures to completion on a background thread.
///
/// The worker owns a single threaded `tokio` runtime and spawns every
/// future as its own task, so a slow client call does not hold back the
/// ones dispatched after it.  Their outcome is never reported back to the
/// code that captured the event: a failure only reaches the diagnostic hook.
pub struct Dispatcher {
    sender: Sender<Task>,
    shutdown: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("shutdown", &self.shutdown.load(Ordering::SeqCst))
            .finish()
    }
}

impl Dispatcher {
    /// Spawns the worker thread.
    pub fn new(options: DispatcherOptions) -> Dispatcher {
        let (sender, mut receiver) = channel(options.queue_size.max(1));
        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_worker = shutdown.clone();
        let diagnostic = options
            .diagnostic
            .unwrap_or_else(|| Arc::new(log_failure) as DiagnosticHook);

        let handle = thread::Builder::new()
            .name(DISPATCH_THREAD_NAME.into())
            .spawn(move || {
                let rt = match tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                {
                    Ok(rt) => rt,
                    Err(err) => {
                        log::error!(
                            target: "sentry_hub",
                            "[Dispatcher] Failed to start runtime: {}",
                            err
                        );
                        return;
                    }
                };

                rt.block_on(async move {
                    let in_flight = Arc::new(InFlight::default());
                    let mut seq = 0;
                    while let Some(task) = receiver.recv().await {
                        if shutdown_worker.load(Ordering::SeqCst) {
                            return;
                        }
                        match task {
                            Task::Dispatch(dispatch) => {
                                seq += 1;
                                in_flight.start(seq);
                                let finished = Finished(in_flight.clone(), seq);
                                let diagnostic = diagnostic.clone();
                                tokio::spawn(async move {
                                    let _finished = finished;
                                    drive(dispatch, &diagnostic).await;
                                });
                            }
                            Task::Flush(sender) => {
                                let in_flight = in_flight.clone();
                                let through = seq;
                                tokio::spawn(async move {
                                    in_flight.wait_through(through).await;
                                    sender.send(()).ok();
                                });
                            }
                            Task::Shutdown => return,
                        }
                    }
                })
            })
            .ok();

        Dispatcher {
            sender,
            shutdown,
            handle,
        }
    }

    /// The dispatcher shared by all hubs that were not given their own.
    pub fn shared() -> Arc<Dispatcher> {
        DEFAULT_DISPATCHER.clone()
    }

    /// Queues a client future without waiting for it.
    pub(crate) fn dispatch(&self, method: &'static str, event_id: Uuid, future: ClientFuture) {
        let task = Task::Dispatch(Dispatch {
            method,
            event_id,
            future,
        });
        match self.sender.try_send(task) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                sentry_debug!("[Dispatcher] Queue is full, dropping {} for event {}", method, event_id);
            }
            Err(TrySendError::Closed(_)) => {
                sentry_debug!("[Dispatcher] Worker is gone, dropping {} for event {}", method, event_id);
            }
        }
    }

    /// Waits until every future dispatched before this call has completed.
    ///
    /// Returns `false` if that did not happen within `timeout`.
    pub fn flush(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let (sender, receiver) = sync_channel(1);
        let mut task = Task::Flush(sender);
        loop {
            match self.sender.try_send(task) {
                Ok(()) => break,
                Err(TrySendError::Full(returned)) => {
                    if Instant::now() >= deadline {
                        return false;
                    }
                    task = returned;
                    thread::sleep(FLUSH_RETRY_INTERVAL);
                }
                Err(TrySendError::Closed(_)) => return false,
            }
        }
        receiver
            .recv_timeout(deadline.saturating_duration_since(Instant::now()))
            .is_ok()
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
        let delivered = self.sender.try_send(Task::Shutdown).is_ok();
        if let Some(handle) = self.handle.take() {
            // the worker exits on its next task even if the shutdown message
            // did not fit into the queue
            if delivered && handle.thread().id() != thread::current().id() {
                let _ = handle.join();
            } else {
                sentry_debug!("[Dispatcher] Detaching worker thread");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collecting_dispatcher() -> (Dispatcher, Arc<Mutex<Vec<String>>>) {
        let failures = Arc::new(Mutex::new(vec![]));
        let sink = failures.clone();
        let dispatcher = Dispatcher::new(DispatcherOptions {
            diagnostic: Some(Arc::new(move |failure: &DispatchFailure| {
                sink.lock().unwrap().push(failure.to_string());
            })),
            ..Default::default()
        });
        (dispatcher, failures)
    }

    #[test]
    fn failures_reach_the_diagnostic_hook() {
        let (dispatcher, failures) = collecting_dispatcher();
        let ok = Uuid::new_v4();
        let rejected = Uuid::new_v4();

        dispatcher.dispatch("capture_message", ok, async { Ok::<(), ClientError>(()) }.boxed());
        dispatcher.dispatch(
            "capture_event",
            rejected,
            async move { Err(ClientError::Rejected(rejected)) }.boxed(),
        );
        assert!(dispatcher.flush(Duration::from_secs(5)));

        let failures = failures.lock().unwrap();
        assert_eq!(failures.len(), 1);
        assert_eq!(
            failures[0],
            format!(
                "capture_event for event {} failed: event {} was rejected by the client",
                rejected, rejected
            )
        );
    }

    #[test]
    fn panicking_futures_do_not_stop_the_worker() {
        let (dispatcher, failures) = collecting_dispatcher();
        dispatcher.dispatch(
            "capture_exception",
            Uuid::nil(),
            async {
                if true {
                    panic!("broken client");
                }
                Ok(())
            }
            .boxed(),
        );
        dispatcher.dispatch("capture_message", Uuid::nil(), async { Ok(()) }.boxed());
        assert!(dispatcher.flush(Duration::from_secs(5)));
        assert_eq!(failures.lock().unwrap().len(), 1);
    }

    #[test]
    fn hanging_futures_do_not_hold_back_later_ones() {
        let (tx, rx) = std::sync::mpsc::channel();
        let tx = Mutex::new(tx);
        let dispatcher = Dispatcher::new(DispatcherOptions {
            diagnostic: Some(Arc::new(move |failure: &DispatchFailure| {
                tx.lock().unwrap().send(failure.event_id).ok();
            })),
            ..Default::default()
        });
        let rejected = Uuid::new_v4();

        dispatcher.dispatch(
            "capture_message",
            Uuid::nil(),
            futures::future::pending::<Result<(), ClientError>>().boxed(),
        );
        dispatcher.dispatch(
            "capture_message",
            rejected,
            async move { Err(ClientError::Unavailable("closed".into())) }.boxed(),
        );

        assert_eq!(rx.recv_timeout(Duration::from_secs(5)), Ok(rejected));
        assert!(!dispatcher.flush(Duration::from_millis(50)));
    }

    #[test]
    fn flush_waits_for_earlier_futures() {
        let dispatcher = Dispatcher::new(DispatcherOptions::default());
        let done = Arc::new(AtomicBool::new(false));
        let flag = done.clone();
        dispatcher.dispatch(
            "capture_event",
            Uuid::nil(),
            async move {
                tokio::time::sleep(Duration::from_millis(50)).await;
                flag.store(true, Ordering::SeqCst);
                Ok(())
            }
            .boxed(),
        );
        assert!(dispatcher.flush(Duration::from_secs(5)));
        assert!(done.load(Ordering::SeqCst));
    }

    #[test]
    fn flush_and_drop_return_despite_hanging_futures() {
        let started = Instant::now();
        let dispatcher = Dispatcher::new(DispatcherOptions {
            queue_size: 1,
            ..Default::default()
        });
        for _ in 0..5 {
            dispatcher.dispatch(
                "capture_message",
                Uuid::nil(),
                futures::future::pending::<Result<(), ClientError>>().boxed(),
            );
        }
        assert!(!dispatcher.flush(Duration::from_millis(50)));
        drop(dispatcher);
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[test]
    fn full_queue_drops_instead_of_blocking() {
        let dispatcher = Dispatcher::new(DispatcherOptions {
            queue_size: 1,
            ..Default::default()
        });
        for _ in 0..10 {
            dispatcher.dispatch(
                "capture_message",
                Uuid::nil(),
                async {
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    Ok(())
                }
                .boxed(),
            );
        }
        assert!(dispatcher.flush(Duration::from_secs(5)));
    }
}
