#![allow(dead_code)]

use std::error::Error;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::FutureExt;
use sentry_hub::{
    Client, ClientError, ClientFuture, Dispatcher, DispatcherOptions, Event, Hint, Hub, HubOptions,
    Level, Scope,
};

/// What a `RecordingClient` saw for a single capture.
#[derive(Debug, Clone)]
pub struct Call {
    pub method: &'static str,
    pub message: Option<String>,
    pub level: Option<Level>,
    pub hint: Hint,
    pub scope: Scope,
}

#[derive(Default)]
pub struct RecordingClient {
    calls: Mutex<Vec<Call>>,
    pub fail: bool,
}

impl RecordingClient {
    pub fn new() -> Arc<RecordingClient> {
        Arc::new(RecordingClient::default())
    }

    pub fn failing() -> Arc<RecordingClient> {
        Arc::new(RecordingClient {
            fail: true,
            ..Default::default()
        })
    }

    pub fn calls(&self) -> Vec<Call> {
        std::mem::take(&mut *self.calls.lock().unwrap())
    }

    fn record(
        &self,
        method: &'static str,
        message: Option<String>,
        level: Option<Level>,
        hint: Hint,
        scope: &Scope,
    ) -> ClientFuture {
        let event_id = hint.event_id.unwrap_or_default();
        self.calls.lock().unwrap().push(Call {
            method,
            message,
            level,
            hint,
            scope: scope.clone(),
        });
        let fail = self.fail;
        async move {
            if fail {
                Err(ClientError::Rejected(event_id))
            } else {
                Ok(())
            }
        }
        .boxed()
    }
}

impl Client for RecordingClient {
    fn capture_exception(&self, exception: &(dyn Error + 'static), hint: Hint, scope: &Scope) -> ClientFuture {
        self.record("capture_exception", Some(exception.to_string()), None, hint, scope)
    }

    fn capture_message(&self, message: &str, level: Option<Level>, hint: Hint, scope: &Scope) -> ClientFuture {
        self.record("capture_message", Some(message.to_string()), level, hint, scope)
    }

    fn capture_event(&self, event: Event<'static>, hint: Hint, scope: &Scope) -> ClientFuture {
        self.record("capture_event", event.message.clone(), Some(event.level), hint, scope)
    }
}

pub fn init_logging() {
    let _ = pretty_env_logger::try_init();
}

pub fn hub_with_dispatcher(client: Option<Arc<RecordingClient>>, options: DispatcherOptions) -> Arc<Hub> {
    Arc::new(Hub::with_options(
        client.map(|client| client as Arc<dyn Client>),
        Default::default(),
        HubOptions {
            dispatcher: Some(Arc::new(Dispatcher::new(options))),
            ..Default::default()
        },
    ))
}

pub fn flush(hub: &Hub) {
    assert!(hub.flush(Duration::from_secs(5)));
}
