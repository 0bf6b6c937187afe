use std::error::Error;

use thiserror::Error;

use crate::Uuid;

/// The failure outcome of an asynchronous client capture.
///
/// The hub never returns these to the code that captured the event.  They
/// only reach the [`DiagnosticHook`](crate::DiagnosticHook) of the
/// dispatcher that drove the client future.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The client refused to process the event.
    #[error("event {0} was rejected by the client")]
    Rejected(Uuid),
    /// The client is shut down or otherwise unable to accept events.
    #[error("client is unavailable: {0}")]
    Unavailable(String),
    /// Any other failure raised while handling the capture.
    #[error(transparent)]
    Other(#[from] Box<dyn Error + Send + Sync>),
}

/// A failure while mirroring a scope into the client's backend.
///
/// Scope mirroring is best effort, so these are swallowed by the hub.
#[derive(Debug, Error)]
#[error("failed to store scope: {0}")]
pub struct BackendError(pub String);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_error_messages() {
        let err = ClientError::Rejected(Uuid::nil());
        assert_eq!(
            err.to_string(),
            "event 00000000-0000-0000-0000-000000000000 was rejected by the client"
        );

        let boxed: Box<dyn Error + Send + Sync> = "transport closed".into();
        assert_eq!(ClientError::from(boxed).to_string(), "transport closed");

        let err = BackendError("disk full".into());
        assert_eq!(err.to_string(), "failed to store scope: disk full");
    }
}
