//! Transport contract
//!
//! The client core never performs network I/O itself. A [`Transport`] receives fully built
//! [`PendingRequest`]s and reports the outcome of each one through a [`Completion`].

use std::fmt;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use futures::Stream;
use http::{HeaderMap, StatusCode};
use tokio::sync::oneshot;

use crate::config::ClientConfig;
use crate::error::RestError;
use crate::request::PendingRequest;

/// Streaming response body
pub type BodyStream = Pin<Box<dyn Stream<Item = Result<Bytes, RestError>> + Send>>;

/// Outcome reported by a transport
pub type Outcome = Result<RawResponse, RestError>;

/// Asynchronous HTTP execution capability
pub trait Transport: Send + Sync + fmt::Debug {
    /// Submit a request
    ///
    /// Must not block on network I/O. Exactly one outcome is expected through `completion`;
    /// extra completions are ignored.
    fn execute(&self, request: PendingRequest, completion: Completion);

    /// Release the transport's resources
    ///
    /// Requests still in flight may fail.
    fn close(&self);
}

/// Builds transports from a [`ClientConfig`]
pub trait TransportFactory: Send + Sync + fmt::Debug {
    /// Create a new transport
    fn create(&self, config: &ClientConfig) -> Result<Arc<dyn Transport>, RestError>;
}

/// Completed transport response
pub struct RawResponse {
    pub(crate) status: StatusCode,
    pub(crate) status_text: String,
    pub(crate) headers: HeaderMap,
    pub(crate) uri: String,
    pub(crate) body: BodyStream,
}

impl fmt::Debug for RawResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawResponse")
            .field("status", &self.status)
            .field("uri", &self.uri)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

impl RawResponse {
    /// Create a response with a streaming body
    ///
    /// `uri` is the final location after redirects.
    pub fn new(
        status: StatusCode,
        headers: HeaderMap,
        uri: impl Into<String>,
        body: BodyStream,
    ) -> Self {
        Self {
            status,
            status_text: status.canonical_reason().unwrap_or_default().to_string(),
            headers,
            uri: uri.into(),
            body,
        }
    }

    /// Create a response with an in-memory body
    pub fn from_bytes(
        status: StatusCode,
        headers: HeaderMap,
        uri: impl Into<String>,
        body: impl Into<Bytes>,
    ) -> Self {
        let body = body.into();
        let stream = futures::stream::once(async move { Ok::<_, RestError>(body) });
        Self::new(status, headers, uri, Box::pin(stream))
    }

    /// Override the status text
    pub fn with_status_text(mut self, text: impl Into<String>) -> Self {
        self.status_text = text.into();
        self
    }
}

/// Single-assignment completion handle given to a transport
///
/// Clones share one slot. The first call to [`Completion::complete`] resolves the request's
/// future; every later call is ignored.
#[derive(Clone)]
pub struct Completion {
    slot: Arc<Mutex<Option<oneshot::Sender<Outcome>>>>,
}

impl fmt::Debug for Completion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Completion")
            .field("completed", &self.is_completed())
            .finish()
    }
}

impl Completion {
    pub(crate) fn channel() -> (Self, oneshot::Receiver<Outcome>) {
        let (tx, rx) = oneshot::channel();
        (
            Self {
                slot: Arc::new(Mutex::new(Some(tx))),
            },
            rx,
        )
    }

    fn take_sender(&self) -> Option<oneshot::Sender<Outcome>> {
        match self.slot.lock() {
            Ok(mut slot) => slot.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        }
    }

    /// Report the outcome; returns `false` if the request was already completed
    pub fn complete(&self, outcome: Outcome) -> bool {
        let Some(sender) = self.take_sender() else {
            tracing::warn!("Ignoring repeated completion of a request");
            return false;
        };

        if sender.send(outcome).is_err() {
            tracing::debug!("Response future dropped before the request completed");
        }
        true
    }

    /// Report success
    pub fn success(&self, response: RawResponse) -> bool {
        self.complete(Ok(response))
    }

    /// Report failure
    pub fn failure(&self, error: RestError) -> bool {
        self.complete(Err(error))
    }

    /// Whether an outcome has already been reported
    pub fn is_completed(&self) -> bool {
        match self.slot.lock() {
            Ok(slot) => slot.is_none(),
            Err(poisoned) => poisoned.into_inner().is_none(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ok_response() -> RawResponse {
        RawResponse::from_bytes(StatusCode::OK, HeaderMap::new(), "http://h/", "ok")
    }

    #[test]
    fn test_first_completion_wins() {
        let (completion, mut rx) = Completion::channel();
        let clone = completion.clone();

        assert!(completion.success(ok_response()));
        assert!(!clone.failure(RestError::Timeout));
        assert!(clone.is_completed());

        let outcome = rx.try_recv().expect("outcome delivered");
        let response = outcome.expect("first outcome was success");
        assert_eq!(response.status, StatusCode::OK);
    }

    #[test]
    fn test_completion_after_receiver_dropped() {
        let (completion, rx) = Completion::channel();
        drop(rx);
        assert!(completion.failure(RestError::Timeout));
        assert!(!completion.failure(RestError::Timeout));
    }

    #[test]
    fn test_status_text_defaults_to_canonical_reason() {
        let response = ok_response();
        assert_eq!(response.status_text, "OK");

        let response = ok_response().with_status_text("Fine");
        assert_eq!(response.status_text, "Fine");
    }
}
