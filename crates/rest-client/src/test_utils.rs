//! In-memory transport for unit tests

use std::sync::{Arc, Mutex};
use std::time::Duration;

use http::{HeaderMap, HeaderValue, StatusCode};

use crate::auth::Credentials;
use crate::config::ClientConfig;
use crate::error::RestError;
use crate::request::{Headers, PendingRequest};
use crate::transport::{Completion, RawResponse, Transport, TransportFactory};

/// What the transport does with each request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Behavior {
    Respond,
    CompleteTwice,
    Fail,
    Drop,
}

/// What the transport saw of a request
#[derive(Debug, Clone)]
pub(crate) struct RecordedRequest {
    pub(crate) method: String,
    pub(crate) url: String,
    pub(crate) headers: Headers,
    pub(crate) body: Option<Vec<u8>>,
    pub(crate) timeout: Option<Duration>,
    pub(crate) follow_redirects: Option<bool>,
    pub(crate) virtual_host: Option<String>,
    pub(crate) credentials: Option<Credentials>,
}

pub(crate) type Recorded = Arc<Mutex<Vec<RecordedRequest>>>;

#[derive(Debug)]
pub(crate) struct RecordingTransport {
    behavior: Behavior,
    recorded: Recorded,
}

impl Transport for RecordingTransport {
    fn execute(&self, request: PendingRequest, completion: Completion) {
        self.recorded
            .lock()
            .expect("recording lock")
            .push(RecordedRequest {
                method: request.method().to_string(),
                url: request.url().to_string(),
                headers: request.headers().clone(),
                body: request.body_bytes().map(<[u8]>::to_vec),
                timeout: request.timeout(),
                follow_redirects: request.follow_redirects(),
                virtual_host: request.virtual_host().map(str::to_string),
                credentials: request.credentials().cloned(),
            });

        let mut headers = HeaderMap::new();
        headers.insert(
            http::header::CONTENT_TYPE,
            HeaderValue::from_static("text/plain; charset=utf-8"),
        );
        let response = || {
            RawResponse::from_bytes(StatusCode::OK, headers.clone(), request.url().as_str(), "ok")
        };

        match self.behavior {
            Behavior::Respond => {
                completion.success(response());
            }
            Behavior::CompleteTwice => {
                completion.success(response());
                completion.failure(RestError::Transport("second callback".to_string()));
            }
            Behavior::Fail => {
                completion.failure(RestError::Connection("connection refused".to_string()));
            }
            Behavior::Drop => drop(completion),
        }
    }

    fn close(&self) {}
}

#[derive(Debug)]
pub(crate) struct RecordingFactory {
    behavior: Behavior,
    recorded: Recorded,
}

impl RecordingFactory {
    pub(crate) fn new(behavior: Behavior) -> (Self, Recorded) {
        let recorded = Recorded::default();
        (
            Self {
                behavior,
                recorded: Arc::clone(&recorded),
            },
            recorded,
        )
    }
}

impl TransportFactory for RecordingFactory {
    fn create(&self, _config: &ClientConfig) -> Result<Arc<dyn Transport>, RestError> {
        Ok(Arc::new(RecordingTransport {
            behavior: self.behavior,
            recorded: Arc::clone(&self.recorded),
        }))
    }
}
