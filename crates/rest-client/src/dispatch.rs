//! Request dispatch and callback-to-future bridging

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use http::Method;
use tokio::sync::oneshot;
use url::Url;

use crate::auth::Credentials;
use crate::body::{self, Body};
use crate::error::RestError;
use crate::lifecycle::ClientManager;
use crate::request::{Headers, PendingRequest, QueryParameters, RequestSigner};
use crate::response::RestResponse;
use crate::transport::{Completion, Outcome};

/// Copy of a holder's configuration taken when a verb is called
pub(crate) struct RequestSnapshot {
    pub(crate) method: Method,
    pub(crate) endpoint: Url,
    pub(crate) query: QueryParameters,
    pub(crate) headers: Headers,
    pub(crate) body: Body,
    pub(crate) timeout: Duration,
    pub(crate) follow_redirects: Option<bool>,
    pub(crate) virtual_host: Option<String>,
    pub(crate) credentials: Option<Credentials>,
    pub(crate) signer: Option<Arc<dyn RequestSigner>>,
}

/// Encode the body and apply overrides: timeout, redirects, virtual host, credentials, signer
pub(crate) fn prepare(snapshot: RequestSnapshot) -> Result<PendingRequest, RestError> {
    let RequestSnapshot {
        method,
        endpoint,
        query,
        mut headers,
        body,
        timeout,
        follow_redirects,
        virtual_host,
        credentials,
        signer,
    } = snapshot;

    let body = body::encode(body, &mut headers)?;
    let mut request = PendingRequest::new(method, endpoint, query, headers, body);

    if !timeout.is_zero() {
        request.set_timeout(timeout);
    }
    if let Some(follow) = follow_redirects {
        request.set_follow_redirects(follow);
    }
    if let Some(host) = virtual_host {
        request.set_virtual_host(host);
    }
    if credentials.is_some() {
        request.set_credentials(credentials);
    }
    if let Some(signer) = signer {
        signer.sign(&mut request)?;
    }

    Ok(request)
}

/// Prepare a snapshot and submit it to the current shared client
///
/// Never fails synchronously: encoding, signing and client build errors resolve the returned
/// future with an error.
pub(crate) fn dispatch(snapshot: RequestSnapshot, clients: &ClientManager) -> ResponseFuture {
    let request = match prepare(snapshot) {
        Ok(request) => request,
        Err(err) => {
            tracing::debug!("Request failed before submission: {}", err);
            return ResponseFuture::failed(err);
        }
    };

    let client = match clients.current_client() {
        Ok(client) => client,
        Err(err) => {
            tracing::warn!("Could not obtain transport client: {}", err);
            return ResponseFuture::failed(err);
        }
    };

    tracing::debug!(
        method = %request.method(),
        endpoint = %request.endpoint(),
        "Dispatching request"
    );

    let (completion, receiver) = Completion::channel();
    client.execute(request, completion);
    ResponseFuture::pending(receiver)
}

enum State {
    Pending(oneshot::Receiver<Outcome>),
    Failed(RestError),
    Done,
}

/// Future resolving to the response of a dispatched request
///
/// Resolves exactly once; it does not borrow the holder it came from.
#[must_use = "futures do nothing unless polled"]
pub struct ResponseFuture {
    state: State,
}

impl fmt::Debug for ResponseFuture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match &self.state {
            State::Pending(_) => "pending",
            State::Failed(_) => "failed",
            State::Done => "done",
        };
        f.debug_struct("ResponseFuture")
            .field("state", &state)
            .finish()
    }
}

impl ResponseFuture {
    pub(crate) fn pending(receiver: oneshot::Receiver<Outcome>) -> Self {
        Self {
            state: State::Pending(receiver),
        }
    }

    pub(crate) fn failed(error: RestError) -> Self {
        Self {
            state: State::Failed(error),
        }
    }
}

impl Future for ResponseFuture {
    type Output = Result<RestResponse, RestError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();

        match std::mem::replace(&mut this.state, State::Done) {
            State::Pending(mut receiver) => match Pin::new(&mut receiver).poll(cx) {
                Poll::Pending => {
                    this.state = State::Pending(receiver);
                    Poll::Pending
                }
                Poll::Ready(Ok(outcome)) => Poll::Ready(outcome.map(RestResponse::new)),
                Poll::Ready(Err(_)) => Poll::Ready(Err(RestError::Transport(
                    "transport dropped the request without completing it".to_string(),
                ))),
            },
            State::Failed(err) => Poll::Ready(Err(err)),
            State::Done => Poll::Ready(Err(RestError::Transport(
                "response future polled after completion".to_string(),
            ))),
        }
    }
}
