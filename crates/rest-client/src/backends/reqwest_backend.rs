//! reqwest-based transport

use std::sync::{Arc, Mutex, PoisonError};

use futures::TryStreamExt;

use crate::auth::{AuthScheme, Credentials};
use crate::body::EncodedBody;
use crate::config::ClientConfig;
use crate::error::RestError;
use crate::request::PendingRequest;
use crate::transport::{Completion, RawResponse, Transport, TransportFactory};

/// Builds [`ReqwestTransport`]s
#[derive(Debug, Default, Clone, Copy)]
pub struct ReqwestFactory;

impl TransportFactory for ReqwestFactory {
    fn create(&self, config: &ClientConfig) -> Result<Arc<dyn Transport>, RestError> {
        Ok(Arc::new(ReqwestTransport::new(config)?))
    }
}

/// Following and non-following clients sharing one configuration
///
/// reqwest fixes the redirect policy per client, so a per-request override picks one of the two.
#[derive(Debug, Clone)]
struct Clients {
    following: reqwest::Client,
    direct: reqwest::Client,
    follow_by_default: bool,
}

impl Clients {
    fn pick(&self, follow_redirects: Option<bool>) -> &reqwest::Client {
        if follow_redirects.unwrap_or(self.follow_by_default) {
            &self.following
        } else {
            &self.direct
        }
    }
}

/// Transport running requests on the ambient tokio runtime
#[derive(Debug)]
pub struct ReqwestTransport {
    clients: Mutex<Option<Clients>>,
}

impl ReqwestTransport {
    /// Build the underlying clients from `config`
    pub fn new(config: &ClientConfig) -> Result<Self, RestError> {
        let following = build_client(
            config,
            reqwest::redirect::Policy::limited(config.max_redirects),
        )?;
        let direct = build_client(config, reqwest::redirect::Policy::none())?;

        Ok(Self {
            clients: Mutex::new(Some(Clients {
                following,
                direct,
                follow_by_default: config.follow_redirects,
            })),
        })
    }

    fn clients(&self) -> Option<Clients> {
        self.clients
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Transport for ReqwestTransport {
    fn execute(&self, request: PendingRequest, completion: Completion) {
        let Some(clients) = self.clients() else {
            completion.failure(RestError::Transport("transport is closed".to_string()));
            return;
        };
        let client = clients.pick(request.follow_redirects()).clone();

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    let outcome = send(client, request).await;
                    if let Err(err) = &outcome {
                        tracing::debug!("Request failed: {}", err);
                    }
                    completion.complete(outcome);
                });
            }
            Err(_) => {
                completion.failure(RestError::Transport(
                    "no tokio runtime available to run the request".to_string(),
                ));
            }
        }
    }

    fn close(&self) {
        if self
            .clients
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .is_some()
        {
            tracing::debug!("Closed reqwest transport");
        }
    }
}

fn build_client(
    config: &ClientConfig,
    redirect: reqwest::redirect::Policy,
) -> Result<reqwest::Client, RestError> {
    let mut builder = reqwest::Client::builder()
        .danger_accept_invalid_certs(config.accept_invalid_certs)
        .redirect(redirect);

    if let Some(timeout) = config.connect_timeout_duration() {
        builder = builder.connect_timeout(timeout);
    }
    if let Some(timeout) = config.request_timeout_duration() {
        builder = builder.timeout(timeout);
    }
    if let Some(timeout) = config.pool_idle_timeout_duration() {
        builder = builder.pool_idle_timeout(timeout);
    }
    if let Some(max) = config.pool_max_idle_per_host {
        builder = builder.pool_max_idle_per_host(max);
    }
    if let Some(agent) = &config.user_agent {
        builder = builder.user_agent(agent.as_str());
    }

    if let Some(proxy_url) = &config.proxy {
        let proxy_url = proxy_url.to_string();
        let proxy = if let Some(pattern) = &config.proxy_host_pattern {
            let matcher = regex::Regex::new(pattern)
                .map_err(|e| RestError::Config(format!("Invalid proxy pattern: {}", e)))?;
            reqwest::Proxy::custom(move |url| {
                if matcher.is_match(url.host_str().unwrap_or("")) {
                    Some(proxy_url.clone())
                } else {
                    None
                }
            })
        } else {
            reqwest::Proxy::all(&proxy_url).map_err(|e| RestError::Config(e.to_string()))?
        };
        builder = builder.proxy(proxy);
    }

    builder.build().map_err(RestError::from)
}

/// Credentials as reqwest can send them
#[derive(Debug, PartialEq, Eq)]
enum TransportAuth<'a> {
    Basic { username: &'a str, password: &'a str },
    Anonymous,
}

fn transport_auth(credentials: &Credentials) -> Result<TransportAuth<'_>, RestError> {
    match credentials.scheme() {
        AuthScheme::Basic => Ok(TransportAuth::Basic {
            username: credentials.username(),
            password: credentials.password(),
        }),
        AuthScheme::None => Ok(TransportAuth::Anonymous),
        scheme => Err(RestError::Transport(format!(
            "{} authentication is not supported by the reqwest transport",
            scheme
        ))),
    }
}

async fn send(client: reqwest::Client, mut request: PendingRequest) -> Result<RawResponse, RestError> {
    let mut builder = client.request(request.method().clone(), request.url());

    for (name, values) in request.headers() {
        for value in values {
            builder = builder.header(name.as_str(), value.as_str());
        }
    }
    if let Some(host) = request.virtual_host() {
        builder = builder.header(http::header::HOST, host);
    }
    if let Some(timeout) = request.timeout() {
        builder = builder.timeout(timeout);
    }
    if let Some(credentials) = request.credentials() {
        if let TransportAuth::Basic { username, password } = transport_auth(credentials)? {
            builder = builder.basic_auth(username, Some(password));
        }
    }

    builder = match request.take_body() {
        EncodedBody::Empty => builder,
        EncodedBody::Bytes { bytes, .. } => builder.body(bytes),
        EncodedBody::Stream(stream) => builder.body(reqwest::Body::wrap_stream(stream)),
        EncodedBody::File(path) => {
            let file = tokio::fs::File::open(&path).await?;
            builder.body(reqwest::Body::from(file))
        }
    };

    let response = builder.send().await?;
    let status = response.status();
    let headers = response.headers().clone();
    let uri = response.url().to_string();
    tracing::debug!(status = status.as_u16(), uri = %uri, "Received response");

    let body = response.bytes_stream().map_err(RestError::from);
    Ok(RawResponse::new(status, headers, uri, Box::pin(body)))
}
