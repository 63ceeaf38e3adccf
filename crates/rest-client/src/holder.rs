//! Fluent request builder

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use http::Method;
use url::Url;

use crate::auth::{AuthScheme, Credentials};
use crate::body::Body;
use crate::dispatch::{self, RequestSnapshot, ResponseFuture};
use crate::error::RestError;
use crate::lifecycle::ClientManager;
use crate::request::{append_header, Headers, QueryParameters, RequestSigner, CONTENT_TYPE};
use crate::uri::{self, ResolvedEndpoint};

/// Mutable builder for one endpoint
///
/// Every verb call snapshots the configuration, so the holder can be dispatched several times
/// and modified between calls without affecting requests already in flight.
pub struct RequestHolder {
    clients: Arc<ClientManager>,
    url: Url,
    method: Method,
    headers: Headers,
    query: QueryParameters,
    credentials: Option<Credentials>,
    signer: Option<Arc<dyn RequestSigner>>,
    timeout: Duration,
    follow_redirects: Option<bool>,
    virtual_host: Option<String>,
    body: Body,
}

impl fmt::Debug for RequestHolder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestHolder")
            .field("url", &self.url.as_str())
            .field("method", &self.method)
            .field("headers", &self.headers)
            .field("query", &self.query)
            .field("credentials", &self.credentials)
            .field("signed", &self.signer.is_some())
            .field("timeout", &self.timeout)
            .field("follow_redirects", &self.follow_redirects)
            .field("virtual_host", &self.virtual_host)
            .field("body", &self.body)
            .finish()
    }
}

impl RequestHolder {
    pub(crate) fn new(clients: Arc<ClientManager>, resolved: ResolvedEndpoint) -> Self {
        let ResolvedEndpoint {
            endpoint,
            credentials,
            query,
        } = resolved;

        let mut holder = Self {
            clients,
            url: endpoint,
            method: Method::GET,
            headers: Headers::new(),
            query: QueryParameters::new(),
            credentials,
            signer: None,
            timeout: Duration::ZERO,
            follow_redirects: None,
            virtual_host: None,
            body: Body::None,
        };
        for (name, value) in query {
            holder.push_query(name, value);
        }
        holder
    }

    fn push_query(&mut self, name: String, value: Option<String>) {
        self.query.entry(name).or_default().push(value);
    }

    /// Append a header value
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        append_header(&mut self.headers, name, value);
        self
    }

    /// Set the `Content-Type` header
    pub fn content_type(self, content_type: impl Into<String>) -> Self {
        self.header(CONTENT_TYPE, content_type)
    }

    /// Append a query parameter value
    pub fn query_parameter(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.push_query(name.into(), Some(value.into()));
        self
    }

    /// Append a query parameter without a value, sent as `?name`
    pub fn query_flag(mut self, name: impl Into<String>) -> Self {
        self.push_query(name.into(), None);
        self
    }

    /// Append every parameter of a raw `a=1&b` query string
    pub fn query_string(mut self, raw: &str) -> Result<Self, RestError> {
        for (name, value) in uri::parse_query_string(raw)? {
            self.push_query(name, value);
        }
        Ok(self)
    }

    /// Set Basic credentials from a `user:password` userinfo string
    pub fn auth_user_info(mut self, user_info: &str) -> Result<Self, RestError> {
        self.credentials = Some(Credentials::from_user_info(user_info)?);
        Ok(self)
    }

    /// Set Basic credentials
    pub fn auth(self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.auth_with_scheme(username, password, AuthScheme::Basic)
    }

    /// Set credentials for a specific scheme
    pub fn auth_with_scheme(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
        scheme: AuthScheme,
    ) -> Self {
        self.credentials = Some(Credentials::new(username, password, scheme));
        self
    }

    /// Attach a signer, run just before the request is submitted
    pub fn sign(mut self, signer: impl RequestSigner + 'static) -> Self {
        self.signer = Some(Arc::new(signer));
        self
    }

    /// Follow redirects for this holder's requests
    pub fn follow_redirects(mut self, follow: bool) -> Self {
        self.follow_redirects = Some(follow);
        self
    }

    /// Send requests with this virtual host
    pub fn virtual_host(mut self, host: impl Into<String>) -> Self {
        self.virtual_host = Some(host.into());
        self
    }

    /// Request timeout; zero leaves the client default in place
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// HTTP method used by [`RequestHolder::execute`]
    pub fn method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    /// Replace the body
    pub fn body(mut self, body: impl Into<Body>) -> Self {
        self.body = body.into();
        self
    }

    /// Endpoint, without query parameters or userinfo
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Configured method
    pub fn get_method(&self) -> &Method {
        &self.method
    }

    /// Configured headers
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Configured query parameters
    pub fn query_parameters(&self) -> &QueryParameters {
        &self.query
    }

    /// Configured credentials
    pub fn credentials(&self) -> Option<&Credentials> {
        self.credentials.as_ref()
    }

    /// Configured timeout; zero when unset
    pub fn get_timeout(&self) -> Duration {
        self.timeout
    }

    /// Redirect override; `None` defers to the client
    pub fn get_follow_redirects(&self) -> Option<bool> {
        self.follow_redirects
    }

    /// Configured virtual host
    pub fn get_virtual_host(&self) -> Option<&str> {
        self.virtual_host.as_deref()
    }

    /// Configured signer
    pub fn signer(&self) -> Option<&Arc<dyn RequestSigner>> {
        self.signer.as_ref()
    }

    /// Configured body
    pub fn get_body(&self) -> &Body {
        &self.body
    }

    /// GET request
    pub fn get(&mut self) -> ResponseFuture {
        self.execute_method(Method::GET)
    }

    /// DELETE request
    pub fn delete(&mut self) -> ResponseFuture {
        self.execute_method(Method::DELETE)
    }

    /// HEAD request
    pub fn head(&mut self) -> ResponseFuture {
        self.execute_method(Method::HEAD)
    }

    /// OPTIONS request
    pub fn options(&mut self) -> ResponseFuture {
        self.execute_method(Method::OPTIONS)
    }

    /// POST request with a body
    pub fn post(&mut self, body: impl Into<Body>) -> ResponseFuture {
        self.send_with_body(Method::POST, body.into())
    }

    /// PUT request with a body
    pub fn put(&mut self, body: impl Into<Body>) -> ResponseFuture {
        self.send_with_body(Method::PUT, body.into())
    }

    /// PATCH request with a body
    pub fn patch(&mut self, body: impl Into<Body>) -> ResponseFuture {
        self.send_with_body(Method::PATCH, body.into())
    }

    fn send_with_body(&mut self, method: Method, body: Body) -> ResponseFuture {
        self.body = body;
        self.execute_method(method)
    }

    /// Request with the given method and the configured body
    pub fn execute_method(&mut self, method: Method) -> ResponseFuture {
        self.method = method;
        self.execute()
    }

    /// Request with the configured method and body
    pub fn execute(&mut self) -> ResponseFuture {
        dispatch::dispatch(self.snapshot(), &self.clients)
    }

    fn snapshot(&mut self) -> RequestSnapshot {
        RequestSnapshot {
            method: self.method.clone(),
            endpoint: self.url.clone(),
            query: self.query.clone(),
            headers: self.headers.clone(),
            body: self.body.snapshot(),
            timeout: self.timeout,
            follow_redirects: self.follow_redirects,
            virtual_host: self.virtual_host.clone(),
            credentials: self.credentials.clone(),
            signer: self.signer.clone(),
        }
    }
}
