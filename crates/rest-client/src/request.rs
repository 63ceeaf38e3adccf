//! Dispatched request snapshot

use std::collections::BTreeMap;
use std::time::Duration;

use http::Method;
use url::Url;

use crate::auth::Credentials;
use crate::body::EncodedBody;
use crate::error::RestError;

/// Header name to values, in insertion order per name
pub type Headers = BTreeMap<String, Vec<String>>;

/// Query parameter name to values, in insertion order per name
pub type QueryParameters = BTreeMap<String, Vec<Option<String>>>;

/// `Content-Type` header name
pub const CONTENT_TYPE: &str = "Content-Type";

/// First value of a header, matching the name case-insensitively
pub fn first_header<'a>(headers: &'a Headers, name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .and_then(|(_, values)| values.first())
        .map(String::as_str)
}

/// Append a header value under the first key that matches the name case-insensitively
pub fn append_header(headers: &mut Headers, name: impl Into<String>, value: impl Into<String>) {
    let name = name.into();
    let value = value.into();
    match headers
        .iter_mut()
        .find(|(key, _)| key.eq_ignore_ascii_case(&name))
    {
        Some((_, values)) => values.push(value),
        None => {
            headers.insert(name, vec![value]);
        }
    }
}

/// Replace every value of a header, whatever case it was stored under
pub fn replace_header(headers: &mut Headers, name: &str, value: impl Into<String>) {
    headers.retain(|key, _| !key.eq_ignore_ascii_case(name));
    headers.insert(name.to_string(), vec![value.into()]);
}

/// Signature capability invoked right before a request is submitted (OAuth and similar)
///
/// The signer runs after every other override, so it observes the final method, URL, headers,
/// body and credentials, and may change any of them.
pub trait RequestSigner: Send + Sync {
    /// Sign the request in place
    fn sign(&self, request: &mut PendingRequest) -> Result<(), RestError>;
}

impl<F> RequestSigner for F
where
    F: Fn(&mut PendingRequest) -> Result<(), RestError> + Send + Sync,
{
    fn sign(&self, request: &mut PendingRequest) -> Result<(), RestError> {
        self(request)
    }
}

/// Request as handed to the transport
///
/// Built from a snapshot of a [`RequestHolder`](crate::RequestHolder) at dispatch time; later
/// changes to the holder never reach an already built request.
#[derive(Debug)]
pub struct PendingRequest {
    method: Method,
    endpoint: Url,
    query: QueryParameters,
    headers: Headers,
    body: EncodedBody,
    timeout: Option<Duration>,
    follow_redirects: Option<bool>,
    virtual_host: Option<String>,
    credentials: Option<Credentials>,
}

impl PendingRequest {
    pub(crate) fn new(
        method: Method,
        endpoint: Url,
        query: QueryParameters,
        headers: Headers,
        body: EncodedBody,
    ) -> Self {
        Self {
            method,
            endpoint,
            query,
            headers,
            body,
            timeout: None,
            follow_redirects: None,
            virtual_host: None,
            credentials: None,
        }
    }

    /// HTTP method
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Final URL, with the query parameters applied
    pub fn url(&self) -> Url {
        let mut url = self.endpoint.clone();
        if self.query.is_empty() {
            return url;
        }

        {
            let mut pairs = url.query_pairs_mut();
            for (name, values) in &self.query {
                for value in values {
                    match value {
                        Some(value) => pairs.append_pair(name, value),
                        None => pairs.append_key_only(name),
                    };
                }
            }
        }
        url
    }

    /// Endpoint without query parameters
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Query parameters
    pub fn query_parameters(&self) -> &QueryParameters {
        &self.query
    }

    /// All headers
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Values of a header, matching the name case-insensitively
    pub fn header(&self, name: &str) -> Vec<&str> {
        self.headers
            .iter()
            .filter(|(key, _)| key.eq_ignore_ascii_case(name))
            .flat_map(|(_, values)| values.iter().map(String::as_str))
            .collect()
    }

    /// Replace a header
    pub fn set_header(&mut self, name: &str, value: impl Into<String>) {
        replace_header(&mut self.headers, name, value);
    }

    /// Append a header value
    pub fn add_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        append_header(&mut self.headers, name, value);
    }

    /// Encoded body
    pub fn body(&self) -> &EncodedBody {
        &self.body
    }

    /// Body bytes, when the body is held in memory
    pub fn body_bytes(&self) -> Option<&[u8]> {
        match &self.body {
            EncodedBody::Bytes { bytes, .. } => Some(&bytes[..]),
            _ => None,
        }
    }

    /// Take the body out, leaving [`EncodedBody::Empty`]
    pub fn take_body(&mut self) -> EncodedBody {
        std::mem::take(&mut self.body)
    }

    /// Per-request timeout
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Follow redirects override; `None` defers to the client
    pub fn follow_redirects(&self) -> Option<bool> {
        self.follow_redirects
    }

    /// Virtual host sent as the `Host` header
    pub fn virtual_host(&self) -> Option<&str> {
        self.virtual_host.as_deref()
    }

    /// Credentials sent preemptively
    pub fn credentials(&self) -> Option<&Credentials> {
        self.credentials.as_ref()
    }

    /// Replace the credentials
    pub fn set_credentials(&mut self, credentials: Option<Credentials>) {
        self.credentials = credentials;
    }

    pub(crate) fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = Some(timeout);
    }

    pub(crate) fn set_follow_redirects(&mut self, follow: bool) {
        self.follow_redirects = Some(follow);
    }

    pub(crate) fn set_virtual_host(&mut self, host: String) {
        self.virtual_host = Some(host);
    }
}
