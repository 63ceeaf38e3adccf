//! HTTP response view

use std::fmt;
use std::io;

use bytes::{Bytes, BytesMut};
use cookie::Cookie;
use futures::StreamExt;
use http::{HeaderMap, StatusCode};
use serde::de::DeserializeOwned;
use tokio::sync::Mutex;
use url::Url;

use crate::charset;
use crate::error::RestError;
use crate::markup::{MarkupParser, XmlTreeParser};
use crate::transport::{BodyStream, RawResponse};

/// Content type assumed when the response carries none
const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

enum BodyState {
    Streaming(BodyStream),
    Buffered(Bytes),
    Consumed,
}

/// Read-only view over a completed response
///
/// The body is read from the transport at most once. [`RestResponse::bytes`] and the accessors
/// built on it buffer the body, so they may be called any number of times;
/// [`RestResponse::body_stream`] hands the raw stream over instead.
pub struct RestResponse {
    status: StatusCode,
    status_text: String,
    headers: HeaderMap,
    uri: String,
    body: Mutex<BodyState>,
}

impl fmt::Debug for RestResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RestResponse")
            .field("status", &self.status)
            .field("uri", &self.uri)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

impl RestResponse {
    pub(crate) fn new(raw: RawResponse) -> Self {
        Self {
            status: raw.status,
            status_text: raw.status_text,
            headers: raw.headers,
            uri: raw.uri,
            body: Mutex::new(BodyState::Streaming(raw.body)),
        }
    }

    /// Get the HTTP status code
    pub fn status(&self) -> u16 {
        self.status.as_u16()
    }

    /// Get the HTTP status as a [`StatusCode`]
    pub fn status_code(&self) -> StatusCode {
        self.status
    }

    /// Status reason phrase
    pub fn status_text(&self) -> &str {
        &self.status_text
    }

    /// Check if the response status is a success (2xx)
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Check if the response status is a client error (4xx)
    pub fn is_client_error(&self) -> bool {
        self.status.is_client_error()
    }

    /// Check if the response status is a server error (5xx)
    pub fn is_server_error(&self) -> bool {
        self.status.is_server_error()
    }

    /// All response headers
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// First value of a header, if present and valid text
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }

    /// Every value of a header
    pub fn header_all(&self, name: &str) -> Vec<&str> {
        self.headers
            .get_all(name)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .collect()
    }

    /// `Content-Type`, or `application/octet-stream` when absent
    pub fn content_type(&self) -> &str {
        self.header(http::header::CONTENT_TYPE.as_str())
            .unwrap_or(DEFAULT_CONTENT_TYPE)
    }

    /// Cookies set by the response; unparsable `Set-Cookie` values are skipped
    pub fn cookies(&self) -> Vec<Cookie<'static>> {
        self.header_all(http::header::SET_COOKIE.as_str())
            .into_iter()
            .filter_map(|raw| match Cookie::parse(raw.to_string()) {
                Ok(cookie) => Some(cookie),
                Err(err) => {
                    tracing::debug!("Skipping malformed Set-Cookie header: {}", err);
                    None
                }
            })
            .collect()
    }

    /// Cookie with the given name
    pub fn cookie(&self, name: &str) -> Option<Cookie<'static>> {
        self.cookies()
            .into_iter()
            .find(|cookie| cookie.name() == name)
    }

    /// Final location of the response, after any redirects
    pub fn uri(&self) -> Result<Url, RestError> {
        Url::parse(&self.uri)
            .map_err(|e| RestError::MalformedLocation(format!("{}: {}", self.uri, e)))
    }

    /// Whole body as bytes
    pub async fn bytes(&self) -> Result<Bytes, RestError> {
        let mut state = self.body.lock().await;

        match std::mem::replace(&mut *state, BodyState::Consumed) {
            BodyState::Buffered(bytes) => {
                *state = BodyState::Buffered(bytes.clone());
                Ok(bytes)
            }
            BodyState::Consumed => Err(consumed()),
            BodyState::Streaming(mut stream) => {
                let mut buffer = BytesMut::new();
                while let Some(chunk) = stream.next().await {
                    buffer.extend_from_slice(&chunk.map_err(into_io)?);
                }
                let bytes = buffer.freeze();
                *state = BodyState::Buffered(bytes.clone());
                Ok(bytes)
            }
        }
    }

    /// Body as text
    ///
    /// Decoded with the `charset` of the `Content-Type` when present. Otherwise `text/*`
    /// bodies are read as ISO-8859-1 and everything else as UTF-8.
    pub async fn text(&self) -> Result<String, RestError> {
        let bytes = self.bytes().await?;
        let content_type = self.content_type();

        match charset::parse_charset(content_type) {
            Some(name) => charset::decode(&bytes, &name)
                .ok_or_else(|| RestError::Decoding(format!("unsupported charset {}", name))),
            None if charset::top_level_type(content_type) == "text" => {
                Ok(charset::decode_latin1(&bytes))
            }
            None => Ok(String::from_utf8_lossy(&bytes).into_owned()),
        }
    }

    /// Body parsed as a JSON tree
    pub async fn json(&self) -> Result<serde_json::Value, RestError> {
        self.json_as().await
    }

    /// Body deserialized from JSON
    pub async fn json_as<T: DeserializeOwned>(&self) -> Result<T, RestError> {
        let bytes = self.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Body parsed as an XML document
    pub async fn xml(&self) -> Result<xmltree::Element, RestError> {
        self.xml_with(&XmlTreeParser).await
    }

    /// Body parsed with a caller supplied markup parser
    ///
    /// The parser receives the response charset, defaulting to UTF-8.
    pub async fn xml_with<P: MarkupParser>(&self, parser: &P) -> Result<P::Document, RestError> {
        let bytes = self.bytes().await?;
        let encoding = charset::parse_charset(self.content_type())
            .unwrap_or_else(|| charset::DEFAULT_CHARSET.to_string());
        parser.parse(&mut bytes.as_ref(), &encoding)
    }

    /// Raw body stream
    ///
    /// Takes over the body: after this only an already buffered body can be read again.
    pub async fn body_stream(&self) -> Result<BodyStream, RestError> {
        let mut state = self.body.lock().await;

        match std::mem::replace(&mut *state, BodyState::Consumed) {
            BodyState::Streaming(stream) => Ok(stream),
            BodyState::Buffered(bytes) => {
                *state = BodyState::Buffered(bytes.clone());
                let stream = futures::stream::once(async move { Ok::<_, RestError>(bytes) });
                Ok(Box::pin(stream))
            }
            BodyState::Consumed => Err(consumed()),
        }
    }
}

fn consumed() -> RestError {
    RestError::Io(io::Error::other("response body stream was already consumed"))
}

fn into_io(err: RestError) -> RestError {
    match err {
        RestError::Io(err) => RestError::Io(err),
        other => RestError::Io(io::Error::other(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use futures::stream;
    use http::HeaderValue;
    use serde::Deserialize;

    use super::*;

    fn response(content_type: Option<&'static str>, body: &'static [u8]) -> RestResponse {
        let mut headers = HeaderMap::new();
        if let Some(content_type) = content_type {
            headers.insert(
                http::header::CONTENT_TYPE,
                HeaderValue::from_static(content_type),
            );
        }
        RestResponse::new(RawResponse::from_bytes(
            StatusCode::OK,
            headers,
            "http://example.com/final",
            body,
        ))
    }

    #[tokio::test]
    async fn test_text_uses_declared_charset() {
        let resp = response(Some("text/plain; charset=ISO-8859-1"), b"caf\xe9");
        assert_eq!(resp.text().await.expect("decodes"), "café");
    }

    #[tokio::test]
    async fn test_text_defaults_to_latin1_for_text_types() {
        let resp = response(Some("text/html"), b"caf\xe9");
        assert_eq!(resp.text().await.expect("decodes"), "café");
    }

    #[tokio::test]
    async fn test_text_defaults_to_utf8_for_other_types() {
        let resp = response(Some("application/json"), "café".as_bytes());
        assert_eq!(resp.text().await.expect("decodes"), "café");

        let resp = response(None, "café".as_bytes());
        assert_eq!(resp.content_type(), "application/octet-stream");
        assert_eq!(resp.text().await.expect("decodes"), "café");
    }

    #[tokio::test]
    async fn test_text_with_unknown_charset() {
        let resp = response(Some("text/plain; charset=x-nope"), b"abc");
        assert!(matches!(
            resp.text().await,
            Err(RestError::Decoding(_))
        ));
    }

    #[tokio::test]
    async fn test_body_is_buffered_once() {
        let resp = response(Some("application/json"), br#"{"a":1}"#);
        let first = resp.bytes().await.expect("bytes");
        let second = resp.bytes().await.expect("bytes again");
        assert_eq!(first, second);
        assert_eq!(resp.json().await.expect("json"), serde_json::json!({"a": 1}));
    }

    #[tokio::test]
    async fn test_json_as_typed() {
        #[derive(Debug, Deserialize, PartialEq)]
        struct Thing {
            name: String,
        }

        let resp = response(Some("application/json"), br#"{"name":"x"}"#);
        let thing: Thing = resp.json_as().await.expect("typed json");
        assert_eq!(
            thing,
            Thing {
                name: "x".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_invalid_json() {
        let resp = response(Some("application/json"), b"not json");
        assert!(matches!(
            resp.json().await,
            Err(RestError::Serialization(_))
        ));
    }

    #[tokio::test]
    async fn test_xml_document() {
        let resp = response(
            Some("application/xml"),
            b"<root><child>value</child></root>",
        );
        let doc = resp.xml().await.expect("xml parses");
        assert_eq!(doc.name, "root");
        assert!(doc.get_child("child").is_some());
    }

    #[tokio::test]
    async fn test_body_stream_then_bytes_fails() {
        let resp = response(Some("text/plain"), b"abc");
        let mut stream = resp.body_stream().await.expect("stream");
        let chunk = stream.next().await.expect("one chunk").expect("ok chunk");
        assert_eq!(&chunk[..], b"abc");

        assert!(matches!(resp.bytes().await, Err(RestError::Io(_))));
        assert!(matches!(resp.body_stream().await, Err(RestError::Io(_))));
    }

    #[tokio::test]
    async fn test_body_stream_after_bytes_replays_buffer() {
        let resp = response(Some("text/plain"), b"abc");
        resp.bytes().await.expect("bytes");
        let mut stream = resp.body_stream().await.expect("stream");
        let chunk = stream.next().await.expect("one chunk").expect("ok chunk");
        assert_eq!(&chunk[..], b"abc");
    }

    #[tokio::test]
    async fn test_stream_failure_is_io_error() {
        let body = stream::iter(vec![
            Ok(Bytes::from_static(b"partial")),
            Err(RestError::Transport("connection reset".to_string())),
        ]);
        let resp = RestResponse::new(RawResponse::new(
            StatusCode::OK,
            HeaderMap::new(),
            "http://example.com/",
            Box::pin(body),
        ));
        assert!(matches!(resp.bytes().await, Err(RestError::Io(_))));
    }

    #[test]
    fn test_cookies_and_headers() {
        let mut headers = HeaderMap::new();
        headers.append(
            http::header::SET_COOKIE,
            HeaderValue::from_static("session=abc; Path=/; HttpOnly"),
        );
        headers.append(http::header::SET_COOKIE, HeaderValue::from_static("theme=dark"));
        headers.append(http::header::SET_COOKIE, HeaderValue::from_static("=broken"));
        let resp = RestResponse::new(RawResponse::from_bytes(
            StatusCode::NOT_FOUND,
            headers,
            "http://example.com/",
            "",
        ));

        let cookies = resp.cookies();
        assert_eq!(cookies.len(), 2);
        let session = resp.cookie("session").expect("session cookie");
        assert_eq!(session.value(), "abc");
        assert_eq!(session.path(), Some("/"));
        assert!(resp.cookie("missing").is_none());

        assert_eq!(resp.header_all("set-cookie").len(), 3);
        assert_eq!(resp.status(), 404);
        assert_eq!(resp.status_text(), "Not Found");
        assert!(resp.is_client_error());
        assert!(!resp.is_success());
    }

    #[test]
    fn test_uri() {
        let resp = response(None, b"");
        assert_eq!(
            resp.uri().expect("valid uri").as_str(),
            "http://example.com/final"
        );

        let resp = RestResponse::new(RawResponse::from_bytes(
            StatusCode::OK,
            HeaderMap::new(),
            "not a url",
            "",
        ));
        assert!(matches!(resp.uri(), Err(RestError::MalformedLocation(_))));
    }
}
