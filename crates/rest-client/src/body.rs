//! Request bodies and their transport encoding

use std::fmt;
use std::io;
use std::path::PathBuf;
use std::pin::Pin;

use bytes::Bytes;
use futures::Stream;

use crate::charset::{self, DEFAULT_CHARSET};
use crate::error::RestError;
use crate::request::{first_header, replace_header, Headers, CONTENT_TYPE};

/// Streaming request body source
pub type RequestStream = Pin<Box<dyn Stream<Item = Result<Bytes, io::Error>> + Send>>;

const DEFAULT_TEXT_CONTENT_TYPE: &str = "text/plain";
const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";

/// Request body
///
/// Exactly one variant is held at a time; setting a body replaces the previous one.
#[derive(Default)]
pub enum Body {
    /// No body
    #[default]
    None,
    /// Text, encoded with the Content-Type charset (UTF-8 unless stated)
    Text(String),
    /// JSON document, always sent as `application/json; charset=utf-8`
    Json(serde_json::Value),
    /// Single-pass byte stream
    Stream(RequestStream),
    /// File contents, read by the transport
    File(PathBuf),
}

impl Body {
    /// Wrap a byte stream
    pub fn stream<S>(stream: S) -> Self
    where
        S: Stream<Item = Result<Bytes, io::Error>> + Send + 'static,
    {
        Body::Stream(Box::pin(stream))
    }

    /// Serialize a value into a JSON body
    pub fn json<T: serde::Serialize>(value: &T) -> Result<Self, RestError> {
        Ok(Body::Json(serde_json::to_value(value)?))
    }

    /// Whether no body is set
    pub fn is_none(&self) -> bool {
        matches!(self, Body::None)
    }

    /// Copy of the body for a dispatch snapshot
    ///
    /// A stream cannot be replayed, so it is moved into the snapshot and `self` becomes
    /// [`Body::None`].
    pub(crate) fn snapshot(&mut self) -> Body {
        match self {
            Body::None => Body::None,
            Body::Text(text) => Body::Text(text.clone()),
            Body::Json(value) => Body::Json(value.clone()),
            Body::File(path) => Body::File(path.clone()),
            Body::Stream(_) => std::mem::take(self),
        }
    }
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Body::None => f.write_str("None"),
            Body::Text(text) => f.debug_tuple("Text").field(text).finish(),
            Body::Json(value) => f.debug_tuple("Json").field(value).finish(),
            Body::Stream(_) => f.write_str("Stream(..)"),
            Body::File(path) => f.debug_tuple("File").field(path).finish(),
        }
    }
}

impl From<&str> for Body {
    fn from(text: &str) -> Self {
        Body::Text(text.to_string())
    }
}

impl From<String> for Body {
    fn from(text: String) -> Self {
        Body::Text(text)
    }
}

impl From<serde_json::Value> for Body {
    fn from(value: serde_json::Value) -> Self {
        Body::Json(value)
    }
}

impl From<PathBuf> for Body {
    fn from(path: PathBuf) -> Self {
        Body::File(path)
    }
}

/// Body in the form the transport sends it
#[derive(Default)]
pub enum EncodedBody {
    /// Nothing to send
    #[default]
    Empty,
    /// In-memory bytes and the charset used to produce them
    Bytes {
        /// Encoded bytes
        bytes: Bytes,
        /// Charset label
        charset: String,
    },
    /// Streaming source, passed through untouched
    Stream(RequestStream),
    /// File, passed through untouched
    File(PathBuf),
}

impl fmt::Debug for EncodedBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EncodedBody::Empty => f.write_str("Empty"),
            EncodedBody::Bytes { bytes, charset } => f
                .debug_struct("Bytes")
                .field("len", &bytes.len())
                .field("charset", charset)
                .finish(),
            EncodedBody::Stream(_) => f.write_str("Stream(..)"),
            EncodedBody::File(path) => f.debug_tuple("File").field(path).finish(),
        }
    }
}

/// Encode a body, adjusting `headers` in place
///
/// `headers` must be the dispatch snapshot's copy; the holder's own headers are never touched.
pub fn encode(body: Body, headers: &mut Headers) -> Result<EncodedBody, RestError> {
    match body {
        Body::None => Ok(EncodedBody::Empty),
        Body::Text(text) => encode_text(&text, headers),
        Body::Json(value) => {
            replace_header(headers, CONTENT_TYPE, JSON_CONTENT_TYPE);
            let bytes = serde_json::to_vec(&value)?;
            Ok(EncodedBody::Bytes {
                bytes: Bytes::from(bytes),
                charset: DEFAULT_CHARSET.to_string(),
            })
        }
        Body::Stream(stream) => Ok(EncodedBody::Stream(stream)),
        Body::File(path) => Ok(EncodedBody::File(path)),
    }
}

fn encode_text(text: &str, headers: &mut Headers) -> Result<EncodedBody, RestError> {
    let content_type = first_header(headers, CONTENT_TYPE)
        .unwrap_or(DEFAULT_TEXT_CONTENT_TYPE)
        .to_string();

    let charset = match charset::parse_charset(&content_type) {
        Some(charset) => charset,
        None => {
            replace_header(
                headers,
                CONTENT_TYPE,
                format!("{content_type}; charset={DEFAULT_CHARSET}"),
            );
            DEFAULT_CHARSET.to_string()
        }
    };

    let bytes = charset::encode(text, &charset)
        .ok_or_else(|| RestError::UnsupportedCharset(charset.clone()))?;

    Ok(EncodedBody::Bytes {
        bytes: Bytes::from(bytes),
        charset,
    })
}
