//! Fluent asynchronous REST client
//!
//! A [`Rest`] client hands out [`RequestHolder`]s, mutable builders for one endpoint. Each verb
//! call snapshots the holder, encodes the body, applies per-request overrides and submits the
//! request to a shared transport client without blocking. The returned [`ResponseFuture`]
//! resolves to a [`RestResponse`] with status, headers, cookies and body decoders.
//!
//! The transport is pluggable through [`TransportFactory`]; the default one is built on
//! reqwest.
//!
//! # Example
//!
//! ```no_run
//! use rest_client::{Rest, RestError};
//! use std::time::Duration;
//!
//! async fn example() -> Result<String, RestError> {
//!     let rest = Rest::default();
//!     let response = rest
//!         .url("https://api.example.com/items?page=1")?
//!         .header("Accept", "application/json")
//!         .timeout(Duration::from_secs(5))
//!         .get()
//!         .await?;
//!     response.text().await
//! }
//! ```

mod auth;
mod backends;
mod body;
pub mod charset;
mod client;
mod config;
mod dispatch;
mod error;
mod holder;
mod lifecycle;
mod markup;
mod request;
mod response;
mod transport;
pub mod uri;

#[cfg(test)]
mod test_utils;

pub use auth::{AuthScheme, Credentials};
#[cfg(feature = "reqwest")]
pub use backends::{ReqwestFactory, ReqwestTransport};
pub use body::{Body, EncodedBody, RequestStream};
pub use client::Rest;
pub use config::{ClientConfig, DEFAULT_MAX_REDIRECTS};
pub use dispatch::ResponseFuture;
pub use error::RestError;
pub use holder::RequestHolder;
pub use lifecycle::ClientManager;
pub use markup::{MarkupParser, XmlTreeParser};
pub use request::{Headers, PendingRequest, QueryParameters, RequestSigner};
pub use response::RestResponse;
pub use transport::{BodyStream, Completion, Outcome, RawResponse, Transport, TransportFactory};
