//! Entry point facade

use std::sync::Arc;

use crate::config::ClientConfig;
use crate::error::RestError;
use crate::holder::RequestHolder;
use crate::lifecycle::ClientManager;
use crate::transport::{Transport, TransportFactory};
use crate::uri;

/// REST client
///
/// Cheap to clone; clones share one [`ClientManager`] and therefore one transport client.
#[derive(Debug, Clone)]
pub struct Rest {
    clients: Arc<ClientManager>,
}

#[cfg(feature = "reqwest")]
impl Default for Rest {
    fn default() -> Self {
        Self::new(Arc::new(crate::backends::ReqwestFactory))
    }
}

impl Rest {
    /// Create a client whose transport is built by `factory`
    pub fn new(factory: Arc<dyn TransportFactory>) -> Self {
        Self::with_factory(factory, ClientConfig::default())
    }

    /// Create a client with a custom factory and configuration
    pub fn with_factory(factory: Arc<dyn TransportFactory>, config: ClientConfig) -> Self {
        Self {
            clients: Arc::new(ClientManager::with_config(factory, config)),
        }
    }

    /// Create a reqwest backed client with `config`
    #[cfg(feature = "reqwest")]
    pub fn with_config(config: ClientConfig) -> Self {
        Self::with_factory(Arc::new(crate::backends::ReqwestFactory), config)
    }

    /// Start a request to an absolute URL
    ///
    /// Userinfo becomes Basic credentials and the query string becomes query parameters.
    pub fn url(&self, url: &str) -> Result<RequestHolder, RestError> {
        let resolved = uri::resolve(url)?;
        Ok(RequestHolder::new(Arc::clone(&self.clients), resolved))
    }

    /// Start a request to an expanded URI template
    ///
    /// Values bind positionally to the distinct template variables, in order of first
    /// appearance.
    pub fn url_template(&self, template: &str, values: &[&str]) -> Result<RequestHolder, RestError> {
        let resolved = uri::resolve_template(template, values)?;
        Ok(RequestHolder::new(Arc::clone(&self.clients), resolved))
    }

    /// Replace the shared client with one built from `config`
    pub fn configure(&self, config: ClientConfig) -> Result<(), RestError> {
        self.clients.reconfigure(config)
    }

    /// Close the shared client; it is rebuilt on next use
    pub fn close(&self) {
        self.clients.shutdown();
    }

    /// Current shared transport client
    pub fn client(&self) -> Result<Arc<dyn Transport>, RestError> {
        self.clients.current_client()
    }

    /// Lifecycle manager behind this client
    pub fn manager(&self) -> &Arc<ClientManager> {
        &self.clients
    }
}
