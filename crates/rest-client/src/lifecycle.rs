//! Shared transport client lifecycle

use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use crate::config::ClientConfig;
use crate::error::RestError;
use crate::transport::{Transport, TransportFactory};

/// Owner of the one live shared transport client
///
/// The client is created on first use, swapped atomically on reconfiguration and closed on
/// shutdown. Reads of the current client may happen concurrently with each other; reconfigure
/// and shutdown take the write lock only for the swap itself, and close the old client after
/// releasing it.
pub struct ClientManager {
    factory: Arc<dyn TransportFactory>,
    config: RwLock<ClientConfig>,
    current: RwLock<Option<Arc<dyn Transport>>>,
}

impl fmt::Debug for ClientManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let live = self
            .current
            .read()
            .map(|current| current.is_some())
            .unwrap_or_default();
        f.debug_struct("ClientManager")
            .field("factory", &self.factory)
            .field("live", &live)
            .finish()
    }
}

impl ClientManager {
    /// Create a manager that builds clients with `factory`
    pub fn new(factory: Arc<dyn TransportFactory>) -> Self {
        Self::with_config(factory, ClientConfig::default())
    }

    /// Create a manager whose lazily built client uses `config`
    pub fn with_config(factory: Arc<dyn TransportFactory>, config: ClientConfig) -> Self {
        Self {
            factory,
            config: RwLock::new(config),
            current: RwLock::new(None),
        }
    }

    /// Configuration used for the next lazily built client
    pub fn config(&self) -> ClientConfig {
        self.config
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Whether a client is currently live
    pub fn is_live(&self) -> bool {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Current client, built on first use
    ///
    /// When several callers race on first access, each may build a candidate, but only the
    /// first installed one is adopted; the others are closed before returning.
    pub fn current_client(&self) -> Result<Arc<dyn Transport>, RestError> {
        if let Some(client) = self
            .current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
        {
            return Ok(Arc::clone(client));
        }

        let candidate = self.factory.create(&self.config())?;

        let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(existing) = current.as_ref() {
            let existing = Arc::clone(existing);
            drop(current);
            tracing::debug!("Discarding transport client built concurrently with another");
            candidate.close();
            return Ok(existing);
        }

        tracing::debug!("Created shared transport client");
        *current = Some(Arc::clone(&candidate));
        Ok(candidate)
    }

    /// Build a client from `config` and make it current, then close the previous one
    pub fn reconfigure(&self, config: ClientConfig) -> Result<(), RestError> {
        let client = self.factory.create(&config)?;

        let previous = {
            let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
            *self.config.write().unwrap_or_else(PoisonError::into_inner) = config;
            current.replace(client)
        };

        tracing::debug!(replaced = previous.is_some(), "Reconfigured shared transport client");
        if let Some(previous) = previous {
            previous.close();
        }
        Ok(())
    }

    /// Clear and close the current client; the next access builds a fresh one
    pub fn shutdown(&self) {
        let previous = self
            .current
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        if let Some(previous) = previous {
            tracing::debug!("Closing shared transport client");
            previous.close();
        }
    }
}
