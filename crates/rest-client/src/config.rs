//! Client configuration

use std::path::Path;
use std::time::Duration;

use config::{Config, File};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::RestError;

/// Default redirect limit when redirects are followed
pub const DEFAULT_MAX_REDIRECTS: usize = 5;

/// Settings used to build the shared transport client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// TCP/TLS connect timeout in milliseconds
    pub connect_timeout_ms: Option<u64>,
    /// Whole-request timeout in milliseconds, overridden per request
    pub request_timeout_ms: Option<u64>,
    /// Whether redirects are followed when a request leaves it unset
    pub follow_redirects: bool,
    /// Maximum number of redirects followed
    pub max_redirects: usize,
    /// `User-Agent` header value
    pub user_agent: Option<String>,
    /// Accept invalid TLS certificates
    pub accept_invalid_certs: bool,
    /// Proxy for all requests, or for hosts matching `proxy_host_pattern`
    pub proxy: Option<Url>,
    /// Regex selecting the hosts routed through `proxy`
    pub proxy_host_pattern: Option<String>,
    /// How long idle pooled connections are kept, in milliseconds
    pub pool_idle_timeout_ms: Option<u64>,
    /// Maximum idle pooled connections per host
    pub pool_max_idle_per_host: Option<usize>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: None,
            request_timeout_ms: None,
            follow_redirects: false,
            max_redirects: DEFAULT_MAX_REDIRECTS,
            user_agent: None,
            accept_invalid_certs: false,
            proxy: None,
            proxy_host_pattern: None,
            pool_idle_timeout_ms: None,
            pool_max_idle_per_host: None,
        }
    }
}

impl ClientConfig {
    /// Load a config file (TOML, JSON, YAML...) layered over the defaults
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, RestError> {
        let config = Config::builder()
            .add_source(Config::try_from(&Self::default())?)
            .add_source(File::from(path.as_ref()))
            .build()?;

        let settings: ClientConfig = config.try_deserialize()?;
        tracing::debug!(path = %path.as_ref().display(), "Loaded client config");
        Ok(settings)
    }

    /// Set the connect timeout
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout_ms = Some(duration_ms(timeout));
        self
    }

    /// Set the default request timeout
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout_ms = Some(duration_ms(timeout));
        self
    }

    /// Follow redirects by default
    pub fn follow_redirects(mut self, follow: bool) -> Self {
        self.follow_redirects = follow;
        self
    }

    /// Set the redirect limit
    pub fn max_redirects(mut self, max: usize) -> Self {
        self.max_redirects = max;
        self
    }

    /// Set the `User-Agent`
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    /// Accept invalid TLS certificates
    pub fn danger_accept_invalid_certs(mut self, accept: bool) -> Self {
        self.accept_invalid_certs = accept;
        self
    }

    /// Route every request through a proxy
    pub fn proxy(mut self, url: Url) -> Self {
        self.proxy = Some(url);
        self.proxy_host_pattern = None;
        self
    }

    /// Route requests whose host matches `pattern` through a proxy
    pub fn proxy_with_matcher(mut self, url: Url, pattern: &str) -> Result<Self, RestError> {
        regex::Regex::new(pattern)
            .map_err(|e| RestError::Config(format!("Invalid proxy pattern: {}", e)))?;
        self.proxy = Some(url);
        self.proxy_host_pattern = Some(pattern.to_string());
        Ok(self)
    }

    /// Connect timeout as a [`Duration`]
    pub fn connect_timeout_duration(&self) -> Option<Duration> {
        self.connect_timeout_ms.map(Duration::from_millis)
    }

    /// Request timeout as a [`Duration`]
    pub fn request_timeout_duration(&self) -> Option<Duration> {
        self.request_timeout_ms.map(Duration::from_millis)
    }

    /// Idle pool timeout as a [`Duration`]
    pub fn pool_idle_timeout_duration(&self) -> Option<Duration> {
        self.pool_idle_timeout_ms.map(Duration::from_millis)
    }
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::default();
        assert!(!config.follow_redirects);
        assert_eq!(config.max_redirects, DEFAULT_MAX_REDIRECTS);
        assert!(config.proxy.is_none());
        assert!(config.request_timeout_duration().is_none());
    }

    #[test]
    fn test_builder_methods() {
        let config = ClientConfig::default()
            .connect_timeout(Duration::from_secs(2))
            .request_timeout(Duration::from_millis(1500))
            .follow_redirects(true)
            .max_redirects(3)
            .user_agent("rest-client-test");

        assert_eq!(config.connect_timeout_ms, Some(2000));
        assert_eq!(
            config.request_timeout_duration(),
            Some(Duration::from_millis(1500))
        );
        assert!(config.follow_redirects);
        assert_eq!(config.max_redirects, 3);
        assert_eq!(config.user_agent.as_deref(), Some("rest-client-test"));
    }

    #[test]
    fn test_proxy_with_invalid_matcher() {
        let proxy = Url::parse("http://localhost:8080").expect("Valid proxy URL");
        let result = ClientConfig::default().proxy_with_matcher(proxy, r"[invalid");

        if let Err(RestError::Config(msg)) = result {
            assert!(msg.contains("Invalid proxy pattern"));
        } else {
            panic!("Expected RestError::Config");
        }
    }

    #[test]
    fn test_proxy_with_valid_matcher() {
        let proxy = Url::parse("http://localhost:8080").expect("Valid proxy URL");
        let config = ClientConfig::default()
            .proxy_with_matcher(proxy, r".*\.example\.com$")
            .expect("Valid matcher should succeed");
        assert_eq!(config.proxy_host_pattern.as_deref(), Some(r".*\.example\.com$"));
    }

    #[test]
    fn test_from_file_layers_over_defaults() {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .expect("temp file");
        writeln!(
            file,
            "follow_redirects = true\nrequest_timeout_ms = 2500\nuser_agent = \"from-file\""
        )
        .expect("write config");

        let config = ClientConfig::from_file(file.path()).expect("config loads");
        assert!(config.follow_redirects);
        assert_eq!(config.request_timeout_ms, Some(2500));
        assert_eq!(config.user_agent.as_deref(), Some("from-file"));
        assert_eq!(config.max_redirects, DEFAULT_MAX_REDIRECTS);
    }

    #[test]
    fn test_from_missing_file() {
        let result = ClientConfig::from_file("/definitely/not/here.toml");
        assert!(matches!(result, Err(RestError::Config(_))));
    }
}
