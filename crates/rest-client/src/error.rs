//! REST client error types

use thiserror::Error;

/// Errors that can occur while building, dispatching or decoding a request
///
/// The variants fall into three groups. Construction errors are returned synchronously by the
/// builder call that caused them. Execution errors are only ever delivered through
/// [`ResponseFuture`](crate::ResponseFuture). Decoding errors are returned by the
/// [`RestResponse`](crate::RestResponse) accessor that failed.
#[derive(Debug, Error)]
pub enum RestError {
    /// Endpoint could not be parsed as an absolute URL
    #[error("Malformed endpoint `{url}`: {reason}")]
    MalformedEndpoint {
        /// Offending input
        url: String,
        /// Parser message
        reason: String,
    },
    /// URI template variable count does not match the supplied values
    #[error("URI template expects {expected} values, got {actual}")]
    TemplateArityMismatch {
        /// Number of distinct template variables
        expected: usize,
        /// Number of values supplied
        actual: usize,
    },
    /// URI template syntax error
    #[error("URI template expansion error: {0}")]
    TemplateExpansion(String),
    /// Query string segment could not be parsed
    #[error("Malformed query string: {0}")]
    MalformedQueryString(String),
    /// Credentials could not be derived from the userinfo
    #[error("Malformed credentials: {0}")]
    MalformedCredentials(String),
    /// Generic transport failure
    #[error("Transport error: {0}")]
    Transport(String),
    /// Connection error
    #[error("Connection error: {0}")]
    Connection(String),
    /// Request timeout
    #[error("Request timeout")]
    Timeout,
    /// Client build error
    #[error("Client build error: {0}")]
    Build(String),
    /// Charset named by the request Content-Type is not supported
    #[error("Unsupported charset: {0}")]
    UnsupportedCharset(String),
    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
    /// Request signer failed
    #[error("Signing error: {0}")]
    Signing(String),
    /// Response body could not be decoded
    #[error("Decoding error: {0}")]
    Decoding(String),
    /// Final response location is not a valid URI
    #[error("Malformed location `{0}`")]
    MalformedLocation(String),
    /// Markup parse error
    #[error("Markup error: {0}")]
    Markup(String),
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
    /// I/O error
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl RestError {
    /// Whether the error was raised while constructing a request
    pub fn is_construction(&self) -> bool {
        matches!(
            self,
            RestError::MalformedEndpoint { .. }
                | RestError::TemplateArityMismatch { .. }
                | RestError::TemplateExpansion(_)
                | RestError::MalformedQueryString(_)
                | RestError::MalformedCredentials(_)
        )
    }
}

#[cfg(feature = "reqwest")]
impl From<reqwest::Error> for RestError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            RestError::Timeout
        } else if err.is_builder() {
            RestError::Build(err.to_string())
        } else if err.is_connect() {
            RestError::Connection(err.to_string())
        } else {
            RestError::Transport(err.to_string())
        }
    }
}

impl From<serde_json::Error> for RestError {
    fn from(err: serde_json::Error) -> Self {
        RestError::Serialization(err.to_string())
    }
}

impl From<config::ConfigError> for RestError {
    fn from(err: config::ConfigError) -> Self {
        RestError::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arity_mismatch_display() {
        let error = RestError::TemplateArityMismatch {
            expected: 1,
            actual: 2,
        };
        assert_eq!(
            format!("{}", error),
            "URI template expects 1 values, got 2"
        );
    }

    #[test]
    fn test_malformed_endpoint_display() {
        let error = RestError::MalformedEndpoint {
            url: "nope".to_string(),
            reason: "relative URL without a base".to_string(),
        };
        assert_eq!(
            format!("{}", error),
            "Malformed endpoint `nope`: relative URL without a base"
        );
    }

    #[test]
    fn test_timeout_display() {
        assert_eq!(format!("{}", RestError::Timeout), "Request timeout");
    }

    #[test]
    fn test_construction_classification() {
        assert!(RestError::MalformedQueryString("=1".to_string()).is_construction());
        assert!(RestError::MalformedCredentials("empty".to_string()).is_construction());
        assert!(!RestError::Timeout.is_construction());
        assert!(!RestError::UnsupportedCharset("x-bogus".to_string()).is_construction());
    }

    #[test]
    fn test_from_serde_json_error() {
        let result: Result<String, _> = serde_json::from_str("not valid json");
        let json_error = result.expect_err("Invalid JSON should produce an error");
        let rest_error: RestError = json_error.into();

        match rest_error {
            RestError::Serialization(msg) => {
                assert!(
                    msg.contains("expected"),
                    "Error message should describe JSON error"
                );
            }
            _ => panic!("Expected RestError::Serialization"),
        }
    }

    #[test]
    fn test_from_io_error() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let rest_error: RestError = io.into();
        assert!(matches!(rest_error, RestError::Io(_)));
        assert_eq!(format!("{}", rest_error), "gone");
    }
}
