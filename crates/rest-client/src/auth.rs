//! Request credentials

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::RestError;

/// Authentication scheme
///
/// This enum belongs to the client core. Transports map it onto their own representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthScheme {
    /// HTTP Digest
    Digest,
    /// HTTP Basic
    #[default]
    Basic,
    /// NTLM
    Ntlm,
    /// SPNEGO
    Spnego,
    /// Kerberos
    Kerberos,
    /// No authentication
    None,
}

impl fmt::Display for AuthScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AuthScheme::Digest => "DIGEST",
            AuthScheme::Basic => "BASIC",
            AuthScheme::Ntlm => "NTLM",
            AuthScheme::Spnego => "SPNEGO",
            AuthScheme::Kerberos => "KERBEROS",
            AuthScheme::None => "NONE",
        };
        f.write_str(name)
    }
}

/// Complete credential record
///
/// All three fields are always present, so a request either carries full credentials or none.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    username: String,
    password: String,
    scheme: AuthScheme,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("scheme", &self.scheme)
            .finish()
    }
}

impl Credentials {
    /// Create credentials with an explicit scheme
    pub fn new(
        username: impl Into<String>,
        password: impl Into<String>,
        scheme: AuthScheme,
    ) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            scheme,
        }
    }

    /// Create BASIC credentials
    pub fn basic(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self::new(username, password, AuthScheme::Basic)
    }

    /// Parse a `user:password` userinfo string into BASIC credentials
    ///
    /// A leading `:` yields an empty username and a missing `:` yields an empty password.
    pub fn from_user_info(user_info: &str) -> Result<Self, RestError> {
        if user_info.is_empty() {
            return Err(RestError::MalformedCredentials(
                "userinfo should not be empty".to_string(),
            ));
        }

        let (username, password) = match user_info.split_once(':') {
            Some((user, pass)) => (user, pass),
            None => (user_info, ""),
        };

        Ok(Self::basic(username, password))
    }

    /// Username
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Password
    pub fn password(&self) -> &str {
        &self.password
    }

    /// Scheme
    pub fn scheme(&self) -> AuthScheme {
        self.scheme
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_user_info_is_rejected() {
        let result = Credentials::from_user_info("");
        assert!(matches!(result, Err(RestError::MalformedCredentials(_))));
    }

    #[test]
    fn test_password_only() {
        let creds = Credentials::from_user_info(":secret").expect("valid userinfo");
        assert_eq!(creds.username(), "");
        assert_eq!(creds.password(), "secret");
        assert_eq!(creds.scheme(), AuthScheme::Basic);
    }

    #[test]
    fn test_username_only() {
        let creds = Credentials::from_user_info("bob").expect("valid userinfo");
        assert_eq!(creds, Credentials::new("bob", "", AuthScheme::Basic));
    }

    #[test]
    fn test_split_on_first_colon() {
        let creds = Credentials::from_user_info("bob:pw:with:colons").expect("valid userinfo");
        assert_eq!(creds.username(), "bob");
        assert_eq!(creds.password(), "pw:with:colons");
    }

    #[test]
    fn test_user_and_password() {
        let creds = Credentials::from_user_info("bob:pw").expect("valid userinfo");
        assert_eq!(creds, Credentials::basic("bob", "pw"));
    }

    #[test]
    fn test_debug_redacts_password() {
        let creds = Credentials::basic("bob", "hunter2");
        let debug = format!("{:?}", creds);
        assert!(debug.contains("bob"));
        assert!(!debug.contains("hunter2"));
    }

    #[test]
    fn test_scheme_display() {
        assert_eq!(AuthScheme::Basic.to_string(), "BASIC");
        assert_eq!(AuthScheme::Ntlm.to_string(), "NTLM");
        assert_eq!(AuthScheme::default(), AuthScheme::Basic);
    }
}
