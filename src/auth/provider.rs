//! auth::provider
//!
//! Token provider backed by a single static token.

use async_trait::async_trait;

use super::{AuthError, TokenProvider};

/// Provides one fixed bearer token, typically from `--token` or
/// `GITHUB_TOKEN`.
pub struct StaticTokenProvider {
    host: String,
    token: Option<String>,
}

// Custom Debug to avoid exposing the token
impl std::fmt::Debug for StaticTokenProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticTokenProvider")
            .field("host", &self.host)
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl StaticTokenProvider {
    /// Create a provider for `host`. Blank tokens count as absent.
    pub fn new(host: impl Into<String>, token: Option<String>) -> Self {
        Self {
            host: host.into(),
            token: token
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty()),
        }
    }
}

#[async_trait]
impl TokenProvider for StaticTokenProvider {
    async fn bearer_token(&self) -> Result<String, AuthError> {
        let token = self
            .token
            .clone()
            .ok_or_else(|| AuthError::NotAuthenticated(self.host.clone()))?;
        if token.chars().any(|c| c.is_control() || c == ' ') {
            return Err(AuthError::Malformed(
                "contains whitespace or control characters".to_string(),
            ));
        }
        Ok(token)
    }

    fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    fn host(&self) -> &str {
        &self.host
    }
}
