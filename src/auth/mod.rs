//! auth
//!
//! Bearer tokens for the object store.
//!
//! Tokens never appear in logs, JSON output, error messages, or debug
//! output. Types holding a token implement `Debug` by hand.
//!
//! # Example
//!
//! ```
//! use logshelf::auth::{StaticTokenProvider, TokenProvider};
//!
//! # tokio_test::block_on(async {
//! let provider = StaticTokenProvider::new("api.github.com", Some("ghp_x".into()));
//! assert_eq!(provider.bearer_token().await.unwrap(), "ghp_x");
//! # });
//! ```

mod errors;
mod provider;

pub use errors::AuthError;
pub use provider::StaticTokenProvider;

/// Source of bearer tokens for store adapters.
#[async_trait::async_trait]
pub trait TokenProvider: Send + Sync {
    /// Returns a usable bearer token.
    ///
    /// # Errors
    ///
    /// - [`AuthError::NotAuthenticated`] if no token exists
    /// - [`AuthError::Malformed`] if the token cannot be sent
    async fn bearer_token(&self) -> Result<String, AuthError>;

    /// Whether a token is available, without validating it remotely.
    fn is_authenticated(&self) -> bool;

    /// The host this provider authenticates for.
    fn host(&self) -> &str;
}
