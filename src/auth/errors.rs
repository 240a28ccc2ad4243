//! auth::errors
//!
//! Authentication error types.
//!
//! Error messages never contain token values.
//!
//! # Example
//!
//! ```
//! use logshelf::auth::AuthError;
//!
//! let err = AuthError::NotAuthenticated("api.github.com".to_string());
//! assert!(err.to_string().contains("api.github.com"));
//! ```

use thiserror::Error;

/// Errors from authentication operations.
#[derive(Debug, Error)]
pub enum AuthError {
    /// No token is available for the host.
    #[error("not authenticated for host '{0}'. Pass --token or set GITHUB_TOKEN.")]
    NotAuthenticated(String),

    /// The token cannot be used in a request header.
    #[error("token is malformed: {0}")]
    Malformed(String),
}
