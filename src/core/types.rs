//! core::types
//!
//! Strong types for core domain concepts.
//!
//! # Types
//!
//! - [`BranchName`] - Validated Git branch name
//! - [`Oid`] - Object identifier (content hash) in the remote store
//! - [`ContentPath`] - Validated repository-relative file path
//! - [`RepoRef`] - Owner/name pair addressing one remote repository
//! - [`RepoScope`] - Authorized caller bound to a validated repository
//!
//! # Validation
//!
//! These types enforce validity at construction time. Invalid values
//! cannot be represented, so the engine never has to re-check them.
//!
//! # Examples
//!
//! ```
//! use logshelf::core::types::{BranchName, ContentPath, Oid};
//!
//! let branch = BranchName::new("main").unwrap();
//! let oid = Oid::new("abc123def4567890abc123def4567890abc12345").unwrap();
//! let path = ContentPath::new("log/session-1.html").unwrap();
//!
//! assert!(BranchName::new("invalid..name").is_err());
//! assert!(Oid::new("not-a-sha").is_err());
//! assert!(ContentPath::new("../escape.html").is_err());
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from type validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid branch name: {0}")]
    InvalidBranchName(String),

    #[error("invalid object id: {0}")]
    InvalidOid(String),

    #[error("invalid content path: {0}")]
    InvalidContentPath(String),

    #[error("invalid repository: {0}")]
    InvalidRepo(String),

    #[error("owner mismatch: {caller} cannot modify repositories owned by {owner}")]
    OwnerMismatch { caller: String, owner: String },
}

/// A validated Git branch name.
///
/// Follows the subset of `git check-ref-format` rules that matter for
/// branch pointers addressed over the REST API.
///
/// ```
/// use logshelf::core::types::BranchName;
///
/// assert_eq!(BranchName::new("gh-pages").unwrap().as_str(), "gh-pages");
/// assert!(BranchName::new("").is_err());
/// assert!(BranchName::new("has space").is_err());
/// assert!(BranchName::new("branch.lock").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BranchName(String);

impl BranchName {
    /// Create a new validated branch name.
    pub fn new(name: impl Into<String>) -> Result<Self, TypeError> {
        let name = name.into();
        Self::validate(&name)?;
        Ok(Self(name))
    }

    fn validate(name: &str) -> Result<(), TypeError> {
        let reject = |reason: &str| Err(TypeError::InvalidBranchName(reason.to_string()));

        if name.is_empty() {
            return reject("branch name cannot be empty");
        }
        if name == "@" {
            return reject("branch name cannot be '@' (reserved)");
        }
        if name.starts_with('.') || name.starts_with('-') || name.starts_with('/') {
            return reject("branch name cannot start with '.', '-' or '/'");
        }
        if name.ends_with(".lock") || name.ends_with('/') {
            return reject("branch name cannot end with '.lock' or '/'");
        }
        for bad in ["..", "@{", "//"] {
            if name.contains(bad) {
                return Err(TypeError::InvalidBranchName(format!(
                    "branch name cannot contain '{bad}'"
                )));
            }
        }
        const INVALID_CHARS: [char; 8] = [' ', '~', '^', ':', '\\', '?', '*', '['];
        if let Some(c) = name
            .chars()
            .find(|c| INVALID_CHARS.contains(c) || c.is_ascii_control())
        {
            return Err(TypeError::InvalidBranchName(format!(
                "branch name cannot contain {c:?}"
            )));
        }
        Ok(())
    }

    /// Get the branch name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for BranchName {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<BranchName> for String {
    fn from(name: BranchName) -> Self {
        name.0
    }
}

impl std::fmt::Display for BranchName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An object identifier in the remote store (SHA-1 or SHA-256, hex).
///
/// OIDs are normalized to lowercase for consistency.
///
/// ```
/// use logshelf::core::types::Oid;
///
/// let oid = Oid::new("ABC123DEF4567890ABC123DEF4567890ABC12345").unwrap();
/// assert_eq!(oid.as_str(), "abc123def4567890abc123def4567890abc12345");
/// assert_eq!(oid.short(7), "abc123d");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Oid(String);

impl Oid {
    /// Create a new validated object id.
    pub fn new(oid: impl Into<String>) -> Result<Self, TypeError> {
        let oid = oid.into().to_ascii_lowercase();
        if oid.len() != 40 && oid.len() != 64 {
            return Err(TypeError::InvalidOid(format!(
                "expected 40 or 64 hex characters, got {}",
                oid.len()
            )));
        }
        if !oid.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(TypeError::InvalidOid(
                "object id must be hexadecimal".into(),
            ));
        }
        Ok(Self(oid))
    }

    /// Object id of a raw SHA-1 (20 byte) or SHA-256 (32 byte) digest.
    pub(crate) fn from_digest(digest: &[u8]) -> Self {
        debug_assert!(digest.len() == 20 || digest.len() == 32);
        Self(hex::encode(digest))
    }

    /// Get an abbreviated form of the OID.
    pub fn short(&self, len: usize) -> &str {
        let end = len.min(self.0.len());
        &self.0[..end]
    }

    /// Get the object id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Oid {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<Oid> for String {
    fn from(oid: Oid) -> Self {
        oid.0
    }
}

impl std::fmt::Display for Oid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A repository-relative file path.
///
/// Paths use `/` separators, are never absolute, and never contain empty,
/// `.` or `..` components.
///
/// ```
/// use logshelf::core::types::ContentPath;
///
/// let path = ContentPath::new("log/x.html").unwrap();
/// assert_eq!(path.file_name(), "x.html");
/// assert!(ContentPath::new("/etc/passwd").is_err());
/// assert!(ContentPath::new("log//x.html").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContentPath(String);

impl ContentPath {
    /// Create a new validated content path.
    pub fn new(path: impl Into<String>) -> Result<Self, TypeError> {
        let path = path.into();
        if path.trim().is_empty() {
            return Err(TypeError::InvalidContentPath("path cannot be empty".into()));
        }
        if path.starts_with('/') || path.contains('\\') {
            return Err(TypeError::InvalidContentPath(format!(
                "'{path}' must be relative and use '/' separators"
            )));
        }
        if path
            .split('/')
            .any(|c| c.is_empty() || c == "." || c == "..")
        {
            return Err(TypeError::InvalidContentPath(format!(
                "'{path}' contains an empty, '.' or '..' component"
            )));
        }
        if path.chars().any(|c| c.is_control() || c == '"') {
            return Err(TypeError::InvalidContentPath(format!(
                "'{}' contains forbidden characters",
                path.escape_debug()
            )));
        }
        Ok(Self(path))
    }

    /// The conventional host document path, `index.html`.
    pub fn index_html() -> Self {
        Self("index.html".to_string())
    }

    /// The final component of the path.
    pub fn file_name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }

    /// Get the path as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ContentPath {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<ContentPath> for String {
    fn from(path: ContentPath) -> Self {
        path.0
    }
}

impl std::fmt::Display for ContentPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Owner and name of a remote repository.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RepoRef {
    pub owner: String,
    pub name: String,
}

impl RepoRef {
    /// Create a validated repository reference.
    ///
    /// Owner and name are limited to the characters GitHub accepts:
    /// ASCII alphanumerics, `-`, `_` and `.`.
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Result<Self, TypeError> {
        let owner = owner.into();
        let name = name.into();
        for (what, value) in [("owner", &owner), ("repository name", &name)] {
            if value.is_empty() {
                return Err(TypeError::InvalidRepo(format!("{what} cannot be empty")));
            }
            if value == "." || value == ".." {
                return Err(TypeError::InvalidRepo(format!("{what} cannot be '{value}'")));
            }
            if !value
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
            {
                return Err(TypeError::InvalidRepo(format!(
                    "{what} '{value}' contains invalid characters"
                )));
            }
        }
        Ok(Self { owner, name })
    }
}

impl std::fmt::Display for RepoRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// An authorized caller bound to a validated repository.
///
/// Session lookup and origin checks happen outside this crate; whoever
/// authenticated the caller hands the engine one of these. Construction
/// enforces that callers only touch repositories they own.
///
/// ```
/// use logshelf::core::types::RepoScope;
///
/// let scope = RepoScope::authorize("octocat", "octocat", "logs").unwrap();
/// assert_eq!(scope.repo().to_string(), "octocat/logs");
/// assert!(RepoScope::authorize("mallory", "octocat", "logs").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoScope {
    caller: String,
    repo: RepoRef,
}

impl RepoScope {
    /// Bind `caller` to `owner/name`, rejecting foreign owners.
    pub fn authorize(
        caller: impl Into<String>,
        owner: impl Into<String>,
        name: impl Into<String>,
    ) -> Result<Self, TypeError> {
        let caller = caller.into();
        let repo = RepoRef::new(owner, name)?;
        if !caller.eq_ignore_ascii_case(&repo.owner) {
            return Err(TypeError::OwnerMismatch {
                caller,
                owner: repo.owner,
            });
        }
        Ok(Self { caller, repo })
    }

    /// The authenticated login.
    pub fn caller(&self) -> &str {
        &self.caller
    }

    /// The repository this scope grants access to.
    pub fn repo(&self) -> &RepoRef {
        &self.repo
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod branch_name {
        use super::*;

        #[test]
        fn valid_names() {
            for name in ["main", "gh-pages", "feature/logs", "user@feature", "v1.0"] {
                assert!(BranchName::new(name).is_ok(), "{name} should be valid");
            }
        }

        #[test]
        fn invalid_names() {
            for name in [
                "", "@", ".hidden", "-flag", "a..b", "a//b", "x.lock", "trail/", "a b", "a~b",
                "a:b", "a@{b",
            ] {
                assert!(BranchName::new(name).is_err(), "{name} should be invalid");
            }
        }

        #[test]
        fn serde_rejects_invalid() {
            let parsed: Result<BranchName, _> = serde_json::from_str("\"bad name\"");
            assert!(parsed.is_err());
        }
    }

    mod oid {
        use super::*;

        #[test]
        fn accepts_sha1_and_sha256() {
            assert!(Oid::new("a".repeat(40)).is_ok());
            assert!(Oid::new("b".repeat(64)).is_ok());
        }

        #[test]
        fn rejects_wrong_length_or_non_hex() {
            assert!(Oid::new("abc").is_err());
            assert!(Oid::new("g".repeat(40)).is_err());
        }

        #[test]
        fn normalizes_case() {
            let oid = Oid::new("A".repeat(40)).unwrap();
            assert_eq!(oid.as_str(), "a".repeat(40));
        }
    }

    mod content_path {
        use super::*;

        #[test]
        fn accepts_nested_relative_paths() {
            let path = ContentPath::new("log/2024/session.html").unwrap();
            assert_eq!(path.file_name(), "session.html");
        }

        #[test]
        fn rejects_escapes_and_empty_components() {
            for bad in ["", " ", "/abs.html", "../up.html", "a/../b", "./x", "a//b", "a\\b", "a\"b"]
            {
                assert!(ContentPath::new(bad).is_err(), "{bad:?} should be invalid");
            }
        }
    }

    mod repo_scope {
        use super::*;

        #[test]
        fn owner_must_match_caller() {
            let err = RepoScope::authorize("alice", "bob", "logs").unwrap_err();
            assert!(matches!(err, TypeError::OwnerMismatch { .. }));
        }

        #[test]
        fn owner_comparison_ignores_case() {
            assert!(RepoScope::authorize("Alice", "alice", "logs").is_ok());
        }

        #[test]
        fn rejects_invalid_repo_names() {
            assert!(RepoScope::authorize("alice", "alice", "").is_err());
            assert!(RepoScope::authorize("alice", "alice", "a/b").is_err());
            assert!(RepoScope::authorize("alice", "alice", "..").is_err());
        }
    }
}
