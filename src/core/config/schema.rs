//! core::config::schema
//!
//! Configuration schema types.
//!
//! # Example
//!
//! ```toml
//! api_base = "https://api.github.com"
//! branch = "main"
//! index_path = "index.html"
//! poll_interval_secs = 5
//!
//! [commit_author]
//! name = "Log Shelf"
//! email = "logshelf@example.com"
//!
//! [markers]
//! region_id = "log-list"
//! entry_attr = "data-path"
//! date_attr = "data-date"
//!
//! [assets]
//! publish = true
//! ```
//!
//! # Validation
//!
//! Values are validated after parsing so that a bad file fails at load time
//! rather than halfway through a publish.

use serde::{Deserialize, Serialize};

use super::ConfigError;
use crate::core::types::{BranchName, ContentPath};

/// Top-level configuration file.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    /// REST API base URL (GitHub Enterprise installs use `/api/v3`)
    pub api_base: Option<String>,

    /// Branch to publish to instead of the repository default branch
    pub branch: Option<String>,

    /// Path of the host document inside the repository
    pub index_path: Option<String>,

    /// Seconds between build status queries
    pub poll_interval_secs: Option<u64>,

    /// Author recorded on published commits
    pub commit_author: Option<AuthorConfig>,

    /// List region markers
    pub markers: Option<MarkersConfig>,

    /// Companion asset publication
    pub assets: Option<AssetsConfig>,
}

impl FileConfig {
    /// Validate the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if any value is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(api_base) = &self.api_base {
            if !(api_base.starts_with("https://") || api_base.starts_with("http://")) {
                return Err(ConfigError::InvalidValue(format!(
                    "api_base '{}' must be an http(s) URL",
                    api_base
                )));
            }
        }

        if let Some(branch) = &self.branch {
            BranchName::new(branch)
                .map_err(|e| ConfigError::InvalidValue(format!("invalid branch: {}", e)))?;
        }

        if let Some(index_path) = &self.index_path {
            ContentPath::new(index_path)
                .map_err(|e| ConfigError::InvalidValue(format!("invalid index_path: {}", e)))?;
        }

        if self.poll_interval_secs == Some(0) {
            return Err(ConfigError::InvalidValue(
                "poll_interval_secs must be at least 1".to_string(),
            ));
        }

        if let Some(author) = &self.commit_author {
            author.validate()?;
        }

        if let Some(markers) = &self.markers {
            markers.validate()?;
        }

        Ok(())
    }
}

/// Commit author identity.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct AuthorConfig {
    pub name: String,
    pub email: String,
}

impl AuthorConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::InvalidValue(
                "commit_author.name cannot be empty".to_string(),
            ));
        }
        if !self.email.contains('@') {
            return Err(ConfigError::InvalidValue(format!(
                "commit_author.email '{}' is not an email address",
                self.email
            )));
        }
        Ok(())
    }
}

/// Overrides for the list region markers.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct MarkersConfig {
    /// `id` attribute of the list container
    pub region_id: Option<String>,

    /// Attribute carrying each entry's identifier
    pub entry_attr: Option<String>,

    /// Attribute carrying each entry's creation timestamp
    pub date_attr: Option<String>,
}

impl MarkersConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        for (key, value) in [
            ("markers.region_id", &self.region_id),
            ("markers.entry_attr", &self.entry_attr),
            ("markers.date_attr", &self.date_attr),
        ] {
            if let Some(value) = value {
                let ok = !value.is_empty()
                    && value
                        .chars()
                        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
                if !ok {
                    return Err(ConfigError::InvalidValue(format!(
                        "{} '{}' must be a non-empty HTML identifier",
                        key, value
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Companion asset settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct AssetsConfig {
    /// Write missing companion scripts alongside the host document
    pub publish: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_is_valid() {
        assert!(FileConfig::default().validate().is_ok());
    }

    #[test]
    fn parses_full_file() {
        let toml = r#"
            api_base = "https://github.example.com/api/v3"
            branch = "gh-pages"
            index_path = "docs/index.html"
            poll_interval_secs = 10

            [commit_author]
            name = "Shelf Bot"
            email = "bot@example.com"

            [markers]
            region_id = "sessions"

            [assets]
            publish = false
        "#;
        let config: FileConfig = toml::from_str(toml).unwrap();
        config.validate().unwrap();
        assert_eq!(config.branch.as_deref(), Some("gh-pages"));
        assert_eq!(config.poll_interval_secs, Some(10));
        assert_eq!(
            config.markers.unwrap().region_id.as_deref(),
            Some("sessions")
        );
        assert_eq!(config.assets.unwrap().publish, Some(false));
    }

    #[test]
    fn rejects_unknown_fields() {
        let parsed: Result<FileConfig, _> = toml::from_str("colour = \"blue\"");
        assert!(parsed.is_err());
    }

    #[test]
    fn rejects_zero_poll_interval() {
        let config = FileConfig {
            poll_interval_secs: Some(0),
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue(_))
        ));
    }

    #[test]
    fn rejects_bad_branch_and_index_path() {
        let config = FileConfig {
            branch: Some("bad branch".into()),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = FileConfig {
            index_path: Some("../index.html".into()),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_marker_with_quotes() {
        let config = FileConfig {
            markers: Some(MarkersConfig {
                region_id: Some("log\"list".into()),
                ..Default::default()
            }),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_non_http_api_base() {
        let config = FileConfig {
            api_base: Some("ftp://example.com".into()),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
