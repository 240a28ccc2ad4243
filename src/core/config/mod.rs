//! core::config
//!
//! Configuration schema and loading.
//!
//! # Locations
//!
//! Searched in order, first hit wins:
//! 1. `$LOGSHELF_CONFIG` if set
//! 2. `$XDG_CONFIG_HOME/logshelf/config.toml`
//! 3. `~/.logshelf/config.toml`
//!
//! A missing file is not an error; defaults apply.
//!
//! # Example
//!
//! ```no_run
//! use logshelf::core::config::Config;
//!
//! let config = Config::load().unwrap();
//! println!("API: {}", config.api_base());
//! println!("Index: {}", config.index_path());
//! ```

pub mod schema;

pub use schema::{AssetsConfig, AuthorConfig, FileConfig, MarkersConfig};

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;

use crate::core::types::{BranchName, ContentPath};
use crate::listing::ListMarkers;

/// Default REST API base URL.
pub const DEFAULT_API_BASE: &str = "https://api.github.com";

/// Default delay between build status queries.
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;

/// Errors from configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file '{path}': {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("invalid config value: {0}")]
    InvalidValue(String),
}

/// Loaded configuration with defaults applied through accessors.
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Parsed file contents
    pub file: FileConfig,
    /// Where the file was loaded from, if anywhere
    path: Option<PathBuf>,
}

impl Config {
    /// Load configuration from the standard locations.
    ///
    /// # Errors
    ///
    /// Returns an error if a config file exists but cannot be read, parsed,
    /// or validated.
    pub fn load() -> Result<Self, ConfigError> {
        match Self::locate() {
            Some(path) => Self::from_file(&path),
            None => Ok(Self::default()),
        }
    }

    /// Load configuration from an explicit file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;
        let file: FileConfig = toml::from_str(&contents).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        file.validate()?;
        Ok(Self {
            file,
            path: Some(path.to_path_buf()),
        })
    }

    fn locate() -> Option<PathBuf> {
        if let Ok(path) = std::env::var("LOGSHELF_CONFIG") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        if let Ok(xdg_home) = std::env::var("XDG_CONFIG_HOME") {
            let path = PathBuf::from(xdg_home).join("logshelf/config.toml");
            if path.exists() {
                return Some(path);
            }
        }

        dirs::home_dir()
            .map(|home| home.join(".logshelf/config.toml"))
            .filter(|path| path.exists())
    }

    /// Path of the loaded file, if one was found.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    // =========================================================================
    // Accessor methods with defaults
    // =========================================================================

    /// REST API base URL, without a trailing slash.
    pub fn api_base(&self) -> &str {
        self.file
            .api_base
            .as_deref()
            .unwrap_or(DEFAULT_API_BASE)
            .trim_end_matches('/')
    }

    /// Branch override. `None` means "use the repository default branch".
    pub fn branch(&self) -> Option<BranchName> {
        // Validated at load time
        self.file
            .branch
            .as_ref()
            .and_then(|b| BranchName::new(b).ok())
    }

    /// Host document path.
    pub fn index_path(&self) -> ContentPath {
        self.file
            .index_path
            .as_ref()
            .and_then(|p| ContentPath::new(p).ok())
            .unwrap_or_else(ContentPath::index_html)
    }

    /// Delay between build status queries.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(
            self.file
                .poll_interval_secs
                .unwrap_or(DEFAULT_POLL_INTERVAL_SECS)
                .max(1),
        )
    }

    /// Commit author, if configured.
    pub fn commit_author(&self) -> Option<&AuthorConfig> {
        self.file.commit_author.as_ref()
    }

    /// List region markers with overrides applied.
    pub fn markers(&self) -> ListMarkers {
        let mut markers = ListMarkers::default();
        if let Some(overrides) = &self.file.markers {
            if let Some(id) = &overrides.region_id {
                markers.region_id = id.clone();
            }
            if let Some(attr) = &overrides.entry_attr {
                markers.entry_attr = attr.clone();
            }
            if let Some(attr) = &overrides.date_attr {
                markers.date_attr = attr.clone();
            }
        }
        markers
    }

    /// Whether missing companion assets are written on add and init.
    ///
    /// Defaults to `true`.
    pub fn publish_assets(&self) -> bool {
        self.file
            .assets
            .as_ref()
            .and_then(|a| a.publish)
            .unwrap_or(true)
    }
}
