//! Database configuration.
//!
//! Configuration is normally built in code, but can also be loaded from
//! environment variables.
//!
//! # Environment Variables
//!
//! - `ASSOCDB_INDEX_MODE`: `mono`, `tri` or `hexa`, any case (default: `hexa`)
//! - `ASSOCDB_MAX_PAGES`: upper bound on the number of 32 KiB pages
//!   (default: `65536`)
//!
//! # Invariants
//!
//! - `max_pages` is at least 1, so the root page always fits.

use crate::ontology::IndexMode;

/// Environment variable selecting the index granularity.
pub const INDEX_MODE_VAR: &str = "ASSOCDB_INDEX_MODE";
/// Environment variable capping the page space.
pub const MAX_PAGES_VAR: &str = "ASSOCDB_MAX_PAGES";

/// Database configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DatabaseConfig {
    /// Orientations maintained by the index. Opening a database stored in a
    /// different mode migrates it.
    pub index_mode: IndexMode,
    /// The page space fails with `ResourceExhausted` past this many pages.
    pub max_pages: u64,
}

/// Error returned when loading configuration fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// An environment variable has an invalid value.
    InvalidValue { name: String, message: String },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidValue { name, message } => {
                write!(f, "invalid value for {name}: {message}")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

impl DatabaseConfig {
    /// Default index granularity.
    pub const DEFAULT_INDEX_MODE: IndexMode = IndexMode::Hexa;
    /// Default page cap: 2 GiB of 32 KiB pages.
    pub const DEFAULT_MAX_PAGES: u64 = 65_536;

    #[must_use]
    pub const fn new() -> Self {
        Self {
            index_mode: Self::DEFAULT_INDEX_MODE,
            max_pages: Self::DEFAULT_MAX_PAGES,
        }
    }

    #[must_use]
    pub const fn with_index_mode(mut self, index_mode: IndexMode) -> Self {
        self.index_mode = index_mode;
        self
    }

    #[must_use]
    pub const fn with_max_pages(mut self, max_pages: u64) -> Self {
        self.max_pages = max_pages;
        self
    }

    /// Load configuration from environment variables, falling back to
    /// defaults for unset ones.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is set to an invalid value.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through `lookup`, which maps a variable name to
    /// its value.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let index_mode = match lookup(INDEX_MODE_VAR) {
            Some(value) => value
                .parse::<IndexMode>()
                .map_err(|message| ConfigError::InvalidValue {
                    name: INDEX_MODE_VAR.to_string(),
                    message,
                })?,
            None => Self::DEFAULT_INDEX_MODE,
        };

        let max_pages = match lookup(MAX_PAGES_VAR) {
            Some(value) => match value.trim().parse::<u64>() {
                Ok(pages) if pages > 0 => pages,
                _ => {
                    return Err(ConfigError::InvalidValue {
                        name: MAX_PAGES_VAR.to_string(),
                        message: format!("'{value}' is not a positive page count"),
                    });
                }
            },
            None => Self::DEFAULT_MAX_PAGES,
        };

        Ok(Self {
            index_mode,
            max_pages,
        })
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self::new()
    }
}
