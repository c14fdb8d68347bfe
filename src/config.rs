use std::num::NonZeroU32;

use serde::{Deserialize, Serialize};

use crate::error::SqlMapperError;
use crate::types::DatabaseType;

/// Rows requested from a cursor per fetch when nothing else is configured.
pub const DEFAULT_FETCH_SIZE: u32 = 10_000;

/// How many rows a cursor fetch requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchSize {
    /// Fetch at most this many rows per round trip.
    Rows(NonZeroU32),
    /// Fetch everything in one unbounded round trip.
    All,
}

impl Default for FetchSize {
    fn default() -> Self {
        NonZeroU32::new(DEFAULT_FETCH_SIZE).map_or(FetchSize::All, FetchSize::Rows)
    }
}

impl FetchSize {
    /// Build from a row count.
    ///
    /// # Errors
    /// Returns `SqlMapperError::ConfigError` for zero, which would never make progress.
    pub fn rows(count: u32) -> Result<Self, SqlMapperError> {
        NonZeroU32::new(count).map(FetchSize::Rows).ok_or_else(|| {
            SqlMapperError::ConfigError("cursor fetch size must be at least 1".to_string())
        })
    }

    /// Whether a batch of `received` rows means the cursor has no more rows.
    #[must_use]
    pub fn is_exhausted_by(self, received: usize) -> bool {
        match self {
            FetchSize::Rows(n) => received < n.get() as usize,
            FetchSize::All => true,
        }
    }
}

/// What to do with a catalog default-value literal no rule recognises.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DefaultValueMode {
    /// Raise `SqlMapperError::UnknownDefaultValue`.
    Strict,
    /// Treat the default as NULL.
    Lenient,
}

impl Default for DefaultValueMode {
    fn default() -> Self {
        if cfg!(debug_assertions) {
            DefaultValueMode::Strict
        } else {
            DefaultValueMode::Lenient
        }
    }
}

/// Settings consumed by the dialect, cache and cursor layers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapperConfig {
    pub database_type: DatabaseType,
    /// Identity of the connection; part of table-metadata cache keys.
    pub connection_string: String,
    pub fetch_size: FetchSize,
    pub auto_dereference_cursors: bool,
    pub default_value_mode: DefaultValueMode,
}

impl Default for MapperConfig {
    fn default() -> Self {
        Self {
            database_type: DatabaseType::Sqlite,
            connection_string: String::new(),
            fetch_size: FetchSize::default(),
            auto_dereference_cursors: true,
            default_value_mode: DefaultValueMode::default(),
        }
    }
}

impl MapperConfig {
    #[must_use]
    pub fn builder(database_type: DatabaseType) -> MapperConfigBuilder {
        MapperConfigBuilder::new(database_type)
    }
}

/// Fluent builder for [`MapperConfig`].
#[derive(Debug, Clone)]
pub struct MapperConfigBuilder {
    cfg: MapperConfig,
}

impl MapperConfigBuilder {
    #[must_use]
    pub fn new(database_type: DatabaseType) -> Self {
        Self {
            cfg: MapperConfig {
                database_type,
                ..MapperConfig::default()
            },
        }
    }

    #[must_use]
    pub fn connection_string(mut self, connection_string: impl Into<String>) -> Self {
        self.cfg.connection_string = connection_string.into();
        self
    }

    #[must_use]
    pub fn fetch_size(mut self, fetch_size: FetchSize) -> Self {
        self.cfg.fetch_size = fetch_size;
        self
    }

    #[must_use]
    pub fn auto_dereference_cursors(mut self, enabled: bool) -> Self {
        self.cfg.auto_dereference_cursors = enabled;
        self
    }

    #[must_use]
    pub fn default_value_mode(mut self, mode: DefaultValueMode) -> Self {
        self.cfg.default_value_mode = mode;
        self
    }

    #[must_use]
    pub fn build(self) -> MapperConfig {
        self.cfg
    }
}
