//! Compiler configuration
//!
//! ```toml
//! dialect = "postgres"
//! placeholder = "dollar"
//! id_field = "id"
//! table = "users"
//!
//! [reserved]
//! or_prefix = "[|]"
//! wildcard = "*"
//!
//! [database]
//! url = "postgres://localhost/app"
//! ```

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::dialect::{Dialect, DialectKind, Placeholder, ReservedKeys};
use crate::error::{FilterError, FilterResult};

/// File name looked up in the working directory.
pub const LOCAL_CONFIG: &str = "crud-filter.toml";

/// Main compiler configuration
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct CompilerConfig {
    pub dialect: DialectKind,
    pub placeholder: Placeholder,
    /// Column the request identifier is compared with
    pub id_field: String,
    pub reserved: ReservedKeys,
    pub database: DatabaseConfig,
    /// Table used for wildcard column lookup
    pub table: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: Option<String>,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            dialect: DialectKind::default(),
            placeholder: Placeholder::default(),
            id_field: "id".to_string(),
            reserved: ReservedKeys::default(),
            database: DatabaseConfig::default(),
            table: None,
        }
    }
}

impl CompilerConfig {
    /// Create a new configuration builder
    pub fn builder() -> CompilerConfigBuilder {
        CompilerConfigBuilder::default()
    }

    /// Parse a TOML document.
    pub fn from_toml(content: &str) -> FilterResult<Self> {
        toml::from_str(content).map_err(|e| FilterError::Config(e.to_string()))
    }

    /// Load from `path`, else `./crud-filter.toml`, else the user config
    /// directory, else defaults. An explicit path must exist.
    pub fn load(path: Option<&Path>) -> FilterResult<Self> {
        if let Some(path) = path {
            return Self::read(path);
        }
        for candidate in Self::search_paths() {
            if candidate.is_file() {
                return Self::read(&candidate);
            }
        }
        Ok(Self::default())
    }

    fn read(path: &Path) -> FilterResult<Self> {
        let content = std::fs::read_to_string(path)?;
        tracing::debug!(path = %path.display(), "loading config");
        Self::from_toml(&content)
    }

    fn search_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from(LOCAL_CONFIG)];
        if let Some(dir) = dirs::config_dir() {
            paths.push(dir.join("crud-filter").join("config.toml"));
        }
        paths
    }

    /// Build the configured dialect.
    pub fn dialect(&self) -> FilterResult<Arc<dyn Dialect>> {
        self.dialect.build(self.reserved.clone(), self.placeholder)
    }
}

/// Builder for CompilerConfig
#[derive(Debug, Default)]
pub struct CompilerConfigBuilder {
    config: CompilerConfig,
}

impl CompilerConfigBuilder {
    pub fn dialect(mut self, dialect: DialectKind) -> Self {
        self.config.dialect = dialect;
        self
    }

    pub fn placeholder(mut self, placeholder: Placeholder) -> Self {
        self.config.placeholder = placeholder;
        self
    }

    pub fn id_field(mut self, field: impl Into<String>) -> Self {
        self.config.id_field = field.into();
        self
    }

    pub fn reserved(mut self, reserved: ReservedKeys) -> Self {
        self.config.reserved = reserved;
        self
    }

    pub fn database(mut self, url: impl Into<String>) -> Self {
        self.config.database.url = Some(url.into());
        self
    }

    pub fn table(mut self, table: impl Into<String>) -> Self {
        self.config.table = Some(table.into());
        self
    }

    /// Build the configuration
    pub fn build(self) -> CompilerConfig {
        self.config
    }
}
