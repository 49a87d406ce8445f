//! TOML settings for the compiler.
//!
//! Example `comprehend.toml`:
//! ```toml
//! dialect = "postgres"
//! inline_constants = false
//! pretty = false
//! paramstyle = "named"   # optional, defaults to the dialect's own style
//!
//! [plan_cache]
//! enabled = true
//! max_entries = 1024
//! ```

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::sql::dialect::{Dialect, ParamStyle};

/// Environment variable naming a settings file.
pub const CONFIG_ENV_VAR: &str = "COMPREHEND_CONFIG";

/// File looked up in the working directory when no path is given.
pub const DEFAULT_CONFIG_FILE: &str = "comprehend.toml";

/// Error type for settings.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Config file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Root configuration structure.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct CompilerSettings {
    /// Target dialect.
    pub dialect: Dialect,

    /// Render literal constants inline instead of binding them.
    pub inline_constants: bool,

    /// Multi-line SQL output.
    pub pretty: bool,

    /// Placeholder style override.
    pub paramstyle: Option<ParamStyle>,

    pub plan_cache: PlanCacheSettings,
}

impl Default for CompilerSettings {
    fn default() -> Self {
        Self {
            dialect: Dialect::Postgres,
            inline_constants: false,
            pretty: false,
            paramstyle: None,
            plan_cache: PlanCacheSettings::default(),
        }
    }
}

/// Plan cache configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct PlanCacheSettings {
    pub enabled: bool,

    /// The cache is cleared once it holds this many plans.
    pub max_entries: usize,
}

impl Default for PlanCacheSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            max_entries: 1024,
        }
    }
}

impl CompilerSettings {
    /// Parse and validate settings from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self, SettingsError> {
        let settings: CompilerSettings = toml::from_str(content)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load settings from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(SettingsError::FileNotFound(path.to_path_buf()));
        }
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Load settings from `path`, or from the default locations.
    ///
    /// Without an explicit path, searches in order:
    /// 1. Environment variable `COMPREHEND_CONFIG`
    /// 2. `./comprehend.toml`
    ///
    /// and falls back to defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, SettingsError> {
        if let Some(path) = path {
            return Self::from_file(path);
        }
        if let Ok(path) = env::var(CONFIG_ENV_VAR) {
            return Self::from_file(path);
        }
        let local = PathBuf::from(DEFAULT_CONFIG_FILE);
        if local.exists() {
            return Self::from_file(&local);
        }
        Ok(Self::default())
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.plan_cache.enabled && self.plan_cache.max_entries == 0 {
            return Err(SettingsError::InvalidConfig(
                "plan_cache.max_entries must be positive when the cache is enabled".into(),
            ));
        }
        Ok(())
    }

    /// Placeholder style actually used for output.
    pub fn effective_paramstyle(&self) -> ParamStyle {
        use crate::sql::dialect::SqlDialect;
        self.paramstyle.unwrap_or_else(|| self.dialect.paramstyle())
    }

    pub fn with_dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = dialect;
        self
    }

    pub fn with_paramstyle(mut self, style: ParamStyle) -> Self {
        self.paramstyle = Some(style);
        self
    }

    pub fn with_inline_constants(mut self, inline: bool) -> Self {
        self.inline_constants = inline;
        self
    }

    pub fn with_pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }

    pub fn without_plan_cache(mut self) -> Self {
        self.plan_cache.enabled = false;
        self
    }
}
