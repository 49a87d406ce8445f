//! Compiler configuration.

mod settings;

pub use settings::{
    CompilerSettings, PlanCacheSettings, SettingsError, CONFIG_ENV_VAR, DEFAULT_CONFIG_FILE,
};
