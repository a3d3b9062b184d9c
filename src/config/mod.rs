//! Project settings levels
//!
//! Settings are resolved through a chain of levels:
//! 1. Project settings file
//! 2. Root project settings file
//! 3. Global defaults file
//! 4. Built-in defaults

mod chain;
mod defaults;
mod provider;

pub use chain::{LevelOrigin, SettingsChain, SettingsLevel};
pub use defaults::BuiltinDefaults;
pub use provider::{
    verify_settings, ConfigError, ConfigProvider, ConfigSource, ProjectLocations,
    GLOBAL_SETTINGS_ENV, SETTINGS_FILE_NAME,
};
