//! Built-in defaults (least specific level)
//!
//! Hardcoded values every project inherits when no settings file says
//! otherwise.

use projconf_tree::{ConfigTree, ConfigTreeBuilder};
use serde::{Deserialize, Serialize};

/// Built-in default settings values
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuiltinDefaults {
    /// Display name pattern (default: "${project.name}")
    pub display_name_pattern: String,

    /// Source file encoding (default: "UTF-8")
    pub source_encoding: String,

    /// Source level (default: "17")
    pub source_level: String,

    /// Platform kind for target and script platforms (default: "j2se")
    pub platform_name: String,

    /// Platform version for target and script platforms (default: "17")
    pub platform_version: String,

    /// Build tool distribution (default: "default")
    pub gradle_location: String,
}

impl Default for BuiltinDefaults {
    fn default() -> Self {
        Self {
            display_name_pattern: "${project.name}".to_string(),
            source_encoding: "UTF-8".to_string(),
            source_level: "17".to_string(),
            platform_name: "j2se".to_string(),
            platform_version: "17".to_string(),
            gradle_location: "default".to_string(),
        }
    }
}

impl BuiltinDefaults {
    /// Convert to a settings tree for the builtin level
    pub fn to_tree(&self) -> ConfigTree {
        let platform = || {
            let mut builder = ConfigTreeBuilder::new();
            builder.add_child("name").set_value(self.platform_name.clone());
            builder.add_child("version").set_value(self.platform_version.clone());
            builder.build()
        };

        let mut builder = ConfigTreeBuilder::new();
        builder
            .add_child("display_name_pattern")
            .set_value(self.display_name_pattern.clone());
        builder
            .add_child("source_encoding")
            .set_value(self.source_encoding.clone());
        builder.add_child("source_level").set_value(self.source_level.clone());
        builder.add_child_tree("target_platform", platform());
        builder.add_child_tree("script_platform", platform());
        builder
            .add_child("gradle_location")
            .set_value(self.gradle_location.clone());
        builder.build()
    }
}
