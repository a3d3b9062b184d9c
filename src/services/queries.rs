//! Read-only queries answered from the project settings.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use globset::{Glob, GlobSet, GlobSetBuilder};
use projconf_tree::{merge_layers, ConfigPath, ConfigTree};
use serde::Serialize;

use crate::config::{LevelOrigin, SettingsChain, SETTINGS_FILE_NAME};
use crate::properties::CommonProperties;
use crate::property::HierarchicalProperty;

/// Build output never shared through version control.
const DEFAULT_EXCLUDES: &[&str] = &[
    "build",
    "build/**",
    ".gradle",
    ".gradle/**",
    "**/build",
    "**/build/**",
];

/// Whether a file belongs in version control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Sharability {
    Sharable,
    NotSharable,
    /// Outside the project directory.
    Unknown,
}

/// Answers sharability from the `excluded_paths` globs plus build outputs.
pub struct PathSharabilityQuery {
    project_dir: PathBuf,
    excluded_paths: HierarchicalProperty<Vec<String>, Vec<String>>,
    compiled: Mutex<Option<(Vec<String>, Arc<GlobSet>)>>,
}

impl PathSharabilityQuery {
    pub fn new(
        project_dir: PathBuf,
        excluded_paths: HierarchicalProperty<Vec<String>, Vec<String>>,
    ) -> Self {
        Self {
            project_dir,
            excluded_paths,
            compiled: Mutex::new(None),
        }
    }

    /// Glob set for the current patterns, rebuilt when they change.
    fn glob_set(&self) -> Arc<GlobSet> {
        let patterns = self.excluded_paths.value().unwrap_or_default();
        let mut compiled = self.compiled.lock().unwrap_or_else(|e| e.into_inner());
        if let Some((cached_patterns, set)) = compiled.as_ref() {
            if *cached_patterns == patterns {
                return Arc::clone(set);
            }
        }

        let mut builder = GlobSetBuilder::new();
        for pattern in DEFAULT_EXCLUDES.iter().copied().chain(patterns.iter().map(String::as_str)) {
            match Glob::new(pattern) {
                Ok(glob) => {
                    builder.add(glob);
                }
                Err(e) => {
                    tracing::warn!(pattern = %pattern, error = %e, "ignoring invalid exclude pattern")
                }
            }
        }
        let set = Arc::new(builder.build().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "cannot build exclude patterns");
            GlobSet::empty()
        }));
        *compiled = Some((patterns, Arc::clone(&set)));
        set
    }

    pub fn sharability(&self, path: &Path) -> Sharability {
        let relative = if path.is_absolute() {
            match path.strip_prefix(&self.project_dir) {
                Ok(relative) => relative,
                Err(_) => return Sharability::Unknown,
            }
        } else {
            path
        };

        if self.glob_set().is_match(relative) {
            Sharability::NotSharable
        } else {
            Sharability::Sharable
        }
    }
}

/// Source encoding of files inside the project.
pub struct ProjectSourceEncodingQuery {
    project_dir: PathBuf,
    source_encoding: HierarchicalProperty<String, String>,
}

impl ProjectSourceEncodingQuery {
    pub fn new(project_dir: PathBuf, source_encoding: HierarchicalProperty<String, String>) -> Self {
        Self {
            project_dir,
            source_encoding,
        }
    }

    /// `None` for files outside the project or when no level sets one.
    pub fn encoding_for(&self, file: &Path) -> Option<String> {
        if file.is_absolute() && !file.starts_with(&self.project_dir) {
            return None;
        }
        self.source_encoding.value()
    }
}

/// Attributes offered to file templates.
pub struct TemplateAttributeProvider {
    project_name: String,
    properties: CommonProperties,
}

impl TemplateAttributeProvider {
    pub fn new(project_name: impl Into<String>, properties: CommonProperties) -> Self {
        Self {
            project_name: project_name.into(),
            properties,
        }
    }

    pub fn attributes(&self) -> BTreeMap<String, String> {
        let mut attributes = BTreeMap::new();
        attributes.insert("project.name".to_string(), self.project_name.clone());
        if let Some(encoding) = self.properties.source_encoding().value() {
            attributes.insert("project.encoding".to_string(), encoding);
        }
        if let Some(level) = self.properties.source_level().value() {
            attributes.insert("project.sourceLevel".to_string(), level.to_string());
        }
        if let Some(platform) = self.properties.target_platform().value() {
            attributes.insert("project.platform".to_string(), platform.display_name);
        }
        attributes
    }
}

/// Raw access to the settings chain by path.
pub struct DefaultProjectSettingsProvider {
    project_dir: PathBuf,
    chain: Arc<SettingsChain>,
}

impl DefaultProjectSettingsProvider {
    pub fn new(project_dir: PathBuf, chain: Arc<SettingsChain>) -> Self {
        Self { project_dir, chain }
    }

    pub fn settings_file(&self) -> PathBuf {
        self.project_dir.join(SETTINGS_FILE_NAME)
    }

    /// Node at `path` from the most specific level at or below `origin`
    /// that has one.
    pub fn setting(&self, origin: LevelOrigin, path: &ConfigPath) -> Option<ConfigTree> {
        self.chain
            .levels_from(origin)
            .iter()
            .find_map(|level| level.tree().at_path(path).filter(|node| !node.is_empty()).cloned())
    }

    /// Node at `path` stored on `origin` itself.
    pub fn local_setting(&self, origin: LevelOrigin, path: &ConfigPath) -> Option<ConfigTree> {
        self.chain.level(origin)?.tree().at_path(path).cloned()
    }

    /// All levels at or below `origin` deep-merged, most specific on top.
    pub fn merged_settings(&self, origin: LevelOrigin) -> ConfigTree {
        let levels = self.chain.levels_from(origin);
        merge_layers(levels.iter().rev().map(|level| level.tree()))
    }
}
