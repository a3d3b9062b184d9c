//! Settings files of a project, loaded into a [`SettingsChain`]
//!
//! Levels, most specific first:
//! 1. Project settings (`<project>/projconf.toml`)
//! 2. Root project settings (`<settings dir>/projconf.toml`), when the
//!    settings directory is not the project directory
//! 3. Global defaults (`$PROJCONF_GLOBAL` or `~/.config/projconf/defaults.toml`)
//! 4. Built-in defaults
//!
//! Every file level records its provenance: path and SHA-256 digest of the
//! raw bytes. Reloading republishes only levels whose digest changed.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use projconf_tree::{ConfigTree, TreeError};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::chain::{LevelOrigin, SettingsChain};
use super::defaults::BuiltinDefaults;
use crate::model;
use crate::platform::PlatformRegistry;
use crate::properties::CommonProperties;

/// Name of project and root settings files.
pub const SETTINGS_FILE_NAME: &str = "projconf.toml";

/// Environment variable overriding the global defaults file.
pub const GLOBAL_SETTINGS_ENV: &str = "PROJCONF_GLOBAL";

/// Where the settings files of one project live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectLocations {
    pub project_dir: PathBuf,
    pub settings_dir: PathBuf,
    pub global_file: Option<PathBuf>,
}

impl ProjectLocations {
    pub fn new(
        project_dir: impl Into<PathBuf>,
        settings_dir: impl Into<PathBuf>,
        global_file: Option<PathBuf>,
    ) -> Self {
        Self {
            project_dir: project_dir.into(),
            settings_dir: settings_dir.into(),
            global_file,
        }
    }

    /// Locations for `project_dir`, finding the settings directory from the
    /// file layout and the global file from the environment.
    pub fn discover(project_dir: impl Into<PathBuf>) -> Self {
        let project_dir = project_dir.into();
        let settings_dir = model::settings_dir(&project_dir);
        Self {
            project_dir,
            settings_dir,
            global_file: Self::default_global_file(),
        }
    }

    pub fn with_global_file(mut self, global_file: Option<PathBuf>) -> Self {
        self.global_file = global_file;
        self
    }

    pub fn default_global_file() -> Option<PathBuf> {
        if let Some(path) = std::env::var_os(GLOBAL_SETTINGS_ENV) {
            return Some(PathBuf::from(path));
        }
        std::env::var_os("HOME").map(|home| {
            PathBuf::from(home)
                .join(".config")
                .join("projconf")
                .join("defaults.toml")
        })
    }

    pub fn project_file(&self) -> PathBuf {
        self.project_dir.join(SETTINGS_FILE_NAME)
    }

    /// Settings file of the root project, if this is not the root project.
    pub fn root_file(&self) -> Option<PathBuf> {
        if self.settings_dir == self.project_dir {
            None
        } else {
            Some(self.settings_dir.join(SETTINGS_FILE_NAME))
        }
    }

    /// File-backed levels with their paths, most specific first.
    fn file_levels(&self) -> Vec<(LevelOrigin, PathBuf)> {
        let mut levels = vec![(LevelOrigin::Project, self.project_file())];
        if let Some(root) = self.root_file() {
            levels.push((LevelOrigin::Root, root));
        }
        if let Some(global) = &self.global_file {
            levels.push((LevelOrigin::Global, global.clone()));
        }
        levels
    }
}

/// A contributing settings level with provenance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigSource {
    /// Origin of this level
    pub origin: LevelOrigin,

    /// File path (None for builtin)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,

    /// SHA-256 digest of raw file bytes (None for builtin and missing files)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
}

/// Settings loading errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Parse error in {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },

    #[error("Invalid settings document {}: {source}", path.display())]
    Tree {
        path: PathBuf,
        #[source]
        source: TreeError,
    },
}

struct LoadedFile {
    tree: ConfigTree,
    digest: String,
}

fn digest_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Load and parse a settings file. A missing file is `Ok(None)`.
fn load_toml_file(path: &Path) -> Result<Option<LoadedFile>, ConfigError> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    let digest = digest_bytes(&bytes);

    let contents = String::from_utf8(bytes).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        message: format!("Invalid UTF-8: {}", e),
    })?;

    let tree = projconf_tree::parse_toml(&contents).map_err(|source| ConfigError::Tree {
        path: path.to_path_buf(),
        source,
    })?;

    Ok(Some(LoadedFile { tree, digest }))
}

/// Read every file level, failing on the first unreadable one.
fn load_file_levels(
    locations: &ProjectLocations,
) -> Result<Vec<(LevelOrigin, PathBuf, Option<LoadedFile>)>, ConfigError> {
    locations
        .file_levels()
        .into_iter()
        .map(|(origin, path)| {
            let loaded = load_toml_file(&path)?;
            Ok((origin, path, loaded))
        })
        .collect()
}

/// Check every settings file of `locations` without building a chain.
pub fn verify_settings(locations: &ProjectLocations) -> Vec<(ConfigSource, Option<ConfigError>)> {
    locations
        .file_levels()
        .into_iter()
        .map(|(origin, path)| match load_toml_file(&path) {
            Ok(loaded) => (
                ConfigSource {
                    origin,
                    path: Some(path),
                    digest: loaded.map(|file| file.digest),
                },
                None,
            ),
            Err(e) => (
                ConfigSource {
                    origin,
                    path: Some(path),
                    digest: None,
                },
                Some(e),
            ),
        })
        .collect()
}

/// Owns the settings chain of one project.
pub struct ConfigProvider {
    locations: ProjectLocations,
    chain: Arc<SettingsChain>,
    sources: Mutex<Vec<ConfigSource>>,
    // Serializes reload and save from file read to publish. Never taken
    // by listeners, so they may read the provider while it is held.
    file_sync: Mutex<()>,
    properties: CommonProperties,
}

impl ConfigProvider {
    /// Load every level of `locations`.
    ///
    /// The project level is always present, empty when its file does not
    /// exist, so edits have a level to go to.
    pub fn load(
        locations: ProjectLocations,
        platforms: Arc<PlatformRegistry>,
    ) -> Result<Self, ConfigError> {
        let files = load_file_levels(&locations)?;

        let mut levels = Vec::new();
        let mut sources = Vec::new();
        for (origin, path, loaded) in files {
            match loaded {
                Some(file) => {
                    levels.push((origin, file.tree));
                    sources.push(ConfigSource {
                        origin,
                        path: Some(path),
                        digest: Some(file.digest),
                    });
                }
                None if origin == LevelOrigin::Project => {
                    levels.push((origin, ConfigTree::empty()));
                    sources.push(ConfigSource {
                        origin,
                        path: Some(path),
                        digest: None,
                    });
                }
                None => {}
            }
        }
        levels.push((LevelOrigin::Builtin, BuiltinDefaults::default().to_tree()));
        sources.push(ConfigSource {
            origin: LevelOrigin::Builtin,
            path: None,
            digest: None,
        });

        tracing::debug!(
            project = %locations.project_dir.display(),
            levels = sources.len(),
            "settings loaded"
        );

        let chain = Arc::new(SettingsChain::with_levels(levels));
        let properties = CommonProperties::new(Arc::clone(&chain), platforms);

        Ok(Self {
            locations,
            chain,
            sources: Mutex::new(sources),
            file_sync: Mutex::new(()),
            properties,
        })
    }

    pub fn locations(&self) -> &ProjectLocations {
        &self.locations
    }

    pub fn chain(&self) -> &Arc<SettingsChain> {
        &self.chain
    }

    pub fn common_properties(&self) -> &CommonProperties {
        &self.properties
    }

    /// Provenance of each level, most specific first.
    pub fn sources(&self) -> Vec<ConfigSource> {
        self.sources
            .lock()
            .map(|sources| sources.clone())
            .unwrap_or_default()
    }

    /// Re-read the settings files and publish what changed.
    ///
    /// Nothing is published when any file fails to load. Returns the
    /// origins whose level was replaced, added or removed. Concurrent
    /// reloads run one at a time, so the published trees always match the
    /// recorded digests. Listeners notified by a reload must not reload or
    /// save from the notifying thread.
    pub fn reload(&self) -> Result<Vec<LevelOrigin>, ConfigError> {
        let _sync = self.file_sync.lock().unwrap_or_else(|e| e.into_inner());
        let files = load_file_levels(&self.locations)?;

        let mut updates: Vec<(LevelOrigin, Option<ConfigTree>)> = Vec::new();
        {
            let mut sources = self.sources.lock().unwrap_or_else(|e| e.into_inner());
            let mut next_sources = Vec::new();
            for (origin, path, loaded) in files {
                let previous = sources
                    .iter()
                    .find(|source| source.origin == origin)
                    .and_then(|source| source.digest.clone());

                let digest = match loaded {
                    Some(file) => {
                        if previous.as_deref() != Some(file.digest.as_str()) {
                            updates.push((origin, Some(file.tree)));
                        }
                        Some(file.digest)
                    }
                    None if origin == LevelOrigin::Project => {
                        if previous.is_some() {
                            updates.push((origin, Some(ConfigTree::empty())));
                        }
                        None
                    }
                    None => {
                        updates.push((origin, None));
                        continue;
                    }
                };
                next_sources.push(ConfigSource {
                    origin,
                    path: Some(path),
                    digest,
                });
            }
            next_sources.extend(
                sources
                    .iter()
                    .filter(|source| source.origin == LevelOrigin::Builtin)
                    .cloned(),
            );
            *sources = next_sources;
        }

        // Listeners may read the provider, so publish without the sources lock.
        let mut changed = Vec::new();
        for (origin, tree) in updates {
            match tree {
                Some(tree) => {
                    self.chain.set_level(origin, tree);
                    changed.push(origin);
                }
                None => {
                    if self.chain.remove_level(origin) {
                        changed.push(origin);
                    }
                }
            }
        }

        if !changed.is_empty() {
            tracing::info!(
                project = %self.locations.project_dir.display(),
                changed = ?changed,
                "settings reloaded"
            );
        }
        Ok(changed)
    }

    /// Write the project level to the project settings file.
    pub fn save_project_settings(&self) -> Result<PathBuf, ConfigError> {
        let _sync = self.file_sync.lock().unwrap_or_else(|e| e.into_inner());
        let path = self.locations.project_file();
        let tree = self
            .chain
            .level(LevelOrigin::Project)
            .map(|level| level.tree())
            .unwrap_or_default();

        let text = projconf_tree::to_toml_string(&tree).map_err(|source| ConfigError::Tree {
            path: path.clone(),
            source,
        })?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| ConfigError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        fs::write(&path, text.as_bytes()).map_err(|source| ConfigError::Io {
            path: path.clone(),
            source,
        })?;

        let digest = digest_bytes(text.as_bytes());
        if let Ok(mut sources) = self.sources.lock() {
            if let Some(source) = sources
                .iter_mut()
                .find(|source| source.origin == LevelOrigin::Project)
            {
                source.digest = Some(digest);
            }
        }

        tracing::info!(path = %path.display(), "project settings saved");
        Ok(path)
    }
}

impl std::fmt::Debug for ConfigProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigProvider")
            .field("locations", &self.locations)
            .field("chain", &self.chain)
            .finish_non_exhaustive()
    }
}
