//! Build platforms (JDKs and script runtimes)
//!
//! Settings store a [`PlatformId`]; the property value is the matching
//! installed [`Platform`], resolved against a live [`PlatformRegistry`] so
//! it follows platforms being installed or removed.

use std::cmp::Ordering;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use projconf_tree::{ConfigTree, ConfigTreeBuilder};
use serde::{Deserialize, Serialize};

use crate::property::{
    const_source, convert, MutableProperty, PropertyKeyEncodingDef, PropertySource,
    PropertyValueDef,
};

/// Stored identity of a platform: its kind and version.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlatformId {
    pub name: String,
    pub version: String,
}

impl PlatformId {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }
}

impl fmt::Display for PlatformId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.name, self.version)
    }
}

impl FromStr for PlatformId {
    type Err = String;

    /// Parses `name:version`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once(':') {
            Some((name, version)) if !name.trim().is_empty() && !version.trim().is_empty() => {
                Ok(Self::new(name.trim(), version.trim()))
            }
            _ => Err(format!("invalid platform '{}', expected name:version", s)),
        }
    }
}

/// An installed platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Platform {
    pub id: PlatformId,
    pub display_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub home: Option<PathBuf>,
}

impl Platform {
    pub fn new(id: PlatformId, display_name: impl Into<String>) -> Self {
        Self {
            id,
            display_name: display_name.into(),
            home: None,
        }
    }

    pub fn with_home(mut self, home: impl Into<PathBuf>) -> Self {
        self.home = Some(home.into());
        self
    }
}

/// The set of installed platforms.
#[derive(Debug)]
pub struct PlatformRegistry {
    installed: Arc<MutableProperty<Vec<Platform>>>,
}

impl PlatformRegistry {
    pub fn new() -> Self {
        Self::with_platforms(Vec::new())
    }

    pub fn with_platforms(platforms: Vec<Platform>) -> Self {
        Self {
            installed: Arc::new(MutableProperty::new(platforms)),
        }
    }

    /// JDK platforms every installation is assumed to know about.
    pub fn with_defaults() -> Self {
        Self::with_platforms(
            ["8", "11", "17", "21"]
                .into_iter()
                .map(|version| {
                    Platform::new(PlatformId::new("j2se", version), format!("Java {}", version))
                })
                .collect(),
        )
    }

    /// Add `platform`, replacing an installed platform with the same id.
    pub fn install(&self, platform: Platform) {
        tracing::debug!(platform = %platform.id, "platform installed");
        self.installed.update(|current| {
            let mut next: Vec<Platform> = current
                .iter()
                .filter(|p| p.id != platform.id)
                .cloned()
                .collect();
            next.push(platform.clone());
            next
        });
    }

    pub fn remove(&self, id: &PlatformId) -> bool {
        let present = self.installed.snapshot().iter().any(|p| &p.id == id);
        if present {
            tracing::debug!(platform = %id, "platform removed");
            self.installed
                .update(|current| current.iter().filter(|p| &p.id != id).cloned().collect());
        }
        present
    }

    pub fn platforms(&self) -> Vec<Platform> {
        self.installed.get_value()
    }

    pub fn find(&self, id: &PlatformId) -> Option<Platform> {
        resolve(&self.installed.snapshot(), id)
    }

    /// Observable list of installed platforms.
    pub fn source(&self) -> Arc<dyn PropertySource<Vec<Platform>>> {
        self.installed.clone()
    }
}

impl Default for PlatformRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Exact match first; otherwise the newest installed platform of the same kind.
fn resolve(platforms: &[Platform], id: &PlatformId) -> Option<Platform> {
    if let Some(exact) = platforms.iter().find(|p| &p.id == id) {
        return Some(exact.clone());
    }
    platforms
        .iter()
        .filter(|p| p.id.name == id.name)
        .max_by(|a, b| compare_versions(&a.id.version, &b.id.version))
        .cloned()
}

fn compare_versions(a: &str, b: &str) -> Ordering {
    let parts = |v: &str| -> Vec<u64> {
        v.split(|c: char| c == '.' || c == '_' || c == '-')
            .map(|part| part.parse().unwrap_or(0))
            .collect()
    };
    parts(a).cmp(&parts(b))
}

/// `{ name = "...", version = "..." }`
#[derive(Debug, Clone, Copy, Default)]
pub struct PlatformIdEncoding;

impl PropertyKeyEncodingDef<PlatformId> for PlatformIdEncoding {
    fn decode(&self, config: &ConfigTree) -> Option<PlatformId> {
        let name = config.child_tree("name");
        let version = config.child_tree("version");
        Some(PlatformId::new(name.value()?.trim(), version.value()?.trim()))
    }

    fn encode(&self, value: &PlatformId) -> ConfigTree {
        let mut builder = ConfigTreeBuilder::new();
        builder.add_child("name").set_value(value.name.clone());
        builder.add_child("version").set_value(value.version.clone());
        builder.build()
    }
}

/// Resolves stored platform ids against a [`PlatformRegistry`].
#[derive(Debug, Clone)]
pub struct PlatformValueDef {
    registry: Arc<PlatformRegistry>,
}

impl PlatformValueDef {
    pub fn new(registry: Arc<PlatformRegistry>) -> Self {
        Self { registry }
    }
}

impl PropertyValueDef<PlatformId, Platform> for PlatformValueDef {
    fn property(&self, key: Option<PlatformId>) -> Arc<dyn PropertySource<Option<Platform>>> {
        match key {
            None => const_source(None),
            Some(id) => convert(self.registry.source(), move |platforms| resolve(&platforms, &id)),
        }
    }

    fn key_from_value(&self, value: &Platform) -> Option<PlatformId> {
        Some(value.id.clone())
    }
}
