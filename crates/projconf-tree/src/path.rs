//! Addressing nodes inside a settings tree.

use std::fmt;

/// A sequence of child keys leading from a root node to a descendant.
///
/// The empty path addresses the root itself.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConfigPath {
    keys: Vec<String>,
}

impl ConfigPath {
    /// The path addressing the root node.
    pub const ROOT: ConfigPath = ConfigPath { keys: Vec::new() };

    /// Create a path from its keys.
    pub fn new<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            keys: keys.into_iter().map(Into::into).collect(),
        }
    }

    /// Parse a dot-separated path (`"a.b.c"`). Empty segments are skipped.
    pub fn parse(path: &str) -> Self {
        Self::new(path.split('.').filter(|key| !key.is_empty()))
    }

    /// Path to a child of the node addressed by this path.
    pub fn child(&self, key: impl Into<String>) -> Self {
        let mut keys = self.keys.clone();
        keys.push(key.into());
        Self { keys }
    }

    /// Path of the parent node, or `None` for the root path.
    pub fn parent(&self) -> Option<Self> {
        let (_, parent) = self.keys.split_last()?;
        Some(Self {
            keys: parent.to_vec(),
        })
    }

    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    pub fn is_root(&self) -> bool {
        self.keys.is_empty()
    }
}

impl fmt::Display for ConfigPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.keys.join("."))
    }
}

impl From<&str> for ConfigPath {
    fn from(path: &str) -> Self {
        Self::parse(path)
    }
}
