//! Named settings fragments owned by other tools.

use projconf_tree::{ConfigPath, ConfigTree};

use crate::config::LevelOrigin;
use crate::property::{HierarchicalProperty, PropertyError};

/// Stores and reads named fragments under the `auxiliary` table.
///
/// Reads see the deep-merged fragment from every level; writes go to the
/// project level.
pub struct AuxiliaryConfiguration {
    auxiliary: HierarchicalProperty<ConfigTree, ConfigTree>,
}

impl AuxiliaryConfiguration {
    pub fn new(auxiliary: HierarchicalProperty<ConfigTree, ConfigTree>) -> Self {
        Self { auxiliary }
    }

    /// Effective fragment `name`.
    pub fn fragment(&self, name: &str) -> Option<ConfigTree> {
        let merged = self.auxiliary.value()?;
        merged
            .at_path(&ConfigPath::new([name]))
            .filter(|fragment| !fragment.is_empty())
            .cloned()
    }

    /// Names of all effective fragments.
    pub fn fragment_names(&self) -> Vec<String> {
        self.auxiliary
            .value()
            .map(|merged| merged.child_keys().map(str::to_string).collect())
            .unwrap_or_default()
    }

    /// Store `fragment` as `name` on the project level.
    pub fn put_fragment(&self, name: &str, fragment: ConfigTree) -> Result<(), PropertyError> {
        let local = self
            .auxiliary
            .local_value(LevelOrigin::Project)
            .unwrap_or_default();
        let updated = local.with_path(&ConfigPath::new([name]), fragment);
        self.store(updated)
    }

    /// Remove `name` from the project level. Returns `true` if it was there.
    pub fn remove_fragment(&self, name: &str) -> Result<bool, PropertyError> {
        let Some(local) = self.auxiliary.local_value(LevelOrigin::Project) else {
            return Ok(false);
        };
        let path = ConfigPath::new([name]);
        if local.at_path(&path).is_none() {
            return Ok(false);
        }
        self.store(local.with_path(&path, ConfigTree::empty()))?;
        Ok(true)
    }

    fn store(&self, local: ConfigTree) -> Result<(), PropertyError> {
        if local.is_empty() {
            self.auxiliary.set_at(LevelOrigin::Project, None)
        } else {
            self.auxiliary.set_at(LevelOrigin::Project, Some(&local))
        }
    }
}
