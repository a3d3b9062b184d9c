//! Editing project settings.

use std::path::PathBuf;
use std::sync::Arc;

use super::ProjectState;
use crate::config::{ConfigError, ConfigProvider, LevelOrigin};
use crate::properties::CommonProperty;
use crate::property::PropertyError;

/// Customizer errors
#[derive(Debug, thiserror::Error)]
pub enum CustomizerError {
    #[error(transparent)]
    Property(#[from] PropertyError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Applies edits to the project level and saves them.
pub struct ProjectCustomizer {
    provider: Arc<ConfigProvider>,
    state: Arc<dyn ProjectState>,
}

impl ProjectCustomizer {
    pub fn new(provider: Arc<ConfigProvider>, state: Arc<dyn ProjectState>) -> Self {
        Self { provider, state }
    }

    /// Store each `(property, text)` pair on the project level, then save.
    ///
    /// `None` clears the project's own value. Nothing is saved if an edit
    /// is rejected; edits before it stay applied in memory.
    pub fn apply<'a, I>(&self, edits: I) -> Result<PathBuf, CustomizerError>
    where
        I: IntoIterator<Item = (CommonProperty, Option<&'a str>)>,
    {
        let properties = self.provider.common_properties();
        for (property, text) in edits {
            properties.store_text(LevelOrigin::Project, property, text)?;
        }
        self.save()
    }

    /// Save the project level as it is.
    pub fn save(&self) -> Result<PathBuf, CustomizerError> {
        let path = self.provider.save_project_settings()?;
        self.state.mark_modified();
        Ok(path)
    }
}
