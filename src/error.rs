//! Project-level errors

use std::path::PathBuf;

use crate::config::ConfigError;

/// Errors from opening and initializing a project
#[derive(Debug, thiserror::Error)]
pub enum ProjectError {
    #[error("Project directory is invalid: {}: {reason}", path.display())]
    DirectoryInvalid { path: PathBuf, reason: String },

    #[error("Already initialized: project services of {}", .0.display())]
    AlreadyInitialized(PathBuf),

    #[error("Services are not yet initialized: {}", .0.display())]
    NotInitialized(PathBuf),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl ProjectError {
    pub fn is_not_initialized(&self) -> bool {
        matches!(self, Self::NotInitialized(_))
    }

    pub fn is_already_initialized(&self) -> bool {
        matches!(self, Self::AlreadyInitialized(_))
    }
}
