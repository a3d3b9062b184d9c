//! Build model of a project
//!
//! The model is produced by the host's build tool integration through a
//! [`ModelLoader`]. Until it arrives, projects work with
//! [`ProjectModel::empty`], derived from the directory layout alone.

use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// File names marking the root of a multi-project build.
pub const SETTINGS_FILE_NAMES: [&str; 2] = ["settings.gradle", "settings.gradle.kts"];

/// Find the settings file governing `project_dir`.
///
/// Looks in `project_dir` and then in each ancestor; the nearest match wins.
pub fn find_settings_file(project_dir: &Path) -> Option<PathBuf> {
    project_dir.ancestors().find_map(|dir| {
        SETTINGS_FILE_NAMES
            .iter()
            .map(|name| dir.join(name))
            .find(|candidate| candidate.is_file())
    })
}

/// Directory holding the settings file of `project_dir`, or the project
/// directory itself when there is none.
pub fn settings_dir(project_dir: &Path) -> PathBuf {
    find_settings_file(project_dir)
        .and_then(|file| file.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| project_dir.to_path_buf())
}

/// What the build tool reported about a project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectModel {
    pub project_dir: PathBuf,
    pub root_dir: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub settings_file: Option<PathBuf>,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default)]
    pub tasks: Vec<String>,
}

impl ProjectModel {
    /// Placeholder model derived from the file layout.
    pub fn empty(project_dir: impl Into<PathBuf>) -> Self {
        let project_dir = project_dir.into();
        let settings_file = find_settings_file(&project_dir);
        let root_dir = settings_file
            .as_deref()
            .and_then(Path::parent)
            .map(Path::to_path_buf)
            .unwrap_or_else(|| project_dir.clone());
        let name = project_dir
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        Self {
            project_dir,
            root_dir,
            settings_file,
            name,
            group: None,
            version: None,
            tasks: Vec::new(),
        }
    }

    pub fn is_root_project(&self) -> bool {
        self.project_dir == self.root_dir
    }

    /// Directory of the settings file, or the root directory.
    pub fn settings_dir(&self) -> &Path {
        self.settings_file
            .as_deref()
            .and_then(Path::parent)
            .unwrap_or(&self.root_dir)
    }
}

/// Model loading errors
#[derive(Debug, thiserror::Error)]
pub enum ModelLoadError {
    #[error("Project directory not found: {}", .0.display())]
    MissingDirectory(PathBuf),

    #[error("Build tool failed: {0}")]
    Failed(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Loads the build model of a project directory.
pub trait ModelLoader: Send + Sync {
    fn load(&self, project_dir: &Path) -> Result<ProjectModel, ModelLoadError>;
}

/// Loader that only inspects the file layout.
#[derive(Debug, Clone, Copy, Default)]
pub struct LayoutModelLoader;

impl ModelLoader for LayoutModelLoader {
    fn load(&self, project_dir: &Path) -> Result<ProjectModel, ModelLoadError> {
        if !project_dir.is_dir() {
            return Err(ModelLoadError::MissingDirectory(project_dir.to_path_buf()));
        }
        Ok(ProjectModel::empty(project_dir))
    }
}

/// A failed model load, kept for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelLoadIssue {
    pub message: String,
    pub project_dir: PathBuf,
    pub timestamp: DateTime<Utc>,
}

impl ModelLoadIssue {
    pub fn new(project_dir: impl Into<PathBuf>, error: &ModelLoadError) -> Self {
        Self {
            message: error.to_string(),
            project_dir: project_dir.into(),
            timestamp: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_find_settings_file_in_ancestor() {
        let root = TempDir::new().unwrap();
        let sub = root.path().join("lib").join("core");
        fs::create_dir_all(&sub).unwrap();
        fs::write(root.path().join("settings.gradle.kts"), "").unwrap();

        assert_eq!(
            find_settings_file(&sub),
            Some(root.path().join("settings.gradle.kts"))
        );
        assert_eq!(settings_dir(&sub), root.path());
    }

    #[test]
    fn test_settings_dir_defaults_to_project() {
        let root = TempDir::new().unwrap();
        // A temp dir may itself sit below a settings file; only check the
        // fallback when none exists anywhere above.
        if find_settings_file(root.path()).is_none() {
            assert_eq!(settings_dir(root.path()), root.path());
        }
    }

    #[test]
    fn test_empty_model() {
        let root = TempDir::new().unwrap();
        let project = root.path().join("app");
        fs::create_dir_all(&project).unwrap();
        fs::write(root.path().join("settings.gradle"), "").unwrap();

        let model = ProjectModel::empty(&project);
        assert_eq!(model.name, "app");
        assert_eq!(model.root_dir, root.path());
        assert!(!model.is_root_project());
        assert_eq!(model.settings_dir(), root.path());
    }

    #[test]
    fn test_layout_loader_rejects_missing_dir() {
        let root = TempDir::new().unwrap();
        let missing = root.path().join("missing");
        let err = LayoutModelLoader.load(&missing).unwrap_err();
        assert!(matches!(err, ModelLoadError::MissingDirectory(_)));

        let issue = ModelLoadIssue::new(&missing, &err);
        assert!(issue.message.contains("not found"));
    }
}
