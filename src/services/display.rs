//! Project names as shown to the user.

use std::path::{Component, Path};
use std::sync::{Arc, OnceLock};

use regex_lite::{Captures, Regex};

use super::models::ProjectModelManager;
use crate::model::ProjectModel;
use crate::property::{ChangeListener, ListenerRef, PropertySource};

/// Pattern used when no level sets one.
const DEFAULT_PATTERN: &str = "${project.name}";

fn placeholder() -> &'static Regex {
    static PLACEHOLDER: OnceLock<Regex> = OnceLock::new();
    PLACEHOLDER.get_or_init(|| {
        Regex::new(r"\$\{([A-Za-z][A-Za-z0-9_.]*)\}").expect("placeholder pattern is valid")
    })
}

/// Build-tool path of the project, `:` for the root project.
fn project_path(model: &ProjectModel) -> String {
    let relative = model
        .project_dir
        .strip_prefix(&model.root_dir)
        .unwrap_or(Path::new(""));
    let segments: Vec<String> = relative
        .components()
        .filter_map(|component| match component {
            Component::Normal(segment) => Some(segment.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();
    format!(":{}", segments.join(":"))
}

/// Replace `${project.*}` placeholders; unknown placeholders are kept.
pub fn substitute(pattern: &str, model: &ProjectModel) -> String {
    placeholder()
        .replace_all(pattern, |caps: &Captures<'_>| match &caps[1] {
            "project.name" => model.name.clone(),
            "project.path" => project_path(model),
            "project.version" => model.version.clone().unwrap_or_default(),
            "project.group" => model.group.clone().unwrap_or_default(),
            _ => caps[0].to_string(),
        })
        .into_owned()
}

/// Display name computed from the name pattern and the current model.
pub struct ProjectDisplayInfo {
    models: Arc<ProjectModelManager>,
    pattern: Arc<dyn PropertySource<Option<String>>>,
}

impl ProjectDisplayInfo {
    pub fn new(
        models: Arc<ProjectModelManager>,
        pattern: Arc<dyn PropertySource<Option<String>>>,
    ) -> Self {
        Self { models, pattern }
    }

    pub fn display_name(&self) -> String {
        let pattern = self
            .pattern
            .get_value()
            .filter(|pattern| !pattern.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_PATTERN.to_string());
        let name = substitute(&pattern, &self.models.current_model());
        if name.trim().is_empty() {
            self.models.current_model().name
        } else {
            name
        }
    }
}

impl PropertySource<String> for ProjectDisplayInfo {
    fn get_value(&self) -> String {
        self.display_name()
    }

    /// Notified when either the pattern or the model changes.
    fn add_change_listener(&self, listener: ChangeListener) -> ListenerRef {
        let pattern = self.pattern.add_change_listener(Arc::clone(&listener));
        let model = self.models.model_source().add_change_listener(listener);
        ListenerRef::new(move || {
            pattern.unregister();
            model.unregister();
        })
    }
}

/// Basic project identity.
pub struct ProjectInformation {
    name: String,
    display_info: OnceLock<Arc<ProjectDisplayInfo>>,
}

impl ProjectInformation {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            display_info: OnceLock::new(),
        }
    }

    /// Connect the display name once it can be computed.
    ///
    /// Only the first binding takes effect. Returns whether this one did.
    pub(crate) fn bind_display_info(&self, display_info: Arc<ProjectDisplayInfo>) -> bool {
        if self.display_info.set(display_info).is_err() {
            tracing::warn!(project = %self.name, "display info already bound, keeping the first");
            return false;
        }
        true
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn display_name(&self) -> String {
        self.display_info
            .get()
            .map(|info| info.display_name())
            .unwrap_or_else(|| self.name.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::property::MutableProperty;
    use crate::services::ProjectIssueManager;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn model(project: &str, root: &str) -> ProjectModel {
        ProjectModel {
            project_dir: PathBuf::from(project),
            root_dir: PathBuf::from(root),
            settings_file: None,
            name: PathBuf::from(project)
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            group: Some("org.example".to_string()),
            version: Some("1.2".to_string()),
            tasks: Vec::new(),
        }
    }

    #[test]
    fn test_substitute() {
        let m = model("/work/root/libs/core", "/work/root");
        assert_eq!(
            substitute("${project.name} ${project.version} (${project.path})", &m),
            "core 1.2 (:libs:core)"
        );
        assert_eq!(substitute("${project.group}:${unknown}", &m), "org.example:${unknown}");
        assert_eq!(project_path(&model("/work/root", "/work/root")), ":");
    }

    #[test]
    fn test_display_info_follows_pattern_and_model() {
        let models = Arc::new(ProjectModelManager::new(
            model("/work/root/app", "/work/root"),
            Arc::new(ProjectIssueManager::new()),
        ));
        let pattern = Arc::new(MutableProperty::new(None::<String>));
        let info = Arc::new(ProjectDisplayInfo::new(Arc::clone(&models), pattern.clone()));

        let changes = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&changes);
        let registration = info.add_change_listener(Arc::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        assert_eq!(info.display_name(), "app");
        pattern.set_value(Some("${project.name} [${project.version}]".to_string()));
        assert_eq!(info.display_name(), "app [1.2]");

        let mut next = model("/work/root/app", "/work/root");
        next.version = Some("2.0".to_string());
        models.update_model(next);
        assert_eq!(info.get_value(), "app [2.0]");
        assert_eq!(changes.load(Ordering::SeqCst), 2);

        registration.unregister();
        pattern.set_value(None);
        assert_eq!(changes.load(Ordering::SeqCst), 2);

        let information = ProjectInformation::new("app");
        assert_eq!(information.display_name(), "app");
        assert!(information.bind_display_info(Arc::clone(&info)));
        assert_eq!(information.display_name(), "app");

        let other = Arc::new(ProjectDisplayInfo::new(
            Arc::clone(&models),
            Arc::new(MutableProperty::new(Some("other".to_string()))),
        ));
        assert!(!information.bind_display_info(other));
        assert_eq!(information.display_name(), "app");
    }
}
