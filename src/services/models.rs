//! Current project model, background model loading and the preferred
//! settings file.

use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Condvar, Mutex, Weak};
use std::thread;
use std::time::Duration;

use super::issues::ProjectIssueManager;
use super::ProjectInitListener;
use crate::model::{find_settings_file, ModelLoadError, ModelLoadIssue, ModelLoader, ProjectModel};
use crate::property::{ListenerRef, MutableProperty, PropertySource};

/// Holds the latest model of the project.
#[derive(Debug)]
pub struct ProjectModelManager {
    current: Arc<MutableProperty<ProjectModel>>,
    issues: Arc<ProjectIssueManager>,
}

impl ProjectModelManager {
    pub fn new(initial: ProjectModel, issues: Arc<ProjectIssueManager>) -> Self {
        Self {
            current: Arc::new(MutableProperty::new(initial)),
            issues,
        }
    }

    pub fn current_model(&self) -> ProjectModel {
        self.current.get_value()
    }

    pub fn model_source(&self) -> Arc<dyn PropertySource<ProjectModel>> {
        self.current.clone()
    }

    /// Publish `model`. An identical model is not republished.
    pub fn update_model(&self, model: ProjectModel) {
        if *self.current.snapshot() == model {
            return;
        }
        tracing::debug!(project = %model.project_dir.display(), "model updated");
        self.current.set_value(model);
    }

    pub fn report_issue(&self, issue: ModelLoadIssue) {
        self.issues.report(issue);
    }
}

#[derive(Debug, Default)]
struct LoadProgress {
    requested: u64,
    completed: u64,
    running: bool,
}

struct UpdaterInner {
    project_dir: PathBuf,
    loader: Arc<dyn ModelLoader>,
    models: Arc<ProjectModelManager>,
    progress: Mutex<LoadProgress>,
    loaded: Condvar,
}

impl UpdaterInner {
    /// Load until no request is pending. Requests arriving during a load
    /// are served by one more load.
    fn run(&self) {
        loop {
            let target = {
                let mut progress = self.progress.lock().unwrap_or_else(|e| e.into_inner());
                if progress.completed >= progress.requested {
                    progress.running = false;
                    self.loaded.notify_all();
                    return;
                }
                progress.requested
            };

            // A panicking loader fails this load only.
            let loaded = panic::catch_unwind(AssertUnwindSafe(|| {
                self.loader.load(&self.project_dir)
            }))
            .unwrap_or_else(|_| {
                tracing::error!(project = %self.project_dir.display(), "model loader panicked");
                Err(ModelLoadError::Failed("model loader panicked".to_string()))
            });
            match loaded {
                Ok(model) => self.models.update_model(model),
                Err(e) => self
                    .models
                    .report_issue(ModelLoadIssue::new(&self.project_dir, &e)),
            }

            let mut progress = self.progress.lock().unwrap_or_else(|e| e.into_inner());
            progress.completed = target;
            self.loaded.notify_all();
        }
    }
}

/// Loads the model on a background thread on request.
pub struct ProjectModelUpdater {
    inner: Arc<UpdaterInner>,
}

impl ProjectModelUpdater {
    pub fn new(
        project_dir: PathBuf,
        loader: Arc<dyn ModelLoader>,
        models: Arc<ProjectModelManager>,
    ) -> Self {
        Self {
            inner: Arc::new(UpdaterInner {
                project_dir,
                loader,
                models,
                progress: Mutex::new(LoadProgress::default()),
                loaded: Condvar::new(),
            }),
        }
    }

    /// Request a load unless one was ever requested.
    pub fn ensure_load_requested(&self) {
        let requested = self
            .inner
            .progress
            .lock()
            .map(|progress| progress.requested > 0)
            .unwrap_or(true);
        if !requested {
            self.reload_project();
        }
    }

    /// Request a fresh load.
    pub fn reload_project(&self) {
        let start = {
            let mut progress = self.inner.progress.lock().unwrap_or_else(|e| e.into_inner());
            progress.requested += 1;
            if progress.running {
                false
            } else {
                progress.running = true;
                true
            }
        };
        if !start {
            return;
        }

        let inner = Arc::clone(&self.inner);
        let spawned = thread::Builder::new()
            .name("projconf-model-load".to_string())
            .spawn(move || inner.run());
        if let Err(e) = spawned {
            tracing::warn!(error = %e, "cannot start model loader thread, loading inline");
            self.inner.run();
        }
    }

    /// Wait until every load requested so far has finished.
    ///
    /// Requests a load first if none was requested. Returns `false` on
    /// timeout.
    pub fn try_wait_for_loaded_project(&self, timeout: Duration) -> bool {
        self.ensure_load_requested();

        let progress = self.inner.progress.lock().unwrap_or_else(|e| e.into_inner());
        let target = progress.requested;
        let (progress, _) = self
            .inner
            .loaded
            .wait_timeout_while(progress, timeout, |progress| progress.completed < target)
            .unwrap_or_else(|e| e.into_inner());
        progress.completed >= target
    }

    pub fn is_loading(&self) -> bool {
        self.inner
            .progress
            .lock()
            .map(|progress| progress.running)
            .unwrap_or(false)
    }
}

struct SettingsFileState {
    project_dir: PathBuf,
    models: Arc<ProjectModelManager>,
    preferred: MutableProperty<Option<PathBuf>>,
}

impl SettingsFileState {
    fn update(&self) {
        let model = self.models.current_model();
        let preferred = model
            .settings_file
            .or_else(|| find_settings_file(&self.project_dir));
        if *self.preferred.snapshot() != preferred {
            tracing::debug!(
                project = %self.project_dir.display(),
                settings = ?preferred,
                "preferred settings file changed"
            );
            self.preferred.set_value(preferred);
        }
    }
}

/// Tracks which build settings file governs the project.
///
/// Follows the current model once the project is initialized.
pub struct SettingsFileManager {
    state: Arc<SettingsFileState>,
    registration: Mutex<Option<ListenerRef>>,
}

impl SettingsFileManager {
    pub fn new(project_dir: PathBuf, models: Arc<ProjectModelManager>) -> Self {
        Self {
            state: Arc::new(SettingsFileState {
                project_dir,
                models,
                preferred: MutableProperty::new(None),
            }),
            registration: Mutex::new(None),
        }
    }

    pub fn project_dir(&self) -> &Path {
        &self.state.project_dir
    }

    pub fn preferred_settings_file(&self) -> Option<PathBuf> {
        self.state.preferred.get_value()
    }

    pub fn update_settings_file(&self) {
        self.state.update();
    }

    /// Stop following model changes.
    pub fn close(&self) {
        if let Some(registration) = self.registration.lock().ok().and_then(|mut r| r.take()) {
            registration.unregister();
        }
    }
}

impl ProjectInitListener for SettingsFileManager {
    fn on_init_project(&self) {
        let mut registration = self.registration.lock().unwrap_or_else(|e| e.into_inner());
        if registration.is_some() {
            return;
        }
        let state: Weak<SettingsFileState> = Arc::downgrade(&self.state);
        *registration = Some(self.state.models.model_source().add_change_listener(Arc::new(
            move || {
                if let Some(state) = state.upgrade() {
                    state.update();
                }
            },
        )));
        drop(registration);
        self.state.update();
    }
}

impl Drop for SettingsFileManager {
    fn drop(&mut self) {
        self.close();
    }
}
