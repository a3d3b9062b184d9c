//! Project-scoped services
//!
//! Each service is built once per project by
//! [`ServiceObjects`](crate::registry::ServiceObjects) and registered into
//! the project's capability lookup. Services only receive dependencies
//! that were constructed before them.

mod actions;
mod auxiliary;
mod customizer;
mod display;
mod exposed;
mod issues;
mod models;
mod queries;

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

pub use actions::{
    CommandError, CommandRequest, CommandSink, CommandSpec, MergedCommandQuery,
    ProjectActionProvider, ProjectCommandExecutor, RecordingCommandSink, BUILTIN_COMMANDS,
};
pub use auxiliary::AuxiliaryConfiguration;
pub use customizer::{CustomizerError, ProjectCustomizer};
pub use display::{ProjectDisplayInfo, ProjectInformation};
pub use exposed::{
    BuildPlatformProperty, ScriptPlatformProperty, SourceEncodingProperty, SourceLevelProperty,
};
pub use issues::ProjectIssueManager;
pub use models::{ProjectModelManager, ProjectModelUpdater, SettingsFileManager};
pub use queries::{
    DefaultProjectSettingsProvider, PathSharabilityQuery, ProjectSourceEncodingQuery, Sharability,
    TemplateAttributeProvider,
};

/// Host-side state of an open project.
pub trait ProjectState: Send + Sync {
    /// The project's settings were changed and saved.
    fn mark_modified(&self);

    /// The project directory disappeared.
    fn notify_deleted(&self) {}
}

/// Called once after the project's services are published.
pub trait ProjectInitListener: Send + Sync {
    fn on_init_project(&self);
}

/// [`ProjectState`] for projects not owned by a host.
#[derive(Debug, Default)]
pub struct DetachedProjectState {
    modifications: AtomicUsize,
    deleted: AtomicBool,
}

impl DetachedProjectState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn modifications(&self) -> usize {
        self.modifications.load(Ordering::SeqCst)
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted.load(Ordering::SeqCst)
    }
}

impl ProjectState for DetachedProjectState {
    fn mark_modified(&self) {
        self.modifications.fetch_add(1, Ordering::SeqCst);
    }

    fn notify_deleted(&self) {
        self.deleted.store(true, Ordering::SeqCst);
    }
}
