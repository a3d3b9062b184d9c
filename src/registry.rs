//! Per-project service registry
//!
//! [`ServiceObjects`] builds every project service exactly once, in a fixed
//! order:
//! 1. configuration provider and common properties
//! 2. per-concern services, each given only services built before it
//! 3. aggregates depending on several per-concern services
//!
//! [`ServiceRegistry`] publishes the finished aggregate with a single
//! compare-and-swap. Nothing is published when construction fails, so a
//! later attempt may succeed.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwapOption;

use crate::config::{ConfigError, ConfigProvider, ProjectLocations};
use crate::error::ProjectError;
use crate::lookup::Lookup;
use crate::model::{self, LayoutModelLoader, ModelLoader, ProjectModel};
use crate::platform::PlatformRegistry;
use crate::properties::CommonProperties;
use crate::services::{
    AuxiliaryConfiguration, BuildPlatformProperty, CommandSink, DefaultProjectSettingsProvider,
    DetachedProjectState, MergedCommandQuery, PathSharabilityQuery, ProjectActionProvider,
    ProjectCommandExecutor, ProjectCustomizer, ProjectDisplayInfo, ProjectInformation,
    ProjectInitListener, ProjectIssueManager, ProjectModelManager, ProjectModelUpdater,
    ProjectSourceEncodingQuery, ProjectState, RecordingCommandSink, ScriptPlatformProperty,
    SettingsFileManager, SourceEncodingProperty, SourceLevelProperty, TemplateAttributeProvider,
};

/// What the host provides to every project it opens.
#[derive(Clone)]
pub struct HostContext {
    pub state: Arc<dyn ProjectState>,
    pub model_loader: Arc<dyn ModelLoader>,
    pub command_sink: Arc<dyn CommandSink>,
    pub platforms: Arc<PlatformRegistry>,
    /// Global defaults file; `None` disables the global level.
    pub global_settings: Option<PathBuf>,
    /// Notified after the built-in services on initialization.
    pub init_listeners: Vec<Arc<dyn ProjectInitListener>>,
}

impl HostContext {
    /// A host that loads models from the file layout and records commands.
    pub fn detached() -> Self {
        Self {
            state: Arc::new(DetachedProjectState::new()),
            model_loader: Arc::new(LayoutModelLoader),
            command_sink: Arc::new(RecordingCommandSink::new()),
            platforms: Arc::new(PlatformRegistry::with_defaults()),
            global_settings: ProjectLocations::default_global_file(),
            init_listeners: Vec::new(),
        }
    }

    pub fn with_global_settings(mut self, global_settings: Option<PathBuf>) -> Self {
        self.global_settings = global_settings;
        self
    }

    pub fn with_state(mut self, state: Arc<dyn ProjectState>) -> Self {
        self.state = state;
        self
    }

    pub fn with_model_loader(mut self, model_loader: Arc<dyn ModelLoader>) -> Self {
        self.model_loader = model_loader;
        self
    }

    pub fn with_command_sink(mut self, command_sink: Arc<dyn CommandSink>) -> Self {
        self.command_sink = command_sink;
        self
    }

    pub fn with_platforms(mut self, platforms: Arc<PlatformRegistry>) -> Self {
        self.platforms = platforms;
        self
    }

    pub fn with_init_listener(mut self, listener: Arc<dyn ProjectInitListener>) -> Self {
        self.init_listeners.push(listener);
        self
    }
}

impl fmt::Debug for HostContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostContext")
            .field("global_settings", &self.global_settings)
            .field("init_listeners", &self.init_listeners.len())
            .finish_non_exhaustive()
    }
}

/// Every service of one project, constructed once.
pub struct ServiceObjects {
    pub project_dir: PathBuf,
    pub config_provider: Arc<ConfigProvider>,
    pub common_properties: CommonProperties,
    pub state: Arc<dyn ProjectState>,
    pub auxiliary: Arc<AuxiliaryConfiguration>,
    pub information: Arc<ProjectInformation>,
    pub issue_manager: Arc<ProjectIssueManager>,
    pub command_executor: Arc<ProjectCommandExecutor>,
    pub action_provider: Arc<ProjectActionProvider>,
    pub sharability: Arc<PathSharabilityQuery>,
    pub source_encoding: Arc<ProjectSourceEncodingQuery>,
    pub customizer: Arc<ProjectCustomizer>,
    pub template_attributes: Arc<TemplateAttributeProvider>,
    pub settings_provider: Arc<DefaultProjectSettingsProvider>,
    pub merged_command_query: Arc<MergedCommandQuery>,
    pub model_manager: Arc<ProjectModelManager>,
    pub model_updater: Arc<ProjectModelUpdater>,
    pub settings_file_manager: Arc<SettingsFileManager>,
    pub display_info: Arc<ProjectDisplayInfo>,
    pub services: Lookup,
}

impl ServiceObjects {
    /// Build every service for `project_dir`.
    pub fn build(project_dir: &Path, host: &HostContext) -> Result<Self, ConfigError> {
        let project_dir = project_dir.to_path_buf();
        let name = project_dir
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| project_dir.display().to_string());

        let locations = ProjectLocations::new(
            &project_dir,
            model::settings_dir(&project_dir),
            host.global_settings.clone(),
        );
        let config_provider = Arc::new(ConfigProvider::load(locations, Arc::clone(&host.platforms))?);
        let common_properties = config_provider.common_properties().clone();

        let auxiliary = Arc::new(AuxiliaryConfiguration::new(
            common_properties.auxiliary().clone(),
        ));
        let state = Arc::clone(&host.state);
        let information = Arc::new(ProjectInformation::new(name.clone()));
        let issue_manager = Arc::new(ProjectIssueManager::new());
        let command_executor = Arc::new(ProjectCommandExecutor::new(
            project_dir.clone(),
            common_properties.clone(),
            Arc::clone(&host.command_sink),
        ));
        let action_provider = Arc::new(ProjectActionProvider::new(Arc::clone(&command_executor)));
        let sharability = Arc::new(PathSharabilityQuery::new(
            project_dir.clone(),
            common_properties.excluded_paths().clone(),
        ));
        let source_encoding = Arc::new(ProjectSourceEncodingQuery::new(
            project_dir.clone(),
            common_properties.source_encoding().clone(),
        ));
        let customizer = Arc::new(ProjectCustomizer::new(
            Arc::clone(&config_provider),
            Arc::clone(&state),
        ));
        let template_attributes = Arc::new(TemplateAttributeProvider::new(
            name,
            common_properties.clone(),
        ));
        let settings_provider = Arc::new(DefaultProjectSettingsProvider::new(
            project_dir.clone(),
            Arc::clone(config_provider.chain()),
        ));

        let build_platform = Arc::new(BuildPlatformProperty::new(
            common_properties.target_platform().active_source(),
        ));
        let script_platform = Arc::new(ScriptPlatformProperty::new(
            common_properties.script_platform().active_source(),
        ));
        let source_encoding_property = Arc::new(SourceEncodingProperty::new(
            common_properties.source_encoding().active_source(),
        ));
        let source_level_property = Arc::new(SourceLevelProperty::new(
            common_properties.source_level().active_source(),
        ));

        let merged_command_query = Arc::new(MergedCommandQuery::new(
            Arc::clone(&action_provider),
            common_properties.custom_tasks().clone(),
        ));
        let model_manager = Arc::new(ProjectModelManager::new(
            ProjectModel::empty(&project_dir),
            Arc::clone(&issue_manager),
        ));
        let model_updater = Arc::new(ProjectModelUpdater::new(
            project_dir.clone(),
            Arc::clone(&host.model_loader),
            Arc::clone(&model_manager),
        ));
        let settings_file_manager = Arc::new(SettingsFileManager::new(
            project_dir.clone(),
            Arc::clone(&model_manager),
        ));
        let display_info = Arc::new(ProjectDisplayInfo::new(
            Arc::clone(&model_manager),
            common_properties.display_name_pattern().active_source(),
        ));
        information.bind_display_info(Arc::clone(&display_info));

        let mut lookup = Lookup::builder();
        lookup
            .add(Arc::clone(&config_provider))
            .add(Arc::new(common_properties.clone()))
            .add(Arc::clone(&state))
            .add(Arc::clone(&auxiliary))
            .add(Arc::clone(&information))
            .add(Arc::clone(&issue_manager))
            .add(Arc::clone(&command_executor))
            .add(Arc::clone(&action_provider))
            .add(Arc::clone(&sharability))
            .add(Arc::clone(&source_encoding))
            .add(Arc::clone(&customizer))
            .add(Arc::clone(&template_attributes))
            .add(Arc::clone(&settings_provider))
            .add(build_platform)
            .add(script_platform)
            .add(source_encoding_property)
            .add(source_level_property)
            .add(Arc::clone(&merged_command_query))
            .add(Arc::clone(&model_manager))
            .add(Arc::clone(&model_updater))
            .add(Arc::clone(&settings_file_manager))
            .add(Arc::clone(&settings_file_manager) as Arc<dyn ProjectInitListener>)
            .add(Arc::clone(&display_info));
        for listener in &host.init_listeners {
            lookup.add(Arc::clone(listener));
        }

        tracing::debug!(
            project = %project_dir.display(),
            services = lookup.len(),
            "project services built"
        );

        Ok(Self {
            project_dir,
            config_provider,
            common_properties,
            state,
            auxiliary,
            information,
            issue_manager,
            command_executor,
            action_provider,
            sharability,
            source_encoding,
            customizer,
            template_attributes,
            settings_provider,
            merged_command_query,
            model_manager,
            model_updater,
            settings_file_manager,
            display_info,
            services: lookup.build(),
        })
    }

    /// Notify every registered init listener, in registration order.
    pub fn notify_init_listeners(&self) {
        for listener in self.services.lookup_all::<dyn ProjectInitListener>() {
            listener.on_init_project();
        }
    }
}

impl fmt::Debug for ServiceObjects {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceObjects")
            .field("project_dir", &self.project_dir)
            .field("services", &self.services)
            .finish_non_exhaustive()
    }
}

/// Lifecycle of a project's services.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryState {
    Uninitialized,
    Initializing,
    Ready,
}

struct InitializingGuard<'a>(&'a AtomicUsize);

impl Drop for InitializingGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Single-shot holder of a project's [`ServiceObjects`].
pub struct ServiceRegistry {
    project_dir: PathBuf,
    services: ArcSwapOption<ServiceObjects>,
    initializing: AtomicUsize,
}

impl ServiceRegistry {
    pub fn new(project_dir: impl Into<PathBuf>) -> Self {
        Self {
            project_dir: project_dir.into(),
            services: ArcSwapOption::empty(),
            initializing: AtomicUsize::new(0),
        }
    }

    pub fn state(&self) -> RegistryState {
        if self.services.load().is_some() {
            RegistryState::Ready
        } else if self.initializing.load(Ordering::SeqCst) > 0 {
            RegistryState::Initializing
        } else {
            RegistryState::Uninitialized
        }
    }

    /// Build and publish the services, then notify init listeners.
    ///
    /// Fails with [`ProjectError::AlreadyInitialized`] when services were
    /// already published; the published services are left untouched.
    pub fn initialize(&self, host: &HostContext) -> Result<Arc<ServiceObjects>, ProjectError> {
        if self.services.load().is_some() {
            return Err(ProjectError::AlreadyInitialized(self.project_dir.clone()));
        }

        let built = {
            self.initializing.fetch_add(1, Ordering::SeqCst);
            let _guard = InitializingGuard(&self.initializing);
            Arc::new(ServiceObjects::build(&self.project_dir, host)?)
        };

        let empty: Option<Arc<ServiceObjects>> = None;
        let previous = self
            .services
            .compare_and_swap(&empty, Some(Arc::clone(&built)));
        if previous.is_some() {
            tracing::warn!(project = %self.project_dir.display(), "concurrent initialization lost");
            return Err(ProjectError::AlreadyInitialized(self.project_dir.clone()));
        }

        tracing::info!(project = %self.project_dir.display(), "project services ready");
        built.notify_init_listeners();
        Ok(built)
    }

    /// The published services.
    pub fn get(&self) -> Result<Arc<ServiceObjects>, ProjectError> {
        self.services
            .load_full()
            .ok_or_else(|| ProjectError::NotInitialized(self.project_dir.clone()))
    }
}

impl fmt::Debug for ServiceRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceRegistry")
            .field("project_dir", &self.project_dir)
            .field("state", &self.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::sync::Mutex;
    use tempfile::TempDir;

    struct OrderProbe {
        label: &'static str,
        log: Arc<Mutex<Vec<&'static str>>>,
    }

    impl ProjectInitListener for OrderProbe {
        fn on_init_project(&self) {
            self.log.lock().unwrap().push(self.label);
        }
    }

    fn host() -> HostContext {
        HostContext::detached().with_global_settings(None)
    }

    #[test]
    fn test_initialize_publishes_once() {
        let dir = TempDir::new().unwrap();
        let registry = ServiceRegistry::new(dir.path());

        assert_eq!(registry.state(), RegistryState::Uninitialized);
        assert!(registry.get().unwrap_err().is_not_initialized());

        let first = registry.initialize(&host()).unwrap();
        assert_eq!(registry.state(), RegistryState::Ready);

        let second = registry.initialize(&host());
        assert!(second.unwrap_err().is_already_initialized());
        assert!(Arc::ptr_eq(&first, &registry.get().unwrap()));
    }

    #[test]
    fn test_failed_build_allows_retry() {
        let dir = TempDir::new().unwrap();
        let settings = dir.path().join(crate::config::SETTINGS_FILE_NAME);
        fs::write(&settings, "source_level = [").unwrap();

        let registry = ServiceRegistry::new(dir.path());
        let err = registry.initialize(&host()).unwrap_err();
        assert!(matches!(err, ProjectError::Config(_)));
        assert_eq!(registry.state(), RegistryState::Uninitialized);

        fs::write(&settings, "source_level = \"11\"").unwrap();
        assert!(registry.initialize(&host()).is_ok());
    }

    #[test]
    fn test_init_listeners_in_registration_order() {
        let dir = TempDir::new().unwrap();
        let log = Arc::new(Mutex::new(Vec::new()));
        let host = host()
            .with_init_listener(Arc::new(OrderProbe {
                label: "first",
                log: Arc::clone(&log),
            }))
            .with_init_listener(Arc::new(OrderProbe {
                label: "second",
                log: Arc::clone(&log),
            }));

        let registry = ServiceRegistry::new(dir.path());
        let services = registry.initialize(&host).unwrap();
        assert_eq!(*log.lock().unwrap(), vec!["first", "second"]);
        // Settings file manager comes first and was notified too.
        assert_eq!(services.services.lookup_all::<dyn ProjectInitListener>().len(), 3);
    }

    #[test]
    fn test_lookup_exposes_services() {
        let dir = TempDir::new().unwrap();
        let registry = ServiceRegistry::new(dir.path());
        let services = registry.initialize(&host()).unwrap();

        let lookup = &services.services;
        assert!(lookup.lookup::<ConfigProvider>().is_some());
        assert!(lookup.lookup::<dyn ProjectState>().is_some());
        assert!(lookup.lookup::<MergedCommandQuery>().is_some());
        assert!(Arc::ptr_eq(
            &lookup.lookup::<ProjectModelManager>().unwrap(),
            &services.model_manager
        ));
        assert_eq!(
            lookup.lookup::<SourceEncodingProperty>().unwrap().value(),
            Some("UTF-8".to_string())
        );
        assert_eq!(lookup.lookup_all::<ProjectCustomizer>().len(), 1);
    }

    #[test]
    fn test_later_services_see_earlier_ones() {
        let dir = TempDir::new().unwrap();
        let registry = ServiceRegistry::new(dir.path());
        let services = registry.initialize(&host()).unwrap();

        let name = services.information.name().to_string();
        assert_eq!(services.information.display_name(), name);
        assert_eq!(services.display_info.display_name(), name);
        assert!(services
            .merged_command_query
            .commands()
            .iter()
            .any(|command| command.name == "build"));
    }

    #[test]
    fn test_concurrent_initialize_single_winner() {
        let dir = TempDir::new().unwrap();
        let registry = Arc::new(ServiceRegistry::new(dir.path()));
        let host = host();

        let results: Vec<bool> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..4)
                .map(|_| {
                    let registry = Arc::clone(&registry);
                    let host = host.clone();
                    scope.spawn(move || registry.initialize(&host).is_ok())
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert_eq!(results.iter().filter(|ok| **ok).count(), 1);
        assert_eq!(registry.state(), RegistryState::Ready);
    }
}
