//! Project handles and the set of open projects.

use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, Weak};

use crate::config::{ConfigProvider, LevelOrigin};
use crate::error::ProjectError;
use crate::lookup::Lookup;
use crate::model::ProjectModel;
use crate::properties::CommonProperties;
use crate::registry::{HostContext, RegistryState, ServiceObjects, ServiceRegistry};
use crate::services::{
    AuxiliaryConfiguration, MergedCommandQuery, ProjectDisplayInfo, ProjectModelManager,
    ProjectModelUpdater, SettingsFileManager,
};

/// Identity of a project directory.
///
/// Two handles are the same project when their canonical paths match, or
/// on unix when they share device and inode.
#[derive(Debug, Clone)]
pub struct DirIdentity {
    path: PathBuf,
    #[cfg(unix)]
    file_id: (u64, u64),
}

impl DirIdentity {
    /// Resolve `dir`; fails unless it names an existing directory.
    pub fn resolve(dir: &Path) -> Result<Self, ProjectError> {
        let invalid = |reason: String| ProjectError::DirectoryInvalid {
            path: dir.to_path_buf(),
            reason,
        };
        let path = dir.canonicalize().map_err(|e| invalid(e.to_string()))?;
        let metadata = std::fs::metadata(&path).map_err(|e| invalid(e.to_string()))?;
        if !metadata.is_dir() {
            return Err(invalid("not a directory".to_string()));
        }

        #[cfg(unix)]
        {
            use std::os::unix::fs::MetadataExt;
            Ok(Self {
                path,
                file_id: (metadata.dev(), metadata.ino()),
            })
        }
        #[cfg(not(unix))]
        {
            Ok(Self { path })
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PartialEq for DirIdentity {
    fn eq(&self, other: &Self) -> bool {
        #[cfg(unix)]
        {
            self.file_id == other.file_id
        }
        #[cfg(not(unix))]
        {
            self.path == other.path
        }
    }
}

impl Eq for DirIdentity {}

impl Hash for DirIdentity {
    fn hash<H: Hasher>(&self, state: &mut H) {
        #[cfg(unix)]
        self.file_id.hash(state);
        #[cfg(not(unix))]
        self.path.hash(state);
    }
}

/// One open project and its services.
pub struct ProjectHandle {
    identity: DirIdentity,
    registry: ServiceRegistry,
}

impl ProjectHandle {
    /// A handle for `dir` whose services are not yet built.
    pub fn open(dir: &Path) -> Result<Self, ProjectError> {
        let identity = DirIdentity::resolve(dir)?;
        let registry = ServiceRegistry::new(identity.path());
        Ok(Self { identity, registry })
    }

    /// Open `dir`, build its services and pick up its settings file.
    pub fn create(dir: &Path, host: &HostContext) -> Result<Arc<Self>, ProjectError> {
        let handle = Self::open(dir)?;
        let services = handle.initialize(host)?;
        services.settings_file_manager.update_settings_file();
        Ok(Arc::new(handle))
    }

    /// Build and publish this project's services.
    pub fn initialize(&self, host: &HostContext) -> Result<Arc<ServiceObjects>, ProjectError> {
        self.registry.initialize(host)
    }

    pub fn identity(&self) -> &DirIdentity {
        &self.identity
    }

    pub fn project_dir(&self) -> &Path {
        self.identity.path()
    }

    pub fn state(&self) -> RegistryState {
        self.registry.state()
    }

    pub fn services(&self) -> Result<Arc<ServiceObjects>, ProjectError> {
        self.registry.get()
    }

    pub fn lookup<T>(&self) -> Result<Option<Arc<T>>, ProjectError>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        Ok(self.services()?.services.lookup::<T>())
    }

    pub fn with_lookup<R>(&self, f: impl FnOnce(&Lookup) -> R) -> Result<R, ProjectError> {
        Ok(f(&self.services()?.services))
    }

    pub fn config_provider(&self) -> Result<Arc<ConfigProvider>, ProjectError> {
        Ok(Arc::clone(&self.services()?.config_provider))
    }

    pub fn common_properties(&self) -> Result<CommonProperties, ProjectError> {
        Ok(self.services()?.common_properties.clone())
    }

    pub fn auxiliary(&self) -> Result<Arc<AuxiliaryConfiguration>, ProjectError> {
        Ok(Arc::clone(&self.services()?.auxiliary))
    }

    pub fn merged_command_query(&self) -> Result<Arc<MergedCommandQuery>, ProjectError> {
        Ok(Arc::clone(&self.services()?.merged_command_query))
    }

    pub fn model_manager(&self) -> Result<Arc<ProjectModelManager>, ProjectError> {
        Ok(Arc::clone(&self.services()?.model_manager))
    }

    pub fn model_updater(&self) -> Result<Arc<ProjectModelUpdater>, ProjectError> {
        Ok(Arc::clone(&self.services()?.model_updater))
    }

    pub fn settings_file_manager(&self) -> Result<Arc<SettingsFileManager>, ProjectError> {
        Ok(Arc::clone(&self.services()?.settings_file_manager))
    }

    pub fn display_info(&self) -> Result<Arc<ProjectDisplayInfo>, ProjectError> {
        Ok(Arc::clone(&self.services()?.display_info))
    }

    pub fn display_name(&self) -> Result<String, ProjectError> {
        Ok(self.services()?.display_info.display_name())
    }

    pub fn current_model(&self) -> Result<ProjectModel, ProjectError> {
        Ok(self.services()?.model_manager.current_model())
    }

    /// Settings a level contributes, deep-merged with every less specific one.
    pub fn merged_settings(&self, origin: LevelOrigin) -> Result<projconf_tree::ConfigTree, ProjectError> {
        Ok(self.services()?.settings_provider.merged_settings(origin))
    }

    /// Apply `model` if it was loaded for this project.
    ///
    /// Returns whether the model was applied. A model of another directory
    /// is ignored even before the project is initialized.
    pub fn try_replace_model(&self, model: ProjectModel) -> Result<bool, ProjectError> {
        if !self.is_own_dir(&model.project_dir) {
            tracing::debug!(
                project = %self.project_dir().display(),
                model = %model.project_dir.display(),
                "ignoring model of another project"
            );
            return Ok(false);
        }
        self.services()?.model_manager.update_model(model);
        Ok(true)
    }

    fn is_own_dir(&self, dir: &Path) -> bool {
        dir == self.project_dir()
            || DirIdentity::resolve(dir)
                .map(|identity| identity == self.identity)
                .unwrap_or(false)
    }
}

impl PartialEq for ProjectHandle {
    fn eq(&self, other: &Self) -> bool {
        self.identity == other.identity
    }
}

impl Eq for ProjectHandle {}

impl Hash for ProjectHandle {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.identity.hash(state);
    }
}

impl fmt::Debug for ProjectHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProjectHandle")
            .field("project_dir", &self.project_dir())
            .field("state", &self.state())
            .finish()
    }
}

/// Open projects, one handle per directory.
///
/// Holds handles weakly; a project closes when its last handle is dropped.
pub struct ProjectManager {
    host: HostContext,
    projects: Mutex<HashMap<DirIdentity, Weak<ProjectHandle>>>,
    // One gate per directory being opened; never held with `projects`.
    opening: Mutex<HashMap<DirIdentity, Arc<Mutex<()>>>>,
}

impl ProjectManager {
    pub fn new(host: HostContext) -> Self {
        Self {
            host,
            projects: Mutex::new(HashMap::new()),
            opening: Mutex::new(HashMap::new()),
        }
    }

    pub fn host(&self) -> &HostContext {
        &self.host
    }

    /// The open handle for `dir`, creating it when none is open.
    ///
    /// Callers opening the same directory wait for one creation; other
    /// directories open in parallel. The manager stays usable from init
    /// listeners, except for opening the directory being created.
    pub fn get_or_create(&self, dir: &Path) -> Result<Arc<ProjectHandle>, ProjectError> {
        let identity = DirIdentity::resolve(dir)?;
        if let Some(handle) = self.open_handle(&identity) {
            return Ok(handle);
        }

        let gate = Arc::clone(
            self.opening
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .entry(identity.clone())
                .or_default(),
        );
        let _opening = gate.lock().unwrap_or_else(|e| e.into_inner());
        let handle = match self.open_handle(&identity) {
            Some(handle) => Ok(handle),
            None => self.create(&identity),
        };
        self.release_gate(&identity, &gate);
        handle
    }

    fn open_handle(&self, identity: &DirIdentity) -> Option<Arc<ProjectHandle>> {
        self.projects
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(identity)
            .and_then(Weak::upgrade)
    }

    fn create(&self, identity: &DirIdentity) -> Result<Arc<ProjectHandle>, ProjectError> {
        let handle = ProjectHandle::create(identity.path(), &self.host)?;
        let mut projects = self.projects.lock().unwrap_or_else(|e| e.into_inner());
        projects.retain(|_, handle| handle.strong_count() > 0);
        projects.insert(identity.clone(), Arc::downgrade(&handle));
        drop(projects);
        tracing::info!(project = %handle.project_dir().display(), "project opened");
        Ok(handle)
    }

    // Drops the gate once no other caller is waiting on it.
    fn release_gate(&self, identity: &DirIdentity, gate: &Arc<Mutex<()>>) {
        let mut opening = self.opening.lock().unwrap_or_else(|e| e.into_inner());
        let idle = opening
            .get(identity)
            .is_some_and(|current| Arc::ptr_eq(current, gate) && Arc::strong_count(gate) <= 2);
        if idle {
            opening.remove(identity);
        }
    }

    /// The open handle for `dir`, if any.
    pub fn find(&self, dir: &Path) -> Option<Arc<ProjectHandle>> {
        let identity = DirIdentity::resolve(dir).ok()?;
        self.open_handle(&identity)
    }

    /// Every project still open.
    pub fn loaded_projects(&self) -> Vec<Arc<ProjectHandle>> {
        let mut projects: Vec<_> = self
            .projects
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .filter_map(Weak::upgrade)
            .collect();
        projects.sort_by(|a, b| a.project_dir().cmp(b.project_dir()));
        projects
    }
}

impl fmt::Debug for ProjectManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProjectManager")
            .field("host", &self.host)
            .field("loaded", &self.loaded_projects().len())
            .finish()
    }
}
