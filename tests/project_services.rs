//! Integration tests: project handles, service wiring and model flow

use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use projconf::config::SETTINGS_FILE_NAME;
use projconf::model::{ModelLoadError, ModelLoader, ProjectModel};
use projconf::services::{
    AuxiliaryConfiguration, ProjectInitListener, ProjectState, RecordingCommandSink, Sharability,
    SourceLevelProperty,
};
use projconf::{
    ConfigTree, HostContext, ProjectHandle, ProjectManager, RegistryState,
};
use tempfile::TempDir;

fn host() -> HostContext {
    HostContext::detached().with_global_settings(None)
}

struct RecordingListener {
    label: &'static str,
    seen: Arc<Mutex<Vec<&'static str>>>,
}

impl ProjectInitListener for RecordingListener {
    fn on_init_project(&self) {
        self.seen.lock().unwrap().push(self.label);
    }
}

struct VersionedLoader {
    calls: AtomicUsize,
}

impl ModelLoader for VersionedLoader {
    fn load(&self, project_dir: &Path) -> Result<ProjectModel, ModelLoadError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        let mut model = ProjectModel::empty(project_dir);
        model.version = Some(format!("1.{}", call));
        model.group = Some("org.example".to_string());
        Ok(model)
    }
}

// === Lifecycle ===

#[test]
fn test_double_initialize_keeps_first_services() {
    let dir = TempDir::new().unwrap();
    let handle = ProjectHandle::open(dir.path()).unwrap();
    assert_eq!(handle.state(), RegistryState::Uninitialized);
    assert!(handle.services().unwrap_err().is_not_initialized());

    let first = handle.initialize(&host()).unwrap();
    let err = handle.initialize(&host()).unwrap_err();
    assert!(err.is_already_initialized());
    assert!(Arc::ptr_eq(&first, &handle.services().unwrap()));
    assert_eq!(handle.state(), RegistryState::Ready);
}

#[test]
fn test_concurrent_initialize_has_one_winner() {
    let dir = TempDir::new().unwrap();
    let handle = Arc::new(ProjectHandle::open(dir.path()).unwrap());
    let seen = Arc::new(Mutex::new(Vec::new()));
    let host = host().with_init_listener(Arc::new(RecordingListener {
        label: "host",
        seen: Arc::clone(&seen),
    }));

    let outcomes: Vec<bool> = thread::scope(|scope| {
        let workers: Vec<_> = (0..8)
            .map(|_| {
                let handle = Arc::clone(&handle);
                let host = host.clone();
                scope.spawn(move || handle.initialize(&host).is_ok())
            })
            .collect();
        workers
            .into_iter()
            .map(|worker| worker.join().expect("Thread panicked"))
            .collect()
    });

    assert_eq!(outcomes.iter().filter(|won| **won).count(), 1);
    // Listeners run once, for the published services only.
    assert_eq!(*seen.lock().unwrap(), vec!["host"]);
}

#[test]
fn test_init_listeners_notified_in_order_before_return() {
    let dir = TempDir::new().unwrap();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let host = host()
        .with_init_listener(Arc::new(RecordingListener {
            label: "a",
            seen: Arc::clone(&seen),
        }))
        .with_init_listener(Arc::new(RecordingListener {
            label: "b",
            seen: Arc::clone(&seen),
        }));

    let handle = ProjectHandle::create(dir.path(), &host).unwrap();
    assert_eq!(*seen.lock().unwrap(), vec!["a", "b"]);

    let listeners = handle
        .with_lookup(|lookup| lookup.lookup_all::<dyn ProjectInitListener>().len())
        .unwrap();
    assert_eq!(listeners, 3);
}

#[test]
fn test_missing_directory_is_invalid() {
    let dir = TempDir::new().unwrap();
    let err = ProjectHandle::create(&dir.path().join("nope"), &host()).unwrap_err();
    assert!(matches!(
        err,
        projconf::ProjectError::DirectoryInvalid { .. }
    ));
}

// === Lookup ===

#[test]
fn test_lookup_returns_registered_capabilities() {
    let dir = TempDir::new().unwrap();
    let handle = ProjectHandle::create(dir.path(), &host()).unwrap();

    assert!(handle.lookup::<AuxiliaryConfiguration>().unwrap().is_some());
    assert!(handle.lookup::<dyn ProjectState>().unwrap().is_some());
    assert!(handle.lookup::<SourceLevelProperty>().unwrap().is_some());
    assert!(handle.lookup::<String>().unwrap().is_none());

    let capabilities = handle.with_lookup(|lookup| lookup.capabilities()).unwrap();
    assert!(capabilities
        .iter()
        .any(|name| name.ends_with("MergedCommandQuery")));
}

// === Services ===

#[test]
fn test_model_updates_flow_to_display_name() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().canonicalize().unwrap();
    let app = root.join("app");
    fs::create_dir_all(&app).unwrap();
    fs::write(root.join("settings.gradle"), "include 'app'\n").unwrap();
    fs::write(
        app.join(SETTINGS_FILE_NAME),
        "display_name_pattern = \"${project.path} ${project.version}\"\n",
    )
    .unwrap();

    let loader = Arc::new(VersionedLoader {
        calls: AtomicUsize::new(0),
    });
    let host = host().with_model_loader(loader);
    let handle = ProjectHandle::create(&app, &host).unwrap();

    assert_eq!(
        handle
            .settings_file_manager()
            .unwrap()
            .preferred_settings_file(),
        Some(root.join("settings.gradle"))
    );
    assert_eq!(handle.display_name().unwrap(), ":app ");

    let updater = handle.model_updater().unwrap();
    assert!(updater.try_wait_for_loaded_project(Duration::from_secs(10)));
    assert_eq!(handle.display_name().unwrap(), ":app 1.1");

    let information = handle.services().unwrap().information.clone();
    assert_eq!(information.display_name(), ":app 1.1");
}

#[test]
fn test_try_replace_model_ignores_other_projects() {
    let dir = TempDir::new().unwrap();
    let other = TempDir::new().unwrap();
    let handle = ProjectHandle::create(dir.path(), &host()).unwrap();

    let mut foreign = ProjectModel::empty(other.path());
    foreign.version = Some("2.0".to_string());
    assert!(!handle.try_replace_model(foreign).unwrap());
    assert_eq!(handle.current_model().unwrap().version, None);

    let mut own = ProjectModel::empty(dir.path());
    own.version = Some("2.0".to_string());
    assert!(handle.try_replace_model(own).unwrap());
    assert_eq!(
        handle.current_model().unwrap().version.as_deref(),
        Some("2.0")
    );
}

#[test]
fn test_actions_reach_the_host() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join(SETTINGS_FILE_NAME),
        r#"
gradle_location = "/opt/gradle-8"

[[custom_tasks]]
display_name = "build"
tasks = ["assemble"]
"#,
    )
    .unwrap();
    let sink = Arc::new(RecordingCommandSink::new());
    let handle = ProjectHandle::create(dir.path(), &host().with_command_sink(sink.clone())).unwrap();
    let services = handle.services().unwrap();

    let request = services.action_provider.invoke_action("clean").unwrap();
    assert_eq!(request.gradle_location.as_deref(), Some("/opt/gradle-8"));
    assert_eq!(sink.requests().len(), 1);

    let build = services.merged_command_query.command("build").unwrap();
    assert_eq!(build.tasks, vec!["assemble".to_string()]);
    services.command_executor.execute(build).unwrap();
    assert_eq!(sink.requests()[1].command.tasks, vec!["assemble".to_string()]);
}

#[test]
fn test_auxiliary_and_sharability() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join(SETTINGS_FILE_NAME),
        "excluded_paths = [\"*.iml\"]\n[auxiliary.formatter]\nindent = \"4\"\n",
    )
    .unwrap();
    let handle = ProjectHandle::create(dir.path(), &host()).unwrap();
    let services = handle.services().unwrap();

    let formatter = services.auxiliary.fragment("formatter").unwrap();
    assert_eq!(formatter.child_tree("indent").value(), Some("4"));

    services
        .auxiliary
        .put_fragment("vcs", ConfigTree::single_value("git"))
        .unwrap();
    assert_eq!(
        services.auxiliary.fragment_names(),
        vec!["formatter".to_string(), "vcs".to_string()]
    );

    assert_eq!(
        services.sharability.sharability(Path::new("app.iml")),
        Sharability::NotSharable
    );
    assert_eq!(
        services.sharability.sharability(Path::new("src/Main.java")),
        Sharability::Sharable
    );
}

// === Manager ===

#[test]
fn test_manager_returns_one_handle_per_directory() {
    let dir = TempDir::new().unwrap();
    let manager = Arc::new(ProjectManager::new(host()));

    let handles: Vec<_> = thread::scope(|scope| {
        let workers: Vec<_> = (0..4)
            .map(|_| {
                let manager = Arc::clone(&manager);
                let path = dir.path().to_path_buf();
                scope.spawn(move || manager.get_or_create(&path).unwrap())
            })
            .collect();
        workers
            .into_iter()
            .map(|worker| worker.join().expect("Thread panicked"))
            .collect()
    });

    assert!(handles.windows(2).all(|pair| Arc::ptr_eq(&pair[0], &pair[1])));
    assert!(manager.find(dir.path()).is_some());
    assert_eq!(manager.loaded_projects().len(), 1);
}

struct ManagerReader {
    manager: Arc<std::sync::OnceLock<std::sync::Weak<ProjectManager>>>,
    seen: Arc<AtomicUsize>,
}

impl ProjectInitListener for ManagerReader {
    fn on_init_project(&self) {
        if let Some(manager) = self.manager.get().and_then(std::sync::Weak::upgrade) {
            let _ = manager.loaded_projects();
            self.seen.fetch_add(1, Ordering::SeqCst);
        }
    }
}

#[test]
fn test_init_listener_can_read_the_manager() {
    let dir = TempDir::new().unwrap();
    let slot = Arc::new(std::sync::OnceLock::new());
    let seen = Arc::new(AtomicUsize::new(0));
    let manager = Arc::new(ProjectManager::new(host().with_init_listener(Arc::new(
        ManagerReader {
            manager: Arc::clone(&slot),
            seen: Arc::clone(&seen),
        },
    ))));
    slot.set(Arc::downgrade(&manager)).unwrap();

    let (done, finished) = std::sync::mpsc::channel();
    let opener = Arc::clone(&manager);
    let path = dir.path().to_path_buf();
    thread::spawn(move || {
        let opened = opener.get_or_create(&path).is_ok();
        let _ = done.send(opened);
    });

    assert_eq!(finished.recv_timeout(Duration::from_secs(10)), Ok(true));
    assert_eq!(seen.load(Ordering::SeqCst), 1);
    assert_eq!(manager.loaded_projects().len(), 1);
}
