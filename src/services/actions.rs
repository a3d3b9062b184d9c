//! Build commands: built-in actions, custom tasks and their execution.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use crate::platform::Platform;
use crate::properties::{CommonProperties, CustomTask};
use crate::property::HierarchicalProperty;

/// Built-in actions: `(name, display name, tasks)`.
pub const BUILTIN_COMMANDS: &[(&str, &str, &[&str])] = &[
    ("build", "Build", &["build"]),
    ("clean", "Clean", &["clean"]),
    ("rebuild", "Clean and Build", &["clean", "build"]),
    ("test", "Test", &["test"]),
    ("run", "Run", &["run"]),
    ("javadoc", "Generate Javadoc", &["javadoc"]),
];

/// A runnable build command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandSpec {
    pub name: String,
    pub display_name: String,
    pub tasks: Vec<String>,
    #[serde(default)]
    pub arguments: Vec<String>,
    #[serde(default)]
    pub jvm_arguments: Vec<String>,
    #[serde(default)]
    pub non_blocking: bool,
}

impl CommandSpec {
    fn builtin(name: &str, display_name: &str, tasks: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            display_name: display_name.to_string(),
            tasks: tasks.iter().map(|task| task.to_string()).collect(),
            arguments: Vec::new(),
            jvm_arguments: Vec::new(),
            non_blocking: false,
        }
    }
}

impl From<&CustomTask> for CommandSpec {
    fn from(task: &CustomTask) -> Self {
        Self {
            name: task.display_name.clone(),
            display_name: task.display_name.clone(),
            tasks: task.tasks.clone(),
            arguments: task.arguments.clone(),
            jvm_arguments: task.jvm_arguments.clone(),
            non_blocking: task.non_blocking,
        }
    }
}

/// What the host is asked to run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandRequest {
    pub project_dir: PathBuf,
    pub command: CommandSpec,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gradle_location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub platform: Option<Platform>,
}

/// Command errors
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    #[error("Command has no tasks: {0}")]
    NoTasks(String),

    #[error("Command rejected: {0}")]
    Rejected(String),
}

/// Host side of command execution.
pub trait CommandSink: Send + Sync {
    fn submit(&self, request: CommandRequest) -> Result<(), CommandError>;
}

/// Sink that keeps every submitted request.
#[derive(Debug, Default)]
pub struct RecordingCommandSink {
    requests: Mutex<Vec<CommandRequest>>,
}

impl RecordingCommandSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn requests(&self) -> Vec<CommandRequest> {
        self.requests
            .lock()
            .map(|requests| requests.clone())
            .unwrap_or_default()
    }
}

impl CommandSink for RecordingCommandSink {
    fn submit(&self, request: CommandRequest) -> Result<(), CommandError> {
        self.requests
            .lock()
            .map_err(|_| CommandError::Rejected("request log poisoned".to_string()))?
            .push(request);
        Ok(())
    }
}

/// Turns commands into requests for the host's [`CommandSink`].
pub struct ProjectCommandExecutor {
    project_dir: PathBuf,
    properties: CommonProperties,
    sink: Arc<dyn CommandSink>,
}

impl ProjectCommandExecutor {
    pub fn new(project_dir: PathBuf, properties: CommonProperties, sink: Arc<dyn CommandSink>) -> Self {
        Self {
            project_dir,
            properties,
            sink,
        }
    }

    pub fn execute(&self, command: CommandSpec) -> Result<CommandRequest, CommandError> {
        if command.tasks.is_empty() {
            return Err(CommandError::NoTasks(command.name));
        }

        let request = CommandRequest {
            project_dir: self.project_dir.clone(),
            command,
            gradle_location: self.properties.gradle_location().value(),
            platform: self.properties.target_platform().value(),
        };
        tracing::info!(
            project = %self.project_dir.display(),
            command = %request.command.name,
            "submitting command"
        );
        self.sink.submit(request.clone())?;
        Ok(request)
    }
}

/// The project's built-in actions.
pub struct ProjectActionProvider {
    commands: Vec<CommandSpec>,
    executor: Arc<ProjectCommandExecutor>,
}

impl ProjectActionProvider {
    pub fn new(executor: Arc<ProjectCommandExecutor>) -> Self {
        Self {
            commands: BUILTIN_COMMANDS
                .iter()
                .map(|(name, display_name, tasks)| CommandSpec::builtin(name, display_name, tasks))
                .collect(),
            executor,
        }
    }

    pub fn supported_actions(&self) -> Vec<&str> {
        self.commands.iter().map(|command| command.name.as_str()).collect()
    }

    pub fn is_action_enabled(&self, action: &str) -> bool {
        self.builtin_command(action).is_some()
    }

    pub fn builtin_command(&self, action: &str) -> Option<&CommandSpec> {
        self.commands.iter().find(|command| command.name == action)
    }

    pub fn builtin_commands(&self) -> &[CommandSpec] {
        &self.commands
    }

    pub fn invoke_action(&self, action: &str) -> Result<CommandRequest, CommandError> {
        let command = self
            .builtin_command(action)
            .cloned()
            .ok_or_else(|| CommandError::UnknownCommand(action.to_string()))?;
        self.executor.execute(command)
    }
}

/// Built-in commands merged with the project's custom tasks.
///
/// A custom task whose name matches a built-in command replaces it.
pub struct MergedCommandQuery {
    actions: Arc<ProjectActionProvider>,
    custom_tasks: HierarchicalProperty<Vec<CustomTask>, Vec<CustomTask>>,
}

impl MergedCommandQuery {
    pub fn new(
        actions: Arc<ProjectActionProvider>,
        custom_tasks: HierarchicalProperty<Vec<CustomTask>, Vec<CustomTask>>,
    ) -> Self {
        Self {
            actions,
            custom_tasks,
        }
    }

    pub fn commands(&self) -> Vec<CommandSpec> {
        let custom: Vec<CommandSpec> = self
            .custom_tasks
            .value()
            .unwrap_or_default()
            .iter()
            .map(CommandSpec::from)
            .collect();

        let mut merged: Vec<CommandSpec> = self
            .actions
            .builtin_commands()
            .iter()
            .filter(|builtin| custom.iter().all(|task| task.name != builtin.name))
            .cloned()
            .collect();
        merged.extend(custom);
        merged
    }

    pub fn command(&self, name: &str) -> Option<CommandSpec> {
        self.commands().into_iter().find(|command| command.name == name)
    }

    pub fn is_custom(&self, name: &str) -> bool {
        self.custom_tasks
            .value()
            .unwrap_or_default()
            .iter()
            .any(|task| task.display_name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{LevelOrigin, SettingsChain};
    use crate::platform::PlatformRegistry;

    fn fixture(settings: &str) -> (Arc<RecordingCommandSink>, Arc<ProjectActionProvider>, MergedCommandQuery) {
        let chain = SettingsChain::with_levels(vec![(
            LevelOrigin::Project,
            projconf_tree::parse_toml(settings).unwrap(),
        )]);
        let properties = CommonProperties::new(Arc::new(chain), Arc::new(PlatformRegistry::new()));
        let sink = Arc::new(RecordingCommandSink::new());
        let executor = Arc::new(ProjectCommandExecutor::new(
            PathBuf::from("/work/app"),
            properties.clone(),
            sink.clone(),
        ));
        let actions = Arc::new(ProjectActionProvider::new(executor));
        let query = MergedCommandQuery::new(Arc::clone(&actions), properties.custom_tasks().clone());
        (sink, actions, query)
    }

    #[test]
    fn test_invoke_builtin_action() {
        let (sink, actions, _) = fixture("gradle_location = \"/opt/gradle\"");

        assert!(actions.is_action_enabled("rebuild"));
        let request = actions.invoke_action("rebuild").unwrap();
        assert_eq!(request.command.tasks, vec!["clean".to_string(), "build".to_string()]);
        assert_eq!(request.gradle_location.as_deref(), Some("/opt/gradle"));
        assert_eq!(sink.requests(), vec![request]);

        assert!(matches!(
            actions.invoke_action("deploy"),
            Err(CommandError::UnknownCommand(_))
        ));
    }

    #[test]
    fn test_custom_tasks_merge_with_builtins() {
        let (_, _, query) = fixture(
            r#"
[[custom_tasks]]
display_name = "test"
tasks = ["test", "--info"]

[[custom_tasks]]
display_name = "Publish"
tasks = ["publishToMavenLocal"]
"#,
        );

        let commands = query.commands();
        assert_eq!(commands.len(), BUILTIN_COMMANDS.len() + 1);
        assert_eq!(
            query.command("test").map(|c| c.tasks),
            Some(vec!["test".to_string(), "--info".to_string()])
        );
        assert!(query.is_custom("Publish"));
        assert!(!query.is_custom("build"));
    }
}
