//! projconf CLI
//!
//! Entry point for the `projconf` command-line tool.

use clap::{Parser, Subcommand};
use projconf::config::{verify_settings, ProjectLocations};
use projconf::services::CustomizerError;
use projconf::{CommonProperty, HostContext, LevelOrigin, ProjectHandle};
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "projconf")]
#[command(about = "Hierarchical project settings", version)]
struct Cli {
    /// Project directory (default: current directory)
    #[arg(long, short = 'p', global = true)]
    project: Option<PathBuf>,

    /// Global defaults file (default: $PROJCONF_GLOBAL or ~/.config/projconf/defaults.toml)
    #[arg(long, short = 'g', global = true)]
    global: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the effective common properties
    Show {
        /// Settings level to evaluate from (project, root, global, builtin)
        #[arg(long, short = 'l', default_value = "project")]
        level: LevelOrigin,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Show where each settings level comes from
    Sources {
        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Set a project-level property and save the settings file
    Set {
        /// Property name (e.g. source_level, target_platform)
        property: CommonProperty,

        /// New value; omit to clear the project's own value
        value: Option<String>,
    },

    /// List the project's registered services
    Services,

    /// List the commands the project can run
    Commands {
        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Check every settings file for errors
    Verify,
}

fn main() {
    init_tracing();
    let cli = Cli::parse();

    let project_dir = cli.project.unwrap_or_else(|| PathBuf::from("."));
    let global = cli.global.or_else(ProjectLocations::default_global_file);

    match cli.command {
        Commands::Show { level, json } => run_show(open(&project_dir, global), level, json),
        Commands::Sources { json } => run_sources(open(&project_dir, global), json),
        Commands::Set { property, value } => {
            run_set(open(&project_dir, global), property, value.as_deref())
        }
        Commands::Services => run_services(open(&project_dir, global)),
        Commands::Commands { json } => run_commands(open(&project_dir, global), json),
        Commands::Verify => run_verify(project_dir, global),
    }
}

fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn open(project_dir: &Path, global: Option<PathBuf>) -> Arc<ProjectHandle> {
    let host = HostContext::detached().with_global_settings(global);
    match ProjectHandle::create(project_dir, &host) {
        Ok(handle) => handle,
        Err(e) => {
            eprintln!("Error opening project: {}", e);
            process::exit(1);
        }
    }
}

fn print_json<T: serde::Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => {
            eprintln!("Error serializing output: {}", e);
            process::exit(1);
        }
    }
}

fn exit_on_error<T>(result: Result<T, projconf::ProjectError>) -> T {
    result.unwrap_or_else(|e| {
        eprintln!("Error: {}", e);
        process::exit(1);
    })
}

fn run_show(handle: Arc<ProjectHandle>, level: LevelOrigin, json: bool) {
    let properties = exit_on_error(handle.common_properties());
    let settings = properties.snapshot(level);

    if json {
        print_json(&settings);
        return;
    }

    let display = |value: Option<String>| value.unwrap_or_else(|| "-".to_string());
    println!("Project: {}", handle.project_dir().display());
    println!("Level:   {}", level);
    println!();
    println!(
        "  Target platform:  {}",
        display(settings.target_platform.map(|p| p.display_name))
    );
    println!(
        "  Script platform:  {}",
        display(settings.script_platform.map(|p| p.display_name))
    );
    println!("  Source encoding:  {}", display(settings.source_encoding));
    println!(
        "  Source level:     {}",
        display(settings.source_level.map(|l| l.to_string()))
    );
    println!("  Display name:     {}", display(settings.display_name_pattern));
    println!("  Gradle location:  {}", display(settings.gradle_location));
    if !settings.excluded_paths.is_empty() {
        println!("  Excluded paths:   {}", settings.excluded_paths.join(", "));
    }
    if !settings.custom_tasks.is_empty() {
        let names: Vec<_> = settings
            .custom_tasks
            .iter()
            .map(|task| task.display_name.as_str())
            .collect();
        println!("  Custom tasks:     {}", names.join(", "));
    }
}

fn run_sources(handle: Arc<ProjectHandle>, json: bool) {
    let provider = exit_on_error(handle.config_provider());
    let sources = provider.sources();

    if json {
        print_json(&sources);
        return;
    }

    for source in sources {
        let path = source
            .path
            .map(|path| path.display().to_string())
            .unwrap_or_else(|| "(built-in)".to_string());
        let digest = source
            .digest
            .map(|digest| digest[..12.min(digest.len())].to_string())
            .unwrap_or_else(|| "-".to_string());
        println!("{:<8} {:<12} {}", source.origin, digest, path);
    }
}

fn run_set(handle: Arc<ProjectHandle>, property: CommonProperty, value: Option<&str>) {
    let services = exit_on_error(handle.services());
    match services.customizer.apply([(property, value)]) {
        Ok(path) => println!("Saved {} to {}", property, path.display()),
        Err(CustomizerError::Property(e)) => {
            eprintln!("Invalid value: {}", e);
            process::exit(2);
        }
        Err(e) => {
            eprintln!("Error saving settings: {}", e);
            process::exit(1);
        }
    }
}

fn run_services(handle: Arc<ProjectHandle>) {
    let capabilities = exit_on_error(handle.with_lookup(|lookup| lookup.capabilities()));
    println!("{} services for {}", capabilities.len(), handle.project_dir().display());
    for capability in capabilities {
        println!("  {}", capability);
    }
}

fn run_commands(handle: Arc<ProjectHandle>, json: bool) {
    let query = exit_on_error(handle.merged_command_query());
    let commands = query.commands();

    if json {
        print_json(&commands);
        return;
    }

    for command in commands {
        let origin = if query.is_custom(&command.name) {
            "custom"
        } else {
            "builtin"
        };
        println!(
            "{:<12} {:<8} {}",
            command.name,
            origin,
            command.tasks.join(" ")
        );
    }
}

fn run_verify(project_dir: PathBuf, global: Option<PathBuf>) {
    let locations = ProjectLocations::discover(project_dir).with_global_file(global);
    let mut failures = 0;

    for (source, error) in verify_settings(&locations) {
        let path = source
            .path
            .as_ref()
            .map(|path| path.display().to_string())
            .unwrap_or_else(|| "(built-in)".to_string());
        match error {
            Some(e) => {
                failures += 1;
                eprintln!("  FAIL {:<8} {}", source.origin, e);
            }
            None if source.digest.is_some() || source.path.is_none() => {
                println!("  ok   {:<8} {}", source.origin, path);
            }
            None => println!("  -    {:<8} {} (missing)", source.origin, path),
        }
    }

    if failures > 0 {
        eprintln!("{} settings file(s) failed verification", failures);
        process::exit(1);
    }
}
