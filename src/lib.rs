//! projconf - hierarchical project settings and project services
//!
//! This crate resolves typed project settings across an inheritance chain
//! (project, root project, global defaults, built-in defaults) and wires
//! the services of each open project together exactly once.

pub mod config;
pub mod error;
pub mod lookup;
pub mod model;
pub mod platform;
pub mod project;
pub mod properties;
pub mod property;
pub mod registry;
pub mod services;

pub use config::{ConfigError, ConfigProvider, LevelOrigin, ProjectLocations, SettingsChain};
pub use error::ProjectError;
pub use lookup::Lookup;
pub use model::{ModelLoader, ProjectModel};
pub use platform::{Platform, PlatformId, PlatformRegistry};
pub use project::{DirIdentity, ProjectHandle, ProjectManager};
pub use properties::{CommonProperties, CommonProperty};
pub use property::{HierarchicalProperty, PropertyError, PropertySource};
pub use registry::{HostContext, RegistryState, ServiceObjects, ServiceRegistry};

pub use projconf_tree::{ConfigPath, ConfigTree, ConfigTreeBuilder};
