//! Properties shared by every project
//!
//! Each accessor is a [`HierarchicalProperty`] over the project's settings
//! chain. Merge policy per property:
//! - platforms, encoding, source level, display name, build tool location
//!   and custom tasks: the most specific level that sets a value wins
//! - `excluded_paths`: union of all levels, most specific first
//! - `auxiliary`: tree deep merge, most specific level on top

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use projconf_tree::{ConfigTree, ConfigTreeBuilder};
use serde::{Deserialize, Serialize};

use crate::config::{LevelOrigin, SettingsChain};
use crate::platform::{Platform, PlatformId, PlatformIdEncoding, PlatformRegistry, PlatformValueDef};
use crate::property::{
    BoolEncoding, HierarchicalProperty, IdentityKeyEncoding, IdentityTreeKeyEncoding,
    IdentityValueDef, ListEncoding, ListUnionMerger, ParentIfNullMerger, ParsedEncoding,
    PropertyDef, PropertyError, PropertyKeyEncodingDef, TreeDeepMerger,
};

/// Java language level, written `1.N` up to 8 and `N` afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SourceLevel {
    major: u32,
}

impl SourceLevel {
    pub fn new(major: u32) -> Self {
        Self { major }
    }

    pub fn major(&self) -> u32 {
        self.major
    }
}

impl fmt::Display for SourceLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.major <= 8 {
            write!(f, "1.{}", self.major)
        } else {
            write!(f, "{}", self.major)
        }
    }
}

impl FromStr for SourceLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let digits = match s.strip_prefix("1.") {
            Some(minor) => minor,
            None => s,
        };
        match digits.parse::<u32>() {
            Ok(major) if major > 0 => Ok(Self::new(major)),
            _ => Err(format!("invalid source level '{}'", s)),
        }
    }
}

impl Serialize for SourceLevel {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Character encoding label, such as `UTF-8` or `ISO-8859-1`.
#[derive(Debug, Clone, Copy, Default)]
pub struct EncodingLabelEncoding;

impl EncodingLabelEncoding {
    pub fn is_valid_label(label: &str) -> bool {
        let mut chars = label.chars();
        let Some(first) = chars.next() else {
            return false;
        };
        label.len() <= 40
            && first.is_ascii_alphanumeric()
            && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '+' | '.' | ':' | '_'))
    }
}

impl PropertyKeyEncodingDef<String> for EncodingLabelEncoding {
    fn decode(&self, config: &ConfigTree) -> Option<String> {
        let label = config.value()?.trim();
        Self::is_valid_label(label).then(|| label.to_string())
    }

    fn encode(&self, value: &String) -> ConfigTree {
        ConfigTree::single_value(value.clone())
    }
}

/// A user-defined build command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomTask {
    pub display_name: String,
    pub tasks: Vec<String>,
    #[serde(default)]
    pub arguments: Vec<String>,
    #[serde(default)]
    pub jvm_arguments: Vec<String>,
    #[serde(default)]
    pub non_blocking: bool,
}

/// One custom task table.
#[derive(Debug, Clone, Copy, Default)]
pub struct CustomTaskEncoding;

impl PropertyKeyEncodingDef<CustomTask> for CustomTaskEncoding {
    fn decode(&self, config: &ConfigTree) -> Option<CustomTask> {
        let strings = ListEncoding::new(IdentityKeyEncoding);
        let display_name = config.child_tree("display_name").value()?.trim().to_string();
        let tasks = strings.decode(&config.child_tree("tasks"))?;
        if display_name.is_empty() || tasks.is_empty() {
            return None;
        }

        Some(CustomTask {
            display_name,
            tasks,
            arguments: strings.decode(&config.child_tree("arguments")).unwrap_or_default(),
            jvm_arguments: strings
                .decode(&config.child_tree("jvm_arguments"))
                .unwrap_or_default(),
            non_blocking: BoolEncoding
                .decode(&config.child_tree("non_blocking"))
                .unwrap_or(false),
        })
    }

    fn encode(&self, value: &CustomTask) -> ConfigTree {
        let strings = ListEncoding::new(IdentityKeyEncoding);
        let mut builder = ConfigTreeBuilder::new();
        builder
            .add_child("display_name")
            .set_value(value.display_name.clone());
        builder.add_child_tree("tasks", strings.encode(&value.tasks));
        if !value.arguments.is_empty() {
            builder.add_child_tree("arguments", strings.encode(&value.arguments));
        }
        if !value.jvm_arguments.is_empty() {
            builder.add_child_tree("jvm_arguments", strings.encode(&value.jvm_arguments));
        }
        if value.non_blocking {
            builder.add_child_tree("non_blocking", BoolEncoding.encode(&true));
        }
        builder.build()
    }
}

/// The `custom_tasks` array of tables.
pub type CustomTasksEncoding = ListEncoding<CustomTaskEncoding>;

/// Names of the common properties, as used on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommonProperty {
    TargetPlatform,
    ScriptPlatform,
    SourceEncoding,
    SourceLevel,
    DisplayNamePattern,
    GradleLocation,
    ExcludedPaths,
}

impl CommonProperty {
    pub const ALL: [CommonProperty; 7] = [
        CommonProperty::TargetPlatform,
        CommonProperty::ScriptPlatform,
        CommonProperty::SourceEncoding,
        CommonProperty::SourceLevel,
        CommonProperty::DisplayNamePattern,
        CommonProperty::GradleLocation,
        CommonProperty::ExcludedPaths,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TargetPlatform => "target_platform",
            Self::ScriptPlatform => "script_platform",
            Self::SourceEncoding => "source_encoding",
            Self::SourceLevel => "source_level",
            Self::DisplayNamePattern => "display_name_pattern",
            Self::GradleLocation => "gradle_location",
            Self::ExcludedPaths => "excluded_paths",
        }
    }
}

impl fmt::Display for CommonProperty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CommonProperty {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().replace('-', "_");
        CommonProperty::ALL
            .into_iter()
            .find(|property| property.as_str().eq_ignore_ascii_case(&normalized))
            .ok_or_else(|| format!("unknown property '{}'", s))
    }
}

/// Effective values of the common properties at one level.
#[derive(Debug, Clone, Serialize)]
pub struct CommonSettings {
    pub origin: LevelOrigin,
    pub target_platform: Option<Platform>,
    pub script_platform: Option<Platform>,
    pub source_encoding: Option<String>,
    pub source_level: Option<SourceLevel>,
    pub display_name_pattern: Option<String>,
    pub gradle_location: Option<String>,
    pub excluded_paths: Vec<String>,
    pub custom_tasks: Vec<CustomTask>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auxiliary: Option<toml::Value>,
}

/// Typed accessors for the settings every project understands.
#[derive(Clone)]
pub struct CommonProperties {
    target_platform: HierarchicalProperty<PlatformId, Platform>,
    script_platform: HierarchicalProperty<PlatformId, Platform>,
    source_encoding: HierarchicalProperty<String, String>,
    source_level: HierarchicalProperty<SourceLevel, SourceLevel>,
    display_name_pattern: HierarchicalProperty<String, String>,
    gradle_location: HierarchicalProperty<String, String>,
    excluded_paths: HierarchicalProperty<Vec<String>, Vec<String>>,
    custom_tasks: HierarchicalProperty<Vec<CustomTask>, Vec<CustomTask>>,
    auxiliary: HierarchicalProperty<ConfigTree, ConfigTree>,
}

impl CommonProperties {
    pub fn new(chain: Arc<SettingsChain>, platforms: Arc<PlatformRegistry>) -> Self {
        let platform_def = || {
            PropertyDef::new(
                PlatformIdEncoding,
                PlatformValueDef::new(Arc::clone(&platforms)),
                ParentIfNullMerger,
            )
        };

        Self {
            target_platform: HierarchicalProperty::new(
                "target_platform",
                platform_def(),
                Arc::clone(&chain),
            ),
            script_platform: HierarchicalProperty::new(
                "script_platform",
                platform_def(),
                Arc::clone(&chain),
            ),
            source_encoding: HierarchicalProperty::new(
                "source_encoding",
                PropertyDef::identity(EncodingLabelEncoding),
                Arc::clone(&chain),
            ),
            source_level: HierarchicalProperty::new(
                "source_level",
                PropertyDef::identity(ParsedEncoding::<SourceLevel>::new()),
                Arc::clone(&chain),
            ),
            display_name_pattern: HierarchicalProperty::new(
                "display_name_pattern",
                PropertyDef::identity(IdentityKeyEncoding),
                Arc::clone(&chain),
            ),
            gradle_location: HierarchicalProperty::new(
                "gradle_location",
                PropertyDef::identity(IdentityKeyEncoding),
                Arc::clone(&chain),
            ),
            excluded_paths: HierarchicalProperty::new(
                "excluded_paths",
                PropertyDef::new(
                    ListEncoding::new(IdentityKeyEncoding),
                    IdentityValueDef,
                    ListUnionMerger,
                ),
                Arc::clone(&chain),
            ),
            custom_tasks: HierarchicalProperty::new(
                "custom_tasks",
                PropertyDef::identity(CustomTasksEncoding::default()),
                Arc::clone(&chain),
            ),
            auxiliary: HierarchicalProperty::new(
                "auxiliary",
                PropertyDef::new(IdentityTreeKeyEncoding, IdentityValueDef, TreeDeepMerger),
                chain,
            ),
        }
    }

    pub fn target_platform(&self) -> &HierarchicalProperty<PlatformId, Platform> {
        &self.target_platform
    }

    pub fn script_platform(&self) -> &HierarchicalProperty<PlatformId, Platform> {
        &self.script_platform
    }

    pub fn source_encoding(&self) -> &HierarchicalProperty<String, String> {
        &self.source_encoding
    }

    pub fn source_level(&self) -> &HierarchicalProperty<SourceLevel, SourceLevel> {
        &self.source_level
    }

    pub fn display_name_pattern(&self) -> &HierarchicalProperty<String, String> {
        &self.display_name_pattern
    }

    pub fn gradle_location(&self) -> &HierarchicalProperty<String, String> {
        &self.gradle_location
    }

    pub fn excluded_paths(&self) -> &HierarchicalProperty<Vec<String>, Vec<String>> {
        &self.excluded_paths
    }

    pub fn custom_tasks(&self) -> &HierarchicalProperty<Vec<CustomTask>, Vec<CustomTask>> {
        &self.custom_tasks
    }

    pub fn auxiliary(&self) -> &HierarchicalProperty<ConfigTree, ConfigTree> {
        &self.auxiliary
    }

    /// Effective values of every property at `origin`.
    pub fn snapshot(&self, origin: LevelOrigin) -> CommonSettings {
        CommonSettings {
            origin,
            target_platform: self.target_platform.get(origin),
            script_platform: self.script_platform.get(origin),
            source_encoding: self.source_encoding.get(origin),
            source_level: self.source_level.get(origin),
            display_name_pattern: self.display_name_pattern.get(origin),
            gradle_location: self.gradle_location.get(origin),
            excluded_paths: self.excluded_paths.get(origin).unwrap_or_default(),
            custom_tasks: self.custom_tasks.get(origin).unwrap_or_default(),
            auxiliary: self.auxiliary.get(origin).map(|tree| projconf_tree::to_toml(&tree)),
        }
    }

    /// Parse `text` for `property` and store it on `origin`; `None` clears
    /// the stored value.
    pub fn store_text(
        &self,
        origin: LevelOrigin,
        property: CommonProperty,
        text: Option<&str>,
    ) -> Result<(), PropertyError> {
        let invalid = |value: &str| PropertyError::InvalidValue {
            path: property.as_str().to_string(),
            value: value.to_string(),
        };

        match property {
            CommonProperty::TargetPlatform | CommonProperty::ScriptPlatform => {
                let platform = text
                    .map(|value| {
                        value
                            .parse::<PlatformId>()
                            .map(|id| Platform::new(id.clone(), id.to_string()))
                            .map_err(|_| invalid(value))
                    })
                    .transpose()?;
                let target = if property == CommonProperty::TargetPlatform {
                    &self.target_platform
                } else {
                    &self.script_platform
                };
                target.set_at(origin, platform.as_ref())
            }
            CommonProperty::SourceEncoding => {
                let label = text
                    .map(|value| {
                        let value = value.trim();
                        if EncodingLabelEncoding::is_valid_label(value) {
                            Ok(value.to_string())
                        } else {
                            Err(invalid(value))
                        }
                    })
                    .transpose()?;
                self.source_encoding.set_at(origin, label.as_ref())
            }
            CommonProperty::SourceLevel => {
                let level = text
                    .map(|value| value.parse::<SourceLevel>().map_err(|_| invalid(value)))
                    .transpose()?;
                self.source_level.set_at(origin, level.as_ref())
            }
            CommonProperty::DisplayNamePattern => {
                let pattern = text.map(str::to_string);
                self.display_name_pattern.set_at(origin, pattern.as_ref())
            }
            CommonProperty::GradleLocation => {
                let location = text.map(|value| value.trim().to_string());
                self.gradle_location.set_at(origin, location.as_ref())
            }
            CommonProperty::ExcludedPaths => {
                let paths: Option<Vec<String>> = text.map(|value| {
                    value
                        .split(',')
                        .map(str::trim)
                        .filter(|path| !path.is_empty())
                        .map(str::to_string)
                        .collect()
                });
                self.excluded_paths.set_at(origin, paths.as_ref())
            }
        }
    }
}

impl fmt::Debug for CommonProperties {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommonProperties").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BuiltinDefaults;

    fn tree(text: &str) -> ConfigTree {
        projconf_tree::parse_toml(text).unwrap()
    }

    fn properties(levels: Vec<(LevelOrigin, ConfigTree)>) -> CommonProperties {
        CommonProperties::new(
            Arc::new(SettingsChain::with_levels(levels)),
            Arc::new(PlatformRegistry::with_defaults()),
        )
    }

    #[test]
    fn test_source_level_forms() {
        assert_eq!("1.8".parse::<SourceLevel>().unwrap().major(), 8);
        assert_eq!("17".parse::<SourceLevel>().unwrap().major(), 17);
        assert_eq!(SourceLevel::new(7).to_string(), "1.7");
        assert_eq!(SourceLevel::new(21).to_string(), "21");
        assert!("latest".parse::<SourceLevel>().is_err());
        assert!("0".parse::<SourceLevel>().is_err());
    }

    #[test]
    fn test_encoding_label_validation() {
        assert!(EncodingLabelEncoding::is_valid_label("UTF-8"));
        assert!(EncodingLabelEncoding::is_valid_label("ISO-8859-1"));
        assert!(!EncodingLabelEncoding::is_valid_label(""));
        assert!(!EncodingLabelEncoding::is_valid_label("-utf8"));
        assert!(!EncodingLabelEncoding::is_valid_label("utf 8"));
    }

    #[test]
    fn test_builtin_values_are_inherited() {
        let props = properties(vec![
            (LevelOrigin::Project, ConfigTree::empty()),
            (LevelOrigin::Builtin, BuiltinDefaults::default().to_tree()),
        ]);

        assert_eq!(props.source_encoding().value(), Some("UTF-8".to_string()));
        assert_eq!(props.source_level().value(), Some(SourceLevel::new(17)));
        assert_eq!(
            props.target_platform().value().map(|p| p.id),
            Some(PlatformId::new("j2se", "17"))
        );
        assert_eq!(props.excluded_paths().value(), None);
    }

    #[test]
    fn test_malformed_project_value_falls_back() {
        let props = properties(vec![
            (LevelOrigin::Project, tree("source_encoding = \"not valid\"\nsource_level = \"x\"")),
            (LevelOrigin::Builtin, BuiltinDefaults::default().to_tree()),
        ]);

        assert_eq!(props.source_encoding().value(), Some("UTF-8".to_string()));
        assert_eq!(props.source_level().value(), Some(SourceLevel::new(17)));
    }

    #[test]
    fn test_excluded_paths_union() {
        let props = properties(vec![
            (LevelOrigin::Project, tree("excluded_paths = [\"build\", \"out\"]")),
            (LevelOrigin::Root, tree("excluded_paths = [\"out\", \".gradle\"]")),
        ]);

        assert_eq!(
            props.excluded_paths().value(),
            Some(vec!["build".to_string(), "out".to_string(), ".gradle".to_string()])
        );
        assert_eq!(
            props.excluded_paths().get(LevelOrigin::Root),
            Some(vec!["out".to_string(), ".gradle".to_string()])
        );
    }

    #[test]
    fn test_custom_tasks_child_overrides() {
        let props = properties(vec![
            (
                LevelOrigin::Project,
                tree(
                    r#"
[[custom_tasks]]
display_name = "Quick check"
tasks = ["check"]
arguments = ["--offline"]
non_blocking = true

[[custom_tasks]]
display_name = "Broken"
"#,
                ),
            ),
            (
                LevelOrigin::Root,
                tree("[[custom_tasks]]\ndisplay_name = \"Root\"\ntasks = [\"build\"]"),
            ),
        ]);

        let tasks = props.custom_tasks().value().unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].display_name, "Quick check");
        assert_eq!(tasks[0].arguments, vec!["--offline".to_string()]);
        assert!(tasks[0].non_blocking);
    }

    #[test]
    fn test_empty_custom_tasks_drop_inherited() {
        let root = tree("[[custom_tasks]]\ndisplay_name = \"Root\"\ntasks = [\"build\"]");
        let props = properties(vec![
            (LevelOrigin::Project, tree("custom_tasks = []")),
            (LevelOrigin::Root, root.clone()),
        ]);
        assert_eq!(props.custom_tasks().value(), Some(Vec::new()));

        let props = properties(vec![
            (LevelOrigin::Project, ConfigTree::empty()),
            (LevelOrigin::Root, root),
        ]);
        assert_eq!(props.custom_tasks().value().map(|tasks| tasks.len()), Some(1));

        props
            .custom_tasks()
            .set_at(LevelOrigin::Project, Some(&Vec::new()))
            .unwrap();
        assert_eq!(props.custom_tasks().value(), Some(Vec::new()));
        assert_eq!(
            props.custom_tasks().local_value(LevelOrigin::Project),
            Some(Vec::new())
        );

        props.custom_tasks().set_at(LevelOrigin::Project, None).unwrap();
        assert_eq!(props.custom_tasks().value().map(|tasks| tasks.len()), Some(1));
    }

    #[test]
    fn test_custom_task_encoding_round_trip() {
        let task = CustomTask {
            display_name: "Run".to_string(),
            tasks: vec!["run".to_string()],
            arguments: Vec::new(),
            jvm_arguments: vec!["-Xmx1g".to_string()],
            non_blocking: false,
        };
        assert_eq!(
            CustomTaskEncoding.decode(&CustomTaskEncoding.encode(&task)),
            Some(task)
        );
    }

    #[test]
    fn test_auxiliary_deep_merge() {
        let props = properties(vec![
            (LevelOrigin::Project, tree("[auxiliary.editor]\ntab_size = 2")),
            (LevelOrigin::Global, tree("[auxiliary.editor]\ntab_size = 4\nwrap = true")),
        ]);

        let merged = props.auxiliary().value().unwrap();
        let editor = merged.child_tree("editor");
        assert_eq!(editor.child_tree("tab_size").value(), Some("2"));
        assert_eq!(editor.child_tree("wrap").value(), Some("true"));
    }

    #[test]
    fn test_store_text() {
        let props = properties(vec![(LevelOrigin::Builtin, BuiltinDefaults::default().to_tree())]);

        props
            .store_text(LevelOrigin::Project, CommonProperty::TargetPlatform, Some("j2se:11"))
            .unwrap();
        props
            .store_text(LevelOrigin::Project, CommonProperty::ExcludedPaths, Some("build, out"))
            .unwrap();
        assert_eq!(
            props.target_platform().value().map(|p| p.id.version),
            Some("11".to_string())
        );
        assert_eq!(
            props.excluded_paths().value(),
            Some(vec!["build".to_string(), "out".to_string()])
        );

        let err = props
            .store_text(LevelOrigin::Project, CommonProperty::SourceLevel, Some("newest"))
            .unwrap_err();
        assert!(matches!(err, PropertyError::InvalidValue { .. }));

        props
            .store_text(LevelOrigin::Project, CommonProperty::TargetPlatform, None)
            .unwrap();
        assert_eq!(
            props.target_platform().value().map(|p| p.id.version),
            Some("17".to_string())
        );
    }

    #[test]
    fn test_property_names() {
        assert_eq!(
            "source-level".parse::<CommonProperty>(),
            Ok(CommonProperty::SourceLevel)
        );
        assert!("colour".parse::<CommonProperty>().is_err());
    }
}
