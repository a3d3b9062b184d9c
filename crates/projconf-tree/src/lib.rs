//! Project settings trees.
//!
//! A settings document (one settings file, one layer of defaults) is
//! materialized as a [`ConfigTree`]: an immutable node with an optional
//! string value and ordered, possibly repeated, child nodes. Everything
//! that reads or writes settings goes through this representation.

mod document;
mod error;
mod merge;
mod path;
mod tree;

pub use document::{from_json, from_toml, parse_toml, to_toml, to_toml_string};
pub use error::TreeError;
pub use merge::{deep_merge, merge_layers};
pub use path::ConfigPath;
pub use tree::{ConfigTree, ConfigTreeBuilder};

/// Child key used for the elements of a list node.
///
/// Arrays in settings documents become an interior node whose elements are
/// repeated children under this key.
pub const ENTRY_KEY: &str = "entry";
