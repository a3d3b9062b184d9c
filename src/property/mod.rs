//! Typed, observable, inheritance-aware properties
//!
//! A property is read from the settings chain in three steps:
//! 1. [`PropertyKeyEncodingDef`] decodes the raw key from a level's tree
//! 2. [`PropertyValueDef`] turns the key into an observable value
//! 3. [`ValueMerger`] combines it with the parent level's effective value
//!
//! [`HierarchicalProperty`] composes the three over a
//! [`SettingsChain`](crate::config::SettingsChain).

mod def;
mod encoding;
mod hierarchical;
mod merger;
mod source;
mod value_def;

pub use def::{PropertyDef, PropertyDefBuilder};
pub use encoding::{
    BoolEncoding, IdentityKeyEncoding, IdentityTreeKeyEncoding, ListEncoding, ParsedEncoding,
    PropertyKeyEncodingDef,
};
pub use hierarchical::HierarchicalProperty;
pub use merger::{ListUnionMerger, ParentIfNullMerger, TreeDeepMerger, ValueMerger, ValueReference};
pub use source::{
    const_source, convert, ChangeListener, ChangeListeners, ListenerRef, MutableProperty,
    PropertySource,
};
pub use value_def::{IdentityValueDef, PropertyValueDef};

/// Property definition and update errors
#[derive(Debug, thiserror::Error)]
pub enum PropertyError {
    #[error("Property definition has no value definition")]
    MissingValueDef,

    #[error("Property definition has no value merger")]
    MissingMerger,

    #[error("Value for '{path}' cannot be stored")]
    Unrepresentable { path: String },

    #[error("Invalid value '{value}' for '{path}'")]
    InvalidValue { path: String, value: String },
}
