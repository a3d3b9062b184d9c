//! Conversion between settings documents and trees.
//!
//! Mapping:
//! - tables / objects: interior nodes, one child per key
//! - arrays: interior node with one `entry` child per element; an empty
//!   array keeps the `entry` key with no children
//! - scalars: leaf nodes holding the scalar rendered as text
//! - JSON `null`: the empty tree

use crate::error::TreeError;
use crate::tree::{ConfigTree, ConfigTreeBuilder};
use crate::ENTRY_KEY;

/// Convert a TOML value into a tree.
pub fn from_toml(value: &toml::Value) -> ConfigTree {
    match value {
        toml::Value::String(s) => ConfigTree::single_value(s.clone()),
        toml::Value::Integer(i) => ConfigTree::single_value(i.to_string()),
        toml::Value::Float(f) => ConfigTree::single_value(f.to_string()),
        toml::Value::Boolean(b) => ConfigTree::single_value(b.to_string()),
        toml::Value::Datetime(dt) => ConfigTree::single_value(dt.to_string()),
        toml::Value::Array(items) => {
            let mut builder = ConfigTreeBuilder::new();
            builder.add_empty_list(ENTRY_KEY);
            for item in items {
                builder.add_child_tree(ENTRY_KEY, from_toml(item));
            }
            builder.build()
        }
        toml::Value::Table(table) => table_to_tree(table),
    }
}

fn table_to_tree(table: &toml::Table) -> ConfigTree {
    let mut builder = ConfigTreeBuilder::new();
    for (key, value) in table {
        builder.add_child_tree(key.clone(), from_toml(value));
    }
    builder.build()
}

/// Parse a TOML document into a tree.
pub fn parse_toml(text: &str) -> Result<ConfigTree, TreeError> {
    let table: toml::Table = toml::from_str(text)?;
    Ok(table_to_tree(&table))
}

/// Convert a tree back into a TOML value.
///
/// Leaves become strings, nodes holding only `entry` children become
/// arrays and every other node becomes a table. A node that has both a
/// value and children keeps only its children.
pub fn to_toml(tree: &ConfigTree) -> toml::Value {
    let mut keys = tree.child_keys().peekable();
    if keys.peek().is_none() {
        return match tree.value() {
            Some(value) => toml::Value::String(value.to_string()),
            None => toml::Value::Table(toml::Table::new()),
        };
    }

    let keys: Vec<&str> = keys.collect();
    if keys == [ENTRY_KEY] {
        return toml::Value::Array(tree.child_trees(ENTRY_KEY).iter().map(to_toml).collect());
    }

    let mut table = toml::Table::new();
    for key in keys {
        let children = tree.child_trees(key);
        let value = match children {
            [single] => to_toml(single),
            many => toml::Value::Array(many.iter().map(to_toml).collect()),
        };
        table.insert(key.to_string(), value);
    }
    toml::Value::Table(table)
}

/// Render a tree as a TOML document. The root must map to a table.
pub fn to_toml_string(tree: &ConfigTree) -> Result<String, TreeError> {
    match to_toml(tree) {
        toml::Value::Table(table) => Ok(toml::to_string_pretty(&table)?),
        _ => Err(TreeError::InvalidRoot { expected: "table" }),
    }
}

/// Convert a JSON value into a tree.
pub fn from_json(value: &serde_json::Value) -> ConfigTree {
    match value {
        serde_json::Value::Null => ConfigTree::empty(),
        serde_json::Value::Bool(b) => ConfigTree::single_value(b.to_string()),
        serde_json::Value::Number(n) => ConfigTree::single_value(n.to_string()),
        serde_json::Value::String(s) => ConfigTree::single_value(s.clone()),
        serde_json::Value::Array(items) => {
            let mut builder = ConfigTreeBuilder::new();
            builder.add_empty_list(ENTRY_KEY);
            for item in items {
                builder.add_child_tree(ENTRY_KEY, from_json(item));
            }
            builder.build()
        }
        serde_json::Value::Object(map) => {
            let mut builder = ConfigTreeBuilder::new();
            for (key, value) in map {
                builder.add_child_tree(key.clone(), from_json(value));
            }
            builder.build()
        }
    }
}
