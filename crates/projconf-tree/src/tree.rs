//! The immutable settings tree.

use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock};

use crate::path::ConfigPath;
use crate::ENTRY_KEY;

/// One node of a settings document.
///
/// A node carries an optional value and a mapping from child key to the
/// list of children stored under that key. Child keys iterate in sorted
/// order, so saved documents list their keys alphabetically; children
/// repeated under one key keep document order. Nodes are immutable and
/// share their contents, so cloning is cheap and two clones of the same
/// snapshot can be recognized with [`ConfigTree::ptr_eq`]. Equality and
/// hashing are structural.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConfigTree {
    node: Arc<Node>,
}

#[derive(Debug, Default, PartialEq, Eq, Hash)]
struct Node {
    value: Option<String>,
    children: BTreeMap<String, Vec<ConfigTree>>,
}

impl ConfigTree {
    /// The tree with no value and no children.
    pub fn empty() -> Self {
        static EMPTY: OnceLock<ConfigTree> = OnceLock::new();
        EMPTY
            .get_or_init(|| ConfigTree::from_node(Node::default()))
            .clone()
    }

    /// A leaf holding `value`.
    pub fn single_value(value: impl Into<String>) -> Self {
        Self::from_node(Node {
            value: Some(value.into()),
            children: BTreeMap::new(),
        })
    }

    /// A list node with no elements.
    ///
    /// Unlike [`ConfigTree::empty`] this node is not empty: it carries an
    /// `entry` key with no children, so an explicit empty list survives
    /// being stored, merged and rendered.
    pub fn empty_list() -> Self {
        let mut children = BTreeMap::new();
        children.insert(ENTRY_KEY.to_string(), Vec::new());
        Self::from_node(Node {
            value: None,
            children,
        })
    }

    fn from_node(node: Node) -> Self {
        Self {
            node: Arc::new(node),
        }
    }

    pub fn builder() -> ConfigTreeBuilder {
        ConfigTreeBuilder::default()
    }

    pub fn value(&self) -> Option<&str> {
        self.node.value.as_deref()
    }

    pub fn value_or<'a>(&'a self, default: &'a str) -> &'a str {
        self.value().unwrap_or(default)
    }

    /// Keys of the direct children, in order.
    pub fn child_keys(&self) -> impl Iterator<Item = &str> {
        self.node.children.keys().map(String::as_str)
    }

    /// `true` if `key` is present, even with no children under it.
    pub fn has_child(&self, key: &str) -> bool {
        self.node.children.contains_key(key)
    }

    /// Every child stored under `key`, in document order.
    pub fn child_trees(&self, key: &str) -> &[ConfigTree] {
        self.node
            .children
            .get(key)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// The first child stored under `key`, or the empty tree.
    pub fn child_tree(&self, key: &str) -> ConfigTree {
        self.child_trees(key)
            .first()
            .cloned()
            .unwrap_or_else(ConfigTree::empty)
    }

    /// Follow `path` taking the first child at every step.
    pub fn at_path(&self, path: &ConfigPath) -> Option<&ConfigTree> {
        let mut current = self;
        for key in path.keys() {
            current = current.child_trees(key).first()?;
        }
        Some(current)
    }

    /// `true` if the node has neither a value nor children.
    pub fn is_empty(&self) -> bool {
        self.node.value.is_none() && self.node.children.is_empty()
    }

    /// `true` if this node or any descendant carries a value.
    pub fn has_values(&self) -> bool {
        self.node.value.is_some()
            || self
                .node
                .children
                .values()
                .flatten()
                .any(ConfigTree::has_values)
    }

    /// `true` if both trees are the same snapshot (not merely equal).
    pub fn ptr_eq(&self, other: &ConfigTree) -> bool {
        Arc::ptr_eq(&self.node, &other.node)
    }

    /// Copy of this tree with `subtree` placed at `path`.
    ///
    /// Missing interior nodes are created. An empty `subtree` removes the
    /// node at `path`, and interior nodes left empty by the removal are
    /// pruned. Only the first child is replaced where keys repeat.
    pub fn with_path(&self, path: &ConfigPath, subtree: ConfigTree) -> ConfigTree {
        self.with_keys(path.keys(), subtree)
    }

    fn with_keys(&self, keys: &[String], subtree: ConfigTree) -> ConfigTree {
        let Some((first, rest)) = keys.split_first() else {
            return subtree;
        };

        let mut children = self.node.children.clone();
        let current = children
            .get(first)
            .and_then(|list| list.first())
            .cloned()
            .unwrap_or_else(ConfigTree::empty);
        let replaced = current.with_keys(rest, subtree);

        let list = children.entry(first.clone()).or_default();
        if replaced.is_empty() {
            if !list.is_empty() {
                list.remove(0);
            }
            if list.is_empty() {
                children.remove(first);
            }
        } else if list.is_empty() {
            list.push(replaced);
        } else {
            list[0] = replaced;
        }

        ConfigTree::from_node(Node {
            value: self.node.value.clone(),
            children,
        })
    }
}

impl Default for ConfigTree {
    fn default() -> Self {
        Self::empty()
    }
}

/// Incremental construction of a [`ConfigTree`].
#[derive(Debug, Default)]
pub struct ConfigTreeBuilder {
    value: Option<String>,
    children: BTreeMap<String, Vec<Child>>,
}

#[derive(Debug)]
enum Child {
    Builder(ConfigTreeBuilder),
    Tree(ConfigTree),
}

impl ConfigTreeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_value(&mut self, value: impl Into<String>) -> &mut Self {
        self.value = Some(value.into());
        self
    }

    /// Append a new child under `key` and return its builder.
    pub fn add_child(&mut self, key: impl Into<String>) -> &mut ConfigTreeBuilder {
        let list = self.children.entry(key.into()).or_default();
        list.push(Child::Builder(ConfigTreeBuilder::default()));
        match list.last_mut() {
            Some(Child::Builder(builder)) => builder,
            _ => unreachable!("child builder was just pushed"),
        }
    }

    /// Append an already built child under `key`.
    pub fn add_child_tree(&mut self, key: impl Into<String>, tree: ConfigTree) -> &mut Self {
        self.children
            .entry(key.into())
            .or_default()
            .push(Child::Tree(tree));
        self
    }

    /// Declare `key` as a list even if nothing is added under it.
    pub fn add_empty_list(&mut self, key: impl Into<String>) -> &mut Self {
        self.children.entry(key.into()).or_default();
        self
    }

    /// Replace every child under `key` with `tree`.
    pub fn set_child_tree(&mut self, key: impl Into<String>, tree: ConfigTree) -> &mut Self {
        self.children.insert(key.into(), vec![Child::Tree(tree)]);
        self
    }

    pub fn build(self) -> ConfigTree {
        let children = self
            .children
            .into_iter()
            .map(|(key, list)| {
                let built = list
                    .into_iter()
                    .map(|child| match child {
                        Child::Builder(builder) => builder.build(),
                        Child::Tree(tree) => tree,
                    })
                    .collect();
                (key, built)
            })
            .collect();

        ConfigTree::from_node(Node {
            value: self.value,
            children,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ConfigTree {
        let mut builder = ConfigTree::builder();
        builder.add_child("source_encoding").set_value("UTF-8");
        let platform = builder.add_child("target_platform");
        platform.add_child("name").set_value("j2se");
        platform.add_child("version").set_value("17");
        builder.build()
    }

    #[test]
    fn test_empty_tree() {
        let tree = ConfigTree::empty();
        assert!(tree.is_empty());
        assert!(!tree.has_values());
        assert_eq!(tree.value_or("fallback"), "fallback");
        assert!(tree.child_tree("missing").is_empty());
    }

    #[test]
    fn test_at_path() {
        let tree = sample();
        let version = tree.at_path(&ConfigPath::parse("target_platform.version"));
        assert_eq!(version.and_then(ConfigTree::value), Some("17"));
        assert!(tree.at_path(&ConfigPath::parse("target_platform.home")).is_none());
        assert_eq!(tree.at_path(&ConfigPath::ROOT), Some(&tree));
    }

    #[test]
    fn test_repeated_children_keep_order() {
        let mut builder = ConfigTree::builder();
        builder.add_child("entry").set_value("a");
        builder.add_child("entry").set_value("b");
        let tree = builder.build();

        let values: Vec<_> = tree
            .child_trees("entry")
            .iter()
            .filter_map(ConfigTree::value)
            .collect();
        assert_eq!(values, vec!["a", "b"]);
        assert_eq!(tree.child_tree("entry").value(), Some("a"));
    }

    #[test]
    fn test_structural_equality() {
        let a = sample();
        let b = sample();
        assert_eq!(a, b);
        assert!(!a.ptr_eq(&b));
        assert!(a.ptr_eq(&a.clone()));
    }

    #[test]
    fn test_with_path_replaces_and_creates() {
        let tree = sample();
        let updated = tree.with_path(
            &ConfigPath::parse("target_platform.version"),
            ConfigTree::single_value("21"),
        );
        assert_eq!(
            updated
                .at_path(&ConfigPath::parse("target_platform.version"))
                .and_then(ConfigTree::value),
            Some("21")
        );
        assert_eq!(
            updated
                .at_path(&ConfigPath::parse("target_platform.name"))
                .and_then(ConfigTree::value),
            Some("j2se")
        );
        // Original snapshot is untouched.
        assert_eq!(
            tree.at_path(&ConfigPath::parse("target_platform.version"))
                .and_then(ConfigTree::value),
            Some("17")
        );

        let created = ConfigTree::empty()
            .with_path(&ConfigPath::parse("a.b"), ConfigTree::single_value("x"));
        assert_eq!(
            created.at_path(&ConfigPath::parse("a.b")).and_then(ConfigTree::value),
            Some("x")
        );
    }

    #[test]
    fn test_with_path_empty_subtree_removes_and_prunes() {
        let tree = ConfigTree::empty()
            .with_path(&ConfigPath::parse("a.b"), ConfigTree::single_value("x"));
        let removed = tree.with_path(&ConfigPath::parse("a.b"), ConfigTree::empty());
        assert!(removed.is_empty());
    }

    #[test]
    fn test_empty_list_is_not_empty() {
        let list = ConfigTree::empty_list();
        assert!(!list.is_empty());
        assert!(!list.has_values());
        assert!(list.has_child(ENTRY_KEY));
        assert!(list.child_trees(ENTRY_KEY).is_empty());

        let tree = ConfigTree::empty().with_path(&ConfigPath::parse("tasks"), list.clone());
        assert_eq!(tree.at_path(&ConfigPath::parse("tasks")), Some(&list));

        let mut builder = ConfigTree::builder();
        builder.add_empty_list(ENTRY_KEY);
        assert_eq!(builder.build(), list);
    }

    #[test]
    fn test_child_keys_are_sorted() {
        let mut builder = ConfigTree::builder();
        builder.add_child("zeta").set_value("1");
        builder.add_child("alpha").set_value("2");
        builder.add_child("mid").set_value("3");
        let tree = builder.build();
        assert_eq!(tree.child_keys().collect::<Vec<_>>(), vec!["alpha", "mid", "zeta"]);
    }
}
