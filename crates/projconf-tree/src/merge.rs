//! Tree merge logic
//!
//! - Interior nodes: deep-merge by key
//! - Lists (`entry` children): REPLACE (overlay wins, even when empty)
//! - Values: override (overlay wins)

use std::collections::BTreeSet;

use crate::tree::{ConfigTree, ConfigTreeBuilder};
use crate::ENTRY_KEY;

/// Deep merge two trees, `overlay` taking precedence over `base`.
///
/// Where a key repeats, only the first children are merged; the remaining
/// overlay children are kept and the remaining base children dropped.
pub fn deep_merge(base: &ConfigTree, overlay: &ConfigTree) -> ConfigTree {
    if base.is_empty() {
        return overlay.clone();
    }
    if overlay.is_empty() {
        return base.clone();
    }

    let mut builder = ConfigTreeBuilder::new();
    if let Some(value) = overlay.value().or(base.value()) {
        builder.set_value(value);
    }

    let keys: BTreeSet<&str> = base.child_keys().chain(overlay.child_keys()).collect();
    for key in keys {
        let base_children = base.child_trees(key);
        let overlay_children = overlay.child_trees(key);

        let merged: Vec<ConfigTree> = match (base_children, overlay_children) {
            // An explicit empty list still replaces
            (_, []) if key == ENTRY_KEY && overlay.has_child(key) => {
                builder.add_empty_list(key);
                continue;
            }
            (base_children, []) => base_children.to_vec(),
            ([], overlay_children) => overlay_children.to_vec(),
            // Lists: no concatenation
            (_, overlay_children) if key == ENTRY_KEY => overlay_children.to_vec(),
            ([base_first, ..], [overlay_first, overlay_rest @ ..]) => {
                let mut merged = vec![deep_merge(base_first, overlay_first)];
                merged.extend(overlay_rest.iter().cloned());
                merged
            }
        };

        for child in merged {
            builder.add_child_tree(key, child);
        }
    }

    builder.build()
}

/// Merge trees in order (first is base, last has highest precedence).
pub fn merge_layers<I>(layers: I) -> ConfigTree
where
    I: IntoIterator<Item = ConfigTree>,
{
    layers
        .into_iter()
        .fold(ConfigTree::empty(), |acc, layer| deep_merge(&acc, &layer))
}
