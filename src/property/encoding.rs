//! Key encodings: typed values ↔ settings trees.

use std::fmt::Display;
use std::marker::PhantomData;
use std::str::FromStr;

use projconf_tree::{ConfigTree, ConfigTreeBuilder, ENTRY_KEY};

/// Bidirectional mapping between a tree node and a typed value.
///
/// `decode` returns `None` for absent or malformed input. For every legal
/// value, `decode(&encode(v))` must be semantically equal to `v`.
pub trait PropertyKeyEncodingDef<V>: Send + Sync {
    fn decode(&self, config: &ConfigTree) -> Option<V>;

    fn encode(&self, value: &V) -> ConfigTree;
}

/// Passes the node value through as a string.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityKeyEncoding;

impl PropertyKeyEncodingDef<String> for IdentityKeyEncoding {
    fn decode(&self, config: &ConfigTree) -> Option<String> {
        config.value().map(str::to_string)
    }

    fn encode(&self, value: &String) -> ConfigTree {
        ConfigTree::single_value(value.clone())
    }
}

/// Passes the whole subtree through.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityTreeKeyEncoding;

impl PropertyKeyEncodingDef<ConfigTree> for IdentityTreeKeyEncoding {
    fn decode(&self, config: &ConfigTree) -> Option<ConfigTree> {
        if config.is_empty() {
            None
        } else {
            Some(config.clone())
        }
    }

    fn encode(&self, value: &ConfigTree) -> ConfigTree {
        value.clone()
    }
}

/// `true` / `false`, case-insensitive.
#[derive(Debug, Clone, Copy, Default)]
pub struct BoolEncoding;

impl PropertyKeyEncodingDef<bool> for BoolEncoding {
    fn decode(&self, config: &ConfigTree) -> Option<bool> {
        let value = config.value()?.trim();
        if value.eq_ignore_ascii_case("true") {
            Some(true)
        } else if value.eq_ignore_ascii_case("false") {
            Some(false)
        } else {
            None
        }
    }

    fn encode(&self, value: &bool) -> ConfigTree {
        ConfigTree::single_value(value.to_string())
    }
}

/// Any type that parses from and renders to a single string value.
pub struct ParsedEncoding<T> {
    marker: PhantomData<fn() -> T>,
}

impl<T> ParsedEncoding<T> {
    pub fn new() -> Self {
        Self {
            marker: PhantomData,
        }
    }
}

impl<T> Default for ParsedEncoding<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> PropertyKeyEncodingDef<T> for ParsedEncoding<T>
where
    T: FromStr + Display,
{
    fn decode(&self, config: &ConfigTree) -> Option<T> {
        config.value()?.trim().parse().ok()
    }

    fn encode(&self, value: &T) -> ConfigTree {
        ConfigTree::single_value(value.to_string())
    }
}

/// A list stored as repeated `entry` children.
///
/// Every `entry` child is decoded; elements that fail to decode are
/// dropped. A bare value without entries decodes as a one-element list.
/// An empty list is stored as an `entry` key with no children, which keeps
/// it distinct from an absent value.
#[derive(Debug, Clone, Copy, Default)]
pub struct ListEncoding<E> {
    element: E,
}

impl<E> ListEncoding<E> {
    pub fn new(element: E) -> Self {
        Self { element }
    }
}

impl<T, E> PropertyKeyEncodingDef<Vec<T>> for ListEncoding<E>
where
    E: PropertyKeyEncodingDef<T>,
{
    fn decode(&self, config: &ConfigTree) -> Option<Vec<T>> {
        let entries = config.child_trees(ENTRY_KEY);
        if entries.is_empty() {
            if config.value().is_some() {
                return self.element.decode(config).map(|v| vec![v]);
            }
            return if config.is_empty() { None } else { Some(Vec::new()) };
        }
        Some(
            entries
                .iter()
                .filter_map(|entry| self.element.decode(entry))
                .collect(),
        )
    }

    fn encode(&self, value: &Vec<T>) -> ConfigTree {
        let mut builder = ConfigTreeBuilder::new();
        builder.add_empty_list(ENTRY_KEY);
        for item in value {
            builder.add_child_tree(ENTRY_KEY, self.element.encode(item));
        }
        builder.build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip<T, E>(encoding: &E, value: T)
    where
        T: PartialEq + std::fmt::Debug,
        E: PropertyKeyEncodingDef<T>,
    {
        assert_eq!(encoding.decode(&encoding.encode(&value)), Some(value));
    }

    #[test]
    fn test_identity_encodings() {
        round_trip(&IdentityKeyEncoding, "UTF-8".to_string());
        assert_eq!(IdentityKeyEncoding.decode(&ConfigTree::empty()), None);

        let tree = ConfigTree::empty().with_path(
            &projconf_tree::ConfigPath::parse("a.b"),
            ConfigTree::single_value("x"),
        );
        round_trip(&IdentityTreeKeyEncoding, tree);
        assert_eq!(IdentityTreeKeyEncoding.decode(&ConfigTree::empty()), None);
    }

    #[test]
    fn test_bool_encoding() {
        round_trip(&BoolEncoding, true);
        round_trip(&BoolEncoding, false);
        assert_eq!(BoolEncoding.decode(&ConfigTree::single_value(" TRUE ")), Some(true));
        assert_eq!(BoolEncoding.decode(&ConfigTree::single_value("yes")), None);
    }

    #[test]
    fn test_parsed_encoding_rejects_malformed() {
        let encoding = ParsedEncoding::<u32>::new();
        round_trip(&encoding, 17);
        assert_eq!(encoding.decode(&ConfigTree::single_value("seventeen")), None);
        assert_eq!(encoding.decode(&ConfigTree::empty()), None);
    }

    #[test]
    fn test_list_encoding() {
        let encoding = ListEncoding::new(ParsedEncoding::<u32>::new());
        round_trip(&encoding, vec![1, 2, 3]);

        let mut builder = ConfigTreeBuilder::new();
        builder.add_child(ENTRY_KEY).set_value("1");
        builder.add_child(ENTRY_KEY).set_value("oops");
        builder.add_child(ENTRY_KEY).set_value("3");
        assert_eq!(encoding.decode(&builder.build()), Some(vec![1, 3]));

        assert_eq!(encoding.decode(&ConfigTree::single_value("7")), Some(vec![7]));
        assert_eq!(encoding.decode(&ConfigTree::empty()), None);
    }

    #[test]
    fn test_empty_list_round_trip() {
        let encoding = ListEncoding::new(IdentityKeyEncoding);
        let encoded = encoding.encode(&Vec::<String>::new());
        assert!(!encoded.is_empty());
        assert_eq!(encoding.decode(&encoded), Some(Vec::new()));
    }
}
