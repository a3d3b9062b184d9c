//! Value definitions: stored keys → observable values.

use std::sync::Arc;

use super::source::{const_source, PropertySource};

/// Maps a decoded key to an observable value.
///
/// The value may differ from the key when it has to be resolved against
/// live state, such as a platform identifier resolved to an installed
/// platform. `key_from_value` is the inverse used when an edited value is
/// written back to storage.
pub trait PropertyValueDef<K, V>: Send + Sync {
    fn property(&self, key: Option<K>) -> Arc<dyn PropertySource<Option<V>>>;

    fn key_from_value(&self, value: &V) -> Option<K>;
}

/// The key is the value.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityValueDef;

impl<T> PropertyValueDef<T, T> for IdentityValueDef
where
    T: Clone + Send + Sync + 'static,
{
    fn property(&self, key: Option<T>) -> Arc<dyn PropertySource<Option<T>>> {
        const_source(key)
    }

    fn key_from_value(&self, value: &T) -> Option<T> {
        Some(value.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_value_def() {
        let source = IdentityValueDef.property(Some("x".to_string()));
        assert_eq!(source.get_value(), Some("x".to_string()));
        assert_eq!(
            PropertyValueDef::<String, String>::key_from_value(&IdentityValueDef, &"y".to_string()),
            Some("y".to_string())
        );

        let absent: Arc<dyn PropertySource<Option<u32>>> = IdentityValueDef.property(None);
        assert_eq!(absent.get_value(), None);
    }
}
