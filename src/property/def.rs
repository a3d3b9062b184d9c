//! Property definitions: encoding, value definition and merger bundled.

use std::fmt;
use std::sync::Arc;

use super::encoding::PropertyKeyEncodingDef;
use super::merger::{ParentIfNullMerger, ValueMerger};
use super::value_def::{IdentityValueDef, PropertyValueDef};
use super::PropertyError;

/// Everything needed to read a typed, inheritable property from a tree.
pub struct PropertyDef<K, V> {
    key_encoding: Arc<dyn PropertyKeyEncodingDef<K>>,
    value_def: Arc<dyn PropertyValueDef<K, V>>,
    value_merger: Arc<dyn ValueMerger<V>>,
}

impl<K, V> PropertyDef<K, V>
where
    K: 'static,
    V: 'static,
{
    pub fn new(
        key_encoding: impl PropertyKeyEncodingDef<K> + 'static,
        value_def: impl PropertyValueDef<K, V> + 'static,
        value_merger: impl ValueMerger<V> + 'static,
    ) -> Self {
        Self {
            key_encoding: Arc::new(key_encoding),
            value_def: Arc::new(value_def),
            value_merger: Arc::new(value_merger),
        }
    }

    pub fn builder<E>(key_encoding: E) -> PropertyDefBuilder<K, V>
    where
        E: PropertyKeyEncodingDef<K> + 'static,
    {
        PropertyDefBuilder {
            key_encoding: Arc::new(key_encoding),
            value_def: None,
            value_merger: None,
        }
    }

    pub fn key_encoding(&self) -> &dyn PropertyKeyEncodingDef<K> {
        self.key_encoding.as_ref()
    }

    pub fn value_def(&self) -> &dyn PropertyValueDef<K, V> {
        self.value_def.as_ref()
    }

    pub fn value_merger(&self) -> &dyn ValueMerger<V> {
        self.value_merger.as_ref()
    }
}

impl<T> PropertyDef<T, T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Stored value used as is, child overriding parent.
    pub fn identity<E>(key_encoding: E) -> Self
    where
        E: PropertyKeyEncodingDef<T> + 'static,
    {
        Self {
            key_encoding: Arc::new(key_encoding),
            value_def: Arc::new(IdentityValueDef),
            value_merger: Arc::new(ParentIfNullMerger),
        }
    }
}

impl<K, V> Clone for PropertyDef<K, V> {
    fn clone(&self) -> Self {
        Self {
            key_encoding: Arc::clone(&self.key_encoding),
            value_def: Arc::clone(&self.value_def),
            value_merger: Arc::clone(&self.value_merger),
        }
    }
}

impl<K, V> fmt::Debug for PropertyDef<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyDef").finish_non_exhaustive()
    }
}

/// Builder for [`PropertyDef`]; both the value definition and the merger
/// are required.
pub struct PropertyDefBuilder<K, V> {
    key_encoding: Arc<dyn PropertyKeyEncodingDef<K>>,
    value_def: Option<Arc<dyn PropertyValueDef<K, V>>>,
    value_merger: Option<Arc<dyn ValueMerger<V>>>,
}

impl<K, V> PropertyDefBuilder<K, V>
where
    K: 'static,
    V: 'static,
{
    pub fn value_def(mut self, value_def: impl PropertyValueDef<K, V> + 'static) -> Self {
        self.value_def = Some(Arc::new(value_def));
        self
    }

    pub fn value_merger(mut self, value_merger: impl ValueMerger<V> + 'static) -> Self {
        self.value_merger = Some(Arc::new(value_merger));
        self
    }

    pub fn build(self) -> Result<PropertyDef<K, V>, PropertyError> {
        Ok(PropertyDef {
            key_encoding: self.key_encoding,
            value_def: self.value_def.ok_or(PropertyError::MissingValueDef)?,
            value_merger: self.value_merger.ok_or(PropertyError::MissingMerger)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::property::encoding::IdentityKeyEncoding;

    #[test]
    fn test_builder_requires_merger() {
        let result = PropertyDef::<String, String>::builder(IdentityKeyEncoding)
            .value_def(IdentityValueDef)
            .build();
        assert!(matches!(result, Err(PropertyError::MissingMerger)));
    }

    #[test]
    fn test_builder_requires_value_def() {
        let result = PropertyDef::<String, String>::builder(IdentityKeyEncoding)
            .value_merger(ParentIfNullMerger)
            .build();
        assert!(matches!(result, Err(PropertyError::MissingValueDef)));
    }

    #[test]
    fn test_builder_complete() {
        let result = PropertyDef::<String, String>::builder(IdentityKeyEncoding)
            .value_def(IdentityValueDef)
            .value_merger(ParentIfNullMerger)
            .build();
        assert!(result.is_ok());
    }
}
