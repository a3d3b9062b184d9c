//! Inheritance merge policies.
//!
//! A merger combines the value set directly on a level with the effective
//! value of its parent level. The parent is reached through a
//! [`ValueReference`], which evaluates it only when asked.

use std::fmt;
use std::sync::OnceLock;

use projconf_tree::{deep_merge, ConfigTree};

/// Lazily evaluated parent value.
///
/// The thunk runs on the first [`ValueReference::get_value`] call and its
/// result is kept for the rest of this evaluation only.
pub struct ValueReference<'a, V> {
    thunk: Box<dyn Fn() -> Option<V> + Send + Sync + 'a>,
    cached: OnceLock<Option<V>>,
}

impl<'a, V> ValueReference<'a, V>
where
    V: Clone + Send + Sync,
{
    pub fn new(thunk: impl Fn() -> Option<V> + Send + Sync + 'a) -> Self {
        Self {
            thunk: Box::new(thunk),
            cached: OnceLock::new(),
        }
    }

    /// A reference that always yields `value`.
    pub fn fixed(value: Option<V>) -> Self
    where
        V: 'a,
    {
        Self::new(move || value.clone())
    }

    pub fn get_value(&self) -> Option<V> {
        self.cached.get_or_init(|| (self.thunk)()).clone()
    }

    /// `true` once the parent value has been computed.
    pub fn is_evaluated(&self) -> bool {
        self.cached.get().is_some()
    }
}

impl<V> fmt::Debug for ValueReference<'_, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValueReference")
            .field("evaluated", &self.cached.get().is_some())
            .finish()
    }
}

/// Combines a child value with its parent's effective value.
pub trait ValueMerger<V>: Send + Sync {
    fn merge_values(&self, child: Option<V>, parent: &ValueReference<'_, V>) -> Option<V>;
}

/// The child wins when present; otherwise the parent's value is used.
#[derive(Debug, Clone, Copy, Default)]
pub struct ParentIfNullMerger;

impl<V> ValueMerger<V> for ParentIfNullMerger
where
    V: Clone + Send + Sync,
{
    fn merge_values(&self, child: Option<V>, parent: &ValueReference<'_, V>) -> Option<V> {
        child.or_else(|| parent.get_value())
    }
}

/// Child entries first, then the parent entries not already present.
#[derive(Debug, Clone, Copy, Default)]
pub struct ListUnionMerger;

impl<T> ValueMerger<Vec<T>> for ListUnionMerger
where
    T: Clone + PartialEq + Send + Sync,
{
    fn merge_values(&self, child: Option<Vec<T>>, parent: &ValueReference<'_, Vec<T>>) -> Option<Vec<T>> {
        let Some(mut items) = child else {
            return parent.get_value();
        };
        for item in parent.get_value().unwrap_or_default() {
            if !items.contains(&item) {
                items.push(item);
            }
        }
        Some(items)
    }
}

/// The child tree deep-merged over the parent tree.
#[derive(Debug, Clone, Copy, Default)]
pub struct TreeDeepMerger;

impl ValueMerger<ConfigTree> for TreeDeepMerger {
    fn merge_values(
        &self,
        child: Option<ConfigTree>,
        parent: &ValueReference<'_, ConfigTree>,
    ) -> Option<ConfigTree> {
        match (child, parent.get_value()) {
            (Some(child), Some(parent)) => Some(deep_merge(&parent, &child)),
            (child, parent) => child.or(parent),
        }
    }
}
