//! Inheritance-aware typed properties.
//!
//! The effective value at a level is
//! `merger.merge(value_def.property(decode(level tree at path)), parent effective)`,
//! where the parent is the next less specific level in the chain and is
//! only evaluated if the merger asks for it. The least specific level sees
//! a fixed absent parent.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use projconf_tree::{ConfigPath, ConfigTree};

use super::def::PropertyDef;
use super::merger::ValueReference;
use super::source::{ChangeListener, ListenerRef, PropertySource};
use super::PropertyError;
use crate::config::{LevelOrigin, SettingsChain, SettingsLevel};

type ValueSource<V> = Arc<dyn PropertySource<Option<V>>>;

/// A typed property read through the settings chain.
pub struct HierarchicalProperty<K, V> {
    inner: Arc<PropertyInner<K, V>>,
}

struct PropertyInner<K, V> {
    path: ConfigPath,
    def: PropertyDef<K, V>,
    chain: Arc<SettingsChain>,
    /// Value source per level, valid while the level keeps the same tree snapshot.
    cache: Mutex<HashMap<LevelOrigin, CachedLevel<V>>>,
}

struct CachedLevel<V> {
    tree: ConfigTree,
    source: ValueSource<V>,
}

impl<K, V> PropertyInner<K, V>
where
    K: 'static,
    V: Clone + Send + Sync + 'static,
{
    fn decode_key(&self, origin: LevelOrigin, tree: &ConfigTree) -> Option<K> {
        let node = tree.at_path(&self.path)?;
        let key = self.def.key_encoding().decode(node);
        if key.is_none() && node.has_values() {
            tracing::debug!(property = %self.path, origin = %origin, "ignoring undecodable setting");
        }
        key
    }

    fn level_source(&self, level: &SettingsLevel) -> ValueSource<V> {
        let origin = level.origin();
        let tree = level.tree();

        if let Ok(cache) = self.cache.lock() {
            if let Some(cached) = cache.get(&origin) {
                if cached.tree.ptr_eq(&tree) {
                    return Arc::clone(&cached.source);
                }
            }
        }

        let key = self.decode_key(origin, &tree);
        let source = self.def.value_def().property(key);

        if let Ok(mut cache) = self.cache.lock() {
            cache.insert(
                origin,
                CachedLevel {
                    tree,
                    source: Arc::clone(&source),
                },
            );
        }
        source
    }

    fn value_at(&self, levels: &[Arc<SettingsLevel>]) -> Option<V> {
        let (level, parents) = levels.split_first()?;
        let child = self.level_source(level).get_value();
        let parent = if parents.is_empty() {
            ValueReference::fixed(None)
        } else {
            ValueReference::new(|| self.value_at(parents))
        };
        self.def.value_merger().merge_values(child, &parent)
    }

    fn effective_value(&self, origin: LevelOrigin) -> Option<V> {
        let levels = self.chain.levels_from(origin);
        self.value_at(&levels)
    }
}

impl<K, V> HierarchicalProperty<K, V>
where
    K: Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    pub fn new(path: impl Into<ConfigPath>, def: PropertyDef<K, V>, chain: Arc<SettingsChain>) -> Self {
        Self {
            inner: Arc::new(PropertyInner {
                path: path.into(),
                def,
                chain,
                cache: Mutex::new(HashMap::new()),
            }),
        }
    }

    pub fn path(&self) -> &ConfigPath {
        &self.inner.path
    }

    /// Effective value at `origin`, inheriting from less specific levels.
    pub fn get(&self, origin: LevelOrigin) -> Option<V> {
        self.inner.effective_value(origin)
    }

    /// Effective value for the project.
    pub fn value(&self) -> Option<V> {
        self.get(LevelOrigin::Project)
    }

    /// Value stored directly on `origin`, without inheritance.
    pub fn local_value(&self, origin: LevelOrigin) -> Option<V> {
        let level = self.inner.chain.level(origin)?;
        self.inner.level_source(&level).get_value()
    }

    /// Observable effective value at `origin`.
    pub fn source_at(&self, origin: LevelOrigin) -> Arc<dyn PropertySource<Option<V>>> {
        Arc::new(EffectiveSource {
            inner: Arc::clone(&self.inner),
            origin,
        })
    }

    /// Observable effective value for the project.
    pub fn active_source(&self) -> Arc<dyn PropertySource<Option<V>>> {
        self.source_at(LevelOrigin::Project)
    }

    /// Store `value` directly on `origin`; `None` removes the stored value
    /// so the level inherits again.
    pub fn set_at(&self, origin: LevelOrigin, value: Option<&V>) -> Result<(), PropertyError> {
        let subtree = match value {
            Some(value) => {
                let key = self.inner.def.value_def().key_from_value(value).ok_or_else(|| {
                    PropertyError::Unrepresentable {
                        path: self.inner.path.to_string(),
                    }
                })?;
                self.inner.def.key_encoding().encode(&key)
            }
            None => ConfigTree::empty(),
        };

        let path = &self.inner.path;
        self.inner
            .chain
            .update_level(origin, |tree| tree.with_path(path, subtree.clone()));
        tracing::debug!(property = %path, origin = %origin, "property stored");
        Ok(())
    }
}

impl<K, V> Clone for HierarchicalProperty<K, V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K, V> fmt::Debug for HierarchicalProperty<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HierarchicalProperty")
            .field("path", &self.inner.path)
            .finish_non_exhaustive()
    }
}

struct EffectiveSource<K, V> {
    inner: Arc<PropertyInner<K, V>>,
    origin: LevelOrigin,
}

impl<K, V> PropertySource<Option<V>> for EffectiveSource<K, V>
where
    K: Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn get_value(&self) -> Option<V> {
        self.inner.effective_value(self.origin)
    }

    fn add_change_listener(&self, listener: ChangeListener) -> ListenerRef {
        let watcher = Arc::new(EffectiveWatcher {
            inner: Arc::clone(&self.inner),
            origin: self.origin,
            listener,
            subscriptions: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
        });

        let structure = {
            let watcher = Arc::clone(&watcher);
            self.inner
                .chain
                .add_structure_listener(Arc::new(move || watcher.on_tree_changed()))
        };
        watcher.resubscribe();

        ListenerRef::new(move || {
            structure.unregister();
            watcher.close();
        })
    }
}

/// Keeps one subscriber attached to every level it depends on.
///
/// Subscriptions are rebuilt whenever the chain structure or a level tree
/// changes, because both change which value sources are consulted.
struct EffectiveWatcher<K, V> {
    inner: Arc<PropertyInner<K, V>>,
    origin: LevelOrigin,
    listener: ChangeListener,
    subscriptions: Mutex<Vec<ListenerRef>>,
    closed: AtomicBool,
}

impl<K, V> EffectiveWatcher<K, V>
where
    K: Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn on_tree_changed(self: &Arc<Self>) {
        if self.closed.load(Ordering::SeqCst) {
            return;
        }
        self.resubscribe();
        (self.listener)();
    }

    fn on_value_changed(&self) {
        if !self.closed.load(Ordering::SeqCst) {
            (self.listener)();
        }
    }

    fn resubscribe(self: &Arc<Self>) {
        let mut fresh = Vec::new();
        for level in self.inner.chain.levels_from(self.origin) {
            let watcher = Arc::clone(self);
            fresh.push(
                level
                    .tree_source()
                    .add_change_listener(Arc::new(move || watcher.on_tree_changed())),
            );

            let watcher = Arc::clone(self);
            fresh.push(
                self.inner
                    .level_source(&level)
                    .add_change_listener(Arc::new(move || watcher.on_value_changed())),
            );
        }

        let stale = match self.subscriptions.lock() {
            Ok(mut subscriptions) => std::mem::replace(&mut *subscriptions, fresh),
            Err(_) => fresh,
        };
        for subscription in stale {
            subscription.unregister();
        }

        if self.closed.load(Ordering::SeqCst) {
            self.close();
        }
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        let subscriptions = match self.subscriptions.lock() {
            Ok(mut subscriptions) => std::mem::take(&mut *subscriptions),
            Err(_) => Vec::new(),
        };
        for subscription in subscriptions {
            subscription.unregister();
        }
    }
}
