//! Observable value sources
//!
//! A [`PropertySource`] exposes a current value and notifies subscribers
//! when it changes. Notification carries no payload: subscribers read the
//! current value when called. Callbacks always run with no lock held, so
//! they may read other properties or unregister themselves.

use std::fmt;
use std::sync::{Arc, Mutex, Weak};

use arc_swap::ArcSwap;

/// Callback invoked after a source changed.
pub type ChangeListener = Arc<dyn Fn() + Send + Sync>;

/// A read-only, push-notified value.
pub trait PropertySource<V>: Send + Sync {
    /// Current value.
    fn get_value(&self) -> V;

    /// Register `listener` to be called after every change.
    ///
    /// The listener stays registered until [`ListenerRef::unregister`] is
    /// called; dropping the returned handle does not unregister it.
    fn add_change_listener(&self, listener: ChangeListener) -> ListenerRef;
}

/// Handle to a registered listener.
pub struct ListenerRef {
    unregister: Mutex<Option<Box<dyn FnOnce() + Send>>>,
}

impl ListenerRef {
    pub fn new(unregister: impl FnOnce() + Send + 'static) -> Self {
        Self {
            unregister: Mutex::new(Some(Box::new(unregister))),
        }
    }

    /// A handle for sources that never change.
    pub fn noop() -> Self {
        Self {
            unregister: Mutex::new(None),
        }
    }

    /// Stop notifications. Calling this more than once has no effect.
    pub fn unregister(&self) {
        let action = self.unregister.lock().ok().and_then(|mut slot| slot.take());
        if let Some(action) = action {
            action();
        }
    }

    pub fn is_registered(&self) -> bool {
        self.unregister
            .lock()
            .map(|slot| slot.is_some())
            .unwrap_or(false)
    }
}

impl fmt::Debug for ListenerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerRef")
            .field("registered", &self.is_registered())
            .finish()
    }
}

#[derive(Default)]
struct ListenerList {
    next_id: u64,
    entries: Vec<(u64, ChangeListener)>,
}

/// A list of change listeners that can be fired from any thread.
#[derive(Clone, Default)]
pub struct ChangeListeners {
    inner: Arc<Mutex<ListenerList>>,
}

impl ChangeListeners {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, listener: ChangeListener) -> ListenerRef {
        let id = match self.inner.lock() {
            Ok(mut list) => {
                let id = list.next_id;
                list.next_id += 1;
                list.entries.push((id, listener));
                id
            }
            Err(_) => return ListenerRef::noop(),
        };

        let list: Weak<Mutex<ListenerList>> = Arc::downgrade(&self.inner);
        ListenerRef::new(move || {
            if let Some(list) = list.upgrade() {
                if let Ok(mut list) = list.lock() {
                    list.entries.retain(|(entry_id, _)| *entry_id != id);
                }
            }
        })
    }

    /// Call every registered listener in registration order.
    pub fn fire(&self) {
        let snapshot: Vec<ChangeListener> = match self.inner.lock() {
            Ok(list) => list.entries.iter().map(|(_, l)| Arc::clone(l)).collect(),
            Err(_) => return,
        };
        for listener in snapshot {
            listener();
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().map(|list| list.entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for ChangeListeners {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangeListeners")
            .field("len", &self.len())
            .finish()
    }
}

/// A settable source with wait-free reads.
pub struct MutableProperty<V> {
    value: ArcSwap<V>,
    listeners: ChangeListeners,
}

impl<V> MutableProperty<V>
where
    V: Clone + Send + Sync + 'static,
{
    pub fn new(value: V) -> Self {
        Self {
            value: ArcSwap::from_pointee(value),
            listeners: ChangeListeners::new(),
        }
    }

    /// The current value without cloning it.
    pub fn snapshot(&self) -> Arc<V> {
        self.value.load_full()
    }

    /// Publish `value` and notify listeners.
    pub fn set_value(&self, value: V) {
        self.value.store(Arc::new(value));
        self.listeners.fire();
    }

    /// Atomically replace the value with `f(current)` and notify listeners.
    ///
    /// `f` may run more than once under contention.
    pub fn update<F>(&self, mut f: F)
    where
        F: FnMut(&V) -> V,
    {
        self.value.rcu(|current| Arc::new(f(current)));
        self.listeners.fire();
    }
}

impl<V> PropertySource<V> for MutableProperty<V>
where
    V: Clone + Send + Sync + 'static,
{
    fn get_value(&self) -> V {
        V::clone(&self.value.load())
    }

    fn add_change_listener(&self, listener: ChangeListener) -> ListenerRef {
        self.listeners.register(listener)
    }
}

impl<V> fmt::Debug for MutableProperty<V>
where
    V: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MutableProperty")
            .field("value", &self.value.load_full())
            .field("listeners", &self.listeners)
            .finish()
    }
}

struct ConstSource<V> {
    value: V,
}

impl<V> PropertySource<V> for ConstSource<V>
where
    V: Clone + Send + Sync,
{
    fn get_value(&self) -> V {
        self.value.clone()
    }

    fn add_change_listener(&self, _listener: ChangeListener) -> ListenerRef {
        ListenerRef::noop()
    }
}

/// A source that always holds `value`.
pub fn const_source<V>(value: V) -> Arc<dyn PropertySource<V>>
where
    V: Clone + Send + Sync + 'static,
{
    Arc::new(ConstSource { value })
}

struct ConvertedSource<T, V> {
    source: Arc<dyn PropertySource<T>>,
    convert: Box<dyn Fn(T) -> V + Send + Sync>,
}

impl<T, V> PropertySource<V> for ConvertedSource<T, V> {
    fn get_value(&self) -> V {
        (self.convert)(self.source.get_value())
    }

    fn add_change_listener(&self, listener: ChangeListener) -> ListenerRef {
        self.source.add_change_listener(listener)
    }
}

/// A source whose value is `convert` applied to the value of `source`.
pub fn convert<T, V, F>(source: Arc<dyn PropertySource<T>>, convert: F) -> Arc<dyn PropertySource<V>>
where
    T: 'static,
    V: 'static,
    F: Fn(T) -> V + Send + Sync + 'static,
{
    Arc::new(ConvertedSource {
        source,
        convert: Box::new(convert),
    })
}
