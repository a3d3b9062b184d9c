//! Capability lookup
//!
//! A [`Lookup`] holds shared service instances keyed by the type they were
//! registered under: a concrete type or a `dyn Trait` capability. One
//! instance may be registered under several capabilities.

use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

struct Entry {
    type_id: TypeId,
    type_name: &'static str,
    /// Always an `Arc<T>` for the `T` behind `type_id`.
    instance: Box<dyn Any + Send + Sync>,
}

impl Entry {
    fn new<T>(instance: Arc<T>) -> Self
    where
        T: ?Sized + Send + Sync + 'static,
    {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
            instance: Box::new(instance),
        }
    }

    fn downcast<T>(&self) -> Option<Arc<T>>
    where
        T: ?Sized + 'static,
    {
        if self.type_id != TypeId::of::<T>() {
            return None;
        }
        self.instance.downcast_ref::<Arc<T>>().map(Arc::clone)
    }
}

/// Collects registrations in order.
#[derive(Default)]
pub struct LookupBuilder {
    entries: Vec<Entry>,
}

impl LookupBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `instance` under the capability `T`.
    pub fn add<T>(&mut self, instance: Arc<T>) -> &mut Self
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.entries.push(Entry::new(instance));
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn build(self) -> Lookup {
        Lookup {
            entries: self.entries,
        }
    }
}

/// Immutable set of registered capabilities.
#[derive(Default)]
pub struct Lookup {
    entries: Vec<Entry>,
}

impl Lookup {
    pub fn builder() -> LookupBuilder {
        LookupBuilder::new()
    }

    /// First instance registered under `T`.
    pub fn lookup<T>(&self) -> Option<Arc<T>>
    where
        T: ?Sized + 'static,
    {
        self.entries.iter().find_map(Entry::downcast::<T>)
    }

    /// Every instance registered under `T`, in registration order.
    pub fn lookup_all<T>(&self) -> Vec<Arc<T>>
    where
        T: ?Sized + 'static,
    {
        self.entries.iter().filter_map(Entry::downcast::<T>).collect()
    }

    pub fn contains<T>(&self) -> bool
    where
        T: ?Sized + 'static,
    {
        let type_id = TypeId::of::<T>();
        self.entries.iter().any(|entry| entry.type_id == type_id)
    }

    /// Capability type names in registration order.
    pub fn capabilities(&self) -> Vec<&'static str> {
        self.entries.iter().map(|entry| entry.type_name).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for Lookup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.capabilities()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    trait Greeter: Send + Sync {
        fn greet(&self) -> String;
    }

    struct English;
    struct French;

    impl Greeter for English {
        fn greet(&self) -> String {
            "hello".to_string()
        }
    }

    impl Greeter for French {
        fn greet(&self) -> String {
            "bonjour".to_string()
        }
    }

    #[test]
    fn test_lookup_by_trait_and_concrete_type() {
        let english = Arc::new(English);
        let mut builder = Lookup::builder();
        builder
            .add(Arc::clone(&english))
            .add(english as Arc<dyn Greeter>)
            .add(Arc::new(French) as Arc<dyn Greeter>)
            .add(Arc::new(42u32));
        let lookup = builder.build();

        assert_eq!(lookup.len(), 4);
        assert!(lookup.lookup::<English>().is_some());
        assert!(lookup.lookup::<French>().is_none());
        assert_eq!(lookup.lookup::<dyn Greeter>().unwrap().greet(), "hello");
        assert_eq!(lookup.lookup::<u32>().as_deref(), Some(&42));
    }

    #[test]
    fn test_lookup_all_returns_every_instance() {
        let mut builder = Lookup::builder();
        builder.add(Arc::new(French) as Arc<dyn Greeter>);
        builder.add(Arc::new(7u8));
        builder.add(Arc::new(English) as Arc<dyn Greeter>);
        let lookup = builder.build();

        let greetings: Vec<String> = lookup
            .lookup_all::<dyn Greeter>()
            .iter()
            .map(|greeter| greeter.greet())
            .collect();
        assert_eq!(greetings, vec!["bonjour".to_string(), "hello".to_string()]);
        assert!(lookup.lookup_all::<String>().is_empty());
        assert!(lookup.contains::<u8>());
    }

    #[test]
    fn test_capabilities_names() {
        let mut builder = Lookup::builder();
        builder.add(Arc::new(English) as Arc<dyn Greeter>);
        let lookup = builder.build();
        assert!(lookup.capabilities()[0].contains("Greeter"));
    }
}
