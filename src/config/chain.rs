//! The inheritance chain of settings levels.
//!
//! Levels are kept ordered from most specific (project) to least specific
//! (built-in defaults). The level list and each level's tree are published
//! as whole snapshots; readers never see a partially updated chain.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use arc_swap::ArcSwap;
use projconf_tree::ConfigTree;
use serde::{Deserialize, Serialize};

use crate::property::{ChangeListener, ChangeListeners, ListenerRef, MutableProperty, PropertySource};

/// Where a settings level comes from, ordered by specificity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LevelOrigin {
    /// Settings file of the project itself.
    Project,
    /// Settings file of the enclosing root project.
    Root,
    /// Per-user defaults.
    Global,
    /// Hardcoded defaults.
    Builtin,
}

impl LevelOrigin {
    /// All origins, most specific first.
    pub const ALL: [LevelOrigin; 4] = [
        LevelOrigin::Project,
        LevelOrigin::Root,
        LevelOrigin::Global,
        LevelOrigin::Builtin,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Project => "project",
            Self::Root => "root",
            Self::Global => "global",
            Self::Builtin => "builtin",
        }
    }
}

impl fmt::Display for LevelOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LevelOrigin {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        LevelOrigin::ALL
            .into_iter()
            .find(|origin| origin.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown settings level '{}'", s))
    }
}

/// One level of the chain: an origin and its current tree snapshot.
pub struct SettingsLevel {
    origin: LevelOrigin,
    tree: MutableProperty<ConfigTree>,
}

impl SettingsLevel {
    fn new(origin: LevelOrigin, tree: ConfigTree) -> Self {
        Self {
            origin,
            tree: MutableProperty::new(tree),
        }
    }

    pub fn origin(&self) -> LevelOrigin {
        self.origin
    }

    pub fn tree(&self) -> ConfigTree {
        self.tree.get_value()
    }

    /// Observable tree snapshot of this level.
    pub fn tree_source(&self) -> &MutableProperty<ConfigTree> {
        &self.tree
    }

    /// Publish a new snapshot. Equal trees are not republished.
    pub fn set_tree(&self, tree: ConfigTree) -> bool {
        if *self.tree.snapshot() == tree {
            return false;
        }
        self.tree.set_value(tree);
        true
    }

    /// Atomically derive a new snapshot from the current one.
    pub fn update_tree<F>(&self, f: F)
    where
        F: FnMut(&ConfigTree) -> ConfigTree,
    {
        self.tree.update(f);
    }
}

impl fmt::Debug for SettingsLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SettingsLevel")
            .field("origin", &self.origin)
            .finish_non_exhaustive()
    }
}

/// Ordered settings levels, most specific first.
pub struct SettingsChain {
    levels: ArcSwap<Vec<Arc<SettingsLevel>>>,
    listeners: ChangeListeners,
}

impl SettingsChain {
    pub fn new() -> Self {
        Self {
            levels: ArcSwap::from_pointee(Vec::new()),
            listeners: ChangeListeners::new(),
        }
    }

    /// A chain holding `levels`. Later duplicates of an origin are ignored.
    pub fn with_levels<I>(levels: I) -> Self
    where
        I: IntoIterator<Item = (LevelOrigin, ConfigTree)>,
    {
        let mut built: Vec<Arc<SettingsLevel>> = Vec::new();
        for (origin, tree) in levels {
            if built.iter().all(|level| level.origin != origin) {
                built.push(Arc::new(SettingsLevel::new(origin, tree)));
            }
        }
        built.sort_by_key(|level| level.origin);

        Self {
            levels: ArcSwap::from_pointee(built),
            listeners: ChangeListeners::new(),
        }
    }

    /// Current levels, most specific first.
    pub fn levels(&self) -> Arc<Vec<Arc<SettingsLevel>>> {
        self.levels.load_full()
    }

    /// Levels at `origin` and every less specific one.
    pub fn levels_from(&self, origin: LevelOrigin) -> Vec<Arc<SettingsLevel>> {
        self.levels
            .load()
            .iter()
            .filter(|level| level.origin >= origin)
            .cloned()
            .collect()
    }

    pub fn level(&self, origin: LevelOrigin) -> Option<Arc<SettingsLevel>> {
        self.levels
            .load()
            .iter()
            .find(|level| level.origin == origin)
            .cloned()
    }

    pub fn origins(&self) -> Vec<LevelOrigin> {
        self.levels.load().iter().map(|level| level.origin).collect()
    }

    /// Publish `tree` for `origin`, adding the level when missing.
    ///
    /// Structure listeners fire only when a level was added.
    pub fn set_level(&self, origin: LevelOrigin, tree: ConfigTree) {
        if let Some(existing) = self.insert_level(origin, tree.clone()) {
            existing.set_tree(tree);
        }
    }

    /// Replace the tree of `origin` with `f(current)`, adding the level
    /// (starting from the empty tree) when missing.
    ///
    /// If another thread adds the level first, `f` is applied to its tree
    /// instead, so neither update is lost.
    pub fn update_level<F>(&self, origin: LevelOrigin, mut f: F)
    where
        F: FnMut(&ConfigTree) -> ConfigTree,
    {
        let existing = match self.level(origin) {
            Some(level) => level,
            None => match self.insert_level(origin, f(&ConfigTree::empty())) {
                Some(level) => level,
                None => return,
            },
        };
        existing.update_tree(f);
    }

    /// Add a level holding `tree` unless `origin` already has one.
    /// Returns the level already present, if any.
    fn insert_level(&self, origin: LevelOrigin, tree: ConfigTree) -> Option<Arc<SettingsLevel>> {
        let candidate = Arc::new(SettingsLevel::new(origin, tree));
        let mut existing = None;
        self.levels.rcu(|current| {
            existing = current.iter().find(|level| level.origin == origin).cloned();
            if existing.is_some() {
                return Arc::clone(current);
            }
            let mut next: Vec<Arc<SettingsLevel>> = current.to_vec();
            next.push(Arc::clone(&candidate));
            next.sort_by_key(|level| level.origin);
            Arc::new(next)
        });

        if existing.is_none() {
            tracing::debug!(origin = %origin, "settings level added");
            self.listeners.fire();
        }
        existing
    }

    /// Remove the level for `origin`. Returns `true` if it existed.
    pub fn remove_level(&self, origin: LevelOrigin) -> bool {
        let mut removed = false;
        self.levels.rcu(|current| {
            removed = current.iter().any(|level| level.origin == origin);
            if !removed {
                return Arc::clone(current);
            }
            Arc::new(
                current
                    .iter()
                    .filter(|level| level.origin != origin)
                    .cloned()
                    .collect::<Vec<_>>(),
            )
        });

        if removed {
            tracing::debug!(origin = %origin, "settings level removed");
            self.listeners.fire();
        }
        removed
    }

    /// Called when a level is added or removed.
    pub fn add_structure_listener(&self, listener: ChangeListener) -> ListenerRef {
        self.listeners.register(listener)
    }
}

impl Default for SettingsChain {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SettingsChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SettingsChain")
            .field("levels", &self.origins())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn leaf(value: &str) -> ConfigTree {
        ConfigTree::single_value(value)
    }

    #[test]
    fn test_origin_ordering_and_parsing() {
        assert!(LevelOrigin::Project < LevelOrigin::Root);
        assert!(LevelOrigin::Global < LevelOrigin::Builtin);
        assert_eq!("ROOT".parse::<LevelOrigin>(), Ok(LevelOrigin::Root));
        assert!("nowhere".parse::<LevelOrigin>().is_err());
    }

    #[test]
    fn test_levels_are_sorted() {
        let chain = SettingsChain::with_levels(vec![
            (LevelOrigin::Builtin, leaf("b")),
            (LevelOrigin::Project, leaf("p")),
            (LevelOrigin::Project, leaf("ignored")),
        ]);
        assert_eq!(chain.origins(), vec![LevelOrigin::Project, LevelOrigin::Builtin]);
        assert_eq!(chain.level(LevelOrigin::Project).unwrap().tree(), leaf("p"));
    }

    #[test]
    fn test_set_level_fires_structure_listeners_only_on_add() {
        let chain = SettingsChain::with_levels(vec![(LevelOrigin::Builtin, leaf("b"))]);
        let count = Arc::new(AtomicUsize::new(0));
        let listener_count = Arc::clone(&count);
        let _registration = chain.add_structure_listener(Arc::new(move || {
            listener_count.fetch_add(1, Ordering::SeqCst);
        }));

        chain.set_level(LevelOrigin::Root, leaf("r"));
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(
            chain.origins(),
            vec![LevelOrigin::Root, LevelOrigin::Builtin]
        );

        chain.set_level(LevelOrigin::Root, leaf("r2"));
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(chain.level(LevelOrigin::Root).unwrap().tree(), leaf("r2"));

        assert!(chain.remove_level(LevelOrigin::Root));
        assert!(!chain.remove_level(LevelOrigin::Root));
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_levels_from() {
        let chain = SettingsChain::with_levels(
            LevelOrigin::ALL.into_iter().map(|origin| (origin, leaf(origin.as_str()))),
        );
        let origins: Vec<_> = chain
            .levels_from(LevelOrigin::Global)
            .iter()
            .map(|level| level.origin())
            .collect();
        assert_eq!(origins, vec![LevelOrigin::Global, LevelOrigin::Builtin]);
    }

    #[test]
    fn test_concurrent_level_updates() {
        let chain = Arc::new(SettingsChain::new());
        std::thread::scope(|scope| {
            for origin in LevelOrigin::ALL {
                let chain = Arc::clone(&chain);
                scope.spawn(move || chain.set_level(origin, leaf(origin.as_str())));
            }
        });
        assert_eq!(chain.origins(), LevelOrigin::ALL.to_vec());
    }

    #[test]
    fn test_racing_updates_on_missing_level_compose() {
        use projconf_tree::ConfigPath;
        use std::sync::Barrier;

        for _ in 0..200 {
            let chain = SettingsChain::new();
            let barrier = Barrier::new(2);
            std::thread::scope(|scope| {
                for key in ["a", "b"] {
                    let chain = &chain;
                    let barrier = &barrier;
                    scope.spawn(move || {
                        barrier.wait();
                        chain.update_level(LevelOrigin::Root, |tree| {
                            tree.with_path(&ConfigPath::parse(key), leaf(key))
                        });
                    });
                }
            });

            let tree = chain.level(LevelOrigin::Root).unwrap().tree();
            assert_eq!(tree.child_tree("a").value(), Some("a"));
            assert_eq!(tree.child_tree("b").value(), Some("b"));
            assert_eq!(chain.origins(), vec![LevelOrigin::Root]);
        }
    }
}
