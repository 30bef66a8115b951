//! The stat lookup contract.
//!
//! Everything outside the engine (targeting, UI, weapons) and the engine
//! itself resolves stats through [`StatOwner::get_stat`] by name.

use std::rc::Rc;

use rustc_hash::FxHashMap;

use super::handle::StatHandle;
use super::stat::Stat;

/// Any type that owns named stats.
pub trait StatOwner {
    /// Look up a stat by name.
    fn get_stat(&self, name: &str) -> Option<StatHandle>;
}

impl<T: StatOwner + ?Sized> StatOwner for Rc<T> {
    fn get_stat(&self, name: &str) -> Option<StatHandle> {
        (**self).get_stat(name)
    }
}

impl<T: StatOwner + ?Sized> StatOwner for &T {
    fn get_stat(&self, name: &str) -> Option<StatHandle> {
        (**self).get_stat(name)
    }
}

/// A plain name-keyed collection of stats.
///
/// ```
/// use buff_engine::stats::{Stat, StatBlock, StatOwner};
///
/// let block = StatBlock::new()
///     .with_stat("health", Stat::new(100.0, 0.0, 100.0))
///     .with_stat("speed", Stat::unbounded(5.0));
///
/// assert_eq!(block.get_stat("speed").unwrap().get_value(), 5.0);
/// assert!(block.get_stat("mana").is_none());
/// ```
#[derive(Clone, Debug, Default)]
pub struct StatBlock {
    stats: FxHashMap<String, StatHandle>,
}

impl StatBlock {
    /// Create an empty block.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a stat (builder pattern).
    #[must_use]
    pub fn with_stat(mut self, name: impl Into<String>, stat: Stat) -> Self {
        self.insert(name, stat);
        self
    }

    /// Add or replace a stat, returning its handle.
    pub fn insert(&mut self, name: impl Into<String>, stat: Stat) -> StatHandle {
        let handle = StatHandle::new(stat);
        self.stats.insert(name.into(), handle.clone());
        handle
    }

    /// Stat names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.stats.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Number of stats.
    #[must_use]
    pub fn len(&self) -> usize {
        self.stats.len()
    }

    /// Whether the block has no stats.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stats.is_empty()
    }
}

impl StatOwner for StatBlock {
    fn get_stat(&self, name: &str) -> Option<StatHandle> {
        self.stats.get(name).cloned()
    }
}
