//! Name-keyed registry shared by view factories and data sources.

use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};

/// Thread-safe map from names to shared resources.
///
/// Lookups without a name follow the **single-or-default** rule: with exactly
/// one entry, that entry; otherwise the entry registered under the configured
/// default name; otherwise nothing.
pub struct NamedRegistry<R: ?Sized> {
    entries: RwLock<BTreeMap<String, Arc<R>>>,
}

impl<R: ?Sized> Default for NamedRegistry<R> {
    fn default() -> Self {
        Self {
            entries: RwLock::new(BTreeMap::new()),
        }
    }
}

impl<R: ?Sized> NamedRegistry<R> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert under `name`, returning the entry it replaced.
    pub fn insert(&self, name: impl Into<String>, resource: Arc<R>) -> Option<Arc<R>> {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.into(), resource)
    }

    pub fn remove(&self, name: &str) -> Option<Arc<R>> {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(name)
    }

    pub fn get(&self, name: &str) -> Option<Arc<R>> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Registered names in sorted order.
    pub fn names(&self) -> Vec<String> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }

    /// Apply the single-or-default rule.
    pub fn resolve(&self, default_name: Option<&str>) -> Option<Arc<R>> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        if entries.len() == 1 {
            return entries.values().next().cloned();
        }
        default_name.and_then(|name| entries.get(name).cloned())
    }
}

impl<R: ?Sized> core::fmt::Debug for NamedRegistry<R> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("NamedRegistry")
            .field("names", &self.names())
            .finish()
    }
}
