//! Per-run module cache.
//!
//! `register` is the only way to put a module into the cache. It inserts
//! only when the key is absent and runs the supplied hook on that first
//! insertion, so the hook fires at most once per key for the whole run.

use std::collections::HashMap;
use std::path::PathBuf;

/// Which strategy produced a cached module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadSource {
    /// Found by the search-path resolver at this canonical path.
    Resolver(PathBuf),
    /// Produced by the runtime's own loader (built-in or template search).
    Runtime,
}

#[derive(Debug, Clone)]
pub struct CachedModule<V> {
    pub value: V,
    pub source: LoadSource,
}

#[derive(Debug)]
pub struct ModuleCache<V> {
    entries: HashMap<String, CachedModule<V>>,
}

impl<V> Default for ModuleCache<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> ModuleCache<V> {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&CachedModule<V>> {
        self.entries.get(key)
    }

    /// Insert `value` under `key` unless the key is already present.
    ///
    /// Returns `true` when this call inserted. `on_first` runs only in that
    /// case; an existing entry is never replaced.
    pub fn register<F>(&mut self, key: &str, value: V, source: LoadSource, on_first: F) -> bool
    where
        F: FnOnce(&str, &LoadSource),
    {
        if self.entries.contains_key(key) {
            return false;
        }

        on_first(key, &source);
        self.entries
            .insert(key.to_string(), CachedModule { value, source });
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hook_fires_once_per_key() {
        let mut cache = ModuleCache::new();
        let mut fired = Vec::new();

        assert!(cache.register("a", 1, LoadSource::Runtime, |k, _| fired.push(k.to_string())));
        assert!(!cache.register("a", 2, LoadSource::Runtime, |k, _| fired.push(k.to_string())));
        assert!(cache.register("b", 3, LoadSource::Runtime, |k, _| fired.push(k.to_string())));

        assert_eq!(fired, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(cache.get("a").map(|e| e.value), Some(1));
        assert_eq!(cache.get("b").map(|e| e.value), Some(3));
    }

    #[test]
    fn test_existing_entry_is_kept() {
        let mut cache = ModuleCache::new();
        let path = PathBuf::from("/m/a.t");
        cache.register("a", "first", LoadSource::Resolver(path.clone()), |_, _| {});
        cache.register("a", "second", LoadSource::Runtime, |_, _| {});

        let entry = cache.get("a").unwrap();
        assert_eq!(entry.value, "first");
        assert_eq!(entry.source, LoadSource::Resolver(path));
    }
}
