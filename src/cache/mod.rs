//! Process-wide caches for resolved recipes and discovered paths.
//!
//! The build orchestrator resolves many recipes during a single run (for
//! instance while walking a dependency graph), frequently hitting the same
//! sources, so resolution results and path-discovery answers are cached
//! for the life of the process. Both caches are unbounded and never
//! evicted; an explicit [`RecipeCache::invalidate`] entry point exists for
//! callers that change the world underneath them (tests, mostly).
//!
//! The cache is an explicit service injected into the resolution pipeline,
//! not ambient global state. Concurrent lookups use `DashMap` for
//! lock-free access; in addition, a per-key lock map guarantees at most
//! one in-flight resolution per cache key, so concurrent requests for the
//! same source either share the cached result or serialize behind the
//! single resolution, while requests for different keys proceed
//! independently.
//!
//! Cache hits hand out deep copies: every recipe a caller receives is
//! independently mutable, and a failed resolution never leaves a partial
//! entry behind.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use dashmap::DashMap;
use tracing::debug;

use crate::pipeline::ResolvedRecipe;

/// Key of one resolution request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    /// Canonical rendering of the source (path, or the literal text).
    pub source: String,
    /// Whether validation was requested.
    pub validate: bool,
    /// Whether the hidden flag was set.
    pub hidden: bool,
    /// Whether only parsing was requested.
    pub parse_only: bool,
}

/// The process-wide cache service.
#[derive(Default)]
pub struct RecipeCache {
    /// Resolution results by request key.
    recipes: DashMap<CacheKey, Vec<ResolvedRecipe>>,
    /// Per-key locks serializing in-flight resolutions.
    in_flight: DashMap<CacheKey, Arc<Mutex<()>>>,
    /// Discovered recipe paths by (name, full version).
    paths: DashMap<(String, String), PathBuf>,
}

impl RecipeCache {
    /// Creates an empty cache service.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A deep copy of the cached resolution result, if any.
    #[must_use]
    pub fn get_recipes(&self, key: &CacheKey) -> Option<Vec<ResolvedRecipe>> {
        self.recipes.get(key).map(|entry| {
            debug!("recipe cache hit for {}", key.source);
            entry.value().clone()
        })
    }

    /// Stores a resolution result.
    pub fn insert_recipes(&self, key: CacheKey, recipes: Vec<ResolvedRecipe>) {
        self.recipes.insert(key, recipes);
    }

    /// The lock serializing in-flight resolutions for a key.
    ///
    /// Callers lock it, re-check the cache, and resolve only on a second
    /// miss, so a key is resolved at most once at a time.
    #[must_use]
    pub fn flight_lock(&self, key: &CacheKey) -> Arc<Mutex<()>> {
        self.in_flight.entry(key.clone()).or_default().clone()
    }

    /// The cached discovery answer for a (name, full version) pair.
    #[must_use]
    pub fn get_path(&self, name: &str, version: &str) -> Option<PathBuf> {
        self.paths.get(&(name.to_string(), version.to_string())).map(|entry| {
            debug!("obtained recipe path from cache for {name}-{version}");
            entry.value().clone()
        })
    }

    /// Stores a discovery answer.
    pub fn insert_path(&self, name: &str, version: &str, path: PathBuf) {
        self.paths.insert((name.to_string(), version.to_string()), path);
    }

    /// Drops every cached entry.
    pub fn invalidate(&self) {
        self.recipes.clear();
        self.in_flight.clear();
        self.paths.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(source: &str) -> CacheKey {
        CacheKey {
            source: source.to_string(),
            validate: true,
            hidden: false,
            parse_only: false,
        }
    }

    #[test]
    fn test_path_cache_roundtrip() {
        let cache = RecipeCache::new();
        assert!(cache.get_path("GCC", "4.8.2").is_none());
        cache.insert_path("GCC", "4.8.2", PathBuf::from("/cfg/GCC/4.8.2.mf"));
        assert_eq!(cache.get_path("GCC", "4.8.2").unwrap(), PathBuf::from("/cfg/GCC/4.8.2.mf"));
        cache.invalidate();
        assert!(cache.get_path("GCC", "4.8.2").is_none());
    }

    #[test]
    fn test_flight_lock_is_shared_per_key() {
        let cache = RecipeCache::new();
        let a = cache.flight_lock(&key("one"));
        let b = cache.flight_lock(&key("one"));
        let c = cache.flight_lock(&key("two"));
        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &c));
    }

    #[test]
    fn test_keys_distinguish_flags() {
        let plain = key("src");
        let hidden = CacheKey { hidden: true, ..plain.clone() };
        let cache = RecipeCache::new();
        cache.insert_recipes(plain.clone(), Vec::new());
        assert!(cache.get_recipes(&plain).is_some());
        assert!(cache.get_recipes(&hidden).is_none());
    }
}
