//! # Schema Cache
//!
//! Per-type memoization of [`SchemaMap`]s.
//!
//! ## Locking
//!
//! - Fast path: a shared read lock guards the lookup. A hit returns without
//!   ever touching the exclusive lock.
//! - Slow path: on a miss the exclusive lock is taken and the table is
//!   checked **again**, because another caller may have built the entry
//!   between the two locks. Only if it is still missing is the walker run.
//!
//! The lock is `parking_lot::RwLock` (non-poisoning). No lock is held while a
//! caller uses a returned map; maps are shared as `Arc<SchemaMap>` and are
//! never mutated or removed after insertion. The type universe is fixed at
//! compile time, so the table is bounded and never evicted.

use std::any::{type_name, TypeId};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};

use parking_lot::RwLock;

use crate::schema::SchemaMap;
use crate::shape::Reflect;

/// A concurrent, never-evicting table of Schema Maps keyed by type.
#[derive(Debug, Default)]
pub struct SchemaCache {
    maps: RwLock<HashMap<TypeId, Arc<SchemaMap>>>,
    builds: AtomicUsize,
}

impl SchemaCache {
    /// An empty cache. Most callers use [`SchemaCache::global`].
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide cache.
    pub fn global() -> &'static SchemaCache {
        static GLOBAL: OnceLock<SchemaCache> = OnceLock::new();
        GLOBAL.get_or_init(SchemaCache::new)
    }

    /// Return the Schema Map for `T`, building it on first use.
    pub fn get<T: Reflect>(&self) -> Arc<SchemaMap> {
        let key = TypeId::of::<T>();

        {
            let maps = self.maps.read();
            if let Some(map) = maps.get(&key) {
                return Arc::clone(map);
            }
        }

        let mut maps = self.maps.write();
        if let Some(map) = maps.get(&key) {
            return Arc::clone(map);
        }

        let map = Arc::new(SchemaMap::build::<T>());
        self.builds.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(
            type_name = type_name::<T>(),
            paths = map.len(),
            "built schema map"
        );
        maps.insert(key, Arc::clone(&map));
        map
    }

    /// True if a map for `T` has already been built.
    pub fn contains<T: Reflect>(&self) -> bool {
        self.maps.read().contains_key(&TypeId::of::<T>())
    }

    /// Number of distinct types cached.
    pub fn len(&self) -> usize {
        self.maps.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of times the walker has run for this cache.
    pub fn build_count(&self) -> usize {
        self.builds.load(Ordering::Relaxed)
    }
}

/// The cached Schema Map for `T` from the process-wide cache.
pub fn schema_map<T: Reflect>() -> Arc<SchemaMap> {
    SchemaCache::global().get::<T>()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shape::{shape_of, Field, Shape};

    struct Sample;
    impl Reflect for Sample {
        fn shape() -> Shape {
            Shape::structure(
                "Sample",
                vec![
                    Field::named("Name", shape_of::<String>).json("name"),
                    Field::named("Count", shape_of::<Option<u32>>).json("count"),
                ],
            )
        }
    }

    struct Other;
    impl Reflect for Other {
        fn shape() -> Shape {
            Shape::structure("Other", vec![Field::named("Flag", shape_of::<bool>)])
        }
    }

    #[test]
    fn test_first_get_builds_once() {
        let cache = SchemaCache::new();
        assert!(cache.is_empty());
        assert!(!cache.contains::<Sample>());

        let a = cache.get::<Sample>();
        let b = cache.get::<Sample>();

        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(cache.build_count(), 1);
        assert_eq!(cache.len(), 1);
        assert!(cache.contains::<Sample>());
    }

    #[test]
    fn test_distinct_types_distinct_entries() {
        let cache = SchemaCache::new();
        let a = cache.get::<Sample>();
        let b = cache.get::<Other>();
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.build_count(), 2);
        assert!(a.contains("Name"));
        assert!(b.contains("Flag"));
    }

    #[test]
    fn test_cached_equals_fresh_build() {
        let cache = SchemaCache::new();
        assert_eq!(*cache.get::<Sample>(), SchemaMap::build::<Sample>());
    }

    #[test]
    fn test_racing_first_use_builds_once() {
        let cache = SchemaCache::new();
        let maps: Vec<Arc<SchemaMap>> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..16)
                .map(|_| scope.spawn(|| cache.get::<Sample>()))
                .collect();
            handles
                .into_iter()
                .map(|h| h.join().expect("worker panicked"))
                .collect()
        });

        assert_eq!(cache.build_count(), 1);
        for map in &maps {
            assert!(Arc::ptr_eq(map, &maps[0]));
            assert_eq!(map.len(), 2);
        }
    }

    #[test]
    fn test_global_cache_is_shared() {
        let a = schema_map::<Other>();
        let b = SchemaCache::global().get::<Other>();
        assert!(Arc::ptr_eq(&a, &b));
    }
}
