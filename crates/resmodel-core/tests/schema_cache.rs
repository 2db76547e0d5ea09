//! # Schema Map Construction and Caching
//!
//! Cross-module checks: the walker's output for a realistic nested type,
//! embedding flattening, JSON path translation, and cache coherence when
//! many threads race on first use.

use std::collections::BTreeMap;
use std::sync::{Arc, Barrier};
use std::thread;

use resmodel_core::{
    shape_of, Field, NodeKind, Reflect, SchemaCache, SchemaMap, Shape, Timestamp, VisibilityFlags,
    VisibilityMap,
};

struct Envelope;
impl Reflect for Envelope {
    fn shape() -> Shape {
        Shape::structure(
            "CacheEnvelope",
            vec![
                Field::named("ID", shape_of::<String>).json("id").visibility("read"),
                Field::named("Location", shape_of::<String>)
                    .json("location")
                    .visibility("read create"),
            ],
        )
    }
}

struct Version;
impl Reflect for Version {
    fn shape() -> Shape {
        Shape::structure(
            "CacheVersion",
            vec![
                Field::named("ID", shape_of::<String>).json("id"),
                Field::named("ChannelGroup", shape_of::<String>).json("channelGroup"),
            ],
        )
    }
}

struct Taint;
impl Reflect for Taint {
    fn shape() -> Shape {
        Shape::structure(
            "CacheTaint",
            vec![
                Field::named("Key", shape_of::<String>).json("key"),
                Field::named("Effect", shape_of::<String>).json("effect"),
            ],
        )
    }
}

struct Properties;
impl Reflect for Properties {
    fn shape() -> Shape {
        Shape::structure(
            "CacheProperties",
            vec![
                Field::named("Version", shape_of::<Version>)
                    .json("version")
                    .visibility("read create"),
                Field::named("Taints", shape_of::<Vec<Taint>>).json("taints"),
                Field::named("Labels", shape_of::<BTreeMap<String, String>>).json("labels"),
                Field::named("Expires", shape_of::<Option<Timestamp>>).json("expires"),
                Field::private("cosmosUID", shape_of::<String>),
            ],
        )
    }
}

struct NodePool;
impl Reflect for NodePool {
    fn shape() -> Shape {
        Shape::structure(
            "CacheNodePool",
            vec![
                Field::embedded("Envelope", shape_of::<Envelope>),
                Field::named("Properties", shape_of::<Option<Properties>>).json("properties"),
            ],
        )
    }
}

// =========================================================================
// Walker output
// =========================================================================

#[test]
fn walker_indexes_every_exported_field() {
    let schema = SchemaMap::build::<NodePool>();
    let paths: Vec<&str> = schema.paths().collect();
    assert_eq!(
        paths,
        vec![
            "ID",
            "Location",
            "Properties",
            "Properties.Expires",
            "Properties.Labels",
            "Properties.Taints",
            "Properties.Taints.Effect",
            "Properties.Taints.Key",
            "Properties.Version",
            "Properties.Version.ChannelGroup",
            "Properties.Version.ID",
        ]
    );
}

#[test]
fn embedded_fields_flatten_into_parent() {
    let schema = SchemaMap::build::<NodePool>();
    assert!(schema.contains("Location"));
    assert!(!schema.contains("Envelope"));
    assert!(!schema.contains("Envelope.Location"));
}

#[test]
fn node_kinds_and_wrapping() {
    let schema = SchemaMap::build::<NodePool>();
    let taints = schema.get("Properties.Taints").unwrap();
    assert_eq!(taints.node, NodeKind::Composite);
    assert!(taints.wrapped);
    let labels = schema.get("Properties.Labels").unwrap();
    assert_eq!(labels.node, NodeKind::Leaf);
    assert!(labels.wrapped);
    assert!(!schema.get("Properties.Version").unwrap().wrapped);
}

#[test]
fn json_paths_follow_wire_names() {
    let schema = SchemaMap::build::<NodePool>();
    assert_eq!(
        schema.json_path("Properties.Version.ChannelGroup").as_deref(),
        Some("properties.version.channelGroup")
    );
    assert_eq!(
        schema.canonical_path("properties.taints.effect"),
        Some("Properties.Taints.Effect")
    );
    assert_eq!(schema.json_path("Properties.Nope"), None);
}

#[test]
fn walker_is_deterministic() {
    let a = SchemaMap::build::<NodePool>();
    let b = SchemaMap::build::<NodePool>();
    assert_eq!(a, b);
}

// =========================================================================
// Visibility derivation over the same type
// =========================================================================

#[test]
fn derived_visibility_covers_schema() {
    let schema = SchemaMap::build::<NodePool>();
    let vis = VisibilityMap::from_schema(&schema).unwrap();
    vis.check_consistency(&schema).unwrap();

    assert_eq!(vis.flags("ID"), VisibilityFlags::READ);
    assert_eq!(vis.flags("Properties"), VisibilityFlags::SKIP);
    assert_eq!(
        vis.flags("Properties.Version.ChannelGroup"),
        VisibilityFlags::READ | VisibilityFlags::CREATE
    );
    assert_eq!(
        vis.flags("Properties.Taints.Key"),
        VisibilityFlags::DEFAULT | VisibilityFlags::NULLABLE
    );
}

// =========================================================================
// Cache coherence
// =========================================================================

#[test]
fn racing_first_use_builds_once() {
    const THREADS: usize = 32;
    let cache = Arc::new(SchemaCache::new());
    let barrier = Arc::new(Barrier::new(THREADS));

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let cache = Arc::clone(&cache);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                cache.get::<NodePool>()
            })
        })
        .collect();

    let maps: Vec<Arc<SchemaMap>> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert_eq!(cache.build_count(), 1);
    assert_eq!(cache.len(), 1);
    for m in &maps[1..] {
        assert!(Arc::ptr_eq(&maps[0], m));
    }
}

#[test]
fn distinct_types_get_distinct_entries() {
    let cache = SchemaCache::new();
    let pool = cache.get::<NodePool>();
    let version = cache.get::<Version>();
    assert_eq!(cache.len(), 2);
    assert_ne!(pool.len(), version.len());
    assert!(cache.contains::<Version>());
    assert!(!cache.contains::<Taint>());
}
