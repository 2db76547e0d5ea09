//! # Schema Map Reuse
//!
//! The engine reads a kind's rules and visibility from the process-wide
//! caches. Kept in its own test binary so the global build counter is not
//! moved by unrelated tests.

use std::sync::Arc;

use resmodel_core::{schema_map, shape_of, Field, Reflect, RequestKind, SchemaCache, Shape};
use resmodel_validate::{visibility_of, ResourceKind, StructuralBackend, ValidationConfig, ValidationEngine};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Volume {
    #[serde(default)]
    name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    size_gib: Option<i64>,
}

impl Reflect for Volume {
    fn shape() -> Shape {
        Shape::structure(
            "Volume",
            vec![
                Field::named("Name", shape_of::<String>)
                    .json("name")
                    .validate("required")
                    .visibility("read create"),
                Field::named("SizeGiB", shape_of::<Option<i64>>)
                    .json("size_gib")
                    .validate("omitempty,min=1,max=4096"),
            ],
        )
    }
}

impl ResourceKind for Volume {
    const RESOURCE_TYPE: &'static str = "Test.Storage/volumes";
}

#[test]
fn repeated_validation_never_rebuilds_the_schema_map() {
    let volume = Volume {
        name: "data".to_string(),
        size_gib: Some(8000),
    };
    let engines = [
        ValidationEngine::default(),
        ValidationEngine::new(ValidationConfig {
            structural_backend: StructuralBackend::JsonSchema,
            ..ValidationConfig::default()
        }),
    ];

    let first = engines[0].validate(&volume);
    assert_eq!(first.len(), 1);
    assert_eq!(first[0].target, "size_gib");

    let cache = SchemaCache::global();
    let builds = cache.build_count();
    let map = schema_map::<Volume>();
    let visibility = visibility_of::<Volume>().unwrap();

    for engine in &engines {
        for _ in 0..5 {
            assert_eq!(engine.validate(&volume).len(), 1);
            assert!(engine
                .validate_request(RequestKind::Create, &volume, None)
                .is_err());
            engine.render(&volume).unwrap();
        }
    }

    assert_eq!(cache.build_count(), builds);
    assert!(Arc::ptr_eq(&map, &schema_map::<Volume>()));
    assert!(Arc::ptr_eq(&visibility, &visibility_of::<Volume>().unwrap()));
}
