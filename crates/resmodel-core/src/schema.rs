//! # Schema Map
//!
//! The flattened index of a type's field tree: canonical field path →
//! [`FieldInfo`]. Built by the [walker](crate::walker) and memoized per type
//! by the [cache](crate::cache). Read-only after construction.
//!
//! Wire paths are indexed in both directions as entries are inserted, so
//! [`SchemaMap::json_path`] and [`SchemaMap::canonical_path`] are lookups.

use std::any::TypeId;
use std::collections::BTreeMap;

use crate::path;
use crate::shape::{shape_of, Field, FieldTag, Reflect, Shape};
use crate::walker::walk;

/// Whether a path is a leaf or a composite (struct-valued) node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Leaf,
    Composite,
}

/// Metadata recorded for one field path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldInfo {
    /// Canonical field name (last path segment).
    pub name: &'static str,
    /// Declared tag.
    pub tag: FieldTag,
    /// Leaf or composite.
    pub node: NodeKind,
    /// The field's outermost shape is an optional, sequence, or map wrapper.
    pub wrapped: bool,
}

impl FieldInfo {
    pub(crate) fn from_field(field: &Field, shape: &Shape) -> Self {
        Self {
            name: field.name,
            tag: field.tag,
            node: if shape.is_composite() {
                NodeKind::Composite
            } else {
                NodeKind::Leaf
            },
            wrapped: shape.is_wrapper(),
        }
    }

    /// Wire name for this field.
    pub fn json_name(&self) -> &'static str {
        self.tag.json.unwrap_or(self.name)
    }

    pub fn is_leaf(&self) -> bool {
        self.node == NodeKind::Leaf
    }

    /// Structural rules declared on this field, in declaration order.
    pub fn rules(&self) -> impl Iterator<Item = &'static str> {
        self.tag.rules()
    }
}

/// Canonical field path → field metadata for one type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaMap {
    type_name: String,
    type_id: Option<TypeId>,
    entries: BTreeMap<String, FieldInfo>,
    /// canonical path -> wire path
    wire: BTreeMap<String, String>,
    /// wire path -> canonical path; the first path inserted wins
    canonical: BTreeMap<String, String>,
}

impl SchemaMap {
    /// An empty map for the named type.
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            ..Self::default()
        }
    }

    /// Build a fresh, uncached map for `T`.
    ///
    /// Most callers want [`crate::schema_map`], which memoizes this.
    pub fn build<T: Reflect>() -> Self {
        let mut map = Self::new(std::any::type_name::<T>());
        map.type_id = Some(TypeId::of::<T>());
        walk(&mut map, &shape_of::<T>(), "");
        map
    }

    /// Build a fresh map from an arbitrary shape.
    pub fn from_shape(shape: &Shape) -> Self {
        let name = match shape.unwrapped() {
            Shape::Struct(s) => s.name,
            _ => "",
        };
        let mut map = Self::new(name);
        map.type_id = shape.type_id();
        walk(&mut map, shape, "");
        map
    }

    /// Record `path`. The walker inserts parents before children, so the
    /// parent's wire path is already indexed; paths rooted below an
    /// unindexed parent get no wire path.
    pub(crate) fn insert(&mut self, field_path: String, info: FieldInfo) {
        let parent_wire = match field_path.rsplit_once(path::PATH_SEPARATOR) {
            Some((parent, _)) => self.wire.get(parent).cloned(),
            None => Some(String::new()),
        };
        if let Some(parent_wire) = parent_wire {
            let wire = path::join(&parent_wire, info.json_name());
            self.canonical
                .entry(wire.clone())
                .or_insert_with(|| field_path.clone());
            self.wire.insert(field_path.clone(), wire);
        }
        self.entries.insert(field_path, info);
    }

    /// The type this map was built for, when known.
    pub fn type_id(&self) -> Option<TypeId> {
        self.type_id
    }

    /// Name of the type this map was built for.
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn get(&self, path: &str) -> Option<&FieldInfo> {
        self.entries.get(path)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.entries.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All entries in path order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldInfo)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// All paths in sorted order.
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn leaf_paths(&self) -> impl Iterator<Item = &str> {
        self.iter().filter(|(_, f)| f.is_leaf()).map(|(p, _)| p)
    }

    pub fn composite_paths(&self) -> impl Iterator<Item = &str> {
        self.iter().filter(|(_, f)| !f.is_leaf()).map(|(p, _)| p)
    }

    /// Translate a canonical path into its dotted JSON wire path.
    ///
    /// `Properties.Version.ChannelGroup` becomes
    /// `properties.version.channelGroup`. Returns `None` for unknown paths.
    pub fn json_path(&self, canonical: &str) -> Option<String> {
        self.wire.get(canonical).cloned()
    }

    /// Reverse of [`json_path`](Self::json_path): find the canonical path
    /// whose wire path is `json_path`. Subscripts such as `[0]` or `["k"]`
    /// are ignored.
    pub fn canonical_path(&self, json_path: &str) -> Option<&str> {
        self.canonical
            .get(&strip_subscripts(json_path))
            .map(String::as_str)
    }
}

/// Remove `[..]` subscripts from a wire path.
fn strip_subscripts(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    let mut depth = 0usize;
    for c in path.chars() {
        match c {
            '[' => depth += 1,
            ']' => depth = depth.saturating_sub(1),
            _ if depth == 0 => out.push(c),
            _ => {}
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Version;
    impl Reflect for Version {
        fn shape() -> Shape {
            Shape::structure(
                "Version",
                vec![
                    Field::named("ID", shape_of::<String>).json("id"),
                    Field::named("ChannelGroup", shape_of::<Option<String>>)
                        .json("channelGroup")
                        .validate("required, oneof=stable candidate"),
                ],
            )
        }
    }

    struct Props;
    impl Reflect for Props {
        fn shape() -> Shape {
            Shape::structure(
                "Props",
                vec![
                    Field::named("Version", shape_of::<Version>).json("version"),
                    Field::named("Labels", shape_of::<std::collections::BTreeMap<String, String>>),
                ],
            )
        }
    }

    struct Root;
    impl Reflect for Root {
        fn shape() -> Shape {
            Shape::structure(
                "Root",
                vec![Field::named("Properties", shape_of::<Option<Props>>).json("properties")],
            )
        }
    }

    #[test]
    fn test_json_path_translation() {
        let map = SchemaMap::build::<Root>();
        assert_eq!(
            map.json_path("Properties.Version.ChannelGroup").as_deref(),
            Some("properties.version.channelGroup")
        );
        assert_eq!(
            map.json_path("Properties.Labels").as_deref(),
            Some("properties.Labels")
        );
        assert_eq!(map.json_path("Properties.Missing"), None);
    }

    #[test]
    fn test_canonical_path_ignores_subscripts() {
        let map = SchemaMap::build::<Root>();
        assert_eq!(
            map.canonical_path("properties.version.channelGroup"),
            Some("Properties.Version.ChannelGroup")
        );
        assert_eq!(
            map.canonical_path("properties.Labels[\"team\"]"),
            Some("Properties.Labels")
        );
    }

    #[test]
    fn test_node_kinds_and_wrapping() {
        let map = SchemaMap::build::<Root>();
        let props = map.get("Properties").unwrap();
        assert_eq!(props.node, NodeKind::Composite);
        assert!(props.wrapped);

        let version = map.get("Properties.Version").unwrap();
        assert_eq!(version.node, NodeKind::Composite);
        assert!(!version.wrapped);

        let id = map.get("Properties.Version.ID").unwrap();
        assert!(id.is_leaf());
        assert!(!id.wrapped);

        let labels = map.get("Properties.Labels").unwrap();
        assert!(labels.is_leaf());
        assert!(labels.wrapped);
    }

    #[test]
    fn test_rules_are_split_and_trimmed() {
        let map = SchemaMap::build::<Root>();
        let info = map.get("Properties.Version.ChannelGroup").unwrap();
        let rules: Vec<&str> = info.rules().collect();
        assert_eq!(rules, vec!["required", "oneof=stable candidate"]);
        assert_eq!(map.get("Properties.Version.ID").unwrap().rules().count(), 0);
    }

    #[test]
    fn test_leaf_and_composite_partition() {
        let map = SchemaMap::build::<Root>();
        let leaves: Vec<&str> = map.leaf_paths().collect();
        let composites: Vec<&str> = map.composite_paths().collect();
        assert_eq!(
            leaves,
            vec![
                "Properties.Labels",
                "Properties.Version.ChannelGroup",
                "Properties.Version.ID"
            ]
        );
        assert_eq!(composites, vec!["Properties", "Properties.Version"]);
        assert_eq!(leaves.len() + composites.len(), map.len());
    }

    #[test]
    fn test_type_name_recorded() {
        assert!(SchemaMap::build::<Root>().type_name().ends_with("Root"));
        assert_eq!(SchemaMap::from_shape(&Root::shape()).type_name(), "Root");
    }

    #[test]
    fn test_type_identity_recorded() {
        assert_eq!(SchemaMap::build::<Root>().type_id(), Some(TypeId::of::<Root>()));
        assert_eq!(
            SchemaMap::from_shape(&shape_of::<Root>()).type_id(),
            Some(TypeId::of::<Root>())
        );
        assert_eq!(SchemaMap::from_shape(&Root::shape()).type_id(), None);
    }

    #[test]
    fn test_wire_index_covers_every_path() {
        let map = SchemaMap::build::<Root>();
        for path in map.paths() {
            let wire = map.json_path(path).unwrap();
            assert_eq!(map.canonical_path(&wire), Some(path));
        }
        assert_eq!(map.canonical_path("properties.nope"), None);
    }

    #[test]
    fn test_paths_below_unindexed_root_have_no_wire_path() {
        let mut map = SchemaMap::new("Props");
        walk(&mut map, &Props::shape(), "Nested");
        assert!(map.contains("Nested.Version.ID"));
        assert_eq!(map.json_path("Nested.Version.ID"), None);
    }
}
