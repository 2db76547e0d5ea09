//! # Type Walker
//!
//! Recursive descent over a [`Shape`] that records one [`SchemaMap`] entry
//! per named, exported struct field.
//!
//! ## Rules
//!
//! - Optional, sequence and map wrappers are transparent: the walk continues
//!   into the element shape at the same path.
//! - Struct fields are visited in declaration order. Unexported fields are
//!   skipped entirely.
//! - Embedded fields record nothing for themselves; their sub-fields land at
//!   the current path with no extra segment.
//! - Named fields record an entry at `join(path, name)` and the walk
//!   continues into the field's shape at that path.
//! - Scalars terminate.
//!
//! The known resource schemas are acyclic. A struct whose type is already on
//! the current descent stack is not re-entered; identity is the `TypeId`
//! stamped by [`shape_of`](crate::shape::shape_of), not the declared name.

use crate::path::join;
use crate::schema::{FieldInfo, SchemaMap};
use crate::shape::{Shape, StructKey};

/// Add entries for every exported field reachable from `shape`, rooted at `path`.
pub fn walk(map: &mut SchemaMap, shape: &Shape, path: &str) {
    let mut stack = Vec::new();
    walk_inner(map, shape, path, &mut stack);
}

fn walk_inner(map: &mut SchemaMap, shape: &Shape, path: &str, stack: &mut Vec<StructKey>) {
    match shape {
        Shape::Optional(inner) | Shape::Sequence(inner) | Shape::Map(inner) => {
            walk_inner(map, &inner(), path, stack);
        }
        Shape::Struct(s) => {
            let key = s.key();
            if key.is_in(stack) {
                tracing::warn!(
                    type_name = s.name,
                    path = path,
                    "recursive type encountered; not descending again"
                );
                return;
            }
            stack.push(key);
            for field in s.fields.iter().filter(|f| f.exported) {
                let field_shape = (field.shape)();
                if field.embedded {
                    walk_inner(map, &field_shape, path, stack);
                } else {
                    let subpath = join(path, field.name);
                    map.insert(subpath.clone(), FieldInfo::from_field(field, &field_shape));
                    walk_inner(map, &field_shape, &subpath, stack);
                }
            }
            stack.pop();
        }
        Shape::Scalar(_) => {}
    }
}
