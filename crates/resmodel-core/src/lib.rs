//! # resmodel-core: Foundational Types for Resource Models
//!
//! This crate is the leaf of the workspace DAG. It owns the machinery that
//! every resource kind relies on: how a type describes its shape, how that
//! shape is flattened into a per-type path index, and how per-field
//! visibility is declared and checked.
//!
//! ## Key Design Principles
//!
//! 1. **Descriptors instead of runtime reflection.** A resource type implements
//!    [`Reflect`] and returns a [`Shape`] tree. The walker never inspects values,
//!    only shapes.
//!
//! 2. **One Schema Map per type, built once.** [`schema_map`] memoizes the
//!    walker output behind a reader/writer lock. Maps are immutable after
//!    insertion and are never evicted.
//!
//! 3. **Visibility is a flag set, not a mode.** A field may be readable and
//!    creatable at the same time. The empty set is the "skip" sentinel used
//!    for composite nodes.
//!
//! 4. **Contract errors fail loudly.** A visibility mapping that drifts from
//!    its Schema Map is reported path by path, never silently defaulted.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `resmodel-*` crates.
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.

pub mod cache;
pub mod error;
pub mod merge;
pub mod path;
pub mod schema;
pub mod shape;
pub mod temporal;
pub mod visibility;
pub mod walker;

// Re-export primary types for ergonomic imports.
pub use cache::{schema_map, SchemaCache};
pub use error::{
    CloudError, ContractError, ContractViolation, ContractViolations, ErrorCode, ErrorDetail,
    REQUEST_TARGET,
};
pub use merge::{is_zero_value, merge_map_updates, merge_overlay, merge_patch};
pub use path::join;
pub use schema::{FieldInfo, NodeKind, SchemaMap};
pub use shape::{shape_of, Field, FieldTag, Reflect, ScalarKind, Shape, StructKey, StructShape};
pub use temporal::{Timestamp, TimestampError};
pub use visibility::{RequestKind, VisibilityFlags, VisibilityMap};
pub use walker::walk;
