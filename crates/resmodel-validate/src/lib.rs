//! # resmodel-validate: Validation for Resource Models
//!
//! Builds on `resmodel-core` to validate resource values:
//!
//! - [`structural`]: the structural validator capability and the default
//!   tag-driven implementation.
//! - [`json_schema`]: an alternative structural backend that compiles the
//!   declared rules into a JSON Schema.
//! - [`enforce`]: visibility enforcement over create/update bodies and read
//!   rendering.
//! - [`engine`]: the two-stage validation flow and request validation.
//! - [`request`]: applying `PUT`/`PATCH` bodies to stored resources.
//! - [`kind`]: the [`ResourceKind`] registration surface.
//! - [`config`]: [`ValidationConfig`] loaded from the environment or YAML.
//!
//! ## Crate Policy
//!
//! - Validation failures are returned as ordered [`ErrorDetail`] lists,
//!   never raised.
//! - Contract defects (bad tags, drifting visibility maps) surface as
//!   [`ContractError`](resmodel_core::ContractError).
//! - No `.unwrap()` outside tests.
//!
//! [`ErrorDetail`]: resmodel_core::ErrorDetail

pub mod config;
pub mod enforce;
pub mod engine;
pub mod json_schema;
pub mod kind;
pub mod request;
pub mod structural;

mod value;

pub use config::{ConfigError, StructuralBackend, ValidationConfig};
pub use enforce::{check_visibility, copy_read_only_values, render_read};
pub use engine::ValidationEngine;
pub use json_schema::JsonSchemaValidator;
pub use kind::{check_contract, visibility_of, ResourceKind, SemanticContext};
pub use request::{apply_request_body, HttpMethod, RequestBodyError};
pub use structural::{FieldViolation, Rule, StructuralValidator, TagValidator};
