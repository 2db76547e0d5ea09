//! # Validation Engine
//!
//! Two-stage validation of a resource:
//!
//! 1. **Structural**: the configured [`StructuralValidator`] checks the
//!    rules recorded in the type's cached Schema Map. One [`ErrorDetail`] per failing field,
//!    targeted at the field's wire path.
//! 2. **Semantic**: the kind's [`ResourceKind::validate_semantics`] hook.
//!    Runs only when stage 1 found nothing, since cross-field checks assume
//!    well-formed fields.
//!
//! Details keep detection order and are never deduplicated. The engine
//! never mutates its input.

use serde_json::Value;

use resmodel_core::{
    schema_map, shape_of, CloudError, ErrorCode, ErrorDetail, RequestKind, Timestamp,
};

use crate::config::{StructuralBackend, ValidationConfig};
use crate::enforce;
use crate::json_schema::JsonSchemaValidator;
use crate::kind::{visibility_of, ResourceKind, SemanticContext};
use crate::structural::{StructuralValidator, TagValidator};

/// Runs structural, visibility and semantic validation for resource kinds.
pub struct ValidationEngine {
    config: ValidationConfig,
    structural: Box<dyn StructuralValidator>,
}

impl std::fmt::Debug for ValidationEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValidationEngine")
            .field("config", &self.config)
            .field("structural", &self.structural.name())
            .finish()
    }
}

impl Default for ValidationEngine {
    fn default() -> Self {
        Self::new(ValidationConfig::default())
    }
}

impl ValidationEngine {
    /// Build an engine using the structural backend named in `config`.
    pub fn new(config: ValidationConfig) -> Self {
        let structural: Box<dyn StructuralValidator> = match config.structural_backend {
            StructuralBackend::Tags => Box::new(TagValidator::new()),
            StructuralBackend::JsonSchema => Box::new(JsonSchemaValidator::new()),
        };
        Self { config, structural }
    }

    /// Build an engine with an explicit structural validator.
    pub fn with_structural(config: ValidationConfig, structural: Box<dyn StructuralValidator>) -> Self {
        Self { config, structural }
    }

    pub fn config(&self) -> &ValidationConfig {
        &self.config
    }

    pub fn structural_backend(&self) -> &'static str {
        self.structural.name()
    }

    /// Validate `resource` against the current time. An empty list means valid.
    pub fn validate<K: ResourceKind>(&self, resource: &K) -> Vec<ErrorDetail> {
        self.validate_at(resource, Timestamp::now())
    }

    /// Validate `resource` with "now" fixed to `now`.
    pub fn validate_at<K: ResourceKind>(&self, resource: &K, now: Timestamp) -> Vec<ErrorDetail> {
        let value = match serde_json::to_value(resource) {
            Ok(v) => v,
            Err(e) => return vec![encode_failure(K::RESOURCE_TYPE, &e)],
        };

        let structural = self.structural_details::<K>(&value);
        tracing::debug!(
            resource_type = K::RESOURCE_TYPE,
            stage = "structural",
            backend = self.structural.name(),
            errors = structural.len(),
            "validation stage finished"
        );
        if !structural.is_empty() {
            tracing::debug!(
                resource_type = K::RESOURCE_TYPE,
                "semantic validation skipped due to structural errors"
            );
            return structural;
        }

        self.semantic_details(resource, now)
    }

    /// Validate a create or update request.
    ///
    /// Visibility enforcement and structural validation run first and their
    /// details are reported together. Semantic checks run only when both
    /// are clean. `current` is the stored resource for updates and is
    /// ignored for creates.
    pub fn validate_request<K: ResourceKind>(
        &self,
        kind: RequestKind,
        new: &K,
        current: Option<&K>,
    ) -> Result<(), CloudError> {
        self.validate_request_at(kind, new, current, Timestamp::now())
    }

    pub fn validate_request_at<K: ResourceKind>(
        &self,
        kind: RequestKind,
        new: &K,
        current: Option<&K>,
        now: Timestamp,
    ) -> Result<(), CloudError> {
        let visibility = visibility_of::<K>().map_err(|e| {
            tracing::warn!(resource_type = K::RESOURCE_TYPE, error = %e, "visibility contract broken");
            CloudError::internal_server_error()
        })?;

        let new_value = serde_json::to_value(new).map_err(|e| {
            tracing::warn!(resource_type = K::RESOURCE_TYPE, error = %e, "failed to encode resource");
            CloudError::internal_server_error()
        })?;
        let current_value = match (kind, current) {
            (RequestKind::Update, Some(c)) => serde_json::to_value(c).map_err(|e| {
                tracing::warn!(resource_type = K::RESOURCE_TYPE, error = %e, "failed to encode resource");
                CloudError::internal_server_error()
            })?,
            _ => Value::Null,
        };

        let shape = shape_of::<K>();
        let mut details = enforce::check_visibility(&shape, &visibility, kind, &new_value, &current_value);
        let visibility_errors = details.len();
        details.extend(self.structural_details::<K>(&new_value));
        tracing::debug!(
            resource_type = K::RESOURCE_TYPE,
            request = %kind,
            stage = "visibility+structural",
            visibility_errors,
            errors = details.len(),
            "validation stage finished"
        );

        if details.is_empty() {
            details = self.semantic_details(new, now);
        } else {
            tracing::debug!(
                resource_type = K::RESOURCE_TYPE,
                "semantic validation skipped due to request errors"
            );
        }

        match CloudError::content_validation(details, &self.config.multiple_errors_message) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Encode `resource` for a read response, dropping unreadable fields.
    pub fn render<K: ResourceKind>(&self, resource: &K) -> Result<Value, CloudError> {
        let visibility = visibility_of::<K>().map_err(|e| {
            tracing::warn!(resource_type = K::RESOURCE_TYPE, error = %e, "visibility contract broken");
            CloudError::internal_server_error()
        })?;
        let value = serde_json::to_value(resource).map_err(|e| {
            tracing::warn!(resource_type = K::RESOURCE_TYPE, error = %e, "failed to encode resource");
            CloudError::internal_server_error()
        })?;
        Ok(enforce::render_read(&shape_of::<K>(), &visibility, &value))
    }

    fn structural_details<K: ResourceKind>(&self, value: &Value) -> Vec<ErrorDetail> {
        let schema = schema_map::<K>();
        self.structural
            .validate(&shape_of::<K>(), &schema, value)
            .iter()
            .map(|v| v.to_error_detail())
            .collect()
    }

    fn semantic_details<K: ResourceKind>(&self, resource: &K, now: Timestamp) -> Vec<ErrorDetail> {
        let ctx = SemanticContext::new(now, &self.config);
        let details = resource.validate_semantics(&ctx);
        tracing::debug!(
            resource_type = K::RESOURCE_TYPE,
            stage = "semantic",
            errors = details.len(),
            "validation stage finished"
        );
        details
    }
}

fn encode_failure(resource_type: &str, err: &serde_json::Error) -> ErrorDetail {
    tracing::warn!(resource_type, error = %err, "failed to encode resource");
    ErrorDetail::request_level(ErrorCode::InternalServerError, "Internal server error.")
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use resmodel_core::{Field, Reflect, Shape};
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, Default, Serialize, Deserialize)]
    struct Gadget {
        #[serde(default)]
        name: String,
        #[serde(default)]
        color: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        serial: Option<String>,
    }

    impl Reflect for Gadget {
        fn shape() -> Shape {
            Shape::structure(
                "Gadget",
                vec![
                    Field::named("Name", shape_of::<String>)
                        .json("name")
                        .validate("required")
                        .visibility("read create"),
                    Field::named("Color", shape_of::<String>)
                        .json("color")
                        .validate("omitempty,oneof=red blue"),
                    Field::named("Serial", shape_of::<Option<String>>)
                        .json("serial")
                        .visibility("read"),
                ],
            )
        }
    }

    static GADGET_SEMANTIC_CALLS: AtomicUsize = AtomicUsize::new(0);

    impl ResourceKind for Gadget {
        const RESOURCE_TYPE: &'static str = "Test/gadgets";

        fn validate_semantics(&self, _ctx: &SemanticContext<'_>) -> Vec<ErrorDetail> {
            GADGET_SEMANTIC_CALLS.fetch_add(1, Ordering::SeqCst);
            if self.name == self.color {
                vec![ErrorDetail::invalid_request_content("name", "Name must differ from color")]
            } else {
                Vec::new()
            }
        }
    }

    fn gadget(name: &str, color: &str) -> Gadget {
        Gadget {
            name: name.to_string(),
            color: color.to_string(),
            serial: None,
        }
    }

    #[test]
    fn test_valid_resource_has_no_details() {
        let engine = ValidationEngine::default();
        assert!(engine.validate(&gadget("g1", "red")).is_empty());
    }

    #[test]
    fn test_structural_failure_reports_target() {
        let engine = ValidationEngine::default();
        let details = engine.validate(&gadget("g1", "green"));
        assert_eq!(details.len(), 1);
        assert_eq!(details[0].target, "color");
        assert_eq!(details[0].code, ErrorCode::InvalidRequestContent);
    }

    #[test]
    fn test_semantic_stage_runs_after_clean_structural() {
        let engine = ValidationEngine::default();
        let details = engine.validate(&gadget("red", "red"));
        assert_eq!(details.len(), 1);
        assert_eq!(details[0].message, "Name must differ from color");
    }

    #[test]
    fn test_validate_request_rejects_read_only_on_create() {
        let engine = ValidationEngine::default();
        let mut g = gadget("g1", "blue");
        g.serial = Some("s-1".to_string());
        let err = engine
            .validate_request(RequestKind::Create, &g, None)
            .unwrap_err();
        assert_eq!(err.status_code, CloudError::BAD_REQUEST);
        assert_eq!(err.error.target, "serial");
        assert_eq!(err.error.message, "Field 'serial' is read-only");
    }

    #[test]
    fn test_validate_request_wraps_multiple_errors() {
        let engine = ValidationEngine::default();
        let current = gadget("g1", "blue");
        let mut new = gadget("g2", "green");
        new.serial = None;
        let err = engine
            .validate_request(RequestKind::Update, &new, Some(&current))
            .unwrap_err();
        assert_eq!(err.error.code, ErrorCode::MultipleErrorsOccurred);
        let targets: Vec<&str> = err.error.details.iter().map(|d| d.target.as_str()).collect();
        assert_eq!(targets, vec!["name", "color"]);
    }

    #[test]
    fn test_validate_request_update_clean() {
        let engine = ValidationEngine::default();
        let current = gadget("g1", "blue");
        let new = gadget("g1", "red");
        engine
            .validate_request(RequestKind::Update, &new, Some(&current))
            .unwrap();
    }

    #[test]
    fn test_render_drops_unreadable_fields() {
        #[derive(Debug, Clone, Serialize, Deserialize)]
        struct Secretive {
            name: String,
            secret: String,
        }
        impl Reflect for Secretive {
            fn shape() -> Shape {
                Shape::structure(
                    "Secretive",
                    vec![
                        Field::named("Name", shape_of::<String>).json("name"),
                        Field::named("Secret", shape_of::<String>)
                            .json("secret")
                            .visibility("create update"),
                    ],
                )
            }
        }
        impl ResourceKind for Secretive {
            const RESOURCE_TYPE: &'static str = "Test/secretives";
        }

        let engine = ValidationEngine::default();
        let rendered = engine
            .render(&Secretive {
                name: "s".to_string(),
                secret: "hunter2".to_string(),
            })
            .unwrap();
        assert_eq!(rendered, serde_json::json!({"name": "s"}));
    }

    #[test]
    fn test_backend_selected_from_config() {
        let engine = ValidationEngine::new(ValidationConfig {
            structural_backend: StructuralBackend::JsonSchema,
            ..ValidationConfig::default()
        });
        assert_eq!(engine.structural_backend(), "json_schema");
        assert_eq!(ValidationEngine::default().structural_backend(), "tags");
    }
}
