//! # Error Types: Structured Error Taxonomy
//!
//! Two families live here:
//!
//! - **Request errors** ([`ErrorDetail`], [`CloudError`]) are collected, never
//!   thrown. Validation returns them as an ordered list and the request layer
//!   wraps them into a single envelope.
//! - **Contract errors** ([`ContractError`]) indicate a defect in a resource
//!   kind's declaration. They are detected at startup or in the test suite
//!   and never reach an external caller.
//!
//! ## Wire Shape
//!
//! ```json
//! {"error": {"code": "InvalidRequestContent", "message": "...", "target": "properties.x"}}
//! ```
//!
//! `target` is omitted when it is the request-level target, and `details` is
//! omitted when empty.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Target used for errors that are not specific to one field.
pub const REQUEST_TARGET: &str = "";

/// Closed taxonomy of machine-readable error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCode {
    InternalServerError,
    InvalidParameter,
    InvalidRequestContent,
    InvalidResource,
    InvalidResourceType,
    MultipleErrorsOccurred,
    UnsupportedMediaType,
    Conflict,
    NotFound,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InternalServerError => "InternalServerError",
            Self::InvalidParameter => "InvalidParameter",
            Self::InvalidRequestContent => "InvalidRequestContent",
            Self::InvalidResource => "InvalidResource",
            Self::InvalidResourceType => "InvalidResourceType",
            Self::MultipleErrorsOccurred => "MultipleErrorsOccurred",
            Self::UnsupportedMediaType => "UnsupportedMediaType",
            Self::Conflict => "Conflict",
            Self::NotFound => "NotFound",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One structured validation failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub code: ErrorCode,
    pub message: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub target: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<ErrorDetail>,
}

impl ErrorDetail {
    pub fn new(code: ErrorCode, target: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            target: target.into(),
            details: Vec::new(),
        }
    }

    /// `InvalidRequestContent` on a field target.
    pub fn invalid_request_content(target: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidRequestContent, target, message)
    }

    /// An error on the request as a whole.
    pub fn request_level(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::new(code, REQUEST_TARGET, message)
    }

    pub fn is_request_level(&self) -> bool {
        self.target == REQUEST_TARGET
    }

    /// Collapse an ordered list of details into a single detail.
    ///
    /// - No details: `None`.
    /// - One detail: that detail, unchanged.
    /// - Several: a `MultipleErrorsOccurred` detail carrying all of them in
    ///   their original order.
    pub fn from_details(mut details: Vec<ErrorDetail>, multiple_message: &str) -> Option<Self> {
        match details.len() {
            0 => None,
            1 => details.pop(),
            _ => Some(Self {
                code: ErrorCode::MultipleErrorsOccurred,
                message: multiple_message.to_string(),
                target: REQUEST_TARGET.to_string(),
                details,
            }),
        }
    }
}

impl fmt::Display for ErrorDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: ", self.code)?;
        if !self.target.is_empty() {
            write!(f, "{}: ", self.target)?;
        }
        f.write_str(&self.message)?;
        if !self.details.is_empty() {
            f.write_str(" Details: ")?;
            for (i, d) in self.details.iter().enumerate() {
                if i > 0 {
                    f.write_str("; ")?;
                }
                write!(f, "{d}")?;
            }
        }
        Ok(())
    }
}

/// The envelope returned to a caller when a request fails.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("{status_code}: {error}")]
pub struct CloudError {
    #[serde(skip)]
    pub status_code: u16,
    pub error: ErrorDetail,
}

impl CloudError {
    pub const BAD_REQUEST: u16 = 400;
    pub const NOT_FOUND: u16 = 404;
    pub const CONFLICT: u16 = 409;
    pub const INTERNAL_SERVER_ERROR: u16 = 500;

    pub fn new(status_code: u16, error: ErrorDetail) -> Self {
        Self { status_code, error }
    }

    /// A 400 wrapping an ordered list of content errors, or `None` if the
    /// list is empty.
    pub fn content_validation(details: Vec<ErrorDetail>, multiple_message: &str) -> Option<Self> {
        ErrorDetail::from_details(details, multiple_message)
            .map(|error| Self::new(Self::BAD_REQUEST, error))
    }

    pub fn invalid_request_content(target: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(
            Self::BAD_REQUEST,
            ErrorDetail::invalid_request_content(target, message),
        )
    }

    pub fn internal_server_error() -> Self {
        Self::new(
            Self::INTERNAL_SERVER_ERROR,
            ErrorDetail::request_level(
                ErrorCode::InternalServerError,
                "Internal server error.",
            ),
        )
    }
}

/// A defect in a resource kind's declaration.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ContractError {
    /// The visibility map does not cover the Schema Map exactly.
    #[error("visibility map for {type_name} is inconsistent with its schema: {violations}")]
    Inconsistent {
        type_name: String,
        violations: ContractViolations,
    },

    /// A `visibility` tag contains a word that is not a known flag.
    #[error("unknown visibility word {word:?} on field {path}")]
    UnknownVisibilityWord { path: String, word: String },

    /// A `validate` tag names a rule the structural validator does not know,
    /// or gives a known rule a malformed parameter.
    #[error("invalid validation rule {rule:?} on field {path}")]
    InvalidRule { path: String, rule: String },
}

/// A single mismatch between a visibility map and a Schema Map.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ContractViolation {
    #[error("path {0} has no visibility entry")]
    MissingPath(String),

    #[error("visibility entry {0} does not exist in the schema")]
    StalePath(String),

    #[error("composite path {path} must be skip, found {flags}")]
    CompositeNotSkipped { path: String, flags: String },

    #[error("leaf path {0} has no access flags")]
    LeafSkipped(String),
}

/// Every violation found by one consistency check.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContractViolations(Vec<ContractViolation>);

impl ContractViolations {
    pub fn new(violations: Vec<ContractViolation>) -> Self {
        Self(violations)
    }

    pub fn violations(&self) -> &[ContractViolation] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for ContractViolations {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, v) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{v}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MULTI: &str = "Content validation failed on multiple fields";

    #[test]
    fn test_error_detail_wire_shape() {
        let d = ErrorDetail::invalid_request_content("properties.channelGroup", "bad");
        let json = serde_json::to_value(&d).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "code": "InvalidRequestContent",
                "message": "bad",
                "target": "properties.channelGroup",
            })
        );
    }

    #[test]
    fn test_request_level_target_omitted() {
        let d = ErrorDetail::request_level(ErrorCode::InvalidResourceType, "nope");
        assert!(d.is_request_level());
        let json = serde_json::to_value(&d).unwrap();
        assert!(json.get("target").is_none());
        assert!(json.get("details").is_none());
    }

    #[test]
    fn test_from_details_empty_is_none() {
        assert!(ErrorDetail::from_details(vec![], MULTI).is_none());
        assert!(CloudError::content_validation(vec![], MULTI).is_none());
    }

    #[test]
    fn test_from_details_single_is_promoted() {
        let d = ErrorDetail::invalid_request_content("a", "m");
        assert_eq!(ErrorDetail::from_details(vec![d.clone()], MULTI), Some(d));
    }

    #[test]
    fn test_from_details_many_preserves_order() {
        let a = ErrorDetail::invalid_request_content("a", "first");
        let b = ErrorDetail::invalid_request_content("b", "second");
        let err = CloudError::content_validation(vec![a.clone(), b.clone()], MULTI).unwrap();
        assert_eq!(err.status_code, 400);
        assert_eq!(err.error.code, ErrorCode::MultipleErrorsOccurred);
        assert_eq!(err.error.message, MULTI);
        assert_eq!(err.error.details, vec![a, b]);
    }

    #[test]
    fn test_display_forms() {
        let a = ErrorDetail::invalid_request_content("a", "first");
        assert_eq!(a.to_string(), "InvalidRequestContent: a: first");

        let multi = ErrorDetail::from_details(
            vec![a, ErrorDetail::invalid_request_content("b", "second")],
            MULTI,
        )
        .unwrap();
        assert_eq!(
            multi.to_string(),
            "MultipleErrorsOccurred: Content validation failed on multiple fields \
             Details: InvalidRequestContent: a: first; InvalidRequestContent: b: second"
        );

        let cloud = CloudError::internal_server_error();
        assert_eq!(
            cloud.to_string(),
            "500: InternalServerError: Internal server error."
        );
    }

    #[test]
    fn test_cloud_error_serializes_without_status() {
        let err = CloudError::invalid_request_content("x", "y");
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "error": {"code": "InvalidRequestContent", "message": "y", "target": "x"}
            })
        );
    }

    #[test]
    fn test_contract_error_lists_violations() {
        let err = ContractError::Inconsistent {
            type_name: "Cluster".into(),
            violations: ContractViolations::new(vec![
                ContractViolation::MissingPath("A".into()),
                ContractViolation::StalePath("B".into()),
            ]),
        };
        let msg = err.to_string();
        assert!(msg.contains("Cluster"));
        assert!(msg.contains("path A has no visibility entry"));
        assert!(msg.contains("visibility entry B does not exist"));
    }
}
