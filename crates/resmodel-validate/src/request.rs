//! Applying a request body to a stored resource.
//!
//! `PATCH` bodies are RFC 7396 merge patches over the stored resource.
//! `PUT` and `POST` bodies are overlaid onto the stored resource (or onto an
//! empty object when there is none); `null` members in an overlay are
//! ignored.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

use resmodel_core::{merge_overlay, merge_patch, CloudError, ErrorCode, ErrorDetail};

/// HTTP methods that carry a resource body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Put,
    Patch,
    Post,
}

impl std::str::FromStr for HttpMethod {
    type Err = RequestBodyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "PUT" => Ok(Self::Put),
            "PATCH" => Ok(Self::Patch),
            "POST" => Ok(Self::Post),
            _ => Err(RequestBodyError::UnsupportedMethod(s.to_string())),
        }
    }
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Post => "POST",
        })
    }
}

/// Failures while turning a request body into a resource.
#[derive(Error, Debug)]
pub enum RequestBodyError {
    /// The body is not valid JSON.
    #[error("Content is not valid JSON: {0}")]
    Malformed(#[source] serde_json::Error),

    /// The merged document does not decode into the resource type.
    #[error("Content is not a valid resource: {0}")]
    Decode(#[source] serde_json::Error),

    /// The stored resource could not be encoded as a merge base.
    #[error("failed to encode stored resource: {0}")]
    Encode(#[source] serde_json::Error),

    /// `PATCH` on a resource that does not exist.
    #[error("The resource does not exist")]
    MissingResource,

    #[error("unsupported method {0}")]
    UnsupportedMethod(String),
}

impl From<RequestBodyError> for CloudError {
    fn from(err: RequestBodyError) -> Self {
        match &err {
            RequestBodyError::Malformed(_) | RequestBodyError::Decode(_) => {
                CloudError::new(
                    CloudError::BAD_REQUEST,
                    ErrorDetail::request_level(ErrorCode::InvalidRequestContent, err.to_string()),
                )
            }
            RequestBodyError::MissingResource => CloudError::new(
                CloudError::NOT_FOUND,
                ErrorDetail::request_level(ErrorCode::NotFound, err.to_string()),
            ),
            RequestBodyError::UnsupportedMethod(_) => CloudError::new(
                CloudError::BAD_REQUEST,
                ErrorDetail::request_level(ErrorCode::InvalidParameter, err.to_string()),
            ),
            RequestBodyError::Encode(_) => {
                tracing::warn!(error = %err, "request body application failed");
                CloudError::internal_server_error()
            }
        }
    }
}

/// Merge `body` onto `current` according to `method` and decode the result.
pub fn apply_request_body<K>(method: HttpMethod, current: Option<&K>, body: &[u8]) -> Result<K, CloudError>
where
    K: Serialize + DeserializeOwned,
{
    Ok(merge_body(method, current, body)?)
}

fn merge_body<K>(method: HttpMethod, current: Option<&K>, body: &[u8]) -> Result<K, RequestBodyError>
where
    K: Serialize + DeserializeOwned,
{
    let body: Value = serde_json::from_slice(body).map_err(RequestBodyError::Malformed)?;

    let mut base = match current {
        Some(c) => serde_json::to_value(c).map_err(RequestBodyError::Encode)?,
        None if method == HttpMethod::Patch => return Err(RequestBodyError::MissingResource),
        None => Value::Object(Map::new()),
    };

    match method {
        HttpMethod::Patch => merge_patch(&mut base, &body),
        HttpMethod::Put | HttpMethod::Post => merge_overlay(&mut base, &body),
    }
    tracing::debug!(method = %method, "request body applied");

    serde_json::from_value(base).map_err(RequestBodyError::Decode)
}
