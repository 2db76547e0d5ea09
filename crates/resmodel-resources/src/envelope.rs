//! # Resource Envelope
//!
//! Fields shared by every resource kind: identity (`id`, `name`, `type`),
//! system metadata, and for tracked resources a location and tags. Kinds
//! compose these with `#[serde(flatten)]` and describe them as embedded
//! fields, so their paths land directly under the resource root.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use resmodel_core::{shape_of, Field, Reflect, ScalarKind, Shape, Timestamp};

/// The kind of principal that created or last modified a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CreatedByType {
    Application,
    Key,
    ManagedIdentity,
    User,
}

impl Reflect for CreatedByType {
    fn shape() -> Shape {
        Shape::Scalar(ScalarKind::String)
    }
}

/// Lifecycle state reported by the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProvisioningState {
    Accepted,
    Provisioning,
    Updating,
    Deleting,
    Succeeded,
    Failed,
    Canceled,
}

impl ProvisioningState {
    /// True once no further transitions are expected.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Canceled)
    }
}

impl Reflect for ProvisioningState {
    fn shape() -> Shape {
        Shape::Scalar(ScalarKind::String)
    }
}

/// Creation and modification metadata, set by the platform only.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by_type: Option<CreatedByType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified_by_type: Option<CreatedByType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified_at: Option<Timestamp>,
}

impl Reflect for SystemData {
    fn shape() -> Shape {
        Shape::structure(
            "SystemData",
            vec![
                Field::named("CreatedBy", shape_of::<Option<String>>).json("createdBy"),
                Field::named("CreatedByType", shape_of::<Option<CreatedByType>>).json("createdByType"),
                Field::named("CreatedAt", shape_of::<Option<Timestamp>>).json("createdAt"),
                Field::named("LastModifiedBy", shape_of::<Option<String>>).json("lastModifiedBy"),
                Field::named("LastModifiedByType", shape_of::<Option<CreatedByType>>)
                    .json("lastModifiedByType"),
                Field::named("LastModifiedAt", shape_of::<Option<Timestamp>>).json("lastModifiedAt"),
            ],
        )
    }
}

/// Identity fields common to all resources.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resource {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(rename = "type", default, skip_serializing_if = "String::is_empty")]
    pub resource_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_data: Option<SystemData>,
}

impl Reflect for Resource {
    fn shape() -> Shape {
        Shape::structure(
            "Resource",
            vec![
                Field::named("ID", shape_of::<String>).json("id").visibility("read nocase"),
                Field::named("Name", shape_of::<String>).json("name").visibility("read nocase"),
                Field::named("Type", shape_of::<String>).json("type").visibility("read nocase"),
                Field::named("SystemData", shape_of::<Option<SystemData>>)
                    .json("systemData")
                    .visibility("read"),
            ],
        )
    }
}

/// A resource that lives in a region and carries user tags.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedResource {
    #[serde(flatten)]
    pub resource: Resource,
    #[serde(default)]
    pub location: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: BTreeMap<String, String>,
}

impl TrackedResource {
    pub fn new(location: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            ..Self::default()
        }
    }
}

impl Reflect for TrackedResource {
    fn shape() -> Shape {
        Shape::structure(
            "TrackedResource",
            vec![
                Field::embedded("Resource", shape_of::<Resource>),
                Field::named("Location", shape_of::<String>)
                    .json("location")
                    .validate("required")
                    .visibility("read create nocase"),
                Field::named("Tags", shape_of::<BTreeMap<String, String>>)
                    .json("tags")
                    .validate("max=50"),
            ],
        )
    }
}

/// A user-assigned identity attached to a resource.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserAssignedIdentity {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub principal_id: Option<String>,
}

impl Reflect for UserAssignedIdentity {
    fn shape() -> Shape {
        Shape::structure(
            "UserAssignedIdentity",
            vec![
                Field::named("ClientID", shape_of::<Option<String>>)
                    .json("clientId")
                    .visibility("read"),
                Field::named("PrincipalID", shape_of::<Option<String>>)
                    .json("principalId")
                    .visibility("read"),
            ],
        )
    }
}

/// Managed identities assigned to a resource, keyed by identity resource ID.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManagedServiceIdentity {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub principal_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
    #[serde(rename = "type", default)]
    pub identity_type: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub user_assigned_identities: BTreeMap<String, UserAssignedIdentity>,
}

impl ManagedServiceIdentity {
    /// A `UserAssigned` identity block with the given identity resource IDs.
    pub fn user_assigned<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            identity_type: "UserAssigned".to_string(),
            user_assigned_identities: ids
                .into_iter()
                .map(|id| (id.into(), UserAssignedIdentity::default()))
                .collect(),
            ..Self::default()
        }
    }
}

impl Reflect for ManagedServiceIdentity {
    fn shape() -> Shape {
        Shape::structure(
            "ManagedServiceIdentity",
            vec![
                Field::named("PrincipalID", shape_of::<Option<String>>)
                    .json("principalId")
                    .visibility("read"),
                Field::named("TenantID", shape_of::<Option<String>>)
                    .json("tenantId")
                    .visibility("read"),
                Field::named("Type", shape_of::<String>)
                    .json("type")
                    .validate("required,oneof=None SystemAssigned UserAssigned"),
                Field::named(
                    "UserAssignedIdentities",
                    shape_of::<BTreeMap<String, UserAssignedIdentity>>,
                )
                .json("userAssignedIdentities"),
            ],
        )
    }
}
