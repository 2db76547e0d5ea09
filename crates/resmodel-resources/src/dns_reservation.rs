//! DNS reservations hold a cluster's domain prefix under a base domain for a
//! limited time.

use serde::{Deserialize, Serialize};

use resmodel_core::{shape_of, ErrorDetail, Field, Reflect, Shape, Timestamp};
use resmodel_validate::{ResourceKind, SemanticContext};

use crate::envelope::{ProvisioningState, Resource};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DnsReservationProperties {
    #[serde(default)]
    pub prefix: String,
    #[serde(default)]
    pub base_domain: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reserved_at: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provisioning_state: Option<ProvisioningState>,
}

impl Reflect for DnsReservationProperties {
    fn shape() -> Shape {
        Shape::structure(
            "DnsReservationProperties",
            vec![
                Field::named("Prefix", shape_of::<String>)
                    .json("prefix")
                    .validate("required,dns_rfc1035_label,max=15")
                    .visibility("read create"),
                Field::named("BaseDomain", shape_of::<String>)
                    .json("baseDomain")
                    .validate("required,max=253")
                    .visibility("read create nocase"),
                Field::named("ReservedAt", shape_of::<Option<Timestamp>>)
                    .json("reservedAt")
                    .visibility("read"),
                Field::named("ExpiresAt", shape_of::<Option<Timestamp>>).json("expiresAt"),
                Field::named("ProvisioningState", shape_of::<Option<ProvisioningState>>)
                    .json("provisioningState")
                    .visibility("read"),
            ],
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DnsReservation {
    #[serde(flatten)]
    pub resource: Resource,
    #[serde(default)]
    pub properties: DnsReservationProperties,
}

impl DnsReservation {
    pub fn new(prefix: impl Into<String>, base_domain: impl Into<String>) -> Self {
        Self {
            resource: Resource::default(),
            properties: DnsReservationProperties {
                prefix: prefix.into(),
                base_domain: base_domain.into(),
                ..DnsReservationProperties::default()
            },
        }
    }

    /// The fully qualified domain this reservation holds.
    pub fn domain(&self) -> String {
        format!("{}.{}", self.properties.prefix, self.properties.base_domain)
    }
}

impl Reflect for DnsReservation {
    fn shape() -> Shape {
        Shape::structure(
            "DnsReservation",
            vec![
                Field::embedded("Resource", shape_of::<Resource>),
                Field::named("Properties", shape_of::<DnsReservationProperties>).json("properties"),
            ],
        )
    }
}

impl ResourceKind for DnsReservation {
    const RESOURCE_TYPE: &'static str = "Microsoft.RedHatOpenShift/dnsReservations";

    fn validate_semantics(&self, _ctx: &SemanticContext<'_>) -> Vec<ErrorDetail> {
        let mut errors = Vec::new();
        let props = &self.properties;

        let prefix_taken = props
            .base_domain
            .split('.')
            .next()
            .is_some_and(|first| first.eq_ignore_ascii_case(&props.prefix));
        if prefix_taken {
            errors.push(ErrorDetail::invalid_request_content(
                "properties.prefix",
                format!(
                    "Prefix '{}' is already part of base domain '{}'",
                    props.prefix, props.base_domain
                ),
            ));
        }

        if let (Some(reserved), Some(expires)) = (props.reserved_at, props.expires_at) {
            if expires <= reserved {
                errors.push(ErrorDetail::invalid_request_content(
                    "properties.expiresAt",
                    format!("Expiry time '{expires}' must be after reservation time '{reserved}'"),
                ));
            }
        }

        errors
    }
}
