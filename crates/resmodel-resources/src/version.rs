//! Version catalog entries: the OpenShift versions offered per channel group.

use serde::{Deserialize, Serialize};

use resmodel_core::{shape_of, ErrorDetail, Field, Reflect, Shape, Timestamp};
use resmodel_validate::{ResourceKind, SemanticContext};

use crate::envelope::{ProvisioningState, Resource};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionProperties {
    #[serde(default)]
    pub channel_group: String,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_of_life_timestamp: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provisioning_state: Option<ProvisioningState>,
}

impl Reflect for VersionProperties {
    fn shape() -> Shape {
        Shape::structure(
            "VersionProperties",
            vec![
                Field::named("ChannelGroup", shape_of::<String>)
                    .json("channelGroup")
                    .validate("required")
                    .visibility("read create nocase"),
                Field::named("Enabled", shape_of::<bool>).json("enabled"),
                Field::named("EndOfLifeTimestamp", shape_of::<Option<Timestamp>>)
                    .json("endOfLifeTimestamp")
                    .validate("required"),
                Field::named("ProvisioningState", shape_of::<Option<ProvisioningState>>)
                    .json("provisioningState")
                    .visibility("read"),
            ],
        )
    }
}

/// One entry of the version catalog.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionCatalogEntry {
    #[serde(flatten)]
    pub resource: Resource,
    #[serde(default)]
    pub properties: VersionProperties,
}

impl VersionCatalogEntry {
    pub fn new(channel_group: impl Into<String>, end_of_life: Timestamp) -> Self {
        Self {
            resource: Resource::default(),
            properties: VersionProperties {
                channel_group: channel_group.into(),
                enabled: true,
                end_of_life_timestamp: Some(end_of_life),
                provisioning_state: None,
            },
        }
    }
}

impl Reflect for VersionCatalogEntry {
    fn shape() -> Shape {
        Shape::structure(
            "VersionCatalogEntry",
            vec![
                Field::embedded("Resource", shape_of::<Resource>),
                Field::named("Properties", shape_of::<VersionProperties>).json("properties"),
            ],
        )
    }
}

impl ResourceKind for VersionCatalogEntry {
    const RESOURCE_TYPE: &'static str = "Microsoft.RedHatOpenShift/hcpOpenShiftVersions";

    fn validate_semantics(&self, ctx: &SemanticContext<'_>) -> Vec<ErrorDetail> {
        let mut errors = Vec::new();
        let props = &self.properties;

        if !ctx.config.is_channel_group_allowed(&props.channel_group) {
            errors.push(ErrorDetail::invalid_request_content(
                "properties.channelGroup",
                format!(
                    "Invalid value '{}' for field 'channelGroup' (must be one of: {})",
                    props.channel_group,
                    ctx.config.allowed_channel_groups.join(" ")
                ),
            ));
        }

        if let Some(eol) = props.end_of_life_timestamp {
            if eol <= ctx.now {
                errors.push(ErrorDetail::invalid_request_content(
                    "properties.endOfLifeTimestamp",
                    format!("Invalid value '{eol}' for field 'endOfLifeTimestamp' (must be in the future)"),
                ));
            }
        }

        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use resmodel_validate::ValidationConfig;

    fn now() -> Timestamp {
        Timestamp::parse("2026-03-01T00:00:00Z").unwrap()
    }

    #[test]
    fn test_allowed_group_and_future_eol_pass() {
        let config = ValidationConfig::default();
        let ctx = SemanticContext::new(now(), &config);
        let entry = VersionCatalogEntry::new("stable", now().offset(Duration::days(30)));
        assert!(entry.validate_semantics(&ctx).is_empty());
    }

    #[test]
    fn test_eol_equal_to_now_is_rejected() {
        let config = ValidationConfig::default();
        let ctx = SemanticContext::new(now(), &config);
        let entry = VersionCatalogEntry::new("stable", now());
        let errors = entry.validate_semantics(&ctx);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].target, "properties.endOfLifeTimestamp");
    }

    #[test]
    fn test_configured_groups_are_honored() {
        let config = ValidationConfig {
            allowed_channel_groups: vec!["stable".to_string(), "candidate".to_string()],
            ..ValidationConfig::default()
        };
        let ctx = SemanticContext::new(now(), &config);
        let entry = VersionCatalogEntry::new("candidate", now().offset(Duration::days(1)));
        assert!(entry.validate_semantics(&ctx).is_empty());

        let entry = VersionCatalogEntry::new("nightly", now().offset(Duration::days(1)));
        let errors = entry.validate_semantics(&ctx);
        assert_eq!(
            errors[0].message,
            "Invalid value 'nightly' for field 'channelGroup' (must be one of: stable candidate)"
        );
    }
}
