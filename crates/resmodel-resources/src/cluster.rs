//! # Hosted Control Plane Clusters
//!
//! The cluster resource and its property profiles. Most profiles are fixed
//! at creation; the tags on each field say which can change afterwards.
//!
//! Beyond per-field rules, a cluster's managed identities must line up:
//! every control-plane operator identity and the service managed identity
//! must be assigned to the resource, none may be used twice, and every
//! assigned identity must be used by something.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use resmodel_core::{shape_of, ErrorDetail, Field, Reflect, Shape};
use resmodel_validate::{ResourceKind, SemanticContext};

use crate::envelope::{ManagedServiceIdentity, ProvisioningState, TrackedResource};

const USER_ASSIGNED_IDENTITIES_TARGET: &str =
    "properties.platform.operatorsAuthentication.userAssignedIdentities";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionProfile {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub channel_group: String,
}

impl Reflect for VersionProfile {
    fn shape() -> Shape {
        Shape::structure(
            "VersionProfile",
            vec![
                Field::named("ID", shape_of::<String>)
                    .json("id")
                    .validate("omitempty,max=64")
                    .visibility("read create"),
                Field::named("ChannelGroup", shape_of::<String>)
                    .json("channelGroup")
                    .visibility("read create update"),
            ],
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DnsProfile {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub base_domain: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub base_domain_prefix: String,
}

impl Reflect for DnsProfile {
    fn shape() -> Shape {
        Shape::structure(
            "DnsProfile",
            vec![
                Field::named("BaseDomain", shape_of::<String>)
                    .json("baseDomain")
                    .visibility("read"),
                Field::named("BaseDomainPrefix", shape_of::<String>)
                    .json("baseDomainPrefix")
                    .validate("omitempty,dns_rfc1035_label,max=15")
                    .visibility("read create"),
            ],
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkProfile {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub network_type: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub pod_cidr: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub service_cidr: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub machine_cidr: String,
    #[serde(default)]
    pub host_prefix: i32,
}

impl Reflect for NetworkProfile {
    fn shape() -> Shape {
        Shape::structure(
            "NetworkProfile",
            vec![
                Field::named("NetworkType", shape_of::<String>)
                    .json("networkType")
                    .validate("omitempty,oneof=OVNKubernetes Other"),
                Field::named("PodCIDR", shape_of::<String>)
                    .json("podCidr")
                    .validate("omitempty,cidrv4"),
                Field::named("ServiceCIDR", shape_of::<String>)
                    .json("serviceCidr")
                    .validate("omitempty,cidrv4"),
                Field::named("MachineCIDR", shape_of::<String>)
                    .json("machineCidr")
                    .validate("omitempty,cidrv4"),
                Field::named("HostPrefix", shape_of::<i32>)
                    .json("hostPrefix")
                    .validate("omitempty,min=23,max=26"),
            ],
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsoleProfile {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub url: String,
}

impl Reflect for ConsoleProfile {
    fn shape() -> Shape {
        Shape::structure("ConsoleProfile", vec![Field::named("URL", shape_of::<String>).json("url")])
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiProfile {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub url: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub visibility: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub authorized_cidrs: Vec<String>,
}

impl Reflect for ApiProfile {
    fn shape() -> Shape {
        Shape::structure(
            "ApiProfile",
            vec![
                Field::named("URL", shape_of::<String>).json("url").visibility("read"),
                Field::named("Visibility", shape_of::<String>)
                    .json("visibility")
                    .validate("omitempty,oneof=Public Private")
                    .visibility("read create"),
                Field::named("AuthorizedCIDRs", shape_of::<Vec<String>>)
                    .json("authorizedCidrs")
                    .validate("max=500")
                    .visibility("read create update"),
            ],
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserAssignedIdentitiesProfile {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub control_plane_operators: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub data_plane_operators: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub service_managed_identity: String,
}

impl Reflect for UserAssignedIdentitiesProfile {
    fn shape() -> Shape {
        Shape::structure(
            "UserAssignedIdentitiesProfile",
            vec![
                Field::named("ControlPlaneOperators", shape_of::<BTreeMap<String, String>>)
                    .json("controlPlaneOperators"),
                Field::named("DataPlaneOperators", shape_of::<BTreeMap<String, String>>)
                    .json("dataPlaneOperators"),
                Field::named("ServiceManagedIdentity", shape_of::<String>)
                    .json("serviceManagedIdentity")
                    .validate("omitempty,resource_id=Microsoft.ManagedIdentity/userAssignedIdentities"),
            ],
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperatorsAuthenticationProfile {
    #[serde(default)]
    pub user_assigned_identities: UserAssignedIdentitiesProfile,
}

impl Reflect for OperatorsAuthenticationProfile {
    fn shape() -> Shape {
        Shape::structure(
            "OperatorsAuthenticationProfile",
            vec![Field::named(
                "UserAssignedIdentities",
                shape_of::<UserAssignedIdentitiesProfile>,
            )
            .json("userAssignedIdentities")],
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformProfile {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub managed_resource_group: String,
    #[serde(default)]
    pub subnet_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub outbound_type: String,
    #[serde(default)]
    pub network_security_group_id: String,
    #[serde(default)]
    pub operators_authentication: OperatorsAuthenticationProfile,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub issuer_url: String,
}

impl Reflect for PlatformProfile {
    fn shape() -> Shape {
        Shape::structure(
            "PlatformProfile",
            vec![
                Field::named("ManagedResourceGroup", shape_of::<String>).json("managedResourceGroup"),
                Field::named("SubnetID", shape_of::<String>)
                    .json("subnetId")
                    .validate("required,resource_id=Microsoft.Network/virtualNetworks/subnets"),
                Field::named("OutboundType", shape_of::<String>)
                    .json("outboundType")
                    .validate("omitempty,oneof=LoadBalancer"),
                Field::named("NetworkSecurityGroupID", shape_of::<String>)
                    .json("networkSecurityGroupId")
                    .validate("required,resource_id=Microsoft.Network/networkSecurityGroups"),
                Field::named(
                    "OperatorsAuthentication",
                    shape_of::<OperatorsAuthenticationProfile>,
                )
                .json("operatorsAuthentication"),
                Field::named("IssuerURL", shape_of::<String>)
                    .json("issuerUrl")
                    .visibility("read"),
            ],
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterProperties {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provisioning_state: Option<ProvisioningState>,
    #[serde(default)]
    pub version: VersionProfile,
    #[serde(default)]
    pub dns: DnsProfile,
    #[serde(default)]
    pub network: NetworkProfile,
    #[serde(default)]
    pub console: ConsoleProfile,
    #[serde(default)]
    pub api: ApiProfile,
    #[serde(default)]
    pub platform: PlatformProfile,
    #[serde(default)]
    pub node_drain_timeout_minutes: i32,
}

impl Reflect for ClusterProperties {
    fn shape() -> Shape {
        Shape::structure(
            "ClusterProperties",
            vec![
                Field::named("ProvisioningState", shape_of::<Option<ProvisioningState>>)
                    .json("provisioningState")
                    .visibility("read"),
                Field::named("Version", shape_of::<VersionProfile>).json("version"),
                Field::named("DNS", shape_of::<DnsProfile>).json("dns"),
                Field::named("Network", shape_of::<NetworkProfile>)
                    .json("network")
                    .visibility("read create"),
                Field::named("Console", shape_of::<ConsoleProfile>)
                    .json("console")
                    .visibility("read"),
                Field::named("API", shape_of::<ApiProfile>).json("api"),
                Field::named("Platform", shape_of::<PlatformProfile>)
                    .json("platform")
                    .visibility("read create"),
                Field::named("NodeDrainTimeoutMinutes", shape_of::<i32>)
                    .json("nodeDrainTimeoutMinutes")
                    .validate("omitempty,min=0,max=10080")
                    .visibility("read create update"),
            ],
        )
    }
}

/// A hosted control plane cluster.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HcpCluster {
    #[serde(flatten)]
    pub tracked: TrackedResource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity: Option<ManagedServiceIdentity>,
    #[serde(default)]
    pub properties: ClusterProperties,
}

impl HcpCluster {
    pub fn new(location: impl Into<String>) -> Self {
        Self {
            tracked: TrackedResource::new(location),
            ..Self::default()
        }
    }

    fn operator_identities(&self) -> &UserAssignedIdentitiesProfile {
        &self.properties.platform.operators_authentication.user_assigned_identities
    }
}

impl Reflect for HcpCluster {
    fn shape() -> Shape {
        Shape::structure(
            "HcpCluster",
            vec![
                Field::embedded("TrackedResource", shape_of::<TrackedResource>),
                Field::named("Identity", shape_of::<Option<ManagedServiceIdentity>>)
                    .json("identity"),
                Field::named("Properties", shape_of::<ClusterProperties>).json("properties"),
            ],
        )
    }
}

impl ResourceKind for HcpCluster {
    const RESOURCE_TYPE: &'static str = "Microsoft.RedHatOpenShift/hcpOpenShiftClusters";

    fn validate_semantics(&self, _ctx: &SemanticContext<'_>) -> Vec<ErrorDetail> {
        let Some(identity) = &self.identity else {
            return Vec::new();
        };
        let assigned = &identity.user_assigned_identities;
        if assigned.is_empty() {
            return Vec::new();
        }

        let mut errors = Vec::new();
        let operators = self.operator_identities();

        let mut occurrences: BTreeMap<&str, usize> = BTreeMap::new();
        for resource_id in operators.control_plane_operators.values() {
            *occurrences.entry(resource_id.as_str()).or_default() += 1;
        }

        for (operator, resource_id) in &operators.control_plane_operators {
            let target = format!("{USER_ASSIGNED_IDENTITIES_TARGET}.controlPlaneOperators[{operator}]");
            if !assigned.contains_key(resource_id) {
                errors.push(ErrorDetail::invalid_request_content(
                    target,
                    format!("identity {resource_id} is not assigned to this resource"),
                ));
            } else if occurrences.get(resource_id.as_str()).copied().unwrap_or(0) > 1 {
                errors.push(ErrorDetail::invalid_request_content(
                    target,
                    format!("identity {resource_id} is used multiple times"),
                ));
            }
        }

        let smi = operators.service_managed_identity.as_str();
        if !smi.is_empty() {
            let target = format!("{USER_ASSIGNED_IDENTITIES_TARGET}.serviceManagedIdentity");
            if !assigned.contains_key(smi) {
                errors.push(ErrorDetail::invalid_request_content(
                    target.clone(),
                    format!("identity {smi} is not assigned to this resource"),
                ));
            }
            if occurrences.contains_key(smi) {
                errors.push(ErrorDetail::invalid_request_content(
                    target,
                    format!("identity {smi} is used multiple times"),
                ));
            }
        }

        for resource_id in assigned.keys() {
            if !occurrences.contains_key(resource_id.as_str()) && resource_id != smi {
                errors.push(ErrorDetail::invalid_request_content(
                    "identity.UserAssignedIdentities",
                    format!("identity {resource_id} is assigned to this resource but not used"),
                ));
            }
        }

        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use resmodel_core::Timestamp;
    use resmodel_validate::ValidationConfig;

    fn mi(name: &str) -> String {
        format!("/subscriptions/sub/resourceGroups/rg/providers/Microsoft.ManagedIdentity/userAssignedIdentities/{name}")
    }

    fn cluster(assigned: &[&str], operators: &[(&str, &str)], smi: &str) -> HcpCluster {
        let mut c = HcpCluster::new("eastus");
        c.identity = Some(ManagedServiceIdentity::user_assigned(assigned.iter().map(|n| mi(n))));
        let uai = &mut c.properties.platform.operators_authentication.user_assigned_identities;
        uai.control_plane_operators = operators
            .iter()
            .map(|(op, n)| (op.to_string(), mi(n)))
            .collect();
        if !smi.is_empty() {
            uai.service_managed_identity = mi(smi);
        }
        c
    }

    fn check(c: &HcpCluster) -> Vec<(String, String)> {
        let config = ValidationConfig::default();
        c.validate_semantics(&SemanticContext::new(Timestamp::now(), &config))
            .into_iter()
            .map(|e| (e.target, e.message))
            .collect()
    }

    #[test]
    fn test_consistent_identities_pass() {
        let c = cluster(&["a", "b", "s"], &[("ingress", "a"), ("dns", "b")], "s");
        assert!(check(&c).is_empty());
    }

    #[test]
    fn test_no_identity_block_skips_checks() {
        let mut c = cluster(&[], &[("ingress", "a")], "");
        c.identity = None;
        assert!(check(&c).is_empty());
    }

    #[test]
    fn test_unassigned_and_unused_identities() {
        let c = cluster(&["b", "c"], &[("dns", "b"), ("ingress", "a")], "");
        let errors = check(&c);
        assert_eq!(
            errors,
            vec![
                (
                    format!("{USER_ASSIGNED_IDENTITIES_TARGET}.controlPlaneOperators[ingress]"),
                    format!("identity {} is not assigned to this resource", mi("a")),
                ),
                (
                    "identity.UserAssignedIdentities".to_string(),
                    format!("identity {} is assigned to this resource but not used", mi("c")),
                ),
            ]
        );
    }

    #[test]
    fn test_identity_used_multiple_times() {
        let c = cluster(&["a"], &[("dns", "a"), ("ingress", "a")], "a");
        let errors = check(&c);
        let targets: Vec<&str> = errors.iter().map(|(t, _)| t.as_str()).collect();
        assert_eq!(
            targets,
            vec![
                "properties.platform.operatorsAuthentication.userAssignedIdentities.controlPlaneOperators[dns]",
                "properties.platform.operatorsAuthentication.userAssignedIdentities.controlPlaneOperators[ingress]",
                "properties.platform.operatorsAuthentication.userAssignedIdentities.serviceManagedIdentity",
            ]
        );
        assert!(errors.iter().all(|(_, m)| m.ends_with("is used multiple times")));
    }

    #[test]
    fn test_unassigned_service_managed_identity() {
        let c = cluster(&["a"], &[("dns", "a")], "s");
        let errors = check(&c);
        assert_eq!(errors.len(), 1);
        assert_eq!(
            errors[0].0,
            "properties.platform.operatorsAuthentication.userAssignedIdentities.serviceManagedIdentity"
        );
    }
}
