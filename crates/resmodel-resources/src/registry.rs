//! # Resource Registry
//!
//! Every resource kind the service exposes, with a fail-fast contract check
//! meant to run once at startup (and in tests).

use thiserror::Error;

use resmodel_core::ContractError;
use resmodel_validate::{check_contract, ResourceKind};

use crate::cluster::HcpCluster;
use crate::dns_reservation::DnsReservation;
use crate::version::VersionCatalogEntry;

/// One registered resource kind.
#[derive(Debug, Clone, Copy)]
pub struct RegisteredKind {
    pub resource_type: &'static str,
    pub type_name: &'static str,
    check: fn() -> Result<(), ContractError>,
}

impl RegisteredKind {
    pub fn of<K: ResourceKind>() -> Self {
        Self {
            resource_type: K::RESOURCE_TYPE,
            type_name: std::any::type_name::<K>(),
            check: check_contract::<K>,
        }
    }

    pub fn check(&self) -> Result<(), ContractError> {
        (self.check)()
    }
}

/// Contract failures for one or more kinds.
#[derive(Error, Debug)]
#[error("{} resource kind(s) failed the contract check: {}", .failures.len(), summarize(.failures))]
pub struct RegistryError {
    pub failures: Vec<(&'static str, ContractError)>,
}

fn summarize(failures: &[(&'static str, ContractError)]) -> String {
    failures
        .iter()
        .map(|(resource_type, err)| format!("{resource_type}: {err}"))
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Debug, Clone, Default)]
pub struct ResourceRegistry {
    kinds: Vec<RegisteredKind>,
}

impl ResourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The registry of every built-in kind.
    pub fn builtin() -> Self {
        Self::new()
            .with::<HcpCluster>()
            .with::<DnsReservation>()
            .with::<VersionCatalogEntry>()
    }

    pub fn register<K: ResourceKind>(&mut self) {
        self.kinds.push(RegisteredKind::of::<K>());
    }

    pub fn with<K: ResourceKind>(mut self) -> Self {
        self.register::<K>();
        self
    }

    pub fn kinds(&self) -> &[RegisteredKind] {
        &self.kinds
    }

    pub fn resource_types(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.kinds.iter().map(|k| k.resource_type)
    }

    pub fn get(&self, resource_type: &str) -> Option<&RegisteredKind> {
        self.kinds
            .iter()
            .find(|k| k.resource_type.eq_ignore_ascii_case(resource_type))
    }

    /// Check every kind. All failures are reported together.
    pub fn check_all(&self) -> Result<(), RegistryError> {
        let failures: Vec<_> = self
            .kinds
            .iter()
            .filter_map(|k| k.check().err().map(|e| (k.resource_type, e)))
            .collect();

        if !failures.is_empty() {
            return Err(RegistryError { failures });
        }
        tracing::info!(kinds = self.kinds.len(), "resource kind contracts verified");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_registry_lists_all_kinds() {
        let registry = ResourceRegistry::builtin();
        let types: Vec<&str> = registry.resource_types().collect();
        assert_eq!(
            types,
            vec![
                "Microsoft.RedHatOpenShift/hcpOpenShiftClusters",
                "Microsoft.RedHatOpenShift/dnsReservations",
                "Microsoft.RedHatOpenShift/hcpOpenShiftVersions",
            ]
        );
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        let registry = ResourceRegistry::builtin();
        let kind = registry.get("microsoft.redhatopenshift/DNSRESERVATIONS").unwrap();
        assert!(kind.type_name.ends_with("DnsReservation"));
        assert!(registry.get("Microsoft.Compute/virtualMachines").is_none());
    }

    #[test]
    fn test_builtin_contracts_hold() {
        ResourceRegistry::builtin().check_all().unwrap();
    }
}
