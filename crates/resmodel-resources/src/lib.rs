//! # resmodel-resources: Resource Kinds
//!
//! The concrete resource types served by the API, each a
//! [`ResourceKind`](resmodel_validate::ResourceKind):
//!
//! - [`HcpCluster`]: hosted control plane clusters.
//! - [`DnsReservation`]: reserved cluster domain prefixes.
//! - [`VersionCatalogEntry`]: versions offered per channel group.
//!
//! [`ResourceRegistry::builtin`] lists all of them; call
//! [`ResourceRegistry::check_all`] at startup to fail fast on any tag or
//! visibility declaration that drifted from its type.

pub mod cluster;
pub mod dns_reservation;
pub mod envelope;
pub mod registry;
pub mod version;

pub use cluster::{ClusterProperties, HcpCluster};
pub use dns_reservation::{DnsReservation, DnsReservationProperties};
pub use envelope::{
    CreatedByType, ManagedServiceIdentity, ProvisioningState, Resource, SystemData,
    TrackedResource, UserAssignedIdentity,
};
pub use registry::{RegisteredKind, RegistryError, ResourceRegistry};
pub use version::{VersionCatalogEntry, VersionProperties};
