//! # Resource Kinds
//!
//! The registration surface for a resource type: its descriptor (through
//! [`Reflect`]), its visibility mapping, and an optional semantic hook that
//! runs after structural validation succeeds.

use std::any::{type_name, TypeId};
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Serialize;

use resmodel_core::{
    schema_map, ContractError, ErrorDetail, Reflect, Timestamp, VisibilityMap,
};

use crate::config::ValidationConfig;
use crate::structural::TagValidator;

/// Inputs a semantic check may depend on besides the resource itself.
#[derive(Debug, Clone, Copy)]
pub struct SemanticContext<'a> {
    /// The instant "now" is evaluated against. Fixed per validation run.
    pub now: Timestamp,
    pub config: &'a ValidationConfig,
}

impl<'a> SemanticContext<'a> {
    pub fn new(now: Timestamp, config: &'a ValidationConfig) -> Self {
        Self { now, config }
    }
}

/// A validated resource type.
pub trait ResourceKind: Reflect + Serialize + DeserializeOwned + Clone + Send + Sync {
    /// Fully qualified type, e.g. `Microsoft.RedHatOpenShift/hcpOpenShiftClusters`.
    const RESOURCE_TYPE: &'static str;

    /// The visibility mapping for this kind.
    ///
    /// Defaults to the mapping derived from `visibility` tags. Kinds that
    /// declare their mapping by hand override this; the contract check then
    /// compares the hand-written map against the Schema Map.
    fn visibility() -> Result<VisibilityMap, ContractError> {
        VisibilityMap::from_schema(&schema_map::<Self>())
    }

    /// Cross-field checks. Only called when structural validation found
    /// nothing. Details are reported in detection order.
    fn validate_semantics(&self, _ctx: &SemanticContext<'_>) -> Vec<ErrorDetail> {
        Vec::new()
    }
}

/// The visibility mapping of `K`, computed once per process.
///
/// Same locking as the schema cache: shared lookup, then an exclusive
/// re-check before building. A contract error is returned to every caller
/// and never stored.
pub fn visibility_of<K: ResourceKind>() -> Result<Arc<VisibilityMap>, ContractError> {
    static MAPS: OnceLock<RwLock<HashMap<TypeId, Arc<VisibilityMap>>>> = OnceLock::new();
    let maps = MAPS.get_or_init(RwLock::default);
    let key = TypeId::of::<K>();

    if let Some(map) = maps.read().get(&key) {
        return Ok(Arc::clone(map));
    }
    let mut maps = maps.write();
    if let Some(map) = maps.get(&key) {
        return Ok(Arc::clone(map));
    }
    let map = Arc::new(K::visibility()?);
    tracing::debug!(type_name = type_name::<K>(), paths = map.len(), "built visibility map");
    maps.insert(key, Arc::clone(&map));
    Ok(map)
}

/// Check the declarations of `K`: every `validate` rule parses and the
/// visibility mapping covers the Schema Map exactly.
pub fn check_contract<K: ResourceKind>() -> Result<(), ContractError> {
    let schema = schema_map::<K>();
    TagValidator::check_rules(&schema)?;
    K::visibility()?.check_consistency(&schema)
}
