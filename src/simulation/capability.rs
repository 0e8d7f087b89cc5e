//! Capability lookups the tick engine consumes
//!
//! The engine never asks the host directly; it goes through a
//! [`CapabilityProbe`]. Hosts without any capability system pass
//! [`NoCapabilities`], which means "multiplier 1, never incapacitated".

use std::collections::BTreeMap;

use ahash::{AHashMap, AHashSet};

use crate::core::config::{MultiplierKind, PermissionTiers};
use crate::core::types::{EntityId, ResourceKind};

/// Read-only view of the capabilities that shape one player's metabolism
pub trait CapabilityProbe: Send + Sync {
    /// Scale applied to the configured permanent ceiling (>= 1)
    fn max_multiplier(&self, _entity: EntityId, _kind: ResourceKind) -> f32 {
        1.0
    }

    /// Scale applied to replenish and ceiling-regrowth rates (>= 1)
    fn replenish_multiplier(&self, _entity: EntityId, _kind: ResourceKind) -> f32 {
        1.0
    }

    /// External condition that overrides the simulation (e.g. broken leg)
    fn is_incapacitated(&self, _entity: EntityId) -> bool {
        false
    }

    /// Whether the player takes part in the simulation at all
    fn can_use(&self, _entity: EntityId) -> bool {
        true
    }
}

/// Probe for hosts with no capability data
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCapabilities;

impl CapabilityProbe for NoCapabilities {}

/// Multipliers below 1 or non-finite values from a probe are treated as 1
pub fn sanitize_multiplier(multiplier: f32) -> f32 {
    if multiplier.is_finite() && multiplier >= 1.0 {
        multiplier
    } else {
        1.0
    }
}

/// Host-side permission storage queried by [`PermissionProbe`]
pub trait PermissionStore: Send + Sync {
    fn has_permission(&self, entity: EntityId, permission: &str) -> bool;

    fn is_incapacitated(&self, _entity: EntityId) -> bool {
        false
    }
}

/// Probe deriving multipliers from tiered permission strings
///
/// The highest tier a player holds wins; holding none gives 1.
pub struct PermissionProbe<'a, S: PermissionStore> {
    tiers: &'a PermissionTiers,
    store: &'a S,
    require_use: bool,
}

impl<'a, S: PermissionStore> PermissionProbe<'a, S> {
    pub fn new(tiers: &'a PermissionTiers, store: &'a S) -> Self {
        Self {
            tiers,
            store,
            require_use: true,
        }
    }

    /// Let every player take part, whether or not they hold the use permission
    pub fn without_use_gate(mut self) -> Self {
        self.require_use = false;
        self
    }

    fn tier_multiplier(&self, entity: EntityId, table: &BTreeMap<String, f32>) -> f32 {
        table
            .iter()
            .filter(|(suffix, _)| self.store.has_permission(entity, &self.tiers.permission(suffix)))
            .map(|(_, multiplier)| *multiplier)
            .fold(1.0, f32::max)
    }
}

impl<S: PermissionStore> CapabilityProbe for PermissionProbe<'_, S> {
    fn max_multiplier(&self, entity: EntityId, kind: ResourceKind) -> f32 {
        self.tier_multiplier(entity, self.tiers.table(kind, MultiplierKind::Max))
    }

    fn replenish_multiplier(&self, entity: EntityId, kind: ResourceKind) -> f32 {
        self.tier_multiplier(entity, self.tiers.table(kind, MultiplierKind::Replenish))
    }

    fn is_incapacitated(&self, entity: EntityId) -> bool {
        self.store.is_incapacitated(entity)
    }

    fn can_use(&self, entity: EntityId) -> bool {
        !self.require_use || self.store.has_permission(entity, &self.tiers.use_permission())
    }
}

/// In-memory permission store
#[derive(Debug, Clone, Default)]
pub struct GrantTable {
    grants: AHashMap<EntityId, AHashSet<String>>,
    incapacitated: AHashSet<EntityId>,
}

impl GrantTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn grant(&mut self, entity: EntityId, permission: impl Into<String>) {
        self.grants.entry(entity).or_default().insert(permission.into());
    }

    pub fn revoke(&mut self, entity: EntityId, permission: &str) {
        if let Some(set) = self.grants.get_mut(&entity) {
            set.remove(permission);
        }
    }

    pub fn set_incapacitated(&mut self, entity: EntityId, incapacitated: bool) {
        if incapacitated {
            self.incapacitated.insert(entity);
        } else {
            self.incapacitated.remove(&entity);
        }
    }

    pub fn forget(&mut self, entity: EntityId) {
        self.grants.remove(&entity);
        self.incapacitated.remove(&entity);
    }
}

impl PermissionStore for GrantTable {
    fn has_permission(&self, entity: EntityId, permission: &str) -> bool {
        self.grants
            .get(&entity)
            .is_some_and(|set| set.contains(permission))
    }

    fn is_incapacitated(&self, entity: EntityId) -> bool {
        self.incapacitated.contains(&entity)
    }
}
