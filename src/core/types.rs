//! Core type definitions used throughout the codebase

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for simulated players
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityId(pub Uuid);

impl EntityId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Point on the host's monotonic clock, in seconds
///
/// Kept as `f64` so cooldown deadlines stay precise over long server uptimes;
/// resource amounts and rates are `f32`.
#[derive(Debug, Clone, Copy, Default, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct SimTime(pub f64);

impl SimTime {
    pub const ZERO: SimTime = SimTime(0.0);

    pub fn from_secs(secs: f64) -> Self {
        Self(secs)
    }

    pub fn as_secs(&self) -> f64 {
        self.0
    }

    /// Deadline `secs` seconds after this instant
    pub fn after(&self, secs: f32) -> Self {
        Self(self.0 + secs as f64)
    }

    /// Seconds elapsed since `earlier` (negative if `earlier` lies in the future)
    pub fn since(&self, earlier: SimTime) -> f32 {
        (self.0 - earlier.0) as f32
    }

    /// True once this instant has reached `deadline`
    pub fn reached(&self, deadline: SimTime) -> bool {
        self.0 >= deadline.0
    }
}

/// The two resources every player carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Stamina,
    Boost,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 2] = [ResourceKind::Stamina, ResourceKind::Boost];

    pub fn name(&self) -> &'static str {
        match self {
            ResourceKind::Stamina => "stamina",
            ResourceKind::Boost => "boost",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
