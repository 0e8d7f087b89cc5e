//! Per-player metabolism state

use serde::{Deserialize, Serialize};

use crate::core::config::MetabolismConfig;
use crate::core::types::{EntityId, ResourceKind, SimTime};
use crate::entity::pool::ResourcePool;

/// What the player is doing this frame, as reported by the host
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Activity {
    pub is_moving_fast: bool,
    pub is_swimming: bool,
    pub is_sleeping_or_dead: bool,
    /// Mounted or in a vehicle; only hides the status display
    pub is_mounted: bool,
}

impl Activity {
    pub fn idle() -> Self {
        Self::default()
    }

    pub fn running() -> Self {
        Self {
            is_moving_fast: true,
            ..Self::default()
        }
    }

    pub fn swimming() -> Self {
        Self {
            is_moving_fast: true,
            is_swimming: true,
            ..Self::default()
        }
    }

    pub fn sleeping() -> Self {
        Self {
            is_sleeping_or_dead: true,
            ..Self::default()
        }
    }

    pub fn mounted(self) -> Self {
        Self {
            is_mounted: true,
            ..self
        }
    }
}

/// Everything the tick engine tracks for one active player
///
/// Created when the player becomes active and dropped when they leave;
/// nothing survives a reconnect.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetabolismState {
    pub entity: EntityId,
    pub stamina: ResourcePool,
    pub boost: ResourcePool,

    /// Earliest time stamina may start replenishing again
    pub stamina_cooldown_until: SimTime,
    /// Earliest time boost may start replenishing again
    pub boost_cooldown_until: SimTime,

    pub last_tick_at: SimTime,

    /// Latched external incapacitation (e.g. a broken leg)
    pub incapacitated: bool,
    /// When the incapacitation signal was last queried
    pub last_incapacity_poll: Option<SimTime>,

    /// Player lacks the use capability and is frozen out of the simulation
    pub disabled: bool,

    /// Status indicator currently shown
    pub display_active: bool,

    pub stamina_replenish_multiplier: f32,
    pub boost_replenish_multiplier: f32,

    /// Last boost grant state handed to the host; `None` until first reported
    pub(crate) boost_granted: Option<bool>,
    pub(crate) sprint_suppressed: bool,
}

impl MetabolismState {
    /// Fresh state for a player who just became active
    ///
    /// `stamina_max` and `boost_max` are the effective ceilings with capability
    /// multipliers already applied.
    pub fn new(
        entity: EntityId,
        now: SimTime,
        config: &MetabolismConfig,
        stamina_max: f32,
        boost_max: f32,
    ) -> Self {
        let stamina = ResourcePool::new(
            stamina_max * config.starting_stamina_fraction,
            stamina_max,
            config.stamina.min,
            stamina_max,
        );

        Self {
            entity,
            stamina,
            boost: ResourcePool::empty(config.boost.min, boost_max),
            stamina_cooldown_until: now,
            boost_cooldown_until: now,
            last_tick_at: now,
            incapacitated: false,
            last_incapacity_poll: None,
            disabled: false,
            display_active: false,
            stamina_replenish_multiplier: 1.0,
            boost_replenish_multiplier: 1.0,
            boost_granted: None,
            sprint_suppressed: false,
        }
    }

    pub fn pool(&self, kind: ResourceKind) -> &ResourcePool {
        match kind {
            ResourceKind::Stamina => &self.stamina,
            ResourceKind::Boost => &self.boost,
        }
    }

    pub fn pool_mut(&mut self, kind: ResourceKind) -> &mut ResourcePool {
        match kind {
            ResourceKind::Stamina => &mut self.stamina,
            ResourceKind::Boost => &mut self.boost,
        }
    }

    pub fn cooldown_until(&self, kind: ResourceKind) -> SimTime {
        match kind {
            ResourceKind::Stamina => self.stamina_cooldown_until,
            ResourceKind::Boost => self.boost_cooldown_until,
        }
    }

    pub fn set_cooldown_until(&mut self, kind: ResourceKind, deadline: SimTime) {
        match kind {
            ResourceKind::Stamina => self.stamina_cooldown_until = deadline,
            ResourceKind::Boost => self.boost_cooldown_until = deadline,
        }
    }

    pub fn replenish_multiplier(&self, kind: ResourceKind) -> f32 {
        match kind {
            ResourceKind::Stamina => self.stamina_replenish_multiplier,
            ResourceKind::Boost => self.boost_replenish_multiplier,
        }
    }

    /// Resource the status display shows: boost while any is banked
    pub fn displayed_kind(&self) -> ResourceKind {
        if self.boost.current > 0.0 {
            ResourceKind::Boost
        } else {
            ResourceKind::Stamina
        }
    }

    /// Whether boost capabilities should currently be held
    pub fn boost_available(&self) -> bool {
        self.boost.current > 0.0
    }

    /// Level-triggered: the host must keep sprinting disabled while true
    pub fn sprint_suppressed(&self) -> bool {
        self.sprint_suppressed
    }

    /// Last grant state reported for the boost capabilities
    pub fn boost_granted(&self) -> Option<bool> {
        self.boost_granted
    }

    pub fn invariants_hold(&self) -> bool {
        self.stamina.invariant_holds() && self.boost.invariant_holds()
    }
}
