//! Tick engine - advances one player's metabolism by one step
//!
//! Each accepted step runs exactly one phase, chosen by priority:
//! 1. Drain (boost first while any is banked, then stamina)
//! 2. Replenish stamina up to its soft ceiling (cooldown gated)
//! 3. Regrow the stamina ceiling (holds boost back while running)
//! 4. Replenish boost up to its soft ceiling (cooldown gated)
//! 5. Regrow the boost ceiling
//!
//! Incapacitation and a missing use capability bypass all of them. Status
//! effects are emitted after every accepted step.
//!
//! The engine holds no per-player data; it only reads configuration and the
//! capability probe and mutates the `MetabolismState` it is handed, so steps
//! for different players can run on different threads.

use crate::core::config::MetabolismConfig;
use crate::core::types::{EntityId, ResourceKind, SimTime};
use crate::entity::metabolism::{Activity, MetabolismState};
use crate::simulation::capability::{sanitize_multiplier, CapabilityProbe};
use crate::simulation::cooldown::{
    apply_incapacitation, arm_cooldown, cooldown_elapsed, hold_back_boost, poll_incapacitation,
};
use crate::simulation::effects::{
    emit_status, hide_display, sync_capabilities, sync_sprint_suppression, Effect, Exertion,
};

/// Which branch an accepted step took
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    DrainBoost,
    DrainStamina,
    ReplenishStamina,
    RestoreStaminaCeiling,
    ReplenishBoost,
    RestoreBoostCeiling,
    /// Replenishing was due but the resource's cooldown has not passed
    CoolingDown(ResourceKind),
    /// Everything full, nothing to do
    Idle,
    Incapacitated,
    /// Player lacks the use capability
    Disabled,
}

/// Result of [`TickEngine::step`]
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    /// Sleeping or dead: nothing changed, timers not advanced
    Dormant,
    /// Too soon after the previous accepted step
    Throttled,
    Stepped {
        phase: Phase,
        elapsed: f32,
        effects: Vec<Effect>,
    },
}

impl StepOutcome {
    pub fn phase(&self) -> Option<Phase> {
        match self {
            StepOutcome::Stepped { phase, .. } => Some(*phase),
            _ => None,
        }
    }

    pub fn effects(&self) -> &[Effect] {
        match self {
            StepOutcome::Stepped { effects, .. } => effects,
            _ => &[],
        }
    }

    pub fn into_effects(self) -> Vec<Effect> {
        match self {
            StepOutcome::Stepped { effects, .. } => effects,
            _ => Vec::new(),
        }
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self, StepOutcome::Stepped { .. })
    }
}

/// Stateless update algorithm over a borrowed configuration
#[derive(Debug, Clone, Copy)]
pub struct TickEngine<'a> {
    config: &'a MetabolismConfig,
}

impl<'a> TickEngine<'a> {
    pub fn new(config: &'a MetabolismConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &'a MetabolismConfig {
        self.config
    }

    /// Fresh state for a player who just became active
    pub fn spawn_state(&self, entity: EntityId, now: SimTime, probe: &dyn CapabilityProbe) -> MetabolismState {
        let mut state = MetabolismState::new(
            entity,
            now,
            self.config,
            self.effective_max(entity, ResourceKind::Stamina, probe),
            self.effective_max(entity, ResourceKind::Boost, probe),
        );
        self.refresh_replenish_multipliers(&mut state, probe);
        state
    }

    /// Advance `state` to `now`
    pub fn step(
        &self,
        state: &mut MetabolismState,
        now: SimTime,
        activity: &Activity,
        probe: &dyn CapabilityProbe,
    ) -> StepOutcome {
        if activity.is_sleeping_or_dead {
            return StepOutcome::Dormant;
        }

        let elapsed = now.since(state.last_tick_at);
        if elapsed < self.config.tick_rate {
            tracing::trace!("Entity {} throttled ({:.3}s since last step)", state.entity, elapsed);
            return StepOutcome::Throttled;
        }

        let mut effects = Vec::new();

        if !probe.can_use(state.entity) {
            self.disable(state, now, &mut effects);
            return StepOutcome::Stepped {
                phase: Phase::Disabled,
                elapsed,
                effects,
            };
        }
        if state.disabled {
            tracing::debug!("Entity {} regained the use capability", state.entity);
            state.disabled = false;
        }

        let phase = if poll_incapacitation(state, now, self.config.incapacitation_poll_interval, probe) {
            apply_incapacitation(state);
            Phase::Incapacitated
        } else {
            self.refresh_capabilities(state, probe);
            self.advance(state, now, elapsed, activity, &mut effects)
        };

        emit_status(state, self.config, activity, &mut effects);
        state.last_tick_at = now;

        StepOutcome::Stepped {
            phase,
            elapsed,
            effects,
        }
    }

    /// Run the single highest-priority phase that applies
    fn advance(
        &self,
        state: &mut MetabolismState,
        now: SimTime,
        elapsed: f32,
        activity: &Activity,
        effects: &mut Vec<Effect>,
    ) -> Phase {
        if activity.is_moving_fast {
            let kind = if state.boost.current > 0.0 {
                ResourceKind::Boost
            } else {
                ResourceKind::Stamina
            };
            return self.drain(state, kind, now, elapsed, activity.is_swimming, effects);
        }

        if !state.stamina.is_topped_up() {
            return self.replenish(state, ResourceKind::Stamina, now, elapsed);
        }

        if !state.stamina.ceiling_restored() {
            self.regrow(state, ResourceKind::Stamina, elapsed);
            hold_back_boost(state, now, &self.config.boost);
            return Phase::RestoreStaminaCeiling;
        }

        if !state.boost.is_topped_up() {
            return self.replenish(state, ResourceKind::Boost, now, elapsed);
        }

        if !state.boost.ceiling_restored() {
            self.regrow(state, ResourceKind::Boost, elapsed);
            return Phase::RestoreBoostCeiling;
        }

        Phase::Idle
    }

    fn drain(
        &self,
        state: &mut MetabolismState,
        kind: ResourceKind,
        now: SimTime,
        elapsed: f32,
        swimming: bool,
        effects: &mut Vec<Effect>,
    ) -> Phase {
        let policy = self.config.policy(kind);
        let was_empty = state.pool(kind).is_empty();

        let emptied = state.pool_mut(kind).drain(elapsed * policy.drain_rate(swimming));
        arm_cooldown(state, kind, now, policy);

        if emptied && !was_empty {
            tracing::debug!("Entity {} ran out of {}", state.entity, kind);
        }

        let exertion = self.config.exertion(kind);
        if exertion.is_active() {
            effects.push(Effect::Exertion(Exertion::from_policy(kind, exertion, elapsed)));
        }

        match kind {
            ResourceKind::Boost => Phase::DrainBoost,
            ResourceKind::Stamina => Phase::DrainStamina,
        }
    }

    fn replenish(&self, state: &mut MetabolismState, kind: ResourceKind, now: SimTime, elapsed: f32) -> Phase {
        if !cooldown_elapsed(state, kind, now) {
            return Phase::CoolingDown(kind);
        }

        let policy = self.config.policy(kind);
        let gain = elapsed * policy.replenish_rate * state.replenish_multiplier(kind);
        let erosion = elapsed * policy.max_loss_rate;
        state.pool_mut(kind).recover(gain, erosion);

        match kind {
            ResourceKind::Stamina => Phase::ReplenishStamina,
            ResourceKind::Boost => Phase::ReplenishBoost,
        }
    }

    fn regrow(&self, state: &mut MetabolismState, kind: ResourceKind, elapsed: f32) {
        let policy = self.config.policy(kind);
        let amount = elapsed * policy.max_replenish_rate * state.replenish_multiplier(kind);
        let pool = state.pool_mut(kind);
        pool.regrow_ceiling(amount);

        if pool.is_full() {
            tracing::debug!("Entity {} {} ceiling fully restored", state.entity, kind);
        }
    }

    /// Freeze a player who lacks the use capability
    fn disable(&self, state: &mut MetabolismState, now: SimTime, effects: &mut Vec<Effect>) {
        if !state.disabled {
            tracing::debug!("Entity {} lost the use capability", state.entity);
            state.disabled = true;
        }

        state.boost.current = 0.0;
        sync_capabilities(state, self.config, effects);
        sync_sprint_suppression(state, false, effects);
        hide_display(state, effects);

        // Checked again only once the delay has passed
        state.last_tick_at = now.after(self.config.disabled_recheck_delay);
    }

    fn effective_max(&self, entity: EntityId, kind: ResourceKind, probe: &dyn CapabilityProbe) -> f32 {
        self.config.policy(kind).max * sanitize_multiplier(probe.max_multiplier(entity, kind))
    }

    fn refresh_replenish_multipliers(&self, state: &mut MetabolismState, probe: &dyn CapabilityProbe) {
        state.stamina_replenish_multiplier =
            sanitize_multiplier(probe.replenish_multiplier(state.entity, ResourceKind::Stamina));
        state.boost_replenish_multiplier =
            sanitize_multiplier(probe.replenish_multiplier(state.entity, ResourceKind::Boost));
    }

    /// Pick up multiplier or config changes since the previous step
    fn refresh_capabilities(&self, state: &mut MetabolismState, probe: &dyn CapabilityProbe) {
        for kind in ResourceKind::ALL {
            let max = self.effective_max(state.entity, kind, probe);
            let min = self.config.policy(kind).min;
            let pool = state.pool_mut(kind);
            if pool.max != max || pool.min != min {
                pool.reconfigure(min, max);
            }
        }
        self.refresh_replenish_multipliers(state, probe);
    }
}
