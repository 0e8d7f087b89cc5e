//! Cooldown gates and the incapacitation latch
//!
//! Cooldowns are plain deadlines compared against the host clock. The
//! incapacitation signal is comparatively expensive to query, so it is
//! latched and only re-polled every `incapacitation_poll_interval` seconds.

use crate::core::config::RegenerationPolicy;
use crate::core::types::{ResourceKind, SimTime};
use crate::entity::metabolism::MetabolismState;
use crate::simulation::capability::CapabilityProbe;

/// Delay before replenishing may resume after a use
///
/// Running the resource completely dry earns the longer delay.
pub fn cooldown_after_use(policy: &RegenerationPolicy, depleted: bool) -> f32 {
    if depleted {
        policy.cooldown_depleted
    } else {
        policy.cooldown
    }
}

/// Restart the cooldown of `kind` after it was drained at `now`
pub fn arm_cooldown(state: &mut MetabolismState, kind: ResourceKind, now: SimTime, policy: &RegenerationPolicy) {
    let depleted = state.pool(kind).is_empty();
    state.set_cooldown_until(kind, now.after(cooldown_after_use(policy, depleted)));
}

/// True once replenishing `kind` is allowed again
pub fn cooldown_elapsed(state: &MetabolismState, kind: ResourceKind, now: SimTime) -> bool {
    now.reached(state.cooldown_until(kind))
}

/// Keep boost from recovering while stamina's ceiling is still regrowing
pub fn hold_back_boost(state: &mut MetabolismState, now: SimTime, boost: &RegenerationPolicy) {
    state.boost_cooldown_until = now.after(boost.cooldown_depleted);
}

/// Refresh the incapacitation latch, querying the probe only when due
///
/// Returns the latched value.
pub fn poll_incapacitation(
    state: &mut MetabolismState,
    now: SimTime,
    poll_interval: f32,
    probe: &dyn CapabilityProbe,
) -> bool {
    let due = match state.last_incapacity_poll {
        None => true,
        Some(last) => now.since(last) >= poll_interval,
    };
    if !due {
        return state.incapacitated;
    }

    let incapacitated = probe.is_incapacitated(state.entity);
    state.last_incapacity_poll = Some(now);

    if incapacitated != state.incapacitated {
        tracing::debug!(
            "Entity {} incapacitation {}",
            state.entity,
            if incapacitated { "latched" } else { "released" }
        );
        state.incapacitated = incapacitated;
    }
    incapacitated
}

/// Override applied on every step while incapacitated
pub fn apply_incapacitation(state: &mut MetabolismState) {
    state.boost.collapse();
    state.stamina.current = 0.0;
}
