//! Effects produced by a step and the sink that applies them
//!
//! The engine never touches the host; it returns a list of [`Effect`]s and
//! the host hands them to an [`EffectSink`] whenever convenient.

use serde::{Deserialize, Serialize};

use crate::core::config::{ExertionPolicy, MetabolismConfig};
use crate::core::types::{EntityId, ResourceKind};
use crate::entity::metabolism::{Activity, MetabolismState};

/// Changes to the rest of the player's metabolism caused by draining
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exertion {
    pub kind: ResourceKind,
    /// Move hydration toward 0 by this much
    pub hydration_loss: f32,
    /// Move heart rate toward 1 by this much
    pub heartrate_step: f32,
    pub temperature_target: f32,
    /// Move body temperature toward `temperature_target` by this much
    pub temperature_step: f32,
}

impl Exertion {
    pub fn from_policy(kind: ResourceKind, policy: &ExertionPolicy, elapsed: f32) -> Self {
        let step = |enabled: bool, rate: f32| if enabled { rate * elapsed } else { 0.0 };
        Self {
            kind,
            hydration_loss: step(policy.hydration_enabled, policy.hydration_loss_rate),
            heartrate_step: step(policy.heartrate_enabled, policy.heartrate_rate),
            temperature_target: policy.temperature_target,
            temperature_step: step(policy.temperature_enabled, policy.temperature_rate),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Effect {
    /// Grant or revoke a boost capability
    SetCapability { capability: String, granted: bool },
    /// Show the status indicator
    SetDisplay {
        kind: ResourceKind,
        /// Share of the effective ceiling, in [0, 1]
        fraction: f32,
        /// Percentage of the configured base ceiling, e.g. `"73%"`
        label: String,
    },
    ClearDisplay,
    /// Sprinting must be kept off while `suppressed` is true
    SprintSuppressed { suppressed: bool },
    Exertion(Exertion),
}

impl Effect {
    pub fn apply(&self, entity: EntityId, sink: &mut dyn EffectSink) {
        match self {
            Effect::SetCapability { capability, granted } => {
                sink.set_capability(entity, capability, *granted)
            }
            Effect::SetDisplay { kind, fraction, label } => {
                sink.set_display(entity, *kind, *fraction, label)
            }
            Effect::ClearDisplay => sink.clear_display(entity),
            Effect::SprintSuppressed { suppressed } => {
                sink.set_sprint_suppressed(entity, *suppressed)
            }
            Effect::Exertion(exertion) => sink.apply_exertion(entity, exertion),
        }
    }
}

/// Host-side receiver of effects
///
/// Calls are fire-and-forget and must be idempotent.
pub trait EffectSink {
    fn set_capability(&mut self, entity: EntityId, capability: &str, granted: bool);

    fn set_display(&mut self, entity: EntityId, kind: ResourceKind, fraction: f32, label: &str);

    fn clear_display(&mut self, entity: EntityId);

    fn set_sprint_suppressed(&mut self, _entity: EntityId, _suppressed: bool) {}

    fn apply_exertion(&mut self, _entity: EntityId, _exertion: &Exertion) {}
}

/// Hand effects to a sink; without a sink this does nothing
pub fn dispatch(entity: EntityId, effects: &[Effect], sink: Option<&mut dyn EffectSink>) {
    let Some(sink) = sink else {
        return;
    };
    for effect in effects {
        effect.apply(entity, sink);
    }
}

/// Sink that keeps every effect it receives, in order
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    pub received: Vec<(EntityId, Effect)>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn for_entity(&self, entity: EntityId) -> impl Iterator<Item = &Effect> + '_ {
        self.received
            .iter()
            .filter(move |(e, _)| *e == entity)
            .map(|(_, effect)| effect)
    }

    pub fn clear(&mut self) {
        self.received.clear();
    }
}

impl EffectSink for RecordingSink {
    fn set_capability(&mut self, entity: EntityId, capability: &str, granted: bool) {
        self.received.push((
            entity,
            Effect::SetCapability {
                capability: capability.to_string(),
                granted,
            },
        ));
    }

    fn set_display(&mut self, entity: EntityId, kind: ResourceKind, fraction: f32, label: &str) {
        self.received.push((
            entity,
            Effect::SetDisplay {
                kind,
                fraction,
                label: label.to_string(),
            },
        ));
    }

    fn clear_display(&mut self, entity: EntityId) {
        self.received.push((entity, Effect::ClearDisplay));
    }

    fn set_sprint_suppressed(&mut self, entity: EntityId, suppressed: bool) {
        self.received.push((entity, Effect::SprintSuppressed { suppressed }));
    }

    fn apply_exertion(&mut self, entity: EntityId, exertion: &Exertion) {
        self.received.push((entity, Effect::Exertion(exertion.clone())));
    }
}

/// Percentage label against the configured (unscaled) ceiling
pub fn percent_label(current: f32, base_max: f32) -> String {
    let percent = if base_max > 0.0 {
        current / base_max * 100.0
    } else {
        0.0
    };
    format!("{:.0}%", percent)
}

/// Grant or revoke the boost capabilities if the grant state changed
pub(crate) fn sync_capabilities(state: &mut MetabolismState, config: &MetabolismConfig, effects: &mut Vec<Effect>) {
    let granted = state.boost_available();
    if state.boost_granted == Some(granted) {
        return;
    }
    state.boost_granted = Some(granted);
    effects.extend(config.boost_capabilities.ids().iter().map(|id| Effect::SetCapability {
        capability: id.to_string(),
        granted,
    }));
}

pub(crate) fn sync_sprint_suppression(state: &mut MetabolismState, suppressed: bool, effects: &mut Vec<Effect>) {
    if state.sprint_suppressed != suppressed {
        state.sprint_suppressed = suppressed;
        effects.push(Effect::SprintSuppressed { suppressed });
    }
}

pub(crate) fn hide_display(state: &mut MetabolismState, effects: &mut Vec<Effect>) {
    if state.display_active {
        state.display_active = false;
        effects.push(Effect::ClearDisplay);
    }
}

/// Effects that hand everything back to the host when a player leaves
pub fn release_effects(state: &MetabolismState, config: &MetabolismConfig) -> Vec<Effect> {
    let mut effects: Vec<Effect> = config
        .boost_capabilities
        .ids()
        .iter()
        .map(|id| Effect::SetCapability {
            capability: id.to_string(),
            granted: false,
        })
        .collect();
    if state.sprint_suppressed {
        effects.push(Effect::SprintSuppressed { suppressed: false });
    }
    effects.push(Effect::ClearDisplay);
    effects
}

/// Status display, capability grants and sprint suppression for this step
pub(crate) fn emit_status(
    state: &mut MetabolismState,
    config: &MetabolismConfig,
    activity: &Activity,
    effects: &mut Vec<Effect>,
) {
    sync_capabilities(state, config, effects);
    let exhausted = state.stamina.is_empty();
    sync_sprint_suppression(state, exhausted, effects);

    if !config.display.enabled {
        return;
    }
    if activity.is_mounted && config.display.hide_when_mounted {
        hide_display(state, effects);
        return;
    }

    let kind = state.displayed_kind();
    let pool = state.pool(kind);
    let fraction = pool.fraction();
    let label = percent_label(pool.current, config.policy(kind).max);
    state.display_active = true;
    effects.push(Effect::SetDisplay { kind, fraction, label });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::SimTime;

    fn state(config: &MetabolismConfig) -> MetabolismState {
        MetabolismState::new(EntityId::new(), SimTime::ZERO, config, 100.0, 10.0)
    }

    #[test]
    fn test_percent_label() {
        assert_eq!(percent_label(48.0, 100.0), "48%");
        assert_eq!(percent_label(7.5, 10.0), "75%");
        assert_eq!(percent_label(150.0, 100.0), "150%");
        assert_eq!(percent_label(1.0, 0.0), "0%");
    }

    #[test]
    fn test_capabilities_are_edge_triggered() {
        let config = MetabolismConfig::default();
        let mut s = state(&config);
        let mut effects = Vec::new();

        sync_capabilities(&mut s, &config, &mut effects);
        assert_eq!(effects.len(), 2, "first sync reports both capabilities");
        assert!(effects
            .iter()
            .all(|e| matches!(e, Effect::SetCapability { granted: false, .. })));

        effects.clear();
        sync_capabilities(&mut s, &config, &mut effects);
        assert!(effects.is_empty());

        s.boost.current = 3.0;
        sync_capabilities(&mut s, &config, &mut effects);
        assert_eq!(
            effects[0],
            Effect::SetCapability {
                capability: "movementspeed.run.3".into(),
                granted: true
            }
        );
        assert_eq!(s.boost_granted(), Some(true));
    }

    #[test]
    fn test_display_shows_boost_when_banked() {
        let config = MetabolismConfig::default();
        let mut s = state(&config);
        s.boost.current = 1.0;
        s.boost.current_max = 5.0;

        let mut effects = Vec::new();
        emit_status(&mut s, &config, &Activity::idle(), &mut effects);

        let display = effects
            .iter()
            .find(|e| matches!(e, Effect::SetDisplay { .. }))
            .expect("display effect");
        assert_eq!(
            display,
            &Effect::SetDisplay {
                kind: ResourceKind::Boost,
                fraction: 0.1,
                label: "10%".into()
            }
        );
        assert!(s.display_active);
    }

    #[test]
    fn test_mounted_hides_display_once() {
        let config = MetabolismConfig::default();
        let mut s = state(&config);
        let mut effects = Vec::new();
        emit_status(&mut s, &config, &Activity::idle(), &mut effects);
        assert!(s.display_active);

        effects.clear();
        emit_status(&mut s, &config, &Activity::idle().mounted(), &mut effects);
        assert_eq!(effects, vec![Effect::ClearDisplay]);
        assert!(!s.display_active);

        effects.clear();
        emit_status(&mut s, &config, &Activity::idle().mounted(), &mut effects);
        assert!(effects.is_empty());
    }

    #[test]
    fn test_display_disabled() {
        let mut config = MetabolismConfig::default();
        config.display.enabled = false;
        let mut s = state(&config);
        let mut effects = Vec::new();
        emit_status(&mut s, &config, &Activity::idle(), &mut effects);
        assert!(!effects
            .iter()
            .any(|e| matches!(e, Effect::SetDisplay { .. } | Effect::ClearDisplay)));
    }

    #[test]
    fn test_release_effects_revoke_everything() {
        let config = MetabolismConfig::default();
        let mut s = state(&config);
        s.sprint_suppressed = true;

        let effects = release_effects(&s, &config);
        assert_eq!(effects.len(), 4);
        assert!(effects.contains(&Effect::SetCapability {
            capability: "movementspeed.swim.3".into(),
            granted: false
        }));
        assert!(effects.contains(&Effect::SprintSuppressed { suppressed: false }));
        assert_eq!(effects.last(), Some(&Effect::ClearDisplay));
    }

    #[test]
    fn test_dispatch_without_sink_is_noop() {
        dispatch(EntityId::new(), &[Effect::ClearDisplay], None);
    }

    #[test]
    fn test_dispatch_to_recording_sink() {
        let id = EntityId::new();
        let mut sink = RecordingSink::new();
        let effects = vec![
            Effect::ClearDisplay,
            Effect::SprintSuppressed { suppressed: true },
        ];
        dispatch(id, &effects, Some(&mut sink as &mut dyn EffectSink));
        assert_eq!(sink.for_entity(id).cloned().collect::<Vec<_>>(), effects);
    }

    #[test]
    fn test_exertion_respects_disabled_channels() {
        let mut policy = ExertionPolicy::stamina();
        policy.hydration_enabled = false;
        let exertion = Exertion::from_policy(ResourceKind::Stamina, &policy, 2.0);
        assert_eq!(exertion.hydration_loss, 0.0);
        assert!((exertion.heartrate_step - 0.4).abs() < 1e-6);
        assert!((exertion.temperature_step - 6.0).abs() < 1e-6);
    }
}
