//! Metabolism world - owns every active player's state

use ahash::AHashMap;
use rayon::prelude::*;

use crate::core::config::MetabolismConfig;
use crate::core::error::{ConfigIssue, MetabolismError, Result};
use crate::core::types::{EntityId, SimTime};
use crate::entity::metabolism::{Activity, MetabolismState};
use crate::simulation::capability::CapabilityProbe;
use crate::simulation::effects::{release_effects, Effect};
use crate::simulation::tick::{StepOutcome, TickEngine};

/// Registry of active players and the config they are simulated with
///
/// Each state is only ever touched by the step for its own player, so a
/// batch can be stepped in parallel without locking.
pub struct MetabolismWorld {
    config: MetabolismConfig,
    states: AHashMap<EntityId, MetabolismState>,
}

impl MetabolismWorld {
    pub fn new(config: MetabolismConfig) -> Self {
        let mut world = Self {
            config: MetabolismConfig::default(),
            states: AHashMap::new(),
        };
        world.set_config(config);
        world
    }

    pub fn config(&self) -> &MetabolismConfig {
        &self.config
    }

    /// Swap in a new config; it applies from the next step on
    ///
    /// Out-of-range values are corrected and returned.
    pub fn set_config(&mut self, mut config: MetabolismConfig) -> Vec<ConfigIssue> {
        let issues = config.sanitize();
        for issue in &issues {
            tracing::warn!("Config issue corrected: {}", issue);
        }
        self.config = config;
        tracing::info!("Metabolism config applied ({} players active)", self.states.len());
        issues
    }

    /// Start simulating a player; returns false if they were already active
    pub fn spawn(&mut self, entity: EntityId, now: SimTime, probe: &dyn CapabilityProbe) -> bool {
        if self.states.contains_key(&entity) {
            return false;
        }
        let state = TickEngine::new(&self.config).spawn_state(entity, now, probe);
        self.states.insert(entity, state);
        tracing::info!("Spawned metabolism for {}", entity);
        true
    }

    /// Stop simulating a player, returning the effects that release their grants
    pub fn despawn(&mut self, entity: EntityId) -> Option<Vec<Effect>> {
        let state = self.states.remove(&entity)?;
        tracing::info!("Despawned metabolism for {}", entity);
        Some(release_effects(&state, &self.config))
    }

    pub fn get(&self, entity: EntityId) -> Option<&MetabolismState> {
        self.states.get(&entity)
    }

    pub fn get_mut(&mut self, entity: EntityId) -> Option<&mut MetabolismState> {
        self.states.get_mut(&entity)
    }

    pub fn contains(&self, entity: EntityId) -> bool {
        self.states.contains_key(&entity)
    }

    pub fn entity_count(&self) -> usize {
        self.states.len()
    }

    pub fn entities(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.states.keys().copied()
    }

    pub fn step_entity(
        &mut self,
        entity: EntityId,
        now: SimTime,
        activity: &Activity,
        probe: &dyn CapabilityProbe,
    ) -> Result<StepOutcome> {
        let state = self
            .states
            .get_mut(&entity)
            .ok_or(MetabolismError::EntityNotFound(entity))?;
        Ok(TickEngine::new(&self.config).step(state, now, activity, probe))
    }

    /// Step every player that has an activity entry for this frame
    ///
    /// Players without an entry are left untouched. Runs in parallel once the
    /// population reaches `parallel_threshold`.
    pub fn step_all(
        &mut self,
        now: SimTime,
        activities: &AHashMap<EntityId, Activity>,
        probe: &dyn CapabilityProbe,
    ) -> Vec<(EntityId, StepOutcome)> {
        let engine = TickEngine::new(&self.config);
        let parallel = self.states.len() >= self.config.parallel_threshold;

        let batch: Vec<(&mut MetabolismState, &Activity)> = self
            .states
            .values_mut()
            .filter_map(|state| activities.get(&state.entity).map(|a| (state, a)))
            .collect();

        if parallel {
            // PARALLEL: every state is owned by exactly one item of the batch
            batch
                .into_par_iter()
                .map(|(state, activity)| (state.entity, engine.step(state, now, activity, probe)))
                .collect()
        } else {
            batch
                .into_iter()
                .map(|(state, activity)| (state.entity, engine.step(state, now, activity, probe)))
                .collect()
        }
    }
}

impl Default for MetabolismWorld {
    fn default() -> Self {
        Self::new(MetabolismConfig::default())
    }
}
