//! Metabolism integration tests

use ahash::AHashMap;

use player_metabolism::core::config::{load_config, MetabolismConfig};
use player_metabolism::core::types::{EntityId, ResourceKind, SimTime};
use player_metabolism::ecs::world::MetabolismWorld;
use player_metabolism::entity::metabolism::Activity;
use player_metabolism::entity::pool::ResourcePool;
use player_metabolism::simulation::capability::{GrantTable, NoCapabilities, PermissionProbe};
use player_metabolism::simulation::effects::{dispatch, Effect, EffectSink, RecordingSink};
use player_metabolism::simulation::tick::{Phase, StepOutcome, TickEngine};

fn at(secs: f64) -> SimTime {
    SimTime::from_secs(secs)
}

fn approx(a: f32, b: f32) -> bool {
    (a - b).abs() < 1e-3
}

#[test]
fn test_running_dry_earns_long_cooldown() {
    let config = MetabolismConfig::default();
    let engine = TickEngine::new(&config);
    let mut state = engine.spawn_state(EntityId::new(), SimTime::ZERO, &NoCapabilities);
    state.stamina.current = 1.0;

    let outcome = engine.step(&mut state, at(1.0), &Activity::running(), &NoCapabilities);
    assert_eq!(outcome.phase(), Some(Phase::DrainStamina));
    assert_eq!(state.stamina.current, 0.0);
    assert_eq!(state.stamina_cooldown_until, at(6.0));
    assert!(state.sprint_suppressed());
    assert!(outcome
        .effects()
        .contains(&Effect::SprintSuppressed { suppressed: true }));

    // 4.9s after running dry: still waiting
    let outcome = engine.step(&mut state, at(5.9), &Activity::idle(), &NoCapabilities);
    assert_eq!(outcome.phase(), Some(Phase::CoolingDown(ResourceKind::Stamina)));
    assert_eq!(state.stamina.current, 0.0);

    // 5.2s after: recovering, and sprinting is allowed again
    let outcome = engine.step(&mut state, at(6.2), &Activity::idle(), &NoCapabilities);
    assert_eq!(outcome.phase(), Some(Phase::ReplenishStamina));
    assert!(approx(state.stamina.current, 1.2));
    assert!(approx(state.stamina.current_max, 99.7));
    assert!(!state.sprint_suppressed());
    assert!(outcome
        .effects()
        .contains(&Effect::SprintSuppressed { suppressed: false }));
}

#[test]
fn test_full_exhaustion_cycle() {
    let config = MetabolismConfig::default();
    let engine = TickEngine::new(&config);
    let mut state = engine.spawn_state(EntityId::new(), SimTime::ZERO, &NoCapabilities);

    // Run 60 seconds at 4 steps per second
    let mut t = 0.0;
    for _ in 0..240 {
        t += 0.25;
        engine.step(&mut state, at(t), &Activity::running(), &NoCapabilities);
        assert!(state.invariants_hold());
    }
    assert_eq!(state.stamina.current, 0.0);

    // Rest until everything is back
    let mut phases = Vec::new();
    for _ in 0..2000 {
        t += 0.25;
        let outcome = engine.step(&mut state, at(t), &Activity::idle(), &NoCapabilities);
        assert!(state.invariants_hold());
        if let Some(phase) = outcome.phase() {
            if phases.last() != Some(&phase) {
                phases.push(phase);
            }
        }
    }

    assert!(state.stamina.is_full());
    assert!(state.boost.is_full());
    assert_eq!(state.boost_granted(), Some(true));

    let order: Vec<Phase> = phases
        .into_iter()
        .filter(|p| !matches!(p, Phase::CoolingDown(_)))
        .collect();
    assert_eq!(
        order,
        vec![
            Phase::ReplenishStamina,
            Phase::RestoreStaminaCeiling,
            Phase::ReplenishBoost,
            Phase::RestoreBoostCeiling,
            Phase::Idle,
        ]
    );
}

#[test]
fn test_boost_is_spent_before_stamina() {
    let config = MetabolismConfig::default();
    let engine = TickEngine::new(&config);
    let mut state = engine.spawn_state(EntityId::new(), SimTime::ZERO, &NoCapabilities);
    state.boost = ResourcePool::full(2.0, 10.0);
    state.stamina.current = 50.0;

    let mut t = 0.0;
    while state.boost.current > 0.0 {
        t += 0.5;
        let outcome = engine.step(&mut state, at(t), &Activity::running(), &NoCapabilities);
        assert_eq!(outcome.phase(), Some(Phase::DrainBoost));
        assert_eq!(state.stamina.current, 50.0);
    }
    assert_eq!(state.boost_granted(), Some(false));

    let outcome = engine.step(&mut state, at(t + 0.5), &Activity::running(), &NoCapabilities);
    assert_eq!(outcome.phase(), Some(Phase::DrainStamina));
    assert_eq!(state.stamina.current, 49.0);
}

#[test]
fn test_mounted_player_hides_display() {
    let config = MetabolismConfig::default();
    let engine = TickEngine::new(&config);
    let mut state = engine.spawn_state(EntityId::new(), SimTime::ZERO, &NoCapabilities);

    let outcome = engine.step(&mut state, at(1.0), &Activity::idle(), &NoCapabilities);
    assert!(outcome
        .effects()
        .iter()
        .any(|e| matches!(e, Effect::SetDisplay { .. })));

    let outcome = engine.step(&mut state, at(2.0), &Activity::idle().mounted(), &NoCapabilities);
    assert!(outcome.effects().contains(&Effect::ClearDisplay));
    assert!(!outcome
        .effects()
        .iter()
        .any(|e| matches!(e, Effect::SetDisplay { .. })));

    // Already hidden: no repeated clear
    let outcome = engine.step(&mut state, at(3.0), &Activity::idle().mounted(), &NoCapabilities);
    assert!(!outcome.effects().contains(&Effect::ClearDisplay));
}

#[test]
fn test_permission_tiers_scale_pools() {
    let mut world = MetabolismWorld::default();
    let tiers = world.config().permissions.clone();
    let mut grants = GrantTable::new();

    let supporter = EntityId::new();
    grants.grant(supporter, tiers.use_permission());
    grants.grant(supporter, tiers.permission("stamina.max2"));
    grants.grant(supporter, tiers.permission("stamina.max5"));
    grants.grant(supporter, tiers.permission("stamina.replenish3"));

    world.spawn(supporter, SimTime::ZERO, &PermissionProbe::new(&tiers, &grants));
    let state = world.get(supporter).unwrap();
    assert_eq!(state.stamina.max, 150.0);
    assert_eq!(state.stamina.current, 150.0);
    assert_eq!(state.stamina_replenish_multiplier, 1.6);
    assert_eq!(state.boost.max, 10.0);

    // Losing the tier shrinks the pool on the next step
    grants.revoke(supporter, &tiers.permission("stamina.max5"));
    let probe = PermissionProbe::new(&tiers, &grants);
    world
        .step_entity(supporter, at(1.0), &Activity::idle(), &probe)
        .unwrap();
    let state = world.get(supporter).unwrap();
    assert!(approx(state.stamina.max, 120.0));
    assert!(approx(state.stamina.current, 120.0));
}

#[test]
fn test_use_permission_gates_simulation() {
    let mut world = MetabolismWorld::default();
    let tiers = world.config().permissions.clone();
    let mut grants = GrantTable::new();
    let id = EntityId::new();

    world.spawn(id, SimTime::ZERO, &PermissionProbe::new(&tiers, &grants));
    let outcome = world
        .step_entity(id, at(1.0), &Activity::running(), &PermissionProbe::new(&tiers, &grants))
        .unwrap();
    assert_eq!(outcome.phase(), Some(Phase::Disabled));
    assert_eq!(world.get(id).unwrap().stamina.current, 100.0);

    // Rechecked only after the delay; without the gate the player is simulated normally
    let outcome = world
        .step_entity(id, at(1.5), &Activity::running(), &PermissionProbe::new(&tiers, &grants))
        .unwrap();
    assert_eq!(outcome, StepOutcome::Throttled);

    let outcome = world
        .step_entity(
            id,
            at(2.5),
            &Activity::running(),
            &PermissionProbe::new(&tiers, &grants).without_use_gate(),
        )
        .unwrap();
    assert_eq!(outcome.phase(), Some(Phase::DrainStamina));

    grants.grant(id, tiers.use_permission());
    let outcome = world
        .step_entity(id, at(3.5), &Activity::running(), &PermissionProbe::new(&tiers, &grants))
        .unwrap();
    assert_eq!(outcome.phase(), Some(Phase::DrainStamina));
}

#[test]
fn test_incapacitation_latch_and_release() {
    let mut world = MetabolismWorld::default();
    let tiers = world.config().permissions.clone();
    let mut grants = GrantTable::new();
    let id = EntityId::new();
    grants.grant(id, tiers.use_permission());
    world.spawn(id, SimTime::ZERO, &PermissionProbe::new(&tiers, &grants));

    grants.set_incapacitated(id, true);
    let step = |world: &mut MetabolismWorld, grants: &GrantTable, t: f64| {
        world
            .step_entity(id, at(t), &Activity::running(), &PermissionProbe::new(&tiers, grants))
            .unwrap()
    };

    let outcome = step(&mut world, &grants, 1.0);
    assert_eq!(outcome.phase(), Some(Phase::Incapacitated));
    assert_eq!(world.get(id).unwrap().stamina.current, 0.0);
    assert!(world.get(id).unwrap().sprint_suppressed());

    // Healed, but the latch is only re-polled once the interval has passed
    grants.set_incapacitated(id, false);
    let outcome = step(&mut world, &grants, 1.5);
    assert_eq!(outcome.phase(), Some(Phase::Incapacitated));

    let outcome = step(&mut world, &grants, 2.0);
    assert_ne!(outcome.phase(), Some(Phase::Incapacitated));
    assert!(!world.get(id).unwrap().incapacitated);
}

#[test]
fn test_world_step_all_and_despawn() {
    let mut world = MetabolismWorld::default();
    let ids: Vec<EntityId> = (0..5).map(|_| EntityId::new()).collect();
    for &id in &ids {
        assert!(world.spawn(id, SimTime::ZERO, &NoCapabilities));
    }

    let activities: AHashMap<EntityId, Activity> = ids
        .iter()
        .enumerate()
        .map(|(i, id)| {
            let activity = if i % 2 == 0 {
                Activity::running()
            } else {
                Activity::sleeping()
            };
            (*id, activity)
        })
        .collect();

    let mut sink = RecordingSink::new();
    for (id, outcome) in world.step_all(at(1.0), &activities, &NoCapabilities) {
        dispatch(id, outcome.effects(), Some(&mut sink as &mut dyn EffectSink));
    }

    for (i, id) in ids.iter().enumerate() {
        let state = world.get(*id).unwrap();
        if i % 2 == 0 {
            assert_eq!(state.stamina.current, 98.0);
        } else {
            assert_eq!(state.stamina.current, 100.0);
            assert_eq!(sink.for_entity(*id).count(), 0);
        }
    }

    sink.clear();
    let released = world.despawn(ids[0]).unwrap();
    dispatch(ids[0], &released, Some(&mut sink as &mut dyn EffectSink));
    let revoked = sink
        .for_entity(ids[0])
        .filter(|e| matches!(e, Effect::SetCapability { granted: false, .. }))
        .count();
    assert_eq!(revoked, 2);
    assert!(!world.contains(ids[0]));
    assert_eq!(world.entity_count(), 4);
}

#[test]
fn test_parallel_batch_matches_sequential() {
    let mut config = MetabolismConfig::default();
    config.parallel_threshold = 1;
    let mut parallel = MetabolismWorld::new(config);
    let mut sequential = MetabolismWorld::default();

    let ids: Vec<EntityId> = (0..64).map(|_| EntityId::new()).collect();
    let mut activities = AHashMap::new();
    for (i, &id) in ids.iter().enumerate() {
        parallel.spawn(id, SimTime::ZERO, &NoCapabilities);
        sequential.spawn(id, SimTime::ZERO, &NoCapabilities);
        let activity = match i % 3 {
            0 => Activity::running(),
            1 => Activity::swimming(),
            _ => Activity::idle(),
        };
        activities.insert(id, activity);
    }

    for frame in 1..=40 {
        let now = at(frame as f64 * 0.25);
        parallel.step_all(now, &activities, &NoCapabilities);
        sequential.step_all(now, &activities, &NoCapabilities);
    }

    for id in ids {
        assert_eq!(parallel.get(id).unwrap().stamina, sequential.get(id).unwrap().stamina);
        assert_eq!(parallel.get(id).unwrap().boost, sequential.get(id).unwrap().boost);
    }
}

#[test]
fn test_config_swap_applies_next_step() {
    let mut world = MetabolismWorld::default();
    let id = EntityId::new();
    world.spawn(id, SimTime::ZERO, &NoCapabilities);

    let mut config = world.config().clone();
    config.stamina.loss_rate = 10.0;
    assert!(world.set_config(config).is_empty());

    let outcome = world
        .step_entity(id, at(1.0), &Activity::running(), &NoCapabilities)
        .unwrap();
    assert!(matches!(outcome, StepOutcome::Stepped { .. }));
    assert_eq!(world.get(id).unwrap().stamina.current, 90.0);
}

#[test]
fn test_shipped_config_matches_defaults() {
    let path = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("data/metabolism.toml");
    let (config, issues) = load_config(&path).expect("shipped config should load");
    assert!(issues.is_empty(), "unexpected issues: {:?}", issues);
    assert_eq!(config, MetabolismConfig::default());
}
