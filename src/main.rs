//! Headless metabolism host
//!
//! Drives a handful of scripted players through random activity on a
//! simulated clock, steps them once per host frame and hands the resulting
//! effects to an asynchronous sink task. Prints a summary when done.

use std::collections::BTreeMap;
use std::path::PathBuf;

use ahash::AHashMap;
use clap::Parser;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use tokio::runtime::Runtime;
use tokio::sync::mpsc;

use player_metabolism::core::config::{load_config_or_default, MetabolismConfig};
use player_metabolism::core::error::Result;
use player_metabolism::core::types::{EntityId, ResourceKind, SimTime};
use player_metabolism::ecs::world::MetabolismWorld;
use player_metabolism::entity::metabolism::Activity;
use player_metabolism::simulation::capability::{GrantTable, PermissionProbe};
use player_metabolism::simulation::effects::{dispatch, Effect, EffectSink, Exertion};
use player_metabolism::simulation::tick::StepOutcome;

/// Headless metabolism simulation over scripted players
#[derive(Parser, Debug)]
#[command(name = "metabolism-sim")]
#[command(about = "Simulate stamina and boost for scripted players and report the effects")]
struct Args {
    /// Config file (.toml or .json); defaults are used if missing or invalid
    #[arg(long)]
    config: Option<PathBuf>,

    /// Number of simulated players
    #[arg(long, default_value_t = 4)]
    players: usize,

    /// Simulated seconds to run
    #[arg(long, default_value_t = 120.0, value_parser = duration_secs)]
    seconds: f64,

    /// Host frame interval in seconds
    #[arg(long, default_value_t = 0.05, value_parser = frame_secs)]
    frame: f64,

    /// Random seed for deterministic runs
    #[arg(long)]
    seed: Option<u64>,

    /// Break the first player's leg at this time (healed 10s later)
    #[arg(long)]
    incapacitate_at: Option<f64>,

    /// Output format: json or text
    #[arg(long, default_value = "text")]
    format: String,
}

const INJURY_SECONDS: f64 = 10.0;

fn parse_secs(value: &str) -> std::result::Result<f64, String> {
    let secs: f64 = value
        .parse()
        .map_err(|e| format!("`{}` is not a number: {}", value, e))?;
    if !secs.is_finite() || secs < 0.0 {
        return Err(format!("`{}` must be a finite, non-negative number of seconds", value));
    }
    Ok(secs)
}

fn duration_secs(value: &str) -> std::result::Result<f64, String> {
    parse_secs(value)
}

/// Frame interval; zero would never advance the clock
fn frame_secs(value: &str) -> std::result::Result<f64, String> {
    let secs = parse_secs(value)?;
    if secs == 0.0 {
        return Err("frame interval must be greater than zero".to_string());
    }
    Ok(secs)
}

/// Counts of everything the sink was asked to do
#[derive(Debug, Default, Clone, Serialize)]
struct SinkStats {
    grants: u64,
    revokes: u64,
    display_updates: u64,
    display_clears: u64,
    sprint_toggles: u64,
    exertions: u64,
}

/// Stand-in for the game server: logs effects instead of applying them
#[derive(Default)]
struct LoggingSink {
    stats: SinkStats,
}

impl EffectSink for LoggingSink {
    fn set_capability(&mut self, entity: EntityId, capability: &str, granted: bool) {
        if granted {
            self.stats.grants += 1;
        } else {
            self.stats.revokes += 1;
        }
        tracing::debug!("{} {} {}", entity, if granted { "granted" } else { "revoked" }, capability);
    }

    fn set_display(&mut self, entity: EntityId, kind: ResourceKind, fraction: f32, label: &str) {
        self.stats.display_updates += 1;
        tracing::trace!("{} display {} {:.2} ({})", entity, kind, fraction, label);
    }

    fn clear_display(&mut self, entity: EntityId) {
        self.stats.display_clears += 1;
        tracing::debug!("{} display cleared", entity);
    }

    fn set_sprint_suppressed(&mut self, entity: EntityId, suppressed: bool) {
        self.stats.sprint_toggles += 1;
        tracing::debug!("{} sprint {}", entity, if suppressed { "blocked" } else { "allowed" });
    }

    fn apply_exertion(&mut self, entity: EntityId, exertion: &Exertion) {
        self.stats.exertions += 1;
        tracing::trace!("{} exertion {:?}", entity, exertion);
    }
}

/// Activity a scripted player keeps until `until`
struct Script {
    activity: Activity,
    until: f64,
}

fn pick_activity(rng: &mut ChaCha8Rng) -> Activity {
    match rng.gen_range(0..10) {
        0..=3 => Activity::running(),
        4 => Activity::swimming(),
        5 => Activity::idle().mounted(),
        6 => Activity::sleeping(),
        _ => Activity::idle(),
    }
}

#[derive(Serialize)]
struct PlayerSummary {
    entity: String,
    stamina: f32,
    stamina_ceiling: f32,
    stamina_max: f32,
    boost: f32,
    boost_ceiling: f32,
    boost_max: f32,
    sprint_suppressed: bool,
}

#[derive(Serialize)]
struct RunSummary {
    seed: u64,
    seconds: f64,
    frames: u64,
    accepted_steps: u64,
    throttled_steps: u64,
    dormant_steps: u64,
    phases: BTreeMap<String, u64>,
    effects: SinkStats,
    players: Vec<PlayerSummary>,
}

impl RunSummary {
    fn print_text(&self) {
        println!("=== METABOLISM RUN (seed {}) ===", self.seed);
        println!(
            "{:.1}s simulated over {} frames: {} accepted, {} throttled, {} dormant",
            self.seconds, self.frames, self.accepted_steps, self.throttled_steps, self.dormant_steps
        );
        println!("\n--- Phases ---");
        for (phase, count) in &self.phases {
            println!("{:<24} {}", phase, count);
        }
        println!("\n--- Effects ---");
        println!(
            "grants {} / revokes {} / display {} / cleared {} / sprint toggles {} / exertion {}",
            self.effects.grants,
            self.effects.revokes,
            self.effects.display_updates,
            self.effects.display_clears,
            self.effects.sprint_toggles,
            self.effects.exertions
        );
        println!("\n--- Players at end ---");
        for p in &self.players {
            println!(
                "{}  stamina {:>6.1}/{:>6.1} (max {:>6.1})  boost {:>5.1}/{:>5.1} (max {:>5.1}){}",
                p.entity,
                p.stamina,
                p.stamina_ceiling,
                p.stamina_max,
                p.boost,
                p.boost_ceiling,
                p.boost_max,
                if p.sprint_suppressed { "  [no sprint]" } else { "" }
            );
        }
    }
}

async fn run(args: &Args, config: MetabolismConfig, seed: u64) -> RunSummary {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);

    // Effects are applied off the simulation loop
    let (tx, mut rx) = mpsc::unbounded_channel::<(EntityId, Vec<Effect>)>();
    let sink_task = tokio::spawn(async move {
        let mut sink = LoggingSink::default();
        while let Some((entity, effects)) = rx.recv().await {
            dispatch(entity, &effects, Some(&mut sink as &mut dyn EffectSink));
        }
        sink.stats
    });

    let mut world = MetabolismWorld::new(config);
    let tiers = world.config().permissions.clone();
    let mut grants = GrantTable::new();

    let players: Vec<EntityId> = (0..args.players).map(|_| EntityId::new()).collect();
    for (i, &id) in players.iter().enumerate() {
        grants.grant(id, tiers.use_permission());
        // Every other player is a "supporter" with bigger pools
        if i % 2 == 1 {
            grants.grant(id, tiers.permission("stamina.max3"));
            grants.grant(id, tiers.permission("boost.replenish2"));
        }
        world.spawn(id, SimTime::ZERO, &PermissionProbe::new(&tiers, &grants));
    }

    let mut scripts: AHashMap<EntityId, Script> = AHashMap::new();
    let mut phases: BTreeMap<String, u64> = BTreeMap::new();
    let (mut accepted, mut throttled, mut dormant) = (0u64, 0u64, 0u64);

    let frames = (args.seconds / args.frame).ceil().max(0.0) as u64;
    for frame in 1..=frames {
        let now = frame as f64 * args.frame;

        for &id in &players {
            let expired = scripts.get(&id).map_or(true, |s| now >= s.until);
            if expired {
                let script = Script {
                    activity: pick_activity(&mut rng),
                    until: now + rng.gen_range(2.0..8.0),
                };
                scripts.insert(id, script);
            }
        }

        if let (Some(at), Some(&victim)) = (args.incapacitate_at, players.first()) {
            grants.set_incapacitated(victim, now >= at && now < at + INJURY_SECONDS);
        }

        let activities: AHashMap<EntityId, Activity> =
            scripts.iter().map(|(id, s)| (*id, s.activity)).collect();
        let probe = PermissionProbe::new(&tiers, &grants);

        for (entity, outcome) in world.step_all(SimTime::from_secs(now), &activities, &probe) {
            match outcome {
                StepOutcome::Dormant => dormant += 1,
                StepOutcome::Throttled => throttled += 1,
                StepOutcome::Stepped { phase, effects, .. } => {
                    accepted += 1;
                    *phases.entry(format!("{:?}", phase)).or_default() += 1;
                    if !effects.is_empty() && tx.send((entity, effects)).is_err() {
                        tracing::warn!("Effect sink closed; dropping effects for {}", entity);
                    }
                }
            }
        }
    }

    let players_summary = players
        .iter()
        .filter_map(|id| world.get(*id))
        .map(|s| PlayerSummary {
            entity: s.entity.to_string(),
            stamina: s.stamina.current,
            stamina_ceiling: s.stamina.current_max,
            stamina_max: s.stamina.max,
            boost: s.boost.current,
            boost_ceiling: s.boost.current_max,
            boost_max: s.boost.max,
            sprint_suppressed: s.sprint_suppressed(),
        })
        .collect();

    for &id in &players {
        if let Some(effects) = world.despawn(id) {
            tx.send((id, effects)).ok();
        }
    }
    drop(tx);

    let effects = sink_task.await.unwrap_or_else(|e| {
        tracing::error!("Effect sink task failed: {}", e);
        SinkStats::default()
    });

    RunSummary {
        seed,
        seconds: args.seconds,
        frames,
        accepted_steps: accepted,
        throttled_steps: throttled,
        dormant_steps: dormant,
        phases,
        effects,
        players: players_summary,
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("player_metabolism=info")),
        )
        .init();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config_or_default(path),
        None => MetabolismConfig::default(),
    };

    let seed = args.seed.unwrap_or_else(rand::random);
    tracing::info!("Starting metabolism simulation with {} players (seed {})", args.players, seed);

    let rt = Runtime::new()?;
    let summary = rt.block_on(run(&args, config, seed));

    if args.format == "json" {
        match serde_json::to_string_pretty(&summary) {
            Ok(json) => println!("{}", json),
            Err(e) => tracing::error!("Failed to serialize summary: {}", e),
        }
    } else {
        summary.print_text();
    }

    Ok(())
}
