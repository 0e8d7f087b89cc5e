//! Metabolism configuration with documented constants
//!
//! Every rate the tick engine uses lives here, with the defaults the
//! simulation ships with. Configuration is plain data: it is loaded once,
//! sanitized, and handed to the engine explicitly. Hosts may swap it at any
//! time between ticks.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Deserializer, Serialize};

use crate::core::error::{ConfigError, ConfigIssue};
use crate::core::types::ResourceKind;

/// Smallest ceiling floor a pool may be configured with
///
/// A soft ceiling of zero could never be recovered from, so `min` is never
/// allowed below one unit (unless `max` itself is smaller).
pub const MIN_CEILING_FLOOR: f32 = 1.0;

/// Rate constants for one resource
///
/// Stamina and boost each get an independent instance. All rates are per
/// second of simulated time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegenerationPolicy {
    /// Permanent ceiling before capability multipliers are applied
    pub max: f32,

    /// Floor the soft ceiling may decay to while recovering a deficit
    ///
    /// Recommended around 20% of `max`.
    pub min: f32,

    /// Drain while moving fast on land
    pub loss_rate: f32,

    /// Drain while moving fast in water
    pub swim_loss_rate: f32,

    /// Decay of the soft ceiling while `current` is being replenished
    ///
    /// This is what makes repeated exhaustion lower peak capacity until the
    /// ceiling has grown back.
    pub max_loss_rate: f32,

    /// Recovery of `current` once the cooldown has passed
    pub replenish_rate: f32,

    /// Growth of the soft ceiling back toward `max`
    pub max_replenish_rate: f32,

    /// Delay after use before replenishing starts
    pub cooldown: f32,

    /// Delay after use that emptied the resource completely
    ///
    /// Should be longer than `cooldown` so running dry is punished.
    pub cooldown_depleted: f32,
}

impl RegenerationPolicy {
    /// Defaults for the primary resource
    pub fn stamina() -> Self {
        Self {
            max: 100.0,
            min: 20.0,
            loss_rate: 2.0,
            swim_loss_rate: 1.0,
            max_loss_rate: 1.0,
            replenish_rate: 4.0,
            max_replenish_rate: 1.0,
            cooldown: 1.0,
            cooldown_depleted: 5.0,
        }
    }

    /// Defaults for the banked boost resource
    pub fn boost() -> Self {
        Self {
            max: 10.0,
            min: 2.0,
            loss_rate: 3.0,
            swim_loss_rate: 1.0,
            max_loss_rate: 1.0,
            replenish_rate: 2.0,
            max_replenish_rate: 0.5,
            cooldown: 2.0,
            cooldown_depleted: 4.0,
        }
    }

    pub fn defaults_for(kind: ResourceKind) -> Self {
        match kind {
            ResourceKind::Stamina => Self::stamina(),
            ResourceKind::Boost => Self::boost(),
        }
    }

    /// Drain rate for the current movement medium
    pub fn drain_rate(&self, swimming: bool) -> f32 {
        if swimming {
            self.swim_loss_rate
        } else {
            self.loss_rate
        }
    }

    fn sanitize(&mut self, prefix: &str, defaults: &Self, issues: &mut Vec<ConfigIssue>) {
        let rates = [
            ("loss_rate", &mut self.loss_rate, defaults.loss_rate),
            ("swim_loss_rate", &mut self.swim_loss_rate, defaults.swim_loss_rate),
            ("max_loss_rate", &mut self.max_loss_rate, defaults.max_loss_rate),
            ("replenish_rate", &mut self.replenish_rate, defaults.replenish_rate),
            ("max_replenish_rate", &mut self.max_replenish_rate, defaults.max_replenish_rate),
            ("cooldown", &mut self.cooldown, defaults.cooldown),
            ("cooldown_depleted", &mut self.cooldown_depleted, defaults.cooldown_depleted),
        ];
        for (name, value, default) in rates {
            non_negative_or_default(&format!("{prefix}.{name}"), value, default, issues);
        }

        if !self.max.is_finite() || self.max <= 0.0 {
            issues.push(ConfigIssue::new(
                format!("{prefix}.max"),
                format!("must be positive, got {}; using {}", self.max, defaults.max),
            ));
            self.max = defaults.max;
        }

        let floor = MIN_CEILING_FLOOR.min(self.max);
        let clamped = if self.min.is_finite() {
            self.min.clamp(floor, self.max)
        } else {
            defaults.min.clamp(floor, self.max)
        };
        if clamped != self.min {
            issues.push(ConfigIssue::new(
                format!("{prefix}.min"),
                format!(
                    "must lie within [{}, {}], got {}; using {}",
                    floor, self.max, self.min, clamped
                ),
            ));
            self.min = clamped;
        }
    }
}

impl Default for RegenerationPolicy {
    fn default() -> Self {
        Self::stamina()
    }
}

/// Capability identifiers granted while boost is banked
///
/// These are opaque strings to the simulation; the host maps them onto
/// whatever grants elevated movement speed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoostCapabilities {
    /// Granted for faster running
    pub sprint: String,
    /// Granted for faster swimming
    pub swim: String,
}

impl BoostCapabilities {
    pub fn ids(&self) -> [&str; 2] {
        [self.sprint.as_str(), self.swim.as_str()]
    }
}

impl Default for BoostCapabilities {
    fn default() -> Self {
        Self {
            sprint: "movementspeed.run.3".to_string(),
            swim: "movementspeed.swim.3".to_string(),
        }
    }
}

/// Side effects on the rest of the player's metabolism while draining
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExertionPolicy {
    /// Players lose hydration while draining
    pub hydration_enabled: bool,
    /// Hydration lost per second
    pub hydration_loss_rate: f32,

    /// Heart rate climbs toward its maximum while draining
    pub heartrate_enabled: bool,
    /// Heart rate gained per second (heart rate is normalized to 0..1)
    pub heartrate_rate: f32,

    /// Body temperature climbs toward `temperature_target` while draining
    pub temperature_enabled: bool,
    pub temperature_target: f32,
    /// Degrees gained per second
    pub temperature_rate: f32,
}

impl ExertionPolicy {
    pub fn stamina() -> Self {
        Self {
            hydration_enabled: true,
            hydration_loss_rate: 0.1,
            heartrate_enabled: true,
            heartrate_rate: 0.2,
            temperature_enabled: true,
            temperature_target: 48.0,
            temperature_rate: 3.0,
        }
    }

    pub fn boost() -> Self {
        Self {
            hydration_loss_rate: 0.2,
            heartrate_rate: 0.4,
            temperature_rate: 5.0,
            ..Self::stamina()
        }
    }

    /// True if any channel produces an effect
    pub fn is_active(&self) -> bool {
        self.hydration_enabled || self.heartrate_enabled || self.temperature_enabled
    }

    fn sanitize(&mut self, prefix: &str, defaults: &Self, issues: &mut Vec<ConfigIssue>) {
        let rates = [
            ("hydration_loss_rate", &mut self.hydration_loss_rate, defaults.hydration_loss_rate),
            ("heartrate_rate", &mut self.heartrate_rate, defaults.heartrate_rate),
            ("temperature_rate", &mut self.temperature_rate, defaults.temperature_rate),
        ];
        for (name, value, default) in rates {
            non_negative_or_default(&format!("{prefix}.{name}"), value, default, issues);
        }
        if !self.temperature_target.is_finite() {
            issues.push(ConfigIssue::new(
                format!("{prefix}.temperature_target"),
                format!("must be finite; using {}", defaults.temperature_target),
            ));
            self.temperature_target = defaults.temperature_target;
        }
    }
}

impl Default for ExertionPolicy {
    fn default() -> Self {
        Self::stamina()
    }
}

/// Copies every key present in a partial table onto a full default value
macro_rules! overlay {
    ($partial:expr, $base:expr, [$($field:ident),* $(,)?]) => {{
        let mut base = $base;
        $(
            if let Some(value) = $partial.$field {
                base.$field = value;
            }
        )*
        base
    }};
}

/// A `[boost]`-style table where every key is optional
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PartialPolicy {
    max: Option<f32>,
    min: Option<f32>,
    loss_rate: Option<f32>,
    swim_loss_rate: Option<f32>,
    max_loss_rate: Option<f32>,
    replenish_rate: Option<f32>,
    max_replenish_rate: Option<f32>,
    cooldown: Option<f32>,
    cooldown_depleted: Option<f32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PartialExertion {
    hydration_enabled: Option<bool>,
    hydration_loss_rate: Option<f32>,
    heartrate_enabled: Option<bool>,
    heartrate_rate: Option<f32>,
    temperature_enabled: Option<bool>,
    temperature_target: Option<f32>,
    temperature_rate: Option<f32>,
}

/// Missing `[boost]` keys take the boost defaults, not the stamina ones
fn boost_policy<'de, D: Deserializer<'de>>(deserializer: D) -> Result<RegenerationPolicy, D::Error> {
    let partial = PartialPolicy::deserialize(deserializer)?;
    Ok(overlay!(
        partial,
        RegenerationPolicy::boost(),
        [
            max,
            min,
            loss_rate,
            swim_loss_rate,
            max_loss_rate,
            replenish_rate,
            max_replenish_rate,
            cooldown,
            cooldown_depleted,
        ]
    ))
}

fn boost_exertion<'de, D: Deserializer<'de>>(deserializer: D) -> Result<ExertionPolicy, D::Error> {
    let partial = PartialExertion::deserialize(deserializer)?;
    Ok(overlay!(
        partial,
        ExertionPolicy::boost(),
        [
            hydration_enabled,
            hydration_loss_rate,
            heartrate_enabled,
            heartrate_rate,
            temperature_enabled,
            temperature_target,
            temperature_rate,
        ]
    ))
}

/// Which multiplier table a permission tier belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MultiplierKind {
    Max,
    Replenish,
}

/// Permission-string tiers that scale a player's resources
///
/// Each table maps a tier suffix (appended to `prefix`) to a multiplier.
/// A player holding several tiers gets the highest one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PermissionTiers {
    pub prefix: String,
    /// Suffix of the permission that enables the simulation for a player
    pub use_suffix: String,
    pub max_stamina: BTreeMap<String, f32>,
    pub max_boost: BTreeMap<String, f32>,
    pub stamina_replenish: BTreeMap<String, f32>,
    pub boost_replenish: BTreeMap<String, f32>,
}

impl PermissionTiers {
    pub fn table(&self, kind: ResourceKind, multiplier: MultiplierKind) -> &BTreeMap<String, f32> {
        match (kind, multiplier) {
            (ResourceKind::Stamina, MultiplierKind::Max) => &self.max_stamina,
            (ResourceKind::Boost, MultiplierKind::Max) => &self.max_boost,
            (ResourceKind::Stamina, MultiplierKind::Replenish) => &self.stamina_replenish,
            (ResourceKind::Boost, MultiplierKind::Replenish) => &self.boost_replenish,
        }
    }

    /// Full permission string for a tier suffix
    pub fn permission(&self, suffix: &str) -> String {
        format!("{}{}", self.prefix, suffix)
    }

    pub fn use_permission(&self) -> String {
        self.permission(&self.use_suffix)
    }

    /// Every permission string the host has to register
    pub fn permission_names(&self) -> Vec<String> {
        let mut names = vec![self.use_permission()];
        for table in [
            &self.max_stamina,
            &self.max_boost,
            &self.stamina_replenish,
            &self.boost_replenish,
        ] {
            names.extend(table.keys().map(|suffix| self.permission(suffix)));
        }
        names
    }

    fn sanitize(&mut self, issues: &mut Vec<ConfigIssue>) {
        let tables = [
            ("permissions.max_stamina", &mut self.max_stamina),
            ("permissions.max_boost", &mut self.max_boost),
            ("permissions.stamina_replenish", &mut self.stamina_replenish),
            ("permissions.boost_replenish", &mut self.boost_replenish),
        ];
        for (name, table) in tables {
            for (suffix, multiplier) in table.iter_mut() {
                if !multiplier.is_finite() || *multiplier < 1.0 {
                    issues.push(ConfigIssue::new(
                        format!("{name}.{suffix}"),
                        format!("multiplier must be >= 1, got {}; using 1", multiplier),
                    ));
                    *multiplier = 1.0;
                }
            }
        }
    }
}

fn tiers(prefix: &str, values: [f32; 5]) -> BTreeMap<String, f32> {
    values
        .iter()
        .enumerate()
        .map(|(i, v)| (format!("{prefix}{}", i + 1), *v))
        .collect()
}

impl Default for PermissionTiers {
    fn default() -> Self {
        Self {
            prefix: "advancedplayermetabolism.".to_string(),
            use_suffix: "use".to_string(),
            max_stamina: tiers("stamina.max", [1.1, 1.2, 1.3, 1.4, 1.5]),
            max_boost: tiers("boost.max", [1.1, 1.2, 1.3, 1.4, 1.5]),
            stamina_replenish: tiers("stamina.replenish", [1.2, 1.4, 1.6, 1.8, 2.0]),
            boost_replenish: tiers("boost.replenish", [1.2, 1.4, 1.6, 1.8, 2.0]),
        }
    }
}

/// Status indicator settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplaySettings {
    /// Emit display effects at all
    pub enabled: bool,
    /// Hide the indicator while mounted or in a vehicle
    pub hide_when_mounted: bool,
}

impl Default for DisplaySettings {
    fn default() -> Self {
        Self {
            enabled: true,
            hide_when_mounted: true,
        }
    }
}

/// Configuration for the metabolism simulation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetabolismConfig {
    // === TICK SCHEDULING ===
    /// Minimum seconds between accepted steps for one player
    ///
    /// Lower = smoother bars, higher CPU cost. Steps arriving sooner are
    /// ignored and their time rolls into the next accepted step.
    pub tick_rate: f32,

    /// Seconds between queries of the external incapacitation signal
    pub incapacitation_poll_interval: f32,

    /// Seconds before a player without the use capability is checked again
    pub disabled_recheck_delay: f32,

    /// Fraction of max stamina a freshly spawned player starts with
    pub starting_stamina_fraction: f32,

    // === PARALLELIZATION ===
    /// Minimum player count before batches are stepped in parallel
    pub parallel_threshold: usize,

    // === RESOURCES ===
    pub stamina: RegenerationPolicy,
    #[serde(deserialize_with = "boost_policy")]
    pub boost: RegenerationPolicy,
    pub boost_capabilities: BoostCapabilities,
    pub stamina_exertion: ExertionPolicy,
    #[serde(deserialize_with = "boost_exertion")]
    pub boost_exertion: ExertionPolicy,

    // === HOST INTEGRATION ===
    pub permissions: PermissionTiers,
    pub display: DisplaySettings,
}

impl Default for MetabolismConfig {
    fn default() -> Self {
        Self {
            tick_rate: 0.2,
            incapacitation_poll_interval: 1.0,
            disabled_recheck_delay: 1.0,
            starting_stamina_fraction: 1.0,
            parallel_threshold: 1000,
            stamina: RegenerationPolicy::stamina(),
            boost: RegenerationPolicy::boost(),
            boost_capabilities: BoostCapabilities::default(),
            stamina_exertion: ExertionPolicy::stamina(),
            boost_exertion: ExertionPolicy::boost(),
            permissions: PermissionTiers::default(),
            display: DisplaySettings::default(),
        }
    }
}

impl MetabolismConfig {
    /// Create a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    pub fn policy(&self, kind: ResourceKind) -> &RegenerationPolicy {
        match kind {
            ResourceKind::Stamina => &self.stamina,
            ResourceKind::Boost => &self.boost,
        }
    }

    pub fn exertion(&self, kind: ResourceKind) -> &ExertionPolicy {
        match kind {
            ResourceKind::Stamina => &self.stamina_exertion,
            ResourceKind::Boost => &self.boost_exertion,
        }
    }

    /// Parse from TOML without sanitizing
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Parse from JSON without sanitizing
    pub fn from_json_str(content: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(content)?)
    }

    /// Validate configuration for internal consistency
    ///
    /// Reports every problem at once; nothing is modified.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let issues = self.clone().sanitize();
        if issues.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Invalid(issues))
        }
    }

    /// Clamp or default every out-of-range value, returning what was changed
    pub fn sanitize(&mut self) -> Vec<ConfigIssue> {
        let defaults = Self::default();
        let mut issues = Vec::new();

        if !self.tick_rate.is_finite() || self.tick_rate <= 0.0 {
            issues.push(ConfigIssue::new(
                "tick_rate",
                format!("must be positive, got {}; using {}", self.tick_rate, defaults.tick_rate),
            ));
            self.tick_rate = defaults.tick_rate;
        }

        let intervals = [
            (
                "incapacitation_poll_interval",
                &mut self.incapacitation_poll_interval,
                defaults.incapacitation_poll_interval,
            ),
            (
                "disabled_recheck_delay",
                &mut self.disabled_recheck_delay,
                defaults.disabled_recheck_delay,
            ),
        ];
        for (name, value, default) in intervals {
            non_negative_or_default(name, value, default, &mut issues);
        }

        let fraction = self.starting_stamina_fraction;
        if !fraction.is_finite() || !(0.0..=1.0).contains(&fraction) {
            let fixed = if fraction.is_finite() {
                fraction.clamp(0.0, 1.0)
            } else {
                defaults.starting_stamina_fraction
            };
            issues.push(ConfigIssue::new(
                "starting_stamina_fraction",
                format!("must lie within [0, 1], got {}; using {}", fraction, fixed),
            ));
            self.starting_stamina_fraction = fixed;
        }

        self.stamina.sanitize("stamina", &defaults.stamina, &mut issues);
        self.boost.sanitize("boost", &defaults.boost, &mut issues);
        self.stamina_exertion
            .sanitize("stamina_exertion", &defaults.stamina_exertion, &mut issues);
        self.boost_exertion
            .sanitize("boost_exertion", &defaults.boost_exertion, &mut issues);
        self.permissions.sanitize(&mut issues);

        if self.boost_capabilities.sprint.trim().is_empty() {
            issues.push(ConfigIssue::new("boost_capabilities.sprint", "must not be empty"));
            self.boost_capabilities.sprint = defaults.boost_capabilities.sprint;
        }
        if self.boost_capabilities.swim.trim().is_empty() {
            issues.push(ConfigIssue::new("boost_capabilities.swim", "must not be empty"));
            self.boost_capabilities.swim = defaults.boost_capabilities.swim;
        }

        issues
    }
}

fn non_negative_or_default(name: &str, value: &mut f32, default: f32, issues: &mut Vec<ConfigIssue>) {
    if !value.is_finite() || *value < 0.0 {
        issues.push(ConfigIssue::new(
            name,
            format!("must be a non-negative number, got {}; using {}", value, default),
        ));
        *value = default;
    }
}

/// Load and sanitize a config file
///
/// The format is chosen from the extension (`.toml` or `.json`). Returns the
/// sanitized config together with every value that had to be corrected.
pub fn load_config(path: &Path) -> Result<(MetabolismConfig, Vec<ConfigIssue>), ConfigError> {
    let content = fs::read_to_string(path)?;

    let mut config = match path.extension().and_then(|e| e.to_str()) {
        Some("toml") => MetabolismConfig::from_toml_str(&content)?,
        Some("json") => MetabolismConfig::from_json_str(&content)?,
        other => {
            return Err(ConfigError::UnsupportedFormat(
                other.unwrap_or("<none>").to_string(),
            ))
        }
    };

    let issues = config.sanitize();
    Ok((config, issues))
}

/// Load a config file, falling back to defaults if it can't be read or parsed
pub fn load_config_or_default(path: &Path) -> MetabolismConfig {
    match load_config(path) {
        Ok((config, issues)) => {
            for issue in &issues {
                tracing::warn!("Config {:?}: {}", path, issue);
            }
            tracing::info!("Configuration file {:?} loaded", path);
            config
        }
        Err(e) => {
            tracing::warn!("Configuration file {:?} is invalid ({}); using defaults", path, e);
            MetabolismConfig::default()
        }
    }
}
