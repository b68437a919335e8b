//! Game constants and engine configuration loading.

use crate::synergy::OptimizationGoal;
use serde::Deserialize;
use std::path::Path;

/// Resistances above this value give no extra mitigation.
pub const RESISTANCE_CAP: f64 = 75.0;

/// Lowest resistance value considered when computing EHP.
pub const RESISTANCE_FLOOR: f64 = -200.0;

/// `reduction = armour / (armour + ARMOUR_CONSTANT * hit)`.
pub const ARMOUR_CONSTANT: f64 = 10.0;

/// Expected physical hit used for armour math when none is given.
pub const DEFAULT_EXPECTED_HIT: f64 = 1000.0;

/// Stun multiplier for physical damage.
pub const PHYSICAL_STUN_BONUS: f64 = 1.5;

/// Stun multiplier for melee hits.
pub const MELEE_STUN_BONUS: f64 = 1.5;

/// Light stun chance below this value never stuns.
pub const DEFAULT_MIN_STUN_THRESHOLD: f64 = 15.0;

/// Heavy stun meter percentage at which a target becomes Primed.
pub const PRIMED_PERCENT: f64 = 50.0;

/// Heavy stun meter percentage at which a target is heavy stunned.
pub const HEAVY_STUN_PERCENT: f64 = 100.0;

/// Hits kept in a heavy stun meter's history.
pub const DEFAULT_MAX_HIT_HISTORY: usize = 100;

/// Largest support combination the synergy search accepts.
pub const MAX_COMBO_SIZE: usize = 5;

pub const DEFAULT_SPIRIT_BUDGET: f64 = 100.0;
pub const DEFAULT_COMBO_SIZE: usize = 3;
pub const DEFAULT_TOP_N: usize = 5;

/// Overall-score bonus per utility effect carried by a combination.
pub const DEFAULT_UTILITY_EFFECT_BONUS: f64 = 100.0;

/// Lower bound for the spirit cost divisor in efficiency scoring.
pub const SPIRIT_EPSILON: f64 = 1e-6;

/// EHP below this is critical.
pub const EHP_CRITICAL_THRESHOLD: f64 = 3000.0;

/// EHP below this is weak.
pub const EHP_WEAK_THRESHOLD: f64 = 5000.0;

/// Elemental resistance below this is flagged as low.
pub const LOW_RESISTANCE_THRESHOLD: f64 = 60.0;

/// Maximum size in bytes for a gem catalog or config file.
pub const MAX_INPUT_FILE_BYTES: u64 = 8 * 1024 * 1024;

/// Engine configuration, usually read from a TOML file. Every value here
/// only provides CLI defaults; calculators take their inputs as arguments.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub synergy: SynergyConfig,
    #[serde(default)]
    pub stun: StunConfig,
    #[serde(default)]
    pub defense: DefenseConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SynergyConfig {
    #[serde(default = "default_spirit_budget")]
    pub spirit_budget: f64,
    #[serde(default = "default_combo_size")]
    pub combo_size: usize,
    #[serde(default = "default_top_n")]
    pub top_n: usize,
    #[serde(default)]
    pub goal: OptimizationGoal,
    #[serde(default = "default_utility_effect_bonus")]
    pub utility_effect_bonus: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StunConfig {
    /// Minimum light stun chance in percent.
    #[serde(default = "default_min_stun_threshold")]
    pub minimum_threshold: f64,
    #[serde(default = "default_max_hit_history")]
    pub max_hit_history: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DefenseConfig {
    #[serde(default = "default_expected_hit")]
    pub expected_physical_hit: f64,
}

fn default_spirit_budget() -> f64 {
    DEFAULT_SPIRIT_BUDGET
}

fn default_combo_size() -> usize {
    DEFAULT_COMBO_SIZE
}

fn default_top_n() -> usize {
    DEFAULT_TOP_N
}

fn default_utility_effect_bonus() -> f64 {
    DEFAULT_UTILITY_EFFECT_BONUS
}

fn default_min_stun_threshold() -> f64 {
    DEFAULT_MIN_STUN_THRESHOLD
}

fn default_max_hit_history() -> usize {
    DEFAULT_MAX_HIT_HISTORY
}

fn default_expected_hit() -> f64 {
    DEFAULT_EXPECTED_HIT
}

impl Default for SynergyConfig {
    fn default() -> Self {
        Self {
            spirit_budget: DEFAULT_SPIRIT_BUDGET,
            combo_size: DEFAULT_COMBO_SIZE,
            top_n: DEFAULT_TOP_N,
            goal: OptimizationGoal::default(),
            utility_effect_bonus: DEFAULT_UTILITY_EFFECT_BONUS,
        }
    }
}

impl Default for StunConfig {
    fn default() -> Self {
        Self {
            minimum_threshold: DEFAULT_MIN_STUN_THRESHOLD,
            max_hit_history: DEFAULT_MAX_HIT_HISTORY,
        }
    }
}

impl Default for DefenseConfig {
    fn default() -> Self {
        Self {
            expected_physical_hit: DEFAULT_EXPECTED_HIT,
        }
    }
}

impl EngineConfig {
    /// Parse a TOML document. Missing sections and keys fall back to defaults.
    pub fn from_toml_str(s: &str) -> Result<Self, String> {
        let cfg: EngineConfig = toml::from_str(s).map_err(|e| e.to_string())?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn load(path: &Path) -> Result<Self, String> {
        let s = crate::util::read_input_file(path)?;
        Self::from_toml_str(&s)
    }

    /// Load from `path` when given, otherwise use defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, String> {
        match path {
            Some(p) => Self::load(p),
            None => Ok(Self::default()),
        }
    }

    fn validate(&self) -> Result<(), String> {
        let s = &self.synergy;
        if s.combo_size == 0 || s.combo_size > MAX_COMBO_SIZE {
            return Err(format!(
                "synergy.combo_size must be in 1..={}, got {}",
                MAX_COMBO_SIZE, s.combo_size
            ));
        }
        if s.top_n == 0 {
            return Err("synergy.top_n must be > 0".to_string());
        }
        if !(s.spirit_budget >= 0.0) {
            return Err(format!(
                "synergy.spirit_budget must be >= 0, got {}",
                s.spirit_budget
            ));
        }
        if !(self.stun.minimum_threshold >= 0.0 && self.stun.minimum_threshold <= 100.0) {
            return Err(format!(
                "stun.minimum_threshold must be in 0..=100, got {}",
                self.stun.minimum_threshold
            ));
        }
        if !(self.defense.expected_physical_hit >= 0.0) {
            return Err("defense.expected_physical_hit must be >= 0".to_string());
        }
        Ok(())
    }
}
