//! Damage primitives: ranges, modifiers, per-type damage and crit config.

mod calculator;

pub use calculator::{
    action_speed, apply_conversion, apply_increased, apply_more, compose_base_damage,
    critical_multiplier, dps, final_damage, full_dps, ConversionTable, DpsBreakdown,
    FullDpsInput, TypeDps,
};

use crate::error::{ensure_non_negative, CalcError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Damage types shared by every calculator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DamageType {
    Physical,
    Fire,
    Cold,
    Lightning,
    Chaos,
}

impl DamageType {
    pub const ALL: [DamageType; 5] = [
        DamageType::Physical,
        DamageType::Fire,
        DamageType::Cold,
        DamageType::Lightning,
        DamageType::Chaos,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            DamageType::Physical => "physical",
            DamageType::Fire => "fire",
            DamageType::Cold => "cold",
            DamageType::Lightning => "lightning",
            DamageType::Chaos => "chaos",
        }
    }

    pub fn is_elemental(self) -> bool {
        matches!(
            self,
            DamageType::Fire | DamageType::Cold | DamageType::Lightning
        )
    }
}

impl fmt::Display for DamageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DamageType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "physical" | "phys" => Ok(DamageType::Physical),
            "fire" => Ok(DamageType::Fire),
            "cold" => Ok(DamageType::Cold),
            "lightning" => Ok(DamageType::Lightning),
            "chaos" => Ok(DamageType::Chaos),
            other => Err(format!("unknown damage type: {}", other)),
        }
    }
}

/// How a hit is delivered. Only Melee changes stun math.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttackType {
    Melee,
    Ranged,
    Spell,
}

impl fmt::Display for AttackType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AttackType::Melee => "melee",
            AttackType::Ranged => "ranged",
            AttackType::Spell => "spell",
        })
    }
}

impl FromStr for AttackType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "melee" => Ok(AttackType::Melee),
            "ranged" | "projectile" => Ok(AttackType::Ranged),
            "spell" => Ok(AttackType::Spell),
            other => Err(format!("unknown attack type: {}", other)),
        }
    }
}

/// Min/max damage. Invariant: `0 <= min <= max`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct DamageRange {
    pub min: f64,
    pub max: f64,
}

impl DamageRange {
    pub fn new(min: f64, max: f64) -> Result<Self> {
        ensure_non_negative("min", min)?;
        ensure_non_negative("max", max)?;
        if min > max {
            return Err(CalcError::invalid(
                "min",
                format!("min ({}) must not exceed max ({})", min, max),
            ));
        }
        Ok(Self { min, max })
    }

    pub const fn zero() -> Self {
        Self { min: 0.0, max: 0.0 }
    }

    /// Check the invariant on a range built from a struct literal or deserialized.
    pub fn validate(&self) -> Result<()> {
        Self::new(self.min, self.max).map(|_| ())
    }

    pub fn average(&self) -> f64 {
        (self.min + self.max) / 2.0
    }

    pub fn scale(&self, factor: f64) -> Self {
        Self {
            min: self.min * factor,
            max: self.max * factor,
        }
    }

    pub fn add(&self, other: &DamageRange) -> Self {
        Self {
            min: self.min + other.min,
            max: self.max + other.max,
        }
    }

    pub fn is_zero(&self) -> bool {
        self.min == 0.0 && self.max == 0.0
    }
}

impl fmt::Display for DamageRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1}-{:.1}", self.min, self.max)
    }
}

/// Stacking channel of a modifier. Increased/Reduced add together;
/// More/Less multiply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModifierKind {
    Increased,
    More,
    Reduced,
    Less,
}

impl ModifierKind {
    pub fn is_additive(self) -> bool {
        matches!(self, ModifierKind::Increased | ModifierKind::Reduced)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Modifier {
    pub value: f64,
    pub kind: ModifierKind,
}

impl Modifier {
    pub fn new(value: f64, kind: ModifierKind) -> Result<Self> {
        ensure_non_negative("modifier value", value)?;
        Ok(Self { value, kind })
    }

    /// `+40` becomes 40% increased, `-20` becomes 20% reduced.
    pub fn increased(signed_percent: f64) -> Result<Self> {
        if signed_percent < 0.0 {
            Self::new(-signed_percent, ModifierKind::Reduced)
        } else {
            Self::new(signed_percent, ModifierKind::Increased)
        }
    }

    /// `+30` becomes 30% more, `-10` becomes 10% less.
    pub fn more(signed_percent: f64) -> Result<Self> {
        if signed_percent < 0.0 {
            Self::new(-signed_percent, ModifierKind::Less)
        } else {
            Self::new(signed_percent, ModifierKind::More)
        }
    }

    /// Deserialized modifiers skip [`Modifier::new`]; check them here.
    pub fn validate(&self) -> Result<()> {
        ensure_non_negative("modifier value", self.value)
    }

    /// `+value/100` for Increased/More, `-value/100` for Reduced/Less.
    pub fn signed_multiplier(&self) -> f64 {
        match self.kind {
            ModifierKind::Increased | ModifierKind::More => self.value / 100.0,
            ModifierKind::Reduced | ModifierKind::Less => -self.value / 100.0,
        }
    }
}

/// Damage split by type. Adding a type twice sums the ranges.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DamageComponents {
    components: BTreeMap<DamageType, DamageRange>,
}

impl DamageComponents {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, damage_type: DamageType, range: DamageRange) {
        self.components
            .entry(damage_type)
            .and_modify(|r| *r = r.add(&range))
            .or_insert(range);
    }

    pub fn get(&self, damage_type: DamageType) -> Option<DamageRange> {
        self.components.get(&damage_type).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (DamageType, DamageRange)> + '_ {
        self.components.iter().map(|(t, r)| (*t, *r))
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// Sum of all type ranges.
    pub fn total(&self) -> DamageRange {
        self.components
            .values()
            .fold(DamageRange::zero(), |acc, r| acc.add(r))
    }

    pub(crate) fn set(&mut self, damage_type: DamageType, range: DamageRange) {
        self.components.insert(damage_type, range);
    }
}

/// Crit chance in percent (0-100) and crit damage bonus in percent.
/// A multiplier of 100 means crits deal double damage.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CriticalStrikeConfig {
    pub crit_chance: f64,
    pub crit_multiplier: f64,
}

impl Default for CriticalStrikeConfig {
    fn default() -> Self {
        Self {
            crit_chance: 5.0,
            crit_multiplier: 100.0,
        }
    }
}
