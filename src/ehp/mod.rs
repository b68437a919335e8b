//! Effective health pool per damage type.
//!
//! `EHP = raw_pool * resist_multiplier * armour_multiplier`. Energy shield
//! counts half against chaos damage. Inputs are clamped, never rejected.

use crate::config::{ARMOUR_CONSTANT, DEFAULT_EXPECTED_HIT, RESISTANCE_CAP, RESISTANCE_FLOOR};
use crate::damage::DamageType;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Character defenses. Resistances are in percent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DefensiveStats {
    pub life: f64,
    pub energy_shield: f64,
    pub armour: f64,
    pub evasion: f64,
    pub fire_resistance: f64,
    pub cold_resistance: f64,
    pub lightning_resistance: f64,
    pub chaos_resistance: f64,
    pub block_chance: f64,
}

impl DefensiveStats {
    /// Stored resistance for a damage type. Physical has none.
    pub fn resistance(&self, damage_type: DamageType) -> f64 {
        match damage_type {
            DamageType::Physical => 0.0,
            DamageType::Fire => self.fire_resistance,
            DamageType::Cold => self.cold_resistance,
            DamageType::Lightning => self.lightning_resistance,
            DamageType::Chaos => self.chaos_resistance,
        }
    }
}

/// Expected incoming hit size per damage type. Only used for armour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreatProfile {
    pub expected_hits: BTreeMap<DamageType, f64>,
}

impl Default for ThreatProfile {
    fn default() -> Self {
        Self::physical(DEFAULT_EXPECTED_HIT)
    }
}

impl ThreatProfile {
    pub fn physical(expected_hit: f64) -> Self {
        Self {
            expected_hits: BTreeMap::from([(DamageType::Physical, expected_hit)]),
        }
    }

    pub fn expected_hit(&self, damage_type: DamageType) -> f64 {
        self.expected_hits
            .get(&damage_type)
            .copied()
            .unwrap_or(DEFAULT_EXPECTED_HIT)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EhpEntry {
    pub ehp: f64,
    pub raw_pool: f64,
    pub resist_multiplier: f64,
    pub armour_multiplier: f64,
    pub total_multiplier: f64,
    pub breakdown: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EhpReport {
    pub per_type: BTreeMap<DamageType, EhpEntry>,
    /// Damage type with the lowest EHP.
    pub weakest: DamageType,
    pub weakest_ehp: f64,
}

impl EhpReport {
    pub fn ehp(&self, damage_type: DamageType) -> f64 {
        self.per_type
            .get(&damage_type)
            .map(|e| e.ehp)
            .unwrap_or(0.0)
    }
}

fn clamp_non_negative(x: f64) -> f64 {
    if x.is_nan() {
        0.0
    } else {
        x.max(0.0)
    }
}

/// `100 / (100 - res)` with res capped at 75.
pub fn resist_multiplier(resistance: f64) -> f64 {
    let res = if resistance.is_nan() {
        0.0
    } else {
        resistance.clamp(RESISTANCE_FLOOR, RESISTANCE_CAP)
    };
    100.0 / (100.0 - res)
}

/// Fraction of a physical hit prevented by armour. A hit of zero or less
/// has nothing to reduce and yields 0.
pub fn armour_reduction(armour: f64, expected_hit: f64) -> f64 {
    let armour = clamp_non_negative(armour);
    let hit = clamp_non_negative(expected_hit);
    if armour <= 0.0 || hit <= 0.0 {
        return 0.0;
    }
    armour / (armour + ARMOUR_CONSTANT * hit)
}

fn entry_for(stats: &DefensiveStats, threat: &ThreatProfile, damage_type: DamageType) -> EhpEntry {
    let life = clamp_non_negative(stats.life);
    let es = clamp_non_negative(stats.energy_shield);
    let raw_pool = match damage_type {
        DamageType::Chaos => life + es / 2.0,
        _ => life + es,
    };
    let resist_mult = resist_multiplier(stats.resistance(damage_type));
    let (armour_mult, reduction) = match damage_type {
        DamageType::Physical if stats.armour > 0.0 => {
            let r = armour_reduction(stats.armour, threat.expected_hit(damage_type));
            (1.0 / (1.0 - r), r)
        }
        _ => (1.0, 0.0),
    };
    let total = resist_mult * armour_mult;
    let ehp = raw_pool * total;

    let mut breakdown = format!("pool {:.0}", raw_pool);
    if damage_type == DamageType::Chaos && es > 0.0 {
        breakdown.push_str(" (ES counts half)");
    }
    breakdown.push_str(&format!(
        " x resist {:.3} ({:.0}% effective)",
        resist_mult,
        stats
            .resistance(damage_type)
            .clamp(RESISTANCE_FLOOR, RESISTANCE_CAP)
    ));
    if reduction > 0.0 {
        breakdown.push_str(&format!(
            " x armour {:.3} ({:.1}% reduction vs {:.0} hit)",
            armour_mult,
            reduction * 100.0,
            threat.expected_hit(damage_type)
        ));
    }
    breakdown.push_str(&format!(" = {:.0}", ehp));

    EhpEntry {
        ehp,
        raw_pool,
        resist_multiplier: resist_mult,
        armour_multiplier: armour_mult,
        total_multiplier: total,
        breakdown,
    }
}

/// EHP for every damage type.
pub fn calculate_ehp(stats: &DefensiveStats, threat: &ThreatProfile) -> EhpReport {
    let per_type: BTreeMap<DamageType, EhpEntry> = DamageType::ALL
        .iter()
        .map(|t| (*t, entry_for(stats, threat, *t)))
        .collect();
    let (weakest, weakest_ehp) = per_type
        .iter()
        .map(|(t, e)| (*t, e.ehp))
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .unwrap_or((DamageType::Physical, 0.0));
    EhpReport {
        per_type,
        weakest,
        weakest_ehp,
    }
}
