//! Damage composition, increased/more stacking, conversion, crit and DPS.
//!
//! Increased/reduced modifiers are summed into one additive factor; more/less
//! modifiers multiply. Increased is always resolved before more.

use super::{CriticalStrikeConfig, DamageComponents, DamageRange, DamageType, Modifier};
use crate::error::{ensure_positive, CalcError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Source type -> (target type -> percent converted).
pub type ConversionTable = BTreeMap<DamageType, BTreeMap<DamageType, f64>>;

/// Build base damage from exactly one of a weapon or spell range, plus flat
/// additions summed into their own types. The base range is stored as `base_type`.
pub fn compose_base_damage(
    weapon: Option<DamageRange>,
    spell: Option<DamageRange>,
    base_type: DamageType,
    flat_additions: &[(DamageType, DamageRange)],
) -> Result<DamageComponents> {
    let base = match (weapon, spell) {
        (Some(w), None) => w,
        (None, Some(s)) => s,
        (Some(_), Some(_)) => {
            return Err(CalcError::invalid(
                "weapon/spell",
                "provide either weapon or spell damage, not both",
            ))
        }
        (None, None) => {
            return Err(CalcError::invalid(
                "weapon/spell",
                "either weapon or spell damage is required",
            ))
        }
    };
    base.validate()?;
    let mut components = DamageComponents::new();
    components.add(base_type, base);
    for (damage_type, range) in flat_additions {
        range.validate()?;
        components.add(*damage_type, *range);
    }
    Ok(components)
}

/// `base * (1 + sum)` over Increased/Reduced modifiers. More/Less are ignored.
/// The factor never drops below zero.
pub fn apply_increased(base: f64, modifiers: &[Modifier]) -> f64 {
    let sum: f64 = modifiers
        .iter()
        .filter(|m| m.kind.is_additive())
        .map(Modifier::signed_multiplier)
        .sum();
    base * (1.0 + sum).max(0.0)
}

/// `base * prod(1 + m)` over More/Less modifiers. Increased/Reduced are ignored.
pub fn apply_more(base: f64, modifiers: &[Modifier]) -> f64 {
    let product = modifiers
        .iter()
        .filter(|m| !m.kind.is_additive())
        .fold(1.0, |acc, m| acc * (1.0 + m.signed_multiplier()).max(0.0));
    base * product
}

/// Increased first, then more, applied to min and max independently.
pub fn final_damage(base: &DamageRange, increased: &[Modifier], more: &[Modifier]) -> DamageRange {
    DamageRange {
        min: apply_more(apply_increased(base.min, increased), more),
        max: apply_more(apply_increased(base.max, increased), more),
    }
}

/// Carve converted percentages off each source type into its targets.
/// Percentages are clamped to [0, 100]; a source whose total exceeds 100 is
/// rejected. Converted damage is not converted again.
pub fn apply_conversion(
    components: &DamageComponents,
    table: &ConversionTable,
) -> Result<DamageComponents> {
    let mut out = DamageComponents::new();
    for (source, range) in components.iter() {
        let Some(targets) = table.get(&source) else {
            out.add(source, range);
            continue;
        };
        let clamped: Vec<(DamageType, f64)> = targets
            .iter()
            .map(|(t, p)| (*t, if p.is_nan() { 0.0 } else { p.clamp(0.0, 100.0) }))
            .collect();
        let total: f64 = clamped.iter().map(|(_, p)| p).sum();
        if total > 100.0 + 1e-9 {
            return Err(CalcError::invalid(
                "conversion",
                format!("{} converts {}% in total (max 100%)", source, total),
            ));
        }
        let remaining = (100.0 - total).max(0.0);
        if remaining > 0.0 {
            out.add(source, range.scale(remaining / 100.0));
        }
        for (target, percent) in clamped {
            if percent > 0.0 {
                out.add(target, range.scale(percent / 100.0));
            }
        }
    }
    Ok(out)
}

/// Actions per second from base action time and increased speed modifiers.
pub fn action_speed(base_action_time: f64, increased_speed: &[Modifier]) -> Result<f64> {
    ensure_positive("base_action_time", base_action_time)?;
    Ok(apply_increased(1.0 / base_action_time, increased_speed))
}

/// Expected damage multiplier from crits: `(1 - p) + p * (1 + mult / 100)`.
pub fn critical_multiplier(config: Option<&CriticalStrikeConfig>) -> f64 {
    let Some(c) = config else {
        return 1.0;
    };
    let p = c.crit_chance.clamp(0.0, 100.0) / 100.0;
    let mult = c.crit_multiplier.max(0.0);
    (1.0 - p) + p * (1.0 + mult / 100.0)
}

pub fn dps(
    damage_per_hit: &DamageRange,
    actions_per_second: f64,
    crit: Option<&CriticalStrikeConfig>,
) -> f64 {
    damage_per_hit.average() * critical_multiplier(crit) * actions_per_second
}

/// Inputs for [`full_dps`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FullDpsInput {
    pub base: DamageComponents,
    #[serde(default)]
    pub increased_damage: Vec<Modifier>,
    #[serde(default)]
    pub more_damage: Vec<Modifier>,
    /// Seconds per attack or cast.
    pub base_action_time: f64,
    #[serde(default)]
    pub increased_speed: Vec<Modifier>,
    #[serde(default)]
    pub crit: Option<CriticalStrikeConfig>,
    #[serde(default)]
    pub is_spell: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypeDps {
    pub base: DamageRange,
    pub final_damage: DamageRange,
    pub average_hit: f64,
    pub dps: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DpsBreakdown {
    pub per_type: BTreeMap<DamageType, TypeDps>,
    pub total_dps: f64,
    /// Average hit before crits, summed over types.
    pub average_hit: f64,
    pub actions_per_second: f64,
    pub crit_multiplier: f64,
    pub is_spell: bool,
}

/// Full DPS: one action speed, then final damage and DPS per damage type.
pub fn full_dps(input: &FullDpsInput) -> Result<DpsBreakdown> {
    if input.base.is_empty() {
        return Err(CalcError::invalid("base", "no base damage components"));
    }
    for (_, range) in input.base.iter() {
        range.validate()?;
    }
    for m in input
        .increased_damage
        .iter()
        .chain(&input.more_damage)
        .chain(&input.increased_speed)
    {
        m.validate()?;
    }
    let aps = action_speed(input.base_action_time, &input.increased_speed)?;
    let crit_mult = critical_multiplier(input.crit.as_ref());

    let mut per_type = BTreeMap::new();
    let mut total_dps = 0.0;
    let mut average_hit = 0.0;
    for (damage_type, base) in input.base.iter() {
        let fin = final_damage(&base, &input.increased_damage, &input.more_damage);
        let type_dps = dps(&fin, aps, input.crit.as_ref());
        total_dps += type_dps;
        average_hit += fin.average();
        per_type.insert(
            damage_type,
            TypeDps {
                base,
                final_damage: fin,
                average_hit: fin.average(),
                dps: type_dps,
            },
        );
    }
    Ok(DpsBreakdown {
        per_type,
        total_dps,
        average_hit,
        actions_per_second: aps,
        crit_multiplier: crit_mult,
        is_spell: input.is_spell,
    })
}
