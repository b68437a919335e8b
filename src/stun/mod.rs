//! Light stun chance and per-target heavy stun buildup.
//!
//! Light stun is an instantaneous check per hit. Heavy stun accumulates on a
//! meter kept per target id for the lifetime of the [`StunCalculator`].
//! Meters never decay; they only change on a hit or an explicit reset/remove.

mod meter;

pub use meter::{HeavyStunMeter, HitRecord, StunState};

use crate::config::{
    DEFAULT_MAX_HIT_HISTORY, DEFAULT_MIN_STUN_THRESHOLD, MELEE_STUN_BONUS, PHYSICAL_STUN_BONUS,
};
use crate::damage::{AttackType, DamageType};
use crate::error::{ensure_non_negative, ensure_positive, CalcError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Per-calculation stun configuration. Percent values throughout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StunModifiers {
    /// Summed "increased stun chance" percentages.
    pub increased_stun_chance: f64,
    /// Each entry is a separate "more stun chance" percentage.
    pub more_stun_chance: Vec<f64>,
    /// Multipliers on the target's stun threshold; 1.2 means 20% higher threshold.
    pub threshold_multipliers: Vec<f64>,
    /// Overrides the 15% minimum light stun chance.
    pub minimum_threshold: Option<f64>,
    pub immune: bool,
    /// Multiplier on heavy stun buildup only.
    pub buildup_multiplier: f64,
}

impl Default for StunModifiers {
    fn default() -> Self {
        Self {
            increased_stun_chance: 0.0,
            more_stun_chance: Vec::new(),
            threshold_multipliers: Vec::new(),
            minimum_threshold: None,
            immune: false,
            buildup_multiplier: 1.0,
        }
    }
}

impl StunModifiers {
    pub fn minimum_threshold(&self) -> f64 {
        self.minimum_threshold.unwrap_or(DEFAULT_MIN_STUN_THRESHOLD)
    }

    fn validate(&self) -> Result<()> {
        let threshold = self.minimum_threshold();
        if !(0.0..=100.0).contains(&threshold) {
            return Err(CalcError::invalid(
                "minimum_threshold",
                format!("must be in 0..=100, got {}", threshold),
            ));
        }
        ensure_non_negative("buildup_multiplier", self.buildup_multiplier)?;
        ensure_positive("threshold_multipliers", self.threshold_product())?;
        if !self.increased_stun_chance.is_finite() {
            return Err(CalcError::invalid("increased_stun_chance", "must be finite"));
        }
        Ok(())
    }

    fn threshold_product(&self) -> f64 {
        self.threshold_multipliers.iter().product()
    }
}

/// One hit against a target.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StunHit {
    pub damage: f64,
    pub target_max_life: f64,
    pub damage_type: DamageType,
    pub attack_type: AttackType,
}

impl StunHit {
    pub fn new(
        damage: f64,
        target_max_life: f64,
        damage_type: DamageType,
        attack_type: AttackType,
    ) -> Self {
        Self {
            damage,
            target_max_life,
            damage_type,
            attack_type,
        }
    }

    fn validate(&self) -> Result<()> {
        ensure_non_negative("damage", self.damage)?;
        ensure_positive("target_max_life", self.target_max_life)
    }

    fn type_bonus(&self) -> f64 {
        let mut bonus = 1.0;
        if self.damage_type == DamageType::Physical {
            bonus *= PHYSICAL_STUN_BONUS;
        }
        if self.attack_type == AttackType::Melee {
            bonus *= MELEE_STUN_BONUS;
        }
        bonus
    }

    /// Damage after type bonuses, stun chance modifiers and threshold, in life units.
    fn stun_magnitude(&self, modifiers: &StunModifiers) -> f64 {
        let increased = (1.0 + modifiers.increased_stun_chance / 100.0).max(0.0);
        let more = modifiers
            .more_stun_chance
            .iter()
            .fold(1.0, |acc, m| acc * (1.0 + m / 100.0).max(0.0));
        self.damage * self.type_bonus() * increased * more / modifiers.threshold_product()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LightStunResult {
    /// `damage / max_life * 100` before any bonus.
    pub base_chance: f64,
    /// Chance after bonuses and the 100% clamp, before the minimum threshold.
    pub raw_chance: f64,
    /// Reported chance: `raw_chance` when it stuns, otherwise 0.
    pub final_chance: f64,
    pub will_stun: bool,
    pub immune: bool,
    pub minimum_threshold: f64,
    pub type_bonus: f64,
}

impl LightStunResult {
    fn immune(minimum_threshold: f64) -> Self {
        Self {
            base_chance: 0.0,
            raw_chance: 0.0,
            final_chance: 0.0,
            will_stun: false,
            immune: true,
            minimum_threshold,
            type_bonus: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeavyStunResult {
    pub target_id: String,
    pub buildup_added: f64,
    pub previous_state: StunState,
    pub meter: HeavyStunMeter,
    pub heavy_stun_triggered: bool,
    pub crushing_blow_triggered: bool,
    pub immune: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompleteStunResult {
    pub light: LightStunResult,
    pub heavy: HeavyStunResult,
}

/// Closed-form estimate of hits needed; not a simulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HitsToStun {
    pub light_chance_per_hit: f64,
    /// Infinite when a hit has no stun chance.
    pub hits_for_light: f64,
    pub buildup_per_hit: f64,
    /// Infinite when a hit adds no buildup.
    pub hits_for_heavy: f64,
}

/// Light stun chance for one hit. Pure; does not touch any meter.
pub fn light_stun_chance(hit: &StunHit, modifiers: &StunModifiers) -> Result<LightStunResult> {
    hit.validate()?;
    modifiers.validate()?;
    let minimum_threshold = modifiers.minimum_threshold();
    if modifiers.immune {
        return Ok(LightStunResult::immune(minimum_threshold));
    }
    let base_chance = hit.damage / hit.target_max_life * 100.0;
    let raw_chance = (hit.stun_magnitude(modifiers) / hit.target_max_life * 100.0).min(100.0);
    let will_stun = raw_chance >= minimum_threshold;
    Ok(LightStunResult {
        base_chance,
        raw_chance,
        final_chance: if will_stun { raw_chance } else { 0.0 },
        will_stun,
        immune: false,
        minimum_threshold,
        type_bonus: hit.type_bonus(),
    })
}

/// Estimate how many hits of this size are needed for light and heavy stun.
pub fn hits_to_stun(hit: &StunHit, modifiers: &StunModifiers) -> Result<HitsToStun> {
    hit.validate()?;
    modifiers.validate()?;
    if modifiers.immune {
        return Ok(HitsToStun {
            light_chance_per_hit: 0.0,
            hits_for_light: f64::INFINITY,
            buildup_per_hit: 0.0,
            hits_for_heavy: f64::INFINITY,
        });
    }
    let magnitude = hit.stun_magnitude(modifiers);
    let chance = (magnitude / hit.target_max_life * 100.0).min(100.0);
    let threshold = modifiers.minimum_threshold();
    let hits_for_light = if chance >= threshold {
        1.0
    } else if chance <= 0.0 {
        f64::INFINITY
    } else {
        threshold / chance
    };
    let buildup = magnitude * modifiers.buildup_multiplier;
    let hits_for_heavy = if buildup > 0.0 {
        hit.target_max_life / buildup
    } else {
        f64::INFINITY
    };
    Ok(HitsToStun {
        light_chance_per_hit: chance,
        hits_for_light,
        buildup_per_hit: buildup,
        hits_for_heavy,
    })
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Owns the heavy stun meters, keyed by target id.
///
/// Each meter sits behind its own lock so hits to one target are applied in
/// order while hits to other targets proceed in parallel.
#[derive(Debug)]
pub struct StunCalculator {
    meters: Mutex<HashMap<String, Arc<Mutex<HeavyStunMeter>>>>,
    max_hit_history: usize,
}

impl Default for StunCalculator {
    fn default() -> Self {
        Self::new()
    }
}

impl StunCalculator {
    pub fn new() -> Self {
        Self::with_history_limit(DEFAULT_MAX_HIT_HISTORY)
    }

    pub fn with_history_limit(max_hit_history: usize) -> Self {
        Self {
            meters: Mutex::new(HashMap::new()),
            max_hit_history,
        }
    }

    pub fn light_stun_chance(
        &self,
        hit: &StunHit,
        modifiers: &StunModifiers,
    ) -> Result<LightStunResult> {
        light_stun_chance(hit, modifiers)
    }

    pub fn hits_to_stun(&self, hit: &StunHit, modifiers: &StunModifiers) -> Result<HitsToStun> {
        hits_to_stun(hit, modifiers)
    }

    fn meter_handle(&self, target_id: &str, max_life: f64) -> Arc<Mutex<HeavyStunMeter>> {
        let mut meters = lock(&self.meters);
        meters
            .entry(target_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(HeavyStunMeter::new(target_id, max_life))))
            .clone()
    }

    /// Whether `handle` is still the registered meter for `target_id`. Called
    /// with the meter lock held; nothing takes a meter lock under the registry lock.
    fn is_tracked(&self, target_id: &str, handle: &Arc<Mutex<HeavyStunMeter>>) -> bool {
        lock(&self.meters)
            .get(target_id)
            .is_some_and(|current| Arc::ptr_eq(current, handle))
    }

    /// Add this hit's buildup to the target's meter.
    ///
    /// `light_stun_would_occur` must be the light stun outcome of the same
    /// hit; together with a Primed meter it triggers Crushing Blow.
    pub fn heavy_stun_buildup(
        &self,
        hit: &StunHit,
        target_id: &str,
        modifiers: &StunModifiers,
        light_stun_would_occur: bool,
    ) -> Result<HeavyStunResult> {
        hit.validate()?;
        modifiers.validate()?;
        if target_id.trim().is_empty() {
            return Err(CalcError::invalid("target_id", "must not be blank"));
        }

        if modifiers.immune {
            let meter = self
                .meter(target_id)
                .unwrap_or_else(|| HeavyStunMeter::new(target_id, hit.target_max_life));
            return Ok(HeavyStunResult {
                target_id: target_id.to_string(),
                buildup_added: 0.0,
                previous_state: meter.state,
                meter,
                heavy_stun_triggered: false,
                crushing_blow_triggered: false,
                immune: true,
            });
        }

        let buildup = hit.stun_magnitude(modifiers) * modifiers.buildup_multiplier;
        loop {
            let handle = self.meter_handle(target_id, hit.target_max_life);
            let mut meter = lock(&handle);
            // A concurrent remove_meter may have detached this meter; retry on the live one.
            if !self.is_tracked(target_id, &handle) {
                continue;
            }
            meter.rescale(hit.target_max_life);
            let previous_state = meter.state;
            meter.record_hit(
                HitRecord {
                    damage: hit.damage,
                    damage_type: hit.damage_type,
                    attack_type: hit.attack_type,
                    buildup_added: buildup,
                    percentage_after: 0.0,
                },
                self.max_hit_history,
            );
            let heavy_stun_triggered = previous_state != StunState::HeavyStunned
                && meter.state == StunState::HeavyStunned;
            let crushing_blow_triggered =
                previous_state == StunState::Primed && light_stun_would_occur;

            return Ok(HeavyStunResult {
                target_id: target_id.to_string(),
                buildup_added: buildup,
                previous_state,
                meter: meter.clone(),
                heavy_stun_triggered,
                crushing_blow_triggered,
                immune: false,
            });
        }
    }

    /// Light stun first, then heavy buildup fed with its outcome.
    pub fn complete_stun(
        &self,
        hit: &StunHit,
        target_id: &str,
        modifiers: &StunModifiers,
    ) -> Result<CompleteStunResult> {
        let light = light_stun_chance(hit, modifiers)?;
        let heavy = self.heavy_stun_buildup(hit, target_id, modifiers, light.will_stun)?;
        Ok(CompleteStunResult { light, heavy })
    }

    /// Snapshot of a target's meter.
    pub fn meter(&self, target_id: &str) -> Option<HeavyStunMeter> {
        let handle = lock(&self.meters).get(target_id).cloned()?;
        let meter = lock(&handle).clone();
        Some(meter)
    }

    /// Zero a target's meter. Returns false when the target is not tracked.
    pub fn reset_meter(&self, target_id: &str) -> bool {
        let Some(handle) = lock(&self.meters).get(target_id).cloned() else {
            return false;
        };
        lock(&handle).reset();
        true
    }

    /// Stop tracking a target, returning its last state.
    pub fn remove_meter(&self, target_id: &str) -> Option<HeavyStunMeter> {
        let handle = lock(&self.meters).remove(target_id)?;
        let meter = lock(&handle).clone();
        Some(meter)
    }

    /// Tracked target ids, sorted.
    pub fn tracked_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = lock(&self.meters).keys().cloned().collect();
        ids.sort();
        ids
    }
}
