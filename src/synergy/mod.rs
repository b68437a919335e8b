//! Support gem synergy search.
//!
//! Given a skill and the supports compatible with it, every fixed-size
//! combination is scored with the same increased-then-more stacking the
//! damage calculator uses, and the best few are returned. The repository
//! lookup happens once up front; the search itself is synchronous.

mod combinations;
mod format;
mod repository;

pub use combinations::{combination_count, Combinations};
pub use format::format_result;
pub use repository::{GemCatalog, GemRepository, InMemoryGemRepository};

use crate::config::{
    DEFAULT_COMBO_SIZE, DEFAULT_SPIRIT_BUDGET, DEFAULT_TOP_N, DEFAULT_UTILITY_EFFECT_BONUS,
    MAX_COMBO_SIZE, SPIRIT_EPSILON,
};
use crate::damage::{apply_increased, apply_more, final_damage, DamageRange, DamageType, Modifier};
use crate::error::{ensure_non_negative, ensure_positive, CalcError, Result};
use crate::util::name_key;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::Arc;

fn default_damage_type() -> DamageType {
    DamageType::Physical
}

fn default_crit_multiplier() -> f64 {
    100.0
}

fn default_mana_multiplier() -> f64 {
    100.0
}

/// An active skill gem's base numbers. `damage_type` and the crit fields are
/// catalog data only; synergy scoring uses the average hit times cast rate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GemStats {
    pub name: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub base_damage: DamageRange,
    #[serde(default = "default_damage_type")]
    pub damage_type: DamageType,
    /// Seconds per cast or attack.
    pub cast_time: f64,
    #[serde(default)]
    pub crit_chance: f64,
    #[serde(default = "default_crit_multiplier")]
    pub crit_multiplier: f64,
    #[serde(default)]
    pub spirit_cost: f64,
    #[serde(default)]
    pub mana_cost: f64,
}

impl GemStats {
    pub fn validate(&self) -> Result<()> {
        self.base_damage.validate()?;
        ensure_positive("cast_time", self.cast_time)?;
        ensure_non_negative("spirit_cost", self.spirit_cost)?;
        ensure_non_negative("mana_cost", self.mana_cost)
    }
}

/// What a support gem does to the skill it supports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupportGemEffect {
    pub name: String,
    #[serde(default)]
    pub damage_modifiers: Vec<Modifier>,
    #[serde(default)]
    pub speed_modifiers: Vec<Modifier>,
    #[serde(default)]
    pub added_damage: Option<DamageRange>,
    #[serde(default)]
    pub spirit_cost: f64,
    /// Percent; 100 leaves mana cost unchanged.
    #[serde(default = "default_mana_multiplier")]
    pub mana_multiplier: f64,
    /// Skill tags this support needs (any one). Empty means it supports anything.
    #[serde(default)]
    pub required_tags: Vec<String>,
    /// Non-damage effects, e.g. "Knockback".
    #[serde(default)]
    pub utility: Vec<String>,
}

impl SupportGemEffect {
    pub fn is_compatible_with(&self, skill_tags: &[String]) -> bool {
        if self.required_tags.is_empty() {
            return true;
        }
        self.required_tags.iter().any(|req| {
            let req = name_key(req);
            skill_tags.iter().any(|t| name_key(t) == req)
        })
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(r) = &self.added_damage {
            r.validate()?;
        }
        for m in self.damage_modifiers.iter().chain(&self.speed_modifiers) {
            m.validate()?;
        }
        ensure_non_negative("spirit_cost", self.spirit_cost)?;
        ensure_non_negative("mana_multiplier", self.mana_multiplier)
    }
}

/// Modifiers the character brings regardless of supports.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CharacterModifiers {
    pub damage: Vec<Modifier>,
    pub speed: Vec<Modifier>,
    pub added_damage: Vec<DamageRange>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptimizationGoal {
    Dps,
    Efficiency,
    Utility,
    #[default]
    Balanced,
}

impl fmt::Display for OptimizationGoal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OptimizationGoal::Dps => "dps",
            OptimizationGoal::Efficiency => "efficiency",
            OptimizationGoal::Utility => "utility",
            OptimizationGoal::Balanced => "balanced",
        })
    }
}

impl FromStr for OptimizationGoal {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "dps" | "damage" => Ok(OptimizationGoal::Dps),
            "efficiency" => Ok(OptimizationGoal::Efficiency),
            "utility" => Ok(OptimizationGoal::Utility),
            "balanced" => Ok(OptimizationGoal::Balanced),
            other => Err(format!("unknown optimization goal: {}", other)),
        }
    }
}

/// Parameters of one synergy search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SynergyRequest {
    pub skill_name: String,
    #[serde(default)]
    pub character: CharacterModifiers,
    pub spirit_budget: f64,
    pub combo_size: usize,
    #[serde(default)]
    pub goal: OptimizationGoal,
    pub top_n: usize,
    pub utility_effect_bonus: f64,
}

impl SynergyRequest {
    pub fn new(skill_name: impl Into<String>) -> Self {
        Self {
            skill_name: skill_name.into(),
            character: CharacterModifiers::default(),
            spirit_budget: DEFAULT_SPIRIT_BUDGET,
            combo_size: DEFAULT_COMBO_SIZE,
            goal: OptimizationGoal::default(),
            top_n: DEFAULT_TOP_N,
            utility_effect_bonus: DEFAULT_UTILITY_EFFECT_BONUS,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.skill_name.trim().is_empty() {
            return Err(CalcError::invalid("skill_name", "must not be blank"));
        }
        if self.combo_size == 0 || self.combo_size > MAX_COMBO_SIZE {
            return Err(CalcError::invalid(
                "combo_size",
                format!("must be in 1..={}, got {}", MAX_COMBO_SIZE, self.combo_size),
            ));
        }
        if self.top_n == 0 {
            return Err(CalcError::invalid("top_n", "must be > 0"));
        }
        ensure_non_negative("spirit_budget", self.spirit_budget)?;
        ensure_non_negative("utility_effect_bonus", self.utility_effect_bonus)?;
        for r in &self.character.added_damage {
            r.validate()?;
        }
        for m in self.character.damage.iter().chain(&self.character.speed) {
            m.validate()?;
        }
        Ok(())
    }
}

/// Shared flag checked once per generated combination.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, AtomicOrdering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(AtomicOrdering::Relaxed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SynergyScores {
    pub dps: f64,
    /// DPS per point of spirit.
    pub efficiency: f64,
    pub overall: f64,
}

/// One scored support combination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SynergyResult {
    pub skill_name: String,
    pub supports: Vec<String>,
    pub total_dps: f64,
    pub average_hit: f64,
    pub casts_per_second: f64,
    pub total_spirit_cost: f64,
    pub total_mana_cost: f64,
    /// Product of all more/less damage modifiers.
    pub more_multiplier: f64,
    /// Summed increased/reduced damage, in percent.
    pub increased_damage: f64,
    /// Final casts per second over base casts per second.
    pub speed_multiplier: f64,
    pub utility: Vec<String>,
    pub scores: SynergyScores,
    pub breakdown: BTreeMap<String, f64>,
}

/// How many combinations were looked at and why some were dropped.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchStats {
    pub compatible_supports: usize,
    pub evaluated: u64,
    pub over_budget: u64,
    pub zero_damage: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SynergyReport {
    pub skill_name: String,
    /// False when the skill was not in the repository.
    pub skill_found: bool,
    pub goal: OptimizationGoal,
    pub results: Vec<SynergyResult>,
    pub stats: SearchStats,
}

/// Numbers for one combination, before names and breakdown are materialized.
struct Candidate {
    combo: Vec<usize>,
    base: DamageRange,
    added: DamageRange,
    final_damage: DamageRange,
    base_aps: f64,
    aps: f64,
    total_dps: f64,
    spirit: f64,
    mana_multiplier: f64,
    increased_damage: f64,
    more_multiplier: f64,
    increased_speed: f64,
    speed_more: f64,
    utility: Vec<String>,
    utility_bonus: f64,
    scores: SynergyScores,
}

fn combo_spirit_cost(skill: &GemStats, supports: &[SupportGemEffect], combo: &[usize]) -> f64 {
    skill.spirit_cost + combo.iter().map(|&i| supports[i].spirit_cost).sum::<f64>()
}

fn overall_score(goal: OptimizationGoal, dps: f64, efficiency: f64, utility_bonus: f64) -> f64 {
    match goal {
        OptimizationGoal::Dps => dps,
        OptimizationGoal::Efficiency => efficiency,
        OptimizationGoal::Utility => 0.7 * dps + utility_bonus,
        OptimizationGoal::Balanced => 0.6 * dps + 10.0 * efficiency + 0.1 * utility_bonus,
    }
}

/// Score one combination. `None` when the combination has no base damage.
fn evaluate(
    skill: &GemStats,
    supports: &[SupportGemEffect],
    combo: Vec<usize>,
    spirit: f64,
    request: &SynergyRequest,
) -> Option<Candidate> {
    let character = &request.character;
    let mut added = character
        .added_damage
        .iter()
        .fold(DamageRange::zero(), |acc, r| acc.add(r));
    let mut damage_mods: Vec<Modifier> = character.damage.clone();
    let mut speed_mods: Vec<Modifier> = character.speed.clone();
    let mut mana_multiplier = 1.0;
    let mut utility: Vec<String> = Vec::new();
    for &i in &combo {
        let s = &supports[i];
        if let Some(r) = &s.added_damage {
            added = added.add(r);
        }
        damage_mods.extend_from_slice(&s.damage_modifiers);
        speed_mods.extend_from_slice(&s.speed_modifiers);
        mana_multiplier *= s.mana_multiplier / 100.0;
        for u in &s.utility {
            if !utility.contains(u) {
                utility.push(u.clone());
            }
        }
    }

    let base = skill.base_damage.add(&added);
    if base.average() <= 0.0 {
        return None;
    }
    let fin = final_damage(&base, &damage_mods, &damage_mods);
    let base_aps = 1.0 / skill.cast_time;
    let aps = apply_more(apply_increased(base_aps, &speed_mods), &speed_mods);
    let total_dps = fin.average() * aps;

    let utility_bonus = utility.len() as f64 * request.utility_effect_bonus;
    let efficiency = total_dps / spirit.max(SPIRIT_EPSILON);
    let scores = SynergyScores {
        dps: total_dps,
        efficiency,
        overall: overall_score(request.goal, total_dps, efficiency, utility_bonus),
    };
    Some(Candidate {
        combo,
        base,
        added,
        final_damage: fin,
        base_aps,
        aps,
        total_dps,
        spirit,
        mana_multiplier,
        increased_damage: (apply_increased(1.0, &damage_mods) - 1.0) * 100.0,
        more_multiplier: apply_more(1.0, &damage_mods),
        increased_speed: (apply_increased(1.0, &speed_mods) - 1.0) * 100.0,
        speed_more: apply_more(1.0, &speed_mods),
        utility,
        utility_bonus,
        scores,
    })
}

impl Candidate {
    /// Higher overall first, then cheaper spirit. Equal candidates keep enumeration order.
    fn rank(&self, other: &Candidate) -> Ordering {
        other
            .scores
            .overall
            .total_cmp(&self.scores.overall)
            .then_with(|| self.spirit.total_cmp(&other.spirit))
    }

    fn into_result(self, skill: &GemStats, supports: &[SupportGemEffect]) -> SynergyResult {
        let breakdown = BTreeMap::from([
            ("base_damage_min".to_string(), skill.base_damage.min),
            ("base_damage_max".to_string(), skill.base_damage.max),
            ("added_damage_min".to_string(), self.added.min),
            ("added_damage_max".to_string(), self.added.max),
            ("combined_base_min".to_string(), self.base.min),
            ("combined_base_max".to_string(), self.base.max),
            ("increased_damage_percent".to_string(), self.increased_damage),
            ("more_multiplier".to_string(), self.more_multiplier),
            ("final_damage_min".to_string(), self.final_damage.min),
            ("final_damage_max".to_string(), self.final_damage.max),
            ("base_casts_per_second".to_string(), self.base_aps),
            ("increased_speed_percent".to_string(), self.increased_speed),
            ("speed_more_multiplier".to_string(), self.speed_more),
            ("mana_multiplier".to_string(), self.mana_multiplier),
            ("utility_bonus".to_string(), self.utility_bonus),
        ]);
        SynergyResult {
            skill_name: skill.name.clone(),
            supports: self.combo.iter().map(|&i| supports[i].name.clone()).collect(),
            total_dps: self.total_dps,
            average_hit: self.final_damage.average(),
            casts_per_second: self.aps,
            total_spirit_cost: self.spirit,
            total_mana_cost: skill.mana_cost * self.mana_multiplier,
            more_multiplier: self.more_multiplier,
            increased_damage: self.increased_damage,
            speed_multiplier: if self.base_aps > 0.0 {
                self.aps / self.base_aps
            } else {
                0.0
            },
            utility: self.utility,
            scores: self.scores,
            breakdown,
        }
    }
}

/// Keeps the best `limit` candidates in rank order.
struct TopN {
    limit: usize,
    items: Vec<Candidate>,
}

impl TopN {
    fn new(limit: usize) -> Self {
        Self {
            limit,
            items: Vec::with_capacity(limit + 1),
        }
    }

    /// Position a candidate would take; candidates that tie go after existing ones.
    fn position(&self, c: &Candidate) -> usize {
        self.items
            .partition_point(|existing| existing.rank(c) != Ordering::Greater)
    }

    fn offer(&mut self, c: Candidate) {
        let pos = self.position(&c);
        if pos >= self.limit {
            return;
        }
        self.items.insert(pos, c);
        self.items.truncate(self.limit);
    }
}

/// Run the combination search over already-fetched gems.
pub fn search(
    skill: &GemStats,
    supports: &[SupportGemEffect],
    request: &SynergyRequest,
    cancel: &CancelFlag,
) -> Result<SynergyReport> {
    request.validate()?;
    skill.validate()?;
    for s in supports {
        s.validate().map_err(|e| match e {
            CalcError::InvalidArgument { param, reason } => CalcError::InvalidArgument {
                param,
                reason: format!("support {}: {}", s.name, reason),
            },
            other => other,
        })?;
    }

    let mut stats = SearchStats {
        compatible_supports: supports.len(),
        ..Default::default()
    };
    let mut top = TopN::new(request.top_n);
    for combo in Combinations::new(supports.len(), request.combo_size) {
        if cancel.is_cancelled() {
            return Err(CalcError::Cancelled {
                evaluated: stats.evaluated,
            });
        }
        stats.evaluated += 1;
        let spirit = combo_spirit_cost(skill, supports, &combo);
        if spirit > request.spirit_budget {
            stats.over_budget += 1;
            continue;
        }
        match evaluate(skill, supports, combo, spirit, request) {
            Some(c) => top.offer(c),
            None => stats.zero_damage += 1,
        }
    }

    let results = top
        .items
        .into_iter()
        .map(|c| c.into_result(skill, supports))
        .collect();
    Ok(SynergyReport {
        skill_name: skill.name.clone(),
        skill_found: true,
        goal: request.goal,
        results,
        stats,
    })
}

/// Looks up gems in a repository and searches support combinations.
pub struct SynergyCalculator<R> {
    repository: R,
}

impl<R: GemRepository> SynergyCalculator<R> {
    pub fn new(repository: R) -> Self {
        Self { repository }
    }

    pub fn repository(&self) -> &R {
        &self.repository
    }

    /// Best support combinations for `request.skill_name`. An unknown skill
    /// yields an empty report, not an error.
    pub async fn find_best_combinations(
        &self,
        request: &SynergyRequest,
        cancel: &CancelFlag,
    ) -> Result<SynergyReport> {
        request.validate()?;
        let Some(skill) = self.repository.get_skill(&request.skill_name).await? else {
            tracing::warn!("skill not found: {}", request.skill_name);
            return Ok(SynergyReport {
                skill_name: request.skill_name.clone(),
                skill_found: false,
                goal: request.goal,
                results: Vec::new(),
                stats: SearchStats::default(),
            });
        };
        let supports = self.repository.list_compatible_supports(&skill.tags).await?;
        tracing::debug!(
            "{}: {} compatible support(s), {} combination(s) of {}",
            skill.name,
            supports.len(),
            combination_count(supports.len(), request.combo_size),
            request.combo_size
        );
        let report = search(&skill, &supports, request, cancel)?;
        tracing::debug!(
            "{}: evaluated {}, over budget {}, zero damage {}",
            skill.name,
            report.stats.evaluated,
            report.stats.over_budget,
            report.stats.zero_damage
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::damage::ModifierKind;

    fn skill() -> GemStats {
        GemStats {
            name: "Fireball".to_string(),
            tags: vec!["Spell".to_string(), "Fire".to_string()],
            base_damage: DamageRange::new(100.0, 200.0).unwrap(),
            damage_type: DamageType::Fire,
            cast_time: 1.0,
            crit_chance: 5.0,
            crit_multiplier: 100.0,
            spirit_cost: 0.0,
            mana_cost: 10.0,
        }
    }

    fn support(name: &str, spirit: f64, mods: Vec<Modifier>) -> SupportGemEffect {
        SupportGemEffect {
            name: name.to_string(),
            damage_modifiers: mods,
            speed_modifiers: vec![],
            added_damage: None,
            spirit_cost: spirit,
            mana_multiplier: 100.0,
            required_tags: vec![],
            utility: vec![],
        }
    }

    fn pool() -> Vec<SupportGemEffect> {
        let mut fast = support("Faster Casting", 10.0, vec![]);
        fast.speed_modifiers = vec![Modifier::increased(50.0).unwrap()];
        fast.mana_multiplier = 120.0;
        let mut knock = support("Knockback", 5.0, vec![]);
        knock.utility = vec!["Knockback".to_string()];
        vec![
            support("Controlled Destruction", 20.0, vec![Modifier::more(25.0).unwrap()]),
            support("Elemental Focus", 15.0, vec![Modifier::increased(40.0).unwrap()]),
            fast,
            knock,
            support("Brutality", 40.0, vec![Modifier::more(50.0).unwrap()]),
        ]
    }

    fn request(goal: OptimizationGoal) -> SynergyRequest {
        SynergyRequest {
            combo_size: 2,
            goal,
            top_n: 3,
            spirit_budget: 50.0,
            ..SynergyRequest::new("Fireball")
        }
    }

    #[test]
    fn single_support_math() {
        let supports = vec![support("CD", 10.0, vec![Modifier::more(25.0).unwrap()])];
        let req = SynergyRequest {
            combo_size: 1,
            character: CharacterModifiers {
                damage: vec![Modifier::increased(100.0).unwrap()],
                ..Default::default()
            },
            ..SynergyRequest::new("Fireball")
        };
        let report = search(&skill(), &supports, &req, &CancelFlag::new()).unwrap();
        let r = &report.results[0];
        // avg 150 * 2.0 * 1.25 = 375 at 1 cast/s
        assert!((r.total_dps - 375.0).abs() < 1e-9);
        assert!((r.more_multiplier - 1.25).abs() < 1e-9);
        assert!((r.increased_damage - 100.0).abs() < 1e-9);
        assert!((r.scores.efficiency - 37.5).abs() < 1e-9);
        assert!((r.breakdown["final_damage_max"] - 500.0).abs() < 1e-9);
    }

    #[test]
    fn crit_and_damage_type_do_not_change_scoring() {
        let supports = vec![support("CD", 10.0, vec![Modifier::more(25.0).unwrap()])];
        let req = SynergyRequest {
            combo_size: 1,
            ..SynergyRequest::new("Fireball")
        };
        let plain = search(&skill(), &supports, &req, &CancelFlag::new()).unwrap();
        let mut crit_heavy = skill();
        crit_heavy.crit_chance = 100.0;
        crit_heavy.crit_multiplier = 300.0;
        crit_heavy.damage_type = DamageType::Physical;
        let other = search(&crit_heavy, &supports, &req, &CancelFlag::new()).unwrap();
        assert_eq!(plain.results[0].total_dps, other.results[0].total_dps);
    }

    #[test]
    fn negative_modifier_from_json_rejected() {
        let bad: SupportGemEffect = serde_json::from_str(
            r#"{"name": "Broken", "damage_modifiers": [{"value": -50, "kind": "more"}]}"#,
        )
        .unwrap();
        let req = SynergyRequest {
            combo_size: 1,
            ..SynergyRequest::new("Fireball")
        };
        let err = search(&skill(), &[bad], &req, &CancelFlag::new()).unwrap_err();
        match err {
            CalcError::InvalidArgument { param, reason } => {
                assert_eq!(param, "modifier value");
                assert!(reason.starts_with("support Broken:"), "{}", reason);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn negative_character_speed_modifier_rejected() {
        let req = SynergyRequest {
            combo_size: 1,
            character: CharacterModifiers {
                speed: vec![Modifier {
                    value: -10.0,
                    kind: ModifierKind::Increased,
                }],
                ..Default::default()
            },
            ..SynergyRequest::new("Fireball")
        };
        let supports = vec![support("CD", 10.0, vec![Modifier::more(25.0).unwrap()])];
        assert!(matches!(
            search(&skill(), &supports, &req, &CancelFlag::new()),
            Err(CalcError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn budget_respected_and_reported() {
        let supports = pool();
        let req = request(OptimizationGoal::Dps);
        let report = search(&skill(), &supports, &req, &CancelFlag::new()).unwrap();
        assert_eq!(report.stats.evaluated, 10);
        assert!(report.stats.over_budget > 0);
        for r in &report.results {
            assert!(r.total_spirit_cost <= req.spirit_budget);
        }
        assert!(report.results.len() <= 3);
        assert!(report
            .results
            .windows(2)
            .all(|w| w[0].scores.overall >= w[1].scores.overall));
    }

    #[test]
    fn dps_goal_prefers_damage() {
        let supports = pool();
        let mut req = request(OptimizationGoal::Dps);
        req.spirit_budget = 200.0;
        let report = search(&skill(), &supports, &req, &CancelFlag::new()).unwrap();
        let best = &report.results[0];
        // Brutality (1.5 more) + Faster Casting (1.5 speed) = 150 * 1.5 * 1.5
        assert_eq!(
            best.supports,
            vec!["Faster Casting".to_string(), "Brutality".to_string()]
        );
        assert!((best.total_dps - 337.5).abs() < 1e-9);
        assert!((best.total_mana_cost - 12.0).abs() < 1e-9);
    }

    #[test]
    fn utility_goal_rewards_utility() {
        let supports = pool();
        let mut req = request(OptimizationGoal::Utility);
        req.spirit_budget = 200.0;
        let report = search(&skill(), &supports, &req, &CancelFlag::new()).unwrap();
        assert!(report.results[0].supports.contains(&"Knockback".to_string()));
        assert_eq!(report.results[0].utility, vec!["Knockback".to_string()]);
    }

    #[test]
    fn goals_score_as_documented() {
        assert_eq!(overall_score(OptimizationGoal::Dps, 100.0, 5.0, 50.0), 100.0);
        assert_eq!(overall_score(OptimizationGoal::Efficiency, 100.0, 5.0, 50.0), 5.0);
        assert!((overall_score(OptimizationGoal::Utility, 100.0, 5.0, 50.0) - 120.0).abs() < 1e-9);
        assert!((overall_score(OptimizationGoal::Balanced, 100.0, 5.0, 50.0) - 115.0).abs() < 1e-9);
    }

    #[test]
    fn zero_base_damage_skipped() {
        let mut s = skill();
        s.base_damage = DamageRange::zero();
        let mut supports = pool();
        supports[0].added_damage = Some(DamageRange::new(10.0, 10.0).unwrap());
        let mut req = request(OptimizationGoal::Dps);
        req.spirit_budget = 500.0;
        let report = search(&s, &supports, &req, &CancelFlag::new()).unwrap();
        // only pairs containing the added-damage support have damage
        assert_eq!(report.stats.zero_damage, 6);
        assert!(report.results.iter().all(|r| r.total_dps > 0.0));
        assert!(report.results.iter().all(|r| r.total_dps.is_finite()));
    }

    #[test]
    fn deterministic_across_runs() {
        let supports = pool();
        let req = request(OptimizationGoal::Balanced);
        let a = search(&skill(), &supports, &req, &CancelFlag::new()).unwrap();
        let b = search(&skill(), &supports, &req, &CancelFlag::new()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn ties_prefer_cheaper_then_enumeration_order() {
        let supports = vec![
            support("A", 10.0, vec![]),
            support("B", 5.0, vec![]),
            support("C", 5.0, vec![]),
        ];
        let req = SynergyRequest {
            combo_size: 1,
            goal: OptimizationGoal::Dps,
            ..SynergyRequest::new("Fireball")
        };
        let report = search(&skill(), &supports, &req, &CancelFlag::new()).unwrap();
        let names: Vec<&str> = report.results.iter().map(|r| r.supports[0].as_str()).collect();
        assert_eq!(names, vec!["B", "C", "A"]);
    }

    #[test]
    fn cancellation_stops_search() {
        let cancel = CancelFlag::new();
        cancel.cancel();
        let err = search(&skill(), &pool(), &request(OptimizationGoal::Dps), &cancel).unwrap_err();
        assert_eq!(err, CalcError::Cancelled { evaluated: 0 });
    }

    #[test]
    fn invalid_requests() {
        let supports = pool();
        let cancel = CancelFlag::new();
        let mut req = request(OptimizationGoal::Dps);
        req.skill_name = "   ".to_string();
        assert!(search(&skill(), &supports, &req, &cancel).is_err());
        let mut req = request(OptimizationGoal::Dps);
        req.combo_size = 0;
        assert!(search(&skill(), &supports, &req, &cancel).is_err());
        let mut bad = skill();
        bad.cast_time = 0.0;
        assert!(search(&bad, &supports, &request(OptimizationGoal::Dps), &cancel).is_err());
    }

    #[test]
    fn too_few_supports_yield_nothing() {
        let supports = vec![support("Only", 0.0, vec![])];
        let req = request(OptimizationGoal::Dps);
        let report = search(&skill(), &supports, &req, &CancelFlag::new()).unwrap();
        assert!(report.results.is_empty());
        assert_eq!(report.stats.evaluated, 0);
    }

    #[test]
    fn compatibility_by_tags() {
        let mut s = support("Melee Only", 0.0, vec![]);
        s.required_tags = vec!["MELEE".to_string()];
        assert!(!s.is_compatible_with(&["Spell".to_string()]));
        assert!(s.is_compatible_with(&["melee".to_string(), "Strike".to_string()]));
        let m = Modifier::new(10.0, ModifierKind::Less).unwrap();
        assert!(support("x", 0.0, vec![m]).is_compatible_with(&[]));
    }

    #[tokio::test]
    async fn unknown_skill_is_empty_not_error() {
        let calc = SynergyCalculator::new(InMemoryGemRepository::new(GemCatalog {
            skills: vec![skill()],
            supports: pool(),
        }));
        let req = SynergyRequest::new("Ice Nova");
        let report = calc
            .find_best_combinations(&req, &CancelFlag::new())
            .await
            .unwrap();
        assert!(!report.skill_found);
        assert!(report.results.is_empty());
    }

    #[tokio::test]
    async fn finds_through_repository() {
        let calc = SynergyCalculator::new(InMemoryGemRepository::new(GemCatalog {
            skills: vec![skill()],
            supports: pool(),
        }));
        let req = request(OptimizationGoal::Balanced);
        let report = calc
            .find_best_combinations(&SynergyRequest {
                skill_name: "fireball".to_string(),
                ..req
            }, &CancelFlag::new())
            .await
            .unwrap();
        assert!(report.skill_found);
        assert_eq!(report.results.len(), 3);
        assert_eq!(report.stats.compatible_supports, 5);
    }
}
