//! Defense analysis: severity, explanation, suggested gear slots.

use crate::config::{
    EHP_CRITICAL_THRESHOLD, EHP_WEAK_THRESHOLD, LOW_RESISTANCE_THRESHOLD, RESISTANCE_CAP,
};
use crate::damage::DamageType;
use crate::ehp::{DefensiveStats, EhpReport};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Severity {
    Info,
    Warn,
    Crit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DefenseQuality {
    Good,
    Weak,
    Critical,
}

const RESISTANCE_SLOTS: &[&str] = &["Ring", "Amulet", "Boots", "Gloves", "Belt"];
const POOL_SLOTS: &[&str] = &["Body Armour", "Helmet", "Gloves", "Boots"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub code: String,
    pub severity: Severity,
    /// Short explanation for players.
    pub summary: String,
    /// Numbers behind the finding.
    pub technical: String,
    pub damage_type: Option<DamageType>,
    pub recommended_stat: String,
    pub suggested_slots: Vec<String>,
}

fn slots(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

impl Finding {
    pub fn ehp_critical(weakest: DamageType, ehp: f64) -> Self {
        Self {
            code: "EHP_CRITICAL".to_string(),
            severity: Severity::Crit,
            summary: format!(
                "Effective HP against {} is critically low ({:.0}).",
                weakest, ehp
            ),
            technical: format!("weakest ehp={:.1} < {}", ehp, EHP_CRITICAL_THRESHOLD),
            damage_type: Some(weakest),
            recommended_stat: "Life/Energy Shield".to_string(),
            suggested_slots: slots(POOL_SLOTS),
        }
    }

    pub fn ehp_low(weakest: DamageType, ehp: f64) -> Self {
        Self {
            code: "EHP_LOW".to_string(),
            severity: Severity::Warn,
            summary: format!(
                "Effective HP against {} is below the recommended threshold ({:.0}).",
                weakest, ehp
            ),
            technical: format!("weakest ehp={:.1} < {}", ehp, EHP_WEAK_THRESHOLD),
            damage_type: Some(weakest),
            recommended_stat: "Life/Energy Shield".to_string(),
            suggested_slots: slots(POOL_SLOTS),
        }
    }

    pub fn resistance_low(damage_type: DamageType, value: f64) -> Self {
        Self {
            code: "RESIST_LOW".to_string(),
            severity: Severity::Warn,
            summary: format!(
                "{} resistance is low ({:.0}%). Prioritize gear with resistance mods.",
                capitalize(damage_type.as_str()),
                value
            ),
            technical: format!(
                "{} res={} < {}, cap {}",
                damage_type, value, LOW_RESISTANCE_THRESHOLD, RESISTANCE_CAP
            ),
            damage_type: Some(damage_type),
            recommended_stat: format!("{} Resistance", capitalize(damage_type.as_str())),
            suggested_slots: slots(RESISTANCE_SLOTS),
        }
    }

    pub fn resistance_uncapped(damage_type: DamageType, value: f64) -> Self {
        Self {
            code: "RESIST_UNCAPPED".to_string(),
            severity: Severity::Info,
            summary: format!(
                "{} resistance is at {:.0}%, {:.0}% short of the cap.",
                capitalize(damage_type.as_str()),
                value,
                RESISTANCE_CAP - value
            ),
            technical: format!("{} res={} < cap {}", damage_type, value, RESISTANCE_CAP),
            damage_type: Some(damage_type),
            recommended_stat: format!("{} Resistance", capitalize(damage_type.as_str())),
            suggested_slots: slots(RESISTANCE_SLOTS),
        }
    }

    pub fn chaos_negative(value: f64) -> Self {
        Self {
            code: "CHAOS_NEGATIVE".to_string(),
            severity: Severity::Info,
            summary: format!("Chaos resistance is negative ({:.0}%).", value),
            technical: format!(
                "chaos res={} gives resist multiplier {:.3}",
                value,
                crate::ehp::resist_multiplier(value)
            ),
            damage_type: Some(DamageType::Chaos),
            recommended_stat: "Chaos Resistance".to_string(),
            suggested_slots: slots(RESISTANCE_SLOTS),
        }
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) => c.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DefenseAnalysis {
    pub quality: DefenseQuality,
    pub findings: Vec<Finding>,
}

/// Classify defenses from the stats and their EHP report.
pub fn analyze_defenses(stats: &DefensiveStats, report: &EhpReport) -> DefenseAnalysis {
    let mut findings = Vec::new();
    let quality = if report.weakest_ehp < EHP_CRITICAL_THRESHOLD {
        findings.push(Finding::ehp_critical(report.weakest, report.weakest_ehp));
        DefenseQuality::Critical
    } else if report.weakest_ehp < EHP_WEAK_THRESHOLD {
        findings.push(Finding::ehp_low(report.weakest, report.weakest_ehp));
        DefenseQuality::Weak
    } else {
        DefenseQuality::Good
    };

    for t in DamageType::ALL.iter().filter(|t| t.is_elemental()) {
        let res = stats.resistance(*t);
        if res < LOW_RESISTANCE_THRESHOLD {
            findings.push(Finding::resistance_low(*t, res));
        } else if res < RESISTANCE_CAP {
            findings.push(Finding::resistance_uncapped(*t, res));
        }
    }
    if stats.chaos_resistance < 0.0 {
        findings.push(Finding::chaos_negative(stats.chaos_resistance));
    }

    DefenseAnalysis { quality, findings }
}
