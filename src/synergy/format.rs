use super::SynergyResult;
use std::fmt::Write;

/// Human-readable summary of one combination. `detailed` appends the
/// calculation breakdown.
pub fn format_result(result: &SynergyResult, detailed: bool) -> String {
    let mut out = String::new();
    let supports = if result.supports.is_empty() {
        "(no supports)".to_string()
    } else {
        result.supports.join(" + ")
    };
    let _ = writeln!(out, "{} with {}", result.skill_name, supports);
    let _ = writeln!(
        out,
        "  DPS: {:.1}  avg hit: {:.1}  casts/s: {:.2}",
        result.total_dps, result.average_hit, result.casts_per_second
    );
    let _ = writeln!(
        out,
        "  spirit: {:.0}  mana: {:.1}",
        result.total_spirit_cost, result.total_mana_cost
    );
    let _ = writeln!(
        out,
        "  more: x{:.3}  increased: {:+.0}%  speed: x{:.3}",
        result.more_multiplier, result.increased_damage, result.speed_multiplier
    );
    if !result.utility.is_empty() {
        let _ = writeln!(out, "  utility: {}", result.utility.join(", "));
    }
    let _ = writeln!(
        out,
        "  score: {:.2} (dps {:.1}, efficiency {:.2})",
        result.scores.overall, result.scores.dps, result.scores.efficiency
    );
    if detailed {
        let _ = writeln!(out, "  breakdown:");
        for (key, value) in &result.breakdown {
            let _ = writeln!(out, "    {}: {:.4}", key, value);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synergy::SynergyScores;
    use std::collections::BTreeMap;

    fn result() -> SynergyResult {
        SynergyResult {
            skill_name: "Fireball".to_string(),
            supports: vec!["A".to_string(), "B".to_string()],
            total_dps: 337.5,
            average_hit: 225.0,
            casts_per_second: 1.5,
            total_spirit_cost: 50.0,
            total_mana_cost: 12.0,
            more_multiplier: 1.5,
            increased_damage: 0.0,
            speed_multiplier: 1.5,
            utility: vec!["Knockback".to_string()],
            scores: SynergyScores {
                dps: 337.5,
                efficiency: 6.75,
                overall: 337.5,
            },
            breakdown: BTreeMap::from([("more_multiplier".to_string(), 1.5)]),
        }
    }

    #[test]
    fn summary_lists_supports_and_utility() {
        let s = format_result(&result(), false);
        assert!(s.starts_with("Fireball with A + B"));
        assert!(s.contains("DPS: 337.5"));
        assert!(s.contains("utility: Knockback"));
        assert!(!s.contains("breakdown"));
    }

    #[test]
    fn detailed_appends_breakdown() {
        let s = format_result(&result(), true);
        assert!(s.contains("breakdown:"));
        assert!(s.contains("more_multiplier: 1.5000"));
    }
}
