//! JSON and text report generation.

use crate::analysis::{DefenseAnalysis, Severity};
use crate::damage::DpsBreakdown;
use crate::ehp::EhpReport;
use crate::stun::{CompleteStunResult, HitsToStun};
use crate::synergy::{format_result, SynergyReport};
use serde::Serialize;
use std::fmt::Write;
use std::fs;
use std::path::Path;

pub fn write_json_report<T: Serialize + ?Sized>(value: &T, path: &Path) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|e| e.to_string())?;
        }
    }
    let json = serde_json::to_string_pretty(value).map_err(|e| e.to_string())?;
    fs::write(path, json).map_err(|e| e.to_string())?;
    Ok(())
}

pub fn render_dps(b: &DpsBreakdown) -> String {
    let mut out = String::new();
    let speed_label = if b.is_spell { "casts/s" } else { "attacks/s" };
    let _ = writeln!(
        out,
        "Total DPS: {:.1}  (avg hit {:.1}, {} {:.2}, crit x{:.3})",
        b.total_dps, b.average_hit, speed_label, b.actions_per_second, b.crit_multiplier
    );
    for (t, d) in &b.per_type {
        let _ = writeln!(
            out,
            "  {:<10} base {}  final {}  avg {:.1}  dps {:.1}",
            t.as_str(),
            d.base,
            d.final_damage,
            d.average_hit,
            d.dps
        );
    }
    out
}

pub fn render_ehp(report: &EhpReport, analysis: Option<&DefenseAnalysis>) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Effective HP:");
    for (t, e) in &report.per_type {
        let _ = writeln!(
            out,
            "  {:<10} {:>10.0}  x{:.3}  {}",
            t.as_str(),
            e.ehp,
            e.total_multiplier,
            e.breakdown
        );
    }
    let _ = writeln!(
        out,
        "Weakest: {} ({:.0})",
        report.weakest, report.weakest_ehp
    );
    if let Some(a) = analysis {
        let _ = writeln!(out, "\nDefense quality: {:?}", a.quality);
        for f in &a.findings {
            let sev = match f.severity {
                Severity::Info => "INFO",
                Severity::Warn => "WARN",
                Severity::Crit => "CRIT",
            };
            let _ = writeln!(out, "  [{}] {} {}", f.code, sev, f.summary);
            let _ = writeln!(
                out,
                "      -> {} on {}",
                f.recommended_stat,
                f.suggested_slots.join(", ")
            );
        }
        if a.findings.is_empty() {
            let _ = writeln!(out, "  None");
        }
    }
    out
}

pub fn render_stun_hit(index: usize, r: &CompleteStunResult) -> String {
    let mut flags = Vec::new();
    if r.light.immune {
        flags.push("IMMUNE");
    }
    if r.light.will_stun {
        flags.push("LIGHT STUN");
    }
    if r.heavy.crushing_blow_triggered {
        flags.push("CRUSHING BLOW");
    }
    if r.heavy.heavy_stun_triggered {
        flags.push("HEAVY STUN");
    }
    format!(
        "hit {:>3}: light {:>5.1}%  buildup +{:.0} -> {:>5.1}% [{}] {}",
        index,
        r.light.final_chance,
        r.heavy.buildup_added,
        r.heavy.meter.percentage,
        r.heavy.meter.state,
        flags.join(" ")
    )
    .trim_end()
    .to_string()
}

pub fn render_hits_to_stun(h: &HitsToStun) -> String {
    fn hits(x: f64) -> String {
        if x.is_finite() {
            format!("{:.2}", x)
        } else {
            "never".to_string()
        }
    }
    format!(
        "Estimate: light chance/hit {:.1}% -> hits for light stun {}; \
         buildup/hit {:.0} -> hits for heavy stun {}",
        h.light_chance_per_hit,
        hits(h.hits_for_light),
        h.buildup_per_hit,
        hits(h.hits_for_heavy)
    )
}

pub fn render_synergy(report: &SynergyReport, detailed: bool) -> String {
    let mut out = String::new();
    if !report.skill_found {
        let _ = writeln!(out, "Skill not found: {}", report.skill_name);
        return out;
    }
    let s = &report.stats;
    let _ = writeln!(
        out,
        "{} ({} goal): {} compatible support(s), {} combination(s) evaluated, \
         {} over budget, {} without damage",
        report.skill_name,
        report.goal,
        s.compatible_supports,
        s.evaluated,
        s.over_budget,
        s.zero_damage
    );
    if report.results.is_empty() {
        let _ = writeln!(out, "No combination fits the budget.");
    }
    for (i, r) in report.results.iter().enumerate() {
        let _ = write!(out, "\n#{} {}", i + 1, format_result(r, detailed));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::analyze_defenses;
    use crate::ehp::{calculate_ehp, DefensiveStats, ThreatProfile};
    use crate::stun::{StunCalculator, StunHit, StunModifiers};
    use crate::damage::{AttackType, DamageType};

    #[test]
    fn json_report_written() {
        let dir = tempfile::tempdir().unwrap();
        let stats = DefensiveStats {
            life: 1000.0,
            ..Default::default()
        };
        let report = calculate_ehp(&stats, &ThreatProfile::default());
        let path = dir.path().join("nested").join("ehp.json");
        write_json_report(&report, &path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        let v: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(v["weakest"], "physical");
        assert!(v["per_type"]["fire"]["ehp"].as_f64().unwrap() > 0.0);
    }

    #[test]
    fn ehp_text_lists_findings() {
        let stats = DefensiveStats {
            life: 2500.0,
            ..Default::default()
        };
        let report = calculate_ehp(&stats, &ThreatProfile::default());
        let analysis = analyze_defenses(&stats, &report);
        let text = render_ehp(&report, Some(&analysis));
        assert!(text.contains("[EHP_CRITICAL] CRIT"));
        assert!(text.contains("fire"));
    }

    #[test]
    fn stun_line_flags() {
        let calc = StunCalculator::new();
        let hit = StunHit::new(1000.0, 5000.0, DamageType::Physical, AttackType::Melee);
        let r = calc.complete_stun(&hit, "t", &StunModifiers::default()).unwrap();
        let line = render_stun_hit(1, &r);
        assert!(line.contains("LIGHT STUN"));
        assert!(line.contains("[Normal]"));
    }
}
