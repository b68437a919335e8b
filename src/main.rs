//! PoE2 combat mechanics engine: CLI.

use clap::{Parser, Subcommand};
use poe2_mechanics::analysis::analyze_defenses;
use poe2_mechanics::config::EngineConfig;
use poe2_mechanics::damage::{
    apply_conversion, compose_base_damage, full_dps, AttackType, ConversionTable,
    CriticalStrikeConfig, DamageRange, DamageType, FullDpsInput, Modifier,
};
use poe2_mechanics::ehp::{calculate_ehp, DefensiveStats, ThreatProfile};
use poe2_mechanics::report::{
    render_dps, render_ehp, render_hits_to_stun, render_stun_hit, render_synergy,
    write_json_report,
};
use poe2_mechanics::store::GemStore;
use poe2_mechanics::stun::{StunCalculator, StunHit, StunModifiers};
use poe2_mechanics::synergy::{
    CancelFlag, CharacterModifiers, GemCatalog, GemRepository, InMemoryGemRepository,
    OptimizationGoal, SynergyCalculator, SynergyReport, SynergyRequest,
};
use poe2_mechanics::util::init_logging;
use serde::Serialize;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "poe2-mechanics")]
#[command(about = "PoE2 combat mechanics calculator (damage, EHP, stun, support gem synergy)")]
struct Cli {
    #[arg(short, long, global = true)]
    verbose: bool,

    /// TOML file with default values for synergy, stun and defense settings.
    #[arg(long, global = true, value_name = "TOML")]
    config: Option<PathBuf>,

    /// Also write the result as JSON to this path.
    #[arg(long, global = true, value_name = "PATH")]
    json: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute a full DPS breakdown from base damage and modifiers.
    Dps {
        #[arg(long, value_name = "MIN-MAX", conflicts_with = "spell")]
        weapon: Option<String>,
        #[arg(long, value_name = "MIN-MAX")]
        spell: Option<String>,
        #[arg(long, default_value = "physical")]
        base_type: DamageType,
        /// Flat added damage, e.g. fire:5-10. Repeatable.
        #[arg(long, value_name = "TYPE:MIN-MAX")]
        added: Vec<String>,
        /// Conversion, e.g. physical:fire:40. Repeatable.
        #[arg(long, value_name = "FROM:TO:PERCENT")]
        convert: Vec<String>,
        /// Increased (positive) or reduced (negative) damage percent. Repeatable.
        #[arg(long, allow_negative_numbers = true)]
        increased: Vec<f64>,
        /// More (positive) or less (negative) damage percent. Repeatable.
        #[arg(long, allow_negative_numbers = true)]
        more: Vec<f64>,
        /// Seconds per attack or cast.
        #[arg(long, default_value_t = 1.0)]
        action_time: f64,
        #[arg(long, allow_negative_numbers = true)]
        increased_speed: Vec<f64>,
        #[arg(long)]
        crit_chance: Option<f64>,
        #[arg(long, default_value_t = 100.0)]
        crit_multiplier: f64,
    },
    /// Effective health pool per damage type, with a defense review.
    Ehp {
        #[arg(long, default_value_t = 0.0)]
        life: f64,
        #[arg(long, default_value_t = 0.0)]
        es: f64,
        #[arg(long, default_value_t = 0.0)]
        armour: f64,
        #[arg(long, default_value_t = 0.0)]
        evasion: f64,
        #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
        fire_res: f64,
        #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
        cold_res: f64,
        #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
        lightning_res: f64,
        #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
        chaos_res: f64,
        #[arg(long, default_value_t = 0.0)]
        block: f64,
        /// Expected physical hit for armour math (defaults to config).
        #[arg(long)]
        expected_hit: Option<f64>,
    },
    /// Apply one or more identical hits to a target and track stun buildup.
    Stun {
        #[arg(long)]
        damage: f64,
        #[arg(long)]
        max_life: f64,
        #[arg(long, default_value = "physical")]
        damage_type: DamageType,
        #[arg(long, default_value = "melee")]
        attack_type: AttackType,
        #[arg(long, default_value_t = 1)]
        hits: usize,
        #[arg(long, default_value = "target")]
        target: String,
        #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
        increased_stun: f64,
        #[arg(long, allow_negative_numbers = true)]
        more_stun: Vec<f64>,
        #[arg(long)]
        threshold_multiplier: Vec<f64>,
        /// Minimum light stun chance (defaults to config).
        #[arg(long)]
        min_threshold: Option<f64>,
        #[arg(long)]
        immune: bool,
        #[arg(long, default_value_t = 1.0)]
        buildup_multiplier: f64,
    },
    /// Import a gem catalog JSON file into a SQLite gem database.
    ImportGems {
        #[arg(long, value_name = "DB")]
        db: PathBuf,
        #[arg(long, value_name = "JSON")]
        catalog: PathBuf,
    },
    /// Show one skill gem and the supports compatible with it.
    Gem {
        #[arg(long, value_name = "DB")]
        db: PathBuf,
        name: String,
    },
    /// Search the best support gem combinations for a skill.
    Synergy {
        #[arg(long, value_name = "DB", conflicts_with = "catalog")]
        db: Option<PathBuf>,
        #[arg(long, value_name = "JSON")]
        catalog: Option<PathBuf>,
        skill: String,
        #[arg(long)]
        budget: Option<f64>,
        #[arg(long)]
        size: Option<usize>,
        #[arg(long)]
        goal: Option<OptimizationGoal>,
        #[arg(long)]
        top: Option<usize>,
        /// Character increased/reduced damage percent. Repeatable.
        #[arg(long, allow_negative_numbers = true)]
        increased: Vec<f64>,
        /// Character more/less damage percent. Repeatable.
        #[arg(long, allow_negative_numbers = true)]
        more: Vec<f64>,
        #[arg(long, allow_negative_numbers = true)]
        increased_speed: Vec<f64>,
        #[arg(long)]
        detailed: bool,
    },
}

fn main() -> Result<(), String> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let cfg = EngineConfig::load_or_default(cli.config.as_deref())?;
    let json = cli.json;

    match cli.command {
        Commands::Dps {
            weapon,
            spell,
            base_type,
            added,
            convert,
            increased,
            more,
            action_time,
            increased_speed,
            crit_chance,
            crit_multiplier,
        } => {
            let weapon = weapon.as_deref().map(parse_range).transpose()?;
            let spell = spell.as_deref().map(parse_range).transpose()?;
            let added = added
                .iter()
                .map(|s| parse_added(s))
                .collect::<Result<Vec<_>, _>>()?;
            let table = parse_conversions(&convert)?;
            let base = compose_base_damage(weapon, spell, base_type, &added)
                .map_err(|e| e.to_string())?;
            let base = apply_conversion(&base, &table).map_err(|e| e.to_string())?;
            let input = FullDpsInput {
                base,
                increased_damage: to_modifiers(&increased, Modifier::increased)?,
                more_damage: to_modifiers(&more, Modifier::more)?,
                base_action_time: action_time,
                increased_speed: to_modifiers(&increased_speed, Modifier::increased)?,
                crit: crit_chance.map(|c| CriticalStrikeConfig {
                    crit_chance: c,
                    crit_multiplier,
                }),
                is_spell: spell.is_some(),
            };
            let breakdown = full_dps(&input).map_err(|e| e.to_string())?;
            print!("{}", render_dps(&breakdown));
            write_json(json.as_deref(), &breakdown)
        }
        Commands::Ehp {
            life,
            es,
            armour,
            evasion,
            fire_res,
            cold_res,
            lightning_res,
            chaos_res,
            block,
            expected_hit,
        } => {
            let stats = DefensiveStats {
                life,
                energy_shield: es,
                armour,
                evasion,
                fire_resistance: fire_res,
                cold_resistance: cold_res,
                lightning_resistance: lightning_res,
                chaos_resistance: chaos_res,
                block_chance: block,
            };
            let threat = ThreatProfile::physical(
                expected_hit.unwrap_or(cfg.defense.expected_physical_hit),
            );
            let report = calculate_ehp(&stats, &threat);
            let analysis = analyze_defenses(&stats, &report);
            print!("{}", render_ehp(&report, Some(&analysis)));
            write_json(
                json.as_deref(),
                &serde_json::json!({ "ehp": report, "analysis": analysis }),
            )
        }
        Commands::Stun {
            damage,
            max_life,
            damage_type,
            attack_type,
            hits,
            target,
            increased_stun,
            more_stun,
            threshold_multiplier,
            min_threshold,
            immune,
            buildup_multiplier,
        } => {
            let calc = StunCalculator::with_history_limit(cfg.stun.max_hit_history);
            let hit = StunHit::new(damage, max_life, damage_type, attack_type);
            let modifiers = StunModifiers {
                increased_stun_chance: increased_stun,
                more_stun_chance: more_stun,
                threshold_multipliers: threshold_multiplier,
                minimum_threshold: Some(min_threshold.unwrap_or(cfg.stun.minimum_threshold)),
                immune,
                buildup_multiplier,
            };
            let mut results = Vec::with_capacity(hits);
            for i in 1..=hits {
                let r = calc
                    .complete_stun(&hit, &target, &modifiers)
                    .map_err(|e| e.to_string())?;
                println!("{}", render_stun_hit(i, &r));
                results.push(r);
            }
            let estimate = calc
                .hits_to_stun(&hit, &modifiers)
                .map_err(|e| e.to_string())?;
            println!("{}", render_hits_to_stun(&estimate));
            write_json(
                json.as_deref(),
                &serde_json::json!({ "hits": results, "estimate": estimate }),
            )
        }
        Commands::ImportGems { db, catalog } => run_import(&db, &catalog),
        Commands::Gem { db, name } => run_gem(&db, &name, json.as_deref()),
        Commands::Synergy {
            db,
            catalog,
            skill,
            budget,
            size,
            goal,
            top,
            increased,
            more,
            increased_speed,
            detailed,
        } => {
            let mut damage = to_modifiers(&increased, Modifier::increased)?;
            damage.extend(to_modifiers(&more, Modifier::more)?);
            let request = SynergyRequest {
                skill_name: skill,
                character: CharacterModifiers {
                    damage,
                    speed: to_modifiers(&increased_speed, Modifier::increased)?,
                    added_damage: Vec::new(),
                },
                spirit_budget: budget.unwrap_or(cfg.synergy.spirit_budget),
                combo_size: size.unwrap_or(cfg.synergy.combo_size),
                goal: goal.unwrap_or(cfg.synergy.goal),
                top_n: top.unwrap_or(cfg.synergy.top_n),
                utility_effect_bonus: cfg.synergy.utility_effect_bonus,
            };
            let report = match (db, catalog) {
                (Some(db), _) => run_synergy(GemStore::open(&db)?, &request)?,
                (None, Some(path)) => {
                    let catalog = GemCatalog::load(&path)?;
                    run_synergy(InMemoryGemRepository::new(catalog), &request)?
                }
                (None, None) => return Err("provide --db or --catalog".to_string()),
            };
            print!("{}", render_synergy(&report, detailed));
            write_json(json.as_deref(), &report)
        }
    }
}

fn write_json<T: Serialize>(path: Option<&Path>, value: &T) -> Result<(), String> {
    if let Some(p) = path {
        write_json_report(value, p)?;
        tracing::info!("wrote {}", p.display());
    }
    Ok(())
}

fn run_import(db: &Path, catalog_path: &Path) -> Result<(), String> {
    let catalog = GemCatalog::load(catalog_path)?;
    let store = GemStore::open(db)?;
    let id = store.import_catalog(catalog_path.to_string_lossy().as_ref(), &catalog)?;
    tracing::info!(
        "import {}: {} skill(s), {} support(s) into {}",
        id,
        catalog.skills.len(),
        catalog.supports.len(),
        db.display()
    );
    println!(
        "Imported {} skill(s) and {} support(s)",
        catalog.skills.len(),
        catalog.supports.len()
    );
    Ok(())
}

fn run_gem(db: &Path, name: &str, json: Option<&Path>) -> Result<(), String> {
    let store = GemStore::open(db)?;
    let skill = store
        .get_skill(name)?
        .ok_or_else(|| format!("skill not found: {}", name))?;
    let supports: Vec<_> = store
        .list_supports()?
        .into_iter()
        .filter(|s| s.is_compatible_with(&skill.tags))
        .collect();
    println!("Skill: {}", skill.name);
    println!("Tags: {}", skill.tags.join(", "));
    println!(
        "Base damage: {} {}  cast time: {:.2}s  crit: {:.1}%",
        skill.base_damage, skill.damage_type, skill.cast_time, skill.crit_chance
    );
    println!("Spirit: {:.0}  mana: {:.1}", skill.spirit_cost, skill.mana_cost);
    println!("\nCompatible supports ({}):", supports.len());
    for s in &supports {
        println!("  {}  spirit={:.0}  mana={:.0}%", s.name, s.spirit_cost, s.mana_multiplier);
    }
    write_json(
        json,
        &serde_json::json!({ "skill": skill, "compatible_supports": supports }),
    )
}

fn run_synergy<R: GemRepository>(
    repo: R,
    request: &SynergyRequest,
) -> Result<SynergyReport, String> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .build()
        .map_err(|e| e.to_string())?;
    let calc = SynergyCalculator::new(repo);
    runtime
        .block_on(calc.find_best_combinations(request, &CancelFlag::new()))
        .map_err(|e| e.to_string())
}

fn to_modifiers(
    values: &[f64],
    build: fn(f64) -> poe2_mechanics::Result<Modifier>,
) -> Result<Vec<Modifier>, String> {
    values
        .iter()
        .map(|v| build(*v).map_err(|e| e.to_string()))
        .collect()
}

/// "10-20" or "15" (min = max).
fn parse_range(s: &str) -> Result<DamageRange, String> {
    let (min, max) = match s.split_once('-') {
        Some((a, b)) => (a.trim(), b.trim()),
        None => (s.trim(), s.trim()),
    };
    let min: f64 = min
        .parse()
        .map_err(|_| format!("invalid damage range: {}", s))?;
    let max: f64 = max
        .parse()
        .map_err(|_| format!("invalid damage range: {}", s))?;
    DamageRange::new(min, max).map_err(|e| e.to_string())
}

/// "fire:5-10"
fn parse_added(s: &str) -> Result<(DamageType, DamageRange), String> {
    let (t, r) = s
        .split_once(':')
        .ok_or_else(|| format!("expected TYPE:MIN-MAX, got {}", s))?;
    Ok((t.parse()?, parse_range(r)?))
}

/// "physical:fire:40"
fn parse_conversions(specs: &[String]) -> Result<ConversionTable, String> {
    let mut table = ConversionTable::new();
    for s in specs {
        let parts: Vec<&str> = s.split(':').collect();
        let [from, to, pct] = parts.as_slice() else {
            return Err(format!("expected FROM:TO:PERCENT, got {}", s));
        };
        let pct: f64 = pct
            .trim()
            .parse()
            .map_err(|_| format!("invalid conversion percent: {}", s))?;
        *table
            .entry(from.parse()?)
            .or_default()
            .entry(to.parse()?)
            .or_insert(0.0) += pct;
    }
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_range_forms() {
        assert_eq!(parse_range("10-20").unwrap(), DamageRange { min: 10.0, max: 20.0 });
        assert_eq!(parse_range("7").unwrap(), DamageRange { min: 7.0, max: 7.0 });
        assert!(parse_range("20-10").is_err());
        assert!(parse_range("x").is_err());
    }

    #[test]
    fn parse_added_and_conversion() {
        let (t, r) = parse_added("cold:1-3").unwrap();
        assert_eq!(t, DamageType::Cold);
        assert_eq!(r, DamageRange { min: 1.0, max: 3.0 });
        let specs = ["physical:fire:40".to_string(), "physical:fire:10".to_string()];
        let table = parse_conversions(&specs).unwrap();
        assert_eq!(table[&DamageType::Physical][&DamageType::Fire], 50.0);
        assert!(parse_conversions(&["physical:fire".to_string()]).is_err());
    }
}
