//! Command implementations for medicctl

use anyhow::{bail, Context as _, Result};
use chrono::Local;
use medic_common::{
    HealingEngine, MedicConfig, MetricCategory, PatternSubmission, RepairStore, Severity,
    SqliteStore,
};
use owo_colors::OwoColorize;
use serde_json::json;
use std::sync::Arc;

/// Shared command state
pub struct Context {
    db: Option<String>,
    json: bool,
}

impl Context {
    pub fn new(db: Option<String>, json: bool) -> Self {
        Self { db, json }
    }

    fn store(&self) -> Result<Arc<SqliteStore>> {
        let path = match &self.db {
            Some(p) => p.clone(),
            None => MedicConfig::load().store.path,
        };
        let store = SqliteStore::open_at(&path)
            .with_context(|| format!("Failed to open store at {}", path))?;
        Ok(Arc::new(store))
    }

    fn engine(&self) -> Result<HealingEngine> {
        Ok(HealingEngine::builder(self.store()?).build())
    }
}

pub struct SubmitArgs {
    pub category: String,
    pub subcategory: String,
    pub name: String,
    pub symptoms: Vec<String>,
    pub resolution: String,
    pub severity: String,
    pub confidence: f64,
    pub source: Option<String>,
}

fn print_json(value: &impl serde::Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn severity_colored(severity: Severity) -> String {
    match severity {
        Severity::Critical => severity.as_str().bright_red().bold().to_string(),
        Severity::High => severity.as_str().red().to_string(),
        Severity::Medium => severity.as_str().yellow().to_string(),
        Severity::Low => severity.as_str().cyan().to_string(),
        Severity::Info => severity.as_str().dimmed().to_string(),
    }
}

pub fn stats(ctx: &Context) -> Result<()> {
    let engine = ctx.engine()?;
    let stats = engine.get_repair_stats();
    if ctx.json {
        return print_json(&stats);
    }

    println!();
    println!("{}", "[REPAIRS]".bold());
    println!("  total:        {}", stats.repairs_total);
    println!("  successful:   {}", stats.repairs_successful.green());
    println!("  failed:       {}", stats.repairs_failed.red());
    println!("  success rate: {:.1}%", stats.success_rate * 100.0);
    println!("  avg time:     {:.0} ms", stats.avg_repair_time_ms);
    println!();
    println!("{}", "[KNOWLEDGE]".bold());
    println!("  patterns:     {}", stats.patterns);
    println!("  entries:      {}", stats.knowledge_entries);
    println!();
    println!("{}", "[PREDICTIONS]".bold());
    println!("  total:        {}", stats.predictions_total);
    println!("  active:       {}", stats.predictions_active);
    println!();
    Ok(())
}

pub fn predictions(ctx: &Context) -> Result<()> {
    let store = ctx.store()?;
    let predictions = store.active_predictions()?;
    if ctx.json {
        return print_json(&predictions);
    }

    if predictions.is_empty() {
        println!("[OK] No active predictions");
        return Ok(());
    }
    for p in &predictions {
        println!(
            "{}  {} in {} ({:.0}%)  {}",
            p.id.dimmed(),
            p.predicted_issue.bold(),
            p.time_to_impact,
            p.confidence * 100.0,
            severity_colored(p.severity)
        );
        println!(
            "    from {} -> {}  [{}]",
            p.source_pattern,
            p.preventive_action.cyan(),
            p.timestamp.with_timezone(&Local).format("%Y-%m-%d %H:%M")
        );
    }
    Ok(())
}

pub fn apply(ctx: &Context, id: &str, outcome: &str) -> Result<()> {
    let engine = ctx.engine()?;
    if !engine.apply_preventive_fix(id, outcome) {
        bail!("No active prediction with id {}", id);
    }
    if ctx.json {
        return print_json(&json!({ "id": id, "applied": true, "outcome": outcome }));
    }
    println!("[OK] Prediction {} marked applied", id.green());
    Ok(())
}

pub fn submit(ctx: &Context, args: SubmitArgs) -> Result<()> {
    let Some(category) = MetricCategory::from_name(&args.category) else {
        bail!("Unknown category '{}'", args.category);
    };
    let Some(severity) = Severity::parse(&args.severity) else {
        bail!("Unknown severity '{}'", args.severity);
    };
    if args.resolution.trim().is_empty() {
        bail!("Resolution must not be empty");
    }

    let engine = ctx.engine()?;
    let (pattern, knowledge) = engine.submit_error_pattern(PatternSubmission {
        category,
        subcategory: args.subcategory,
        name: args.name,
        symptoms: args.symptoms,
        resolution: args.resolution,
        severity,
        confidence: args.confidence,
        source_ref: args.source,
    })?;

    if ctx.json {
        return print_json(&json!({ "pattern": pattern, "knowledge": knowledge }));
    }
    println!("[OK] Pattern {} stored as {}", pattern.name.bold(), pattern.id.dimmed());
    println!("     Seeded knowledge for {}", knowledge.issue_type.cyan());
    Ok(())
}

pub fn compress(ctx: &Context) -> Result<()> {
    let engine = ctx.engine()?;
    let report = engine.compress_repair_knowledge();
    if ctx.json {
        return print_json(&report);
    }

    println!(
        "{} entries across {} issue types",
        report.total_entries, report.issue_types
    );
    if report.compressible == 0 {
        println!("[OK] No duplicate knowledge");
        return Ok(());
    }
    println!(
        "[NOTE] {} issue types have duplicates; {} entries could be merged",
        report.duplicate_groups.yellow(),
        report.compressible.yellow()
    );
    for (issue_type, id) in &report.canonical {
        println!("  {:<32} canonical {}", issue_type, id.dimmed());
    }
    Ok(())
}

pub fn history(ctx: &Context, limit: usize) -> Result<()> {
    let store = ctx.store()?;
    let repairs = store.recent_repairs(limit)?;
    if ctx.json {
        return print_json(&repairs);
    }

    if repairs.is_empty() {
        println!("No repairs recorded");
        return Ok(());
    }
    for r in &repairs {
        let status = if r.success {
            "[OK]".green().to_string()
        } else {
            "[FAIL]".red().to_string()
        };
        let flags = match (r.verified, r.rollback_needed) {
            (true, _) => " verified".green().to_string(),
            (false, true) => " rollback?".yellow().to_string(),
            _ => String::new(),
        };
        println!(
            "{} {}  {:<28} {:>6} ms  {}{}",
            status,
            r.timestamp.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S"),
            r.issue_type,
            r.repair_time_ms,
            severity_colored(r.severity),
            flags
        );
        println!("     {}  {}", r.id.dimmed(), r.fix_description);
    }
    Ok(())
}

pub fn verify(ctx: &Context, id: &str, verified: bool) -> Result<()> {
    let engine = ctx.engine()?;
    if !engine.verify_repair_outcome(id, verified) {
        bail!("No repair with id {}", id);
    }
    if ctx.json {
        return print_json(&json!({ "id": id, "verified": verified }));
    }
    println!("[OK] Repair {} marked {}", id, if verified { "verified" } else { "not verified" });
    Ok(())
}

pub fn rollback(ctx: &Context, id: &str) -> Result<()> {
    let engine = ctx.engine()?;
    if !engine.rollback(id) {
        bail!("No repair with id {}", id);
    }
    if ctx.json {
        return print_json(&json!({ "id": id, "rollback_recorded": true }));
    }
    println!("[NOTE] Rollback intent recorded for {}", id.yellow());
    println!("       Restoring state is up to the host application");
    Ok(())
}

pub fn init_config(path: &str) -> Result<()> {
    MedicConfig::save_default(path)?;
    println!("[OK] Wrote default config to {}", path);
    Ok(())
}
