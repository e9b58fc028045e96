//! Medic Control - operator CLI over the Medic repair store
//!
//! Reads and updates the same SQLite store the daemon writes.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "medicctl")]
#[command(about = "Medic - self-healing runtime monitor control", long_about = None)]
#[command(version)]
struct Cli {
    /// Store path (defaults to the configured store)
    #[arg(long, global = true)]
    db: Option<String>,

    /// Print JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Repair, prediction and knowledge statistics
    Stats,

    /// List predictions that have not been applied
    Predictions,

    /// Mark a prediction's preventive fix as applied
    Apply {
        /// Prediction id
        id: String,

        /// What happened
        #[arg(long, default_value = "applied by operator")]
        outcome: String,
    },

    /// Submit a curated error pattern with its resolution
    Submit {
        /// memory, latency, error_rate, connections or cpu
        #[arg(long)]
        category: String,

        /// Pattern name within the category, e.g. linear_growth
        #[arg(long)]
        subcategory: String,

        #[arg(long)]
        name: String,

        /// Observed symptom (repeatable)
        #[arg(long = "symptom")]
        symptoms: Vec<String>,

        #[arg(long)]
        resolution: String,

        #[arg(long, default_value = "medium")]
        severity: String,

        #[arg(long, default_value_t = 0.7)]
        confidence: f64,

        /// Runbook or ticket reference
        #[arg(long)]
        source: Option<String>,
    },

    /// Audit duplicate knowledge entries (nothing is deleted)
    Compress,

    /// Show recent repairs
    History {
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },

    /// Record whether a repair's outcome held up
    Verify {
        /// Repair id
        id: String,

        /// Mark as not verified
        #[arg(long)]
        failed: bool,
    },

    /// Record intent to roll back a repair
    Rollback {
        /// Repair id
        id: String,
    },

    /// Write a default config file
    InitConfig {
        #[arg(long, default_value = medic_common::config::CONFIG_PATH)]
        path: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let ctx = commands::Context::new(cli.db, cli.json);

    match cli.command {
        Commands::Stats => commands::stats(&ctx),
        Commands::Predictions => commands::predictions(&ctx),
        Commands::Apply { id, outcome } => commands::apply(&ctx, &id, &outcome),
        Commands::Submit {
            category,
            subcategory,
            name,
            symptoms,
            resolution,
            severity,
            confidence,
            source,
        } => commands::submit(
            &ctx,
            commands::SubmitArgs {
                category,
                subcategory,
                name,
                symptoms,
                resolution,
                severity,
                confidence,
                source,
            },
        ),
        Commands::Compress => commands::compress(&ctx),
        Commands::History { limit } => commands::history(&ctx, limit),
        Commands::Verify { id, failed } => commands::verify(&ctx, &id, !failed),
        Commands::Rollback { id } => commands::rollback(&ctx, &id),
        Commands::InitConfig { path } => commands::init_config(&path),
    }
}
