//! Command-line interface
//!
//! `provision` builds the cloud workspace, `train` runs the credit training
//! script against a workspace, `dataset register` and `submit` prepare runs
//! for it.

use clap::{Parser, Subcommand};
use colored::*;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::dataset::Schema;
use crate::provision::{provision, resources, workspace_config, ArmClient, ProvisionConfig};
use crate::tracking::{
    default_config_path, open_workspace, resolve_run, CONFIG_FILE_NAME, REMOTE_EXPERIMENT,
    RUN_INPUT_NAME, WORKSPACE_DATASET,
};
use crate::trainer::{train_and_explain, TrainConfig, TrainReport};

// ─── Styling helpers ───────────────────────────────────────────────────────────

const W: usize = 58; // box inner width

fn dim(s: &str) -> ColoredString   { s.truecolor(100, 100, 100) }
fn accent(s: &str) -> ColoredString { s.truecolor(120, 170, 255) }
fn muted(s: &str) -> ColoredString  { s.truecolor(140, 140, 140) }
fn ok(s: &str) -> ColoredString     { s.truecolor(100, 210, 120) }

fn line_box_top()    { println!("  {}", dim("┌─────────────────────────────────────────────────────────┐")); }
fn line_box_bottom() { println!("  {}", dim("└─────────────────────────────────────────────────────────┘")); }
fn line_box_sep()    { println!("  {}", dim("├─────────────────────────────────────────────────────────┤")); }

fn line_box(content: &str) {
    let visible_len = strip_ansi(content).chars().count();
    let pad = W.saturating_sub(visible_len);
    println!("  {}  {}{} {}", dim("│"), content, " ".repeat(pad), dim("│"));
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::new();
    let mut in_escape = false;
    for c in s.chars() {
        if c == '\x1b' { in_escape = true; continue; }
        if in_escape { if c == 'm' { in_escape = false; } continue; }
        out.push(c);
    }
    out
}

fn kv(key: &str, val: &str) -> String {
    format!("{} {}", muted(key), val.white())
}

fn step_ok(msg: &str) {
    println!("  {} {}", ok("✓"), msg);
}

fn step_run(msg: &str) {
    println!("  {} {}...", accent("›"), msg);
}

fn section(title: &str) {
    println!();
    println!("  {}", title.white().bold());
    println!("  {}", dim(&"─".repeat(56)));
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "mlops-lab")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Workspace provisioning and explainable credit-risk training")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create the resource group, its dependencies and the ML workspace
    Provision {
        /// Print the requests without sending them
        #[arg(long)]
        dry_run: bool,

        /// Where to write the workspace config after provisioning
        #[arg(long, default_value = CONFIG_FILE_NAME)]
        config_out: PathBuf,
    },

    /// Train, register and explain the credit-risk classifier
    Train {
        /// Run id assigned by a scheduler; absent or `OfflineRun*` runs interactively
        #[arg(long, env = "AZUREML_RUN_ID")]
        run_id: Option<String>,

        /// Workspace config file (searched upwards from the current directory by default)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Training settings (JSON)
        #[arg(long)]
        train_config: Option<PathBuf>,

        /// Directory for local copies of the artifacts
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
    },

    /// Manage workspace datasets
    Dataset {
        #[command(subcommand)]
        command: DatasetCommand,
    },

    /// Queue a run for a scheduler to pick up
    Submit {
        /// Experiment name
        #[arg(short, long, default_value = REMOTE_EXPERIMENT)]
        experiment: String,

        /// Input bindings as `name=dataset`
        #[arg(short, long = "input")]
        inputs: Vec<String>,

        /// Workspace config file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
pub enum DatasetCommand {
    /// Register a CSV file as a named dataset
    Register {
        /// Dataset name
        name: String,

        /// CSV file to register
        csv: PathBuf,

        /// Column schema file (JSON)
        #[arg(long)]
        schema: Option<PathBuf>,

        #[arg(long, default_value = "")]
        description: String,

        /// Workspace config file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

fn config_path(config: Option<PathBuf>) -> anyhow::Result<PathBuf> {
    match config {
        Some(path) => Ok(path),
        None => Ok(default_config_path()?),
    }
}

// ─── Commands ──────────────────────────────────────────────────────────────────

pub async fn cmd_provision(dry_run: bool, config_out: &Path) -> anyhow::Result<()> {
    let config = ProvisionConfig::from_env()?;

    section("Provision");
    if dry_run {
        for request in resources::plan(&config) {
            println!(
                "  {} {} {}",
                accent("PUT"),
                request.kind.to_string().white(),
                dim(&request.url(resources::MANAGEMENT_ENDPOINT))
            );
        }
        return Ok(());
    }

    let start = Instant::now();
    step_run(&format!("provisioning workspace {}", config.workspace_name));
    let mut client = ArmClient::new();
    let outcome = provision(&config, &mut client).await?;

    for (kind, id) in [
        ("resource group", &outcome.resource_group),
        ("storage account", &outcome.storage_account),
        ("key vault", &outcome.key_vault),
        ("app insights", &outcome.app_insights),
        ("workspace", &outcome.workspace),
    ] {
        step_ok(&format!("{} {}", kind, dim(id)));
    }

    workspace_config(&config).write(config_out)?;
    step_ok(&format!(
        "wrote {} in {:.1}s",
        config_out.display(),
        start.elapsed().as_secs_f64()
    ));
    Ok(())
}

pub fn cmd_train(
    run_id: Option<&str>,
    config: Option<PathBuf>,
    train_config: Option<&Path>,
    output_dir: Option<PathBuf>,
) -> anyhow::Result<()> {
    let config_path = config_path(config)?;
    let mut settings = match train_config {
        Some(path) => TrainConfig::from_file(path)?,
        None => TrainConfig::new(),
    };
    if let Some(dir) = output_dir {
        settings = settings.with_output_dir(dir);
    }

    let start = Instant::now();
    let mut ctx = resolve_run(run_id, &config_path)?;
    section(&format!("Train {}", ctx.id()));
    let report = train_and_explain(ctx.as_mut(), &settings)?;
    print_report(&report, start.elapsed().as_secs_f64());
    Ok(())
}

pub fn cmd_dataset_register(
    name: &str,
    csv: &Path,
    schema: Option<&Path>,
    description: &str,
    config: Option<PathBuf>,
) -> anyhow::Result<()> {
    let store = open_workspace(config_path(config)?)?;
    let schema = schema.map(Schema::from_file).transpose()?;
    let entry = store.register_dataset(name, csv, schema, description)?;
    step_ok(&format!(
        "registered {} in {}",
        entry.name.white().bold(),
        store.name()
    ));
    Ok(())
}

fn parse_input(binding: &str) -> anyhow::Result<(String, String)> {
    match binding.split_once('=') {
        Some((name, dataset)) if !name.is_empty() && !dataset.is_empty() => {
            Ok((name.to_string(), dataset.to_string()))
        }
        _ => anyhow::bail!("input binding '{}' must be name=dataset", binding),
    }
}

pub fn cmd_submit(experiment: &str, inputs: &[String], config: Option<PathBuf>) -> anyhow::Result<()> {
    let store = open_workspace(config_path(config)?)?;
    let mut bindings = inputs
        .iter()
        .map(|b| parse_input(b))
        .collect::<anyhow::Result<BTreeMap<_, _>>>()?;
    if bindings.is_empty() {
        bindings.insert(RUN_INPUT_NAME.to_string(), WORKSPACE_DATASET.to_string());
    }

    let record = store.submit_run(experiment, bindings)?;
    step_ok(&format!("submitted {}", record.run_id.white().bold()));
    println!(
        "  {} {}",
        dim("start it with"),
        accent(&format!("AZUREML_RUN_ID={} mlops-lab train", record.run_id))
    );
    Ok(())
}

fn print_report(report: &TrainReport, secs: f64) {
    println!();
    line_box_top();
    line_box(&kv("run", &report.run_id));
    line_box(&kv("mode", if report.remote { "remote" } else { "local" }));
    line_box(&kv("rows", &format!("{} train / {} test", report.n_train, report.n_test)));
    line_box(&kv(
        "features",
        &format!(
            "{} numeric, {} categorical → {} columns",
            report.numeric_features.len(),
            report.categorical_features.len(),
            report.n_engineered_features
        ),
    ));
    line_box_sep();
    line_box(&kv("accuracy", &format!("{:.4}", report.accuracy)));
    line_box(&kv(
        "solver",
        &format!(
            "{} iterations{}",
            report.iterations,
            if report.converged { "" } else { " (not converged)" }
        ),
    ));
    line_box(&kv("model", &format!("{} v{}", report.model_name, report.model_version)));
    line_box(&kv("explanation", &report.explanation_id));
    line_box_sep();
    for (name, importance) in report.ranking.iter().take(5) {
        line_box(&kv(&format!("{:<16}", name), &format!("{:.4}", importance)));
    }
    line_box_bottom();
    println!("  {}", dim(&format!("finished in {:.2}s", secs)));
}
