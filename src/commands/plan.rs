// src/commands/plan.rs
//! Plan command: load channels, solve, order and print the transaction

use anyhow::{Context as _, Result};
use serde::Serialize;
use std::path::PathBuf;
use tracing::{debug, info};
use txplan::resolver::conflicts_to_error;
use txplan::transaction::Summary;
use txplan::universe::loader::{ChannelSource, INSTALLED_REPO, load_channels, load_prefix};
use txplan::{
    Config, Context, ExplicitSolver, InterruptFlag, InterruptionGuard, PlannedStep, Request,
    Solver, StepType, Transaction, Universe, interruption_point,
};

/// Arguments of `txplan plan`
#[derive(Debug, Clone, Default)]
pub struct PlanArgs {
    pub channels: Vec<String>,
    pub prefix: Option<PathBuf>,
    pub install: Vec<String>,
    pub remove: Vec<String>,
    pub json: bool,
}

/// One line of the printed plan
#[derive(Debug, Serialize)]
struct ReportStep {
    #[serde(flatten)]
    step: PlannedStep,
    name: String,
    version: String,
    build: String,
    channel: String,
}

#[derive(Debug, Serialize)]
struct PlanReport {
    steps: Vec<ReportStep>,
    summary: Summary,
}

/// Compute and print the transaction for `args`
pub fn cmd_plan(ctx: &Context, args: PlanArgs) -> Result<()> {
    let mut guard = InterruptionGuard::new(|| {
        info!("Planning stopped before completion; no environment was modified");
        Ok(())
    });

    let report = guarded_report(ctx.config(), &args, &mut guard)?;
    drop(guard);
    interruption_point()?;

    if args.json {
        let text = serde_json::to_string_pretty(&report).context("Failed to serialize plan")?;
        println!("{}", text);
    } else {
        print_report(&report);
    }
    Ok(())
}

/// Build the report as one guarded scope, so every error leaving it marks the guard
fn guarded_report(
    config: &Config,
    args: &PlanArgs,
    guard: &mut InterruptionGuard,
) -> Result<PlanReport> {
    let flag = guard.flag().clone();
    guard.run(|| build_report(config, args, &flag))
}

fn build_report(config: &Config, args: &PlanArgs, flag: &InterruptFlag) -> Result<PlanReport> {
    let mut universe = Universe::new();

    match &args.prefix {
        Some(prefix) => {
            load_prefix(&mut universe, prefix, flag)?;
        }
        None => {
            let repo = universe.add_repo(INSTALLED_REPO, INSTALLED_REPO, 0);
            universe.set_installed_repo(repo);
        }
    }

    let channels = args
        .channels
        .iter()
        .map(|c| ChannelSource::parse(c))
        .collect::<txplan::Result<Vec<_>>>()?;
    let options = config.load_options();
    let repos = load_channels(&mut universe, &channels, &options, flag)?;
    info!(
        "Loaded {} packages from {} repositories",
        universe.len(),
        repos.len()
    );

    let mut request = Request::new();
    for spec in &args.install {
        request = request
            .install(spec)
            .with_context(|| format!("Invalid package spec '{}'", spec))?;
    }
    for name in &args.remove {
        request = request.remove(name.as_str());
    }

    let mode = config.transaction;
    let mut solver = ExplicitSolver::new().with_multi_version(mode.multi_version);
    let solution = solver
        .solve(&universe, &request)
        .map_err(conflicts_to_error)?;
    flag.check()?;

    let mut transaction = Transaction::from_solver(&universe, &solution);
    transaction.order(&universe, config.order)?;
    debug!("Ordered {} steps", transaction.size());

    let steps = transaction
        .plan(&universe, mode)
        .into_iter()
        .filter(|step| step.step_type != StepType::Ignore)
        .map(|step| {
            let solvable = universe.solvable(step.id);
            ReportStep {
                name: solvable.name.clone(),
                version: solvable.version.to_string(),
                build: solvable.build.clone(),
                channel: solvable.channel.clone(),
                step,
            }
        })
        .collect();
    let summary = transaction.classify(&universe, mode).summary();

    Ok(PlanReport { steps, summary })
}

fn print_report(report: &PlanReport) {
    if report.steps.is_empty() {
        println!("Nothing to do");
        return;
    }

    println!("Transaction plan ({} steps):", report.steps.len());
    for (index, step) in report.steps.iter().enumerate() {
        println!(
            "  {:>3}. {:<10} {}-{} ({})",
            index + 1,
            step.step.step_type,
            step.name,
            step.version,
            step.channel
        );
    }
    println!();
    println!("Summary: {}", report.summary);
}
