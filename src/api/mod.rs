mod payload;
mod store;

use std::fmt::Write as _;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use log::info;
use rayon::prelude::*;
use serde::Serialize;

use crate::core::{
    Inputs, ReturnSolveConfig, SimulationResult, required_monthly_contribution, simulate,
    solve_annual_return,
};

use payload::MAX_LIFE_EXPECTANCY;

pub use payload::{
    ApiGoalType, ApiStrategy, CliGoalType, CliStrategy, PlanArgs, SimulatePayload, build_inputs,
    default_plan_args, inputs_from_json, plan_args_from_payload,
};
pub use store::{Scenario, ScenarioStore};

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Scenario not found: {0}")]
    ScenarioNotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Parser, Debug)]
#[command(
    name = "nestegg",
    about = "Retirement projection: traditional + Roth + brokerage buckets, tax-aware drawdown, solvency check"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Simulate a plan described by command-line flags
    Simulate {
        #[command(flatten)]
        plan: PlanArgs,
        #[arg(long, help = "Print a short text summary instead of JSON")]
        summary: bool,
    },
    /// Simulate a plan read from a JSON payload file
    Run {
        payload: PathBuf,
        #[arg(long)]
        summary: bool,
    },
    /// Manage and compare saved scenarios
    Scenario(ScenarioArgs),
    /// Solve for the contribution or return needed to reach a target
    #[command(subcommand)]
    Solve(SolveCommand),
}

#[derive(Args, Debug)]
pub struct ScenarioArgs {
    #[arg(long, env = "NESTEGG_STORE", default_value = "scenarios.json")]
    pub store: PathBuf,
    #[command(subcommand)]
    pub command: ScenarioCommand,
}

#[derive(Subcommand, Debug)]
pub enum ScenarioCommand {
    /// Save a plan under a name, from a payload file or from flags
    Save {
        name: String,
        #[arg(long, help = "Read the plan from a JSON payload file instead of flags")]
        payload: Option<PathBuf>,
        #[command(flatten)]
        plan: PlanArgs,
    },
    List,
    Show {
        key: String,
    },
    Remove {
        key: String,
    },
    /// Simulate every saved scenario and print one line each
    Compare,
}

#[derive(Subcommand, Debug)]
pub enum SolveCommand {
    /// Level monthly contribution needed to reach a target
    Contribution {
        #[arg(long)]
        target: f64,
        #[arg(long, default_value_t = 0.0)]
        principal: f64,
        #[arg(long, help = "Nominal annual return in percent")]
        annual_return: f64,
        #[arg(long)]
        years: u32,
    },
    /// Annual return needed to reach a target with a fixed contribution
    Return {
        #[arg(long)]
        target: f64,
        #[arg(long, default_value_t = 0.0)]
        principal: f64,
        #[arg(long, default_value_t = 0.0)]
        monthly_contribution: f64,
        #[arg(long)]
        years: u32,
        #[arg(long, default_value_t = 200)]
        max_iterations: u32,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ContributionResponse {
    required_monthly_contribution: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonRow {
    pub id: u64,
    pub name: String,
    pub result: SimulationResult,
}

pub fn run(cli: Cli) -> Result<(), ApiError> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    execute(cli, &mut out)
}

pub fn execute(cli: Cli, out: &mut impl Write) -> Result<(), ApiError> {
    match cli.command {
        Command::Simulate { plan, summary } => {
            let inputs = build_inputs(plan)?;
            emit_result(out, &simulate(&inputs), summary)
        }
        Command::Run { payload, summary } => {
            let inputs = read_payload(&payload)?;
            emit_result(out, &simulate(&inputs), summary)
        }
        Command::Scenario(args) => execute_scenario(args, out),
        Command::Solve(command) => execute_solve(command, out),
    }
}

fn execute_scenario(args: ScenarioArgs, out: &mut impl Write) -> Result<(), ApiError> {
    let mut store = ScenarioStore::open(&args.store)?;
    match args.command {
        ScenarioCommand::Save {
            name,
            payload,
            plan,
        } => {
            let inputs = match payload {
                Some(path) => read_payload(&path)?,
                None => build_inputs(plan)?,
            };
            let scenario = store.save(&name, inputs)?;
            writeln!(
                out,
                "Saved scenario #{} {:?} to {}",
                scenario.id,
                scenario.name,
                store.path().display()
            )?;
        }
        ScenarioCommand::List => {
            for scenario in store.list() {
                writeln!(
                    out,
                    "#{:<4} {:<24} {}",
                    scenario.id,
                    scenario.name,
                    scenario.saved_at.format("%Y-%m-%d %H:%M:%S UTC")
                )?;
            }
        }
        ScenarioCommand::Show { key } => {
            let scenario = store
                .get(&key)
                .ok_or_else(|| ApiError::ScenarioNotFound(key.clone()))?;
            writeln!(out, "{}", serde_json::to_string_pretty(scenario)?)?;
        }
        ScenarioCommand::Remove { key } => {
            let removed = store.remove(&key)?;
            writeln!(out, "Removed scenario #{} {:?}", removed.id, removed.name)?;
        }
        ScenarioCommand::Compare => {
            let scenarios = store.list().into_iter().cloned().collect::<Vec<_>>();
            info!("comparing {} scenarios", scenarios.len());
            for row in compare_scenarios(&scenarios) {
                writeln!(out, "#{:<4} {:<24} {}", row.id, row.name, summary_line(&row.result))?;
            }
        }
    }
    Ok(())
}

fn require_solve_years(years: u32) -> Result<u32, ApiError> {
    if years > MAX_LIFE_EXPECTANCY {
        return Err(ApiError::InvalidInput(format!(
            "--years must be <= {MAX_LIFE_EXPECTANCY}"
        )));
    }
    Ok(years)
}

fn execute_solve(command: SolveCommand, out: &mut impl Write) -> Result<(), ApiError> {
    match command {
        SolveCommand::Contribution {
            target,
            principal,
            annual_return,
            years,
        } => {
            let years = require_solve_years(years)?;
            let response = ContributionResponse {
                required_monthly_contribution: required_monthly_contribution(
                    target,
                    principal,
                    annual_return / 100.0,
                    years,
                ),
            };
            writeln!(out, "{}", serde_json::to_string_pretty(&response)?)?;
        }
        SolveCommand::Return {
            target,
            principal,
            monthly_contribution,
            years,
            max_iterations,
        } => {
            let years = require_solve_years(years)?;
            if max_iterations == 0 {
                return Err(ApiError::InvalidInput(
                    "--max-iterations must be > 0".to_string(),
                ));
            }
            let config = ReturnSolveConfig {
                max_iterations,
                ..ReturnSolveConfig::default()
            };
            let result = solve_annual_return(target, principal, monthly_contribution, years, config);
            writeln!(out, "{}", serde_json::to_string_pretty(&result)?)?;
        }
    }
    Ok(())
}

/// Simulates each scenario independently, in parallel, preserving input order.
pub fn compare_scenarios(scenarios: &[Scenario]) -> Vec<ComparisonRow> {
    scenarios
        .par_iter()
        .map(|scenario| ComparisonRow {
            id: scenario.id,
            name: scenario.name.clone(),
            result: simulate(&scenario.inputs),
        })
        .collect()
}

fn read_payload(path: &Path) -> Result<Inputs, ApiError> {
    let raw = fs::read_to_string(path)?;
    inputs_from_json(&raw)
}

fn emit_result(
    out: &mut impl Write,
    result: &SimulationResult,
    summary: bool,
) -> Result<(), ApiError> {
    if summary {
        writeln!(out, "{}", format_summary(result))?;
    } else {
        writeln!(out, "{}", serde_json::to_string_pretty(result)?)?;
    }
    Ok(())
}

pub fn summary_line(result: &SimulationResult) -> String {
    if !result.is_valid {
        return format!("invalid: {}", result.error.as_deref().unwrap_or("unknown"));
    }
    let status = if result.is_on_track { "on track" } else { "gap" };
    let solvency = match result.solvency_age {
        Some(age) => format!("depleted at {age:.1}"),
        None => "solvent".to_string(),
    };
    format!(
        "{status:<8} income {:>10.0}/yr vs {:>10.0}/yr real, pot {:>12.0} nominal, {solvency}",
        result.projected_income_real, result.target_income_real, result.projected_nominal
    )
}

pub fn format_summary(result: &SimulationResult) -> String {
    if !result.is_valid {
        return format!("Invalid plan: {}", result.error.as_deref().unwrap_or("unknown"));
    }

    let mut text = String::new();
    let _ = writeln!(
        text,
        "Horizon: {} years to retirement, {} years in retirement at {:.2}% nominal",
        result.years_to_retirement,
        result.years_in_retirement,
        result.annual_return * 100.0
    );
    let _ = writeln!(
        text,
        "Portfolio at retirement: {:.0} nominal ({:.0} real), after tax {:.0} ({:.0} real)",
        result.projected_nominal,
        result.projected_real,
        result.after_tax_nominal,
        result.after_tax_real
    );
    let _ = writeln!(
        text,
        "Target portfolio: {:.0} nominal ({:.0} real)",
        result.target_nominal, result.target_real
    );
    let _ = writeln!(
        text,
        "Spendable income: {:.0}/yr real vs target {:.0}/yr real (gap {:+.0})",
        result.projected_income_real, result.target_income_real, result.gap_real
    );
    let _ = writeln!(
        text,
        "Status: {}",
        if result.is_on_track { "on track" } else { "shortfall" }
    );
    if !result.is_on_track {
        let _ = writeln!(
            text,
            "Required monthly contribution: {:.0}",
            result.required_monthly_contribution
        );
    }
    match result.solvency_age {
        Some(age) => {
            let _ = write!(text, "Funds run out at age {age:.1}");
        }
        None => {
            let _ = write!(text, "Funds last through life expectancy");
        }
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_cli(args: &[&str]) -> Result<String, ApiError> {
        let cli = Cli::try_parse_from(args).expect("arguments parse");
        let mut out = Vec::new();
        execute(cli, &mut out)?;
        Ok(String::from_utf8(out).expect("utf-8 output"))
    }

    #[test]
    fn simulate_command_prints_result_json() {
        let output = run_cli(&[
            "nestegg",
            "simulate",
            "--traditional-contribution",
            "1000",
            "--monthly-pension",
            "2000",
            "--target-income",
            "40000",
        ])
        .expect("runs");
        let json: serde_json::Value = serde_json::from_str(&output).expect("json output");
        assert_eq!(json["isValid"], true);
        assert_eq!(json["isOnTrack"], true);
        assert!(json["solvencyAge"].is_null());
        assert_eq!(json["yearly"].as_array().map(Vec::len), Some(56));
    }

    #[test]
    fn simulate_command_reports_invalid_age_ordering() {
        let output = run_cli(&[
            "nestegg",
            "simulate",
            "--current-age",
            "70",
            "--retirement-age",
            "65",
            "--summary",
        ])
        .expect("invalid plans are results, not errors");
        assert!(output.starts_with("Invalid plan:"));
    }

    #[test]
    fn simulate_command_rejects_bad_flags() {
        let err = run_cli(&["nestegg", "simulate", "--retirement-tax-rate", "150"])
            .expect_err("out of range");
        assert!(err.to_string().contains("--retirement-tax-rate"));
    }

    #[test]
    fn run_command_reads_payload_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("plan.json");
        fs::write(
            &path,
            r#"{ "currentAge": 60, "retirementAge": 65, "currentPortfolio": 200000,
                 "traditionalContribution": 200, "strategy": "conservative",
                 "safeWithdrawalRate": 8, "goalType": "total", "targetPortfolio": 500000 }"#,
        )
        .expect("writes payload");

        let output = run_cli(&["nestegg", "run", path.to_str().expect("utf-8 path"), "--summary"])
            .expect("runs");
        assert!(output.contains("Funds run out at age"));
    }

    #[test]
    fn scenario_commands_save_list_compare_and_remove() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = dir.path().join("store.json");
        let store = store.to_str().expect("utf-8 path");

        run_cli(&[
            "nestegg", "scenario", "--store", store, "save", "lean", "--traditional-contribution",
            "100",
        ])
        .expect("saves lean");
        run_cli(&[
            "nestegg", "scenario", "--store", store, "save", "fat", "--traditional-contribution",
            "5000",
        ])
        .expect("saves fat");

        let listing = run_cli(&["nestegg", "scenario", "--store", store, "list"]).expect("lists");
        let lines = listing.lines().collect::<Vec<_>>();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("fat"));
        assert!(lines[1].contains("lean"));

        let compared =
            run_cli(&["nestegg", "scenario", "--store", store, "compare"]).expect("compares");
        assert!(compared.lines().any(|l| l.contains("lean") && l.contains("gap")));
        assert!(compared.lines().any(|l| l.contains("fat") && l.contains("on track")));

        run_cli(&["nestegg", "scenario", "--store", store, "remove", "lean"]).expect("removes");
        let err = run_cli(&["nestegg", "scenario", "--store", store, "show", "lean"])
            .expect_err("gone");
        assert!(matches!(err, ApiError::ScenarioNotFound(_)));
    }

    #[test]
    fn compare_preserves_scenario_order() {
        let mut inputs = build_inputs(default_plan_args()).expect("defaults are valid");
        let scenarios = (0..8)
            .map(|i| {
                inputs.retirement_age = 60 + i;
                Scenario {
                    id: u64::from(i),
                    name: format!("retire-{}", 60 + i),
                    saved_at: chrono::Utc::now(),
                    inputs: inputs.clone(),
                }
            })
            .collect::<Vec<_>>();

        let rows = compare_scenarios(&scenarios);
        assert_eq!(rows.len(), 8);
        for (i, row) in rows.iter().enumerate() {
            assert_eq!(row.id, i as u64);
            assert_eq!(row.result, simulate(&scenarios[i].inputs));
        }
    }

    #[test]
    fn solve_commands_print_json() {
        let contribution = run_cli(&[
            "nestegg",
            "solve",
            "contribution",
            "--target",
            "22000",
            "--principal",
            "10000",
            "--annual-return",
            "0",
            "--years",
            "10",
        ])
        .expect("solves contribution");
        let json: serde_json::Value = serde_json::from_str(&contribution).expect("json");
        assert_eq!(json["requiredMonthlyContribution"], 100.0);

        let infeasible = run_cli(&[
            "nestegg",
            "solve",
            "return",
            "--target",
            "1e30",
            "--principal",
            "1000",
            "--years",
            "5",
        ])
        .expect("solves return");
        let json: serde_json::Value = serde_json::from_str(&infeasible).expect("json");
        assert_eq!(json["feasible"], false);
        assert!(json["solvedRate"].is_null());
    }

    #[test]
    fn solve_commands_reject_out_of_range_years() {
        let contribution = [
            "nestegg", "solve", "contribution", "--target", "1000000", "--annual-return", "5",
            "--years", "400000000",
        ];
        let ret = [
            "nestegg", "solve", "return", "--target", "1000000", "--monthly-contribution", "500",
            "--years", "400000000",
        ];
        for args in [&contribution[..], &ret[..]] {
            match run_cli(args).expect_err("horizon too long") {
                ApiError::InvalidInput(msg) => assert!(msg.contains("--years"), "{msg}"),
                other => panic!("expected invalid input, got {other:?}"),
            }
        }
    }
}
