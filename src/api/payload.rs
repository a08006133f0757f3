use clap::{Args, ValueEnum};
use serde::Deserialize;

use super::ApiError;
use crate::core::{ContributionInput, Goal, GrowthStrategy, Inputs};

pub(super) const MAX_LIFE_EXPECTANCY: u32 = 130;

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum CliGoalType {
    Income,
    Total,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum CliStrategy {
    Conservative,
    Balanced,
    Growth,
    Aggressive,
    Custom,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ApiGoalType {
    Income,
    #[serde(alias = "portfolio", alias = "totalPortfolio", alias = "total_portfolio")]
    Total,
}

impl From<ApiGoalType> for CliGoalType {
    fn from(value: ApiGoalType) -> Self {
        match value {
            ApiGoalType::Income => CliGoalType::Income,
            ApiGoalType::Total => CliGoalType::Total,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ApiStrategy {
    Conservative,
    #[serde(alias = "moderate")]
    Balanced,
    Growth,
    Aggressive,
    Custom,
}

impl From<ApiStrategy> for CliStrategy {
    fn from(value: ApiStrategy) -> Self {
        match value {
            ApiStrategy::Conservative => CliStrategy::Conservative,
            ApiStrategy::Balanced => CliStrategy::Balanced,
            ApiStrategy::Growth => CliStrategy::Growth,
            ApiStrategy::Aggressive => CliStrategy::Aggressive,
            ApiStrategy::Custom => CliStrategy::Custom,
        }
    }
}

/// JSON form of the plan inputs. Every field is optional; rates are percentages.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "camelCase")]
pub struct SimulatePayload {
    #[serde(alias = "current_age")]
    pub current_age: Option<u32>,
    #[serde(alias = "retirement_age")]
    pub retirement_age: Option<u32>,
    #[serde(alias = "life_expectancy")]
    pub life_expectancy: Option<u32>,

    #[serde(alias = "current_portfolio", alias = "currentSavings")]
    pub current_portfolio: Option<f64>,
    #[serde(alias = "roth_balance")]
    pub roth_balance: Option<f64>,
    #[serde(alias = "brokerage_balance")]
    pub brokerage_balance: Option<f64>,

    #[serde(alias = "traditional_contribution")]
    pub traditional_contribution: Option<f64>,
    #[serde(alias = "roth_contribution")]
    pub roth_contribution: Option<f64>,
    #[serde(alias = "brokerage_contribution")]
    pub brokerage_contribution: Option<f64>,
    #[serde(alias = "monthly_contribution")]
    pub monthly_contribution: Option<f64>,
    #[serde(alias = "roth_portion")]
    pub roth_portion: Option<f64>,

    #[serde(alias = "goal_type")]
    pub goal_type: Option<ApiGoalType>,
    #[serde(alias = "target_income")]
    pub target_income: Option<f64>,
    #[serde(alias = "target_portfolio", alias = "targetTotal")]
    pub target_portfolio: Option<f64>,

    pub strategy: Option<ApiStrategy>,
    #[serde(alias = "custom_return")]
    pub custom_return: Option<f64>,
    #[serde(alias = "inflation_rate", alias = "inflation")]
    pub inflation_rate: Option<f64>,
    #[serde(alias = "safe_withdrawal_rate", alias = "swr")]
    pub safe_withdrawal_rate: Option<f64>,
    #[serde(alias = "retirement_tax_rate", alias = "taxRate")]
    pub retirement_tax_rate: Option<f64>,
    #[serde(alias = "monthly_pension", alias = "socialSecurity")]
    pub monthly_pension: Option<f64>,
}

#[derive(Args, Debug, Clone)]
pub struct PlanArgs {
    #[arg(long, default_value_t = 35)]
    pub current_age: u32,
    #[arg(long, default_value_t = 65)]
    pub retirement_age: u32,
    #[arg(long, default_value_t = 90)]
    pub life_expectancy: u32,
    #[arg(long, default_value_t = 50_000.0, help = "Total current portfolio across all accounts")]
    pub current_portfolio: f64,
    #[arg(long, default_value_t = 0.0, help = "Part of the current portfolio held in Roth accounts")]
    pub roth_balance: f64,
    #[arg(
        long,
        default_value_t = 0.0,
        help = "Part of the current portfolio held in taxable brokerage accounts"
    )]
    pub brokerage_balance: f64,
    #[arg(long, default_value_t = 0.0)]
    pub traditional_contribution: f64,
    #[arg(long, default_value_t = 0.0)]
    pub roth_contribution: f64,
    #[arg(long, default_value_t = 0.0)]
    pub brokerage_contribution: f64,
    #[arg(
        long,
        default_value_t = 0.0,
        help = "Aggregate monthly contribution, used when no per-account contribution is given"
    )]
    pub monthly_contribution: f64,
    #[arg(
        long,
        default_value_t = 0.0,
        help = "Roth share of --monthly-contribution, capped at the total"
    )]
    pub roth_portion: f64,
    #[arg(long, value_enum, default_value_t = CliGoalType::Income)]
    pub goal_type: CliGoalType,
    #[arg(long, default_value_t = 60_000.0, help = "Desired annual spendable income in today's money")]
    pub target_income: f64,
    #[arg(
        long,
        default_value_t = 1_000_000.0,
        help = "Target nominal portfolio at retirement when --goal-type total"
    )]
    pub target_portfolio: f64,
    #[arg(long, value_enum, default_value_t = CliStrategy::Balanced)]
    pub strategy: CliStrategy,
    #[arg(long, help = "Nominal annual return in percent when --strategy custom")]
    pub custom_return: Option<f64>,
    #[arg(long, default_value_t = 3.0, help = "Annual inflation in percent")]
    pub inflation_rate: f64,
    #[arg(long, default_value_t = 4.0, help = "Annual withdrawal rate in retirement, percent")]
    pub safe_withdrawal_rate: f64,
    #[arg(long, default_value_t = 15.0, help = "Effective ordinary income tax in retirement, percent")]
    pub retirement_tax_rate: f64,
    #[arg(long, default_value_t = 0.0, help = "Estimated monthly pension in today's money")]
    pub monthly_pension: f64,
}

pub fn default_plan_args() -> PlanArgs {
    PlanArgs {
        current_age: 35,
        retirement_age: 65,
        life_expectancy: 90,
        current_portfolio: 50_000.0,
        roth_balance: 0.0,
        brokerage_balance: 0.0,
        traditional_contribution: 0.0,
        roth_contribution: 0.0,
        brokerage_contribution: 0.0,
        monthly_contribution: 0.0,
        roth_portion: 0.0,
        goal_type: CliGoalType::Income,
        target_income: 60_000.0,
        target_portfolio: 1_000_000.0,
        strategy: CliStrategy::Balanced,
        custom_return: None,
        inflation_rate: 3.0,
        safe_withdrawal_rate: 4.0,
        retirement_tax_rate: 15.0,
        monthly_pension: 0.0,
    }
}

pub fn plan_args_from_payload(payload: SimulatePayload) -> PlanArgs {
    let mut args = default_plan_args();

    if let Some(v) = payload.current_age {
        args.current_age = v;
    }
    if let Some(v) = payload.retirement_age {
        args.retirement_age = v;
    }
    if let Some(v) = payload.life_expectancy {
        args.life_expectancy = v;
    }
    if let Some(v) = payload.current_portfolio {
        args.current_portfolio = v;
    }
    if let Some(v) = payload.roth_balance {
        args.roth_balance = v;
    }
    if let Some(v) = payload.brokerage_balance {
        args.brokerage_balance = v;
    }
    if let Some(v) = payload.traditional_contribution {
        args.traditional_contribution = v;
    }
    if let Some(v) = payload.roth_contribution {
        args.roth_contribution = v;
    }
    if let Some(v) = payload.brokerage_contribution {
        args.brokerage_contribution = v;
    }
    if let Some(v) = payload.monthly_contribution {
        args.monthly_contribution = v;
    }
    if let Some(v) = payload.roth_portion {
        args.roth_portion = v;
    }
    if let Some(v) = payload.goal_type {
        args.goal_type = v.into();
    }
    if let Some(v) = payload.target_income {
        args.target_income = v;
    }
    if let Some(v) = payload.target_portfolio {
        args.target_portfolio = v;
    }
    if let Some(v) = payload.strategy {
        args.strategy = v.into();
    }
    if payload.custom_return.is_some() {
        args.custom_return = payload.custom_return;
    }
    if let Some(v) = payload.inflation_rate {
        args.inflation_rate = v;
    }
    if let Some(v) = payload.safe_withdrawal_rate {
        args.safe_withdrawal_rate = v;
    }
    if let Some(v) = payload.retirement_tax_rate {
        args.retirement_tax_rate = v;
    }
    if let Some(v) = payload.monthly_pension {
        args.monthly_pension = v;
    }

    args
}

pub fn inputs_from_json(json: &str) -> Result<Inputs, ApiError> {
    let payload = serde_json::from_str::<SimulatePayload>(json)?;
    build_inputs(plan_args_from_payload(payload))
}

fn invalid(msg: &str) -> ApiError {
    ApiError::InvalidInput(msg.to_string())
}

fn require_non_negative(value: f64, flag: &str) -> Result<(), ApiError> {
    if !value.is_finite() || value < 0.0 {
        return Err(ApiError::InvalidInput(format!("{flag} must be a finite amount >= 0")));
    }
    Ok(())
}

fn require_percent(value: f64, flag: &str) -> Result<(), ApiError> {
    if !(0.0..=100.0).contains(&value) {
        return Err(ApiError::InvalidInput(format!("{flag} must be between 0 and 100")));
    }
    Ok(())
}

/// Checks the ranges the engine trusts and converts percentages to fractions.
///
/// Age ordering between current and retirement age is left to the engine,
/// which reports it as an invalid result.
pub fn build_inputs(args: PlanArgs) -> Result<Inputs, ApiError> {
    if args.life_expectancy < args.retirement_age {
        return Err(invalid("--life-expectancy must be >= --retirement-age"));
    }
    if args.life_expectancy > MAX_LIFE_EXPECTANCY {
        return Err(ApiError::InvalidInput(format!(
            "--life-expectancy must be <= {MAX_LIFE_EXPECTANCY}"
        )));
    }

    require_non_negative(args.current_portfolio, "--current-portfolio")?;
    require_non_negative(args.roth_balance, "--roth-balance")?;
    require_non_negative(args.brokerage_balance, "--brokerage-balance")?;
    if args.roth_balance + args.brokerage_balance > args.current_portfolio {
        return Err(invalid(
            "--roth-balance plus --brokerage-balance must not exceed --current-portfolio",
        ));
    }

    require_non_negative(args.traditional_contribution, "--traditional-contribution")?;
    require_non_negative(args.roth_contribution, "--roth-contribution")?;
    require_non_negative(args.brokerage_contribution, "--brokerage-contribution")?;
    require_non_negative(args.monthly_contribution, "--monthly-contribution")?;
    require_non_negative(args.roth_portion, "--roth-portion")?;
    require_non_negative(args.target_income, "--target-income")?;
    require_non_negative(args.target_portfolio, "--target-portfolio")?;
    require_non_negative(args.monthly_pension, "--monthly-pension")?;

    if !args.inflation_rate.is_finite() || args.inflation_rate <= -100.0 {
        return Err(invalid("--inflation-rate must be > -100"));
    }
    require_percent(args.safe_withdrawal_rate, "--safe-withdrawal-rate")?;
    require_percent(args.retirement_tax_rate, "--retirement-tax-rate")?;

    let strategy = match args.strategy {
        CliStrategy::Conservative => GrowthStrategy::Conservative,
        CliStrategy::Balanced => GrowthStrategy::Balanced,
        CliStrategy::Growth => GrowthStrategy::Growth,
        CliStrategy::Aggressive => GrowthStrategy::Aggressive,
        CliStrategy::Custom => {
            let Some(rate) = args.custom_return else {
                return Err(invalid("--custom-return is required when --strategy custom"));
            };
            if !(rate > -100.0 && rate < 1_000.0) {
                return Err(invalid("--custom-return must be > -100 and < 1000"));
            }
            GrowthStrategy::Custom {
                annual_rate: rate / 100.0,
            }
        }
    };

    let goal = match args.goal_type {
        CliGoalType::Income => Goal::Income {
            annual_real: args.target_income,
        },
        CliGoalType::Total => Goal::TotalPortfolio {
            nominal_target: args.target_portfolio,
        },
    };

    Ok(Inputs {
        current_age: args.current_age,
        retirement_age: args.retirement_age,
        life_expectancy: args.life_expectancy,
        current_portfolio: args.current_portfolio,
        roth_balance: args.roth_balance,
        brokerage_balance: args.brokerage_balance,
        contributions: ContributionInput {
            traditional: args.traditional_contribution,
            roth: args.roth_contribution,
            brokerage: args.brokerage_contribution,
            legacy_total: args.monthly_contribution,
            legacy_roth: args.roth_portion,
        },
        goal,
        strategy,
        inflation_rate: args.inflation_rate / 100.0,
        safe_withdrawal_rate: args.safe_withdrawal_rate / 100.0,
        retirement_tax_rate: args.retirement_tax_rate / 100.0,
        monthly_pension: args.monthly_pension,
    })
}
