use log::{debug, warn};

use super::rates::{adjust_future_to_real, grow_real_to_nominal, resolve_annual_return};
use super::solver::{required_annual_return, required_monthly_contribution};
use super::types::{
    Bucket, BucketAmounts, CAPITAL_GAINS_RATE, Goal, Inputs, RetirementBuckets,
    SimulationResult, YearSnapshot,
};

/// Drawdown consumes tax-deferred money first and tax-free money last.
pub const WITHDRAWAL_ORDER: [Bucket; 3] = [Bucket::Traditional, Bucket::Brokerage, Bucket::Roth];

const ON_TRACK_TOLERANCE: f64 = 100.0;
const SOLVENCY_TOLERANCE: f64 = 1.0;
// Floors for grossing the income gap up into a required portfolio.
const MIN_NET_FACTOR: f64 = 0.01;
const MIN_WITHDRAWAL_RATE: f64 = 0.001;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct Portfolio {
    traditional: f64,
    roth: f64,
    brokerage: f64,
    brokerage_basis: f64,
}

impl Portfolio {
    fn from_inputs(inputs: &Inputs) -> Self {
        let total = inputs.current_portfolio.max(0.0);
        let roth = inputs.roth_balance.max(0.0).min(total);
        let brokerage = inputs.brokerage_balance.max(0.0).min(total - roth);
        Self {
            traditional: total - roth - brokerage,
            roth,
            brokerage,
            brokerage_basis: brokerage,
        }
    }

    fn total(&self) -> f64 {
        self.traditional + self.roth + self.brokerage
    }

    fn brokerage_gain_ratio(&self) -> f64 {
        if self.brokerage <= 0.0 {
            return 0.0;
        }
        ((self.brokerage - self.brokerage_basis) / self.brokerage).clamp(0.0, 1.0)
    }
}

/// Everything resolved once from the inputs before the monthly loop runs.
#[derive(Debug, Clone, Copy)]
struct Plan {
    years_to_retirement: u32,
    years_in_retirement: u32,
    annual_return: f64,
    monthly_rate: f64,
    contributions: BucketAmounts,
    target_income_real: f64,
    target_portfolio_nominal: f64,
    monthly_gap_real: f64,
}

impl Plan {
    fn resolve(inputs: &Inputs) -> Self {
        let years_to_retirement = inputs.retirement_age - inputs.current_age;
        let years_in_retirement = inputs.life_expectancy.saturating_sub(inputs.retirement_age);
        let annual_return = resolve_annual_return(inputs.strategy);
        let horizon = years_to_retirement as f64;
        let annual_pension_real = inputs.monthly_pension.max(0.0) * 12.0;
        let tax_rate = inputs.retirement_tax_rate.clamp(0.0, 1.0);

        let target_income_real = match inputs.goal {
            Goal::Income { annual_real } => annual_real.max(0.0),
            Goal::TotalPortfolio { nominal_target } => {
                let portfolio_real =
                    adjust_future_to_real(nominal_target.max(0.0), inputs.inflation_rate, horizon);
                let gross_income = portfolio_real * inputs.safe_withdrawal_rate.max(0.0);
                gross_income * (1.0 - tax_rate) + annual_pension_real
            }
        };

        let annual_gap_real = (target_income_real - annual_pension_real).max(0.0);
        let target_portfolio_nominal = match inputs.goal {
            Goal::Income { .. } => {
                let gross_income = annual_gap_real / (1.0 - tax_rate).max(MIN_NET_FACTOR);
                let portfolio_real =
                    gross_income / inputs.safe_withdrawal_rate.max(MIN_WITHDRAWAL_RATE);
                grow_real_to_nominal(portfolio_real, inputs.inflation_rate, horizon)
            }
            Goal::TotalPortfolio { nominal_target } => nominal_target.max(0.0),
        };

        Self {
            years_to_retirement,
            years_in_retirement,
            annual_return,
            monthly_rate: annual_return / 12.0,
            contributions: inputs.contributions.resolve(),
            target_income_real,
            target_portfolio_nominal,
            monthly_gap_real: annual_gap_real / 12.0,
        }
    }

    fn retirement_month(&self) -> u32 {
        self.years_to_retirement.saturating_mul(12)
    }

    fn total_months(&self) -> u32 {
        self.years_to_retirement
            .saturating_add(self.years_in_retirement)
            .saturating_mul(12)
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct RunningTotals {
    contributions: f64,
    growth: f64,
    withdrawals: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct WithdrawalOutcome {
    gross_withdrawn: f64,
    net_received: f64,
    shortfall: f64,
}

#[derive(Debug)]
struct ProjectionTrace {
    yearly: Vec<YearSnapshot>,
    solvency_age: Option<f64>,
}

/// Projects the portfolio month by month from today to life expectancy.
pub fn simulate(inputs: &Inputs) -> SimulationResult {
    if inputs.retirement_age < inputs.current_age {
        warn!(
            "rejecting simulation: retirement age {} is before current age {}",
            inputs.retirement_age, inputs.current_age
        );
        return SimulationResult::invalid("Retirement age must not be before current age.");
    }

    let plan = Plan::resolve(inputs);
    debug!(
        "simulating {} accumulation and {} retirement years at {:.4} nominal; target income {:.2} real",
        plan.years_to_retirement,
        plan.years_in_retirement,
        plan.annual_return,
        plan.target_income_real
    );

    let trace = run_projection(inputs, &plan);
    let at_retirement = accumulate_to_retirement(inputs, &plan);
    compose_result(inputs, &plan, at_retirement, trace)
}

fn run_projection(inputs: &Inputs, plan: &Plan) -> ProjectionTrace {
    let mut portfolio = Portfolio::from_inputs(inputs);
    let mut totals = RunningTotals {
        contributions: portfolio.total(),
        ..RunningTotals::default()
    };
    let retirement_month = plan.retirement_month();
    let total_months = plan.total_months();
    let mut yearly = Vec::with_capacity((total_months / 12 + 1) as usize);
    let mut solvency_age = None;

    for month in 0..=total_months {
        if month % 12 == 0 {
            yearly.push(year_snapshot(inputs, plan, month / 12, &portfolio, &totals));
        }
        if month == total_months {
            break;
        }

        totals.growth += apply_monthly_growth(&mut portfolio, plan.monthly_rate);
        if month < retirement_month {
            totals.contributions += apply_monthly_contributions(&mut portfolio, plan.contributions);
            continue;
        }

        let need = monthly_spending_need(inputs, plan, month);
        let outcome = withdraw_for_net(&mut portfolio, need, inputs.retirement_tax_rate);
        totals.withdrawals += outcome.gross_withdrawn;

        if outcome.shortfall > SOLVENCY_TOLERANCE && solvency_age.is_none() {
            let age = inputs.current_age as f64 + month as f64 / 12.0;
            warn!(
                "portfolio depleted at age {age:.2}: {:.2} of {need:.2} monthly need unmet",
                outcome.shortfall
            );
            solvency_age = Some(age);
        }
    }

    ProjectionTrace {
        yearly,
        solvency_age,
    }
}

fn accumulate_to_retirement(inputs: &Inputs, plan: &Plan) -> Portfolio {
    let mut portfolio = Portfolio::from_inputs(inputs);
    for _ in 0..plan.retirement_month() {
        apply_monthly_growth(&mut portfolio, plan.monthly_rate);
        apply_monthly_contributions(&mut portfolio, plan.contributions);
    }
    portfolio
}

fn year_snapshot(
    inputs: &Inputs,
    plan: &Plan,
    year: u32,
    portfolio: &Portfolio,
    totals: &RunningTotals,
) -> YearSnapshot {
    let years = year as f64;
    let nominal = portfolio.total();
    YearSnapshot {
        year,
        age: inputs.current_age + year,
        nominal_balance: nominal.round(),
        real_balance: adjust_future_to_real(nominal, inputs.inflation_rate, years).round(),
        traditional: portfolio.traditional.round(),
        roth: portfolio.roth.round(),
        brokerage: portfolio.brokerage.round(),
        cumulative_contributions: totals.contributions.round(),
        cumulative_growth: totals.growth.round(),
        cumulative_withdrawals: totals.withdrawals.round(),
        required_nominal: plan.target_portfolio_nominal.round(),
        required_real: adjust_future_to_real(
            plan.target_portfolio_nominal,
            inputs.inflation_rate,
            years,
        )
        .round(),
    }
}

fn apply_monthly_growth(portfolio: &mut Portfolio, monthly_rate: f64) -> f64 {
    let before = portfolio.total();
    portfolio.traditional = (portfolio.traditional * (1.0 + monthly_rate)).max(0.0);
    portfolio.roth = (portfolio.roth * (1.0 + monthly_rate)).max(0.0);
    portfolio.brokerage = (portfolio.brokerage * (1.0 + monthly_rate)).max(0.0);
    portfolio.total() - before
}

fn apply_monthly_contributions(portfolio: &mut Portfolio, flows: BucketAmounts) -> f64 {
    portfolio.traditional += flows.traditional;
    portfolio.roth += flows.roth;
    portfolio.brokerage += flows.brokerage;
    portfolio.brokerage_basis += flows.brokerage;
    flows.total()
}

fn monthly_spending_need(inputs: &Inputs, plan: &Plan, month: u32) -> f64 {
    grow_real_to_nominal(plan.monthly_gap_real, inputs.inflation_rate, month as f64 / 12.0)
}

fn withdraw_for_net(portfolio: &mut Portfolio, target_net: f64, tax_rate: f64) -> WithdrawalOutcome {
    let mut outcome = WithdrawalOutcome {
        shortfall: target_net.max(0.0),
        ..WithdrawalOutcome::default()
    };

    for bucket in WITHDRAWAL_ORDER {
        if outcome.shortfall <= 0.0 {
            break;
        }
        let (gross, net) = match bucket {
            Bucket::Traditional => {
                withdraw_from_traditional(&mut portfolio.traditional, outcome.shortfall, tax_rate)
            }
            Bucket::Brokerage => withdraw_from_brokerage(
                &mut portfolio.brokerage,
                &mut portfolio.brokerage_basis,
                outcome.shortfall,
                CAPITAL_GAINS_RATE,
            ),
            Bucket::Roth => {
                let taken = outcome.shortfall.min(portfolio.roth);
                portfolio.roth -= taken;
                (taken, taken)
            }
        };
        outcome.gross_withdrawn += gross;
        outcome.net_received += net;
        outcome.shortfall = (outcome.shortfall - net).max(0.0);
    }

    outcome
}

fn withdraw_from_traditional(balance: &mut f64, target_net: f64, tax_rate: f64) -> (f64, f64) {
    let net_factor = 1.0 - tax_rate.clamp(0.0, 1.0);
    if target_net <= 0.0 || *balance <= 0.0 || net_factor <= 0.0 {
        return (0.0, 0.0);
    }

    let gross = (target_net / net_factor).min(*balance);
    *balance -= gross;
    (gross, gross * net_factor)
}

fn withdraw_from_brokerage(
    balance: &mut f64,
    basis: &mut f64,
    target_net: f64,
    cgt_rate: f64,
) -> (f64, f64) {
    if target_net <= 0.0 || *balance <= 0.0 {
        return (0.0, 0.0);
    }

    let value_before = *balance;
    let gain_ratio = ((value_before - *basis) / value_before).clamp(0.0, 1.0);
    let net_factor = 1.0 - gain_ratio * cgt_rate.clamp(0.0, 1.0);
    let gross = (target_net / net_factor).min(value_before);

    let basis_portion = (*basis * (gross / value_before)).min(*basis);
    *balance -= gross;
    *basis = (*basis - basis_portion).max(0.0);
    (gross, gross * net_factor)
}

fn liquidation_value(portfolio: &Portfolio, tax_rate: f64) -> f64 {
    let unrealized_gain = (portfolio.brokerage - portfolio.brokerage_basis).max(0.0);
    portfolio.roth
        + portfolio.traditional * (1.0 - tax_rate.clamp(0.0, 1.0))
        + portfolio.brokerage
        - unrealized_gain * CAPITAL_GAINS_RATE
}

fn sustainable_net_income(portfolio: &Portfolio, withdrawal_rate: f64, tax_rate: f64) -> f64 {
    let rate = withdrawal_rate.max(0.0);
    let brokerage_net_factor = 1.0 - portfolio.brokerage_gain_ratio() * CAPITAL_GAINS_RATE;
    portfolio.traditional * rate * (1.0 - tax_rate.clamp(0.0, 1.0))
        + portfolio.brokerage * rate * brokerage_net_factor
        + portfolio.roth * rate
}

fn compose_result(
    inputs: &Inputs,
    plan: &Plan,
    at_retirement: Portfolio,
    trace: ProjectionTrace,
) -> SimulationResult {
    let horizon = plan.years_to_retirement as f64;
    let inflation = inputs.inflation_rate;
    let to_real = |nominal: f64| adjust_future_to_real(nominal, inflation, horizon);

    let projected_nominal = at_retirement.total();
    let after_tax_nominal = liquidation_value(&at_retirement, inputs.retirement_tax_rate);

    let pension_nominal = grow_real_to_nominal(
        inputs.monthly_pension.max(0.0) * 12.0,
        inflation,
        horizon,
    );
    let projected_income_nominal = sustainable_net_income(
        &at_retirement,
        inputs.safe_withdrawal_rate,
        inputs.retirement_tax_rate,
    ) + pension_nominal;
    let projected_income_real = to_real(projected_income_nominal);
    let target_income_nominal = grow_real_to_nominal(plan.target_income_real, inflation, horizon);

    let current_total = Portfolio::from_inputs(inputs).total();
    let required_contribution = required_monthly_contribution(
        plan.target_portfolio_nominal,
        current_total,
        plan.annual_return,
        plan.years_to_retirement,
    );
    let required_return = required_annual_return(
        plan.target_portfolio_nominal,
        current_total,
        plan.contributions.total(),
        plan.years_to_retirement,
    );

    SimulationResult {
        is_valid: true,
        error: None,
        years_to_retirement: plan.years_to_retirement,
        years_in_retirement: plan.years_in_retirement,
        annual_return: plan.annual_return,
        monthly_contributions: plan.contributions,
        projected_nominal,
        projected_real: to_real(projected_nominal),
        after_tax_nominal,
        after_tax_real: to_real(after_tax_nominal),
        retirement_buckets: RetirementBuckets {
            traditional: at_retirement.traditional,
            roth: at_retirement.roth,
            brokerage: at_retirement.brokerage,
            brokerage_cost_basis: at_retirement.brokerage_basis,
        },
        target_nominal: plan.target_portfolio_nominal,
        target_real: to_real(plan.target_portfolio_nominal),
        projected_income_nominal,
        projected_income_real,
        target_income_nominal,
        target_income_real: plan.target_income_real,
        is_on_track: projected_income_real > plan.target_income_real - ON_TRACK_TOLERANCE,
        gap_nominal: projected_income_nominal - target_income_nominal,
        gap_real: projected_income_real - plan.target_income_real,
        required_monthly_contribution: required_contribution,
        required_annual_return: required_return.solved_rate,
        solvency_age: trace.solvency_age,
        yearly: trace.yearly,
    }
}
