mod engine;
mod rates;
mod solver;
mod types;

pub use engine::{WITHDRAWAL_ORDER, simulate};
pub use rates::{adjust_future_to_real, grow_real_to_nominal, resolve_annual_return};
pub use solver::{
    ReturnSolveConfig, ReturnSolveResult, future_value, required_annual_return,
    required_monthly_contribution, solve_annual_return,
};
pub use types::{
    Bucket, BucketAmounts, CAPITAL_GAINS_RATE, ContributionInput, Goal, GrowthStrategy, Inputs,
    RetirementBuckets, SimulationResult, YearSnapshot,
};
