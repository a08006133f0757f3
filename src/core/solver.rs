use serde::Serialize;

#[derive(Debug, Clone, Copy)]
pub struct ReturnSolveConfig {
    pub search_min: f64,
    pub search_max: f64,
    pub tolerance: f64,
    pub max_iterations: u32,
}

impl Default for ReturnSolveConfig {
    fn default() -> Self {
        Self {
            search_min: -0.5,
            search_max: 2.0,
            tolerance: 0.01,
            max_iterations: 200,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReturnSolveResult {
    pub solved_rate: Option<f64>,
    pub iterations: u32,
    pub converged: bool,
    pub feasible: bool,
    pub message: String,
}

/// Future value of `principal` plus a level end-of-month contribution,
/// compounded monthly at `annual_rate / 12` for `months` months.
pub fn future_value(principal: f64, monthly_contribution: f64, annual_rate: f64, months: u32) -> f64 {
    let monthly_rate = annual_rate / 12.0;
    let n = months as f64;
    if monthly_rate == 0.0 {
        return principal + monthly_contribution * n;
    }

    let growth = (1.0 + monthly_rate).powf(n);
    principal * growth + monthly_contribution * (growth - 1.0) / monthly_rate
}

/// Level monthly contribution that lifts `principal` to `target` in `years`.
/// Rounded up to the next whole currency unit.
pub fn required_monthly_contribution(target: f64, principal: f64, annual_rate: f64, years: u32) -> f64 {
    if !target.is_finite() || !principal.is_finite() || !annual_rate.is_finite() {
        return 0.0;
    }

    let months = years.saturating_mul(12);
    let principal_future = future_value(principal, 0.0, annual_rate, months);
    if principal_future >= target {
        return 0.0;
    }

    let shortfall = target - principal_future;
    if months == 0 {
        return shortfall.ceil();
    }

    let monthly_rate = annual_rate / 12.0;
    let n = months as f64;
    let payment = if monthly_rate == 0.0 {
        shortfall / n
    } else {
        shortfall * monthly_rate / ((1.0 + monthly_rate).powf(n) - 1.0)
    };

    if payment.is_finite() { payment.max(0.0).ceil() } else { 0.0 }
}

/// Annual rate at which `principal` plus `monthly_contribution` reaches `target` in `years`.
pub fn required_annual_return(
    target: f64,
    principal: f64,
    monthly_contribution: f64,
    years: u32,
) -> ReturnSolveResult {
    solve_annual_return(
        target,
        principal,
        monthly_contribution,
        years,
        ReturnSolveConfig::default(),
    )
}

pub fn solve_annual_return(
    target: f64,
    principal: f64,
    monthly_contribution: f64,
    years: u32,
    config: ReturnSolveConfig,
) -> ReturnSolveResult {
    let months = years.saturating_mul(12);
    let principal = principal.max(0.0);
    let monthly_contribution = monthly_contribution.max(0.0);
    let fv_at = |rate: f64| future_value(principal, monthly_contribution, rate, months);

    if !target.is_finite() {
        return ReturnSolveResult {
            solved_rate: None,
            iterations: 0,
            converged: false,
            feasible: false,
            message: "Target must be a finite amount.".to_string(),
        };
    }

    if fv_at(config.search_min) + config.tolerance >= target {
        return ReturnSolveResult {
            solved_rate: Some(config.search_min),
            iterations: 0,
            converged: true,
            feasible: true,
            message: "Already meets target at lower return bound.".to_string(),
        };
    }
    if fv_at(config.search_max) + config.tolerance < target {
        return ReturnSolveResult {
            solved_rate: None,
            iterations: 0,
            converged: false,
            feasible: false,
            message: "No return within the search bounds reaches the target.".to_string(),
        };
    }

    let mut lo = config.search_min;
    let mut hi = config.search_max;
    let mut it = 0;
    while it < config.max_iterations {
        it += 1;
        let mid = (lo + hi) * 0.5;
        let fv = fv_at(mid);
        if (fv - target).abs() <= config.tolerance {
            return ReturnSolveResult {
                solved_rate: Some(mid),
                iterations: it,
                converged: true,
                feasible: true,
                message: "Solved required return.".to_string(),
            };
        }

        if fv < target {
            lo = mid;
        } else {
            hi = mid;
        }
    }

    ReturnSolveResult {
        solved_rate: Some(hi),
        iterations: it,
        converged: false,
        feasible: true,
        message: "Reached max iterations before tolerance was met; returning best estimate."
            .to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::{prop_assert, proptest};

    fn assert_close(actual: f64, expected: f64, tol: f64) {
        assert!(
            (actual - expected).abs() <= tol,
            "expected {expected}, got {actual}, tolerance {tol}"
        );
    }

    #[test]
    fn future_value_matches_annuity_formula() {
        // 1.005^12 = 1.0616778118644996
        let fv = future_value(1_000.0, 100.0, 0.06, 12);
        let growth = 1.005_f64.powi(12);
        assert_close(fv, 1_000.0 * growth + 100.0 * (growth - 1.0) / 0.005, 1e-9);
        assert_close(future_value(1_000.0, 100.0, 0.0, 12), 2_200.0, 1e-12);
    }

    #[test]
    fn contribution_is_zero_when_principal_already_reaches_target() {
        assert_eq!(required_monthly_contribution(1_000.0, 2_000.0, 0.05, 10), 0.0);
        assert_eq!(required_monthly_contribution(1_000.0, 1_000.0, 0.0, 10), 0.0);
    }

    #[test]
    fn contribution_with_zero_rate_splits_shortfall_evenly() {
        // 12_000 shortfall over 120 months.
        assert_eq!(required_monthly_contribution(22_000.0, 10_000.0, 0.0, 10), 100.0);
        assert_eq!(required_monthly_contribution(22_001.0, 10_000.0, 0.0, 10), 101.0);
    }

    #[test]
    fn contribution_is_rounded_up_and_reaches_target() {
        let payment = required_monthly_contribution(500_000.0, 50_000.0, 0.06, 25);
        assert_eq!(payment, payment.ceil());
        assert!(future_value(50_000.0, payment, 0.06, 300) >= 500_000.0);
        assert!(future_value(50_000.0, payment - 1.0, 0.06, 300) < 500_000.0);
    }

    #[test]
    fn contribution_with_zero_horizon_is_the_lump_sum_shortfall() {
        assert_eq!(required_monthly_contribution(1_000.5, 500.0, 0.06, 0), 501.0);
    }

    #[test]
    fn return_solver_recovers_known_rate() {
        let target = future_value(10_000.0, 200.0, 0.07, 240);
        let result = required_annual_return(target, 10_000.0, 200.0, 20);
        assert!(result.feasible);
        assert!(result.converged);
        assert_close(result.solved_rate.expect("rate expected"), 0.07, 1e-6);
    }

    #[test]
    fn return_solver_reports_infeasible_target() {
        let result = required_annual_return(1e30, 1_000.0, 10.0, 5);
        assert!(!result.feasible);
        assert!(result.solved_rate.is_none());
    }

    #[test]
    fn return_solver_returns_lower_bound_when_already_met() {
        let result = required_annual_return(100.0, 10_000.0, 0.0, 1);
        assert!(result.feasible);
        assert_eq!(result.solved_rate, Some(ReturnSolveConfig::default().search_min));
    }

    #[test]
    fn huge_horizons_saturate_instead_of_overflowing() {
        let payment = required_monthly_contribution(1_000_000.0, 0.0, 0.05, u32::MAX);
        assert!(payment.is_finite());
        let result = required_annual_return(1_000_000.0, 1_000.0, 100.0, u32::MAX);
        assert!(result.solved_rate.is_none_or(f64::is_finite));
    }

    #[test]
    fn return_solver_with_zero_horizon_is_infeasible_when_short() {
        let result = required_annual_return(2_000.0, 1_000.0, 100.0, 0);
        assert!(!result.feasible);
    }

    proptest! {
        #[test]
        fn prop_solved_return_reproduces_target(
            principal in 0u32..500_000,
            monthly in 1u32..5_000,
            years in 1u32..40,
            rate_bp in -2_000i32..2_500
        ) {
            let rate = rate_bp as f64 / 10_000.0;
            let target = future_value(principal as f64, monthly as f64, rate, years * 12);
            let result = required_annual_return(target, principal as f64, monthly as f64, years);
            prop_assert!(result.feasible);
            let solved = result.solved_rate.unwrap_or(f64::NAN);
            let fv = future_value(principal as f64, monthly as f64, solved, years * 12);
            prop_assert!((fv - target).abs() <= 0.01 + 1e-6 * target);
        }
    }
}
