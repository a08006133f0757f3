use serde::{Deserialize, Serialize};

/// Long-term capital-gains rate applied to the unrealized-gain share of the brokerage bucket.
pub const CAPITAL_GAINS_RATE: f64 = 0.15;

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", rename_all_fields = "camelCase", tag = "kind")]
pub enum GrowthStrategy {
    Conservative,
    Balanced,
    Growth,
    Aggressive,
    /// Caller-supplied nominal annual return as a decimal fraction.
    Custom { annual_rate: f64 },
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", rename_all_fields = "camelCase", tag = "type")]
pub enum Goal {
    /// Desired annual spendable income in today's money.
    Income { annual_real: f64 },
    /// Target total portfolio value at retirement in nominal money.
    TotalPortfolio { nominal_target: f64 },
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Bucket {
    Traditional,
    Roth,
    Brokerage,
}

/// Monthly contribution fields as supplied by the caller.
///
/// Either the granular per-bucket amounts or the legacy aggregate pair is
/// populated; [`ContributionInput::resolve`] turns both shapes into one
/// canonical [`BucketAmounts`].
#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ContributionInput {
    pub traditional: f64,
    pub roth: f64,
    pub brokerage: f64,
    pub legacy_total: f64,
    pub legacy_roth: f64,
}

impl ContributionInput {
    pub fn granular(traditional: f64, roth: f64, brokerage: f64) -> Self {
        Self {
            traditional,
            roth,
            brokerage,
            ..Self::default()
        }
    }

    pub fn legacy(total: f64, roth_portion: f64) -> Self {
        Self {
            legacy_total: total,
            legacy_roth: roth_portion,
            ..Self::default()
        }
    }

    pub fn resolve(&self) -> BucketAmounts {
        let granular = BucketAmounts {
            traditional: self.traditional.max(0.0),
            roth: self.roth.max(0.0),
            brokerage: self.brokerage.max(0.0),
        };
        let total = self.legacy_total.max(0.0);
        if granular.total() > 0.0 || total <= 0.0 {
            return granular;
        }

        let roth = self.legacy_roth.max(0.0).min(total);
        BucketAmounts {
            traditional: total - roth,
            roth,
            brokerage: 0.0,
        }
    }
}

/// One figure per account type.
#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BucketAmounts {
    pub traditional: f64,
    pub roth: f64,
    pub brokerage: f64,
}

impl BucketAmounts {
    pub fn total(self) -> f64 {
        self.traditional + self.roth + self.brokerage
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Inputs {
    pub current_age: u32,
    pub retirement_age: u32,
    pub life_expectancy: u32,
    /// Total current portfolio; whatever is not Roth or brokerage is traditional.
    pub current_portfolio: f64,
    pub roth_balance: f64,
    pub brokerage_balance: f64,
    pub contributions: ContributionInput,
    pub goal: Goal,
    pub strategy: GrowthStrategy,
    pub inflation_rate: f64,
    pub safe_withdrawal_rate: f64,
    pub retirement_tax_rate: f64,
    /// Estimated monthly government benefit in today's money.
    pub monthly_pension: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct YearSnapshot {
    pub year: u32,
    pub age: u32,
    pub nominal_balance: f64,
    pub real_balance: f64,
    pub traditional: f64,
    pub roth: f64,
    pub brokerage: f64,
    pub cumulative_contributions: f64,
    pub cumulative_growth: f64,
    pub cumulative_withdrawals: f64,
    pub required_nominal: f64,
    pub required_real: f64,
}

/// Exact bucket values at the retirement instant.
#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RetirementBuckets {
    pub traditional: f64,
    pub roth: f64,
    pub brokerage: f64,
    pub brokerage_cost_basis: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationResult {
    pub is_valid: bool,
    pub error: Option<String>,
    pub years_to_retirement: u32,
    pub years_in_retirement: u32,
    pub annual_return: f64,
    pub monthly_contributions: BucketAmounts,

    pub projected_nominal: f64,
    pub projected_real: f64,
    pub after_tax_nominal: f64,
    pub after_tax_real: f64,
    pub retirement_buckets: RetirementBuckets,

    pub target_nominal: f64,
    pub target_real: f64,

    pub projected_income_nominal: f64,
    pub projected_income_real: f64,
    pub target_income_nominal: f64,
    pub target_income_real: f64,

    pub is_on_track: bool,
    pub gap_nominal: f64,
    pub gap_real: f64,

    pub required_monthly_contribution: f64,
    pub required_annual_return: Option<f64>,

    pub solvency_age: Option<f64>,
    pub yearly: Vec<YearSnapshot>,
}

impl SimulationResult {
    pub fn invalid(reason: impl Into<String>) -> Self {
        Self {
            is_valid: false,
            error: Some(reason.into()),
            ..Self::default()
        }
    }
}
