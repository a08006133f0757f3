use super::types::GrowthStrategy;

pub fn resolve_annual_return(strategy: GrowthStrategy) -> f64 {
    match strategy {
        GrowthStrategy::Conservative => 0.04,
        GrowthStrategy::Balanced => 0.06,
        GrowthStrategy::Growth => 0.08,
        GrowthStrategy::Aggressive => 0.10,
        GrowthStrategy::Custom { annual_rate } => annual_rate,
    }
}

/// Deflates a nominal amount `years` from now into today's money.
pub fn adjust_future_to_real(nominal: f64, inflation: f64, years: f64) -> f64 {
    nominal / (1.0 + inflation).powf(years)
}

/// Inflates an amount in today's money to its nominal value `years` from now.
pub fn grow_real_to_nominal(real: f64, inflation: f64, years: f64) -> f64 {
    real * (1.0 + inflation).powf(years)
}
