//! Retirement projection engine: month-by-month growth of traditional, Roth and
//! brokerage buckets, tax-aware drawdown, and solvency detection.
//!
//! [`core::simulate`] is the whole engine. [`api`] is a command-line caller
//! with a JSON payload format and a file-backed scenario store.

pub mod api;
pub mod core;
