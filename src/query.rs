//! Retention query construction.
//!
//! Turns a retention policy ("older than N days") into the provider's
//! search-filter expression. Construction is a pure function of the policy
//! and the calendar date, so repeated builds within the same day produce
//! byte-identical expressions and a re-run of a failed pipeline targets the
//! same message set.

use chrono::{Days, NaiveDate};

/// Retention window: messages strictly older than `cutoff_days` are eligible.
///
/// Immutable once constructed; derived from "now minus N days" at pipeline
/// start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionPolicy {
    pub cutoff_days: u32,
}

impl RetentionPolicy {
    pub fn new(cutoff_days: u32) -> Self {
        Self { cutoff_days }
    }
}

/// Opaque provider filter expression derived from a [`RetentionPolicy`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryExpression(String);

impl QueryExpression {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for QueryExpression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Build the "strictly before this date" filter for the given policy.
///
/// The cutoff is `today - cutoff_days` by exact calendar subtraction,
/// formatted as `YYYY/MM/DD` (the provider's search date format). Only the
/// calendar date matters, so the expression is stable under repeated calls
/// within the same day regardless of time of day.
pub fn build_query(policy: &RetentionPolicy, today: NaiveDate) -> QueryExpression {
    let cutoff = today
        .checked_sub_days(Days::new(u64::from(policy.cutoff_days)))
        .unwrap_or(NaiveDate::MIN);
    QueryExpression(format!("before:{}", cutoff.format("%Y/%m/%d")))
}
