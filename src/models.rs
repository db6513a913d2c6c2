//! Data models for the cost spike analyzer.
//!
//! This module contains the core data structures used throughout
//! the application for representing cost records, derived totals, and reports.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Ordered tuple of category labels, e.g. `(AWS Glue, us-east-1)`.
///
/// Ordering is lexicographic, position by position, which is what ranking
/// uses to break ties deterministically.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DimensionKey(pub Vec<String>);

impl DimensionKey {
    /// Builds a key from anything that yields labels.
    pub fn new<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(labels.into_iter().map(Into::into).collect())
    }

    /// Labels in order.
    pub fn labels(&self) -> &[String] {
        &self.0
    }

    /// Number of positions in the tuple.
    pub fn arity(&self) -> usize {
        self.0.len()
    }
}

impl fmt::Display for DimensionKey {
    /// `Service (region, ...)`, the way cost breakdowns are usually read.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.split_first() {
            None => write!(f, "(none)"),
            Some((head, [])) => write!(f, "{}", head),
            Some((head, rest)) => write!(f, "{} ({})", head, rest.join(", ")),
        }
    }
}

/// A single billed amount for one date and one dimension tuple.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostRecord {
    /// Start date of the billing bucket.
    pub date: NaiveDate,
    /// Category labels the amount was grouped by.
    pub dimensions: DimensionKey,
    /// Billed amount. Negative for credits and refunds.
    pub amount: Decimal,
}

impl CostRecord {
    pub fn new(date: NaiveDate, dimensions: DimensionKey, amount: Decimal) -> Self {
        Self {
            date,
            dimensions,
            amount,
        }
    }
}

/// Records as delivered by a cost source, plus every period it reported.
///
/// A period can be reported with no groups at all; it still counts as a day
/// with zero spend.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CostDataset {
    /// All records, in source order.
    pub records: Vec<CostRecord>,
    /// Start dates of every period the source reported.
    pub periods: Vec<NaiveDate>,
}

impl CostDataset {
    /// Total of every record amount.
    pub fn total(&self) -> Decimal {
        self.records.iter().map(|r| r.amount).sum()
    }
}

/// Total spend for one date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyTotal {
    pub date: NaiveDate,
    pub amount: Decimal,
}

/// Spend for one (date, dimension tuple) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContributorBreakdown {
    pub date: NaiveDate,
    pub dimensions: DimensionKey,
    pub amount: Decimal,
}

/// One ranked entry in a contributor list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contributor {
    pub dimensions: DimensionKey,
    pub amount: Decimal,
}

/// Result of a spike analysis. Pure data, no I/O.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpikeReport {
    /// Mean of the daily totals.
    pub average: Decimal,
    /// Factor applied to the average.
    pub multiplier: Decimal,
    /// `multiplier * average`. Days strictly above it are spikes.
    pub threshold: Decimal,
    /// Every day, chronological.
    pub daily_totals: Vec<DailyTotal>,
    /// Days above the threshold, chronological.
    pub spike_days: Vec<DailyTotal>,
    /// Top contributors summed over the whole window.
    pub top_contributors_overall: Vec<Contributor>,
    /// Top contributors for each spike day.
    pub top_contributors_per_spike_day: BTreeMap<NaiveDate, Vec<Contributor>>,
    /// Top contributors for every day.
    pub top_contributors_per_day: BTreeMap<NaiveDate, Vec<Contributor>>,
}

impl SpikeReport {
    /// Whether any day crossed the threshold.
    pub fn has_spikes(&self) -> bool {
        !self.spike_days.is_empty()
    }

    /// Sum of all daily totals.
    pub fn total(&self) -> Decimal {
        self.daily_totals.iter().map(|d| d.amount).sum()
    }
}

/// Metadata about an analysis run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMetadata {
    /// Label for what was analyzed (e.g. "All Services", "Glue").
    pub scope: String,
    /// Where the cost data came from.
    pub data_source: String,
    /// Date and time of the analysis.
    pub analysis_date: DateTime<Utc>,
    /// Category names of the dimension tuple.
    pub dimensions: Vec<String>,
    /// Summarization model, when one was used.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_used: Option<String>,
    /// Number of distinct days.
    pub days_analyzed: usize,
    /// Number of raw records.
    pub records_analyzed: usize,
    /// Duration of the run in seconds.
    pub duration_seconds: f64,
}

/// The complete report written to disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub metadata: ReportMetadata,
    pub spikes: SpikeReport,
    /// Generated narrative, absent when summarization was skipped or failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub narrative: Option<String>,
}
