//! Spike detection over daily cost totals.
//!
//! A day is a spike when its total is strictly greater than
//! `multiplier * average`, where the average is taken over every day
//! in the window.

use crate::analysis::aggregator::{
    checked_sum, contributor_totals, daily_totals, group_by_date, rank_contributors,
    top_contributors_by_date,
};
use crate::config::AnalysisConfig;
use crate::models::{CostDataset, CostRecord, DailyTotal, SpikeReport};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use thiserror::Error;
use tracing::debug;

/// Errors from reading or analyzing a cost dataset. Fatal to the analysis.
#[derive(Error, Debug)]
pub enum DataError {
    #[error("cost dataset contains no days")]
    EmptyDataset,
    #[error("invalid amount '{value}': {reason}")]
    InvalidAmount { value: String, reason: String },
    #[error("invalid date '{0}'")]
    InvalidDate(String),
    #[error("malformed cost data: {0}")]
    Malformed(String),
    #[error("arithmetic overflow while computing {0}")]
    Overflow(&'static str),
}

/// Parameterized spike detector.
#[derive(Debug, Clone)]
pub struct SpikeAnalyzer {
    dimensions: Vec<String>,
    multiplier: Decimal,
    top_k: usize,
}

impl Default for SpikeAnalyzer {
    fn default() -> Self {
        Self {
            dimensions: vec!["Service".to_string(), "Region".to_string()],
            multiplier: Decimal::TWO,
            top_k: 5,
        }
    }
}

impl From<&AnalysisConfig> for SpikeAnalyzer {
    fn from(config: &AnalysisConfig) -> Self {
        Self {
            dimensions: config.dimensions.clone(),
            multiplier: config.multiplier,
            top_k: config.top_k,
        }
    }
}

impl SpikeAnalyzer {
    /// Create an analyzer for the given dimension categories.
    pub fn new(dimensions: Vec<String>) -> Self {
        Self {
            dimensions,
            ..Self::default()
        }
    }

    pub fn with_multiplier(mut self, multiplier: Decimal) -> Self {
        self.multiplier = multiplier;
        self
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    /// Analyze raw records. Days are the distinct record dates.
    pub fn analyze(&self, records: &[CostRecord]) -> Result<SpikeReport, DataError> {
        self.analyze_with_periods(records, &[])
    }

    /// Analyze a dataset, counting reported periods that had no spend.
    pub fn analyze_dataset(&self, dataset: &CostDataset) -> Result<SpikeReport, DataError> {
        self.analyze_with_periods(&dataset.records, &dataset.periods)
    }

    fn analyze_with_periods(
        &self,
        records: &[CostRecord],
        periods: &[NaiveDate],
    ) -> Result<SpikeReport, DataError> {
        let grouped = group_by_date(records, &self.dimensions, periods)?;
        let totals = daily_totals(&grouped)?;

        if totals.is_empty() {
            return Err(DataError::EmptyDataset);
        }

        let days = Decimal::from(totals.len());
        let sum = totals
            .iter()
            .try_fold(Decimal::ZERO, |acc, d| checked_sum(acc, d.amount, "window total"))?;
        let average = sum
            .checked_div(days)
            .ok_or(DataError::Overflow("average"))?;
        let threshold = self
            .multiplier
            .checked_mul(average)
            .ok_or(DataError::Overflow("threshold"))?;

        // amount > multiplier * sum / days, compared without the rounded average
        let scaled_sum = self
            .multiplier
            .checked_mul(sum)
            .ok_or(DataError::Overflow("threshold"))?;
        let mut spike_days: Vec<DailyTotal> = Vec::new();
        for day in &totals {
            let scaled = day
                .amount
                .checked_mul(days)
                .ok_or(DataError::Overflow("daily total"))?;
            if scaled > scaled_sum {
                spike_days.push(*day);
            }
        }

        debug!(
            "{} days, average {}, threshold {}, {} spikes",
            totals.len(),
            average,
            threshold,
            spike_days.len()
        );

        let per_day = top_contributors_by_date(&grouped, self.top_k);
        let per_spike_day = spike_days
            .iter()
            .filter_map(|d| per_day.get(&d.date).map(|c| (d.date, c.clone())))
            .collect();

        let overall = rank_contributors(contributor_totals(&grouped)?, self.top_k);

        Ok(SpikeReport {
            average,
            multiplier: self.multiplier,
            threshold,
            daily_totals: totals,
            spike_days,
            top_contributors_overall: overall,
            top_contributors_per_spike_day: per_spike_day,
            top_contributors_per_day: per_day,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DimensionKey;
    use rust_decimal_macros::dec;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 8, d).unwrap()
    }

    fn ec2(d: u32, amount: Decimal) -> CostRecord {
        CostRecord::new(day(d), DimensionKey::new(["EC2", "us-east-1"]), amount)
    }

    #[test]
    fn test_below_threshold_is_not_a_spike() {
        let records = vec![ec2(1, dec!(100)), ec2(2, dec!(500))];
        let report = SpikeAnalyzer::default().analyze(&records).unwrap();

        assert_eq!(report.average, dec!(300));
        assert_eq!(report.threshold, dec!(600));
        assert!(report.spike_days.is_empty());
        assert!(!report.has_spikes());
    }

    #[test]
    fn test_three_day_spike() {
        let records = vec![ec2(1, dec!(100)), ec2(2, dec!(100)), ec2(3, dec!(1000))];
        let report = SpikeAnalyzer::default().analyze(&records).unwrap();

        assert_eq!(report.average, dec!(400));
        assert_eq!(report.threshold, dec!(800));
        assert_eq!(
            report.spike_days,
            vec![DailyTotal { date: day(3), amount: dec!(1000) }]
        );
        assert_eq!(report.top_contributors_per_spike_day.len(), 1);
        assert_eq!(
            report.top_contributors_per_spike_day[&day(3)][0].amount,
            dec!(1000)
        );
    }

    #[test]
    fn test_exactly_at_threshold_is_not_a_spike() {
        // average 50, threshold 100
        let records = vec![ec2(1, dec!(0)), ec2(2, dec!(100))];
        let report = SpikeAnalyzer::default().analyze(&records).unwrap();

        assert_eq!(report.threshold, dec!(100));
        assert!(report.spike_days.is_empty());
    }

    #[test]
    fn test_exact_threshold_with_repeating_average() {
        // average 1/3 is not a finite decimal; 1 == 3 * (1/3) exactly
        let records = vec![ec2(1, dec!(0)), ec2(2, dec!(0)), ec2(3, dec!(1))];
        let report = SpikeAnalyzer::default()
            .with_multiplier(dec!(3))
            .analyze(&records)
            .unwrap();

        assert!(report.spike_days.is_empty());

        let records = vec![ec2(1, dec!(0)), ec2(2, dec!(0)), ec2(3, dec!(1.01))];
        let report = SpikeAnalyzer::default()
            .with_multiplier(dec!(2.9))
            .analyze(&records)
            .unwrap();
        assert_eq!(report.spike_days.len(), 1);
    }

    #[test]
    fn test_overflowing_amounts_are_an_error() {
        let half = Decimal::MAX / Decimal::TWO + Decimal::ONE;
        let records = vec![ec2(1, half), ec2(1, half)];

        let err = SpikeAnalyzer::default().analyze(&records).unwrap_err();
        assert!(matches!(err, DataError::Overflow(_)));

        let records = vec![ec2(1, half), ec2(2, half)];
        let err = SpikeAnalyzer::default().analyze(&records).unwrap_err();
        assert!(matches!(err, DataError::Overflow(_)));
    }

    #[test]
    fn test_empty_input_is_an_error() {
        let err = SpikeAnalyzer::default().analyze(&[]).unwrap_err();
        assert!(matches!(err, DataError::EmptyDataset));
    }

    #[test]
    fn test_custom_multiplier() {
        let records = vec![ec2(1, dec!(100)), ec2(2, dec!(100)), ec2(3, dec!(160))];
        let report = SpikeAnalyzer::default()
            .with_multiplier(dec!(1.2))
            .analyze(&records)
            .unwrap();

        assert_eq!(report.threshold, dec!(1.2) * report.average);
        assert_eq!(report.spike_days.len(), 1);
        assert_eq!(report.spike_days[0].date, day(3));
    }

    #[test]
    fn test_average_counts_distinct_dates() {
        let records = vec![
            ec2(1, dec!(40)),
            CostRecord::new(day(1), DimensionKey::new(["S3", "us-east-1"]), dec!(60)),
            ec2(2, dec!(50)),
        ];
        let report = SpikeAnalyzer::default().analyze(&records).unwrap();
        assert_eq!(report.average, dec!(75));
        assert_eq!(report.daily_totals.len(), 2);
    }

    #[test]
    fn test_empty_periods_lower_the_average() {
        let dataset = CostDataset {
            records: vec![ec2(1, dec!(90))],
            periods: vec![day(1), day(2), day(3)],
        };
        let report = SpikeAnalyzer::default().analyze_dataset(&dataset).unwrap();

        assert_eq!(report.average, dec!(30));
        assert_eq!(report.spike_days.len(), 1);
        assert!(report.top_contributors_per_day[&day(2)].is_empty());
    }

    #[test]
    fn test_credits_reduce_average_and_rank_last() {
        let records = vec![
            ec2(1, dec!(100)),
            CostRecord::new(day(1), DimensionKey::new(["Credits", "global"]), dec!(-40)),
            ec2(2, dec!(100)),
        ];
        let report = SpikeAnalyzer::default().analyze(&records).unwrap();

        assert_eq!(report.average, dec!(80));
        let last = report.top_contributors_overall.last().unwrap();
        assert_eq!(last.amount, dec!(-40));
    }

    #[test]
    fn test_missing_labels_are_counted_under_sentinel() {
        let records = vec![
            CostRecord::new(day(1), DimensionKey::new(["Glue"]), dec!(3)),
            CostRecord::new(day(1), DimensionKey::new(Vec::<String>::new()), dec!(2)),
        ];
        let report = SpikeAnalyzer::default().analyze(&records).unwrap();

        assert_eq!(report.daily_totals[0].amount, dec!(5));
        let keys: Vec<String> = report
            .top_contributors_overall
            .iter()
            .map(|c| c.dimensions.to_string())
            .collect();
        assert_eq!(keys, vec!["Glue (UnknownRegion)", "UnknownService (UnknownRegion)"]);
    }

    #[test]
    fn test_rankings_are_sorted_and_truncated() {
        let records: Vec<CostRecord> = (1..=7)
            .map(|i| {
                CostRecord::new(
                    day(1),
                    DimensionKey::new([format!("svc{}", i), "us-east-1".to_string()]),
                    Decimal::from(i * 10),
                )
            })
            .collect();
        let report = SpikeAnalyzer::default()
            .with_top_k(3)
            .analyze(&records)
            .unwrap();

        let overall = &report.top_contributors_overall;
        assert_eq!(overall.len(), 3);
        assert!(overall.windows(2).all(|w| w[0].amount >= w[1].amount));
        assert_eq!(report.top_contributors_per_day[&day(1)], *overall);
    }

    #[test]
    fn test_analyze_is_idempotent() {
        let records = vec![
            ec2(1, dec!(12.5)),
            CostRecord::new(day(2), DimensionKey::new(["S3", "eu-west-1"]), dec!(7)),
            ec2(3, dec!(80)),
        ];
        let analyzer = SpikeAnalyzer::default();
        assert_eq!(
            analyzer.analyze(&records).unwrap(),
            analyzer.analyze(&records).unwrap()
        );
    }

    #[test]
    fn test_single_dimension_analyzer() {
        let analyzer = SpikeAnalyzer::new(vec!["Region".to_string()]);
        let records = vec![
            CostRecord::new(day(1), DimensionKey::new(["us-east-1"]), dec!(1)),
            CostRecord::new(day(1), DimensionKey::new([""]), dec!(2)),
        ];
        let report = analyzer.analyze(&records).unwrap();
        assert_eq!(
            report.top_contributors_overall[0].dimensions,
            DimensionKey::new(["UnknownRegion"])
        );
    }
}
