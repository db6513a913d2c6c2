//! Cost Explorer `get-cost-and-usage` documents.
//!
//! Parses the JSON document into a [`CostDataset`] and builds the AWS CLI
//! arguments that download one.

use crate::analysis::DataError;
use crate::config::SourceConfig;
use crate::models::{CostDataset, CostRecord, DimensionKey};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;
use std::str::FromStr;
use tracing::debug;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CostAndUsageDocument {
    #[serde(default)]
    results_by_time: Vec<ResultByTime>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ResultByTime {
    time_period: TimePeriod,
    #[serde(default)]
    groups: Vec<Group>,
    #[serde(default)]
    total: HashMap<String, MetricValue>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct TimePeriod {
    start: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Group {
    #[serde(default)]
    keys: Vec<String>,
    #[serde(default)]
    metrics: HashMap<String, MetricValue>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct MetricValue {
    amount: String,
}

/// Parse a decimal amount as Cost Explorer prints it.
///
/// Tiny amounts sometimes come back in scientific notation (`1.2E-7`).
pub fn parse_amount(value: &str) -> Result<Decimal, DataError> {
    let trimmed = value.trim();
    Decimal::from_str(trimmed)
        .or_else(|_| Decimal::from_scientific(trimmed))
        .map_err(|e| DataError::InvalidAmount {
            value: value.to_string(),
            reason: e.to_string(),
        })
}

fn parse_date(value: &str) -> Result<NaiveDate, DataError> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|_| DataError::InvalidDate(value.to_string()))
}

/// Parse a `get-cost-and-usage` document, reading `metric` from each group.
///
/// Every reported period is kept, even one without groups. A period without
/// groups but with a non-zero total becomes a single record with an empty
/// key, which the analyzer labels as unknown.
pub fn parse_cost_document(json: &str, metric: &str) -> Result<CostDataset, DataError> {
    let document: CostAndUsageDocument =
        serde_json::from_str(json).map_err(|e| DataError::Malformed(e.to_string()))?;

    let mut dataset = CostDataset::default();

    for period in document.results_by_time {
        let date = parse_date(&period.time_period.start)?;
        dataset.periods.push(date);

        if period.groups.is_empty() {
            if let Some(total) = period.total.get(metric) {
                let amount = parse_amount(&total.amount)?;
                if !amount.is_zero() {
                    dataset
                        .records
                        .push(CostRecord::new(date, DimensionKey::default(), amount));
                }
            }
            continue;
        }

        for group in period.groups {
            let value = group.metrics.get(metric).ok_or_else(|| {
                DataError::Malformed(format!(
                    "group {:?} on {} has no '{}' metric",
                    group.keys, date, metric
                ))
            })?;
            let amount = parse_amount(&value.amount)?;
            dataset
                .records
                .push(CostRecord::new(date, DimensionKey(group.keys), amount));
        }
    }

    debug!(
        "Parsed {} records over {} periods",
        dataset.records.len(),
        dataset.periods.len()
    );

    Ok(dataset)
}

/// Arguments for `aws ce get-cost-and-usage` built from the source settings.
pub fn cost_explorer_args(config: &SourceConfig) -> Vec<String> {
    let mut args = vec![
        "ce".to_string(),
        "get-cost-and-usage".to_string(),
        "--time-period".to_string(),
        format!("Start={},End={}", config.start, config.end),
        "--granularity".to_string(),
        config.granularity.clone(),
        "--metrics".to_string(),
        config.metric.clone(),
    ];

    for key in &config.group_by {
        args.push("--group-by".to_string());
        args.push(format!("Type=DIMENSION,Key={}", key));
    }

    if let Some(ref service) = config.service_filter {
        let filter = serde_json::json!({
            "Dimensions": { "Key": "SERVICE", "Values": [service] }
        });
        args.push("--filter".to_string());
        args.push(filter.to_string());
    }

    args.push("--output".to_string());
    args.push("json".to_string());
    args
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    const SAMPLE: &str = include_str!("../../fixtures/cost_and_usage.json");

    #[test]
    fn test_parse_fixture() {
        let dataset = parse_cost_document(SAMPLE, "UnblendedCost").unwrap();

        assert_eq!(dataset.periods.len(), 4);
        assert_eq!(
            dataset.periods[0],
            NaiveDate::from_ymd_opt(2025, 8, 1).unwrap()
        );
        // 2025-08-03 reports no groups and no total
        assert!(dataset
            .records
            .iter()
            .all(|r| r.date != NaiveDate::from_ymd_opt(2025, 8, 3).unwrap()));
        assert!(dataset
            .records
            .iter()
            .any(|r| r.dimensions == DimensionKey::new(["AWS Glue", "us-east-1"])));
    }

    #[test]
    fn test_parse_amount_formats() {
        assert_eq!(parse_amount("12.3400000000").unwrap(), dec!(12.34));
        assert_eq!(parse_amount("-0.5").unwrap(), dec!(-0.5));
        assert_eq!(parse_amount("1.5E-3").unwrap(), dec!(0.0015));
        assert!(matches!(
            parse_amount("n/a"),
            Err(DataError::InvalidAmount { .. })
        ));
    }

    #[test]
    fn test_missing_metric_is_malformed() {
        let json = r#"{"ResultsByTime":[{"TimePeriod":{"Start":"2025-08-01","End":"2025-08-02"},
            "Groups":[{"Keys":["EC2"],"Metrics":{"BlendedCost":{"Amount":"1","Unit":"USD"}}}]}]}"#;
        let err = parse_cost_document(json, "UnblendedCost").unwrap_err();
        assert!(matches!(err, DataError::Malformed(_)));
    }

    #[test]
    fn test_ungrouped_total_becomes_unkeyed_record() {
        let json = r#"{"ResultsByTime":[{"TimePeriod":{"Start":"2025-08-01","End":"2025-08-02"},
            "Total":{"UnblendedCost":{"Amount":"4.20","Unit":"USD"}},"Groups":[]}]}"#;
        let dataset = parse_cost_document(json, "UnblendedCost").unwrap();
        assert_eq!(dataset.records.len(), 1);
        assert_eq!(dataset.records[0].dimensions.arity(), 0);
        assert_eq!(dataset.records[0].amount, dec!(4.20));
    }

    #[test]
    fn test_bad_date_is_rejected() {
        let json = r#"{"ResultsByTime":[{"TimePeriod":{"Start":"08/01/2025"},"Groups":[]}]}"#;
        assert!(matches!(
            parse_cost_document(json, "UnblendedCost"),
            Err(DataError::InvalidDate(_))
        ));
    }

    #[test]
    fn test_cost_explorer_args() {
        let mut config = SourceConfig::default();
        config.group_by = vec!["REGION".to_string()];
        config.service_filter = Some("AWS Glue".to_string());

        let args = cost_explorer_args(&config);
        assert_eq!(&args[..2], &["ce", "get-cost-and-usage"]);
        assert!(args.contains(&"Start=2025-08-01,End=2025-09-01".to_string()));
        assert!(args.contains(&"Type=DIMENSION,Key=REGION".to_string()));
        let filter_pos = args.iter().position(|a| a == "--filter").unwrap();
        assert!(args[filter_pos + 1].contains("AWS Glue"));
    }
}
