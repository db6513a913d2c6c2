//! Text, Markdown, and JSON rendering of spike analyses.

use crate::models::{AnalysisReport, Contributor, ReportMetadata, SpikeReport};
use anyhow::Result;
use rust_decimal::Decimal;

fn money(amount: Decimal) -> String {
    format!("${:.2}", amount)
}

/// Concise plain-text summary used as the first chat notification.
///
/// Lists at most `sample_days` spike days.
pub fn summary_text(report: &SpikeReport, scope: &str, sample_days: usize) -> String {
    let mut lines = Vec::new();

    lines.push(format!(
        "{} - Average daily cost: {}",
        scope,
        money(report.average)
    ));
    lines.push(format!(
        "{} - Spike threshold ({}x average): {}",
        scope,
        report.multiplier.normalize(),
        money(report.threshold)
    ));

    if report.has_spikes() {
        lines.push(format!(
            "Cost spikes detected: {} days.",
            report.spike_days.len()
        ));
        for day in report.spike_days.iter().take(sample_days) {
            lines.push(format!("{}: {}", day.date, money(day.amount)));
        }
    } else {
        lines.push("No cost spikes detected.".to_string());
    }

    lines.push(format!(
        "Top {} contributors by total cost:",
        report.top_contributors_overall.len()
    ));
    for contributor in &report.top_contributors_overall {
        lines.push(format!(
            "{}: {}",
            contributor.dimensions,
            money(contributor.amount)
        ));
    }

    lines.join("\n")
}

/// Chat message carrying the summary text.
pub fn summary_message(scope: &str, summary: &str) -> String {
    format!("**{} Cost Analysis Report (Summary):**\n\n{}", scope, summary)
}

/// Chat message carrying the generated narrative.
pub fn narrative_message(scope: &str, narrative: &str) -> String {
    format!("**{} Cost Analysis LLM Observations:**\n\n{}", scope, narrative.trim())
}

/// Generate a complete Markdown report.
pub fn generate_markdown_report(report: &AnalysisReport) -> String {
    let mut output = String::new();

    output.push_str(&format!("# Cost Spike Report: {}\n\n", report.metadata.scope));
    output.push_str(&generate_metadata_section(&report.metadata));
    output.push_str(&generate_summary_section(&report.spikes));
    output.push_str(&generate_spikes_section(&report.spikes));
    output.push_str(&generate_overall_section(&report.spikes));
    output.push_str(&generate_daily_section(&report.spikes));

    if let Some(ref narrative) = report.narrative {
        output.push_str("## Narrative\n\n");
        output.push_str(narrative.trim());
        output.push_str("\n\n");
    }

    output.push_str("---\n\n*Report generated by SpikeWatch*\n");

    output
}

fn generate_metadata_section(metadata: &ReportMetadata) -> String {
    let mut section = String::new();

    section.push_str("## Metadata\n\n");
    section.push_str(&format!("- **Scope:** {}\n", metadata.scope));
    section.push_str(&format!("- **Data Source:** {}\n", metadata.data_source));
    section.push_str(&format!(
        "- **Analysis Date:** {}\n",
        metadata.analysis_date.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    section.push_str(&format!(
        "- **Dimensions:** {}\n",
        metadata.dimensions.join(", ")
    ));
    if let Some(ref model) = metadata.model_used {
        section.push_str(&format!("- **Model Used:** `{}`\n", model));
    }
    section.push_str(&format!("- **Days Analyzed:** {}\n", metadata.days_analyzed));
    section.push_str(&format!(
        "- **Records Analyzed:** {}\n",
        metadata.records_analyzed
    ));
    section.push_str(&format!(
        "- **Analysis Duration:** {:.1}s\n\n",
        metadata.duration_seconds
    ));

    section
}

fn generate_summary_section(spikes: &SpikeReport) -> String {
    let mut section = String::new();

    section.push_str("## Summary\n\n");
    section.push_str("| Total | Daily Average | Threshold | Spike Days |\n");
    section.push_str("|:---:|:---:|:---:|:---:|\n");
    section.push_str(&format!(
        "| {} | {} | {} ({}x) | **{}** |\n\n",
        money(spikes.total()),
        money(spikes.average),
        money(spikes.threshold),
        spikes.multiplier.normalize(),
        spikes.spike_days.len()
    ));

    section
}

fn contributor_table(contributors: &[Contributor]) -> String {
    let mut table = String::new();

    table.push_str("| # | Contributor | Amount |\n");
    table.push_str("|:---:|:---|---:|\n");
    for (i, c) in contributors.iter().enumerate() {
        table.push_str(&format!("| {} | {} | {} |\n", i + 1, c.dimensions, money(c.amount)));
    }
    table.push('\n');

    table
}

fn generate_spikes_section(spikes: &SpikeReport) -> String {
    let mut section = String::new();

    section.push_str("## Spike Days\n\n");

    if !spikes.has_spikes() {
        section.push_str("No day exceeded the threshold.\n\n");
        return section;
    }

    for day in &spikes.spike_days {
        section.push_str(&format!("### {}: {}\n\n", day.date, money(day.amount)));
        match spikes.top_contributors_per_spike_day.get(&day.date) {
            Some(contributors) if !contributors.is_empty() => {
                section.push_str(&contributor_table(contributors));
            }
            _ => section.push_str("*No contributor breakdown.*\n\n"),
        }
    }

    section
}

fn generate_overall_section(spikes: &SpikeReport) -> String {
    let mut section = String::new();

    section.push_str("## Top Contributors Overall\n\n");
    if spikes.top_contributors_overall.is_empty() {
        section.push_str("*No contributors.*\n\n");
    } else {
        section.push_str(&contributor_table(&spikes.top_contributors_overall));
    }

    section
}

fn generate_daily_section(spikes: &SpikeReport) -> String {
    let mut section = String::new();

    section.push_str("## Daily Totals\n\n");
    section.push_str("| Date | Total | Top Contributors |\n");
    section.push_str("|:---|---:|:---|\n");

    for day in &spikes.daily_totals {
        let is_spike = spikes.spike_days.iter().any(|s| s.date == day.date);
        let marker = if is_spike { " 🔺" } else { "" };
        let top = spikes
            .top_contributors_per_day
            .get(&day.date)
            .map(|contributors| {
                contributors
                    .iter()
                    .map(|c| format!("{} {}", c.dimensions, money(c.amount)))
                    .collect::<Vec<_>>()
                    .join("; ")
            })
            .unwrap_or_default();
        section.push_str(&format!(
            "| {}{} | {} | {} |\n",
            day.date,
            marker,
            money(day.amount),
            top
        ));
    }
    section.push('\n');

    section
}

/// Generate a JSON report.
pub fn generate_json_report(report: &AnalysisReport) -> Result<String> {
    serde_json::to_string_pretty(report).map_err(Into::into)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DailyTotal, DimensionKey};
    use chrono::{NaiveDate, Utc};
    use rust_decimal_macros::dec;
    use std::collections::BTreeMap;

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 8, day).unwrap()
    }

    fn contributor(service: &str, region: &str, amount: Decimal) -> Contributor {
        Contributor {
            dimensions: DimensionKey::new([service, region]),
            amount,
        }
    }

    fn create_test_spikes() -> SpikeReport {
        let daily_totals = vec![
            DailyTotal { date: date(1), amount: dec!(100) },
            DailyTotal { date: date(2), amount: dec!(100) },
            DailyTotal { date: date(3), amount: dec!(1000) },
        ];
        let day3 = vec![
            contributor("AWS Glue", "us-east-1", dec!(900)),
            contributor("Amazon EC2", "us-east-1", dec!(100)),
        ];
        let mut per_day = BTreeMap::new();
        per_day.insert(date(1), vec![contributor("Amazon EC2", "us-east-1", dec!(100))]);
        per_day.insert(date(2), vec![contributor("Amazon EC2", "us-east-1", dec!(100))]);
        per_day.insert(date(3), day3.clone());

        SpikeReport {
            average: dec!(400),
            multiplier: dec!(2),
            threshold: dec!(800),
            spike_days: vec![daily_totals[2]],
            daily_totals,
            top_contributors_overall: vec![
                contributor("AWS Glue", "us-east-1", dec!(900)),
                contributor("Amazon EC2", "us-east-1", dec!(300)),
            ],
            top_contributors_per_spike_day: [(date(3), day3)].into_iter().collect(),
            top_contributors_per_day: per_day,
        }
    }

    fn create_test_report(narrative: Option<&str>) -> AnalysisReport {
        AnalysisReport {
            metadata: ReportMetadata {
                scope: "All Services".to_string(),
                data_source: "cost_and_usage.json".to_string(),
                analysis_date: Utc::now(),
                dimensions: vec!["Service".to_string(), "Region".to_string()],
                model_used: Some("mistral".to_string()),
                days_analyzed: 3,
                records_analyzed: 4,
                duration_seconds: 1.5,
            },
            spikes: create_test_spikes(),
            narrative: narrative.map(String::from),
        }
    }

    #[test]
    fn test_summary_text_with_spikes() {
        let text = summary_text(&create_test_spikes(), "All Services", 3);

        assert!(text.contains("All Services - Average daily cost: $400.00"));
        assert!(text.contains("Spike threshold (2x average): $800.00"));
        assert!(text.contains("Cost spikes detected: 1 days."));
        assert!(text.contains("2025-08-03: $1000.00"));
        assert!(text.contains("AWS Glue (us-east-1): $900.00"));
    }

    #[test]
    fn test_summary_text_limits_spike_sample() {
        let mut spikes = create_test_spikes();
        spikes.spike_days = (1..=5)
            .map(|d| DailyTotal { date: date(d), amount: dec!(900) })
            .collect();

        let text = summary_text(&spikes, "Glue", 2);
        assert!(text.contains("2025-08-02"));
        assert!(!text.contains("2025-08-03: "));
    }

    #[test]
    fn test_summary_text_without_spikes() {
        let mut spikes = create_test_spikes();
        spikes.spike_days.clear();

        let text = summary_text(&spikes, "Glue", 3);
        assert!(text.contains("No cost spikes detected."));
    }

    #[test]
    fn test_messages_carry_scope_headers() {
        let summary = summary_message("Glue", "Glue - Average daily cost: $10.00");
        assert!(summary.starts_with("**Glue Cost Analysis Report (Summary):**\n\n"));
        assert!(summary.ends_with("$10.00"));

        let narrative = narrative_message("All Services", "  EC2 grew.\n");
        assert_eq!(
            narrative,
            "**All Services Cost Analysis LLM Observations:**\n\nEC2 grew."
        );
    }

    #[test]
    fn test_generate_markdown_report() {
        let markdown = generate_markdown_report(&create_test_report(Some("Glue drove the spike.")));

        assert!(markdown.contains("# Cost Spike Report: All Services"));
        assert!(markdown.contains("## Metadata"));
        assert!(markdown.contains("`mistral`"));
        assert!(markdown.contains("## Spike Days"));
        assert!(markdown.contains("### 2025-08-03: $1000.00"));
        assert!(markdown.contains("| 1 | AWS Glue (us-east-1) | $900.00 |"));
        assert!(markdown.contains("## Daily Totals"));
        assert!(markdown.contains("## Narrative"));
        assert!(markdown.contains("Glue drove the spike."));
    }

    #[test]
    fn test_markdown_without_narrative_or_spikes() {
        let mut report = create_test_report(None);
        report.spikes.spike_days.clear();
        report.spikes.top_contributors_per_spike_day.clear();

        let markdown = generate_markdown_report(&report);
        assert!(markdown.contains("No day exceeded the threshold."));
        assert!(!markdown.contains("## Narrative"));
    }

    #[test]
    fn test_generate_json_report() {
        let json = generate_json_report(&create_test_report(None)).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["metadata"]["scope"], "All Services");
        assert_eq!(value["spikes"]["spike_days"][0]["date"], "2025-08-03");
        assert!(value.get("narrative").is_none());
    }
}
