//! Prompt construction for the cost narrative.

use crate::models::{Contributor, SpikeReport};

/// Plural, lowercase phrase for the dimension categories,
/// e.g. `["Service", "Region"]` becomes `services and regions`.
pub fn describe_dimensions(dimensions: &[String]) -> String {
    let plural: Vec<String> = dimensions
        .iter()
        .map(|d| format!("{}s", d.to_lowercase()))
        .collect();

    match plural.as_slice() {
        [] => "cost categories".to_string(),
        [one] => one.clone(),
        [init @ .., last] => format!("{} and {}", init.join(", "), last),
    }
}

fn push_contributors(prompt: &mut String, contributors: &[Contributor], indent: &str) {
    for c in contributors {
        prompt.push_str(&format!("{}- {}: ${:.2}\n", indent, c.dimensions, c.amount));
    }
}

/// Build the summarization prompt from a report and a slice of the data.
///
/// Only the first `sample_days` days and spikes are included to keep the
/// prompt small; the top contributors carry the rest of the signal.
pub fn build_prompt(
    report: &SpikeReport,
    scope: &str,
    dimensions: &[String],
    sample_days: usize,
) -> String {
    let subject = describe_dimensions(dimensions);
    let mut prompt = String::new();

    prompt.push_str(&format!(
        "Here is the daily cloud cost data for {scope}. Identify any spikes and trends, and \
         provide concise observations (max 1000 words) about which {subject} contributed most \
         to cost changes. Suggest possible reasons for spikes and recommendations for cost \
         optimization. Write your answer as a summary for the responsible teams, and ask them \
         to provide justifications for any spikes or unusual patterns.\n\n"
    ));

    prompt.push_str(&format!(
        "Average daily cost: ${:.2}\nSpike threshold ({}x average): ${:.2}\nDays analyzed: {}\n\n",
        report.average,
        report.multiplier.normalize(),
        report.threshold,
        report.daily_totals.len()
    ));

    prompt.push_str("Spikes:\n");
    if report.spike_days.is_empty() {
        prompt.push_str("- none\n");
    }
    for spike in report.spike_days.iter().take(sample_days) {
        prompt.push_str(&format!("- {}: ${:.2}\n", spike.date, spike.amount));
        if let Some(contributors) = report.top_contributors_per_spike_day.get(&spike.date) {
            push_contributors(&mut prompt, contributors, "  ");
        }
    }
    if report.spike_days.len() > sample_days {
        prompt.push_str(&format!(
            "- ... {} more spike days\n",
            report.spike_days.len() - sample_days
        ));
    }

    prompt.push_str("\nDaily costs (sample):\n");
    for day in report.daily_totals.iter().take(sample_days) {
        prompt.push_str(&format!("- {}: ${:.2}\n", day.date, day.amount));
        if let Some(contributors) = report.top_contributors_per_day.get(&day.date) {
            push_contributors(&mut prompt, contributors, "  ");
        }
    }
    if report.daily_totals.len() > sample_days {
        prompt.push_str("- ...\n");
    }

    prompt.push_str(&format!("\nTop {} by total cost:\n", subject));
    push_contributors(&mut prompt, &report.top_contributors_overall, "");

    prompt
}
