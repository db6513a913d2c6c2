//! Cost aggregation and contributor ranking.
//!
//! This module groups raw cost records by date and dimension tuple and
//! ranks contributors. It is arity-agnostic: the same routines serve
//! service-only, region-only, and service+region breakdowns.

use crate::analysis::DataError;
use crate::models::{Contributor, ContributorBreakdown, CostRecord, DailyTotal, DimensionKey};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Per-date, per-tuple sums. Both levels are ordered maps so iteration
/// is chronological and tuple-ordered.
pub type DateGroups = BTreeMap<NaiveDate, BTreeMap<DimensionKey, Decimal>>;

/// Sentinel label for a missing category, e.g. `UnknownRegion`.
pub fn unknown_label(category: &str) -> String {
    format!("Unknown{}", category)
}

/// Fill missing or blank labels with the category sentinel.
///
/// The key is padded to the number of categories; labels past the last
/// category are kept as-is.
pub fn normalize_dimensions(key: &DimensionKey, categories: &[String]) -> DimensionKey {
    let arity = key.arity().max(categories.len());

    let labels = (0..arity)
        .map(|i| match key.labels().get(i) {
            Some(label) if !label.trim().is_empty() => label.clone(),
            _ => categories
                .get(i)
                .map(|c| unknown_label(c))
                .unwrap_or_else(|| unknown_label("")),
        })
        .collect();

    DimensionKey(labels)
}

/// Group records by date, summing amounts that share a date and tuple.
///
/// `seed_dates` are inserted with no contributors so that periods without
/// any spend still count as days.
pub fn group_by_date(
    records: &[CostRecord],
    categories: &[String],
    seed_dates: &[NaiveDate],
) -> Result<DateGroups, DataError> {
    let mut grouped: DateGroups = BTreeMap::new();

    for date in seed_dates {
        grouped.entry(*date).or_default();
    }

    for record in records {
        let key = normalize_dimensions(&record.dimensions, categories);
        let slot = grouped
            .entry(record.date)
            .or_default()
            .entry(key)
            .or_default();
        *slot = checked_sum(*slot, record.amount, "contributor amount")?;
    }

    Ok(grouped)
}

/// `a + b`, reporting overflow as a data error.
pub fn checked_sum(a: Decimal, b: Decimal, what: &'static str) -> Result<Decimal, DataError> {
    a.checked_add(b).ok_or(DataError::Overflow(what))
}

/// One total per date, chronological.
pub fn daily_totals(grouped: &DateGroups) -> Result<Vec<DailyTotal>, DataError> {
    grouped
        .iter()
        .map(|(date, by_key)| {
            let amount = by_key
                .values()
                .try_fold(Decimal::ZERO, |acc, v| checked_sum(acc, *v, "daily total"))?;
            Ok(DailyTotal {
                date: *date,
                amount,
            })
        })
        .collect()
}

/// One entry per (date, tuple) pair, chronological then tuple-ordered.
pub fn contributor_breakdowns(grouped: &DateGroups) -> Vec<ContributorBreakdown> {
    grouped
        .iter()
        .flat_map(|(date, by_key)| {
            by_key.iter().map(move |(key, amount)| ContributorBreakdown {
                date: *date,
                dimensions: key.clone(),
                amount: *amount,
            })
        })
        .collect()
}

/// Sum each tuple across every date.
pub fn contributor_totals(
    grouped: &DateGroups,
) -> Result<BTreeMap<DimensionKey, Decimal>, DataError> {
    let mut totals: BTreeMap<DimensionKey, Decimal> = BTreeMap::new();

    for by_key in grouped.values() {
        for (key, amount) in by_key {
            let slot = totals.entry(key.clone()).or_default();
            *slot = checked_sum(*slot, *amount, "contributor total")?;
        }
    }

    Ok(totals)
}

/// Amount descending, then tuple ascending.
pub fn compare_contributors(a: &Contributor, b: &Contributor) -> Ordering {
    b.amount
        .cmp(&a.amount)
        .then_with(|| a.dimensions.cmp(&b.dimensions))
}

/// Sort entries and keep the first `top_k`.
pub fn rank_contributors<I>(entries: I, top_k: usize) -> Vec<Contributor>
where
    I: IntoIterator<Item = (DimensionKey, Decimal)>,
{
    let mut ranked: Vec<Contributor> = entries
        .into_iter()
        .map(|(dimensions, amount)| Contributor { dimensions, amount })
        .collect();

    ranked.sort_by(compare_contributors);
    ranked.truncate(top_k);
    ranked
}

/// Ranked top-K for every date.
pub fn top_contributors_by_date(
    grouped: &DateGroups,
    top_k: usize,
) -> BTreeMap<NaiveDate, Vec<Contributor>> {
    grouped
        .iter()
        .map(|(date, by_key)| {
            let ranked = rank_contributors(
                by_key.iter().map(|(k, v)| (k.clone(), *v)),
                top_k,
            );
            (*date, ranked)
        })
        .collect()
}
