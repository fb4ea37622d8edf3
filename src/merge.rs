use crate::aggregate::{ordered_sum, MonthlySeries};
use crate::schema::{NormalizedEntry, PerformanceMode, Target, TargetType};
use log::warn;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Percentage of `target` reached by `actual`, rounded to the nearest integer.
///
/// A non-positive target always yields 0. [`PerformanceMode::Capped`] clamps the
/// result at 100.
pub fn performance_percent(actual: f64, target: f64, mode: PerformanceMode) -> i64 {
    if target.is_nan() || target <= 0.0 || !actual.is_finite() {
        return 0;
    }

    let percent = (actual / target * 100.0).round() as i64;
    match mode {
        PerformanceMode::Raw => percent,
        PerformanceMode::Capped => percent.min(100),
    }
}

/// Overlays the targets of `target_type` for `year` onto a copy of `series`.
///
/// Targets for the same month are added together. Every bucket's
/// `performance_percent` is recomputed in raw mode.
pub fn merge_targets(
    series: &MonthlySeries,
    targets: &[Target],
    target_type: TargetType,
    year: i32,
) -> MonthlySeries {
    let mut merged = if series.year() == year {
        series.clone()
    } else {
        warn!(
            "Merging {} targets into a series for {}, starting from empty buckets",
            year,
            series.year()
        );
        MonthlySeries::empty(year)
    };

    let mut amounts: BTreeMap<u32, Vec<f64>> = BTreeMap::new();
    let mut quantities: BTreeMap<u32, Vec<f64>> = BTreeMap::new();

    for target in targets
        .iter()
        .filter(|t| t.target_type == target_type && t.year == year)
    {
        if !(1..=12).contains(&target.month) {
            warn!("Ignoring target {} with month {}", target.id, target.month);
            continue;
        }
        amounts.entry(target.month).or_default().push(target.target_amount);
        quantities.entry(target.month).or_default().push(target.target_qty);
    }

    for month in 1..=12 {
        let Some(bucket) = merged.month_mut(month) else {
            continue;
        };

        if let Some(mut values) = amounts.remove(&month) {
            values.push(bucket.target_amount);
            bucket.target_amount = ordered_sum(values);
        }
        if let Some(mut values) = quantities.remove(&month) {
            values.push(bucket.target_qty);
            bucket.target_qty = ordered_sum(values);
        }

        bucket.performance_percent =
            performance_percent(bucket.actual_amount, bucket.target_amount, PerformanceMode::Raw);
    }

    merged
}

/// One row of the cross-employee comparison table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmployeeComparison {
    pub employee_id: String,
    pub actual_amount: f64,
    pub actual_qty: u64,
    pub target_amount: f64,
    pub target_qty: f64,
    /// Capped at 100.
    pub performance_percent: i64,
}

#[derive(Default)]
struct EmployeeTally {
    actual: Vec<f64>,
    qty: u64,
    target: Vec<f64>,
    target_qty: Vec<f64>,
}

/// Per-employee actual versus target for `year` (or one month of it), using
/// capped percentages. Rows are ordered by percentage, best first, then by id.
pub fn compare_employees(
    entries: &[NormalizedEntry],
    targets: &[Target],
    target_type: TargetType,
    year: i32,
    month: Option<u32>,
) -> Vec<EmployeeComparison> {
    let in_period = |y: i32, m: u32| y == year && month.map_or(true, |wanted| wanted == m);
    let kind = target_type.entity_kind();
    let mut tallies: BTreeMap<String, EmployeeTally> = BTreeMap::new();

    for entry in entries
        .iter()
        .filter(|e| e.kind == kind && in_period(e.year(), e.month()))
    {
        let Some(employee) = entry.employee_id.as_ref() else {
            continue;
        };
        let tally = tallies.entry(employee.clone()).or_default();
        tally.actual.push(entry.amount);
        tally.qty = tally.qty.saturating_add(entry.quantity);
    }

    for target in targets
        .iter()
        .filter(|t| t.target_type == target_type && in_period(t.year, t.month))
    {
        if target.employee_id.is_empty() {
            continue;
        }
        let tally = tallies.entry(target.employee_id.clone()).or_default();
        tally.target.push(target.target_amount);
        tally.target_qty.push(target.target_qty);
    }

    let mut rows: Vec<EmployeeComparison> = tallies
        .into_iter()
        .map(|(employee_id, tally)| {
            let actual_amount = ordered_sum(tally.actual);
            let target_amount = ordered_sum(tally.target);
            EmployeeComparison {
                employee_id,
                actual_amount,
                actual_qty: tally.qty,
                target_amount,
                target_qty: ordered_sum(tally.target_qty),
                performance_percent: performance_percent(
                    actual_amount,
                    target_amount,
                    PerformanceMode::Capped,
                ),
            }
        })
        .collect();

    rows.sort_by(|a, b| {
        b.performance_percent
            .cmp(&a.performance_percent)
            .then_with(|| a.employee_id.cmp(&b.employee_id))
    });

    rows
}
