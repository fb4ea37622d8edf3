use crate::schema::{MonthBucket, NormalizedEntry, PerformanceMode};
use log::{debug, trace};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Twelve month buckets for a single calendar year, January first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MonthlySeries {
    year: i32,
    buckets: Vec<MonthBucket>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct YearTotals {
    pub year: i32,
    pub actual_amount: f64,
    pub actual_qty: u64,
    pub target_amount: f64,
    pub target_qty: f64,
    #[schemars(description = "Raw percentage of the yearly target reached")]
    pub performance_percent: i64,
}

impl MonthlySeries {
    pub fn empty(year: i32) -> Self {
        Self {
            year,
            buckets: (1..=12).map(|month| MonthBucket::empty(year, month)).collect(),
        }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn buckets(&self) -> &[MonthBucket] {
        &self.buckets
    }

    pub fn into_buckets(self) -> Vec<MonthBucket> {
        self.buckets
    }

    /// Bucket for a 1-based month.
    pub fn month(&self, month: u32) -> Option<&MonthBucket> {
        month
            .checked_sub(1)
            .and_then(|idx| self.buckets.get(idx as usize))
    }

    pub(crate) fn month_mut(&mut self, month: u32) -> Option<&mut MonthBucket> {
        month
            .checked_sub(1)
            .and_then(|idx| self.buckets.get_mut(idx as usize))
    }

    pub fn totals(&self) -> YearTotals {
        let actual_amount = ordered_sum(self.buckets.iter().map(|b| b.actual_amount).collect());
        let target_amount = ordered_sum(self.buckets.iter().map(|b| b.target_amount).collect());

        YearTotals {
            year: self.year,
            actual_amount,
            actual_qty: self.buckets.iter().map(|b| b.actual_qty).sum(),
            target_amount,
            target_qty: ordered_sum(self.buckets.iter().map(|b| b.target_qty).collect()),
            performance_percent: crate::merge::performance_percent(
                actual_amount,
                target_amount,
                PerformanceMode::Raw,
            ),
        }
    }
}

/// Sums the amounts and quantities of `entries` dated in `year` into month buckets.
///
/// Entries from other years are ignored. The result does not depend on the
/// order of `entries`.
pub fn aggregate_by_month(entries: &[NormalizedEntry], year: i32) -> MonthlySeries {
    let mut amounts: Vec<Vec<f64>> = vec![Vec::new(); 12];
    let mut quantities = [0u64; 12];
    let mut skipped = 0usize;

    for entry in entries {
        if entry.year() != year {
            trace!("Entry {} dated {} is outside {}", entry.id, entry.date, year);
            skipped += 1;
            continue;
        }

        let idx = (entry.month() - 1) as usize;
        amounts[idx].push(entry.amount);
        quantities[idx] = quantities[idx].saturating_add(entry.quantity);
    }

    if skipped > 0 {
        debug!(
            "Aggregated {} of {} entries into {} ({} outside the year)",
            entries.len() - skipped,
            entries.len(),
            year,
            skipped
        );
    }

    let mut series = MonthlySeries::empty(year);
    for (idx, (bucket_amounts, qty)) in amounts.into_iter().zip(quantities).enumerate() {
        let bucket = &mut series.buckets[idx];
        bucket.actual_amount = ordered_sum(bucket_amounts);
        bucket.actual_qty = qty;
    }

    series
}

/// Adds values in ascending order so that floating-point rounding is the same
/// for every permutation of the input.
pub(crate) fn ordered_sum(mut values: Vec<f64>) -> f64 {
    values.sort_by(f64::total_cmp);
    values.into_iter().fold(0.0, |acc, v| acc + v)
}
