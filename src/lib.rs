//! # Sales Performance
//!
//! Reconciles the sales, orders and targets served by a dashboard API into
//! month-by-month performance series measured against targets.
//!
//! ## Core Concepts
//!
//! - **Normalization**: raw API records with varying field names become
//!   [`NormalizedEntry`] and [`Target`] values with guaranteed numeric and date fields
//! - **Scoped reads**: each read walks an ordered chain of endpoints and stops at
//!   the first non-empty answer; reads never fail, they come back empty
//! - **Buckets**: twelve [`MonthBucket`]s per year holding actuals and targets
//! - **Performance**: `round(actual / target * 100)`, uncapped for the
//!   caller's own chart and capped at 100 in cross-employee comparisons
//!
//! ## Example
//!
//! ```rust,ignore
//! use sales_performance::*;
//!
//! let config = ApiConfig::from_env()?;
//! let transport = HttpTransport::new(config.timeout_secs)?;
//! let client = PerformanceClient::new(config, transport);
//!
//! let session = SessionContext::new(token_from_login);
//! let scope = Scope::for_identity(session.identity()?);
//!
//! let report = client
//!     .monthly_performance(&session, &scope, TargetType::Sale, 2024)
//!     .await;
//! for bucket in report.series.buckets() {
//!     println!("{:02}: {}%", bucket.month, bucket.performance_percent);
//! }
//! ```

pub mod aggregate;
pub mod config;
pub mod error;
pub mod fallback;
pub mod fetcher;
pub mod merge;
pub mod mutations;
pub mod normalize;
pub mod schema;
pub mod session;
pub mod transport;
pub mod utils;
pub mod years;

pub use aggregate::{aggregate_by_month, MonthlySeries, YearTotals};
pub use config::{ApiConfig, Endpoint};
pub use error::{FailureKind, PerformanceError, Result};
pub use fallback::{first_non_empty, FallbackOutcome, Provider};
pub use fetcher::{
    retain_owned, retain_target_year, retain_team, retain_year, source_plan, PerformanceClient,
    RecordFilter, SourceSpec,
};
pub use merge::{compare_employees, merge_targets, performance_percent, EmployeeComparison};
pub use mutations::{validate_entry, validate_target};
pub use normalize::{
    extract_records, normalize_entry, normalize_target, parse_entry, parse_target,
    NormalizationMode, Normalizer, UNKNOWN_CLIENT,
};
pub use schema::*;
pub use session::{decode_identity, SessionContext};
pub use transport::{HttpMethod, Transport};
pub use years::discover_years;

#[cfg(feature = "http")]
pub use transport::HttpTransport;

use log::{debug, info};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A year of actuals against targets for one target type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceReport {
    pub target_type: TargetType,
    pub year: i32,
    #[schemars(description = "Twelve month buckets, January first")]
    pub series: MonthlySeries,
    pub totals: YearTotals,
}

impl PerformanceReport {
    /// JSON schema of the report as handed to chart consumers.
    pub fn generate_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(PerformanceReport)
    }

    pub fn schema_as_json() -> std::result::Result<String, serde_json::Error> {
        let schema = Self::generate_json_schema();
        serde_json::to_string_pretty(&schema)
    }
}

/// Aggregates `entries` of the kind matching `target_type` and overlays `targets`.
pub fn build_performance_report(
    entries: &[NormalizedEntry],
    targets: &[Target],
    target_type: TargetType,
    year: i32,
) -> PerformanceReport {
    let kind = target_type.entity_kind();
    let relevant: Vec<NormalizedEntry> = entries
        .iter()
        .filter(|e| e.kind == kind)
        .cloned()
        .collect();

    debug!(
        "Building {} performance for {} from {} entries and {} targets",
        target_type,
        year,
        relevant.len(),
        targets.len()
    );

    let actuals = aggregate_by_month(&relevant, year);
    let series = merge_targets(&actuals, targets, target_type, year);
    let totals = series.totals();

    PerformanceReport {
        target_type,
        year,
        series,
        totals,
    }
}

impl<T: Transport> PerformanceClient<T> {
    /// Monthly actual-versus-target series for `scope`. Entries and targets are read concurrently.
    pub async fn monthly_performance(
        &self,
        session: &SessionContext,
        scope: &Scope,
        target_type: TargetType,
        year: i32,
    ) -> PerformanceReport {
        let (entries, targets) = futures::join!(
            self.fetch_entity(session, target_type.entity_kind(), scope, Some(year)),
            self.fetch_targets(session, scope, Some(year)),
        );

        let report = build_performance_report(&entries, &targets, target_type, year);
        info!(
            "{} performance for {}: {:.2} of {:.2} ({}%)",
            target_type,
            year,
            report.totals.actual_amount,
            report.totals.target_amount,
            report.totals.performance_percent
        );
        report
    }

    /// Per-employee comparison rows (capped at 100%) for `scope`.
    pub async fn employee_comparison(
        &self,
        session: &SessionContext,
        scope: &Scope,
        target_type: TargetType,
        year: i32,
        month: Option<u32>,
    ) -> Vec<EmployeeComparison> {
        let (entries, targets) = futures::join!(
            self.fetch_entity(session, target_type.entity_kind(), scope, Some(year)),
            self.fetch_targets(session, scope, Some(year)),
        );

        compare_employees(&entries, &targets, target_type, year, month)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn entry(kind: EntityKind, month: u32, amount: f64) -> NormalizedEntry {
        NormalizedEntry {
            id: format!("{}-{}-{}", kind, month, amount),
            kind,
            client_name: "Client".to_string(),
            amount,
            quantity: 1,
            date: Utc.with_ymd_and_hms(2024, month, 10, 0, 0, 0).unwrap(),
            employee_id: Some("e1".to_string()),
            team_id: None,
        }
    }

    fn target(kind: TargetType, month: u32, amount: f64) -> Target {
        Target {
            id: format!("t-{}-{}", kind, month),
            employee_id: "e1".to_string(),
            target_type: kind,
            target_amount: amount,
            target_qty: 0.0,
            month,
            year: 2024,
        }
    }

    #[test]
    fn test_end_to_end_report() {
        let entries = vec![
            entry(EntityKind::Sale, 1, 750.0),
            entry(EntityKind::Sale, 2, 1200.0),
            entry(EntityKind::Order, 1, 5000.0),
        ];
        let targets = vec![
            target(TargetType::Sale, 1, 1000.0),
            target(TargetType::Sale, 2, 1000.0),
            target(TargetType::Sale, 3, 1000.0),
            target(TargetType::Order, 1, 100.0),
        ];

        let report = build_performance_report(&entries, &targets, TargetType::Sale, 2024);
        let jan = report.series.month(1).unwrap();
        let feb = report.series.month(2).unwrap();

        assert_eq!(jan.actual_amount, 750.0);
        assert_eq!(jan.performance_percent, 75);
        assert_eq!(feb.performance_percent, 120);
        assert_eq!(feb.performance(PerformanceMode::Capped), 100);
        assert_eq!(report.totals.actual_amount, 1950.0);
        assert_eq!(report.totals.target_amount, 3000.0);
        assert_eq!(report.totals.performance_percent, 65);
        assert_eq!(report.series.month(3).unwrap().performance_percent, 0);
    }

    #[test]
    fn test_schema_generation() {
        let schema_json = PerformanceReport::schema_as_json().unwrap();
        assert!(schema_json.contains("targetType"));
        assert!(schema_json.contains("performancePercent"));
        assert!(schema_json.contains("Twelve month buckets, January first"));
        assert!(schema_json.contains("0 when there is no target"));
    }

    #[test]
    fn test_report_serializes_in_schema_field_names() {
        let report = build_performance_report(&[], &[], TargetType::Sale, 2024);
        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["targetType"], "sale");
        assert_eq!(value["series"]["buckets"].as_array().unwrap().len(), 12);
        assert_eq!(value["totals"]["performancePercent"], 0);
    }

    #[test]
    fn test_report_for_year_without_data_is_zeroed() {
        let report = build_performance_report(&[], &[], TargetType::Order, 2030);
        assert_eq!(report.series.buckets().len(), 12);
        assert!(report
            .series
            .buckets()
            .iter()
            .all(|b| b.performance_percent == 0 && b.target_amount == 0.0));
    }
}
