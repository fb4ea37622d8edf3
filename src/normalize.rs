//! Conversion of loosely shaped API records into [`NormalizedEntry`] and [`Target`].
//!
//! Two modes are offered. [`NormalizationMode::Lenient`] never fails: every
//! missing or unparsable field is replaced by a default so the dashboard can
//! always render something. [`NormalizationMode::Strict`] rejects records whose
//! amount, date or target assignment cannot be resolved, and the collection
//! helpers drop (and log) them.

use crate::error::{PerformanceError, Result};
use crate::schema::{EntityKind, NormalizedEntry, Target, TargetType};
use crate::utils::{coerce_amount, coerce_quantity, parse_decimal, parse_month, parse_timestamp, parse_year};
use chrono::{DateTime, Datelike, Utc};
use log::{debug, warn};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

pub const UNKNOWN_CLIENT: &str = "Unknown Client";

const OWNER_FIELDS: [&str; 5] = ["employeeId", "employee", "userId", "user", "createdBy"];
const ASSIGNEE_FIELDS: [&str; 4] = ["employeeId", "employee", "userId", "assignedTo"];
const TEAM_FIELDS: [&str; 2] = ["teamId", "team"];
const WRAPPER_KEYS: [&str; 3] = ["data", "items", "results"];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum NormalizationMode {
    #[default]
    #[schemars(description = "Substitute defaults for anything missing; never reject a record")]
    Lenient,

    #[schemars(description = "Reject records whose amount, date or assignment cannot be resolved")]
    Strict,
}

/// Fields read off a raw sale/order before any defaulting.
struct ResolvedEntry {
    id: Option<String>,
    client_name: Option<String>,
    amount: Option<f64>,
    quantity: u64,
    date: Option<DateTime<Utc>>,
    employee_id: Option<String>,
    team_id: Option<String>,
}

/// Fields read off a raw target before any defaulting.
struct ResolvedTarget {
    id: Option<String>,
    employee_id: Option<String>,
    target_type: Option<TargetType>,
    target_amount: f64,
    target_qty: f64,
    month: Option<u32>,
    year: Option<i32>,
}

/// Normalizes a raw sale or order. Total: always returns a structurally valid entry.
pub fn normalize_entry(raw: &Value, kind: EntityKind) -> NormalizedEntry {
    let resolved = resolve_entry(raw, kind);

    let date = resolved.date.unwrap_or_else(|| {
        debug!("{} record has no usable date, defaulting to now", kind);
        Utc::now()
    });

    NormalizedEntry {
        id: resolved.id.unwrap_or_else(|| synthesize_id(kind.as_str())),
        kind,
        client_name: resolved
            .client_name
            .unwrap_or_else(|| UNKNOWN_CLIENT.to_string()),
        amount: resolved.amount.map(|a| a.max(0.0)).unwrap_or(0.0),
        quantity: resolved.quantity,
        date,
        employee_id: resolved.employee_id,
        team_id: resolved.team_id,
    }
}

/// Strict counterpart of [`normalize_entry`].
pub fn parse_entry(raw: &Value, kind: EntityKind) -> Result<NormalizedEntry> {
    if !raw.is_object() {
        return Err(invalid(kind.as_str(), "record is not a JSON object"));
    }

    let resolved = resolve_entry(raw, kind);

    let amount = resolved.amount.ok_or_else(|| {
        invalid(
            kind.as_str(),
            format!("missing or non-numeric {} / amount", kind.amount_field()),
        )
    })?;
    if amount < 0.0 {
        return Err(invalid(kind.as_str(), format!("negative amount {}", amount)));
    }

    let date = resolved
        .date
        .ok_or_else(|| invalid(kind.as_str(), "missing or unparsable date"))?;

    Ok(NormalizedEntry {
        id: resolved.id.unwrap_or_else(|| synthesize_id(kind.as_str())),
        kind,
        client_name: resolved
            .client_name
            .unwrap_or_else(|| UNKNOWN_CLIENT.to_string()),
        amount,
        quantity: resolved.quantity,
        date,
        employee_id: resolved.employee_id,
        team_id: resolved.team_id,
    })
}

/// Normalizes a raw target. Total: an unrecognisable type defaults to `sale` and
/// a missing month/year defaults to the current one.
pub fn normalize_target(raw: &Value) -> Target {
    let resolved = resolve_target(raw);
    let now = Utc::now();

    let target_type = resolved.target_type.unwrap_or_else(|| {
        warn!("Target record has no recognisable type, treating it as a sale target");
        TargetType::Sale
    });

    Target {
        id: resolved.id.unwrap_or_else(|| synthesize_id("target")),
        employee_id: resolved.employee_id.unwrap_or_default(),
        target_type,
        target_amount: resolved.target_amount,
        target_qty: resolved.target_qty,
        month: resolved.month.unwrap_or_else(|| now.month()),
        year: resolved.year.unwrap_or_else(|| now.year()),
    }
}

/// Strict counterpart of [`normalize_target`].
pub fn parse_target(raw: &Value) -> Result<Target> {
    if !raw.is_object() {
        return Err(invalid("target", "record is not a JSON object"));
    }

    let resolved = resolve_target(raw);

    Ok(Target {
        id: resolved.id.unwrap_or_else(|| synthesize_id("target")),
        employee_id: resolved
            .employee_id
            .ok_or_else(|| invalid("target", "missing employee reference"))?,
        target_type: resolved
            .target_type
            .ok_or_else(|| invalid("target", "missing or unknown targetType"))?,
        target_amount: resolved.target_amount,
        target_qty: resolved.target_qty,
        month: resolved
            .month
            .ok_or_else(|| invalid("target", "missing or out-of-range month"))?,
        year: resolved
            .year
            .ok_or_else(|| invalid("target", "missing year"))?,
    })
}

/// Applies the configured [`NormalizationMode`] to whole collections.
#[derive(Debug, Clone, Copy, Default)]
pub struct Normalizer {
    mode: NormalizationMode,
}

impl Normalizer {
    pub fn new(mode: NormalizationMode) -> Self {
        Self { mode }
    }

    pub fn mode(&self) -> NormalizationMode {
        self.mode
    }

    pub fn normalize_entries(&self, records: &[Value], kind: EntityKind) -> Vec<NormalizedEntry> {
        records
            .iter()
            .filter_map(|raw| match self.mode {
                NormalizationMode::Lenient => {
                    if raw.is_object() {
                        Some(normalize_entry(raw, kind))
                    } else {
                        debug!("Skipping non-object {} record: {}", kind, raw);
                        None
                    }
                }
                NormalizationMode::Strict => match parse_entry(raw, kind) {
                    Ok(entry) => Some(entry),
                    Err(e) => {
                        warn!("Dropping record: {}", e);
                        None
                    }
                },
            })
            .collect()
    }

    pub fn normalize_targets(&self, records: &[Value]) -> Vec<Target> {
        records
            .iter()
            .filter_map(|raw| match self.mode {
                NormalizationMode::Lenient => {
                    if raw.is_object() {
                        Some(normalize_target(raw))
                    } else {
                        debug!("Skipping non-object target record: {}", raw);
                        None
                    }
                }
                NormalizationMode::Strict => match parse_target(raw) {
                    Ok(target) => Some(target),
                    Err(e) => {
                        warn!("Dropping record: {}", e);
                        None
                    }
                },
            })
            .collect()
    }
}

/// Turns a response body into a list of raw records.
///
/// Accepts a bare array, an object wrapping the list under `data`, `items`,
/// `results` or `collection_key` (one nested level is searched), a single
/// record object, or `null`.
pub fn extract_records(payload: Value, collection_key: &str) -> Result<Vec<Value>> {
    match payload {
        Value::Array(items) => Ok(items),
        Value::Null => Ok(Vec::new()),
        Value::Object(map) => extract_from_object(map, collection_key, true),
        other => Err(PerformanceError::ShapeMismatch(format!(
            "expected an array or object, got {}",
            json_type_name(&other)
        ))),
    }
}

fn extract_from_object(
    mut map: Map<String, Value>,
    collection_key: &str,
    descend: bool,
) -> Result<Vec<Value>> {
    let keys = WRAPPER_KEYS.iter().copied().chain(std::iter::once(collection_key));

    for key in keys {
        match map.remove(key) {
            Some(Value::Array(items)) => return Ok(items),
            Some(Value::Object(inner)) if descend => {
                if let Ok(items) = extract_from_object(inner, collection_key, false) {
                    return Ok(items);
                }
            }
            _ => {}
        }
    }

    if map.is_empty() {
        return Ok(Vec::new());
    }

    if map.contains_key("_id") || map.contains_key("id") {
        return Ok(vec![Value::Object(map)]);
    }

    Err(PerformanceError::ShapeMismatch(format!(
        "object without a record list (keys: {})",
        map.keys().cloned().collect::<Vec<_>>().join(", ")
    )))
}

/// Every owner reference carried by a raw record, in field priority order.
pub fn owner_references(raw: &Value) -> Vec<String> {
    OWNER_FIELDS
        .iter()
        .filter_map(|key| raw.get(key).and_then(reference_id))
        .collect()
}

/// Every employee reference a raw target is assigned to.
pub fn assignee_references(raw: &Value) -> Vec<String> {
    ASSIGNEE_FIELDS
        .iter()
        .filter_map(|key| raw.get(key).and_then(reference_id))
        .collect()
}

pub fn team_reference(raw: &Value) -> Option<String> {
    TEAM_FIELDS
        .iter()
        .find_map(|key| raw.get(key).and_then(reference_id))
}

/// Id carried by a reference value: a plain string/number, or an object's `_id`/`id`.
pub fn reference_id(value: &Value) -> Option<String> {
    match value {
        Value::Object(map) => map
            .get("_id")
            .or_else(|| map.get("id"))
            .and_then(scalar_string),
        other => scalar_string(other),
    }
}

fn resolve_entry(raw: &Value, kind: EntityKind) -> ResolvedEntry {
    let amount = [kind.amount_field(), "amount"]
        .iter()
        .find_map(|key| raw.get(key).and_then(parse_decimal));

    let quantity = [kind.qty_field(), "qty"]
        .iter()
        .find_map(|key| raw.get(key).filter(|v| parse_decimal(v).is_some()))
        .map(|v| coerce_quantity(Some(v)))
        .unwrap_or(0);

    let date = ["date", kind.date_field(), "createdAt"]
        .iter()
        .find_map(|key| raw.get(key).and_then(parse_timestamp));

    ResolvedEntry {
        id: record_id(raw),
        client_name: resolve_client_name(raw),
        amount,
        quantity,
        date,
        employee_id: owner_references(raw).into_iter().next(),
        team_id: team_reference(raw),
    }
}

fn resolve_target(raw: &Value) -> ResolvedTarget {
    let target_type = ["targetType", "type"]
        .iter()
        .find_map(|key| raw.get(key).and_then(Value::as_str).and_then(TargetType::parse));

    let target_amount = coerce_amount(
        ["targetAmount", "amount", "target"]
            .iter()
            .find_map(|key| raw.get(key).filter(|v| parse_decimal(v).is_some())),
    );

    let target_qty = coerce_amount(
        ["targetQty", "qty", "quantity"]
            .iter()
            .find_map(|key| raw.get(key).filter(|v| parse_decimal(v).is_some())),
    );

    let dated = ["date", "startDate", "createdAt"]
        .iter()
        .find_map(|key| raw.get(key).and_then(parse_timestamp));

    let month = raw
        .get("month")
        .and_then(parse_month)
        .or_else(|| dated.map(|d| d.month()));
    let year = raw
        .get("year")
        .and_then(parse_year)
        .or_else(|| dated.map(|d| d.year()));

    ResolvedTarget {
        id: record_id(raw),
        employee_id: assignee_references(raw).into_iter().next(),
        target_type,
        target_amount,
        target_qty,
        month,
        year,
    }
}

/// Name field, nested client object, string client field, nested client-id object.
fn resolve_client_name(raw: &Value) -> Option<String> {
    let direct = raw.get("clientName").and_then(non_empty_str);
    let nested = || {
        raw.get("client")
            .filter(|c| c.is_object())
            .and_then(|c| c.get("name").or_else(|| c.get("clientName")))
            .and_then(non_empty_str)
    };
    let flat = || raw.get("client").and_then(non_empty_str);
    let by_id = || {
        raw.get("clientId")
            .filter(|c| c.is_object())
            .and_then(|c| c.get("name"))
            .and_then(non_empty_str)
    };

    direct.or_else(nested).or_else(flat).or_else(by_id)
}

fn record_id(raw: &Value) -> Option<String> {
    raw.get("_id")
        .or_else(|| raw.get("id"))
        .and_then(scalar_string)
}

fn synthesize_id(prefix: &str) -> String {
    format!("{}-{}", prefix, Uuid::new_v4())
}

fn non_empty_str(value: &Value) -> Option<String> {
    value
        .as_str()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(_) => non_empty_str(value),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn invalid(kind: &str, details: impl Into<String>) -> PerformanceError {
    PerformanceError::InvalidRecord {
        kind: kind.to_string(),
        details: details.into(),
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_normalize_totality_on_malformed_records() {
        let malformed = vec![
            json!({}),
            json!({ "salesAmount": "abc", "date": "yesterday" }),
            json!({ "amount": null, "client": { "name": "" } }),
            json!({ "salesAmount": -50, "salesQty": -2 }),
            json!({ "client": 42, "qty": "lots" }),
        ];

        for raw in &malformed {
            let entry = normalize_entry(raw, EntityKind::Sale);
            assert!(entry.amount >= 0.0);
            assert!(!entry.id.is_empty());
            assert_eq!(entry.client_name, UNKNOWN_CLIENT);
            assert!(chrono::DateTime::parse_from_rfc3339(&entry.date.to_rfc3339()).is_ok());
        }
    }

    #[test]
    fn test_client_name_resolution_order() {
        let explicit = json!({ "clientName": "Direct", "client": { "name": "Nested" } });
        assert_eq!(normalize_entry(&explicit, EntityKind::Sale).client_name, "Direct");

        let nested = json!({ "client": { "name": "Nested" }, "clientId": { "name": "ById" } });
        assert_eq!(normalize_entry(&nested, EntityKind::Sale).client_name, "Nested");

        let flat = json!({ "client": "Flat Co" });
        assert_eq!(normalize_entry(&flat, EntityKind::Sale).client_name, "Flat Co");

        let by_id = json!({ "clientId": { "_id": "c1", "name": "ById" } });
        assert_eq!(normalize_entry(&by_id, EntityKind::Order).client_name, "ById");
    }

    #[test]
    fn test_kind_specific_fields_take_priority() {
        let raw = json!({
            "_id": "o1",
            "orderAmount": "250.5",
            "amount": 10,
            "orderQty": 4,
            "qty": 1,
            "date": "2024-05-02T00:00:00Z"
        });
        let entry = normalize_entry(&raw, EntityKind::Order);
        assert_eq!(entry.id, "o1");
        assert_eq!(entry.amount, 250.5);
        assert_eq!(entry.quantity, 4);
        assert_eq!(entry.month(), 5);

        // A sale reads salesAmount, not orderAmount
        let as_sale = normalize_entry(&raw, EntityKind::Sale);
        assert_eq!(as_sale.amount, 10.0);
        assert_eq!(as_sale.quantity, 1);
    }

    #[test]
    fn test_unparsable_specific_field_falls_through_to_generic() {
        let raw = json!({ "salesAmount": "n/a", "amount": 75 });
        assert_eq!(normalize_entry(&raw, EntityKind::Sale).amount, 75.0);
    }

    #[test]
    fn test_owner_and_team_references() {
        let raw = json!({
            "employeeId": { "_id": "e1", "name": "Sam" },
            "userId": "u2",
            "team": { "id": 7 }
        });
        assert_eq!(owner_references(&raw), vec!["e1".to_string(), "u2".to_string()]);
        assert_eq!(team_reference(&raw), Some("7".to_string()));

        let entry = normalize_entry(&raw, EntityKind::Sale);
        assert_eq!(entry.employee_id.as_deref(), Some("e1"));
    }

    #[test]
    fn test_strict_parse_rejects_missing_amount_and_date() {
        let no_amount = json!({ "date": "2024-01-01" });
        assert!(parse_entry(&no_amount, EntityKind::Sale).is_err());

        let no_date = json!({ "amount": 10 });
        assert!(parse_entry(&no_date, EntityKind::Sale).is_err());

        let negative = json!({ "amount": -1, "date": "2024-01-01" });
        assert!(parse_entry(&negative, EntityKind::Sale).is_err());

        let ok = json!({ "amount": 10, "date": "2024-01-01" });
        assert_eq!(parse_entry(&ok, EntityKind::Sale).unwrap().amount, 10.0);
    }

    #[test]
    fn test_target_type_and_period_normalization() {
        let raw = json!({
            "_id": "t1",
            "employeeId": "e1",
            "targetType": "Orders",
            "targetAmount": "1000",
            "targetQty": 20,
            "month": "March",
            "year": "2024"
        });
        let target = normalize_target(&raw);
        assert_eq!(target.target_type, TargetType::Order);
        assert_eq!(target.target_amount, 1000.0);
        assert_eq!(target.target_qty, 20.0);
        assert_eq!((target.month, target.year), (3, 2024));

        let dated = json!({ "type": "sales", "amount": 5, "startDate": "2023-09-01" });
        let target = normalize_target(&dated);
        assert_eq!(target.target_type, TargetType::Sale);
        assert_eq!((target.month, target.year), (9, 2023));
    }

    #[test]
    fn test_strict_target_requires_assignment() {
        let raw = json!({ "targetType": "bonus", "month": 2, "year": 2024, "employeeId": "e1" });
        assert!(parse_target(&raw).is_err());
        assert_eq!(normalize_target(&raw).target_type, TargetType::Sale);

        let raw = json!({ "targetType": "sale", "month": 14, "year": 2024, "employeeId": "e1" });
        assert!(parse_target(&raw).is_err());
    }

    #[test]
    fn test_extract_records_shapes() {
        let arr = extract_records(json!([{ "_id": 1 }, { "_id": 2 }]), "sales").unwrap();
        assert_eq!(arr.len(), 2);

        let wrapped = extract_records(json!({ "data": [{ "_id": 1 }] }), "sales").unwrap();
        assert_eq!(wrapped.len(), 1);

        let keyed = extract_records(json!({ "success": true, "sales": [{}, {}, {}] }), "sales").unwrap();
        assert_eq!(keyed.len(), 3);

        let nested = extract_records(json!({ "data": { "orders": [{}] } }), "orders").unwrap();
        assert_eq!(nested.len(), 1);

        let single = extract_records(json!({ "_id": "s1", "amount": 4 }), "sales").unwrap();
        assert_eq!(single.len(), 1);

        assert!(extract_records(json!(null), "sales").unwrap().is_empty());
        assert!(extract_records(json!({}), "sales").unwrap().is_empty());
        assert!(matches!(
            extract_records(json!("oops"), "sales"),
            Err(PerformanceError::ShapeMismatch(_))
        ));
        assert!(matches!(
            extract_records(json!({ "message": "ok" }), "sales"),
            Err(PerformanceError::ShapeMismatch(_))
        ));
    }

    #[test]
    fn test_strict_normalizer_drops_invalid_records() {
        let records = vec![
            json!({ "amount": 10, "date": "2024-01-01" }),
            json!({ "amount": "x" }),
            json!(3),
        ];

        let lenient = Normalizer::new(NormalizationMode::Lenient);
        assert_eq!(lenient.normalize_entries(&records, EntityKind::Sale).len(), 2);

        let strict = Normalizer::new(NormalizationMode::Strict);
        assert_eq!(strict.normalize_entries(&records, EntityKind::Sale).len(), 1);
    }
}
