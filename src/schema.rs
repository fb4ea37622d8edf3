use chrono::{DateTime, Datelike, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    #[schemars(description = "A completed sale to a client")]
    Sale,

    #[schemars(description = "An order placed by a client")]
    Order,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Sale => "sale",
            EntityKind::Order => "order",
        }
    }

    /// Collection key used by the API for this kind (`sales`, `orders`).
    pub fn plural(&self) -> &'static str {
        match self {
            EntityKind::Sale => "sales",
            EntityKind::Order => "orders",
        }
    }

    pub fn amount_field(&self) -> &'static str {
        match self {
            EntityKind::Sale => "salesAmount",
            EntityKind::Order => "orderAmount",
        }
    }

    pub fn qty_field(&self) -> &'static str {
        match self {
            EntityKind::Sale => "salesQty",
            EntityKind::Order => "orderQty",
        }
    }

    pub fn date_field(&self) -> &'static str {
        match self {
            EntityKind::Sale => "saleDate",
            EntityKind::Order => "orderDate",
        }
    }

    pub fn target_type(&self) -> TargetType {
        match self {
            EntityKind::Sale => TargetType::Sale,
            EntityKind::Order => TargetType::Order,
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum TargetType {
    Sale,
    Order,
}

impl TargetType {
    /// Accepts every spelling seen in API payloads: `sale`, `Sales`, `ORDERS`, ...
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "sale" | "sales" => Some(TargetType::Sale),
            "order" | "orders" => Some(TargetType::Order),
            _ => None,
        }
    }

    pub fn entity_kind(&self) -> EntityKind {
        match self {
            TargetType::Sale => EntityKind::Sale,
            TargetType::Order => EntityKind::Order,
        }
    }

    pub fn as_str(&self) -> &'static str {
        self.entity_kind().as_str()
    }
}

impl fmt::Display for TargetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum Role {
    Admin,
    TeamManager,
    Employee,
}

impl Role {
    pub fn parse(raw: &str) -> Option<Self> {
        let folded: String = raw
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();

        match folded.as_str() {
            "admin" | "administrator" => Some(Role::Admin),
            "teammanager" | "manager" => Some(Role::TeamManager),
            "employee" | "user" => Some(Role::Employee),
            _ => None,
        }
    }
}

/// The authenticated caller, either supplied at login or decoded from the token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub user_id: String,
    pub role: Role,
    pub team_id: Option<String>,
}

/// Visibility boundary of a read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    /// Records owned by the caller.
    Own,
    /// Records belonging to a team.
    Team(String),
    /// Everything the API exposes.
    All,
}

impl Scope {
    /// Default scope for a role. A manager without a team falls back to their own records.
    pub fn for_identity(identity: &Identity) -> Self {
        match identity.role {
            Role::Admin => Scope::All,
            Role::TeamManager => match &identity.team_id {
                Some(team) => Scope::Team(team.clone()),
                None => Scope::Own,
            },
            Role::Employee => Scope::Own,
        }
    }
}

/// Canonical sale or order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedEntry {
    pub id: String,
    pub kind: EntityKind,
    pub client_name: String,
    #[schemars(description = "Non-negative monetary amount")]
    pub amount: f64,
    pub quantity: u64,
    pub date: DateTime<Utc>,
    pub employee_id: Option<String>,
    pub team_id: Option<String>,
}

impl NormalizedEntry {
    pub fn year(&self) -> i32 {
        self.date.year()
    }

    pub fn month(&self) -> u32 {
        self.date.month()
    }

    /// Shape consumed by the chart front-end: the kind-specific fields and
    /// their generic aliases are both present.
    pub fn to_chart_json(&self) -> Value {
        let mut value = json!({
            "id": self.id,
            "_id": self.id,
            "clientName": self.client_name,
            "amount": self.amount,
            "qty": self.quantity,
            "date": self.date.to_rfc3339(),
            "employeeId": self.employee_id,
        });

        if let Value::Object(map) = &mut value {
            map.insert(self.kind.amount_field().to_string(), json!(self.amount));
            map.insert(self.kind.qty_field().to_string(), json!(self.quantity));
        }

        value
    }
}

/// Canonical target assignment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Target {
    pub id: String,
    pub employee_id: String,
    pub target_type: TargetType,
    pub target_amount: f64,
    pub target_qty: f64,
    #[schemars(description = "Calendar month, 1 = January")]
    pub month: u32,
    pub year: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum PerformanceMode {
    #[schemars(description = "Uncapped percentage, used for self-performance charts")]
    Raw,

    #[schemars(description = "Percentage capped at 100, used for comparison tables")]
    Capped,
}

/// One month of a performance series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MonthBucket {
    pub month: u32,
    pub year: i32,
    pub actual_amount: f64,
    pub actual_qty: u64,
    pub target_amount: f64,
    pub target_qty: f64,
    #[schemars(description = "Raw (uncapped) percentage of target reached, 0 when there is no target")]
    pub performance_percent: i64,
}

impl MonthBucket {
    pub fn empty(year: i32, month: u32) -> Self {
        Self {
            month,
            year,
            actual_amount: 0.0,
            actual_qty: 0,
            target_amount: 0.0,
            target_qty: 0.0,
            performance_percent: 0,
        }
    }

    pub fn performance(&self, mode: PerformanceMode) -> i64 {
        crate::merge::performance_percent(self.actual_amount, self.target_amount, mode)
    }
}

/// Payload for adding or updating a sale or order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewEntry {
    pub client_name: String,
    pub amount: f64,
    pub quantity: u64,
    pub date: Option<DateTime<Utc>>,
    pub employee_id: Option<String>,
}

/// Payload for creating or updating a target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetDraft {
    pub employee_id: String,
    pub target_type: TargetType,
    pub target_amount: f64,
    pub target_qty: f64,
    pub month: u32,
    pub year: i32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_target_type_parse_variants() {
        assert_eq!(TargetType::parse("sale"), Some(TargetType::Sale));
        assert_eq!(TargetType::parse(" Sales "), Some(TargetType::Sale));
        assert_eq!(TargetType::parse("ORDERS"), Some(TargetType::Order));
        assert_eq!(TargetType::parse("Order"), Some(TargetType::Order));
        assert_eq!(TargetType::parse("revenue"), None);
    }

    #[test]
    fn test_role_parse_and_scope() {
        assert_eq!(Role::parse("team_manager"), Some(Role::TeamManager));
        assert_eq!(Role::parse("Team Manager"), Some(Role::TeamManager));
        assert_eq!(Role::parse("ADMIN"), Some(Role::Admin));

        let manager = Identity {
            user_id: "u1".to_string(),
            role: Role::TeamManager,
            team_id: Some("t9".to_string()),
        };
        assert_eq!(Scope::for_identity(&manager), Scope::Team("t9".to_string()));

        let orphan = Identity {
            team_id: None,
            ..manager
        };
        assert_eq!(Scope::for_identity(&orphan), Scope::Own);
    }

    #[test]
    fn test_chart_json_carries_both_field_names() {
        let entry = NormalizedEntry {
            id: "s1".to_string(),
            kind: EntityKind::Order,
            client_name: "Acme".to_string(),
            amount: 120.5,
            quantity: 3,
            date: Utc.with_ymd_and_hms(2024, 3, 10, 0, 0, 0).unwrap(),
            employee_id: None,
            team_id: None,
        };

        let wire = entry.to_chart_json();
        assert_eq!(wire["orderAmount"], json!(120.5));
        assert_eq!(wire["amount"], json!(120.5));
        assert_eq!(wire["orderQty"], json!(3));
        assert_eq!(wire["qty"], json!(3));
        assert!(wire.get("salesAmount").is_none());
    }
}
