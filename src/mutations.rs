use crate::config::Endpoint;
use crate::error::{PerformanceError, Result};
use crate::fetcher::{endpoint_for, PerformanceClient};
use crate::normalize::{normalize_entry, normalize_target};
use crate::schema::{EntityKind, NewEntry, NormalizedEntry, Target, TargetDraft};
use crate::session::SessionContext;
use crate::transport::{HttpMethod, Transport};
use crate::utils::{join_url, validate_month};
use chrono::Utc;
use log::{info, warn};
use serde_json::{json, Map, Value};

pub fn validate_entry(entry: &NewEntry) -> Result<()> {
    if entry.client_name.trim().is_empty() {
        return Err(PerformanceError::Validation(
            "clientName is required".to_string(),
        ));
    }
    if !entry.amount.is_finite() || entry.amount <= 0.0 {
        return Err(PerformanceError::Validation(
            "amount must be greater than zero".to_string(),
        ));
    }
    if entry.quantity == 0 {
        return Err(PerformanceError::Validation(
            "quantity must be at least 1".to_string(),
        ));
    }
    Ok(())
}

pub fn validate_target(draft: &TargetDraft) -> Result<()> {
    if draft.employee_id.trim().is_empty() {
        return Err(PerformanceError::Validation(
            "employeeId is required".to_string(),
        ));
    }
    validate_month(draft.month)?;
    if draft.year <= 0 {
        return Err(PerformanceError::Validation(format!(
            "year must be positive, got {}",
            draft.year
        )));
    }
    if !draft.target_amount.is_finite() || draft.target_amount < 0.0 {
        return Err(PerformanceError::Validation(
            "targetAmount must not be negative".to_string(),
        ));
    }
    if !draft.target_qty.is_finite() || draft.target_qty < 0.0 {
        return Err(PerformanceError::Validation(
            "targetQty must not be negative".to_string(),
        ));
    }
    Ok(())
}

/// Request body for a sale or order, carrying both the kind-specific and generic field names.
pub fn entry_body(kind: EntityKind, entry: &NewEntry, employee_id: Option<&str>) -> Value {
    let date = entry.date.unwrap_or_else(Utc::now);
    let mut body = Map::new();
    body.insert("clientName".to_string(), json!(entry.client_name.trim()));
    body.insert(kind.amount_field().to_string(), json!(entry.amount));
    body.insert("amount".to_string(), json!(entry.amount));
    body.insert(kind.qty_field().to_string(), json!(entry.quantity));
    body.insert("qty".to_string(), json!(entry.quantity));
    body.insert("date".to_string(), json!(date.to_rfc3339()));

    if let Some(employee) = entry.employee_id.as_deref().or(employee_id) {
        body.insert("employeeId".to_string(), json!(employee));
    }

    Value::Object(body)
}

pub fn target_body(draft: &TargetDraft) -> Value {
    json!({
        "employeeId": draft.employee_id.trim(),
        "targetType": draft.target_type.as_str(),
        "targetAmount": draft.target_amount,
        "targetQty": draft.target_qty,
        "month": draft.month,
        "year": draft.year,
    })
}

/// Overlays the record returned by a write onto the submitted body so that
/// sparse responses (`{"message": "created", "_id": ...}`) still normalize fully.
fn merge_response(submitted: &Value, response: Value, singular: &str) -> Value {
    let record = match response {
        Value::Object(mut map) => match map.remove(singular).or_else(|| map.remove("data")) {
            Some(Value::Object(inner)) => inner,
            _ => map,
        },
        Value::Array(items) => match items.into_iter().next() {
            Some(Value::Object(inner)) => inner,
            _ => Map::new(),
        },
        _ => Map::new(),
    };

    let mut merged = submitted.as_object().cloned().unwrap_or_default();
    for (key, value) in record {
        if key != "message" && key != "success" {
            merged.insert(key, value);
        }
    }
    Value::Object(merged)
}

fn require_token(session: &SessionContext) -> Result<&str> {
    session
        .token()
        .ok_or_else(|| PerformanceError::Authorization {
            status: 401,
            message: Some("no session token".to_string()),
        })
}

fn require_id(id: &str) -> Result<&str> {
    let id = id.trim();
    if id.is_empty() {
        return Err(PerformanceError::Validation("id is required".to_string()));
    }
    Ok(id)
}

impl<T: Transport> PerformanceClient<T> {
    pub async fn add_sale(&self, session: &SessionContext, entry: &NewEntry) -> Result<NormalizedEntry> {
        self.create_entry(session, EntityKind::Sale, entry).await
    }

    pub async fn add_order(&self, session: &SessionContext, entry: &NewEntry) -> Result<NormalizedEntry> {
        self.create_entry(session, EntityKind::Order, entry).await
    }

    pub async fn create_entry(
        &self,
        session: &SessionContext,
        kind: EntityKind,
        entry: &NewEntry,
    ) -> Result<NormalizedEntry> {
        validate_entry(entry)?;
        let token = require_token(session)?;
        let owner = session.identity().ok().map(|i| i.user_id.as_str());

        let body = entry_body(kind, entry, owner);
        let url = self.config().endpoint(endpoint_for(kind));
        let response = self
            .send_write(HttpMethod::Post, &url, token, Some(body.clone()))
            .await?;

        let created = normalize_entry(&merge_response(&body, response, kind.as_str()), kind);
        info!("Created {} {} for {}", kind, created.id, created.client_name);
        Ok(created)
    }

    pub async fn update_entry(
        &self,
        session: &SessionContext,
        kind: EntityKind,
        id: &str,
        entry: &NewEntry,
    ) -> Result<NormalizedEntry> {
        let id = require_id(id)?;
        validate_entry(entry)?;
        let token = require_token(session)?;

        let mut body = entry_body(kind, entry, None);
        body["_id"] = json!(id);
        let url = join_url(&self.config().endpoint(endpoint_for(kind)), id);
        let response = self
            .send_write(HttpMethod::Put, &url, token, Some(body.clone()))
            .await?;

        Ok(normalize_entry(&merge_response(&body, response, kind.as_str()), kind))
    }

    pub async fn delete_entry(&self, session: &SessionContext, kind: EntityKind, id: &str) -> Result<()> {
        let id = require_id(id)?;
        let token = require_token(session)?;
        let url = join_url(&self.config().endpoint(endpoint_for(kind)), id);
        self.send_write(HttpMethod::Delete, &url, token, None).await?;
        info!("Deleted {} {}", kind, id);
        Ok(())
    }

    pub async fn create_target(&self, session: &SessionContext, draft: &TargetDraft) -> Result<Target> {
        validate_target(draft)?;
        let token = require_token(session)?;

        let body = target_body(draft);
        let url = self.config().endpoint(Endpoint::Targets);
        let response = self
            .send_write(HttpMethod::Post, &url, token, Some(body.clone()))
            .await?;

        let created = normalize_target(&merge_response(&body, response, "target"));
        info!(
            "Created {} target {} for employee {} ({}-{:02})",
            created.target_type, created.id, created.employee_id, created.year, created.month
        );
        Ok(created)
    }

    pub async fn update_target(
        &self,
        session: &SessionContext,
        id: &str,
        draft: &TargetDraft,
    ) -> Result<Target> {
        let id = require_id(id)?;
        validate_target(draft)?;
        let token = require_token(session)?;

        let mut body = target_body(draft);
        body["_id"] = json!(id);
        let url = join_url(&self.config().endpoint(Endpoint::Targets), id);
        let response = self
            .send_write(HttpMethod::Put, &url, token, Some(body.clone()))
            .await?;

        Ok(normalize_target(&merge_response(&body, response, "target")))
    }

    pub async fn delete_target(&self, session: &SessionContext, id: &str) -> Result<()> {
        let id = require_id(id)?;
        let token = require_token(session)?;
        let url = join_url(&self.config().endpoint(Endpoint::Targets), id);
        self.send_write(HttpMethod::Delete, &url, token, None).await?;
        info!("Deleted target {}", id);
        Ok(())
    }

    async fn send_write(
        &self,
        method: HttpMethod,
        url: &str,
        token: &str,
        body: Option<Value>,
    ) -> Result<Value> {
        self.transport()
            .request(method, url, token, body)
            .await
            .map_err(|e| {
                warn!("{} {} failed: {}", method, url, e);
                e
            })
    }
}
