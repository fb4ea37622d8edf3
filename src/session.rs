use crate::error::{PerformanceError, Result};
use crate::normalize::reference_id;
use crate::schema::{Identity, Role};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::Utc;
use log::debug;
use serde_json::Value;
use std::sync::OnceLock;

/// Caller-owned session state handed to every read and write.
///
/// The identity is either supplied at login or decoded from the bearer token
/// on first use and cached for the lifetime of the context.
#[derive(Debug, Default)]
pub struct SessionContext {
    token: Option<String>,
    identity: OnceLock<Identity>,
    profile: Option<Value>,
}

impl SessionContext {
    pub fn new(token: impl Into<String>) -> Self {
        let token = token.into();
        Self {
            token: (!token.trim().is_empty()).then_some(token),
            identity: OnceLock::new(),
            profile: None,
        }
    }

    /// A context with no token. Every read returns nothing and every write is rejected.
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn with_identity(self, identity: Identity) -> Self {
        let cell = OnceLock::new();
        let _ = cell.set(identity);
        Self {
            identity: cell,
            ..self
        }
    }

    pub fn with_profile(mut self, profile: Value) -> Self {
        self.profile = Some(profile);
        self
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn profile(&self) -> Option<&Value> {
        self.profile.as_ref()
    }

    pub fn cached_identity(&self) -> Option<&Identity> {
        self.identity.get()
    }

    /// Returns the caller's identity, decoding it from the token the first time.
    pub fn identity(&self) -> Result<&Identity> {
        if let Some(identity) = self.identity.get() {
            return Ok(identity);
        }

        let token = self
            .token
            .as_deref()
            .ok_or_else(|| PerformanceError::Token("no session token".to_string()))?;
        let decoded = decode_identity(token)?;
        debug!("Decoded session identity for user {}", decoded.user_id);

        Ok(self.identity.get_or_init(|| decoded))
    }
}

/// Decodes the identity carried in a JWT-style token payload.
///
/// The signature is not verified: the API does that on every request.
pub fn decode_identity(token: &str) -> Result<Identity> {
    let payload = decode_payload(token)?;

    if let Some(exp) = payload.get("exp").and_then(Value::as_i64) {
        if exp < Utc::now().timestamp() {
            return Err(PerformanceError::Token(format!(
                "token expired at {}",
                exp
            )));
        }
    }

    // Some issuers nest the claims under `user`
    let claims = payload
        .get("user")
        .filter(|u| u.is_object())
        .unwrap_or(&payload);

    let user_id = ["id", "_id", "userId", "sub"]
        .iter()
        .find_map(|key| claims.get(key).and_then(reference_id))
        .ok_or_else(|| PerformanceError::Token("payload has no user id".to_string()))?;

    let role = claims
        .get("role")
        .and_then(Value::as_str)
        .and_then(Role::parse)
        .unwrap_or(Role::Employee);

    let team_id = ["teamId", "team"]
        .iter()
        .find_map(|key| claims.get(key).and_then(reference_id));

    Ok(Identity {
        user_id,
        role,
        team_id,
    })
}

fn decode_payload(token: &str) -> Result<Value> {
    let token = token.trim().trim_start_matches("Bearer ").trim();
    let segment = token
        .split('.')
        .nth(1)
        .ok_or_else(|| PerformanceError::Token("token is not a JWT".to_string()))?;

    let bytes = URL_SAFE_NO_PAD
        .decode(segment.trim_end_matches('='))
        .map_err(|e| PerformanceError::Token(format!("payload is not base64url: {}", e)))?;

    let payload: Value = serde_json::from_slice(&bytes)
        .map_err(|e| PerformanceError::Token(format!("payload is not JSON: {}", e)))?;

    if !payload.is_object() {
        return Err(PerformanceError::Token(
            "payload is not a JSON object".to_string(),
        ));
    }

    Ok(payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn token_with(claims: Value) -> String {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
        let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
        format!("{}.{}.signature", header, payload)
    }

    #[test]
    fn test_decode_identity_claims() {
        let token = token_with(json!({ "id": "u42", "role": "team_manager", "teamId": "t1" }));
        let identity = decode_identity(&token).unwrap();
        assert_eq!(identity.user_id, "u42");
        assert_eq!(identity.role, Role::TeamManager);
        assert_eq!(identity.team_id.as_deref(), Some("t1"));
    }

    #[test]
    fn test_decode_nested_user_claims_and_default_role() {
        let token = token_with(json!({ "user": { "_id": "u7" } }));
        let identity = decode_identity(&token).unwrap();
        assert_eq!(identity.user_id, "u7");
        assert_eq!(identity.role, Role::Employee);
    }

    #[test]
    fn test_decode_failures() {
        assert!(decode_identity("garbage").is_err());
        assert!(decode_identity("a.!!!.c").is_err());
        assert!(decode_identity(&token_with(json!({ "role": "admin" }))).is_err());
        assert!(decode_identity(&token_with(json!({ "id": "u1", "exp": 1_000 }))).is_err());
    }

    #[test]
    fn test_identity_is_cached_after_first_decode() {
        let session = SessionContext::new(token_with(json!({ "sub": "u9", "role": "admin" })));
        assert!(session.cached_identity().is_none());

        let first = session.identity().unwrap().clone();
        assert_eq!(first.role, Role::Admin);
        assert_eq!(session.cached_identity(), Some(&first));
    }

    #[test]
    fn test_supplied_identity_wins_over_token() {
        let supplied = Identity {
            user_id: "login-id".to_string(),
            role: Role::Employee,
            team_id: None,
        };
        let session = SessionContext::new("not-a-jwt").with_identity(supplied.clone());
        assert_eq!(session.identity().unwrap(), &supplied);
    }

    #[test]
    fn test_anonymous_session_has_no_identity() {
        let session = SessionContext::anonymous();
        assert!(session.token().is_none());
        assert!(session.identity().is_err());

        assert!(SessionContext::new("   ").token().is_none());
    }
}
