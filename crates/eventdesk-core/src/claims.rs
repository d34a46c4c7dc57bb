//! Credential payload decoding.
//!
//! The signature is NOT verified here. The server that issued the token
//! checks it on every request; the claims decoded on the client only drive
//! personalization and the startup expiry pre-check, and must never be
//! treated as an authorization decision.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::Deserialize;
use serde_json::Value;

use crate::error::{Error, Result};
use crate::session::Role;
use crate::token_store::Credential;

/// Claims read from a credential payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Claims {
    /// From `user_id`, or a numeric `sub`. A payload with neither is
    /// rejected as malformed rather than producing a session without an id.
    pub user_id: i64,
    pub role: Role,
    pub username: String,
    /// Expiry in seconds since the epoch.
    pub expires_at: Option<i64>,
}

impl Claims {
    /// A credential without an expiry never counts as live.
    pub fn is_expired_at(&self, now: i64) -> bool {
        match self.expires_at {
            Some(exp) => exp <= now,
            None => true,
        }
    }

    /// Pass the claims through only while they are live.
    pub fn ensure_live(self, now: i64) -> Result<Self> {
        if self.is_expired_at(now) {
            return Err(Error::Expired);
        }
        Ok(self)
    }
}

#[derive(Debug, Deserialize)]
struct Payload {
    #[serde(default)]
    user_id: Option<Value>,
    #[serde(default)]
    sub: Option<Value>,
    #[serde(default)]
    role: Option<String>,
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    user: Option<String>,
    #[serde(default)]
    exp: Option<Value>,
}

/// Integer claims may arrive as numbers or numeric strings.
fn as_int(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.floor() as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

/// Decode the payload segment of a signed token.
pub fn decode(credential: &Credential) -> Result<Claims> {
    let segments: Vec<&str> = credential.as_str().split('.').collect();
    if segments.len() != 3 {
        return Err(Error::MalformedCredential(format!(
            "expected 3 segments, found {}",
            segments.len()
        )));
    }

    let bytes = URL_SAFE_NO_PAD
        .decode(segments[1].trim_end_matches('='))
        .map_err(|e| Error::MalformedCredential(format!("payload is not base64url: {}", e)))?;

    let payload: Payload = serde_json::from_slice(&bytes)
        .map_err(|e| Error::MalformedCredential(format!("payload is not a JSON object: {}", e)))?;

    let user_id = payload
        .user_id
        .as_ref()
        .and_then(as_int)
        .or_else(|| payload.sub.as_ref().and_then(as_int))
        .ok_or_else(|| Error::MalformedCredential("missing user id".to_string()))?;

    let role = non_empty(payload.role)
        .map(|r| Role::parse(&r))
        .unwrap_or_default();

    let username = non_empty(payload.username)
        .or_else(|| non_empty(payload.user))
        .unwrap_or_default();

    Ok(Claims {
        user_id,
        role,
        username,
        expires_at: payload.exp.as_ref().and_then(as_int),
    })
}
