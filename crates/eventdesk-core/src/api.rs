//! Event API HTTP client.
//!
//! Every call is one request carrying the current credential as a bearer
//! token. Failures come back as [`Error::Network`] with the server's own
//! message when it sent one. There are no retries.

use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::ApiConfig;
use crate::error::{Error, Result};
use crate::models::{Event, EventDraft, ListResponse, LoginRequest, NewUser, TokenPair, User, Visibility};
use crate::token_store::Credential;

/// HTTP client for the event API.
#[derive(Clone)]
pub struct EventApi {
    client: reqwest::Client,
    base_url: String,
    credential: Option<Credential>,
}

impl EventApi {
    /// Create a new client without a credential.
    pub fn new(config: &ApiConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_default();

        Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            credential: None,
        }
    }

    /// Attach the credential sent with every request.
    pub fn with_credential(mut self, credential: Option<Credential>) -> Self {
        self.credential = credential;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = self.url(path);
        debug!(method = %method, url = %url, "API request");
        let request = self.client.request(method, url);
        match &self.credential {
            Some(credential) => request.bearer_auth(credential.as_str()),
            None => request,
        }
    }

    async fn dispatch(request: RequestBuilder, fallback: &str) -> Result<Response> {
        let response = request.send().await.map_err(|e| {
            warn!(error = %e, "API request failed");
            Error::network(fallback)
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<Value>(&body)
            .ok()
            .and_then(|v| server_message(&v))
            .unwrap_or_else(|| fallback.to_string());
        warn!(status = status.as_u16(), message = %message, "API request rejected");

        Err(Error::Network {
            status: Some(status.as_u16()),
            message,
        })
    }

    async fn fetch<T: DeserializeOwned>(request: RequestBuilder, fallback: &str) -> Result<T> {
        let response = Self::dispatch(request, fallback).await?;
        response.json::<T>().await.map_err(|e| {
            warn!(error = %e, "Unexpected API response body");
            Error::network(fallback)
        })
    }

    async fn execute(request: RequestBuilder, fallback: &str) -> Result<()> {
        Self::dispatch(request, fallback).await.map(|_| ())
    }

    fn with_body<B: Serialize>(&self, method: Method, path: &str, body: &B) -> RequestBuilder {
        self.request(method, path).json(body)
    }

    // Authentication

    /// Exchange username and password for a credential.
    pub async fn obtain_token(&self, username: &str, password: &str) -> Result<TokenPair> {
        let body = LoginRequest { username, password };
        let request = self.client.post(self.url("auth/token/")).json(&body);
        Self::fetch(request, "Invalid credentials").await
    }

    /// Self-service registration.
    pub async fn register(&self, user: &NewUser) -> Result<User> {
        user.validate()?;
        let request = self.client.post(self.url("auth/register/")).json(user);
        Self::fetch(request, "Error registering user. Please check your inputs.").await
    }

    // Events

    pub async fn list_events(&self) -> Result<Vec<Event>> {
        let list: ListResponse<Event> =
            Self::fetch(self.request(Method::GET, "events/"), "Failed to load events").await?;
        Ok(list.into_items())
    }

    pub async fn create_event(&self, draft: &EventDraft) -> Result<Event> {
        draft.validate()?;
        let request = self.with_body(Method::POST, "events/", draft);
        Self::fetch(request, "Failed to create event.").await
    }

    pub async fn update_event(&self, id: i64, draft: &EventDraft) -> Result<Event> {
        draft.validate()?;
        let request = self.with_body(Method::PUT, &format!("events/{}/", id), draft);
        Self::fetch(request, "Failed to update event.").await
    }

    pub async fn delete_event(&self, id: i64) -> Result<()> {
        let request = self.request(Method::DELETE, &format!("events/{}/", id));
        Self::execute(request, "Failed to delete event.").await
    }

    /// Flip visibility server-side; returns the new value.
    pub async fn toggle_public(&self, id: i64) -> Result<bool> {
        let request = self.with_body(Method::POST, &format!("events/{}/toggle_public/", id), &serde_json::json!({}));
        let visibility: Visibility = Self::fetch(request, "Failed to toggle visibility.").await?;
        Ok(visibility.is_public)
    }

    pub async fn rsvp(&self, id: i64) -> Result<()> {
        let request = self.with_body(Method::POST, &format!("events/{}/rsvp/", id), &serde_json::json!({}));
        Self::execute(request, "Could not complete action.").await
    }

    pub async fn cancel_rsvp(&self, id: i64) -> Result<()> {
        let request = self.request(Method::DELETE, &format!("events/{}/rsvp/", id));
        Self::execute(request, "Could not complete action.").await
    }

    // Users

    pub async fn list_users(&self) -> Result<Vec<User>> {
        let list: ListResponse<User> =
            Self::fetch(self.request(Method::GET, "users/"), "Failed to load users").await?;
        Ok(list.into_items())
    }

    pub async fn create_user(&self, user: &NewUser) -> Result<User> {
        user.validate()?;
        let request = self.with_body(Method::POST, "auth/register/", user);
        Self::fetch(request, "Failed to create user.").await
    }

    pub async fn delete_user(&self, id: i64) -> Result<()> {
        let request = self.request(Method::DELETE, &format!("users/{}/", id));
        Self::execute(request, "Failed to delete user.").await
    }
}

/// Human-readable message from an error body.
///
/// Looks at `detail`, `error` and `message`, then at the first field error
/// of a validation response (`{"title": ["This field is required."]}`).
fn server_message(body: &Value) -> Option<String> {
    for key in ["detail", "error", "message"] {
        if let Some(msg) = body.get(key).and_then(Value::as_str) {
            let msg = msg.trim();
            if !msg.is_empty() {
                return Some(msg.to_string());
            }
        }
    }

    let fields = body.as_object()?;
    let mut keys: Vec<&String> = fields.keys().collect();
    keys.sort_unstable_by(|a, b| {
        let rank = |k: &str| (k != "non_field_errors", k.to_string());
        rank(a).cmp(&rank(b))
    });
    keys.into_iter().find_map(|key| {
        let first = match &fields[key] {
            Value::Array(items) => items.first().and_then(Value::as_str),
            Value::String(s) => Some(s.as_str()),
            _ => None,
        }?;
        if key == "non_field_errors" {
            Some(first.to_string())
        } else {
            Some(format!("{}: {}", key, first))
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_client_creation() {
        let api = EventApi::new(&ApiConfig::new("http://localhost:8000/api/"));
        assert_eq!(api.base_url(), "http://localhost:8000/api");
        assert_eq!(api.url("/events/"), "http://localhost:8000/api/events/");
        assert_eq!(api.url("events/3/rsvp/"), "http://localhost:8000/api/events/3/rsvp/");
    }

    #[test]
    fn test_server_message_detail() {
        assert_eq!(
            server_message(&json!({"detail": "Not allowed"})).as_deref(),
            Some("Not allowed")
        );
        assert_eq!(
            server_message(&json!({"error": "Invalid or expired session"})).as_deref(),
            Some("Invalid or expired session")
        );
    }

    #[test]
    fn test_server_message_field_errors() {
        let body = json!({
            "title": ["This field is required."],
            "end_time": ["This field is required."]
        });
        assert_eq!(
            server_message(&body).as_deref(),
            Some("end_time: This field is required.")
        );

        let body = json!({"title": ["x"], "non_field_errors": ["Already RSVPed."]});
        assert_eq!(server_message(&body).as_deref(), Some("Already RSVPed."));
    }

    #[test]
    fn test_server_message_absent() {
        assert!(server_message(&json!({"detail": ""})).is_none());
        assert!(server_message(&json!([1, 2])).is_none());
        assert!(server_message(&json!({"count": 3})).is_none());
    }

    #[tokio::test]
    async fn test_validation_happens_before_request() {
        // nothing listens on port 9; a request would fail with Network
        let api = EventApi::new(&ApiConfig::new("http://127.0.0.1:9"));
        let err = api.create_event(&EventDraft::default()).await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));

        let err = api.create_user(&NewUser::default()).await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[tokio::test]
    async fn test_unreachable_server_gives_generic_message() {
        let api = EventApi::new(&ApiConfig::new("http://127.0.0.1:9"));
        match api.list_events().await {
            Err(Error::Network { status, message }) => {
                assert_eq!(status, None);
                assert_eq!(message, "Failed to load events");
            }
            other => panic!("unexpected result {:?}", other),
        }
    }
}
