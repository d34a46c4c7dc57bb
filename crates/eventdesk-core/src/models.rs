//! Domain models exchanged with the event API.

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::session::Role;

/// Parse a timestamp as sent by the API or typed into a form.
///
/// Accepts RFC 3339 and zone-less `YYYY-MM-DDTHH:MM[:SS]` (read as UTC).
pub fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
            return Ok(naive.and_utc());
        }
    }
    Err(Error::Validation(format!("Invalid date/time: {}", value)))
}

/// Render a timestamp the way drafts are sent.
pub fn format_timestamp(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Secs, true)
}

mod wire_time {
    use chrono::{DateTime, Utc};
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::format_timestamp(value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        super::parse_timestamp(&raw).map_err(de::Error::custom)
    }

    pub mod option {
        use chrono::{DateTime, Utc};
        use serde::{Serialize, Serializer};

        pub fn serialize<S: Serializer>(
            value: &Option<DateTime<Utc>>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            value.map(|v| super::super::format_timestamp(&v)).serialize(serializer)
        }
    }
}

fn default_true() -> bool {
    true
}

/// Event owner, nested user object or bare id depending on the serializer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OwnerRef {
    User {
        #[serde(default)]
        id: Option<i64>,
        username: String,
    },
    Id(i64),
}

impl OwnerRef {
    pub fn username(&self) -> Option<&str> {
        match self {
            OwnerRef::User { username, .. } => Some(username),
            OwnerRef::Id(_) => None,
        }
    }
}

/// Event as returned by the API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub location: String,
    #[serde(with = "wire_time")]
    pub start_time: DateTime<Utc>,
    #[serde(with = "wire_time")]
    pub end_time: DateTime<Utc>,
    #[serde(default = "default_true")]
    pub is_public: bool,
    #[serde(default)]
    pub created_by: Option<OwnerRef>,
    #[serde(default)]
    pub is_rsvped: bool,
}

impl Event {
    pub fn owner_name(&self) -> &str {
        self.created_by
            .as_ref()
            .and_then(OwnerRef::username)
            .unwrap_or("N/A")
    }
}

/// Form state for creating or editing an event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EventDraft {
    pub title: String,
    pub description: String,
    pub location: String,
    #[serde(with = "wire_time::option")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(with = "wire_time::option")]
    pub end_time: Option<DateTime<Utc>>,
    pub is_public: bool,
}

impl EventDraft {
    /// Draft pre-filled from an existing event, for editing.
    pub fn from_event(event: &Event) -> Self {
        Self {
            title: event.title.clone(),
            description: event.description.clone(),
            location: event.location.clone(),
            start_time: Some(event.start_time),
            end_time: Some(event.end_time),
            is_public: event.is_public,
        }
    }

    /// Set the start from form input.
    pub fn with_start(mut self, input: &str) -> Result<Self> {
        self.start_time = Some(parse_timestamp(input)?);
        Ok(self)
    }

    /// Set the end from form input.
    pub fn with_end(mut self, input: &str) -> Result<Self> {
        self.end_time = Some(parse_timestamp(input)?);
        Ok(self)
    }

    /// Required fields are present and the event ends after it starts.
    pub fn validate(&self) -> Result<()> {
        let (start, end) = match (self.start_time, self.end_time) {
            (Some(start), Some(end)) if !self.title.trim().is_empty() => (start, end),
            _ => {
                return Err(Error::Validation(
                    "Please fill all required fields (Title, Start Time, End Time).".to_string(),
                ))
            }
        };
        if end <= start {
            return Err(Error::Validation("End time must be after start time.".to_string()));
        }
        Ok(())
    }
}

/// Registered user, as listed for admins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub role: Role,
}

/// Registration / admin user-creation form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password: String,
    pub role: Role,
}

impl NewUser {
    pub fn validate(&self) -> Result<()> {
        if self.username.trim().is_empty() || self.email.trim().is_empty() || self.password.is_empty() {
            return Err(Error::Validation("Please fill all required user fields.".to_string()));
        }
        Ok(())
    }
}

/// Username/password exchange body.
#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

/// Tokens issued on login.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenPair {
    pub access: String,
    #[serde(default)]
    pub refresh: Option<String>,
    #[serde(default)]
    pub role: Option<Role>,
}

/// Answer of `toggle_public`.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct Visibility {
    pub is_public: bool,
}

/// List endpoints answer with a bare array or a paginated page.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ListResponse<T> {
    Plain(Vec<T>),
    Paginated {
        #[serde(default = "Vec::new")]
        results: Vec<T>,
    },
}

impl<T> ListResponse<T> {
    pub fn into_items(self) -> Vec<T> {
        match self {
            ListResponse::Plain(items) => items,
            ListResponse::Paginated { results } => results,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_timestamp_forms() {
        let expected = parse_timestamp("2024-01-01T09:00:00Z").unwrap();
        assert_eq!(parse_timestamp("2024-01-01T09:00").unwrap(), expected);
        assert_eq!(parse_timestamp("2024-01-01T09:00:00").unwrap(), expected);
        assert_eq!(parse_timestamp("2024-01-01T10:00:00+01:00").unwrap(), expected);
        assert_eq!(format_timestamp(&expected), "2024-01-01T09:00:00Z");
        assert!(matches!(parse_timestamp("tomorrow"), Err(Error::Validation(_))));
    }

    #[test]
    fn test_event_deserialization() {
        let event: Event = serde_json::from_value(json!({
            "id": 4,
            "title": "Standup",
            "description": "",
            "location": "Room 1",
            "start_time": "2024-01-01T09:00:00Z",
            "end_time": "2024-01-01T09:30:00Z",
            "is_public": false,
            "created_by": {"id": 2, "username": "mo", "email": "mo@example.com", "role": "manager"},
            "created_at": "2023-12-31T10:00:00Z"
        }))
        .unwrap();

        assert_eq!(event.owner_name(), "mo");
        assert!(!event.is_public);
        assert!(!event.is_rsvped);
        assert_eq!(event.end_time - event.start_time, chrono::Duration::minutes(30));
    }

    #[test]
    fn test_event_owner_id_and_defaults() {
        let event: Event = serde_json::from_value(json!({
            "id": 1,
            "title": "Party",
            "start_time": "2024-05-01T18:00",
            "end_time": "2024-05-01T23:00",
            "created_by": 9
        }))
        .unwrap();
        assert_eq!(event.created_by, Some(OwnerRef::Id(9)));
        assert_eq!(event.owner_name(), "N/A");
        assert!(event.is_public);
        assert_eq!(event.location, "");
    }

    #[test]
    fn test_draft_validation() {
        let draft = EventDraft {
            title: "Standup".to_string(),
            ..Default::default()
        };
        assert!(matches!(draft.validate(), Err(Error::Validation(_))));

        let draft = draft
            .with_start("2024-01-01T09:00")
            .unwrap()
            .with_end("2024-01-01T09:30")
            .unwrap();
        draft.validate().unwrap();

        let blank_title = EventDraft {
            title: "   ".to_string(),
            ..draft.clone()
        };
        assert!(blank_title.validate().is_err());

        let backwards = EventDraft {
            end_time: draft.start_time,
            ..draft
        };
        let err = backwards.validate().unwrap_err();
        assert_eq!(err.to_string(), "End time must be after start time.");
    }

    #[test]
    fn test_draft_serialization() {
        let draft = EventDraft {
            title: "Standup".to_string(),
            is_public: true,
            ..Default::default()
        }
        .with_start("2024-01-01T09:00")
        .unwrap();

        let value = serde_json::to_value(&draft).unwrap();
        assert_eq!(value["start_time"], "2024-01-01T09:00:00Z");
        assert_eq!(value["end_time"], serde_json::Value::Null);
        assert_eq!(value["is_public"], true);
    }

    #[test]
    fn test_new_user_validation() {
        let mut user = NewUser {
            username: "ada".to_string(),
            email: "ada@example.com".to_string(),
            password: String::new(),
            role: Role::Manager,
        };
        assert!(user.validate().is_err());
        user.password = "hunter2".to_string();
        user.validate().unwrap();

        let value = serde_json::to_value(&user).unwrap();
        assert_eq!(value["role"], "manager");
    }

    #[test]
    fn test_list_response_shapes() {
        let plain: ListResponse<User> = serde_json::from_value(json!([
            {"id": 1, "username": "a", "email": "a@x", "role": "admin"}
        ]))
        .unwrap();
        assert_eq!(plain.into_items()[0].role, Role::Admin);

        let page: ListResponse<User> = serde_json::from_value(json!({
            "count": 1, "next": null, "results": [{"id": 2, "username": "b"}]
        }))
        .unwrap();
        let items = page.into_items();
        assert_eq!(items[0].username, "b");
        assert_eq!(items[0].role, Role::User);
    }
}
