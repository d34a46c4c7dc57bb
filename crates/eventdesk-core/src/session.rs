//! Roles and the in-memory session derived from a credential.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::claims::Claims;

/// User role as advertised by the credential.
///
/// Unknown role strings are kept verbatim so newer servers can introduce
/// roles without breaking older clients.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Role {
    #[default]
    User,
    Manager,
    Admin,
    Other(String),
}

impl Role {
    pub fn parse(value: &str) -> Self {
        match value {
            "user" => Role::User,
            "manager" => Role::Manager,
            "admin" => Role::Admin,
            other => Role::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Role::User => "user",
            Role::Manager => "manager",
            Role::Admin => "admin",
            Role::Other(s) => s,
        }
    }

    /// Managers and admins may manage events.
    pub fn can_manage_events(&self) -> bool {
        matches!(self, Role::Manager | Role::Admin)
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Role::Admin)
    }
}

impl From<String> for Role {
    fn from(s: String) -> Self {
        Role::parse(&s)
    }
}

impl From<Role> for String {
    fn from(r: Role) -> Self {
        r.as_str().to_string()
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Authenticated user as seen by the client.
///
/// Built only from a credential that passed decoding (and, at startup, the
/// expiry check). The role is a display hint; the server re-checks every
/// privileged request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Session {
    pub user_id: i64,
    pub role: Role,
    pub username: String,
    pub expires_at: Option<i64>,
}

impl From<Claims> for Session {
    fn from(claims: Claims) -> Self {
        Self {
            user_id: claims.user_id,
            role: claims.role,
            username: claims.username,
            expires_at: claims.expires_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_parse() {
        assert_eq!(Role::parse("user"), Role::User);
        assert_eq!(Role::parse("manager"), Role::Manager);
        assert_eq!(Role::parse("admin"), Role::Admin);
        assert_eq!(Role::parse("superuser"), Role::Other("superuser".to_string()));
        assert_eq!(Role::parse("superuser").as_str(), "superuser");
    }

    #[test]
    fn test_role_capabilities() {
        assert!(Role::Admin.can_manage_events());
        assert!(Role::Manager.can_manage_events());
        assert!(!Role::User.can_manage_events());
        assert!(!Role::Other("owner".to_string()).can_manage_events());
        assert!(Role::Admin.is_admin());
        assert!(!Role::Manager.is_admin());
    }

    #[test]
    fn test_role_serde_as_string() {
        let json = serde_json::to_string(&Role::Manager).unwrap();
        assert_eq!(json, "\"manager\"");
        let role: Role = serde_json::from_str("\"auditor\"").unwrap();
        assert_eq!(role, Role::Other("auditor".to_string()));
    }
}
