//! Role-based dashboard selection and loading.

use async_trait::async_trait;
use tracing::{debug, info};

use crate::api::EventApi;
use crate::error::Result;
use crate::models::{Event, User};
use crate::rsvp::RsvpBoard;
use crate::session::Role;

/// Shown when a dashboard has no events to list.
pub const NO_EVENTS_MESSAGE: &str = "No events are currently available.";

/// Which dashboard a session gets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DashboardKind {
    Admin,
    Manager,
    User,
}

impl DashboardKind {
    /// Roles the client doesn't know get the least-privileged view.
    pub fn for_role(role: &Role) -> Self {
        match role {
            Role::Admin => DashboardKind::Admin,
            Role::Manager => DashboardKind::Manager,
            Role::User | Role::Other(_) => DashboardKind::User,
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            DashboardKind::Admin => "Admin Dashboard",
            DashboardKind::Manager => "Manager Dashboard",
            DashboardKind::User => "User Dashboard",
        }
    }

    pub fn can_manage_events(&self) -> bool {
        matches!(self, DashboardKind::Admin | DashboardKind::Manager)
    }

    pub fn can_manage_users(&self) -> bool {
        matches!(self, DashboardKind::Admin)
    }
}

/// Read side of the API a dashboard needs.
#[async_trait]
pub trait DashboardSource: Send + Sync {
    async fn list_events(&self) -> Result<Vec<Event>>;
    async fn list_users(&self) -> Result<Vec<User>>;
}

#[async_trait]
impl DashboardSource for EventApi {
    async fn list_events(&self) -> Result<Vec<Event>> {
        EventApi::list_events(self).await
    }

    async fn list_users(&self) -> Result<Vec<User>> {
        EventApi::list_users(self).await
    }
}

/// Data behind one open dashboard. Rebuilt on every open or refresh.
#[derive(Debug, Clone)]
pub struct Dashboard {
    pub kind: DashboardKind,
    pub events: Vec<Event>,
    /// Empty unless the dashboard manages users.
    pub users: Vec<User>,
    pub rsvp: RsvpBoard,
}

impl Dashboard {
    /// Fetch what `kind` displays. The admin view loads events and users
    /// concurrently and fails if either fails.
    pub async fn load<S: DashboardSource + ?Sized>(kind: DashboardKind, source: &S) -> Result<Self> {
        debug!(kind = ?kind, "Loading dashboard");

        let (events, users) = if kind.can_manage_users() {
            tokio::try_join!(source.list_events(), source.list_users())?
        } else {
            (source.list_events().await?, Vec::new())
        };

        info!(kind = ?kind, events = events.len(), users = users.len(), "Dashboard loaded");
        Ok(Self {
            kind,
            rsvp: RsvpBoard::from_events(&events),
            events,
            users,
        })
    }

    pub fn event(&self, id: i64) -> Option<&Event> {
        self.events.iter().find(|e| e.id == id)
    }

    /// Events with their RSVP flags as currently displayed.
    pub fn visible_events(&self) -> Vec<Event> {
        let mut events = self.events.clone();
        self.rsvp.apply(&mut events);
        events
    }

    /// Record a server-confirmed visibility change.
    pub fn set_public(&mut self, id: i64, is_public: bool) {
        if let Some(event) = self.events.iter_mut().find(|e| e.id == id) {
            event.is_public = is_public;
        }
    }

    pub fn remove_event(&mut self, id: i64) {
        self.events.retain(|e| e.id != id);
    }

    pub fn remove_user(&mut self, id: i64) {
        self.users.retain(|u| u.id != id);
    }
}
