//! EventDesk client core
//!
//! Client side of the event management API.
//!
//! This crate provides:
//! - Session-scoped token storage and credential decoding
//! - The auth state machine and the route guard built on it
//! - Role-based dashboard selection and loading
//! - The event API HTTP client
//! - Optimistic RSVP updates with rollback

pub mod api;
pub mod auth;
pub mod claims;
pub mod clock;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod models;
pub mod notice;
pub mod result_ext;
pub mod routing;
pub mod rsvp;
pub mod session;
pub mod token_store;

pub use api::EventApi;
pub use auth::{AuthMachine, AuthState};
pub use config::ApiConfig;
pub use dashboard::{Dashboard, DashboardKind};
pub use error::{Error, Result};
pub use notice::Notice;
pub use routing::{GuardDecision, Route, RouteGuard, Router, View};
pub use rsvp::{RsvpBackend, RsvpBoard};
pub use session::{Role, Session};
pub use token_store::{Credential, FileStorage, MemoryStorage, SessionStorage, TokenStore};
