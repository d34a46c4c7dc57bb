//! Routes, the route guard and the top-level router.

use tokio::sync::watch;
use tracing::debug;

use crate::auth::AuthState;
use crate::dashboard::DashboardKind;
use crate::session::Session;

/// Text shown while the auth state is still loading.
pub const LOADING_MESSAGE: &str = "Loading application data...";

/// Navigable entry points.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Login,
    Register,
    Dashboard,
}

impl Route {
    pub fn path(&self) -> &'static str {
        match self {
            Route::Login => "/login",
            Route::Register => "/register",
            Route::Dashboard => "/dashboard",
        }
    }

    pub fn from_path(path: &str) -> Option<Self> {
        match path.trim_end_matches('/') {
            "/login" => Some(Route::Login),
            "/register" => Some(Route::Register),
            "/dashboard" => Some(Route::Dashboard),
            _ => None,
        }
    }

    pub fn is_protected(&self) -> bool {
        matches!(self, Route::Dashboard)
    }
}

/// What the guard allows for a protected route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    /// Auth state unresolved: show the blocking placeholder, nothing else.
    Placeholder,
    /// Navigate elsewhere instead of rendering.
    Redirect(Route),
    /// Render the guarded subtree for this session.
    Proceed(Session),
}

/// Gates protected routes on the auth state.
#[derive(Debug, Clone, Copy, Default)]
pub struct RouteGuard;

impl RouteGuard {
    pub fn check(state: &AuthState) -> GuardDecision {
        match state {
            AuthState::Loading => GuardDecision::Placeholder,
            AuthState::Unauthenticated => GuardDecision::Redirect(Route::Login),
            AuthState::Authenticated(session) => GuardDecision::Proceed(session.clone()),
        }
    }

    /// Wait until the state leaves `Loading`, then decide.
    ///
    /// If the state machine goes away while still loading, the guard fails
    /// closed and redirects to login.
    pub async fn resolve(rx: &mut watch::Receiver<AuthState>) -> GuardDecision {
        match rx.wait_for(|state| !state.is_loading()).await {
            Ok(state) => Self::check(&state),
            Err(_) => {
                debug!("Auth state closed while loading");
                GuardDecision::Redirect(Route::Login)
            }
        }
    }
}

/// Rendered outcome of a navigation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum View {
    Placeholder,
    Login,
    Register,
    Dashboard { kind: DashboardKind, session: Session },
}

/// Maps paths to views. Unknown paths land on login.
#[derive(Debug, Clone, Copy, Default)]
pub struct Router;

impl Router {
    pub fn resolve(path: &str, state: &AuthState) -> View {
        let route = Route::from_path(path).unwrap_or(Route::Login);
        Self::view_for(route, state)
    }

    pub fn view_for(route: Route, state: &AuthState) -> View {
        match route {
            Route::Login => View::Login,
            Route::Register => View::Register,
            Route::Dashboard => match RouteGuard::check(state) {
                GuardDecision::Placeholder => View::Placeholder,
                GuardDecision::Redirect(to) => {
                    debug!(from = route.path(), to = to.path(), "Redirecting");
                    Self::view_for(to, state)
                }
                GuardDecision::Proceed(session) => View::Dashboard {
                    kind: DashboardKind::for_role(&session.role),
                    session,
                },
            },
        }
    }
}
