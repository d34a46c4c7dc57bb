//! Authentication state machine.
//!
//! `AuthMachine` is the only writer of the session. Views observe it through
//! a watch receiver (see [`AuthMachine::subscribe`]) or a snapshot of
//! [`AuthMachine::state`]; nothing else mutates it.
//!
//! ```text
//! Loading --restore--> Authenticated(session) | Unauthenticated
//! any     --login----> Authenticated(session)
//! any     --logout---> Unauthenticated
//! ```
//!
//! Expiry is only checked by `restore`. A session that expires while in use
//! stays authenticated until the next restore or until the server rejects a
//! request.

use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::claims;
use crate::clock::{Clock, SystemClock};
use crate::error::{Error, Result};
use crate::session::Session;
use crate::token_store::{Credential, SessionStorage, TokenStore};

/// Current authentication state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthState {
    /// Startup check has not finished.
    Loading,
    Unauthenticated,
    Authenticated(Session),
}

impl AuthState {
    pub fn session(&self) -> Option<&Session> {
        match self {
            AuthState::Authenticated(session) => Some(session),
            _ => None,
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, AuthState::Loading)
    }
}

/// Owns the token store and the session derived from it.
pub struct AuthMachine<S, C = SystemClock> {
    store: TokenStore<S>,
    clock: C,
    state: watch::Sender<AuthState>,
}

impl<S: SessionStorage> AuthMachine<S, SystemClock> {
    pub fn with_system_clock(store: TokenStore<S>) -> Self {
        Self::new(store, SystemClock)
    }
}

impl<S: SessionStorage, C: Clock> AuthMachine<S, C> {
    /// New machine in the `Loading` state.
    pub fn new(store: TokenStore<S>, clock: C) -> Self {
        let (state, _) = watch::channel(AuthState::Loading);
        Self { store, clock, state }
    }

    /// Snapshot of the current state.
    pub fn state(&self) -> AuthState {
        self.state.borrow().clone()
    }

    /// Receiver that observes every transition.
    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.state.subscribe()
    }

    /// Stored credential while authenticated.
    pub fn credential(&self) -> Result<Option<Credential>> {
        if self.state.borrow().session().is_none() {
            return Ok(None);
        }
        self.store.load()
    }

    /// Startup transition: derive the session from the stored credential.
    ///
    /// Undecodable or expired credentials are removed from storage.
    pub fn restore(&mut self) -> AuthState {
        let next = match self.store.load() {
            Ok(None) => {
                debug!("No stored credential");
                AuthState::Unauthenticated
            }
            Ok(Some(credential)) => {
                let now = self.clock.now();
                match claims::decode(&credential).and_then(|c| c.ensure_live(now)) {
                    Ok(claims) => {
                        debug!(user_id = claims.user_id, role = %claims.role, "Session restored");
                        AuthState::Authenticated(claims.into())
                    }
                    Err(Error::Expired) => {
                        debug!("Stored credential expired");
                        self.discard();
                        AuthState::Unauthenticated
                    }
                    Err(e) => {
                        warn!(error = %e, "Stored credential rejected");
                        self.discard();
                        AuthState::Unauthenticated
                    }
                }
            }
            Err(e) => {
                warn!(error = %e, "Could not read stored credential");
                AuthState::Unauthenticated
            }
        };

        self.state.send_replace(next.clone());
        next
    }

    /// Adopt a freshly issued credential.
    ///
    /// A malformed credential is returned as an error and leaves both the
    /// state and the store untouched. Expiry is not checked.
    pub fn login(&mut self, credential: Credential) -> Result<Session> {
        let session: Session = claims::decode(&credential)?.into();
        self.store.save(&credential)?;

        info!(user = %session.username, role = %session.role, "Logged in");
        self.state
            .send_replace(AuthState::Authenticated(session.clone()));
        Ok(session)
    }

    /// Drop the credential and the session. Safe to call in any state.
    pub fn logout(&mut self) -> Result<()> {
        let cleared = self.store.clear();
        let previous = self.state.send_replace(AuthState::Unauthenticated);
        if let Some(session) = previous.session() {
            info!(user = %session.username, "Logged out");
        }
        cleared
    }

    fn discard(&self) {
        if let Err(e) = self.store.clear() {
            warn!(error = %e, "Failed to clear stored credential");
        }
    }
}
