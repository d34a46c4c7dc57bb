//! Optimistic RSVP updates.
//!
//! Each row moves `Idle{rsvped} -> Pending{target} -> Idle{target}` when the
//! request succeeds, or back to `Idle{!target}` when it fails. The visible
//! flag flips in [`RsvpBoard::begin`], before any request is issued, and a
//! pending row refuses another `begin` until it is settled.
//!
//! `begin` and `settle` are separate so an interactive view can keep
//! handling input while the request is in flight; [`RsvpBoard::toggle`]
//! chains them for one-shot callers.

use async_trait::async_trait;
use std::collections::HashMap;
use tracing::{debug, warn};

use crate::api::EventApi;
use crate::error::{Error, Result};
use crate::models::Event;
use crate::notice::Notice;

/// Network side of an RSVP.
#[async_trait]
pub trait RsvpBackend: Send + Sync {
    async fn rsvp(&self, event_id: i64) -> Result<()>;
    async fn cancel_rsvp(&self, event_id: i64) -> Result<()>;
}

#[async_trait]
impl RsvpBackend for EventApi {
    async fn rsvp(&self, event_id: i64) -> Result<()> {
        EventApi::rsvp(self, event_id).await
    }

    async fn cancel_rsvp(&self, event_id: i64) -> Result<()> {
        EventApi::cancel_rsvp(self, event_id).await
    }
}

/// RSVP state of one event row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RsvpState {
    Idle { rsvped: bool },
    Pending { target: bool },
}

impl RsvpState {
    /// Flag as shown to the user.
    pub fn visible(&self) -> bool {
        match *self {
            RsvpState::Idle { rsvped } => rsvped,
            RsvpState::Pending { target } => target,
        }
    }

    /// Pending rows have their action control disabled.
    pub fn is_pending(&self) -> bool {
        matches!(self, RsvpState::Pending { .. })
    }
}

/// In-flight RSVP for one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RsvpTicket {
    pub event_id: i64,
    /// Flag the user asked for.
    pub target: bool,
}

impl RsvpTicket {
    /// Issue the request matching the target.
    pub async fn send<B: RsvpBackend + ?Sized>(&self, backend: &B) -> Result<()> {
        if self.target {
            backend.rsvp(self.event_id).await
        } else {
            backend.cancel_rsvp(self.event_id).await
        }
    }
}

/// RSVP state for the rows of one dashboard.
#[derive(Debug, Clone, Default)]
pub struct RsvpBoard {
    rows: HashMap<i64, RsvpState>,
}

impl RsvpBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_events(events: &[Event]) -> Self {
        let mut board = Self::new();
        for event in events {
            board.track(event.id, event.is_rsvped);
        }
        board
    }

    /// Start tracking a row, replacing whatever was known about it.
    pub fn track(&mut self, event_id: i64, rsvped: bool) {
        self.rows.insert(event_id, RsvpState::Idle { rsvped });
    }

    /// Take refetched rows, keeping in-flight requests.
    ///
    /// Pending rows that are still listed stay pending so they cannot be
    /// submitted twice; rows no longer listed are dropped.
    pub fn refresh(&mut self, events: &[Event]) {
        let rows = events
            .iter()
            .map(|event| {
                let state = match self.rows.get(&event.id) {
                    Some(pending @ RsvpState::Pending { .. }) => *pending,
                    _ => RsvpState::Idle {
                        rsvped: event.is_rsvped,
                    },
                };
                (event.id, state)
            })
            .collect();
        self.rows = rows;
    }

    pub fn state(&self, event_id: i64) -> Option<RsvpState> {
        self.rows.get(&event_id).copied()
    }

    pub fn is_rsvped(&self, event_id: i64) -> Option<bool> {
        self.state(event_id).map(|s| s.visible())
    }

    pub fn is_pending(&self, event_id: i64) -> bool {
        self.state(event_id).is_some_and(|s| s.is_pending())
    }

    /// Copy the visible flags onto fetched events.
    pub fn apply(&self, events: &mut [Event]) {
        for event in events {
            if let Some(state) = self.rows.get(&event.id) {
                event.is_rsvped = state.visible();
            }
        }
    }

    /// Flip the row optimistically and hand out the request to make.
    pub fn begin(&mut self, event_id: i64) -> Result<RsvpTicket> {
        let row = self
            .rows
            .get_mut(&event_id)
            .ok_or(Error::UnknownEvent(event_id))?;

        let target = match *row {
            RsvpState::Pending { .. } => return Err(Error::RsvpPending(event_id)),
            RsvpState::Idle { rsvped } => !rsvped,
        };
        *row = RsvpState::Pending { target };

        debug!(event_id, target, "RSVP started");
        Ok(RsvpTicket { event_id, target })
    }

    /// Reconcile the row with the request outcome.
    ///
    /// On failure the row goes back to its pre-call value. The returned
    /// notice is what the user should be told either way.
    pub fn settle(&mut self, ticket: RsvpTicket, outcome: Result<()>) -> Notice {
        let settled = match &outcome {
            Ok(()) => ticket.target,
            Err(_) => !ticket.target,
        };

        match self.rows.get_mut(&ticket.event_id) {
            Some(row) if *row == (RsvpState::Pending { target: ticket.target }) => {
                *row = RsvpState::Idle { rsvped: settled };
            }
            // row was reloaded or dropped meanwhile; fresh data wins
            _ => debug!(event_id = ticket.event_id, "RSVP settled for untracked row"),
        }

        match outcome {
            Ok(()) if ticket.target => Notice::info("RSVP successful!"),
            Ok(()) => Notice::info("RSVP canceled."),
            Err(e) => {
                warn!(event_id = ticket.event_id, error = %e, "RSVP rolled back");
                let reason = match e {
                    Error::Network { message, .. } => message,
                    other => other.to_string(),
                };
                Notice::error(format!("Action failed: {}", reason))
            }
        }
    }

    /// Begin, send and settle in one go.
    pub async fn toggle<B: RsvpBackend + ?Sized>(&mut self, event_id: i64, backend: &B) -> Result<Notice> {
        let ticket = self.begin(event_id)?;
        let outcome = ticket.send(backend).await;
        Ok(self.settle(ticket, outcome))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Records calls and answers with a canned result.
    #[derive(Default)]
    struct FakeBackend {
        fail_with: Option<String>,
        calls: Mutex<Vec<(&'static str, i64)>>,
    }

    impl FakeBackend {
        fn failing(message: &str) -> Self {
            Self {
                fail_with: Some(message.to_string()),
                ..Default::default()
            }
        }

        fn answer(&self, call: &'static str, id: i64) -> Result<()> {
            self.calls.lock().unwrap().push((call, id));
            match &self.fail_with {
                Some(message) => Err(Error::Network {
                    status: Some(400),
                    message: message.clone(),
                }),
                None => Ok(()),
            }
        }
    }

    #[async_trait]
    impl RsvpBackend for FakeBackend {
        async fn rsvp(&self, event_id: i64) -> Result<()> {
            self.answer("rsvp", event_id)
        }

        async fn cancel_rsvp(&self, event_id: i64) -> Result<()> {
            self.answer("cancel", event_id)
        }
    }

    #[test]
    fn test_begin_flips_before_request() {
        let mut board = RsvpBoard::new();
        board.track(1, false);

        let ticket = board.begin(1).unwrap();
        assert!(ticket.target);
        assert_eq!(board.is_rsvped(1), Some(true));
        assert!(board.is_pending(1));
    }

    #[test]
    fn test_pending_row_rejects_second_begin() {
        let mut board = RsvpBoard::new();
        board.track(1, false);
        board.begin(1).unwrap();

        assert!(matches!(board.begin(1), Err(Error::RsvpPending(1))));
        assert!(matches!(board.begin(2), Err(Error::UnknownEvent(2))));
    }

    #[tokio::test]
    async fn test_failed_rsvp_rolls_back() {
        let backend = FakeBackend::failing("Event is full");
        let mut board = RsvpBoard::new();
        board.track(7, false);

        let notice = board.toggle(7, &backend).await.unwrap();
        assert_eq!(board.is_rsvped(7), Some(false));
        assert!(!board.is_pending(7));
        assert!(notice.is_error());
        assert_eq!(notice.message, "Action failed: Event is full");
        assert_eq!(*backend.calls.lock().unwrap(), vec![("rsvp", 7)]);
    }

    #[tokio::test]
    async fn test_failed_cancel_rolls_back() {
        let backend = FakeBackend::failing("Could not complete action.");
        let mut board = RsvpBoard::new();
        board.track(7, true);

        let notice = board.toggle(7, &backend).await.unwrap();
        assert_eq!(board.is_rsvped(7), Some(true));
        assert_eq!(notice.message, "Action failed: Could not complete action.");
        assert_eq!(*backend.calls.lock().unwrap(), vec![("cancel", 7)]);
    }

    #[tokio::test]
    async fn test_successful_round_trip() {
        let backend = FakeBackend::default();
        let mut board = RsvpBoard::new();
        board.track(3, false);

        let notice = board.toggle(3, &backend).await.unwrap();
        assert_eq!(notice, Notice::info("RSVP successful!"));
        assert_eq!(board.state(3), Some(RsvpState::Idle { rsvped: true }));

        let notice = board.toggle(3, &backend).await.unwrap();
        assert_eq!(notice, Notice::info("RSVP canceled."));
        assert_eq!(board.state(3), Some(RsvpState::Idle { rsvped: false }));
        assert_eq!(*backend.calls.lock().unwrap(), vec![("rsvp", 3), ("cancel", 3)]);
    }

    #[test]
    fn test_toggle_unknown_event_sends_nothing() {
        let backend = FakeBackend::default();
        let mut board = RsvpBoard::new();

        let result = tokio_test::block_on(board.toggle(9, &backend));
        assert!(matches!(result, Err(Error::UnknownEvent(9))));
        assert!(backend.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn test_rows_are_independent() {
        let mut board = RsvpBoard::new();
        board.track(1, false);
        board.track(2, true);

        let first = board.begin(1).unwrap();
        let second = board.begin(2).unwrap();
        board.settle(second, Err(Error::network("Could not complete action.")));

        assert!(board.is_pending(1));
        assert_eq!(board.state(2), Some(RsvpState::Idle { rsvped: true }));

        board.settle(first, Ok(()));
        assert_eq!(board.state(1), Some(RsvpState::Idle { rsvped: true }));
    }

    #[test]
    fn test_settle_after_reload_keeps_fresh_state() {
        let mut board = RsvpBoard::new();
        board.track(1, false);
        let ticket = board.begin(1).unwrap();

        // view refetched while the request was in flight
        board.track(1, true);
        board.settle(ticket, Err(Error::network("Could not complete action.")));
        assert_eq!(board.state(1), Some(RsvpState::Idle { rsvped: true }));
    }

    #[test]
    fn test_refresh_keeps_pending_rows() {
        let mut board = RsvpBoard::new();
        board.track(1, false);
        board.track(2, false);
        board.track(3, true);
        let ticket = board.begin(1).unwrap();

        let events: Vec<Event> = serde_json::from_value(serde_json::json!([
            {"id": 1, "title": "a", "start_time": "2024-01-01T09:00", "end_time": "2024-01-01T10:00"},
            {"id": 2, "title": "b", "start_time": "2024-01-01T09:00", "end_time": "2024-01-01T10:00", "is_rsvped": true}
        ]))
        .unwrap();
        board.refresh(&events);

        assert_eq!(board.state(1), Some(RsvpState::Pending { target: true }));
        assert!(matches!(board.begin(1), Err(Error::RsvpPending(1))));
        assert_eq!(board.state(2), Some(RsvpState::Idle { rsvped: true }));
        assert_eq!(board.state(3), None);

        let notice = board.settle(ticket, Ok(()));
        assert_eq!(notice, Notice::info("RSVP successful!"));
        assert_eq!(board.state(1), Some(RsvpState::Idle { rsvped: true }));
    }

    #[test]
    fn test_apply_to_events() {
        let mut events: Vec<Event> = serde_json::from_value(serde_json::json!([
            {"id": 1, "title": "a", "start_time": "2024-01-01T09:00", "end_time": "2024-01-01T10:00"},
            {"id": 2, "title": "b", "start_time": "2024-01-01T09:00", "end_time": "2024-01-01T10:00", "is_rsvped": true}
        ]))
        .unwrap();

        let mut board = RsvpBoard::from_events(&events);
        assert_eq!(board.is_rsvped(2), Some(true));
        board.begin(1).unwrap();
        board.apply(&mut events);

        assert!(events[0].is_rsvped);
        assert!(events[1].is_rsvped);
    }
}
