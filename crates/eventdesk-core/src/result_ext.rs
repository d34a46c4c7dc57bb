//! Logging for failed client operations.
//!
//! Server rejections are logged with their HTTP status as a separate field
//! so they can be filtered apart from transport and local failures.

use std::panic::Location;
use tracing::{error, warn};

use crate::error::{Error, Result};

/// Records a failed operation before it is propagated.
pub trait ResultExt<T> {
    /// Log an `Err` together with the operation and the caller's location,
    /// then hand the result back unchanged.
    ///
    /// ```ignore
    /// use eventdesk_core::result_ext::ResultExt;
    ///
    /// let events = api.list_events().await.log("loading dashboard")?;
    /// ```
    fn log(self, operation: &str) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    #[track_caller]
    fn log(self, operation: &str) -> Result<T> {
        if let Err(ref e) = self {
            let at = Location::caller();
            match e {
                Error::Network {
                    status: Some(status),
                    message,
                } if *status < 500 => {
                    warn!(target: "eventdesk", operation, status, at = %at, "Request rejected: {}", message)
                }
                Error::Network { status, message } => {
                    error!(target: "eventdesk", operation, status = ?status, at = %at, "Request failed: {}", message)
                }
                other => error!(target: "eventdesk", operation, error = %other, at = %at, "Operation failed"),
            }
        }
        self
    }
}

/// Lookups of an event row by id.
pub trait EventLookupExt<T> {
    /// Turn a missing row into [`Error::UnknownEvent`], logging the miss.
    fn or_unknown_event(self, event_id: i64) -> Result<T>;
}

impl<T> EventLookupExt<T> for Option<T> {
    #[track_caller]
    fn or_unknown_event(self, event_id: i64) -> Result<T> {
        match self {
            Some(value) => Ok(value),
            None => {
                warn!(target: "eventdesk", event_id, at = %Location::caller(), "Event not in the list");
                Err(Error::UnknownEvent(event_id))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_passes_ok_through() {
        let result: Result<i64> = Ok(7);
        assert_eq!(result.log("fetching event").unwrap(), 7);
    }

    #[test]
    fn test_log_keeps_error() {
        let rejected: Result<i64> = Err(Error::Network {
            status: Some(403),
            message: "You do not have permission to perform this action.".to_string(),
        });
        assert!(matches!(
            rejected.log("deleting user"),
            Err(Error::Network { status: Some(403), .. })
        ));

        let offline: Result<i64> = Err(Error::network("Failed to load events"));
        assert!(matches!(offline.log("loading dashboard"), Err(Error::Network { status: None, .. })));
    }

    #[test]
    fn test_or_unknown_event() {
        let events = [3_i64, 4];
        assert_eq!(events.iter().find(|id| **id == 4).or_unknown_event(4).unwrap(), &4);
        assert!(matches!(
            events.iter().find(|id| **id == 9).or_unknown_event(9),
            Err(Error::UnknownEvent(9))
        ));
    }
}
