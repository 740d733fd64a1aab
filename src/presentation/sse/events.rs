//! Push Stream Wire Events
//!
//! JSON events delivered over the session watch stream. Tagged by `type`
//! so clients can switch on a single field.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::SessionRecord;

/// Events pushed to a watching client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    /// Stream established; the session was live at subscription time
    Connected {
        #[serde(rename = "userId")]
        user_id: i64,
        timestamp: DateTime<Utc>,
    },

    /// Keep-alive, emitted periodically so intermediaries hold the stream
    Heartbeat { timestamp: DateTime<Utc> },

    /// The session was invalidated (new login elsewhere, explicit logout,
    /// or an admin action). Terminal.
    SessionInvalidated {
        reason: String,
        invalidated_at: Option<DateTime<Utc>>,
        timestamp: DateTime<Utc>,
    },

    /// The session reached its natural expiry. Terminal.
    SessionExpired {
        expired_at: DateTime<Utc>,
        timestamp: DateTime<Utc>,
    },

    /// The stream hit its safety ceiling or storage stayed unreachable.
    /// Terminal; says nothing about session validity.
    Timeout {
        message: String,
        timestamp: DateTime<Utc>,
    },
}

impl SessionEvent {
    pub fn connected(user_id: i64) -> Self {
        Self::Connected {
            user_id,
            timestamp: Utc::now(),
        }
    }

    pub fn heartbeat() -> Self {
        Self::Heartbeat {
            timestamp: Utc::now(),
        }
    }

    pub fn invalidated(record: &SessionRecord) -> Self {
        let reason = record
            .invalidation_reason
            .map(|r| r.as_str().to_string())
            .unwrap_or_else(|| "unknown".to_string());
        Self::SessionInvalidated {
            reason,
            invalidated_at: record.invalidated_at,
            timestamp: Utc::now(),
        }
    }

    pub fn expired(expired_at: DateTime<Utc>) -> Self {
        Self::SessionExpired {
            expired_at,
            timestamp: Utc::now(),
        }
    }

    pub fn timeout() -> Self {
        Self::Timeout {
            message: "Connection timeout - please reconnect".to_string(),
            timestamp: Utc::now(),
        }
    }

    /// Terminal events end the stream after delivery.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::SessionInvalidated { .. } | Self::SessionExpired { .. } | Self::Timeout { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::InvalidationReason;
    use chrono::Duration;

    #[test]
    fn events_serialize_with_snake_case_type_tag() {
        let json = serde_json::to_value(SessionEvent::heartbeat()).unwrap();
        assert_eq!(json["type"], "heartbeat");

        let json = serde_json::to_value(SessionEvent::connected(5)).unwrap();
        assert_eq!(json["type"], "connected");
        // Historical wire quirk kept for client compatibility.
        assert_eq!(json["userId"], 5);

        let json = serde_json::to_value(SessionEvent::timeout()).unwrap();
        assert_eq!(json["type"], "timeout");
        assert_eq!(json["message"], "Connection timeout - please reconnect");
    }

    #[test]
    fn invalidated_event_carries_the_stored_reason() {
        let mut record = SessionRecord::new(1, "h".into(), Duration::hours(1));
        record.invalidated_at = Some(Utc::now());
        record.invalidation_reason = Some(InvalidationReason::NewLoginDetected);

        let json = serde_json::to_value(SessionEvent::invalidated(&record)).unwrap();
        assert_eq!(json["type"], "session_invalidated");
        assert_eq!(json["reason"], "new_login_detected");
    }

    #[test]
    fn only_closing_events_are_terminal() {
        assert!(!SessionEvent::connected(1).is_terminal());
        assert!(!SessionEvent::heartbeat().is_terminal());
        assert!(SessionEvent::expired(Utc::now()).is_terminal());
        assert!(SessionEvent::timeout().is_terminal());
    }
}
