use chrono::{DateTime, Utc};
use serde::Serialize;

/// Where the session manager is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    #[default]
    Unauthenticated,
    /// Login or restore in flight
    Authenticating,
    /// Valid token held, renewal timer armed
    Authenticated,
    /// Renewal in flight; the current token stays usable until the outcome is known
    Renewing,
}

/// Point-in-time view of the session, safe to hand to a UI layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct SessionStatus {
    pub state: SessionState,
    pub is_authenticated: bool,
    pub expires_at: Option<DateTime<Utc>>,
    /// Seconds until the armed renewal fires
    pub renewal_in: Option<u64>,
}

/// Session transitions, broadcast to subscribers
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    Authenticated { expires_at: DateTime<Utc> },
    Renewed { expires_at: DateTime<Utc> },
    /// Renewal failed, the token ran out, or a call was rejected with 401.
    /// The application should return to its unauthenticated view.
    Expired,
    LoggedOut,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_wire_shape() {
        let json = serde_json::to_value(SessionEvent::Expired).expect("serialize event");
        assert_eq!(json, serde_json::json!({"type": "expired"}));

        let status = SessionStatus {
            state: SessionState::Renewing,
            is_authenticated: true,
            expires_at: None,
            renewal_in: None,
        };
        let json = serde_json::to_value(&status).expect("serialize status");
        assert_eq!(json["state"], "renewing");
    }
}
