//! Call types and the live call registry
//!
//! A [`Call`] tracks one call from creation until explicit removal. The
//! engine owns the signaling state machine; this module keeps the local
//! view of it plus the state the engine does not track for us (hold flag,
//! media security level, video direction, history flag).

pub mod registry;

pub use registry::CallRegistry;

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Opaque engine call handle.
///
/// Handles are allocated by the engine, unique across the registry at any
/// instant and stable for the call's lifetime. The string content carries
/// no meaning here.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CallHandle(pub String);

impl CallHandle {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CallHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CallHandle {
    fn from(s: &str) -> Self {
        CallHandle(s.to_string())
    }
}

impl From<String> for CallHandle {
    fn from(s: String) -> Self {
        CallHandle(s)
    }
}

/// Direction of a call relative to the local account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallDirection {
    /// Call received from a peer
    Incoming,
    /// Call placed by the local account
    Outgoing,
}

/// Lifecycle state of a call.
///
/// The valid transitions are
/// `Created -> Connecting -> Active <-> Held -> Terminated`, and any state
/// may move directly to `Terminated` when the engine reports termination.
/// Nothing leaves `Terminated`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallState {
    /// Registered but not yet signaled
    Created,
    /// Outgoing dial or incoming ring in progress
    Connecting,
    /// Media flowing
    Active,
    /// On hold
    Held,
    /// Ended; terminal
    Terminated,
}

impl CallState {
    /// Whether the lifecycle table permits moving from `self` to `next`.
    pub fn can_transition_to(self, next: CallState) -> bool {
        if next == CallState::Terminated {
            return self != CallState::Terminated;
        }
        matches!(
            (self, next),
            (CallState::Created, CallState::Connecting)
                | (CallState::Created, CallState::Active)
                | (CallState::Connecting, CallState::Active)
                | (CallState::Active, CallState::Held)
                | (CallState::Held, CallState::Active)
        )
    }

    /// Map one of the engine's short status codes to a state.
    ///
    /// The engine's vocabulary is wider than ours; codes with no local
    /// meaning return `None` and are dropped by the event loop.
    pub fn from_engine_status(status: &str) -> Option<CallState> {
        match status {
            "incoming" => Some(CallState::Created),
            "outgoing" | "calling" | "ringing" | "early" | "progress" | "connecting" => {
                Some(CallState::Connecting)
            }
            "established" | "answered" | "active" | "connected" => Some(CallState::Active),
            "held" | "on-hold" => Some(CallState::Held),
            "closed" | "terminated" | "disconnected" => Some(CallState::Terminated),
            _ => None,
        }
    }
}

/// Media security level negotiated for the call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SecurityLevel {
    /// Cleartext media
    None,
    /// Key agreement in progress, peer not yet verified
    Pending,
    /// Media encrypted and peer verified
    Secured,
}

/// Negotiated video direction of the call.
///
/// `Inactive` is the only valid direction while video is not allowed on
/// the call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VideoDirection {
    /// No video in either direction
    Inactive,
    /// Receive only
    RecvOnly,
    /// Send only
    SendOnly,
    /// Bidirectional video
    SendRecv,
}

/// One tracked call, from creation until explicit removal
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Call {
    /// Engine handle, unique across the registry
    pub handle: CallHandle,
    /// Address of record of the local account owning the call
    pub owner: String,
    /// Peer URI
    pub peer_uri: String,
    /// Call direction
    pub direction: CallDirection,
    /// Current lifecycle state
    pub state: CallState,
    /// Locally tracked hold flag
    pub on_hold: bool,
    /// Media security level
    pub security: SecurityLevel,
    /// Key identifier for secure media, empty when not secured
    pub session_key_id: String,
    /// Set once the call has reached `Active` at least once
    pub has_history: bool,
    /// Whether video is allowed on this call
    pub video_allowed: bool,
    /// Current video direction; `Inactive` whenever video is not allowed
    pub video_direction: VideoDirection,
    /// When the call was registered
    pub created_at: DateTime<Utc>,
    /// When the call first became active
    pub connected_at: Option<DateTime<Utc>>,
}

impl Call {
    pub(crate) fn new(
        handle: CallHandle,
        owner: String,
        peer_uri: String,
        direction: CallDirection,
        state: CallState,
    ) -> Self {
        Self {
            handle,
            owner,
            peer_uri,
            direction,
            state,
            on_hold: false,
            security: SecurityLevel::None,
            session_key_id: String::new(),
            has_history: false,
            video_allowed: false,
            video_direction: VideoDirection::Inactive,
            created_at: Utc::now(),
            connected_at: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lifecycle_table_forward_path() {
        assert!(CallState::Created.can_transition_to(CallState::Connecting));
        assert!(CallState::Connecting.can_transition_to(CallState::Active));
        assert!(CallState::Active.can_transition_to(CallState::Held));
        assert!(CallState::Held.can_transition_to(CallState::Active));
    }

    #[test]
    fn any_state_may_terminate_once() {
        for state in [
            CallState::Created,
            CallState::Connecting,
            CallState::Active,
            CallState::Held,
        ] {
            assert!(state.can_transition_to(CallState::Terminated));
        }
        assert!(!CallState::Terminated.can_transition_to(CallState::Terminated));
    }

    #[test]
    fn no_transition_leaves_terminated() {
        for next in [
            CallState::Created,
            CallState::Connecting,
            CallState::Active,
            CallState::Held,
        ] {
            assert!(!CallState::Terminated.can_transition_to(next));
        }
    }

    #[test]
    fn backward_transitions_rejected() {
        assert!(!CallState::Active.can_transition_to(CallState::Connecting));
        assert!(!CallState::Held.can_transition_to(CallState::Created));
        assert!(!CallState::Connecting.can_transition_to(CallState::Held));
    }

    #[test]
    fn engine_status_mapping() {
        assert_eq!(
            CallState::from_engine_status("established"),
            Some(CallState::Active)
        );
        assert_eq!(
            CallState::from_engine_status("ringing"),
            Some(CallState::Connecting)
        );
        assert_eq!(CallState::from_engine_status("transient-xyz"), None);
    }
}
