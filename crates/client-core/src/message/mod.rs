//! Message delivery types and tracking

pub mod tracker;

pub use tracker::MessageTracker;

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Display state of an outbound message.
///
/// States only move forward: `Sending` to `Sent` or `Failed`, `Sent` to
/// `Delivered` or `Failed`. `Delivered` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryState {
    /// Send command not yet accepted by the engine
    Sending,
    /// Accepted by the engine, awaiting the delivery acknowledgement
    Sent,
    /// Positive acknowledgement received
    Delivered,
    /// Send rejected locally or negative acknowledgement received
    Failed,
}

impl DeliveryState {
    pub fn is_terminal(self) -> bool {
        matches!(self, DeliveryState::Delivered | DeliveryState::Failed)
    }

    /// Whether the forward-only state machine permits the move.
    pub fn can_advance_to(self, next: DeliveryState) -> bool {
        match self {
            DeliveryState::Sending => {
                matches!(next, DeliveryState::Sent | DeliveryState::Failed)
            }
            DeliveryState::Sent => {
                matches!(next, DeliveryState::Delivered | DeliveryState::Failed)
            }
            DeliveryState::Delivered | DeliveryState::Failed => false,
        }
    }
}

/// One outbound message awaiting (or past) delivery confirmation.
///
/// Records are never removed by this layer; retention is a user-facing
/// concern handled elsewhere. A record whose acknowledgement never
/// arrives simply stays in `Sent` state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingDelivery {
    /// Correlation token echoed back by the engine's delivery result.
    /// A dedicated monotonic sequence, so rapid successive sends can
    /// never collide the way wall-clock keys can.
    pub token: u64,
    /// Address of record of the sending account
    pub owner: String,
    /// Destination URI
    pub peer_uri: String,
    /// Message body
    pub body: String,
    /// Wall-clock send time, milliseconds since the epoch; display only
    pub timestamp_ms: i64,
    /// Current display state
    pub state: DeliveryState,
    /// Status code from the delivery acknowledgement, when one arrived
    pub response_code: Option<u16>,
    /// Failure reason, when the delivery failed
    pub response_reason: Option<String>,
}

impl PendingDelivery {
    pub(crate) fn new(token: u64, owner: String, peer_uri: String, body: String) -> Self {
        Self {
            token,
            owner,
            peer_uri,
            body,
            timestamp_ms: Utc::now().timestamp_millis(),
            state: DeliveryState::Sending,
            response_code: None,
            response_reason: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delivery_state_is_forward_only() {
        assert!(DeliveryState::Sending.can_advance_to(DeliveryState::Sent));
        assert!(DeliveryState::Sending.can_advance_to(DeliveryState::Failed));
        assert!(DeliveryState::Sent.can_advance_to(DeliveryState::Delivered));
        assert!(DeliveryState::Sent.can_advance_to(DeliveryState::Failed));

        assert!(!DeliveryState::Sent.can_advance_to(DeliveryState::Sending));
        assert!(!DeliveryState::Delivered.can_advance_to(DeliveryState::Failed));
        assert!(!DeliveryState::Failed.can_advance_to(DeliveryState::Delivered));
    }
}
