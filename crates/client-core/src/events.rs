//! Client events
//!
//! Engine notifications that survive validation are re-published to the
//! presentation layer in two forms: as [`ClientEvent`] values on a
//! broadcast channel, and as calls on an optional registered
//! [`ClientEventHandler`]. Both carry the same information; the channel
//! suits reactive consumers, the handler suits imperative ones.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::call::{CallHandle, CallState};
use crate::message::DeliveryState;

/// A call state change applied to the registry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallStatusInfo {
    /// Handle of the affected call
    pub handle: CallHandle,
    /// State the call moved to
    pub state: CallState,
    /// When the change was applied
    pub timestamp: DateTime<Utc>,
}

/// A message delivery state change
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryStatusInfo {
    /// Correlation token of the message
    pub token: u64,
    /// State the delivery moved to
    pub state: DeliveryState,
    /// Acknowledgement status code, when one arrived
    pub response_code: Option<u16>,
    /// Failure reason, when the delivery failed
    pub response_reason: Option<String>,
    /// When the change was applied
    pub timestamp: DateTime<Utc>,
}

/// Events published to the presentation layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClientEvent {
    /// A call changed lifecycle state
    CallStateChanged { info: CallStatusInfo },
    /// A call left the registry
    CallRemoved {
        handle: CallHandle,
        timestamp: DateTime<Utc>,
    },
    /// An outbound message changed delivery state
    MessageDelivery { info: DeliveryStatusInfo },
}

/// Handler interface for client events.
///
/// Handlers run on the owning event loop task; they are awaited in order,
/// so a slow handler delays subsequent events rather than reordering them.
#[async_trait]
pub trait ClientEventHandler: Send + Sync {
    /// A call changed lifecycle state.
    async fn on_call_state_changed(&self, info: CallStatusInfo);

    /// A call was removed from the registry.
    async fn on_call_removed(&self, handle: CallHandle);

    /// An outbound message changed delivery state.
    async fn on_message_delivery(&self, info: DeliveryStatusInfo);
}
