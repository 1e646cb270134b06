//! Command and notification surface of the native communication engine
//!
//! The engine performs the actual protocol signaling and media transport.
//! This layer never talks to the wire itself; it issues synchronous
//! commands through [`EngineGateway`] and consumes the engine's
//! asynchronous notifications as typed [`EngineEvent`]s.
//!
//! Commands follow the engine's return-code convention: `0` means success
//! and any non-zero value is an engine-specific failure code. Callers map
//! non-zero codes to [`ClientError::EngineCommandFailed`] and never retry
//! internally.
//!
//! [`ClientError::EngineCommandFailed`]: crate::ClientError::EngineCommandFailed

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::call::{CallHandle, VideoDirection};

/// Imperative command surface of the engine.
///
/// All commands are expected to return quickly; anything intrinsically
/// asynchronous (message delivery, call termination) is modeled as a
/// command here plus a later [`EngineEvent`], not as a blocking call.
#[async_trait]
pub trait EngineGateway: Send + Sync {
    /// Allocate a new outgoing call under the given account.
    ///
    /// The returned handle is the engine's opaque call identifier, unique
    /// and stable for the call's lifetime. On failure the engine's result
    /// code is returned instead.
    async fn call_alloc(&self, owner: &str) -> Result<CallHandle, i32>;

    /// Dial the peer URI on an allocated call.
    async fn connect(&self, handle: &CallHandle, peer_uri: &str) -> i32;

    /// Put the call on hold.
    async fn hold(&self, handle: &CallHandle) -> i32;

    /// Resume a held call.
    async fn unhold(&self, handle: &CallHandle) -> i32;

    /// Transfer the call to another URI.
    async fn transfer(&self, handle: &CallHandle, target_uri: &str) -> i32;

    /// Send a single DTMF digit.
    async fn send_digit(&self, handle: &CallHandle, digit: char) -> i32;

    /// Enable or disable video on the call.
    async fn set_video(&self, handle: &CallHandle, enabled: bool) -> i32;

    /// Select the front or rear video source.
    async fn set_video_source(&self, handle: &CallHandle, front: bool) -> i32;

    /// Start rendering the incoming video stream.
    async fn start_video_display(&self, handle: &CallHandle) -> i32;

    /// Stop rendering the incoming video stream.
    async fn stop_video_display(&self, handle: &CallHandle);

    /// Set the negotiated video direction on the call.
    async fn set_video_direction(&self, handle: &CallHandle, direction: VideoDirection);

    /// Disable or re-enable the outgoing video stream.
    async fn disable_video_stream(&self, handle: &CallHandle, disable: bool);

    /// Send a SIP NOTIFY sipfrag status for a transferred call.
    async fn notify_sipfrag(&self, handle: &CallHandle, code: u16, reason: &str);

    /// Engine's own status string for the call.
    async fn status(&self, handle: &CallHandle) -> String;

    /// Negotiated audio codecs of the call.
    async fn audio_codecs(&self, handle: &CallHandle) -> String;

    /// Whether the call has a video stream.
    async fn has_video(&self, handle: &CallHandle) -> bool;

    /// Send a page-mode message to a peer.
    ///
    /// `token` is an opaque correlation value the engine echoes back in the
    /// matching [`EngineEvent::MessageDeliveryResult`] notification.
    async fn send_message(&self, owner: &str, peer_uri: &str, body: &str, token: u64) -> i32;

    /// Point the engine's resolver at an explicit name server list,
    /// comma-joined `address:port` entries.
    async fn set_name_servers(&self, servers: &str) -> i32;
}

/// Asynchronous notifications emitted by the engine.
///
/// Notifications arrive on the engine's own thread and must be marshaled
/// onto the owning [`ClientManager`] context through its event channel;
/// they are applied strictly in arrival order.
///
/// [`ClientManager`]: crate::manager::ClientManager
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EngineEvent {
    /// The engine moved a call to a new status. The status is the engine's
    /// short status code and is mapped to a [`CallState`] before it is
    /// applied.
    ///
    /// [`CallState`]: crate::call::CallState
    CallStatusChanged { handle: CallHandle, status: String },

    /// The engine terminated a call. Duplicate termination notifications
    /// for the same handle are tolerated.
    CallTerminated { handle: CallHandle },

    /// Delivery acknowledgement for a message sent with the given
    /// correlation token. Codes below 300 indicate delivery.
    MessageDeliveryResult {
        token: u64,
        code: u16,
        reason: String,
    },
}
