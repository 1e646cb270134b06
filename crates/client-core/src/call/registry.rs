//! Live call registry
//!
//! [`CallRegistry`] owns the authoritative, ordered collection of calls.
//! Calls enter the registry when the engine allocates them and leave only
//! on an explicit termination event or removal; there is no implicit
//! garbage collection.
//!
//! Mutators that correspond to engine commands issue the command first and
//! commit the local change only when the command succeeds, so a failed
//! command never leaves partially applied state. The one deliberate
//! exception is [`CallRegistry::set_video_allowed`], which applies the
//! combined local update before forwarding the command, mirroring the
//! engine's own handling of video teardown.

use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::call::{Call, CallDirection, CallHandle, CallState, SecurityLevel, VideoDirection};
use crate::engine::EngineGateway;
use crate::error::{ClientError, ClientResult};

/// Ordered registry of live calls.
///
/// The collection preserves creation order, which is the order queries
/// return calls in. All mutation goes through `&self` methods guarded by
/// one lock; the registry is intended to be driven from a single owning
/// task.
pub struct CallRegistry {
    engine: Arc<dyn EngineGateway>,
    calls: RwLock<Vec<Call>>,
}

impl CallRegistry {
    pub fn new(engine: Arc<dyn EngineGateway>) -> Self {
        Self {
            engine,
            calls: RwLock::new(Vec::new()),
        }
    }

    /// Register a new call.
    ///
    /// Fails with [`ClientError::DuplicateHandle`] when a call with the
    /// same handle is already present.
    pub async fn create(
        &self,
        handle: CallHandle,
        owner: impl Into<String>,
        peer_uri: impl Into<String>,
        direction: CallDirection,
        state: CallState,
    ) -> ClientResult<Call> {
        let mut calls = self.calls.write().await;
        if calls.iter().any(|c| c.handle == handle) {
            return Err(ClientError::duplicate_handle(handle.as_str()));
        }
        let call = Call::new(handle, owner.into(), peer_uri.into(), direction, state);
        info!(handle = %call.handle, peer = %call.peer_uri, direction = ?call.direction,
              "registered call");
        calls.push(call.clone());
        Ok(call)
    }

    /// Deregister a call.
    ///
    /// Absent handles are a no-op rather than an error so that duplicate
    /// termination notifications from the engine are tolerated.
    pub async fn remove(&self, handle: &CallHandle) -> Option<Call> {
        let mut calls = self.calls.write().await;
        let pos = calls.iter().position(|c| &c.handle == handle)?;
        let call = calls.remove(pos);
        info!(handle = %call.handle, "removed call");
        Some(call)
    }

    /// Look up a call by handle.
    pub async fn find(&self, handle: &CallHandle) -> Option<Call> {
        self.calls
            .read()
            .await
            .iter()
            .find(|c| &c.handle == handle)
            .cloned()
    }

    /// First call currently in the given state, in creation order.
    pub async fn find_by_state(&self, state: CallState) -> Option<Call> {
        self.calls
            .read()
            .await
            .iter()
            .find(|c| c.state == state)
            .cloned()
    }

    /// Calls of one account, optionally filtered by direction, in creation
    /// order. `None` matches both directions.
    pub async fn list(&self, owner: &str, direction: Option<CallDirection>) -> Vec<Call> {
        self.calls
            .read()
            .await
            .iter()
            .filter(|c| c.owner == owner && direction.map_or(true, |d| c.direction == d))
            .cloned()
            .collect()
    }

    /// Number of registered calls.
    pub async fn len(&self) -> usize {
        self.calls.read().await.len()
    }

    /// Apply a lifecycle transition, validating it against the transition
    /// table. Transitions to the current state are a no-op. Reaching
    /// `Active` sets the history flag and stamps the connect time.
    pub async fn transition(&self, handle: &CallHandle, next: CallState) -> ClientResult<Call> {
        let mut calls = self.calls.write().await;
        let call = Self::get_mut(&mut calls, handle)?;
        if call.state == next {
            return Ok(call.clone());
        }
        if !call.state.can_transition_to(next) {
            return Err(ClientError::InvalidStateTransition {
                from: call.state,
                to: next,
            });
        }
        debug!(handle = %call.handle, from = ?call.state, to = ?next, "call state transition");
        call.state = next;
        if next == CallState::Active {
            call.has_history = true;
            if call.connected_at.is_none() {
                call.connected_at = Some(chrono::Utc::now());
            }
        }
        Ok(call.clone())
    }

    /// Hold or resume the call.
    ///
    /// Issues the engine command and commits the hold flag only on
    /// success. The lifecycle state follows along only for the
    /// `Active <-> Held` pair; holding a call that is still connecting
    /// just sets the flag.
    pub async fn set_hold(&self, handle: &CallHandle, on: bool) -> ClientResult<()> {
        let mut calls = self.calls.write().await;
        let call = Self::get_mut(&mut calls, handle)?;
        if call.on_hold == on {
            return Ok(());
        }
        let (command, code) = if on {
            ("hold", self.engine.hold(handle).await)
        } else {
            ("unhold", self.engine.unhold(handle).await)
        };
        if code != 0 {
            return Err(ClientError::engine_failed(command, code));
        }
        call.on_hold = on;
        match (call.state, on) {
            (CallState::Active, true) => call.state = CallState::Held,
            (CallState::Held, false) => call.state = CallState::Active,
            _ => {}
        }
        Ok(())
    }

    /// Set the media security level and, when provided, the session key
    /// identifier. Local state only; the engine reports security changes
    /// through its own notifications.
    pub async fn set_security(
        &self,
        handle: &CallHandle,
        level: SecurityLevel,
        session_key_id: Option<String>,
    ) -> ClientResult<()> {
        let mut calls = self.calls.write().await;
        let call = Self::get_mut(&mut calls, handle)?;
        call.security = level;
        if let Some(key_id) = session_key_id {
            call.session_key_id = key_id;
        }
        Ok(())
    }

    /// Change the video direction.
    ///
    /// Any direction other than `Inactive` requires video to be allowed on
    /// the call. The engine command is void, so the local change commits
    /// unconditionally after it is issued.
    pub async fn set_video_direction(
        &self,
        handle: &CallHandle,
        direction: VideoDirection,
    ) -> ClientResult<()> {
        let mut calls = self.calls.write().await;
        let call = Self::get_mut(&mut calls, handle)?;
        if !call.video_allowed && direction != VideoDirection::Inactive {
            return Err(ClientError::VideoNotAllowed {
                handle: handle.as_str().to_string(),
            });
        }
        self.engine.set_video_direction(handle, direction).await;
        call.video_direction = direction;
        Ok(())
    }

    /// Allow or disallow video on the call.
    ///
    /// Disallowing forces the video direction to `Inactive` together with
    /// the flag, in one local update, before the command is forwarded.
    /// A failing command therefore does not reopen the invariant.
    pub async fn set_video_allowed(&self, handle: &CallHandle, allowed: bool) -> ClientResult<()> {
        let mut calls = self.calls.write().await;
        let call = Self::get_mut(&mut calls, handle)?;
        call.video_allowed = allowed;
        if !allowed {
            call.video_direction = VideoDirection::Inactive;
        }
        let code = self.engine.set_video(handle, allowed).await;
        if code != 0 {
            return Err(ClientError::engine_failed("set_video", code));
        }
        Ok(())
    }

    /// Transfer the call to another URI.
    pub async fn transfer(&self, handle: &CallHandle, target_uri: &str) -> ClientResult<()> {
        self.ensure_registered(handle).await?;
        let code = self.engine.transfer(handle, target_uri).await;
        if code != 0 {
            return Err(ClientError::engine_failed("transfer", code));
        }
        Ok(())
    }

    /// Send a DTMF digit on the call.
    pub async fn send_digit(&self, handle: &CallHandle, digit: char) -> ClientResult<()> {
        self.ensure_registered(handle).await?;
        let code = self.engine.send_digit(handle, digit).await;
        if code != 0 {
            return Err(ClientError::engine_failed("send_digit", code));
        }
        Ok(())
    }

    /// Report a sipfrag status for a transferred call.
    pub async fn notify_sipfrag(
        &self,
        handle: &CallHandle,
        code: u16,
        reason: &str,
    ) -> ClientResult<()> {
        self.ensure_registered(handle).await?;
        self.engine.notify_sipfrag(handle, code, reason).await;
        Ok(())
    }

    /// Start rendering incoming video.
    pub async fn start_video_display(&self, handle: &CallHandle) -> ClientResult<()> {
        self.ensure_registered(handle).await?;
        let code = self.engine.start_video_display(handle).await;
        if code != 0 {
            return Err(ClientError::engine_failed("start_video_display", code));
        }
        Ok(())
    }

    /// Stop rendering incoming video.
    pub async fn stop_video_display(&self, handle: &CallHandle) -> ClientResult<()> {
        self.ensure_registered(handle).await?;
        self.engine.stop_video_display(handle).await;
        Ok(())
    }

    /// Select the front or rear video source.
    pub async fn set_video_source(&self, handle: &CallHandle, front: bool) -> ClientResult<()> {
        self.ensure_registered(handle).await?;
        let code = self.engine.set_video_source(handle, front).await;
        if code != 0 {
            return Err(ClientError::engine_failed("set_video_source", code));
        }
        Ok(())
    }

    /// Disable or re-enable the outgoing video stream.
    pub async fn disable_video_stream(&self, handle: &CallHandle, disable: bool) -> ClientResult<()> {
        self.ensure_registered(handle).await?;
        self.engine.disable_video_stream(handle, disable).await;
        Ok(())
    }

    /// Negotiated audio codecs as reported by the engine.
    pub async fn audio_codecs(&self, handle: &CallHandle) -> ClientResult<String> {
        self.ensure_registered(handle).await?;
        Ok(self.engine.audio_codecs(handle).await)
    }

    /// Whether the engine reports a video stream on the call.
    pub async fn has_video(&self, handle: &CallHandle) -> ClientResult<bool> {
        self.ensure_registered(handle).await?;
        Ok(self.engine.has_video(handle).await)
    }

    /// Engine's own status string for the call.
    pub async fn engine_status(&self, handle: &CallHandle) -> ClientResult<String> {
        self.ensure_registered(handle).await?;
        Ok(self.engine.status(handle).await)
    }

    async fn ensure_registered(&self, handle: &CallHandle) -> ClientResult<()> {
        if self.calls.read().await.iter().any(|c| &c.handle == handle) {
            Ok(())
        } else {
            Err(ClientError::call_not_found(handle.as_str()))
        }
    }

    fn get_mut<'a>(calls: &'a mut Vec<Call>, handle: &CallHandle) -> ClientResult<&'a mut Call> {
        calls
            .iter_mut()
            .find(|c| &c.handle == handle)
            .ok_or_else(|| ClientError::call_not_found(handle.as_str()))
    }
}
