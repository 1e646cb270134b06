//! Client manager
//!
//! [`ClientManager`] is the single coordinating owner of the control
//! layer: it wires the engine gateway to the call registry, the config
//! store and the message tracker, and runs the one consumer loop that
//! applies the engine's asynchronous notifications.
//!
//! The engine's notification thread never mutates shared state directly.
//! It marshals [`EngineEvent`]s through the channel handed out by
//! [`ClientManager::engine_events`]; the loop applies them strictly in
//! arrival order and republishes the surviving changes as
//! [`ClientEvent`]s.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{broadcast, mpsc, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::call::{CallDirection, CallHandle, CallRegistry, CallState};
use crate::config::ConfigStore;
use crate::engine::{EngineEvent, EngineGateway};
use crate::error::{ClientError, ClientResult};
use crate::events::{CallStatusInfo, ClientEvent, ClientEventHandler, DeliveryStatusInfo};
use crate::message::{MessageTracker, PendingDelivery};

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Shared event application and publication state, cloned into the loop
/// task.
#[derive(Clone)]
struct EventSink {
    calls: Arc<CallRegistry>,
    messages: Arc<MessageTracker>,
    handler: Arc<RwLock<Option<Arc<dyn ClientEventHandler>>>>,
    event_tx: broadcast::Sender<ClientEvent>,
}

impl EventSink {
    /// Apply one engine notification. Invalid or unknown events are
    /// logged and dropped; everything applied is republished.
    async fn apply(&self, event: EngineEvent) {
        match event {
            EngineEvent::CallStatusChanged { handle, status } => {
                let Some(next) = CallState::from_engine_status(&status) else {
                    warn!(%handle, %status, "unmapped engine call status");
                    return;
                };
                match self.calls.transition(&handle, next).await {
                    Ok(call) => self.emit_state(&call.handle, call.state).await,
                    Err(e) => warn!(%handle, %status, error = %e, "rejected engine status change"),
                }
            }
            EngineEvent::CallTerminated { handle } => {
                if self.calls.remove(&handle).await.is_some() {
                    let _ = self.event_tx.send(ClientEvent::CallRemoved {
                        handle: handle.clone(),
                        timestamp: Utc::now(),
                    });
                    if let Some(handler) = self.handler.read().await.as_ref() {
                        handler.on_call_removed(handle).await;
                    }
                } else {
                    debug!(%handle, "termination for unknown call, ignoring");
                }
            }
            EngineEvent::MessageDeliveryResult {
                token,
                code,
                reason,
            } => {
                if let Some(record) = self.messages.resolve(token, code, &reason).await {
                    self.emit_delivery(&record).await;
                }
            }
        }
    }

    async fn emit_state(&self, handle: &CallHandle, state: CallState) {
        let info = CallStatusInfo {
            handle: handle.clone(),
            state,
            timestamp: Utc::now(),
        };
        let _ = self
            .event_tx
            .send(ClientEvent::CallStateChanged { info: info.clone() });
        if let Some(handler) = self.handler.read().await.as_ref() {
            handler.on_call_state_changed(info).await;
        }
    }

    async fn emit_delivery(&self, record: &PendingDelivery) {
        let info = DeliveryStatusInfo {
            token: record.token,
            state: record.state,
            response_code: record.response_code,
            response_reason: record.response_reason.clone(),
            timestamp: Utc::now(),
        };
        let _ = self
            .event_tx
            .send(ClientEvent::MessageDelivery { info: info.clone() });
        if let Some(handler) = self.handler.read().await.as_ref() {
            handler.on_message_delivery(info).await;
        }
    }
}

pub struct ClientManager {
    engine: Arc<dyn EngineGateway>,
    /// Live call registry
    pub calls: Arc<CallRegistry>,
    /// Configuration store
    pub config: Arc<ConfigStore>,
    /// Outbound message tracker
    pub messages: Arc<MessageTracker>,
    sink: EventSink,
    engine_tx: mpsc::UnboundedSender<EngineEvent>,
    engine_rx: Mutex<Option<mpsc::UnboundedReceiver<EngineEvent>>>,
    is_running: Arc<RwLock<bool>>,
    loop_task: Mutex<Option<JoinHandle<()>>>,
}

impl ClientManager {
    pub fn new(engine: Arc<dyn EngineGateway>, config: Arc<ConfigStore>) -> Self {
        let calls = Arc::new(CallRegistry::new(engine.clone()));
        let messages = Arc::new(MessageTracker::new(engine.clone()));
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let (engine_tx, engine_rx) = mpsc::unbounded_channel();
        let sink = EventSink {
            calls: calls.clone(),
            messages: messages.clone(),
            handler: Arc::new(RwLock::new(None)),
            event_tx,
        };
        Self {
            engine,
            calls,
            config,
            messages,
            sink,
            engine_tx,
            engine_rx: Mutex::new(Some(engine_rx)),
            is_running: Arc::new(RwLock::new(false)),
            loop_task: Mutex::new(None),
        }
    }

    /// Register the event handler that receives applied changes.
    pub async fn set_event_handler(&self, handler: Arc<dyn ClientEventHandler>) {
        *self.sink.handler.write().await = Some(handler);
    }

    /// Subscribe to the broadcast stream of applied changes.
    pub fn subscribe_events(&self) -> broadcast::Receiver<ClientEvent> {
        self.sink.event_tx.subscribe()
    }

    /// Sender the engine's notification thread marshals its events
    /// through. Events are applied in the order they are sent.
    pub fn engine_events(&self) -> mpsc::UnboundedSender<EngineEvent> {
        self.engine_tx.clone()
    }

    /// Whether the event loop is running.
    pub async fn is_running(&self) -> bool {
        *self.is_running.read().await
    }

    /// Start the event loop. Idempotent; the second call is a no-op.
    pub async fn start(&self) -> ClientResult<()> {
        let Some(mut rx) = self.engine_rx.lock().await.take() else {
            return Ok(());
        };
        *self.is_running.write().await = true;
        let sink = self.sink.clone();
        let is_running = self.is_running.clone();
        let task = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                sink.apply(event).await;
            }
            *is_running.write().await = false;
            debug!("engine event loop ended");
        });
        *self.loop_task.lock().await = Some(task);
        info!("client manager started");
        Ok(())
    }

    /// Stop the event loop. Calls and pending deliveries stay registered.
    pub async fn stop(&self) {
        if let Some(task) = self.loop_task.lock().await.take() {
            task.abort();
        }
        *self.is_running.write().await = false;
        info!("client manager stopped");
    }

    /// Place an outgoing call.
    ///
    /// The handle comes from the engine's synchronous allocation response.
    /// A failed dial deregisters the call again and surfaces the engine's
    /// code; nothing is retried.
    pub async fn place_call(&self, owner: &str, peer_uri: &str) -> ClientResult<CallHandle> {
        if !self.is_running().await {
            return Err(ClientError::internal(
                "client is not started, call start() before placing calls",
            ));
        }
        let handle = self
            .engine
            .call_alloc(owner)
            .await
            .map_err(|code| ClientError::engine_failed("call_alloc", code))?;
        self.calls
            .create(
                handle.clone(),
                owner,
                peer_uri,
                CallDirection::Outgoing,
                CallState::Created,
            )
            .await?;

        let code = self.engine.connect(&handle, peer_uri).await;
        if code != 0 {
            self.calls.remove(&handle).await;
            return Err(ClientError::engine_failed("connect", code));
        }
        let call = self.calls.transition(&handle, CallState::Connecting).await?;
        self.sink.emit_state(&call.handle, call.state).await;
        Ok(handle)
    }

    /// Register a call the engine reports as incoming.
    pub async fn incoming_call(
        &self,
        handle: CallHandle,
        owner: &str,
        peer_uri: &str,
    ) -> ClientResult<()> {
        let call = self
            .calls
            .create(
                handle,
                owner,
                peer_uri,
                CallDirection::Incoming,
                CallState::Created,
            )
            .await?;
        self.sink.emit_state(&call.handle, call.state).await;
        Ok(())
    }

    /// Send a message and start tracking its delivery.
    ///
    /// The returned record may already be `Failed` when the engine
    /// rejected the send command; no acknowledgement will follow then.
    pub async fn send_message(&self, owner: &str, peer_uri: &str, body: &str) -> PendingDelivery {
        let record = self.messages.begin(owner, peer_uri, body).await;
        self.sink.emit_delivery(&record).await;
        record
    }
}
