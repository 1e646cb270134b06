//! Outbound message delivery tracking
//!
//! [`MessageTracker`] owns the outbox of [`PendingDelivery`] records and
//! correlates the engine's asynchronous delivery acknowledgements with the
//! send commands that produced them.
//!
//! Correlation uses a monotonic token allocated per send. Resolution scans
//! the outbox newest first, which keeps lookups cheap for the common case
//! of an acknowledgement arriving right after its send.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::engine::EngineGateway;
use crate::message::{DeliveryState, PendingDelivery};

pub struct MessageTracker {
    engine: Arc<dyn EngineGateway>,
    next_token: AtomicU64,
    outbox: RwLock<Vec<PendingDelivery>>,
}

impl MessageTracker {
    pub fn new(engine: Arc<dyn EngineGateway>) -> Self {
        Self {
            engine,
            next_token: AtomicU64::new(1),
            outbox: RwLock::new(Vec::new()),
        }
    }

    /// Record an outbound message and issue the send command.
    ///
    /// The record starts in `Sending` and moves to `Sent` when the engine
    /// accepts the command. A non-zero command result moves it straight to
    /// `Failed` with a local reason; no acknowledgement event is expected
    /// in that case. The resulting record is returned either way.
    pub async fn begin(
        &self,
        owner: impl Into<String>,
        peer_uri: impl Into<String>,
        body: impl Into<String>,
    ) -> PendingDelivery {
        let token = self.next_token.fetch_add(1, Ordering::Relaxed);
        let mut record =
            PendingDelivery::new(token, owner.into(), peer_uri.into(), body.into());

        let mut outbox = self.outbox.write().await;
        let code = self
            .engine
            .send_message(&record.owner, &record.peer_uri, &record.body, token)
            .await;
        if code == 0 {
            record.state = DeliveryState::Sent;
            debug!(token, peer = %record.peer_uri, "message handed to engine");
        } else {
            record.state = DeliveryState::Failed;
            record.response_reason = Some("message send failed".to_string());
            warn!(token, code, peer = %record.peer_uri, "engine rejected message send");
        }
        outbox.push(record.clone());
        record
    }

    /// Apply a delivery acknowledgement.
    ///
    /// Scans pending records newest first for the token. Result codes
    /// below 300 mark the record `Delivered`; anything else marks it
    /// `Failed` with the code and reason recorded. Unknown tokens and
    /// records already in a terminal state are logged and dropped, which
    /// tolerates late and duplicate acknowledgements.
    pub async fn resolve(
        &self,
        token: u64,
        code: u16,
        reason: &str,
    ) -> Option<PendingDelivery> {
        let mut outbox = self.outbox.write().await;
        let Some(record) = outbox.iter_mut().rev().find(|m| m.token == token) else {
            warn!(token, code, "delivery result does not match any pending message");
            return None;
        };

        let next = if code < 300 {
            DeliveryState::Delivered
        } else {
            DeliveryState::Failed
        };
        if !record.state.can_advance_to(next) {
            debug!(token, state = ?record.state, "ignoring stale delivery result");
            return None;
        }

        record.state = next;
        record.response_code = Some(code);
        if next == DeliveryState::Failed {
            record.response_reason = Some(reason.to_string());
        }
        info!(token, code, state = ?record.state, "message delivery resolved");
        Some(record.clone())
    }

    /// Look up a record by token.
    pub async fn find(&self, token: u64) -> Option<PendingDelivery> {
        self.outbox
            .read()
            .await
            .iter()
            .rev()
            .find(|m| m.token == token)
            .cloned()
    }

    /// All records exchanged between an account and a peer, oldest first.
    pub async fn conversation(&self, owner: &str, peer_uri: &str) -> Vec<PendingDelivery> {
        self.outbox
            .read()
            .await
            .iter()
            .filter(|m| m.owner == owner && m.peer_uri == peer_uri)
            .cloned()
            .collect()
    }

    /// Number of records still awaiting an acknowledgement.
    pub async fn unresolved_count(&self) -> usize {
        self.outbox
            .read()
            .await
            .iter()
            .filter(|m| !m.state.is_terminal())
            .count()
    }
}
