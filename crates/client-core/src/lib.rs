//! # uawire-client-core
//!
//! Client-side control layer for a native SIP engine. The engine does the
//! actual signaling and media transport; this crate keeps the client's
//! view of it consistent:
//!
//! - **Call registry** ([`call`]) - the ordered set of live calls, their
//!   lifecycle state machine and the engine commands that act on them.
//! - **Configuration reconciliation** ([`config`]) - the engine's
//!   line-oriented configuration document, with idempotent migration of
//!   historical formats and typed application of user settings.
//! - **Delivery correlation** ([`message`]) - outbound messages awaiting
//!   the engine's asynchronous delivery acknowledgements.
//!
//! [`manager::ClientManager`] owns all three and runs the single consumer
//! loop that applies the engine's notifications in arrival order.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use uawire_client_core::{ClientManager, ConfigStore, EngineGateway};
//!
//! async fn run(engine: Arc<dyn EngineGateway>) -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Arc::new(ConfigStore::open("/data/config", "").await?);
//!     let manager = ClientManager::new(engine, config);
//!     manager.start().await?;
//!
//!     let handle = manager
//!         .place_call("sip:alice@example.com", "sip:bob@example.com")
//!         .await?;
//!     manager.calls.set_hold(&handle, true).await?;
//!     Ok(())
//! }
//! ```

pub mod call;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod manager;
pub mod message;

pub use call::{
    Call, CallDirection, CallHandle, CallRegistry, CallState, SecurityLevel, VideoDirection,
};
pub use config::{
    apply_settings, ConfigDocument, ConfigStore, MigrateContext, MigrationRule, SettingsOutcome,
    SettingsSnapshot, SettingsUpdate, StartupSettings,
};
pub use engine::{EngineEvent, EngineGateway};
pub use error::{ClientError, ClientResult};
pub use events::{CallStatusInfo, ClientEvent, ClientEventHandler, DeliveryStatusInfo};
pub use manager::ClientManager;
pub use message::{DeliveryState, MessageTracker, PendingDelivery};
