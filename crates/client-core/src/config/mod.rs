//! Configuration reconciliation
//!
//! The engine consumes a line-oriented configuration document on
//! (re)initialization. This module owns that document: parsing and
//! serialization ([`document`]), one-time migration of historical formats
//! ([`migrate`]), the store that ties the document to durable storage
//! ([`store`]) and typed application of user-facing settings
//! ([`settings`]).

pub mod document;
pub mod migrate;
pub mod settings;
pub mod store;

pub use document::{ConfigDocument, MODULE_ANCHOR};
pub use migrate::{migrate, migration_rules, MigrateContext, MigrationRule, StartupSettings};
pub use settings::{apply_settings, SettingsOutcome, SettingsSnapshot, SettingsUpdate};
pub use store::ConfigStore;
