//! Configuration store
//!
//! [`ConfigStore`] owns the in-memory configuration document, the path it
//! is persisted at and the pristine template used for first installs and
//! resets. Mutators only touch the in-memory document; [`ConfigStore::save`]
//! is the single operation that writes durable storage.
//!
//! The document is loaded once per process lifetime and normalized by the
//! migration batch in [`ConfigStore::initialize`] before the engine first
//! parses it. Re-initializing an already migrated file changes nothing.

use std::net::IpAddr;
use std::path::{Path, PathBuf};

use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::config::document::{ConfigDocument, MODULE_ANCHOR};
use crate::config::migrate::{self, name_server_entry, MigrateContext, StartupSettings};
use crate::engine::EngineGateway;
use crate::error::{ClientError, ClientResult};

pub struct ConfigStore {
    path: PathBuf,
    template: String,
    doc: RwLock<ConfigDocument>,
}

impl ConfigStore {
    /// Open the store, reading the document from `path`. A missing file is
    /// seeded from the pristine template; any other IO failure is an error.
    pub async fn open(path: impl Into<PathBuf>, template: impl Into<String>) -> ClientResult<Self> {
        let path = path.into();
        let template = template.into();
        let doc = match tokio::fs::read(&path).await {
            Ok(bytes) => ConfigDocument::from_bytes(&bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %path.display(), "no config file, seeding from template");
                ConfigDocument::from_bytes(template.as_bytes())
            }
            Err(e) => return Err(ClientError::ConfigIo(e)),
        };
        Ok(Self {
            path,
            template,
            doc: RwLock::new(doc),
        })
    }

    /// Run the migration batch, persist the result and return the settings
    /// the service layer needs at startup. Safe to call on an already
    /// migrated document.
    pub async fn initialize(&self, ctx: &MigrateContext) -> ClientResult<StartupSettings> {
        let mut doc = self.doc.write().await;
        migrate::migrate(&mut doc, ctx);
        doc.normalize();
        self.persist(&doc).await?;
        let settings = StartupSettings::from_document(&doc);
        info!(path = %self.path.display(), lines = doc.lines().len(), "config initialized");
        Ok(settings)
    }

    /// Values of the directive, in document order.
    pub async fn variable(&self, name: &str) -> Vec<String> {
        self.doc.read().await.variable(name)
    }

    /// Append a raw line.
    pub async fn add_line(&self, line: impl Into<String>) {
        self.doc.write().await.add_line(line);
    }

    /// Remove every line starting with `prefix`.
    pub async fn remove_line(&self, prefix: &str) {
        self.doc.write().await.remove_lines_with_prefix(prefix);
    }

    /// Add a module line in front of the audio driver anchor.
    pub async fn add_module_line(&self, line: impl Into<String>) {
        self.doc.write().await.insert_before_anchor(line, MODULE_ANCHOR);
    }

    /// Remove every line of the directive.
    pub async fn remove_variable(&self, name: &str) {
        self.doc.write().await.remove_variable(name);
    }

    /// Replace all lines of the directive with a single one.
    pub async fn replace_variable(&self, name: &str, value: &str) {
        self.doc.write().await.replace_variable(name, value);
    }

    /// Discard all mutations and restore the pristine template, persisted
    /// immediately.
    pub async fn reset(&self) -> ClientResult<()> {
        let mut doc = self.doc.write().await;
        *doc = ConfigDocument::from_bytes(self.template.as_bytes());
        self.persist(&doc).await?;
        info!(path = %self.path.display(), "config reset to template");
        Ok(())
    }

    /// Collapse the document to non-empty lines and write it out. The only
    /// mutator that touches durable storage.
    pub async fn save(&self) -> ClientResult<()> {
        let mut doc = self.doc.write().await;
        doc.normalize();
        self.persist(&doc).await?;
        debug!(path = %self.path.display(), lines = doc.lines().len(), "config saved");
        Ok(())
    }

    /// Point the engine's resolver at the given servers, `address:53`
    /// each, IPv6 bracketed. Does not touch the document; `dns_server`
    /// lines are the caller's concern.
    pub async fn update_dns_servers(
        &self,
        engine: &dyn EngineGateway,
        servers: &[IpAddr],
    ) -> ClientResult<()> {
        let joined = servers
            .iter()
            .map(name_server_entry)
            .collect::<Vec<_>>()
            .join(",");
        let code = engine.set_name_servers(&joined).await;
        if code != 0 {
            return Err(ClientError::engine_failed("set_name_servers", code));
        }
        Ok(())
    }

    /// Path the document is persisted at.
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn persist(&self, doc: &ConfigDocument) -> ClientResult<()> {
        tokio::fs::write(&self.path, doc.to_bytes())
            .await
            .map_err(ClientError::ConfigIo)
    }
}
