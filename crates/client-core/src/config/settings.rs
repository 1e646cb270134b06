//! Typed application of user-facing configuration settings
//!
//! The presentation layer edits settings as typed values; this module
//! validates them and translates them into directive edits on the
//! [`ConfigStore`]. Validation failures leave the document untouched, and
//! nothing is persisted unless at least one directive actually changed.

use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};

use tracing::info;

use crate::config::store::ConfigStore;
use crate::engine::EngineGateway;
use crate::error::{ClientError, ClientResult};

/// Current values of the user-facing settings, read from the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettingsSnapshot {
    /// `auto_start` directive
    pub auto_start: bool,
    /// `sip_listen` directive, empty when the engine picks the address
    pub listen_address: String,
    /// Static `dns_server` entries; empty when `dyn_dns` is enabled
    pub dns_servers: Vec<String>,
    /// `sip_verify_server` directive
    pub verify_server: bool,
    /// Whether a TLS client certificate is configured
    pub has_certificate: bool,
    /// Whether a CA file is configured
    pub has_ca_file: bool,
    /// Whether the engine log level is at debug
    pub debug: bool,
}

impl SettingsSnapshot {
    pub async fn read(store: &ConfigStore) -> Self {
        let first_is_yes = |values: Vec<String>| values.first().map(String::as_str) == Some("yes");
        let dyn_dns = first_is_yes(store.variable("dyn_dns").await);
        Self {
            auto_start: first_is_yes(store.variable("auto_start").await),
            listen_address: store
                .variable("sip_listen")
                .await
                .first()
                .cloned()
                .unwrap_or_default(),
            dns_servers: if dyn_dns {
                Vec::new()
            } else {
                store.variable("dns_server").await
            },
            verify_server: first_is_yes(store.variable("sip_verify_server").await),
            has_certificate: !store.variable("sip_certificate").await.is_empty(),
            has_ca_file: !store.variable("sip_cafile").await.is_empty(),
            debug: store.variable("log_level").await.first().map(String::as_str) == Some("0"),
        }
    }
}

/// Requested settings changes; `None` fields are left alone.
#[derive(Debug, Clone, Default)]
pub struct SettingsUpdate {
    pub auto_start: Option<bool>,
    /// Empty string clears the directive
    pub listen_address: Option<String>,
    /// Empty list switches back to dynamic DNS
    pub dns_servers: Option<Vec<String>>,
    pub verify_server: Option<bool>,
    pub debug: Option<bool>,
}

/// What applying an update did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SettingsOutcome {
    /// Whether anything changed and the document was saved
    pub saved: bool,
    /// Whether the engine must be restarted to pick the changes up
    pub restart_required: bool,
}

/// Validate and apply a settings update.
///
/// All validation runs before any edit, so a rejected update leaves both
/// the document and the engine untouched. Static name servers are pushed
/// to the engine before the corresponding directives are written.
pub async fn apply_settings(
    store: &ConfigStore,
    engine: &dyn EngineGateway,
    update: SettingsUpdate,
) -> ClientResult<SettingsOutcome> {
    let current = SettingsSnapshot::read(store).await;
    let mut outcome = SettingsOutcome::default();

    let listen_address = update.listen_address.map(|a| a.trim().to_string());
    if let Some(addr) = &listen_address {
        if !addr.is_empty() && !is_address_port(addr) {
            return Err(ClientError::InvalidListenAddress {
                address: addr.clone(),
            });
        }
    }

    let dns_servers = match update.dns_servers {
        Some(list) => {
            let normalized: Vec<String> = list
                .iter()
                .map(|s| with_default_port(&s.trim().to_lowercase()))
                .filter(|s| !s.is_empty())
                .collect();
            if let Some(bad) = normalized.iter().find(|s| !is_address_port(s)) {
                return Err(ClientError::InvalidDnsServers {
                    servers: bad.clone(),
                });
            }
            Some(normalized)
        }
        None => None,
    };

    let verify_server = update.verify_server.unwrap_or(current.verify_server);
    if verify_server && !current.has_ca_file {
        return Err(ClientError::VerifyServerWithoutCa);
    }

    if let Some(auto_start) = update.auto_start {
        if auto_start != current.auto_start {
            store
                .replace_variable("auto_start", if auto_start { "yes" } else { "no" })
                .await;
            outcome.saved = true;
        }
    }

    if let Some(addr) = listen_address {
        if addr != current.listen_address {
            store.remove_variable("sip_listen").await;
            if !addr.is_empty() {
                store.add_line(format!("sip_listen {addr}")).await;
            }
            outcome.saved = true;
            outcome.restart_required = true;
        }
    }

    if let Some(servers) = dns_servers {
        if servers != current.dns_servers {
            if servers.is_empty() {
                store.remove_variable("dyn_dns").await;
                store.remove_variable("dns_server").await;
                store.add_line("dyn_dns yes").await;
            } else {
                let code = engine.set_name_servers(&servers.join(",")).await;
                if code != 0 {
                    return Err(ClientError::engine_failed("set_name_servers", code));
                }
                store.remove_variable("dyn_dns").await;
                store.remove_variable("dns_server").await;
                for server in &servers {
                    store.add_line(format!("dns_server {server}")).await;
                }
                store.add_line("dyn_dns no").await;
            }
            outcome.saved = true;
        }
    }

    if let Some(verify) = update.verify_server {
        if verify != current.verify_server {
            store
                .replace_variable("sip_verify_server", if verify { "yes" } else { "no" })
                .await;
            outcome.saved = true;
            outcome.restart_required = true;
        }
    }

    if let Some(debug) = update.debug {
        if debug != current.debug {
            store
                .replace_variable("log_level", if debug { "0" } else { "2" })
                .await;
            outcome.saved = true;
        }
    }

    if outcome.saved {
        store.save().await?;
        info!(restart = outcome.restart_required, "settings applied");
    }
    Ok(outcome)
}

/// `ip:port`, with IPv6 in brackets.
fn is_address_port(s: &str) -> bool {
    s.parse::<SocketAddr>().is_ok()
}

/// Complete a bare IP address with the default resolver port.
fn with_default_port(s: &str) -> String {
    if s.is_empty() || is_address_port(s) {
        return s.to_string();
    }
    if s.parse::<Ipv4Addr>().is_ok() {
        return format!("{s}:53");
    }
    if s.parse::<Ipv6Addr>().is_ok() {
        return format!("[{s}]:53");
    }
    s.to_string()
}
