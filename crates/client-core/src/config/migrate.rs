//! Configuration migration and normalization
//!
//! Historical configuration files are brought up to date by an ordered
//! list of rewrite rules applied once per process lifetime, before the
//! engine first parses the document. Order matters: module renames must
//! run before the duplicate-add guards that test for the renamed form.
//!
//! Every rule is idempotent, so the whole batch can be re-applied to an
//! already migrated document without changing it. Guards are substring
//! containment over the document text, never a structural parse, which
//! keeps unknown directives out of harm's way.

use std::net::IpAddr;

use tracing::debug;

use crate::config::document::{ConfigDocument, MODULE_ANCHOR};

/// Environment facts the rule list depends on.
#[derive(Debug, Clone, Default)]
pub struct MigrateContext {
    /// Whether the device has a usable camera; controls the video source
    /// and preview modules.
    pub has_camera: bool,
    /// System resolvers, used to rewrite `dns_server` lines when dynamic
    /// DNS is enabled.
    pub dns_servers: Vec<IpAddr>,
    /// Directory the `snd_path` directive is pointed at.
    pub recordings_dir: String,
}

/// One idempotent rewrite of the configuration document.
#[derive(Debug, Clone)]
pub enum MigrationRule {
    /// Literal substring replacement across the whole document
    ReplaceText { from: String, to: String },
    /// Remove every line starting with the prefix
    RemoveLines { prefix: String },
    /// Append the line unless the document already contains it
    AddLineIfAbsent { line: String },
    /// Insert the line before the module anchor unless already present
    AddModuleIfAbsent { line: String },
    /// Remove all lines of the directive, then append a single line
    ReplaceVariable { name: String, value: String },
    /// Remove every line with the prefix, then append the given lines;
    /// the multi-valued form of a directive replacement
    ReplaceLines { prefix: String, lines: Vec<String> },
    /// Apply the sub-rules only while the document contains the needle
    IfPresent {
        needle: String,
        rules: Vec<MigrationRule>,
    },
    /// Apply the sub-rules only while the document lacks the needle
    IfAbsent {
        needle: String,
        rules: Vec<MigrationRule>,
    },
}

impl MigrationRule {
    /// Apply the rule to the document.
    pub fn apply(&self, doc: &mut ConfigDocument) {
        match self {
            MigrationRule::ReplaceText { from, to } => doc.replace_text(from, to),
            MigrationRule::RemoveLines { prefix } => doc.remove_lines_with_prefix(prefix),
            MigrationRule::AddLineIfAbsent { line } => {
                if !doc.contains(line) {
                    doc.add_line(line.clone());
                }
            }
            MigrationRule::AddModuleIfAbsent { line } => {
                if !doc.contains(line) {
                    doc.insert_before_anchor(line.clone(), MODULE_ANCHOR);
                }
            }
            MigrationRule::ReplaceVariable { name, value } => {
                // Skip when already in normal form, so re-running the
                // batch does not move the line around.
                let target = format!("{name} {value}");
                let prefix = format!("{name} ");
                let mut current = doc.lines().iter().filter(|l| l.starts_with(&prefix));
                if !(current.next().map(String::as_str) == Some(target.as_str())
                    && current.next().is_none())
                {
                    doc.replace_variable(name, value);
                }
            }
            MigrationRule::ReplaceLines { prefix, lines } => {
                let up_to_date = doc
                    .lines()
                    .iter()
                    .filter(|l| l.starts_with(prefix.as_str()))
                    .map(String::as_str)
                    .eq(lines.iter().map(String::as_str));
                if !up_to_date {
                    doc.remove_lines_with_prefix(prefix);
                    for line in lines {
                        doc.add_line(line.clone());
                    }
                }
            }
            MigrationRule::IfPresent { needle, rules } => {
                if doc.contains(needle) {
                    for rule in rules {
                        rule.apply(doc);
                    }
                }
            }
            MigrationRule::IfAbsent { needle, rules } => {
                if !doc.contains(needle) {
                    for rule in rules {
                        rule.apply(doc);
                    }
                }
            }
        }
    }
}

fn replace(from: &str, to: &str) -> MigrationRule {
    MigrationRule::ReplaceText {
        from: from.to_string(),
        to: to.to_string(),
    }
}

fn remove(prefix: &str) -> MigrationRule {
    MigrationRule::RemoveLines {
        prefix: prefix.to_string(),
    }
}

fn add_if_absent(line: &str) -> MigrationRule {
    MigrationRule::AddLineIfAbsent {
        line: line.to_string(),
    }
}

fn add_module(line: &str) -> MigrationRule {
    MigrationRule::AddModuleIfAbsent {
        line: line.to_string(),
    }
}

fn set_var(name: &str, value: &str) -> MigrationRule {
    MigrationRule::ReplaceVariable {
        name: name.to_string(),
        value: value.to_string(),
    }
}

fn if_present(needle: &str, rules: Vec<MigrationRule>) -> MigrationRule {
    MigrationRule::IfPresent {
        needle: needle.to_string(),
        rules,
    }
}

fn if_absent(needle: &str, rules: Vec<MigrationRule>) -> MigrationRule {
    MigrationRule::IfAbsent {
        needle: needle.to_string(),
        rules,
    }
}

/// Format a resolver address as `address:53`; IPv6 addresses are bracketed.
pub(crate) fn name_server_entry(addr: &IpAddr) -> String {
    match addr {
        IpAddr::V4(v4) => format!("{v4}:53"),
        IpAddr::V6(v6) => format!("[{v6}]:53"),
    }
}

fn dns_server_line(addr: &IpAddr) -> String {
    format!("dns_server {}", name_server_entry(addr))
}

/// The ordered migration rule list.
pub fn migration_rules(ctx: &MigrateContext) -> Vec<MigrationRule> {
    let mut rules = vec![
        // Module renames from older releases. These must precede the
        // guarded adds below that test for the renamed forms.
        replace("module_tmp uuid.so", "module uuid.so"),
        replace("module_tmp account.so", "module_app account.so"),
        replace("webrtc_aec.so", "webrtc_aecm.so"),
        replace("module zrtp.so", "module gzrtp.so"),
        // Contacts moved out of the engine.
        remove("module_app contact.so"),
        add_if_absent("module gsm.so"),
        if_present("rtp_stats no", vec![set_var("rtp_stats", "yes")]),
    ];

    if ctx.has_camera {
        rules.push(if_absent(
            "module avformat.so",
            vec![
                add_module("module avformat.so"),
                add_module("module selfview.so"),
            ],
        ));
    } else {
        rules.push(remove("module avformat.so"));
        rules.push(remove("module selfview.so"));
    }

    rules.extend([
        // Re-anchor the H.26x codec next to AV1 the first time AV1 shows up.
        if_absent(
            "module av1.so",
            vec![
                remove("module avcodec.so"),
                add_module("module avcodec.so"),
                add_module("module av1.so"),
            ],
        ),
        add_module("module snapshot.so"),
        if_absent("log_level", vec![add_if_absent("log_level 2")]),
        if_absent("call_volume", vec![add_if_absent("call_volume 0")]),
        if_absent("dyn_dns", vec![add_if_absent("dyn_dns no")]),
        if_present(
            "dyn_dns yes",
            vec![MigrationRule::ReplaceLines {
                prefix: "dns_server ".to_string(),
                lines: ctx.dns_servers.iter().map(dns_server_line).collect(),
            }],
        ),
        if_absent(
            "audio_buffer_mode",
            vec![add_if_absent("audio_buffer_mode adaptive")],
        ),
        set_var("audio_buffer", "20-300"),
        // Jitter buffer directives were split per media type.
        remove("jitter_buffer_type "),
        remove("jitter_buffer_delay "),
        set_var("audio_jitter_buffer_type", "adaptive"),
        set_var("audio_jitter_buffer_delay", "0-20"),
        set_var("video_jitter_buffer_type", "adaptive"),
        set_var("video_jitter_buffer_delay", "1-50"),
        if_absent("rtp_timeout", vec![add_if_absent("rtp_timeout 60")]),
        if_absent(
            "dtls_srtp_use_ec",
            vec![add_if_absent("dtls_srtp_use_ec prime256v1")],
        ),
        set_var("snd_path", &ctx.recordings_dir),
    ]);

    rules
}

/// Apply the full migration batch in order.
pub fn migrate(doc: &mut ConfigDocument, ctx: &MigrateContext) {
    for rule in migration_rules(ctx) {
        rule.apply(doc);
    }
    debug!(lines = doc.lines().len(), "config migration applied");
}

/// Settings the service layer reads out of a migrated document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartupSettings {
    /// Engine log level, `0` is debug
    pub log_level: u32,
    /// Call volume adjustment, `0` means no adjustment
    pub call_volume: u32,
    /// Added audio delay in milliseconds, when configured
    pub audio_delay: Option<i64>,
    /// Preferred network address family, when pinned
    pub address_family: Option<String>,
    /// Whether name servers follow the system resolvers
    pub dyn_dns: bool,
    /// Where contact storage lives
    pub contacts_mode: String,
}

impl StartupSettings {
    /// Read the startup settings from a migrated document.
    pub fn from_document(doc: &ConfigDocument) -> Self {
        let first_parsed = |name: &str, default| {
            doc.variable(name)
                .first()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default)
        };
        Self {
            log_level: first_parsed("log_level", 2),
            call_volume: first_parsed("call_volume", 0),
            audio_delay: doc
                .variable("audio_delay")
                .first()
                .and_then(|v| v.parse().ok()),
            address_family: doc.variable("net_af").first().cloned(),
            dyn_dns: doc.variable("dyn_dns").first().map(String::as_str) == Some("yes"),
            contacts_mode: doc
                .variable("contacts_mode")
                .first()
                .map(|m| m.to_lowercase())
                .unwrap_or_else(|| "local".to_string()),
        }
    }
}
