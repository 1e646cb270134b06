//! Line-oriented configuration document
//!
//! The engine's configuration is a flat text file of directive lines,
//! `# comment` lines and blanks. The document is deliberately schema free:
//! mutation is line granular, so directives this layer does not know about
//! survive every rewrite untouched. Lines that do not match the
//! `<directive> <value>` shape are preserved verbatim and simply excluded
//! from [`ConfigDocument::variable`] lookups.
//!
//! The file is single-byte encoded (Latin-1 compatible); values containing
//! `#` cannot be represented because `#` starts a trailing comment.

/// Anchor line for module insertion. Codec and filter modules must be
/// loaded before the audio driver module, so anchored adds go in front of
/// this line.
pub const MODULE_ANCHOR: &str = "module opensles.so";

/// Ordered sequence of configuration lines
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ConfigDocument {
    lines: Vec<String>,
}

impl ConfigDocument {
    /// Parse a document from raw file bytes, one byte per character.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let text: String = bytes.iter().map(|&b| b as char).collect();
        let mut lines: Vec<String> = text.split('\n').map(str::to_string).collect();
        // A well-formed file ends with a newline, which split leaves as a
        // trailing empty segment.
        if lines.last().is_some_and(|l| l.is_empty()) {
            lines.pop();
        }
        Self { lines }
    }

    /// Serialize to file bytes: non-empty lines only, each terminated by a
    /// newline. Characters above U+00FF cannot appear in a valid document
    /// and are replaced.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        for line in self.lines.iter().filter(|l| !l.is_empty()) {
            for ch in line.chars() {
                out.push(if (ch as u32) <= 0xFF { ch as u8 } else { b'?' });
            }
            out.push(b'\n');
        }
        out
    }

    /// The current lines, in order.
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Substring containment test across the whole document.
    pub fn contains(&self, needle: &str) -> bool {
        self.lines.iter().any(|l| l.contains(needle))
    }

    /// Trimmed values of every line whose directive equals `name`, in
    /// document order. A trailing `# comment` is stripped from each value.
    pub fn variable(&self, name: &str) -> Vec<String> {
        let mut values = Vec::new();
        for line in &self.lines {
            let Some((directive, rest)) = line.split_once(char::is_whitespace) else {
                continue;
            };
            if directive != name {
                continue;
            }
            let value = match rest.split('#').next() {
                Some(v) => v.trim(),
                None => "",
            };
            values.push(value.to_string());
        }
        values
    }

    /// Append a line at the end of the document.
    pub fn add_line(&mut self, line: impl Into<String>) {
        self.lines.push(line.into());
    }

    /// Remove every line starting with `prefix`.
    pub fn remove_lines_with_prefix(&mut self, prefix: &str) {
        self.lines.retain(|l| !l.starts_with(prefix));
    }

    /// Insert a line before the first occurrence of `anchor`, or append
    /// when the anchor line is absent.
    pub fn insert_before_anchor(&mut self, line: impl Into<String>, anchor: &str) {
        let line = line.into();
        match self.lines.iter().position(|l| l == anchor) {
            Some(pos) => self.lines.insert(pos, line),
            None => self.lines.push(line),
        }
    }

    /// Remove every line of the directive `name`.
    pub fn remove_variable(&mut self, name: &str) {
        self.remove_lines_with_prefix(&format!("{name} "));
    }

    /// Replace all lines of directive `name` with a single `name value`
    /// line appended at the end.
    pub fn replace_variable(&mut self, name: &str, value: &str) {
        self.remove_variable(name);
        self.add_line(format!("{name} {value}"));
    }

    /// Literal substring replacement across every line.
    pub fn replace_text(&mut self, from: &str, to: &str) {
        for line in &mut self.lines {
            if line.contains(from) {
                *line = line.replace(from, to);
            }
        }
    }

    /// Drop empty lines. Applied before the document is persisted.
    pub fn normalize(&mut self) {
        self.lines.retain(|l| !l.is_empty());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(text: &str) -> ConfigDocument {
        ConfigDocument::from_bytes(text.as_bytes())
    }

    #[test]
    fn variable_returns_values_in_document_order() {
        let mut d = ConfigDocument::default();
        d.add_line("x 1");
        d.add_line("x 2");
        assert_eq!(d.variable("x"), vec!["1", "2"]);
    }

    #[test]
    fn variable_strips_trailing_comment() {
        let d = doc("log_level 2 # warnings and up\n");
        assert_eq!(d.variable("log_level"), vec!["2"]);
    }

    #[test]
    fn variable_requires_exact_directive_match() {
        let d = doc("dns_server 8.8.8.8:53\ndns_server_backup 1.1.1.1:53\n");
        assert_eq!(d.variable("dns_server"), vec!["8.8.8.8:53"]);
    }

    #[test]
    fn unparseable_lines_are_preserved_but_not_looked_up() {
        let d = doc("# comment line\nbare_token\naudio_buffer 20-300\n");
        assert_eq!(d.variable("bare_token"), Vec::<String>::new());
        assert_eq!(d.lines().len(), 3);
        assert!(d.contains("bare_token"));
    }

    #[test]
    fn replace_variable_collapses_to_single_line() {
        let mut d = doc("log_level 1\nother x\nlog_level 3\n");
        d.replace_variable("log_level", "0");
        assert_eq!(d.variable("log_level"), vec!["0"]);
        assert_eq!(d.variable("other"), vec!["x"]);
    }

    #[test]
    fn remove_variable_removes_all_lines() {
        let mut d = doc("dns_server 8.8.8.8:53\ndyn_dns no\ndns_server 1.1.1.1:53\n");
        d.remove_variable("dns_server");
        assert_eq!(d.variable("dns_server"), Vec::<String>::new());
        assert_eq!(d.variable("dyn_dns"), vec!["no"]);
    }

    #[test]
    fn anchored_insert_goes_before_anchor() {
        let mut d = doc("module g711.so\nmodule opensles.so\n");
        d.insert_before_anchor("module gsm.so", MODULE_ANCHOR);
        assert_eq!(
            d.lines(),
            &["module g711.so", "module gsm.so", "module opensles.so"]
        );
    }

    #[test]
    fn anchored_insert_appends_without_anchor() {
        let mut d = doc("module g711.so\n");
        d.insert_before_anchor("module gsm.so", MODULE_ANCHOR);
        assert_eq!(d.lines(), &["module g711.so", "module gsm.so"]);
    }

    #[test]
    fn round_trip_preserves_directive_lines_and_order() {
        let original = doc("# header\nsip_listen 0.0.0.0:5060\n\ndyn_dns no\n");
        let reloaded = ConfigDocument::from_bytes(&original.to_bytes());
        // Blank lines are dropped on save; everything else survives in order.
        assert_eq!(
            reloaded.lines(),
            &["# header", "sip_listen 0.0.0.0:5060", "dyn_dns no"]
        );
    }

    #[test]
    fn latin1_bytes_survive_round_trip() {
        let bytes = b"ua_display_name caf\xe9\n";
        let d = ConfigDocument::from_bytes(bytes);
        assert_eq!(d.to_bytes(), bytes.to_vec());
    }
}
