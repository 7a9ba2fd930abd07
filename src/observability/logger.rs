//! Structured JSON logger
//!
//! - One log line = one event, one JSON object
//! - Key order: `event`, `severity`, `ts`, `run_id`, then fields sorted by key
//! - ERROR and FATAL go to stderr, everything else to stdout
//! - Synchronous, no buffering
//! - Lines below the process-wide minimum severity are dropped

use std::fmt;
use std::io::{self, Write};
use std::str::FromStr;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Mutex;

use chrono::{SecondsFormat, Utc};

/// Log severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    /// Connection-level detail
    Trace = 0,
    /// Configured, no-op, completed
    Info = 1,
    /// Deferred, timed out, unreachable
    Warn = 2,
    /// Command failure
    Error = 3,
    /// Run cannot continue
    Fatal = 4,
}

impl Severity {
    /// Returns the string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Trace => "TRACE",
            Severity::Info => "INFO",
            Severity::Warn => "WARN",
            Severity::Error => "ERROR",
            Severity::Fatal => "FATAL",
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            0 => Severity::Trace,
            1 => Severity::Info,
            2 => Severity::Warn,
            3 => Severity::Error,
            _ => Severity::Fatal,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Severity {
    type Err = String;

    /// Parses config-style lowercase names.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "trace" => Ok(Severity::Trace),
            "info" => Ok(Severity::Info),
            "warn" | "warning" => Ok(Severity::Warn),
            "error" => Ok(Severity::Error),
            "fatal" => Ok(Severity::Fatal),
            other => Err(format!("unknown log level '{}'", other)),
        }
    }
}

static MIN_SEVERITY: AtomicU8 = AtomicU8::new(Severity::Info as u8);
static RUN_ID: Mutex<Option<String>> = Mutex::new(None);

/// Structured logger writing JSON lines
pub struct Logger;

impl Logger {
    /// Drop lines below `severity` from now on.
    pub fn set_min_severity(severity: Severity) {
        MIN_SEVERITY.store(severity as u8, Ordering::Relaxed);
    }

    pub fn min_severity() -> Severity {
        Severity::from_u8(MIN_SEVERITY.load(Ordering::Relaxed))
    }

    /// Tag every following line with `run_id`, or stop tagging with `None`.
    pub fn set_run_id(run_id: Option<&str>) {
        let mut slot = RUN_ID.lock().unwrap_or_else(|p| p.into_inner());
        *slot = run_id.map(str::to_string);
    }

    /// Run id currently tagged on every line.
    pub fn run_id() -> Option<String> {
        RUN_ID.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }

    /// Log an event with the given severity and fields
    pub fn log(severity: Severity, event: &str, fields: &[(&str, &str)]) {
        if severity < Self::min_severity() {
            return;
        }
        let run_id = Self::run_id();
        let line = Self::render(severity, event, fields, &Self::timestamp(), run_id.as_deref());
        let _ = if severity >= Severity::Error {
            Self::emit(&line, &mut io::stderr())
        } else {
            Self::emit(&line, &mut io::stdout())
        };
    }

    fn timestamp() -> String {
        Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
    }

    fn emit<W: Write>(line: &str, writer: &mut W) -> io::Result<()> {
        writer.write_all(line.as_bytes())?;
        writer.flush()
    }

    /// Render one log line, newline-terminated
    fn render(
        severity: Severity,
        event: &str,
        fields: &[(&str, &str)],
        ts: &str,
        run_id: Option<&str>,
    ) -> String {
        let mut output = String::with_capacity(192);

        output.push('{');
        Self::push_pair(&mut output, "event", event);
        output.push(',');
        Self::push_pair(&mut output, "severity", severity.as_str());
        output.push(',');
        Self::push_pair(&mut output, "ts", ts);
        if let Some(run_id) = run_id {
            output.push(',');
            Self::push_pair(&mut output, "run_id", run_id);
        }

        let mut sorted: Vec<&(&str, &str)> = fields.iter().collect();
        sorted.sort_by_key(|(k, _)| *k);
        for (key, value) in sorted {
            output.push(',');
            Self::push_pair(&mut output, key, value);
        }

        output.push_str("}\n");
        output
    }

    fn push_pair(output: &mut String, key: &str, value: &str) {
        output.push('"');
        Self::escape_json_string(output, key);
        output.push_str("\":\"");
        Self::escape_json_string(output, value);
        output.push('"');
    }

    /// Escape special characters for JSON strings
    fn escape_json_string(output: &mut String, s: &str) {
        for c in s.chars() {
            match c {
                '"' => output.push_str("\\\""),
                '\\' => output.push_str("\\\\"),
                '\n' => output.push_str("\\n"),
                '\r' => output.push_str("\\r"),
                '\t' => output.push_str("\\t"),
                c if c.is_control() => {
                    output.push_str(&format!("\\u{:04x}", c as u32));
                }
                c => output.push(c),
            }
        }
    }

    /// Log at TRACE level
    pub fn trace(event: &str, fields: &[(&str, &str)]) {
        Self::log(Severity::Trace, event, fields);
    }

    /// Log at INFO level
    pub fn info(event: &str, fields: &[(&str, &str)]) {
        Self::log(Severity::Info, event, fields);
    }

    /// Log at WARN level
    pub fn warn(event: &str, fields: &[(&str, &str)]) {
        Self::log(Severity::Warn, event, fields);
    }

    /// Log at ERROR level
    pub fn error(event: &str, fields: &[(&str, &str)]) {
        Self::log(Severity::Error, event, fields);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(event: &str, fields: &[(&str, &str)]) -> String {
        Logger::render(Severity::Info, event, fields, "2024-01-01T00:00:00.000Z", None)
    }

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Trace < Severity::Info);
        assert!(Severity::Info < Severity::Warn);
        assert!(Severity::Warn < Severity::Error);
        assert!(Severity::Error < Severity::Fatal);
    }

    #[test]
    fn test_severity_from_config_name() {
        assert_eq!("info".parse::<Severity>(), Ok(Severity::Info));
        assert_eq!("WARNING".parse::<Severity>(), Ok(Severity::Warn));
        assert!("verbose".parse::<Severity>().is_err());
    }

    #[test]
    fn test_line_is_valid_json() {
        let output = render("REPLICA_SET_INITIATED", &[("replica_set", "rs0")]);
        let parsed: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(parsed["event"], "REPLICA_SET_INITIATED");
        assert_eq!(parsed["severity"], "INFO");
        assert_eq!(parsed["replica_set"], "rs0");
        assert_eq!(parsed["ts"], "2024-01-01T00:00:00.000Z");
    }

    #[test]
    fn test_fields_sorted_after_header() {
        let a = render("E", &[("zebra", "1"), ("apple", "2")]);
        let b = render("E", &[("apple", "2"), ("zebra", "1")]);
        assert_eq!(a, b);
        assert!(a.find("\"event\"").unwrap() < a.find("\"severity\"").unwrap());
        assert!(a.find("apple").unwrap() < a.find("zebra").unwrap());
    }

    #[test]
    fn test_run_id_included_when_set() {
        let output = Logger::render(Severity::Warn, "E", &[], "t", Some("abc"));
        let parsed: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(parsed["run_id"], "abc");
    }

    #[test]
    fn test_escapes_special_chars() {
        let output = render("E", &[("message", "hello \"world\"\nline2")]);
        let parsed: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(parsed["message"], "hello \"world\"\nline2");
        assert_eq!(output.matches('\n').count(), 1);
    }
}
