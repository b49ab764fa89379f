//! Classification of worker output lines.
//!
//! The worker is launched with `--json-logs`, but not every line it prints is
//! JSON (panics, library warnings, shell wrappers). Each line becomes either a
//! [`StructuredRecord`] or a [`PlainRecord`].

use bridge_core::LogLevel;
use serde_json::{Map, Value};

use crate::process::OutputStream;

/// Keys that may carry the worker's active workspace count.
const WORKSPACE_COUNT_KEYS: [&str; 3] = ["active_workspaces", "activeWorkspaces", "workspaces"];

/// A line that decoded as a JSON object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructuredRecord {
    pub level: LogLevel,
    pub message: String,
    pub active_workspaces: Option<u32>,
}

/// Any other line, tagged with the stream's default severity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlainRecord {
    pub level: LogLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedLine {
    Structured(StructuredRecord),
    Plain(PlainRecord),
}

impl ParsedLine {
    pub const fn level(&self) -> LogLevel {
        match self {
            Self::Structured(r) => r.level,
            Self::Plain(r) => r.level,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::Structured(r) => &r.message,
            Self::Plain(r) => &r.message,
        }
    }

    pub const fn active_workspaces(&self) -> Option<u32> {
        match self {
            Self::Structured(r) => r.active_workspaces,
            Self::Plain(_) => None,
        }
    }

    /// Whether this line indicates the worker holds a live remote connection.
    ///
    /// A workspace count is only reported while connected. Otherwise the
    /// message is matched case-insensitively against "connected", ignoring
    /// messages about disconnecting.
    pub fn signals_connected(&self) -> bool {
        if self.active_workspaces().is_some() {
            return true;
        }
        let message = self.message().to_ascii_lowercase();
        message.contains("connected") && !message.contains("disconnect")
    }
}

/// Parse one output line. Blank lines yield `None`.
pub fn parse_line(line: &str, stream: OutputStream) -> Option<ParsedLine> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return None;
    }

    if trimmed.starts_with('{') {
        if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(trimmed) {
            return Some(ParsedLine::Structured(structured(&map, trimmed, stream)));
        }
    }

    Some(ParsedLine::Plain(PlainRecord {
        level: stream.default_level(),
        message: trimmed.to_string(),
    }))
}

fn structured(map: &Map<String, Value>, raw: &str, stream: OutputStream) -> StructuredRecord {
    let fields = map.get("fields").and_then(Value::as_object);

    let message = lookup_str(map, fields, &["message", "msg"])
        .map_or_else(|| raw.to_string(), str::to_string);

    let level = lookup_str(map, None, &["level", "severity", "levelname"])
        .and_then(LogLevel::parse_lenient)
        .unwrap_or_else(|| stream.default_level());

    let active_workspaces = WORKSPACE_COUNT_KEYS
        .iter()
        .find_map(|key| {
            map.get(*key)
                .or_else(|| fields.and_then(|f| f.get(*key)))
                .and_then(Value::as_u64)
        })
        .map(|n| u32::try_from(n).unwrap_or(u32::MAX));

    StructuredRecord {
        level,
        message,
        active_workspaces,
    }
}

fn lookup_str<'a>(
    map: &'a Map<String, Value>,
    nested: Option<&'a Map<String, Value>>,
    keys: &[&str],
) -> Option<&'a str> {
    keys.iter()
        .find_map(|k| map.get(*k).and_then(Value::as_str))
        .or_else(|| nested.and_then(|n| keys.iter().find_map(|k| n.get(*k).and_then(Value::as_str))))
}
