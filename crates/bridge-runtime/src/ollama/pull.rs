//! Parsing of the runtime's streaming pull protocol.
//!
//! The pull endpoint answers with newline-delimited JSON records:
//!
//! ```json
//! {"status": "pulling manifest"}
//! {"status": "pulling 6a0746a1ec1a", "digest": "sha256:6a07...", "total": 4661211424, "completed": 1048576}
//! {"status": "success"}
//! {"error": "pull model manifest: file does not exist"}
//! ```

use bridge_core::PullProgress;
use serde::Deserialize;
use thiserror::Error;

/// Errors decoding a single pull record.
#[derive(Debug, Error)]
pub enum PullParseError {
    #[error("Invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("Record has neither 'status' nor 'error'")]
    MissingStatus,
}

/// One decoded pull record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PullEvent {
    Progress(PullProgress),
    /// The runtime reported a failure; the pull will not complete.
    Failed(String),
}

#[derive(Deserialize)]
struct RawRecord {
    status: Option<String>,
    digest: Option<String>,
    total: Option<u64>,
    completed: Option<u64>,
    error: Option<String>,
}

/// Parse one NDJSON line.
pub fn parse_pull_line(line: &str) -> Result<PullEvent, PullParseError> {
    let raw: RawRecord = serde_json::from_str(line)?;

    if let Some(message) = raw.error {
        return Ok(PullEvent::Failed(message));
    }

    let status = raw.status.ok_or(PullParseError::MissingStatus)?;
    Ok(PullEvent::Progress(PullProgress {
        status,
        digest: raw.digest,
        completed: raw.completed,
        total: raw.total,
    }))
}

/// Splits an arbitrary chunked byte stream into complete lines.
#[derive(Debug, Default)]
pub struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk and return every line it completed, in order.
    /// Blank lines are dropped.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);
        let mut lines = Vec::new();
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let raw: Vec<u8> = self.pending.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&raw);
            let line = line.trim();
            if !line.is_empty() {
                lines.push(line.to_string());
            }
        }
        lines
    }

    /// Whatever remains after the stream ended without a trailing newline.
    pub fn finish(self) -> Option<String> {
        let line = String::from_utf8_lossy(&self.pending).trim().to_string();
        (!line.is_empty()).then_some(line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_record() {
        let event = parse_pull_line(
            r#"{"status":"pulling 6a07","digest":"sha256:6a07","total":200,"completed":50}"#,
        )
        .unwrap();
        assert_eq!(
            event,
            PullEvent::Progress(PullProgress {
                status: "pulling 6a07".into(),
                digest: Some("sha256:6a07".into()),
                completed: Some(50),
                total: Some(200),
            })
        );
    }

    #[test]
    fn test_error_record() {
        let event = parse_pull_line(r#"{"error":"file does not exist"}"#).unwrap();
        assert_eq!(event, PullEvent::Failed("file does not exist".into()));
    }

    #[test]
    fn test_malformed_records() {
        assert!(matches!(
            parse_pull_line("not json"),
            Err(PullParseError::InvalidJson(_))
        ));
        assert!(matches!(
            parse_pull_line(r#"{"digest":"x"}"#),
            Err(PullParseError::MissingStatus)
        ));
    }

    #[test]
    fn test_line_buffer_reassembles_split_chunks() {
        let mut buffer = LineBuffer::new();
        assert!(buffer.push(br#"{"status":"pull"#).is_empty());
        let lines = buffer.push(b"ing manifest\"}\n\n{\"status\":\"verifying\"}\n{\"sta");
        assert_eq!(
            lines,
            vec![
                r#"{"status":"pulling manifest"}"#.to_string(),
                r#"{"status":"verifying"}"#.to_string(),
            ]
        );
        assert_eq!(buffer.finish(), Some(r#"{"sta"#.to_string()));
    }

    #[test]
    fn test_line_buffer_empty_finish() {
        let mut buffer = LineBuffer::new();
        buffer.push(b"{\"status\":\"success\"}\n");
        assert_eq!(buffer.finish(), None);
    }
}
