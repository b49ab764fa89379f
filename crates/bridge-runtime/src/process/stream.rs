//! Byte-based line readers for child output.
//!
//! Worker output may contain non-UTF-8 bytes. `BufReader::lines()` would end
//! the reader on the first invalid sequence, so lines are read as bytes and
//! decoded lossily.

use bridge_core::LogLevel;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::task::JoinHandle;
use tracing::debug;

/// Which standard stream a line came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputStream {
    Stdout,
    Stderr,
}

impl OutputStream {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Stdout => "stdout",
            Self::Stderr => "stderr",
        }
    }

    /// Severity assigned to lines that carry no level of their own.
    pub const fn default_level(self) -> LogLevel {
        match self {
            Self::Stdout => LogLevel::Info,
            Self::Stderr => LogLevel::Error,
        }
    }
}

/// Spawn a task that calls `on_line` for every line of `stream`, in order.
///
/// The task ends at EOF or on the first read error.
pub fn spawn_line_reader<R, F>(stream: R, kind: OutputStream, mut on_line: F) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
    F: FnMut(String) + Send + 'static,
{
    tokio::spawn(async move {
        let mut reader = BufReader::new(stream);
        let mut buf: Vec<u8> = Vec::with_capacity(1024);

        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => break,
                Ok(_) => {
                    if buf.last() == Some(&b'\n') {
                        buf.pop();
                        if buf.last() == Some(&b'\r') {
                            buf.pop();
                        }
                    }
                    on_line(String::from_utf8_lossy(&buf).into_owned());
                }
                Err(e) => {
                    debug!(stream = kind.as_str(), error = %e, "Output reader exiting on read error");
                    break;
                }
            }
        }

        debug!(stream = kind.as_str(), "Output reader finished");
    })
}
