//! Worker executable resolution.
//!
//! Candidates are checked in order:
//! 1. the bundled per-platform binary next to the running executable
//! 2. the development tree's `binaries/` directory
//! 3. the command name on `PATH`

use std::env::consts::{ARCH, EXE_SUFFIX, OS};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

/// Default worker command name.
pub const DEFAULT_WORKER_COMMAND: &str = "compute-pod";

#[derive(Debug, Clone)]
pub struct ExecutableLocator {
    command: String,
    bundled_dir: Option<PathBuf>,
    dev_dir: Option<PathBuf>,
    search_path: bool,
}

impl ExecutableLocator {
    /// Locator for `command` with the standard bundled and development directories.
    pub fn new(command: impl Into<String>) -> Self {
        let bundled_dir = std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(|dir| dir.join("binaries")));
        let dev_dir = Some(
            Path::new(env!("CARGO_MANIFEST_DIR"))
                .join("..")
                .join("..")
                .join("binaries"),
        );

        Self {
            command: command.into(),
            bundled_dir,
            dev_dir,
            search_path: true,
        }
    }

    #[must_use]
    pub fn with_bundled_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.bundled_dir = dir;
        self
    }

    #[must_use]
    pub fn with_dev_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.dev_dir = dir;
        self
    }

    #[must_use]
    pub const fn with_path_search(mut self, enabled: bool) -> Self {
        self.search_path = enabled;
        self
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    /// File name of the bundled binary, e.g. `compute-pod-x86_64-linux`.
    pub fn bundled_file_name(&self) -> String {
        format!("{}-{ARCH}-{OS}{EXE_SUFFIX}", self.command)
    }

    /// Resolve the executable, or `None` if no candidate exists.
    pub fn resolve(&self) -> Option<PathBuf> {
        let bundled = self
            .bundled_dir
            .as_ref()
            .map(|dir| dir.join(self.bundled_file_name()));
        let dev = self
            .dev_dir
            .as_ref()
            .map(|dir| dir.join(format!("{}{EXE_SUFFIX}", self.command)));

        for candidate in [bundled, dev].into_iter().flatten() {
            if candidate.is_file() {
                debug!(path = %candidate.display(), "Resolved worker executable");
                return Some(candidate);
            }
        }

        if self.search_path {
            if let Ok(path) = which::which(&self.command) {
                debug!(path = %path.display(), "Resolved worker executable on PATH");
                return Some(path);
            }
        }

        None
    }

    /// [`resolve`](Self::resolve) on the blocking pool, for async callers.
    pub async fn locate(&self) -> Option<PathBuf> {
        let locator = self.clone();
        tokio::task::spawn_blocking(move || locator.resolve())
            .await
            .unwrap_or_else(|e| {
                warn!(error = %e, "Executable lookup panicked");
                None
            })
    }
}

impl Default for ExecutableLocator {
    fn default() -> Self {
        Self::new(DEFAULT_WORKER_COMMAND)
    }
}
