//! Shared helpers for bridge-runtime integration tests.
#![allow(dead_code)]

use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;

use bridge_runtime::ExecutableLocator;
use tempfile::TempDir;
use tokio::time::{Instant, sleep};

/// Poll `condition` every 20ms until it holds or `limit` elapses.
pub async fn wait_until<F>(limit: Duration, mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = Instant::now() + limit;
    loop {
        if condition() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        sleep(Duration::from_millis(20)).await;
    }
}

/// Await `future`, failing the test if it takes longer than `limit`.
pub async fn within<T>(limit: Duration, future: impl Future<Output = T>) -> T {
    tokio::time::timeout(limit, future)
        .await
        .expect("operation timed out")
}

/// A shell script installed as the bundled worker binary in a temp dir.
///
/// The script sees `$STATE_DIR`, a scratch directory it can write markers into.
pub struct FakeWorker {
    dir: TempDir,
    pub locator: ExecutableLocator,
}

impl FakeWorker {
    #[cfg(unix)]
    pub fn new(body: &str) -> Self {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let locator = ExecutableLocator::new("fake-pod")
            .with_bundled_dir(Some(dir.path().to_path_buf()))
            .with_dev_dir(None)
            .with_path_search(false);

        let path = dir.path().join(locator.bundled_file_name());
        let script = format!(
            "#!/bin/sh\nSTATE_DIR='{}'\n{body}\n",
            dir.path().display()
        );
        std::fs::write(&path, script).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        // Let concurrently forked test processes exec before ours runs (ETXTBSY).
        std::thread::sleep(Duration::from_millis(50));

        Self { dir, locator }
    }

    pub fn state_dir(&self) -> &Path {
        self.dir.path()
    }

    pub fn marker(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    pub fn read_marker(&self, name: &str) -> Option<String> {
        std::fs::read_to_string(self.marker(name))
            .ok()
            .map(|s| s.trim().to_string())
    }

    /// Number of times the script has run, for scripts that count into `runs`.
    pub fn runs(&self) -> u32 {
        self.read_marker("runs")
            .and_then(|s| s.parse().ok())
            .unwrap_or(0)
    }
}

/// Script fragment that increments `$STATE_DIR/runs`.
pub const COUNT_RUNS: &str = r#"n=$(cat "$STATE_DIR/runs" 2>/dev/null || echo 0)
n=$((n + 1))
echo "$n" > "$STATE_DIR/runs""#;
