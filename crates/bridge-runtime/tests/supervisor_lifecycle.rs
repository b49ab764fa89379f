//! Lifecycle tests for the pod supervisor against fake worker scripts.
#![cfg(unix)]

mod common;

use std::sync::Arc;
use std::time::{Duration, Instant};

use bridge_core::{
    BridgeError, BridgeEvent, BridgeSettings, EventBus, EventSubscription, InMemoryConfigStore,
    LogLevel, NoopEmitter, OperationResult, PodSettings, ProcessStatus,
};
use bridge_runtime::{ExecutableLocator, NO_TOKEN_MESSAGE, PodSupervisor, SupervisorPolicy};
use common::{COUNT_RUNS, FakeWorker, wait_until, within};

fn store(token: &str) -> Arc<InMemoryConfigStore> {
    Arc::new(InMemoryConfigStore::new(BridgeSettings {
        pod: PodSettings {
            enabled: true,
            auth_token: token.to_string(),
            display_name: "Test Pod".to_string(),
            remote_url: "https://example.test".to_string(),
            capacity_limit: 3,
            auto_start: false,
        },
        ..BridgeSettings::default()
    }))
}

fn fast_policy() -> SupervisorPolicy {
    SupervisorPolicy {
        readiness_timeout: Duration::from_millis(300),
        grace_period: Duration::from_secs(2),
        max_restarts: 5,
        restart_base_delay: Duration::from_millis(50),
        log_capacity: 100,
    }
}

fn supervisor(
    token: &str,
    locator: ExecutableLocator,
    policy: SupervisorPolicy,
) -> (PodSupervisor, EventSubscription) {
    let bus = EventBus::new();
    let events = bus.subscribe();
    let supervisor = PodSupervisor::new(store(token), Arc::new(bus), locator, policy);
    (supervisor, events)
}

fn drain(events: &mut EventSubscription) -> Vec<BridgeEvent> {
    let mut out = Vec::new();
    while let Some(event) = events.try_recv() {
        out.push(event);
    }
    out
}

#[tokio::test]
async fn start_without_token_fails_and_never_spawns() {
    let worker = FakeWorker::new("touch \"$STATE_DIR/spawned\"\nexec sleep 30");
    let (supervisor, _events) = supervisor("", worker.locator.clone(), fast_policy());

    let result = supervisor.start().await;
    assert_eq!(
        result,
        Err(BridgeError::Configuration(NO_TOKEN_MESSAGE.to_string()))
    );

    let outcome = OperationResult::from(result);
    assert!(!outcome.success);
    assert!(outcome.error.unwrap().starts_with("No pod token configured"));

    let status = supervisor.status();
    assert_eq!(status.status, ProcessStatus::Stopped);
    assert_eq!(status.pid, None);

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(!worker.marker("spawned").exists());
}

#[tokio::test]
async fn whitespace_token_counts_as_missing() {
    let worker = FakeWorker::new("exec sleep 30");
    let (supervisor, _events) = supervisor("   ", worker.locator.clone(), fast_policy());

    assert!(matches!(
        supervisor.start().await,
        Err(BridgeError::Configuration(_))
    ));
}

#[tokio::test]
async fn missing_executable_is_unavailable() {
    let locator = ExecutableLocator::new("no-such-pod-worker")
        .with_bundled_dir(None)
        .with_dev_dir(None)
        .with_path_search(false);
    let (supervisor, _events) = supervisor("tok", locator, fast_policy());

    assert!(matches!(
        supervisor.start().await,
        Err(BridgeError::Unavailable(_))
    ));
    assert_eq!(supervisor.status().status, ProcessStatus::Stopped);
}

#[tokio::test]
async fn connected_signal_promotes_to_running() {
    let worker = FakeWorker::new(
        r#"printf '%s\n' "$@" > "$STATE_DIR/args"
echo "$PYTHONUNBUFFERED" > "$STATE_DIR/unbuffered"
echo '{"level":"info","message":"Connected to control plane"}'
echo '{"level":"info","fields":{"message":"heartbeat","active_workspaces":2}}'
exec sleep 30"#,
    );
    let policy = SupervisorPolicy {
        readiness_timeout: Duration::from_secs(8),
        ..fast_policy()
    };
    let (supervisor, mut events) = supervisor("tok-1", worker.locator.clone(), policy);

    let started = Instant::now();
    within(Duration::from_secs(10), supervisor.start())
        .await
        .unwrap();
    assert!(started.elapsed() < Duration::from_secs(6));

    let status = supervisor.status();
    assert_eq!(status.status, ProcessStatus::Running);
    assert!(status.connected_to_remote);
    assert!(status.pid.is_some());
    assert!(status.started_at.is_some());

    assert!(wait_until(Duration::from_secs(5), || supervisor.active_workspaces() == 2).await);

    let args = worker.read_marker("args").unwrap();
    assert_eq!(
        args.lines().collect::<Vec<_>>(),
        vec![
            "start",
            "--token",
            "tok-1",
            "--url",
            "https://example.test",
            "--name",
            "Test Pod",
            "--max-workspaces",
            "3",
            "--json-logs",
        ]
    );
    assert_eq!(worker.read_marker("unbuffered").as_deref(), Some("1"));

    let seen = drain(&mut events);
    assert!(seen.contains(&BridgeEvent::Connected));
    assert!(seen.contains(&BridgeEvent::WorkspacesChanged { count: 2 }));
    assert!(seen.iter().any(|e| matches!(e, BridgeEvent::Log { entry } if entry.message == "heartbeat")));

    within(Duration::from_secs(10), supervisor.stop())
        .await
        .unwrap();
    assert_eq!(supervisor.status().status, ProcessStatus::Stopped);
    assert_eq!(supervisor.active_workspaces(), 0);
    assert_eq!(supervisor.restart_attempts(), 0);
}

#[tokio::test]
async fn readiness_timeout_assumes_running_without_connection() {
    let worker = FakeWorker::new("exec sleep 30");
    let (supervisor, _events) = supervisor("tok", worker.locator.clone(), fast_policy());

    within(Duration::from_secs(5), supervisor.start())
        .await
        .unwrap();

    let status = supervisor.status();
    assert_eq!(status.status, ProcessStatus::Running);
    assert!(!status.connected_to_remote);

    supervisor.stop().await.unwrap();
}

#[tokio::test]
async fn exit_during_startup_is_an_error() {
    let worker = FakeWorker::new(&format!(
        "{COUNT_RUNS}\necho 'fatal: bad token' >&2\nexit 3"
    ));
    let policy = SupervisorPolicy {
        readiness_timeout: Duration::from_secs(5),
        ..fast_policy()
    };
    let (supervisor, _events) = supervisor("tok", worker.locator.clone(), policy);

    let err = within(Duration::from_secs(8), supervisor.start())
        .await
        .unwrap_err();
    assert!(matches!(&err, BridgeError::Spawn(msg) if msg.contains("exit code 3")));

    let status = supervisor.status();
    assert_eq!(status.status, ProcessStatus::Error);
    assert!(status.last_error.unwrap().contains("during startup"));

    let logs = supervisor.get_logs(None);
    assert!(logs
        .iter()
        .any(|e| e.message == "fatal: bad token" && e.level == LogLevel::Error));

    // Not running when it exited, so no automatic restart.
    tokio::time::sleep(Duration::from_millis(400)).await;
    assert_eq!(worker.runs(), 1);
    assert_eq!(supervisor.restart_attempts(), 0);
}

#[tokio::test]
async fn crashes_are_restarted_with_backoff() {
    let worker = FakeWorker::new(&format!(
        "{COUNT_RUNS}\nif [ \"$n\" -le 2 ]; then sleep 1; exit 1; fi\nexec sleep 30"
    ));
    let (supervisor, mut events) = supervisor("tok", worker.locator.clone(), fast_policy());

    within(Duration::from_secs(5), supervisor.start())
        .await
        .unwrap();

    let recovered = wait_until(Duration::from_secs(15), || {
        worker.runs() == 3 && supervisor.status().status == ProcessStatus::Running
    })
    .await;
    assert!(recovered, "worker did not recover: {:?}", supervisor.status());
    assert_eq!(supervisor.restart_attempts(), 2);

    let seen = drain(&mut events);
    let crash_errors = seen
        .iter()
        .filter(|e| matches!(e, BridgeEvent::Error { message, .. } if message.contains("crashed")))
        .count();
    assert_eq!(crash_errors, 2);

    supervisor.stop().await.unwrap();
    assert_eq!(supervisor.status().status, ProcessStatus::Stopped);
}

#[tokio::test]
async fn restart_counter_resets_only_on_connected_signal() {
    // Run 1 crashes after being assumed ready; run 2 is assumed ready, then connects.
    let worker = FakeWorker::new(&format!(
        "{COUNT_RUNS}\nif [ \"$n\" -eq 1 ]; then sleep 1; exit 1; fi\nsleep 1.5\necho connected\nexec sleep 30"
    ));
    let (supervisor, _events) = supervisor("tok", worker.locator.clone(), fast_policy());

    within(Duration::from_secs(5), supervisor.start())
        .await
        .unwrap();

    let restarted = wait_until(Duration::from_secs(10), || {
        worker.runs() == 2 && supervisor.status().status == ProcessStatus::Running
    })
    .await;
    assert!(restarted, "worker was not restarted: {:?}", supervisor.status());
    assert!(!supervisor.status().connected_to_remote);
    assert_eq!(supervisor.restart_attempts(), 1);

    let connected = wait_until(Duration::from_secs(10), || {
        supervisor.status().connected_to_remote
    })
    .await;
    assert!(connected, "worker never connected: {:?}", supervisor.status());
    assert_eq!(supervisor.restart_attempts(), 0);

    supervisor.stop().await.unwrap();
}

#[tokio::test]
async fn restarts_stop_after_max_attempts() {
    let worker = FakeWorker::new(&format!("{COUNT_RUNS}\nsleep 0.6\nexit 1"));
    let policy = SupervisorPolicy {
        readiness_timeout: Duration::from_millis(100),
        max_restarts: 2,
        ..fast_policy()
    };
    let (supervisor, _events) = supervisor("tok", worker.locator.clone(), policy);

    within(Duration::from_secs(5), supervisor.start())
        .await
        .unwrap();

    let gave_up = wait_until(Duration::from_secs(15), || {
        let status = supervisor.status();
        status.status == ProcessStatus::Stopped
            && status
                .last_error
                .as_deref()
                .is_some_and(|e| e.contains("giving up"))
    })
    .await;
    assert!(gave_up, "supervisor kept restarting: {:?}", supervisor.status());
    assert_eq!(worker.runs(), 3);

    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(worker.runs(), 3);
    assert_eq!(supervisor.status().status, ProcessStatus::Stopped);
}

#[tokio::test]
async fn clean_exit_after_stop_does_not_restart() {
    let worker = FakeWorker::new(&format!(
        "{COUNT_RUNS}\ntrap 'exit 0' TERM\necho connected\nwhile true; do sleep 0.1; done"
    ));
    let (supervisor, _events) = supervisor("tok", worker.locator.clone(), fast_policy());

    within(Duration::from_secs(5), supervisor.start())
        .await
        .unwrap();
    let attempts_before = supervisor.restart_attempts();

    within(Duration::from_secs(5), supervisor.stop())
        .await
        .unwrap();
    assert_eq!(supervisor.status().status, ProcessStatus::Stopped);

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(supervisor.status().status, ProcessStatus::Stopped);
    assert_eq!(supervisor.restart_attempts(), attempts_before);
    assert_eq!(worker.runs(), 1);
    assert!(supervisor
        .get_logs(None)
        .iter()
        .any(|e| e.message.contains("exit code 0")));
}

#[tokio::test]
async fn stop_escalates_when_worker_ignores_sigterm() {
    let worker = FakeWorker::new("trap '' TERM\necho connected\nwhile true; do sleep 0.1; done");
    let policy = SupervisorPolicy {
        grace_period: Duration::from_millis(300),
        ..fast_policy()
    };
    let (supervisor, _events) = supervisor("tok", worker.locator.clone(), policy);

    supervisor.start().await.unwrap();
    within(Duration::from_secs(5), supervisor.stop())
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(supervisor.status().status, ProcessStatus::Stopped);
}

#[tokio::test]
async fn start_is_idempotent_while_running() {
    let worker = FakeWorker::new(&format!("{COUNT_RUNS}\necho connected\nexec sleep 30"));
    let (supervisor, _events) = supervisor("tok", worker.locator.clone(), fast_policy());

    supervisor.start().await.unwrap();
    let pid = supervisor.status().pid;
    supervisor.start().await.unwrap();

    assert_eq!(supervisor.status().pid, pid);
    assert_eq!(worker.runs(), 1);
    supervisor.stop().await.unwrap();
}

#[tokio::test]
async fn restart_spawns_a_new_process() {
    let worker = FakeWorker::new(&format!("{COUNT_RUNS}\necho connected\nexec sleep 30"));
    let (supervisor, _events) = supervisor("tok", worker.locator.clone(), fast_policy());

    supervisor.start().await.unwrap();
    let first_pid = supervisor.status().pid;

    within(Duration::from_secs(10), supervisor.restart())
        .await
        .unwrap();
    let status = supervisor.status();
    assert_eq!(status.status, ProcessStatus::Running);
    assert_ne!(status.pid, first_pid);
    assert_eq!(worker.runs(), 2);
    assert_eq!(supervisor.restart_attempts(), 0);

    supervisor.stop().await.unwrap();
}

#[tokio::test]
async fn dropping_supervisor_terminates_worker() {
    let worker = FakeWorker::new("echo connected\nexec sleep 30");
    let supervisor = PodSupervisor::new(
        store("tok"),
        Arc::new(NoopEmitter::new()),
        worker.locator.clone(),
        fast_policy(),
    );

    supervisor.start().await.unwrap();
    let pid = supervisor.status().pid.unwrap();
    drop(supervisor);

    let gone = wait_until(Duration::from_secs(5), || {
        !std::process::Command::new("kill")
            .arg("-0")
            .arg(pid.to_string())
            .status()
            .is_ok_and(|s| s.success())
    })
    .await;
    assert!(gone, "worker {pid} survived supervisor drop");
}

#[tokio::test]
async fn log_buffer_is_bounded_and_clearable() {
    let worker = FakeWorker::new(
        "i=0\nwhile [ $i -lt 30 ]; do echo \"line $i\"; i=$((i + 1)); done\necho connected\nexec sleep 30",
    );
    let policy = SupervisorPolicy {
        log_capacity: 10,
        ..fast_policy()
    };
    let (supervisor, _events) = supervisor("tok", worker.locator.clone(), policy);

    supervisor.start().await.unwrap();
    assert!(wait_until(Duration::from_secs(5), || {
        supervisor
            .get_logs(None)
            .last()
            .is_some_and(|e| e.message == "connected")
    })
    .await);

    let logs = supervisor.get_logs(None);
    assert_eq!(logs.len(), 10);
    assert_eq!(logs[0].message, "line 21");
    assert!(logs.iter().all(|e| e.level == LogLevel::Info));
    assert_eq!(supervisor.get_logs(Some(3)).len(), 3);

    supervisor.clear_logs();
    assert!(supervisor.get_logs(None).is_empty());
    supervisor.stop().await.unwrap();
}
