//! Session lifecycle tests driven by small shell-script producers and consumers

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use prompt::config::{Readiness, SessionConfig};
use prompt::domain::{Role, SessionError, TimeoutPhase};
use prompt::orchestrator::{Orchestrator, SessionState};
use prompt_protocol::ProfilingModule;
use tempfile::TempDir;

const KILLED: Option<i32> = Some(9);

struct Workspace {
    dir: TempDir,
}

impl Workspace {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("shm")).unwrap();
        Self { dir }
    }

    fn namespace(&self) -> PathBuf {
        self.dir.path().join("shm")
    }

    /// Consumer script; `publish` creates the channel segment first
    fn consumer(&self, publish: bool, body: &str) -> PathBuf {
        let path = self.dir.path().join("consumer.sh");
        let publish = if publish {
            format!("touch \"{}/slamp_queue_$SLAMP_QUEUE_ID\"\n", self.namespace().display())
        } else {
            String::new()
        };
        fs::write(&path, format!("#!/bin/sh\necho \"args: $*\"\n{publish}{body}\n")).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    /// Config whose producer is `sh -c <script>`
    fn config(&self, consumer: PathBuf, producer_script: &str) -> SessionConfig {
        let mut config = SessionConfig::new(ProfilingModule::LoadedValue, consumer, "/bin/sh");
        config.producer_args = vec!["-c".to_string(), producer_script.to_string()];
        config.log_dir = self.dir.path().to_path_buf();
        config.channel.namespace = self.namespace();
        config.drain_grace = Duration::from_secs(5);
        config.readiness = Readiness::Channel { timeout: Duration::from_secs(5) };
        config.timeout = Duration::from_secs(30);
        config
    }

    fn log(&self, name: &str) -> String {
        fs::read_to_string(self.dir.path().join(name)).unwrap_or_default()
    }
}

fn leftovers(namespace: &Path) -> Vec<String> {
    fs::read_dir(namespace)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect()
}

#[tokio::test]
async fn test_both_succeed() {
    let ws = Workspace::new();
    let config = ws.config(ws.consumer(true, "sleep 0.3\nexit 0"), "echo produced");

    let report = Orchestrator::new(config).run().await.unwrap();

    assert_eq!(report.state, SessionState::Succeeded);
    assert!(report.producer.unwrap().success());
    assert!(report.consumer.unwrap().success());
    assert!(ws.log("consumer.log").contains("args: --module 2 --threads 1"));
    assert!(ws.log("producer.log").contains("produced"));
    assert!(leftovers(&ws.namespace()).is_empty());
    assert!(report.into_result().is_ok());
}

#[tokio::test]
async fn test_channel_id_reaches_producer() {
    let ws = Workspace::new();
    let config = ws.config(ws.consumer(true, "sleep 0.3"), "echo \"queue=$SLAMP_QUEUE_ID\"");

    let report = Orchestrator::new(config).run().await.unwrap();

    assert!(report.is_success());
    assert!(ws.log("producer.log").contains(&format!("queue={}", report.channel)));
}

#[tokio::test]
async fn test_consumer_exits_before_producer() {
    let ws = Workspace::new();
    let config = ws.config(ws.consumer(true, "sleep 0.2\nexit 0"), "sleep 30");

    let report = Orchestrator::new(config).run().await.unwrap();

    assert_eq!(report.state, SessionState::OrderViolation);
    assert!(report.consumer.unwrap().success());
    assert_eq!(report.producer.unwrap().signal, KILLED);
    assert!(leftovers(&ws.namespace()).is_empty());
    assert!(matches!(report.into_result(), Err(SessionError::OrderViolation { .. })));
}

#[tokio::test]
async fn test_consumer_exits_during_startup() {
    let ws = Workspace::new();
    let config = ws.config(ws.consumer(false, "exit 1"), "echo never");

    let report = Orchestrator::new(config).run().await.unwrap();

    assert_eq!(report.state, SessionState::OrderViolation);
    assert!(report.producer.is_none());
    assert_eq!(report.consumer.unwrap().code, Some(1));
    assert!(ws.log("producer.log").is_empty());
}

#[tokio::test]
async fn test_drain_grace_expires() {
    let ws = Workspace::new();
    let mut config = ws.config(ws.consumer(true, "sleep 30"), "exit 0");
    config.drain_grace = Duration::from_millis(300);

    let report = Orchestrator::new(config).run().await.unwrap();

    assert_eq!(report.state, SessionState::TimedOut { phase: TimeoutPhase::Drain });
    assert!(report.producer.unwrap().success());
    assert_eq!(report.consumer.unwrap().signal, KILLED);
    assert!(leftovers(&ws.namespace()).is_empty());
}

#[tokio::test]
async fn test_global_timeout_kills_both() {
    let ws = Workspace::new();
    let mut config = ws.config(ws.consumer(true, "sleep 30"), "sleep 30");
    config.timeout = Duration::from_millis(300);

    let report = Orchestrator::new(config).run().await.unwrap();

    assert_eq!(report.state, SessionState::TimedOut { phase: TimeoutPhase::Global });
    assert_eq!(report.producer.unwrap().signal, KILLED);
    assert_eq!(report.consumer.unwrap().signal, KILLED);
    assert!(report.run_time < Duration::from_secs(10));
    assert!(matches!(
        report.into_result(),
        Err(SessionError::TimedOut { phase: TimeoutPhase::Global, .. })
    ));
}

#[tokio::test]
async fn test_producer_failure() {
    let ws = Workspace::new();
    let config = ws.config(ws.consumer(true, "sleep 0.3"), "exit 3");

    let report = Orchestrator::new(config).run().await.unwrap();

    assert_eq!(report.state, SessionState::Failed);
    assert_eq!(report.producer.unwrap().code, Some(3));
    match report.into_result() {
        Err(SessionError::NonZeroExit { producer, consumer }) => {
            assert_eq!(producer.code, Some(3));
            assert!(consumer.success());
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[tokio::test]
async fn test_consumer_never_ready() {
    let ws = Workspace::new();
    let mut config = ws.config(ws.consumer(false, "sleep 30"), "echo never");
    config.readiness = Readiness::Channel { timeout: Duration::from_millis(200) };

    let err = Orchestrator::new(config).run().await.unwrap_err();

    assert!(matches!(err, SessionError::ConsumerNotReady(_)));
    assert!(ws.log("producer.log").is_empty());
    assert!(leftovers(&ws.namespace()).is_empty());
}

#[tokio::test]
async fn test_warm_up_skips_channel_wait() {
    let ws = Workspace::new();
    let mut config = ws.config(ws.consumer(false, "sleep 0.4"), "exit 0");
    config.readiness = Readiness::WarmUp(Duration::from_millis(100));

    let report = Orchestrator::new(config).run().await.unwrap();

    assert!(report.is_success());
}

#[tokio::test]
async fn test_launch_failure_releases_channel() {
    let ws = Workspace::new();
    let config = ws.config(ws.dir.path().join("missing-consumer"), "exit 0");

    let err = Orchestrator::new(config).run().await.unwrap_err();

    assert!(matches!(err, SessionError::LaunchFailed { role: Role::Consumer, .. }));
    assert!(leftovers(&ws.namespace()).is_empty());
}

#[tokio::test]
async fn test_missing_namespace_fails_allocation() {
    let ws = Workspace::new();
    let mut config = ws.config(ws.consumer(true, "exit 0"), "exit 0");
    config.channel.namespace = ws.dir.path().join("no-such-dir");

    let err = Orchestrator::new(config).run().await.unwrap_err();

    assert!(matches!(err, SessionError::Allocation(_)));
    assert!(ws.log("consumer.log").is_empty());
}
