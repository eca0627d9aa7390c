//! Handler-level tests: the per-job contract, with the external script
//! stubbed out.

use caseq::error::Error;
use caseq::job::{Channel, Job, JobPayload};
use caseq::runner::ScriptRunner;
use caseq::worker::execute_job;
use secrecy::SecretString;
use std::fs;
use std::path::Path;

/// Stub the channel script with a shell body and build a runner that
/// executes it via /bin/sh.
fn stub_runner(dir: &Path, body: &str) -> ScriptRunner {
    fs::write(dir.join("Allocation.py"), body).unwrap();
    ScriptRunner::new(SecretString::from("postgres://unused".to_string()))
        .with_interpreter("/bin/sh")
        .with_script_dir(dir)
}

#[tokio::test]
async fn allocation_handler_reports_completed() {
    let dir = tempfile::tempdir().unwrap();
    let runner = stub_runner(dir.path(), "echo OK\n");

    let job = Job::new(
        "reallocate-job",
        JobPayload::new(vec!["--mode".to_string(), "reallocate".to_string()]),
    );
    let outcome = execute_job(&runner, Channel::Allocation, &job).await.unwrap();

    assert_eq!(outcome.status, "completed");
}

#[tokio::test]
async fn ingestion_handler_reports_ingested() {
    let dir = tempfile::tempdir().unwrap();
    let runner = stub_runner(dir.path(), "echo OK\n");

    let job = Job::new(
        "ingest-job",
        JobPayload::new(vec!["--mode".to_string(), "ingest".to_string()]),
    );
    let outcome = execute_job(&runner, Channel::Ingestion, &job).await.unwrap();

    assert_eq!(outcome.status, "ingested");
}

#[tokio::test]
async fn handler_accepts_payload_without_args() {
    let dir = tempfile::tempdir().unwrap();
    let runner = stub_runner(dir.path(), "echo OK\n");

    // Wire payloads may omit args entirely; the handler runs the script
    // with an empty argument vector.
    let job: Job = serde_json::from_value(serde_json::json!({"name": "ingest-job"})).unwrap();
    let outcome = execute_job(&runner, Channel::Ingestion, &job).await.unwrap();

    assert_eq!(outcome.status, "ingested");
}

#[tokio::test]
async fn failing_script_raises_with_stderr() {
    let dir = tempfile::tempdir().unwrap();
    let runner = stub_runner(dir.path(), "echo boom >&2\nexit 1\n");

    let job = Job::new("reallocate-job", JobPayload::default());
    let err = execute_job(&runner, Channel::Allocation, &job)
        .await
        .unwrap_err();

    match err {
        Error::Script { status, stderr, .. } => {
            assert_eq!(status, 1);
            assert!(stderr.contains("boom"), "stderr was {stderr:?}");
        }
        other => panic!("expected Script error, got {other}"),
    }
}

#[tokio::test]
async fn rerunning_the_handler_is_as_safe_as_the_script() {
    let dir = tempfile::tempdir().unwrap();
    // An idempotent stub: same payload, same end state.
    let runner = stub_runner(dir.path(), "printf 'allocated' > \"$1\"\n");

    let out_file = dir.path().join("state");
    let job = Job::new(
        "reallocate-job",
        JobPayload::new(vec![out_file.display().to_string()]),
    );

    for _ in 0..2 {
        let outcome = execute_job(&runner, Channel::Allocation, &job).await.unwrap();
        assert_eq!(outcome.status, "completed");
    }

    assert_eq!(fs::read_to_string(&out_file).unwrap(), "allocated");
}
