use caseq::error::Error;
use caseq::runner::ScriptRunner;
use secrecy::SecretString;
use std::fs;
use std::path::Path;

fn sh_runner(dir: &Path, database_url: &str) -> ScriptRunner {
    ScriptRunner::new(SecretString::from(database_url.to_string()))
        .with_interpreter("/bin/sh")
        .with_script_dir(dir)
}

#[tokio::test]
async fn arguments_reach_the_script_as_literal_tokens() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("echo_args.sh"), "printf '%s\\n' \"$@\"\n").unwrap();

    // Shell metacharacters, spaces, and substitution syntax must all
    // arrive as single literal arguments — no shell ever sees them.
    let args = vec![
        "--mode".to_string(),
        "reallocate".to_string(),
        "--case_id".to_string(),
        "C1; rm -rf /tmp/nope".to_string(),
        "two words".to_string(),
        "$(hostname)".to_string(),
    ];

    let runner = sh_runner(dir.path(), "postgres://unused");
    let stdout = runner.run("echo_args.sh", &args).await.unwrap();

    let lines: Vec<&str> = stdout.lines().collect();
    let expected: Vec<&str> = args.iter().map(String::as_str).collect();
    assert_eq!(lines, expected);
}

#[tokio::test]
async fn stdout_is_captured_on_success() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("ok.sh"), "echo OK\n").unwrap();

    let runner = sh_runner(dir.path(), "postgres://unused");
    let stdout = runner.run("ok.sh", &[]).await.unwrap();

    assert_eq!(stdout, "OK\n");
}

#[tokio::test]
async fn nonzero_exit_carries_stderr_and_status() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("fail.sh"), "echo boom >&2\nexit 3\n").unwrap();

    let runner = sh_runner(dir.path(), "postgres://unused");
    let err = runner.run("fail.sh", &[]).await.unwrap_err();

    match err {
        Error::Script {
            script,
            status,
            stderr,
        } => {
            assert_eq!(script, "fail.sh");
            assert_eq!(status, 3);
            assert!(stderr.contains("boom"), "stderr was {stderr:?}");
        }
        other => panic!("expected Script error, got {other}"),
    }
}

#[tokio::test]
async fn database_url_is_forwarded_to_the_script() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("env.sh"), "printf '%s' \"$DATABASE_URL\"\n").unwrap();

    let url = "postgresql://worker:pw@localhost:5432/recovery";
    let runner = sh_runner(dir.path(), url);
    let stdout = runner.run("env.sh", &[]).await.unwrap();

    assert_eq!(stdout, url);
}

#[tokio::test]
async fn missing_interpreter_is_a_spawn_error() {
    let dir = tempfile::tempdir().unwrap();

    let runner = ScriptRunner::new(SecretString::from("postgres://unused".to_string()))
        .with_interpreter("/nonexistent/python-interpreter")
        .with_script_dir(dir.path());
    let err = runner.run("whatever.py", &[]).await.unwrap_err();

    assert!(matches!(err, Error::Spawn { .. }), "got {err}");
}
