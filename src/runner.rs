//! Script runner: spawns the external analytical script.
//!
//! Arguments are passed as discrete tokens through an argument-vector
//! spawn — no shell is ever involved, so shell metacharacters in an
//! argument reach the child as literal text. The spawned process
//! inherits the worker's environment with `DATABASE_URL` forwarded
//! explicitly. Execution is unbounded: no timeout is enforced.

use crate::error::{Error, Result};
use secrecy::{ExposeSecret, SecretString};
use std::path::PathBuf;
use tokio::process::Command;
use tracing::{debug, warn};

pub struct ScriptRunner {
    interpreter: PathBuf,
    script_dir: PathBuf,
    database_url: SecretString,
}

impl ScriptRunner {
    pub fn new(database_url: SecretString) -> Self {
        Self {
            interpreter: PathBuf::from(default_interpreter()),
            script_dir: PathBuf::from("."),
            database_url,
        }
    }

    /// Override the interpreter binary (tests, non-standard installs).
    pub fn with_interpreter(mut self, interpreter: impl Into<PathBuf>) -> Self {
        self.interpreter = interpreter.into();
        self
    }

    /// Directory script names are resolved against. Defaults to the
    /// working directory.
    pub fn with_script_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.script_dir = dir.into();
        self
    }

    /// Run a script with the given argument vector and capture its
    /// standard output.
    ///
    /// Non-zero exit fails with the captured stderr and exit status
    /// attached; a process that cannot be spawned (interpreter missing)
    /// fails the same way to the caller. Stderr from a successful run is
    /// logged, not fatal.
    pub async fn run(&self, script: &str, args: &[String]) -> Result<String> {
        let script_path = self.script_dir.join(script);

        debug!(script = %script_path.display(), ?args, "spawning script");

        let output = Command::new(&self.interpreter)
            .arg(&script_path)
            .args(args)
            .env("DATABASE_URL", self.database_url.expose_secret())
            .output()
            .await
            .map_err(|source| Error::Spawn {
                script: script.to_string(),
                source,
            })?;

        if !output.status.success() {
            return Err(Error::Script {
                script: script.to_string(),
                status: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stderr.trim().is_empty() {
            warn!(script, "script stderr: {}", stderr.trim());
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

fn default_interpreter() -> &'static str {
    if cfg!(windows) { "python" } else { "python3" }
}
