//! Compose lifecycle commands.

use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, error, info};

use crate::error::DeployError;

/// Lifecycle actions the agent issues against the compose project.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComposeAction {
    Down,
    /// `down` that also removes named volumes.
    DownVolumes,
    Up,
    /// `up` that rebuilds images from the freshly unpacked tree.
    UpBuild,
}

impl ComposeAction {
    pub fn args(self) -> &'static [&'static str] {
        match self {
            ComposeAction::Down => &["down"],
            ComposeAction::DownVolumes => &["down", "-v"],
            ComposeAction::Up => &["up", "-d"],
            ComposeAction::UpBuild => &["up", "-d", "--build"],
        }
    }
}

impl std::fmt::Display for ComposeAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.args().join(" "))
    }
}

#[async_trait]
pub trait Orchestrator: Send + Sync {
    /// Run `action` with `dir` as the working directory; returns stdout.
    async fn run(&self, action: ComposeAction, dir: &Path) -> Result<String, DeployError>;
}

/// Shells out to a compose CLI such as `docker compose` or `podman-compose`.
#[derive(Debug, Clone)]
pub struct ComposeCli {
    program: String,
    base_args: Vec<String>,
    kill_on_drop: bool,
}

impl ComposeCli {
    /// Parse a command line like `docker compose -f prod.yaml`.
    ///
    /// With `kill_on_drop` the child process is killed when the owning task
    /// is aborted (the gate aborts the task on timeout). Grandchildren the
    /// CLI spawned are not tracked.
    pub fn new(command_line: &str, kill_on_drop: bool) -> anyhow::Result<Self> {
        let mut words = shell_words::split(command_line)
            .map_err(|e| anyhow::anyhow!("invalid compose command '{command_line}': {e}"))?
            .into_iter();
        let program = words
            .next()
            .ok_or_else(|| anyhow::anyhow!("compose command is empty"))?;
        Ok(Self {
            program,
            base_args: words.collect(),
            kill_on_drop,
        })
    }

    fn describe(&self, action: ComposeAction) -> String {
        let mut parts = Vec::with_capacity(1 + self.base_args.len());
        parts.push(self.program.as_str());
        parts.extend(self.base_args.iter().map(String::as_str));
        format!("{} {action}", parts.join(" "))
    }
}

#[async_trait]
impl Orchestrator for ComposeCli {
    async fn run(&self, action: ComposeAction, dir: &Path) -> Result<String, DeployError> {
        let command = self.describe(action);
        info!(%command, dir = %dir.display(), "running orchestrator command");

        let output = Command::new(&self.program)
            .args(&self.base_args)
            .args(action.args())
            .current_dir(dir)
            .stdin(Stdio::null())
            .kill_on_drop(self.kill_on_drop)
            .output()
            .await
            .map_err(|e| {
                error!(%command, "failed to spawn orchestrator: {e}");
                DeployError::Orchestrator {
                    command: command.clone(),
                    message: format!("failed to start: {e}"),
                }
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let message = failure_message(&stderr, &stdout, output.status);
            error!(%command, status = %output.status, "orchestrator command failed");
            return Err(DeployError::Orchestrator { command, message });
        }

        debug!(%command, "orchestrator command finished");
        Ok(stdout)
    }
}

/// Prefer stderr, fall back to stdout, then to the exit status.
fn failure_message(stderr: &str, stdout: &str, status: std::process::ExitStatus) -> String {
    [stderr.trim(), stdout.trim()]
        .into_iter()
        .find(|s| !s.is_empty())
        .map(ToString::to_string)
        .unwrap_or_else(|| format!("exited with {status}"))
}
