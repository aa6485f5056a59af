//! Bounded pools of isolated worker processes
//!
//! Each unit of work runs in its own OS process so a browser crash or a hung
//! tool cannot take down its siblings. A pool runs at most `limit` children
//! at once and kills any child that outlives its deadline. Children lead
//! their own process group, so the kill also reaches the chromedriver and
//! browser processes they started.

use futures::stream::{self, StreamExt};
use nix::sys::signal::{killpg, Signal};
use nix::unistd::Pid;
use std::ffi::OsString;
use std::future::Future;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};

/// How a worker process ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChildOutcome {
    Exited {
        code: Option<i32>,
        stdout: String,
        stderr: String,
    },
    TimedOut,
    SpawnFailed(String),
}

impl ChildOutcome {
    pub fn succeeded(&self) -> bool {
        matches!(self, ChildOutcome::Exited { code: Some(0), .. })
    }
}

/// One worker invocation
#[derive(Debug, Clone)]
pub struct WorkerCommand {
    pub program: PathBuf,
    pub args: Vec<OsString>,
    pub envs: Vec<(String, String)>,
}

impl WorkerCommand {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            envs: Vec::new(),
        }
    }

    /// Re-invoke the running executable
    pub fn current_exe() -> std::io::Result<Self> {
        Ok(Self::new(std::env::current_exe()?))
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn env(mut self, key: &str, value: impl Into<String>) -> Self {
        self.envs.push((key.to_string(), value.into()));
        self
    }

    /// Run to completion, killing the child once `timeout` elapses
    pub async fn run(&self, timeout: Duration) -> ChildOutcome {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .envs(self.envs.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .process_group(0)
            .kill_on_drop(true);

        debug!("Spawning {} {:?}", self.program.display(), self.args);
        let child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => return ChildOutcome::SpawnFailed(format!("{}: {}", self.program.display(), e)),
        };

        let pgid = child.id();

        match tokio::time::timeout(timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => ChildOutcome::Exited {
                code: output.status.code(),
                stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            },
            Ok(Err(e)) => ChildOutcome::SpawnFailed(e.to_string()),
            Err(_) => {
                warn!("{} exceeded {:?}; killed", self.program.display(), timeout);
                if let Some(pgid) = pgid {
                    kill_group(pgid);
                }
                ChildOutcome::TimedOut
            }
        }
    }
}

/// SIGKILL a worker's whole process group
fn kill_group(pgid: u32) {
    let Ok(raw) = i32::try_from(pgid) else {
        return;
    };
    if let Err(e) = killpg(Pid::from_raw(raw), Signal::SIGKILL) {
        debug!("Could not kill process group {}: {}", pgid, e);
    }
}

/// Run `work` over `items` with at most `limit` in flight; results keep input order
pub async fn run_bounded<T, R, F, Fut>(items: Vec<T>, limit: usize, work: F) -> Vec<R>
where
    F: Fn(T) -> Fut,
    Fut: Future<Output = R>,
{
    stream::iter(items.into_iter().map(work))
        .buffered(limit.max(1))
        .collect()
        .await
}

/// Last `max_chars` characters of a process stream, trimmed
pub fn tail(text: &str, max_chars: usize) -> &str {
    if max_chars == 0 {
        return "";
    }
    let text = text.trim();
    match text.char_indices().rev().nth(max_chars - 1) {
        Some((start, _)) => &text[start..],
        None => text,
    }
}
