use anyhow::{Context, Result};
use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::process::{Child, Command};

/// Grace period between SIGTERM and SIGKILL when a crawl overruns its timeout.
const TERMINATE_GRACE: Duration = Duration::from_secs(2);

/// A fully built crawler command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlInvocation {
    pub program: String,
    pub args: Vec<String>,
}

impl CrawlInvocation {
    pub fn new(program: impl Into<String>) -> Self {
        Self { program: program.into(), args: Vec::new() }
    }

    pub fn arg(&mut self, arg: impl Into<String>) -> &mut Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(&mut self, args: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Value following `flag`, if the flag is present.
    pub fn flag_value(&self, flag: &str) -> Option<&str> {
        self.args
            .iter()
            .position(|a| a == flag)
            .and_then(|i| self.args.get(i + 1))
            .map(String::as_str)
    }
}

/// What a finished crawler process left behind.
#[derive(Debug, Clone, Default)]
pub struct ProcessOutput {
    /// `None` when the process was terminated by a signal.
    pub exit_code: Option<i32>,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    pub fn stdout_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    /// Undecodable bytes are replaced, never an error.
    pub fn stderr_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }
}

/// Runs a crawler invocation to completion.
///
/// An `Err` means the process could not be started or waited on. A process
/// that ran and exited non-zero is an `Ok` with that exit code.
#[async_trait]
pub trait CrawlLauncher: Send + Sync {
    async fn launch(&self, invocation: &CrawlInvocation) -> Result<ProcessOutput>;
}

/// Spawns the real crawler with `tokio::process`.
#[derive(Debug, Clone, Default)]
pub struct ProcessLauncher {
    timeout: Option<Duration>,
}

impl ProcessLauncher {
    pub fn new(timeout: Option<Duration>) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl CrawlLauncher for ProcessLauncher {
    async fn launch(&self, invocation: &CrawlInvocation) -> Result<ProcessOutput> {
        let mut cmd = Command::new(&invocation.program);
        cmd.args(&invocation.args);
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd.kill_on_drop(true);

        let mut child = cmd
            .spawn()
            .with_context(|| format!("Failed to spawn {}", invocation.program))?;

        // Drain both pipes concurrently so a chatty crawler cannot block on a full pipe.
        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let status = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, child.wait()).await {
                Ok(status) => status.context("Failed to wait for crawler")?,
                Err(_) => {
                    terminate(&mut child).await;
                    return Err(anyhow::anyhow!(
                        "Crawl timed out after {}",
                        common::format_duration(limit)
                    ));
                }
            },
            None => child.wait().await.context("Failed to wait for crawler")?,
        };

        let stdout = stdout.await.context("stdout reader panicked")?;
        let stderr = stderr.await.context("stderr reader panicked")?;

        Ok(ProcessOutput {
            exit_code: status.code(),
            stdout,
            stderr,
        })
    }
}

fn drain<R>(pipe: Option<R>) -> tokio::task::JoinHandle<Vec<u8>>
where
    R: tokio::io::AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            if let Err(e) = pipe.read_to_end(&mut buf).await {
                log::warn!("Failed to read crawler output: {}", e);
            }
        }
        buf
    })
}

/// SIGTERM, wait briefly, then SIGKILL if still alive.
async fn terminate(child: &mut Child) {
    let Some(pid) = child.id() else {
        return;
    };
    log::warn!("Crawler process {} exceeded its timeout, terminating", pid);

    #[cfg(unix)]
    {
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;
        let _ = kill(Pid::from_raw(pid as i32), Signal::SIGTERM);

        if tokio::time::timeout(TERMINATE_GRACE, child.wait()).await.is_ok() {
            return;
        }
    }

    if let Err(e) = child.kill().await {
        log::error!("Failed to kill crawler process {}: {}", pid, e);
    }
}
