use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, warn};

use crate::clock::{Clock, RetryPolicy};
use crate::config::OvnConfig;
use crate::error::ExecError;

pub mod process;
pub use process::ProcessRunner;

/// Delay and attempt budget while the backend refuses connections.
pub const CONNECT_RETRY: RetryPolicy = RetryPolicy::new(200, Duration::from_secs(2));

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub success: bool,
}

#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run `program` with `args` to completion and capture its output.
    async fn run(&self, program: &str, args: &[String]) -> std::io::Result<CommandOutput>;
}

/// Programs the executor drives.
#[derive(Debug, Clone)]
pub struct Programs {
    pub nbctl: String,
    pub vsctl: String,
    pub ip: String,
}

impl From<&OvnConfig> for Programs {
    fn from(cfg: &OvnConfig) -> Self {
        Self {
            nbctl: cfg.nbctl.clone(),
            vsctl: cfg.vsctl.clone(),
            ip: cfg.ip.clone(),
        }
    }
}

/// Runs backend control commands, riding out backend start-up races.
pub struct Executor {
    runner: Arc<dyn CommandRunner>,
    clock: Arc<dyn Clock>,
    programs: Programs,
    nb_db: Option<String>,
    timeout_secs: u64,
    retry: RetryPolicy,
}

impl Executor {
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        clock: Arc<dyn Clock>,
        programs: Programs,
        timeout_secs: u64,
    ) -> Self {
        Self {
            runner,
            clock,
            programs,
            nb_db: None,
            timeout_secs,
            retry: CONNECT_RETRY,
        }
    }

    pub fn with_nb_db(mut self, nb_db: Option<String>) -> Self {
        self.nb_db = nb_db;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    /// Northbound database control (`ovn-nbctl`).
    pub async fn nbctl(&self, args: &[&str]) -> Result<String, ExecError> {
        let mut full = vec![format!("--timeout={}", self.timeout_secs)];
        if let Some(db) = &self.nb_db {
            full.push(format!("--db={}", db));
        }
        full.extend(args.iter().map(|a| a.to_string()));
        self.run(&self.programs.nbctl, full).await
    }

    /// Local switch control (`ovs-vsctl`).
    pub async fn vsctl(&self, args: &[&str]) -> Result<String, ExecError> {
        let mut full = vec![format!("--timeout={}", self.timeout_secs)];
        full.extend(args.iter().map(|a| a.to_string()));
        self.run(&self.programs.vsctl, full).await
    }

    /// Kernel link and address control (`ip`).
    pub async fn ip(&self, args: &[&str]) -> Result<String, ExecError> {
        let full = args.iter().map(|a| a.to_string()).collect();
        self.run(&self.programs.ip, full).await
    }

    /// Execute once; retry only while stderr reports a refused connection.
    async fn run(&self, program: &str, args: Vec<String>) -> Result<String, ExecError> {
        let args = &args;
        let runner = self.runner.as_ref();
        let max = self.retry.max_attempts;
        self.retry
            .retry(
                self.clock.as_ref(),
                |attempt| async move {
                    let command = format!("{} {}", program, args.join(" "));
                    debug!("exec: {}", command);
                    let output = match runner.run(program, args).await {
                        Ok(output) => output,
                        Err(source) => {
                            return Err(ExecError::Spawn {
                                program: program.to_string(),
                                source,
                            })
                        }
                    };
                    if output.success {
                        return Ok(output.stdout.trim().to_string());
                    }
                    let err = ExecError::Failed {
                        command,
                        stderr: output.stderr.trim().to_string(),
                    };
                    if err.is_connection_refused() && attempt < max {
                        warn!("{} (attempt {}/{}), backend not reachable yet", err, attempt, max);
                    }
                    Err(err)
                },
                ExecError::is_connection_refused,
            )
            .await
    }
}
