//! Hardhat task runner.
//!
//! Runs `{program} {base_args..} {task} --flag value .. --network {network}`
//! with the hardhat project as working directory and captures its output.
//! Tasks write their own results into the address books; nothing is parsed
//! from stdout here.

use async_trait::async_trait;
use std::path::PathBuf;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info, warn};

use super::{InvokeError, TaskArgs, TaskOutput, TaskRunner};

/// Subprocess-backed `TaskRunner`.
#[derive(Debug, Clone)]
pub struct HardhatRunner {
    program: String,
    base_args: Vec<String>,
    network: String,
    workdir: PathBuf,
    check_exit_status: bool,
    timeout: Option<Duration>,
}

impl HardhatRunner {
    pub fn new(program: &str, base_args: Vec<String>, network: &str, workdir: PathBuf) -> Self {
        Self {
            program: program.to_string(),
            base_args,
            network: network.to_string(),
            workdir,
            check_exit_status: true,
            timeout: None,
        }
    }

    /// With `false`, a non-zero exit is logged but still reported as `Ok`.
    pub fn check_exit_status(mut self, check: bool) -> Self {
        self.check_exit_status = check;
        self
    }

    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Full argument vector after the program name.
    pub fn command_args(&self, task: &str, args: &TaskArgs) -> Vec<String> {
        let mut argv = self.base_args.clone();
        argv.push(task.to_string());
        for (flag, value) in args.iter() {
            argv.push(format!("--{flag}"));
            argv.push(value.to_string());
        }
        argv.push("--network".to_string());
        argv.push(self.network.clone());
        argv
    }

    fn command_line(&self, argv: &[String]) -> String {
        std::iter::once(self.program.as_str())
            .chain(argv.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[async_trait]
impl TaskRunner for HardhatRunner {
    async fn run_task(&self, task: &str, args: &TaskArgs) -> Result<TaskOutput, InvokeError> {
        let argv = self.command_args(task, args);
        let command_line = self.command_line(&argv);
        info!(
            task,
            network = %self.network,
            workdir = %self.workdir.display(),
            "Running deployment task"
        );
        debug!(command = %command_line, "Spawning");

        let mut command = Command::new(&self.program);
        command
            .args(&argv)
            .current_dir(&self.workdir)
            .kill_on_drop(true);

        let output = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, command.output())
                .await
                .map_err(|_| InvokeError::Timeout {
                    task: task.to_string(),
                    secs: limit.as_secs(),
                })?,
            None => command.output().await,
        }
        .map_err(|source| InvokeError::Spawn {
            command: command_line.clone(),
            source,
        })?;

        let result = TaskOutput {
            task: task.to_string(),
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };
        debug!(task, stdout = %result.stdout.trim_end(), "Task output");

        if result.success() {
            info!(task, "Task finished");
            return Ok(result);
        }

        warn!(
            task,
            code = ?result.code,
            stderr = %result.stderr.trim_end(),
            "Task exited with non-zero status"
        );
        if self.check_exit_status {
            return Err(InvokeError::NonZeroExit {
                task: result.task,
                code: result.code,
                stderr: result.stderr,
            });
        }
        Ok(result)
    }
}
