//! Deployment task invocation.
//!
//! Every on-chain action goes through a hardhat task run as a subprocess.
//! The `TaskRunner` trait is the seam between the stages and the
//! toolchain; `HardhatRunner` is the real implementation.

pub mod hardhat;

pub use hardhat::HardhatRunner;

use async_trait::async_trait;
use std::fmt;

/// Ordered `--flag value` arguments of a task.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskArgs(Vec<(String, String)>);

impl TaskArgs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `--{name} {value}`.
    pub fn flag(mut self, name: &str, value: impl ToString) -> Self {
        self.0.push((name.to_string(), value.to_string()));
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(flag, _)| flag == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(f, v)| (f.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for TaskArgs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.iter().map(|(k, v)| format!("--{k} {v}")).collect();
        f.write_str(&parts.join(" "))
    }
}

/// Captured result of one task run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskOutput {
    pub task: String,
    /// Exit code; `None` when the process was killed by a signal.
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl TaskOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Task invocation failures.
#[derive(Debug, thiserror::Error)]
pub enum InvokeError {
    #[error("Failed to start `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Task {task} exited with {code:?}: {stderr}")]
    NonZeroExit {
        task: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("Task {task} timed out after {secs}s")]
    Timeout { task: String, secs: u64 },
}

/// Runs deployment tasks against the configured network.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TaskRunner: Send + Sync {
    async fn run_task(&self, task: &str, args: &TaskArgs) -> Result<TaskOutput, InvokeError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_args_keep_order() {
        let args = TaskArgs::new().flag("name", "BTC").flag("k", 55000.0).flag("iscall", 1);
        let flags: Vec<_> = args.iter().map(|(f, _)| f).collect();
        assert_eq!(flags, vec!["name", "k", "iscall"]);
        assert_eq!(args.get("k"), Some("55000"));
        assert_eq!(args.to_string(), "--name BTC --k 55000 --iscall 1");
    }

    #[test]
    fn test_task_output_success() {
        let mut out = TaskOutput {
            task: "closeLotteryRound".into(),
            code: Some(0),
            stdout: String::new(),
            stderr: String::new(),
        };
        assert!(out.success());
        out.code = Some(1);
        assert!(!out.success());
        out.code = None;
        assert!(!out.success());
    }
}
