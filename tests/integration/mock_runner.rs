//! Recording task runner for integration testing.
//!
//! Stands in for `npx hardhat`: every call is recorded, and the token and
//! pool tasks write their results into the address books the way the real
//! tasks do, so later stages can resolve names without a chain.

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use np_autodeploy::invoker::{InvokeError, TaskArgs, TaskOutput, TaskRunner};
use np_autodeploy::storage::Book;

/// One recorded invocation.
#[derive(Debug, Clone)]
pub struct Call {
    pub task: String,
    pub args: TaskArgs,
}

/// A deterministic in-process replacement for the hardhat runner.
#[derive(Clone)]
pub struct RecordingRunner {
    info_dir: PathBuf,
    network: String,
    calls: Arc<Mutex<Vec<Call>>>,
    /// Calls with an index at or above this fail with a non-zero exit.
    fail_from: Arc<Mutex<Option<usize>>>,
}

impl RecordingRunner {
    pub fn new(info_dir: &Path, network: &str) -> Self {
        Self {
            info_dir: info_dir.to_path_buf(),
            network: network.to_string(),
            calls: Arc::new(Mutex::new(Vec::new())),
            fail_from: Arc::new(Mutex::new(None)),
        }
    }

    pub fn fail_from(&self, index: usize) {
        *self.fail_from.lock().unwrap() = Some(index);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn tasks(&self) -> Vec<String> {
        self.calls().into_iter().map(|c| c.task).collect()
    }

    fn record_entry(&self, book: Book, key: String, entry: Value) {
        let path = self.info_dir.join(book.file_name());
        let text = std::fs::read_to_string(&path).unwrap_or_else(|_| "{}".to_string());
        let mut root: Map<String, Value> = serde_json::from_str(&text).unwrap();
        let section = root
            .entry(self.network.clone())
            .or_insert_with(|| Value::Object(Map::new()));
        section.as_object_mut().unwrap().insert(key, entry);
        std::fs::write(&path, serde_json::to_string_pretty(&root).unwrap()).unwrap();
    }

    fn apply(&self, task: &str, args: &TaskArgs) {
        match task {
            "deployNPToken" => {
                let marker = if args.get("iscall") == Some("1") { "H" } else { "L" };
                let key = format!(
                    "{}_{}_{}_{}",
                    args.get("name").unwrap(),
                    args.get("k").unwrap(),
                    marker,
                    args.get("round").unwrap()
                );
                let address = format!("0xtoken-{key}");
                self.record_entry(
                    Book::Tokens,
                    key,
                    json!({
                        "address": address,
                        "deadline": args.get("deadline").unwrap(),
                        "settleTime": args.get("settletime").unwrap(),
                    }),
                );
            }
            "deployNPPool" => {
                let key = args.get("name").unwrap().to_string();
                let pool = format!("0xpool-{key}");
                self.record_entry(Book::Pools, key, json!({ "poolAddress": pool }));
            }
            _ => {}
        }
    }
}

#[async_trait]
impl TaskRunner for RecordingRunner {
    async fn run_task(&self, task: &str, args: &TaskArgs) -> Result<TaskOutput, InvokeError> {
        let index = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(Call {
                task: task.to_string(),
                args: args.clone(),
            });
            calls.len() - 1
        };

        if let Some(from) = *self.fail_from.lock().unwrap() {
            if index >= from {
                return Err(InvokeError::NonZeroExit {
                    task: task.to_string(),
                    code: Some(1),
                    stderr: "Error: transaction reverted".to_string(),
                });
            }
        }

        self.apply(task, args);
        Ok(TaskOutput {
            task: task.to_string(),
            code: Some(0),
            stdout: format!("{task} {args}"),
            stderr: String::new(),
        })
    }
}

/// Fresh `info/` directory with a stablecoin and empty token/pool books.
pub fn temp_info_dir() -> PathBuf {
    let mut dir = std::env::temp_dir();
    dir.push(format!("np_autodeploy_it_{}", Uuid::new_v4()));
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(
        dir.join(Book::Contracts.file_name()),
        r#"{"fuji": {"MockUSD": {"address": "0xusd"}}}"#,
    )
    .unwrap();
    std::fs::write(dir.join(Book::Tokens.file_name()), r#"{"fuji": {}}"#).unwrap();
    std::fs::write(dir.join(Book::Pools.file_name()), r#"{"fuji": {}}"#).unwrap();
    dir
}

#[cfg(test)]
mod tests {
    use super::*;
    use np_autodeploy::storage::AddressBook;

    #[tokio::test]
    async fn test_token_task_writes_book_entry() {
        let dir = temp_info_dir();
        let runner = RecordingRunner::new(&dir, "fuji");
        let args = TaskArgs::new()
            .flag("name", "BTC")
            .flag("k", "55000.0")
            .flag("decimals", 2)
            .flag("iscall", "1")
            .flag("round", "2205")
            .flag("deadline", 1)
            .flag("settletime", 2);

        runner.run_task("deployNPToken", &args).await.unwrap();

        let book = AddressBook::with_info_dir(dir.clone(), "fuji");
        let name = "BTC_55000.0_H_2205".parse().unwrap();
        assert_eq!(book.token_address(&name).unwrap(), "0xtoken-BTC_55000.0_H_2205");
        assert_eq!(runner.tasks(), vec!["deployNPToken"]);
        std::fs::remove_dir_all(dir).unwrap();
    }

    #[tokio::test]
    async fn test_forced_failure() {
        let dir = temp_info_dir();
        let runner = RecordingRunner::new(&dir, "fuji");
        runner.fail_from(0);
        let err = runner.run_task("closeLotteryRound", &TaskArgs::new()).await;
        assert!(matches!(err, Err(InvokeError::NonZeroExit { .. })));
        assert_eq!(runner.calls().len(), 1);
        std::fs::remove_dir_all(dir).unwrap();
    }
}
