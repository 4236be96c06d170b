//! Job execution.
//!
//! `JobRunner` maps a `JobKind` onto the deployer or the lottery
//! controller, keeps the pair registry that threads instrument names from
//! the token stage into the pool and farming stages, and turns each outcome
//! into a success card or an alert.

use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use super::JobKind;
use crate::engine::{DeployError, InstrumentDeployer, LotteryController};
use crate::invoker::InvokeError;
use crate::notify::Notifier;
use crate::types::{InstrumentPair, Token};

/// Why a job did not complete.
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error(transparent)]
    Deploy(#[from] DeployError),

    #[error(transparent)]
    Lottery(#[from] InvokeError),

    #[error("default deployment failed for {failed}: {detail}")]
    Default { failed: String, detail: String },
}

pub struct JobRunner {
    deployer: InstrumentDeployer,
    lottery: LotteryController,
    notifier: Arc<dyn Notifier>,
    default_stablecoin: String,
    pairs: Mutex<HashMap<Token, InstrumentPair>>,
}

impl JobRunner {
    pub fn new(
        deployer: InstrumentDeployer,
        lottery: LotteryController,
        notifier: Arc<dyn Notifier>,
        default_stablecoin: &str,
    ) -> Self {
        Self {
            deployer,
            lottery,
            notifier,
            default_stablecoin: default_stablecoin.to_string(),
            pairs: Mutex::new(HashMap::new()),
        }
    }

    /// Pair recorded for `token` by an earlier stage in this process.
    pub async fn recorded_pair(&self, token: Token) -> Option<InstrumentPair> {
        self.pairs.lock().await.get(&token).cloned()
    }

    /// Run `job` and return the message describing its result.
    pub async fn execute(&self, job: &JobKind) -> Result<String, JobError> {
        match job {
            JobKind::DeployTokens { token, percentage } => {
                match self.deployer.deploy_tokens(*token, *percentage).await {
                    Ok(report) => {
                        self.record(report.pair.clone()).await;
                        Ok(report.to_string())
                    }
                    Err(e) => {
                        // Later stages fall back to the address book.
                        self.pairs.lock().await.remove(token);
                        Err(e.into())
                    }
                }
            }
            JobKind::DeployPools { token, stablecoin } => {
                let stablecoin = stablecoin.as_deref().unwrap_or(&self.default_stablecoin);
                let known = self.recorded_pair(*token).await;
                let report = self.deployer.deploy_pools(*token, stablecoin, known.as_ref()).await?;
                self.record(report.pair.clone()).await;
                Ok(report.to_string())
            }
            JobKind::DeployFarming { token } => {
                let known = self.recorded_pair(*token).await;
                let report = self.deployer.deploy_farming(*token, known.as_ref()).await?;
                Ok(report.to_string())
            }
            JobKind::DeployDefault { percentage, stablecoin } => {
                let stablecoin = stablecoin.as_deref().unwrap_or(&self.default_stablecoin);
                self.execute_default(*percentage, stablecoin).await
            }
            other => match other.lottery_phase() {
                Some(phase) => {
                    self.lottery.run(phase).await?;
                    Ok(format!("Lottery {phase} done"))
                }
                None => Ok(format!("{other}: nothing to do")),
            },
        }
    }

    /// Run `job`, log the outcome and notify: a card on success, an alert on
    /// failure. Returns whether the job succeeded.
    pub async fn run_and_notify(&self, job: &JobKind) -> bool {
        info!(%job, "Job started");
        match self.execute(job).await {
            Ok(message) => {
                info!(%job, result = %message, "Job succeeded");
                if !self.notifier.notify(&message, false).await {
                    warn!(%job, "Success notification not delivered");
                }
                true
            }
            Err(e) => {
                error!(%job, error = %e, "Job failed");
                let message = format!("{job} failed: {e}");
                if !self.notifier.notify(&message, true).await {
                    warn!(%job, "Failure alert not delivered");
                }
                false
            }
        }
    }

    /// Send `message` as an alert on every channel.
    pub async fn alert(&self, message: &str) -> bool {
        self.notifier.notify(message, true).await
    }

    async fn execute_default(&self, percentage: Decimal, stablecoin: &str) -> Result<String, JobError> {
        let results = self.deployer.deploy_default(percentage, stablecoin).await;

        let mut lines = Vec::with_capacity(results.len());
        let mut failed = Vec::new();
        for (token, result) in results {
            match result {
                Ok(report) => {
                    self.record(report.pair.clone()).await;
                    lines.push(report.to_string());
                }
                Err(e) => {
                    lines.push(format!("{token}: {e}"));
                    failed.push(token.to_string());
                }
            }
        }

        let detail = lines.join("\n");
        if failed.is_empty() {
            Ok(detail)
        } else {
            Err(JobError::Default {
                failed: failed.join(", "),
                detail,
            })
        }
    }

    async fn record(&self, pair: InstrumentPair) {
        self.pairs.lock().await.insert(pair.token(), pair);
    }
}
