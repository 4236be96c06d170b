//! Lottery round controller.
//!
//! Start, close, draw and settle are independent one-shot tasks. No state
//! is kept between them; the schedule is what puts them in order.

use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::info;

use crate::invoker::{InvokeError, TaskArgs, TaskOutput, TaskRunner};

/// Length of a lottery round started by `start`.
const ROUND_LENGTH_DAYS: i64 = 1;

/// One phase of the lottery cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LotteryPhase {
    Start,
    Close,
    Draw,
    /// Settles the purchase incentive round alongside the lottery.
    Settle,
}

impl LotteryPhase {
    /// Hardhat task implementing this phase.
    pub fn task(&self) -> &'static str {
        match self {
            LotteryPhase::Start => "startLotteryRound",
            LotteryPhase::Close => "closeLotteryRound",
            LotteryPhase::Draw => "drawLotteryRound",
            LotteryPhase::Settle => "settlePurchaseIncentive",
        }
    }
}

impl fmt::Display for LotteryPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LotteryPhase::Start => write!(f, "start"),
            LotteryPhase::Close => write!(f, "close"),
            LotteryPhase::Draw => write!(f, "draw"),
            LotteryPhase::Settle => write!(f, "settle"),
        }
    }
}

impl FromStr for LotteryPhase {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "start" => Ok(LotteryPhase::Start),
            "close" => Ok(LotteryPhase::Close),
            "draw" => Ok(LotteryPhase::Draw),
            "settle" => Ok(LotteryPhase::Settle),
            _ => Err(anyhow::anyhow!("Unknown lottery phase: {s}")),
        }
    }
}

pub struct LotteryController {
    runner: Arc<dyn TaskRunner>,
}

impl LotteryController {
    pub fn new(runner: Arc<dyn TaskRunner>) -> Self {
        Self { runner }
    }

    /// Arguments for `phase` when run at `now`.
    pub fn task_args(phase: LotteryPhase, now: DateTime<Utc>) -> TaskArgs {
        match phase {
            LotteryPhase::Start => {
                let end = now + Duration::days(ROUND_LENGTH_DAYS);
                TaskArgs::new().flag("end", end.timestamp())
            }
            LotteryPhase::Close | LotteryPhase::Draw | LotteryPhase::Settle => TaskArgs::new(),
        }
    }

    pub async fn run(&self, phase: LotteryPhase) -> Result<TaskOutput, InvokeError> {
        self.run_at(phase, Utc::now()).await
    }

    pub async fn run_at(&self, phase: LotteryPhase, now: DateTime<Utc>) -> Result<TaskOutput, InvokeError> {
        let args = Self::task_args(phase, now);
        info!(%phase, task = phase.task(), "Running lottery phase");
        let output = self.runner.run_task(phase.task(), &args).await?;
        info!(%phase, "Lottery phase done");
        Ok(output)
    }

    pub async fn start(&self) -> Result<TaskOutput, InvokeError> {
        self.run(LotteryPhase::Start).await
    }

    pub async fn close(&self) -> Result<TaskOutput, InvokeError> {
        self.run(LotteryPhase::Close).await
    }

    pub async fn draw(&self) -> Result<TaskOutput, InvokeError> {
        self.run(LotteryPhase::Draw).await
    }

    pub async fn settle(&self) -> Result<TaskOutput, InvokeError> {
        self.run(LotteryPhase::Settle).await
    }
}
