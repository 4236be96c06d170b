//! Daily job scheduler.
//!
//! Every configured job fires once a day at a wall-clock time in the
//! scheduler timezone. Each job lives on its own tokio task: sleep until the
//! next slot, run to completion, compute the next slot. A run that overruns
//! its next slot simply skips it.

pub mod jobs;

pub use jobs::{JobError, JobRunner};

use anyhow::{bail, Result};
use chrono::{DateTime, Duration, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{error, info};

use crate::engine::LotteryPhase;
use crate::types::Token;

// ---------------------------------------------------------------------------
// Job definitions
// ---------------------------------------------------------------------------

/// What a job does when it fires.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum JobKind {
    DeployTokens {
        token: Token,
        percentage: Decimal,
    },
    DeployPools {
        token: Token,
        /// Contract name in `address.json`; the configured default when unset.
        #[serde(default)]
        stablecoin: Option<String>,
    },
    DeployFarming {
        token: Token,
    },
    /// All three stages for every supported token.
    DeployDefault {
        #[serde(default = "default_percentage")]
        percentage: Decimal,
        #[serde(default)]
        stablecoin: Option<String>,
    },
    LotteryStart,
    LotteryClose,
    LotteryDraw,
    LotterySettle,
}

fn default_percentage() -> Decimal {
    dec!(0.2)
}

impl JobKind {
    pub fn lottery_phase(&self) -> Option<LotteryPhase> {
        match self {
            JobKind::LotteryStart => Some(LotteryPhase::Start),
            JobKind::LotteryClose => Some(LotteryPhase::Close),
            JobKind::LotteryDraw => Some(LotteryPhase::Draw),
            JobKind::LotterySettle => Some(LotteryPhase::Settle),
            _ => None,
        }
    }

    fn percentage(&self) -> Option<Decimal> {
        match self {
            JobKind::DeployTokens { percentage, .. } | JobKind::DeployDefault { percentage, .. } => {
                Some(*percentage)
            }
            _ => None,
        }
    }
}

impl From<LotteryPhase> for JobKind {
    fn from(phase: LotteryPhase) -> Self {
        match phase {
            LotteryPhase::Start => JobKind::LotteryStart,
            LotteryPhase::Close => JobKind::LotteryClose,
            LotteryPhase::Draw => JobKind::LotteryDraw,
            LotteryPhase::Settle => JobKind::LotterySettle,
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobKind::DeployTokens { token, percentage } => {
                write!(f, "deploy {token} tokens (±{})", percentage.normalize())
            }
            JobKind::DeployPools { token, .. } => write!(f, "deploy {token} swap pools"),
            JobKind::DeployFarming { token } => write!(f, "add {token} farming pools"),
            JobKind::DeployDefault { .. } => write!(f, "default deployment"),
            other => match other.lottery_phase() {
                Some(phase) => write!(f, "lottery {phase}"),
                None => write!(f, "job"),
            },
        }
    }
}

/// A job and its daily fire time.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct JobSpec {
    /// Local time of day, `HH:MM:SS`.
    pub at: NaiveTime,
    pub job: JobKind,
}

impl JobSpec {
    pub fn new(at: NaiveTime, job: JobKind) -> Self {
        Self { at, job }
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(pct) = self.job.percentage() {
            if pct < Decimal::ZERO || pct >= Decimal::ONE {
                bail!("job '{}' at {}: percentage must be in [0, 1), got {pct}", self.job, self.at);
            }
        }
        Ok(())
    }
}

fn hms(h: u32, m: u32, s: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, s).unwrap_or(NaiveTime::MIN)
}

/// The production timetable: token, pool and farming stages per underlying,
/// staggered by a minute per token, followed by the lottery cycle.
pub fn default_jobs() -> Vec<JobSpec> {
    let mut jobs = Vec::new();
    for (offset, &token) in Token::ALL.iter().enumerate() {
        let m = offset as u32;
        jobs.push(JobSpec::new(
            hms(15, 54 + m, 0),
            JobKind::DeployTokens {
                token,
                percentage: dec!(0.1),
            },
        ));
        jobs.push(JobSpec::new(
            hms(15, 55 + m, 20),
            JobKind::DeployPools {
                token,
                stablecoin: None,
            },
        ));
        jobs.push(JobSpec::new(hms(15, 56 + m, 40), JobKind::DeployFarming { token }));
    }
    jobs.push(JobSpec::new(hms(16, 0, 0), JobKind::LotterySettle));
    jobs.push(JobSpec::new(hms(16, 1, 0), JobKind::LotteryClose));
    jobs.push(JobSpec::new(hms(16, 3, 0), JobKind::LotteryDraw));
    jobs.push(JobSpec::new(hms(16, 5, 0), JobKind::LotteryStart));
    jobs
}

// ---------------------------------------------------------------------------
// Timing
// ---------------------------------------------------------------------------

/// First instant strictly after `now` whose local time in `tz` is `at`.
///
/// A slot that falls in a DST gap does not exist that day and is skipped;
/// an ambiguous slot fires at its earlier occurrence.
pub fn next_fire(now: DateTime<Utc>, tz: Tz, at: NaiveTime) -> DateTime<Utc> {
    let today = now.with_timezone(&tz).date_naive();
    for offset in 0..=2 {
        let day = today + Duration::days(offset);
        if let Some(local) = tz.from_local_datetime(&day.and_time(at)).earliest() {
            let fire = local.with_timezone(&Utc);
            if fire > now {
                return fire;
            }
        }
    }
    now + Duration::days(1)
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

pub struct Scheduler {
    runner: Arc<JobRunner>,
    jobs: Vec<JobSpec>,
    tz: Tz,
}

impl Scheduler {
    pub fn new(runner: Arc<JobRunner>, jobs: Vec<JobSpec>, tz: Tz) -> Self {
        Self { runner, jobs, tz }
    }

    /// Spawn every job and run until `shutdown` resolves.
    pub async fn run<F>(self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        info!(jobs = self.jobs.len(), timezone = %self.tz, "Scheduler starting");

        let mut handles = Vec::with_capacity(self.jobs.len());
        for spec in self.jobs {
            let runner = Arc::clone(&self.runner);
            let tz = self.tz;
            handles.push(tokio::spawn(job_loop(runner, spec, tz)));
        }

        shutdown.await;
        info!("Shutdown signal received, stopping jobs");
        for handle in &handles {
            handle.abort();
        }
        for handle in handles {
            let _ = handle.await;
        }
        info!("Scheduler stopped");
    }
}

async fn job_loop(runner: Arc<JobRunner>, spec: JobSpec, tz: Tz) {
    loop {
        let now = Utc::now();
        let fire = next_fire(now, tz, spec.at);
        info!(job = %spec.job, next = %fire.with_timezone(&tz), "Job scheduled");

        let wait = (fire - now).to_std().unwrap_or_default();
        tokio::time::sleep(wait).await;

        // A panicking run must not take the daily loop down with it.
        let mut run = JoinSet::new();
        let job_runner = Arc::clone(&runner);
        let job = spec.job.clone();
        run.spawn(async move { job_runner.run_and_notify(&job).await });

        if let Some(Err(e)) = run.join_next().await {
            if e.is_panic() {
                error!(job = %spec.job, "Job panicked");
                runner.alert(&format!("{} panicked", spec.job)).await;
            }
        }
    }
}
