//! Command-line interface.
//!
//! `run` starts the daily scheduler; every other subcommand performs a
//! single operation and exits.

use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use std::path::PathBuf;

use crate::engine::LotteryPhase;
use crate::scheduler::JobKind;
use crate::types::Token;

/// Naughty price auto-deployment
#[derive(Parser, Debug)]
#[command(
    name = "np-autodeploy",
    version = env!("CARGO_PKG_VERSION"),
    about = "Scheduled deployment of naughty price tokens, swap pools and farming pools",
    long_about = "Derives strikes from the live spot price, runs the hardhat deployment tasks \
                  for tokens, swap pools and farming pools, drives the lottery cycle and \
                  reports every outcome to Lark and mail."
)]
pub struct CliApp {
    #[command(subcommand)]
    pub command: Command,

    /// Path to configuration file
    #[arg(short, long, value_name = "FILE", default_value = "config.toml", global = true)]
    pub config: PathBuf,

    /// Deployment profile (overrides deployer.profile)
    #[arg(short, long, value_name = "NAME", global = true)]
    pub profile: Option<String>,

    /// Send notifications for one-shot commands too
    #[arg(long, global = true)]
    pub notify: bool,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the scheduler until Ctrl+C
    Run,

    /// Fetch the current spot price of a token
    Price {
        #[arg(value_name = "TOKEN")]
        token: Token,
    },

    /// Deploy the call and put tokens for an underlying
    DeployTokens {
        #[arg(value_name = "TOKEN")]
        token: Token,

        /// Strike offset from spot, in [0, 1)
        #[arg(long, default_value = "0.1")]
        percentage: Decimal,
    },

    /// Deploy swap pools for the current round's pair
    DeployPools {
        #[arg(value_name = "TOKEN")]
        token: Token,

        /// Stablecoin contract name (defaults to deployer.default_stablecoin)
        #[arg(long)]
        stablecoin: Option<String>,
    },

    /// Add farming pools for the current round's swap pools
    DeployFarming {
        #[arg(value_name = "TOKEN")]
        token: Token,
    },

    /// Run all three stages for BTC, ETH and AVAX
    DeployDefault {
        #[arg(long, default_value = "0.2")]
        percentage: Decimal,

        #[arg(long)]
        stablecoin: Option<String>,
    },

    /// Run one lottery phase (start, close, draw, settle)
    Lottery {
        #[arg(value_name = "PHASE")]
        phase: LotteryPhase,
    },

    /// Send a test message through the configured channels
    Notify {
        message: String,

        /// Send as an alert instead of a success card
        #[arg(long)]
        alert: bool,
    },
}

impl Command {
    /// The scheduler job equivalent to this command, if any.
    pub fn job(&self) -> Option<JobKind> {
        match self {
            Command::DeployTokens { token, percentage } => Some(JobKind::DeployTokens {
                token: *token,
                percentage: *percentage,
            }),
            Command::DeployPools { token, stablecoin } => Some(JobKind::DeployPools {
                token: *token,
                stablecoin: stablecoin.clone(),
            }),
            Command::DeployFarming { token } => Some(JobKind::DeployFarming { token: *token }),
            Command::DeployDefault { percentage, stablecoin } => Some(JobKind::DeployDefault {
                percentage: *percentage,
                stablecoin: stablecoin.clone(),
            }),
            Command::Lottery { phase } => Some(JobKind::from(*phase)),
            Command::Run | Command::Price { .. } | Command::Notify { .. } => None,
        }
    }
}
