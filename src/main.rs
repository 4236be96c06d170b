//! np-autodeploy entry point.
//!
//! Parses the command line, loads configuration, initialises structured
//! logging, wires the price source, hardhat runner, address book and
//! notifiers together, then either runs the daily scheduler or performs a
//! single operation.

use anyhow::{bail, Context, Result};
use clap::Parser;
use secrecy::SecretString;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use np_autodeploy::cli::{CliApp, Command};
use np_autodeploy::config::AppConfig;
use np_autodeploy::engine::{InstrumentDeployer, LotteryController};
use np_autodeploy::invoker::HardhatRunner;
use np_autodeploy::notify::{LarkNotifier, MailNotifier, Notifier, NotifierSet};
use np_autodeploy::pricing::coinmarketcap::CoinMarketCapClient;
use np_autodeploy::pricing::PriceSource;
use np_autodeploy::scheduler::{default_jobs, JobRunner, Scheduler};
use np_autodeploy::storage::AddressBook;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    let cli = CliApp::parse();
    init_logging(cli.verbose);

    let cfg = AppConfig::load(&cli.config)?;
    info!(
        config = %cli.config.display(),
        network = %cfg.network.name,
        profile = cli.profile.as_deref().unwrap_or(&cfg.deployer.profile),
        "np-autodeploy starting"
    );

    match &cli.command {
        Command::Price { token } => {
            let prices = price_source(&cfg)?;
            let quote = prices.fetch_price(*token).await?;
            println!("{quote}");
        }

        Command::Notify { message, alert } => {
            let notifiers = build_notifiers(&cfg)?;
            if notifiers.is_empty() {
                bail!("No notification channel configured");
            }
            if !notifiers.notify(message, *alert).await {
                bail!("Message was not delivered on every channel");
            }
            info!(channels = notifiers.len(), "Message delivered");
        }

        Command::Run => {
            let notifiers = build_notifiers(&cfg)?;
            if notifiers.is_empty() {
                warn!("No notification channel configured, outcomes are only logged");
            }
            let runner = Arc::new(build_runner(&cfg, cli.profile.as_deref(), notifiers)?);

            let jobs = if cfg.scheduler.jobs.is_empty() {
                info!("No jobs configured, using the default timetable");
                default_jobs()
            } else {
                cfg.scheduler.jobs.clone()
            };

            info!("Entering scheduler. Press Ctrl+C to stop.");
            let scheduler = Scheduler::new(runner, jobs, cfg.scheduler.timezone);
            scheduler
                .run(async {
                    if let Err(e) = tokio::signal::ctrl_c().await {
                        warn!(error = %e, "Failed to listen for Ctrl+C");
                        std::future::pending::<()>().await;
                    }
                })
                .await;
            info!("np-autodeploy shut down cleanly.");
        }

        command => {
            let Some(job) = command.job() else {
                bail!("Command has no job equivalent");
            };
            let notifiers = if cli.notify {
                build_notifiers(&cfg)?
            } else {
                NotifierSet::new()
            };
            let runner = build_runner(&cfg, cli.profile.as_deref(), notifiers)?;

            if cli.notify {
                if !runner.run_and_notify(&job).await {
                    bail!("{job} failed");
                }
            } else {
                let message = runner
                    .execute(&job)
                    .await
                    .with_context(|| format!("{job} failed"))?;
                println!("{message}");
            }
        }
    }

    Ok(())
}

fn price_source(cfg: &AppConfig) -> Result<CoinMarketCapClient> {
    CoinMarketCapClient::new(&cfg.pricing.base_url, Duration::from_secs(cfg.pricing.timeout_secs))
}

/// Wire every component a deployment or lottery job needs.
fn build_runner(cfg: &AppConfig, profile: Option<&str>, notifiers: NotifierSet) -> Result<JobRunner> {
    let root = cfg.resolve_root()?;
    let profile = cfg.profile(profile)?;
    info!(root = %root.display(), ?profile, "Deployment root resolved");

    let runner = Arc::new(
        HardhatRunner::new(
            &cfg.deployer.program,
            cfg.deployer.base_args.clone(),
            &cfg.network.name,
            root.clone(),
        )
        .check_exit_status(cfg.deployer.check_exit_status)
        .timeout(cfg.deployer.command_timeout_secs.map(Duration::from_secs)),
    );
    let prices: Arc<dyn PriceSource> = Arc::new(price_source(cfg)?);
    let book = AddressBook::new(&root, &cfg.network.name);

    let deployer = InstrumentDeployer::new(prices, runner.clone(), book, profile, cfg.scheduler.timezone);
    let lottery = LotteryController::new(runner);
    let notifier: Arc<dyn Notifier> = Arc::new(notifiers);

    Ok(JobRunner::new(deployer, lottery, notifier, &cfg.deployer.default_stablecoin))
}

/// Build the configured notification channels. Secrets come from the
/// environment variables named in the config.
fn build_notifiers(cfg: &AppConfig) -> Result<NotifierSet> {
    let mut set = NotifierSet::new();

    if let Some(lark) = &cfg.notify.lark {
        let url = AppConfig::resolve_env(&lark.webhook_url_env)?;
        set = set.with(Box::new(LarkNotifier::new(
            &url,
            &lark.card_link,
            Duration::from_secs(lark.timeout_secs),
        )?));
    }

    if let Some(mail) = &cfg.notify.mail {
        let password = SecretString::new(AppConfig::resolve_env(&mail.password_env)?);
        set = set.with(Box::new(MailNotifier::new(mail, password)?));
    }

    Ok(set)
}

/// Initialise the `tracing` subscriber.
fn init_logging(verbose: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default_level = if verbose { "np_autodeploy=debug" } else { "np_autodeploy=info" };
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level));

    let json_logging = std::env::var("NP_AUTODEPLOY_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    }
}
