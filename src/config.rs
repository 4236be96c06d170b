//! Configuration loading from TOML with environment variable resolution.
//!
//! Reads `config.toml` and deserializes into strongly-typed structs.
//! Secrets (mail password, webhook URL) are referenced by env-var name in
//! the config and resolved at runtime via `std::env::var`.

use anyhow::{bail, Context, Result};
use chrono_tz::Tz;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use crate::scheduler::JobSpec;

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub network: NetworkConfig,
    pub deployer: DeployerConfig,
    /// Extra or overriding profiles; the built-in `v1` and `v2` are always present.
    #[serde(default)]
    pub profiles: BTreeMap<String, Profile>,
    #[serde(default)]
    pub pricing: PricingConfig,
    #[serde(default)]
    pub notify: NotifyConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct NetworkConfig {
    /// Hardhat network name passed as `--network`.
    pub name: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DeployerConfig {
    /// Hardhat project root. Used when no per-OS root matches.
    #[serde(default)]
    pub root: Option<PathBuf>,
    /// Per-OS project roots keyed by `std::env::consts::OS` ("linux", "macos").
    #[serde(default)]
    pub root_by_os: HashMap<String, PathBuf>,
    #[serde(default = "default_program")]
    pub program: String,
    #[serde(default = "default_base_args")]
    pub base_args: Vec<String>,
    /// Treat a non-zero exit of the deployment tool as a failure.
    #[serde(default = "default_true")]
    pub check_exit_status: bool,
    #[serde(default)]
    pub command_timeout_secs: Option<u64>,
    /// Name of the active profile.
    #[serde(default = "default_profile")]
    pub profile: String,
    #[serde(default = "default_stablecoin")]
    pub default_stablecoin: String,
}

/// Named set of deployment constants.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct Profile {
    /// LP fee rate passed to `deployNPPool --fee`.
    pub fee: u32,
    /// Farming reward per second passed to `addFarmingPool --reward`.
    pub reward: Decimal,
    pub deadline_days: i64,
    pub settle_days: i64,
    #[serde(default = "default_decimals")]
    pub decimals: u32,
}

impl Profile {
    /// Constants of the first deployment script (fee 2, settlement after 60 days).
    pub fn v1() -> Self {
        Self {
            fee: 2,
            reward: dec!(0.25),
            deadline_days: 30,
            settle_days: 60,
            decimals: 2,
        }
    }

    /// Constants of the later deployment script (fee 20, settlement after 40 days).
    pub fn v2() -> Self {
        Self {
            fee: 20,
            reward: dec!(0.25),
            deadline_days: 30,
            settle_days: 40,
            decimals: 2,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct PricingConfig {
    #[serde(default = "default_price_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            base_url: default_price_base_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct NotifyConfig {
    #[serde(default)]
    pub lark: Option<LarkConfig>,
    #[serde(default)]
    pub mail: Option<MailConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LarkConfig {
    /// Env var holding the bot webhook URL (the URL embeds the bot token).
    pub webhook_url_env: String,
    /// Link shown on success cards.
    #[serde(default = "default_card_link")]
    pub card_link: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct MailConfig {
    pub relay: String,
    #[serde(default = "default_smtp_port")]
    pub port: u16,
    pub sender: String,
    #[serde(default = "default_sender_name")]
    pub sender_name: String,
    pub password_env: String,
    pub recipients: Vec<String>,
    #[serde(default = "default_subject")]
    pub subject: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SchedulerConfig {
    #[serde(default = "default_timezone")]
    pub timezone: Tz,
    #[serde(default)]
    pub jobs: Vec<JobSpec>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            timezone: default_timezone(),
            jobs: Vec::new(),
        }
    }
}

fn default_program() -> String {
    "npx".to_string()
}

fn default_base_args() -> Vec<String> {
    vec!["hardhat".to_string()]
}

fn default_true() -> bool {
    true
}

fn default_profile() -> String {
    "v1".to_string()
}

fn default_stablecoin() -> String {
    "MockUSD".to_string()
}

fn default_decimals() -> u32 {
    2
}

fn default_price_base_url() -> String {
    "https://coinmarketcap.com".to_string()
}

fn default_timeout_secs() -> u64 {
    15
}

fn default_card_link() -> String {
    "https://accounts.google.com/".to_string()
}

fn default_smtp_port() -> u16 {
    994
}

fn default_sender_name() -> String {
    "auto-deploy".to_string()
}

fn default_subject() -> String {
    "Auto deployment".to_string()
}

fn default_timezone() -> Tz {
    chrono_tz::Asia::Shanghai
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_toml(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Parse and validate configuration from TOML text.
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Resolve an environment variable name to its value.
    /// Useful for loading secrets referenced in the config.
    pub fn resolve_env(env_name: &str) -> Result<String> {
        std::env::var(env_name)
            .with_context(|| format!("Environment variable not set: {env_name}"))
    }

    /// Look up a profile by name, falling back to the active one.
    /// Profiles declared in the file shadow the built-in ones.
    pub fn profile(&self, name: Option<&str>) -> Result<Profile> {
        let name = name.unwrap_or(&self.deployer.profile);
        if let Some(profile) = self.profiles.get(name) {
            return Ok(profile.clone());
        }
        match name {
            "v1" => Ok(Profile::v1()),
            "v2" => Ok(Profile::v2()),
            other => bail!("Unknown profile: {other}"),
        }
    }

    /// Pick the deployment root for the host OS. Called once at startup.
    pub fn resolve_root(&self) -> Result<PathBuf> {
        if let Some(root) = self.deployer.root_by_os.get(std::env::consts::OS) {
            return Ok(root.clone());
        }
        self.deployer
            .root
            .clone()
            .with_context(|| {
                format!(
                    "No deployment root configured for {} (set deployer.root)",
                    std::env::consts::OS
                )
            })
    }

    /// Reject configurations that would only fail once a job fires.
    pub fn validate(&self) -> Result<()> {
        if self.network.name.trim().is_empty() {
            bail!("network.name must not be empty");
        }
        if self.deployer.program.trim().is_empty() {
            bail!("deployer.program must not be empty");
        }
        self.profile(None)?;

        for (name, profile) in &self.profiles {
            if profile.deadline_days <= 0 || profile.settle_days < profile.deadline_days {
                bail!(
                    "profile {name}: need 0 < deadline_days <= settle_days, got {} / {}",
                    profile.deadline_days,
                    profile.settle_days
                );
            }
        }

        for job in &self.scheduler.jobs {
            job.validate()?;
        }

        if let Some(mail) = &self.notify.mail {
            if mail.recipients.is_empty() {
                bail!("notify.mail.recipients must not be empty");
            }
        }
        Ok(())
    }
}
