//! Naughty price instrument deployer.
//!
//! Three stages per underlying token, each triggered on its own:
//!
//! 1. `deploy_tokens`: quote → strikes → `deployNPToken` (call, then put)
//! 2. `deploy_pools`: `deployNPPool` for both legs against a stablecoin
//! 3. `deploy_farming`: `addFarmingPool` for both swap pools
//!
//! Stage 1 returns the deployed `InstrumentPair`; later stages take it when
//! the caller has it and otherwise look the pair up in the address books by
//! token, current round and leg.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use rust_decimal::Decimal;
use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};

use super::params::{self, TokenParams};
use super::DeployError;
use crate::config::Profile;
use crate::invoker::{TaskArgs, TaskRunner};
use crate::pricing::PriceSource;
use crate::storage::{AddressBook, Book};
use crate::types::{Direction, InstrumentName, InstrumentPair, Token};

const TOKEN_TASK: &str = "deployNPToken";
const POOL_TASK: &str = "deployNPPool";
const FARMING_TASK: &str = "addFarmingPool";

// ---------------------------------------------------------------------------
// Stage reports
// ---------------------------------------------------------------------------

/// Outcome of the token stage.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenDeployment {
    pub params: TokenParams,
    pub pair: InstrumentPair,
}

impl fmt::Display for TokenDeployment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Token {} deployed at {}: call {} / put {} (deadline {}, settle {})",
            self.pair.token(),
            self.params.quote,
            self.pair.call,
            self.pair.put,
            self.params.deadline,
            self.params.settle_time,
        )
    }
}

/// Outcome of the pool stage.
#[derive(Debug, Clone, PartialEq)]
pub struct PoolDeployment {
    pub pair: InstrumentPair,
    pub stablecoin: String,
    pub stablecoin_address: String,
    pub deadline: i64,
    pub fee: u32,
}

impl fmt::Display for PoolDeployment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Swap pools deployed for {} against {} (fee {})",
            self.pair, self.stablecoin, self.fee,
        )
    }
}

/// Outcome of the farming stage.
#[derive(Debug, Clone, PartialEq)]
pub struct FarmingDeployment {
    pub pair: InstrumentPair,
    pub call_pool: String,
    pub put_pool: String,
    pub reward: Decimal,
}

impl fmt::Display for FarmingDeployment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Farming pools added for {} (reward {}/s)",
            self.pair,
            self.reward.normalize(),
        )
    }
}

// ---------------------------------------------------------------------------
// Deployer
// ---------------------------------------------------------------------------

pub struct InstrumentDeployer {
    prices: Arc<dyn PriceSource>,
    runner: Arc<dyn TaskRunner>,
    book: AddressBook,
    profile: Profile,
    tz: Tz,
}

impl InstrumentDeployer {
    pub fn new(
        prices: Arc<dyn PriceSource>,
        runner: Arc<dyn TaskRunner>,
        book: AddressBook,
        profile: Profile,
        tz: Tz,
    ) -> Self {
        Self {
            prices,
            runner,
            book,
            profile,
            tz,
        }
    }

    /// Current time in the deployment timezone.
    pub fn now(&self) -> DateTime<Tz> {
        Utc::now().with_timezone(&self.tz)
    }

    // -- Stage 1 ---------------------------------------------------------

    pub async fn deploy_tokens(&self, token: Token, percentage: Decimal) -> Result<TokenDeployment, DeployError> {
        self.deploy_tokens_at(token, percentage, self.now()).await
    }

    pub async fn deploy_tokens_at(
        &self,
        token: Token,
        percentage: Decimal,
        now: DateTime<Tz>,
    ) -> Result<TokenDeployment, DeployError> {
        let quote = self.prices.fetch_price(token).await?;
        info!(%token, price = %quote.price, %percentage, "Deploying naughty price tokens");

        let params = TokenParams::derive(quote, percentage, &self.profile, &now)?;
        let pair = params.instrument_pair();

        self.run_legs(
            TOKEN_TASK,
            [
                (&pair.call, params.token_task_args(Direction::High)),
                (&pair.put, params.token_task_args(Direction::Low)),
            ],
        )
        .await?;

        info!(call = %pair.call, put = %pair.put, round = %params.round, "Token pair deployed");
        Ok(TokenDeployment { params, pair })
    }

    // -- Stage 2 ---------------------------------------------------------

    pub async fn deploy_pools(
        &self,
        token: Token,
        stablecoin: &str,
        known: Option<&InstrumentPair>,
    ) -> Result<PoolDeployment, DeployError> {
        self.deploy_pools_at(token, stablecoin, known, self.now()).await
    }

    pub async fn deploy_pools_at(
        &self,
        token: Token,
        stablecoin: &str,
        known: Option<&InstrumentPair>,
        now: DateTime<Tz>,
    ) -> Result<PoolDeployment, DeployError> {
        let pair = self.resolve_pair(Book::Tokens, token, known, &now)?;
        let stablecoin_address = self.book.contract_address(stablecoin)?;
        let deadline = params::days_after(&now, self.profile.deadline_days);
        let fee = self.profile.fee;
        info!(%pair, stablecoin, %stablecoin_address, fee, "Deploying swap pools");

        self.run_legs(
            POOL_TASK,
            [
                (&pair.call, params::pool_task_args(&pair.call, &stablecoin_address, deadline, fee)),
                (&pair.put, params::pool_task_args(&pair.put, &stablecoin_address, deadline, fee)),
            ],
        )
        .await?;

        Ok(PoolDeployment {
            pair,
            stablecoin: stablecoin.to_string(),
            stablecoin_address,
            deadline,
            fee,
        })
    }

    // -- Stage 3 ---------------------------------------------------------

    pub async fn deploy_farming(
        &self,
        token: Token,
        known: Option<&InstrumentPair>,
    ) -> Result<FarmingDeployment, DeployError> {
        self.deploy_farming_at(token, known, self.now()).await
    }

    pub async fn deploy_farming_at(
        &self,
        token: Token,
        known: Option<&InstrumentPair>,
        now: DateTime<Tz>,
    ) -> Result<FarmingDeployment, DeployError> {
        let pair = self.resolve_pair(Book::Pools, token, known, &now)?;
        let call_pool = self.book.pool_address(&pair.call)?;
        let put_pool = self.book.pool_address(&pair.put)?;
        let reward = self.profile.reward;
        info!(%pair, %call_pool, %put_pool, %reward, "Adding farming pools");

        self.run_legs(
            FARMING_TASK,
            [
                (&pair.call, params::farming_task_args(&pair.call, &call_pool, reward)),
                (&pair.put, params::farming_task_args(&pair.put, &put_pool, reward)),
            ],
        )
        .await?;

        Ok(FarmingDeployment {
            pair,
            call_pool,
            put_pool,
            reward,
        })
    }

    // -- Batch -----------------------------------------------------------

    /// Run all three stages for every supported token, threading each pair
    /// from stage to stage. A failing token does not stop the others.
    pub async fn deploy_default(
        &self,
        percentage: Decimal,
        stablecoin: &str,
    ) -> Vec<(Token, Result<FarmingDeployment, DeployError>)> {
        let mut results = Vec::with_capacity(Token::ALL.len());
        for &token in Token::ALL {
            let result = self.deploy_all_stages(token, percentage, stablecoin).await;
            if let Err(e) = &result {
                warn!(%token, error = %e, "Default deployment failed for token");
            }
            results.push((token, result));
        }
        results
    }

    async fn deploy_all_stages(
        &self,
        token: Token,
        percentage: Decimal,
        stablecoin: &str,
    ) -> Result<FarmingDeployment, DeployError> {
        let tokens = self.deploy_tokens(token, percentage).await?;
        let pools = self.deploy_pools(token, stablecoin, Some(&tokens.pair)).await?;
        self.deploy_farming(token, Some(&pools.pair)).await
    }

    // -- Helpers ---------------------------------------------------------

    fn resolve_pair(
        &self,
        book: Book,
        token: Token,
        known: Option<&InstrumentPair>,
        now: &DateTime<Tz>,
    ) -> Result<InstrumentPair, DeployError> {
        match known {
            Some(pair) if pair.token() == token => Ok(pair.clone()),
            Some(pair) => {
                warn!(%token, %pair, "Ignoring pair recorded for another token");
                self.lookup_pair(book, token, now)
            }
            None => self.lookup_pair(book, token, now),
        }
    }

    fn lookup_pair(&self, book: Book, token: Token, now: &DateTime<Tz>) -> Result<InstrumentPair, DeployError> {
        let round = params::round_label(now);
        let pair = self.book.latest_pair(book, token, &round)?;
        info!(%token, %round, %pair, %book, "Resolved pair from address book");
        Ok(pair)
    }

    /// Run the call leg then the put leg. A failing put leg reports the
    /// call leg as already deployed.
    async fn run_legs(
        &self,
        stage: &'static str,
        legs: [(&InstrumentName, TaskArgs); 2],
    ) -> Result<(), DeployError> {
        let mut deployed = Vec::new();
        for (instrument, args) in legs {
            let leg = instrument.direction;
            match self.runner.run_task(stage, &args).await {
                Ok(_) => {
                    info!(stage, %leg, %instrument, "Leg deployed");
                    deployed.push(instrument.to_string());
                }
                Err(source) => {
                    return Err(DeployError::Invoke {
                        stage,
                        leg,
                        instrument: instrument.to_string(),
                        deployed,
                        source,
                    });
                }
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
