//! Core engine: the token → pool → farming stages and the lottery phases.

pub mod deployer;
pub mod lottery;
pub mod params;

use crate::invoker::InvokeError;
use crate::pricing::PriceError;
use crate::storage::AddressBookError;
use crate::types::Direction;

pub use deployer::InstrumentDeployer;
pub use lottery::{LotteryController, LotteryPhase};

/// Why a deployment stage did not complete.
#[derive(Debug, thiserror::Error)]
pub enum DeployError {
    #[error(transparent)]
    Price(#[from] PriceError),

    #[error(transparent)]
    Params(#[from] params::ParamError),

    #[error(transparent)]
    Lookup(#[from] AddressBookError),

    /// A leg failed. `deployed` lists legs of the same stage that already
    /// went through; they are not rolled back.
    #[error("{stage} {leg} leg {instrument} failed (already deployed: {deployed:?}): {source}")]
    Invoke {
        stage: &'static str,
        leg: Direction,
        instrument: String,
        deployed: Vec<String>,
        #[source]
        source: InvokeError,
    },
}
