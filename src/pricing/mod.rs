//! Underlying price sources.
//!
//! Defines the `PriceSource` trait used by the token stage to derive
//! strike prices, and the CoinMarketCap page scraper that implements it.

pub mod coinmarketcap;

use async_trait::async_trait;

use crate::types::{Token, TokenPrice};

/// Failures while fetching or reading a quote.
#[derive(Debug, thiserror::Error)]
pub enum PriceError {
    #[error("Price request for {token} failed: {source}")]
    Http {
        token: Token,
        #[source]
        source: reqwest::Error,
    },

    #[error("Price page for {token} returned HTTP {status}")]
    Status { token: Token, status: u16 },

    #[error("No price element found on the {token} page")]
    MissingPrice { token: Token },

    #[error("Unparsable price for {token}: {raw:?}")]
    Unparsable { token: Token, raw: String },
}

/// Abstraction over market-data providers.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PriceSource: Send + Sync {
    /// Fetch the current USD price of `token`.
    async fn fetch_price(&self, token: Token) -> Result<TokenPrice, PriceError>;
}
