//! CoinMarketCap price page scraper.
//!
//! There is no API key involved: the public markets page of each asset is
//! fetched and the first `.priceValue` element is read (e.g. `$50,123.45`).
//!
//! Page: `https://coinmarketcap.com/currencies/{slug}/markets/`

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::Decimal;
use scraper::{Html, Selector};
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

use super::{PriceError, PriceSource};
use crate::types::{Token, TokenPrice};

const PRICE_SELECTOR: &str = ".priceValue";

/// Scrapes USD prices from CoinMarketCap asset pages.
pub struct CoinMarketCapClient {
    http: Client,
    base_url: String,
    selector: Selector,
}

impl CoinMarketCapClient {
    /// Create a client against `base_url` (normally `https://coinmarketcap.com`).
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent("np-autodeploy/0.1.0")
            .build()
            .context("Failed to build price HTTP client")?;
        let selector = Selector::parse(PRICE_SELECTOR)
            .map_err(|e| anyhow!("Invalid price selector {PRICE_SELECTOR}: {e}"))?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            selector,
        })
    }

    fn page_url(&self, token: Token) -> String {
        format!("{}/currencies/{}/markets/", self.base_url, token.slug())
    }

    /// Pull the price out of a markets page.
    pub fn extract_price(&self, token: Token, html: &str) -> Result<Decimal, PriceError> {
        let document = Html::parse_document(html);
        let element = document
            .select(&self.selector)
            .next()
            .ok_or(PriceError::MissingPrice { token })?;
        let raw: String = element.text().collect();
        parse_price_text(token, &raw)
    }
}

/// `"$50,123.45"` -> `50123.45`.
fn parse_price_text(token: Token, raw: &str) -> Result<Decimal, PriceError> {
    let cleaned: String = raw
        .trim()
        .trim_start_matches(|c: char| !c.is_ascii_digit())
        .chars()
        .filter(|c| *c != ',')
        .collect();

    Decimal::from_str(&cleaned).map_err(|_| PriceError::Unparsable {
        token,
        raw: raw.to_string(),
    })
}

#[async_trait]
impl PriceSource for CoinMarketCapClient {
    async fn fetch_price(&self, token: Token) -> Result<TokenPrice, PriceError> {
        let url = self.page_url(token);
        debug!(%token, url, "Fetching price page");

        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|source| PriceError::Http { token, source })?;

        if !resp.status().is_success() {
            return Err(PriceError::Status {
                token,
                status: resp.status().as_u16(),
            });
        }

        let body = resp
            .text()
            .await
            .map_err(|source| PriceError::Http { token, source })?;

        let price = self.extract_price(token, &body)?;
        debug!(%token, %price, "Price scraped");
        Ok(TokenPrice { token, price })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn client() -> CoinMarketCapClient {
        CoinMarketCapClient::new("https://coinmarketcap.com/", Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_page_url() {
        let c = client();
        assert_eq!(
            c.page_url(Token::Avax),
            "https://coinmarketcap.com/currencies/avalanche/markets/"
        );
    }

    #[test]
    fn test_extract_first_price_value() {
        let html = r#"
            <html><body>
              <div class="priceTitle"><div class="priceValue "><span>$50,123.45</span></div></div>
              <div class="priceValue">$1.00</div>
            </body></html>"#;
        let price = client().extract_price(Token::Btc, html).unwrap();
        assert_eq!(price, dec!(50123.45));
    }

    #[test]
    fn test_missing_price_element() {
        let err = client()
            .extract_price(Token::Eth, "<html><body><p>rate limited</p></body></html>")
            .unwrap_err();
        assert!(matches!(err, PriceError::MissingPrice { token: Token::Eth }));
    }

    #[test]
    fn test_unparsable_price() {
        let html = r#"<div class="priceValue">$--</div>"#;
        let err = client().extract_price(Token::Btc, html).unwrap_err();
        assert!(matches!(err, PriceError::Unparsable { .. }));
    }

    #[test]
    fn test_parse_price_text_variants() {
        assert_eq!(parse_price_text(Token::Btc, " $50,000.00 ").unwrap(), dec!(50000));
        assert_eq!(parse_price_text(Token::Avax, "$18.27").unwrap(), dec!(18.27));
        assert_eq!(parse_price_text(Token::Eth, "3,001").unwrap(), dec!(3001));
    }
}
