//! Shared types for the deployment daemon.
//!
//! Tokens, directions, round labels and instrument names form the naming
//! contract between this crate, the hardhat tasks and the JSON address
//! books. Everything that crosses that boundary as a string is parsed back
//! into one of these types before it is compared.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ---------------------------------------------------------------------------
// Token
// ---------------------------------------------------------------------------

/// Underlying asset of a naughty price token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Token {
    Btc,
    Eth,
    Avax,
}

impl Token {
    /// All supported tokens, in the order the default batch deploys them.
    pub const ALL: &'static [Token] = &[Token::Btc, Token::Eth, Token::Avax];

    /// Ticker symbol as used in instrument names and CLI arguments.
    pub fn symbol(&self) -> &'static str {
        match self {
            Token::Btc => "BTC",
            Token::Eth => "ETH",
            Token::Avax => "AVAX",
        }
    }

    /// Slug of the asset page on the market-data site.
    pub fn slug(&self) -> &'static str {
        match self {
            Token::Btc => "bitcoin",
            Token::Eth => "ethereum",
            Token::Avax => "avalanche",
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl FromStr for Token {
    type Err = NameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "BTC" => Ok(Token::Btc),
            "ETH" => Ok(Token::Eth),
            "AVAX" => Ok(Token::Avax),
            _ => Err(NameError::UnsupportedToken(s.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Direction
// ---------------------------------------------------------------------------

/// Leg of an instrument pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    /// Call leg, strike above the current price.
    High,
    /// Put leg, strike below the current price.
    Low,
}

impl Direction {
    /// Single-letter marker embedded in instrument names.
    pub fn marker(&self) -> &'static str {
        match self {
            Direction::High => "H",
            Direction::Low => "L",
        }
    }

    /// Value of the `--iscall` flag of `deployNPToken`.
    pub fn is_call_flag(&self) -> &'static str {
        match self {
            Direction::High => "1",
            Direction::Low => "0",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::High => write!(f, "call"),
            Direction::Low => write!(f, "put"),
        }
    }
}

// ---------------------------------------------------------------------------
// Round label
// ---------------------------------------------------------------------------

/// Four-digit `YYMM` label shared by every instrument of a round.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RoundLabel(String);

impl RoundLabel {
    /// Label for the month containing `date` (2022-05-17 -> `2205`).
    pub fn from_date(date: NaiveDate) -> Self {
        Self(date.format("%y%m").to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoundLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for RoundLabel {
    type Err = NameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() == 4 && s.bytes().all(|b| b.is_ascii_digit()) {
            Ok(Self(s.to_string()))
        } else {
            Err(NameError::InvalidRound(s.to_string()))
        }
    }
}

impl TryFrom<String> for RoundLabel {
    type Error = NameError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<RoundLabel> for String {
    fn from(label: RoundLabel) -> Self {
        label.0
    }
}

// ---------------------------------------------------------------------------
// Instrument names
// ---------------------------------------------------------------------------

/// Render a strike the way the deployment task echoes it back:
/// at least one fractional digit, no padding zeros (`55000.0`, `49830.25`).
pub fn format_strike(strike: Decimal) -> String {
    let normalized = strike.normalize();
    if normalized.scale() == 0 {
        format!("{normalized}.0")
    } else {
        normalized.to_string()
    }
}

/// Composite identifier `{symbol}_{strike}_{H|L}_{round}`.
///
/// A name read from an address book keeps its key verbatim: `BTC_24000_L_2112`
/// and `BTC_24000.0_L_2112` parse to the same strike but are different keys,
/// and only the recorded one resolves.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InstrumentName {
    pub token: Token,
    pub strike: Decimal,
    pub direction: Direction,
    pub round: RoundLabel,
    key: String,
}

impl InstrumentName {
    pub fn new(token: Token, strike: Decimal, direction: Direction, round: RoundLabel) -> Self {
        let key = format!(
            "{token}_{}_{}_{round}",
            format_strike(strike),
            direction.marker()
        );
        Self {
            token,
            strike,
            direction,
            round,
            key,
        }
    }

    /// Address-book key of this instrument.
    pub fn as_str(&self) -> &str {
        &self.key
    }

    /// Whether this instrument belongs to the given token, round and leg.
    pub fn matches(&self, token: Token, round: &RoundLabel, direction: Direction) -> bool {
        self.token == token && &self.round == round && self.direction == direction
    }
}

impl fmt::Display for InstrumentName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key)
    }
}

impl FromStr for InstrumentName {
    type Err = NameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split('_').collect();
        let [token, strike, marker, round] = parts.as_slice() else {
            return Err(NameError::InvalidInstrument(s.to_string()));
        };

        let direction = match *marker {
            "H" => Direction::High,
            "L" => Direction::Low,
            _ => return Err(NameError::InvalidInstrument(s.to_string())),
        };
        let strike = Decimal::from_str(strike)
            .map_err(|_| NameError::InvalidInstrument(s.to_string()))?;

        Ok(Self {
            token: token.parse()?,
            strike,
            direction,
            round: round.parse()?,
            key: s.to_string(),
        })
    }
}

/// Call and put instruments deployed together in one round.
///
/// Returned by the token stage and handed to the pool and farming stages
/// so they operate on exactly the names that were deployed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstrumentPair {
    pub call: InstrumentName,
    pub put: InstrumentName,
}

impl InstrumentPair {
    pub fn token(&self) -> Token {
        self.call.token
    }

    pub fn round(&self) -> &RoundLabel {
        &self.call.round
    }

    /// Both legs, call first.
    pub fn legs(&self) -> [&InstrumentName; 2] {
        [&self.call, &self.put]
    }
}

impl fmt::Display for InstrumentPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} / {}", self.call, self.put)
    }
}

// ---------------------------------------------------------------------------
// Prices
// ---------------------------------------------------------------------------

/// USD quote for an underlying token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenPrice {
    pub token: Token,
    pub price: Decimal,
}

impl fmt::Display for TokenPrice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ${}", self.token, self.price)
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Failures to interpret a name produced outside this crate.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NameError {
    #[error("Unsupported token: {0}")]
    UnsupportedToken(String),

    #[error("Invalid round label (expected YYMM): {0}")]
    InvalidRound(String),

    #[error("Invalid instrument name: {0}")]
    InvalidInstrument(String),
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
