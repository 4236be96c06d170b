//! Deployment parameter derivation.
//!
//! Pure functions from a quote, an offset, a profile and the current time
//! to strikes, round label, deadlines and task arguments. No I/O here.

use chrono::{DateTime, Duration, TimeZone};
use rust_decimal::Decimal;

use crate::config::Profile;
use crate::invoker::TaskArgs;
use crate::types::{format_strike, Direction, InstrumentName, InstrumentPair, RoundLabel, TokenPrice};

/// Invalid derivation inputs.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParamError {
    #[error("Percentage must be in [0, 1), got {0}")]
    Percentage(Decimal),

    #[error("Price must not be negative, got {0}")]
    NegativePrice(Decimal),

    #[error("Strike for price {0} is out of range")]
    Overflow(Decimal),
}

/// Call and put strikes `price * (1 ± pct)`, rounded to cents.
pub fn strikes(price: Decimal, percentage: Decimal) -> Result<(Decimal, Decimal), ParamError> {
    if percentage < Decimal::ZERO || percentage >= Decimal::ONE {
        return Err(ParamError::Percentage(percentage));
    }
    if price < Decimal::ZERO {
        return Err(ParamError::NegativePrice(price));
    }
    let call = price
        .checked_mul(Decimal::ONE + percentage)
        .ok_or(ParamError::Overflow(price))?;
    let put = price
        .checked_mul(Decimal::ONE - percentage)
        .ok_or(ParamError::Overflow(price))?;
    Ok((call.round_dp(2), put.round_dp(2)))
}

/// Round label of the month `now` falls in, in `now`'s own timezone.
pub fn round_label<Tz: TimeZone>(now: &DateTime<Tz>) -> RoundLabel {
    RoundLabel::from_date(now.date_naive())
}

/// Unix timestamp `days` after `now`.
pub fn days_after<Tz: TimeZone>(now: &DateTime<Tz>, days: i64) -> i64 {
    (now.clone() + Duration::days(days)).timestamp()
}

/// Everything needed to deploy one call/put token pair.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenParams {
    pub quote: TokenPrice,
    pub percentage: Decimal,
    pub call_strike: Decimal,
    pub put_strike: Decimal,
    pub round: RoundLabel,
    pub deadline: i64,
    pub settle_time: i64,
    pub decimals: u32,
}

impl TokenParams {
    pub fn derive<Tz: TimeZone>(
        quote: TokenPrice,
        percentage: Decimal,
        profile: &Profile,
        now: &DateTime<Tz>,
    ) -> Result<Self, ParamError> {
        let (call_strike, put_strike) = strikes(quote.price, percentage)?;
        Ok(Self {
            quote,
            percentage,
            call_strike,
            put_strike,
            round: round_label(now),
            deadline: days_after(now, profile.deadline_days),
            settle_time: days_after(now, profile.settle_days),
            decimals: profile.decimals,
        })
    }

    pub fn strike(&self, direction: Direction) -> Decimal {
        match direction {
            Direction::High => self.call_strike,
            Direction::Low => self.put_strike,
        }
    }

    pub fn instrument(&self, direction: Direction) -> InstrumentName {
        InstrumentName::new(
            self.quote.token,
            self.strike(direction),
            direction,
            self.round.clone(),
        )
    }

    /// Names the token task will register for this pair.
    pub fn instrument_pair(&self) -> InstrumentPair {
        InstrumentPair {
            call: self.instrument(Direction::High),
            put: self.instrument(Direction::Low),
        }
    }

    /// Arguments of `deployNPToken` for one leg.
    pub fn token_task_args(&self, direction: Direction) -> TaskArgs {
        TaskArgs::new()
            .flag("name", self.quote.token.symbol())
            .flag("k", format_strike(self.strike(direction)))
            .flag("decimals", self.decimals)
            .flag("iscall", direction.is_call_flag())
            .flag("round", &self.round)
            .flag("deadline", self.deadline)
            .flag("settletime", self.settle_time)
    }
}

/// Arguments of `deployNPPool` for one instrument.
pub fn pool_task_args(instrument: &InstrumentName, stablecoin: &str, deadline: i64, fee: u32) -> TaskArgs {
    TaskArgs::new()
        .flag("name", instrument)
        .flag("stablecoin", stablecoin)
        .flag("deadline", deadline)
        .flag("fee", fee)
}

/// Arguments of `addFarmingPool` for one swap pool.
pub fn farming_task_args(instrument: &InstrumentName, pool_address: &str, reward: Decimal) -> TaskArgs {
    TaskArgs::new()
        .flag("name", instrument)
        .flag("address", pool_address)
        .flag("reward", reward.normalize())
        .flag("bonus", 0)
        .flag("doublereward", 0)
}
