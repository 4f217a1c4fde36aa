// src/types.rs
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::fmt;

/// One normalized price observation from the trade feed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tick {
    pub price: Decimal,
    pub observed_at: DateTime<Utc>,
}

/// Latest known market state. Only the tick loop writes to it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Market {
    pub price: Decimal,
    pub last_update: Option<DateTime<Utc>>,
}

impl Market {
    pub fn update(&mut self, tick: &Tick) {
        self.price = tick.price;
        self.last_update = Some(tick.observed_at);
    }
}

/// Monotonically increasing identifier handed out by the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PositionId(pub u64);

impl fmt::Display for PositionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    pub id: PositionId,
    pub opened_at: DateTime<Utc>,
    pub entry_price: Decimal, // Raw market price at the time of the buy
    pub size: Decimal,
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct Wallet {
    pub base_asset: Decimal,  // BTC
    pub quote_asset: Decimal, // JPY
    pub realized_profit: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TradeKind {
    Open,
    Close,
}

impl TradeKind {
    /// Numeric code used in the history file: 0 = buy, 1 = sell.
    pub fn code(self) -> u8 {
        match self {
            TradeKind::Open => 0,
            TradeKind::Close => 1,
        }
    }
}

/// Immutable entry of the trade history. `price` is the spread-adjusted fill price.
#[derive(Debug, Clone, PartialEq)]
pub struct TradeRecord {
    pub timestamp: DateTime<Utc>,
    pub price: Decimal,
    pub size: Decimal,
    pub kind: TradeKind,
    pub realized_profit: Decimal,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Signal {
    Buy { quote_amount: Decimal },
    Sell(PositionId),
    Hold,
}
