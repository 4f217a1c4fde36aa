// src/core/ledger.rs
use crate::config::StrategyConfig;
use crate::storage::HistorySink;
use crate::types::{Position, PositionId, TradeKind, TradeRecord, Wallet};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LedgerError {
    #[error("insufficient funds: requested {requested} JPY, available {available} JPY")]
    InsufficientFunds {
        requested: Decimal,
        available: Decimal,
    },

    #[error("position ladder is full ({max} open positions)")]
    LadderFull { max: usize },

    #[error("position {0} is not open")]
    UnknownPosition(PositionId),

    #[error("fill price must be positive, got {0}")]
    InvalidPrice(Decimal),

    #[error("fill at {price} JPY is out of representable range")]
    Overflow { price: Decimal },
}

/// Wallet, open-position ladder and trade history of one simulated run.
///
/// Every mutation goes through `open_position` / `close_position`, each of which
/// appends a [`TradeRecord`] and forwards it to the history sink.
pub struct Ledger {
    wallet: Wallet,
    positions: BTreeMap<PositionId, Position>,
    history: Vec<TradeRecord>,
    sink: Box<dyn HistorySink>,
    spread: Decimal,
    max_position_count: usize,
    next_id: u64,
}

impl Ledger {
    pub fn new(config: &StrategyConfig, sink: Box<dyn HistorySink>) -> Self {
        Self {
            wallet: Wallet {
                quote_asset: config.initial_capital,
                ..Wallet::default()
            },
            positions: BTreeMap::new(),
            history: Vec::new(),
            sink,
            spread: config.spread,
            max_position_count: config.max_position_count,
            next_id: 1,
        }
    }

    pub fn wallet(&self) -> &Wallet {
        &self.wallet
    }

    pub fn positions(&self) -> impl Iterator<Item = &Position> {
        self.positions.values()
    }

    pub fn position(&self, id: PositionId) -> Option<&Position> {
        self.positions.get(&id)
    }

    pub fn history(&self) -> &[TradeRecord] {
        &self.history
    }

    pub fn open_position_count(&self) -> usize {
        self.positions.len()
    }

    pub fn max_position_count(&self) -> usize {
        self.max_position_count
    }

    pub fn lowest_entry_price(&self) -> Option<Decimal> {
        self.positions.values().map(|p| p.entry_price).min()
    }

    /// Saturates at `Decimal::MAX` for absurd market prices.
    pub fn net_asset_value(&self, market_price: Decimal) -> Decimal {
        self.wallet
            .quote_asset
            .saturating_add(self.wallet.base_asset.saturating_mul(market_price))
    }

    /// Buys `quote_amount` JPY worth of BTC at `price` plus spread.
    /// Leaves the ledger untouched on error.
    pub fn open_position(
        &mut self,
        price: Decimal,
        quote_amount: Decimal,
        at: DateTime<Utc>,
    ) -> Result<Position, LedgerError> {
        if price <= Decimal::ZERO {
            return Err(LedgerError::InvalidPrice(price));
        }
        if self.positions.len() >= self.max_position_count {
            return Err(LedgerError::LadderFull {
                max: self.max_position_count,
            });
        }
        if quote_amount <= Decimal::ZERO || quote_amount > self.wallet.quote_asset {
            return Err(LedgerError::InsufficientFunds {
                requested: quote_amount,
                available: self.wallet.quote_asset,
            });
        }

        let overflow = || LedgerError::Overflow { price };
        let effective_price = price
            .checked_mul(Decimal::ONE + self.spread)
            .ok_or_else(overflow)?;
        let size = quote_amount
            .checked_div(effective_price)
            .ok_or_else(overflow)?;
        let base_asset = self
            .wallet
            .base_asset
            .checked_add(size)
            .ok_or_else(overflow)?;

        let position = Position {
            id: PositionId(self.next_id),
            opened_at: at,
            entry_price: price,
            size,
        };
        self.next_id += 1;

        self.wallet.quote_asset -= quote_amount;
        self.wallet.base_asset = base_asset;
        self.positions.insert(position.id, position.clone());

        info!(
            "Buy {}: {} BTC at {} JPY (spent {} JPY)",
            position.id, size, effective_price, quote_amount
        );

        self.record(TradeRecord {
            timestamp: at,
            price: effective_price,
            size,
            kind: TradeKind::Open,
            realized_profit: Decimal::ZERO,
        });

        Ok(position)
    }

    /// Sells the whole position at `current_price` minus spread and realizes its profit.
    pub fn close_position(
        &mut self,
        id: PositionId,
        current_price: Decimal,
        at: DateTime<Utc>,
    ) -> Result<TradeRecord, LedgerError> {
        let position = self
            .positions
            .get(&id)
            .ok_or(LedgerError::UnknownPosition(id))?;

        let overflow = || LedgerError::Overflow {
            price: current_price,
        };
        let effective_price = current_price
            .checked_mul(Decimal::ONE - self.spread)
            .ok_or_else(overflow)?;
        let proceeds = effective_price
            .checked_mul(position.size)
            .ok_or_else(overflow)?;
        let profit = effective_price
            .checked_sub(position.entry_price)
            .and_then(|gain| gain.checked_mul(position.size))
            .ok_or_else(overflow)?;
        let quote_asset = self
            .wallet
            .quote_asset
            .checked_add(proceeds)
            .ok_or_else(overflow)?;
        let realized_profit = self
            .wallet
            .realized_profit
            .checked_add(profit)
            .ok_or_else(overflow)?;

        let Some(position) = self.positions.remove(&id) else {
            return Err(LedgerError::UnknownPosition(id));
        };
        self.wallet.quote_asset = quote_asset;
        self.wallet.base_asset -= position.size;
        self.wallet.realized_profit = realized_profit;

        info!(
            "Take profit {}: market at {} JPY, sold {} BTC (profit {} JPY)",
            id, current_price, position.size, profit
        );

        let record = TradeRecord {
            timestamp: at,
            price: effective_price,
            size: position.size,
            kind: TradeKind::Close,
            realized_profit: profit,
        };
        self.record(record.clone());
        Ok(record)
    }

    fn record(&mut self, record: TradeRecord) {
        if let Err(e) = self.sink.append(&record) {
            warn!("Failed to persist trade record: {:#}", e);
        }
        self.history.push(record);
    }

    pub fn flush(&mut self) {
        if let Err(e) = self.sink.flush() {
            warn!("Failed to flush trade history: {:#}", e);
        }
    }

    /// Status block written after every tick that changed the ledger.
    pub fn log_wallet(&self, market_price: Decimal) {
        info!("\t------------------");
        info!(
            "\tBTC: {} JPY: {} Positions: {}",
            self.wallet.base_asset,
            self.wallet.quote_asset,
            self.positions.len()
        );
        info!(
            "\tNet asset value: {} JPY (realized profit: {} JPY)",
            self.net_asset_value(market_price).round_dp(2),
            self.wallet.realized_profit.round_dp(2)
        );
        info!("\t------------------");
    }
}
