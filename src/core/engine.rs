// src/core/engine.rs
use crate::connectors::messages::{parse_trade_message, TickError};
use crate::core::ledger::Ledger;
use crate::strategies::traits::Strategy;
use crate::types::{Market, Signal, Tick};
use anyhow::Result;
use chrono::Utc;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("trade feed closed")]
    TransportClosed,
}

/// Single-task tick loop. Owns the market snapshot and the ledger; each feed
/// message is fully evaluated before the next one is read.
pub struct TradingEngine<S> {
    strategy: S,
    ledger: Ledger,
    market: Market,
    feed_receiver: mpsc::Receiver<String>,
    shutdown: watch::Receiver<bool>,
}

impl<S> TradingEngine<S>
where
    S: Strategy,
{
    pub fn new(
        strategy: S,
        ledger: Ledger,
        feed_receiver: mpsc::Receiver<String>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            strategy,
            ledger,
            market: Market::default(),
            feed_receiver,
            shutdown,
        }
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn market(&self) -> &Market {
        &self.market
    }

    /// Runs until the shutdown signal fires (`Ok`) or the feed closes
    /// (`EngineError::TransportClosed`). The history sink is flushed either way.
    pub async fn run(&mut self) -> Result<()> {
        info!("Engine starting with strategy '{}'", self.strategy.name());

        let outcome = loop {
            if *self.shutdown.borrow() {
                break Ok(());
            }
            tokio::select! {
                changed = self.shutdown.changed() => {
                    if changed.is_err() || *self.shutdown.borrow() {
                        break Ok(());
                    }
                }
                message = self.feed_receiver.recv() => match message {
                    Some(text) => {
                        if let Err(e) = self.on_message(&text) {
                            debug!("Discarded feed message: {} ({})", e, text);
                        }
                    }
                    None => {
                        error!("Trade feed closed, stopping engine");
                        break Err(EngineError::TransportClosed.into());
                    }
                },
            }
        };

        self.ledger.flush();
        self.log_summary();
        outcome
    }

    /// Normalizes one raw frame and evaluates it. Malformed frames leave all
    /// state untouched.
    pub fn on_message(&mut self, text: &str) -> Result<(), TickError> {
        let tick = parse_trade_message(text, Utc::now())?;
        self.on_tick(tick);
        Ok(())
    }

    /// Updates the market, then applies the entry signal and the exit signals.
    pub fn on_tick(&mut self, tick: Tick) {
        self.market.update(&tick);

        let mut changed = false;
        let entry = self.strategy.entry_signal(&self.market, &self.ledger);
        changed |= self.handle_signal(entry, &tick);

        for signal in self.strategy.exit_signals(&self.market, &self.ledger) {
            changed |= self.handle_signal(signal, &tick);
        }

        if changed {
            self.ledger.log_wallet(self.market.price);
        }
    }

    /// Returns true when the ledger was mutated.
    fn handle_signal(&mut self, signal: Signal, tick: &Tick) -> bool {
        match signal {
            Signal::Buy { quote_amount } => {
                match self
                    .ledger
                    .open_position(tick.price, quote_amount, tick.observed_at)
                {
                    Ok(_) => true,
                    Err(e) => {
                        debug!("Buy skipped at {}: {}", tick.price, e);
                        false
                    }
                }
            }
            Signal::Sell(id) => match self.ledger.close_position(id, tick.price, tick.observed_at) {
                Ok(_) => true,
                Err(e) => {
                    warn!("Sell skipped for {}: {}", id, e);
                    false
                }
            },
            Signal::Hold => false,
        }
    }

    fn log_summary(&self) {
        let wallet = self.ledger.wallet();
        info!(
            "Engine stopped: {} trades, {} open positions, realized profit {} JPY, NAV {} JPY",
            self.ledger.history().len(),
            self.ledger.open_position_count(),
            wallet.realized_profit.round_dp(2),
            self.ledger.net_asset_value(self.market.price).round_dp(2)
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StrategyConfig;
    use crate::storage::MemoryHistorySink;
    use crate::strategies::grid::GridStrategy;
    use crate::types::TradeKind;
    use rust_decimal::Decimal;
    use std::str::FromStr;

    fn d(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn engine(
        max: usize,
    ) -> (
        TradingEngine<GridStrategy>,
        mpsc::Sender<String>,
        watch::Sender<bool>,
        MemoryHistorySink,
    ) {
        let config = StrategyConfig {
            max_position_count: max,
            ..Default::default()
        };
        let sink = MemoryHistorySink::new();
        let (feed_tx, feed_rx) = mpsc::channel(16);
        let (stop_tx, stop_rx) = watch::channel(false);
        let engine = TradingEngine::new(
            GridStrategy::new(&config),
            Ledger::new(&config, Box::new(sink.clone())),
            feed_rx,
            stop_rx,
        );
        (engine, feed_tx, stop_tx, sink)
    }

    fn frame(price: &str) -> String {
        format!(r#"["1","btc_jpy","{}","0.1","buy"]"#, price)
    }

    #[test]
    fn malformed_message_changes_nothing() {
        let (mut engine, _tx, _stop, sink) = engine(10);
        engine.on_message(&frame("100")).unwrap();
        let market = engine.market().clone();
        let wallet = engine.ledger().wallet().clone();

        assert!(engine.on_message(r#"["1","btc_jpy","oops"]"#).is_err());

        assert_eq!(engine.market(), &market);
        assert_eq!(engine.ledger().wallet(), &wallet);
        assert_eq!(sink.records().len(), 1);
    }

    #[test]
    fn new_position_is_not_closed_on_the_same_tick() {
        let (mut engine, _tx, _stop, sink) = engine(10);
        engine.on_message(&frame("100")).unwrap();
        assert_eq!(engine.ledger().open_position_count(), 1);
        assert_eq!(sink.records().len(), 1);
        assert_eq!(sink.records()[0].kind, TradeKind::Open);
    }

    #[test]
    fn exit_closes_all_qualifying_positions_in_one_tick() {
        let (mut engine, _tx, _stop, sink) = engine(10);
        engine.on_message(&frame("100")).unwrap();
        engine.on_message(&frame("94")).unwrap();
        assert_eq!(engine.ledger().open_position_count(), 2);

        engine.on_message(&frame("120")).unwrap();

        assert_eq!(engine.ledger().open_position_count(), 0);
        assert_eq!(engine.ledger().wallet().base_asset, Decimal::ZERO);
        let kinds: Vec<TradeKind> = sink.records().iter().map(|r| r.kind).collect();
        assert_eq!(
            kinds,
            vec![
                TradeKind::Open,
                TradeKind::Open,
                TradeKind::Close,
                TradeKind::Close
            ]
        );
    }

    #[test]
    fn repeated_tick_closes_nothing_more() {
        let (mut engine, _tx, _stop, _sink) = engine(10);
        engine.on_message(&frame("100")).unwrap();
        engine.on_message(&frame("110")).unwrap();
        let after_first = engine.ledger().history().len();

        // Empty ladder after the close, so the same price triggers a fresh buy
        // and nothing else.
        engine.on_message(&frame("110")).unwrap();
        let history = engine.ledger().history();
        assert_eq!(history.len(), after_first + 1);
        assert_eq!(history[history.len() - 1].kind, TradeKind::Open);
    }

    #[test]
    fn tiny_price_is_skipped_and_loop_continues() {
        let (mut engine, _tx, _stop, sink) = engine(10);

        engine
            .on_message(&frame("0.0000000000000000000000001"))
            .unwrap();
        assert_eq!(engine.ledger().open_position_count(), 0);
        assert!(sink.records().is_empty());

        engine.on_message(&frame("100")).unwrap();
        assert_eq!(engine.ledger().open_position_count(), 1);
    }

    #[test]
    fn huge_price_never_panics() {
        let (mut engine, _tx, _stop, _sink) = engine(10);

        engine
            .on_message(&frame("79000000000000000000000000000"))
            .unwrap();
        engine.on_message(&frame("100")).unwrap();
        engine
            .on_message(&frame("79228162514264337593543950335"))
            .unwrap();

        let ledger = engine.ledger();
        assert!(ledger.open_position_count() <= 10);
        assert!(ledger.wallet().quote_asset >= Decimal::ZERO);
        assert!(ledger.wallet().base_asset >= Decimal::ZERO);
    }

    #[tokio::test]
    async fn run_stops_on_shutdown_signal() {
        let (mut engine, tx, stop, _sink) = engine(10);
        tx.send(frame("100")).await.unwrap();

        let handle = tokio::spawn(async move {
            let result = engine.run().await;
            (result.is_ok(), engine.ledger().open_position_count())
        });

        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        stop.send(true).unwrap();

        let (ok, open) = handle.await.unwrap();
        assert!(ok);
        assert_eq!(open, 1);
        drop(tx);
    }

    #[tokio::test]
    async fn run_fails_when_feed_closes() {
        let (mut engine, tx, _stop, _sink) = engine(10);
        tx.send(frame("100")).await.unwrap();
        tx.send("garbage".to_string()).await.unwrap();
        tx.send(frame("94")).await.unwrap();
        drop(tx);

        let err = engine.run().await.unwrap_err();

        assert!(matches!(
            err.downcast_ref::<EngineError>(),
            Some(EngineError::TransportClosed)
        ));
        assert_eq!(engine.ledger().open_position_count(), 2);
        assert_eq!(engine.market().price, d("94"));
    }
}
