//! Grid strategy: buy every `grid_range` step below the lowest open entry,
//! sell each position on its own once it gains more than `take_profit_range`.

use crate::config::StrategyConfig;
use crate::core::ledger::Ledger;
use crate::strategies::traits::Strategy;
use crate::types::{Market, Signal};
use rust_decimal::Decimal;

pub struct GridStrategy {
    grid_range: Decimal,
    take_profit_range: Decimal,
}

impl GridStrategy {
    pub fn new(config: &StrategyConfig) -> Self {
        Self {
            grid_range: config.grid_range,
            take_profit_range: config.take_profit_range,
        }
    }
}

impl Strategy for GridStrategy {
    fn name(&self) -> String {
        "grid".to_string()
    }

    fn entry_signal(&self, market: &Market, ledger: &Ledger) -> Signal {
        let open = ledger.open_position_count();
        let max = ledger.max_position_count();
        if open >= max {
            return Signal::Hold;
        }

        let should_buy = match ledger.lowest_entry_price() {
            None => true,
            Some(lowest) => lowest
                .checked_mul(Decimal::ONE - self.grid_range)
                .is_some_and(|trigger| trigger >= market.price),
        };
        if !should_buy {
            return Signal::Hold;
        }

        // Free capital is split across the slots that are still unopened.
        let free_slots = Decimal::from(max - open);
        Signal::Buy {
            quote_amount: ledger.wallet().quote_asset / free_slots,
        }
    }

    fn exit_signals(&self, market: &Market, ledger: &Ledger) -> Vec<Signal> {
        let threshold = Decimal::ONE + self.take_profit_range;
        ledger
            .positions()
            // An entry too large to scale can never be exceeded.
            .filter(|p| {
                p.entry_price
                    .checked_mul(threshold)
                    .is_some_and(|target| target < market.price)
            })
            .map(|p| Signal::Sell(p.id))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryHistorySink;
    use chrono::Utc;
    use std::str::FromStr;

    fn d(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn setup(max: usize) -> (GridStrategy, Ledger) {
        let config = StrategyConfig {
            grid_range: d("0.05"),
            take_profit_range: d("0.05"),
            max_position_count: max,
            initial_capital: d("1000000"),
            spread: Decimal::ZERO,
        };
        (
            GridStrategy::new(&config),
            Ledger::new(&config, Box::new(MemoryHistorySink::new())),
        )
    }

    fn market(price: &str) -> Market {
        Market {
            price: d(price),
            last_update: Some(Utc::now()),
        }
    }

    #[test]
    fn buys_on_empty_ladder_with_even_share() {
        let (strategy, ledger) = setup(10);
        assert_eq!(
            strategy.entry_signal(&market("100"), &ledger),
            Signal::Buy {
                quote_amount: d("100000")
            }
        );
    }

    #[test]
    fn buys_only_after_a_full_grid_step() {
        let (strategy, mut ledger) = setup(10);
        ledger
            .open_position(d("100"), d("100000"), Utc::now())
            .unwrap();

        assert_eq!(strategy.entry_signal(&market("95.01"), &ledger), Signal::Hold);
        // Boundary is inclusive.
        assert!(matches!(
            strategy.entry_signal(&market("95"), &ledger),
            Signal::Buy { .. }
        ));
    }

    #[test]
    fn later_buys_get_larger_share_of_remaining_capital() {
        let (strategy, mut ledger) = setup(10);
        ledger
            .open_position(d("100"), d("100000"), Utc::now())
            .unwrap();

        // 900000 left over 9 free slots.
        assert_eq!(
            strategy.entry_signal(&market("94"), &ledger),
            Signal::Buy {
                quote_amount: d("100000")
            }
        );

        ledger
            .open_position(d("94"), d("300000"), Utc::now())
            .unwrap();
        // 600000 left over 8 free slots.
        assert_eq!(
            strategy.entry_signal(&market("89"), &ledger),
            Signal::Buy {
                quote_amount: d("75000")
            }
        );
    }

    #[test]
    fn holds_when_ladder_is_full() {
        let (strategy, mut ledger) = setup(1);
        ledger
            .open_position(d("100"), d("1000"), Utc::now())
            .unwrap();
        assert_eq!(strategy.entry_signal(&market("10"), &ledger), Signal::Hold);
    }

    #[test]
    fn exits_every_qualifying_position() {
        let (strategy, mut ledger) = setup(10);
        let now = Utc::now();
        let a = ledger.open_position(d("100"), d("1000"), now).unwrap();
        let b = ledger.open_position(d("90"), d("1000"), now).unwrap();
        ledger.open_position(d("120"), d("1000"), now).unwrap();

        let signals = strategy.exit_signals(&market("106"), &ledger);
        assert_eq!(signals, vec![Signal::Sell(a.id), Signal::Sell(b.id)]);
    }

    #[test]
    fn exit_signals_are_empty_once_applied() {
        let (strategy, mut ledger) = setup(10);
        let now = Utc::now();
        ledger.open_position(d("100"), d("1000"), now).unwrap();
        ledger.open_position(d("94"), d("1000"), now).unwrap();
        ledger.open_position(d("120"), d("1000"), now).unwrap();
        let at = market("110");

        for signal in strategy.exit_signals(&at, &ledger) {
            if let Signal::Sell(id) = signal {
                ledger.close_position(id, at.price, now).unwrap();
            }
        }

        assert_eq!(ledger.open_position_count(), 1);
        assert!(strategy.exit_signals(&at, &ledger).is_empty());
    }

    #[test]
    fn extreme_entry_prices_do_not_panic() {
        let (strategy, mut ledger) = setup(10);
        ledger
            .open_position(Decimal::MAX, d("1000"), Utc::now())
            .unwrap();

        assert!(strategy.exit_signals(&market("100"), &ledger).is_empty());
        assert_eq!(
            strategy.entry_signal(&market("100"), &ledger),
            Signal::Buy {
                quote_amount: d("999000") / Decimal::from(9)
            }
        );
    }

    #[test]
    fn exit_threshold_is_strict() {
        let (strategy, mut ledger) = setup(10);
        ledger
            .open_position(d("100"), d("1000"), Utc::now())
            .unwrap();
        assert!(strategy.exit_signals(&market("105"), &ledger).is_empty());
        assert!(strategy.exit_signals(&market("100"), &ledger).is_empty());
    }
}
