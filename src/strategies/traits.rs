// src/strategies/traits.rs
use crate::core::ledger::Ledger;
use crate::types::{Market, Signal};

/// Decision logic evaluated once per tick. Strategies only read the ledger;
/// the engine applies the signals they return.
pub trait Strategy: Send + Sync {
    fn name(&self) -> String;

    /// Evaluated first on every tick.
    fn entry_signal(&self, market: &Market, ledger: &Ledger) -> Signal;

    /// Evaluated after the entry signal has been applied.
    fn exit_signals(&self, market: &Market, ledger: &Ledger) -> Vec<Signal>;
}
