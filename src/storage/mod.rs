// src/storage/mod.rs
use crate::types::TradeRecord;
use anyhow::Result;
use std::sync::{Arc, Mutex};

pub mod csv_sink;

pub use csv_sink::CsvHistorySink;

/// Durable destination of the trade history. Called once per ledger mutation.
pub trait HistorySink: Send {
    fn append(&mut self, record: &TradeRecord) -> Result<()>;

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Keeps records in memory. Clones share the same buffer, so a test can hand
/// one clone to the ledger and inspect the other.
#[derive(Debug, Clone, Default)]
pub struct MemoryHistorySink {
    records: Arc<Mutex<Vec<TradeRecord>>>,
}

impl MemoryHistorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<TradeRecord> {
        match self.records.lock() {
            Ok(records) => records.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl HistorySink for MemoryHistorySink {
    fn append(&mut self, record: &TradeRecord) -> Result<()> {
        self.records
            .lock()
            .map_err(|_| anyhow::anyhow!("history buffer poisoned"))?
            .push(record.clone());
        Ok(())
    }
}
