// src/storage/csv_sink.rs
use crate::storage::HistorySink;
use crate::types::TradeRecord;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::info;

/// One line of the history file. Column names are what downstream tooling expects.
#[derive(Debug, Serialize)]
struct HistoryRow {
    trade_time: String,
    btc_jpy: Decimal,
    position_size: Decimal,
    order_type: u8,
    profit: Decimal,
}

impl From<&TradeRecord> for HistoryRow {
    fn from(record: &TradeRecord) -> Self {
        Self {
            trade_time: record.timestamp.to_rfc3339(),
            btc_jpy: record.price,
            position_size: record.size,
            order_type: record.kind.code(),
            profit: record.realized_profit,
        }
    }
}

/// Appends every trade to a CSV file, flushing after each row so a crash
/// loses nothing already recorded.
pub struct CsvHistorySink {
    writer: csv::Writer<File>,
    path: PathBuf,
}

impl CsvHistorySink {
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let writer = csv::Writer::from_path(&path)
            .with_context(|| format!("Failed to create history file {}", path.display()))?;
        info!("Trade history -> {}", path.display());
        Ok(Self { writer, path })
    }

    /// `<dir>/log_<run start>.csv`
    pub fn for_run(dir: impl AsRef<Path>, started_at: DateTime<Utc>) -> Result<Self> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create history dir {}", dir.display()))?;
        let file_name = format!("log_{}.csv", started_at.format("%Y%m%d_%H%M%S"));
        Self::create(dir.join(file_name))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl HistorySink for CsvHistorySink {
    fn append(&mut self, record: &TradeRecord) -> Result<()> {
        self.writer.serialize(HistoryRow::from(record))?;
        self.writer.flush()?;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}
