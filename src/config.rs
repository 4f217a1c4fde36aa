// src/config.rs

use config::{Config, Environment, File};
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::info;

#[derive(Debug, thiserror::Error)]
pub enum AppConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid configuration: {field} = {value} (expected {expected})")]
    Invalid {
        field: &'static str,
        value: String,
        expected: &'static str,
    },
}

/// Grid parameters. Fixed for the whole run once validated.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct StrategyConfig {
    /// Drop below the lowest open entry that triggers the next buy (0.05 = 5%).
    pub grid_range: Decimal,
    /// Gain over a position's entry that triggers its sale.
    pub take_profit_range: Decimal,
    pub max_position_count: usize,
    /// Starting JPY balance.
    pub initial_capital: Decimal,
    pub spread: Decimal,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            grid_range: Decimal::new(5, 2),
            take_profit_range: Decimal::new(5, 2),
            max_position_count: 10,
            initial_capital: Decimal::from(1_000_000),
            spread: Decimal::new(2, 3),
        }
    }
}

impl StrategyConfig {
    pub fn validate(&self) -> Result<(), AppConfigError> {
        let unit_open = |field, value: Decimal| {
            if value > Decimal::ZERO && value < Decimal::ONE {
                Ok(())
            } else {
                Err(invalid(field, value, "0 < x < 1"))
            }
        };
        unit_open("strategy.grid_range", self.grid_range)?;
        unit_open("strategy.take_profit_range", self.take_profit_range)?;

        if self.max_position_count == 0 {
            return Err(invalid("strategy.max_position_count", 0, "x > 0"));
        }
        if self.initial_capital <= Decimal::ZERO {
            return Err(invalid(
                "strategy.initial_capital",
                self.initial_capital,
                "x > 0",
            ));
        }
        if self.spread < Decimal::ZERO || self.spread >= Decimal::ONE {
            return Err(invalid("strategy.spread", self.spread, "0 <= x < 1"));
        }
        Ok(())
    }

    pub fn log_summary(&self) {
        info!("------------------");
        info!("Grid range:         {}", self.grid_range);
        info!("Take profit range:  {}", self.take_profit_range);
        info!("Max positions:      {}", self.max_position_count);
        info!("Initial capital:    {} JPY", self.initial_capital);
        info!("Spread:             {}", self.spread);
        info!("------------------");
    }
}

fn invalid(field: &'static str, value: impl ToString, expected: &'static str) -> AppConfigError {
    AppConfigError::Invalid {
        field,
        value: value.to_string(),
        expected,
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub ws_url: String,
    pub channel: String,
    /// Directory receiving the trade history CSV.
    pub history_dir: String,
    /// Capacity of the feed channel between the websocket task and the engine.
    pub feed_buffer: usize,
    pub strategy: StrategyConfig,
}

impl AppConfig {
    /// Defaults, then `Settings.toml` if present, then `APP_*` env vars
    /// (e.g. `APP_STRATEGY__GRID_RANGE=0.03`).
    pub fn new() -> Result<Self, AppConfigError> {
        Self::build(File::with_name("Settings").required(false))
    }

    pub fn build<S>(file: S) -> Result<Self, AppConfigError>
    where
        S: config::Source + Send + Sync + 'static,
    {
        let defaults = StrategyConfig::default();
        let builder = Config::builder()
            .set_default("ws_url", "wss://ws-api.coincheck.com/")?
            .set_default("channel", "btc_jpy-trades")?
            .set_default("history_dir", ".")?
            .set_default("feed_buffer", 1024)?
            .set_default("strategy.grid_range", defaults.grid_range.to_string())?
            .set_default(
                "strategy.take_profit_range",
                defaults.take_profit_range.to_string(),
            )?
            .set_default(
                "strategy.max_position_count",
                defaults.max_position_count as i64,
            )?
            .set_default(
                "strategy.initial_capital",
                defaults.initial_capital.to_string(),
            )?
            .set_default("strategy.spread", defaults.spread.to_string())?
            .add_source(file)
            .add_source(
                Environment::with_prefix("APP")
                    .prefix_separator("_")
                    .separator("__"),
            );

        let config: AppConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), AppConfigError> {
        if self.feed_buffer == 0 {
            return Err(invalid("feed_buffer", 0, "x > 0"));
        }
        self.strategy.validate()
    }
}
