// src/connectors/messages.rs
use crate::types::Tick;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::Value;
use std::str::FromStr;

/// Trade frame from the Coincheck `<pair>-trades` channel:
/// `[trade_id, pair, rate, amount, order_type, ...]`. Only the rate matters here.
const PRICE_INDEX: usize = 2;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TickError {
    #[error("malformed tick: invalid JSON ({0})")]
    InvalidJson(String),

    #[error("malformed tick: expected a JSON array")]
    NotAnArray,

    #[error("malformed tick: no price field")]
    MissingPrice,

    #[error("malformed tick: unparseable price {0}")]
    InvalidPrice(String),
}

#[derive(Debug, Serialize)]
pub struct SubscribeRequest<'a> {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub channel: &'a str,
}

impl<'a> SubscribeRequest<'a> {
    pub fn new(channel: &'a str) -> Self {
        Self {
            kind: "subscribe",
            channel,
        }
    }
}

/// Turns a raw feed frame into a [`Tick`] stamped with `observed_at`.
/// The price may arrive as a JSON string or number; it must be a finite,
/// positive decimal.
pub fn parse_trade_message(text: &str, observed_at: DateTime<Utc>) -> Result<Tick, TickError> {
    let frame: Value =
        serde_json::from_str(text).map_err(|e| TickError::InvalidJson(e.to_string()))?;
    let fields = frame.as_array().ok_or(TickError::NotAnArray)?;
    let raw = fields.get(PRICE_INDEX).ok_or(TickError::MissingPrice)?;

    let price = match raw {
        Value::String(s) => parse_price(s.trim()),
        Value::Number(n) => parse_price(&n.to_string()),
        _ => None,
    }
    .ok_or_else(|| TickError::InvalidPrice(raw.to_string()))?;

    if price <= Decimal::ZERO {
        return Err(TickError::InvalidPrice(raw.to_string()));
    }

    Ok(Tick { price, observed_at })
}

fn parse_price(s: &str) -> Option<Decimal> {
    Decimal::from_str(s)
        .or_else(|_| Decimal::from_scientific(s))
        .ok()
}
