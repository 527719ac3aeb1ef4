//! Typed events handed to downstream consumers.
//!
//! This crate is a transparent, ordered conduit: update-ids and price
//! levels pass through exactly as the exchange produced them, never
//! reordered or deduplicated. The downstream book applier decides ordering
//! from the update-ids.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// One `[price, size]` level, kept as the exchange's decimal strings so no
/// precision is lost on the way through. A size of zero means the level is
/// removed; interpreting that is the downstream applier's job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceLevel {
    pub price: String,
    pub size: String,
}

impl PriceLevel {
    pub fn new(price: impl Into<String>, size: impl Into<String>) -> Self {
        Self {
            price: price.into(),
            size: size.into(),
        }
    }
}

/// Render a wire scalar (string or number) as its decimal string.
pub(crate) fn scalar_string(value: &Value) -> Result<String, String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        // With arbitrary_precision enabled the number keeps its source text.
        Value::Number(n) => Ok(n.to_string()),
        other => Err(format!("expected string or number, got {other}")),
    }
}

impl<'de> Deserialize<'de> for PriceLevel {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw: Vec<Value> = Vec::deserialize(deserializer)?;
        if raw.len() < 2 {
            return Err(serde::de::Error::custom(format!(
                "price level needs [price, size], got {} elements",
                raw.len()
            )));
        }
        let price = scalar_string(&raw[0]).map_err(serde::de::Error::custom)?;
        let size = scalar_string(&raw[1]).map_err(serde::de::Error::custom)?;
        Ok(PriceLevel { price, size })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TradeSide {
    Buy,
    Sell,
}

/// Order book event stream for one feed.
///
/// `Snapshot` carries the full book, `Diff` carries deltas only, `Trade`
/// one executed trade. `update_id` is the exchange's own sequence value
/// (`ts` for stream snapshots, `lastUpdateId` for REST books, `t` for
/// diffs).
#[derive(Debug, Clone, PartialEq)]
pub enum OrderBookEvent {
    Snapshot {
        trading_pair: String,
        update_id: u64,
        bids: Vec<PriceLevel>,
        asks: Vec<PriceLevel>,
        timestamp_ms: i64,
    },
    Diff {
        trading_pair: String,
        update_id: u64,
        bids: Vec<PriceLevel>,
        asks: Vec<PriceLevel>,
        timestamp_ms: i64,
    },
    Trade {
        trading_pair: String,
        trade_id: u64,
        side: TradeSide,
        price: String,
        amount: String,
        timestamp_ms: i64,
    },
}

impl OrderBookEvent {
    pub fn trading_pair(&self) -> &str {
        match self {
            OrderBookEvent::Snapshot { trading_pair, .. }
            | OrderBookEvent::Diff { trading_pair, .. }
            | OrderBookEvent::Trade { trading_pair, .. } => trading_pair,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccountEventKind {
    OrderUpdate,
    BalanceUpdate,
}

/// Private-stream event, classified by kind but otherwise passed through
/// verbatim.
#[derive(Debug, Clone, PartialEq)]
pub struct AccountEvent {
    pub kind: AccountEventKind,
    pub payload: Value,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn level_deserializes_from_strings() {
        let level: PriceLevel = serde_json::from_value(json!(["100.0", "1.5"])).unwrap();
        assert_eq!(level, PriceLevel::new("100.0", "1.5"));
    }

    #[test]
    fn level_keeps_numeric_wire_text_verbatim() {
        let level: PriceLevel = serde_json::from_str("[100.10, 0]").unwrap();
        assert_eq!(level.price, "100.10");
        assert_eq!(level.size, "0");
    }

    #[test]
    fn level_rejects_short_arrays() {
        assert!(serde_json::from_value::<PriceLevel>(json!(["100.0"])).is_err());
        assert!(serde_json::from_value::<PriceLevel>(json!({"p": "1"})).is_err());
    }
}
