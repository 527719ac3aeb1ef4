//! Raw wire shapes, validated once at decode time.
//!
//! Field names follow the exchange payloads: stream snapshots nest levels
//! under `tick.buys`/`tick.asks` with a `ts` sequence, diffs use `t`/`b`/`a`,
//! trades arrive batched under `data`, and the REST book uses
//! `lastUpdateId`/`bids`/`asks`.

use crate::events::{scalar_string, PriceLevel};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

fn de_decimal<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    scalar_string(&value).map_err(serde::de::Error::custom)
}

/// Full book delivered over the stream:
/// `{"channel":"market_btcusdt_simple_depth_step0","ts":...,"tick":{"buys":[..],"asks":[..]}}`
#[derive(Debug, Clone, Deserialize)]
pub struct StreamSnapshot {
    #[serde(default)]
    pub channel: Option<String>,
    #[serde(default)]
    pub symbol: Option<String>,
    pub ts: u64,
    pub tick: DepthTick,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DepthTick {
    #[serde(default)]
    pub buys: Vec<PriceLevel>,
    #[serde(default)]
    pub asks: Vec<PriceLevel>,
}

/// Incremental depth update: `{"t":5,"b":[["99","0"]],"a":[["101","3"]]}`.
/// `t` is both the sequence value and the millisecond timestamp.
#[derive(Debug, Clone, Deserialize)]
pub struct StreamDiff {
    #[serde(default)]
    pub symbol: Option<String>,
    #[serde(rename = "t")]
    pub seq: u64,
    #[serde(rename = "b", default)]
    pub bids: Vec<PriceLevel>,
    #[serde(rename = "a", default)]
    pub asks: Vec<PriceLevel>,
}

/// Trade batch: `{"symbol":"BTCUSDT","data":[{"t":...,"m":true,"p":"..","q":".."}]}`
#[derive(Debug, Clone, Deserialize)]
pub struct StreamTrades {
    #[serde(default)]
    pub symbol: Option<String>,
    pub data: Vec<TradeEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TradeEntry {
    /// Trade id, also the millisecond timestamp.
    #[serde(rename = "t")]
    pub id: u64,
    /// `true` marks a buy.
    #[serde(rename = "m")]
    pub is_buy: bool,
    #[serde(rename = "p", deserialize_with = "de_decimal")]
    pub price: String,
    #[serde(rename = "q", deserialize_with = "de_decimal")]
    pub amount: String,
}

/// REST full book response.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DepthResponse {
    pub last_update_id: u64,
    pub bids: Vec<PriceLevel>,
    pub asks: Vec<PriceLevel>,
}

/// Listen key create response: `{"data":{"listenKey":"<key>"}}`.
#[derive(Debug, Deserialize)]
pub struct ListenKeyResponse {
    pub data: ListenKeyData,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListenKeyData {
    pub listen_key: String,
}
