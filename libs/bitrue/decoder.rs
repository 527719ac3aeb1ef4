//! Inbound frame decoding and classification.
//!
//! Frames may arrive gzip-compressed; after inflation they are parsed once
//! into a JSON document and classified by shape. Bare acknowledgements are
//! discarded here and never reach a queue. Unrecognized shapes surface as a
//! decode error, which callers log and drop; a malformed frame never tears
//! a session down.

use crate::constants;
use crate::events::{AccountEvent, AccountEventKind};
use crate::wire::{StreamDiff, StreamSnapshot, StreamTrades};
use feedsock::{FeedError, Frame, Result};
use flate2::read::GzDecoder;
use serde_json::Value;
use std::io::Read;
use tracing::warn;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Queue key for the public feed: one queue per message kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MarketChannel {
    Snapshot,
    Diff,
    Trade,
}

/// One classified public-feed message.
#[derive(Debug, Clone)]
pub enum MarketMessage {
    Snapshot(StreamSnapshot),
    Diff(StreamDiff),
    Trades(StreamTrades),
}

impl MarketMessage {
    pub fn kind(&self) -> MarketChannel {
        match self {
            MarketMessage::Snapshot(_) => MarketChannel::Snapshot,
            MarketMessage::Diff(_) => MarketChannel::Diff,
            MarketMessage::Trades(_) => MarketChannel::Trade,
        }
    }
}

/// Inflate (when gzip-framed) and decode the frame into UTF-8 text, with
/// the exchange's occasional single-quoted payloads normalized.
pub(crate) fn frame_text(frame: &Frame) -> Result<String> {
    let bytes = frame.as_bytes();
    let text = if bytes.starts_with(&GZIP_MAGIC) {
        let mut decoder = GzDecoder::new(bytes);
        let mut inflated = String::new();
        decoder
            .read_to_string(&mut inflated)
            .map_err(|e| FeedError::Decode(format!("gzip inflate failed: {e}")))?;
        inflated
    } else {
        match frame {
            Frame::Text(text) => text.clone(),
            Frame::Binary(data) => String::from_utf8(data.clone())
                .map_err(|e| FeedError::Decode(format!("invalid utf-8 frame: {e}")))?,
        }
    };
    Ok(text.replace('\'', "\""))
}

fn parse_document(frame: &Frame) -> Result<Value> {
    let text = frame_text(frame)?;
    serde_json::from_str(&text).map_err(|e| FeedError::Decode(format!("invalid json: {e}")))
}

/// A status-ok control frame or a pong reply; nothing downstream wants it.
fn is_ack(value: &Value) -> bool {
    value.get("status").and_then(Value::as_str) == Some("ok") || value.get("pong").is_some()
}

/// Decode one public-feed frame.
///
/// Returns `Ok(None)` for acknowledgements, `Ok(Some(_))` for a classified
/// message, and a decode error for anything unrecognizable.
pub fn decode_market_frame(frame: &Frame) -> Result<Option<MarketMessage>> {
    let value = parse_document(frame)?;

    if is_ack(&value) {
        return Ok(None);
    }

    // Classify by shape: a nested tick with level lists is a snapshot,
    // top-level t with delta arrays is a diff, a data array is a trade
    // batch.
    if value
        .get("tick")
        .map_or(false, |tick| tick.get("buys").is_some() || tick.get("asks").is_some())
    {
        let snapshot: StreamSnapshot = serde_json::from_value(value)
            .map_err(|e| FeedError::Decode(format!("malformed snapshot: {e}")))?;
        return Ok(Some(MarketMessage::Snapshot(snapshot)));
    }

    if value.get("t").is_some() && (value.get("b").is_some() || value.get("a").is_some()) {
        let diff: StreamDiff = serde_json::from_value(value)
            .map_err(|e| FeedError::Decode(format!("malformed diff: {e}")))?;
        return Ok(Some(MarketMessage::Diff(diff)));
    }

    if value.get("data").map_or(false, Value::is_array) {
        let trades: StreamTrades = serde_json::from_value(value)
            .map_err(|e| FeedError::Decode(format!("malformed trade batch: {e}")))?;
        return Ok(Some(MarketMessage::Trades(trades)));
    }

    Err(FeedError::Decode("unrecognized market payload shape".into()))
}

/// Decode one private-feed frame into zero or more account events.
///
/// Batched payloads (a JSON array) are flattened in order. A rejected
/// session credential is the one condition that must force a reconnect, so
/// it surfaces as a connection error rather than a decode error.
pub fn decode_user_frame(frame: &Frame) -> Result<Vec<AccountEvent>> {
    let value = parse_document(frame)?;

    if value.get("auth").and_then(Value::as_str) == Some("fail") {
        return Err(FeedError::Connection(
            "private channel authentication rejected".into(),
        ));
    }

    if is_ack(&value) {
        return Ok(Vec::new());
    }

    let items: Vec<Value> = match value {
        Value::Array(items) => items,
        other => vec![other],
    };

    let mut events = Vec::with_capacity(items.len());
    for item in items {
        match classify_user_event(&item) {
            Some(kind) => events.push(AccountEvent {
                kind,
                payload: item,
            }),
            None => warn!("dropping unrecognized user stream payload: {}", item),
        }
    }
    Ok(events)
}

fn classify_user_event(value: &Value) -> Option<AccountEventKind> {
    match value.get("e").and_then(Value::as_str) {
        Some(tag) if tag == constants::ORDER_UPDATE_EVENT => Some(AccountEventKind::OrderUpdate),
        Some(tag) if tag == constants::BALANCE_UPDATE_EVENT => {
            Some(AccountEventKind::BalanceUpdate)
        }
        _ => None,
    }
}
