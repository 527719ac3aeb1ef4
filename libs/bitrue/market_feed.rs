//! Public order book feed.
//!
//! One supervised streaming session subscribes to the depth channel of
//! every configured pair and routes classified messages into per-kind
//! queues. Three consumer tasks drain them into a single ordered event
//! stream: the snapshot refresher (which also owns the hourly REST
//! resynchronization), a diff forwarder, and a trade forwarder.

use crate::constants;
use crate::decoder::{decode_market_frame, MarketChannel, MarketMessage};
use crate::events::{OrderBookEvent, TradeSide};
use crate::rest::BitrueRestClient;
use crate::symbols::SymbolMap;
use crate::wire::StreamSnapshot;
use async_trait::async_trait;
use chrono::Utc;
use feedsock::{
    FeedError, FeedHealth, FeedSupervisor, Frame, Result, RouteTable, SessionConfig,
    ShutdownSignal, StreamProtocol,
};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Subscribe payload for one pair's depth channel.
fn depth_subscription(stream_symbol: &str) -> Value {
    json!({
        "event": "sub",
        "params": {
            "cb_id": stream_symbol,
            "channel": format!(
                "{}{}{}",
                constants::DEPTH_CHANNEL_PREFIX,
                stream_symbol,
                constants::DEPTH_CHANNEL_SUFFIX
            ),
        }
    })
}

/// Symbol embedded in a depth channel name.
fn channel_symbol(channel: &str) -> Option<&str> {
    channel
        .strip_prefix(constants::DEPTH_CHANNEL_PREFIX)?
        .strip_suffix(constants::DEPTH_CHANNEL_SUFFIX)
}

/// Local pair for a message's symbol. A message that names no symbol is
/// attributed to the sole configured pair when exactly one exists.
fn resolve_pair(symbol: Option<&str>, symbols: &SymbolMap, pairs: &[String]) -> Option<String> {
    match symbol {
        Some(symbol) => symbols.trading_pair(symbol).map(str::to_string),
        None if pairs.len() == 1 => Some(pairs[0].clone()),
        None => None,
    }
}

/// Both snapshot paths (stream and REST) produce this same event shape;
/// the sequence value comes from the message's own `ts` field.
fn normalize_stream_snapshot(
    snapshot: StreamSnapshot,
    symbols: &SymbolMap,
    pairs: &[String],
) -> Result<OrderBookEvent> {
    let symbol = snapshot
        .symbol
        .as_deref()
        .or_else(|| snapshot.channel.as_deref().and_then(channel_symbol));

    let trading_pair = resolve_pair(symbol, symbols, pairs).ok_or_else(|| {
        FeedError::Decode(format!("snapshot for unknown symbol {symbol:?}"))
    })?;

    Ok(OrderBookEvent::Snapshot {
        trading_pair,
        update_id: snapshot.ts,
        bids: snapshot.tick.buys,
        asks: snapshot.tick.asks,
        timestamp_ms: snapshot.ts as i64,
    })
}

/// Map one routed message to its downstream events.
fn market_events(
    message: MarketMessage,
    symbols: &SymbolMap,
    pairs: &[String],
) -> Vec<OrderBookEvent> {
    match message {
        MarketMessage::Snapshot(snapshot) => {
            match normalize_stream_snapshot(snapshot, symbols, pairs) {
                Ok(event) => vec![event],
                Err(e) => {
                    warn!("dropping stream snapshot: {}", e);
                    Vec::new()
                }
            }
        }
        MarketMessage::Diff(diff) => {
            let Some(trading_pair) = resolve_pair(diff.symbol.as_deref(), symbols, pairs)
            else {
                warn!("dropping diff for unknown symbol {:?}", diff.symbol);
                return Vec::new();
            };
            vec![OrderBookEvent::Diff {
                trading_pair,
                update_id: diff.seq,
                bids: diff.bids,
                asks: diff.asks,
                timestamp_ms: diff.seq as i64,
            }]
        }
        MarketMessage::Trades(trades) => {
            let Some(trading_pair) = resolve_pair(trades.symbol.as_deref(), symbols, pairs)
            else {
                warn!("dropping trades for unknown symbol {:?}", trades.symbol);
                return Vec::new();
            };
            trades
                .data
                .into_iter()
                .map(|entry| OrderBookEvent::Trade {
                    trading_pair: trading_pair.clone(),
                    trade_id: entry.id,
                    side: if entry.is_buy {
                        TradeSide::Buy
                    } else {
                        TradeSide::Sell
                    },
                    price: entry.price,
                    amount: entry.amount,
                    timestamp_ms: entry.id as i64,
                })
                .collect()
        }
    }
}

/// The exchange-specific half of the public session.
struct MarketStreamProtocol {
    url: String,
    pairs: Vec<String>,
    symbols: Arc<SymbolMap>,
    routes: RouteTable<MarketChannel, MarketMessage>,
}

#[async_trait]
impl StreamProtocol for MarketStreamProtocol {
    async fn connect_url(&self) -> Result<String> {
        Ok(self.url.clone())
    }

    fn subscriptions(&self) -> Vec<Value> {
        self.pairs
            .iter()
            .filter_map(|pair| match self.symbols.stream_symbol(pair) {
                Some(symbol) => Some(depth_subscription(symbol)),
                None => {
                    warn!("no exchange symbol for {}, skipping subscription", pair);
                    None
                }
            })
            .collect()
    }

    fn ping_payload(&self) -> Value {
        json!({"ping": Utc::now().timestamp_millis()})
    }

    fn dispatch(&self, frame: Frame) -> Result<()> {
        match decode_market_frame(&frame) {
            Ok(Some(message)) => {
                self.routes.route(&message.kind(), message);
                Ok(())
            }
            // Acknowledgement; nothing to forward.
            Ok(None) => Ok(()),
            Err(e) => {
                warn!("dropping undecodable market frame: {}", e);
                Ok(())
            }
        }
    }
}

/// Source of full-book snapshots, normalized to the event shape.
///
/// The REST client implements this for production; tests substitute a stub
/// to drive refresh failures without HTTP.
#[async_trait]
pub trait SnapshotSource: Send + Sync + 'static {
    async fn order_book_snapshot(&self, trading_pair: &str) -> Result<OrderBookEvent>;
}

pub struct RestSnapshotSource {
    rest: Arc<BitrueRestClient>,
    symbols: Arc<SymbolMap>,
}

impl RestSnapshotSource {
    pub fn new(rest: Arc<BitrueRestClient>, symbols: Arc<SymbolMap>) -> Self {
        Self { rest, symbols }
    }
}

#[async_trait]
impl SnapshotSource for RestSnapshotSource {
    async fn order_book_snapshot(&self, trading_pair: &str) -> Result<OrderBookEvent> {
        let symbol = self
            .symbols
            .rest_symbol(trading_pair)
            .ok_or_else(|| FeedError::Refresh {
                pair: trading_pair.to_string(),
                reason: "no exchange symbol mapping".into(),
            })?;

        let depth = self
            .rest
            .depth(symbol, constants::ORDER_BOOK_DEPTH_LIMIT)
            .await
            .map_err(|e| FeedError::Refresh {
                pair: trading_pair.to_string(),
                reason: e.to_string(),
            })?;

        Ok(OrderBookEvent::Snapshot {
            trading_pair: trading_pair.to_string(),
            update_id: depth.last_update_id,
            bids: depth.bids,
            asks: depth.asks,
            timestamp_ms: Utc::now().timestamp_millis(),
        })
    }
}

enum RefreshStep {
    Message(Option<MarketMessage>),
    RefreshDue,
}

/// Keeps downstream state bounded against drift.
///
/// Drains the stream-snapshot queue and refreshes every configured pair
/// over REST on a fixed hourly clock, or immediately when the drain errors
/// unexpectedly. A failing pair never blocks the others: it is retried once
/// after a short cool-down and otherwise left to the next refresh.
pub struct SnapshotRefresher<S> {
    pairs: Vec<String>,
    symbols: Arc<SymbolMap>,
    source: Arc<S>,
    out: mpsc::UnboundedSender<OrderBookEvent>,
    shutdown: ShutdownSignal,
    refresh_interval: Duration,
    retry_cooldown: Duration,
}

impl<S: SnapshotSource> SnapshotRefresher<S> {
    pub fn new(
        pairs: Vec<String>,
        symbols: Arc<SymbolMap>,
        source: Arc<S>,
        out: mpsc::UnboundedSender<OrderBookEvent>,
        shutdown: ShutdownSignal,
    ) -> Self {
        Self {
            pairs,
            symbols,
            source,
            out,
            shutdown,
            refresh_interval: constants::SNAPSHOT_REFRESH_INTERVAL,
            retry_cooldown: constants::REFRESH_RETRY_COOLDOWN,
        }
    }

    /// Override the timing knobs (scaled down in tests).
    pub fn with_intervals(mut self, refresh_interval: Duration, retry_cooldown: Duration) -> Self {
        self.refresh_interval = refresh_interval;
        self.retry_cooldown = retry_cooldown;
        self
    }

    pub async fn run(self, mut stream_snapshots: mpsc::UnboundedReceiver<MarketMessage>) {
        let mut next_refresh = tokio::time::Instant::now() + self.refresh_interval;

        loop {
            let step = tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => return,
                message = stream_snapshots.recv() => RefreshStep::Message(message),
                _ = tokio::time::sleep_until(next_refresh) => RefreshStep::RefreshDue,
            };

            match step {
                RefreshStep::Message(Some(message)) => {
                    if let Err(e) = self.forward_stream_snapshot(message) {
                        warn!("error processing stream snapshot: {}; forcing refresh", e);
                        self.full_refresh().await;
                        next_refresh = tokio::time::Instant::now() + self.refresh_interval;
                        if !self.shutdown.sleep(self.retry_cooldown).await {
                            return;
                        }
                    }
                }
                // Producer side is gone; the feed is shutting down.
                RefreshStep::Message(None) => return,
                // The periodic full refresh runs on its own clock; stream
                // snapshots do not push it out.
                RefreshStep::RefreshDue => {
                    self.full_refresh().await;
                    next_refresh = tokio::time::Instant::now() + self.refresh_interval;
                }
            }
        }
    }

    fn forward_stream_snapshot(&self, message: MarketMessage) -> Result<()> {
        let MarketMessage::Snapshot(snapshot) = message else {
            return Err(FeedError::Decode(
                "non-snapshot message on the snapshot queue".into(),
            ));
        };
        let event = normalize_stream_snapshot(snapshot, &self.symbols, &self.pairs)?;
        if self.out.send(event).is_err() {
            debug!("event consumer gone, dropping snapshot");
        }
        Ok(())
    }

    /// Fetch a full book for every configured pair and emit the snapshots.
    pub async fn full_refresh(&self) {
        info!("full order book refresh for {} pairs", self.pairs.len());

        let mut failed = Vec::new();
        for pair in &self.pairs {
            let Some(result) = self.fetch_snapshot(pair).await else {
                return;
            };
            match result {
                Ok(event) => {
                    let _ = self.out.send(event);
                    debug!("saved order book snapshot for {}", pair);
                }
                Err(e) => {
                    warn!("{}", e);
                    failed.push(pair.clone());
                }
            }
        }

        if failed.is_empty() {
            return;
        }

        // One retry per failed pair after the cool-down; anything still
        // failing waits for the next refresh.
        if !self.shutdown.sleep(self.retry_cooldown).await {
            return;
        }
        for pair in failed {
            let Some(result) = self.fetch_snapshot(&pair).await else {
                return;
            };
            match result {
                Ok(event) => {
                    let _ = self.out.send(event);
                    debug!("saved order book snapshot for {} on retry", pair);
                }
                Err(e) => warn!("{}; will retry at next refresh", e),
            }
        }
    }

    /// One snapshot call, raced against shutdown. `None` means cancelled.
    async fn fetch_snapshot(&self, pair: &str) -> Option<Result<OrderBookEvent>> {
        tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => None,
            result = self.source.order_book_snapshot(pair) => Some(result),
        }
    }
}

/// Drain one routed queue into the downstream event stream.
async fn forward_market_messages(
    mut rx: mpsc::UnboundedReceiver<MarketMessage>,
    symbols: Arc<SymbolMap>,
    pairs: Vec<String>,
    out: mpsc::UnboundedSender<OrderBookEvent>,
    shutdown: ShutdownSignal,
) {
    loop {
        let message = tokio::select! {
            biased;
            _ = shutdown.cancelled() => return,
            message = rx.recv() => match message {
                Some(message) => message,
                None => return,
            },
        };
        for event in market_events(message, &symbols, &pairs) {
            if out.send(event).is_err() {
                return;
            }
        }
    }
}

/// Public market-data feed for a set of trading pairs.
pub struct OrderBookFeed {
    pairs: Vec<String>,
    symbols: Arc<SymbolMap>,
    supervisor: FeedSupervisor<MarketStreamProtocol>,
    source: Arc<RestSnapshotSource>,
    shutdown: ShutdownSignal,
    events_tx: mpsc::UnboundedSender<OrderBookEvent>,
    events_rx: Option<mpsc::UnboundedReceiver<OrderBookEvent>>,
    snapshot_rx: Option<mpsc::UnboundedReceiver<MarketMessage>>,
    diff_rx: Option<mpsc::UnboundedReceiver<MarketMessage>>,
    trade_rx: Option<mpsc::UnboundedReceiver<MarketMessage>>,
}

impl OrderBookFeed {
    pub fn new(
        pairs: Vec<String>,
        symbols: SymbolMap,
        rest: Arc<BitrueRestClient>,
        shutdown: ShutdownSignal,
    ) -> Self {
        Self::with_config(
            pairs,
            symbols,
            rest,
            shutdown,
            constants::WSS_MARKET_URL,
            SessionConfig::new(constants::HEARTBEAT_INTERVAL, constants::RECONNECT_COOLDOWN),
        )
    }

    pub fn with_config(
        pairs: Vec<String>,
        symbols: SymbolMap,
        rest: Arc<BitrueRestClient>,
        shutdown: ShutdownSignal,
        url: &str,
        config: SessionConfig,
    ) -> Self {
        let symbols = Arc::new(symbols);

        // Queues are created once and survive reconnects; consumers never
        // have to resubscribe.
        let mut routes = RouteTable::new();
        let snapshot_rx = routes.register(MarketChannel::Snapshot);
        let diff_rx = routes.register(MarketChannel::Diff);
        let trade_rx = routes.register(MarketChannel::Trade);

        let protocol = Arc::new(MarketStreamProtocol {
            url: url.to_string(),
            pairs: pairs.clone(),
            symbols: Arc::clone(&symbols),
            routes,
        });
        let supervisor = FeedSupervisor::new(protocol, config, shutdown.clone());
        let source = Arc::new(RestSnapshotSource::new(rest, Arc::clone(&symbols)));
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        Self {
            pairs,
            symbols,
            supervisor,
            source,
            shutdown,
            events_tx,
            events_rx: Some(events_rx),
            snapshot_rx: Some(snapshot_rx),
            diff_rx: Some(diff_rx),
            trade_rx: Some(trade_rx),
        }
    }

    /// The downstream event stream. Single consumer; `None` once taken.
    pub fn events(&mut self) -> Option<mpsc::UnboundedReceiver<OrderBookEvent>> {
        self.events_rx.take()
    }

    pub fn health(&self) -> FeedHealth {
        self.supervisor.health()
    }

    /// Drive the feed until shutdown.
    pub async fn run(&mut self) {
        let (Some(snapshot_rx), Some(diff_rx), Some(trade_rx)) = (
            self.snapshot_rx.take(),
            self.diff_rx.take(),
            self.trade_rx.take(),
        ) else {
            warn!("order book feed is already running");
            return;
        };

        let refresher = SnapshotRefresher::new(
            self.pairs.clone(),
            Arc::clone(&self.symbols),
            Arc::clone(&self.source),
            self.events_tx.clone(),
            self.shutdown.clone(),
        );

        tokio::join!(
            self.supervisor.run(),
            refresher.run(snapshot_rx),
            forward_market_messages(
                diff_rx,
                Arc::clone(&self.symbols),
                self.pairs.clone(),
                self.events_tx.clone(),
                self.shutdown.clone(),
            ),
            forward_market_messages(
                trade_rx,
                Arc::clone(&self.symbols),
                self.pairs.clone(),
                self.events_tx.clone(),
                self.shutdown.clone(),
            ),
        );
    }
}
