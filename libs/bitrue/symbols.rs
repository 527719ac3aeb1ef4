//! Trading pair ↔ exchange symbol mapping.
//!
//! The exchange spells `BTC-USDT` as `BTCUSDT` on REST and `btcusdt` in
//! stream channel names. The map is an explicitly injected, per-instance
//! collaborator: feeds receive it at construction and there is no shared
//! global table.

use std::collections::HashMap;

#[derive(Debug, Clone, Default)]
pub struct SymbolMap {
    rest_by_pair: HashMap<String, String>,
    stream_by_pair: HashMap<String, String>,
    pair_by_symbol: HashMap<String, String>,
}

impl SymbolMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Derive the standard mapping for a set of local pairs.
    pub fn for_pairs<S: AsRef<str>>(pairs: &[S]) -> Self {
        let mut map = Self::new();
        for pair in pairs {
            let pair = pair.as_ref();
            let symbol = pair.replace('-', "").to_uppercase();
            map.insert(pair, &symbol);
        }
        map
    }

    /// Register a pair with an explicit exchange symbol, overriding any
    /// derived entry.
    pub fn insert(&mut self, trading_pair: &str, exchange_symbol: &str) {
        let rest = exchange_symbol.to_uppercase();
        let stream = exchange_symbol.to_lowercase();
        self.pair_by_symbol
            .insert(rest.clone(), trading_pair.to_string());
        self.pair_by_symbol
            .insert(stream.clone(), trading_pair.to_string());
        self.rest_by_pair.insert(trading_pair.to_string(), rest);
        self.stream_by_pair.insert(trading_pair.to_string(), stream);
    }

    /// Symbol used on REST endpoints, e.g. `BTCUSDT`.
    pub fn rest_symbol(&self, trading_pair: &str) -> Option<&str> {
        self.rest_by_pair.get(trading_pair).map(String::as_str)
    }

    /// Symbol used in stream channel names, e.g. `btcusdt`.
    pub fn stream_symbol(&self, trading_pair: &str) -> Option<&str> {
        self.stream_by_pair.get(trading_pair).map(String::as_str)
    }

    /// Local pair for an exchange symbol in either spelling.
    pub fn trading_pair(&self, exchange_symbol: &str) -> Option<&str> {
        self.pair_by_symbol
            .get(exchange_symbol)
            .map(String::as_str)
    }
}
