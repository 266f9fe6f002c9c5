//! Core type definitions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Raw per-source payloads, keyed by source name
pub type SourcePayloads = BTreeMap<String, serde_json::Value>;

/// Token address (primary key of a canonical record)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenAddress(String);

impl TokenAddress {
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Store key of the canonical record for this address
    pub fn record_key(&self) -> String {
        format!("token:{}", self.0)
    }
}

impl fmt::Display for TokenAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TokenAddress {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for TokenAddress {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// One source's normalized reading of a token for the current cycle.
///
/// Produced by a source normalizer; the merge engine never looks at the raw
/// upstream shapes, only at these typed fields. Absent numeric fields count as
/// zero for additive fields and as "not provided" for latest-wins fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedObservation {
    pub address: TokenAddress,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub ticker: Option<String>,
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default)]
    pub liquidity: Option<f64>,
    #[serde(default)]
    pub market_cap: Option<f64>,
    #[serde(default)]
    pub volume: Option<f64>,
    #[serde(default)]
    pub transaction_count: Option<u64>,
    #[serde(default)]
    pub price_change_1h: Option<f64>,
    #[serde(default)]
    pub price_change_24h: Option<f64>,
    #[serde(default)]
    pub protocols: Vec<String>,
    #[serde(default)]
    pub sources: SourcePayloads,
}

impl NormalizedObservation {
    pub fn new(address: impl Into<TokenAddress>) -> Self {
        Self {
            address: address.into(),
            name: None,
            ticker: None,
            price: None,
            liquidity: None,
            market_cap: None,
            volume: None,
            transaction_count: None,
            price_change_1h: None,
            price_change_24h: None,
            protocols: Vec::new(),
            sources: SourcePayloads::new(),
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn ticker(mut self, ticker: impl Into<String>) -> Self {
        self.ticker = Some(ticker.into());
        self
    }

    pub fn price(mut self, price: f64) -> Self {
        self.price = Some(price);
        self
    }

    pub fn liquidity(mut self, liquidity: f64) -> Self {
        self.liquidity = Some(liquidity);
        self
    }

    pub fn market_cap(mut self, market_cap: f64) -> Self {
        self.market_cap = Some(market_cap);
        self
    }

    pub fn volume(mut self, volume: f64) -> Self {
        self.volume = Some(volume);
        self
    }

    pub fn transaction_count(mut self, count: u64) -> Self {
        self.transaction_count = Some(count);
        self
    }

    pub fn price_changes(mut self, change_1h: f64, change_24h: f64) -> Self {
        self.price_change_1h = Some(change_1h);
        self.price_change_24h = Some(change_24h);
        self
    }

    pub fn protocol(mut self, protocol: impl Into<String>) -> Self {
        self.protocols.push(protocol.into());
        self
    }

    pub fn source(mut self, source: impl Into<String>, payload: serde_json::Value) -> Self {
        self.sources.insert(source.into(), payload);
        self
    }
}

/// Canonical reconciled state for one token address
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenRecord {
    pub address: TokenAddress,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub ticker: Option<String>,
    #[serde(default)]
    pub price: f64,
    /// Confidence weight of the readings blended into `price`
    #[serde(default)]
    pub liquidity: f64,
    #[serde(default)]
    pub market_cap: Option<f64>,
    /// Cumulative over the record's lifetime
    #[serde(default)]
    pub volume: f64,
    /// Cumulative over the record's lifetime
    #[serde(default)]
    pub transaction_count: u64,
    #[serde(default)]
    pub price_change_1h: Option<f64>,
    #[serde(default)]
    pub price_change_24h: Option<f64>,
    #[serde(default)]
    pub protocols: Vec<String>,
    #[serde(default)]
    pub sources: SourcePayloads,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub last_updated: DateTime<Utc>,
}

impl TokenRecord {
    /// Empty record for an address, used as the base of a first observation
    pub fn empty(address: TokenAddress, now: DateTime<Utc>) -> Self {
        Self {
            address,
            name: None,
            ticker: None,
            price: 0.0,
            liquidity: 0.0,
            market_cap: None,
            volume: 0.0,
            transaction_count: 0,
            price_change_1h: None,
            price_change_24h: None,
            protocols: Vec::new(),
            sources: SourcePayloads::new(),
            last_updated: now,
        }
    }

    pub fn has_protocol(&self, protocol: &str) -> bool {
        self.protocols.iter().any(|p| p == protocol)
    }

    pub fn age_ms(&self, now: DateTime<Utc>) -> i64 {
        (now - self.last_updated).num_milliseconds().max(0)
    }
}
