//! Subscriber notification events

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{TokenAddress, TokenRecord};

/// Payload of a `token_update` event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenUpdate {
    pub address: TokenAddress,
    pub ticker: Option<String>,
    pub price: f64,
    pub price_change_24h: Option<f64>,
    pub volume: f64,
    pub liquidity: f64,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub last_updated: DateTime<Utc>,
    pub protocols: Vec<String>,
}

impl From<&TokenRecord> for TokenUpdate {
    fn from(record: &TokenRecord) -> Self {
        Self {
            address: record.address.clone(),
            ticker: record.ticker.clone(),
            price: record.price,
            price_change_24h: record.price_change_24h,
            volume: record.volume,
            liquidity: record.liquidity,
            last_updated: record.last_updated,
            protocols: record.protocols.clone(),
        }
    }
}

/// Payload of a `volume_spike` event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolumeSpike {
    pub address: TokenAddress,
    pub volume: f64,
    /// `merged.volume - existing.volume`
    pub delta: f64,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
}

/// Event delivered to subscribers, at most once per merge per kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum Notification {
    TokenUpdate(TokenUpdate),
    VolumeSpike(VolumeSpike),
}

impl Notification {
    pub fn kind(&self) -> &'static str {
        match self {
            Notification::TokenUpdate(_) => "token_update",
            Notification::VolumeSpike(_) => "volume_spike",
        }
    }

    pub fn address(&self) -> &TokenAddress {
        match self {
            Notification::TokenUpdate(u) => &u.address,
            Notification::VolumeSpike(s) => &s.address,
        }
    }
}
