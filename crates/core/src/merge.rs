//! Merge engine - reconciles a canonical record with a fresh observation
//!
//! Every field of [`TokenRecord`] has exactly one [`MergeRule`], listed in
//! [`FIELD_RULES`]. A merge copies the prior record and applies the table in
//! order, so each field's behavior can be read (and tested) on its own.

use chrono::{DateTime, Utc};

use crate::{NormalizedObservation, TokenRecord};

/// How a field evolves across merges
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeRule {
    /// Incoming value if present and non-empty, else keep
    LatestNonEmpty,
    /// Incoming value if defined, else keep
    LatestDefined,
    /// `existing + incoming`, absent incoming counts as zero
    Additive,
    /// Liquidity-weighted price blend
    WeightedBlend,
    /// Sum of weights, unless the sum is zero
    WeightSum,
    /// Set union, never shrinks
    SetUnion,
    /// Per-key overwrite of a map
    ShallowMerge,
}

/// One row of the merge table
pub struct FieldRule {
    pub field: &'static str,
    pub rule: MergeRule,
    apply: fn(&mut TokenRecord, &NormalizedObservation),
}

impl FieldRule {
    pub fn apply(&self, record: &mut TokenRecord, incoming: &NormalizedObservation) {
        (self.apply)(record, incoming)
    }
}

impl std::fmt::Debug for FieldRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldRule")
            .field("field", &self.field)
            .field("rule", &self.rule)
            .finish()
    }
}

/// Per-field merge rules, applied top to bottom.
///
/// `price` reads the prior liquidity, so it must stay ahead of `liquidity`.
/// `address` has no row: it never changes.
pub const FIELD_RULES: &[FieldRule] = &[
    FieldRule { field: "name", rule: MergeRule::LatestNonEmpty, apply: merge_name },
    FieldRule { field: "ticker", rule: MergeRule::LatestNonEmpty, apply: merge_ticker },
    FieldRule { field: "protocols", rule: MergeRule::SetUnion, apply: merge_protocols },
    FieldRule { field: "sources", rule: MergeRule::ShallowMerge, apply: merge_sources },
    FieldRule { field: "price", rule: MergeRule::WeightedBlend, apply: merge_price },
    FieldRule { field: "liquidity", rule: MergeRule::WeightSum, apply: merge_liquidity },
    FieldRule { field: "market_cap", rule: MergeRule::LatestDefined, apply: merge_market_cap },
    FieldRule { field: "volume", rule: MergeRule::Additive, apply: merge_volume },
    FieldRule { field: "transaction_count", rule: MergeRule::Additive, apply: merge_transaction_count },
    FieldRule { field: "price_change_1h", rule: MergeRule::LatestDefined, apply: merge_price_change_1h },
    FieldRule { field: "price_change_24h", rule: MergeRule::LatestDefined, apply: merge_price_change_24h },
];

/// Look up the rule governing a field
pub fn rule_for(field: &str) -> Option<MergeRule> {
    FIELD_RULES.iter().find(|r| r.field == field).map(|r| r.rule)
}

/// Merge an observation into the prior record, stamping the current time
pub fn merge(existing: Option<&TokenRecord>, incoming: &NormalizedObservation) -> TokenRecord {
    merge_at(existing, incoming, Utc::now())
}

/// Merge with an explicit clock.
///
/// A first observation is merged into an empty record; with zero prior
/// weights and volumes every rule reduces to taking the incoming value, with
/// protocols deduplicated.
pub fn merge_at(
    existing: Option<&TokenRecord>,
    incoming: &NormalizedObservation,
    now: DateTime<Utc>,
) -> TokenRecord {
    let mut merged = match existing {
        Some(record) => record.clone(),
        None => TokenRecord::empty(incoming.address.clone(), now),
    };

    for rule in FIELD_RULES {
        rule.apply(&mut merged, incoming);
    }

    merged.last_updated = now;
    merged
}

/// Blend two price readings by their liquidity weights.
///
/// A strictly more liquid incoming reading wins outright; otherwise the two
/// are averaged by weight. With no weight on either side the incoming
/// reading wins. An observation without a price leaves the price unchanged.
/// The result always lies between the two readings, so it stays finite.
pub fn blend_price(
    existing_price: f64,
    existing_liquidity: f64,
    incoming_price: Option<f64>,
    incoming_liquidity: f64,
) -> f64 {
    let Some(incoming_price) = incoming_price else {
        return existing_price;
    };

    let total = existing_liquidity + incoming_liquidity;
    if incoming_liquidity > existing_liquidity {
        incoming_price
    } else if total > 0.0 {
        let blended =
            (existing_price * existing_liquidity + incoming_price * incoming_liquidity) / total;
        if blended.is_finite() {
            blended
        } else {
            // Products overflowed; interpolate by the incoming weight share
            let share = (incoming_liquidity * 0.5)
                / (existing_liquidity * 0.5 + incoming_liquidity * 0.5);
            existing_price + (incoming_price - existing_price) * share
        }
    } else {
        incoming_price
    }
}

/// Clamp an optional additive input to a finite non-negative value
fn non_negative(value: Option<f64>) -> f64 {
    match value {
        Some(v) if v.is_finite() && v > 0.0 => v,
        _ => 0.0,
    }
}

fn valid_price(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite() && *v >= 0.0)
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.is_empty())
}

fn merge_name(record: &mut TokenRecord, incoming: &NormalizedObservation) {
    if let Some(name) = non_empty(&incoming.name) {
        record.name = Some(name.to_string());
    }
}

fn merge_ticker(record: &mut TokenRecord, incoming: &NormalizedObservation) {
    if let Some(ticker) = non_empty(&incoming.ticker) {
        record.ticker = Some(ticker.to_string());
    }
}

fn merge_protocols(record: &mut TokenRecord, incoming: &NormalizedObservation) {
    for protocol in &incoming.protocols {
        if !record.has_protocol(protocol) {
            record.protocols.push(protocol.clone());
        }
    }
}

fn merge_sources(record: &mut TokenRecord, incoming: &NormalizedObservation) {
    for (source, payload) in &incoming.sources {
        record.sources.insert(source.clone(), payload.clone());
    }
}

fn merge_price(record: &mut TokenRecord, incoming: &NormalizedObservation) {
    record.price = blend_price(
        record.price,
        record.liquidity,
        valid_price(incoming.price),
        non_negative(incoming.liquidity),
    );
}

/// Sum of two non-negative values, saturating at `f64::MAX`
fn saturating_sum(a: f64, b: f64) -> f64 {
    (a + b).min(f64::MAX)
}

fn merge_liquidity(record: &mut TokenRecord, incoming: &NormalizedObservation) {
    let total = saturating_sum(record.liquidity, non_negative(incoming.liquidity));
    if total != 0.0 {
        record.liquidity = total;
    }
}

fn finite(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite())
}

fn merge_market_cap(record: &mut TokenRecord, incoming: &NormalizedObservation) {
    if let Some(market_cap) = finite(incoming.market_cap) {
        record.market_cap = Some(market_cap);
    }
}

fn merge_volume(record: &mut TokenRecord, incoming: &NormalizedObservation) {
    record.volume = saturating_sum(record.volume, non_negative(incoming.volume));
}

fn merge_transaction_count(record: &mut TokenRecord, incoming: &NormalizedObservation) {
    record.transaction_count = record
        .transaction_count
        .saturating_add(incoming.transaction_count.unwrap_or(0));
}

fn merge_price_change_1h(record: &mut TokenRecord, incoming: &NormalizedObservation) {
    if let Some(change) = finite(incoming.price_change_1h) {
        record.price_change_1h = Some(change);
    }
}

fn merge_price_change_24h(record: &mut TokenRecord, incoming: &NormalizedObservation) {
    if let Some(change) = finite(incoming.price_change_24h) {
        record.price_change_24h = Some(change);
    }
}
