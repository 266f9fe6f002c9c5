//! Significance and volume-spike detection over (prior, merged) snapshots

use tracing::debug;

use tokenagg_core::{Notification, SignificancePolicy, TokenRecord, TokenUpdate, VolumeSpike};

/// `|new - old| / max(old, 1)`
pub fn relative_price_change(old: f64, new: f64) -> f64 {
    (new - old).abs() / old.max(1.0)
}

/// Pure predicates over two record snapshots
#[derive(Debug, Clone, Default)]
pub struct SignificanceDetector {
    policy: SignificancePolicy,
}

impl SignificanceDetector {
    pub fn new(policy: SignificancePolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &SignificancePolicy {
        &self.policy
    }

    /// New token, or price/volume moved past the policy thresholds
    pub fn is_significant(&self, existing: Option<&TokenRecord>, merged: &TokenRecord) -> bool {
        let Some(existing) = existing else {
            return true;
        };

        let price_change = relative_price_change(existing.price, merged.price);
        let volume_delta = (merged.volume - existing.volume).abs();

        price_change > self.policy.min_relative_price_change
            || volume_delta > self.policy.min_volume_delta
    }

    /// Volume grew by more than `spike_ratio` over a positive prior volume
    pub fn detect_volume_spike(
        &self,
        existing: Option<&TokenRecord>,
        merged: &TokenRecord,
    ) -> Option<VolumeSpike> {
        let existing = existing?;
        if existing.volume <= 0.0 {
            return None;
        }

        let ratio = merged.volume / existing.volume;
        if ratio <= self.policy.spike_ratio {
            return None;
        }

        debug!(
            "Volume spike on {}: {:.2} -> {:.2} ({:.1}x)",
            merged.address, existing.volume, merged.volume, ratio
        );

        Some(VolumeSpike {
            address: merged.address.clone(),
            volume: merged.volume,
            delta: merged.volume - existing.volume,
            timestamp: merged.last_updated,
        })
    }

    /// All notifications owed for one merge, at most one per kind.
    ///
    /// Spikes are only reported alongside a `token_update`; an insignificant
    /// merge produces no events at all.
    pub fn evaluate(&self, existing: Option<&TokenRecord>, merged: &TokenRecord) -> Vec<Notification> {
        if !self.is_significant(existing, merged) {
            return Vec::new();
        }

        let mut events = vec![Notification::TokenUpdate(TokenUpdate::from(merged))];
        if let Some(spike) = self.detect_volume_spike(existing, merged) {
            events.push(Notification::VolumeSpike(spike));
        }

        events
    }
}
