// Market impact model (Almgren-Chriss decomposition)
//
// Temporary impact:  eta * sigma * sqrt(q / V)
// Permanent impact:  gamma * sigma * (q / V)
//
// eta and gamma are derived per call from book depth and spread; V is a
// depth-based proxy because no trade-volume feed exists.

use crate::error::{DegradeReason, Estimate};
use crate::models::FeatureSnapshot;

/// Fallback when the computation cannot produce a finite percentage
const DEFAULT_IMPACT_PCT: f64 = 0.01;

/// Floor for the volume proxy, keeps the quantity ratio bounded
const MIN_VOLUME_PROXY: f64 = 1000.0;

#[derive(Debug, Clone, Default)]
pub struct MarketImpactModel;

impl MarketImpactModel {
    pub fn new() -> Self {
        Self
    }

    /// Expected market impact as a percentage of the order notional
    pub fn estimate(&self, features: &FeatureSnapshot) -> Estimate {
        let quantity = features.quantity;
        let sigma = features.volatility;
        let total_depth = features.bid_depth_5 + features.ask_depth_5;

        if !quantity.is_finite() || !sigma.is_finite() || !total_depth.is_finite() {
            return Estimate::Degraded {
                value: DEFAULT_IMPACT_PCT,
                reason: DegradeReason::NonFiniteInput,
            };
        }

        // Depth sensitivity: thinner books raise eta (range 0.5..=1.5)
        let eta = if total_depth > 0.0 {
            0.5 + (100.0 / total_depth).min(1.0)
        } else {
            1.0
        };

        // Resilience: wider spreads lower resilience, raising gamma
        let gamma = 0.1 + features.spread_pct / 100.0;

        // Volume proxy: top-of-book depth stands in for traded volume
        let volume = (total_depth * 20.0).max(MIN_VOLUME_PROXY);
        let quantity_ratio = quantity / volume;

        let temporary = eta * sigma * quantity_ratio.sqrt();
        let permanent = gamma * sigma * quantity_ratio;
        let impact_pct = (temporary + permanent) * 100.0;

        if impact_pct.is_finite() {
            Estimate::Ok(impact_pct)
        } else {
            Estimate::Degraded {
                value: DEFAULT_IMPACT_PCT,
                reason: DegradeReason::BadPrediction,
            }
        }
    }
}
