// Maker/taker proportion model
// Market orders are fully taker by definition. Limit orders start on a
// spread/quantity heuristic and hand over to an online-fitted logistic
// classifier once enough samples have been observed.

use crate::error::{DegradeReason, Estimate};
use crate::models::regression::LogisticClassifier;
use crate::models::{
    FeatureSnapshot, OnlineModel, OrderType, TrainingWindow, DEFAULT_WINDOW_CAPACITY,
};
use ndarray::{array, Array1};
use tracing::{debug, info};

/// Fallback: assume fully taker when inputs are unusable
const DEFAULT_MAKER_PROPORTION: f64 = 0.0;

#[derive(Debug)]
pub struct MakerTakerModel {
    classifier: Option<LogisticClassifier>,
    window: TrainingWindow,
}

impl MakerTakerModel {
    pub fn new() -> Self {
        Self {
            classifier: None,
            window: TrainingWindow::new(DEFAULT_WINDOW_CAPACITY),
        }
    }

    pub fn is_trained(&self) -> bool {
        self.classifier.is_some()
    }

    pub fn samples_observed(&self) -> u64 {
        self.window.total_observed()
    }

    fn feature_vector(features: &FeatureSnapshot) -> Array1<f64> {
        let order_type = match features.order_type {
            OrderType::Market => 0.0,
            OrderType::Limit => 1.0,
        };
        array![
            order_type,
            features.quantity,
            features.spread_pct,
            features.imbalance,
            features.depth_ratio,
            features.volatility,
        ]
    }

    /// Predicted maker proportion in [0, 1].
    ///
    /// Market orders return exactly 0.0 and never consult the classifier.
    /// Every call feeds the produced proportion (binarized) back into the
    /// training window; call `observe` directly to supply realized-fill
    /// labels instead.
    pub fn estimate(&mut self, features: &FeatureSnapshot) -> Estimate {
        let inputs = Self::feature_vector(features);
        if inputs.iter().any(|v| !v.is_finite()) || features.quantity <= 0.0 {
            return Estimate::Degraded {
                value: DEFAULT_MAKER_PROPORTION,
                reason: DegradeReason::NonFiniteInput,
            };
        }

        let proportion = match features.order_type {
            OrderType::Market => 0.0,
            OrderType::Limit => match self.predict(&inputs) {
                Some(probability) => probability.clamp(0.0, 1.0),
                None => {
                    // Higher spread and lower quantity favor passive fills
                    let base = 0.5;
                    let spread_factor = (features.spread_pct / 10.0).min(0.3);
                    let quantity_factor = (10.0 / features.quantity).min(0.2);
                    (base + spread_factor + quantity_factor).min(1.0)
                }
            },
        };

        let label = if proportion > 0.5 { 1.0 } else { 0.0 };
        self.observe(inputs, label);
        self.maybe_refit();

        Estimate::Ok(proportion)
    }
}

impl OnlineModel for MakerTakerModel {
    fn predict(&self, features: &Array1<f64>) -> Option<f64> {
        self.classifier.as_ref().map(|c| c.predict_proba(features))
    }

    fn observe(&mut self, features: Array1<f64>, label: f64) {
        self.window.push(features, label);
    }

    fn maybe_refit(&mut self) -> bool {
        if !self.window.should_refit(self.is_trained()) {
            return false;
        }

        let (features, labels) = self.window.samples();
        match LogisticClassifier::fit(&features, &labels) {
            Some(classifier) => {
                self.classifier = Some(classifier);
                info!(
                    samples = labels.len(),
                    total_observed = self.window.total_observed(),
                    "Fitted maker/taker classifier"
                );
                true
            }
            None => {
                debug!("Maker/taker classifier fit failed, keeping previous parameters");
                false
            }
        }
    }
}

impl Default for MakerTakerModel {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn features(order_type: OrderType, quantity: f64, spread_pct: f64) -> FeatureSnapshot {
        FeatureSnapshot {
            mid_price: 100.0,
            spread: spread_pct,
            spread_pct,
            bid_depth_5: 5.0,
            ask_depth_5: 5.0,
            depth_ratio: 1.0,
            imbalance: 0.5,
            best_bid: 99.5,
            best_ask: 100.5,
            vwap_bid: [0.0; 5],
            vwap_ask: [0.0; 5],
            quantity,
            volatility: 0.02,
            order_type,
        }
    }

    #[test]
    fn test_market_orders_always_fully_taker() {
        let mut model = MakerTakerModel::new();
        for quantity in [1.0, 100.0, 10_000.0] {
            for spread in [0.1, 1.0, 10.0] {
                let estimate = model.estimate(&features(OrderType::Market, quantity, spread));
                assert_eq!(estimate.value(), 0.0);
                assert!(!estimate.is_degraded());
            }
        }
    }

    #[test]
    fn test_limit_heuristic() {
        let mut model = MakerTakerModel::new();
        // spread_factor = min(0.3, 0.1), quantity_factor = min(0.2, 0.1)
        let estimate = model.estimate(&features(OrderType::Limit, 100.0, 1.0));
        assert!((estimate.value() - 0.7).abs() < 1e-12);
    }

    #[test]
    fn test_limit_heuristic_clamped_to_one() {
        let mut model = MakerTakerModel::new();
        // Wide spread and tiny quantity push past 1.0 before the clamp
        let estimate = model.estimate(&features(OrderType::Limit, 1.0, 100.0));
        assert_eq!(estimate.value(), 1.0);
    }

    #[test]
    fn test_zero_quantity_degrades() {
        let mut model = MakerTakerModel::new();
        let estimate = model.estimate(&features(OrderType::Limit, 0.0, 1.0));
        assert!(estimate.is_degraded());
        assert_eq!(estimate.value(), 0.0);
        assert_eq!(model.samples_observed(), 0);
    }

    #[test]
    fn test_observes_on_every_call() {
        let mut model = MakerTakerModel::new();
        model.estimate(&features(OrderType::Market, 100.0, 1.0));
        model.estimate(&features(OrderType::Limit, 100.0, 1.0));
        assert_eq!(model.samples_observed(), 2);
    }

    #[test]
    fn test_classifier_fits_at_100_samples() {
        let mut model = MakerTakerModel::new();
        // Mixed labels: market calls binarize to 0, limit calls to 1
        for i in 0..50 {
            model.estimate(&features(OrderType::Market, 100.0 + i as f64, 1.0));
            model.estimate(&features(OrderType::Limit, 100.0 + i as f64, 1.0));
        }
        assert_eq!(model.samples_observed(), 100);
        assert!(model.is_trained());

        // Once trained, limit predictions come from the classifier and stay
        // within the valid range
        let estimate = model.estimate(&features(OrderType::Limit, 100.0, 1.0));
        let value = estimate.value();
        assert!((0.0..=1.0).contains(&value));

        // Market orders still bypass the classifier entirely
        let estimate = model.estimate(&features(OrderType::Market, 100.0, 1.0));
        assert_eq!(estimate.value(), 0.0);
    }
}
