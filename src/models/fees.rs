// Fee model
// Splits the order notional into maker and taker portions at the active
// rate pair for the configured exchange/tier.

use crate::error::{DegradeReason, Estimate};
use tracing::debug;

#[derive(Debug, Clone)]
pub struct FeeModel {
    maker_rate: f64,
    taker_rate: f64,
}

impl FeeModel {
    pub fn new(maker_rate: f64, taker_rate: f64) -> Self {
        Self {
            maker_rate,
            taker_rate,
        }
    }

    pub fn set_rates(&mut self, maker_rate: f64, taker_rate: f64) {
        self.maker_rate = maker_rate;
        self.taker_rate = taker_rate;
        debug!(maker_rate, taker_rate, "Fee rates updated");
    }

    pub fn rates(&self) -> (f64, f64) {
        (self.maker_rate, self.taker_rate)
    }

    /// Expected fees in USD for `quantity` notional at `maker_proportion`
    pub fn estimate(&self, quantity: f64, maker_proportion: f64) -> Estimate {
        if !quantity.is_finite() || !maker_proportion.is_finite() {
            return Estimate::Degraded {
                value: 0.0,
                reason: DegradeReason::NonFiniteInput,
            };
        }

        let maker_fee = quantity * maker_proportion * self.maker_rate;
        let taker_fee = quantity * (1.0 - maker_proportion) * self.taker_rate;
        let total = maker_fee + taker_fee;

        if total.is_finite() {
            Estimate::Ok(total)
        } else {
            Estimate::Degraded {
                value: 0.0,
                reason: DegradeReason::BadPrediction,
            }
        }
    }
}
