// Cost estimation models
// Four estimators run in a fixed order on every book update; the maker/taker
// proportion produced in step two feeds the fee calculation in step three.

pub mod fees;
pub mod impact;
pub mod maker_taker;
pub mod regression;
pub mod slippage;

pub use fees::FeeModel;
pub use impact::MarketImpactModel;
pub use maker_taker::MakerTakerModel;
pub use slippage::SlippageModel;

use crate::core::orderbook::BookState;
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Order sizes (in units) for the VWAP ladder carried in every snapshot
pub const VWAP_LADDER: [f64; 5] = [1.0, 5.0, 10.0, 50.0, 100.0];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderType {
    Market,
    Limit,
}

impl std::str::FromStr for OrderType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "market" => Ok(OrderType::Market),
            "limit" => Ok(OrderType::Limit),
            other => Err(format!("unknown order type '{}'", other)),
        }
    }
}

impl std::fmt::Display for OrderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderType::Market => write!(f, "market"),
            OrderType::Limit => write!(f, "limit"),
        }
    }
}

/// Model inputs derived from one book generation plus the simulation
/// parameters. Rebuilt on every update, never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FeatureSnapshot {
    pub mid_price: f64,
    pub spread: f64,
    pub spread_pct: f64,
    pub bid_depth_5: f64,
    pub ask_depth_5: f64,
    pub depth_ratio: f64,
    pub imbalance: f64,
    pub best_bid: f64,
    pub best_ask: f64,
    pub vwap_bid: [f64; 5],
    pub vwap_ask: [f64; 5],
    pub quantity: f64,
    pub volatility: f64,
    pub order_type: OrderType,
}

impl FeatureSnapshot {
    pub fn from_book(
        book: &BookState,
        quantity: f64,
        volatility: f64,
        order_type: OrderType,
    ) -> Self {
        let (bid_depth_5, ask_depth_5) = book.depth(5);
        let depth_ratio = if ask_depth_5 > 0.0 {
            bid_depth_5 / ask_depth_5
        } else {
            1.0
        };

        let mut vwap_bid = [0.0; 5];
        let mut vwap_ask = [0.0; 5];
        for (i, &size) in VWAP_LADDER.iter().enumerate() {
            vwap_bid[i] = book.bid_vwap(size).unwrap_or(0.0);
            vwap_ask[i] = book.ask_vwap(size).unwrap_or(0.0);
        }

        Self {
            mid_price: book.mid_price().unwrap_or(0.0),
            spread: book.spread().unwrap_or(0.0),
            spread_pct: book.spread_pct().unwrap_or(0.0),
            bid_depth_5,
            ask_depth_5,
            depth_ratio,
            imbalance: book.imbalance(),
            best_bid: book.best_bid().map(|l| l.price).unwrap_or(0.0),
            best_ask: book.best_ask().map(|l| l.price).unwrap_or(0.0),
            vwap_bid,
            vwap_ask,
            quantity,
            volatility,
            order_type,
        }
    }
}

/// Capability surface for the models with online fitting.
///
/// `observe` is the label entry point: the controller's default feedback
/// path supplies the model's own heuristic output, but a caller holding
/// realized fill data can push ground-truth labels through the same door.
pub trait OnlineModel {
    /// Fitted prediction; `None` until trained
    fn predict(&self, features: &Array1<f64>) -> Option<f64>;

    /// Record one (features, label) pair into the training window
    fn observe(&mut self, features: Array1<f64>, label: f64);

    /// Refit when the cadence condition holds; returns whether a fit ran
    fn maybe_refit(&mut self) -> bool;
}

/// Bounded sliding-window sample store with a count-based retrain trigger.
///
/// The cadence is driven by the total number of samples ever observed, not
/// the window length, so the bounded window does not stall retraining:
/// first fit at 100 observed, then every 100 once past 500.
#[derive(Debug, Clone)]
pub struct TrainingWindow {
    features: VecDeque<Array1<f64>>,
    labels: VecDeque<f64>,
    capacity: usize,
    total_observed: u64,
}

pub const FIRST_FIT_AT: u64 = 100;
pub const STEADY_RETRAIN_FROM: u64 = 500;
pub const RETRAIN_EVERY: u64 = 100;
pub const DEFAULT_WINDOW_CAPACITY: usize = 1000;

impl TrainingWindow {
    pub fn new(capacity: usize) -> Self {
        Self {
            features: VecDeque::with_capacity(capacity),
            labels: VecDeque::with_capacity(capacity),
            capacity,
            total_observed: 0,
        }
    }

    pub fn push(&mut self, features: Array1<f64>, label: f64) {
        if self.features.len() == self.capacity {
            self.features.pop_front();
            self.labels.pop_front();
        }
        self.features.push_back(features);
        self.labels.push_back(label);
        self.total_observed += 1;
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn total_observed(&self) -> u64 {
        self.total_observed
    }

    /// Whether the retrain cadence fires at the current count
    pub fn should_refit(&self, trained: bool) -> bool {
        let observed = self.total_observed;
        if !trained {
            observed >= FIRST_FIT_AT
        } else {
            observed >= STEADY_RETRAIN_FROM && observed % RETRAIN_EVERY == 0
        }
    }

    /// Copy of the retained samples for fitting
    pub fn samples(&self) -> (Vec<Array1<f64>>, Vec<f64>) {
        (
            self.features.iter().cloned().collect(),
            self.labels.iter().cloned().collect(),
        )
    }
}

/// One atomically published cost estimate
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct CostEstimate {
    pub slippage_pct: f64,
    pub fee_usd: f64,
    pub market_impact_pct: f64,
    pub net_cost_usd: f64,
    pub maker_proportion: f64,
    /// How many of the four models fell back to a safe default this update
    pub degraded: u32,
}

/// Runs the four estimators in their fixed order
#[derive(Debug)]
pub struct CostModelPipeline {
    slippage: SlippageModel,
    maker_taker: MakerTakerModel,
    fees: FeeModel,
    impact: MarketImpactModel,
}

impl CostModelPipeline {
    pub fn new(maker_rate: f64, taker_rate: f64) -> Self {
        Self {
            slippage: SlippageModel::new(),
            maker_taker: MakerTakerModel::new(),
            fees: FeeModel::new(maker_rate, taker_rate),
            impact: MarketImpactModel::new(),
        }
    }

    /// Swap the active fee rate pair (exchange or tier changed)
    pub fn set_fee_rates(&mut self, maker_rate: f64, taker_rate: f64) {
        self.fees.set_rates(maker_rate, taker_rate);
    }

    pub fn evaluate(&mut self, features: &FeatureSnapshot) -> CostEstimate {
        let slippage = self.slippage.estimate(features);
        let maker = self.maker_taker.estimate(features);
        let fee = self.fees.estimate(features.quantity, maker.value());
        let impact = self.impact.estimate(features);

        let quantity = features.quantity;
        let net_cost_usd = slippage.value() / 100.0 * quantity
            + fee.value()
            + impact.value() / 100.0 * quantity;

        let degraded = [slippage, maker, fee, impact]
            .iter()
            .filter(|e| e.is_degraded())
            .count() as u32;

        CostEstimate {
            slippage_pct: slippage.value(),
            fee_usd: fee.value(),
            market_impact_pct: impact.value(),
            net_cost_usd,
            maker_proportion: maker.value(),
            degraded,
        }
    }

    pub fn slippage_model(&self) -> &SlippageModel {
        &self.slippage
    }

    /// Mutable access for feeding realized-fill labels through `observe`
    pub fn slippage_model_mut(&mut self) -> &mut SlippageModel {
        &mut self.slippage
    }

    pub fn maker_taker_model(&self) -> &MakerTakerModel {
        &self.maker_taker
    }

    /// Mutable access for feeding realized-fill labels through `observe`
    pub fn maker_taker_model_mut(&mut self) -> &mut MakerTakerModel {
        &mut self.maker_taker
    }
}
