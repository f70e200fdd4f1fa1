// Simulation controller
// Orchestrates "new book state -> recompute all models -> record latency"
// and publishes each result as one atomic snapshot swap. The feed task is
// the sole writer; display and metrics readers clone the latest snapshot
// and never hold up the writer.

use crate::config::Config;
use crate::core::monitoring::LatencyWindow;
use crate::core::orderbook::{BookUpdate, OrderBookStore, PriceLevel};
use crate::error::{SimulatorError, SimulatorResult};
use crate::models::{CostEstimate, CostModelPipeline, FeatureSnapshot, OrderType};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Instant;
use tracing::debug;

/// Depth of the display ladder carried in each published snapshot
pub const DISPLAY_DEPTH: usize = 10;

/// Configuration of the hypothetical order being costed
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationParameters {
    pub exchange: String,
    pub pair: String,
    pub order_type: OrderType,
    /// USD notional
    pub quantity: f64,
    /// Fractional daily volatility
    pub volatility: f64,
    pub fee_tier: String,
}

impl SimulationParameters {
    /// Build from the configured defaults
    pub fn from_config(config: &Config) -> SimulatorResult<Self> {
        let sim = &config.simulation;
        let order_type: OrderType = sim
            .order_type
            .parse()
            .map_err(|e: String| SimulatorError::InvalidParameter("order_type".to_string(), e))?;

        Ok(Self {
            exchange: sim.exchange.clone(),
            pair: sim.pair.clone(),
            order_type,
            quantity: sim.quantity,
            volatility: sim.volatility,
            fee_tier: sim.fee_tier.clone(),
        })
    }
}

/// One atomically published result set: the estimate, the features it was
/// computed from, and the book view it was computed on. Readers always see
/// the triple from a single update, never a torn mix.
#[derive(Debug, Clone)]
pub struct ResultsSnapshot {
    pub estimate: CostEstimate,
    pub features: Option<FeatureSnapshot>,
    pub bids: Vec<PriceLevel>,
    pub asks: Vec<PriceLevel>,
    pub mid_price: Option<f64>,
    pub sequence: u64,
}

impl ResultsSnapshot {
    fn empty() -> Self {
        Self {
            estimate: CostEstimate::default(),
            features: None,
            bids: Vec::new(),
            asks: Vec::new(),
            mid_price: None,
            sequence: 0,
        }
    }
}

/// State touched only on the writer path
struct WriterState {
    book: OrderBookStore,
    pipeline: CostModelPipeline,
    latency: LatencyWindow,
}

pub struct SimulationController {
    config: Config,
    params: RwLock<SimulationParameters>,
    writer: Mutex<WriterState>,
    published: RwLock<Arc<ResultsSnapshot>>,
    message_count: AtomicU64,
    degraded_total: AtomicU64,
    crossed_total: AtomicU64,
    /// Average latency bits, refreshed by the writer after each update
    avg_latency_bits: AtomicU64,
    connected: AtomicBool,
    started_at: Instant,
}

impl SimulationController {
    pub fn new(config: Config, params: SimulationParameters) -> SimulatorResult<Self> {
        let rates = Self::lookup_rates(&config, &params)?;

        Ok(Self {
            config,
            params: RwLock::new(params),
            writer: Mutex::new(WriterState {
                book: OrderBookStore::new(),
                pipeline: CostModelPipeline::new(rates.0, rates.1),
                latency: LatencyWindow::new(),
            }),
            published: RwLock::new(Arc::new(ResultsSnapshot::empty())),
            message_count: AtomicU64::new(0),
            degraded_total: AtomicU64::new(0),
            crossed_total: AtomicU64::new(0),
            avg_latency_bits: AtomicU64::new(0f64.to_bits()),
            connected: AtomicBool::new(false),
            started_at: Instant::now(),
        })
    }

    fn lookup_rates(config: &Config, params: &SimulationParameters) -> SimulatorResult<(f64, f64)> {
        let exchange = config
            .exchange(&params.exchange)
            .ok_or_else(|| SimulatorError::UnknownExchange(params.exchange.clone()))?;

        if !exchange.available_pairs.contains(&params.pair) {
            return Err(SimulatorError::InvalidParameter(
                "pair".to_string(),
                format!("'{}' not available on {}", params.pair, params.exchange),
            ));
        }

        let tier = exchange.fee_tiers.get(&params.fee_tier).ok_or_else(|| {
            SimulatorError::UnknownFeeTier {
                exchange: params.exchange.clone(),
                tier: params.fee_tier.clone(),
            }
        })?;

        Ok((tier.maker, tier.taker))
    }

    /// Atomically swap the parameter set; refreshes the fee model's active
    /// rates when the exchange or tier changed.
    pub fn set_parameters(&self, params: SimulationParameters) -> SimulatorResult<()> {
        if params.quantity <= 0.0 {
            return Err(SimulatorError::InvalidParameter(
                "quantity".to_string(),
                "must be positive".to_string(),
            ));
        }
        let rates = Self::lookup_rates(&self.config, &params)?;

        let rates_changed = {
            let current = self.params.read().unwrap();
            current.exchange != params.exchange || current.fee_tier != params.fee_tier
        };
        if rates_changed {
            let mut writer = self.writer.lock().unwrap();
            writer.pipeline.set_fee_rates(rates.0, rates.1);
        }

        *self.params.write().unwrap() = params;
        Ok(())
    }

    pub fn parameters(&self) -> SimulationParameters {
        self.params.read().unwrap().clone()
    }

    /// Process one decoded book update: replace book state, rebuild the
    /// feature snapshot, run the model pipeline, publish, record latency.
    ///
    /// Called only from the feed path (single writer).
    pub fn on_book_update(&self, update: BookUpdate) {
        let start = Instant::now();
        let params = self.params.read().unwrap().clone();

        let mut writer = self.writer.lock().unwrap();
        let state = writer.book.replace(update);
        self.crossed_total
            .store(writer.book.crossed_count(), Ordering::Relaxed);

        let snapshot = if state.has_both_sides() {
            let features = FeatureSnapshot::from_book(
                &state,
                params.quantity,
                params.volatility,
                params.order_type,
            );
            let estimate = writer.pipeline.evaluate(&features);
            if estimate.degraded > 0 {
                self.degraded_total
                    .fetch_add(estimate.degraded as u64, Ordering::Relaxed);
            }

            let (bids, asks) = state.top_levels(DISPLAY_DEPTH);
            ResultsSnapshot {
                estimate,
                features: Some(features),
                bids,
                asks,
                mid_price: state.mid_price(),
                sequence: state.sequence,
            }
        } else {
            // One-sided book: the previous estimate stays valid for readers
            let previous = self.published.read().unwrap().clone();
            let (bids, asks) = state.top_levels(DISPLAY_DEPTH);
            ResultsSnapshot {
                estimate: previous.estimate,
                features: previous.features,
                bids,
                asks,
                mid_price: state.mid_price(),
                sequence: state.sequence,
            }
        };

        let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;
        writer.latency.push(elapsed_ms);
        self.avg_latency_bits
            .store(writer.latency.average().to_bits(), Ordering::Relaxed);
        drop(writer);

        *self.published.write().unwrap() = Arc::new(snapshot);

        let count = self.message_count.fetch_add(1, Ordering::Relaxed) + 1;
        if count % 100 == 0 {
            debug!(
                messages = count,
                latency_ms = elapsed_ms,
                "Processed book updates"
            );
        }
    }

    /// Latest published snapshot; cheap to call from any reader
    pub fn snapshot(&self) -> Arc<ResultsSnapshot> {
        self.published.read().unwrap().clone()
    }

    pub fn has_data(&self) -> bool {
        self.snapshot().sequence > 0
    }

    // Read-only accessor surface for the display/metrics collaborators

    pub fn slippage_pct(&self) -> f64 {
        self.snapshot().estimate.slippage_pct
    }

    pub fn fee_usd(&self) -> f64 {
        self.snapshot().estimate.fee_usd
    }

    pub fn market_impact_pct(&self) -> f64 {
        self.snapshot().estimate.market_impact_pct
    }

    pub fn net_cost_usd(&self) -> f64 {
        self.snapshot().estimate.net_cost_usd
    }

    pub fn maker_proportion(&self) -> f64 {
        self.snapshot().estimate.maker_proportion
    }

    pub fn mid_price(&self) -> Option<f64> {
        self.snapshot().mid_price
    }

    /// Bounded bid/ask ladder for display
    pub fn top_of_book(&self) -> (Vec<PriceLevel>, Vec<PriceLevel>) {
        let snapshot = self.snapshot();
        (snapshot.bids.clone(), snapshot.asks.clone())
    }

    /// Running average processing latency in milliseconds
    pub fn average_latency_ms(&self) -> f64 {
        f64::from_bits(self.avg_latency_bits.load(Ordering::Relaxed))
    }

    pub fn message_count(&self) -> u64 {
        self.message_count.load(Ordering::Relaxed)
    }

    /// Messages per second since controller start
    pub fn processing_rate(&self) -> f64 {
        let elapsed = self.started_at.elapsed().as_secs_f64();
        if elapsed <= 0.0 {
            return 0.0;
        }
        self.message_count() as f64 / elapsed
    }

    /// Total model computations that fell back to a safe default
    pub fn degraded_total(&self) -> u64 {
        self.degraded_total.load(Ordering::Relaxed)
    }

    /// Crossed books accepted since start
    pub fn crossed_books(&self) -> u64 {
        self.crossed_total.load(Ordering::Relaxed)
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }

    /// Connection status, maintained by the feed connector
    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_controller() -> SimulationController {
        let config = Config::default();
        let params = SimulationParameters::from_config(&config).unwrap();
        SimulationController::new(config, params).unwrap()
    }

    fn book_update(bids: Vec<(f64, f64)>, asks: Vec<(f64, f64)>) -> BookUpdate {
        BookUpdate {
            timestamp: "2024-01-01T00:00:00Z".to_string(),
            exchange: "OKX".to_string(),
            symbol: "BTC-USDT-SWAP".to_string(),
            bids: Some(
                bids.into_iter()
                    .map(|(price, size)| PriceLevel { price, size })
                    .collect(),
            ),
            asks: Some(
                asks.into_iter()
                    .map(|(price, size)| PriceLevel { price, size })
                    .collect(),
            ),
        }
    }

    #[test]
    fn test_update_publishes_consistent_snapshot() {
        let controller = test_controller();
        controller.on_book_update(book_update(
            vec![(100.0, 2.0), (99.0, 5.0)],
            vec![(101.0, 3.0), (102.0, 4.0)],
        ));

        let snapshot = controller.snapshot();
        assert_eq!(snapshot.sequence, 1);
        assert_eq!(snapshot.mid_price, Some(100.5));
        assert_eq!(snapshot.bids[0].price, 100.0);
        assert_eq!(snapshot.asks[0].price, 101.0);

        let estimate = &snapshot.estimate;
        let quantity = controller.parameters().quantity;
        let expected = estimate.slippage_pct / 100.0 * quantity
            + estimate.fee_usd
            + estimate.market_impact_pct / 100.0 * quantity;
        assert_eq!(estimate.net_cost_usd, expected);

        assert_eq!(controller.message_count(), 1);
        assert!(controller.average_latency_ms() >= 0.0);
    }

    #[test]
    fn test_one_sided_book_keeps_previous_estimate() {
        let controller = test_controller();
        controller.on_book_update(book_update(
            vec![(100.0, 2.0)],
            vec![(101.0, 3.0)],
        ));
        let first = controller.snapshot();
        assert!(first.estimate.net_cost_usd > 0.0);

        controller.on_book_update(BookUpdate {
            timestamp: String::new(),
            exchange: "OKX".to_string(),
            symbol: "BTC-USDT-SWAP".to_string(),
            bids: Some(Vec::new()),
            asks: None,
        });

        let second = controller.snapshot();
        assert_eq!(second.sequence, 2);
        assert_eq!(second.mid_price, None);
        // Estimate carried over unchanged
        assert_eq!(second.estimate, first.estimate);
        assert_eq!(controller.message_count(), 2);
    }

    #[test]
    fn test_set_parameters_swaps_fee_rates() {
        let controller = test_controller();
        let mut params = controller.parameters();
        params.fee_tier = "VIP 5".to_string();
        controller.set_parameters(params).unwrap();

        controller.on_book_update(book_update(
            vec![(100.0, 5.0)],
            vec![(101.0, 5.0)],
        ));

        // Market order, fully taker at VIP 5 rate 0.0003
        let fee = controller.fee_usd();
        assert!((fee - 100.0 * 0.0003).abs() < 1e-12);
    }

    #[test]
    fn test_set_parameters_rejects_unknown_tier() {
        let controller = test_controller();
        let mut params = controller.parameters();
        params.fee_tier = "VIP 99".to_string();
        assert!(matches!(
            controller.set_parameters(params),
            Err(SimulatorError::UnknownFeeTier { .. })
        ));
    }

    #[test]
    fn test_set_parameters_rejects_bad_quantity() {
        let controller = test_controller();
        let mut params = controller.parameters();
        params.quantity = -5.0;
        assert!(controller.set_parameters(params).is_err());
    }

    #[test]
    fn test_crossed_book_counted() {
        let controller = test_controller();
        controller.on_book_update(book_update(
            vec![(102.0, 1.0)],
            vec![(101.0, 1.0)],
        ));
        assert_eq!(controller.crossed_books(), 1);
        // Still produced an estimate
        assert!(controller.has_data());
    }

    #[test]
    fn test_processing_rate_counts_messages() {
        let controller = test_controller();
        for _ in 0..5 {
            controller.on_book_update(book_update(
                vec![(100.0, 1.0)],
                vec![(101.0, 1.0)],
            ));
        }
        assert_eq!(controller.message_count(), 5);
        assert!(controller.processing_rate() > 0.0);
    }

    #[test]
    fn test_readers_see_stable_generation() {
        let controller = Arc::new(test_controller());
        controller.on_book_update(book_update(
            vec![(100.0, 2.0)],
            vec![(101.0, 3.0)],
        ));

        let held = controller.snapshot();
        controller.on_book_update(book_update(
            vec![(200.0, 2.0)],
            vec![(201.0, 3.0)],
        ));

        // The held generation is untouched by the newer update
        assert_eq!(held.mid_price, Some(100.5));
        assert_eq!(controller.snapshot().mid_price, Some(200.5));
    }
}
