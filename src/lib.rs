// Trade Cost Simulator Library
//
// Streams L2 order-book snapshots for a single trading pair and continuously
// re-estimates the transaction cost (slippage, fees, market impact,
// maker/taker split) of a configurable hypothetical order.

pub mod clients;
pub mod config;
pub mod core;
pub mod error;
pub mod models;

// Re-export core pipeline types
pub use crate::core::{
    BookState, BookUpdate, LatencyWindow, MetricsSampler, OrderBookStore, PriceLevel,
    ResultsSnapshot, SimulationController, SimulationParameters,
};

// Re-export error types
pub use error::{DegradeReason, Estimate, SimulatorError, SimulatorResult};

// Re-export client types
pub use clients::{decode_book_message, FeedConnector};

// Re-export configuration
pub use config::{Config, ConfigError, ExchangeConfig, FeeTier, SimulationDefaults};

// Re-export model types
pub use models::{
    CostEstimate, CostModelPipeline, FeatureSnapshot, FeeModel, MakerTakerModel,
    MarketImpactModel, OnlineModel, OrderType, SlippageModel, TrainingWindow,
};
