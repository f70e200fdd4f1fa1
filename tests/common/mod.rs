// Shared helpers for integration tests

use std::sync::Arc;
use trade_simulator::{
    BookUpdate, Config, PriceLevel, SimulationController, SimulationParameters,
};

pub fn create_test_config() -> Config {
    Config::default()
}

pub fn create_test_controller() -> Arc<SimulationController> {
    let config = create_test_config();
    let params = SimulationParameters::from_config(&config).unwrap();
    Arc::new(SimulationController::new(config, params).unwrap())
}

pub fn book_update(bids: &[(f64, f64)], asks: &[(f64, f64)]) -> BookUpdate {
    BookUpdate {
        timestamp: "2024-01-01T00:00:00Z".to_string(),
        exchange: "OKX".to_string(),
        symbol: "BTC-USDT-SWAP".to_string(),
        bids: Some(
            bids.iter()
                .map(|&(price, size)| PriceLevel { price, size })
                .collect(),
        ),
        asks: Some(
            asks.iter()
                .map(|&(price, size)| PriceLevel { price, size })
                .collect(),
        ),
    }
}
