// Configuration management for the trade simulator

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Maker/taker rate pair for one fee tier
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct FeeTier {
    pub maker: f64,
    pub taker: f64,
}

/// Static configuration for one exchange
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExchangeConfig {
    pub name: String,
    /// Base websocket URL; the pair identifier is appended to form the endpoint
    pub websocket_url: String,
    pub available_pairs: Vec<String>,
    pub fee_tiers: BTreeMap<String, FeeTier>,
}

impl ExchangeConfig {
    /// Full endpoint URL for a trading pair
    pub fn endpoint_for(&self, pair: &str) -> String {
        format!("{}{}", self.websocket_url, pair)
    }
}

/// Default values for the hypothetical order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationDefaults {
    pub exchange: String,
    pub pair: String,
    pub order_type: String,
    /// USD notional
    pub quantity: f64,
    /// Fractional daily volatility
    pub volatility: f64,
    pub fee_tier: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringConfig {
    /// Metrics report interval in seconds
    pub report_interval_secs: u64,
    /// Display refresh tick in milliseconds
    pub display_refresh_ms: u64,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            report_interval_secs: 10,
            display_refresh_ms: 100,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub exchanges: Vec<ExchangeConfig>,
    pub simulation: SimulationDefaults,
    pub monitoring: MonitoringConfig,
}

impl Default for Config {
    fn default() -> Self {
        let mut fee_tiers = BTreeMap::new();
        fee_tiers.insert("VIP 0".to_string(), FeeTier { maker: 0.0008, taker: 0.0010 });
        fee_tiers.insert("VIP 1".to_string(), FeeTier { maker: 0.0007, taker: 0.0009 });
        fee_tiers.insert("VIP 2".to_string(), FeeTier { maker: 0.0006, taker: 0.0008 });
        fee_tiers.insert("VIP 3".to_string(), FeeTier { maker: 0.0005, taker: 0.0007 });
        fee_tiers.insert("VIP 4".to_string(), FeeTier { maker: 0.0003, taker: 0.0005 });
        fee_tiers.insert("VIP 5".to_string(), FeeTier { maker: 0.0000, taker: 0.0003 });

        Self {
            exchanges: vec![ExchangeConfig {
                name: "OKX".to_string(),
                websocket_url: "wss://ws.gomarket-cpp.goquant.io/ws/l2-orderbook/okx/"
                    .to_string(),
                available_pairs: vec![
                    "BTC-USDT-SWAP".to_string(),
                    "ETH-USDT-SWAP".to_string(),
                    "SOL-USDT-SWAP".to_string(),
                    "XRP-USDT-SWAP".to_string(),
                ],
                fee_tiers,
            }],
            simulation: SimulationDefaults {
                exchange: "OKX".to_string(),
                pair: "BTC-USDT-SWAP".to_string(),
                order_type: "market".to_string(),
                quantity: 100.0,
                volatility: 0.02,
                fee_tier: "VIP 0".to_string(),
            },
            monitoring: MonitoringConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)
            .map_err(|e| ConfigError::FileRead(e.to_string()))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| ConfigError::Parse(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::Serialize(e.to_string()))?;

        fs::write(path, content)
            .map_err(|e| ConfigError::FileWrite(e.to_string()))?;

        Ok(())
    }

    /// Load configuration from file, or create default if file doesn't exist
    pub fn load_or_create<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        if path.as_ref().exists() {
            Self::from_file(path)
        } else {
            let config = Self::default();
            config.to_file(&path)?;
            tracing::info!("Created default config file: {}", path.as_ref().display());
            Ok(config)
        }
    }

    /// Look up an exchange by name
    pub fn exchange(&self, name: &str) -> Option<&ExchangeConfig> {
        self.exchanges.iter().find(|e| e.name == name)
    }

    /// Look up the rate pair for an exchange/tier combination
    pub fn fee_rates(&self, exchange: &str, tier: &str) -> Option<FeeTier> {
        self.exchange(exchange)
            .and_then(|e| e.fee_tiers.get(tier).copied())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.exchanges.is_empty() {
            return Err(ConfigError::Validation(
                "at least one exchange must be configured".to_string(),
            ));
        }

        for exchange in &self.exchanges {
            if exchange.websocket_url.is_empty() {
                return Err(ConfigError::Validation(format!(
                    "websocket_url missing for exchange {}",
                    exchange.name
                )));
            }
            if exchange.available_pairs.is_empty() {
                return Err(ConfigError::Validation(format!(
                    "no tradable pairs configured for exchange {}",
                    exchange.name
                )));
            }
            if exchange.fee_tiers.is_empty() {
                return Err(ConfigError::Validation(format!(
                    "no fee tiers configured for exchange {}",
                    exchange.name
                )));
            }
            for (tier, rates) in &exchange.fee_tiers {
                if rates.maker < 0.0 || rates.taker < 0.0 {
                    return Err(ConfigError::Validation(format!(
                        "negative fee rate in tier '{}' for exchange {}",
                        tier, exchange.name
                    )));
                }
            }
        }

        let sim = &self.simulation;
        let default_exchange = self
            .exchange(&sim.exchange)
            .ok_or_else(|| {
                ConfigError::Validation(format!("default exchange '{}' not configured", sim.exchange))
            })?;

        if !default_exchange.available_pairs.contains(&sim.pair) {
            return Err(ConfigError::Validation(format!(
                "default pair '{}' not available on {}",
                sim.pair, sim.exchange
            )));
        }
        if !default_exchange.fee_tiers.contains_key(&sim.fee_tier) {
            return Err(ConfigError::Validation(format!(
                "default fee tier '{}' not available on {}",
                sim.fee_tier, sim.exchange
            )));
        }
        if sim.order_type != "market" && sim.order_type != "limit" {
            return Err(ConfigError::Validation(format!(
                "order_type must be 'market' or 'limit', got '{}'",
                sim.order_type
            )));
        }
        if sim.quantity <= 0.0 {
            return Err(ConfigError::Validation(
                "quantity must be positive".to_string(),
            ));
        }
        if sim.volatility < 0.0 {
            return Err(ConfigError::Validation(
                "volatility must be non-negative".to_string(),
            ));
        }
        if self.monitoring.display_refresh_ms == 0 {
            return Err(ConfigError::Validation(
                "display_refresh_ms must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(String),

    #[error("Failed to write config file: {0}")]
    FileWrite(String),

    #[error("Failed to parse config: {0}")]
    Parse(String),

    #[error("Failed to serialize config: {0}")]
    Serialize(String),

    #[error("Configuration validation error: {0}")]
    Validation(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_fee_rate_lookup() {
        let config = Config::default();
        let rates = config.fee_rates("OKX", "VIP 0").unwrap();
        assert_eq!(rates.maker, 0.0008);
        assert_eq!(rates.taker, 0.0010);

        assert!(config.fee_rates("OKX", "VIP 9").is_none());
        assert!(config.fee_rates("Nope", "VIP 0").is_none());
    }

    #[test]
    fn test_endpoint_construction() {
        let config = Config::default();
        let exchange = config.exchange("OKX").unwrap();
        assert_eq!(
            exchange.endpoint_for("BTC-USDT-SWAP"),
            "wss://ws.gomarket-cpp.goquant.io/ws/l2-orderbook/okx/BTC-USDT-SWAP"
        );
    }

    #[test]
    fn test_validation_rejects_bad_defaults() {
        let mut config = Config::default();
        config.simulation.pair = "DOGE-USD".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.simulation.quantity = 0.0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.simulation.order_type = "stop".to_string();
        assert!(config.validate().is_err());
    }
}
