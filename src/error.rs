// Unified error handling for the trade simulator

use crate::config::ConfigError;

/// Main error type for the simulator
#[derive(Debug, thiserror::Error)]
pub enum SimulatorError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Unknown exchange: {0}")]
    UnknownExchange(String),

    #[error("Unknown fee tier '{tier}' for exchange {exchange}")]
    UnknownFeeTier { exchange: String, tier: String },

    #[error("Invalid parameter '{0}': {1}")]
    InvalidParameter(String, String),

    #[error("Feed connection error: {0}")]
    Connection(String),

    #[error("Failed to decode feed message: {0}")]
    Decode(String),
}

impl SimulatorError {
    /// Error category for logging/metrics
    pub fn category(&self) -> &'static str {
        match self {
            SimulatorError::Config(_) => "config",
            SimulatorError::UnknownExchange(_)
            | SimulatorError::UnknownFeeTier { .. }
            | SimulatorError::InvalidParameter(_, _) => "parameter",
            SimulatorError::Connection(_) => "connection",
            SimulatorError::Decode(_) => "decode",
        }
    }
}

/// Result type alias using SimulatorError
pub type SimulatorResult<T> = Result<T, SimulatorError>;

/// Why a model fell back to its safe default
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DegradeReason {
    /// A required input was NaN or infinite
    NonFiniteInput,
    /// The book had no usable levels for the computation
    EmptyBook,
    /// The fitted parameters produced an unusable prediction
    BadPrediction,
}

impl std::fmt::Display for DegradeReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DegradeReason::NonFiniteInput => write!(f, "non-finite input"),
            DegradeReason::EmptyBook => write!(f, "empty book"),
            DegradeReason::BadPrediction => write!(f, "bad prediction"),
        }
    }
}

/// A model output that distinguishes a real estimate from a safe default.
///
/// The models never propagate computation failures to the feed path; instead
/// they return `Degraded` carrying the documented fallback value so a
/// monitoring layer can tell "estimate" apart from "a computation failed".
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Estimate {
    Ok(f64),
    Degraded { value: f64, reason: DegradeReason },
}

impl Estimate {
    /// The numeric value, real or fallback
    pub fn value(&self) -> f64 {
        match self {
            Estimate::Ok(v) => *v,
            Estimate::Degraded { value, .. } => *value,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Estimate::Degraded { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_category() {
        let err = SimulatorError::UnknownExchange("Foo".to_string());
        assert_eq!(err.category(), "parameter");

        let err = SimulatorError::Decode("bad json".to_string());
        assert_eq!(err.category(), "decode");
    }

    #[test]
    fn test_estimate_value_and_flag() {
        let ok = Estimate::Ok(1.5);
        assert_eq!(ok.value(), 1.5);
        assert!(!ok.is_degraded());

        let degraded = Estimate::Degraded {
            value: 0.01,
            reason: DegradeReason::NonFiniteInput,
        };
        assert_eq!(degraded.value(), 0.01);
        assert!(degraded.is_degraded());
    }
}
