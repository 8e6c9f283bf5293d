use crate::validation::{ConfigValidator, ValidationUtils};
use serde::{Deserialize, Serialize};

/// Strategy names accepted by `simulation.default_strategy`
pub const VALID_STRATEGIES: [&str; 3] = ["fcfs", "sjf", "round_robin"];

const MAX_QUANTUM_MS: u64 = 10_000;
const MAX_BATCH_SIZE: usize = 10_000;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SimulationConfig {
    pub default_strategy: String,
    pub round_robin: RoundRobinConfig,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            default_strategy: "fcfs".to_string(),
            round_robin: RoundRobinConfig::default(),
        }
    }
}

impl ConfigValidator for SimulationConfig {
    fn validate(&self) -> crate::ConfigResult<()> {
        ValidationUtils::validate_one_of(
            &self.default_strategy,
            "simulation.default_strategy",
            &VALID_STRATEGIES,
        )?;
        self.round_robin.validate()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RoundRobinConfig {
    pub quantum_ms: u64,
    pub context_switch_ms: u64,
}

impl Default for RoundRobinConfig {
    fn default() -> Self {
        Self {
            quantum_ms: 100,
            context_switch_ms: 10,
        }
    }
}

impl ConfigValidator for RoundRobinConfig {
    fn validate(&self) -> crate::ConfigResult<()> {
        ValidationUtils::validate_millis(
            self.quantum_ms,
            "simulation.round_robin.quantum_ms",
            MAX_QUANTUM_MS,
        )?;
        if self.context_switch_ms > self.quantum_ms {
            return Err(crate::ConfigError::Validation(format!(
                "simulation.round_robin.context_switch_ms ({}) must not exceed quantum_ms ({})",
                self.context_switch_ms, self.quantum_ms
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BatchConfig {
    pub name_prefix: String,
    pub simple: usize,
    pub medium: usize,
    pub complex: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            name_prefix: "Circuit".to_string(),
            simple: 3,
            medium: 2,
            complex: 1,
        }
    }
}

impl BatchConfig {
    pub fn total(&self) -> usize {
        self.simple + self.medium + self.complex
    }
}

impl ConfigValidator for BatchConfig {
    fn validate(&self) -> crate::ConfigResult<()> {
        ValidationUtils::validate_not_empty(&self.name_prefix, "batch.name_prefix")?;
        ValidationUtils::validate_max_count(self.total(), "batch size", MAX_BATCH_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(SimulationConfig::default().validate().is_ok());
        assert!(BatchConfig::default().validate().is_ok());
        assert_eq!(RoundRobinConfig::default().quantum_ms, 100);
        assert_eq!(RoundRobinConfig::default().context_switch_ms, 10);
    }

    #[test]
    fn test_unknown_strategy_rejected() {
        let config = SimulationConfig {
            default_strategy: "lottery".to_string(),
            ..SimulationConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_context_switch_longer_than_quantum_rejected() {
        let config = RoundRobinConfig {
            quantum_ms: 10,
            context_switch_ms: 20,
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_quantum_rejected() {
        let config = RoundRobinConfig {
            quantum_ms: 0,
            context_switch_ms: 0,
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_batch_limits() {
        let empty_prefix = BatchConfig {
            name_prefix: " ".to_string(),
            ..BatchConfig::default()
        };
        assert!(empty_prefix.validate().is_err());

        let too_big = BatchConfig {
            simple: 10_000,
            medium: 1,
            ..BatchConfig::default()
        };
        assert!(too_big.validate().is_err());
    }
}
