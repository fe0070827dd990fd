//! Tunable parameters of the engine.
//!
//! Every section defaults to the canonical game-balance values, so an empty
//! YAML document (or no file at all) yields the stock engine.

use cultivation_core::MAX_INNER_DEMON;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        #[from]
        source: serde_yaml::Error,
    },
    #[error("invalid configuration: {reason}")]
    Invalid { reason: String },
}

/// Top-level engine configuration.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub accrual: AccrualConfig,
    pub breakthrough: BreakthroughConfig,
    pub tribulation: TribulationConfig,
    pub construction: ConstructionConfig,
    pub remediation: RemediationConfig,
}

/// Online/offline qi settlement.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccrualConfig {
    /// Minimum whole minutes before a live tick settles.
    pub online_threshold_minutes: i64,
    /// Minimum whole minutes before an offline catch-up settles.
    pub offline_threshold_minutes: i64,
    /// Elapsed minutes beyond this are dropped.
    pub max_elapsed_minutes: i64,
    pub online_rate: f64,
    pub offline_rate: f64,
}

impl Default for AccrualConfig {
    fn default() -> Self {
        Self {
            online_threshold_minutes: 1,
            offline_threshold_minutes: 5,
            max_elapsed_minutes: 24 * 60,
            online_rate: 1.0,
            offline_rate: 0.5,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BreakthroughConfig {
    /// Luck stat; 50 is neutral.
    pub luck: f64,
    /// Fraction of `max_qi` required to attempt.
    pub progress_gate: f64,
    pub boost_bonus: f64,
    pub min_chance: f64,
    pub max_chance: f64,
    /// Fraction of current qi lost on a failed attempt.
    pub failure_qi_loss: f64,
    pub failure_inner_demon: u8,
}

impl Default for BreakthroughConfig {
    fn default() -> Self {
        Self {
            luck: 50.0,
            progress_gate: 0.8,
            boost_bonus: 0.2,
            min_chance: 0.05,
            max_chance: 0.95,
            failure_qi_loss: 0.3,
            failure_inner_demon: 10,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TribulationConfig {
    pub progress_gate: f64,
    pub starting_health: i64,
    pub min_chance: f64,
    pub max_chance: f64,
    /// Fraction of a cleared wave's damage still taken.
    pub chip_fraction: f64,
}

impl Default for TribulationConfig {
    fn default() -> Self {
        Self {
            progress_gate: 0.8,
            starting_health: 1000,
            min_chance: 0.1,
            max_chance: 0.9,
            chip_fraction: 0.3,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConstructionConfig {
    pub speed_up_cost_per_minute: u64,
}

impl Default for ConstructionConfig {
    fn default() -> Self {
        Self {
            speed_up_cost_per_minute: 10,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemediationConfig {
    pub cleanse_cost: u64,
    pub cleanse_amount: u8,
}

impl Default for RemediationConfig {
    fn default() -> Self {
        Self {
            cleanse_cost: 100,
            cleanse_amount: 10,
        }
    }
}

impl EngineConfig {
    /// Parse and validate configuration from a YAML string.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&text)
    }

    /// Reject values that would break the probability or time invariants.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let a = &self.accrual;
        if a.online_threshold_minutes < 0 || a.offline_threshold_minutes < 0 {
            return invalid("accrual thresholds must be >= 0");
        }
        if a.max_elapsed_minutes <= 0 {
            return invalid("accrual.max_elapsed_minutes must be > 0");
        }
        if !non_negative(a.online_rate) || !non_negative(a.offline_rate) {
            return invalid("accrual rates must be finite and >= 0");
        }

        let b = &self.breakthrough;
        check_chance_band("breakthrough", b.min_chance, b.max_chance)?;
        if !unit(b.progress_gate) || !unit(b.failure_qi_loss) {
            return invalid("breakthrough gate and qi loss must lie in [0, 1]");
        }
        if !b.luck.is_finite() || !b.boost_bonus.is_finite() {
            return invalid("breakthrough luck and boost must be finite");
        }

        let t = &self.tribulation;
        check_chance_band("tribulation", t.min_chance, t.max_chance)?;
        if !unit(t.progress_gate) || !unit(t.chip_fraction) {
            return invalid("tribulation gate and chip fraction must lie in [0, 1]");
        }
        if t.starting_health <= 0 {
            return invalid("tribulation.starting_health must be > 0");
        }

        if self.construction.speed_up_cost_per_minute == 0 {
            return invalid("construction.speed_up_cost_per_minute must be > 0");
        }

        let r = &self.remediation;
        if r.cleanse_amount == 0 || r.cleanse_amount > MAX_INNER_DEMON {
            return invalid("remediation.cleanse_amount must lie in [1, 100]");
        }
        Ok(())
    }
}

fn invalid(reason: &str) -> Result<(), ConfigError> {
    Err(ConfigError::Invalid {
        reason: reason.to_string(),
    })
}

fn non_negative(x: f64) -> bool {
    x.is_finite() && x >= 0.0
}

fn unit(x: f64) -> bool {
    (0.0..=1.0).contains(&x)
}

fn check_chance_band(section: &str, min: f64, max: f64) -> Result<(), ConfigError> {
    if !unit(min) || !unit(max) || min > max {
        return Err(ConfigError::Invalid {
            reason: format!("{section} chance band [{min}, {max}] must satisfy 0 <= min <= max <= 1"),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn empty_document_yields_defaults() {
        let cfg = EngineConfig::from_yaml_str("{}").unwrap();
        assert_eq!(cfg, EngineConfig::default());
        assert_eq!(cfg.accrual.max_elapsed_minutes, 1440);
        assert_eq!(cfg.breakthrough.luck, 50.0);
        assert_eq!(cfg.tribulation.starting_health, 1000);
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let cfg = EngineConfig::from_yaml_str("breakthrough:\n  luck: 75\n").unwrap();
        assert_eq!(cfg.breakthrough.luck, 75.0);
        assert_eq!(cfg.breakthrough.max_chance, 0.95);
        assert_eq!(cfg.accrual, AccrualConfig::default());
    }

    #[test]
    fn inverted_chance_band_is_rejected() {
        let err = EngineConfig::from_yaml_str("tribulation:\n  min_chance: 0.9\n  max_chance: 0.1\n")
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }

    #[test]
    fn cleanse_that_removes_nothing_is_rejected() {
        for amount in ["0", "101"] {
            let yaml = format!("remediation:\n  cleanse_amount: {amount}\n");
            let err = EngineConfig::from_yaml_str(&yaml).unwrap_err();
            assert!(matches!(err, ConfigError::Invalid { .. }), "amount {amount}");
        }
        let cfg = EngineConfig::from_yaml_str("remediation:\n  cleanse_amount: 100\n").unwrap();
        assert_eq!(cfg.remediation.cleanse_amount, 100);
    }

    #[test]
    fn free_speed_ups_are_rejected() {
        let err = EngineConfig::from_yaml_str("construction:\n  speed_up_cost_per_minute: 0\n")
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }

    #[test]
    fn malformed_yaml_is_a_parse_error() {
        let err = EngineConfig::from_yaml_str("accrual: [1, 2").unwrap_err();
        assert!(matches!(err, ConfigError::Yaml { .. }));
    }

    #[test]
    fn shipped_config_matches_defaults() {
        let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../assets/engine.yaml");
        let cfg = EngineConfig::from_file(&path).unwrap();
        assert_eq!(cfg, EngineConfig::default());
    }
}
