//! Configuration validation.
//!
//! Every section is checked before any I/O or cycle runs, so a bad config
//! fails at startup instead of mid-cycle.

use crate::domain::error::ArbotError;
use crate::ports::config_port::ConfigPort;

pub fn validate_signal_config(config: &dyn ConfigPort) -> Result<(), ArbotError> {
    require_number(config, "signal", "buy_threshold")?;
    require_number(config, "signal", "sell_threshold")?;
    validate_positive_int(config, "signal", "step_secs", 60)?;
    validate_positive_int(config, "signal", "rolling_window_secs", 7200)?;
    validate_non_negative_int(config, "signal", "lag_bars", 10)?;
    validate_non_negative(config, "signal", "min_spread_ratio", 0.0035)?;
    validate_positive_int(config, "signal", "min_samples", 20)?;
    validate_positive_int(config, "signal", "cutoff_secs", 21_600)?;
    Ok(())
}

pub fn validate_store_config(config: &dyn ConfigPort) -> Result<(), ArbotError> {
    validate_non_negative_int(config, "store", "flush_interval_secs", 60)?;
    validate_positive_int(config, "store", "rollover_bytes", 65_536)?;
    Ok(())
}

pub fn validate_trader_config(config: &dyn ConfigPort) -> Result<(), ArbotError> {
    let commission = config.get_double("trader", "commission", 0.005);
    if !(0.0..1.0).contains(&commission) {
        return Err(ArbotError::ConfigInvalid {
            section: "trader".into(),
            key: "commission".into(),
            reason: "commission must be between 0 and 1".into(),
        });
    }
    let equity = config.get_double("trader", "initial_equity", 1000.0);
    if equity <= 0.0 {
        return Err(ArbotError::ConfigInvalid {
            section: "trader".into(),
            key: "initial_equity".into(),
            reason: "initial_equity must be positive".into(),
        });
    }
    Ok(())
}

pub fn validate_simulator_config(config: &dyn ConfigPort) -> Result<(), ArbotError> {
    validate_positive_int(config, "simulator", "frequency_secs", 10)?;

    let after = optional_timestamp(config, "after")?;
    let before = optional_timestamp(config, "before")?;
    if let (Some(after), Some(before)) = (after, before) {
        if after >= before {
            return Err(ArbotError::ConfigInvalid {
                section: "simulator".into(),
                key: "after".into(),
                reason: "after must precede before".into(),
            });
        }
    }
    Ok(())
}

pub fn validate_datasets_config(config: &dyn ConfigPort) -> Result<(), ArbotError> {
    for key in ["source", "orderbook"] {
        match config.get_string("datasets", key) {
            Some(name) if !name.trim().is_empty() => {}
            _ => {
                return Err(ArbotError::ConfigMissing {
                    section: "datasets".into(),
                    key: key.into(),
                });
            }
        }
    }
    Ok(())
}

fn optional_timestamp(config: &dyn ConfigPort, key: &str) -> Result<Option<i64>, ArbotError> {
    match config.get_string("simulator", key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<i64>()
            .map(Some)
            .map_err(|_| ArbotError::ConfigInvalid {
                section: "simulator".into(),
                key: key.into(),
                reason: "expected a unix-seconds timestamp".into(),
            }),
    }
}

fn require_number(config: &dyn ConfigPort, section: &str, key: &str) -> Result<(), ArbotError> {
    match config.get_string(section, key) {
        Some(raw) if raw.trim().parse::<f64>().is_ok() => Ok(()),
        Some(_) => Err(ArbotError::ConfigInvalid {
            section: section.into(),
            key: key.into(),
            reason: "expected a number".into(),
        }),
        None => Err(ArbotError::ConfigMissing {
            section: section.into(),
            key: key.into(),
        }),
    }
}

fn validate_positive_int(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: i64,
) -> Result<(), ArbotError> {
    let value = config.get_int(section, key, default);
    if value <= 0 {
        return Err(ArbotError::ConfigInvalid {
            section: section.into(),
            key: key.into(),
            reason: format!("{key} must be positive"),
        });
    }
    Ok(())
}

fn validate_non_negative_int(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: i64,
) -> Result<(), ArbotError> {
    let value = config.get_int(section, key, default);
    if value < 0 {
        return Err(ArbotError::ConfigInvalid {
            section: section.into(),
            key: key.into(),
            reason: format!("{key} must be non-negative"),
        });
    }
    Ok(())
}

fn validate_non_negative(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: f64,
) -> Result<(), ArbotError> {
    let value = config.get_double(section, key, default);
    if value < 0.0 {
        return Err(ArbotError::ConfigInvalid {
            section: section.into(),
            key: key.into(),
            reason: format!("{key} must be non-negative"),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct MapConfig {
        values: HashMap<(String, String), String>,
    }

    impl MapConfig {
        fn new(entries: &[(&str, &str, &str)]) -> Self {
            MapConfig {
                values: entries
                    .iter()
                    .map(|(s, k, v)| ((s.to_string(), k.to_string()), v.to_string()))
                    .collect(),
            }
        }
    }

    impl ConfigPort for MapConfig {
        fn get_string(&self, section: &str, key: &str) -> Option<String> {
            self.values
                .get(&(section.to_string(), key.to_string()))
                .cloned()
        }
        fn get_int(&self, section: &str, key: &str, default: i64) -> i64 {
            self.get_string(section, key)
                .and_then(|v| v.parse().ok())
                .unwrap_or(default)
        }
        fn get_double(&self, section: &str, key: &str, default: f64) -> f64 {
            self.get_string(section, key)
                .and_then(|v| v.parse().ok())
                .unwrap_or(default)
        }
        fn get_bool(&self, section: &str, key: &str, default: bool) -> bool {
            self.get_string(section, key)
                .and_then(|v| v.parse().ok())
                .unwrap_or(default)
        }
    }

    fn valid_signal() -> MapConfig {
        MapConfig::new(&[
            ("signal", "buy_threshold", "8"),
            ("signal", "sell_threshold", "-5"),
        ])
    }

    #[test]
    fn signal_config_with_thresholds_passes() {
        assert!(validate_signal_config(&valid_signal()).is_ok());
    }

    #[test]
    fn missing_buy_threshold_fails() {
        let config = MapConfig::new(&[("signal", "sell_threshold", "-5")]);
        match validate_signal_config(&config) {
            Err(ArbotError::ConfigMissing { section, key }) => {
                assert_eq!(section, "signal");
                assert_eq!(key, "buy_threshold");
            }
            other => panic!("expected ConfigMissing, got: {other:?}"),
        }
    }

    #[test]
    fn non_numeric_threshold_fails() {
        let config = MapConfig::new(&[
            ("signal", "buy_threshold", "lots"),
            ("signal", "sell_threshold", "-5"),
        ]);
        assert!(matches!(
            validate_signal_config(&config),
            Err(ArbotError::ConfigInvalid { .. })
        ));
    }

    #[test]
    fn zero_step_fails() {
        let config = MapConfig::new(&[
            ("signal", "buy_threshold", "8"),
            ("signal", "sell_threshold", "-5"),
            ("signal", "step_secs", "0"),
        ]);
        assert!(matches!(
            validate_signal_config(&config),
            Err(ArbotError::ConfigInvalid { .. })
        ));
    }

    #[test]
    fn commission_out_of_range_fails() {
        let config = MapConfig::new(&[("trader", "commission", "1.5")]);
        assert!(matches!(
            validate_trader_config(&config),
            Err(ArbotError::ConfigInvalid { .. })
        ));
    }

    #[test]
    fn simulator_bounds_must_be_ordered() {
        let config = MapConfig::new(&[
            ("simulator", "after", "2000"),
            ("simulator", "before", "1000"),
        ]);
        assert!(matches!(
            validate_simulator_config(&config),
            Err(ArbotError::ConfigInvalid { .. })
        ));
    }

    #[test]
    fn simulator_bounds_optional() {
        let config = MapConfig::new(&[]);
        assert!(validate_simulator_config(&config).is_ok());
    }

    #[test]
    fn datasets_required() {
        let config = MapConfig::new(&[("datasets", "source", "bitfinex_btcusd")]);
        match validate_datasets_config(&config) {
            Err(ArbotError::ConfigMissing { section, key }) => {
                assert_eq!(section, "datasets");
                assert_eq!(key, "orderbook");
            }
            other => panic!("expected ConfigMissing, got: {other:?}"),
        }
    }

    #[test]
    fn store_defaults_pass() {
        assert!(validate_store_config(&MapConfig::new(&[])).is_ok());
    }
}
