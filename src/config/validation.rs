//! Configuration validation
//!
//! Checks semantic constraints before the exporter starts; any violation is
//! fatal at startup. The API URL itself is validated again by the client
//! constructor, which owns URL handling.

use anyhow::Result;

use super::types::Config;

impl Config {
    /// Validate configuration for correctness.
    pub fn validate(&self) -> Result<()> {
        if self.scrape_interval.is_zero() {
            anyhow::bail!("scrape.interval must be greater than zero");
        }
        if self.latency_interval.is_zero() {
            anyhow::bail!("latency.interval must be greater than zero");
        }
        if !self.metric_prefix.is_empty() && !is_valid_metric_prefix(&self.metric_prefix) {
            anyhow::bail!(
                "metric.prefix '{}' is not a valid metric name prefix \
                 (allowed: [a-zA-Z_:][a-zA-Z0-9_:]*)",
                self.metric_prefix
            );
        }
        Ok(())
    }
}

/// Check the prefix against the Prometheus metric-name charset, so an
/// invalid prefix fails at startup instead of on the first scrape.
fn is_valid_metric_prefix(prefix: &str) -> bool {
    let mut chars = prefix.chars();
    let valid_first = |c: char| c.is_ascii_alphabetic() || c == '_' || c == ':';
    let valid_rest = |c: char| c.is_ascii_alphanumeric() || c == '_' || c == ':';
    chars.next().is_some_and(valid_first) && chars.all(valid_rest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn default_config_is_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn zero_intervals_are_rejected() {
        let config = Config {
            scrape_interval: Duration::ZERO,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = Config {
            latency_interval: Duration::ZERO,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn empty_prefix_is_allowed() {
        let config = Config {
            metric_prefix: String::new(),
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn invalid_prefix_is_rejected() {
        for prefix in ["1mihomo", "mi homo", "mi-homo"] {
            let config = Config {
                metric_prefix: prefix.to_string(),
                ..Default::default()
            };
            assert!(config.validate().is_err(), "'{prefix}' should be rejected");
        }
    }
}
