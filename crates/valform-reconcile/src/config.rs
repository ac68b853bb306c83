//! Reconciliation configuration

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Settings for extraction, commits and document writes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReconcileConfig {
    /// Delay before a buffered edit is committed, in milliseconds
    pub commit_delay_ms: u64,
    /// Fill missing values from the property's schema `default`
    pub schema_default_fallback: bool,
    /// Input step for `number` properties without `multipleOf`
    pub number_step: f64,
    /// Input step for `integer` properties without `multipleOf`
    pub integer_step: f64,
    /// Margin subtracted from exclusive bounds of `number` properties
    pub number_epsilon: f64,
    /// Indentation for new nested keys when a document shows none
    pub indent_step: usize,
}

impl ReconcileConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse TOML configuration; missing settings keep their defaults
    ///
    /// # Errors
    /// - `ConfigError::Toml` for malformed TOML or unknown settings
    /// - `ConfigError::Invalid` for out-of-range values
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read TOML configuration from a file
    ///
    /// # Errors
    /// Returns `ConfigError::Invalid` if the file cannot be read, otherwise as
    /// [`from_toml_str`](Self::from_toml_str).
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::invalid("file", format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    /// Check value ranges
    ///
    /// # Errors
    /// Returns `ConfigError::Invalid` naming the first bad setting.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("number_step", self.number_step),
            ("integer_step", self.integer_step),
            ("number_epsilon", self.number_epsilon),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConfigError::invalid(name, format!("must be positive, got {value}")));
            }
        }
        if self.indent_step == 0 {
            return Err(ConfigError::invalid("indent_step", "must be at least 1"));
        }
        Ok(())
    }

    /// Commit delay as a duration
    #[inline]
    #[must_use]
    pub fn commit_delay(&self) -> Duration {
        Duration::from_millis(self.commit_delay_ms)
    }

    /// With commit delay
    #[inline]
    #[must_use]
    pub fn with_commit_delay(mut self, delay: Duration) -> Self {
        self.commit_delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// With schema default fallback
    #[inline]
    #[must_use]
    pub fn with_schema_default_fallback(mut self, enabled: bool) -> Self {
        self.schema_default_fallback = enabled;
        self
    }

    /// With number and integer steps
    #[inline]
    #[must_use]
    pub fn with_steps(mut self, number: f64, integer: f64) -> Self {
        self.number_step = number;
        self.integer_step = integer;
        self
    }

    /// With indentation for new nested keys
    #[inline]
    #[must_use]
    pub fn with_indent_step(mut self, indent: usize) -> Self {
        self.indent_step = indent;
        self
    }
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            commit_delay_ms: 400,
            schema_default_fallback: false,
            number_step: 0.5,
            integer_step: 1.0,
            number_epsilon: 1e-6,
            indent_step: 2,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = ReconcileConfig::from_toml_str("commit_delay_ms = 250\n").unwrap();
        assert_eq!(config.commit_delay(), Duration::from_millis(250));
        assert!((config.number_step - 0.5).abs() < f64::EPSILON);
        assert_eq!(config.indent_step, 2);
    }

    #[test]
    fn unknown_settings_are_rejected() {
        assert!(matches!(
            ReconcileConfig::from_toml_str("delay = 1\n"),
            Err(ConfigError::Toml(_))
        ));
    }

    #[test]
    fn out_of_range_settings_are_rejected() {
        let err = ReconcileConfig::from_toml_str("number_step = 0.0\n").unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid setting 'number_step': must be positive, got 0"
        );
        assert!(ReconcileConfig::new().with_indent_step(0).validate().is_err());
    }

    #[test]
    fn builders() {
        let config = ReconcileConfig::new()
            .with_commit_delay(Duration::from_secs(1))
            .with_schema_default_fallback(true)
            .with_steps(0.1, 5.0);
        assert_eq!(config.commit_delay_ms, 1000);
        assert!(config.schema_default_fallback);
        assert!((config.integer_step - 5.0).abs() < f64::EPSILON);
    }
}
