//! Filter manager configuration and validation
//!
//! # Example
//!
//! ```ignore
//! use spv_filter::domain::FilterConfigBuilder;
//!
//! let config = FilterConfigBuilder::new()
//!     .false_positive_rate(0.01)
//!     .resize_threshold(0.5)
//!     .build()
//!     .expect("Valid config");
//! ```

use crate::error::FilterError;
use peer_bus::BloomFlags;
use serde::{Deserialize, Serialize};

/// Filter manager configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Target false positive rate, exclusive (0, 1)
    pub false_positive_rate: f64,
    /// Resize once the estimate exceeds target by this fraction of target, (0, 1]
    pub resize_threshold: f64,
    /// BIP37 update flags carried in every `filterload`
    pub flags: BloomFlags,
    /// Buffered manager events per subscriber
    pub event_capacity: usize,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            false_positive_rate: 0.001,
            resize_threshold: 0.4,
            flags: BloomFlags::None,
            event_capacity: 64,
        }
    }
}

impl FilterConfig {
    /// Validate all parameters
    pub fn validate(&self) -> Result<(), FilterError> {
        let fpr = self.false_positive_rate;
        if !(fpr > 0.0 && fpr < 1.0) {
            return Err(FilterError::InvalidFPR { fpr });
        }

        let threshold = self.resize_threshold;
        if !(threshold > 0.0 && threshold <= 1.0) {
            return Err(FilterError::InvalidParameters(format!(
                "resize_threshold must be in (0, 1], got {}",
                threshold
            )));
        }

        if self.event_capacity == 0 {
            return Err(FilterError::InvalidParameters(
                "event_capacity cannot be 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Parse and validate a TOML table, missing keys take their defaults
    ///
    /// ```toml
    /// false_positive_rate = 0.0005
    /// resize_threshold = 0.4
    /// flags = "all"
    /// ```
    pub fn from_toml_str(input: &str) -> Result<Self, FilterError> {
        let config: Self = toml::from_str(input)
            .map_err(|e| FilterError::InvalidParameters(format!("invalid TOML: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Builder-style method to set the target false positive rate
    pub fn with_false_positive_rate(mut self, fpr: f64) -> Self {
        self.false_positive_rate = fpr;
        self
    }

    /// Builder-style method to set the resize threshold
    pub fn with_resize_threshold(mut self, threshold: f64) -> Self {
        self.resize_threshold = threshold;
        self
    }
}

/// Builder for FilterConfig with validation
#[derive(Default)]
pub struct FilterConfigBuilder {
    false_positive_rate: Option<f64>,
    resize_threshold: Option<f64>,
    flags: Option<BloomFlags>,
    event_capacity: Option<usize>,
}

impl FilterConfigBuilder {
    /// Create a new builder with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set target false positive rate (exclusive 0 to 1)
    pub fn false_positive_rate(mut self, fpr: f64) -> Self {
        self.false_positive_rate = Some(fpr);
        self
    }

    /// Set resize threshold fraction
    pub fn resize_threshold(mut self, threshold: f64) -> Self {
        self.resize_threshold = Some(threshold);
        self
    }

    /// Set BIP37 update flags
    pub fn flags(mut self, flags: BloomFlags) -> Self {
        self.flags = Some(flags);
        self
    }

    /// Set event channel capacity
    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = Some(capacity);
        self
    }

    /// Build the FilterConfig, validating all parameters
    pub fn build(self) -> Result<FilterConfig, FilterError> {
        let defaults = FilterConfig::default();

        let config = FilterConfig {
            false_positive_rate: self
                .false_positive_rate
                .unwrap_or(defaults.false_positive_rate),
            resize_threshold: self.resize_threshold.unwrap_or(defaults.resize_threshold),
            flags: self.flags.unwrap_or(defaults.flags),
            event_capacity: self.event_capacity.unwrap_or(defaults.event_capacity),
        };

        config.validate()?;
        Ok(config)
    }
}
