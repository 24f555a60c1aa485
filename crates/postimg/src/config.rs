//! Controller Configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::rate_limit::RateLimitMode;

/// How a controller decides which elements to load
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadType {
    /// Load elements as they come near the viewport
    #[default]
    Postpone,
    /// Load every element whenever a pass runs
    Lazyload,
}

/// Controller options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ControllerOptions {
    /// Eager-load margin around the viewport (px)
    pub threshold: f64,

    /// Scroll/resize re-scan delay (ms)
    #[serde(alias = "scrollTimeout")]
    pub rate_limit_ms: u64,

    /// Load strategy
    pub load_type: LoadType,

    /// Scroll/resize rate limiting
    pub rate_limit_mode: RateLimitMode,
}

impl Default for ControllerOptions {
    fn default() -> Self {
        Self {
            threshold: 300.0,
            rate_limit_ms: 300,
            load_type: LoadType::Postpone,
            rate_limit_mode: RateLimitMode::DebounceTrailing,
        }
    }
}

impl ControllerOptions {
    /// Parse options from JSON; missing keys take their defaults
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn lazyload() -> Self {
        Self {
            load_type: LoadType::Lazyload,
            ..Self::default()
        }
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_rate_limit(mut self, ms: u64, mode: RateLimitMode) -> Self {
        self.rate_limit_ms = ms;
        self.rate_limit_mode = mode;
        self
    }

    pub fn rate_limit_delay(&self) -> Duration {
        Duration::from_millis(self.rate_limit_ms)
    }
}
