//! Static configuration, loaded once at startup
//!
//! Layered as defaults < optional TOML file < `BARGAIN_`-prefixed
//! environment variables.

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{BargainError, Result};
use crate::policy::Thresholds;

/// Top-level configuration for the bargain binary
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BargainConfig {
    /// Accept offers at or above `asking * accept_threshold` (0 disables)
    pub accept_threshold: Decimal,
    /// Decline offers below `asking * reject_threshold` (0 disables)
    pub reject_threshold: Decimal,
    /// Let a single manual accept hand an undecided offer to the engine
    pub unattended_manual: bool,
    pub pacing: PacingConfig,
    pub timeouts: TimeoutConfig,
    /// Protocol version used for system-notice code lookup
    pub protocol_version: u32,
}

/// Simulated human response latency
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PacingConfig {
    pub enabled: bool,
    /// [min, max] ms before reacting to a freshly arrived ambiguous offer
    pub long_ms: [u64; 2],
    /// [min, max] ms for chained activations and stage confirmations
    pub short_ms: [u64; 2],
}

/// Stall detection and cache retention windows
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TimeoutConfig {
    /// Session timeout when no further deals are queued
    pub session_idle_ms: u64,
    /// Session timeout when more deals are waiting behind the active one
    pub session_busy_ms: u64,
    /// Retention window of the manual-mode recent-deals cache
    pub recent_deal_ttl_ms: u64,
}

impl PacingConfig {
    /// Delay before reacting to a freshly arrived ambiguous offer
    pub fn long_delay(&self) -> Duration {
        self.delay(self.long_ms)
    }

    /// Delay for chained activations and stage confirmations
    pub fn short_delay(&self) -> Duration {
        self.delay(self.short_ms)
    }

    fn delay(&self, range: [u64; 2]) -> Duration {
        if !self.enabled {
            return Duration::ZERO;
        }
        let ms = rand::Rng::gen_range(&mut rand::thread_rng(), range[0]..=range[1]);
        Duration::from_millis(ms)
    }
}

impl Default for BargainConfig {
    fn default() -> Self {
        Self {
            accept_threshold: Decimal::ONE,
            reject_threshold: Decimal::from_str("0.75").unwrap_or_default(),
            unattended_manual: false,
            pacing: PacingConfig::default(),
            timeouts: TimeoutConfig::default(),
            protocol_version: 0,
        }
    }
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            long_ms: [1200, 2600],
            short_ms: [400, 800],
        }
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            session_idle_ms: 30_000,
            session_busy_ms: 15_000,
            recent_deal_ttl_ms: 30_000,
        }
    }
}

impl BargainConfig {
    /// Load configuration from defaults, an optional TOML file, and
    /// `BARGAIN_`-prefixed environment variables.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));
        if let Some(path) = path {
            figment = figment.merge(Toml::file(path));
        }
        figment = figment.merge(Env::prefixed("BARGAIN_").split("__"));

        let config: Self = figment
            .extract()
            .map_err(|e| BargainError::Configuration(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.accept_threshold.is_sign_negative() || self.reject_threshold.is_sign_negative() {
            return Err(BargainError::InvalidConfig(
                "thresholds must be non-negative".to_string(),
            ));
        }
        if !self.accept_threshold.is_zero()
            && !self.reject_threshold.is_zero()
            && self.accept_threshold < self.reject_threshold
        {
            return Err(BargainError::InvalidConfig(format!(
                "accept_threshold ({}) must be >= reject_threshold ({})",
                self.accept_threshold, self.reject_threshold
            )));
        }
        for range in [self.pacing.long_ms, self.pacing.short_ms] {
            if range[0] > range[1] {
                return Err(BargainError::InvalidConfig(format!(
                    "pacing range [{}, {}] has min > max",
                    range[0], range[1]
                )));
            }
        }
        Ok(())
    }

    pub fn thresholds(&self) -> Thresholds {
        Thresholds::new(self.accept_threshold, self.reject_threshold)
    }

    pub fn recent_deal_ttl(&self) -> Duration {
        Duration::from_millis(self.timeouts.recent_deal_ttl_ms)
    }
}
