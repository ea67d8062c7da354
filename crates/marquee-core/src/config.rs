//! Engine configuration

use crate::{
    api::ClientInfo, quality::QualityTier, subtitles::SubtitleFallback, Error, Result,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Playback engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Identity sent in the authorization header
    pub client: ClientInfo,
    /// Seconds between progress observer ticks
    pub progress_interval_secs: f64,
    /// Remaining seconds at which approach-end fires
    pub approach_end_threshold_secs: f64,
    /// Advance to the next item when the countdown expires
    pub autoplay_enabled: bool,
    /// HTTP request timeout in milliseconds
    pub request_timeout_ms: u64,
    /// Tier used when a request does not name one
    pub default_quality: QualityTier,
    /// Send the latency probe estimate for `Auto` instead of the maximum ceiling
    pub probe_automatic_quality: bool,
    /// Stored subtitle language preference (ISO 639-2, e.g. "eng")
    pub preferred_subtitle_language: Option<String>,
    pub subtitle_fallback: SubtitleFallback,
    pub auto_open_live_stream: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            client: ClientInfo::default(),
            progress_interval_secs: 5.0,
            approach_end_threshold_secs: 10.0,
            autoplay_enabled: true,
            request_timeout_ms: 10_000,
            default_quality: QualityTier::Auto,
            probe_automatic_quality: false,
            preferred_subtitle_language: None,
            subtitle_fallback: SubtitleFallback::Disabled,
            auto_open_live_stream: true,
        }
    }
}

impl EngineConfig {
    /// Load from a JSON file; missing fields take their defaults
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config: EngineConfig = serde_json::from_str(&raw)
            .map_err(|e| Error::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.progress_interval_secs.is_finite() && self.progress_interval_secs > 0.0) {
            return Err(Error::InvalidConfig(
                "progress_interval_secs must be positive".into(),
            ));
        }
        if !(self.approach_end_threshold_secs.is_finite() && self.approach_end_threshold_secs >= 0.0) {
            return Err(Error::InvalidConfig(
                "approach_end_threshold_secs must not be negative".into(),
            ));
        }
        if self.request_timeout_ms == 0 {
            return Err(Error::InvalidConfig("request_timeout_ms must be non-zero".into()));
        }
        Ok(())
    }

    pub fn progress_interval(&self) -> Duration {
        Duration::from_secs_f64(self.progress_interval_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Countdown length in whole seconds
    pub fn countdown_seconds(&self) -> u32 {
        self.approach_end_threshold_secs.ceil() as u32
    }
}
