//! Quality tiers and bitrate ceilings
//!
//! Every fixed tier maps to a bitrate/width pair. `Auto` sends the `Maximum`
//! ceiling to the server, which gives the best odds of a direct play
//! decision. The latency probe estimate is only used for negotiation when a
//! caller asks for it.

use crate::api::MediaServer;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};

/// Estimate used when the latency probe fails
pub const PROBE_FALLBACK_BITRATE: u64 = 4_000_000;

/// Number of sequential round trips per probe
const PROBE_ROUND_TRIPS: u32 = 3;

/// Latency buckets: (upper bound in ms, estimated bitrate)
const PROBE_BUCKETS: &[(u128, u64)] = &[
    (50, 40_000_000),
    (100, 20_000_000),
    (200, 10_000_000),
    (400, 4_000_000),
];

const PROBE_SLOWEST_BITRATE: u64 = 1_500_000;

/// User-selectable quality tiers, best first
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityTier {
    #[default]
    Auto,
    Maximum,
    Uhd4k,
    Fhd1080High,
    Fhd1080,
    Hd720,
    Sd480,
    Minimum,
}

impl QualityTier {
    pub const ALL: [QualityTier; 8] = [
        QualityTier::Auto,
        QualityTier::Maximum,
        QualityTier::Uhd4k,
        QualityTier::Fhd1080High,
        QualityTier::Fhd1080,
        QualityTier::Hd720,
        QualityTier::Sd480,
        QualityTier::Minimum,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            QualityTier::Auto => "Auto",
            QualityTier::Maximum => "Maximum",
            QualityTier::Uhd4k => "4K - 60 Mbps",
            QualityTier::Fhd1080High => "1080p - 20 Mbps",
            QualityTier::Fhd1080 => "1080p - 10 Mbps",
            QualityTier::Hd720 => "720p - 4 Mbps",
            QualityTier::Sd480 => "480p - 1.5 Mbps",
            QualityTier::Minimum => "Minimum - 720 kbps",
        }
    }

    /// Parse from the snake_case name used in config files and the CLI
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|t| t.name().eq_ignore_ascii_case(name.trim()))
    }

    pub fn name(&self) -> &'static str {
        match self {
            QualityTier::Auto => "auto",
            QualityTier::Maximum => "maximum",
            QualityTier::Uhd4k => "uhd4k",
            QualityTier::Fhd1080High => "fhd1080_high",
            QualityTier::Fhd1080 => "fhd1080",
            QualityTier::Hd720 => "hd720",
            QualityTier::Sd480 => "sd480",
            QualityTier::Minimum => "minimum",
        }
    }
}

impl std::fmt::Display for QualityTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Bitrate and width limits for a tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityCeiling {
    /// Bits per second
    pub bitrate: u64,
    pub max_width: u32,
}

impl QualityCeiling {
    pub const fn new(bitrate: u64, max_width: u32) -> Self {
        Self { bitrate, max_width }
    }

    /// Height matching `max_width` at 16:9
    pub fn max_height(&self) -> u32 {
        self.max_width * 9 / 16
    }
}

/// Maps quality tiers to negotiation ceilings
#[derive(Debug, Clone, Copy, Default)]
pub struct QualityPolicy {
    /// Send the latency probe estimate for `Auto` instead of `Maximum`
    pub use_probe_for_auto: bool,
}

impl QualityPolicy {
    pub fn new(use_probe_for_auto: bool) -> Self {
        Self { use_probe_for_auto }
    }

    /// Static ceiling for a tier; `Auto` maps to `Maximum`
    pub fn resolve(tier: QualityTier) -> QualityCeiling {
        match tier {
            QualityTier::Auto | QualityTier::Maximum => QualityCeiling::new(120_000_000, 3840),
            QualityTier::Uhd4k => QualityCeiling::new(60_000_000, 3840),
            QualityTier::Fhd1080High => QualityCeiling::new(20_000_000, 1920),
            QualityTier::Fhd1080 => QualityCeiling::new(10_000_000, 1920),
            QualityTier::Hd720 => QualityCeiling::new(4_000_000, 1280),
            QualityTier::Sd480 => QualityCeiling::new(1_500_000, 854),
            QualityTier::Minimum => QualityCeiling::new(720_000, 640),
        }
    }

    /// Ceiling sent in the negotiation request
    pub async fn negotiation_ceiling(&self, tier: QualityTier, server: &dyn MediaServer) -> QualityCeiling {
        let ceiling = Self::resolve(tier);
        if tier == QualityTier::Auto && self.use_probe_for_auto {
            let bitrate = Self::probe_bitrate(server).await;
            return QualityCeiling::new(bitrate, ceiling.max_width);
        }
        ceiling
    }

    /// Estimate a safe bitrate from server round trip latency
    #[instrument(skip(server))]
    pub async fn probe_bitrate(server: &dyn MediaServer) -> u64 {
        let mut total = Duration::ZERO;
        for attempt in 0..PROBE_ROUND_TRIPS {
            let start = Instant::now();
            if let Err(e) = server.ping().await {
                warn!(attempt, error = %e, "Latency probe failed");
                return PROBE_FALLBACK_BITRATE;
            }
            total += start.elapsed();
        }

        let average = total / PROBE_ROUND_TRIPS;
        let bitrate = Self::bitrate_for_latency(average);
        info!(average_ms = average.as_millis(), bitrate, "Latency probe finished");
        bitrate
    }

    /// Bucket an average round trip time into a bitrate estimate
    pub fn bitrate_for_latency(average: Duration) -> u64 {
        let ms = average.as_millis();
        let bitrate = PROBE_BUCKETS
            .iter()
            .find(|(bound, _)| ms < *bound)
            .map(|(_, bitrate)| *bitrate)
            .unwrap_or(PROBE_SLOWEST_BITRATE);
        debug!(ms, bitrate, "Latency bucketed");
        bitrate
    }
}
