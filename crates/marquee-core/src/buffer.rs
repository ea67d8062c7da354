//! Buffering telemetry for the loading phase
//!
//! The player reports raw byte counts while it prepares the stream; these
//! are turned into the percentage/speed/ETA figures the UI shows. Stats only
//! exist while the engine is `Loading` and are dropped once playback starts.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Snapshot of loading progress
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BufferStats {
    /// 0-100
    pub percentage: f64,
    /// Bytes per second since loading began
    pub download_speed: f64,
    /// Estimated time until fully buffered, when the total is known
    pub remaining: Option<Duration>,
    pub downloaded_bytes: u64,
    pub total_bytes: Option<u64>,
}

impl BufferStats {
    /// Compute stats from byte counts and the time spent loading so far
    pub fn compute(downloaded_bytes: u64, total_bytes: Option<u64>, elapsed: Duration) -> Self {
        let secs = elapsed.as_secs_f64();
        let download_speed = if secs > 0.0 {
            downloaded_bytes as f64 / secs
        } else {
            0.0
        };

        let total = total_bytes.filter(|t| *t > 0);
        let percentage = match total {
            Some(total) => (downloaded_bytes as f64 / total as f64 * 100.0).clamp(0.0, 100.0),
            None => 0.0,
        };

        let remaining = match total {
            Some(total) if download_speed > 0.0 => {
                let left = total.saturating_sub(downloaded_bytes) as f64;
                Some(Duration::from_secs_f64(left / download_speed))
            }
            _ => None,
        };

        Self {
            percentage,
            download_speed,
            remaining,
            downloaded_bytes,
            total_bytes,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.percentage >= 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compute_with_total() {
        let stats = BufferStats::compute(2_000_000, Some(8_000_000), Duration::from_secs(2));
        assert_eq!(stats.percentage, 25.0);
        assert_eq!(stats.download_speed, 1_000_000.0);
        assert_eq!(stats.remaining, Some(Duration::from_secs(6)));
        assert!(!stats.is_complete());
    }

    #[test]
    fn test_compute_without_total() {
        let stats = BufferStats::compute(500, None, Duration::from_millis(500));
        assert_eq!(stats.percentage, 0.0);
        assert_eq!(stats.download_speed, 1000.0);
        assert_eq!(stats.remaining, None);
    }

    #[test]
    fn test_compute_clamps_and_handles_zero_elapsed() {
        let stats = BufferStats::compute(12, Some(10), Duration::ZERO);
        assert_eq!(stats.percentage, 100.0);
        assert_eq!(stats.download_speed, 0.0);
        assert_eq!(stats.remaining, None);
        assert!(stats.is_complete());
    }
}
