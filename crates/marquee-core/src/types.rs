//! Core types for Marquee

use crate::wire::{MediaSource, StreamType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

/// Protocol time unit: 100 nanoseconds
pub const TICKS_PER_SECOND: i64 = 10_000_000;

/// Convert seconds to protocol ticks
pub fn seconds_to_ticks(seconds: f64) -> i64 {
    (seconds * TICKS_PER_SECOND as f64).round() as i64
}

/// Convert protocol ticks to seconds
pub fn ticks_to_seconds(ticks: i64) -> f64 {
    ticks as f64 / TICKS_PER_SECOND as f64
}

/// How the server delivers the media, as reported back in `PlayMethod`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlayMethod {
    DirectPlay,
    DirectStream,
    Transcode,
}

impl PlayMethod {
    /// Wire string expected by the session endpoints
    pub fn as_str(&self) -> &'static str {
        match self {
            PlayMethod::DirectPlay => "DirectPlay",
            PlayMethod::DirectStream => "DirectStream",
            PlayMethod::Transcode => "Transcode",
        }
    }
}

impl std::fmt::Display for PlayMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A playable library item, as handed over by the catalog layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaItem {
    pub id: String,
    pub name: String,
    /// Runtime in ticks, if the catalog knows it
    pub run_time_ticks: Option<i64>,
}

impl MediaItem {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            run_time_ticks: None,
        }
    }

    pub fn with_runtime_ticks(mut self, ticks: i64) -> Self {
        self.run_time_ticks = Some(ticks);
        self
    }

    /// Runtime in seconds
    pub fn duration(&self) -> Option<f64> {
        self.run_time_ticks.map(ticks_to_seconds)
    }
}

/// Outcome of a negotiation: everything needed to start the player
#[derive(Debug, Clone, Serialize)]
pub struct PlaybackResult {
    /// Resolved stream locator
    pub stream_url: Url,
    /// Server-issued play session id
    pub play_session_id: String,
    /// The media source the server picked
    pub media_source: MediaSource,
    /// True when the server re-encodes the stream
    pub is_transcoding: bool,
    pub play_method: PlayMethod,
}

/// Playback state machine states
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "state", content = "reason", rename_all = "snake_case")]
pub enum PlaybackState {
    /// No session
    Idle,
    /// Negotiating and preparing the player
    Loading,
    Playing,
    Paused,
    /// Content played to the end
    Ended,
    /// Negotiation or setup failed
    Failed(String),
}

impl PlaybackState {
    /// Check if transition to target state is valid
    pub fn can_transition_to(&self, target: &PlaybackState) -> bool {
        use PlaybackState::*;
        if matches!(target, Failed(_)) {
            return true;
        }
        matches!(
            (self, target),
            // From Idle
            (Idle, Loading) |
            // From Loading
            (Loading, Playing) | (Loading, Idle) |
            // From Playing
            (Playing, Paused) | (Playing, Ended) | (Playing, Idle) |
            // From Paused
            (Paused, Playing) | (Paused, Ended) | (Paused, Idle) |
            // From Ended
            (Ended, Idle) | (Ended, Loading) |
            // From Failed
            (Failed(_), Idle) | (Failed(_), Loading)
        )
    }
}

impl std::fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlaybackState::Idle => write!(f, "idle"),
            PlaybackState::Loading => write!(f, "loading"),
            PlaybackState::Playing => write!(f, "playing"),
            PlaybackState::Paused => write!(f, "paused"),
            PlaybackState::Ended => write!(f, "ended"),
            PlaybackState::Failed(reason) => write!(f, "failed: {}", reason),
        }
    }
}

/// The single active session owned by the engine
#[derive(Debug, Clone, Serialize)]
pub struct PlaybackSession {
    pub item_id: String,
    pub play_session_id: String,
    /// Wall clock time the session started
    pub started_at: DateTime<Utc>,
    /// Current position in seconds
    pub position: f64,
    pub paused: bool,
}

impl PlaybackSession {
    pub fn new(item_id: impl Into<String>, play_session_id: impl Into<String>, position: f64) -> Self {
        Self {
            item_id: item_id.into(),
            play_session_id: play_session_id.into(),
            started_at: Utc::now(),
            position,
            paused: false,
        }
    }

    pub fn position_ticks(&self) -> i64 {
        seconds_to_ticks(self.position)
    }
}

/// Read-only technical summary of the current stream
#[derive(Debug, Clone, Serialize)]
pub struct TechnicalInfo {
    pub play_method: PlayMethod,
    pub is_transcoding: bool,
    pub play_session_id: String,
    pub media_source_id: String,
    pub container: Option<String>,
    pub bitrate: Option<u64>,
    pub video_codec: Option<String>,
    pub audio_codec: Option<String>,
    pub device_model: String,
}

impl TechnicalInfo {
    pub fn from_result(result: &PlaybackResult, device_model: &str) -> Self {
        let source = &result.media_source;
        let codec_of = |kind: StreamType| {
            source
                .media_streams
                .iter()
                .find(|s| s.stream_type == kind)
                .and_then(|s| s.codec.clone())
        };

        Self {
            play_method: result.play_method,
            is_transcoding: result.is_transcoding,
            play_session_id: result.play_session_id.clone(),
            media_source_id: source.id.clone(),
            container: source.container.clone(),
            bitrate: source.bitrate,
            video_codec: codec_of(StreamType::Video),
            audio_codec: codec_of(StreamType::Audio),
            device_model: device_model.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tick_round_trip() {
        for seconds in [0.0, 0.5, 1.0, 111.0, 5400.25, 86_399.9] {
            assert_eq!(ticks_to_seconds(seconds_to_ticks(seconds)), seconds);
        }
        assert_eq!(seconds_to_ticks(1.0), 10_000_000);
        assert_eq!(ticks_to_seconds(25_000_000), 2.5);
    }

    #[test]
    fn test_failed_equality_is_structural() {
        assert_eq!(
            PlaybackState::Failed("timeout".into()),
            PlaybackState::Failed("timeout".into())
        );
        assert_ne!(
            PlaybackState::Failed("timeout".into()),
            PlaybackState::Failed("refused".into())
        );
        assert_ne!(PlaybackState::Failed(String::new()), PlaybackState::Idle);
    }

    #[test]
    fn test_state_transitions() {
        use PlaybackState::*;
        assert!(Idle.can_transition_to(&Loading));
        assert!(Loading.can_transition_to(&Playing));
        assert!(Playing.can_transition_to(&Paused));
        assert!(Paused.can_transition_to(&Playing));
        assert!(Playing.can_transition_to(&Ended));
        assert!(Ended.can_transition_to(&Loading));

        // Any state may fail
        for state in [Idle, Loading, Playing, Paused, Ended] {
            assert!(state.can_transition_to(&Failed("x".into())));
        }

        assert!(!Idle.can_transition_to(&Playing));
        assert!(!Ended.can_transition_to(&Playing));
        assert!(!Loading.can_transition_to(&Paused));
    }

    #[test]
    fn test_state_display() {
        assert_eq!(PlaybackState::Playing.to_string(), "playing");
        assert_eq!(PlaybackState::Failed("no media".into()).to_string(), "failed: no media");
    }
}
