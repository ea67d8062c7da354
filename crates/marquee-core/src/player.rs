//! External collaborators driven by the engine
//!
//! Decoding and rendering happen in a platform media player; the engine
//! configures it through [`MediaPlayer`] and learns about buffering, end of
//! content and failures through [`PlayerEvent`]s forwarded by the platform
//! glue. [`MediaService`] supplies catalog lookups.

use crate::{types::MediaItem, Result};
use async_trait::async_trait;
use url::Url;

/// Subtitle track handed to the player
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubtitleTrack {
    pub stream_index: i32,
    /// Set for tracks delivered as separate files
    pub url: Option<Url>,
    pub language: Option<String>,
}

/// Platform media player controlled by the engine
#[async_trait]
pub trait MediaPlayer: Send + Sync {
    /// Prepare the stream, starting at `start_position` seconds
    async fn load(&self, url: &Url, start_position: f64) -> Result<()>;

    async fn play(&self) -> Result<()>;

    async fn pause(&self) -> Result<()>;

    async fn seek(&self, position: f64) -> Result<()>;

    /// Current position in seconds
    async fn position(&self) -> f64;

    /// Content duration in seconds, once known
    async fn duration(&self) -> Option<f64>;

    /// Enable a subtitle track, or disable subtitles with `None`
    async fn set_subtitle(&self, track: Option<SubtitleTrack>) -> Result<()>;

    /// Release decoder and network resources
    async fn release(&self);
}

/// Notifications from the platform player
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerEvent {
    /// Loading progress while the stream is prepared
    Buffering {
        downloaded_bytes: u64,
        total_bytes: Option<u64>,
    },
    /// Playback reached the end of the content
    Finished,
    /// Unrecoverable player failure
    Error(String),
}

/// Catalog lookups used for autoplay
#[async_trait]
pub trait MediaService: Send + Sync {
    /// The item that follows `item_id`, e.g. the next episode
    async fn next_item(&self, item_id: &str) -> Result<Option<MediaItem>>;
}
