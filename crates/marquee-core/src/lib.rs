//! Marquee Core - Playback negotiation and session engine
//!
//! This crate provides the client-side playback brain for a Jellyfin-style
//! media server:
//! - Device capability detection and device profile construction
//! - Quality tier resolution and bitrate probing
//! - Playback negotiation (direct play, direct stream, transcode)
//! - Subtitle track selection
//! - Session lifecycle, progress reporting and next-item autoplay
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         Marquee Core                            │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                                                                 │
//! │  ┌──────────────┐  ┌──────────────┐  ┌──────────────┐          │
//! │  │  Capability  │  │   Profile    │  │   Quality    │          │
//! │  │    Probe     │  │   Builder    │  │   Policy     │          │
//! │  └──────┬───────┘  └──────┬───────┘  └──────┬───────┘          │
//! │         │                 │                 │                   │
//! │         └─────────────────┼─────────────────┘                   │
//! │                           │                                     │
//! │                    ┌──────┴──────┐       ┌──────────────┐       │
//! │                    │  Negotiator │───────│ Media Server │       │
//! │                    └──────┬──────┘       └──────┬───────┘       │
//! │                           │                     │               │
//! │  ┌──────────────┐  ┌──────┴──────┐  ┌──────────┴───┐           │
//! │  │    Event     │──│  Playback   │──│   Session    │           │
//! │  │     Bus      │  │   Engine    │  │   Reporter   │           │
//! │  └──────────────┘  └──────┬──────┘  └──────────────┘           │
//! │                           │                                     │
//! │                    ┌──────┴──────┐                              │
//! │                    │ Media Player│                              │
//! │                    └─────────────┘                              │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod api;
pub mod buffer;
pub mod capabilities;
pub mod config;
pub mod error;
pub mod events;
pub mod negotiator;
pub mod player;
pub mod profile;
pub mod quality;
pub mod reporter;
pub mod session;
pub mod subtitles;
pub mod tasks;
pub mod types;
pub mod wire;

pub use api::{ClientInfo, Credentials, HttpMediaServer, MediaServer, ReportKind};
pub use buffer::BufferStats;
pub use capabilities::{CapabilityRecord, DeviceCapabilityProbe, ResolutionTier};
pub use config::EngineConfig;
pub use error::{Error, Result};
pub use events::{EngineEvent, EventBus};
pub use negotiator::PlaybackNegotiator;
pub use player::{MediaPlayer, MediaService, PlayerEvent, SubtitleTrack};
pub use profile::{DeviceProfile, DeviceProfileBuilder};
pub use quality::{QualityCeiling, QualityPolicy, QualityTier};
pub use session::{EngineBuilder, PlaybackEngine, PlaybackRequest};
pub use subtitles::{SubtitleFallback, SubtitleSelector};
pub use types::*;
pub use wire::{MediaSource, MediaStream, PlaybackInfoRequest, PlaybackInfoResponse, StreamType};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the library with default configuration
pub fn init() {
    tracing::info!(version = VERSION, "Marquee Core initialized");
}
