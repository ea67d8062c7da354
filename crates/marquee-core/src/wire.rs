//! Media server wire types
//!
//! Field names follow the server's PascalCase JSON contract and must not be
//! renamed.

use crate::profile::DeviceProfile;
use serde::{Deserialize, Serialize};

/// Body of `POST /Items/{itemId}/PlaybackInfo`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct PlaybackInfoRequest {
    pub user_id: String,
    pub max_streaming_bitrate: u64,
    pub media_source_id: String,
    pub device_profile: DeviceProfile,
    pub auto_open_live_stream: bool,
}

/// Reply of the negotiation endpoint
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct PlaybackInfoResponse {
    pub play_session_id: Option<String>,
    pub media_sources: Vec<MediaSource>,
}

/// One candidate source for an item
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct MediaSource {
    pub id: String,
    pub name: Option<String>,
    pub path: Option<String>,
    pub container: Option<String>,
    pub size: Option<i64>,
    pub bitrate: Option<u64>,
    pub run_time_ticks: Option<i64>,
    pub supports_direct_play: bool,
    pub supports_direct_stream: bool,
    pub supports_transcoding: bool,
    /// Server-chosen transcoding path, relative to the server base
    pub transcoding_url: Option<String>,
    pub direct_stream_url: Option<String>,
    pub media_streams: Vec<MediaStream>,
    pub default_audio_stream_index: Option<i32>,
    pub default_subtitle_stream_index: Option<i32>,
}

impl MediaSource {
    /// Non-empty server transcoding path, if any
    pub fn transcoding_path(&self) -> Option<&str> {
        self.transcoding_url.as_deref().filter(|u| !u.is_empty())
    }

    pub fn subtitle_streams(&self) -> Vec<&MediaStream> {
        self.media_streams
            .iter()
            .filter(|s| s.stream_type == StreamType::Subtitle)
            .collect()
    }

    pub fn stream(&self, index: i32) -> Option<&MediaStream> {
        self.media_streams.iter().find(|s| s.index == index)
    }
}

/// Kind of elementary stream
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StreamType {
    Video,
    Audio,
    Subtitle,
    #[default]
    #[serde(other)]
    Unknown,
}

/// Video, audio or subtitle stream inside a media source
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct MediaStream {
    #[serde(rename = "Type")]
    pub stream_type: StreamType,
    pub index: i32,
    pub codec: Option<String>,
    pub language: Option<String>,
    pub title: Option<String>,
    pub display_title: Option<String>,
    pub is_default: bool,
    pub is_forced: bool,
    pub is_external: bool,
}

impl MediaStream {
    /// Label shown in a track chooser
    pub fn label(&self) -> &str {
        self.display_title
            .as_deref()
            .or(self.title.as_deref())
            .or(self.language.as_deref())
            .unwrap_or("")
    }
}

/// Body of the `/Sessions/Playing*` reporting endpoints
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct PlaybackReport {
    pub item_id: String,
    pub media_source_id: String,
    pub position_ticks: i64,
    pub play_method: String,
    pub play_session_id: String,
    pub can_seek: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_paused: Option<bool>,
}
