//! Playback negotiation
//!
//! Sends the device profile to the server and turns the reply into a
//! ready-to-play locator:
//! 1. a server-provided transcoding URL wins and marks the session as
//!    transcoding
//! 2. otherwise a static stream URL is built by hand
//!
//! The legacy entry point skips negotiation and asks for an H.264/AAC HLS
//! manifest with a fixed parameter set.

use crate::{
    api::MediaServer,
    capabilities::CapabilityRecord,
    profile::DeviceProfileBuilder,
    quality::{QualityPolicy, QualityTier},
    types::{seconds_to_ticks, PlayMethod, PlaybackResult},
    wire::{MediaSource, PlaybackInfoRequest},
    Error, Result,
};
use std::sync::Arc;
use tracing::{debug, info, instrument};
use url::Url;
use uuid::Uuid;

/// Audio bitrate requested on the legacy path
const LEGACY_AUDIO_BITRATE: u64 = 192_000;

/// Negotiates delivery of an item with the media server
#[derive(Clone)]
pub struct PlaybackNegotiator {
    server: Arc<dyn MediaServer>,
    capabilities: Arc<CapabilityRecord>,
    policy: QualityPolicy,
    auto_open_live_stream: bool,
}

impl PlaybackNegotiator {
    pub fn new(
        server: Arc<dyn MediaServer>,
        capabilities: Arc<CapabilityRecord>,
        policy: QualityPolicy,
    ) -> Self {
        Self {
            server,
            capabilities,
            policy,
            auto_open_live_stream: true,
        }
    }

    pub fn with_auto_open_live_stream(mut self, enabled: bool) -> Self {
        self.auto_open_live_stream = enabled;
        self
    }

    pub fn capabilities(&self) -> &CapabilityRecord {
        &self.capabilities
    }

    pub fn server(&self) -> &Arc<dyn MediaServer> {
        &self.server
    }

    /// Negotiate playback of an item at the given quality
    #[instrument(skip(self), fields(device = %self.capabilities.model_label))]
    pub async fn negotiate(&self, item_id: &str, tier: QualityTier) -> Result<PlaybackResult> {
        let ceiling = self
            .policy
            .negotiation_ceiling(tier, self.server.as_ref())
            .await;
        let credentials = self.server.credentials();

        let request = PlaybackInfoRequest {
            user_id: credentials.user_id.clone(),
            max_streaming_bitrate: ceiling.bitrate,
            media_source_id: item_id.to_string(),
            device_profile: DeviceProfileBuilder::build(&self.capabilities, Some(ceiling.bitrate)),
            auto_open_live_stream: self.auto_open_live_stream,
        };

        let response = self.server.playback_info(item_id, &request).await?;

        let play_session_id = response
            .play_session_id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| Error::response("server returned no PlaySessionId"))?;

        let media_source = response
            .media_sources
            .into_iter()
            .next()
            .ok_or_else(|| Error::response("server returned no media sources"))?;

        let result = self.resolve(item_id, play_session_id, media_source)?;
        info!(
            item_id,
            play_method = %result.play_method,
            transcoding = result.is_transcoding,
            container = ?result.media_source.container,
            "Playback negotiated"
        );
        Ok(result)
    }

    /// Pick the locator for a negotiated media source
    fn resolve(
        &self,
        item_id: &str,
        play_session_id: String,
        media_source: MediaSource,
    ) -> Result<PlaybackResult> {
        let credentials = self.server.credentials();

        if let Some(path) = media_source.transcoding_path() {
            let stream_url = Url::parse(&format!("{}{}", credentials.base(), path))?;
            debug!(url = %stream_url, "Using server transcoding URL");
            return Ok(PlaybackResult {
                stream_url,
                play_session_id,
                media_source,
                is_transcoding: true,
                play_method: PlayMethod::Transcode,
            });
        }

        let mut stream_url = credentials.endpoint(&format!("/Videos/{}/stream", item_id))?;
        stream_url
            .query_pairs_mut()
            .append_pair("static", "true")
            .append_pair("mediaSourceId", &media_source.id)
            .append_pair("playSessionId", &play_session_id)
            .append_pair("api_key", &credentials.access_token)
            .append_pair("deviceId", &credentials.device_id);
        debug!(url = %stream_url, "Using static stream URL");

        let play_method = if media_source.supports_direct_play {
            PlayMethod::DirectPlay
        } else {
            PlayMethod::DirectStream
        };

        Ok(PlaybackResult {
            stream_url,
            play_session_id,
            media_source,
            is_transcoding: false,
            play_method,
        })
    }

    /// Build an HLS manifest locator without negotiating
    ///
    /// Fixed H.264/AAC in MPEG-TS segments. `start_position` (seconds) is only
    /// sent when resuming.
    pub fn legacy_stream(
        &self,
        item_id: &str,
        tier: QualityTier,
        start_position: Option<f64>,
    ) -> Result<PlaybackResult> {
        let credentials = self.server.credentials();
        let ceiling = QualityPolicy::resolve(tier);
        let play_session_id = Uuid::new_v4().simple().to_string();

        let mut stream_url = credentials.endpoint(&format!("/Videos/{}/master.m3u8", item_id))?;
        {
            let mut query = stream_url.query_pairs_mut();
            query
                .append_pair("MediaSourceId", item_id)
                .append_pair("DeviceId", &credentials.device_id)
                .append_pair("api_key", &credentials.access_token)
                .append_pair("PlaySessionId", &play_session_id)
                .append_pair("VideoCodec", "h264")
                .append_pair("AudioCodec", "aac")
                .append_pair("SegmentContainer", "ts")
                .append_pair("VideoBitrate", &ceiling.bitrate.to_string())
                .append_pair("AudioBitrate", &LEGACY_AUDIO_BITRATE.to_string())
                .append_pair("MaxWidth", &ceiling.max_width.to_string())
                .append_pair("MaxHeight", &ceiling.max_height().to_string())
                .append_pair("TranscodingMaxAudioChannels", "2")
                .append_pair("BreakOnNonKeyFrames", "true");
            if let Some(start) = start_position.filter(|s| *s > 0.0) {
                query.append_pair("StartTimeTicks", &seconds_to_ticks(start).to_string());
            }
        }

        info!(item_id, url = %stream_url, "Using legacy HLS manifest");

        Ok(PlaybackResult {
            stream_url,
            play_session_id,
            media_source: MediaSource {
                id: item_id.to_string(),
                container: Some("ts".to_string()),
                supports_transcoding: true,
                ..Default::default()
            },
            is_transcoding: true,
            play_method: PlayMethod::Transcode,
        })
    }

    /// Locator for an external subtitle track
    pub fn subtitle_url(
        &self,
        item_id: &str,
        media_source_id: &str,
        stream_index: i32,
        format: &str,
    ) -> Result<Url> {
        let credentials = self.server.credentials();
        let mut url = credentials.endpoint(&format!(
            "/Videos/{}/{}/Subtitles/{}/Stream.{}",
            item_id, media_source_id, stream_index, format
        ))?;
        url.query_pairs_mut()
            .append_pair("api_key", &credentials.access_token);
        Ok(url)
    }
}
