//! Device profile construction
//!
//! Translates a [`CapabilityRecord`] into the profile the server uses to
//! decide between direct play and transcoding. Order matters in the codec
//! lists: the server reads them as a preference ranking.

use crate::capabilities::CapabilityRecord;
use serde::{Deserialize, Serialize};

/// Default ceiling for 4K capable devices (bps)
pub const DEFAULT_BITRATE_4K: u64 = 120_000_000;

/// Default ceiling for 1080p devices (bps)
pub const DEFAULT_BITRATE_1080P: u64 = 40_000_000;

const H264_LEVEL_1080P: &str = "42";
const H264_LEVEL_4K: &str = "52";
const HEVC_LEVEL: &str = "153";

const MP4_AUDIO_CODECS: &[&str] = &["aac", "mp3", "ac3", "eac3", "flac", "alac", "opus"];
const TS_AUDIO_CODECS: &[&str] = &["aac", "mp3", "ac3", "eac3"];
const TRANSCODE_AUDIO_CODECS: &[&str] = &["aac", "ac3", "eac3"];

/// Negotiable description of what the client can play
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DeviceProfile {
    pub name: String,
    pub max_streaming_bitrate: u64,
    pub max_static_bitrate: u64,
    pub music_streaming_transcoding_bitrate: u64,
    pub direct_play_profiles: Vec<DirectPlayProfile>,
    pub transcoding_profiles: Vec<TranscodingProfile>,
    pub subtitle_profiles: Vec<SubtitleProfile>,
    pub codec_profiles: Vec<CodecProfile>,
}

impl DeviceProfile {
    /// Direct play entry for a container list such as `"mp4,m4v"`
    pub fn direct_play(&self, container: &str) -> Option<&DirectPlayProfile> {
        self.direct_play_profiles.iter().find(|p| p.container == container)
    }

    /// Conditions declared for a codec; empty when the codec is not advertised
    pub fn codec_conditions(&self, codec: &str) -> &[ProfileCondition] {
        self.codec_profiles
            .iter()
            .find(|p| p.codec == codec)
            .map(|p| p.conditions.as_slice())
            .unwrap_or(&[])
    }

    /// The `VideoRangeType` allow-list for a codec, in declared order
    pub fn video_ranges(&self, codec: &str) -> Vec<&str> {
        self.codec_conditions(codec)
            .iter()
            .filter(|c| c.property == ProfileProperty::VideoRangeType)
            .flat_map(|c| c.value.split('|'))
            .collect()
    }

    /// Every video codec advertised anywhere in the profile
    pub fn advertised_video_codecs(&self) -> Vec<&str> {
        let mut codecs: Vec<&str> = Vec::new();
        let lists = self
            .direct_play_profiles
            .iter()
            .map(|p| p.video_codec.as_str())
            .chain(self.transcoding_profiles.iter().map(|p| p.video_codec.as_str()))
            .chain(self.codec_profiles.iter().map(|p| p.codec.as_str()));
        for list in lists {
            for codec in list.split(',').filter(|c| !c.is_empty()) {
                if !codecs.contains(&codec) {
                    codecs.push(codec);
                }
            }
        }
        codecs
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MediaKind {
    Video,
    Audio,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DirectPlayProfile {
    pub container: String,
    #[serde(rename = "Type")]
    pub kind: MediaKind,
    pub video_codec: String,
    pub audio_codec: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamingProtocol {
    Hls,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TranscodingProfile {
    pub container: String,
    #[serde(rename = "Type")]
    pub kind: MediaKind,
    pub video_codec: String,
    pub audio_codec: String,
    pub protocol: StreamingProtocol,
    pub context: String,
    pub max_audio_channels: String,
    pub min_segments: u32,
    pub break_on_non_key_frames: bool,
    pub enable_subtitles_in_manifest: bool,
}

/// How a subtitle format reaches the client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubtitleDeliveryMethod {
    /// Burned into the video by the server
    Encode,
    /// Separate file fetched next to the stream
    External,
    /// Carried as a rendition inside the HLS manifest
    Hls,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SubtitleProfile {
    pub format: String,
    pub method: SubtitleDeliveryMethod,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CodecProfile {
    #[serde(rename = "Type")]
    pub kind: MediaKind,
    pub codec: String,
    pub conditions: Vec<ProfileCondition>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConditionKind {
    NotEquals,
    LessThanEqual,
    EqualsAny,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProfileProperty {
    IsAnamorphic,
    IsInterlaced,
    VideoLevel,
    VideoRangeType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ProfileCondition {
    pub condition: ConditionKind,
    pub property: ProfileProperty,
    pub value: String,
    pub is_required: bool,
}

impl ProfileCondition {
    fn new(condition: ConditionKind, property: ProfileProperty, value: impl Into<String>) -> Self {
        Self {
            condition,
            property,
            value: value.into(),
            is_required: false,
        }
    }

    fn not_anamorphic() -> Self {
        Self::new(ConditionKind::NotEquals, ProfileProperty::IsAnamorphic, "true")
    }

    fn not_interlaced() -> Self {
        Self::new(ConditionKind::NotEquals, ProfileProperty::IsInterlaced, "true")
    }

    fn max_level(level: &str) -> Self {
        Self::new(ConditionKind::LessThanEqual, ProfileProperty::VideoLevel, level)
    }
}

/// Builds device profiles from capability records
pub struct DeviceProfileBuilder;

impl DeviceProfileBuilder {
    /// Default bitrate ceiling for a device
    pub fn default_bitrate(capabilities: &CapabilityRecord) -> u64 {
        if capabilities.is_4k() {
            DEFAULT_BITRATE_4K
        } else {
            DEFAULT_BITRATE_1080P
        }
    }

    /// Video codecs in preference order
    pub fn video_codecs(capabilities: &CapabilityRecord) -> Vec<&'static str> {
        let mut codecs = Vec::with_capacity(3);
        if capabilities.supports_hevc {
            codecs.push("hevc");
        }
        codecs.push("h264");
        if capabilities.supports_av1 {
            codecs.push("av1");
        }
        codecs
    }

    /// Allowed HDR range values for HEVC, in the server's expected order
    pub fn video_range_types(capabilities: &CapabilityRecord) -> Vec<&'static str> {
        let mut ranges = vec!["SDR"];
        if capabilities.supports_hdr10 {
            ranges.push("HDR10");
        }
        if capabilities.supports_hdr10_plus {
            ranges.push("HDR10Plus");
        }
        if capabilities.supports_dolby_vision {
            ranges.extend(["DOVI", "DOVIWithHDR10", "DOVIWithHLG", "DOVIWithSDR"]);
        }
        ranges
    }

    /// Build the profile for a negotiation
    pub fn build(capabilities: &CapabilityRecord, requested_bitrate: Option<u64>) -> DeviceProfile {
        let bitrate = requested_bitrate.unwrap_or_else(|| Self::default_bitrate(capabilities));
        let video_codecs = Self::video_codecs(capabilities).join(",");
        let mp4_audio = MP4_AUDIO_CODECS.join(",");

        let direct_play_profiles = vec![
            DirectPlayProfile {
                container: "mp4,m4v".to_string(),
                kind: MediaKind::Video,
                video_codec: video_codecs.clone(),
                audio_codec: mp4_audio.clone(),
            },
            DirectPlayProfile {
                container: "mov".to_string(),
                kind: MediaKind::Video,
                video_codec: video_codecs.clone(),
                audio_codec: mp4_audio,
            },
            // HEVC in MPEG-TS breaks HDR and Dolby Vision signalling
            DirectPlayProfile {
                container: "mpegts,ts".to_string(),
                kind: MediaKind::Video,
                video_codec: "h264".to_string(),
                audio_codec: TS_AUDIO_CODECS.join(","),
            },
        ];

        // fMP4 segments, never MPEG-TS: HEVC/HDR inside HLS needs them
        let transcoding_profiles = vec![TranscodingProfile {
            container: "mp4".to_string(),
            kind: MediaKind::Video,
            video_codec: video_codecs,
            audio_codec: TRANSCODE_AUDIO_CODECS.join(","),
            protocol: StreamingProtocol::Hls,
            context: "Streaming".to_string(),
            max_audio_channels: "6".to_string(),
            min_segments: 2,
            break_on_non_key_frames: true,
            enable_subtitles_in_manifest: true,
        }];

        DeviceProfile {
            name: format!("Marquee ({})", capabilities.model_label),
            max_streaming_bitrate: bitrate,
            max_static_bitrate: bitrate,
            music_streaming_transcoding_bitrate: bitrate,
            direct_play_profiles,
            transcoding_profiles,
            subtitle_profiles: Self::subtitle_profiles(),
            codec_profiles: Self::codec_profiles(capabilities),
        }
    }

    fn subtitle_profiles() -> Vec<SubtitleProfile> {
        use SubtitleDeliveryMethod::*;
        [
            ("vtt", Hls),
            ("srt", External),
            ("ass", External),
            ("ssa", External),
            ("sub", External),
            ("pgssub", Encode),
            ("dvdsub", Encode),
            ("dvbsub", Encode),
        ]
        .into_iter()
        .map(|(format, method)| SubtitleProfile {
            format: format.to_string(),
            method,
        })
        .collect()
    }

    fn codec_profiles(capabilities: &CapabilityRecord) -> Vec<CodecProfile> {
        let h264_level = if capabilities.is_4k() {
            H264_LEVEL_4K
        } else {
            H264_LEVEL_1080P
        };

        let mut profiles = vec![CodecProfile {
            kind: MediaKind::Video,
            codec: "h264".to_string(),
            conditions: vec![
                ProfileCondition::not_anamorphic(),
                ProfileCondition::not_interlaced(),
                ProfileCondition::max_level(h264_level),
            ],
        }];

        if capabilities.supports_hevc {
            let mut conditions = vec![
                ProfileCondition::not_anamorphic(),
                ProfileCondition::not_interlaced(),
                ProfileCondition::max_level(HEVC_LEVEL),
            ];
            if capabilities.supports_any_hdr() {
                conditions.push(ProfileCondition::new(
                    ConditionKind::EqualsAny,
                    ProfileProperty::VideoRangeType,
                    Self::video_range_types(capabilities).join("|"),
                ));
            }
            profiles.push(CodecProfile {
                kind: MediaKind::Video,
                codec: "hevc".to_string(),
                conditions,
            });
        }

        if capabilities.supports_av1 {
            profiles.push(CodecProfile {
                kind: MediaKind::Video,
                codec: "av1".to_string(),
                conditions: vec![
                    ProfileCondition::not_anamorphic(),
                    ProfileCondition::not_interlaced(),
                ],
            });
        }

        profiles
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::ResolutionTier;

    const KNOWN_MODELS: &[&str] = &[
        "AppleTV5,3",
        "AppleTV6,2",
        "AppleTV11,1",
        "AppleTV14,1",
        "x86_64",
        "FutureBox1,1",
    ];

    fn all_records() -> Vec<CapabilityRecord> {
        KNOWN_MODELS
            .iter()
            .map(|m| CapabilityRecord::for_model(m, false))
            .collect()
    }

    #[test]
    fn test_never_advertises_unsupported_codecs() {
        for caps in all_records() {
            let profile = DeviceProfileBuilder::build(&caps, None);
            let advertised = profile.advertised_video_codecs();
            assert_eq!(advertised.contains(&"hevc"), caps.supports_hevc, "{}", caps.model_label);
            assert_eq!(advertised.contains(&"av1"), caps.supports_av1, "{}", caps.model_label);
            assert!(advertised.contains(&"h264"));
        }
    }

    #[test]
    fn test_mpegts_is_always_h264_only() {
        for caps in all_records() {
            let profile = DeviceProfileBuilder::build(&caps, Some(8_000_000));
            let ts = profile.direct_play("mpegts,ts").unwrap();
            assert_eq!(ts.video_codec, "h264");
        }
    }

    #[test]
    fn test_hdr_ranges_require_hevc_and_hdr() {
        for caps in all_records() {
            let profile = DeviceProfileBuilder::build(&caps, None);
            let ranges = profile.video_ranges("hevc");
            if ranges.iter().any(|r| *r != "SDR") {
                assert!(caps.supports_hevc);
                assert!(caps.supports_any_hdr());
            }
        }
    }

    #[test]
    fn test_codec_order() {
        let caps = CapabilityRecord::unrecognized("FutureBox1,1");
        let profile = DeviceProfileBuilder::build(&caps, None);
        assert_eq!(profile.direct_play("mp4,m4v").unwrap().video_codec, "hevc,h264,av1");
        assert_eq!(profile.direct_play("mov").unwrap().video_codec, "hevc,h264,av1");
        assert_eq!(profile.transcoding_profiles[0].video_codec, "hevc,h264,av1");
    }

    #[test]
    fn test_video_range_order() {
        let caps = CapabilityRecord::unrecognized("FutureBox1,1");
        let profile = DeviceProfileBuilder::build(&caps, None);
        assert_eq!(
            profile.video_ranges("hevc"),
            vec!["SDR", "HDR10", "HDR10Plus", "DOVI", "DOVIWithHDR10", "DOVIWithHLG", "DOVIWithSDR"]
        );

        let first_gen_4k = CapabilityRecord::for_model("AppleTV6,2", false);
        let profile = DeviceProfileBuilder::build(&first_gen_4k, None);
        assert_eq!(
            profile.video_ranges("hevc"),
            vec!["SDR", "HDR10", "DOVI", "DOVIWithHDR10", "DOVIWithHLG", "DOVIWithSDR"]
        );
    }

    #[test]
    fn test_hevc_without_hdr_has_no_range_condition() {
        let caps = CapabilityRecord {
            supports_hevc: true,
            supports_hevc_10bit: true,
            supports_hdr10: false,
            supports_hdr10_plus: false,
            supports_dolby_vision: false,
            supports_av1: false,
            max_resolution: ResolutionTier::Uhd4k,
            model_label: "test".into(),
        };
        let profile = DeviceProfileBuilder::build(&caps, None);
        assert_eq!(profile.codec_conditions("hevc").len(), 3);
        assert!(profile.video_ranges("hevc").is_empty());
    }

    #[test]
    fn test_apple_tv_hd_has_empty_av1_profile() {
        let caps = CapabilityRecord::for_model("AppleTV5,3", false);
        let profile = DeviceProfileBuilder::build(&caps, None);
        assert!(profile.codec_conditions("av1").is_empty());
        assert!(profile.codec_conditions("hevc").is_empty());
        assert_eq!(profile.max_streaming_bitrate, DEFAULT_BITRATE_1080P);
        assert!(profile
            .codec_conditions("h264")
            .iter()
            .any(|c| c.property == ProfileProperty::VideoLevel && c.value == "42"));
    }

    #[test]
    fn test_transcoding_profile_is_fmp4_hls() {
        let caps = CapabilityRecord::emulated();
        let profile = DeviceProfileBuilder::build(&caps, None);
        assert_eq!(profile.transcoding_profiles.len(), 1);
        let tp = &profile.transcoding_profiles[0];
        assert_eq!(tp.container, "mp4");
        assert_eq!(tp.protocol, StreamingProtocol::Hls);
        assert_eq!(tp.min_segments, 2);
        assert!(tp.break_on_non_key_frames);
        assert!(tp.enable_subtitles_in_manifest);
    }

    #[test]
    fn test_subtitle_profiles_fixed() {
        let low = DeviceProfileBuilder::build(&CapabilityRecord::emulated(), None);
        let high = DeviceProfileBuilder::build(&CapabilityRecord::unrecognized("x"), None);
        assert_eq!(low.subtitle_profiles.len(), 8);
        assert_eq!(low.subtitle_profiles, high.subtitle_profiles);
        let pgs = low.subtitle_profiles.iter().find(|s| s.format == "pgssub").unwrap();
        assert_eq!(pgs.method, SubtitleDeliveryMethod::Encode);
    }

    #[test]
    fn test_bitrate_ceiling() {
        let caps = CapabilityRecord::for_model("AppleTV14,1", false);
        let profile = DeviceProfileBuilder::build(&caps, None);
        assert_eq!(profile.max_streaming_bitrate, DEFAULT_BITRATE_4K);
        assert_eq!(profile.max_static_bitrate, DEFAULT_BITRATE_4K);

        let capped = DeviceProfileBuilder::build(&caps, Some(4_000_000));
        assert_eq!(capped.max_streaming_bitrate, 4_000_000);
        assert_eq!(capped.music_streaming_transcoding_bitrate, 4_000_000);
    }

    #[test]
    fn test_wire_names() {
        let profile = DeviceProfileBuilder::build(&CapabilityRecord::emulated(), None);
        let json = serde_json::to_value(&profile).unwrap();
        assert_eq!(json["TranscodingProfiles"][0]["Protocol"], "hls");
        assert_eq!(json["TranscodingProfiles"][0]["Type"], "Video");
        assert_eq!(json["DirectPlayProfiles"][2]["Container"], "mpegts,ts");
        assert_eq!(json["CodecProfiles"][0]["Conditions"][0]["Property"], "IsAnamorphic");
        assert_eq!(json["SubtitleProfiles"][0]["Method"], "Hls");
    }
}
