//! Subtitle track selection

use crate::wire::{MediaStream, StreamType};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// What to pick when no track matches the stored language preference
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubtitleFallback {
    /// Subtitles stay off
    #[default]
    Disabled,
    /// Use the media's own default track, ignoring forced tracks
    MediaDefault,
}

/// Chooses the initial subtitle track for a session
#[derive(Debug, Clone, Copy, Default)]
pub struct SubtitleSelector {
    fallback: SubtitleFallback,
}

impl SubtitleSelector {
    pub fn new(fallback: SubtitleFallback) -> Self {
        Self { fallback }
    }

    /// Stream index of the track to enable, or `None` for no subtitles
    pub fn select(&self, tracks: &[MediaStream], preferred_language: Option<&str>) -> Option<i32> {
        let subtitles = tracks.iter().filter(|t| t.stream_type == StreamType::Subtitle);

        let preferred = preferred_language
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .and_then(|language| {
                let matches = |t: &&MediaStream| {
                    t.language
                        .as_deref()
                        .is_some_and(|l| l.eq_ignore_ascii_case(language))
                };
                // A full track beats a forced-only track in the same language
                subtitles
                    .clone()
                    .filter(|t| !t.is_forced)
                    .find(matches)
                    .or_else(|| subtitles.clone().find(matches))
            });

        if let Some(track) = preferred {
            return Some(track.index);
        }

        match self.fallback {
            SubtitleFallback::Disabled => None,
            SubtitleFallback::MediaDefault => subtitles
                .filter(|t| t.is_default && !t.is_forced)
                .map(|t| t.index)
                .next(),
        }
    }

    /// Order subtitle tracks for a chooser: regular tracks first, then
    /// forced, each alphabetically by label
    pub fn sort_for_chooser(tracks: &[MediaStream]) -> Vec<&MediaStream> {
        let mut sorted: Vec<&MediaStream> = tracks
            .iter()
            .filter(|t| t.stream_type == StreamType::Subtitle)
            .collect();
        sorted.sort_by(|a, b| match (a.is_forced, b.is_forced) {
            (false, true) => Ordering::Less,
            (true, false) => Ordering::Greater,
            _ => a.label().to_lowercase().cmp(&b.label().to_lowercase()),
        });
        sorted
    }
}
