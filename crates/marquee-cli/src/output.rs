//! Output formatting for CLI

use marquee_core::{BufferStats, EngineEvent};
use serde::Serialize;

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
    Table,
}

impl From<&str> for OutputFormat {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => OutputFormat::Json,
            "table" => OutputFormat::Table,
            _ => OutputFormat::Text,
        }
    }
}

/// Pretty JSON for structured output
pub fn to_json<T: Serialize>(data: &T) -> anyhow::Result<String> {
    Ok(serde_json::to_string_pretty(data)?)
}

/// One line per engine event
pub fn format_event(event: &EngineEvent, format: OutputFormat) -> anyhow::Result<String> {
    if format == OutputFormat::Json {
        return Ok(serde_json::to_string(event)?);
    }

    Ok(match event {
        EngineEvent::StateChanged { from, to } => format!("state      {} -> {}", from, to),
        EngineEvent::Progress { position, duration, .. } => match duration {
            Some(d) => format!("progress   {:.1}s / {:.1}s", position, d),
            None => format!("progress   {:.1}s", position),
        },
        EngineEvent::ApproachingEnd { item_id, remaining } => {
            format!("ending     {} ({:.1}s left)", item_id, remaining)
        }
        EngineEvent::AutoplayCountdown { next_item_id, seconds_left } => {
            format!("up next    {} in {}s", next_item_id, seconds_left)
        }
        EngineEvent::AutoplayDismissed => "up next    dismissed".to_string(),
        EngineEvent::AutoplayAdvancing { from_item_id, next_item_id } => {
            format!("advancing  {} -> {}", from_item_id, next_item_id)
        }
        EngineEvent::SubtitleChanged { stream_index } => match stream_index {
            Some(index) => format!("subtitles  stream {}", index),
            None => "subtitles  off".to_string(),
        },
        EngineEvent::Completed { item_id } => format!("completed  {}", item_id),
    })
}

/// One line per loading-phase buffer update
pub fn format_buffer(stats: &BufferStats, format: OutputFormat) -> anyhow::Result<String> {
    if format == OutputFormat::Json {
        return Ok(serde_json::to_string(stats)?);
    }

    let line = format!(
        "buffering  {:.0}% at {:.1} MB/s",
        stats.percentage,
        stats.download_speed / 1_000_000.0
    );
    Ok(match stats.remaining {
        Some(remaining) => format!("{} ({:.1}s left)", line, remaining.as_secs_f64()),
        None => line,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_from_str() {
        assert_eq!(OutputFormat::from("JSON"), OutputFormat::Json);
        assert_eq!(OutputFormat::from("table"), OutputFormat::Table);
        assert_eq!(OutputFormat::from("anything"), OutputFormat::Text);
    }

    #[test]
    fn test_format_event_text() {
        let event = EngineEvent::AutoplayCountdown {
            next_item_id: "ep2".into(),
            seconds_left: 3,
        };
        assert_eq!(format_event(&event, OutputFormat::Text).unwrap(), "up next    ep2 in 3s");
    }

    #[test]
    fn test_format_buffer_text() {
        let stats = BufferStats::compute(2_000_000, Some(8_000_000), std::time::Duration::from_secs(1));
        assert_eq!(
            format_buffer(&stats, OutputFormat::Text).unwrap(),
            "buffering  25% at 2.0 MB/s (3.0s left)"
        );
    }

    #[test]
    fn test_format_event_json() {
        let line = format_event(&EngineEvent::AutoplayDismissed, OutputFormat::Json).unwrap();
        assert!(line.contains("autoplay_dismissed"));
    }
}
