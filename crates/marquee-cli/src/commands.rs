//! CLI command implementations

use crate::output::{format_buffer, format_event, to_json, OutputFormat};
use crate::simulated::SimulatedPlayer;
use crate::ServerArgs;
use anyhow::{anyhow, Context};
use marquee_core::{
    seconds_to_ticks, Credentials, DeviceCapabilityProbe, DeviceProfileBuilder, EngineConfig,
    EngineEvent, HttpMediaServer, MediaItem, PlaybackEngine, PlaybackNegotiator,
    PlaybackRequest, PlaybackResult, QualityPolicy, QualityTier, TechnicalInfo,
};
use std::path::Path;
use std::sync::Arc;
use tabled::{Table, Tabled};
use tokio::sync::broadcast::error::RecvError;
use url::Url;
use uuid::Uuid;

/// Load the engine configuration, falling back to defaults
pub fn load_config(path: Option<&Path>) -> anyhow::Result<EngineConfig> {
    match path {
        Some(path) => EngineConfig::from_json_file(path)
            .with_context(|| format!("loading config from {}", path.display())),
        None => Ok(EngineConfig::default()),
    }
}

/// Resolve a tier name, defaulting to the configured tier
pub fn parse_tier(name: Option<&str>, config: &EngineConfig) -> anyhow::Result<QualityTier> {
    match name {
        Some(name) => QualityTier::from_name(name).ok_or_else(|| {
            let known: Vec<&str> = QualityTier::ALL.iter().map(|t| t.name()).collect();
            anyhow!("unknown quality tier '{}' (expected one of: {})", name, known.join(", "))
        }),
        None => Ok(config.default_quality),
    }
}

fn connect(args: &ServerArgs, config: &EngineConfig) -> anyhow::Result<Arc<HttpMediaServer>> {
    let server = args
        .server
        .as_deref()
        .ok_or_else(|| anyhow!("--server (or MARQUEE_SERVER) is required"))?;
    let token = args
        .token
        .as_deref()
        .ok_or_else(|| anyhow!("--token (or MARQUEE_TOKEN) is required"))?;
    let user_id = args
        .user_id
        .as_deref()
        .ok_or_else(|| anyhow!("--user-id (or MARQUEE_USER_ID) is required"))?;
    let device_id = args
        .device_id
        .clone()
        .unwrap_or_else(|| Uuid::new_v4().simple().to_string());

    let base_url = Url::parse(server).with_context(|| format!("invalid server URL '{}'", server))?;
    let credentials = Credentials::new(base_url, token, user_id, device_id);
    let client = HttpMediaServer::new(credentials, &config.client, config.request_timeout())?;
    Ok(Arc::new(client))
}

/// Show detected capabilities
pub fn capabilities(format: OutputFormat) -> anyhow::Result<()> {
    let caps = DeviceCapabilityProbe::new().capabilities();

    if format == OutputFormat::Json {
        println!("{}", to_json(caps.as_ref())?);
        return Ok(());
    }

    println!("Device: {}", caps.model_label);
    println!("  Max resolution: {}", caps.max_resolution);
    println!("  HEVC:           {}", caps.supports_hevc);
    println!("  HEVC 10-bit:    {}", caps.supports_hevc_10bit);
    println!("  HDR10:          {}", caps.supports_hdr10);
    println!("  HDR10+:         {}", caps.supports_hdr10_plus);
    println!("  Dolby Vision:   {}", caps.supports_dolby_vision);
    println!("  AV1:            {}", caps.supports_av1);
    println!(
        "  Default bitrate: {} bps",
        DeviceProfileBuilder::default_bitrate(&caps)
    );
    Ok(())
}

/// Print the device profile
pub fn profile(bitrate: Option<u64>) -> anyhow::Result<()> {
    let caps = DeviceCapabilityProbe::new().capabilities();
    let profile = DeviceProfileBuilder::build(&caps, bitrate);
    println!("{}", to_json(&profile)?);
    Ok(())
}

#[derive(Tabled, serde::Serialize)]
struct TierRow {
    #[tabled(rename = "Tier")]
    name: &'static str,
    #[tabled(rename = "Label")]
    label: &'static str,
    #[tabled(rename = "Bitrate (bps)")]
    bitrate: u64,
    #[tabled(rename = "Max width")]
    max_width: u32,
}

/// List quality tiers
pub fn qualities(format: OutputFormat) -> anyhow::Result<()> {
    let rows: Vec<TierRow> = QualityTier::ALL
        .iter()
        .map(|tier| {
            let ceiling = QualityPolicy::resolve(*tier);
            TierRow {
                name: tier.name(),
                label: tier.label(),
                bitrate: ceiling.bitrate,
                max_width: ceiling.max_width,
            }
        })
        .collect();

    match format {
        OutputFormat::Json => println!("{}", to_json(&rows)?),
        OutputFormat::Table => println!("{}", Table::new(&rows)),
        OutputFormat::Text => {
            for row in &rows {
                println!("  {:<13} {:<20} {:>11} bps  {}w", row.name, row.label, row.bitrate, row.max_width);
            }
        }
    }
    Ok(())
}

/// Negotiate an item and print the result
pub async fn negotiate(
    args: &ServerArgs,
    config: &EngineConfig,
    item_id: &str,
    tier: QualityTier,
    legacy: bool,
    start: Option<f64>,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let server = connect(args, config)?;
    let caps = DeviceCapabilityProbe::new().capabilities();
    let negotiator = PlaybackNegotiator::new(
        server,
        caps.clone(),
        QualityPolicy::new(config.probe_automatic_quality),
    )
    .with_auto_open_live_stream(config.auto_open_live_stream);

    let result = if legacy {
        negotiator.legacy_stream(item_id, tier, start)?
    } else {
        negotiator.negotiate(item_id, tier).await?
    };

    print_result(&result, &caps.model_label, format)
}

fn print_result(result: &PlaybackResult, device: &str, format: OutputFormat) -> anyhow::Result<()> {
    if format == OutputFormat::Json {
        println!("{}", to_json(result)?);
        return Ok(());
    }

    let info = TechnicalInfo::from_result(result, device);
    println!("Playback negotiated:");
    println!("  Method:       {}", info.play_method);
    println!("  Transcoding:  {}", info.is_transcoding);
    println!("  Session:      {}", info.play_session_id);
    println!("  Source:       {}", info.media_source_id);
    if let Some(container) = &info.container {
        println!("  Container:    {}", container);
    }
    if let Some(bitrate) = info.bitrate {
        println!("  Bitrate:      {} bps", bitrate);
    }
    if let Some(codec) = &info.video_codec {
        println!("  Video codec:  {}", codec);
    }
    if let Some(codec) = &info.audio_codec {
        println!("  Audio codec:  {}", codec);
    }
    println!("  URL:          {}", result.stream_url);

    let subtitles = marquee_core::SubtitleSelector::sort_for_chooser(&result.media_source.media_streams);
    if !subtitles.is_empty() {
        println!("  Subtitles:");
        for stream in subtitles {
            println!(
                "    {:>3}  {}{}",
                stream.index,
                stream.label(),
                if stream.is_forced { " (forced)" } else { "" }
            );
        }
    }
    Ok(())
}

/// Run the latency probe
pub async fn probe(args: &ServerArgs, config: &EngineConfig, format: OutputFormat) -> anyhow::Result<()> {
    let server = connect(args, config)?;
    let bitrate = QualityPolicy::probe_bitrate(server.as_ref()).await;

    if format == OutputFormat::Json {
        println!("{}", serde_json::json!({ "estimated_bitrate": bitrate }));
    } else {
        println!("Estimated bitrate: {} bps ({:.1} Mbps)", bitrate, bitrate as f64 / 1_000_000.0);
    }
    Ok(())
}

/// Play an item with the simulated player until it completes
pub async fn play(
    args: &ServerArgs,
    config: EngineConfig,
    item_id: &str,
    tier: QualityTier,
    duration: f64,
    speed: f64,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let server = connect(args, &config)?;
    let caps = DeviceCapabilityProbe::new().capabilities();
    let (player, mut player_events) = SimulatedPlayer::new(duration, speed);

    let engine = PlaybackEngine::builder(config, server, caps, Arc::new(player)).build()?;
    let mut events = engine.subscribe_events();

    // The player buffers while start_playback is still awaiting it
    let forwarder = tokio::spawn({
        let engine = engine.clone();
        async move {
            while let Some(event) = player_events.recv().await {
                engine.handle_player_event(event).await;
            }
        }
    });
    let mut buffer = engine.subscribe_buffer();
    let buffer_printer = tokio::spawn(async move {
        while buffer.changed().await.is_ok() {
            let stats = *buffer.borrow_and_update();
            if let Some(stats) = stats.filter(|s| s.downloaded_bytes > 0) {
                match format_buffer(&stats, format) {
                    Ok(line) => println!("{}", line),
                    Err(e) => tracing::warn!(error = %e, "Failed to format buffer stats"),
                }
            }
        }
    });

    let item = MediaItem::new(item_id, item_id).with_runtime_ticks(seconds_to_ticks(duration));
    let started = engine
        .start_playback(PlaybackRequest::new(item).with_tier(tier))
        .await;
    buffer_printer.abort();
    let result = match started {
        Ok(result) => result,
        Err(e) => {
            forwarder.abort();
            return Err(e.into());
        }
    };
    if format != OutputFormat::Json {
        println!("Playing {} via {} ({})", item_id, result.play_method, result.stream_url);
    }

    loop {
        tokio::select! {
            received = events.recv() => match received {
                Ok(event) => {
                    println!("{}", format_event(&event, format)?);
                    if matches!(event, EngineEvent::Completed { .. }) {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => tracing::warn!(skipped, "Dropped engine events"),
                Err(RecvError::Closed) => break,
            },
            _ = tokio::signal::ctrl_c() => {
                println!("Interrupted");
                break;
            }
        }
    }

    engine.stop().await;
    forwarder.abort();
    Ok(())
}
