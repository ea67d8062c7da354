//! Playback engine - orchestrator for a single playback session
//!
//! Coordinates:
//! - Negotiation and player setup
//! - State machine transitions
//! - Periodic progress observation and session reporting
//! - Approach-end detection and the next-item autoplay countdown
//!
//! At most one session is active. Starting a new one tears the previous
//! one down first, and all background work for a session is registered in a
//! [`TaskRegistry`] so teardown can cancel it in one place.

use crate::{
    buffer::BufferStats,
    capabilities::CapabilityRecord,
    config::EngineConfig,
    events::{EngineEvent, EventBus},
    negotiator::PlaybackNegotiator,
    player::{MediaPlayer, MediaService, PlayerEvent, SubtitleTrack},
    quality::{QualityPolicy, QualityTier},
    reporter::{ReportTarget, SessionReporter},
    subtitles::SubtitleSelector,
    tasks::{TaskRegistry, AUTOPLAY_COUNTDOWN, NEXT_ITEM_LOOKUP, PROGRESS_OBSERVER},
    types::*,
    api::MediaServer,
    Error, Result,
};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::{broadcast, watch, Mutex, RwLock};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, instrument, warn};

/// What to play and how
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackRequest {
    pub item: MediaItem,
    /// Falls back to the configured default tier
    pub tier: Option<QualityTier>,
    /// Resume offset in seconds
    pub resume_position: Option<f64>,
    /// Explicit subtitle stream; `None` lets the selector decide
    pub subtitle_index: Option<i32>,
}

impl PlaybackRequest {
    pub fn new(item: MediaItem) -> Self {
        Self {
            item,
            tier: None,
            resume_position: None,
            subtitle_index: None,
        }
    }

    pub fn with_tier(mut self, tier: QualityTier) -> Self {
        self.tier = Some(tier);
        self
    }

    pub fn resume_from(mut self, seconds: f64) -> Self {
        self.resume_position = Some(seconds);
        self
    }

    pub fn with_subtitle(mut self, stream_index: i32) -> Self {
        self.subtitle_index = Some(stream_index);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Delivery {
    Negotiated,
    Legacy,
}

/// Engine-private bookkeeping for the active session
struct ActiveSession {
    session: PlaybackSession,
    item: MediaItem,
    tier: QualityTier,
    result: PlaybackResult,
    target: ReportTarget,
    /// Added to player positions when the stream itself starts mid-item
    position_offset: f64,
    duration: Option<f64>,
    subtitle_index: Option<i32>,
    /// Guards the exactly-once stop report
    stop_reported: bool,
    approach_end_fired: bool,
    autoplay_cancelled: bool,
    countdown_active: bool,
    handoff_started: bool,
    next_item: Option<MediaItem>,
}

impl ActiveSession {
    fn position_ticks(&self) -> i64 {
        self.session.position_ticks()
    }
}

struct EngineInner {
    config: EngineConfig,
    negotiator: PlaybackNegotiator,
    reporter: SessionReporter,
    player: Arc<dyn MediaPlayer>,
    media: Option<Arc<dyn MediaService>>,
    subtitles: SubtitleSelector,
    state_tx: watch::Sender<PlaybackState>,
    buffer_tx: watch::Sender<Option<BufferStats>>,
    events: EventBus,
    /// Serializes start/stop so teardown finishes before a new session begins
    lifecycle: Mutex<()>,
    session: Mutex<Option<ActiveSession>>,
    tasks: Mutex<TaskRegistry>,
    loading_started: RwLock<Option<Instant>>,
}

/// Builder for [`PlaybackEngine`]
pub struct EngineBuilder {
    config: EngineConfig,
    server: Arc<dyn MediaServer>,
    capabilities: Arc<CapabilityRecord>,
    player: Arc<dyn MediaPlayer>,
    media: Option<Arc<dyn MediaService>>,
}

impl EngineBuilder {
    /// Catalog service used to find the next item for autoplay
    pub fn media_service(mut self, media: Arc<dyn MediaService>) -> Self {
        self.media = Some(media);
        self
    }

    /// Build the engine; must be called inside a Tokio runtime
    pub fn build(self) -> Result<PlaybackEngine> {
        self.config.validate()?;

        let policy = QualityPolicy::new(self.config.probe_automatic_quality);
        let negotiator = PlaybackNegotiator::new(self.server.clone(), self.capabilities, policy)
            .with_auto_open_live_stream(self.config.auto_open_live_stream);
        let (state_tx, _) = watch::channel(PlaybackState::Idle);
        let (buffer_tx, _) = watch::channel(None);

        Ok(PlaybackEngine {
            inner: Arc::new(EngineInner {
                subtitles: SubtitleSelector::new(self.config.subtitle_fallback),
                config: self.config,
                negotiator,
                reporter: SessionReporter::spawn(self.server),
                player: self.player,
                media: self.media,
                state_tx,
                buffer_tx,
                events: EventBus::new(),
                lifecycle: Mutex::new(()),
                session: Mutex::new(None),
                tasks: Mutex::new(TaskRegistry::new()),
                loading_started: RwLock::new(None),
            }),
        })
    }
}

/// Playback state machine and session owner
///
/// Cheap to clone; clones share the same engine.
#[derive(Clone)]
pub struct PlaybackEngine {
    inner: Arc<EngineInner>,
}

impl PlaybackEngine {
    pub fn builder(
        config: EngineConfig,
        server: Arc<dyn MediaServer>,
        capabilities: Arc<CapabilityRecord>,
        player: Arc<dyn MediaPlayer>,
    ) -> EngineBuilder {
        EngineBuilder {
            config,
            server,
            capabilities,
            player,
            media: None,
        }
    }

    /// Negotiate and start playing an item
    #[instrument(skip(self, request), fields(item_id = %request.item.id))]
    pub async fn start_playback(&self, request: PlaybackRequest) -> Result<PlaybackResult> {
        self.inner.start(request, Delivery::Negotiated).await
    }

    /// Start playing through the legacy HLS manifest, skipping negotiation
    #[instrument(skip(self, request), fields(item_id = %request.item.id))]
    pub async fn start_legacy_playback(&self, request: PlaybackRequest) -> Result<PlaybackResult> {
        self.inner.start(request, Delivery::Legacy).await
    }

    /// Stop the current session; safe to call repeatedly
    #[instrument(skip(self))]
    pub async fn stop(&self) {
        self.inner.stop().await;
    }

    pub async fn pause(&self) -> Result<()> {
        self.inner.set_paused(true).await
    }

    pub async fn play(&self) -> Result<()> {
        self.inner.set_paused(false).await
    }

    pub async fn toggle(&self) -> Result<()> {
        match self.state() {
            PlaybackState::Playing => self.pause().await,
            PlaybackState::Paused => self.play().await,
            state => {
                warn!(state = %state, "Cannot toggle from current state");
                Ok(())
            }
        }
    }

    /// Seek to a position in seconds
    pub async fn seek(&self, position: f64) -> Result<()> {
        self.inner.seek(position).await
    }

    /// Switch subtitles; `None` disables them
    pub async fn select_subtitle(&self, stream_index: Option<i32>) -> Result<()> {
        self.inner.select_subtitle(stream_index).await
    }

    /// Skip the countdown and advance to the next item now
    pub async fn confirm_autoplay(&self) -> bool {
        self.inner.tasks.lock().await.cancel(AUTOPLAY_COUNTDOWN);
        self.inner.begin_handoff().await
    }

    /// Disable autoplay for the rest of this session
    pub async fn cancel_autoplay(&self) -> Result<()> {
        self.inner.cancel_autoplay().await
    }

    /// Feed a notification from the platform player
    pub async fn handle_player_event(&self, event: PlayerEvent) {
        self.inner.handle_player_event(event).await;
    }

    /// Current state
    pub fn state(&self) -> PlaybackState {
        self.inner.state_tx.borrow().clone()
    }

    /// Subscribe to state changes
    pub fn subscribe_state(&self) -> watch::Receiver<PlaybackState> {
        self.inner.state_tx.subscribe()
    }

    /// Subscribe to loading-phase buffer stats; `None` outside loading
    pub fn subscribe_buffer(&self) -> watch::Receiver<Option<BufferStats>> {
        self.inner.buffer_tx.subscribe()
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<EngineEvent> {
        self.inner.events.subscribe()
    }

    /// Snapshot of the active session
    pub async fn session(&self) -> Option<PlaybackSession> {
        self.inner
            .session
            .lock()
            .await
            .as_ref()
            .map(|a| a.session.clone())
    }

    /// Item queued for autoplay, once known
    pub async fn next_item(&self) -> Option<MediaItem> {
        self.inner
            .session
            .lock()
            .await
            .as_ref()
            .and_then(|a| a.next_item.clone())
    }

    pub async fn technical_info(&self) -> Option<TechnicalInfo> {
        let label = &self.inner.negotiator.capabilities().model_label;
        self.inner
            .session
            .lock()
            .await
            .as_ref()
            .map(|a| TechnicalInfo::from_result(&a.result, label))
    }

    pub fn negotiator(&self) -> &PlaybackNegotiator {
        &self.inner.negotiator
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }
}

impl EngineInner {
    fn state(&self) -> PlaybackState {
        self.state_tx.borrow().clone()
    }

    /// Transition to a new state, rejecting invalid transitions
    fn set_state(&self, new_state: PlaybackState) -> Result<()> {
        let current = self.state();
        if !current.can_transition_to(&new_state) {
            return Err(Error::InvalidStateTransition {
                from: current.to_string(),
                to: new_state.to_string(),
            });
        }
        self.force_state(new_state);
        Ok(())
    }

    fn force_state(&self, new_state: PlaybackState) {
        let previous = self.state_tx.send_replace(new_state.clone());
        if previous != new_state {
            info!(from = %previous, to = %new_state, "State transition");
            self.events.emit(EngineEvent::StateChanged {
                from: previous,
                to: new_state,
            });
        }
    }

    async fn start(self: &Arc<Self>, request: PlaybackRequest, delivery: Delivery) -> Result<PlaybackResult> {
        let _lifecycle = self.lifecycle.lock().await;
        self.teardown().await;

        let tier = request.tier.unwrap_or(self.config.default_quality);
        let item_id = request.item.id.clone();
        let resume = request.resume_position.unwrap_or(0.0).max(0.0);

        self.set_state(PlaybackState::Loading)?;
        *self.loading_started.write().await = Some(Instant::now());
        self.buffer_tx
            .send_replace(Some(BufferStats::compute(0, None, Duration::ZERO)));

        let negotiated = match delivery {
            Delivery::Negotiated => self.negotiator.negotiate(&item_id, tier).await,
            Delivery::Legacy => self.negotiator.legacy_stream(&item_id, tier, Some(resume)),
        };
        let result = match negotiated {
            Ok(result) => result,
            Err(e) => return Err(self.fail(e, false).await),
        };

        // The legacy manifest already begins at the resume offset
        let (player_start, position_offset) = match delivery {
            Delivery::Negotiated => (resume, 0.0),
            Delivery::Legacy => (0.0, resume),
        };

        if let Err(e) = self.player.load(&result.stream_url, player_start).await {
            return Err(self.fail(e, true).await);
        }

        let requested_subtitle = request.subtitle_index.or_else(|| {
            self.subtitles.select(
                &result.media_source.media_streams,
                self.config.preferred_subtitle_language.as_deref(),
            )
        });
        let subtitle_index = match self.apply_subtitle(&item_id, &result, requested_subtitle).await {
            Ok(()) => requested_subtitle,
            Err(e) => {
                warn!(error = %e, ?requested_subtitle, "Initial subtitle selection failed");
                None
            }
        };

        if let Err(e) = self.player.play().await {
            return Err(self.fail(e, true).await);
        }

        let target = ReportTarget {
            item_id: item_id.clone(),
            media_source_id: result.media_source.id.clone(),
            play_session_id: result.play_session_id.clone(),
            play_method: result.play_method,
        };
        let duration = request
            .item
            .duration()
            .or(result.media_source.run_time_ticks.map(ticks_to_seconds));

        let active = ActiveSession {
            session: PlaybackSession::new(&item_id, &result.play_session_id, resume),
            item: request.item,
            tier,
            result: result.clone(),
            target: target.clone(),
            position_offset,
            duration,
            subtitle_index,
            stop_reported: false,
            approach_end_fired: false,
            autoplay_cancelled: false,
            countdown_active: false,
            handoff_started: false,
            next_item: None,
        };
        {
            // Player errors take the session lock before failing the engine
            let mut guard = self.session.lock().await;
            if let PlaybackState::Failed(reason) = self.state() {
                drop(guard);
                return Err(self.abandon_load(reason).await);
            }

            // Queued before the state change so no control can report ahead of it
            self.reporter.report_start(&target, seconds_to_ticks(resume));
            *guard = Some(active);
            self.buffer_tx.send_replace(None);
            *self.loading_started.write().await = None;
            self.force_state(PlaybackState::Playing);
        }
        self.events.emit(EngineEvent::SubtitleChanged {
            stream_index: subtitle_index,
        });

        self.spawn_observer().await;
        self.spawn_next_item_lookup(item_id).await;

        info!(
            play_session_id = %result.play_session_id,
            play_method = %result.play_method,
            resume,
            "Playback started"
        );
        Ok(result)
    }

    /// Record a setup failure and surface it
    async fn fail(&self, err: Error, player_loaded: bool) -> Error {
        warn!(error = %err, code = err.error_code(), "Playback setup failed");
        if player_loaded {
            self.player.release().await;
        }
        self.buffer_tx.send_replace(None);
        *self.loading_started.write().await = None;
        self.force_state(PlaybackState::Failed(err.to_string()));
        err
    }

    /// The player failed while loading: release it and keep the failure
    async fn abandon_load(&self, reason: String) -> Error {
        warn!(error = %reason, "Player failed while loading");
        self.player.release().await;
        self.buffer_tx.send_replace(None);
        *self.loading_started.write().await = None;
        Error::Player(reason)
    }

    async fn stop(&self) {
        let _lifecycle = self.lifecycle.lock().await;
        if self.teardown().await.is_none() && self.state() != PlaybackState::Idle {
            self.force_state(PlaybackState::Idle);
        }
    }

    /// Tear down the active session, if any
    ///
    /// Cancels session tasks and releases the player before returning.
    async fn teardown(&self) -> Option<PlaybackSession> {
        let active = self.session.lock().await.take();

        let handles = self.tasks.lock().await.cancel_all();
        for handle in handles {
            let _ = handle.await;
        }

        let mut active = active?;

        if !active.stop_reported {
            active.session.position = self.player.position().await + active.position_offset;
        }
        self.player.release().await;

        if !active.stop_reported {
            active.stop_reported = true;
            self.reporter.report_stop(&active.target, active.position_ticks());
        }
        if active.countdown_active {
            self.events.emit(EngineEvent::AutoplayDismissed);
        }

        self.buffer_tx.send_replace(None);
        self.force_state(PlaybackState::Idle);
        info!(
            item_id = %active.session.item_id,
            position = active.session.position,
            "Session stopped"
        );
        Some(active.session)
    }

    async fn set_paused(&self, paused: bool) -> Result<()> {
        let mut guard = self.session.lock().await;
        let active = guard.as_mut().ok_or(Error::NoActiveSession)?;

        let (from, to) = if paused {
            (PlaybackState::Playing, PlaybackState::Paused)
        } else {
            (PlaybackState::Paused, PlaybackState::Playing)
        };
        let current = self.state();
        if current != from {
            warn!(state = %current, target = %to, "Ignoring play/pause in current state");
            return Ok(());
        }

        if paused {
            self.player.pause().await?;
        } else {
            self.player.play().await?;
        }

        active.session.paused = paused;
        active.session.position = self.player.position().await + active.position_offset;
        self.set_state(to)?;
        self.reporter
            .report_progress(&active.target, active.position_ticks(), paused);
        Ok(())
    }

    async fn seek(&self, position: f64) -> Result<()> {
        let mut guard = self.session.lock().await;
        let active = guard.as_mut().ok_or(Error::NoActiveSession)?;

        let clamped = match active.duration {
            Some(duration) => position.clamp(0.0, duration),
            None => position.max(0.0),
        };
        let player_position = (clamped - active.position_offset).max(0.0);
        self.player.seek(player_position).await?;

        debug!(from = active.session.position, to = clamped, "Seeking");
        active.session.position = clamped;
        self.reporter
            .report_progress(&active.target, active.position_ticks(), active.session.paused);
        Ok(())
    }

    async fn select_subtitle(&self, stream_index: Option<i32>) -> Result<()> {
        let mut guard = self.session.lock().await;
        let active = guard.as_mut().ok_or(Error::NoActiveSession)?;

        self.apply_subtitle(&active.item.id, &active.result, stream_index)
            .await?;
        active.subtitle_index = stream_index;
        self.events.emit(EngineEvent::SubtitleChanged { stream_index });
        Ok(())
    }

    /// Configure the player for a subtitle stream
    async fn apply_subtitle(
        &self,
        item_id: &str,
        result: &PlaybackResult,
        stream_index: Option<i32>,
    ) -> Result<()> {
        let Some(index) = stream_index else {
            return self.player.set_subtitle(None).await;
        };

        let stream = result
            .media_source
            .stream(index)
            .ok_or_else(|| Error::Player(format!("unknown subtitle stream {}", index)))?;

        // Transcoded sessions carry subtitles in the HLS manifest
        let url = if result.is_transcoding {
            None
        } else {
            let format = subtitle_format(stream.codec.as_deref());
            Some(self.negotiator.subtitle_url(item_id, &result.media_source.id, index, format)?)
        };

        self.player
            .set_subtitle(Some(SubtitleTrack {
                stream_index: index,
                url,
                language: stream.language.clone(),
            }))
            .await
    }

    async fn spawn_observer(self: &Arc<Self>) {
        let weak: Weak<Self> = Arc::downgrade(self);
        let period = self.config.progress_interval();

        self.tasks.lock().await.spawn(PROGRESS_OBSERVER, async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(inner) = weak.upgrade() else { break };
                inner.observe_tick().await;
            }
        });
    }

    /// One progress observation
    async fn observe_tick(self: &Arc<Self>) {
        let mut guard = self.session.lock().await;
        let Some(active) = guard.as_mut() else { return };
        if active.stop_reported {
            return;
        }

        active.session.position = self.player.position().await + active.position_offset;
        if let Some(duration) = self.player.duration().await {
            active.duration = Some(duration + active.position_offset);
        }

        let position = active.session.position;
        self.events.emit(EngineEvent::Progress {
            item_id: active.item.id.clone(),
            position,
            duration: active.duration,
        });

        if let Some(duration) = active.duration {
            let remaining = duration - position;
            if !active.approach_end_fired && remaining < self.config.approach_end_threshold_secs {
                active.approach_end_fired = true;
                info!(item_id = %active.item.id, remaining, "Approaching end of content");
                self.events.emit(EngineEvent::ApproachingEnd {
                    item_id: active.item.id.clone(),
                    remaining: remaining.max(0.0),
                });
                self.maybe_start_countdown(active).await;
            }
        }

        self.reporter
            .report_progress(&active.target, active.position_ticks(), active.session.paused);
    }

    async fn maybe_start_countdown(self: &Arc<Self>, active: &mut ActiveSession) {
        if !self.config.autoplay_enabled
            || active.autoplay_cancelled
            || active.countdown_active
            || !active.approach_end_fired
        {
            return;
        }
        let Some(next) = active.next_item.clone() else { return };

        active.countdown_active = true;
        let inner = Arc::clone(self);
        let seconds = self.config.countdown_seconds();
        debug!(next_item_id = %next.id, seconds, "Starting autoplay countdown");

        self.tasks.lock().await.spawn(AUTOPLAY_COUNTDOWN, async move {
            for seconds_left in (1..=seconds).rev() {
                inner.events.emit(EngineEvent::AutoplayCountdown {
                    next_item_id: next.id.clone(),
                    seconds_left,
                });
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
            inner.events.emit(EngineEvent::AutoplayCountdown {
                next_item_id: next.id.clone(),
                seconds_left: 0,
            });
            inner.begin_handoff().await;
        });
    }

    async fn spawn_next_item_lookup(self: &Arc<Self>, item_id: String) {
        let Some(media) = self.media.clone() else { return };
        let inner = Arc::clone(self);

        self.tasks.lock().await.spawn(NEXT_ITEM_LOOKUP, async move {
            match media.next_item(&item_id).await {
                Ok(Some(next)) => {
                    debug!(item_id = %item_id, next_item_id = %next.id, "Next item found");
                    let mut guard = inner.session.lock().await;
                    if let Some(active) = guard.as_mut().filter(|a| a.item.id == item_id) {
                        active.next_item = Some(next);
                        // Approach-end may already have passed
                        inner.maybe_start_countdown(active).await;
                    }
                }
                Ok(None) => debug!(item_id = %item_id, "No next item"),
                Err(e) => warn!(item_id = %item_id, error = %e, "Next item lookup failed"),
            }
        });
    }

    /// Stop this session and start the next item on a detached task
    ///
    /// Detached so that session teardown, which cancels the countdown, cannot
    /// cut the hand-off short.
    async fn begin_handoff(self: &Arc<Self>) -> bool {
        let (from_item_id, next, tier) = {
            let mut guard = self.session.lock().await;
            let Some(active) = guard.as_mut() else { return false };
            if active.autoplay_cancelled || active.handoff_started {
                return false;
            }
            let Some(next) = active.next_item.clone() else { return false };
            active.handoff_started = true;
            active.countdown_active = false;
            (active.item.id.clone(), next, active.tier)
        };

        info!(from = %from_item_id, next = %next.id, "Autoplay advancing");
        self.events.emit(EngineEvent::AutoplayAdvancing {
            from_item_id,
            next_item_id: next.id.clone(),
        });

        tokio::spawn(handoff(Arc::clone(self), next, tier));
        true
    }

    async fn cancel_autoplay(&self) -> Result<()> {
        let mut guard = self.session.lock().await;
        let active = guard.as_mut().ok_or(Error::NoActiveSession)?;

        active.autoplay_cancelled = true;
        active.countdown_active = false;
        self.tasks.lock().await.cancel(AUTOPLAY_COUNTDOWN);
        self.events.emit(EngineEvent::AutoplayDismissed);
        info!(item_id = %active.item.id, "Autoplay cancelled");
        Ok(())
    }

    async fn handle_player_event(self: &Arc<Self>, event: PlayerEvent) {
        match event {
            PlayerEvent::Buffering {
                downloaded_bytes,
                total_bytes,
            } => {
                if self.state() != PlaybackState::Loading {
                    return;
                }
                let elapsed = self
                    .loading_started
                    .read()
                    .await
                    .map(|t| t.elapsed())
                    .unwrap_or_default();
                let stats = BufferStats::compute(downloaded_bytes, total_bytes, elapsed);
                debug!(percentage = stats.percentage, speed = stats.download_speed, "Buffering");
                self.buffer_tx.send_replace(Some(stats));
            }
            PlayerEvent::Finished => self.finish().await,
            PlayerEvent::Error(message) => {
                warn!(error = %message, "Player reported an error");
                let mut guard = self.session.lock().await;
                if let Some(active) = guard.as_mut() {
                    self.tasks.lock().await.cancel_all();
                    if !active.stop_reported {
                        active.stop_reported = true;
                        active.session.position = self.player.position().await + active.position_offset;
                        self.reporter.report_stop(&active.target, active.position_ticks());
                    }
                }
                self.force_state(PlaybackState::Failed(message));
            }
        }
    }

    /// End of content: report stop once and hand off if autoplay is armed
    async fn finish(self: &Arc<Self>) {
        let (item_id, hand_off) = {
            let mut guard = self.session.lock().await;
            let Some(active) = guard.as_mut() else { return };
            if active.stop_reported {
                return;
            }
            active.stop_reported = true;

            self.tasks.lock().await.cancel(PROGRESS_OBSERVER);
            active.session.position = match active.duration {
                Some(duration) => duration,
                None => self.player.position().await + active.position_offset,
            };
            self.reporter.report_stop(&active.target, active.position_ticks());

            let hand_off = active.countdown_active && !active.autoplay_cancelled;
            (active.item.id.clone(), hand_off)
        };

        if let Err(e) = self.set_state(PlaybackState::Ended) {
            warn!(error = %e, "Ignoring end of content");
        }
        self.events.emit(EngineEvent::Completed {
            item_id: item_id.clone(),
        });
        info!(item_id = %item_id, "Playback completed");

        if hand_off {
            self.tasks.lock().await.cancel(AUTOPLAY_COUNTDOWN);
            self.begin_handoff().await;
        }
    }
}

/// Stop the finished session and start the next item from the beginning
///
/// Boxed because starting a session spawns the countdown that leads back here.
fn handoff(
    inner: Arc<EngineInner>,
    next: MediaItem,
    tier: QualityTier,
) -> Pin<Box<dyn Future<Output = ()> + Send>> {
    Box::pin(async move {
        inner.stop().await;
        let request = PlaybackRequest::new(next).with_tier(tier).resume_from(0.0);
        if let Err(e) = inner.start(request, Delivery::Negotiated).await {
            warn!(error = %e, "Autoplay hand-off failed");
        }
    })
}

/// Subtitle file extension for a stream codec
fn subtitle_format(codec: Option<&str>) -> &'static str {
    match codec.map(|c| c.to_ascii_lowercase()).as_deref() {
        Some("subrip") | Some("srt") => "srt",
        Some("ass") => "ass",
        Some("ssa") => "ssa",
        Some("sub") | Some("microdvd") => "sub",
        _ => "vtt",
    }
}
