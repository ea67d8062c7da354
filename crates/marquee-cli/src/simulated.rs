//! Clock-driven stand-in for a platform player
//!
//! Position advances with wall time (scaled by `speed`) while playing.
//! Loading takes a moment and emits a few buffering notifications and reaching the end emits
//! [`PlayerEvent::Finished`] on the returned channel.

use async_trait::async_trait;
use marquee_core::{MediaPlayer, PlayerEvent, Result, SubtitleTrack};
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::debug;
use url::Url;

const SIMULATED_STREAM_BYTES: u64 = 8 * 1024 * 1024;
const BUFFER_CHUNKS: u64 = 4;
const BUFFER_CHUNK_DELAY: Duration = Duration::from_millis(150);

#[derive(Debug, Default)]
struct Clock {
    /// Position when the clock last stopped
    base: f64,
    /// Set while playing
    started: Option<Instant>,
}

pub struct SimulatedPlayer {
    duration: f64,
    speed: f64,
    clock: Mutex<Clock>,
    end_timer: Mutex<Option<JoinHandle<()>>>,
    events: mpsc::UnboundedSender<PlayerEvent>,
}

impl SimulatedPlayer {
    pub fn new(duration: f64, speed: f64) -> (Self, mpsc::UnboundedReceiver<PlayerEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        let player = Self {
            duration: duration.max(0.0),
            speed: if speed > 0.0 { speed } else { 1.0 },
            clock: Mutex::new(Clock::default()),
            end_timer: Mutex::new(None),
            events,
        };
        (player, rx)
    }

    fn position_at(&self, clock: &Clock) -> f64 {
        let elapsed = clock
            .started
            .map(|t| t.elapsed().as_secs_f64() * self.speed)
            .unwrap_or(0.0);
        (clock.base + elapsed).min(self.duration)
    }

    /// Schedule the end-of-content notification from `position`
    async fn arm_end_timer(&self, position: f64) {
        let wait = Duration::from_secs_f64(((self.duration - position) / self.speed).max(0.0));
        let events = self.events.clone();
        let timer = tokio::spawn(async move {
            tokio::time::sleep(wait).await;
            let _ = events.send(PlayerEvent::Finished);
        });
        if let Some(previous) = self.end_timer.lock().await.replace(timer) {
            previous.abort();
        }
    }

    async fn disarm_end_timer(&self) {
        if let Some(timer) = self.end_timer.lock().await.take() {
            timer.abort();
        }
    }
}

#[async_trait]
impl MediaPlayer for SimulatedPlayer {
    async fn load(&self, url: &Url, start_position: f64) -> Result<()> {
        debug!(url = %url, start_position, "Simulated load");
        self.disarm_end_timer().await;
        *self.clock.lock().await = Clock {
            base: start_position.clamp(0.0, self.duration),
            started: None,
        };

        for chunk in 1..=BUFFER_CHUNKS {
            tokio::time::sleep(BUFFER_CHUNK_DELAY).await;
            let _ = self.events.send(PlayerEvent::Buffering {
                downloaded_bytes: SIMULATED_STREAM_BYTES * chunk / BUFFER_CHUNKS,
                total_bytes: Some(SIMULATED_STREAM_BYTES),
            });
        }
        Ok(())
    }

    async fn play(&self) -> Result<()> {
        let position = {
            let mut clock = self.clock.lock().await;
            if clock.started.is_some() {
                return Ok(());
            }
            clock.started = Some(Instant::now());
            clock.base
        };
        self.arm_end_timer(position).await;
        Ok(())
    }

    async fn pause(&self) -> Result<()> {
        {
            let mut clock = self.clock.lock().await;
            clock.base = self.position_at(&clock);
            clock.started = None;
        }
        self.disarm_end_timer().await;
        Ok(())
    }

    async fn seek(&self, position: f64) -> Result<()> {
        let playing = {
            let mut clock = self.clock.lock().await;
            clock.base = position.clamp(0.0, self.duration);
            if clock.started.is_some() {
                clock.started = Some(Instant::now());
            }
            clock.started.is_some()
        };
        if playing {
            self.arm_end_timer(position).await;
        }
        Ok(())
    }

    async fn position(&self) -> f64 {
        let clock = self.clock.lock().await;
        self.position_at(&clock)
    }

    async fn duration(&self) -> Option<f64> {
        Some(self.duration)
    }

    async fn set_subtitle(&self, track: Option<SubtitleTrack>) -> Result<()> {
        debug!(?track, "Simulated subtitle change");
        Ok(())
    }

    async fn release(&self) {
        self.disarm_end_timer().await;
        *self.clock.lock().await = Clock::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_clock_advances_and_finishes() {
        let (player, mut events) = SimulatedPlayer::new(10.0, 2.0);
        let url = Url::parse("http://server/Videos/1/stream").unwrap();

        player.load(&url, 2.0).await.unwrap();
        let buffering = (0..BUFFER_CHUNKS).filter_map(|_| events.try_recv().ok()).count();
        assert_eq!(buffering as u64, BUFFER_CHUNKS);

        player.play().await.unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!((player.position().await - 4.0).abs() < 0.01);

        player.pause().await.unwrap();
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!((player.position().await - 4.0).abs() < 0.01);
        assert!(events.try_recv().is_err());

        player.play().await.unwrap();
        tokio::time::sleep(Duration::from_secs(4)).await;
        assert_eq!(events.recv().await, Some(PlayerEvent::Finished));
        assert_eq!(player.position().await, 10.0);
    }
}
