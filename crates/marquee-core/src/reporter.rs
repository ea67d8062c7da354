//! Session reporting
//!
//! Start/progress/stop reports are best-effort telemetry. They are queued to
//! one background worker so the server sees them in call order, and a failed
//! report is logged and dropped; playback never waits on it.

use crate::{
    api::{MediaServer, ReportKind},
    types::PlayMethod,
    wire::PlaybackReport,
};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Identifies the session a report belongs to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportTarget {
    pub item_id: String,
    pub media_source_id: String,
    pub play_session_id: String,
    pub play_method: PlayMethod,
}

#[derive(Debug)]
struct QueuedReport {
    kind: ReportKind,
    report: PlaybackReport,
}

/// Fire-and-forget session reporter
#[derive(Debug, Clone)]
pub struct SessionReporter {
    tx: mpsc::UnboundedSender<QueuedReport>,
}

impl SessionReporter {
    /// Start the reporting worker; must be called inside a Tokio runtime
    pub fn spawn(server: Arc<dyn MediaServer>) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<QueuedReport>();

        tokio::spawn(async move {
            while let Some(queued) = rx.recv().await {
                match server.report(queued.kind, &queued.report).await {
                    Ok(()) => debug!(
                        kind = %queued.kind,
                        item_id = %queued.report.item_id,
                        position_ticks = queued.report.position_ticks,
                        "Session report sent"
                    ),
                    Err(e) => warn!(
                        kind = %queued.kind,
                        item_id = %queued.report.item_id,
                        error = %e,
                        "Session report failed"
                    ),
                }
            }
        });

        Self { tx }
    }

    pub fn report_start(&self, target: &ReportTarget, position_ticks: i64) {
        self.enqueue(ReportKind::Start, target, position_ticks, None);
    }

    pub fn report_progress(&self, target: &ReportTarget, position_ticks: i64, paused: bool) {
        self.enqueue(ReportKind::Progress, target, position_ticks, Some(paused));
    }

    pub fn report_stop(&self, target: &ReportTarget, position_ticks: i64) {
        self.enqueue(ReportKind::Stopped, target, position_ticks, None);
    }

    fn enqueue(&self, kind: ReportKind, target: &ReportTarget, position_ticks: i64, is_paused: Option<bool>) {
        let report = PlaybackReport {
            item_id: target.item_id.clone(),
            media_source_id: target.media_source_id.clone(),
            position_ticks,
            play_method: target.play_method.as_str().to_string(),
            play_session_id: target.play_session_id.clone(),
            can_seek: true,
            is_paused,
        };

        if self.tx.send(QueuedReport { kind, report }).is_err() {
            warn!(kind = %kind, "Session reporter worker has stopped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::Credentials;
    use crate::wire::{PlaybackInfoRequest, PlaybackInfoResponse};
    use crate::{Error, Result};
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::time::Duration;
    use url::Url;

    struct RecordingServer {
        credentials: Credentials,
        fail_progress: bool,
        reports: Mutex<Vec<(ReportKind, PlaybackReport)>>,
    }

    #[async_trait]
    impl MediaServer for RecordingServer {
        fn credentials(&self) -> &Credentials {
            &self.credentials
        }

        async fn playback_info(&self, _: &str, _: &PlaybackInfoRequest) -> Result<PlaybackInfoResponse> {
            Err(Error::Server { status: 500 })
        }

        async fn report(&self, kind: ReportKind, report: &PlaybackReport) -> Result<()> {
            self.reports.lock().unwrap().push((kind, report.clone()));
            if self.fail_progress && kind == ReportKind::Progress {
                return Err(Error::Server { status: 503 });
            }
            Ok(())
        }

        async fn ping(&self) -> Result<()> {
            Ok(())
        }
    }

    fn target() -> ReportTarget {
        ReportTarget {
            item_id: "item1".into(),
            media_source_id: "src1".into(),
            play_session_id: "ps1".into(),
            play_method: PlayMethod::DirectPlay,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_reports_in_order_and_failures_swallowed() {
        let server = Arc::new(RecordingServer {
            credentials: Credentials::new(Url::parse("http://s").unwrap(), "t", "u", "d"),
            fail_progress: true,
            reports: Mutex::new(Vec::new()),
        });
        let reporter = SessionReporter::spawn(server.clone());

        reporter.report_start(&target(), 0);
        reporter.report_progress(&target(), 50_000_000, false);
        reporter.report_progress(&target(), 60_000_000, true);
        reporter.report_stop(&target(), 70_000_000);

        tokio::time::sleep(Duration::from_millis(10)).await;

        let reports = server.reports.lock().unwrap();
        let kinds: Vec<ReportKind> = reports.iter().map(|(k, _)| *k).collect();
        assert_eq!(
            kinds,
            vec![ReportKind::Start, ReportKind::Progress, ReportKind::Progress, ReportKind::Stopped]
        );
        assert_eq!(reports[2].1.is_paused, Some(true));
        assert_eq!(reports[3].1.position_ticks, 70_000_000);
        assert_eq!(reports[0].1.play_method, "DirectPlay");
    }
}
