use std::sync::Arc;

use latency_probe_common::clock::Clock;
use latency_probe_common::event::IngestRequest;
use tracing::{debug, info, warn};

use crate::classifier::{Classification, FrameClassifier};
use crate::frame::CapturedFrame;
use crate::latency::{LatencyBreakdown, LatencyTracker};
use crate::session::{SampleSession, SessionAction, SessionState};
use crate::snapshot::SnapshotWriter;
use crate::source::{DeviceError, FrameSource};
use crate::transport::{EchoTransport, TransportError};
use crate::ui::UiSink;

pub const IDLE_PROMPT: &str = "PRESS ENTER TO START SAMPLING";

/// Whether the loop should keep going after one iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// Counters reported when the loop ends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopSummary {
    pub frames: u64,
    pub samples_ok: u64,
    pub samples_failed: u64,
    pub snapshots: u64,
}

/// Capture → classify → transmit → measure → record, one frame at a time.
///
/// Every step is awaited in order, so at most one ingest request is in flight.
pub struct ClientLoop<S, C, T, U, W> {
    source: S,
    classifier: C,
    transport: T,
    ui: U,
    snapshots: W,
    clock: Arc<dyn Clock>,
    session: SampleSession,
    tracker: LatencyTracker,
    last_breakdown: Option<LatencyBreakdown>,
    last_classification: Option<Classification>,
    summary: LoopSummary,
}

impl<S, C, T, U, W> ClientLoop<S, C, T, U, W>
where
    S: FrameSource,
    C: FrameClassifier,
    T: EchoTransport,
    U: UiSink,
    W: SnapshotWriter,
{
    pub fn new(
        source: S,
        classifier: C,
        transport: T,
        ui: U,
        snapshots: W,
        clock: Arc<dyn Clock>,
        tracker: LatencyTracker,
    ) -> Self {
        Self {
            source,
            classifier,
            transport,
            ui,
            snapshots,
            clock,
            session: SampleSession::new(),
            tracker,
            last_breakdown: None,
            last_classification: None,
            summary: LoopSummary::default(),
        }
    }

    /// Run until the operator quits or the frame source fails.
    ///
    /// The frame source is released on both paths before returning.
    pub async fn run(mut self) -> Result<LoopSummary, DeviceError> {
        info!(
            source = self.source.name(),
            classifier = self.classifier.name(),
            rtt_window = self.tracker.capacity(),
            "client loop starting"
        );

        let result = loop {
            match self.step().await {
                Ok(Flow::Continue) => {}
                Ok(Flow::Quit) => {
                    info!("quit requested");
                    break Ok(self.summary);
                }
                Err(e) => break Err(e),
            }
        };

        self.source.release();
        info!(source = self.source.name(), "frame source released");
        result
    }

    /// One iteration: acquire, sample if active, display, then handle input.
    pub async fn step(&mut self) -> Result<Flow, DeviceError> {
        let frame = self.source.next_frame().await?;
        self.summary.frames += 1;

        let overlay = match self.session.state() {
            SessionState::Idle => vec![IDLE_PROMPT.to_string()],
            SessionState::Sampling => self.sample(&frame).await,
        };
        self.ui.display(&frame, &overlay);

        match self.session.dispatch(self.ui.poll_input()) {
            SessionAction::Continue => Ok(Flow::Continue),
            SessionAction::Snapshot { query_status } => {
                self.snapshot(&frame, query_status).await;
                Ok(Flow::Continue)
            }
            SessionAction::Quit => Ok(Flow::Quit),
        }
    }

    async fn sample(&mut self, frame: &CapturedFrame) -> Vec<String> {
        let classification = self.classifier.classify(frame);
        let mut overlay = vec![classification.caption.clone()];

        match self.exchange(&classification).await {
            Ok(breakdown) => {
                self.tracker.record(breakdown.rtt_ms);
                let average = self.tracker.average().unwrap_or(breakdown.rtt_ms);
                self.summary.samples_ok += 1;
                debug!(
                    seq = frame.seq,
                    upload_ms = breakdown.upload_ms,
                    proc_ms = breakdown.proc_ms,
                    download_ms = breakdown.download_ms,
                    rtt_ms = breakdown.rtt_ms,
                    rtt_avg_ms = average,
                    "sample recorded"
                );
                overlay.push(format!(
                    "RTT: {:.1} ms (avg {:.1} ms)",
                    breakdown.rtt_ms, average
                ));
                overlay.push(format!(
                    "UP: {:.1} | PROC: {:.1} | DOWN: {:.1} ms",
                    breakdown.upload_ms, breakdown.proc_ms, breakdown.download_ms
                ));
                self.last_breakdown = Some(breakdown);
            }
            Err(e) => {
                self.summary.samples_failed += 1;
                warn!(error = %e, seq = frame.seq, "ingest failed, sample skipped");
                overlay.push(format!("API error: {}", e.category()));
            }
        }

        self.last_classification = Some(classification);
        overlay
    }

    async fn exchange(
        &self,
        classification: &Classification,
    ) -> Result<LatencyBreakdown, TransportError> {
        let sent_ts = self.clock.now();
        let request = IngestRequest {
            sent_ts,
            caption: classification.caption.clone(),
            aux: Some(classification.aux.clone()),
        };
        let response = self.transport.ingest(&request).await?;
        let recv_ts = self.clock.now();

        if response.echo_caption != request.caption {
            return Err(TransportError::EchoMismatch {
                sent: request.caption,
                echoed: response.echo_caption,
            });
        }

        Ok(LatencyBreakdown::from_timestamps(
            sent_ts,
            response.server_recv_ts,
            response.server_send_ts,
            recv_ts,
        ))
    }

    /// Operator snapshot. Independent of the per-frame ingest path: the status
    /// query uses its own timeout and its failure only affects this command.
    async fn snapshot(&mut self, frame: &CapturedFrame, query_status: bool) {
        match self.snapshots.save(frame) {
            Ok(path) => {
                self.summary.snapshots += 1;
                info!(path = %path.display(), sampling = query_status, "snapshot saved");
            }
            Err(e) => warn!(error = %e, "failed to save snapshot"),
        }

        if !query_status {
            return;
        }

        match self.transport.status().await {
            Ok(status) => info!(
                status = status.status,
                message = status.message,
                last_event = ?status.last_event,
                "endpoint status"
            ),
            Err(e) => warn!(error = %e, category = e.category(), "status query failed"),
        }
        self.log_local_view();
    }

    fn log_local_view(&self) {
        let (caption, brightness, motion_level) = match &self.last_classification {
            Some(c) => (
                c.caption.as_str(),
                c.aux.get("brightness").copied(),
                c.aux.get("motion_level").copied(),
            ),
            None => ("", None, None),
        };
        let b = self.last_breakdown;
        let rtt_min = self.tracker.samples().fold(f64::INFINITY, f64::min);
        let rtt_max = self.tracker.samples().fold(f64::NEG_INFINITY, f64::max);
        info!(
            caption,
            brightness = ?brightness,
            motion_level = ?motion_level,
            upload_ms = ?b.map(|b| b.upload_ms),
            proc_ms = ?b.map(|b| b.proc_ms),
            download_ms = ?b.map(|b| b.download_ms),
            rtt_ms = ?b.map(|b| b.rtt_ms),
            rtt_last_ms = ?self.tracker.last(),
            rtt_avg_ms = ?self.tracker.average(),
            rtt_min_ms = ?(!self.tracker.is_empty()).then_some(rtt_min),
            rtt_max_ms = ?(!self.tracker.is_empty()).then_some(rtt_max),
            samples = self.tracker.len(),
            "local view"
        );
    }

    #[cfg(test)]
    pub fn session(&self) -> &SampleSession {
        &self.session
    }

    #[cfg(test)]
    pub fn tracker(&self) -> &LatencyTracker {
        &self.tracker
    }

    #[cfg(test)]
    pub fn last_breakdown(&self) -> Option<LatencyBreakdown> {
        self.last_breakdown
    }

    #[cfg(test)]
    pub fn summary(&self) -> LoopSummary {
        self.summary
    }
}
