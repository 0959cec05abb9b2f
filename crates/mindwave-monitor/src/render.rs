//! Console dashboard
//!
//! Folds pipeline events into the latest card values and prints them at a
//! bounded rate. Connection changes and state commits print immediately.

use mindwave_core::{Band, EmotionalState};
use mindwave_processing::{BandPowerTick, CardiacTick, IngestStats, PipelineEvent, SessionSummary};
use std::time::{Duration, Instant};
use tracing::{info, warn};
use uuid::Uuid;

const BAR_WIDTH: usize = 20;

/// Horizontal bar for a 0-100 share
pub fn bar(percent: f32) -> String {
    let filled = ((percent.clamp(0.0, 100.0) / 100.0) * BAR_WIDTH as f32).round() as usize;
    format!("{}{}", "#".repeat(filled), ".".repeat(BAR_WIDTH - filled))
}

fn show(value: Option<f32>, precision: usize) -> String {
    match value {
        Some(v) => format!("{:.*}", precision, v),
        None => "--".to_string(),
    }
}

pub struct ConsoleRenderer {
    interval: Duration,
    last_render: Option<Instant>,
    session: Option<Uuid>,
    band: Option<BandPowerTick>,
    cardiac: Option<CardiacTick>,
    state: EmotionalState,
    samples: u64,
    frames: u64,
}

impl ConsoleRenderer {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_render: None,
            session: None,
            band: None,
            cardiac: None,
            state: EmotionalState::NoData,
            samples: 0,
            frames: 0,
        }
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Fold one event in; returns true when a dashboard frame was printed
    pub fn handle(&mut self, event: &PipelineEvent, now: Instant) -> bool {
        match event {
            PipelineEvent::Connected { session_id } => {
                self.session = Some(*session_id);
                self.band = None;
                self.cardiac = None;
                self.state = EmotionalState::NoData;
                self.samples = 0;
                info!(session = %session_id, "status: connected");
            }
            PipelineEvent::Disconnected { session_id } => {
                self.session = None;
                self.state = EmotionalState::NoData;
                info!(session = %session_id, "status: disconnected");
                return false;
            }
            PipelineEvent::Sample { .. } => self.samples += 1,
            PipelineEvent::SequenceGap(gap) => {
                warn!(
                    expected = gap.expected,
                    received = gap.received,
                    missing = gap.missing,
                    "device packets lost"
                );
            }
            PipelineEvent::BandPower(tick) => self.band = Some(*tick),
            PipelineEvent::Cardiac(tick) => self.cardiac = Some(*tick),
            PipelineEvent::MentalState { state, timestamp, .. } => {
                if *state != self.state {
                    info!(state = %state, at_ms = timestamp.as_millis(), "mental state: {}", state);
                }
                self.state = *state;
            }
        }

        let due = self
            .last_render
            .map_or(true, |last| now.saturating_duration_since(last) >= self.interval);
        if due && self.session.is_some() {
            self.render();
            self.last_render = Some(now);
            true
        } else {
            false
        }
    }

    fn render(&mut self) {
        self.frames += 1;

        if let Some(session) = self.session {
            info!("status | connected {} | {} channel samples", session, self.samples);
        }

        match &self.cardiac {
            Some(tick) => info!(
                "vitals | bpm {} (hi {} lo {} avg {}) | hrv {} ms | beats {}",
                show(tick.bpm.displayed, 0),
                show(tick.bpm.high, 0),
                show(tick.bpm.low, 0),
                show(tick.bpm.avg, 0),
                show(tick.hrv.current, 1),
                tick.beats_in_window,
            ),
            None => info!("vitals | waiting for heartbeat"),
        }

        info!("mental state | {}", self.state);

        if let Some(tick) = &self.band {
            let average = tick.average();
            for band in Band::ALL {
                let share = average.get(band);
                info!("brainwaves | {:<5} {} {:5.1}%", band.label(), bar(share), share);
            }
            info!(
                "brainwaves | dominant {} | symmetry {:+.1} | {} {}",
                average.dominant().label(),
                tick.symmetry,
                tick.goal,
                show(tick.goal_score, 2),
            );
        }
    }

    /// Final session statistics card
    pub fn render_summary(&self, summary: &SessionSummary, ingest: &IngestStats) {
        info!(
            "session | {:.1} s | {} records | focus index {}",
            summary.duration_secs,
            summary.records,
            show(summary.focus_index, 0),
        );
        info!(
            "session | alpha {} beta {} theta {} delta {} | symmetry {}",
            show(summary.avg_alpha, 1),
            show(summary.avg_beta, 1),
            show(summary.avg_theta, 1),
            show(summary.avg_delta, 1),
            show(summary.avg_symmetry, 1),
        );
        info!(
            "session | average bpm {} | hrv {} ms | last state {}",
            show(summary.bpm.avg, 0),
            show(summary.hrv.current, 1),
            summary.last_state,
        );
        info!(
            received = ingest.received,
            rejected_eeg = ingest.rejected_eeg,
            rejected_ecg = ingest.rejected_ecg,
            gaps = ingest.gaps,
            missing = ingest.missing,
            "session | ingest"
        );
    }
}
