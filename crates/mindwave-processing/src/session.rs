//! Session recording
//!
//! While a recording is active every band-power tick is appended to an
//! in-memory log. The log feeds the session statistics card and the JSON
//! export; nothing is persisted unless `export_json` is called.

use crate::events::PipelineEvent;
use crate::stats::RunningStats;
use chrono::{DateTime, Utc};
use mindwave_core::{BpmState, EmotionalState, HrvState, MindwaveError, MindwaveResult, SessionTimestamp};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;
use uuid::Uuid;

/// Channel-averaged aggregate of one band-power tick
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub timestamp_ms: u64,
    pub alpha: f32,
    pub beta: f32,
    pub theta: f32,
    pub delta: f32,
    pub symmetry: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub duration_secs: f64,
    pub records: usize,
    pub avg_alpha: Option<f32>,
    pub avg_beta: Option<f32>,
    pub avg_theta: Option<f32>,
    pub avg_delta: Option<f32>,
    pub avg_symmetry: Option<f32>,
    /// `100 * beta / (alpha + theta)`, clamped to 0-100
    pub focus_index: Option<f32>,
    pub bpm: BpmState,
    pub hrv: HrvState,
    pub last_state: EmotionalState,
}

/// Exported document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionExport {
    pub session_id: Option<Uuid>,
    pub started_at: Option<DateTime<Utc>>,
    pub summary: SessionSummary,
    pub records: Vec<SessionRecord>,
}

/// Focus index from average band shares
pub fn focus_index(alpha: f32, beta: f32, theta: f32) -> Option<f32> {
    let denominator = alpha + theta;
    if denominator > f32::EPSILON {
        Some((100.0 * beta / denominator).clamp(0.0, 100.0))
    } else {
        None
    }
}

#[derive(Debug, Clone, Default)]
pub struct SessionRecorder {
    active: bool,
    session_id: Option<Uuid>,
    started_at: Option<DateTime<Utc>>,
    records: Vec<SessionRecord>,
    latest: SessionTimestamp,
    bpm: BpmState,
    hrv: HrvState,
    last_state: EmotionalState,
}

impl SessionRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Begin appending ticks
    pub fn start(&mut self) {
        if !self.active {
            self.active = true;
            if self.started_at.is_none() {
                self.started_at = Some(Utc::now());
            }
            info!("session recording started");
        }
    }

    /// Stop appending; the log is kept for summary and export
    pub fn stop(&mut self) {
        if self.active {
            self.active = false;
            info!(records = self.records.len(), "session recording stopped");
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn session_id(&self) -> Option<Uuid> {
        self.session_id
    }

    pub fn records(&self) -> &[SessionRecord] {
        &self.records
    }

    /// Fold one pipeline notification in
    pub fn handle(&mut self, event: &PipelineEvent) {
        match event {
            PipelineEvent::Connected { session_id } => {
                self.session_id = Some(*session_id);
            }
            PipelineEvent::BandPower(tick) if self.active => {
                let average = tick.average();
                self.records.push(SessionRecord {
                    timestamp_ms: tick.timestamp.as_millis(),
                    alpha: average.alpha,
                    beta: average.beta,
                    theta: average.theta,
                    delta: average.delta,
                    symmetry: tick.symmetry,
                });
                self.latest = self.latest.max(tick.timestamp);
            }
            PipelineEvent::Cardiac(tick) if self.active => {
                self.bpm = tick.bpm;
                self.hrv = tick.hrv;
                self.latest = self.latest.max(tick.timestamp);
            }
            PipelineEvent::MentalState { state, timestamp, .. } if self.active => {
                self.last_state = *state;
                self.latest = self.latest.max(*timestamp);
            }
            PipelineEvent::Disconnected { .. } => {
                self.stop();
                self.last_state = EmotionalState::NoData;
            }
            _ => {}
        }
    }

    pub fn summary(&self) -> SessionSummary {
        let column = |pick: fn(&SessionRecord) -> f32| -> Option<f32> {
            let mut stats = RunningStats::new();
            for record in &self.records {
                stats.update(pick(record));
            }
            stats.avg()
        };

        let avg_alpha = column(|r| r.alpha);
        let avg_beta = column(|r| r.beta);
        let avg_theta = column(|r| r.theta);

        let focus = match (avg_alpha, avg_beta, avg_theta) {
            (Some(alpha), Some(beta), Some(theta)) => focus_index(alpha, beta, theta),
            _ => None,
        };

        SessionSummary {
            duration_secs: self.latest.as_secs_f64(),
            records: self.records.len(),
            avg_alpha,
            avg_beta,
            avg_theta,
            avg_delta: column(|r| r.delta),
            avg_symmetry: column(|r| r.symmetry),
            focus_index: focus,
            bpm: self.bpm,
            hrv: self.hrv,
            last_state: self.last_state,
        }
    }

    /// Drop everything recorded so far; an active recording keeps running
    pub fn reset(&mut self) {
        let active = self.active;
        *self = Self::default();
        if active {
            self.active = true;
            self.started_at = Some(Utc::now());
        }
        info!("session reset");
    }

    pub fn export(&self) -> SessionExport {
        SessionExport {
            session_id: self.session_id,
            started_at: self.started_at,
            summary: self.summary(),
            records: self.records.clone(),
        }
    }

    pub fn to_json(&self) -> MindwaveResult<String> {
        serde_json::to_string_pretty(&self.export()).map_err(|e| MindwaveError::Serialization {
            reason: format!("Failed to serialize session: {}", e),
        })
    }

    /// Write the session document to `path`
    pub fn export_json(&self, path: impl AsRef<Path>) -> MindwaveResult<()> {
        let json = self.to_json()?;
        std::fs::write(path.as_ref(), json)?;
        info!(path = %path.as_ref().display(), records = self.records.len(), "session exported");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::band_power::BandPowerTick;
    use crate::cardiac::CardiacTick;
    use mindwave_core::{BandPowerVector, Goal};

    fn band_tick(ms: u64, alpha: f32, beta: f32, theta: f32) -> PipelineEvent {
        let delta = 100.0 - alpha - beta - theta;
        let vector = BandPowerVector::from_array([delta, theta, alpha, beta, 0.0]);
        PipelineEvent::BandPower(BandPowerTick {
            sample_index: ms / 2,
            timestamp: SessionTimestamp::from_millis(ms),
            channels: [vector, vector],
            symmetry: 0.0,
            goal: Goal::Anxiety,
            goal_score: None,
        })
    }

    #[test]
    fn test_records_only_while_active() {
        let mut recorder = SessionRecorder::new();
        recorder.handle(&band_tick(100, 40.0, 20.0, 20.0));
        assert!(recorder.records().is_empty());

        recorder.start();
        recorder.handle(&band_tick(200, 40.0, 20.0, 20.0));
        recorder.handle(&band_tick(300, 20.0, 40.0, 20.0));
        recorder.stop();
        recorder.handle(&band_tick(400, 40.0, 20.0, 20.0));

        assert_eq!(recorder.records().len(), 2);
        assert_eq!(recorder.records()[1].beta, 40.0);
    }

    #[test]
    fn test_summary() {
        let mut recorder = SessionRecorder::new();
        recorder.start();
        recorder.handle(&band_tick(1_000, 40.0, 20.0, 10.0));
        recorder.handle(&band_tick(2_000, 20.0, 40.0, 10.0));

        let summary = recorder.summary();
        assert_eq!(summary.records, 2);
        assert_eq!(summary.avg_alpha, Some(30.0));
        assert_eq!(summary.avg_beta, Some(30.0));
        assert_eq!(summary.avg_theta, Some(10.0));
        // 100 * 30 / (30 + 10)
        assert!((summary.focus_index.unwrap() - 75.0).abs() < 1e-4);
        assert!((summary.duration_secs - 2.0).abs() < 1e-9);
        assert_eq!(summary.last_state, EmotionalState::NoData);
    }

    #[test]
    fn test_empty_summary() {
        let summary = SessionRecorder::new().summary();
        assert_eq!(summary.records, 0);
        assert_eq!(summary.avg_alpha, None);
        assert_eq!(summary.avg_symmetry, None);
        assert_eq!(summary.focus_index, None);
    }

    #[test]
    fn test_focus_index_clamped() {
        assert_eq!(focus_index(10.0, 80.0, 10.0), Some(100.0));
        assert_eq!(focus_index(0.0, 50.0, 0.0), None);
    }

    #[test]
    fn test_cardiac_and_state_tracking() {
        let mut recorder = SessionRecorder::new();
        recorder.start();

        let bpm = BpmState {
            displayed: Some(72.0),
            high: Some(74.0),
            low: Some(70.0),
            avg: Some(72.0),
        };
        recorder.handle(&PipelineEvent::Cardiac(CardiacTick {
            sample_index: 2_500,
            timestamp: SessionTimestamp::from_millis(5_000),
            beats_in_window: 6,
            instantaneous_bpm: Some(72.0),
            bpm,
            hrv: HrvState::default(),
        }));
        recorder.handle(&PipelineEvent::MentalState {
            state: EmotionalState::Focused,
            timestamp: SessionTimestamp::from_millis(5_000),
            metrics: None,
        });

        let summary = recorder.summary();
        assert_eq!(summary.bpm, bpm);
        assert_eq!(summary.last_state, EmotionalState::Focused);
        assert_eq!(summary.avg_alpha, None);
        assert_eq!(summary.focus_index, None);

        recorder.handle(&PipelineEvent::Disconnected {
            session_id: Uuid::new_v4(),
        });
        assert!(!recorder.is_active());
        assert_eq!(recorder.summary().last_state, EmotionalState::NoData);
    }

    #[test]
    fn test_reset() {
        let mut recorder = SessionRecorder::new();
        recorder.start();
        recorder.handle(&band_tick(1_000, 40.0, 20.0, 10.0));
        recorder.reset();

        assert!(recorder.is_active());
        assert!(recorder.records().is_empty());
        assert_eq!(recorder.summary().duration_secs, 0.0);
    }

    #[test]
    fn test_export_json() {
        let mut recorder = SessionRecorder::new();
        let id = Uuid::new_v4();
        recorder.handle(&PipelineEvent::Connected { session_id: id });
        recorder.start();
        recorder.handle(&band_tick(1_000, 40.0, 20.0, 10.0));

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        recorder.export_json(&path).unwrap();

        let restored: SessionExport = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(restored.session_id, Some(id));
        assert!(restored.started_at.is_some());
        assert_eq!(restored.records.len(), 1);
        assert_eq!(restored.summary.records, 1);

        let missing_dir = dir.path().join("nope").join("session.json");
        assert!(matches!(recorder.export_json(missing_dir), Err(MindwaveError::Io { .. })));
    }
}
