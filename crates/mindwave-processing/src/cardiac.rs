//! Cardiac chain: peak detection feeding the BPM estimator and HRV engine

use crate::bpm::BpmEstimator;
use crate::config::AnalysisConfig;
use crate::hrv::HrvEngine;
use crate::peak::PeakDetector;
use mindwave_core::{BpmState, HrvState, SessionTimestamp};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// BPM and HRV after one detection pass
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CardiacTick {
    pub sample_index: u64,
    pub timestamp: SessionTimestamp,
    pub beats_in_window: usize,
    /// Unsmoothed rate from the latest interval
    pub instantaneous_bpm: Option<f32>,
    pub bpm: BpmState,
    pub hrv: HrvState,
}

pub struct CardiacMonitor {
    detector: PeakDetector,
    bpm: BpmEstimator,
    hrv: HrvEngine,
}

impl CardiacMonitor {
    pub fn new(config: &AnalysisConfig) -> Self {
        CardiacMonitor {
            detector: PeakDetector::new(config),
            bpm: BpmEstimator::new(config),
            hrv: HrvEngine::new(config),
        }
    }

    /// Push one accepted ECG value and its packet sequence number; returns a
    /// tick after every detection pass
    pub fn push(&mut self, sequence: u32, value: f32) -> Option<CardiacTick> {
        let detection = self.detector.push(sequence, value)?;

        let instantaneous_bpm = detection.instantaneous_bpm();
        let bpm = self.bpm.update(instantaneous_bpm);
        let hrv = self.hrv.update(&detection.new_ibis_ms, detection.beats_in_window);

        debug!(
            sample_index = detection.sample_index,
            bpm = ?bpm.displayed,
            rmssd = ?hrv.current,
            "cardiac tick"
        );

        Some(CardiacTick {
            sample_index: detection.sample_index,
            timestamp: detection.timestamp,
            beats_in_window: detection.beats_in_window,
            instantaneous_bpm,
            bpm,
            hrv,
        })
    }

    pub fn reset(&mut self) {
        self.detector.reset();
        self.bpm.reset();
        self.hrv.reset();
    }
}
