//! Cardiac peak detector
//!
//! Pan-Tompkins style R-peak detection over the ECG ring buffer: first
//! difference, squaring, centred moving-window integration and an adaptive
//! `mean + k * std` threshold, followed by refinement to the raw-signal
//! maximum. Beats are tracked by absolute device position, unwrapped from the
//! packet sequence number, so a beat seen in several overlapping windows
//! yields exactly one inter-beat interval and lost packets do not shorten the
//! intervals that span them.

use crate::config::{AnalysisConfig, EcgConfig};
use mindwave_core::{RingBuffer, SessionTimestamp};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

/// Integrated-energy spread below this fraction of its mean is rounding noise
const FLAT_ENERGY_RATIO: f32 = 1e-4;

/// Detector parameters converted to sample counts
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PeakParams {
    pub integration_window: usize,
    pub refractory: usize,
    pub search_margin: usize,
    pub threshold_k: f32,
}

impl PeakParams {
    pub fn from_config(config: &AnalysisConfig) -> Self {
        let ecg = &config.ecg;
        PeakParams {
            integration_window: config.ms_to_samples(ecg.integration_window_ms),
            refractory: config.ms_to_samples(ecg.refractory_ms),
            search_margin: config.ms_to_samples(ecg.search_margin_ms),
            threshold_k: ecg.threshold_k,
        }
    }
}

/// Result of one detection pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BeatDetection {
    /// ECG samples accepted this session when the pass ran
    pub sample_index: u64,
    /// Device time of the newest buffered sample, lost packets included
    pub timestamp: SessionTimestamp,
    /// Confirmed beats inside the buffer, including ones reported earlier
    pub beats_in_window: usize,
    /// Device positions of beats not reported before
    pub new_beats: Vec<u64>,
    /// Plausible intervals ending at the new beats (ms)
    pub new_ibis_ms: Vec<f32>,
    /// Interval between the two most recent beats in the window (ms)
    pub latest_ibi_ms: Option<f32>,
}

impl BeatDetection {
    /// `60000 / latest IBI`, none with fewer than two beats in the window
    pub fn instantaneous_bpm(&self) -> Option<f32> {
        if self.beats_in_window < 2 {
            return None;
        }
        self.latest_ibi_ms
            .filter(|ibi| *ibi > 0.0)
            .map(|ibi| 60_000.0 / ibi)
    }
}

/// Locate R-peaks in `signal`, returning indices in ascending order.
///
/// Peaks whose search neighbourhood would run past the end of the signal are
/// left out, as are peaks too close to the start to be refined.
pub fn find_r_peaks(signal: &[f32], params: &PeakParams) -> Vec<usize> {
    let n = signal.len();
    if n < 3 {
        return Vec::new();
    }

    // Slope energy
    let mut energy = Vec::with_capacity(n);
    energy.push(0.0f32);
    for pair in signal.windows(2) {
        let d = pair[1] - pair[0];
        energy.push(d * d);
    }

    let integrated = centred_moving_average(&energy, params.integration_window);

    let mean = integrated.iter().sum::<f32>() / n as f32;
    let variance = integrated.iter().map(|v| (v - mean) * (v - mean)).sum::<f32>() / n as f32;
    let std = variance.sqrt();
    // Relative, so microvolt and volt scaled traces behave the same
    if !(std > mean.abs() * FLAT_ENERGY_RATIO) {
        return Vec::new();
    }
    let threshold = mean + params.threshold_k * std;

    // One candidate per contiguous supra-threshold region
    let mut candidates: Vec<usize> = Vec::new();
    let mut region: Option<(usize, f32)> = None;
    for (i, &value) in integrated.iter().enumerate() {
        if value > threshold {
            match region {
                Some((_, best)) if value <= best => {}
                _ => region = Some((i, value)),
            }
        } else if let Some((index, _)) = region.take() {
            candidates.push(index);
        }
    }
    // A region still open at the end is incomplete and waits for the next pass

    let mut peaks: Vec<usize> = Vec::new();
    let mut last_strength = 0.0f32;
    for candidate in candidates {
        if candidate < params.search_margin || candidate + params.search_margin >= n {
            continue;
        }

        let lo = candidate - params.search_margin;
        let hi = candidate + params.search_margin;
        let r_peak = (lo..=hi)
            .max_by(|&a, &b| signal[a].total_cmp(&signal[b]))
            .unwrap_or(candidate);
        let strength = integrated[candidate];

        match peaks.last() {
            Some(&previous) if r_peak.saturating_sub(previous) < params.refractory => {
                // Inside the refractory period keep the stronger of the two
                if strength > last_strength {
                    if let Some(slot) = peaks.last_mut() {
                        *slot = r_peak;
                    }
                    last_strength = strength;
                }
            }
            _ => {
                peaks.push(r_peak);
                last_strength = strength;
            }
        }
    }

    peaks
}

fn centred_moving_average(values: &[f32], width: usize) -> Vec<f32> {
    let n = values.len();
    let half = width / 2;
    let mut prefix = Vec::with_capacity(n + 1);
    prefix.push(0.0f64);
    for &v in values {
        let last = prefix[prefix.len() - 1];
        prefix.push(last + v as f64);
    }

    (0..n)
        .map(|i| {
            let lo = i.saturating_sub(half);
            let hi = (i + half + 1).min(n);
            ((prefix[hi] - prefix[lo]) / (hi - lo) as f64) as f32
        })
        .collect()
}

/// Maps wrapping 32-bit packet sequence numbers onto a monotonic device
/// position, zero at the first packet of the session
#[derive(Debug, Clone, Copy, Default)]
pub struct SequenceClock {
    last: Option<(u32, u64)>,
}

impl SequenceClock {
    /// Position of the packet carrying `sequence`.
    ///
    /// Forward steps of less than half the counter range (wrap included)
    /// advance by the step; duplicates and rewinds advance by one so
    /// positions stay strictly increasing.
    pub fn advance(&mut self, sequence: u32) -> u64 {
        let position = match self.last {
            None => 0,
            Some((previous, position)) => {
                let step = sequence.wrapping_sub(previous);
                if step > 0 && step <= i32::MAX as u32 {
                    position + step as u64
                } else {
                    position + 1
                }
            }
        };
        self.last = Some((sequence, position));
        position
    }

    /// Position of the latest packet
    pub fn position(&self) -> Option<u64> {
        self.last.map(|(_, position)| position)
    }

    pub fn reset(&mut self) {
        self.last = None;
    }
}

/// ECG ring buffer plus strided R-peak detection
pub struct PeakDetector {
    config: EcgConfig,
    params: PeakParams,
    sample_rate: f32,
    buffer: RingBuffer<f32>,
    /// Device position of every buffered value
    positions: RingBuffer<u64>,
    clock: SequenceClock,
    /// ECG samples accepted this session
    accepted: u64,
    /// Device position of the most recent reported beat
    last_beat: Option<u64>,
    snapshot: Vec<f32>,
    position_snapshot: Vec<u64>,
}

impl PeakDetector {
    pub fn new(config: &AnalysisConfig) -> Self {
        PeakDetector {
            params: PeakParams::from_config(config),
            sample_rate: config.sample_rate,
            buffer: RingBuffer::new(config.ecg.buffer_capacity),
            positions: RingBuffer::new(config.ecg.buffer_capacity),
            clock: SequenceClock::default(),
            accepted: 0,
            last_beat: None,
            snapshot: Vec::with_capacity(config.ecg.buffer_capacity),
            position_snapshot: Vec::with_capacity(config.ecg.buffer_capacity),
            config: config.ecg.clone(),
        }
    }

    /// Push one accepted ECG value with its packet sequence number; runs a
    /// detection pass every `stride` accepted samples
    pub fn push(&mut self, sequence: u32, value: f32) -> Option<BeatDetection> {
        let position = self.clock.advance(sequence);
        self.buffer.push(value);
        self.positions.push(position);
        self.accepted += 1;

        if self.accepted % self.config.stride == 0 {
            Some(self.detect())
        } else {
            None
        }
    }

    /// Run one detection pass over the current buffer
    pub fn detect(&mut self) -> BeatDetection {
        self.buffer.snapshot_into(&mut self.snapshot);
        self.positions.snapshot_into(&mut self.position_snapshot);
        let peaks = find_r_peaks(&self.snapshot, &self.params);

        let positions: Vec<u64> = peaks
            .iter()
            .filter_map(|&p| self.position_snapshot.get(p).copied())
            .collect();

        let mut new_beats = Vec::new();
        let mut new_ibis_ms = Vec::new();
        for &position in &positions {
            let is_new = match self.last_beat {
                Some(last) => position > last + self.params.refractory as u64,
                None => true,
            };
            if !is_new {
                continue;
            }

            if let Some(last) = self.last_beat {
                let ibi = self.samples_to_ms(position - last);
                if self.is_plausible(ibi) {
                    new_ibis_ms.push(ibi);
                } else {
                    trace!(ibi_ms = ibi, "implausible interval discarded");
                }
            }
            new_beats.push(position);
            self.last_beat = Some(position);
        }

        let latest_ibi_ms = match positions.as_slice() {
            [.., previous, latest] => {
                let ibi = self.samples_to_ms(latest - previous);
                Some(ibi).filter(|ibi| self.is_plausible(*ibi))
            }
            _ => None,
        };

        let elapsed = self.clock.position().map_or(0, |position| position + 1);
        let detection = BeatDetection {
            sample_index: self.accepted,
            timestamp: SessionTimestamp::from_sample_index(elapsed, self.sample_rate),
            beats_in_window: positions.len(),
            new_beats,
            new_ibis_ms,
            latest_ibi_ms,
        };

        debug!(
            sample_index = detection.sample_index,
            beats = detection.beats_in_window,
            new = detection.new_beats.len(),
            "peak detection pass"
        );
        detection
    }

    fn samples_to_ms(&self, samples: u64) -> f32 {
        samples as f32 * 1000.0 / self.sample_rate
    }

    fn is_plausible(&self, ibi_ms: f32) -> bool {
        (self.config.min_ibi_ms..=self.config.max_ibi_ms).contains(&ibi_ms)
    }

    pub fn accepted(&self) -> u64 {
        self.accepted
    }

    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    pub fn reset(&mut self) {
        self.buffer.clear();
        self.positions.clear();
        self.clock.reset();
        self.accepted = 0;
        self.last_beat = None;
    }
}
