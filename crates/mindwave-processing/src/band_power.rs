//! Band-power analyzer: lock-step EEG windows, strided spectral ticks and
//! exponential smoothing of the per-channel band vectors

use crate::config::{AnalysisConfig, EegConfig};
use crate::spectral::SpectralEstimator;
use mindwave_core::{BandPowerVector, Goal, MindwaveResult, RingBuffer, SessionTimestamp};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Number of EEG channels analyzed together
pub const EEG_CHANNELS: usize = 2;

/// Output of one spectral tick
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BandPowerTick {
    /// EEG sample index that triggered the tick
    pub sample_index: u64,
    /// Session time of that sample
    pub timestamp: SessionTimestamp,
    /// Smoothed band vector per channel
    pub channels: [BandPowerVector; EEG_CHANNELS],
    /// Absolute alpha difference between the channels (percentage points)
    pub symmetry: f32,
    /// Goal the composite score was computed for
    pub goal: Goal,
    /// Goal-dependent composite score, `None` when undefined for this tick
    pub goal_score: Option<f32>,
}

impl BandPowerTick {
    /// Element-wise mean of both channels
    pub fn average(&self) -> BandPowerVector {
        self.channels[0].mean_with(&self.channels[1])
    }
}

/// Composite score for `goal` from the channel-averaged vector.
///
/// Anxiety is the alpha/beta ratio, meditation the theta share and sleep the
/// delta share.
pub fn goal_score(goal: Goal, average: &BandPowerVector) -> Option<f32> {
    match goal {
        Goal::Anxiety => {
            if average.beta > f32::EPSILON {
                Some(average.alpha / average.beta)
            } else {
                None
            }
        }
        Goal::Meditation => Some(average.theta),
        Goal::Sleep => Some(average.delta),
    }
}

/// Exponential smoothing, `a * previous + (1 - a) * fresh`
pub fn smooth(previous: &BandPowerVector, fresh: &BandPowerVector, factor: f32) -> BandPowerVector {
    let prev = previous.to_array();
    let next = fresh.to_array();
    let mut out = [0.0f32; 5];
    for i in 0..out.len() {
        out[i] = factor * prev[i] + (1.0 - factor) * next[i];
    }
    BandPowerVector::from_array(out)
}

/// Sliding-window band-power analysis over both EEG channels.
///
/// Filling until both windows hold `window_size` samples, then a tick fires
/// on every `stride`-th accepted sample.
pub struct BandPowerAnalyzer {
    config: EegConfig,
    sample_rate: f32,
    windows: [RingBuffer<f32>; EEG_CHANNELS],
    /// Accepted EEG samples this session
    sample_index: u64,
    spectral: SpectralEstimator,
    smoothed: [Option<BandPowerVector>; EEG_CHANNELS],
    goal: Goal,
    scratch: Vec<f32>,
}

impl BandPowerAnalyzer {
    pub fn new(config: &AnalysisConfig) -> Self {
        let eeg = config.eeg.clone();
        let spectral = SpectralEstimator::new(config.sample_rate, eeg.window_size, &eeg.bands);

        BandPowerAnalyzer {
            windows: [RingBuffer::new(eeg.window_size), RingBuffer::new(eeg.window_size)],
            sample_index: 0,
            spectral,
            smoothed: [None; EEG_CHANNELS],
            goal: Goal::default(),
            scratch: Vec::with_capacity(eeg.window_size),
            sample_rate: config.sample_rate,
            config: eeg,
        }
    }

    /// Push one lock-step EEG pair; returns a tick when one is due
    pub fn push(&mut self, eeg0: f32, eeg1: f32) -> MindwaveResult<Option<BandPowerTick>> {
        self.windows[0].push(eeg0);
        self.windows[1].push(eeg1);
        self.sample_index += 1;

        if self.sample_index % self.config.stride != 0 || !self.is_ready() {
            return Ok(None);
        }

        self.tick()
    }

    fn tick(&mut self) -> MindwaveResult<Option<BandPowerTick>> {
        for channel in 0..EEG_CHANNELS {
            self.windows[channel].snapshot_into(&mut self.scratch);
            match self.spectral.band_percentages(&self.scratch)? {
                Some(fresh) => {
                    let next = match &self.smoothed[channel] {
                        Some(previous) => smooth(previous, &fresh, self.config.smoothing_factor),
                        None => fresh,
                    };
                    self.smoothed[channel] = Some(next);
                }
                None => {
                    debug!(channel, sample_index = self.sample_index, "no in-band energy, channel tick skipped");
                }
            }
        }

        let channels = match self.smoothed {
            [Some(a), Some(b)] => [a, b],
            _ => return Ok(None),
        };

        let symmetry = (channels[0].alpha - channels[1].alpha).abs();
        let average = channels[0].mean_with(&channels[1]);
        let tick = BandPowerTick {
            sample_index: self.sample_index,
            timestamp: SessionTimestamp::from_sample_index(self.sample_index, self.sample_rate),
            channels,
            symmetry,
            goal: self.goal,
            goal_score: goal_score(self.goal, &average),
        };

        debug!(
            sample_index = tick.sample_index,
            dominant = %average.dominant(),
            symmetry = tick.symmetry,
            "band power tick"
        );
        Ok(Some(tick))
    }

    /// Both windows are full
    pub fn is_ready(&self) -> bool {
        self.windows.iter().all(|w| w.is_full())
    }

    pub fn sample_index(&self) -> u64 {
        self.sample_index
    }

    pub fn goal(&self) -> Goal {
        self.goal
    }

    /// Takes effect on the next tick
    pub fn set_goal(&mut self, goal: Goal) {
        self.goal = goal;
    }

    /// Latest smoothed vector per channel
    pub fn current(&self) -> [Option<BandPowerVector>; EEG_CHANNELS] {
        self.smoothed
    }

    /// Drop windows and smoothing history; the goal is kept
    pub fn reset(&mut self) {
        for window in &mut self.windows {
            window.clear();
        }
        self.sample_index = 0;
        self.smoothed = [None; EEG_CHANNELS];
    }
}
