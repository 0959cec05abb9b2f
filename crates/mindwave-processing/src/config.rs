//! Configuration management for the analysis pipeline

use crate::classifier::ThresholdPolicy;
use mindwave_core::{config_error, Band, MindwaveError, MindwaveResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Global analysis configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Configuration name
    pub name: String,
    /// Smoothing profile this configuration was built from
    pub profile: AnalysisProfile,
    /// Nominal device sample rate (Hz), shared by all channels
    pub sample_rate: f32,
    /// Band-power analyzer parameters
    pub eeg: EegConfig,
    /// Peak detector parameters
    pub ecg: EcgConfig,
    /// BPM estimator parameters
    pub bpm: BpmConfig,
    /// HRV engine parameters
    pub hrv: HrvConfig,
    /// Classifier and temporal aggregator parameters
    pub state: StateConfig,
    /// Capacity of each lane between the ingestion path and the actors.
    /// A full lane evicts its oldest message.
    pub queue_capacity: usize,
}

/// Display smoothing profiles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnalysisProfile {
    /// Low history weight, fast but jittery bars
    Responsive,
    /// Default trade-off
    Balanced,
    /// High history weight, calm but laggy bars
    Calm,
    /// Hand-tuned
    Custom,
}

impl AnalysisProfile {
    pub fn smoothing_factor(&self) -> f32 {
        match self {
            AnalysisProfile::Responsive => 0.4,
            AnalysisProfile::Balanced | AnalysisProfile::Custom => 0.7,
            AnalysisProfile::Calm => 0.9,
        }
    }
}

/// Frequency range assigned to a band, `[low_hz, high_hz)`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BandRange {
    pub band: Band,
    pub low_hz: f32,
    pub high_hz: f32,
}

impl BandRange {
    pub fn canonical() -> Vec<BandRange> {
        Band::ALL
            .iter()
            .map(|&band| {
                let (low_hz, high_hz) = band.default_range();
                BandRange { band, low_hz, high_hz }
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EegConfig {
    /// Samples per channel window
    pub window_size: usize,
    /// Run a spectral tick every `stride` accepted samples
    pub stride: u64,
    /// Weight of the previous tick in exponential smoothing, `[0, 1)`
    pub smoothing_factor: f32,
    /// Band layout, one entry per `Band`
    pub bands: Vec<BandRange>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EcgConfig {
    /// ECG ring buffer capacity in samples
    pub buffer_capacity: usize,
    /// Run peak detection every `stride` accepted ECG samples
    pub stride: u64,
    /// Moving-window integration width (ms)
    pub integration_window_ms: f32,
    /// Minimum spacing between beats (ms)
    pub refractory_ms: f32,
    /// Detection threshold is `mean + k * std` of the integrated signal
    pub threshold_k: f32,
    /// Half-width of the R-peak refinement search (ms)
    pub search_margin_ms: f32,
    /// Shortest plausible inter-beat interval (ms)
    pub min_ibi_ms: f32,
    /// Longest plausible inter-beat interval (ms)
    pub max_ibi_ms: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BpmConfig {
    /// Trailing window of instantaneous readings
    pub window: usize,
    /// Maximum change of the displayed value per update
    pub max_step: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HrvConfig {
    /// Number of most recent IBIs retained
    pub retention: usize,
    /// Successive-difference threshold for pNN50 (ms)
    pub pnn_threshold_ms: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateConfig {
    /// Output is pinned to `no_data` for this long after connect
    pub warmup_ms: u64,
    /// Trailing history used for the majority vote
    pub vote_window_ms: u64,
    /// Minimum spacing between committed outputs
    pub commit_interval_ms: u64,
    /// Classifier thresholds
    pub policy: ThresholdPolicy,
}

impl Default for EegConfig {
    fn default() -> Self {
        Self {
            window_size: 256,
            stride: 10,
            smoothing_factor: AnalysisProfile::Balanced.smoothing_factor(),
            bands: BandRange::canonical(),
        }
    }
}

impl Default for EcgConfig {
    fn default() -> Self {
        Self {
            buffer_capacity: 2500,
            stride: 500,
            integration_window_ms: 150.0,
            refractory_ms: 250.0,
            threshold_k: 1.0,
            search_margin_ms: 75.0,
            min_ibi_ms: 300.0,
            max_ibi_ms: 2000.0,
        }
    }
}

impl Default for BpmConfig {
    fn default() -> Self {
        Self {
            window: 5,
            max_step: 2.0,
        }
    }
}

impl Default for HrvConfig {
    fn default() -> Self {
        Self {
            retention: 60,
            pnn_threshold_ms: 50.0,
        }
    }
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            warmup_ms: 5_000,
            vote_window_ms: 5_000,
            commit_interval_ms: 5_000,
            policy: ThresholdPolicy::default(),
        }
    }
}

/// Preset configurations
impl AnalysisConfig {
    const MIN_SAMPLE_RATE: f32 = 100.0;
    const MAX_SAMPLE_RATE: f32 = 4000.0;

    /// Configuration for a given smoothing profile
    pub fn for_profile(profile: AnalysisProfile) -> Self {
        let name = match profile {
            AnalysisProfile::Responsive => "Responsive",
            AnalysisProfile::Balanced => "Balanced",
            AnalysisProfile::Calm => "Calm",
            AnalysisProfile::Custom => "Custom",
        };

        AnalysisConfig {
            name: name.to_string(),
            profile,
            sample_rate: 500.0,
            eeg: EegConfig {
                smoothing_factor: profile.smoothing_factor(),
                ..EegConfig::default()
            },
            ecg: EcgConfig::default(),
            bpm: BpmConfig::default(),
            hrv: HrvConfig::default(),
            state: StateConfig::default(),
            queue_capacity: 4096,
        }
    }

    pub fn responsive() -> Self {
        Self::for_profile(AnalysisProfile::Responsive)
    }

    pub fn balanced() -> Self {
        Self::for_profile(AnalysisProfile::Balanced)
    }

    pub fn calm() -> Self {
        Self::for_profile(AnalysisProfile::Calm)
    }

    /// Milliseconds covered by one sample
    pub fn sample_period_ms(&self) -> f32 {
        1000.0 / self.sample_rate
    }

    /// Convert a duration in milliseconds to a sample count, at least one
    pub fn ms_to_samples(&self, ms: f32) -> usize {
        ((ms * self.sample_rate / 1000.0).round() as usize).max(1)
    }

    /// Validate entire configuration
    pub fn validate(&self) -> MindwaveResult<()> {
        if !(Self::MIN_SAMPLE_RATE..=Self::MAX_SAMPLE_RATE).contains(&self.sample_rate) {
            return Err(MindwaveError::InvalidSamplingRate {
                rate: self.sample_rate,
                valid_range: format!("{}-{}Hz", Self::MIN_SAMPLE_RATE, Self::MAX_SAMPLE_RATE),
            });
        }

        self.validate_eeg()?;
        self.validate_ecg()?;

        if self.bpm.window == 0 {
            return Err(config_error!("BPM window must be greater than 0"));
        }
        if !(self.bpm.max_step > 0.0) {
            return Err(config_error!("BPM max step must be positive"));
        }

        if self.hrv.retention < 2 {
            return Err(config_error!("HRV retention must hold at least 2 intervals"));
        }
        if !(self.hrv.pnn_threshold_ms > 0.0) {
            return Err(config_error!("pNN threshold must be positive"));
        }

        if self.state.vote_window_ms == 0 {
            return Err(config_error!("Vote window must be greater than 0"));
        }

        if self.queue_capacity == 0 {
            return Err(config_error!("Queue capacity must be greater than 0"));
        }

        Ok(())
    }

    fn validate_eeg(&self) -> MindwaveResult<()> {
        let eeg = &self.eeg;

        if eeg.window_size < 16 {
            return Err(config_error!("EEG window size {} is below 16 samples", eeg.window_size));
        }
        if eeg.stride == 0 {
            return Err(config_error!("EEG stride must be greater than 0"));
        }
        if !(0.0..1.0).contains(&eeg.smoothing_factor) {
            return Err(config_error!(
                "Smoothing factor {} must be within [0, 1)",
                eeg.smoothing_factor
            ));
        }

        if eeg.bands.len() != Band::ALL.len() {
            return Err(config_error!(
                "Expected {} bands, found {}",
                Band::ALL.len(),
                eeg.bands.len()
            ));
        }

        let nyquist = self.sample_rate / 2.0;
        for band in Band::ALL {
            let range = eeg
                .bands
                .iter()
                .find(|r| r.band == band)
                .ok_or_else(|| config_error!("Band {} has no frequency range", band.label()))?;
            if !(range.low_hz >= 0.0 && range.low_hz < range.high_hz) {
                return Err(config_error!(
                    "Band {} range [{}, {}) is inverted or empty",
                    band.label(),
                    range.low_hz,
                    range.high_hz
                ));
            }
            if range.high_hz > nyquist {
                return Err(config_error!(
                    "Band {} upper edge {}Hz exceeds Nyquist {}Hz",
                    band.label(),
                    range.high_hz,
                    nyquist
                ));
            }
        }

        let mut sorted: Vec<&BandRange> = eeg.bands.iter().collect();
        sorted.sort_by(|a, b| a.low_hz.total_cmp(&b.low_hz));
        for pair in sorted.windows(2) {
            if pair[1].low_hz < pair[0].high_hz {
                return Err(config_error!(
                    "Bands {} and {} overlap",
                    pair[0].band.label(),
                    pair[1].band.label()
                ));
            }
        }

        Ok(())
    }

    fn validate_ecg(&self) -> MindwaveResult<()> {
        let ecg = &self.ecg;

        if ecg.stride == 0 {
            return Err(config_error!("ECG stride must be greater than 0"));
        }
        let min_buffer = self.ms_to_samples(2.0 * ecg.max_ibi_ms);
        if ecg.buffer_capacity < min_buffer {
            return Err(config_error!(
                "ECG buffer of {} samples cannot hold two beats {}ms apart",
                ecg.buffer_capacity,
                ecg.max_ibi_ms
            ));
        }
        if !(ecg.min_ibi_ms > 0.0 && ecg.min_ibi_ms < ecg.max_ibi_ms) {
            return Err(config_error!(
                "IBI range [{}, {}]ms is invalid",
                ecg.min_ibi_ms,
                ecg.max_ibi_ms
            ));
        }
        if !(ecg.integration_window_ms > 0.0 && ecg.refractory_ms > 0.0 && ecg.search_margin_ms >= 0.0) {
            return Err(config_error!("Peak detector windows must be positive"));
        }
        if !ecg.threshold_k.is_finite() {
            return Err(config_error!("Peak threshold factor must be finite"));
        }

        Ok(())
    }

    /// Export configuration to JSON
    pub fn to_json(&self) -> MindwaveResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| MindwaveError::Serialization {
            reason: format!("Failed to serialize configuration: {}", e),
        })
    }

    /// Import configuration from JSON
    pub fn from_json(json: &str) -> MindwaveResult<Self> {
        serde_json::from_str(json).map_err(|e| MindwaveError::Serialization {
            reason: format!("Failed to deserialize configuration: {}", e),
        })
    }

    /// Load and validate a JSON configuration file
    pub fn load(path: impl AsRef<Path>) -> MindwaveResult<Self> {
        let json = std::fs::read_to_string(path.as_ref())?;
        let config = Self::from_json(&json)?;
        config.validate()?;
        Ok(config)
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self::balanced()
    }
}
