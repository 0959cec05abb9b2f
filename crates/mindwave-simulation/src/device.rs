//! Synthetic three-channel EEG/ECG headset

use crate::rhythm::{RhythmProfile, BAND_FREQUENCIES};
use mindwave_core::{MindwaveError, MindwaveResult, RawSample};
use rand::{Rng, SeedableRng};
use rand::rngs::StdRng;
use rand_distr::{Distribution, Normal, StandardNormal};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::f64::consts::TAU;
use tracing::debug;

/// R-wave width (std, seconds)
const QRS_WIDTH_S: f64 = 0.012;
/// T-wave offset after the R peak and its width (seconds)
const T_WAVE_OFFSET_S: f64 = 0.25;
const T_WAVE_WIDTH_S: f64 = 0.04;
const T_WAVE_RATIO: f32 = 0.25;
/// First R peak of a session (seconds)
const FIRST_BEAT_S: f64 = 0.3;
/// Beats per respiratory cycle
const BEATS_PER_BREATH: f64 = 8.0;
/// Respiratory baseline wander frequency (Hz)
const WANDER_HZ: f64 = 0.25;
/// Relative alpha amplitude on the second EEG channel
const EEG1_ALPHA_RATIO: f32 = 0.85;

/// Configuration for synthetic device
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Sampling rate in Hz
    pub sampling_rate: f32,
    /// Physiological pattern to generate
    pub profile: RhythmProfile,
    /// R-wave amplitude (mV)
    pub qrs_amplitude: f32,
    /// Noise configuration
    pub noise: NoiseConfig,
    /// Probability of a packet being lost in transit
    pub packet_loss: f32,
    /// Random seed for reproducibility
    pub seed: Option<u64>,
}

/// Noise and artifact configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NoiseConfig {
    /// EEG background noise std (µV)
    pub eeg_std: f32,
    /// ECG noise std (mV)
    pub ecg_std: f32,
    /// Respiratory baseline wander amplitude on the ECG (mV)
    pub baseline_wander: f32,
    /// Probability of a sample carrying a non-finite channel value
    pub artifact_prob: f32,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            sampling_rate: 500.0,
            profile: RhythmProfile::Relaxed,
            qrs_amplitude: 1.0,
            noise: NoiseConfig::default(),
            packet_loss: 0.0,
            seed: None,
        }
    }
}

impl Default for NoiseConfig {
    fn default() -> Self {
        Self {
            eeg_std: 2.0,
            ecg_std: 0.005,
            baseline_wander: 0.05,
            artifact_prob: 0.0,
        }
    }
}

fn check_probability(name: &str, value: f32) -> MindwaveResult<()> {
    if (0.0..1.0).contains(&value) {
        Ok(())
    } else {
        Err(MindwaveError::InvalidConfig {
            reason: format!("{} must be in [0, 1), got {}", name, value),
        })
    }
}

impl DeviceConfig {
    pub fn validate(&self) -> MindwaveResult<()> {
        if !(100.0..=2000.0).contains(&self.sampling_rate) {
            return Err(MindwaveError::InvalidSamplingRate {
                rate: self.sampling_rate,
                valid_range: "100-2000 Hz".to_string(),
            });
        }
        if !(self.qrs_amplitude.is_finite() && self.qrs_amplitude > 0.0) {
            return Err(MindwaveError::InvalidConfig {
                reason: format!("qrs_amplitude must be positive, got {}", self.qrs_amplitude),
            });
        }
        check_probability("packet_loss", self.packet_loss)?;
        check_probability("artifact_prob", self.noise.artifact_prob)?;
        Ok(())
    }
}

fn noise_distribution(std: f32) -> MindwaveResult<Normal<f32>> {
    Normal::new(0.0, std).map_err(|e| MindwaveError::InvalidConfig {
        reason: format!("Invalid noise parameters: {}", e),
    })
}

fn gaussian(offset: f64, width: f64) -> f32 {
    (-0.5 * (offset / width).powi(2)).exp() as f32
}

/// Seeded generator of multiplexed device samples
pub struct SyntheticDevice {
    config: DeviceConfig,
    rng: StdRng,
    eeg_noise: Normal<f32>,
    ecg_noise: Normal<f32>,
    /// Per-channel, per-band oscillator phase (radians)
    phases: [[f64; 5]; 2],
    sequence: u32,
    sample_index: u64,
    /// Scheduled R peaks still influencing the trace (seconds)
    beats: VecDeque<f64>,
    next_beat: f64,
    beat_count: u64,
    samples_lost: u64,
}

impl SyntheticDevice {
    pub fn new(config: DeviceConfig) -> MindwaveResult<Self> {
        config.validate()?;

        let mut rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let eeg_noise = noise_distribution(config.noise.eeg_std)?;
        let ecg_noise = noise_distribution(config.noise.ecg_std)?;

        let mut phases = [[0.0; 5]; 2];
        for channel in phases.iter_mut() {
            for phase in channel.iter_mut() {
                *phase = rng.gen_range(0.0..TAU);
            }
        }

        Ok(Self {
            config,
            rng,
            eeg_noise,
            ecg_noise,
            phases,
            sequence: 0,
            sample_index: 0,
            beats: VecDeque::new(),
            next_beat: FIRST_BEAT_S,
            beat_count: 0,
            samples_lost: 0,
        })
    }

    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    pub fn profile(&self) -> RhythmProfile {
        self.config.profile
    }

    /// Counter the next sample will carry
    pub fn sequence(&self) -> u32 {
        self.sequence
    }

    pub fn samples_lost(&self) -> u64 {
        self.samples_lost
    }

    pub fn elapsed_secs(&self) -> f64 {
        self.sample_index as f64 / self.config.sampling_rate as f64
    }

    /// Switch pattern without interrupting the signal
    pub fn set_profile(&mut self, profile: RhythmProfile) {
        debug!(%profile, "device profile changed");
        self.config.profile = profile;
    }

    pub fn set_packet_loss(&mut self, probability: f32) -> MindwaveResult<()> {
        check_probability("packet_loss", probability)?;
        self.config.packet_loss = probability;
        Ok(())
    }

    /// Restart the session clock and packet counter
    pub fn reset(&mut self) {
        self.sequence = 0;
        self.sample_index = 0;
        self.beats.clear();
        self.next_beat = FIRST_BEAT_S;
        self.beat_count = 0;
        self.samples_lost = 0;
    }

    /// Advance one sample period; `None` when the packet is lost in transit
    pub fn next_sample(&mut self) -> Option<RawSample> {
        let t = self.elapsed_secs();
        let sequence = self.sequence;
        self.sequence = self.sequence.wrapping_add(1);
        self.sample_index += 1;

        let mut sample = RawSample::new(sequence, self.eeg_value(0, t), self.eeg_value(1, t), self.ecg_value(t));

        if self.config.noise.artifact_prob > 0.0 && self.rng.gen::<f32>() < self.config.noise.artifact_prob {
            match self.rng.gen_range(0..3) {
                0 => sample.eeg0 = f32::NAN,
                1 => sample.eeg1 = f32::NAN,
                _ => sample.ecg = f32::NAN,
            }
        }

        if self.config.packet_loss > 0.0 && self.rng.gen::<f32>() < self.config.packet_loss {
            self.samples_lost += 1;
            return None;
        }

        Some(sample)
    }

    /// Generate `periods` sample periods worth of delivered samples
    pub fn generate(&mut self, periods: usize) -> Vec<RawSample> {
        (0..periods).filter_map(|_| self.next_sample()).collect()
    }

    /// Generate a chunk covering `duration` seconds
    pub fn generate_chunk(&mut self, duration: f32) -> Vec<RawSample> {
        let periods = (duration * self.config.sampling_rate).round().max(0.0) as usize;
        self.generate(periods)
    }

    fn eeg_value(&mut self, channel: usize, t: f64) -> f32 {
        let amplitudes = self.config.profile.band_amplitudes();
        let mut value = 0.0f32;

        for (band, (&amplitude, &frequency)) in amplitudes.iter().zip(BAND_FREQUENCIES.iter()).enumerate() {
            let mut amplitude = amplitude;
            if channel == 1 && band == 2 {
                amplitude *= EEG1_ALPHA_RATIO;
            }
            let phase = TAU * frequency as f64 * t + self.phases[channel][band];
            value += amplitude * phase.sin() as f32;
        }

        value + self.eeg_noise.sample(&mut self.rng)
    }

    fn ecg_value(&mut self, t: f64) -> f32 {
        while self.next_beat < t + 5.0 * QRS_WIDTH_S {
            self.beats.push_back(self.next_beat);
            let interval = self.next_interval_secs();
            self.next_beat += interval;
        }
        while self
            .beats
            .front()
            .is_some_and(|&beat| beat < t - T_WAVE_OFFSET_S - 5.0 * T_WAVE_WIDTH_S)
        {
            self.beats.pop_front();
        }

        let amplitude = self.config.qrs_amplitude;
        let mut value = 0.0f32;
        for &beat in &self.beats {
            value += amplitude * gaussian(t - beat, QRS_WIDTH_S);
            value += amplitude * T_WAVE_RATIO * gaussian(t - beat - T_WAVE_OFFSET_S, T_WAVE_WIDTH_S);
        }

        let wander = self.config.noise.baseline_wander * (TAU * WANDER_HZ * t).sin() as f32;
        value + wander + self.ecg_noise.sample(&mut self.rng)
    }

    /// Mean interval modulated by breathing plus white jitter, clamped to a plausible range
    fn next_interval_secs(&mut self) -> f64 {
        let profile = self.config.profile;
        let mean_ms = 60_000.0 / profile.heart_rate() as f64;
        let breath = (TAU * self.beat_count as f64 / BEATS_PER_BREATH).sin();
        let z: f64 = self.rng.sample(StandardNormal);
        self.beat_count += 1;

        let ibi_ms = mean_ms + profile.ibi_drift_ms() as f64 * breath + profile.ibi_jitter_ms() as f64 * z;
        ibi_ms.clamp(350.0, 1800.0) / 1000.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded(profile: RhythmProfile) -> DeviceConfig {
        DeviceConfig {
            profile,
            seed: Some(42),
            ..Default::default()
        }
    }

    fn tone_power(signal: &[f32], frequency: f64, rate: f64) -> f64 {
        let (mut re, mut im) = (0.0, 0.0);
        for (n, &x) in signal.iter().enumerate() {
            let phase = TAU * frequency * n as f64 / rate;
            re += x as f64 * phase.cos();
            im += x as f64 * phase.sin();
        }
        re * re + im * im
    }

    fn rising_crossings(signal: &[f32], level: f32) -> usize {
        signal.windows(2).filter(|w| w[0] < level && w[1] >= level).count()
    }

    #[test]
    fn test_seeded_devices_are_identical() {
        let mut a = SyntheticDevice::new(seeded(RhythmProfile::Focused)).unwrap();
        let mut b = SyntheticDevice::new(seeded(RhythmProfile::Focused)).unwrap();
        assert_eq!(a.generate(1_000), b.generate(1_000));
    }

    #[test]
    fn test_contiguous_counters_without_loss() {
        let mut device = SyntheticDevice::new(seeded(RhythmProfile::Relaxed)).unwrap();
        let samples = device.generate_chunk(0.5);

        assert_eq!(samples.len(), 250);
        assert!(samples.iter().enumerate().all(|(i, s)| s.sequence == i as u32));
        assert!(samples.iter().all(|s| s.eeg0.is_finite() && s.eeg1.is_finite() && s.ecg.is_finite()));
        assert!((device.elapsed_secs() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_packet_loss_skips_counters() {
        let mut config = seeded(RhythmProfile::Relaxed);
        config.packet_loss = 0.2;
        let mut device = SyntheticDevice::new(config).unwrap();
        let samples = device.generate(5_000);

        assert_eq!(samples.len() as u64 + device.samples_lost(), 5_000);
        assert!(device.samples_lost() > 500 && device.samples_lost() < 1_500);
        assert!(samples.windows(2).any(|w| w[1].sequence > w[0].sequence + 1));
        assert_eq!(device.sequence(), 5_000);
    }

    #[test]
    fn test_artifacts_inject_non_finite_values() {
        let mut config = seeded(RhythmProfile::Relaxed);
        config.noise.artifact_prob = 0.5;
        let mut device = SyntheticDevice::new(config).unwrap();
        let samples = device.generate(1_000);

        let corrupted = samples
            .iter()
            .filter(|s| !(s.eeg0.is_finite() && s.eeg1.is_finite() && s.ecg.is_finite()))
            .count();
        assert!(corrupted > 300 && corrupted < 700);
    }

    #[test]
    fn test_heart_rate_follows_profile() {
        for (profile, range) in [(RhythmProfile::Relaxed, 8..=13), (RhythmProfile::Stressed, 14..=18)] {
            let mut device = SyntheticDevice::new(seeded(profile)).unwrap();
            let ecg: Vec<f32> = device.generate(5_000).iter().map(|s| s.ecg).collect();
            let beats = rising_crossings(&ecg, 0.5);
            assert!(range.contains(&beats), "{}: {} beats in 10 s", profile, beats);
        }
    }

    #[test]
    fn test_eeg_spectrum_follows_profile() {
        let mut device = SyntheticDevice::new(seeded(RhythmProfile::Relaxed)).unwrap();
        let eeg: Vec<f32> = device.generate(1_000).iter().map(|s| s.eeg0).collect();
        assert!(tone_power(&eeg, 10.0, 500.0) > 4.0 * tone_power(&eeg, 20.0, 500.0));

        device.set_profile(RhythmProfile::Focused);
        let eeg: Vec<f32> = device.generate(1_000).iter().map(|s| s.eeg0).collect();
        assert!(tone_power(&eeg, 20.0, 500.0) > 4.0 * tone_power(&eeg, 10.0, 500.0));
    }

    #[test]
    fn test_reset_restarts_counter() {
        let mut device = SyntheticDevice::new(seeded(RhythmProfile::Drowsy)).unwrap();
        device.generate(300);
        device.reset();

        assert_eq!(device.sequence(), 0);
        assert_eq!(device.elapsed_secs(), 0.0);
        assert_eq!(device.next_sample().unwrap().sequence, 0);
    }

    #[test]
    fn test_invalid_configuration() {
        let config = DeviceConfig {
            sampling_rate: 0.0,
            ..Default::default()
        };
        assert!(matches!(
            SyntheticDevice::new(config),
            Err(MindwaveError::InvalidSamplingRate { .. })
        ));

        let config = DeviceConfig {
            packet_loss: 1.5,
            ..Default::default()
        };
        assert!(SyntheticDevice::new(config).is_err());

        let mut device = SyntheticDevice::new(DeviceConfig::default()).unwrap();
        assert!(device.set_packet_loss(-0.1).is_err());
        assert!(device.set_packet_loss(0.1).is_ok());
    }
}
