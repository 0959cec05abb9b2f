//! Pre-defined EEG rhythm and cardiac patterns for realistic simulation

use mindwave_core::{Band, MindwaveError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Centre frequency used to synthesize each band (Hz), ordered as `Band::ALL`
pub const BAND_FREQUENCIES: [f32; 5] = [2.0, 6.0, 10.0, 20.0, 40.0];

/// Predefined physiological patterns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RhythmProfile {
    /// Eyes-closed rest: strong alpha, slow heart, high vagal tone
    Relaxed,
    /// Task engagement: beta dominant, moderate variability
    Focused,
    /// Drowsiness: delta and theta rise, alpha fades
    Drowsy,
    /// Arousal: beta and gamma, fast heart with little variability
    Stressed,
    /// Meditation: theta and alpha, slow deep breathing
    Meditative,
}

impl RhythmProfile {
    pub const ALL: [RhythmProfile; 5] = [
        RhythmProfile::Relaxed,
        RhythmProfile::Focused,
        RhythmProfile::Drowsy,
        RhythmProfile::Stressed,
        RhythmProfile::Meditative,
    ];

    /// EEG sinusoid amplitude per band (µV), ordered as `Band::ALL`
    pub fn band_amplitudes(&self) -> [f32; 5] {
        match self {
            RhythmProfile::Relaxed => [10.0, 8.0, 30.0, 8.0, 2.0],
            RhythmProfile::Focused => [8.0, 6.0, 10.0, 25.0, 5.0],
            RhythmProfile::Drowsy => [30.0, 20.0, 8.0, 5.0, 1.0],
            RhythmProfile::Stressed => [8.0, 6.0, 6.0, 25.0, 10.0],
            RhythmProfile::Meditative => [10.0, 25.0, 20.0, 6.0, 2.0],
        }
    }

    /// Band carrying the largest amplitude
    pub fn dominant_band(&self) -> Band {
        let amplitudes = self.band_amplitudes();
        let best = (1..amplitudes.len()).fold(0, |best, i| if amplitudes[i] > amplitudes[best] { i } else { best });
        Band::ALL[best]
    }

    /// Mean heart rate (BPM)
    pub fn heart_rate(&self) -> f32 {
        match self {
            RhythmProfile::Relaxed => 62.0,
            RhythmProfile::Focused => 72.0,
            RhythmProfile::Drowsy => 58.0,
            RhythmProfile::Stressed => 95.0,
            RhythmProfile::Meditative => 60.0,
        }
    }

    /// Beat-to-beat white jitter of the inter-beat interval (ms, std)
    pub fn ibi_jitter_ms(&self) -> f32 {
        match self {
            RhythmProfile::Relaxed => 55.0,
            RhythmProfile::Focused => 20.0,
            RhythmProfile::Drowsy => 35.0,
            RhythmProfile::Stressed => 6.0,
            RhythmProfile::Meditative => 40.0,
        }
    }

    /// Amplitude of the slow respiratory modulation of the interval (ms)
    pub fn ibi_drift_ms(&self) -> f32 {
        match self {
            RhythmProfile::Relaxed => 40.0,
            RhythmProfile::Focused => 45.0,
            RhythmProfile::Drowsy => 30.0,
            RhythmProfile::Stressed => 6.0,
            RhythmProfile::Meditative => 60.0,
        }
    }

    /// Get profile description
    pub fn description(&self) -> &'static str {
        match self {
            RhythmProfile::Relaxed => "Relaxed, eyes closed",
            RhythmProfile::Focused => "Focused on a task",
            RhythmProfile::Drowsy => "Drowsy, drifting off",
            RhythmProfile::Stressed => "Stressed, high arousal",
            RhythmProfile::Meditative => "Deep meditation",
        }
    }

    /// Create common preset patterns
    pub fn presets() -> Vec<(&'static str, RhythmProfile)> {
        RhythmProfile::ALL
            .iter()
            .map(|p| (p.description(), *p))
            .collect()
    }
}

impl fmt::Display for RhythmProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RhythmProfile::Relaxed => "relaxed",
            RhythmProfile::Focused => "focused",
            RhythmProfile::Drowsy => "drowsy",
            RhythmProfile::Stressed => "stressed",
            RhythmProfile::Meditative => "meditative",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for RhythmProfile {
    type Err = MindwaveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RhythmProfile::ALL
            .into_iter()
            .find(|p| p.to_string().eq_ignore_ascii_case(s))
            .ok_or_else(|| MindwaveError::InvalidConfig {
                reason: format!(
                    "unknown pattern '{}', expected one of relaxed, focused, drowsy, stressed, meditative",
                    s
                ),
            })
    }
}
