//! Derived physiological value types

use crate::error::MindwaveError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Canonical EEG frequency bands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Band {
    Delta,
    Theta,
    Alpha,
    Beta,
    Gamma,
}

impl Band {
    pub const ALL: [Band; 5] = [Band::Delta, Band::Theta, Band::Alpha, Band::Beta, Band::Gamma];

    /// Default frequency range in Hz, `[low, high)`
    pub fn default_range(&self) -> (f32, f32) {
        match self {
            Band::Delta => (0.5, 4.0),
            Band::Theta => (4.0, 8.0),
            Band::Alpha => (8.0, 13.0),
            Band::Beta => (13.0, 30.0),
            Band::Gamma => (30.0, 100.0),
        }
    }

    /// Position in `Band::ALL`
    pub fn index(&self) -> usize {
        *self as usize
    }

    pub fn label(&self) -> &'static str {
        match self {
            Band::Delta => "Delta",
            Band::Theta => "Theta",
            Band::Alpha => "Alpha",
            Band::Beta => "Beta",
            Band::Gamma => "Gamma",
        }
    }
}

impl fmt::Display for Band {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (low, high) = self.default_range();
        write!(f, "{} ({}-{} Hz)", self.label(), low, high)
    }
}

/// Share of in-window spectral power per band, in percent
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BandPowerVector {
    pub delta: f32,
    pub theta: f32,
    pub alpha: f32,
    pub beta: f32,
    pub gamma: f32,
}

impl BandPowerVector {
    /// Build from values ordered as `Band::ALL`
    pub fn from_array(values: [f32; 5]) -> Self {
        Self {
            delta: values[0],
            theta: values[1],
            alpha: values[2],
            beta: values[3],
            gamma: values[4],
        }
    }

    pub fn to_array(&self) -> [f32; 5] {
        [self.delta, self.theta, self.alpha, self.beta, self.gamma]
    }

    pub fn get(&self, band: Band) -> f32 {
        self.to_array()[band.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = (Band, f32)> {
        Band::ALL.into_iter().zip(self.to_array())
    }

    pub fn total(&self) -> f32 {
        self.to_array().iter().sum()
    }

    /// Band holding the largest share; earlier bands win ties
    pub fn dominant(&self) -> Band {
        let mut best = Band::Delta;
        for (band, value) in self.iter() {
            if value > self.get(best) {
                best = band;
            }
        }
        best
    }

    /// Element-wise mean of two vectors
    pub fn mean_with(&self, other: &BandPowerVector) -> BandPowerVector {
        let a = self.to_array();
        let b = other.to_array();
        let mut out = [0.0f32; 5];
        for i in 0..5 {
            out[i] = (a[i] + b[i]) / 2.0;
        }
        BandPowerVector::from_array(out)
    }
}

/// Training goal selecting the composite score
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Goal {
    /// Alpha/beta ratio
    #[default]
    Anxiety,
    /// Theta level
    Meditation,
    /// Delta level
    Sleep,
}

impl fmt::Display for Goal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Goal::Anxiety => write!(f, "anxiety"),
            Goal::Meditation => write!(f, "meditation"),
            Goal::Sleep => write!(f, "sleep"),
        }
    }
}

impl FromStr for Goal {
    type Err = MindwaveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "anxiety" => Ok(Goal::Anxiety),
            "meditation" => Ok(Goal::Meditation),
            "sleep" => Ok(Goal::Sleep),
            other => Err(MindwaveError::InvalidConfig {
                reason: format!("unknown goal '{}', expected anxiety, meditation or sleep", other),
            }),
        }
    }
}

/// Displayed heart rate with session statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BpmState {
    /// Rate-limited value shown to the user
    pub displayed: Option<f32>,
    pub high: Option<f32>,
    pub low: Option<f32>,
    pub avg: Option<f32>,
}

/// Time-domain heart-rate-variability features, all in milliseconds except
/// `pnn50` which is a fraction in `[0, 1]`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HrvMetrics {
    pub sdnn: f32,
    pub rmssd: f32,
    pub pnn50: f32,
}

impl HrvMetrics {
    pub fn is_finite(&self) -> bool {
        self.sdnn.is_finite() && self.rmssd.is_finite() && self.pnn50.is_finite()
    }
}

/// Displayed HRV (RMSSD) with session statistics and the latest features
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct HrvState {
    pub current: Option<f32>,
    pub high: Option<f32>,
    pub low: Option<f32>,
    pub avg: Option<f32>,
    pub metrics: Option<HrvMetrics>,
}

/// Discrete mental/emotional state label
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmotionalState {
    #[default]
    NoData,
    Stressed,
    Relaxed,
    Happy,
    Focused,
    Neutral,
    MildStress,
}

impl EmotionalState {
    pub const ALL: [EmotionalState; 7] = [
        EmotionalState::NoData,
        EmotionalState::Stressed,
        EmotionalState::Relaxed,
        EmotionalState::Happy,
        EmotionalState::Focused,
        EmotionalState::Neutral,
        EmotionalState::MildStress,
    ];

    /// Position in `EmotionalState::ALL`
    pub fn index(&self) -> usize {
        *self as usize
    }

    /// Wire name, e.g. `mild_stress`
    pub fn as_str(&self) -> &'static str {
        match self {
            EmotionalState::NoData => "no_data",
            EmotionalState::Stressed => "stressed",
            EmotionalState::Relaxed => "relaxed",
            EmotionalState::Happy => "happy",
            EmotionalState::Focused => "focused",
            EmotionalState::Neutral => "neutral",
            EmotionalState::MildStress => "mild_stress",
        }
    }
}

impl fmt::Display for EmotionalState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EmotionalState::NoData => write!(f, "Analyzing..."),
            other => write!(f, "{}", other.as_str().replace('_', " ")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_band_vector_access() {
        let vector = BandPowerVector::from_array([10.0, 20.0, 40.0, 25.0, 5.0]);
        assert_eq!(vector.get(Band::Alpha), 40.0);
        assert_eq!(vector.dominant(), Band::Alpha);
        assert!((vector.total() - 100.0).abs() < 1e-4);
    }

    #[test]
    fn test_band_vector_mean() {
        let a = BandPowerVector::from_array([10.0, 20.0, 30.0, 30.0, 10.0]);
        let b = BandPowerVector::from_array([20.0, 20.0, 10.0, 40.0, 10.0]);
        let mean = a.mean_with(&b);
        assert_eq!(mean.delta, 15.0);
        assert_eq!(mean.alpha, 20.0);
        assert_eq!(mean.beta, 35.0);
    }

    #[test]
    fn test_goal_parsing() {
        assert_eq!("Meditation".parse::<Goal>().unwrap(), Goal::Meditation);
        assert_eq!("sleep".parse::<Goal>().unwrap(), Goal::Sleep);
        assert!("focus".parse::<Goal>().is_err());
    }

    #[test]
    fn test_state_wire_names() {
        let json = serde_json::to_string(&EmotionalState::MildStress).unwrap();
        assert_eq!(json, "\"mild_stress\"");
        assert_eq!(EmotionalState::MildStress.to_string(), "mild stress");
        assert_eq!(EmotionalState::NoData.to_string(), "Analyzing...");
    }

    #[test]
    fn test_state_indices_are_dense() {
        for (i, state) in EmotionalState::ALL.iter().enumerate() {
            assert_eq!(state.index(), i);
        }
    }
}
