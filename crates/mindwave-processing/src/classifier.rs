//! Mental-state classifier
//!
//! A pure mapping from HRV features to an `EmotionalState`. The rule set sits
//! behind `StatePolicy` so alternative threshold tables can be swapped in.

use mindwave_core::{EmotionalState, HrvMetrics};
use serde::{Deserialize, Serialize};

/// Deterministic feature-to-label mapping
pub trait StatePolicy: Send + Sync {
    /// Label for one feature triple. Must not depend on earlier calls.
    fn label(&self, metrics: &HrvMetrics) -> EmotionalState;

    /// Policy name for logs
    fn name(&self) -> &str;
}

/// Classify optional features, mapping missing or non-finite input to `NoData`
pub fn classify(policy: &dyn StatePolicy, metrics: Option<&HrvMetrics>) -> EmotionalState {
    match metrics {
        Some(m) if m.is_finite() => policy.label(m),
        _ => EmotionalState::NoData,
    }
}

/// Threshold table evaluated top to bottom; the first matching rule wins
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdPolicy {
    /// RMSSD below this (ms) together with low SDNN is stress
    pub stressed_rmssd: f32,
    pub stressed_sdnn: f32,
    /// RMSSD below this (ms) is mild stress
    pub mild_stress_rmssd: f32,
    /// High vagal tone thresholds for relaxation
    pub relaxed_rmssd: f32,
    pub relaxed_pnn50: f32,
    pub happy_rmssd: f32,
    pub happy_pnn50: f32,
    /// Moderate, steady variability reads as focus
    pub focused_sdnn: (f32, f32),
    pub focused_rmssd: (f32, f32),
    pub focused_max_pnn50: f32,
}

impl Default for ThresholdPolicy {
    fn default() -> Self {
        ThresholdPolicy {
            stressed_rmssd: 20.0,
            stressed_sdnn: 30.0,
            mild_stress_rmssd: 30.0,
            relaxed_rmssd: 60.0,
            relaxed_pnn50: 0.30,
            happy_rmssd: 45.0,
            happy_pnn50: 0.15,
            focused_sdnn: (30.0, 50.0),
            focused_rmssd: (30.0, 45.0),
            focused_max_pnn50: 0.10,
        }
    }
}

impl StatePolicy for ThresholdPolicy {
    fn label(&self, m: &HrvMetrics) -> EmotionalState {
        if m.rmssd < self.stressed_rmssd && m.sdnn < self.stressed_sdnn {
            EmotionalState::Stressed
        } else if m.rmssd < self.mild_stress_rmssd {
            EmotionalState::MildStress
        } else if m.rmssd > self.relaxed_rmssd && m.pnn50 > self.relaxed_pnn50 {
            EmotionalState::Relaxed
        } else if m.rmssd > self.happy_rmssd && m.pnn50 > self.happy_pnn50 {
            EmotionalState::Happy
        } else if within(m.sdnn, self.focused_sdnn)
            && within(m.rmssd, self.focused_rmssd)
            && m.pnn50 < self.focused_max_pnn50
        {
            EmotionalState::Focused
        } else {
            EmotionalState::Neutral
        }
    }

    fn name(&self) -> &str {
        "threshold"
    }
}

fn within(value: f32, (low, high): (f32, f32)) -> bool {
    value >= low && value <= high
}
