//! Session-long running statistics for displayed values

use serde::{Deserialize, Serialize};

/// Running high/low/mean over every value observed this session
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RunningStats {
    high: Option<f32>,
    low: Option<f32>,
    sum: f64,
    count: u64,
}

impl RunningStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one value in; non-finite values are ignored
    pub fn update(&mut self, value: f32) {
        if !value.is_finite() {
            return;
        }
        self.high = Some(self.high.map_or(value, |h| h.max(value)));
        self.low = Some(self.low.map_or(value, |l| l.min(value)));
        self.sum += value as f64;
        self.count += 1;
    }

    pub fn high(&self) -> Option<f32> {
        self.high
    }

    pub fn low(&self) -> Option<f32> {
        self.low
    }

    pub fn avg(&self) -> Option<f32> {
        if self.count == 0 {
            None
        } else {
            Some((self.sum / self.count as f64) as f32)
        }
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
