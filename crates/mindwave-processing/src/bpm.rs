//! BPM estimator
//!
//! The displayed heart rate follows the mean of the last few instantaneous
//! readings, moving at most `max_step` per update. It resets to `None` as
//! soon as no reading is available.

use crate::config::{AnalysisConfig, BpmConfig};
use crate::stats::RunningStats;
use mindwave_core::{BpmState, RingBuffer};
use tracing::trace;

pub struct BpmEstimator {
    config: BpmConfig,
    recent: RingBuffer<f32>,
    displayed: Option<f32>,
    stats: RunningStats,
}

impl BpmEstimator {
    pub fn new(config: &AnalysisConfig) -> Self {
        BpmEstimator {
            recent: RingBuffer::new(config.bpm.window),
            displayed: None,
            stats: RunningStats::new(),
            config: config.bpm.clone(),
        }
    }

    /// Feed the latest instantaneous reading, or `None` when unavailable
    pub fn update(&mut self, instantaneous: Option<f32>) -> BpmState {
        match instantaneous.filter(|bpm| bpm.is_finite() && *bpm > 0.0) {
            Some(bpm) => {
                self.recent.push(bpm);
                let target = self.recent.iter().sum::<f32>() / self.recent.len() as f32;

                let next = match self.displayed {
                    Some(previous) => {
                        let step = (target - previous).clamp(-self.config.max_step, self.config.max_step);
                        previous + step
                    }
                    None => target,
                };

                trace!(instantaneous = bpm, target, displayed = next, "bpm update");
                self.displayed = Some(next);
                self.stats.update(next);
            }
            None => {
                self.recent.clear();
                self.displayed = None;
            }
        }

        self.state()
    }

    pub fn state(&self) -> BpmState {
        BpmState {
            displayed: self.displayed,
            high: self.stats.high(),
            low: self.stats.low(),
            avg: self.stats.avg(),
        }
    }

    /// Back to the initial state; session statistics included
    pub fn reset(&mut self) {
        self.recent.clear();
        self.displayed = None;
        self.stats.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn estimator() -> BpmEstimator {
        BpmEstimator::new(&AnalysisConfig::default())
    }

    #[test]
    fn test_first_reading_taken_directly() {
        let mut bpm = estimator();
        let state = bpm.update(Some(72.0));
        assert_eq!(state.displayed, Some(72.0));
        assert_eq!(state.high, Some(72.0));
        assert_eq!(state.low, Some(72.0));
    }

    #[test]
    fn test_rate_limited_step() {
        let mut bpm = estimator();
        bpm.update(Some(60.0));

        let mut previous = 60.0;
        for _ in 0..10 {
            let displayed = bpm.update(Some(120.0)).displayed.unwrap();
            assert!((displayed - previous).abs() <= 2.0 + 1e-4);
            assert!(displayed > previous);
            previous = displayed;
        }
        assert!((previous - 80.0).abs() < 1e-4);
    }

    #[test]
    fn test_tracks_window_mean() {
        let mut bpm = estimator();
        bpm.update(Some(70.0));
        // Window mean is 71, within one step
        let state = bpm.update(Some(72.0));
        assert_eq!(state.displayed, Some(71.0));
    }

    #[test]
    fn test_missing_reading_clears_display() {
        let mut bpm = estimator();
        bpm.update(Some(70.0));
        bpm.update(Some(74.0));

        let state = bpm.update(None);
        assert_eq!(state.displayed, None);
        // Session statistics survive a dropout
        assert_eq!(state.high, Some(72.0));

        // Window was cleared: next reading is taken directly
        let state = bpm.update(Some(90.0));
        assert_eq!(state.displayed, Some(90.0));
    }

    #[test]
    fn test_statistics_over_displayed_values() {
        let mut bpm = estimator();
        for reading in [60.0, 62.0, 64.0] {
            bpm.update(Some(reading));
        }
        let state = bpm.state();
        assert_eq!(state.low, Some(60.0));
        assert_eq!(state.high, Some(62.0));
        assert!((state.avg.unwrap() - 61.0).abs() < 1e-4);
    }

    #[test]
    fn test_reset() {
        let mut bpm = estimator();
        bpm.update(Some(80.0));
        bpm.reset();
        assert_eq!(bpm.state(), BpmState::default());
    }
}
