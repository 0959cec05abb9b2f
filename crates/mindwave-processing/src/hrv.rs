//! HRV engine: SDNN, RMSSD and pNN50 over a bounded interval history

use crate::config::{AnalysisConfig, HrvConfig};
use crate::stats::RunningStats;
use mindwave_core::{HrvMetrics, HrvState, RingBuffer};
use tracing::trace;

/// Time-domain HRV features of an interval sequence (ms).
///
/// SDNN is the population standard deviation; pNN50 counts successive
/// differences strictly above `pnn_threshold_ms`. `None` with fewer than two
/// intervals.
pub fn hrv_metrics(ibis_ms: &[f32], pnn_threshold_ms: f32) -> Option<HrvMetrics> {
    if ibis_ms.len() < 2 {
        return None;
    }

    let n = ibis_ms.len() as f64;
    let mean = ibis_ms.iter().map(|&v| v as f64).sum::<f64>() / n;
    let variance = ibis_ms
        .iter()
        .map(|&v| (v as f64 - mean).powi(2))
        .sum::<f64>()
        / n;

    let diffs: Vec<f64> = ibis_ms
        .windows(2)
        .map(|pair| pair[1] as f64 - pair[0] as f64)
        .collect();
    let mean_square = diffs.iter().map(|d| d * d).sum::<f64>() / diffs.len() as f64;
    let over = diffs
        .iter()
        .filter(|d| d.abs() > pnn_threshold_ms as f64)
        .count();

    Some(HrvMetrics {
        sdnn: variance.sqrt() as f32,
        rmssd: mean_square.sqrt() as f32,
        pnn50: (over as f64 / diffs.len() as f64) as f32,
    })
}

pub struct HrvEngine {
    config: HrvConfig,
    ibis: RingBuffer<f32>,
    metrics: Option<HrvMetrics>,
    stats: RunningStats,
    scratch: Vec<f32>,
}

impl HrvEngine {
    pub fn new(config: &AnalysisConfig) -> Self {
        HrvEngine {
            ibis: RingBuffer::new(config.hrv.retention),
            metrics: None,
            stats: RunningStats::new(),
            scratch: Vec::with_capacity(config.hrv.retention),
            config: config.hrv.clone(),
        }
    }

    /// Fold in the intervals from one detection pass.
    ///
    /// `beats_in_window` below two means the signal has no usable rhythm, so
    /// the retained intervals are dropped and nothing is reported.
    pub fn update(&mut self, new_ibis_ms: &[f32], beats_in_window: usize) -> HrvState {
        if beats_in_window < 2 {
            self.ibis.clear();
            self.metrics = None;
            return self.state();
        }

        for &ibi in new_ibis_ms.iter().filter(|v| v.is_finite()) {
            self.ibis.push(ibi);
        }

        self.ibis.snapshot_into(&mut self.scratch);
        self.metrics = hrv_metrics(&self.scratch, self.config.pnn_threshold_ms).filter(|m| m.is_finite());

        if let Some(metrics) = self.metrics {
            trace!(sdnn = metrics.sdnn, rmssd = metrics.rmssd, pnn50 = metrics.pnn50, "hrv update");
            self.stats.update(metrics.rmssd);
        }

        self.state()
    }

    pub fn metrics(&self) -> Option<HrvMetrics> {
        self.metrics
    }

    pub fn retained(&self) -> usize {
        self.ibis.len()
    }

    pub fn state(&self) -> HrvState {
        HrvState {
            current: self.metrics.map(|m| m.rmssd),
            high: self.stats.high(),
            low: self.stats.low(),
            avg: self.stats.avg(),
            metrics: self.metrics,
        }
    }

    pub fn reset(&mut self) {
        self.ibis.clear();
        self.metrics = None;
        self.stats.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hand_computed_metrics() {
        let metrics = hrv_metrics(&[800.0, 810.0, 790.0, 805.0], 50.0).unwrap();
        // mean 801.25, population variance 54.6875
        assert!((metrics.sdnn - 54.6875f32.sqrt()).abs() < 1e-3);
        // diffs 10, -20, 15
        assert!((metrics.rmssd - (725.0f32 / 3.0).sqrt()).abs() < 1e-3);
        assert_eq!(metrics.pnn50, 0.0);
    }

    #[test]
    fn test_pnn50_is_strict_fraction() {
        let metrics = hrv_metrics(&[800.0, 850.0, 920.0, 800.0], 50.0).unwrap();
        // |50| is not counted, |70| and |120| are
        assert!((metrics.pnn50 - 2.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_too_few_intervals() {
        assert_eq!(hrv_metrics(&[], 50.0), None);
        assert_eq!(hrv_metrics(&[800.0], 50.0), None);

        let mut engine = HrvEngine::new(&AnalysisConfig::default());
        let state = engine.update(&[800.0], 2);
        assert_eq!(state.current, None);
        assert_eq!(state.metrics, None);
    }

    #[test]
    fn test_engine_accumulates_across_passes() {
        let mut engine = HrvEngine::new(&AnalysisConfig::default());
        engine.update(&[800.0, 810.0], 3);
        let state = engine.update(&[790.0, 805.0], 5);

        let expected = hrv_metrics(&[800.0, 810.0, 790.0, 805.0], 50.0).unwrap();
        assert_eq!(state.metrics, Some(expected));
        assert_eq!(state.current, Some(expected.rmssd));
        assert_eq!(engine.retained(), 4);
    }

    #[test]
    fn test_retention_is_bounded() {
        let mut config = AnalysisConfig::default();
        config.hrv.retention = 4;
        let mut engine = HrvEngine::new(&config);
        engine.update(&[700.0, 700.0, 800.0, 810.0, 790.0, 805.0], 7);
        assert_eq!(engine.retained(), 4);

        let expected = hrv_metrics(&[800.0, 810.0, 790.0, 805.0], 50.0).unwrap();
        assert_eq!(engine.metrics(), Some(expected));
    }

    #[test]
    fn test_lost_rhythm_clears_intervals() {
        let mut engine = HrvEngine::new(&AnalysisConfig::default());
        engine.update(&[800.0, 820.0, 790.0], 4);
        let high = engine.state().high;

        let state = engine.update(&[], 1);
        assert_eq!(state.current, None);
        assert_eq!(engine.retained(), 0);
        // Session statistics are kept until disconnect
        assert_eq!(state.high, high);

        engine.reset();
        assert_eq!(engine.state(), HrvState::default());
    }
}
