//! Mindwave-Processing: real-time EEG/ECG derivation pipeline
//!
//! Band power from two EEG channels, heart rate and HRV from the ECG lead,
//! and a temporally smoothed mental-state label, computed by independent
//! actors fed from a non-blocking ingestion path.

pub mod actors;
pub mod aggregator;
pub mod band_power;
pub mod bpm;
pub mod cardiac;
pub mod classifier;
pub mod config;
pub mod demux;
pub mod events;
pub mod hrv;
pub mod peak;
pub mod pipeline;
pub mod session;
pub mod spectral;
pub mod stats;

pub use aggregator::{AggregatorPhase, TemporalStateAggregator};
pub use band_power::{BandPowerAnalyzer, BandPowerTick};
pub use bpm::BpmEstimator;
pub use cardiac::{CardiacMonitor, CardiacTick};
pub use classifier::{classify, StatePolicy, ThresholdPolicy};
pub use config::{AnalysisConfig, AnalysisProfile, BandRange};
pub use demux::{Demultiplexer, SequenceGap};
pub use events::PipelineEvent;
pub use hrv::{hrv_metrics, HrvEngine};
pub use peak::{BeatDetection, PeakDetector, SequenceClock};
pub use pipeline::{IngestStats, Pipeline, PipelineBuilder};
pub use session::{SessionRecorder, SessionSummary};
pub use spectral::SpectralEstimator;
