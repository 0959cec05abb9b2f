//! Pipeline orchestrator
//!
//! The ingestion path is synchronous: `push_sample` demultiplexes one raw
//! tuple, publishes render notifications and forwards the accepted values to
//! the analysis actors over bounded lanes. It never waits on an actor.

use crate::actors::{self, EcgValue, EegPair, HrvUpdate};
use crate::aggregator::TemporalStateAggregator;
use crate::band_power::BandPowerAnalyzer;
use crate::cardiac::CardiacMonitor;
use crate::classifier::StatePolicy;
use crate::config::AnalysisConfig;
use crate::demux::Demultiplexer;
use crate::events::PipelineEvent;
use mindwave_core::{ChannelId, Goal, MindwaveError, MindwaveResult, RawSample};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Ingestion counters for the current session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestStats {
    /// Raw samples received
    pub received: u64,
    pub accepted_eeg: u64,
    pub accepted_ecg: u64,
    pub rejected_eeg: u64,
    pub rejected_ecg: u64,
    /// Counter discontinuities seen
    pub gaps: u64,
    /// Packets lost upstream according to the counter
    pub missing: u64,
}

struct ActiveSession {
    id: Uuid,
    eeg_lane: broadcast::Sender<EegPair>,
    ecg_lane: broadcast::Sender<EcgValue>,
    shutdown: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

/// Real-time EEG/ECG derivation pipeline for one device at a time
pub struct Pipeline {
    config: Arc<AnalysisConfig>,
    policy: Arc<dyn StatePolicy>,
    events: broadcast::Sender<PipelineEvent>,
    goal: watch::Sender<Goal>,
    demux: Demultiplexer,
    stats: IngestStats,
    session: Option<ActiveSession>,
}

/// Builder for a `Pipeline` with non-default collaborators
pub struct PipelineBuilder {
    config: AnalysisConfig,
    policy: Option<Arc<dyn StatePolicy>>,
    goal: Goal,
}

impl PipelineBuilder {
    pub fn new(config: AnalysisConfig) -> Self {
        PipelineBuilder {
            config,
            policy: None,
            goal: Goal::default(),
        }
    }

    /// Replace the configured threshold table
    pub fn policy(mut self, policy: Arc<dyn StatePolicy>) -> Self {
        self.policy = Some(policy);
        self
    }

    pub fn goal(mut self, goal: Goal) -> Self {
        self.goal = goal;
        self
    }

    pub fn build(self) -> MindwaveResult<Pipeline> {
        self.config.validate()?;

        let policy: Arc<dyn StatePolicy> = match self.policy {
            Some(policy) => policy,
            None => Arc::new(self.config.state.policy.clone()),
        };
        let (events, _) = broadcast::channel(self.config.queue_capacity);
        let (goal, _) = watch::channel(self.goal);

        Ok(Pipeline {
            config: Arc::new(self.config),
            policy,
            events,
            goal,
            demux: Demultiplexer::new(),
            stats: IngestStats::default(),
            session: None,
        })
    }
}

impl Pipeline {
    /// Pipeline with the configured threshold policy
    pub fn new(config: AnalysisConfig) -> MindwaveResult<Self> {
        PipelineBuilder::new(config).build()
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Receiver for every notification published from now on
    pub fn subscribe(&self) -> broadcast::Receiver<PipelineEvent> {
        self.events.subscribe()
    }

    pub fn is_connected(&self) -> bool {
        self.session.is_some()
    }

    pub fn session_id(&self) -> Option<Uuid> {
        self.session.as_ref().map(|s| s.id)
    }

    pub fn ingest_stats(&self) -> IngestStats {
        self.stats
    }

    pub fn goal(&self) -> Goal {
        *self.goal.borrow()
    }

    /// Select the composite score; applies from the next band-power tick
    pub fn set_goal(&mut self, goal: Goal) {
        let previous = self.goal.send_replace(goal);
        if previous != goal {
            info!(%goal, "goal changed");
        }
    }

    /// Start a device session: fresh per-session state and analysis actors
    pub async fn connect(&mut self) -> MindwaveResult<Uuid> {
        if self.session.is_some() {
            return Err(MindwaveError::AlreadyConnected);
        }

        let capacity = self.config.queue_capacity;
        let (eeg_lane, eeg_rx) = broadcast::channel(capacity);
        let (ecg_lane, ecg_rx) = broadcast::channel(capacity);
        let (hrv_lane, hrv_rx) = broadcast::channel::<HrvUpdate>(capacity);
        let (shutdown, shutdown_rx) = watch::channel(false);

        let tasks = vec![
            tokio::spawn(actors::run_band_power_actor(
                BandPowerAnalyzer::new(&self.config),
                eeg_rx,
                self.goal.subscribe(),
                shutdown_rx.clone(),
                self.events.clone(),
            )),
            tokio::spawn(actors::run_cardiac_actor(
                CardiacMonitor::new(&self.config),
                ecg_rx,
                shutdown_rx.clone(),
                self.events.clone(),
                hrv_lane,
            )),
            tokio::spawn(actors::run_state_actor(
                TemporalStateAggregator::new(&self.config.state),
                self.policy.clone(),
                hrv_rx,
                shutdown_rx,
                self.events.clone(),
            )),
        ];

        self.demux.reset();
        self.stats = IngestStats::default();

        let id = Uuid::new_v4();
        self.session = Some(ActiveSession {
            id,
            eeg_lane,
            ecg_lane,
            shutdown,
            tasks,
        });

        info!(session_id = %id, policy = self.policy.name(), "device connected");
        let _ = self.events.send(PipelineEvent::Connected { session_id: id });
        Ok(id)
    }

    /// Accept one raw tuple from the device link
    pub fn push_sample(&mut self, raw: RawSample) -> MindwaveResult<()> {
        let session = self.session.as_ref().ok_or(MindwaveError::NotConnected)?;
        self.stats.received += 1;

        let outcome = self.demux.split(&raw);

        if let Some(gap) = outcome.gap {
            self.stats.gaps += 1;
            self.stats.missing += gap.missing as u64;
            let _ = self.events.send(PipelineEvent::SequenceGap(gap));
        }

        for error in &outcome.rejected {
            warn!(error = %error, "sample rejected");
        }

        let sample = outcome.sample;
        match sample.eeg {
            Some((eeg0, eeg1)) => {
                self.stats.accepted_eeg += 1;
                for (channel, value) in [(ChannelId::Eeg0, eeg0), (ChannelId::Eeg1, eeg1)] {
                    let _ = self.events.send(PipelineEvent::Sample {
                        sequence: sample.sequence,
                        value,
                        channel,
                    });
                }
                session
                    .eeg_lane
                    .send(EegPair {
                        sequence: sample.sequence,
                        eeg0,
                        eeg1,
                    })
                    .map_err(|_| MindwaveError::ChannelClosed { channel: "eeg" })?;
            }
            None => self.stats.rejected_eeg += 1,
        }

        match sample.ecg {
            Some(value) => {
                self.stats.accepted_ecg += 1;
                let _ = self.events.send(PipelineEvent::Sample {
                    sequence: sample.sequence,
                    value,
                    channel: ChannelId::Ecg,
                });
                session
                    .ecg_lane
                    .send(EcgValue {
                        sequence: sample.sequence,
                        value,
                    })
                    .map_err(|_| MindwaveError::ChannelClosed { channel: "ecg" })?;
            }
            None => self.stats.rejected_ecg += 1,
        }

        Ok(())
    }

    /// Push a batch in order, stopping at the first error
    pub fn push_samples(&mut self, samples: &[RawSample]) -> MindwaveResult<()> {
        for sample in samples {
            self.push_sample(*sample)?;
        }
        Ok(())
    }

    /// Tear the session down. In-flight windows are discarded and no tick is
    /// published after `Disconnected`. Calling it without a session is a no-op.
    pub async fn disconnect(&mut self) {
        let Some(session) = self.session.take() else {
            return;
        };

        session.shutdown.send_replace(true);
        drop(session.eeg_lane);
        drop(session.ecg_lane);

        for task in session.tasks {
            if let Err(e) = task.await {
                warn!(error = %e, "analysis actor ended abnormally");
            }
        }

        self.demux.reset();
        debug!(stats = ?self.stats, "session ingest totals");
        info!(session_id = %session.id, "device disconnected");
        let _ = self.events.send(PipelineEvent::Disconnected { session_id: session.id });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cardiac::CardiacTick;
    use mindwave_core::{EmotionalState, HrvMetrics};
    use std::f32::consts::PI;
    use std::time::Duration;
    use tokio::time::timeout;

    fn test_config() -> AnalysisConfig {
        AnalysisConfig {
            queue_capacity: 1 << 16,
            ..AnalysisConfig::default()
        }
    }

    /// 10 Hz EEG on both channels, 75 BPM Gaussian QRS train on ECG
    fn synthetic(index: u32) -> RawSample {
        let t_ms = index as f32 * 2.0;
        let eeg = (2.0 * PI * 10.0 * t_ms / 1000.0).sin();
        let phase = (t_ms - 300.0).rem_euclid(800.0);
        let offset = phase.min(800.0 - phase);
        let ecg = (-(offset / 12.0).powi(2) / 2.0).exp();
        RawSample::new(index, eeg, 0.5 * eeg, ecg)
    }

    async fn collect_until_disconnected(rx: &mut broadcast::Receiver<PipelineEvent>) -> Vec<PipelineEvent> {
        let mut events = Vec::new();
        loop {
            match timeout(Duration::from_secs(5), rx.recv()).await {
                Ok(Ok(event)) => {
                    let done = matches!(event, PipelineEvent::Disconnected { .. });
                    events.push(event);
                    if done {
                        return events;
                    }
                }
                Ok(Err(broadcast::error::RecvError::Lagged(_))) => continue,
                Ok(Err(broadcast::error::RecvError::Closed)) | Err(_) => return events,
            }
        }
    }

    /// Push `count` samples, then wait until the actors have published `expect` matching events
    async fn run_session(pipeline: &mut Pipeline, count: u32, expect: impl Fn(&[PipelineEvent]) -> bool) -> Vec<PipelineEvent> {
        let mut rx = pipeline.subscribe();
        pipeline.connect().await.unwrap();
        for i in 0..count {
            pipeline.push_sample(synthetic(i)).unwrap();
        }

        let mut events = Vec::new();
        while !expect(&events) {
            match timeout(Duration::from_secs(5), rx.recv()).await {
                Ok(Ok(event)) => events.push(event),
                _ => break,
            }
        }
        pipeline.disconnect().await;
        events.extend(collect_until_disconnected(&mut rx).await);
        events
    }

    fn count(events: &[PipelineEvent], kind: &str) -> usize {
        events.iter().filter(|e| e.kind() == kind).count()
    }

    #[tokio::test]
    async fn test_lifecycle() {
        let mut pipeline = Pipeline::new(test_config()).unwrap();
        assert!(matches!(
            pipeline.push_sample(RawSample::new(0, 0.0, 0.0, 0.0)),
            Err(MindwaveError::NotConnected)
        ));

        let mut rx = pipeline.subscribe();
        let id = pipeline.connect().await.unwrap();
        assert_eq!(pipeline.session_id(), Some(id));
        assert!(matches!(pipeline.connect().await, Err(MindwaveError::AlreadyConnected)));

        match rx.recv().await.unwrap() {
            PipelineEvent::Connected { session_id } => assert_eq!(session_id, id),
            other => panic!("unexpected {:?}", other),
        }

        pipeline.disconnect().await;
        assert!(!pipeline.is_connected());
        match rx.recv().await.unwrap() {
            PipelineEvent::Disconnected { session_id } => assert_eq!(session_id, id),
            other => panic!("unexpected {:?}", other),
        }

        // Second disconnect is a no-op
        pipeline.disconnect().await;
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = AnalysisConfig::default();
        config.eeg.window_size = 4;
        assert!(Pipeline::new(config).is_err());
    }

    #[tokio::test]
    async fn test_render_events_and_gaps() {
        let mut pipeline = Pipeline::new(test_config()).unwrap();
        let mut rx = pipeline.subscribe();
        pipeline.connect().await.unwrap();

        pipeline.push_sample(RawSample::new(0, 0.1, 0.2, 0.3)).unwrap();
        pipeline.push_sample(RawSample::new(3, f32::NAN, 0.2, 0.4)).unwrap();

        let stats = pipeline.ingest_stats();
        assert_eq!(stats.received, 2);
        assert_eq!(stats.accepted_eeg, 1);
        assert_eq!(stats.rejected_eeg, 1);
        assert_eq!(stats.accepted_ecg, 2);
        assert_eq!(stats.gaps, 1);
        assert_eq!(stats.missing, 2);

        pipeline.disconnect().await;
        let events = collect_until_disconnected(&mut rx).await;

        let samples: Vec<(u32, ChannelId)> = events
            .iter()
            .filter_map(|e| match e {
                PipelineEvent::Sample { sequence, channel, .. } => Some((*sequence, *channel)),
                _ => None,
            })
            .collect();
        assert_eq!(
            samples,
            vec![(0, ChannelId::Eeg0), (0, ChannelId::Eeg1), (0, ChannelId::Ecg), (3, ChannelId::Ecg)]
        );
        assert!(events.iter().any(|e| matches!(
            e,
            PipelineEvent::SequenceGap(gap) if gap.missing == 2 && gap.received == 3
        )));
    }

    #[tokio::test]
    async fn test_band_power_ticks() {
        let mut pipeline = Pipeline::new(test_config()).unwrap();
        let events = run_session(&mut pipeline, 300, |e| count(e, "band_power") >= 5).await;

        let ticks: Vec<_> = events
            .iter()
            .filter_map(|e| match e {
                PipelineEvent::BandPower(tick) => Some(*tick),
                _ => None,
            })
            .collect();
        assert_eq!(ticks.len(), 5);
        assert_eq!(ticks[0].sample_index, 260);
        for tick in ticks {
            assert_eq!(tick.average().dominant(), mindwave_core::Band::Alpha);
        }
    }

    #[tokio::test]
    async fn test_cardiac_and_state_after_warmup() {
        let mut pipeline = Pipeline::new(test_config()).unwrap();
        let events = run_session(&mut pipeline, 3_000, |e| {
            count(e, "cardiac") >= 6 && count(e, "mental_state") >= 1
        })
        .await;

        let cardiac: Vec<_> = events
            .iter()
            .filter_map(|e| match e {
                PipelineEvent::Cardiac(tick) => Some(*tick),
                _ => None,
            })
            .collect();
        assert_eq!(cardiac.len(), 6);
        let bpm = cardiac.last().unwrap().bpm.displayed.unwrap();
        assert!((bpm - 75.0).abs() < 1.0);

        // A perfectly regular rhythm has no variability at all
        let states: Vec<_> = events
            .iter()
            .filter_map(|e| match e {
                PipelineEvent::MentalState { state, timestamp, .. } => Some((*state, timestamp.as_millis())),
                _ => None,
            })
            .collect();
        assert_eq!(states, vec![(EmotionalState::Stressed, 5_000)]);
    }

    #[tokio::test]
    async fn test_identical_streams_give_identical_output() {
        fn derived(events: &[PipelineEvent]) -> Vec<String> {
            events
                .iter()
                .filter(|e| matches!(e.kind(), "band_power" | "cardiac" | "mental_state"))
                .map(|e| serde_json::to_string(e).unwrap())
                .collect()
        }

        // Ticks at 260, 270, ..., 3000 and one cardiac pass per second
        let done = |e: &[PipelineEvent]| {
            count(e, "band_power") >= 275 && count(e, "cardiac") >= 6 && count(e, "mental_state") >= 1
        };

        let mut first = Pipeline::new(test_config()).unwrap();
        let a = run_session(&mut first, 3_000, done).await;
        let mut second = Pipeline::new(test_config()).unwrap();
        let b = run_session(&mut second, 3_000, done).await;

        // Interleaving between actors may differ; each stage's sequence may not
        for kind in ["band_power", "cardiac", "mental_state"] {
            let pick = |events: &[PipelineEvent]| -> Vec<String> {
                derived(events)
                    .into_iter()
                    .filter(|json| json.contains(&format!("\"event\":\"{}\"", kind)))
                    .collect()
            };
            assert_eq!(pick(&a), pick(&b), "{} differs", kind);
        }
        assert!(!derived(&a).is_empty());
    }

    /// ECG alternating 500 and 700 ms intervals: fast and highly variable
    fn irregular(index: u32) -> RawSample {
        let t_ms = index as f32 * 2.0;
        let phase = t_ms.rem_euclid(1200.0);
        let offset = [-400.0f32, 300.0, 800.0, 1500.0]
            .iter()
            .map(|beat| (phase - beat).abs())
            .fold(f32::INFINITY, f32::min);
        let ecg = (-(offset / 12.0).powi(2) / 2.0).exp();
        RawSample::new(index, 0.0, 0.0, ecg)
    }

    fn cardiac_ticks(events: &[PipelineEvent]) -> Vec<CardiacTick> {
        events
            .iter()
            .filter_map(|e| match e {
                PipelineEvent::Cardiac(tick) => Some(*tick),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_no_ticks_after_disconnect_and_clean_reconnect() {
        let mut pipeline = Pipeline::new(test_config()).unwrap();
        let mut rx = pipeline.subscribe();
        pipeline.connect().await.unwrap();
        for i in 0..3_000 {
            pipeline.push_sample(irregular(i)).unwrap();
        }

        let mut events = Vec::new();
        while count(&events, "cardiac") < 6 {
            match timeout(Duration::from_secs(5), rx.recv()).await {
                Ok(Ok(event)) => events.push(event),
                _ => break,
            }
        }
        pipeline.disconnect().await;
        events.extend(collect_until_disconnected(&mut rx).await);
        assert_eq!(events.last().map(|e| e.kind()), Some("disconnected"));
        assert!(rx.try_recv().is_err());

        let previous = cardiac_ticks(&events).last().copied().unwrap();
        assert!(previous.bpm.high.unwrap() > 80.0);
        assert!(previous.hrv.high.unwrap() > 100.0);

        // Fresh session at a steady 75 BPM: windows and session statistics start over
        let events = run_session(&mut pipeline, 1_500, |e| count(e, "cardiac") >= 3).await;
        assert_eq!(pipeline.ingest_stats().received, 1_500);

        let first_band = events.iter().find_map(|e| match e {
            PipelineEvent::BandPower(tick) => Some(tick.sample_index),
            _ => None,
        });
        assert_eq!(first_band, Some(260));

        let ticks = cardiac_ticks(&events);
        assert_eq!(ticks.len(), 3);
        assert_eq!(ticks[0].sample_index, 500);
        assert_eq!(ticks[0].bpm.high, ticks[0].bpm.displayed);
        assert_eq!(ticks[0].hrv.high, ticks[0].hrv.current);
        for tick in &ticks {
            if let Some(high) = tick.bpm.high {
                assert!((high - 75.0).abs() < 3.0, "bpm high {}", high);
            }
            if let Some(high) = tick.hrv.high {
                assert!(high < 20.0, "hrv high {}", high);
            }
        }
        let displayed = ticks[2].bpm.displayed.unwrap();
        assert!((displayed - 75.0).abs() < 1.0, "bpm {}", displayed);
    }

    #[tokio::test]
    async fn test_lost_packets_keep_heart_rate() {
        let mut pipeline = Pipeline::new(test_config()).unwrap();
        let mut rx = pipeline.subscribe();
        pipeline.connect().await.unwrap();
        // Every fifth device packet never reaches the host
        for i in (0..7_500).filter(|i| i % 5 != 4) {
            pipeline.push_sample(synthetic(i)).unwrap();
        }
        assert_eq!(pipeline.ingest_stats().gaps, 1_499);

        let mut events = Vec::new();
        while count(&events, "cardiac") < 12 {
            match timeout(Duration::from_secs(5), rx.recv()).await {
                Ok(Ok(event)) => events.push(event),
                _ => break,
            }
        }
        pipeline.disconnect().await;

        let ticks = cardiac_ticks(&events);
        assert_eq!(ticks.len(), 12);
        let last = ticks.last().unwrap();
        let displayed = last.bpm.displayed.unwrap();
        assert!((displayed - 75.0).abs() < 3.0, "bpm {}", displayed);
        // Ticks are stamped in device time, lost packets included
        assert!(last.timestamp.as_millis() > 14_900);
        let metrics = last.hrv.metrics.unwrap();
        assert!(metrics.rmssd < 10.0, "rmssd {}", metrics.rmssd);
    }

    #[tokio::test]
    async fn test_goal_and_custom_policy() {
        struct AlwaysHappy;
        impl StatePolicy for AlwaysHappy {
            fn label(&self, _: &HrvMetrics) -> EmotionalState {
                EmotionalState::Happy
            }
            fn name(&self) -> &str {
                "always-happy"
            }
        }

        let mut pipeline = PipelineBuilder::new(test_config())
            .policy(Arc::new(AlwaysHappy))
            .goal(Goal::Meditation)
            .build()
            .unwrap();
        assert_eq!(pipeline.goal(), Goal::Meditation);
        pipeline.set_goal(Goal::Sleep);

        let events = run_session(&mut pipeline, 3_000, |e| count(e, "mental_state") >= 1).await;
        let band = events.iter().find_map(|e| match e {
            PipelineEvent::BandPower(tick) => Some(*tick),
            _ => None,
        });
        assert_eq!(band.unwrap().goal, Goal::Sleep);
        assert!(events.iter().any(|e| matches!(
            e,
            PipelineEvent::MentalState { state: EmotionalState::Happy, .. }
        )));
    }

    #[tokio::test]
    async fn test_simulated_stressed_session() {
        use mindwave_core::Band;
        use mindwave_simulation::{DeviceConfig, RhythmProfile, SyntheticDevice};

        let mut device = SyntheticDevice::new(DeviceConfig {
            profile: RhythmProfile::Stressed,
            seed: Some(5),
            ..Default::default()
        })
        .unwrap();
        let samples = device.generate(6_000);

        let mut pipeline = Pipeline::new(test_config()).unwrap();
        let mut rx = pipeline.subscribe();
        pipeline.connect().await.unwrap();
        pipeline.push_samples(&samples).unwrap();

        let mut events = Vec::new();
        while count(&events, "mental_state") < 2 || count(&events, "cardiac") < 12 {
            match timeout(Duration::from_secs(10), rx.recv()).await {
                Ok(Ok(event)) => events.push(event),
                _ => break,
            }
        }
        pipeline.disconnect().await;

        let states: Vec<EmotionalState> = events
            .iter()
            .filter_map(|e| match e {
                PipelineEvent::MentalState { state, .. } => Some(*state),
                _ => None,
            })
            .collect();
        assert_eq!(states, vec![EmotionalState::Stressed, EmotionalState::Stressed]);

        let last_cardiac = events.iter().rev().find_map(|e| match e {
            PipelineEvent::Cardiac(tick) => Some(*tick),
            _ => None,
        });
        let bpm = last_cardiac.unwrap().bpm.displayed.unwrap();
        assert!((bpm - 95.0).abs() < 8.0, "bpm {}", bpm);

        let last_band = events.iter().rev().find_map(|e| match e {
            PipelineEvent::BandPower(tick) => Some(*tick),
            _ => None,
        });
        assert_eq!(last_band.unwrap().average().dominant(), Band::Beta);
    }
}
