//! Analysis actors
//!
//! Each actor is a sequential task that exclusively owns its buffers and
//! reads one broadcast lane in arrival order. A lagging lane drops its oldest
//! messages; the actor logs the loss and carries on. Every actor stops when
//! the shutdown flag flips and never publishes once it has.

use crate::aggregator::TemporalStateAggregator;
use crate::band_power::BandPowerAnalyzer;
use crate::cardiac::CardiacMonitor;
use crate::classifier::{classify, StatePolicy};
use crate::events::PipelineEvent;
use mindwave_core::{Goal, HrvMetrics, SessionTimestamp};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, watch};
use tracing::{debug, warn};

/// Lock-step EEG values of one sample
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EegPair {
    pub sequence: u32,
    pub eeg0: f32,
    pub eeg1: f32,
}

/// One accepted ECG value
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EcgValue {
    pub sequence: u32,
    pub value: f32,
}

/// Classifier input forwarded by the cardiac actor
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HrvUpdate {
    pub timestamp: SessionTimestamp,
    pub metrics: Option<HrvMetrics>,
}

fn is_shut_down(shutdown: &watch::Receiver<bool>) -> bool {
    *shutdown.borrow()
}

fn publish(events: &broadcast::Sender<PipelineEvent>, shutdown: &watch::Receiver<bool>, event: PipelineEvent) {
    if is_shut_down(shutdown) {
        debug!(kind = event.kind(), "discarding result produced during teardown");
        return;
    }
    // No subscribers is fine
    let _ = events.send(event);
}

pub async fn run_band_power_actor(
    mut analyzer: BandPowerAnalyzer,
    mut lane: broadcast::Receiver<EegPair>,
    goal: watch::Receiver<Goal>,
    mut shutdown: watch::Receiver<bool>,
    events: broadcast::Sender<PipelineEvent>,
) {
    debug!("band power actor started");

    loop {
        tokio::select! {
            biased;

            _ = shutdown.changed() => break,

            received = lane.recv() => match received {
                Ok(pair) => {
                    let current_goal = *goal.borrow();
                    if current_goal != analyzer.goal() {
                        analyzer.set_goal(current_goal);
                    }

                    match analyzer.push(pair.eeg0, pair.eeg1) {
                        Ok(Some(tick)) => publish(&events, &shutdown, PipelineEvent::BandPower(tick)),
                        Ok(None) => {}
                        Err(e) => warn!(sequence = pair.sequence, error = %e, "band power tick failed"),
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "EEG lane lagged, oldest samples dropped");
                }
                Err(RecvError::Closed) => break,
            },
        }
    }

    debug!("band power actor stopped");
}

pub async fn run_cardiac_actor(
    mut monitor: CardiacMonitor,
    mut lane: broadcast::Receiver<EcgValue>,
    mut shutdown: watch::Receiver<bool>,
    events: broadcast::Sender<PipelineEvent>,
    classifier_lane: broadcast::Sender<HrvUpdate>,
) {
    debug!("cardiac actor started");

    loop {
        tokio::select! {
            biased;

            _ = shutdown.changed() => break,

            received = lane.recv() => match received {
                Ok(sample) => {
                    if let Some(tick) = monitor.push(sample.sequence, sample.value) {
                        if is_shut_down(&shutdown) {
                            break;
                        }
                        let _ = classifier_lane.send(HrvUpdate {
                            timestamp: tick.timestamp,
                            metrics: tick.hrv.metrics,
                        });
                        publish(&events, &shutdown, PipelineEvent::Cardiac(tick));
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "ECG lane lagged, oldest samples dropped");
                }
                Err(RecvError::Closed) => break,
            },
        }
    }

    debug!("cardiac actor stopped");
}

pub async fn run_state_actor(
    mut aggregator: TemporalStateAggregator,
    policy: Arc<dyn StatePolicy>,
    mut lane: broadcast::Receiver<HrvUpdate>,
    mut shutdown: watch::Receiver<bool>,
    events: broadcast::Sender<PipelineEvent>,
) {
    debug!(policy = policy.name(), "state actor started");
    aggregator.connect(SessionTimestamp::ZERO);

    loop {
        tokio::select! {
            biased;

            _ = shutdown.changed() => break,

            received = lane.recv() => match received {
                Ok(update) => {
                    let state = classify(policy.as_ref(), update.metrics.as_ref());
                    let observation = aggregator.observe(state, update.timestamp);
                    if observation.committed {
                        publish(&events, &shutdown, PipelineEvent::MentalState {
                            state: observation.output,
                            timestamp: update.timestamp,
                            metrics: update.metrics,
                        });
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "classifier lane lagged");
                }
                Err(RecvError::Closed) => break,
            },
        }
    }

    aggregator.disconnect();
    debug!("state actor stopped");
}
