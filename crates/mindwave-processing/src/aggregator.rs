//! Temporal state aggregator
//!
//! Holds the displayed state at `NoData` through the warm-up, then commits a
//! majority vote over the trailing window at most once per commit interval.

use crate::config::StateConfig;
use mindwave_core::{EmotionalState, SessionTimestamp};
use std::collections::VecDeque;
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregatorPhase {
    /// No session
    Idle,
    WarmingUp,
    Stable,
}

/// Output of one observation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Observation {
    /// Displayed state after this observation
    pub output: EmotionalState,
    /// A new output was committed on this observation
    pub committed: bool,
}

#[derive(Debug, Clone)]
pub struct TemporalStateAggregator {
    warmup: Duration,
    vote_window: Duration,
    commit_interval: Duration,
    connected_at: Option<SessionTimestamp>,
    history: VecDeque<(EmotionalState, SessionTimestamp)>,
    last_commit: Option<SessionTimestamp>,
    output: EmotionalState,
}

impl TemporalStateAggregator {
    pub fn new(config: &StateConfig) -> Self {
        TemporalStateAggregator {
            warmup: Duration::from_millis(config.warmup_ms),
            vote_window: Duration::from_millis(config.vote_window_ms),
            commit_interval: Duration::from_millis(config.commit_interval_ms),
            connected_at: None,
            history: VecDeque::new(),
            last_commit: None,
            output: EmotionalState::NoData,
        }
    }

    /// Start a session; the warm-up runs from `now`
    pub fn connect(&mut self, now: SessionTimestamp) {
        self.clear();
        self.connected_at = Some(now);
    }

    /// End the session, dropping all history immediately
    pub fn disconnect(&mut self) {
        self.clear();
        self.connected_at = None;
    }

    fn clear(&mut self) {
        self.history.clear();
        self.last_commit = None;
        self.output = EmotionalState::NoData;
    }

    pub fn phase(&self, now: SessionTimestamp) -> AggregatorPhase {
        match self.connected_at {
            None => AggregatorPhase::Idle,
            Some(start) if now.saturating_duration_since(start) < self.warmup => AggregatorPhase::WarmingUp,
            Some(_) => AggregatorPhase::Stable,
        }
    }

    /// Record one classifier output taken at `now`
    pub fn observe(&mut self, state: EmotionalState, now: SessionTimestamp) -> Observation {
        let phase = self.phase(now);
        if phase == AggregatorPhase::Idle {
            return Observation {
                output: EmotionalState::NoData,
                committed: false,
            };
        }

        self.history.push_back((state, now));
        let horizon = now.saturating_sub(self.vote_window);
        while self.history.front().is_some_and(|(_, t)| *t < horizon) {
            self.history.pop_front();
        }

        if phase == AggregatorPhase::WarmingUp {
            return Observation {
                output: EmotionalState::NoData,
                committed: false,
            };
        }

        let due = match self.last_commit {
            None => true,
            Some(last) => now.saturating_duration_since(last) >= self.commit_interval,
        };
        if !due {
            return Observation {
                output: self.output,
                committed: false,
            };
        }

        let winner = majority(self.history.iter().map(|(s, _)| *s));
        let previous = self.output;
        self.output = winner;
        self.last_commit = Some(now);

        if previous != winner {
            info!(state = winner.as_str(), at = %now, "mental state committed");
        } else {
            debug!(state = winner.as_str(), at = %now, "mental state unchanged");
        }

        Observation {
            output: winner,
            committed: true,
        }
    }

    pub fn output(&self) -> EmotionalState {
        self.output
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }
}

/// Most frequent state; among equal counts the one seen first wins
pub fn majority(states: impl Iterator<Item = EmotionalState>) -> EmotionalState {
    let mut counts = [0usize; EmotionalState::ALL.len()];
    let mut first_seen = [usize::MAX; EmotionalState::ALL.len()];
    for (position, state) in states.enumerate() {
        let i = state.index();
        counts[i] += 1;
        if first_seen[i] == usize::MAX {
            first_seen[i] = position;
        }
    }

    let mut best: Option<usize> = None;
    for i in 0..counts.len() {
        if counts[i] == 0 {
            continue;
        }
        best = match best {
            Some(b) if counts[b] > counts[i] => Some(b),
            Some(b) if counts[b] == counts[i] && first_seen[b] < first_seen[i] => Some(b),
            _ => Some(i),
        };
    }

    best.map_or(EmotionalState::NoData, |i| EmotionalState::ALL[i])
}
