//! Notifications published by the pipeline to its collaborators

use crate::band_power::BandPowerTick;
use crate::cardiac::CardiacTick;
use crate::demux::SequenceGap;
use mindwave_core::{ChannelId, EmotionalState, HrvMetrics, SessionTimestamp};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Fire-and-forget pipeline output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PipelineEvent {
    Connected {
        session_id: Uuid,
    },
    /// One accepted channel value for live plotting
    Sample {
        sequence: u32,
        value: f32,
        channel: ChannelId,
    },
    SequenceGap(SequenceGap),
    BandPower(BandPowerTick),
    Cardiac(CardiacTick),
    /// Committed output of the temporal aggregator
    MentalState {
        state: EmotionalState,
        timestamp: SessionTimestamp,
        /// Features of the classifier tick that triggered the commit
        metrics: Option<HrvMetrics>,
    },
    Disconnected {
        session_id: Uuid,
    },
}

impl PipelineEvent {
    /// Short name for logs
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineEvent::Connected { .. } => "connected",
            PipelineEvent::Sample { .. } => "sample",
            PipelineEvent::SequenceGap(_) => "sequence_gap",
            PipelineEvent::BandPower(_) => "band_power",
            PipelineEvent::Cardiac(_) => "cardiac",
            PipelineEvent::MentalState { .. } => "mental_state",
            PipelineEvent::Disconnected { .. } => "disconnected",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_wire_format() {
        let event = PipelineEvent::MentalState {
            state: EmotionalState::MildStress,
            timestamp: SessionTimestamp::from_millis(5_000),
            metrics: None,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"event\":\"mental_state\""));
        assert!(json.contains("\"mild_stress\""));
        assert_eq!(event.kind(), "mental_state");

        let gap = PipelineEvent::SequenceGap(SequenceGap {
            expected: 4,
            received: 9,
            missing: 5,
            rewind: false,
        });
        let json = serde_json::to_string(&gap).unwrap();
        let restored: PipelineEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, gap);
    }
}
