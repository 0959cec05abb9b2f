//! Sample demultiplexer
//!
//! Splits each raw tuple into per-channel scalars in arrival order, rejects
//! non-finite values before they reach any buffer, and reports counter
//! discontinuities. It never drops, reorders or synthesizes samples.

use mindwave_core::{ChannelId, DemuxedSample, MindwaveError, RawSample};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Discontinuity in the device packet counter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceGap {
    /// Counter value that should have arrived next
    pub expected: u32,
    /// Counter value that did arrive
    pub received: u32,
    /// Packets lost upstream; zero for a rewind
    pub missing: u32,
    /// The counter moved backwards (device restart or reordering upstream)
    pub rewind: bool,
}

/// Result of splitting one raw sample
#[derive(Debug, Clone, PartialEq)]
pub struct DemuxOutcome {
    pub sample: DemuxedSample,
    pub gap: Option<SequenceGap>,
    /// One entry per rejected channel value
    pub rejected: Vec<MindwaveError>,
}

/// Stateless apart from the last seen counter
#[derive(Debug, Clone, Default)]
pub struct Demultiplexer {
    expected: Option<u32>,
}

impl Demultiplexer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget the counter history, e.g. on reconnect
    pub fn reset(&mut self) {
        self.expected = None;
    }

    /// Split one raw sample
    pub fn split(&mut self, raw: &RawSample) -> DemuxOutcome {
        let gap = self.track_sequence(raw.sequence);
        let mut rejected = Vec::new();

        let eeg0 = check_value(raw, ChannelId::Eeg0, &mut rejected);
        let eeg1 = check_value(raw, ChannelId::Eeg1, &mut rejected);
        let ecg = check_value(raw, ChannelId::Ecg, &mut rejected);

        // Both EEG windows advance together or not at all
        let eeg = match (eeg0, eeg1) {
            (Some(a), Some(b)) => Some((a, b)),
            _ => None,
        };

        DemuxOutcome {
            sample: DemuxedSample {
                sequence: raw.sequence,
                eeg,
                ecg,
            },
            gap,
            rejected,
        }
    }

    fn track_sequence(&mut self, received: u32) -> Option<SequenceGap> {
        let gap = match self.expected {
            Some(expected) if expected != received => {
                let forward = received.wrapping_sub(expected);
                let rewind = forward > u32::MAX / 2;
                let gap = SequenceGap {
                    expected,
                    received,
                    missing: if rewind { 0 } else { forward },
                    rewind,
                };
                warn!(
                    expected = gap.expected,
                    received = gap.received,
                    missing = gap.missing,
                    rewind = gap.rewind,
                    "sequence discontinuity"
                );
                Some(gap)
            }
            _ => None,
        };

        self.expected = Some(received.wrapping_add(1));
        gap
    }
}

fn check_value(raw: &RawSample, channel: ChannelId, rejected: &mut Vec<MindwaveError>) -> Option<f32> {
    let value = raw.value(channel);
    if value.is_finite() {
        Some(value)
    } else {
        rejected.push(MindwaveError::InvalidSample {
            channel: channel.label(),
            reason: format!("non-finite value {} at sequence {}", value, raw.sequence),
        });
        None
    }
}
