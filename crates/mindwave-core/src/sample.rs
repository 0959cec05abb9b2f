//! Raw device samples and per-channel scalars

use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of channels delivered by the device
pub const CHANNEL_COUNT: usize = 3;

/// One multiplexed tuple as delivered by the device link
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RawSample {
    /// Device packet counter, wraps at `u32::MAX`
    pub sequence: u32,
    pub eeg0: f32,
    pub eeg1: f32,
    pub ecg: f32,
}

impl RawSample {
    pub fn new(sequence: u32, eeg0: f32, eeg1: f32, ecg: f32) -> Self {
        Self {
            sequence,
            eeg0,
            eeg1,
            ecg,
        }
    }

    /// Value carried for `channel`
    pub fn value(&self, channel: ChannelId) -> f32 {
        match channel {
            ChannelId::Eeg0 => self.eeg0,
            ChannelId::Eeg1 => self.eeg1,
            ChannelId::Ecg => self.ecg,
        }
    }
}

/// Physical channel of the device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ChannelId {
    /// Frontal EEG electrode
    Eeg0,
    /// Parietal EEG electrode
    Eeg1,
    /// Cardiac lead
    Ecg,
}

impl ChannelId {
    pub const ALL: [ChannelId; CHANNEL_COUNT] = [ChannelId::Eeg0, ChannelId::Eeg1, ChannelId::Ecg];

    pub fn is_eeg(&self) -> bool {
        matches!(self, ChannelId::Eeg0 | ChannelId::Eeg1)
    }

    pub fn label(&self) -> &'static str {
        match self {
            ChannelId::Eeg0 => "eeg0",
            ChannelId::Eeg1 => "eeg1",
            ChannelId::Ecg => "ecg",
        }
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelId::Eeg0 => write!(f, "EEG Channel 1 (Frontal)"),
            ChannelId::Eeg1 => write!(f, "EEG Channel 2 (Parietal)"),
            ChannelId::Ecg => write!(f, "ECG (Cardiac)"),
        }
    }
}

/// Scalars split out of a `RawSample`, tagged with the shared counter.
///
/// A channel is `None` when its value was rejected; the two EEG channels are
/// always both present or both absent so their windows stay in lock-step.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DemuxedSample {
    pub sequence: u32,
    pub eeg: Option<(f32, f32)>,
    pub ecg: Option<f32>,
}
