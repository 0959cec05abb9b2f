//! Mindwave-Simulation: synthetic EEG/ECG headset
//!
//! Generates realistic multiplexed samples for development and testing:
//! band-limited EEG rhythms on two channels and a jittered ECG lead, with
//! optional packet loss and artifacts, streamed in real time.

pub mod device;
pub mod rhythm;
pub mod stream;

pub use device::{DeviceConfig, NoiseConfig, SyntheticDevice};
pub use rhythm::{RhythmProfile, BAND_FREQUENCIES};
pub use stream::{start_device_stream, DeviceStream, StreamCommand, StreamConfig, StreamHandle, StreamStats};
