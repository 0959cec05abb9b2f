//! Mindwave-Core: Foundation types for EEG/ECG session analysis
//!
//! Sample and channel types, derived physiological values, the session
//! clock and the fixed-capacity ring buffer shared by every analysis unit.

pub mod error;
pub mod ring_buffer;
pub mod sample;
pub mod timestamp;
pub mod types;

pub use error::{MindwaveError, MindwaveResult};
pub use ring_buffer::RingBuffer;
pub use sample::*;
pub use timestamp::SessionTimestamp;
pub use types::*;
