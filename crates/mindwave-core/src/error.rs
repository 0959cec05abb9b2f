//! Error handling for the Mindwave pipeline
//!
//! Insufficient data is never an error here: windows that are still filling
//! and too-few-beats conditions surface as `None` or `EmotionalState::NoData`.
//! Errors are reserved for misuse, bad configuration and broken plumbing.

use core::fmt;

/// Result type alias for Mindwave operations
pub type MindwaveResult<T> = Result<T, MindwaveError>;

/// Error type for all Mindwave operations
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum MindwaveError {
    /// A sample value could not be accepted into a channel buffer
    InvalidSample {
        /// Channel the value belonged to
        channel: &'static str,
        /// Why it was rejected
        reason: String,
    },

    /// Configuration failed validation
    InvalidConfig {
        /// Description of the configuration error
        reason: String,
    },

    /// Sampling rate outside the supported range
    InvalidSamplingRate {
        /// Provided sampling rate
        rate: f32,
        /// Valid range description
        valid_range: String,
    },

    /// Operation requires an active device session
    NotConnected,

    /// A session is already active
    AlreadyConnected,

    /// An internal channel between pipeline units was closed
    ChannelClosed {
        /// Name of the closed lane
        channel: &'static str,
    },

    /// A numerical stage failed on well-formed input
    Processing {
        /// Stage that failed
        stage: &'static str,
        /// Failure description
        reason: String,
    },

    /// Serialization/deserialization error
    Serialization {
        /// Serialization error description
        reason: String,
    },

    /// Filesystem error while loading or exporting
    Io {
        /// I/O error description
        reason: String,
    },
}

impl fmt::Display for MindwaveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MindwaveError::InvalidSample { channel, reason } => {
                write!(f, "Invalid sample on {}: {}", channel, reason)
            }
            MindwaveError::InvalidConfig { reason } => {
                write!(f, "Invalid configuration: {}", reason)
            }
            MindwaveError::InvalidSamplingRate { rate, valid_range } => {
                write!(f, "Invalid sampling rate {}Hz, valid range: {}", rate, valid_range)
            }
            MindwaveError::NotConnected => write!(f, "No device session is active"),
            MindwaveError::AlreadyConnected => write!(f, "A device session is already active"),
            MindwaveError::ChannelClosed { channel } => {
                write!(f, "Pipeline lane '{}' closed", channel)
            }
            MindwaveError::Processing { stage, reason } => {
                write!(f, "{} failed: {}", stage, reason)
            }
            MindwaveError::Serialization { reason } => {
                write!(f, "Serialization error: {}", reason)
            }
            MindwaveError::Io { reason } => write!(f, "I/O error: {}", reason),
        }
    }
}

impl std::error::Error for MindwaveError {}

impl From<std::io::Error> for MindwaveError {
    fn from(err: std::io::Error) -> Self {
        MindwaveError::Io {
            reason: err.to_string(),
        }
    }
}

/// Convenience macro for creating configuration errors
#[macro_export]
macro_rules! config_error {
    ($($arg:tt)*) => {
        $crate::error::MindwaveError::InvalidConfig {
            reason: format!($($arg)*),
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = MindwaveError::InvalidSamplingRate {
            rate: 12.0,
            valid_range: "100-2000Hz".to_string(),
        };
        let display = format!("{}", error);
        assert!(display.contains("Invalid sampling rate"));
        assert!(display.contains("12"));
        assert!(display.contains("100-2000Hz"));
    }

    #[test]
    fn test_config_error_macro() {
        let error = config_error!("window size {} too small", 3);
        assert_eq!(
            error,
            MindwaveError::InvalidConfig {
                reason: "window size 3 too small".to_string()
            }
        );
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing.json");
        let error: MindwaveError = io.into();
        assert!(matches!(error, MindwaveError::Io { .. }));
        assert!(error.to_string().contains("missing.json"));
    }
}
