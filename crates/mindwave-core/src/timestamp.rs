//! Session-relative timestamps derived from the sample clock
//!
//! Every timestamp in a session is measured from the moment the device
//! connected, counted in accepted samples rather than wall-clock time. A
//! fixed input stream therefore always produces the same timeline.

use core::fmt;
use core::ops::Add;
use core::time::Duration;
use serde::{Deserialize, Serialize};

/// Microsecond-resolution offset from the start of a device session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(transparent)]
pub struct SessionTimestamp {
    /// Microseconds since the session connected
    micros: u64,
}

impl SessionTimestamp {
    /// Session start
    pub const ZERO: SessionTimestamp = SessionTimestamp { micros: 0 };

    /// Create a timestamp from microseconds since connect
    #[inline]
    pub const fn from_micros(micros: u64) -> Self {
        Self { micros }
    }

    /// Create a timestamp from milliseconds since connect
    #[inline]
    pub const fn from_millis(millis: u64) -> Self {
        Self {
            micros: millis * 1_000,
        }
    }

    /// Timestamp of the `index`-th sample of a stream sampled at `rate_hz`
    pub fn from_sample_index(index: u64, rate_hz: f32) -> Self {
        if rate_hz <= 0.0 {
            return Self::ZERO;
        }
        let micros = (index as f64 * 1_000_000.0 / rate_hz as f64).round();
        Self {
            micros: micros as u64,
        }
    }

    /// Microseconds since connect
    #[inline]
    pub const fn as_micros(&self) -> u64 {
        self.micros
    }

    /// Milliseconds since connect
    #[inline]
    pub const fn as_millis(&self) -> u64 {
        self.micros / 1_000
    }

    /// Fractional seconds since connect
    #[inline]
    pub fn as_secs_f64(&self) -> f64 {
        self.micros as f64 / 1_000_000.0
    }

    /// Time elapsed since `earlier`, zero if `earlier` is in the future
    #[inline]
    pub fn saturating_duration_since(&self, earlier: SessionTimestamp) -> Duration {
        Duration::from_micros(self.micros.saturating_sub(earlier.micros))
    }

    /// Step back by `duration`, clamping at session start
    #[inline]
    pub fn saturating_sub(&self, duration: Duration) -> SessionTimestamp {
        let delta = u64::try_from(duration.as_micros()).unwrap_or(u64::MAX);
        SessionTimestamp::from_micros(self.micros.saturating_sub(delta))
    }
}

impl Add<Duration> for SessionTimestamp {
    type Output = SessionTimestamp;

    #[inline]
    fn add(self, duration: Duration) -> SessionTimestamp {
        let delta = u64::try_from(duration.as_micros()).unwrap_or(u64::MAX);
        SessionTimestamp::from_micros(self.micros.saturating_add(delta))
    }
}

impl fmt::Display for SessionTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let secs = self.micros / 1_000_000;
        let millis = (self.micros % 1_000_000) / 1_000;
        write!(f, "{}.{:03}s", secs, millis)
    }
}
