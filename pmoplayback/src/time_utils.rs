//! Time conversion utilities for the playback session.
//!
//! Player positions are exchanged as floating point seconds, while seeks are
//! expressed as a [`MediaTime`] (an integer value over a timescale), the same
//! way platform players count media time.

/// Timescale used for seeks: one tick per second.
pub const SEEK_TIMESCALE: i32 = 1;

/// Rational media time: `value / timescale` seconds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MediaTime {
    pub value: i64,
    pub timescale: i32,
}

impl MediaTime {
    pub const ZERO: MediaTime = MediaTime {
        value: 0,
        timescale: SEEK_TIMESCALE,
    };

    /// Builds a media time from a count of seconds.
    ///
    /// The fractional part below `1 / timescale` is truncated, so with the
    /// seek timescale of 1 a position never rounds past the requested time.
    /// Returns `None` for NaN, infinite or non-positive timescale input.
    ///
    /// # Examples
    /// ```
    /// # use pmoplayback::time_utils::MediaTime;
    /// assert_eq!(MediaTime::from_seconds(42.9, 1).unwrap().seconds(), 42.0);
    /// assert!(MediaTime::from_seconds(f64::NAN, 1).is_none());
    /// ```
    pub fn from_seconds(seconds: f64, timescale: i32) -> Option<Self> {
        if !seconds.is_finite() || timescale <= 0 {
            return None;
        }
        let value = (seconds * timescale as f64).trunc() as i64;
        Some(Self { value, timescale })
    }

    /// Returns the time in seconds.
    pub fn seconds(&self) -> f64 {
        self.value as f64 / self.timescale as f64
    }
}

/// Clamps a target position into `[0, duration]`.
///
/// A duration of zero (unknown or not yet loaded) pins every target to 0.
pub fn clamp_position(target: f64, duration: f64) -> f64 {
    let ceiling = if duration.is_finite() && duration > 0.0 {
        duration
    } else {
        0.0
    };
    if !target.is_finite() {
        return 0.0;
    }
    target.max(0.0).min(ceiling)
}

/// Sanitizes a duration reported by a player: unknown, NaN, infinite or
/// negative durations all map to `None`.
pub fn valid_duration(duration: Option<f64>) -> Option<f64> {
    duration.filter(|d| d.is_finite() && *d > 0.0)
}

/// Formats a duration in seconds as HH:MM:SS.
///
/// # Examples
/// ```
/// # use pmoplayback::time_utils::format_hhmmss;
/// assert_eq!(format_hhmmss(0), "00:00:00");
/// assert_eq!(format_hhmmss(3661), "01:01:01");
/// ```
pub fn format_hhmmss(seconds: u64) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;
    format!("{:02}:{:02}:{:02}", hours, minutes, secs)
}

/// Formats a floating point position as HH:MM:SS, rounding to the nearest
/// second. Negative and non-finite values format as zero.
pub fn format_hhmmss_f64(seconds: f64) -> String {
    if !seconds.is_finite() || seconds <= 0.0 {
        return format_hhmmss(0);
    }
    format_hhmmss(seconds.round() as u64)
}
