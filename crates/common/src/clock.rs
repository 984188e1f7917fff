//! Clock and timing utilities for playback positions.
//!
//! Positions travel through the engine as [`Duration`] offsets from the
//! start of a media file. This module provides:
//! - Display formatting for position labels
//! - Slider values derived from position and duration
//! - Drift measurement between the primary and mirrored outputs

use std::time::Duration;

/// Format a position for a position label, e.g. `01:05 / 03:20`.
///
/// Hours are only shown when either side reaches one hour. An unknown
/// duration renders as `--:--`.
pub fn format_position(position: Duration, duration: Option<Duration>) -> String {
    let long = position.as_secs() >= 3600 || duration.is_some_and(|d| d.as_secs() >= 3600);
    let total = match duration {
        Some(d) => format_timestamp(d, long),
        None if long => "--:--:--".to_string(),
        None => "--:--".to_string(),
    };
    format!("{} / {}", format_timestamp(position, long), total)
}

/// Format a single timestamp as `mm:ss` or `hh:mm:ss`.
pub fn format_timestamp(value: Duration, with_hours: bool) -> String {
    let secs = value.as_secs();
    if with_hours {
        format!("{:02}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
    } else {
        format!("{:02}:{:02}", secs / 60, secs % 60)
    }
}

/// Slider value in `[0.0, 1.0]` for a position within a duration.
/// Unknown or zero duration yields `0.0`.
pub fn slider_fraction(position: Duration, duration: Option<Duration>) -> f64 {
    match duration {
        Some(d) if !d.is_zero() => (position.as_secs_f64() / d.as_secs_f64()).clamp(0.0, 1.0),
        _ => 0.0,
    }
}

/// Convert a slider fraction back into a position within `duration`.
pub fn position_from_fraction(fraction: f64, duration: Duration) -> Duration {
    duration.mul_f64(fraction.clamp(0.0, 1.0))
}

/// Drift measurement between two outputs playing the same file.
#[derive(Debug, Clone, Copy)]
pub struct DriftMeasurement {
    /// Position of the reference (primary) output.
    pub reference: Duration,
    /// Position of the measured (secondary) output.
    pub measured: Duration,
}

impl DriftMeasurement {
    /// Drift in milliseconds (positive = measured is ahead).
    pub fn drift_ms(&self) -> f64 {
        self.drift_ns() as f64 / 1_000_000.0
    }

    /// Drift in nanoseconds (positive = measured is ahead).
    pub fn drift_ns(&self) -> i128 {
        self.measured.as_nanos() as i128 - self.reference.as_nanos() as i128
    }

    /// Whether drift strictly exceeds an acceptable threshold.
    pub fn exceeds_threshold_ms(&self, threshold_ms: f64) -> bool {
        self.drift_ms().abs() > threshold_ms
    }
}
