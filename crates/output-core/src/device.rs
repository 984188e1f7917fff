//! Audio-output and display enumeration.

use cuegrid_common::error::CueResult;
use serde::{Deserialize, Serialize};

/// An audio output device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioDevice {
    /// Index passed back to [`crate::AudioOutput::open`].
    pub index: usize,
    pub name: String,
    pub is_default: bool,
}

/// Information about a connected display.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DisplayInfo {
    pub index: usize,
    /// Display name/identifier.
    pub name: String,
    /// Resolution in physical pixels.
    pub width: u32,
    pub height: u32,
    /// Position in the virtual desktop (pixels).
    pub x: i32,
    pub y: i32,
    /// Scale factor (for example 1.0, 1.25, 2.0).
    pub scale_factor: f64,
    /// Whether this display hosts the operator window.
    pub primary: bool,
}

impl DisplayInfo {
    /// Logical resolution (physical / scale).
    pub fn logical_width(&self) -> u32 {
        (self.width as f64 / self.scale_factor) as u32
    }

    /// Logical resolution (physical / scale).
    pub fn logical_height(&self) -> u32 {
        (self.height as f64 / self.scale_factor) as u32
    }
}

/// Enumerates devices. Implementations may fail, e.g. when the audio
/// server is restarting.
pub trait DeviceProvider: Send + Sync {
    fn audio_outputs(&self) -> CueResult<Vec<AudioDevice>>;

    fn displays(&self) -> CueResult<Vec<DisplayInfo>>;
}

/// Entry used when audio enumeration fails or returns nothing.
pub fn default_audio_device() -> AudioDevice {
    AudioDevice {
        index: 0,
        name: "System default".to_string(),
        is_default: true,
    }
}

/// Entry used when display enumeration fails or returns nothing.
pub fn default_display() -> DisplayInfo {
    DisplayInfo {
        index: 0,
        name: "default".to_string(),
        width: 1920,
        height: 1080,
        x: 0,
        y: 0,
        scale_factor: 1.0,
        primary: true,
    }
}

/// Audio outputs, falling back to a single default entry.
pub fn audio_outputs_or_default(provider: &dyn DeviceProvider) -> Vec<AudioDevice> {
    match provider.audio_outputs() {
        Ok(devices) if !devices.is_empty() => devices,
        Ok(_) => vec![default_audio_device()],
        Err(e) => {
            tracing::warn!(error = %e, "Audio device enumeration failed, using system default");
            vec![default_audio_device()]
        }
    }
}

/// Displays, falling back to a single default entry.
pub fn displays_or_default(provider: &dyn DeviceProvider) -> Vec<DisplayInfo> {
    match provider.displays() {
        Ok(displays) if !displays.is_empty() => displays,
        Ok(_) => vec![default_display()],
        Err(e) => {
            tracing::warn!(error = %e, "Display enumeration failed, using default display");
            vec![default_display()]
        }
    }
}

/// Pick the display for the mirrored output.
///
/// An explicit index wins when it exists; otherwise the first non-primary
/// display. `None` when only the operator display is connected.
pub fn select_secondary_display(
    displays: &[DisplayInfo],
    requested: Option<usize>,
) -> Option<&DisplayInfo> {
    if let Some(index) = requested {
        if let Some(display) = displays.iter().find(|d| d.index == index) {
            return Some(display);
        }
        tracing::warn!(index, "Requested secondary display not connected");
    }
    displays.iter().find(|d| !d.primary)
}
