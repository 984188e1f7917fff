//! Fixed device lists.

use cuegrid_common::error::{CueError, CueResult};
use cuegrid_output_core::{default_audio_device, default_display, AudioDevice, DeviceProvider, DisplayInfo};

/// Device provider returning a configured list.
#[derive(Debug, Clone)]
pub struct HeadlessDevices {
    pub audio: Vec<AudioDevice>,
    pub displays: Vec<DisplayInfo>,
    /// Simulate an unreachable audio server.
    pub fail_audio: bool,
}

impl HeadlessDevices {
    /// One default audio device and an operator display plus a projector.
    pub fn dual_display() -> Self {
        Self {
            audio: vec![default_audio_device()],
            displays: vec![
                default_display(),
                DisplayInfo {
                    index: 1,
                    name: "projector".to_string(),
                    x: 1920,
                    primary: false,
                    ..default_display()
                },
            ],
            fail_audio: false,
        }
    }
}

impl Default for HeadlessDevices {
    fn default() -> Self {
        Self {
            audio: vec![default_audio_device()],
            displays: vec![default_display()],
            fail_audio: false,
        }
    }
}

impl DeviceProvider for HeadlessDevices {
    fn audio_outputs(&self) -> CueResult<Vec<AudioDevice>> {
        tracing::debug!("Enumerating headless audio outputs");
        if self.fail_audio {
            return Err(CueError::device("headless audio server unavailable"));
        }
        Ok(self.audio.clone())
    }

    fn displays(&self) -> CueResult<Vec<DisplayInfo>> {
        tracing::debug!("Enumerating headless displays");
        Ok(self.displays.clone())
    }
}

#[cfg(test)]
mod tests {
    use cuegrid_output_core::{audio_outputs_or_default, select_secondary_display};

    use super::*;

    #[test]
    fn test_dual_display_has_secondary() {
        let devices = HeadlessDevices::dual_display();
        let displays = devices.displays().unwrap();
        assert_eq!(select_secondary_display(&displays, None).unwrap().name, "projector");
    }

    #[test]
    fn test_failing_audio_falls_back() {
        let devices = HeadlessDevices {
            fail_audio: true,
            ..HeadlessDevices::default()
        };
        let audio = audio_outputs_or_default(&devices);
        assert_eq!(audio.len(), 1);
        assert!(audio[0].is_default);
    }
}
