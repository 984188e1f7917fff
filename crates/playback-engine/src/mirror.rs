//! Dual-output synchronization.
//!
//! The secondary output follows the primary. Transport commands are only
//! forwarded while both surfaces have the same video loaded; content that
//! differs is never forced into sync. A failing secondary never stops the
//! show: every command is caught and logged here.

use std::path::Path;
use std::time::Duration;

use cuegrid_common::clock::DriftMeasurement;
use cuegrid_common::error::CueResult;
use cuegrid_output_core::VisualSurface;
use cuegrid_show_model::{ElementSettings, TextContent};

/// Result of a drift check on one video tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DriftCheck {
    /// No secondary attached.
    Detached,
    /// Secondary shows something else.
    Mismatched,
    /// Drift within tolerance, left alone.
    Within { drift_ms: f64 },
    /// Secondary was snapped to the primary position.
    Snapped { drift_ms: f64 },
    /// The snap command failed.
    Failed,
}

pub struct DualOutputSynchronizer {
    secondary: Option<Box<dyn VisualSurface>>,
    threshold_ms: f64,
    snaps: u64,
    failures: u64,
}

impl DualOutputSynchronizer {
    pub fn new(threshold: Duration) -> Self {
        Self {
            secondary: None,
            threshold_ms: threshold.as_secs_f64() * 1000.0,
            snaps: 0,
            failures: 0,
        }
    }

    pub fn is_attached(&self) -> bool {
        self.secondary.is_some()
    }

    /// Number of drift snaps performed since creation.
    pub fn snaps(&self) -> u64 {
        self.snaps
    }

    /// Number of secondary commands that failed and were swallowed.
    pub fn failures(&self) -> u64 {
        self.failures
    }

    /// Attach a secondary output and bring it to the primary's content.
    pub fn attach(
        &mut self,
        surface: Box<dyn VisualSurface>,
        primary: &dyn VisualSurface,
        playing: bool,
        text: Option<&TextContent>,
        settings: &ElementSettings,
    ) {
        tracing::info!("Attaching secondary output");
        self.secondary = Some(surface);
        match primary.content() {
            cuegrid_output_core::VisualContent::Video(path) => {
                self.load_video(&path, settings);
                self.seek(Some(&path), primary.position());
                if playing {
                    self.play(Some(&path));
                }
            }
            cuegrid_output_core::VisualContent::Image(path) => self.show_image(&path, settings),
            cuegrid_output_core::VisualContent::Empty => {}
        }
        if let Some(text) = text {
            self.show_text(text);
        }
    }

    pub fn detach(&mut self) -> Option<Box<dyn VisualSurface>> {
        tracing::info!("Detaching secondary output");
        self.secondary.take()
    }

    // Content commands: these make the secondary match the primary.

    pub fn load_video(&mut self, path: &Path, settings: &ElementSettings) {
        self.guard("load_video", |s| {
            s.load_video(path)?;
            s.apply_settings(settings)
        });
    }

    pub fn show_image(&mut self, path: &Path, settings: &ElementSettings) {
        self.guard("show_image", |s| {
            s.show_image(path)?;
            s.apply_settings(settings)
        });
    }

    pub fn clear_visual(&mut self) {
        self.guard("clear_visual", |s| s.clear_visual());
    }

    pub fn show_text(&mut self, text: &TextContent) {
        self.guard("show_text", |s| s.show_text(text));
    }

    pub fn clear_text(&mut self) {
        self.guard("clear_text", |s| s.clear_text());
    }

    pub fn apply_settings(&mut self, settings: &ElementSettings) {
        self.guard("apply_settings", |s| s.apply_settings(settings));
    }

    // Transport commands: forwarded only when the sources match.

    pub fn play(&mut self, primary_source: Option<&Path>) {
        self.guard_matching("play", primary_source, |s| s.play());
    }

    pub fn pause(&mut self, primary_source: Option<&Path>) {
        self.guard_matching("pause", primary_source, |s| s.pause());
    }

    pub fn stop(&mut self, primary_source: Option<&Path>) {
        self.guard_matching("stop", primary_source, |s| s.stop());
    }

    pub fn restart(&mut self, primary_source: Option<&Path>) {
        self.guard_matching("restart", primary_source, |s| {
            s.seek(Duration::ZERO)?;
            s.play()
        });
    }

    pub fn seek(&mut self, primary_source: Option<&Path>, position: Duration) {
        self.guard_matching("seek", primary_source, |s| s.seek(position));
    }

    /// Snap the secondary to the primary when they drifted apart by more
    /// than the threshold.
    pub fn check_drift(
        &mut self,
        primary_source: Option<&Path>,
        primary_position: Duration,
    ) -> DriftCheck {
        let Some(secondary) = self.secondary.as_mut() else {
            return DriftCheck::Detached;
        };
        if primary_source.is_none() || secondary.video_source().as_deref() != primary_source {
            return DriftCheck::Mismatched;
        }

        let measurement = DriftMeasurement {
            reference: primary_position,
            measured: secondary.position(),
        };
        let drift_ms = measurement.drift_ms();
        if !measurement.exceeds_threshold_ms(self.threshold_ms) {
            return DriftCheck::Within { drift_ms };
        }

        match secondary.seek(primary_position) {
            Ok(()) => {
                self.snaps += 1;
                tracing::debug!(drift_ms, "Snapped secondary output to primary");
                DriftCheck::Snapped { drift_ms }
            }
            Err(e) => {
                self.failures += 1;
                tracing::warn!(error = %e, drift_ms, "Secondary drift correction failed");
                DriftCheck::Failed
            }
        }
    }

    /// Primary video reached its end. With looping both restart from zero
    /// (the primary is restarted by the caller); otherwise only the
    /// secondary is stopped.
    pub fn on_primary_ended(&mut self, primary_source: Option<&Path>, looping: bool) {
        if looping {
            self.restart(primary_source);
        } else {
            self.stop(primary_source);
        }
    }

    fn guard_matching(
        &mut self,
        action: &'static str,
        primary_source: Option<&Path>,
        command: impl FnOnce(&mut dyn VisualSurface) -> CueResult<()>,
    ) -> bool {
        let matches = match (&self.secondary, primary_source) {
            (Some(secondary), Some(source)) => {
                secondary.video_source().as_deref() == Some(source)
            }
            _ => false,
        };
        if !matches {
            tracing::trace!(action, "Secondary source differs, not mirroring");
            return false;
        }
        self.guard(action, command)
    }

    fn guard(
        &mut self,
        action: &'static str,
        command: impl FnOnce(&mut dyn VisualSurface) -> CueResult<()>,
    ) -> bool {
        let Some(secondary) = self.secondary.as_mut() else {
            return false;
        };
        match command(secondary.as_mut()) {
            Ok(()) => true,
            Err(e) => {
                self.failures += 1;
                tracing::warn!(action, error = %e, "Secondary output command failed");
                false
            }
        }
    }
}

impl std::fmt::Debug for DualOutputSynchronizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DualOutputSynchronizer")
            .field("attached", &self.is_attached())
            .field("threshold_ms", &self.threshold_ms)
            .field("snaps", &self.snaps)
            .field("failures", &self.failures)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use cuegrid_output_core::VisualContent;
    use cuegrid_output_headless::{HeadlessSurface, MediaLibrary, SurfaceCall};

    use super::*;

    fn surfaces() -> (HeadlessSurface, HeadlessSurface) {
        let library = MediaLibrary::new();
        library.add_video("a.mp4", Duration::from_secs(60));
        library.add_video("b.mp4", Duration::from_secs(60));
        (
            HeadlessSurface::new("primary", library.clone()),
            HeadlessSurface::new("secondary", library),
        )
    }

    fn attached() -> (HeadlessSurface, HeadlessSurface, DualOutputSynchronizer) {
        let (mut primary, secondary) = surfaces();
        primary.load_video(Path::new("a.mp4")).unwrap();
        let mut sync = DualOutputSynchronizer::new(Duration::from_millis(100));
        sync.attach(
            Box::new(secondary.clone()),
            &primary,
            false,
            None,
            &ElementSettings::default(),
        );
        (primary, secondary, sync)
    }

    #[test]
    fn test_attach_loads_primary_source() {
        let (_, secondary, sync) = attached();
        assert!(sync.is_attached());
        assert_eq!(
            secondary.content(),
            VisualContent::Video(PathBuf::from("a.mp4"))
        );
        assert!(!secondary.is_playing());
    }

    #[test]
    fn test_transport_requires_matching_source() {
        let (_, secondary, mut sync) = attached();
        sync.play(Some(Path::new("a.mp4")));
        assert!(secondary.is_playing());

        secondary.clear_calls();
        sync.pause(Some(Path::new("b.mp4")));
        sync.stop(None);
        assert!(secondary.calls().is_empty());
        assert!(secondary.is_playing());
    }

    #[test]
    fn test_drift_within_threshold_is_left_alone() {
        let (_, secondary, mut sync) = attached();
        secondary.force_position(Duration::from_millis(10_100));
        secondary.clear_calls();

        let check = sync.check_drift(Some(Path::new("a.mp4")), Duration::from_secs(10));
        assert!(matches!(check, DriftCheck::Within { .. }));
        assert!(secondary.calls().is_empty());
        assert_eq!(secondary.position(), Duration::from_millis(10_100));
    }

    #[test]
    fn test_drift_beyond_threshold_snaps_once() {
        let (_, secondary, mut sync) = attached();
        secondary.force_position(Duration::from_millis(10_250));
        secondary.clear_calls();

        let primary_position = Duration::from_secs(10);
        let check = sync.check_drift(Some(Path::new("a.mp4")), primary_position);
        assert!(matches!(check, DriftCheck::Snapped { drift_ms } if drift_ms > 100.0));
        assert_eq!(secondary.calls(), vec![SurfaceCall::Seek(primary_position)]);
        assert_eq!(secondary.position(), primary_position);
        assert_eq!(sync.snaps(), 1);

        let again = sync.check_drift(Some(Path::new("a.mp4")), primary_position);
        assert!(matches!(again, DriftCheck::Within { .. }));
        assert_eq!(sync.snaps(), 1);
    }

    #[test]
    fn test_failing_secondary_is_swallowed() {
        let (_, secondary, mut sync) = attached();
        secondary.set_failing(true);
        sync.play(Some(Path::new("a.mp4")));
        sync.clear_visual();
        assert_eq!(sync.failures(), 2);
    }

    #[test]
    fn test_primary_end_without_loop_stops_secondary() {
        let (_, secondary, mut sync) = attached();
        sync.play(Some(Path::new("a.mp4")));
        secondary.force_position(Duration::from_secs(30));

        sync.on_primary_ended(Some(Path::new("a.mp4")), false);
        assert!(!secondary.is_playing());
        assert_eq!(secondary.position(), Duration::ZERO);

        sync.on_primary_ended(Some(Path::new("a.mp4")), true);
        assert!(secondary.is_playing());
    }

    #[test]
    fn test_detached_sync_is_inert() {
        let mut sync = DualOutputSynchronizer::new(Duration::from_millis(100));
        sync.play(Some(Path::new("a.mp4")));
        assert_eq!(
            sync.check_drift(Some(Path::new("a.mp4")), Duration::ZERO),
            DriftCheck::Detached
        );
        assert!(sync.detach().is_none());
    }
}
