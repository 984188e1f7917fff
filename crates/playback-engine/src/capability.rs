//! Per-kind playback behaviour.
//!
//! Each media kind knows how to start, pause, resume and stop itself on the
//! shared [`Outputs`]. The orchestrator only decides *whether* to call them
//! (duplicate checks, toggling, eviction) and dispatches by kind.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use cuegrid_common::error::{CueError, CueResult};
use cuegrid_output_core::{AudioOutput, AudioSink, OpenedAudio, VisualSurface};
use cuegrid_show_model::{ElementSettings, MediaKind, MediaSlot, SlotContent, SlotKey, TextContent};

use crate::mirror::DualOutputSynchronizer;
use crate::state::{MainOccupant, MediaStateTracker};

/// Everything playback writes to: the surfaces and the state describing
/// them. Owned by the orchestrator.
pub struct Outputs {
    pub primary: Box<dyn VisualSurface>,
    pub mirror: DualOutputSynchronizer,
    pub tracker: MediaStateTracker<Box<dyn AudioSink>>,
    pub audio: Arc<dyn AudioOutput>,
    pub audio_device: Option<usize>,
    /// Text currently shown on the overlay layer.
    pub overlay: Option<TextContent>,
}

impl Outputs {
    pub fn new(
        primary: Box<dyn VisualSurface>,
        audio: Arc<dyn AudioOutput>,
        drift_threshold: Duration,
    ) -> Self {
        Self {
            primary,
            mirror: DualOutputSynchronizer::new(drift_threshold),
            tracker: MediaStateTracker::new(),
            audio,
            audio_device: None,
            overlay: None,
        }
    }

    /// Source path of the primary video, used to gate mirroring.
    pub fn primary_source(&self) -> Option<std::path::PathBuf> {
        self.primary.video_source()
    }

    /// Drop an audio channel's sink and unmount its container.
    pub(crate) fn release_channel(&mut self, key: &SlotKey) -> Option<Duration> {
        let channel = self.tracker.remove_audio_channel(key)?;
        let position = channel.surface.position();
        let container = channel.container;
        drop(channel);
        self.audio.release(container);
        Some(position)
    }
}

impl std::fmt::Debug for Outputs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Outputs")
            .field("mirror", &self.mirror)
            .field("main", &self.tracker.main_occupant())
            .field("audio", &self.tracker.audio_keys())
            .field("audio_device", &self.audio_device)
            .finish_non_exhaustive()
    }
}

/// Playback behaviour of one media kind.
pub trait PlaybackCapability: Send + Sync {
    fn kind(&self) -> MediaKind;

    /// Start `slot` from `from`. Eviction of the previous occupant is the
    /// caller's job.
    fn start(
        &self,
        out: &mut Outputs,
        slot: &MediaSlot,
        settings: &ElementSettings,
        from: Duration,
    ) -> CueResult<()>;

    /// Returns whether anything was paused.
    fn pause(&self, _out: &mut Outputs, _key: &SlotKey) -> CueResult<bool> {
        Ok(false)
    }

    /// Returns whether anything was resumed.
    fn resume(&self, _out: &mut Outputs, _key: &SlotKey) -> CueResult<bool> {
        Ok(false)
    }

    /// Stop and tear down. A mid-playback position is cached for the next
    /// cold start.
    fn stop(&self, out: &mut Outputs, key: &SlotKey) -> CueResult<()>;

    fn is_active(&self, out: &Outputs, key: &SlotKey) -> bool;

    fn is_paused(&self, _out: &Outputs, _key: &SlotKey) -> bool {
        false
    }
}

pub struct VideoPlayback;
pub struct AudioPlayback;
pub struct ImagePlayback;
pub struct TextPlayback;

/// Capability for a media kind.
pub fn capability_for(kind: MediaKind) -> &'static dyn PlaybackCapability {
    match kind {
        MediaKind::Video => &VideoPlayback,
        MediaKind::Audio => &AudioPlayback,
        MediaKind::Image => &ImagePlayback,
        MediaKind::Text => &TextPlayback,
    }
}

fn require_path(slot: &MediaSlot) -> CueResult<&Path> {
    slot.media_path()
        .ok_or_else(|| CueError::unsupported(format!("{} has no media file", slot.key)))
}

/// Keep the first error but run every step.
fn first_error(results: impl IntoIterator<Item = CueResult<()>>) -> CueResult<()> {
    results.into_iter().fold(Ok(()), |acc, r| acc.and(r))
}

fn is_mid_playback(position: Duration, duration: Option<Duration>) -> bool {
    !position.is_zero() && duration.map_or(true, |total| position < total)
}

impl PlaybackCapability for VideoPlayback {
    fn kind(&self) -> MediaKind {
        MediaKind::Video
    }

    fn start(
        &self,
        out: &mut Outputs,
        slot: &MediaSlot,
        settings: &ElementSettings,
        from: Duration,
    ) -> CueResult<()> {
        let path = require_path(slot)?;
        tracing::info!(slot = %slot.key, path = %path.display(), ?from, "Starting video");

        out.primary.load_video(path)?;
        out.primary.apply_settings(settings)?;
        if !from.is_zero() {
            out.primary.seek(from)?;
        }
        out.primary.play()?;
        out.tracker.set_main_media(MainOccupant {
            key: slot.key,
            kind: MediaKind::Video,
            path: Some(path.to_path_buf()),
        });

        out.mirror.load_video(path, settings);
        out.mirror.seek(Some(path), from);
        out.mirror.play(Some(path));
        Ok(())
    }

    fn pause(&self, out: &mut Outputs, key: &SlotKey) -> CueResult<bool> {
        if !self.is_active(out, key) || out.tracker.is_video_paused() {
            return Ok(false);
        }
        let position = out.primary.position();
        out.primary.pause()?;
        out.tracker.set_video_paused(true);
        if let Some(path) = out.primary_source() {
            out.tracker.remember_position(*key, &path, position);
            out.mirror.pause(Some(&path));
        }
        tracing::info!(slot = %key, ?position, "Paused video");
        Ok(true)
    }

    fn resume(&self, out: &mut Outputs, key: &SlotKey) -> CueResult<bool> {
        if !self.is_active(out, key) || !out.tracker.is_video_paused() {
            return Ok(false);
        }
        out.primary.play()?;
        out.tracker.set_video_paused(false);
        let source = out.primary_source();
        out.mirror.play(source.as_deref());
        tracing::info!(slot = %key, position = ?out.primary.position(), "Resumed video");
        Ok(true)
    }

    fn stop(&self, out: &mut Outputs, key: &SlotKey) -> CueResult<()> {
        if !self.is_active(out, key) {
            return Ok(());
        }
        let position = out.primary.position();
        let duration = out.primary.duration();
        let source = out.primary_source();

        out.tracker.clear_main_media();
        if let Some(path) = &source {
            if is_mid_playback(position, duration) {
                out.tracker.remember_position(*key, path, position);
            }
        }
        out.mirror.stop(source.as_deref());
        out.mirror.clear_visual();
        tracing::info!(slot = %key, ?position, "Stopped video");

        first_error([out.primary.stop(), out.primary.clear_visual()])
    }

    fn is_active(&self, out: &Outputs, key: &SlotKey) -> bool {
        out.tracker
            .main_occupant()
            .is_some_and(|m| m.key == *key && m.kind == MediaKind::Video)
    }

    fn is_paused(&self, out: &Outputs, key: &SlotKey) -> bool {
        self.is_active(out, key) && out.tracker.is_video_paused()
    }
}

fn prepare_sink(
    sink: &mut dyn AudioSink,
    settings: &ElementSettings,
    from: Duration,
) -> CueResult<()> {
    sink.apply_settings(settings)?;
    if !from.is_zero() {
        sink.seek(from)?;
    }
    sink.play()
}

impl PlaybackCapability for AudioPlayback {
    fn kind(&self) -> MediaKind {
        MediaKind::Audio
    }

    fn start(
        &self,
        out: &mut Outputs,
        slot: &MediaSlot,
        settings: &ElementSettings,
        from: Duration,
    ) -> CueResult<()> {
        let path = require_path(slot)?;
        let OpenedAudio {
            mut sink,
            container,
        } = out.audio.open(path, out.audio_device)?;

        if let Err(e) = prepare_sink(sink.as_mut(), settings, from) {
            drop(sink);
            out.audio.release(container);
            return Err(e);
        }

        tracing::info!(slot = %slot.key, path = %path.display(), ?from, ?container, "Starting audio channel");
        if let Some(replaced) = out.tracker.add_audio_channel(slot.key, path, sink, container) {
            let stale = replaced.container;
            drop(replaced);
            out.audio.release(stale);
        }
        Ok(())
    }

    fn pause(&self, out: &mut Outputs, key: &SlotKey) -> CueResult<bool> {
        if out.tracker.is_audio_paused(key) {
            return Ok(false);
        }
        let Some(sink) = out.tracker.audio_channel_mut(key) else {
            return Ok(false);
        };
        let position = sink.position();
        sink.pause()?;
        out.tracker.set_audio_paused(key, true);
        if let Some(path) = out.tracker.audio_channel_path(key).map(Path::to_path_buf) {
            out.tracker.remember_position(*key, &path, position);
        }
        tracing::info!(slot = %key, ?position, "Paused audio channel");
        Ok(true)
    }

    fn resume(&self, out: &mut Outputs, key: &SlotKey) -> CueResult<bool> {
        if !out.tracker.is_audio_paused(key) {
            return Ok(false);
        }
        let Some(sink) = out.tracker.audio_channel_mut(key) else {
            return Ok(false);
        };
        sink.play()?;
        out.tracker.set_audio_paused(key, false);
        tracing::info!(slot = %key, "Resumed audio channel");
        Ok(true)
    }

    fn stop(&self, out: &mut Outputs, key: &SlotKey) -> CueResult<()> {
        let Some(path) = out.tracker.audio_channel_path(key).map(Path::to_path_buf) else {
            return Ok(());
        };
        let duration = out.tracker.try_get_audio_channel(key).and_then(|s| s.duration());
        let stopped = out
            .tracker
            .audio_channel_mut(key)
            .map_or(Ok(()), |sink| sink.stop());

        if let Some(position) = out.release_channel(key) {
            // `stop` rewinds, so fall back to the cached pause position.
            let position = if position.is_zero() {
                out.tracker.get_slot_position(key)
            } else {
                position
            };
            if is_mid_playback(position, duration) {
                out.tracker.remember_position(*key, &path, position);
            }
        }
        tracing::info!(slot = %key, path = %path.display(), "Stopped audio channel");
        stopped
    }

    fn is_active(&self, out: &Outputs, key: &SlotKey) -> bool {
        out.tracker.is_audio_media(key)
    }

    fn is_paused(&self, out: &Outputs, key: &SlotKey) -> bool {
        out.tracker.is_audio_paused(key)
    }
}

impl PlaybackCapability for ImagePlayback {
    fn kind(&self) -> MediaKind {
        MediaKind::Image
    }

    fn start(
        &self,
        out: &mut Outputs,
        slot: &MediaSlot,
        settings: &ElementSettings,
        _from: Duration,
    ) -> CueResult<()> {
        let path = require_path(slot)?;
        tracing::info!(slot = %slot.key, path = %path.display(), "Showing image");

        out.primary.show_image(path)?;
        out.primary.apply_settings(settings)?;
        out.tracker.set_main_media(MainOccupant {
            key: slot.key,
            kind: MediaKind::Image,
            path: None,
        });
        out.mirror.show_image(path, settings);
        Ok(())
    }

    fn stop(&self, out: &mut Outputs, key: &SlotKey) -> CueResult<()> {
        if !self.is_active(out, key) {
            return Ok(());
        }
        out.tracker.clear_main_media();
        out.mirror.clear_visual();
        tracing::info!(slot = %key, "Cleared image");
        out.primary.clear_visual()
    }

    fn is_active(&self, out: &Outputs, key: &SlotKey) -> bool {
        out.tracker
            .main_occupant()
            .is_some_and(|m| m.key == *key && m.kind == MediaKind::Image)
    }
}

impl PlaybackCapability for TextPlayback {
    fn kind(&self) -> MediaKind {
        MediaKind::Text
    }

    fn start(
        &self,
        out: &mut Outputs,
        slot: &MediaSlot,
        _settings: &ElementSettings,
        _from: Duration,
    ) -> CueResult<()> {
        let SlotContent::Text(text) = &slot.content else {
            return Err(CueError::unsupported(format!("{} holds no text", slot.key)));
        };
        tracing::info!(slot = %slot.key, "Showing text overlay");

        out.primary.show_text(text)?;
        out.tracker.set_main_media(MainOccupant {
            key: slot.key,
            kind: MediaKind::Text,
            path: None,
        });
        out.overlay = Some(text.clone());
        out.mirror.show_text(text);
        Ok(())
    }

    fn stop(&self, out: &mut Outputs, key: &SlotKey) -> CueResult<()> {
        if !self.is_active(out, key) {
            return Ok(());
        }
        out.tracker.clear_main_media();
        out.overlay = None;
        out.mirror.clear_text();
        tracing::info!(slot = %key, "Cleared text overlay");
        out.primary.clear_text()
    }

    fn is_active(&self, out: &Outputs, key: &SlotKey) -> bool {
        out.tracker
            .main_occupant()
            .is_some_and(|m| m.key == *key && m.kind == MediaKind::Text)
    }
}

#[cfg(test)]
mod tests {
    use cuegrid_output_headless::{HeadlessAudio, HeadlessSurface, MediaLibrary};

    use super::*;

    struct Rig {
        surface: HeadlessSurface,
        audio: HeadlessAudio,
        out: Outputs,
    }

    fn rig() -> Rig {
        let library = MediaLibrary::new();
        library.add_video("a.mp4", Duration::from_secs(30));
        library.add_audio("bg.mp3", Duration::from_secs(60));
        library.add_image("still.png");
        let surface = HeadlessSurface::new("primary", library.clone());
        let audio = HeadlessAudio::new(library);
        let out = Outputs::new(
            Box::new(surface.clone()),
            Arc::new(audio.clone()),
            Duration::from_millis(100),
        );
        Rig {
            surface,
            audio,
            out,
        }
    }

    fn slot(key: SlotKey, content: SlotContent) -> MediaSlot {
        MediaSlot::new(key, content)
    }

    #[test]
    fn test_video_pause_caches_position() {
        let mut r = rig();
        let key = SlotKey::grid(0, 0);
        let video = slot(key, SlotContent::Video { path: "a.mp4".into() });
        let cap = capability_for(MediaKind::Video);

        cap.start(&mut r.out, &video, &ElementSettings::default(), Duration::ZERO)
            .unwrap();
        assert!(cap.is_active(&r.out, &key));
        r.surface.advance(Duration::from_secs(5));

        assert!(cap.pause(&mut r.out, &key).unwrap());
        assert!(cap.is_paused(&r.out, &key));
        assert_eq!(r.out.tracker.get_slot_position(&key), Duration::from_secs(5));
        assert!(!cap.pause(&mut r.out, &key).unwrap());

        assert!(cap.resume(&mut r.out, &key).unwrap());
        assert!(r.surface.is_playing());
    }

    #[test]
    fn test_video_stop_clears_primary_and_remembers() {
        let mut r = rig();
        let key = SlotKey::grid(0, 0);
        let video = slot(key, SlotContent::Video { path: "a.mp4".into() });
        let cap = capability_for(MediaKind::Video);

        cap.start(&mut r.out, &video, &ElementSettings::default(), Duration::from_secs(2))
            .unwrap();
        assert_eq!(r.surface.position(), Duration::from_secs(2));
        r.surface.advance(Duration::from_secs(1));

        cap.stop(&mut r.out, &key).unwrap();
        assert!(!cap.is_active(&r.out, &key));
        assert!(!r.out.tracker.is_file_already_playing(Path::new("a.mp4")));
        assert_eq!(
            r.out.tracker.get_file_resume_position(Path::new("a.mp4")),
            Some(Duration::from_secs(3))
        );
        assert_eq!(r.surface.video_source(), None);
    }

    #[test]
    fn test_audio_lifecycle_releases_container() {
        let mut r = rig();
        let key = SlotKey::grid(0, 0);
        let bg = slot(key, SlotContent::Audio { path: "bg.mp3".into() });
        let cap = capability_for(MediaKind::Audio);

        let settings = ElementSettings {
            volume: 0.5,
            ..ElementSettings::default()
        };
        cap.start(&mut r.out, &bg, &settings, Duration::ZERO).unwrap();
        let sink = r.audio.sink_for(Path::new("bg.mp3")).unwrap();
        assert!(sink.playing);
        assert_eq!(sink.volume, 0.5);

        r.audio.advance(Duration::from_secs(4));
        assert!(cap.pause(&mut r.out, &key).unwrap());
        cap.stop(&mut r.out, &key).unwrap();

        assert!(r.audio.sinks().is_empty());
        assert!(!r.out.tracker.is_file_already_playing(Path::new("bg.mp3")));
        assert_eq!(r.out.tracker.get_slot_position(&key), Duration::from_secs(4));
    }

    #[test]
    fn test_audio_open_failure_leaves_no_channel() {
        let mut r = rig();
        let key = SlotKey::grid(0, 0);
        let missing = slot(key, SlotContent::Audio { path: "gone.mp3".into() });
        let cap = capability_for(MediaKind::Audio);

        assert!(cap
            .start(&mut r.out, &missing, &ElementSettings::default(), Duration::ZERO)
            .is_err());
        assert!(!cap.is_active(&r.out, &key));
        assert_eq!(r.out.tracker.active_files().count(), 0);
    }

    #[test]
    fn test_image_and_text_are_untimed() {
        let mut r = rig();
        let image_key = SlotKey::grid(0, 1);
        let image = slot(image_key, SlotContent::Image { path: "still.png".into() });
        let image_cap = capability_for(MediaKind::Image);

        image_cap
            .start(&mut r.out, &image, &ElementSettings::default(), Duration::ZERO)
            .unwrap();
        assert!(!image_cap.pause(&mut r.out, &image_key).unwrap());
        assert_eq!(r.out.tracker.current_visual_content(), Some(image_key));
        assert_eq!(r.out.tracker.active_files().count(), 0);

        image_cap.stop(&mut r.out, &image_key).unwrap();
        let text_key = SlotKey::grid(1, 1);
        let text = slot(text_key, SlotContent::Text(TextContent::new("Act II")));
        let text_cap = capability_for(MediaKind::Text);
        text_cap
            .start(&mut r.out, &text, &ElementSettings::default(), Duration::ZERO)
            .unwrap();
        assert_eq!(r.surface.text().unwrap().text, "Act II");
        text_cap.stop(&mut r.out, &text_key).unwrap();
        assert!(r.surface.text().is_none());
        assert!(r.out.overlay.is_none());
    }
}
