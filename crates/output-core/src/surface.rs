//! Visual output surfaces.

use std::path::{Path, PathBuf};
use std::time::Duration;

use cuegrid_common::error::CueResult;
use cuegrid_show_model::{ElementSettings, TextContent};

/// What the visual layer of a surface currently shows.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum VisualContent {
    #[default]
    Empty,
    Video(PathBuf),
    Image(PathBuf),
}

/// A display surface with one visual layer (video or image) and a text
/// overlay layer on top of it.
///
/// Swapping the visual layer never touches the overlay, and the overlay can
/// be cleared without touching the visual layer.
pub trait VisualSurface: Send {
    /// Load a video into the visual layer, replacing any image. The video
    /// is left paused at zero.
    fn load_video(&mut self, path: &Path) -> CueResult<()>;

    /// Show a still image in the visual layer, replacing any video.
    fn show_image(&mut self, path: &Path) -> CueResult<()>;

    /// Empty the visual layer.
    fn clear_visual(&mut self) -> CueResult<()>;

    fn show_text(&mut self, text: &TextContent) -> CueResult<()>;

    fn clear_text(&mut self) -> CueResult<()>;

    fn play(&mut self) -> CueResult<()>;

    fn pause(&mut self) -> CueResult<()>;

    /// Stop the loaded video and rewind it; the source stays loaded.
    fn stop(&mut self) -> CueResult<()>;

    fn seek(&mut self, position: Duration) -> CueResult<()>;

    fn apply_settings(&mut self, settings: &ElementSettings) -> CueResult<()>;

    /// Current video position; zero when no video is loaded.
    fn position(&self) -> Duration;

    /// Duration of the loaded video, if known.
    fn duration(&self) -> Option<Duration>;

    /// Whether the loaded video played through to its end and has not been
    /// played, seeked, stopped or replaced since. Backends may report a
    /// position slightly short of the duration at that point.
    fn has_ended(&self) -> bool;

    fn content(&self) -> VisualContent;

    /// Path of the loaded video, used to decide whether two surfaces show
    /// the same thing.
    fn video_source(&self) -> Option<PathBuf> {
        match self.content() {
            VisualContent::Video(path) => Some(path),
            _ => None,
        }
    }
}
