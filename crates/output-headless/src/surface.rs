//! Simulated visual surface.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use cuegrid_common::error::{CueError, CueResult};
use cuegrid_output_core::{VisualContent, VisualSurface};
use cuegrid_show_model::{ElementSettings, TextContent};

use crate::library::MediaLibrary;
use crate::lock;

/// Commands a surface received, recorded for inspection.
#[derive(Debug, Clone, PartialEq)]
pub enum SurfaceCall {
    LoadVideo(PathBuf),
    ShowImage(PathBuf),
    ClearVisual,
    ShowText(String),
    ClearText,
    Play,
    Pause,
    Stop,
    Seek(Duration),
    ApplySettings,
}

#[derive(Debug, Default)]
struct SurfaceState {
    content: VisualContent,
    text: Option<TextContent>,
    playing: bool,
    position: Duration,
    duration: Option<Duration>,
    ended: bool,
    /// How far short of the duration the clock stops at end of media.
    end_shortfall: Duration,
    settings: ElementSettings,
    failing: bool,
    calls: Vec<SurfaceCall>,
}

/// A visual surface whose clock only moves on [`HeadlessSurface::advance`].
///
/// Clones share state, so a test can keep one handle while the engine owns
/// another.
#[derive(Debug, Clone)]
pub struct HeadlessSurface {
    label: &'static str,
    library: MediaLibrary,
    state: Arc<Mutex<SurfaceState>>,
}

impl HeadlessSurface {
    pub fn new(label: &'static str, library: MediaLibrary) -> Self {
        Self {
            label,
            library,
            state: Arc::default(),
        }
    }

    /// Advance playback. Returns `true` when the video reached its end
    /// during this step.
    pub fn advance(&self, elapsed: Duration) -> bool {
        let mut state = lock(&self.state);
        if !state.playing {
            return false;
        }
        let step = elapsed.mul_f64(state.settings.speed.max(0.0));
        state.position += step;
        match state.duration {
            Some(total) if state.position >= total => {
                state.position = total.saturating_sub(state.end_shortfall);
                state.playing = false;
                state.ended = true;
                true
            }
            _ => false,
        }
    }

    /// Make every subsequent command fail, as if the window were torn down.
    pub fn set_failing(&self, failing: bool) {
        lock(&self.state).failing = failing;
    }

    /// Stop the clock `shortfall` before the duration at end of media, as
    /// real decoders often do.
    pub fn set_end_shortfall(&self, shortfall: Duration) {
        lock(&self.state).end_shortfall = shortfall;
    }

    /// Move the clock without going through a seek command.
    pub fn force_position(&self, position: Duration) {
        lock(&self.state).position = position;
    }

    pub fn is_playing(&self) -> bool {
        lock(&self.state).playing
    }

    pub fn text(&self) -> Option<TextContent> {
        lock(&self.state).text.clone()
    }

    pub fn settings(&self) -> ElementSettings {
        lock(&self.state).settings
    }

    pub fn calls(&self) -> Vec<SurfaceCall> {
        lock(&self.state).calls.clone()
    }

    pub fn clear_calls(&self) {
        lock(&self.state).calls.clear();
    }

    fn command(
        &self,
        call: SurfaceCall,
        apply: impl FnOnce(&mut SurfaceState),
    ) -> CueResult<()> {
        let mut state = lock(&self.state);
        if state.failing {
            return Err(CueError::surface(format!("{} surface is gone", self.label)));
        }
        apply(&mut state);
        state.calls.push(call);
        Ok(())
    }
}

impl VisualSurface for HeadlessSurface {
    fn load_video(&mut self, path: &Path) -> CueResult<()> {
        let duration = self.library.duration_of(path);
        self.command(SurfaceCall::LoadVideo(path.to_path_buf()), |s| {
            s.content = VisualContent::Video(path.to_path_buf());
            s.playing = false;
            s.ended = false;
            s.position = Duration::ZERO;
            s.duration = duration;
        })
    }

    fn show_image(&mut self, path: &Path) -> CueResult<()> {
        self.command(SurfaceCall::ShowImage(path.to_path_buf()), |s| {
            s.content = VisualContent::Image(path.to_path_buf());
            s.playing = false;
            s.ended = false;
            s.position = Duration::ZERO;
            s.duration = None;
        })
    }

    fn clear_visual(&mut self) -> CueResult<()> {
        self.command(SurfaceCall::ClearVisual, |s| {
            s.content = VisualContent::Empty;
            s.playing = false;
            s.ended = false;
            s.position = Duration::ZERO;
            s.duration = None;
        })
    }

    fn show_text(&mut self, text: &TextContent) -> CueResult<()> {
        self.command(SurfaceCall::ShowText(text.text.clone()), |s| {
            s.text = Some(text.clone());
        })
    }

    fn clear_text(&mut self) -> CueResult<()> {
        self.command(SurfaceCall::ClearText, |s| s.text = None)
    }

    fn play(&mut self) -> CueResult<()> {
        self.command(SurfaceCall::Play, |s| {
            s.playing = matches!(s.content, VisualContent::Video(_));
            s.ended = false;
        })
    }

    fn pause(&mut self) -> CueResult<()> {
        self.command(SurfaceCall::Pause, |s| s.playing = false)
    }

    fn stop(&mut self) -> CueResult<()> {
        self.command(SurfaceCall::Stop, |s| {
            s.playing = false;
            s.ended = false;
            s.position = Duration::ZERO;
        })
    }

    fn seek(&mut self, position: Duration) -> CueResult<()> {
        self.command(SurfaceCall::Seek(position), |s| {
            s.ended = false;
            s.position = match s.duration {
                Some(total) => position.min(total),
                None => position,
            };
        })
    }

    fn apply_settings(&mut self, settings: &ElementSettings) -> CueResult<()> {
        let settings = *settings;
        self.command(SurfaceCall::ApplySettings, |s| s.settings = settings)
    }

    fn position(&self) -> Duration {
        lock(&self.state).position
    }

    fn duration(&self) -> Option<Duration> {
        lock(&self.state).duration
    }

    fn has_ended(&self) -> bool {
        lock(&self.state).ended
    }

    fn content(&self) -> VisualContent {
        lock(&self.state).content.clone()
    }
}
