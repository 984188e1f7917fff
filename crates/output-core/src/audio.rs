//! Audio channel contracts.

use std::path::Path;
use std::time::Duration;

use cuegrid_common::error::CueResult;
use cuegrid_show_model::ElementSettings;

/// Opaque identity of the host element an audio sink lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContainerId(pub u64);

/// One playing audio file. Any number of sinks may play at once.
pub trait AudioSink: Send {
    fn play(&mut self) -> CueResult<()>;

    fn pause(&mut self) -> CueResult<()>;

    /// Stop and rewind.
    fn stop(&mut self) -> CueResult<()>;

    fn seek(&mut self, position: Duration) -> CueResult<()>;

    fn apply_settings(&mut self, settings: &ElementSettings) -> CueResult<()>;

    fn position(&self) -> Duration;

    fn duration(&self) -> Option<Duration>;
}

/// A freshly opened sink and the container it was mounted in.
pub struct OpenedAudio {
    pub sink: Box<dyn AudioSink>,
    pub container: ContainerId,
}

impl std::fmt::Debug for OpenedAudio {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenedAudio")
            .field("container", &self.container)
            .finish_non_exhaustive()
    }
}

/// Factory for audio sinks on the selected output device.
pub trait AudioOutput: Send + Sync {
    /// Open `path` paused at zero.
    fn open(&self, path: &Path, device_index: Option<usize>) -> CueResult<OpenedAudio>;

    /// Unmount a container once its sink has been dropped.
    fn release(&self, container: ContainerId);
}
