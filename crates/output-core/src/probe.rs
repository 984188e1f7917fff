//! Media inspection ahead of playback.

use std::path::Path;
use std::time::Duration;

use cuegrid_common::error::CueResult;

/// What a probe learned about a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MediaInfo {
    pub duration: Option<Duration>,
    pub has_video: bool,
    pub has_audio: bool,
}

/// Opens a file far enough to know it is playable.
///
/// Probing may take as long as decoder startup, so the engine runs it off its
/// command loop and re-checks the slot afterwards.
#[async_trait::async_trait]
pub trait MediaProbe: Send + Sync {
    async fn probe(&self, path: &Path) -> CueResult<MediaInfo>;
}
