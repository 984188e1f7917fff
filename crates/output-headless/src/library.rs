//! Known media files and their durations.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use cuegrid_common::error::{CueError, CueResult};
use cuegrid_output_core::{MediaInfo, MediaProbe};

use crate::lock;

#[derive(Debug, Default)]
struct LibraryState {
    media: HashMap<PathBuf, MediaInfo>,
    probe_delay: Duration,
    fallback: Option<MediaInfo>,
}

/// Registry of simulated media. Cheap to clone; clones share state.
#[derive(Debug, Clone, Default)]
pub struct MediaLibrary {
    state: Arc<Mutex<LibraryState>>,
}

impl MediaLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_video(&self, path: impl Into<PathBuf>, duration: Duration) -> &Self {
        self.insert(
            path.into(),
            MediaInfo {
                duration: Some(duration),
                has_video: true,
                has_audio: true,
            },
        )
    }

    pub fn add_audio(&self, path: impl Into<PathBuf>, duration: Duration) -> &Self {
        self.insert(
            path.into(),
            MediaInfo {
                duration: Some(duration),
                has_video: false,
                has_audio: true,
            },
        )
    }

    pub fn add_image(&self, path: impl Into<PathBuf>) -> &Self {
        self.insert(
            path.into(),
            MediaInfo {
                duration: None,
                has_video: true,
                has_audio: false,
            },
        )
    }

    /// Answer probes for unregistered files with `info` instead of failing.
    pub fn set_fallback(&self, info: Option<MediaInfo>) {
        lock(&self.state).fallback = info;
    }

    /// Make every probe take this long, to exercise in-flight loads.
    pub fn set_probe_delay(&self, delay: Duration) {
        lock(&self.state).probe_delay = delay;
    }

    pub fn info(&self, path: &Path) -> Option<MediaInfo> {
        let state = lock(&self.state);
        state.media.get(path).copied().or(state.fallback)
    }

    pub fn duration_of(&self, path: &Path) -> Option<Duration> {
        self.info(path).and_then(|i| i.duration)
    }

    fn insert(&self, path: PathBuf, info: MediaInfo) -> &Self {
        lock(&self.state).media.insert(path, info);
        self
    }
}

#[async_trait::async_trait]
impl MediaProbe for MediaLibrary {
    async fn probe(&self, path: &Path) -> CueResult<MediaInfo> {
        let delay = lock(&self.state).probe_delay;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.info(path).ok_or_else(|| CueError::FileNotFound {
            path: path.to_path_buf(),
        })
    }
}
