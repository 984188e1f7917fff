//! Media state tracking: what is playing where.
//!
//! [`MediaStateTracker`] is the single owner of the playback state. Every
//! operation is one complete intent (no caller ever sees half an update),
//! none of them block, and all are plain map operations.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

use cuegrid_output_core::ContainerId;
use cuegrid_show_model::{MediaKind, SlotKey};

/// The slot currently occupying the primary surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MainOccupant {
    pub key: SlotKey,
    pub kind: MediaKind,
    /// File registered as active for this occupant (video only).
    pub path: Option<PathBuf>,
}

/// One playing audio slot.
#[derive(Debug)]
pub struct AudioChannel<H> {
    pub surface: H,
    pub container: ContainerId,
    pub path: PathBuf,
    pub paused: bool,
}

/// Playback state, generic over the audio surface handle so it stays free
/// of any output backend.
#[derive(Debug)]
pub struct MediaStateTracker<H> {
    main: Option<MainOccupant>,
    visual_content: Option<SlotKey>,
    audio_content: Option<SlotKey>,
    audio_channels: HashMap<SlotKey, AudioChannel<H>>,
    resume_positions: HashMap<SlotKey, Duration>,
    file_resume_positions: HashMap<PathBuf, Duration>,
    active_files: HashSet<PathBuf>,
    video_paused: bool,
}

impl<H> Default for MediaStateTracker<H> {
    fn default() -> Self {
        Self {
            main: None,
            visual_content: None,
            audio_content: None,
            audio_channels: HashMap::new(),
            resume_positions: HashMap::new(),
            file_resume_positions: HashMap::new(),
            active_files: HashSet::new(),
            video_paused: false,
        }
    }
}

impl<H> MediaStateTracker<H> {
    pub fn new() -> Self {
        Self::default()
    }

    // Active files

    pub fn register_active_file(&mut self, path: &Path) {
        self.active_files.insert(path.to_path_buf());
    }

    pub fn unregister_active_file(&mut self, path: &Path) {
        self.active_files.remove(path);
    }

    pub fn is_file_already_playing(&self, path: &Path) -> bool {
        self.active_files.contains(path)
    }

    pub fn active_files(&self) -> impl Iterator<Item = &Path> {
        self.active_files.iter().map(PathBuf::as_path)
    }

    /// Slot currently playing `path`, either on the primary surface or as
    /// an audio channel.
    pub fn holder_of(&self, path: &Path) -> Option<SlotKey> {
        if let Some(main) = &self.main {
            if main.path.as_deref() == Some(path) {
                return Some(main.key);
            }
        }
        self.audio_channels
            .iter()
            .find(|(_, channel)| channel.path == path)
            .map(|(key, _)| *key)
    }

    // Audio channels

    /// Add a playing audio channel and register its file. Returns the
    /// channel previously stored under `key`, if any. Only grid slots become
    /// the current audio content; trigger lanes never do.
    pub fn add_audio_channel(
        &mut self,
        key: SlotKey,
        path: &Path,
        surface: H,
        container: ContainerId,
    ) -> Option<AudioChannel<H>> {
        self.register_active_file(path);
        if !key.is_trigger() {
            self.audio_content = Some(key);
        }
        self.audio_channels.insert(
            key,
            AudioChannel {
                surface,
                container,
                path: path.to_path_buf(),
                paused: false,
            },
        )
    }

    /// Remove a channel and unregister its file.
    pub fn remove_audio_channel(&mut self, key: &SlotKey) -> Option<AudioChannel<H>> {
        let channel = self.audio_channels.remove(key)?;
        self.unregister_active_file(&channel.path);
        if self.audio_content.as_ref() == Some(key) {
            self.audio_content = None;
        }
        Some(channel)
    }

    pub fn try_get_audio_channel(&self, key: &SlotKey) -> Option<&H> {
        self.audio_channels.get(key).map(|c| &c.surface)
    }

    pub fn audio_channel_mut(&mut self, key: &SlotKey) -> Option<&mut H> {
        self.audio_channels.get_mut(key).map(|c| &mut c.surface)
    }

    pub fn audio_channel_path(&self, key: &SlotKey) -> Option<&Path> {
        self.audio_channels.get(key).map(|c| c.path.as_path())
    }

    pub fn set_audio_paused(&mut self, key: &SlotKey, paused: bool) {
        if let Some(channel) = self.audio_channels.get_mut(key) {
            channel.paused = paused;
        }
    }

    pub fn is_audio_paused(&self, key: &SlotKey) -> bool {
        self.audio_channels.get(key).is_some_and(|c| c.paused)
    }

    pub fn is_audio_media(&self, key: &SlotKey) -> bool {
        self.audio_channels.contains_key(key)
    }

    pub fn audio_keys(&self) -> Vec<SlotKey> {
        let mut keys: Vec<SlotKey> = self.audio_channels.keys().copied().collect();
        keys.sort();
        keys
    }

    pub fn audio_key_for_container(&self, container: ContainerId) -> Option<SlotKey> {
        self.audio_channels
            .iter()
            .find(|(_, c)| c.container == container)
            .map(|(key, _)| *key)
    }

    /// Most recently started grid audio channel still present.
    pub fn current_audio_content(&self) -> Option<SlotKey> {
        self.audio_content
    }

    /// Remove channels whose file is no longer registered as active.
    pub fn remove_orphaned_channels(&mut self) -> Vec<(SlotKey, AudioChannel<H>)> {
        let orphans: Vec<SlotKey> = self
            .audio_channels
            .iter()
            .filter(|(_, c)| !self.active_files.contains(&c.path))
            .map(|(key, _)| *key)
            .collect();
        orphans
            .into_iter()
            .filter_map(|key| {
                let channel = self.audio_channels.remove(&key)?;
                if self.audio_content == Some(key) {
                    self.audio_content = None;
                }
                Some((key, channel))
            })
            .collect()
    }

    // Resume positions

    pub fn save_slot_position(&mut self, key: SlotKey, position: Duration) {
        self.resume_positions.insert(key, position);
    }

    pub fn get_slot_position(&self, key: &SlotKey) -> Duration {
        self.resume_positions.get(key).copied().unwrap_or_default()
    }

    pub fn clear_slot_position(&mut self, key: &SlotKey) {
        self.resume_positions.remove(key);
    }

    pub fn save_file_resume_position(&mut self, path: &Path, position: Duration) {
        self.file_resume_positions.insert(path.to_path_buf(), position);
    }

    pub fn get_file_resume_position(&self, path: &Path) -> Option<Duration> {
        self.file_resume_positions.get(path).copied()
    }

    pub fn clear_file_resume_position(&mut self, path: &Path) {
        self.file_resume_positions.remove(path);
    }

    /// Where a cold start of `key` playing `path` should begin: the slot's
    /// own position, else the file's, else zero.
    pub fn resume_position_for(&self, key: &SlotKey, path: &Path) -> Duration {
        match self.resume_positions.get(key) {
            Some(position) if !position.is_zero() => *position,
            _ => self.get_file_resume_position(path).unwrap_or_default(),
        }
    }

    /// Cache a mid-playback position for both the slot and its file.
    pub fn remember_position(&mut self, key: SlotKey, path: &Path, position: Duration) {
        self.save_slot_position(key, position);
        self.save_file_resume_position(path, position);
    }

    /// Forget positions after a natural end or a restart.
    pub fn forget_position(&mut self, key: &SlotKey, path: Option<&Path>) {
        self.clear_slot_position(key);
        if let Some(path) = path {
            self.clear_file_resume_position(path);
        }
    }

    // Primary surface

    /// Record the new primary-surface occupant. Video and image occupants
    /// also become the visual content; a video registers its file.
    pub fn set_main_media(&mut self, occupant: MainOccupant) {
        self.visual_content = match occupant.kind {
            MediaKind::Video | MediaKind::Image => Some(occupant.key),
            MediaKind::Audio | MediaKind::Text => None,
        };
        if let Some(path) = &occupant.path {
            self.active_files.insert(path.clone());
        }
        self.video_paused = false;
        self.main = Some(occupant);
    }

    /// Clear the primary-surface occupant and unregister its file.
    pub fn clear_main_media(&mut self) -> Option<MainOccupant> {
        let occupant = self.main.take()?;
        if let Some(path) = &occupant.path {
            self.active_files.remove(path);
        }
        self.visual_content = None;
        self.video_paused = false;
        Some(occupant)
    }

    pub fn main_occupant(&self) -> Option<&MainOccupant> {
        self.main.as_ref()
    }

    pub fn current_main_media(&self) -> Option<SlotKey> {
        self.main.as_ref().map(|m| m.key)
    }

    pub fn current_visual_content(&self) -> Option<SlotKey> {
        self.visual_content
    }

    pub fn is_main_media(&self, key: &SlotKey) -> bool {
        self.main.as_ref().is_some_and(|m| m.key == *key)
    }

    pub fn set_video_paused(&mut self, paused: bool) {
        self.video_paused = paused;
    }

    pub fn is_video_paused(&self) -> bool {
        self.video_paused
    }
}
