//! Simulated audio output.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use cuegrid_common::error::{CueError, CueResult};
use cuegrid_output_core::{AudioOutput, AudioSink, ContainerId, OpenedAudio};
use cuegrid_show_model::ElementSettings;

use crate::library::MediaLibrary;
use crate::lock;

#[derive(Debug)]
struct SinkState {
    path: PathBuf,
    playing: bool,
    position: Duration,
    duration: Option<Duration>,
    volume: f64,
    speed: f64,
    dropped: bool,
}

/// Snapshot of one simulated sink.
#[derive(Debug, Clone, PartialEq)]
pub struct SinkSnapshot {
    pub container: ContainerId,
    pub path: PathBuf,
    pub playing: bool,
    pub position: Duration,
    pub volume: f64,
}

#[derive(Debug, Default)]
struct OutputState {
    next_container: u64,
    sinks: BTreeMap<ContainerId, Arc<Mutex<SinkState>>>,
    opened: usize,
}

/// Audio output whose sinks advance only on [`HeadlessAudio::advance`].
#[derive(Debug, Clone)]
pub struct HeadlessAudio {
    library: MediaLibrary,
    state: Arc<Mutex<OutputState>>,
}

struct HeadlessSink {
    state: Arc<Mutex<SinkState>>,
}

impl HeadlessAudio {
    pub fn new(library: MediaLibrary) -> Self {
        Self {
            library,
            state: Arc::default(),
        }
    }

    /// Advance every playing sink. Returns the containers whose media
    /// ended during this step.
    pub fn advance(&self, elapsed: Duration) -> Vec<ContainerId> {
        let state = lock(&self.state);
        let mut ended = vec![];
        for (container, sink) in &state.sinks {
            let mut sink = lock(sink);
            if !sink.playing || sink.dropped {
                continue;
            }
            let step = elapsed.mul_f64(sink.speed.max(0.0));
            sink.position += step;
            if let Some(total) = sink.duration {
                if sink.position >= total {
                    sink.position = total;
                    sink.playing = false;
                    ended.push(*container);
                }
            }
        }
        ended
    }

    /// Sinks still mounted, in container order.
    pub fn sinks(&self) -> Vec<SinkSnapshot> {
        lock(&self.state)
            .sinks
            .iter()
            .map(|(container, sink)| {
                let sink = lock(sink);
                SinkSnapshot {
                    container: *container,
                    path: sink.path.clone(),
                    playing: sink.playing && !sink.dropped,
                    position: sink.position,
                    volume: sink.volume,
                }
            })
            .collect()
    }

    pub fn sink_for(&self, path: &Path) -> Option<SinkSnapshot> {
        self.sinks().into_iter().find(|s| s.path == path)
    }

    /// Total number of sinks ever opened.
    pub fn opened(&self) -> usize {
        lock(&self.state).opened
    }
}

impl AudioOutput for HeadlessAudio {
    fn open(&self, path: &Path, device_index: Option<usize>) -> CueResult<OpenedAudio> {
        let info = self.library.info(path).ok_or_else(|| CueError::FileNotFound {
            path: path.to_path_buf(),
        })?;
        if !info.has_audio {
            return Err(CueError::audio(format!(
                "{} has no audio stream",
                path.display()
            )));
        }

        let mut state = lock(&self.state);
        state.next_container += 1;
        state.opened += 1;
        let container = ContainerId(state.next_container);
        let sink = Arc::new(Mutex::new(SinkState {
            path: path.to_path_buf(),
            playing: false,
            position: Duration::ZERO,
            duration: info.duration,
            volume: 1.0,
            speed: 1.0,
            dropped: false,
        }));
        state.sinks.insert(container, sink.clone());
        tracing::debug!(?container, ?device_index, path = %path.display(), "Opened headless sink");

        Ok(OpenedAudio {
            sink: Box::new(HeadlessSink { state: sink }),
            container,
        })
    }

    fn release(&self, container: ContainerId) {
        lock(&self.state).sinks.remove(&container);
    }
}

impl AudioSink for HeadlessSink {
    fn play(&mut self) -> CueResult<()> {
        lock(&self.state).playing = true;
        Ok(())
    }

    fn pause(&mut self) -> CueResult<()> {
        lock(&self.state).playing = false;
        Ok(())
    }

    fn stop(&mut self) -> CueResult<()> {
        let mut state = lock(&self.state);
        state.playing = false;
        state.position = Duration::ZERO;
        Ok(())
    }

    fn seek(&mut self, position: Duration) -> CueResult<()> {
        let mut state = lock(&self.state);
        state.position = match state.duration {
            Some(total) => position.min(total),
            None => position,
        };
        Ok(())
    }

    fn apply_settings(&mut self, settings: &ElementSettings) -> CueResult<()> {
        let mut state = lock(&self.state);
        state.volume = settings.volume;
        state.speed = settings.speed;
        Ok(())
    }

    fn position(&self) -> Duration {
        lock(&self.state).position
    }

    fn duration(&self) -> Option<Duration> {
        lock(&self.state).duration
    }
}

impl Drop for HeadlessSink {
    fn drop(&mut self) {
        lock(&self.state).dropped = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sinks_play_concurrently_and_end() {
        let library = MediaLibrary::new();
        library.add_audio("bg.mp3", Duration::from_secs(10));
        library.add_audio("voice.mp3", Duration::from_secs(3));
        let output = HeadlessAudio::new(library);

        let mut bg = output.open(Path::new("bg.mp3"), None).unwrap();
        let mut voice = output.open(Path::new("voice.mp3"), None).unwrap();
        bg.sink.play().unwrap();
        voice.sink.play().unwrap();

        let ended = output.advance(Duration::from_secs(4));
        assert_eq!(ended, vec![voice.container]);
        assert!(output.sink_for(Path::new("bg.mp3")).unwrap().playing);
        assert_eq!(output.opened(), 2);

        output.release(voice.container);
        assert_eq!(output.sinks().len(), 1);
    }

    #[test]
    fn test_sink_clock_follows_its_speed() {
        let library = MediaLibrary::new();
        library.add_audio("voice.mp3", Duration::from_secs(3));
        let output = HeadlessAudio::new(library);

        let mut voice = output.open(Path::new("voice.mp3"), None).unwrap();
        voice
            .sink
            .apply_settings(&ElementSettings {
                speed: 2.0,
                ..ElementSettings::default()
            })
            .unwrap();
        voice.sink.play().unwrap();

        assert!(output.advance(Duration::from_secs(1)).is_empty());
        assert_eq!(voice.sink.position(), Duration::from_secs(2));
        assert_eq!(output.advance(Duration::from_secs(1)), vec![voice.container]);
        assert_eq!(voice.sink.position(), Duration::from_secs(3));
    }

    #[test]
    fn test_open_rejects_silent_media() {
        let library = MediaLibrary::new();
        library.add_image("still.png");
        let output = HeadlessAudio::new(library);
        assert!(output.open(Path::new("still.png"), None).is_err());
    }
}
