//! Cuegrid headless outputs
//!
//! Simulated implementations of the output contracts:
//! - **Surfaces:** visual surfaces with a manually advanced clock
//! - **Audio:** sinks that track position and report natural ends
//! - **Library:** known media durations, also serving as the media probe
//! - **Devices:** a fixed device list
//!
//! Nothing here renders or decodes. Time only moves when the host calls
//! `advance`, which makes rehearsals and tests deterministic.

pub mod audio;
pub mod devices;
pub mod library;
pub mod surface;

pub use audio::*;
pub use devices::*;
pub use library::*;
pub use surface::*;

use std::sync::{Mutex, MutexGuard};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}
