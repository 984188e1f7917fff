//! Cuegrid output contracts.
//!
//! This crate contains the interfaces the playback engine drives without
//! coupling to a concrete windowing or audio backend:
//! - [`VisualSurface`]: a video/image layer plus a text overlay layer; used
//!   for both the primary output and its mirror
//! - [`AudioOutput`] / [`AudioSink`]: one sink per concurrently playing audio slot
//! - [`MediaProbe`]: asynchronous media inspection before a cold start
//! - [`DeviceProvider`]: audio-output and display enumeration

pub mod audio;
pub mod device;
pub mod probe;
pub mod surface;

pub use audio::*;
pub use device::*;
pub use probe::*;
pub use surface::*;
