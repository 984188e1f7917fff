//! Cuegrid Show Model
//!
//! Defines the data contracts the playback engine works against:
//! - **Slots:** addressable grid cells holding one video, audio, image, or text asset
//! - **Grid:** the slot store, ordered by `(column, row)`, plus trigger columns
//! - **Settings:** per-element volume/opacity/scale/rotation/speed and master values
//! - **Show:** the on-disk document tying grid and settings together
//!
//! Every playback lookup is keyed by [`SlotKey`], whose text form is
//! `Slot_<column>_<row>` for grid cells and `Trigger_<column>_<lane>` for
//! trigger lanes.

pub mod grid;
pub mod settings;
pub mod show;
pub mod slot;

pub use grid::*;
pub use settings::*;
pub use show::*;
pub use slot::*;
