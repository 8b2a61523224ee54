//! Local media: tracks, capture devices and the controller that owns them.

mod controller;
mod devices;
mod track;

pub use controller::{MediaBundle, MediaTrackController};
pub use devices::{MediaConstraints, MediaDevices};
pub use track::{LocalStream, MediaTrack, ReadyState, TrackKind};
