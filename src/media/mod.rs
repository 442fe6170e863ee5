//! Library layout and file placement

pub mod organizer;

pub use organizer::{LibraryPlacer, PlacementSummary, destination_path, locate_recording, relative_folder};
