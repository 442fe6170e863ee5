//! Harvester: music acquisition and library reconciliation
//!
//! Queued releases are searched on a torrent indexer, the best candidate is
//! handed to qBittorrent, and finished downloads are matched track by track
//! against MusicBrainz before being moved into the library as
//! `ARTIST/ALBUM/<recording-id>.<ext>`.

pub mod cli;
pub mod config;
pub mod db;
pub mod indexer;
pub mod jobs;
pub mod media;
pub mod services;
