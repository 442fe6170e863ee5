//! Pipeline services and external integrations

pub mod catalog;
pub mod fuzzy;
pub mod musicbrainz;
pub mod rate_limiter;
pub mod reconciler;
pub mod text_utils;
pub mod torrent;

pub use catalog::{Catalog, CatalogRelease, CatalogTrack};
pub use fuzzy::{CandidateScore, MatchThresholds, score_candidate, token_set_ratio};
pub use musicbrainz::{MusicBrainzCatalog, QueueOutcome};
pub use rate_limiter::{RateLimitConfig, RateLimitedClient, RetryConfig, retry_async};
pub use reconciler::{FileReconciler, MatchOutcome};
pub use torrent::{AdapterError, QBittorrentClient, TorrentClient, TorrentState, TransferState};
