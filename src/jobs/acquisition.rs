//! Acquisition loop
//!
//! Every cycle walks the pending queue (queued releases that are neither in
//! flight nor failed) one release at a time:
//! 1. Builds the query variants `"{artist} {title}"`, `"{title}"`, `"{artist}"`
//! 2. Searches each variant with the primary parameters, then each again
//!    with the retry parameters, scoring every candidate
//! 3. Submits the first accepted candidate and records it as in flight
//! 4. Records a failed acquisition once every combination came up empty
//!
//! The active-transfer cap is checked before the cycle and again before each
//! release, so a cycle can stop part way through the queue.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::db::{Database, QueuedReleaseRecord};
use crate::indexer::{CandidateResult, Indexer, ParameterSet};
use crate::services::fuzzy::{CandidateScore, MatchThresholds, score_candidate};
use crate::services::text_utils::{sanitize_folder_name, sanitize_query, sanitize_title};
use crate::services::torrent::TorrentClient;

/// What happened to one release during a cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AcquisitionOutcome {
    /// A candidate was submitted under this display title
    Submitted(String),
    /// Every query variant and parameter set was exhausted
    Exhausted,
    /// A search or submission failed and nothing was submitted; the
    /// release stays queued for the next cycle
    Deferred,
}

/// Counts from one cycle
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CycleSummary {
    pub processed: usize,
    pub submitted: usize,
    pub failed: usize,
    /// True when the active-transfer cap stopped the cycle early
    pub throttled: bool,
}

/// Query variants for a release, in the order they are tried
pub fn query_variants(artist: &str, title: &str) -> Vec<String> {
    let artist = artist.trim();
    let title = title.trim();
    let mut variants = vec![
        format!("{} {}", artist, title).trim().to_string(),
        title.to_string(),
        artist.to_string(),
    ];
    let mut seen = Vec::with_capacity(variants.len());
    variants.retain(|v| {
        if v.is_empty() || seen.contains(v) {
            return false;
        }
        seen.push(v.clone());
        true
    });
    variants
}

/// Best accepted candidate that has a magnet link. Ties keep indexer order.
pub fn pick_candidate<'a>(
    release: &QueuedReleaseRecord,
    candidates: &'a [CandidateResult],
    thresholds: &MatchThresholds,
) -> Option<(&'a CandidateResult, CandidateScore)> {
    let mut best: Option<(&CandidateResult, CandidateScore)> = None;

    for candidate in candidates {
        if candidate.magnet.is_none() {
            continue;
        }
        let normalized = sanitize_title(&candidate.title);
        let score = score_candidate(&release.artist, &release.title, &normalized, thresholds);
        if !score.is_accepted(thresholds) {
            continue;
        }
        let better = best
            .as_ref()
            .is_none_or(|(_, current)| score.combined > current.combined);
        if better {
            best = Some((candidate, score));
        }
    }

    best
}

pub struct AcquisitionJob {
    db: Database,
    indexer: Arc<dyn Indexer>,
    client: Arc<dyn TorrentClient>,
    thresholds: MatchThresholds,
    downloads_path: PathBuf,
    max_concurrent: usize,
}

impl AcquisitionJob {
    pub fn new(
        db: Database,
        indexer: Arc<dyn Indexer>,
        client: Arc<dyn TorrentClient>,
        thresholds: MatchThresholds,
        downloads_path: impl Into<PathBuf>,
        max_concurrent: usize,
    ) -> Self {
        Self {
            db,
            indexer,
            client,
            thresholds,
            downloads_path: downloads_path.into(),
            max_concurrent,
        }
    }

    /// Whether the client is at or above the active-transfer cap. A client
    /// that can't be reached counts as saturated.
    async fn at_capacity(&self) -> bool {
        match self.client.active_count().await {
            Ok(active) if active >= self.max_concurrent => {
                debug!(
                    job = "acquisition",
                    active,
                    max = self.max_concurrent,
                    "Active transfer cap reached"
                );
                true
            }
            Ok(_) => false,
            Err(e) => {
                warn!(job = "acquisition", error = %e, "Could not count active transfers");
                true
            }
        }
    }

    /// Run one pass over the pending queue
    pub async fn run_cycle(&self, cancel: &CancellationToken) -> Result<CycleSummary> {
        let mut summary = CycleSummary::default();

        if self.at_capacity().await {
            summary.throttled = true;
            return Ok(summary);
        }

        let pending = self
            .db
            .queue()
            .list_pending()
            .await
            .context("Failed to list pending releases")?;

        if pending.is_empty() {
            debug!(job = "acquisition", "No pending releases");
            return Ok(summary);
        }

        info!(job = "acquisition", pending = pending.len(), "Processing pending releases");

        for release in pending {
            if cancel.is_cancelled() {
                break;
            }
            if self.at_capacity().await {
                summary.throttled = true;
                break;
            }

            summary.processed += 1;
            match self.acquire(&release).await {
                Ok(AcquisitionOutcome::Submitted(_)) => summary.submitted += 1,
                Ok(AcquisitionOutcome::Exhausted) => summary.failed += 1,
                Ok(AcquisitionOutcome::Deferred) => {}
                Err(e) => {
                    warn!(
                        job = "acquisition",
                        release_id = %release.release_id,
                        error = %e,
                        "Acquisition attempt failed"
                    );
                }
            }
        }

        info!(
            job = "acquisition",
            processed = summary.processed,
            submitted = summary.submitted,
            failed = summary.failed,
            throttled = summary.throttled,
            "Acquisition cycle finished"
        );
        Ok(summary)
    }

    /// Try every query variant and parameter set for one release
    pub async fn acquire(&self, release: &QueuedReleaseRecord) -> Result<AcquisitionOutcome> {
        let variants = query_variants(&release.artist, &release.title);
        let mut deferred = false;

        for parameters in ParameterSet::ALL {
            for variant in &variants {
                let query = sanitize_query(variant);
                if query.is_empty() {
                    continue;
                }

                let candidates = match self.indexer.search(&query, parameters).await {
                    Ok(candidates) => candidates,
                    Err(e) => {
                        warn!(
                            job = "acquisition",
                            release_id = %release.release_id,
                            query = %query,
                            parameters = %parameters,
                            error = %e,
                            "Search failed"
                        );
                        deferred = true;
                        continue;
                    }
                };

                let Some((candidate, score)) = pick_candidate(release, &candidates, &self.thresholds)
                else {
                    debug!(
                        job = "acquisition",
                        release_id = %release.release_id,
                        query = %query,
                        parameters = %parameters,
                        results = candidates.len(),
                        "No accepted candidate"
                    );
                    continue;
                };

                info!(
                    job = "acquisition",
                    release_id = %release.release_id,
                    candidate = %candidate.title,
                    combined = score.combined,
                    album = score.album,
                    artist = ?score.artist,
                    seeders = candidate.seeders,
                    "Accepted candidate"
                );

                match self.submit(release, candidate).await {
                    Ok(()) => return Ok(AcquisitionOutcome::Submitted(candidate.title.clone())),
                    Err(e) => {
                        warn!(
                            job = "acquisition",
                            release_id = %release.release_id,
                            candidate = %candidate.title,
                            error = %e,
                            "Submission failed"
                        );
                        deferred = true;
                    }
                }
            }
        }

        // only a clean sweep with nothing acceptable counts as exhaustion
        if deferred {
            debug!(
                job = "acquisition",
                release_id = %release.release_id,
                "Release deferred to the next cycle"
            );
            return Ok(AcquisitionOutcome::Deferred);
        }

        self.db
            .failed()
            .record(release.release_id, &release.title, &release.artist)
            .await
            .context("Failed to record failed acquisition")?;

        warn!(
            job = "acquisition",
            release_id = %release.release_id,
            title = %release.title,
            artist = %release.artist,
            "No acceptable candidate for any query, release marked failed"
        );
        Ok(AcquisitionOutcome::Exhausted)
    }

    async fn submit(&self, release: &QueuedReleaseRecord, candidate: &CandidateResult) -> Result<()> {
        let magnet = candidate
            .magnet
            .as_deref()
            .context("Candidate has no magnet link")?;

        let folder = sanitize_folder_name(&candidate.title);
        let destination = if folder.is_empty() {
            None
        } else {
            Some(self.downloads_path.join(&folder).to_string_lossy().to_string())
        };

        self.client.submit(magnet, destination.as_deref()).await?;

        self.db
            .in_flight()
            .create(release.release_id, &candidate.title)
            .await
            .context("Failed to record in-flight acquisition")?;

        info!(
            job = "acquisition",
            release_id = %release.release_id,
            source = %candidate.title,
            destination = ?destination,
            "Submitted download"
        );
        Ok(())
    }
}
