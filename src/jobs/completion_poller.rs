//! Completion poller
//!
//! Checks every in-flight acquisition against the torrent client. Once a
//! transfer reports full progress its files are reconciled against the
//! release's track list and moved into the library, after which the
//! catalog persists the release, the transfer is removed (files included)
//! and both pipeline rows are deleted.
//!
//! A transfer that is still downloading changes nothing, and neither does a
//! missing one unless the release was already persisted, in which case only
//! the row cleanup is left to do. The whole cycle is safe to run again at
//! any point.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::db::{Database, InFlightRecord};
use crate::media::LibraryPlacer;
use crate::services::catalog::Catalog;
use crate::services::reconciler::FileReconciler;
use crate::services::torrent::TorrentClient;

/// What happened to one in-flight acquisition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// The client doesn't know the transfer (yet)
    NotFound,
    InProgress,
    /// Reconciled, placed and cleaned up
    Completed,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PollSummary {
    pub checked: usize,
    pub completed: usize,
    pub errors: usize,
}

pub struct CompletionPoller {
    db: Database,
    client: Arc<dyn TorrentClient>,
    catalog: Arc<dyn Catalog>,
    reconciler: FileReconciler,
    placer: LibraryPlacer,
}

impl CompletionPoller {
    pub fn new(
        db: Database,
        client: Arc<dyn TorrentClient>,
        catalog: Arc<dyn Catalog>,
        reconciler: FileReconciler,
        placer: LibraryPlacer,
    ) -> Self {
        Self {
            db,
            client,
            catalog,
            reconciler,
            placer,
        }
    }

    pub async fn run_cycle(&self, cancel: &CancellationToken) -> Result<PollSummary> {
        let in_flight = self
            .db
            .in_flight()
            .list()
            .await
            .context("Failed to list in-flight acquisitions")?;

        let mut summary = PollSummary::default();
        if in_flight.is_empty() {
            debug!(job = "completion_poller", "Nothing in flight");
            return Ok(summary);
        }

        for item in in_flight {
            if cancel.is_cancelled() {
                break;
            }
            summary.checked += 1;

            match self.poll_item(&item).await {
                Ok(PollOutcome::Completed) => summary.completed += 1,
                Ok(_) => {}
                Err(e) => {
                    summary.errors += 1;
                    error!(
                        job = "completion_poller",
                        release_id = %item.release_id,
                        source = %item.source_name,
                        error = %e,
                        "Failed to process in-flight acquisition"
                    );
                }
            }
        }

        if summary.completed > 0 || summary.errors > 0 {
            info!(
                job = "completion_poller",
                checked = summary.checked,
                completed = summary.completed,
                errors = summary.errors,
                "Completion poll finished"
            );
        }
        Ok(summary)
    }

    /// Check one in-flight acquisition and finish it if its transfer is done
    pub async fn poll_item(&self, item: &InFlightRecord) -> Result<PollOutcome> {
        let Some(transfer) = self.client.get_by_name_or_hash(&item.source_name).await? else {
            // removed on an earlier cycle that stopped before deleting the rows
            if self.db.recordings().has_recordings(item.release_id).await? {
                info!(
                    job = "completion_poller",
                    release_id = %item.release_id,
                    source = %item.source_name,
                    "Transfer already removed and release persisted, finishing cleanup"
                );
                self.finish(item).await?;
                return Ok(PollOutcome::Completed);
            }
            debug!(
                job = "completion_poller",
                release_id = %item.release_id,
                source = %item.source_name,
                "Transfer not found"
            );
            return Ok(PollOutcome::NotFound);
        };

        if !transfer.is_complete() {
            debug!(
                job = "completion_poller",
                release_id = %item.release_id,
                progress = transfer.progress,
                state = %transfer.state,
                "Transfer still in progress"
            );
            return Ok(PollOutcome::InProgress);
        }

        info!(
            job = "completion_poller",
            release_id = %item.release_id,
            name = %transfer.name,
            path = %transfer.save_path,
            "Transfer complete, reconciling files"
        );

        let outcomes = self
            .reconciler
            .reconcile(item.release_id, Path::new(&transfer.save_path))
            .await?;
        let placement = self.placer.place(&outcomes).await;

        // the transfer must outlive every fallible step so a retry can find it
        self.catalog
            .persist_release_metadata(item.release_id)
            .await
            .context("Failed to persist release metadata")?;

        self.client
            .remove(&transfer.id, true)
            .await
            .context("Failed to remove finished transfer")?;

        self.finish(item).await?;

        info!(
            job = "completion_poller",
            release_id = %item.release_id,
            placed = placement.placed,
            skipped = placement.skipped,
            failed = placement.failed,
            "Release acquired"
        );
        Ok(PollOutcome::Completed)
    }

    /// Delete the in-flight row and the originating queue row
    async fn finish(&self, item: &InFlightRecord) -> Result<()> {
        self.db.in_flight().remove(item.release_id).await?;
        self.db.queue().remove(item.release_id).await?;
        Ok(())
    }
}
