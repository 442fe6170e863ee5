//! Background jobs
//!
//! The acquisition loop and the completion poller run as two independent
//! tasks on fixed intervals. Both stop at the next cycle boundary once the
//! shared cancellation token fires.

pub mod acquisition;
pub mod completion_poller;

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

pub use acquisition::{AcquisitionJob, AcquisitionOutcome, CycleSummary};
pub use completion_poller::{CompletionPoller, PollOutcome, PollSummary};

/// Handles of the running background loops
pub struct JobHandles {
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl JobHandles {
    /// Signal both loops to stop and wait for them
    pub async fn shutdown(self) {
        self.cancel.cancel();
        for task in self.tasks {
            if let Err(e) = task.await {
                error!(error = %e, "Background job panicked");
            }
        }
        info!("Background jobs stopped");
    }
}

/// Spawn the background loops. The acquisition loop is optional because it
/// needs an indexer to be configured.
pub fn start(
    acquisition: Option<AcquisitionJob>,
    poller: CompletionPoller,
    acquisition_interval: Duration,
    poll_interval: Duration,
    cancel: CancellationToken,
) -> JobHandles {
    let mut tasks = Vec::new();

    if let Some(job) = acquisition {
        tasks.push(tokio::spawn(acquisition_loop(
            Arc::new(job),
            acquisition_interval,
            cancel.clone(),
        )));
    } else {
        info!(job = "acquisition", "No indexer configured, acquisition loop disabled");
    }

    tasks.push(tokio::spawn(poller_loop(
        Arc::new(poller),
        poll_interval,
        cancel.clone(),
    )));

    JobHandles { cancel, tasks }
}

async fn acquisition_loop(job: Arc<AcquisitionJob>, period: Duration, cancel: CancellationToken) {
    info!(job = "acquisition", interval_secs = period.as_secs(), "Acquisition loop started");
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = interval.tick() => {
                if let Err(e) = job.run_cycle(&cancel).await {
                    error!(job = "acquisition", error = %e, "Acquisition cycle failed");
                }
            }
        }
    }

    info!(job = "acquisition", "Acquisition loop stopped");
}

async fn poller_loop(poller: Arc<CompletionPoller>, period: Duration, cancel: CancellationToken) {
    info!(job = "completion_poller", interval_secs = period.as_secs(), "Completion poller started");
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = interval.tick() => {
                if let Err(e) = poller.run_cycle(&cancel).await {
                    error!(job = "completion_poller", error = %e, "Completion poll failed");
                }
            }
        }
    }

    info!(job = "completion_poller", "Completion poller stopped");
}
