//! Triggers for the digest run.
//!
//! The cron job and the manual signal never run the workflow themselves;
//! they post a [`Trigger`] into a channel drained by a single loop, so two
//! runs can never overlap.

use tokio::sync::mpsc;
use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};
use tracing::{info, warn};

/// Why a digest run was started.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    Scheduled,
    Manual,
}

/// Start a scheduler that posts [`Trigger::Scheduled`] on every tick of `cron`.
///
/// `cron` uses the six-field form with seconds, e.g. `0 0 12 * * *`.
pub async fn start(
    cron: &str,
    tx: mpsc::Sender<Trigger>,
) -> Result<JobScheduler, JobSchedulerError> {
    let sched = JobScheduler::new().await?;
    let job = Job::new_async(cron, move |_uuid, _l| {
        let tx = tx.clone();
        Box::pin(async move {
            match tx.try_send(Trigger::Scheduled) {
                Ok(()) => info!("Scheduled digest run queued"),
                Err(mpsc::error::TrySendError::Full(_)) => {
                    warn!("A run is already queued; dropping scheduled trigger")
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    warn!("Run loop is gone; dropping scheduled trigger")
                }
            }
        })
    })?;
    sched.add(job).await?;
    sched.start().await?;
    info!(%cron, "Digest schedule started");
    Ok(sched)
}

/// Post [`Trigger::Manual`] whenever the process receives `SIGUSR1`.
#[cfg(unix)]
pub fn listen_for_manual_trigger(tx: mpsc::Sender<Trigger>) -> std::io::Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut usr1 = signal(SignalKind::user_defined1())?;
    tokio::spawn(async move {
        while usr1.recv().await.is_some() {
            info!("SIGUSR1 received; queueing manual digest run");
            if tx.try_send(Trigger::Manual).is_err() {
                warn!("A run is already queued; ignoring manual trigger");
            }
        }
    });
    Ok(())
}

#[cfg(not(unix))]
pub fn listen_for_manual_trigger(_tx: mpsc::Sender<Trigger>) -> std::io::Result<()> {
    Ok(())
}
