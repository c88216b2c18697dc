use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::relay::RelayJob;
use crate::scheduler::Scheduler;

pub const RELAY_JOB_NAME: &str = "relay";

/// Run a relay pass on every tick of `schedule`.
///
/// A tick that fires while the previous pass is still running is skipped.
pub async fn register_relay_job(
    scheduler: &Scheduler,
    schedule: &str,
    job: Arc<RelayJob>,
) -> anyhow::Result<()> {
    let running = Arc::new(Mutex::new(()));

    scheduler
        .add_cron_job(schedule, RELAY_JOB_NAME, move || {
            let job = job.clone();
            let running = running.clone();
            Box::pin(async move {
                let Ok(_guard) = running.try_lock() else {
                    warn!("Previous relay pass still running, skipping");
                    return;
                };
                match job.run_once().await {
                    Ok(summary) => info!(
                        "Relayed {} item(s) for {} bot(s)",
                        summary.relayed, summary.registrations
                    ),
                    Err(e) => error!("Relay pass failed: {:#}", e),
                }
            })
        })
        .await?;

    Ok(())
}
