use sea_orm::{DatabaseConnection, DbErr};
use std::sync::Arc;
use std::time::Duration;
use tokio::time;
use tracing::{debug, error, info, warn};

use crate::db::services::device_service;
use crate::server::device_ops::DeviceOpError;
use crate::server::pull_sync::{PullOutcome, PullSynchronizer};

/// Periodic pull of every active terminal. Runs as its own task, so slow
/// terminals only delay the next device in the round.
pub struct PullScheduler {
    db: DatabaseConnection,
    synchronizer: PullSynchronizer,
    clear_after: bool,
}

impl PullScheduler {
    pub fn new(db: DatabaseConnection, synchronizer: PullSynchronizer, clear_after: bool) -> Self {
        Self {
            db,
            synchronizer,
            clear_after,
        }
    }

    pub async fn run_periodic(self: Arc<Self>, every: Duration) {
        info!(interval_seconds = every.as_secs(), "Periodic terminal pull task started.");
        let mut interval = time::interval(every);
        // The first tick completes immediately; skip it so start-up is not a pull storm.
        interval.tick().await;

        loop {
            interval.tick().await;
            match self.pull_all().await {
                Ok(results) => {
                    let failed = results.iter().filter(|(_, r)| r.is_err()).count();
                    info!(devices = results.len(), failed, "Periodic terminal pull finished.");
                }
                Err(e) => error!(error = %e, "Could not list devices for periodic pull."),
            }
        }
    }

    /// One round over all active devices, in name order.
    pub async fn pull_all(&self) -> Result<Vec<(i32, Result<PullOutcome, DeviceOpError>)>, DbErr> {
        let devices = device_service::list_active_devices(&self.db).await?;
        let mut results = Vec::with_capacity(devices.len());
        for device in devices {
            let result = self
                .synchronizer
                .fetch_attendance(&device, self.clear_after)
                .await;
            match &result {
                Ok(outcome) => debug!(
                    device_id = device.id,
                    saved = outcome.batch.record_count,
                    "Scheduled pull done."
                ),
                Err(e) => warn!(device_id = device.id, error = %e, "Scheduled pull failed."),
            }
            results.push((device.id, result));
        }
        Ok(results)
    }
}
