use serde::Serialize;
use tracing::{info, warn};

use crate::db::entities::device;
use crate::db::enums::LoadType;
use crate::db::services::ingest_service::{BatchIngestor, BatchInput, BatchOutcome};
use crate::server::device_ops::{DeviceGateway, DeviceOpError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PullOutcome {
    #[serde(flatten)]
    pub batch: BatchOutcome,
    /// Whether the terminal buffer was emptied after the batch committed.
    pub cleared: bool,
}

/// Server-initiated download of a terminal's buffered punch log.
#[derive(Clone)]
pub struct PullSynchronizer {
    gateway: DeviceGateway,
    ingestor: BatchIngestor,
}

impl PullSynchronizer {
    pub fn new(gateway: DeviceGateway, ingestor: BatchIngestor) -> Self {
        Self { gateway, ingestor }
    }

    /// Fetches the buffered log and ingests it as one `PULL` batch. Nothing is
    /// written unless the download succeeds. With `clear_after`, the terminal
    /// buffer is cleared only once the batch has committed and every record
    /// was either stored or already present; records that could not be used
    /// (unenrolled code, no usable timestamp) exist only on the terminal, so
    /// their presence keeps the buffer. A failed clear is logged and reported
    /// through `cleared = false`.
    pub async fn fetch_attendance(
        &self,
        device: &device::Model,
        clear_after: bool,
    ) -> Result<PullOutcome, DeviceOpError> {
        if !device.is_active {
            return Err(DeviceOpError::Inactive(device.id));
        }

        let address = self.gateway.preflight(device).await?;
        let records = self
            .gateway
            .run(address.clone(), |session| session.get_attendance())
            .await?;
        info!(device_id = device.id, %address, records = records.len(), "Downloaded terminal punch log.");

        let reason = format!("Pull sync from {} ({address})", device.name);
        let batch = self
            .ingestor
            .ingest(Some(device), LoadType::Pull, &reason, BatchInput::Records(records))
            .await?;

        let cleared = match (clear_after, batch.batch_id) {
            (true, Some(_)) if batch.unusable > 0 => {
                warn!(
                    device_id = device.id,
                    unusable = batch.unusable,
                    "Terminal buffer kept: some records could not be stored."
                );
                false
            }
            (true, Some(_)) => {
                match self.gateway.run(address, |session| session.clear_attendance()).await {
                    Ok(()) => true,
                    Err(e) => {
                        warn!(device_id = device.id, error = %e, "Batch committed but terminal buffer was not cleared.");
                        false
                    }
                }
            }
            _ => false,
        };

        Ok(PullOutcome { batch, cleared })
    }
}
