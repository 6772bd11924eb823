use chrono::{DateTime, NaiveDateTime, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use tracing::info;

use crate::db::entities::device;
use crate::db::services::ingest_service::local_to_instant;
use crate::server::device_ops::{DeviceGateway, DeviceOpError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceClock {
    /// Wall-clock reading as the terminal shows it.
    pub device_time: NaiveDateTime,
    /// The same reading as an instant; `None` if it falls in a DST gap.
    pub device_time_utc: Option<DateTime<Utc>>,
    /// Terminal minus server, in seconds.
    pub drift_seconds: Option<i64>,
}

/// Reads and sets terminal clocks. Terminals keep local time in the
/// configured device zone.
#[derive(Clone)]
pub struct ClockService {
    gateway: DeviceGateway,
    timezone: Tz,
}

impl ClockService {
    pub fn new(gateway: DeviceGateway, timezone: Tz) -> Self {
        Self { gateway, timezone }
    }

    pub async fn get_time(&self, device: &device::Model) -> Result<DeviceClock, DeviceOpError> {
        let address = self.gateway.preflight(device).await?;
        let device_time = self.gateway.run(address, |session| session.get_time()).await?;
        let device_time_utc = local_to_instant(self.timezone, device_time);
        Ok(DeviceClock {
            device_time,
            device_time_utc,
            drift_seconds: device_time_utc.map(|t| (t - Utc::now()).num_seconds()),
        })
    }

    /// Sets the terminal clock to `target`, expressed in the device zone.
    /// Returns the local time written.
    pub async fn set_time(
        &self,
        device: &device::Model,
        target: DateTime<Utc>,
    ) -> Result<NaiveDateTime, DeviceOpError> {
        let local = target.with_timezone(&self.timezone).naive_local();
        let address = self.gateway.preflight(device).await?;
        self.gateway
            .run(address, move |session| session.set_time(local))
            .await?;
        info!(device_id = device.id, %local, "Terminal clock updated.");
        Ok(local)
    }
}
