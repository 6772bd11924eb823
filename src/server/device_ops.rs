//! Shared plumbing for administrator-triggered terminal operations.
//!
//! Protocol calls are blocking and may take several seconds, so they run on
//! tokio's blocking pool and never on the threads serving push traffic. Every
//! call is preceded by a TCP probe so a dead terminal fails fast.

use sea_orm::DbErr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::db::entities::device;
use crate::db::services::ingest_service::IngestError;
use crate::terminal::{
    self, DeviceAddress, DeviceInfo, TerminalConnector, TerminalError, TerminalSession,
};

#[derive(Debug, thiserror::Error)]
pub enum DeviceOpError {
    #[error("Device {0} not found")]
    NotFound(i32),
    #[error("Device {0} is inactive")]
    Inactive(i32),
    #[error("Device address is invalid: {0}")]
    InvalidAddress(String),
    #[error("Device unreachable: {0}")]
    Unreachable(String),
    #[error("Device reachable but protocol failed: {0}")]
    Protocol(String),
    #[error("Database error: {0}")]
    Persistence(#[from] DbErr),
    #[error("Background task failed: {0}")]
    Task(String),
}

impl From<TerminalError> for DeviceOpError {
    fn from(err: TerminalError) -> Self {
        match err {
            TerminalError::Unreachable(_) | TerminalError::Timeout(_) => {
                DeviceOpError::Unreachable(err.to_string())
            }
            TerminalError::Protocol(msg) => DeviceOpError::Protocol(msg),
        }
    }
}

impl From<IngestError> for DeviceOpError {
    fn from(err: IngestError) -> Self {
        match err {
            IngestError::Database(db_err) => DeviceOpError::Persistence(db_err),
        }
    }
}

pub fn device_address(device: &device::Model) -> Result<DeviceAddress, DeviceOpError> {
    let port = u16::try_from(device.port)
        .ok()
        .filter(|port| *port > 0)
        .ok_or_else(|| DeviceOpError::InvalidAddress(format!("port {} is out of range", device.port)))?;
    let ip = device.ip_address.trim();
    if ip.is_empty() {
        return Err(DeviceOpError::InvalidAddress("IP address is empty".to_string()));
    }
    Ok(DeviceAddress {
        ip: ip.to_owned(),
        port,
    })
}

#[derive(Debug, Clone, Copy)]
pub struct TerminalTimeouts {
    pub probe: Duration,
    pub connect: Duration,
}

#[derive(Clone)]
pub struct DeviceGateway {
    connector: Arc<dyn TerminalConnector>,
    timeouts: TerminalTimeouts,
}

impl DeviceGateway {
    pub fn new(connector: Arc<dyn TerminalConnector>, timeouts: TerminalTimeouts) -> Self {
        Self { connector, timeouts }
    }

    /// Resolves the device's address and checks that something answers there.
    pub async fn preflight(&self, device: &device::Model) -> Result<DeviceAddress, DeviceOpError> {
        let address = device_address(device)?;
        if let Err(e) = terminal::probe(&address, self.timeouts.probe).await {
            warn!(device_id = device.id, %address, error = %e, "Terminal failed reachability probe.");
            return Err(e.into());
        }
        Ok(address)
    }

    /// Runs `op` inside a scoped terminal session on the blocking pool.
    pub async fn run<T, F>(&self, address: DeviceAddress, op: F) -> Result<T, DeviceOpError>
    where
        T: Send + 'static,
        F: FnOnce(&mut dyn TerminalSession) -> Result<T, TerminalError> + Send + 'static,
    {
        let connector = self.connector.clone();
        let timeout = self.timeouts.connect;
        tokio::task::spawn_blocking(move || {
            terminal::with_terminal(connector.as_ref(), &address, timeout, op)
        })
        .await
        .map_err(|e| DeviceOpError::Task(e.to_string()))?
        .map_err(DeviceOpError::from)
    }

    /// Probe, connect, read the terminal's identity and play its test sound.
    pub async fn test_connection(&self, device: &device::Model) -> Result<DeviceInfo, DeviceOpError> {
        let address = self.preflight(device).await?;
        let info = self
            .run(address, |session| {
                let info = session.device_info()?;
                session.test_voice()?;
                Ok(info)
            })
            .await?;
        info!(device_id = device.id, serial = ?info.serial_number, "Terminal connection test succeeded.");
        Ok(info)
    }
}
