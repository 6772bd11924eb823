//! Seam onto the vendor terminal protocol.
//!
//! The protocol driver itself lives outside this crate. Everything here talks
//! to it through [`TerminalConnector`] and [`TerminalSession`], which are
//! blocking (vendor drivers use plain sockets) and must only be called from a
//! blocking thread; see `server::device_ops`.

pub mod probe;
pub mod session;

use chrono::NaiveDateTime;
use serde::Serialize;
use std::fmt;
use std::time::Duration;

pub use probe::probe;
pub use session::{ConnectedTerminal, with_terminal};

/// Network location of a terminal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceAddress {
    pub ip: String,
    pub port: u16,
}

impl fmt::Display for DeviceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.ip, self.port)
    }
}

/// A punch as the terminal reports it: its own user code and its local clock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttendanceRecord {
    pub user_code: String,
    pub timestamp: NaiveDateTime,
    pub status: Option<i32>,
    pub punch: Option<i32>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceInfo {
    pub serial_number: Option<String>,
    pub device_name: Option<String>,
    pub firmware: Option<String>,
    pub platform: Option<String>,
    pub user_count: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TerminalError {
    #[error("Terminal unreachable: {0}")]
    Unreachable(String),
    #[error("Terminal did not answer within {0:?}")]
    Timeout(Duration),
    #[error("Terminal protocol error: {0}")]
    Protocol(String),
}

pub trait TerminalConnector: Send + Sync {
    fn connect(
        &self,
        address: &DeviceAddress,
        timeout: Duration,
    ) -> Result<Box<dyn TerminalSession>, TerminalError>;
}

pub trait TerminalSession: Send {
    /// The terminal's local wall clock.
    fn get_time(&mut self) -> Result<NaiveDateTime, TerminalError>;
    fn set_time(&mut self, local: NaiveDateTime) -> Result<(), TerminalError>;
    /// Full buffered punch log.
    fn get_attendance(&mut self) -> Result<Vec<AttendanceRecord>, TerminalError>;
    /// Empties the punch log. Destructive.
    fn clear_attendance(&mut self) -> Result<(), TerminalError>;
    fn device_info(&mut self) -> Result<DeviceInfo, TerminalError>;
    /// Plays the terminal's test sound. Drivers without voice support keep
    /// the default no-op.
    fn test_voice(&mut self) -> Result<(), TerminalError> {
        Ok(())
    }
    fn disconnect(&mut self) -> Result<(), TerminalError>;
}

/// Connector used when no protocol driver has been linked into the binary.
/// Every call fails as a protocol error so operators see that the terminal
/// answered but could not be driven.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailableConnector;

impl TerminalConnector for UnavailableConnector {
    fn connect(
        &self,
        address: &DeviceAddress,
        _timeout: Duration,
    ) -> Result<Box<dyn TerminalSession>, TerminalError> {
        Err(TerminalError::Protocol(format!(
            "no terminal protocol driver is installed to talk to {address}"
        )))
    }
}
