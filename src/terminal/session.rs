use std::time::Duration;
use tracing::{debug, warn};

use super::{DeviceAddress, TerminalConnector, TerminalError, TerminalSession};

/// An open terminal session that disconnects when dropped, whatever path the
/// caller leaves by.
pub struct ConnectedTerminal {
    address: DeviceAddress,
    session: Box<dyn TerminalSession>,
}

impl ConnectedTerminal {
    pub fn open(
        connector: &dyn TerminalConnector,
        address: &DeviceAddress,
        timeout: Duration,
    ) -> Result<Self, TerminalError> {
        let session = connector.connect(address, timeout)?;
        debug!(%address, "Terminal session opened.");
        Ok(Self {
            address: address.clone(),
            session,
        })
    }

    pub fn session(&mut self) -> &mut dyn TerminalSession {
        &mut *self.session
    }
}

impl Drop for ConnectedTerminal {
    fn drop(&mut self) {
        match self.session.disconnect() {
            Ok(()) => debug!(address = %self.address, "Terminal session closed."),
            Err(e) => warn!(address = %self.address, error = %e, "Terminal disconnect failed."),
        }
    }
}

/// Connect, run `op`, disconnect.
pub fn with_terminal<T, F>(
    connector: &dyn TerminalConnector,
    address: &DeviceAddress,
    timeout: Duration,
    op: F,
) -> Result<T, TerminalError>
where
    F: FnOnce(&mut dyn TerminalSession) -> Result<T, TerminalError>,
{
    let mut terminal = ConnectedTerminal::open(connector, address, timeout)?;
    op(terminal.session())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::FakeTerminal;

    fn address() -> DeviceAddress {
        DeviceAddress {
            ip: "127.0.0.1".to_string(),
            port: 4370,
        }
    }

    #[test]
    fn test_disconnects_after_success() {
        let fake = FakeTerminal::default();
        let result = with_terminal(&fake, &address(), Duration::from_secs(1), |s| s.get_time());
        assert!(result.is_ok());
        assert_eq!(fake.connects(), 1);
        assert_eq!(fake.disconnects(), 1);
    }

    #[test]
    fn test_disconnects_after_operation_error() {
        let fake = FakeTerminal::default();
        let result: Result<(), _> = with_terminal(&fake, &address(), Duration::from_secs(1), |_| {
            Err(TerminalError::Protocol("rejected".to_string()))
        });
        assert_eq!(result, Err(TerminalError::Protocol("rejected".to_string())));
        assert_eq!(fake.disconnects(), 1);
    }

    #[test]
    fn test_disconnects_on_panic() {
        let fake = FakeTerminal::default();
        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _ = with_terminal::<(), _>(&fake, &address(), Duration::from_secs(1), |_| {
                panic!("driver blew up")
            });
        }));
        assert!(outcome.is_err());
        assert_eq!(fake.disconnects(), 1);
    }

    #[test]
    fn test_failed_connect_has_nothing_to_disconnect() {
        let fake = FakeTerminal::default().refusing_connect(TerminalError::Timeout(Duration::from_secs(1)));
        let result = with_terminal(&fake, &address(), Duration::from_secs(1), |s| s.get_time());
        assert!(matches!(result, Err(TerminalError::Timeout(_))));
        assert_eq!(fake.connects(), 0);
        assert_eq!(fake.disconnects(), 0);
    }
}
