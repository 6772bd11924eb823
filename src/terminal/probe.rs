use std::time::Duration;
use tokio::net::TcpStream;
use tracing::debug;

use super::{DeviceAddress, TerminalError};

/// Plain TCP connect with a short deadline. Used before any protocol call so
/// a powered-off terminal fails fast instead of stalling a protocol handshake.
pub async fn probe(address: &DeviceAddress, timeout: Duration) -> Result<(), TerminalError> {
    let result = tokio::time::timeout(
        timeout,
        TcpStream::connect((address.ip.as_str(), address.port)),
    )
    .await;

    match result {
        Ok(Ok(_stream)) => {
            debug!(%address, "Terminal answered TCP probe.");
            Ok(())
        }
        Ok(Err(e)) => Err(TerminalError::Unreachable(format!(
            "no answer at {address}: {e}"
        ))),
        Err(_) => Err(TerminalError::Timeout(timeout)),
    }
}
