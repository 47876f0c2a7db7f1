use crate::{DeviceCommand, DeviceLink, Result, TransportError};

/// Link used when no board is configured. Every send reports not-connected.
#[derive(Debug, Default)]
pub struct NullLink;

impl DeviceLink for NullLink {
    fn is_connected(&self) -> bool {
        false
    }

    fn send(&mut self, _command: &DeviceCommand) -> Result<()> {
        Err(TransportError::NotConnected)
    }

    fn name(&self) -> &str {
        "null"
    }
}
