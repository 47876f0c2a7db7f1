use crate::{DeviceCommand, Result};

/// A minimal blocking command link to the controller board.
pub trait DeviceLink: Send {
    /// Whether a board is attached and accepting commands.
    fn is_connected(&self) -> bool;

    /// Send one command. Backends return `TransportError::NotConnected`
    /// when no board is attached.
    fn send(&mut self, command: &DeviceCommand) -> Result<()>;

    /// Human-readable backend name for logs.
    fn name(&self) -> &str;

    /// Release the underlying handle.
    fn close(&mut self) {}
}

#[derive(Clone, Debug)]
pub struct PortInfo {
    pub name: String,
    pub description: String,
}
