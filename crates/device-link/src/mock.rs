use crate::{DeviceCommand, DeviceLink, Result, TransportError};
use parking_lot::Mutex;
use std::sync::Arc;

/// Shared view of every command a [`MockLink`] accepted.
pub type SentLog = Arc<Mutex<Vec<DeviceCommand>>>;

/// In-process link that records commands instead of writing them anywhere.
pub struct MockLink {
    connected: bool,
    sent: SentLog,
}

impl MockLink {
    pub fn new() -> Self {
        Self {
            connected: true,
            sent: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// A mock that behaves like an unplugged board but still logs attempts.
    pub fn disconnected() -> Self {
        Self {
            connected: false,
            sent: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Handle to the command log; keep it before boxing the link.
    pub fn log(&self) -> SentLog {
        Arc::clone(&self.sent)
    }
}

impl Default for MockLink {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceLink for MockLink {
    fn is_connected(&self) -> bool {
        self.connected
    }

    fn send(&mut self, command: &DeviceCommand) -> Result<()> {
        if !self.connected {
            return Err(TransportError::NotConnected);
        }
        self.sent.lock().push(command.clone());
        Ok(())
    }

    fn name(&self) -> &str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_records_commands() {
        let mut link = MockLink::new();
        let log = link.log();
        link.send(&DeviceCommand::Talk).unwrap();
        link.send(&DeviceCommand::Stop).unwrap();
        assert_eq!(*log.lock(), vec![DeviceCommand::Talk, DeviceCommand::Stop]);
    }

    #[test]
    fn test_disconnected_mock_rejects() {
        let mut link = MockLink::disconnected();
        let log = link.log();
        assert!(matches!(
            link.send(&DeviceCommand::Talk),
            Err(TransportError::NotConnected)
        ));
        assert!(log.lock().is_empty());
    }
}
