use crate::{DeviceCommand, DeviceLink, PortInfo, Result, TransportError};
use serialport::{SerialPort, SerialPortType};
use std::io::Write;
use std::thread;
use std::time::Duration;
use tracing::{info, warn};

/// Descriptions that usually belong to an Arduino-class USB serial adapter.
const BOARD_KEYWORDS: &[&str] = &["arduino", "ch340", "cp2102", "ftdi", "usb serial", "serial port"];

/// Line protocol over a serial port (Arduino-style controller boards)
pub struct SerialLink {
    port_path: String,
    port: Option<Box<dyn SerialPort>>,
}

impl SerialLink {
    /// Open `path` at `baud_rate`. Boards reset when the port opens, so wait
    /// `settle` before the first command.
    pub fn open(path: &str, baud_rate: u32, settle: Duration) -> Result<Self> {
        let port = serialport::new(path, baud_rate)
            .timeout(Duration::from_secs(1))
            .open()
            .map_err(|e| match e.kind {
                serialport::ErrorKind::NoDevice => TransportError::PortNotFound(path.to_string()),
                _ => TransportError::Io(e.to_string()),
            })?;
        thread::sleep(settle);
        info!("serial link open on {} @ {} baud", path, baud_rate);
        Ok(Self {
            port_path: path.to_string(),
            port: Some(port),
        })
    }
}

impl DeviceLink for SerialLink {
    fn is_connected(&self) -> bool {
        self.port.is_some()
    }

    fn send(&mut self, command: &DeviceCommand) -> Result<()> {
        let port = self.port.as_mut().ok_or(TransportError::NotConnected)?;
        if let Err(e) = port.write_all(&command.to_line()).and_then(|_| port.flush()) {
            warn!("serial write to {} failed: {}", self.port_path, e);
            return Err(TransportError::Io(e.to_string()));
        }
        Ok(())
    }

    fn name(&self) -> &str {
        &self.port_path
    }

    fn close(&mut self) {
        if self.port.take().is_some() {
            info!("serial link {} closed", self.port_path);
        }
    }
}

pub fn available_ports() -> Result<Vec<PortInfo>> {
    let mut out = Vec::new();
    for p in serialport::available_ports().map_err(|e| TransportError::Io(e.to_string()))? {
        let description = match &p.port_type {
            SerialPortType::UsbPort(usb) => usb
                .product
                .clone()
                .or_else(|| usb.manufacturer.clone())
                .unwrap_or_else(|| "usb serial".to_string()),
            SerialPortType::BluetoothPort => "bluetooth".to_string(),
            SerialPortType::PciPort => "pci".to_string(),
            SerialPortType::Unknown => "serial".to_string(),
        };
        out.push(PortInfo {
            name: p.port_name,
            description,
        });
    }
    Ok(out)
}

/// Pick the port that most likely hosts the controller board, falling back
/// to the first port found.
pub fn find_device_port() -> Result<Option<String>> {
    let ports = available_ports()?;
    let board = ports.iter().find(|p| {
        let desc = p.description.to_lowercase();
        BOARD_KEYWORDS.iter().any(|k| desc.contains(k))
    });
    Ok(board.or(ports.first()).map(|p| p.name.clone()))
}
