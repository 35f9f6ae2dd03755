use serialport::{SerialPortInfo, SerialPortType};
use tracing::debug;

use crate::error::{Result, TransportError};

/// Physical kind of an enumerated serial port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortKind {
    Usb,
    Pci,
    Bluetooth,
    Unknown,
}

impl PortKind {
    pub fn as_str(self) -> &'static str {
        match self {
            PortKind::Usb => "usb",
            PortKind::Pci => "pci",
            PortKind::Bluetooth => "bluetooth",
            PortKind::Unknown => "unknown",
        }
    }
}

/// One serial port reported by the operating system.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortInfo {
    /// Device name to pass to [`crate::Endpoint::parse`].
    pub name: String,
    pub kind: PortKind,
    /// Human-readable description (manufacturer, product, VID:PID for USB).
    pub description: String,
}

/// List the serial ports available on this machine.
pub fn list_ports() -> Result<Vec<PortInfo>> {
    let ports =
        serialport::available_ports().map_err(|err| TransportError::Enumerate(err.to_string()))?;
    debug!(count = ports.len(), "enumerated serial ports");
    Ok(ports.into_iter().map(PortInfo::from).collect())
}

impl From<SerialPortInfo> for PortInfo {
    fn from(info: SerialPortInfo) -> Self {
        let (kind, description) = match info.port_type {
            SerialPortType::UsbPort(usb) => (
                PortKind::Usb,
                usb_description(usb.manufacturer, usb.product, usb.vid, usb.pid),
            ),
            SerialPortType::PciPort => (PortKind::Pci, "PCI serial port".to_string()),
            SerialPortType::BluetoothPort => {
                (PortKind::Bluetooth, "Bluetooth serial port".to_string())
            }
            SerialPortType::Unknown => (PortKind::Unknown, "n/a".to_string()),
        };
        Self {
            name: info.port_name,
            kind,
            description,
        }
    }
}

fn usb_description(
    manufacturer: Option<String>,
    product: Option<String>,
    vid: u16,
    pid: u16,
) -> String {
    let mut parts: Vec<String> = manufacturer.into_iter().chain(product).collect();
    parts.push(format!("{vid:04x}:{pid:04x}"));
    parts.join(" ")
}
