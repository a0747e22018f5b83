// DMX512 straight over an RS485 serial adapter. The frame is the same universe as the uDMX path,
// only framed on the wire: a break, the mark after break, then the start code and the 512 slots.

use crate::device::base::{DmxOutput, SendPath};
use crate::error::{ConnectError, TransmitError};
use log::{debug, info};
use serialport::{DataBits, Parity, SerialPort, SerialPortType, StopBits};
use std::io::Write;
use std::thread::sleep;
use std::time::Duration;
use udmx_types::UNIVERSE_SIZE;

pub const DMX_BAUD_RATE: u32 = 250_000;
pub const DMX_NULL_START: u8 = 0x00;

/// Minimum length of the break, sleeping may overshoot which is fine on the wire.
pub const BREAK_TIME: Duration = Duration::from_micros(88);
pub const MARK_AFTER_BREAK: Duration = Duration::from_micros(8);

pub trait DmxLine: Send {
    fn begin_break(&mut self) -> Result<(), TransmitError>;
    fn end_break(&mut self) -> Result<(), TransmitError>;
    fn write_frame(&mut self, frame: &[u8]) -> Result<(), TransmitError>;
}

impl DmxLine for Box<dyn SerialPort> {
    fn begin_break(&mut self) -> Result<(), TransmitError> {
        Ok(self.set_break()?)
    }

    fn end_break(&mut self) -> Result<(), TransmitError> {
        Ok(self.clear_break()?)
    }

    fn write_frame(&mut self, frame: &[u8]) -> Result<(), TransmitError> {
        self.write_all(frame)?;
        self.flush()?;
        Ok(())
    }
}

pub struct SerialOutput<L: DmxLine> {
    line: L,
}

impl<L: DmxLine> SerialOutput<L> {
    pub fn new(line: L) -> Self {
        Self { line }
    }
}

impl<L: DmxLine> DmxOutput for SerialOutput<L> {
    fn send_universe(&mut self, universe: &[u8; UNIVERSE_SIZE]) -> Result<SendPath, TransmitError> {
        let mut frame = Vec::with_capacity(UNIVERSE_SIZE + 1);
        frame.push(DMX_NULL_START);
        frame.extend_from_slice(universe);

        self.line.begin_break()?;
        sleep(BREAK_TIME);
        self.line.end_break()?;
        sleep(MARK_AFTER_BREAK);

        self.line.write_frame(&frame)?;
        Ok(SendPath::Serial)
    }
}

/// Opens a serial port configured for DMX, 250k baud, 8 data bits, 2 stop bits, no parity.
pub fn open_port(path: &str) -> Result<SerialOutput<Box<dyn SerialPort>>, ConnectError> {
    let port = serialport::new(path, DMX_BAUD_RATE)
        .data_bits(DataBits::Eight)
        .stop_bits(StopBits::Two)
        .parity(Parity::None)
        .timeout(Duration::from_secs(1))
        .open()?;

    info!("Opened serial port {} at {} baud", path, DMX_BAUD_RATE);
    Ok(SerialOutput::new(port))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialPortEntry {
    pub path: String,
    pub description: String,
}

pub fn find_ports() -> Vec<SerialPortEntry> {
    let ports = match serialport::available_ports() {
        Ok(ports) => ports,
        Err(error) => {
            debug!("Unable to list serial ports: {}", error);
            return vec![];
        }
    };

    ports
        .into_iter()
        .map(|port| {
            let description = match port.port_type {
                SerialPortType::UsbPort(info) => info.product.unwrap_or_else(|| {
                    format!("USB Serial (VID:{:04X} PID:{:04X})", info.vid, info.pid)
                }),
                SerialPortType::BluetoothPort => String::from("Bluetooth"),
                SerialPortType::PciPort => String::from("PCI"),
                SerialPortType::Unknown => String::from("Unknown"),
            };
            SerialPortEntry {
                path: port.port_name,
                description,
            }
        })
        .collect()
}
