use crate::devices::DeviceDescriptor;
use crate::error::{ConnectError, TransmitError};
use log::debug;
use udmx_types::UNIVERSE_SIZE;

/// Vendor request setting a range of channels from the payload.
pub const REQUEST_SET_CHANNEL_RANGE: u8 = 0x02;

/// Vendor request setting one channel, value and channel are carried in wValue / wIndex.
pub const REQUEST_SET_SINGLE_CHANNEL: u8 = 0x01;

/// How many channels get sent one-by-one when a device doesn't take the full universe. This is
/// the size of the fixture we drive, not a limit of the interface.
pub const FALLBACK_CHANNELS: usize = 9;

// Finds and opens devices on the bus, split out so the lifecycle can be driven without hardware.
pub trait DeviceProvider: Send {
    fn find_devices(&self) -> Vec<DeviceDescriptor>;
    fn open(&self, device: &DeviceDescriptor) -> Result<Box<dyn ControlTransport>, ConnectError>;
}

// The raw host-to-device vendor control pipe of an opened interface.
pub trait ControlTransport: Send {
    fn write_control(
        &mut self,
        request: u8,
        value: u16,
        index: u16,
        data: &[u8],
    ) -> Result<(), rusb::Error>;

    /// Returns true if a driver was attached, and has now been detached.
    fn detach_kernel_driver(&mut self) -> Result<bool, rusb::Error>;
    fn set_configuration(&mut self) -> Result<(), rusb::Error>;
}

// The uDMX requests, built on top of the control pipe..
pub trait UdmxCommands: ControlTransport {
    fn set_channel_range(&mut self, universe: &[u8; UNIVERSE_SIZE]) -> Result<(), rusb::Error> {
        self.write_control(
            REQUEST_SET_CHANNEL_RANGE,
            UNIVERSE_SIZE as u16,
            0,
            universe,
        )
    }

    fn set_single_channel(&mut self, index: u16, value: u8) -> Result<(), rusb::Error> {
        self.write_control(REQUEST_SET_SINGLE_CHANNEL, value as u16, index, &[])
    }
}

impl<T: ControlTransport + ?Sized> UdmxCommands for T {}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SendPath {
    /// The whole universe went out in a single transfer
    Bulk,
    /// The device refused the range request, channels were sent individually
    SingleChannel,
    Serial,
}

/// Something a universe frame can be written to.
pub trait DmxOutput: Send {
    fn send_universe(&mut self, universe: &[u8; UNIVERSE_SIZE]) -> Result<SendPath, TransmitError>;
}

pub struct UsbOutput {
    transport: Box<dyn ControlTransport>,
}

impl UsbOutput {
    pub fn new(transport: Box<dyn ControlTransport>) -> Self {
        Self { transport }
    }
}

impl DmxOutput for UsbOutput {
    fn send_universe(&mut self, universe: &[u8; UNIVERSE_SIZE]) -> Result<SendPath, TransmitError> {
        // Not every uDMX clone implements the range request, if it's refused for any reason fall
        // back to pushing the fixture channels one at a time.
        if let Err(error) = self.transport.set_channel_range(universe) {
            debug!("Channel range request failed ({}), sending single channels", error);
            for (index, value) in universe.iter().take(FALLBACK_CHANNELS).enumerate() {
                self.transport.set_single_channel(index as u16, *value)?;
            }
            return Ok(SendPath::SingleChannel);
        }
        Ok(SendPath::Bulk)
    }
}
