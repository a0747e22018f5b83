// Plain structs describing the interfaces we know how to talk to, and the ones we've found on the
// bus. Nothing in here touches libusb, so callers can list and label devices without caring about
// the communication layer.

use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SupportedDevice {
    pub vendor_id: u16,
    pub product_id: u16,
    pub name: &'static str,
}

pub const VID_ANYMA: u16 = 0x16c0;
pub const PID_ANYMA_UDMX: u16 = 0x05dc;

pub const VID_DMXCONTROL: u16 = 0x03eb;
pub const PID_DMXCONTROL_UDMX: u16 = 0x8888;

/// Interfaces speaking the uDMX vendor requests. New hardware is supported by adding it here.
pub const SUPPORTED_DEVICES: [SupportedDevice; 2] = [
    SupportedDevice {
        vendor_id: VID_ANYMA,
        product_id: PID_ANYMA_UDMX,
        name: "Anyma uDMX",
    },
    SupportedDevice {
        vendor_id: VID_DMXCONTROL,
        product_id: PID_DMXCONTROL_UDMX,
        name: "DMXControl uDMX",
    },
];

pub fn lookup(vendor_id: u16, product_id: u16) -> Option<&'static SupportedDevice> {
    SUPPORTED_DEVICES
        .iter()
        .find(|device| device.vendor_id == vendor_id && device.product_id == product_id)
}

// We primarily need the bus number, and address to find the device again when claiming..
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceDescriptor {
    pub(crate) vendor_id: u16,
    pub(crate) product_id: u16,
    pub(crate) name: String,
    pub(crate) bus_number: u8,
    pub(crate) address: u8,
}

impl DeviceDescriptor {
    pub fn new(supported: &SupportedDevice, bus_number: u8, address: u8) -> Self {
        Self {
            vendor_id: supported.vendor_id,
            product_id: supported.product_id,
            name: supported.name.to_string(),
            bus_number,
            address,
        }
    }

    pub fn vendor_id(&self) -> u16 {
        self.vendor_id
    }
    pub fn product_id(&self) -> u16 {
        self.product_id
    }
    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn bus_number(&self) -> u8 {
        self.bus_number
    }
    pub fn address(&self) -> u8 {
        self.address
    }

    /// Human readable label, eg. `Anyma uDMX (VID:16C0 PID:05DC)`
    pub fn label(&self) -> String {
        format!(
            "{} (VID:{:04X} PID:{:04X})",
            self.name, self.vendor_id, self.product_id
        )
    }
}

impl Display for DeviceDescriptor {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}
