pub mod base;

// libusb is used everywhere, under Windows the interface needs the libusb-win32 / WinUSB driver
// installed (eg. through Zadig) before it can be opened.
mod libusb;
mod serial;

pub use crate::device::libusb::device::{
    find_devices, list_usb_devices, LibUsbProvider, UdmxUSB, UsbDeviceSummary,
};
pub use crate::device::serial::device::{
    find_ports, open_port, DmxLine, SerialOutput, SerialPortEntry, BREAK_TIME, DMX_BAUD_RATE,
    DMX_NULL_START, MARK_AFTER_BREAK,
};
