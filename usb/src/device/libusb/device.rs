use crate::device::base::{ControlTransport, DeviceProvider};
use crate::devices::{lookup, DeviceDescriptor, SUPPORTED_DEVICES};
use crate::error::ConnectError;
use log::{debug, info};
use rusb::{Device, DeviceHandle, Direction, GlobalContext, Recipient, RequestType};
use std::fmt::{Display, Formatter};
use std::time::Duration;

const INTERFACE: u8 = 0;
const CONFIGURATION: u8 = 1;

pub struct UdmxUSB {
    handle: DeviceHandle<GlobalContext>,
    device: Device<GlobalContext>,
    timeout: Duration,
}

impl UdmxUSB {
    fn find_device(device: &DeviceDescriptor) -> Result<Device<GlobalContext>, ConnectError> {
        for usb_device in rusb::devices()?.iter() {
            if usb_device.bus_number() == device.bus_number
                && usb_device.address() == device.address
            {
                return Ok(usb_device);
            }
        }
        Err(ConnectError::DeviceNotFound)
    }

    pub fn from_device(device: &DeviceDescriptor) -> Result<Self, ConnectError> {
        let usb_device = UdmxUSB::find_device(device)?;
        let handle = usb_device.open()?;

        info!("Opened {} at {:?}", device.label(), usb_device);
        Ok(Self {
            device: handle.device(),
            handle,
            timeout: Duration::from_secs(1),
        })
    }
}

impl ControlTransport for UdmxUSB {
    fn write_control(
        &mut self,
        request: u8,
        value: u16,
        index: u16,
        data: &[u8],
    ) -> Result<(), rusb::Error> {
        // 0x40, Host to Device, Vendor request, Device recipient
        self.handle.write_control(
            rusb::request_type(Direction::Out, RequestType::Vendor, Recipient::Device),
            request,
            value,
            index,
            data,
            self.timeout,
        )?;

        Ok(())
    }

    fn detach_kernel_driver(&mut self) -> Result<bool, rusb::Error> {
        if self.handle.kernel_driver_active(INTERFACE)? {
            debug!("Detaching kernel driver from {:?}", self.device);
            self.handle.detach_kernel_driver(INTERFACE)?;
            return Ok(true);
        }
        Ok(false)
    }

    fn set_configuration(&mut self) -> Result<(), rusb::Error> {
        self.handle.set_active_configuration(CONFIGURATION)
    }
}

/// Talks to devices through the global libusb context.
#[derive(Debug, Default, Clone, Copy)]
pub struct LibUsbProvider;

impl DeviceProvider for LibUsbProvider {
    fn find_devices(&self) -> Vec<DeviceDescriptor> {
        find_devices()
    }

    fn open(&self, device: &DeviceDescriptor) -> Result<Box<dyn ControlTransport>, ConnectError> {
        Ok(Box::new(UdmxUSB::from_device(device)?))
    }
}

pub fn find_devices() -> Vec<DeviceDescriptor> {
    let mut found_devices: Vec<DeviceDescriptor> = Vec::new();

    let devices = match rusb::devices() {
        Ok(devices) => devices,
        Err(error) => {
            debug!("Unable to list USB devices: {}", error);
            return found_devices;
        }
    };

    for device in devices.iter() {
        if let Ok(descriptor) = device.device_descriptor() {
            if let Some(supported) = lookup(descriptor.vendor_id(), descriptor.product_id()) {
                debug!("Found uDMX device: {}", supported.name);
                found_devices.push(DeviceDescriptor::new(
                    supported,
                    device.bus_number(),
                    device.address(),
                ));
            }
        }
    }

    // Keep the ordering of the supported list, so indexes are stable between scans
    found_devices.sort_by_key(|found| {
        SUPPORTED_DEVICES
            .iter()
            .position(|s| s.vendor_id == found.vendor_id && s.product_id == found.product_id)
    });
    found_devices
}

/// Any device on the bus, supported or not.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsbDeviceSummary {
    pub vendor_id: u16,
    pub product_id: u16,
    pub product: Option<String>,
}

impl Display for UsbDeviceSummary {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "VID:{:04X} PID:{:04X}", self.vendor_id, self.product_id)?;
        if let Some(product) = &self.product {
            write!(f, " - {}", product)?;
        }
        Ok(())
    }
}

/// Everything libusb can see, used to help work out why a device isn't being picked up. The
/// product string needs the device opened, so it's missing where we don't have permission.
pub fn list_usb_devices() -> Vec<UsbDeviceSummary> {
    let devices = match rusb::devices() {
        Ok(devices) => devices,
        Err(error) => {
            debug!("Unable to list USB devices: {}", error);
            return vec![];
        }
    };

    devices
        .iter()
        .filter_map(|device| {
            let descriptor = device.device_descriptor().ok()?;
            let product = device
                .open()
                .ok()
                .and_then(|handle| handle.read_product_string_ascii(&descriptor).ok());

            Some(UsbDeviceSummary {
                vendor_id: descriptor.vendor_id(),
                product_id: descriptor.product_id(),
                product,
            })
        })
        .collect()
}
