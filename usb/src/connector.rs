use crate::device::base::{DeviceProvider, UdmxCommands, UsbOutput};
use crate::device::open_port;
use crate::devices::DeviceDescriptor;
use crate::error::ConnectError;
use crate::transmitter::Transmitter;
use log::{debug, error, info, warn};

const TEST_VALUE: u8 = 128;

/// Finds, claims and releases the interface a `Transmitter` sends to.
pub struct Connector<P: DeviceProvider> {
    provider: P,
}

impl<P: DeviceProvider> Connector<P> {
    pub fn new(provider: P) -> Self {
        Self { provider }
    }

    /// Every supported interface currently on the bus, an empty list if there are none.
    pub fn enumerate(&self) -> Vec<DeviceDescriptor> {
        self.provider.find_devices()
    }

    pub fn index_of(&self, label: &str) -> Option<usize> {
        self.enumerate()
            .iter()
            .position(|device| device.label() == label)
    }

    /// Claims the device at `index` (falling back to the first device if the index doesn't
    /// exist) and starts a new session on the transmitter. Any current session is ended first,
    /// so if nothing could be opened the transmitter is left disconnected.
    pub fn connect(&self, transmitter: &mut Transmitter, index: usize) -> bool {
        transmitter.release();

        let devices = self.enumerate();
        if devices.is_empty() {
            error!("No uDMX devices found");
            return false;
        }

        let index = if index < devices.len() {
            index
        } else {
            debug!(
                "Device index {} out of range ({} found), using the first device",
                index,
                devices.len()
            );
            0
        };
        let device = &devices[index];

        info!("Attempting to connect to {}", device.name());
        let mut transport = match self.provider.open(device) {
            Ok(transport) => transport,
            Err(e) => {
                error!("Connection error: {}", e);
                return false;
            }
        };

        // Detaching only matters where an OS driver grabbed the interface, on a lot of platforms
        // there's nothing attached (or we're not permitted to touch it), and the device is still
        // usable, so failure here is not fatal.
        match transport.detach_kernel_driver() {
            Ok(true) => debug!("Kernel driver detached"),
            Ok(false) => {}
            Err(e) => debug!("Unable to detach kernel driver: {}", e),
        }

        // Most devices arrive already configured, in which case this may be refused.
        if let Err(e) = transport.set_configuration() {
            debug!("Unable to set configuration: {}", e);
        }

        transmitter.attach(device.label(), Box::new(UsbOutput::new(transport)));
        info!("Successfully connected to {}", device.name());
        debug!(
            "Device: VID:{:04X} PID:{:04X}",
            device.vendor_id(),
            device.product_id()
        );
        true
    }

    /// Same as `connect`, but sends over a serial DMX adapter instead.
    pub fn connect_serial(&self, transmitter: &mut Transmitter, path: &str) -> bool {
        transmitter.release();

        match open_port(path) {
            Ok(output) => {
                transmitter.attach(format!("Serial DMX ({})", path), Box::new(output));
                info!("Successfully connected to serial port {}", path);
                true
            }
            Err(e) => {
                error!("Unable to open serial port {}: {}", path, e);
                false
            }
        }
    }

    /// Opens a device outside of any session and sets channel 1 to half, to check the interface
    /// accepts requests at all.
    pub fn test_device(&self, device: &DeviceDescriptor) -> Result<(), ConnectError> {
        let mut transport = self.provider.open(device)?;
        transport.set_single_channel(0, TEST_VALUE)?;
        Ok(())
    }

    pub fn disconnect(&self, transmitter: &mut Transmitter) {
        if !transmitter.release() {
            warn!("Disconnect requested, but no device is connected");
        }
    }
}
