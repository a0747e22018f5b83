#[derive(thiserror::Error, Debug)]
pub enum ConnectError {
    #[error("No uDMX device was found")]
    DeviceNotFound,

    #[error("USB error: {0}")]
    UsbError(#[from] rusb::Error),

    #[error("Serial error: {0}")]
    SerialError(#[from] serialport::Error),
}

#[derive(thiserror::Error, Debug)]
pub enum TransmitError {
    #[error("USB error: {0}")]
    UsbError(#[from] rusb::Error),

    #[error("Serial error: {0}")]
    SerialError(#[from] serialport::Error),

    #[error("Write failed: {0}")]
    IoError(#[from] std::io::Error),
}
