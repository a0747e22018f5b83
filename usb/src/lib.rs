pub use rusb;
pub mod connector;
pub mod device;
pub mod devices;
pub mod error;
pub mod sender;
pub mod statistics;
pub mod transmitter;
pub mod universe;

pub use connector::Connector;
pub use device::LibUsbProvider;
pub use sender::FrameSender;
pub use transmitter::{SharedTransmitter, Transmitter};
pub use universe::Universe;
