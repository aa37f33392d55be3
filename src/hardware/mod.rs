//! Hardware access for the capture core
//!
//! - `capabilities` - narrow traits over enumeration, open, and byte reads
//! - `serial` - real devices through the `serialport` crate
//! - `mock` - simulated load cell for tests and demos

pub mod capabilities;
pub mod mock;
#[cfg(feature = "instrument_serial")]
pub mod serial;

pub use capabilities::{
    LinkParams, PortDescriptor, PortEnumerator, SerialBackend, SerialLink, SerialOpener,
    SerialParity, SerialTimeouts,
};
pub use mock::MockDevice;
#[cfg(feature = "instrument_serial")]
pub use serial::SystemSerial;
