//! Transport adapter
//!
//! Abstracts the USB device behind object-safe traits so the receiver and
//! sender see nothing more than "blocking read of up to N bytes" and
//! "blocking write of exactly N bytes". [`usb::UsbTransport`] backs onto
//! rusb; [`mock::MockTransport`] backs onto in-memory buffers for tests
//! and development without hardware.

pub mod mock;
pub mod usb;

use crate::error::TransportError;

/// Vendor ID of the dongle
pub const VENDOR_ID: u16 = 0x1314;

/// Product IDs the dongle enumerates under
pub const PRODUCT_IDS: [u16; 2] = [0x1520, 0x1521];

/// Device discovery and attachment
pub trait Transport: Send {
    /// Open the first device matching the dongle's vendor/product IDs
    ///
    /// Returns `Ok(None)` when no matching device is present; the
    /// supervisor sleeps and retries. An open failure on a present device
    /// is an error.
    fn open(&mut self) -> Result<Option<Box<dyn Device>>, TransportError>;
}

/// One opened device, from claim to release
///
/// Dropping the device releases its interface and handle.
pub trait Device: Send {
    /// Activate the default configuration and claim the default interface
    fn claim(&mut self) -> Result<(), TransportError>;

    /// Open the bulk IN endpoint
    fn bulk_in(&mut self) -> Result<Box<dyn BulkIn>, TransportError>;

    /// Open the bulk OUT endpoint
    fn bulk_out(&mut self) -> Result<Box<dyn BulkOut>, TransportError>;
}

/// Blocking reader over the bulk IN endpoint
pub trait BulkIn: Send {
    /// Read up to `buf.len()` bytes
    ///
    /// Returns [`TransportError::Timeout`] when no data arrived within the
    /// transport's internal timeout; callers use that to poll shutdown.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, TransportError>;
}

/// Blocking writer over the bulk OUT endpoint
pub trait BulkOut: Send {
    /// Write all of `buf`, looping over partial bulk transfers
    fn write_all(&mut self, buf: &[u8]) -> Result<(), TransportError>;
}
