//! rusb-backed transport
//!
//! Owns the libusb context, walks device descriptors for the dongle's
//! vendor/product IDs, and claims the default interface. Endpoint
//! addresses come from the interface descriptor's bulk endpoints, with
//! address 1 preferred when present, matching observed hardware.

use std::sync::Arc;
use std::time::Duration;

use rusb::{Context, DeviceHandle, Direction, TransferType, UsbContext};
use tracing::{debug, info, warn};

use super::{BulkIn, BulkOut, Device, Transport, PRODUCT_IDS, VENDOR_ID};
use crate::error::TransportError;

/// Internal bulk-read timeout; the receiver polls shutdown at this cadence
const READ_TIMEOUT: Duration = Duration::from_millis(250);

/// Bulk-write timeout; generous enough for a full batch buffer at
/// high-speed USB rates
const WRITE_TIMEOUT: Duration = Duration::from_secs(5);

/// The claimed interface number; observed dongles expose a single interface
const DEFAULT_INTERFACE: u8 = 0;

/// Transport over a real USB stack
pub struct UsbTransport {
    context: Context,
}

impl UsbTransport {
    /// Create the USB context
    pub fn new() -> Result<Self, TransportError> {
        let context = Context::new()?;
        Ok(Self { context })
    }
}

impl Transport for UsbTransport {
    fn open(&mut self) -> Result<Option<Box<dyn Device>>, TransportError> {
        let devices = self.context.devices()?;

        for device in devices.iter() {
            let desc = match device.device_descriptor() {
                Ok(d) => d,
                Err(_) => continue,
            };
            if desc.vendor_id() != VENDOR_ID || !PRODUCT_IDS.contains(&desc.product_id()) {
                continue;
            }

            info!(
                "dongle found: bus={} addr={} vid={:#06x} pid={:#06x}",
                device.bus_number(),
                device.address(),
                desc.vendor_id(),
                desc.product_id()
            );

            let handle = device.open().map_err(|e| {
                warn!("failed to open dongle: {}", e);
                TransportError::from(e)
            })?;

            return Ok(Some(Box::new(UsbDevice {
                device,
                handle: Arc::new(handle),
                claimed: false,
                in_address: None,
                out_address: None,
            })));
        }

        Ok(None)
    }
}

/// One opened dongle attachment
struct UsbDevice {
    device: rusb::Device<Context>,
    handle: Arc<DeviceHandle<Context>>,
    claimed: bool,
    in_address: Option<u8>,
    out_address: Option<u8>,
}

impl UsbDevice {
    /// Walk the active configuration for the interface's bulk endpoints
    ///
    /// Address 1 (0x81 IN / 0x01 OUT) wins when present; otherwise the
    /// first bulk endpoint of each direction is used.
    fn discover_endpoints(&mut self) -> Result<(), TransportError> {
        let config = self.device.active_config_descriptor()?;

        let mut first_in = None;
        let mut first_out = None;

        for interface in config.interfaces() {
            if interface.number() != DEFAULT_INTERFACE {
                continue;
            }
            for int_desc in interface.descriptors() {
                for endpoint in int_desc.endpoint_descriptors() {
                    if endpoint.transfer_type() != TransferType::Bulk {
                        continue;
                    }
                    debug!(
                        "bulk endpoint: address={:#04x} direction={:?}",
                        endpoint.address(),
                        endpoint.direction()
                    );
                    match endpoint.direction() {
                        Direction::In => {
                            if endpoint.number() == 1 || first_in.is_none() {
                                first_in = Some(endpoint.address());
                            }
                        }
                        Direction::Out => {
                            if endpoint.number() == 1 || first_out.is_none() {
                                first_out = Some(endpoint.address());
                            }
                        }
                    }
                }
            }
        }

        self.in_address = first_in;
        self.out_address = first_out;

        match (first_in, first_out) {
            (Some(_), Some(_)) => Ok(()),
            _ => Err(TransportError::Endpoint(
                "interface exposes no bulk IN/OUT endpoint pair".to_string(),
            )),
        }
    }
}

impl Device for UsbDevice {
    fn claim(&mut self) -> Result<(), TransportError> {
        match self.handle.kernel_driver_active(DEFAULT_INTERFACE) {
            Ok(true) => {
                debug!("detaching kernel driver from interface {}", DEFAULT_INTERFACE);
                if let Err(e) = self.handle.detach_kernel_driver(DEFAULT_INTERFACE) {
                    warn!("failed to detach kernel driver: {}", e);
                }
            }
            Ok(false) => {}
            Err(e) => {
                // Not supported on all platforms
                debug!("could not check kernel driver status: {}", e);
            }
        }

        self.handle
            .claim_interface(DEFAULT_INTERFACE)
            .map_err(|e| TransportError::Endpoint(format!("claim interface: {}", e)))?;
        self.claimed = true;

        self.discover_endpoints()
    }

    fn bulk_in(&mut self) -> Result<Box<dyn BulkIn>, TransportError> {
        let address = self.in_address.ok_or_else(|| {
            TransportError::Endpoint("bulk IN endpoint not discovered".to_string())
        })?;
        Ok(Box::new(UsbBulkIn {
            handle: Arc::clone(&self.handle),
            address,
        }))
    }

    fn bulk_out(&mut self) -> Result<Box<dyn BulkOut>, TransportError> {
        let address = self.out_address.ok_or_else(|| {
            TransportError::Endpoint("bulk OUT endpoint not discovered".to_string())
        })?;
        Ok(Box::new(UsbBulkOut {
            handle: Arc::clone(&self.handle),
            address,
        }))
    }
}

impl Drop for UsbDevice {
    fn drop(&mut self) {
        if self.claimed {
            if let Err(e) = self.handle.release_interface(DEFAULT_INTERFACE) {
                debug!("failed to release interface: {}", e);
            }
        }
    }
}

struct UsbBulkIn {
    handle: Arc<DeviceHandle<Context>>,
    address: u8,
}

impl BulkIn for UsbBulkIn {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        match self.handle.read_bulk(self.address, buf, READ_TIMEOUT) {
            Ok(n) => Ok(n),
            Err(rusb::Error::Timeout) => Err(TransportError::Timeout),
            Err(rusb::Error::NoDevice) => Err(TransportError::Closed),
            Err(e) => Err(TransportError::Usb(e)),
        }
    }
}

struct UsbBulkOut {
    handle: Arc<DeviceHandle<Context>>,
    address: u8,
}

impl BulkOut for UsbBulkOut {
    fn write_all(&mut self, buf: &[u8]) -> Result<(), TransportError> {
        let mut written = 0;
        while written < buf.len() {
            match self
                .handle
                .write_bulk(self.address, &buf[written..], WRITE_TIMEOUT)
            {
                Ok(n) => written += n,
                Err(rusb::Error::NoDevice) => return Err(TransportError::Closed),
                Err(e) => return Err(TransportError::Usb(e)),
            }
        }
        Ok(())
    }
}
