//! In-memory transport double
//!
//! Backs the transport traits onto ring buffers so the link core can be
//! exercised without hardware: tests script inbound bytes, capture each
//! outbound bulk write, and simulate plug/unplug cycles.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::{BulkIn, BulkOut, Device, Transport};
use crate::error::TransportError;

/// How long a mock read waits for data before reporting a timeout
const MOCK_READ_POLL: Duration = Duration::from_millis(10);

struct MockState {
    /// Whether a device is currently "plugged in"
    present: AtomicBool,
    /// Scripted bytes the link will read from the IN endpoint
    inbound: Mutex<VecDeque<u8>>,
    /// Every OUT write, one entry per `write_all` call
    writes: Mutex<Vec<Vec<u8>>>,
    /// Number of successful opens, i.e. attachments
    opens: AtomicUsize,
    /// Alive flag of the current attachment; cleared by `unplug`
    attachment_alive: Mutex<Option<Arc<AtomicBool>>>,
}

/// Test-side handle controlling the mock device
#[derive(Clone)]
pub struct MockControl {
    state: Arc<MockState>,
}

impl MockControl {
    /// Make the device visible to discovery
    pub fn plug(&self) {
        self.state.present.store(true, Ordering::Relaxed);
    }

    /// Remove the device and fail the current attachment's transfers
    pub fn unplug(&self) {
        self.state.present.store(false, Ordering::Relaxed);
        if let Some(alive) = self.state.attachment_alive.lock().unwrap().take() {
            alive.store(false, Ordering::Relaxed);
        }
    }

    /// Queue bytes for the link to read from the IN endpoint
    pub fn push_inbound(&self, bytes: &[u8]) {
        self.state.inbound.lock().unwrap().extend(bytes);
    }

    /// Snapshot of every OUT write so far, one entry per bulk submission
    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.state.writes.lock().unwrap().clone()
    }

    /// Drop all recorded writes
    pub fn clear_writes(&self) {
        self.state.writes.lock().unwrap().clear();
    }

    /// Number of attachments made so far
    pub fn open_count(&self) -> usize {
        self.state.opens.load(Ordering::Relaxed)
    }
}

/// Transport double over in-memory buffers
pub struct MockTransport {
    state: Arc<MockState>,
}

impl MockTransport {
    /// Create a transport and its controlling handle; starts plugged in
    pub fn new() -> (Self, MockControl) {
        let state = Arc::new(MockState {
            present: AtomicBool::new(true),
            inbound: Mutex::new(VecDeque::new()),
            writes: Mutex::new(Vec::new()),
            opens: AtomicUsize::new(0),
            attachment_alive: Mutex::new(None),
        });
        (
            Self {
                state: Arc::clone(&state),
            },
            MockControl { state },
        )
    }
}

impl Transport for MockTransport {
    fn open(&mut self) -> Result<Option<Box<dyn Device>>, TransportError> {
        if !self.state.present.load(Ordering::Relaxed) {
            return Ok(None);
        }
        let alive = Arc::new(AtomicBool::new(true));
        *self.state.attachment_alive.lock().unwrap() = Some(Arc::clone(&alive));
        self.state.opens.fetch_add(1, Ordering::Relaxed);
        Ok(Some(Box::new(MockDevice {
            state: Arc::clone(&self.state),
            alive,
        })))
    }
}

struct MockDevice {
    state: Arc<MockState>,
    alive: Arc<AtomicBool>,
}

impl Device for MockDevice {
    fn claim(&mut self) -> Result<(), TransportError> {
        Ok(())
    }

    fn bulk_in(&mut self) -> Result<Box<dyn BulkIn>, TransportError> {
        Ok(Box::new(MockBulkIn {
            state: Arc::clone(&self.state),
            alive: Arc::clone(&self.alive),
        }))
    }

    fn bulk_out(&mut self) -> Result<Box<dyn BulkOut>, TransportError> {
        Ok(Box::new(MockBulkOut {
            state: Arc::clone(&self.state),
            alive: Arc::clone(&self.alive),
        }))
    }
}

struct MockBulkIn {
    state: Arc<MockState>,
    alive: Arc<AtomicBool>,
}

impl BulkIn for MockBulkIn {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        if !self.alive.load(Ordering::Relaxed) {
            return Err(TransportError::Closed);
        }
        {
            let mut inbound = self.state.inbound.lock().unwrap();
            if !inbound.is_empty() {
                let n = buf.len().min(inbound.len());
                for slot in buf.iter_mut().take(n) {
                    *slot = inbound.pop_front().unwrap();
                }
                return Ok(n);
            }
        }
        std::thread::sleep(MOCK_READ_POLL);
        Err(TransportError::Timeout)
    }
}

struct MockBulkOut {
    state: Arc<MockState>,
    alive: Arc<AtomicBool>,
}

impl BulkOut for MockBulkOut {
    fn write_all(&mut self, buf: &[u8]) -> Result<(), TransportError> {
        if !self.alive.load(Ordering::Relaxed) {
            return Err(TransportError::Closed);
        }
        self.state.writes.lock().unwrap().push(buf.to_vec());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_when_absent() {
        let (mut transport, control) = MockTransport::new();
        control.unplug();
        assert!(transport.open().unwrap().is_none());
        control.plug();
        assert!(transport.open().unwrap().is_some());
    }

    #[test]
    fn test_read_drains_inbound() {
        let (mut transport, control) = MockTransport::new();
        control.push_inbound(&[1, 2, 3, 4, 5]);

        let mut device = transport.open().unwrap().unwrap();
        device.claim().unwrap();
        let mut reader = device.bulk_in().unwrap();

        let mut buf = [0u8; 3];
        assert_eq!(reader.read(&mut buf).unwrap(), 3);
        assert_eq!(buf, [1, 2, 3]);
        assert_eq!(reader.read(&mut buf).unwrap(), 2);
        assert_eq!(&buf[..2], &[4, 5]);
        assert!(matches!(
            reader.read(&mut buf),
            Err(TransportError::Timeout)
        ));
    }

    #[test]
    fn test_unplug_fails_transfers() {
        let (mut transport, control) = MockTransport::new();
        let mut device = transport.open().unwrap().unwrap();
        let mut writer = device.bulk_out().unwrap();

        writer.write_all(&[0xAA]).unwrap();
        control.unplug();
        assert!(matches!(
            writer.write_all(&[0xBB]),
            Err(TransportError::Closed)
        ));
        assert_eq!(control.writes().len(), 1);
    }
}
