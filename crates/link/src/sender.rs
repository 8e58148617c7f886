//! Outbound message pump
//!
//! Drains the outbound queue, marshals, and writes to the bulk OUT
//! endpoint. Small control messages arriving in bursts are coalesced into
//! a reusable batch buffer, bounded by a 300 ms window, so each USB
//! submission amortizes its fixed overhead. A heartbeat goes out whenever
//! the queue stays idle for the heartbeat period. Any write failure ends
//! the attachment; the supervisor reconnects from scratch.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam::channel::{Receiver, RecvTimeoutError, TryRecvError};
use protocol::{marshal, Message};
use tracing::{debug, trace, warn};

use crate::events::LinkEvents;
use crate::shutdown::Shutdown;
use crate::transport::BulkOut;

/// Idle period after which a keep-alive heartbeat is written
pub(crate) const HEARTBEAT_PERIOD: Duration = Duration::from_secs(2);

/// Upper bound on one coalescing window
pub(crate) const BATCH_WINDOW: Duration = Duration::from_millis(300);

/// Reusable batch buffer capacity
pub(crate) const BATCH_BUFFER_SIZE: usize = 512 * 9600;

pub(crate) struct Sender {
    writer: Box<dyn BulkOut>,
    queue: Receiver<Message>,
    events: Arc<dyn LinkEvents>,
    shutdown: Shutdown,
    batch: Vec<u8>,
}

impl Sender {
    pub fn new(
        writer: Box<dyn BulkOut>,
        queue: Receiver<Message>,
        events: Arc<dyn LinkEvents>,
        shutdown: Shutdown,
    ) -> Self {
        Self {
            writer,
            queue,
            events,
            shutdown,
            batch: Vec::with_capacity(BATCH_BUFFER_SIZE),
        }
    }

    pub fn run(mut self) {
        debug!("sender started");

        loop {
            if self.shutdown.is_set() {
                break;
            }
            match self.queue.recv_timeout(HEARTBEAT_PERIOD) {
                Ok(message) => {
                    if self.batch_window(message).is_err() {
                        break;
                    }
                }
                Err(RecvTimeoutError::Timeout) => {
                    if self.shutdown.is_set() {
                        break;
                    }
                    trace!("outbound idle, sending heartbeat");
                    if self.write(&marshal(&Message::Heartbeat)).is_err() {
                        break;
                    }
                }
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }

        self.shutdown.trip();
        debug!("sender stopped");
    }

    /// Coalesce messages into the batch buffer until the window closes
    ///
    /// The window ends when the queue goes momentarily empty, a message
    /// does not fit the buffer, or the wall-clock bound elapses. The
    /// buffer is always left empty on return.
    fn batch_window(&mut self, first: Message) -> Result<(), ()> {
        let start = Instant::now();

        let frame = marshal(&first);
        if frame.len() >= self.batch.capacity() {
            // Larger than the buffer could ever hold; write it directly
            return self.write(&frame);
        }
        self.batch.extend_from_slice(&frame);

        loop {
            if start.elapsed() >= BATCH_WINDOW {
                return self.flush();
            }
            match self.queue.try_recv() {
                Ok(message) => {
                    let frame = marshal(&message);
                    if self.batch.len() + frame.len() <= self.batch.capacity() {
                        self.batch.extend_from_slice(&frame);
                    } else {
                        self.flush()?;
                        return self.write(&frame);
                    }
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => {
                    return self.flush();
                }
            }
        }
    }

    /// Write the batch buffer, if non-empty, as one bulk submission
    fn flush(&mut self) -> Result<(), ()> {
        if self.batch.is_empty() {
            return Ok(());
        }
        let batch = std::mem::take(&mut self.batch);
        trace!("flushing batch: {} bytes", batch.len());
        let result = self.write(&batch);
        self.batch = batch;
        self.batch.clear();
        result
    }

    fn write(&mut self, bytes: &[u8]) -> Result<(), ()> {
        if let Err(e) = self.writer.write_all(bytes) {
            if !self.shutdown.is_set() {
                warn!("bulk write failed: {}", e);
                self.events.on_error(&e.into());
            }
            return Err(());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::NullEvents;
    use crate::transport::mock::MockTransport;
    use crate::transport::{Device, Transport};
    use crossbeam::channel::bounded;
    use protocol::{unmarshal_header, SendFile};
    use std::sync::atomic::AtomicBool;

    fn test_sender(
        queue: Receiver<Message>,
    ) -> (Sender, crate::transport::mock::MockControl) {
        let (mut transport, control) = MockTransport::new();
        let mut device = transport.open().unwrap().unwrap();
        device.claim().unwrap();
        let writer = device.bulk_out().unwrap();

        let sender = Sender::new(
            writer,
            queue,
            Arc::new(NullEvents),
            Shutdown::new(Arc::new(AtomicBool::new(false))),
        );
        (sender, control)
    }

    #[test]
    fn test_burst_coalesces_into_one_write() {
        let (tx, rx) = bounded(16);
        let (mut sender, control) = test_sender(rx);

        // Three 64-byte frames queued before the window opens
        let msg = Message::SendFile(SendFile {
            file_name: "/tmp/night_mode".to_string(),
            content: vec![0; 24],
        });
        assert_eq!(marshal(&msg).len(), 64);
        for _ in 0..3 {
            tx.send(msg.clone()).unwrap();
        }

        let first = sender.queue.recv().unwrap();
        sender.batch_window(first).unwrap();

        let writes = control.writes();
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].len(), 192);
    }

    #[test]
    fn test_oversized_message_flushes_then_writes_direct() {
        let (tx, rx) = bounded(16);
        let (mut sender, control) = test_sender(rx);

        let small = Message::Heartbeat;
        let huge = Message::SendFile(SendFile {
            file_name: "/tmp/box_update".to_string(),
            content: vec![0xAB; BATCH_BUFFER_SIZE],
        });
        tx.send(small).unwrap();
        tx.send(huge.clone()).unwrap();

        let first = sender.queue.recv().unwrap();
        sender.batch_window(first).unwrap();

        let writes = control.writes();
        assert_eq!(writes.len(), 2);
        assert_eq!(writes[0].len(), 16); // the heartbeat batch
        assert_eq!(writes[1], marshal(&huge));
        assert!(sender.batch.is_empty());
    }

    #[test]
    fn test_oversized_first_message_writes_direct() {
        let (_tx, rx) = bounded::<Message>(16);
        let (mut sender, control) = test_sender(rx);

        let huge = Message::SendFile(SendFile {
            file_name: "/tmp/box_update".to_string(),
            content: vec![0xCD; BATCH_BUFFER_SIZE],
        });
        sender.batch_window(huge.clone()).unwrap();

        let writes = control.writes();
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0], marshal(&huge));
    }

    #[test]
    fn test_heartbeat_on_idle_queue() {
        let (tx, rx) = bounded::<Message>(16);
        let (sender, control) = test_sender(rx);

        let handle = std::thread::spawn(move || sender.run());
        let heartbeat_seen = common::test_utils::wait_until(Duration::from_secs(4), || {
            control
                .writes()
                .iter()
                .any(|w| unmarshal_header(w).map(|h| h.msg_type) == Ok(0xAA))
        });
        assert!(heartbeat_seen);

        drop(tx); // closes the queue; sender exits
        handle.join().unwrap();
    }

    #[test]
    fn test_queue_order_preserved_in_batch() {
        let (tx, rx) = bounded(16);
        let (mut sender, control) = test_sender(rx);

        let first = Message::SendFile(SendFile::with_i32("/tmp/night_mode", 1));
        let second = Message::SendFile(SendFile::with_i32("/tmp/charge_mode", 0));
        tx.send(first.clone()).unwrap();
        tx.send(second.clone()).unwrap();

        let head = sender.queue.recv().unwrap();
        sender.batch_window(head).unwrap();

        let writes = control.writes();
        assert_eq!(writes.len(), 1);
        let mut expected = marshal(&first);
        expected.extend_from_slice(&marshal(&second));
        assert_eq!(writes[0], expected);
    }
}
