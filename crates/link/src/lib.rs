//! USB link core for the carlink dongle
//!
//! Bridges the dongle's framed USB protocol to an application: discovers
//! and attaches to the device with automatic reconnect, reframes the
//! inbound byte stream into typed callbacks, coalesces outbound control
//! messages into batched bulk writes, and keeps the session alive with a
//! periodic heartbeat.
//!
//! Three threads cooperate per running link: the supervisor owns the
//! reconnect loop and one device attachment at a time; the receiver and
//! sender are siblings bound to that attachment. Shutdown is cooperative
//! through an exit flag observed at every blocking point.
//!
//! # Example
//!
//! ```no_run
//! use link::{Link, NullEvents};
//! use link::transport::usb::UsbTransport;
//! use std::sync::Arc;
//!
//! let mut link = Link::new();
//! let transport = UsbTransport::new()?;
//! link.start(Box::new(transport), Arc::new(NullEvents))?;
//! // ... session runs; enqueue messages with link.send(...) ...
//! link.stop();
//! # Ok::<(), link::LinkError>(())
//! ```

pub mod error;
pub mod events;
pub mod transport;

mod receiver;
mod sender;
mod shutdown;
mod supervisor;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossbeam::channel;
use protocol::Message;
use tracing::{error, info};

pub use error::{LinkError, Result, TransportError};
pub use events::{LinkEvents, NullEvents};
pub use transport::{BulkIn, BulkOut, Device, Transport};

use supervisor::Supervisor;

/// Outbound queue capacity; a full queue blocks the producer
pub const OUTBOUND_QUEUE_CAPACITY: usize = 1024;

/// Hard deadline for the worker threads to join on `stop`
pub const SHUTDOWN_DEADLINE: Duration = Duration::from_secs(5);

/// Resources owned by one start/stop cycle
struct Active {
    exit: Arc<AtomicBool>,
    queue_tx: channel::Sender<Message>,
    supervisor: JoinHandle<()>,
}

/// The USB link: one dongle, one session, restartable
///
/// `start` spawns the supervisor and hands it the transport; `stop` signals
/// all threads, joins them, and releases the USB context. Between the two,
/// `send` enqueues outbound messages, blocking when the queue is full.
pub struct Link {
    active: Option<Active>,
}

impl Link {
    pub fn new() -> Self {
        Self { active: None }
    }

    /// Launch the supervisor over the given transport
    ///
    /// `events` is held for the lifetime of this run and invoked from the
    /// worker threads. Returns [`LinkError::AlreadyRunning`] (and changes
    /// nothing) if the link is already started.
    pub fn start(
        &mut self,
        transport: Box<dyn Transport>,
        events: Arc<dyn LinkEvents>,
    ) -> Result<()> {
        if self.active.is_some() {
            return Err(LinkError::AlreadyRunning);
        }

        let exit = Arc::new(AtomicBool::new(false));
        let (queue_tx, queue_rx) = channel::bounded(OUTBOUND_QUEUE_CAPACITY);

        let supervisor = Supervisor::new(transport, events, queue_rx, Arc::clone(&exit));
        let handle = std::thread::Builder::new()
            .name("link-supervisor".to_string())
            .spawn(move || supervisor.run())
            .expect("Failed to spawn supervisor thread");

        self.active = Some(Active {
            exit,
            queue_tx,
            supervisor: handle,
        });
        info!("link started");
        Ok(())
    }

    /// Enqueue an outbound message
    ///
    /// Blocks while the queue is full; messages from one caller are sent
    /// in enqueue order.
    pub fn send(&self, message: Message) -> Result<()> {
        let active = self.active.as_ref().ok_or(LinkError::NotRunning)?;
        active
            .queue_tx
            .send(message)
            .map_err(|_| LinkError::QueueClosed)
    }

    /// Cooperative shutdown
    ///
    /// Signals every thread, closes the outbound queue, and joins the
    /// supervisor. No callback is invoked after this returns. A no-op when
    /// the link is not running; the link may be started again afterwards.
    pub fn stop(&mut self) {
        let Some(active) = self.active.take() else {
            return;
        };

        active.exit.store(true, Ordering::Relaxed);
        drop(active.queue_tx);

        let deadline = Instant::now() + SHUTDOWN_DEADLINE;
        loop {
            if active.supervisor.is_finished() {
                if active.supervisor.join().is_err() {
                    error!("supervisor thread panicked");
                }
                break;
            }
            if Instant::now() >= deadline {
                error!(
                    "link workers did not stop within {:?}, detaching",
                    SHUTDOWN_DEADLINE
                );
                break;
            }
            std::thread::sleep(Duration::from_millis(10));
        }

        info!("link stopped");
    }

    /// Whether the link is between `start` and `stop`
    pub fn is_running(&self) -> bool {
        self.active.is_some()
    }
}

impl Default for Link {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Link {
    fn drop(&mut self) {
        self.stop();
    }
}
