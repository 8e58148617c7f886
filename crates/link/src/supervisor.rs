//! Attachment lifecycle
//!
//! The supervisor owns the transport for the life of the link: it retries
//! discovery every two seconds (first attempt immediate), claims the
//! device and its bulk endpoints, announces readiness, and runs the
//! sender and receiver as sibling threads bound to that one attachment.
//! When either sibling exits without the link-wide stop flag set, the
//! attachment is torn down and discovery resumes from scratch.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam::channel;
use protocol::Message;
use tracing::{debug, error, info, warn};

use crate::error::TransportError;
use crate::events::LinkEvents;
use crate::receiver::Receiver;
use crate::sender::Sender;
use crate::shutdown::Shutdown;
use crate::transport::{Device, Transport};

/// Delay between discovery attempts
pub(crate) const RECONNECT_DELAY: Duration = Duration::from_secs(2);

/// How often sleeping code rechecks the exit flag
const EXIT_POLL: Duration = Duration::from_millis(50);

pub(crate) struct Supervisor {
    transport: Box<dyn Transport>,
    events: Arc<dyn LinkEvents>,
    queue: channel::Receiver<Message>,
    exit: Arc<AtomicBool>,
}

impl Supervisor {
    pub fn new(
        transport: Box<dyn Transport>,
        events: Arc<dyn LinkEvents>,
        queue: channel::Receiver<Message>,
        exit: Arc<AtomicBool>,
    ) -> Self {
        Self {
            transport,
            events,
            queue,
            exit,
        }
    }

    pub fn run(mut self) {
        debug!("supervisor started");
        let mut first_attempt = true;

        loop {
            if self.exit.load(Ordering::Relaxed) {
                break;
            }
            if !first_attempt && self.sleep_checking_exit(RECONNECT_DELAY) {
                break;
            }
            first_attempt = false;

            let device = match self.transport.open() {
                Ok(Some(device)) => device,
                Ok(None) => {
                    debug!("dongle not found, next try in {:?}", RECONNECT_DELAY);
                    continue;
                }
                Err(e) => {
                    warn!("device discovery failed: {}", e);
                    continue;
                }
            };

            if let Err(e) = self.run_attachment(device) {
                warn!("attachment setup failed: {}", e);
            }
        }

        debug!("supervisor stopped");
    }

    /// Claim the device, spawn the sibling tasks, and join them
    ///
    /// The device is dropped on return, releasing its interface and
    /// handle; endpoint failures close it the same way before the retry.
    fn run_attachment(&mut self, mut device: Box<dyn Device>) -> Result<(), TransportError> {
        device.claim()?;
        let reader = device.bulk_in()?;
        let writer = device.bulk_out()?;

        info!("dongle attached");
        self.events.on_ready_send();

        let shutdown = Shutdown::new(Arc::clone(&self.exit));
        let sender = Sender::new(
            writer,
            self.queue.clone(),
            Arc::clone(&self.events),
            shutdown.clone(),
        );
        let receiver = Receiver::new(reader, Arc::clone(&self.events), shutdown);

        let sender_handle = thread::Builder::new()
            .name("link-sender".to_string())
            .spawn(move || sender.run())
            .expect("Failed to spawn sender thread");
        let receiver_handle = thread::Builder::new()
            .name("link-receiver".to_string())
            .spawn(move || receiver.run())
            .expect("Failed to spawn receiver thread");

        if sender_handle.join().is_err() {
            error!("sender thread panicked");
        }
        if receiver_handle.join().is_err() {
            error!("receiver thread panicked");
        }

        info!("dongle detached");
        Ok(())
    }

    /// Sleep for `duration`, waking early if the link is stopping
    ///
    /// Returns whether the exit flag was observed.
    fn sleep_checking_exit(&self, duration: Duration) -> bool {
        let deadline = Instant::now() + duration;
        while Instant::now() < deadline {
            if self.exit.load(Ordering::Relaxed) {
                return true;
            }
            thread::sleep(EXIT_POLL);
        }
        self.exit.load(Ordering::Relaxed)
    }
}
