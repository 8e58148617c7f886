//! Inbound packet pump
//!
//! Reads raw bytes from the bulk IN endpoint, reframes them into packets,
//! and dispatches typed callbacks. Bulk transfers carry one or more
//! back-to-back packets with no boundary guarantee below the 16-byte
//! header, so the receiver reassembles by header length. Framing and
//! decode errors are reported and skipped; only transport failures end
//! the attachment.

use std::sync::Arc;

use protocol::{decode_payload, unmarshal_audio, unmarshal_header, unmarshal_video};
use protocol::{Header, MessageType, ProtocolError};
use tracing::{debug, trace};

use crate::error::TransportError;
use crate::events::LinkEvents;
use crate::shutdown::Shutdown;
use crate::transport::BulkIn;

/// Read-ahead buffer size; video frames reach hundreds of KB and bulk
/// transfers amortize better with large submissions
pub(crate) const IN_BUFFER_SIZE: usize = 512 * 9600;

/// Largest payload a header may announce, matching the packet limit
/// advertised to the dongle in `Open`
const MAX_PAYLOAD_SIZE: usize = IN_BUFFER_SIZE;

pub(crate) struct Receiver {
    reader: Box<dyn BulkIn>,
    events: Arc<dyn LinkEvents>,
    shutdown: Shutdown,
    /// Reassembly buffer spanning bulk transfer boundaries
    pending: Vec<u8>,
}

impl Receiver {
    pub fn new(reader: Box<dyn BulkIn>, events: Arc<dyn LinkEvents>, shutdown: Shutdown) -> Self {
        Self {
            reader,
            events,
            shutdown,
            pending: Vec::new(),
        }
    }

    pub fn run(mut self) {
        debug!("receiver started");
        let mut scratch = vec![0u8; IN_BUFFER_SIZE];

        loop {
            if self.shutdown.is_set() {
                break;
            }
            match self.reader.read(&mut scratch) {
                Ok(0) => continue,
                Ok(n) => {
                    trace!("bulk read: {} bytes", n);
                    self.pending.extend_from_slice(&scratch[..n]);
                    self.drain_packets();
                }
                Err(TransportError::Timeout) => continue,
                Err(e) => {
                    if !self.shutdown.is_set() {
                        self.events.on_error(&e.into());
                    }
                    break;
                }
            }
        }

        self.shutdown.trip();
        debug!("receiver stopped");
    }

    /// Decode and dispatch every complete packet in the reassembly buffer
    ///
    /// On a framing error the current 16 bytes are discarded and decoding
    /// resumes at the next 16-byte boundary.
    fn drain_packets(&mut self) {
        let mut offset = 0;

        loop {
            let remaining = &self.pending[offset..];
            if remaining.len() < Header::SIZE {
                break;
            }

            let header = match unmarshal_header(&remaining[..Header::SIZE]) {
                Ok(h) => h,
                Err(e) => {
                    self.events.on_error(&e.into());
                    offset += Header::SIZE;
                    continue;
                }
            };

            let payload_len = header.length as usize;
            if payload_len > MAX_PAYLOAD_SIZE {
                self.events.on_error(
                    &ProtocolError::FrameTooLarge {
                        size: payload_len,
                        max: MAX_PAYLOAD_SIZE,
                    }
                    .into(),
                );
                offset += Header::SIZE;
                continue;
            }

            let total = Header::SIZE + payload_len;
            if remaining.len() < total {
                // Incomplete packet; wait for the next bulk transfer
                break;
            }

            let payload = &self.pending[offset + Header::SIZE..offset + total];
            dispatch(&header, payload, self.events.as_ref());
            offset += total;
        }

        if offset > 0 {
            self.pending.drain(..offset);
        }
    }
}

/// Route one framed packet to its callback
fn dispatch(header: &Header, payload: &[u8], events: &dyn LinkEvents) {
    match MessageType::from_code(header.msg_type) {
        Some(MessageType::VideoData) => match unmarshal_video(payload) {
            Ok(video) => events.on_video(video),
            Err(e) => events.on_error(&e.into()),
        },
        Some(MessageType::AudioData) => match unmarshal_audio(payload) {
            Ok(audio) => events.on_audio(audio),
            Err(e) => events.on_error(&e.into()),
        },
        _ => match decode_payload(header, payload) {
            Ok(message) => events.on_data(message),
            Err(e) => events.on_error(&e.into()),
        },
    }
}
