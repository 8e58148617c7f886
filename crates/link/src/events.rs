//! Application-facing event sink
//!
//! The link holds one sink for its lifetime and invokes it from whichever
//! worker thread produced the event; implementations must be thread-safe.
//! Every method has a no-op default body, so a sink only overrides what it
//! cares about.

use crate::error::LinkError;
use protocol::{AudioData, Message, VideoData};

/// Callbacks delivered by the link core
///
/// `on_video` and `on_audio` fire on the receiver thread in wire arrival
/// order. `on_ready_send` fires once per device attachment, before the
/// sender starts draining the outbound queue. `on_error` carries framing
/// and decode errors (session continues) as well as transport failures
/// (attachment restarts). No callback fires after `stop` returns.
pub trait LinkEvents: Send + Sync {
    /// The device is attached and outbound messages will now be drained
    fn on_ready_send(&self) {}

    /// One decoded H.264 video frame
    fn on_video(&self, _video: VideoData) {}

    /// One decoded audio packet: PCM samples or an audio control event
    fn on_audio(&self, _audio: AudioData) {}

    /// Any other inbound packet, known or unknown
    fn on_data(&self, _message: Message) {}

    /// A non-fatal decode error or a fatal transport error
    fn on_error(&self, _error: &LinkError) {}
}

/// Sink that ignores every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NullEvents;

impl LinkEvents for NullEvents {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_events_ignores_everything() {
        let sink = NullEvents;
        sink.on_ready_send();
        sink.on_data(Message::Heartbeat);
        sink.on_error(&LinkError::NotRunning);
    }
}
