//! Protocol error types

use thiserror::Error;

/// Errors produced while framing or decoding dongle packets
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProtocolError {
    /// Header buffer shorter than the 16-byte frame header
    #[error("Short header: {len} bytes (need 16)")]
    ShortHeader { len: usize },

    /// Header magic word did not match
    #[error("Invalid magic number: {magic:#010x}")]
    BadMagic { magic: u32 },

    /// Header type complement check failed
    #[error("Invalid type check: type {msg_type:#x}, check {type_check:#010x}")]
    BadTypeCheck { msg_type: u32, type_check: u32 },

    /// Video payload size did not match its embedded length field
    #[error("Video payload size mismatch: expected {expected} bytes, got {actual}")]
    VideoSizeMismatch { expected: usize, actual: usize },

    /// Audio payload shorter than the 12-byte prefix
    #[error("Short audio payload: {len} bytes (need 12)")]
    ShortAudio { len: usize },

    /// Payload shorter than the fixed fields of its message type
    #[error("Short payload: needed {needed} bytes, got {available}")]
    ShortPayload { needed: usize, available: usize },

    /// Touch payload carried an action code outside the known set
    #[error("Invalid touch action code: {code}")]
    InvalidTouchAction { code: u32 },

    /// Header announced a payload larger than the link's frame cap
    #[error("Frame too large: {size} bytes (max: {max})")]
    FrameTooLarge { size: usize, max: usize },
}

/// Type alias for protocol results
pub type Result<T> = std::result::Result<T, ProtocolError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ProtocolError::BadMagic { magic: 0x54AA55AA };
        let msg = format!("{}", err);
        assert!(msg.contains("Invalid magic number"));
        assert!(msg.contains("0x54aa55aa"));
    }

    #[test]
    fn test_video_mismatch_display() {
        let err = ProtocolError::VideoSizeMismatch {
            expected: 120,
            actual: 100,
        };
        let msg = format!("{}", err);
        assert!(msg.contains("expected 120"));
        assert!(msg.contains("got 100"));
    }
}
