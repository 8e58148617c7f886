//! Link error types

use thiserror::Error;

/// Errors from the transport adapter
#[derive(Debug, Error)]
pub enum TransportError {
    /// No device matching the dongle's vendor/product IDs is present
    #[error("No matching USB device present")]
    NoDevice,

    /// Underlying USB stack error
    #[error("USB error: {0}")]
    Usb(#[from] rusb::Error),

    /// A bulk read returned no data within its internal timeout
    ///
    /// Not a failure: the receiver uses this as a point to poll the
    /// shutdown flag.
    #[error("Bulk transfer timed out")]
    Timeout,

    /// The endpoint or device was closed underneath an in-flight transfer
    #[error("Endpoint closed")]
    Closed,

    /// Interface claim or endpoint acquisition failed
    #[error("Endpoint setup failed: {0}")]
    Endpoint(String),
}

/// Errors surfaced by the link core
#[derive(Debug, Error)]
pub enum LinkError {
    /// `start` was called while the link was already running
    #[error("Link already running")]
    AlreadyRunning,

    /// `send` was called before `start` or after `stop`
    #[error("Link is not running")]
    NotRunning,

    /// The outbound queue was closed underneath a `send`
    #[error("Outbound queue closed")]
    QueueClosed,

    /// Transport-level failure; terminates the current attachment
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Framing or payload decode failure; the session continues
    #[error("Protocol error: {0}")]
    Protocol(#[from] protocol::ProtocolError),
}

/// Type alias for link results
pub type Result<T> = std::result::Result<T, LinkError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_error_wraps() {
        let err = LinkError::from(protocol::ProtocolError::ShortHeader { len: 3 });
        assert!(matches!(err, LinkError::Protocol(_)));
        assert!(format!("{}", err).contains("Short header"));
    }

    #[test]
    fn test_transport_error_wraps() {
        let err = LinkError::from(TransportError::NoDevice);
        assert!(format!("{}", err).contains("No matching USB device"));
    }
}
