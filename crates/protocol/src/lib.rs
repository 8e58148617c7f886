//! Wire protocol for the carlink dongle
//!
//! This crate defines the framed binary protocol spoken over the dongle's
//! USB bulk endpoints. It provides typed message definitions, bit-exact
//! payload codecs, and the audio decode-type table.
//!
//! # Frame Format
//!
//! Every bulk transfer carries one or more back-to-back framed packets:
//!
//! ```text
//! ┌───────────┬───────────┬───────────┬───────────┬──────────────────┐
//! │   Magic   │  Length   │   Type    │   ~Type   │     Payload      │
//! │  4 bytes  │  4 bytes  │  4 bytes  │  4 bytes  │  `Length` bytes  │
//! └───────────┴───────────┴───────────┴───────────┴──────────────────┘
//! ```
//!
//! All integers are little-endian. The fourth header word is the bitwise
//! complement of the type word and doubles as a cheap integrity check
//! against framing drift.
//!
//! # Example
//!
//! ```
//! use protocol::{marshal, unmarshal_header, Message};
//!
//! let bytes = marshal(&Message::Heartbeat);
//! let header = unmarshal_header(&bytes[..16]).unwrap();
//! assert_eq!(header.msg_type, 0xAA);
//! assert_eq!(header.length, 0);
//! ```

pub mod codec;
pub mod error;
pub mod messages;
pub mod types;

pub use codec::{
    decode_payload, marshal, marshal_payload, unmarshal_audio, unmarshal_header, unmarshal_video,
};
pub use error::{ProtocolError, Result};
pub use messages::{
    AudioData, AudioTail, ManufacturerInfo, Message, Open, SendFile, Touch, VideoData,
};
pub use types::{
    audio_decode_info, AudioCommand, AudioDecodeInfo, Header, MessageType, TouchAction, MAGIC,
};
