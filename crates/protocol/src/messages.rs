//! Typed message definitions
//!
//! One variant per known type code plus `Unknown` for codes outside the
//! registry. Direction tendencies: `Open`, `Touch`, `SendFile`,
//! `ManufacturerInfo` and `Heartbeat` go to the dongle; media and
//! Bluetooth/WiFi metadata come from it. The wire permits either.

use crate::types::{AudioCommand, AudioDecodeInfo, MessageType, TouchAction};

/// Session-open parameters sent to the dongle before streaming starts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Open {
    pub width: i32,
    pub height: i32,
    pub video_frame_rate: i32,
    pub format: i32,
    pub packet_max: i32,
    pub i_box_version: i32,
    pub phone_work_mode: i32,
}

/// Touch event with coordinates pre-scaled to the 0..10000 grid
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Touch {
    pub x: u32,
    pub y: u32,
    pub action: TouchAction,
}

impl Touch {
    /// Scale a screen-space coordinate into the dongle's 0..10000 grid
    pub fn from_screen(x: f32, y: f32, width: u32, height: u32, action: TouchAction) -> Self {
        Self {
            x: (x * 10_000.0 / width as f32) as u32,
            y: (y * 10_000.0 / height as f32) as u32,
            action,
        }
    }
}

/// One H.264 video frame from the dongle
///
/// `length` is the byte count of `data`; the payload codec rejects frames
/// where the two disagree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoData {
    pub width: i32,
    pub height: i32,
    pub flags: i32,
    pub length: i32,
    pub unknown2: i32,
    pub data: Vec<u8>,
}

/// Variable tail of an audio packet, selected by remaining byte count
#[derive(Debug, Clone, PartialEq)]
pub enum AudioTail {
    /// 1 trailing byte: an audio control command
    Command(AudioCommand),
    /// 4 trailing bytes: a volume ramp duration
    VolumeDuration(i32),
    /// Anything else: raw PCM samples
    Pcm(Vec<u8>),
}

/// Audio packet from the dongle: PCM data or an audio control event
#[derive(Debug, Clone, PartialEq)]
pub struct AudioData {
    /// Index into the fixed decode-type table
    pub decode_type: u32,
    pub volume: f32,
    pub audio_type: i32,
    pub tail: AudioTail,
}

impl AudioData {
    /// PCM parameters for this packet's decode type
    pub fn decode_info(&self) -> Option<AudioDecodeInfo> {
        crate::types::audio_decode_info(self.decode_type)
    }
}

/// Small file pushed into the dongle's filesystem during session init
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendFile {
    /// Absolute path on the dongle; null-terminated on the wire
    pub file_name: String,
    pub content: Vec<u8>,
}

impl SendFile {
    /// File carrying a single little-endian i32, the common init case
    pub fn with_i32(file_name: &str, value: i32) -> Self {
        Self {
            file_name: file_name.to_string(),
            content: value.to_le_bytes().to_vec(),
        }
    }

    /// File carrying a UTF-8 string
    pub fn with_string(file_name: &str, value: &str) -> Self {
        Self {
            file_name: file_name.to_string(),
            content: value.as_bytes().to_vec(),
        }
    }
}

/// Manufacturer identification pair; observed hardware accepts zeros
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ManufacturerInfo {
    pub a: u32,
    pub b: u32,
}

/// All messages the link can carry
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Open(Open),
    Plugged,
    Unplugged,
    Touch(Touch),
    VideoData(VideoData),
    AudioData(AudioData),
    /// Opaque CarPlay session payload, passed through unparsed
    CarPlay(Vec<u8>),
    BluetoothAddress(String),
    BluetoothPin(String),
    BluetoothDeviceName(String),
    WifiDeviceName(String),
    BluetoothPairedList(String),
    ManufacturerInfo(ManufacturerInfo),
    SendFile(SendFile),
    Heartbeat,
    /// Opaque version payload from the dongle, passed through unparsed
    SoftwareVersion(Vec<u8>),
    /// A type code outside the registry; not a framing error
    Unknown { msg_type: u32, data: Vec<u8> },
}

impl Message {
    /// Wire type code of this message
    pub fn type_code(&self) -> u32 {
        match self {
            Message::Open(_) => MessageType::Open.code(),
            Message::Plugged => MessageType::Plugged.code(),
            Message::Unplugged => MessageType::Unplugged.code(),
            Message::Touch(_) => MessageType::Touch.code(),
            Message::VideoData(_) => MessageType::VideoData.code(),
            Message::AudioData(_) => MessageType::AudioData.code(),
            Message::CarPlay(_) => MessageType::CarPlay.code(),
            Message::BluetoothAddress(_) => MessageType::BluetoothAddress.code(),
            Message::BluetoothPin(_) => MessageType::BluetoothPin.code(),
            Message::BluetoothDeviceName(_) => MessageType::BluetoothDeviceName.code(),
            Message::WifiDeviceName(_) => MessageType::WifiDeviceName.code(),
            Message::BluetoothPairedList(_) => MessageType::BluetoothPairedList.code(),
            Message::ManufacturerInfo(_) => MessageType::ManufacturerInfo.code(),
            Message::SendFile(_) => MessageType::SendFile.code(),
            Message::Heartbeat => MessageType::Heartbeat.code(),
            Message::SoftwareVersion(_) => MessageType::SoftwareVersion.code(),
            Message::Unknown { msg_type, .. } => *msg_type,
        }
    }
}
