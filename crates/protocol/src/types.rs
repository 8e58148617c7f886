//! Core protocol types
//!
//! The frame header, the closed message-type registry, and the fixed
//! audio decode-type table the dongle indexes into.

/// Magic word opening every frame header
pub const MAGIC: u32 = 0x55AA_55AA;

/// 16-byte frame header preceding every payload on the wire
///
/// `type_check` carries the bitwise complement of `msg_type`; a mismatch
/// means the receiver has lost framing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// Always [`MAGIC`]
    pub magic: u32,
    /// Payload byte count, excluding the header itself
    pub length: u32,
    /// Message type code
    pub msg_type: u32,
    /// Bitwise complement of `msg_type`
    pub type_check: u32,
}

impl Header {
    /// Wire size of the header
    pub const SIZE: usize = 16;

    /// Build a header for the given type code and payload length
    pub fn new(msg_type: u32, length: u32) -> Self {
        Self {
            magic: MAGIC,
            length,
            msg_type,
            type_check: !msg_type,
        }
    }
}

/// Closed registry of known message type codes
///
/// Each code has a direction tendency (host to dongle or dongle to host)
/// but the wire format permits either. Codes outside this registry are not
/// framing errors; they decode to [`crate::Message::Unknown`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum MessageType {
    Open = 0x01,
    Plugged = 0x02,
    Unplugged = 0x04,
    Touch = 0x05,
    VideoData = 0x06,
    AudioData = 0x07,
    CarPlay = 0x08,
    BluetoothAddress = 0x0A,
    BluetoothPin = 0x0C,
    BluetoothDeviceName = 0x0D,
    WifiDeviceName = 0x0E,
    BluetoothPairedList = 0x12,
    ManufacturerInfo = 0x14,
    SendFile = 0x99,
    Heartbeat = 0xAA,
    SoftwareVersion = 0xCC,
}

impl MessageType {
    /// Wire code of this message type
    pub fn code(self) -> u32 {
        self as u32
    }

    /// Look up a wire code in the registry
    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            0x01 => Some(Self::Open),
            0x02 => Some(Self::Plugged),
            0x04 => Some(Self::Unplugged),
            0x05 => Some(Self::Touch),
            0x06 => Some(Self::VideoData),
            0x07 => Some(Self::AudioData),
            0x08 => Some(Self::CarPlay),
            0x0A => Some(Self::BluetoothAddress),
            0x0C => Some(Self::BluetoothPin),
            0x0D => Some(Self::BluetoothDeviceName),
            0x0E => Some(Self::WifiDeviceName),
            0x12 => Some(Self::BluetoothPairedList),
            0x14 => Some(Self::ManufacturerInfo),
            0x99 => Some(Self::SendFile),
            0xAA => Some(Self::Heartbeat),
            0xCC => Some(Self::SoftwareVersion),
            _ => None,
        }
    }
}

/// Touch event phase sent with [`crate::Touch`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum TouchAction {
    Down = 14,
    Move = 15,
    Up = 16,
}

impl TouchAction {
    /// Wire code of this action
    pub fn code(self) -> u32 {
        self as u32
    }

    /// Look up a wire code; unknown codes map to `None`
    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            14 => Some(Self::Down),
            15 => Some(Self::Move),
            16 => Some(Self::Up),
            _ => None,
        }
    }
}

/// One-byte audio control command carried in an [`crate::AudioData`] tail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioCommand(pub u8);

impl AudioCommand {
    pub const OUTPUT_START: AudioCommand = AudioCommand(1);
    pub const OUTPUT_STOP: AudioCommand = AudioCommand(2);
    pub const INPUT_CONFIG: AudioCommand = AudioCommand(3);
    pub const PHONECALL_START: AudioCommand = AudioCommand(4);
    pub const PHONECALL_STOP: AudioCommand = AudioCommand(5);
    pub const NAVI_START: AudioCommand = AudioCommand(6);
    pub const NAVI_STOP: AudioCommand = AudioCommand(7);
    pub const SIRI_START: AudioCommand = AudioCommand(8);
    pub const SIRI_STOP: AudioCommand = AudioCommand(9);
    pub const MEDIA_START: AudioCommand = AudioCommand(10);
    pub const MEDIA_STOP: AudioCommand = AudioCommand(11);
}

/// PCM stream parameters selected by an audio packet's decode type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioDecodeInfo {
    /// Sample rate in Hz
    pub frequency: u32,
    /// Channel count
    pub channels: u8,
    /// Bits per sample
    pub bits: u8,
}

/// Fixed decode-type table, indexed by `AudioData::decode_type`
///
/// Index 0 is unused by observed hardware and mirrors index 1.
const AUDIO_DECODE_TYPES: [AudioDecodeInfo; 8] = [
    AudioDecodeInfo { frequency: 44_100, channels: 2, bits: 16 },
    AudioDecodeInfo { frequency: 44_100, channels: 2, bits: 16 },
    AudioDecodeInfo { frequency: 44_100, channels: 2, bits: 16 },
    AudioDecodeInfo { frequency: 48_000, channels: 2, bits: 16 },
    AudioDecodeInfo { frequency: 48_000, channels: 2, bits: 16 },
    AudioDecodeInfo { frequency: 16_000, channels: 1, bits: 16 },
    AudioDecodeInfo { frequency: 24_000, channels: 1, bits: 16 },
    AudioDecodeInfo { frequency: 16_000, channels: 2, bits: 16 },
];

/// Look up the PCM parameters for a decode type, if it is in the table
pub fn audio_decode_info(decode_type: u32) -> Option<AudioDecodeInfo> {
    AUDIO_DECODE_TYPES.get(decode_type as usize).copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_roundtrip() {
        let all = [
            MessageType::Open,
            MessageType::Plugged,
            MessageType::Unplugged,
            MessageType::Touch,
            MessageType::VideoData,
            MessageType::AudioData,
            MessageType::CarPlay,
            MessageType::BluetoothAddress,
            MessageType::BluetoothPin,
            MessageType::BluetoothDeviceName,
            MessageType::WifiDeviceName,
            MessageType::BluetoothPairedList,
            MessageType::ManufacturerInfo,
            MessageType::SendFile,
            MessageType::Heartbeat,
            MessageType::SoftwareVersion,
        ];
        for ty in all {
            assert_eq!(MessageType::from_code(ty.code()), Some(ty));
        }
    }

    #[test]
    fn test_unknown_code() {
        assert_eq!(MessageType::from_code(0x42), None);
        assert_eq!(MessageType::from_code(0), None);
    }

    #[test]
    fn test_header_complement() {
        let hdr = Header::new(0x06, 3700);
        assert_eq!(hdr.type_check, 0xFFFF_FFF9);
        assert_eq!(hdr.magic, MAGIC);
    }

    #[test]
    fn test_decode_table_stereo_48k() {
        let info = audio_decode_info(3).unwrap();
        assert_eq!(info.frequency, 48_000);
        assert_eq!(info.channels, 2);
    }

    #[test]
    fn test_decode_table_out_of_range() {
        assert!(audio_decode_info(8).is_none());
        assert!(audio_decode_info(u32::MAX).is_none());
    }
}
