//! Payload marshalling and unmarshalling
//!
//! Pure byte-level codecs for the frame header and every payload variant.
//! No I/O and no shared state; the receiver and sender call into these from
//! their own threads. All multi-byte fields are little-endian.

use crate::error::{ProtocolError, Result};
use crate::messages::{
    AudioData, AudioTail, ManufacturerInfo, Message, Open, SendFile, Touch, VideoData,
};
use crate::types::{AudioCommand, Header, MessageType, TouchAction, MAGIC};

/// Bounds-checked little-endian reader over a payload slice
struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.buf.len() < self.pos + n {
            return Err(ProtocolError::ShortPayload {
                needed: self.pos + n,
                available: self.buf.len(),
            });
        }
        let out = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    fn u32(&mut self) -> Result<u32> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn i32(&mut self) -> Result<i32> {
        Ok(self.u32()? as i32)
    }

    fn f32(&mut self) -> Result<f32> {
        Ok(f32::from_bits(self.u32()?))
    }

    fn rest(&mut self) -> &'a [u8] {
        let out = &self.buf[self.pos..];
        self.pos = self.buf.len();
        out
    }
}

fn put_u32(buf: &mut Vec<u8>, v: u32) {
    buf.extend_from_slice(&v.to_le_bytes());
}

fn put_i32(buf: &mut Vec<u8>, v: i32) {
    buf.extend_from_slice(&v.to_le_bytes());
}

/// Serialise a message to its framed wire form: header plus payload
pub fn marshal(msg: &Message) -> Vec<u8> {
    let payload = marshal_payload(msg);
    let header = Header::new(msg.type_code(), payload.len() as u32);

    let mut frame = Vec::with_capacity(Header::SIZE + payload.len());
    put_u32(&mut frame, header.magic);
    put_u32(&mut frame, header.length);
    put_u32(&mut frame, header.msg_type);
    put_u32(&mut frame, header.type_check);
    frame.extend_from_slice(&payload);
    frame
}

/// Serialise just the payload of a message, without the frame header
pub fn marshal_payload(msg: &Message) -> Vec<u8> {
    match msg {
        Message::Open(open) => {
            let mut buf = Vec::with_capacity(28);
            put_i32(&mut buf, open.width);
            put_i32(&mut buf, open.height);
            put_i32(&mut buf, open.video_frame_rate);
            put_i32(&mut buf, open.format);
            put_i32(&mut buf, open.packet_max);
            put_i32(&mut buf, open.i_box_version);
            put_i32(&mut buf, open.phone_work_mode);
            buf
        }
        Message::Touch(touch) => {
            let mut buf = Vec::with_capacity(12);
            put_u32(&mut buf, touch.x);
            put_u32(&mut buf, touch.y);
            put_u32(&mut buf, touch.action.code());
            buf
        }
        Message::VideoData(video) => {
            let mut buf = Vec::with_capacity(20 + video.data.len());
            put_i32(&mut buf, video.width);
            put_i32(&mut buf, video.height);
            put_i32(&mut buf, video.flags);
            put_i32(&mut buf, video.length);
            put_i32(&mut buf, video.unknown2);
            buf.extend_from_slice(&video.data);
            buf
        }
        Message::AudioData(audio) => {
            let mut buf = Vec::with_capacity(16);
            put_u32(&mut buf, audio.decode_type);
            put_u32(&mut buf, audio.volume.to_bits());
            put_i32(&mut buf, audio.audio_type);
            match &audio.tail {
                AudioTail::Command(cmd) => buf.push(cmd.0),
                AudioTail::VolumeDuration(d) => put_i32(&mut buf, *d),
                AudioTail::Pcm(samples) => buf.extend_from_slice(samples),
            }
            buf
        }
        Message::CarPlay(data) | Message::SoftwareVersion(data) => data.clone(),
        Message::BluetoothAddress(s) | Message::BluetoothPin(s) => s.as_bytes().to_vec(),
        Message::BluetoothDeviceName(s)
        | Message::WifiDeviceName(s)
        | Message::BluetoothPairedList(s) => {
            let mut buf = Vec::with_capacity(s.len() + 1);
            buf.extend_from_slice(s.as_bytes());
            buf.push(0);
            buf
        }
        Message::ManufacturerInfo(info) => {
            let mut buf = Vec::with_capacity(8);
            put_u32(&mut buf, info.a);
            put_u32(&mut buf, info.b);
            buf
        }
        Message::SendFile(file) => {
            let name = file.file_name.as_bytes();
            let mut buf = Vec::with_capacity(4 + name.len() + 1 + 4 + file.content.len());
            put_u32(&mut buf, name.len() as u32 + 1);
            buf.extend_from_slice(name);
            buf.push(0);
            put_u32(&mut buf, file.content.len() as u32);
            buf.extend_from_slice(&file.content);
            buf
        }
        Message::Plugged | Message::Unplugged | Message::Heartbeat => Vec::new(),
        Message::Unknown { data, .. } => data.clone(),
    }
}

/// Decode and validate a 16-byte frame header
pub fn unmarshal_header(data: &[u8]) -> Result<Header> {
    if data.len() < Header::SIZE {
        return Err(ProtocolError::ShortHeader { len: data.len() });
    }
    let mut r = Reader::new(&data[..Header::SIZE]);
    let header = Header {
        magic: r.u32()?,
        length: r.u32()?,
        msg_type: r.u32()?,
        type_check: r.u32()?,
    };
    if header.magic != MAGIC {
        return Err(ProtocolError::BadMagic {
            magic: header.magic,
        });
    }
    if header.type_check != !header.msg_type {
        return Err(ProtocolError::BadTypeCheck {
            msg_type: header.msg_type,
            type_check: header.type_check,
        });
    }
    Ok(header)
}

/// Decode a video payload: 20-byte prefix plus exactly `length` NAL bytes
pub fn unmarshal_video(data: &[u8]) -> Result<VideoData> {
    let mut r = Reader::new(data);
    let width = r.i32()?;
    let height = r.i32()?;
    let flags = r.i32()?;
    let length = r.i32()?;
    let unknown2 = r.i32()?;

    let expected = 20usize.saturating_add(length.max(0) as usize);
    if length < 0 || data.len() != expected {
        return Err(ProtocolError::VideoSizeMismatch {
            expected,
            actual: data.len(),
        });
    }

    Ok(VideoData {
        width,
        height,
        flags,
        length,
        unknown2,
        data: r.rest().to_vec(),
    })
}

/// Decode an audio payload: 12-byte prefix, tail selected by remaining length
pub fn unmarshal_audio(data: &[u8]) -> Result<AudioData> {
    if data.len() < 12 {
        return Err(ProtocolError::ShortAudio { len: data.len() });
    }
    let mut r = Reader::new(data);
    let decode_type = r.u32()?;
    let volume = r.f32()?;
    let audio_type = r.i32()?;
    let tail_bytes = r.rest();

    let tail = match tail_bytes.len() {
        1 => AudioTail::Command(AudioCommand(tail_bytes[0])),
        4 => AudioTail::VolumeDuration(i32::from_le_bytes([
            tail_bytes[0],
            tail_bytes[1],
            tail_bytes[2],
            tail_bytes[3],
        ])),
        _ => AudioTail::Pcm(tail_bytes.to_vec()),
    };

    Ok(AudioData {
        decode_type,
        volume,
        audio_type,
        tail,
    })
}

/// String payload up to the first null terminator, lossily decoded
fn null_terminated(data: &[u8]) -> String {
    let end = data.iter().position(|&b| b == 0).unwrap_or(data.len());
    String::from_utf8_lossy(&data[..end]).into_owned()
}

/// Decode any payload into its typed message for a validated header
///
/// Codes outside the registry decode to [`Message::Unknown`]; that is a
/// delivery path, not an error.
pub fn decode_payload(header: &Header, payload: &[u8]) -> Result<Message> {
    let Some(msg_type) = MessageType::from_code(header.msg_type) else {
        return Ok(Message::Unknown {
            msg_type: header.msg_type,
            data: payload.to_vec(),
        });
    };

    let msg = match msg_type {
        MessageType::Open => {
            let mut r = Reader::new(payload);
            Message::Open(Open {
                width: r.i32()?,
                height: r.i32()?,
                video_frame_rate: r.i32()?,
                format: r.i32()?,
                packet_max: r.i32()?,
                i_box_version: r.i32()?,
                phone_work_mode: r.i32()?,
            })
        }
        MessageType::Plugged => Message::Plugged,
        MessageType::Unplugged => Message::Unplugged,
        MessageType::Touch => {
            let mut r = Reader::new(payload);
            let x = r.u32()?;
            let y = r.u32()?;
            let code = r.u32()?;
            let action = TouchAction::from_code(code)
                .ok_or(ProtocolError::InvalidTouchAction { code })?;
            Message::Touch(Touch { x, y, action })
        }
        MessageType::VideoData => Message::VideoData(unmarshal_video(payload)?),
        MessageType::AudioData => Message::AudioData(unmarshal_audio(payload)?),
        MessageType::CarPlay => Message::CarPlay(payload.to_vec()),
        MessageType::BluetoothAddress => {
            Message::BluetoothAddress(String::from_utf8_lossy(payload).into_owned())
        }
        MessageType::BluetoothPin => {
            Message::BluetoothPin(String::from_utf8_lossy(payload).into_owned())
        }
        MessageType::BluetoothDeviceName => Message::BluetoothDeviceName(null_terminated(payload)),
        MessageType::WifiDeviceName => Message::WifiDeviceName(null_terminated(payload)),
        MessageType::BluetoothPairedList => Message::BluetoothPairedList(null_terminated(payload)),
        MessageType::ManufacturerInfo => {
            let mut r = Reader::new(payload);
            Message::ManufacturerInfo(ManufacturerInfo {
                a: r.u32()?,
                b: r.u32()?,
            })
        }
        MessageType::SendFile => {
            let mut r = Reader::new(payload);
            let name_len = r.u32()? as usize;
            let name = null_terminated(r.take(name_len)?);
            let content_len = r.u32()? as usize;
            let content = r.take(content_len)?.to_vec();
            Message::SendFile(SendFile {
                file_name: name,
                content,
            })
        }
        MessageType::Heartbeat => Message::Heartbeat,
        MessageType::SoftwareVersion => Message::SoftwareVersion(payload.to_vec()),
    };
    Ok(msg)
}
