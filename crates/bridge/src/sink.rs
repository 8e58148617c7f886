//! Link event sink for the bridge
//!
//! Routes link callbacks into logs and counters, optionally dumps the
//! H.264 elementary stream to a file, and signals the main task when the
//! dongle becomes ready so it can run session init.

use std::fs::File;
use std::io::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use link::{LinkError, LinkEvents};
use protocol::{AudioTail, Message, VideoData};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, warn};

/// Log a video stats line once per this many frames
const STATS_FRAME_INTERVAL: u64 = 300;

pub struct BridgeSink {
    ready_tx: UnboundedSender<()>,
    video_frames: AtomicU64,
    video_bytes: AtomicU64,
    audio_packets: AtomicU64,
    dump: Option<Mutex<File>>,
}

impl BridgeSink {
    pub fn new(ready_tx: UnboundedSender<()>, dump: Option<File>) -> Self {
        Self {
            ready_tx,
            video_frames: AtomicU64::new(0),
            video_bytes: AtomicU64::new(0),
            audio_packets: AtomicU64::new(0),
            dump: dump.map(Mutex::new),
        }
    }
}

impl LinkEvents for BridgeSink {
    fn on_ready_send(&self) {
        info!("dongle ready");
        let _ = self.ready_tx.send(());
    }

    fn on_video(&self, video: VideoData) {
        let frames = self.video_frames.fetch_add(1, Ordering::Relaxed) + 1;
        let bytes = self
            .video_bytes
            .fetch_add(video.data.len() as u64, Ordering::Relaxed)
            + video.data.len() as u64;

        if frames % STATS_FRAME_INTERVAL == 0 {
            info!(
                "video: {} frames, {} KB, {}x{}",
                frames,
                bytes / 1024,
                video.width,
                video.height
            );
        }

        if let Some(dump) = &self.dump {
            if let Err(e) = dump.lock().unwrap().write_all(&video.data) {
                warn!("video dump write failed: {}", e);
            }
        }
    }

    fn on_audio(&self, audio: protocol::AudioData) {
        self.audio_packets.fetch_add(1, Ordering::Relaxed);
        match &audio.tail {
            AudioTail::Command(cmd) => debug!("audio command: {:?}", cmd),
            AudioTail::VolumeDuration(d) => {
                debug!("volume change to {} over {} ms", audio.volume, d)
            }
            AudioTail::Pcm(samples) => {
                if let Some(info) = audio.decode_info() {
                    debug!(
                        "audio: {} bytes PCM at {} Hz / {} ch",
                        samples.len(),
                        info.frequency,
                        info.channels
                    );
                } else {
                    warn!("audio packet with unknown decode type {}", audio.decode_type);
                }
            }
        }
    }

    fn on_data(&self, message: Message) {
        match message {
            Message::Plugged => info!("phone plugged"),
            Message::Unplugged => info!("phone unplugged"),
            Message::BluetoothAddress(addr) => debug!("bluetooth address: {}", addr),
            Message::BluetoothPin(pin) => debug!("bluetooth pin: {}", pin),
            Message::BluetoothDeviceName(name) => debug!("bluetooth device name: {}", name),
            Message::WifiDeviceName(name) => debug!("wifi device name: {}", name),
            Message::BluetoothPairedList(list) => debug!("paired devices: {}", list),
            Message::SoftwareVersion(version) => {
                info!("dongle software: {}", String::from_utf8_lossy(&version))
            }
            Message::Unknown { msg_type, data } => {
                debug!("unknown packet type {:#04x}, {} bytes", msg_type, data.len())
            }
            other => debug!("packet: {:?}", other),
        }
    }

    fn on_error(&self, error: &LinkError) {
        warn!("link error: {}", error);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use protocol::AudioData;

    fn sink() -> (BridgeSink, tokio::sync::mpsc::UnboundedReceiver<()>) {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        (BridgeSink::new(tx, None), rx)
    }

    #[test]
    fn test_ready_signals_main() {
        let (sink, mut rx) = sink();
        sink.on_ready_send();
        assert!(rx.try_recv().is_ok());
    }

    #[test]
    fn test_video_counters() {
        let (sink, _rx) = sink();
        for _ in 0..3 {
            sink.on_video(VideoData {
                width: 1280,
                height: 720,
                flags: 0,
                length: 100,
                unknown2: 0,
                data: vec![0; 100],
            });
        }
        assert_eq!(sink.video_frames.load(Ordering::Relaxed), 3);
        assert_eq!(sink.video_bytes.load(Ordering::Relaxed), 300);
    }

    #[test]
    fn test_video_dump_writes_nal_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stream.h264");
        let file = File::create(&path).unwrap();

        let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();
        let sink = BridgeSink::new(tx, Some(file));
        sink.on_video(VideoData {
            width: 1280,
            height: 720,
            flags: 0,
            length: 4,
            unknown2: 0,
            data: vec![0, 0, 0, 1],
        });

        assert_eq!(std::fs::read(&path).unwrap(), vec![0, 0, 0, 1]);
    }

    #[test]
    fn test_audio_packet_counter() {
        let (sink, _rx) = sink();
        sink.on_audio(AudioData {
            decode_type: 3,
            volume: 1.0,
            audio_type: 1,
            tail: AudioTail::Pcm(vec![0; 64]),
        });
        sink.on_audio(AudioData {
            decode_type: 999,
            volume: 1.0,
            audio_type: 1,
            tail: AudioTail::Pcm(vec![0; 64]),
        });
        assert_eq!(sink.audio_packets.load(Ordering::Relaxed), 2);
    }
}
