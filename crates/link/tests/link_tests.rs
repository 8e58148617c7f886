//! Link integration tests
//!
//! Exercise the full link over the in-memory transport: attachment,
//! inbound dispatch, outbound writes, heartbeat, reconnect after device
//! loss, and shutdown discipline.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use common::test_utils::{wait_until, DEFAULT_TEST_TIMEOUT};
use link::transport::mock::{MockControl, MockTransport};
use link::{Link, LinkError, LinkEvents, NullEvents};
use protocol::{marshal, unmarshal_header, AudioData, AudioTail, Message, SendFile, VideoData};

#[derive(Default)]
struct CountingSink {
    ready: AtomicUsize,
    videos: AtomicUsize,
    audio: AtomicUsize,
    data: Mutex<Vec<Message>>,
    errors: AtomicUsize,
}

impl CountingSink {
    fn total_events(&self) -> usize {
        self.ready.load(Ordering::Relaxed)
            + self.videos.load(Ordering::Relaxed)
            + self.audio.load(Ordering::Relaxed)
            + self.data.lock().unwrap().len()
            + self.errors.load(Ordering::Relaxed)
    }
}

impl LinkEvents for CountingSink {
    fn on_ready_send(&self) {
        self.ready.fetch_add(1, Ordering::Relaxed);
    }
    fn on_video(&self, _video: VideoData) {
        self.videos.fetch_add(1, Ordering::Relaxed);
    }
    fn on_audio(&self, _audio: AudioData) {
        self.audio.fetch_add(1, Ordering::Relaxed);
    }
    fn on_data(&self, message: Message) {
        self.data.lock().unwrap().push(message);
    }
    fn on_error(&self, _error: &LinkError) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }
}

fn started_link() -> (Link, MockControl, Arc<CountingSink>) {
    let (transport, control) = MockTransport::new();
    let sink = Arc::new(CountingSink::default());
    let mut link = Link::new();
    link.start(Box::new(transport), sink.clone())
        .expect("link should start");
    (link, control, sink)
}

#[test]
fn test_attach_fires_ready_once() {
    let (mut link, control, sink) = started_link();

    assert!(wait_until(DEFAULT_TEST_TIMEOUT, || {
        sink.ready.load(Ordering::Relaxed) == 1
    }));
    assert_eq!(control.open_count(), 1);

    link.stop();
    assert_eq!(sink.ready.load(Ordering::Relaxed), 1);
}

#[test]
fn test_inbound_media_dispatch() {
    let (mut link, control, sink) = started_link();
    assert!(wait_until(DEFAULT_TEST_TIMEOUT, || {
        sink.ready.load(Ordering::Relaxed) == 1
    }));

    let video = Message::VideoData(VideoData {
        width: 1280,
        height: 720,
        flags: 0,
        length: 4,
        unknown2: 0,
        data: vec![0, 0, 0, 1],
    });
    let audio = Message::AudioData(AudioData {
        decode_type: 3,
        volume: 1.0,
        audio_type: 1,
        tail: AudioTail::Pcm(vec![0x55; 64]),
    });

    let mut stream = marshal(&video);
    stream.extend_from_slice(&marshal(&audio));
    stream.extend_from_slice(&marshal(&Message::Plugged));
    control.push_inbound(&stream);

    assert!(wait_until(DEFAULT_TEST_TIMEOUT, || {
        sink.videos.load(Ordering::Relaxed) == 1
            && sink.audio.load(Ordering::Relaxed) == 1
            && !sink.data.lock().unwrap().is_empty()
    }));
    assert_eq!(sink.data.lock().unwrap()[0], Message::Plugged);
    assert_eq!(sink.errors.load(Ordering::Relaxed), 0);

    link.stop();
}

#[test]
fn test_outbound_messages_reach_the_wire() {
    let (mut link, control, sink) = started_link();
    assert!(wait_until(DEFAULT_TEST_TIMEOUT, || {
        sink.ready.load(Ordering::Relaxed) == 1
    }));

    let file = Message::SendFile(SendFile::with_i32("/tmp/screen_dpi", 160));
    link.send(file.clone()).unwrap();

    assert!(wait_until(DEFAULT_TEST_TIMEOUT, || {
        control.writes().iter().any(|w| w == &marshal(&file))
            || control
                .writes()
                .iter()
                .any(|w| w.windows(marshal(&file).len()).any(|c| c == marshal(&file)))
    }));

    link.stop();
}

#[test]
fn test_heartbeat_on_idle() {
    let (mut link, control, sink) = started_link();
    assert!(wait_until(DEFAULT_TEST_TIMEOUT, || {
        sink.ready.load(Ordering::Relaxed) == 1
    }));

    // No outbound traffic: a header-only heartbeat frame appears within
    // the heartbeat period plus slack
    assert!(wait_until(Duration::from_secs(4), || {
        control.writes().iter().any(|w| {
            w.len() == 16 && unmarshal_header(w).map(|h| h.msg_type) == Ok(0xAA)
        })
    }));
    // and with an idle queue, heartbeats are the only traffic
    assert!(control
        .writes()
        .iter()
        .all(|w| unmarshal_header(w).map(|h| h.msg_type) == Ok(0xAA)));

    link.stop();
}

#[test]
fn test_reconnect_after_device_loss() {
    let (mut link, control, sink) = started_link();
    assert!(wait_until(DEFAULT_TEST_TIMEOUT, || {
        sink.ready.load(Ordering::Relaxed) == 1
    }));

    control.unplug();
    // Both siblings observe the dead attachment and the supervisor goes
    // back to discovery, which keeps failing while unplugged
    std::thread::sleep(Duration::from_millis(100));
    control.plug();

    assert!(wait_until(Duration::from_secs(10), || {
        sink.ready.load(Ordering::Relaxed) == 2
    }));
    assert_eq!(control.open_count(), 2);

    link.stop();
}

#[test]
fn test_discovery_waits_for_device() {
    let (transport, control) = MockTransport::new();
    control.unplug();

    let sink = Arc::new(CountingSink::default());
    let mut link = Link::new();
    link.start(Box::new(transport), sink.clone()).unwrap();

    // Nothing to attach to yet; start does not block or fire ready
    std::thread::sleep(Duration::from_millis(100));
    assert_eq!(sink.ready.load(Ordering::Relaxed), 0);

    control.plug();
    assert!(wait_until(Duration::from_secs(10), || {
        sink.ready.load(Ordering::Relaxed) == 1
    }));

    link.stop();
}

#[test]
fn test_no_callbacks_after_stop() {
    let (mut link, control, sink) = started_link();
    assert!(wait_until(DEFAULT_TEST_TIMEOUT, || {
        sink.ready.load(Ordering::Relaxed) == 1
    }));

    link.stop();
    let settled = sink.total_events();

    // Data queued after stop must never surface
    control.push_inbound(&marshal(&Message::Plugged));
    std::thread::sleep(Duration::from_millis(200));
    assert_eq!(sink.total_events(), settled);
}

#[test]
fn test_messages_queued_before_attach_are_sent() {
    let (transport, control) = MockTransport::new();
    control.unplug();

    let mut link = Link::new();
    link.start(Box::new(transport), Arc::new(NullEvents)).unwrap();

    let msg = Message::SendFile(SendFile::with_i32("/tmp/night_mode", 1));
    link.send(msg.clone()).unwrap();

    control.plug();
    assert!(wait_until(Duration::from_secs(10), || {
        control
            .writes()
            .iter()
            .any(|w| w.windows(marshal(&msg).len()).any(|c| c == marshal(&msg)))
    }));

    link.stop();
}

#[test]
fn test_stop_joins_within_deadline() {
    let (mut link, _control, sink) = started_link();
    assert!(wait_until(DEFAULT_TEST_TIMEOUT, || {
        sink.ready.load(Ordering::Relaxed) == 1
    }));

    let start = std::time::Instant::now();
    link.stop();
    assert!(start.elapsed() < link::SHUTDOWN_DEADLINE);
    assert!(!link.is_running());
}
