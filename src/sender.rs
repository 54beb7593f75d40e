//! Distribution sender
//!
//! Wraps the network transport and gates every outbound send behind the
//! `sending` flag. Video and audio arrive from the capture side; start, stop,
//! and preset changes arrive from the control plane. The flag and the
//! transport session are guarded by one lock so a start can never open a
//! second session and a stop always clears the flag before tearing the
//! session down.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::error::Result;
use crate::frame::Frame;
use crate::pool::{PooledBuffer, SharedBufferPool};

/// Network streaming transport
pub trait TransportSender: Send + Sync {
    /// Open a session advertised under `stream_name`
    fn start(&self, stream_name: &str) -> Result<()>;

    /// Tear the session down
    fn stop(&self);

    /// Send one video buffer; only called between `start` and `stop`
    fn send_video(&self, buffer: &PooledBuffer);

    /// Send one audio frame; only called between `start` and `stop`
    fn send_audio(&self, frame: &Frame);
}

struct SendState {
    sending: bool,
    stream_name: Option<String>,
}

/// Gates outbound sends and owns the pool lifecycle across preset changes
pub struct DistributionSender {
    transport: Arc<dyn TransportSender>,
    pools: Arc<SharedBufferPool>,
    state: Mutex<SendState>,
    video_sent: AtomicU64,
    audio_sent: AtomicU64,
    video_dropped: AtomicU64,
}

impl DistributionSender {
    pub fn new(transport: Arc<dyn TransportSender>, pools: Arc<SharedBufferPool>) -> Self {
        Self {
            transport,
            pools,
            state: Mutex::new(SendState {
                sending: false,
                stream_name: None,
            }),
            video_sent: AtomicU64::new(0),
            audio_sent: AtomicU64::new(0),
            video_dropped: AtomicU64::new(0),
        }
    }

    /// True while a transport session is open
    pub fn is_sending(&self) -> bool {
        self.state.lock().unwrap().sending
    }

    /// Video buffers sent since creation
    pub fn video_sent(&self) -> u64 {
        self.video_sent.load(Ordering::Relaxed)
    }

    /// Audio frames sent since creation
    pub fn audio_sent(&self) -> u64 {
        self.audio_sent.load(Ordering::Relaxed)
    }

    /// Video buffers dropped for stale dimensions
    pub fn video_dropped(&self) -> u64 {
        self.video_dropped.load(Ordering::Relaxed)
    }

    /// Begin sending under `stream_name`
    ///
    /// Idempotent: calling while already sending re-asserts state without
    /// opening a second transport session.
    pub fn start(&self, stream_name: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.sending {
            tracing::debug!(stream = %stream_name, "already sending");
            return Ok(());
        }

        self.transport.start(stream_name)?;
        state.sending = true;
        state.stream_name = Some(stream_name.to_string());
        tracing::info!(stream = %stream_name, "distribution started");
        Ok(())
    }

    /// Stop sending
    ///
    /// Clears the sending flag before tearing down the transport session, so
    /// no new sends are admitted into a closing session. Idempotent.
    pub fn stop(&self) {
        let mut state = self.state.lock().unwrap();
        if !state.sending {
            return;
        }

        state.sending = false;
        self.transport.stop();
        tracing::info!("distribution stopped");
    }

    /// Send one rendered video buffer
    ///
    /// A no-op while not sending. Buffers whose dimensions do not match the
    /// current pool are stale leftovers from before a preset change and are
    /// dropped.
    pub fn send_video(&self, buffer: &PooledBuffer) {
        if !self.is_sending() {
            return;
        }

        if let Some((width, height)) = self.pools.dimensions() {
            if buffer.width() != width || buffer.height() != height {
                self.video_dropped.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(
                    buffer_width = buffer.width(),
                    buffer_height = buffer.height(),
                    width,
                    height,
                    "dropping stale buffer after pool rebuild"
                );
                return;
            }
        }

        self.transport.send_video(buffer);
        self.video_sent.fetch_add(1, Ordering::Relaxed);
    }

    /// Send one audio frame; a no-op while not sending
    pub fn send_audio(&self, frame: &Frame) {
        if !self.is_sending() {
            return;
        }

        self.transport.send_audio(frame);
        self.audio_sent.fetch_add(1, Ordering::Relaxed);
    }

    /// React to a resolution preset change
    ///
    /// While sending: stop, rebuild the pool at the new dimensions, restart.
    /// The stream therefore never advertises dimensions that diverge from the
    /// pool. While stopped, only the pool is rebuilt.
    pub fn on_preset_changed(&self, width: u32, height: u32) {
        let mut state = self.state.lock().unwrap();
        if !state.sending {
            self.pools.rebuild(width, height);
            return;
        }

        state.sending = false;
        self.transport.stop();
        self.pools.rebuild(width, height);

        let stream_name = state.stream_name.clone().unwrap_or_default();
        match self.transport.start(&stream_name) {
            Ok(()) => {
                state.sending = true;
                tracing::info!(stream = %stream_name, width, height, "distribution restarted at new preset");
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to restart distribution after preset change");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{AudioMeta, PixelFormat};
    use bytes::Bytes;
    use std::time::Duration;

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum TransportEvent {
        Start(String),
        Stop,
        Video(u32, u32),
        Audio,
    }

    /// Records every call in order and counts open sessions
    struct MockTransport {
        events: Mutex<Vec<TransportEvent>>,
        sessions_opened: AtomicU64,
        fail_start: Mutex<bool>,
    }

    impl MockTransport {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                events: Mutex::new(Vec::new()),
                sessions_opened: AtomicU64::new(0),
                fail_start: Mutex::new(false),
            })
        }

        fn events(&self) -> Vec<TransportEvent> {
            self.events.lock().unwrap().clone()
        }
    }

    impl TransportSender for MockTransport {
        fn start(&self, stream_name: &str) -> Result<()> {
            if *self.fail_start.lock().unwrap() {
                return Err(crate::error::EngineError::DeviceUnavailable(
                    "transport down".to_string(),
                ));
            }
            self.sessions_opened.fetch_add(1, Ordering::SeqCst);
            self.events
                .lock()
                .unwrap()
                .push(TransportEvent::Start(stream_name.to_string()));
            Ok(())
        }

        fn stop(&self) {
            self.events.lock().unwrap().push(TransportEvent::Stop);
        }

        fn send_video(&self, buffer: &PooledBuffer) {
            self.events
                .lock()
                .unwrap()
                .push(TransportEvent::Video(buffer.width(), buffer.height()));
        }

        fn send_audio(&self, _frame: &Frame) {
            self.events.lock().unwrap().push(TransportEvent::Audio);
        }
    }

    fn audio_frame() -> Frame {
        Frame::audio(
            Duration::ZERO,
            Bytes::from_static(&[0u8; 8]),
            AudioMeta {
                sample_rate: 48_000,
                channels: 1,
                samples: 4,
            },
        )
    }

    fn sender_with_pool(width: u32, height: u32) -> (DistributionSender, Arc<MockTransport>) {
        let transport = MockTransport::new();
        let pools = Arc::new(SharedBufferPool::new(PixelFormat::Bgra32, 4));
        pools.rebuild(width, height);
        let sender = DistributionSender::new(transport.clone() as Arc<dyn TransportSender>, pools);
        (sender, transport)
    }

    #[test]
    fn test_sends_blocked_while_stopped() {
        let (sender, transport) = sender_with_pool(64, 32);
        let buffer = sender.pools.current().unwrap().acquire().unwrap();

        sender.send_video(&buffer);
        sender.send_audio(&audio_frame());

        assert!(transport.events().is_empty());
        assert_eq!(sender.video_sent(), 0);
        assert_eq!(sender.audio_sent(), 0);
    }

    #[test]
    fn test_sends_pass_through_in_order_while_started() {
        let (sender, transport) = sender_with_pool(64, 32);
        sender.start("studio").unwrap();

        let buffer = sender.pools.current().unwrap().acquire().unwrap();
        sender.send_video(&buffer);
        sender.send_audio(&audio_frame());
        sender.send_video(&buffer);

        assert_eq!(
            transport.events(),
            vec![
                TransportEvent::Start("studio".to_string()),
                TransportEvent::Video(64, 32),
                TransportEvent::Audio,
                TransportEvent::Video(64, 32),
            ]
        );
    }

    #[test]
    fn test_start_is_idempotent() {
        let (sender, transport) = sender_with_pool(64, 32);

        sender.start("studio").unwrap();
        sender.start("studio").unwrap();
        sender.start("studio").unwrap();

        assert_eq!(transport.sessions_opened.load(Ordering::SeqCst), 1);
        assert!(sender.is_sending());
    }

    #[test]
    fn test_stop_is_idempotent() {
        let (sender, transport) = sender_with_pool(64, 32);
        sender.start("studio").unwrap();

        sender.stop();
        sender.stop();

        let stops = transport
            .events()
            .iter()
            .filter(|e| **e == TransportEvent::Stop)
            .count();
        assert_eq!(stops, 1);
        assert!(!sender.is_sending());
    }

    #[test]
    fn test_flag_cleared_before_teardown() {
        let (sender, transport) = sender_with_pool(64, 32);
        sender.start("studio").unwrap();
        sender.stop();

        // A send admitted after stop must not reach the transport.
        let buffer = sender.pools.current().unwrap().acquire().unwrap();
        sender.send_video(&buffer);

        assert_eq!(
            transport.events(),
            vec![
                TransportEvent::Start("studio".to_string()),
                TransportEvent::Stop,
            ]
        );
    }

    #[test]
    fn test_preset_change_stops_rebuilds_restarts() {
        let (sender, transport) = sender_with_pool(1280, 720);
        sender.start("studio").unwrap();

        let old_buffer = sender.pools.current().unwrap().acquire().unwrap();
        sender.on_preset_changed(1920, 1080);

        assert!(sender.is_sending());
        assert_eq!(sender.pools.dimensions(), Some((1920, 1080)));
        assert_eq!(
            transport.events(),
            vec![
                TransportEvent::Start("studio".to_string()),
                TransportEvent::Stop,
                TransportEvent::Start("studio".to_string()),
            ]
        );

        // A buffer rendered from the old pool is stale and never sent.
        sender.send_video(&old_buffer);
        assert_eq!(sender.video_dropped(), 1);
        assert_eq!(transport.events().len(), 3);

        // Buffers from the rebuilt pool flow normally.
        let new_buffer = sender.pools.current().unwrap().acquire().unwrap();
        sender.send_video(&new_buffer);
        assert_eq!(
            transport.events().last(),
            Some(&TransportEvent::Video(1920, 1080))
        );
    }

    #[test]
    fn test_preset_change_while_stopped_only_rebuilds() {
        let (sender, transport) = sender_with_pool(1280, 720);

        sender.on_preset_changed(1920, 1080);

        assert!(!sender.is_sending());
        assert_eq!(sender.pools.dimensions(), Some((1920, 1080)));
        assert!(transport.events().is_empty());
    }

    #[test]
    fn test_preset_change_restart_failure_leaves_stopped() {
        let (sender, transport) = sender_with_pool(1280, 720);
        sender.start("studio").unwrap();

        *transport.fail_start.lock().unwrap() = true;
        sender.on_preset_changed(1920, 1080);

        assert!(!sender.is_sending());
        assert_eq!(sender.pools.dimensions(), Some((1920, 1080)));
    }
}
