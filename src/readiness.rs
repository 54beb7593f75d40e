//! Streaming readiness
//!
//! Decides when network distribution should be running. Distribution starts
//! automatically once the capture device and the control server are both up,
//! unless the user has explicitly stopped streaming; an explicit start from
//! the user always wins. Flag updates and the resulting start decision happen
//! under one lock, so concurrent updates produce a single ordered sequence of
//! decisions and at most one session.

use std::sync::{Arc, Mutex};

use crate::sender::DistributionSender;

/// Inputs to the auto-start decision
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadinessFlag {
    /// Capture device is delivering frames
    CameraReady,
    /// Control server is accepting requests
    WebServerReady,
    /// User explicitly stopped streaming
    UserStoppedStreaming,
}

#[derive(Debug, Default)]
struct Flags {
    camera_ready: bool,
    web_server_ready: bool,
    user_stopped: bool,
}

impl Flags {
    fn should_stream(&self) -> bool {
        self.camera_ready && self.web_server_ready && !self.user_stopped
    }
}

/// Gates distribution start-up on system readiness
pub struct ReadinessCoordinator {
    sender: Arc<DistributionSender>,
    stream_name: String,
    flags: Mutex<Flags>,
}

impl ReadinessCoordinator {
    pub fn new(sender: Arc<DistributionSender>, stream_name: impl Into<String>) -> Self {
        Self {
            sender,
            stream_name: stream_name.into(),
            flags: Mutex::new(Flags::default()),
        }
    }

    /// True while a distribution session is active
    pub fn streaming_started(&self) -> bool {
        self.sender.is_sending()
    }

    /// Update one readiness flag and re-evaluate the auto-start condition
    pub fn set_flag(&self, flag: ReadinessFlag, value: bool) {
        let flags = &mut *self.flags.lock().unwrap();
        match flag {
            ReadinessFlag::CameraReady => flags.camera_ready = value,
            ReadinessFlag::WebServerReady => flags.web_server_ready = value,
            ReadinessFlag::UserStoppedStreaming => flags.user_stopped = value,
        }

        if flags.should_stream() {
            if let Err(e) = self.sender.start(&self.stream_name) {
                tracing::error!(error = %e, "failed to start distribution");
            }
        }
    }

    /// Explicit user start; clears the stop override
    pub fn user_start_streaming(&self) {
        let flags = &mut *self.flags.lock().unwrap();
        flags.user_stopped = false;
        if let Err(e) = self.sender.start(&self.stream_name) {
            tracing::error!(error = %e, "failed to start distribution");
        }
    }

    /// Explicit user stop; suppresses auto-start until the next user start
    pub fn user_stop_streaming(&self) {
        let flags = &mut *self.flags.lock().unwrap();
        flags.user_stopped = true;
        self.sender.stop();
    }

    /// Propagate a capture format change to the distribution path
    pub fn did_preset_change(&self, width: u32, height: u32) {
        self.sender.on_preset_changed(width, height);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use crate::frame::{Frame, PixelFormat};
    use crate::pool::{PooledBuffer, SharedBufferPool};
    use crate::sender::TransportSender;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingTransport {
        starts: AtomicUsize,
        stops: AtomicUsize,
    }

    impl TransportSender for CountingTransport {
        fn start(&self, _stream_name: &str) -> Result<()> {
            self.starts.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn stop(&self) {
            self.stops.fetch_add(1, Ordering::SeqCst);
        }

        fn send_video(&self, _buffer: &PooledBuffer) {}

        fn send_audio(&self, _frame: &Frame) {}
    }

    fn coordinator() -> (Arc<CountingTransport>, ReadinessCoordinator) {
        let transport = Arc::new(CountingTransport::default());
        let pools = Arc::new(SharedBufferPool::new(PixelFormat::Bgra32, 4));
        let sender = Arc::new(DistributionSender::new(
            Arc::clone(&transport) as Arc<dyn TransportSender>,
            pools,
        ));
        let coordinator = ReadinessCoordinator::new(sender, "test");
        (transport, coordinator)
    }

    #[test]
    fn test_no_start_until_both_ready() {
        let (transport, coordinator) = coordinator();

        coordinator.set_flag(ReadinessFlag::CameraReady, true);
        assert!(!coordinator.streaming_started());
        assert_eq!(transport.starts.load(Ordering::SeqCst), 0);

        coordinator.set_flag(ReadinessFlag::WebServerReady, true);
        assert!(coordinator.streaming_started());
        assert_eq!(transport.starts.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_redundant_flag_updates_open_one_session() {
        let (transport, coordinator) = coordinator();

        coordinator.set_flag(ReadinessFlag::CameraReady, true);
        coordinator.set_flag(ReadinessFlag::WebServerReady, true);
        coordinator.set_flag(ReadinessFlag::CameraReady, true);
        coordinator.set_flag(ReadinessFlag::WebServerReady, true);

        // Re-evaluation is idempotent at the sender.
        assert_eq!(transport.starts.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_user_stop_suppresses_auto_start() {
        let (transport, coordinator) = coordinator();

        coordinator.set_flag(ReadinessFlag::UserStoppedStreaming, true);
        coordinator.set_flag(ReadinessFlag::CameraReady, true);
        coordinator.set_flag(ReadinessFlag::WebServerReady, true);

        assert!(!coordinator.streaming_started());
        assert_eq!(transport.starts.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_user_stop_then_start_resumes() {
        let (transport, coordinator) = coordinator();

        coordinator.set_flag(ReadinessFlag::CameraReady, true);
        coordinator.set_flag(ReadinessFlag::WebServerReady, true);
        assert!(coordinator.streaming_started());

        coordinator.user_stop_streaming();
        assert!(!coordinator.streaming_started());
        assert_eq!(transport.stops.load(Ordering::SeqCst), 1);

        // Readiness flags alone no longer restart it.
        coordinator.set_flag(ReadinessFlag::CameraReady, true);
        assert!(!coordinator.streaming_started());

        coordinator.user_start_streaming();
        assert!(coordinator.streaming_started());
        assert_eq!(transport.starts.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_user_start_before_readiness() {
        let (transport, coordinator) = coordinator();

        // An explicit start does not wait for the readiness flags.
        coordinator.user_start_streaming();
        assert!(coordinator.streaming_started());
        assert_eq!(transport.starts.load(Ordering::SeqCst), 1);
    }
}
