//! Logging transport
//!
//! Stand-in for a real network sender: accounts for every frame it is handed
//! and logs session open/close with totals. Useful for demos and for
//! observing pipeline throughput without a receiver.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use crate::error::Result;
use crate::frame::Frame;
use crate::pool::PooledBuffer;
use crate::sender::TransportSender;

/// Counts and logs instead of sending
pub struct LoggingTransport {
    active: Mutex<Option<String>>,
    video_frames: AtomicU64,
    audio_frames: AtomicU64,
    video_bytes: AtomicU64,
}

impl LoggingTransport {
    pub fn new() -> Self {
        Self {
            active: Mutex::new(None),
            video_frames: AtomicU64::new(0),
            audio_frames: AtomicU64::new(0),
            video_bytes: AtomicU64::new(0),
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.lock().unwrap().is_some()
    }

    pub fn video_frames(&self) -> u64 {
        self.video_frames.load(Ordering::Relaxed)
    }

    pub fn audio_frames(&self) -> u64 {
        self.audio_frames.load(Ordering::Relaxed)
    }
}

impl Default for LoggingTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl TransportSender for LoggingTransport {
    fn start(&self, stream_name: &str) -> Result<()> {
        let mut active = self.active.lock().unwrap();
        if let Some(previous) = active.replace(stream_name.to_string()) {
            tracing::warn!(stream = %previous, "transport session replaced");
        }
        tracing::info!(stream = %stream_name, "transport session opened");
        Ok(())
    }

    fn stop(&self) {
        if let Some(stream) = self.active.lock().unwrap().take() {
            tracing::info!(
                stream = %stream,
                video_frames = self.video_frames.load(Ordering::Relaxed),
                audio_frames = self.audio_frames.load(Ordering::Relaxed),
                video_bytes = self.video_bytes.load(Ordering::Relaxed),
                "transport session closed"
            );
        }
    }

    fn send_video(&self, buffer: &PooledBuffer) {
        self.video_frames.fetch_add(1, Ordering::Relaxed);
        self.video_bytes
            .fetch_add(buffer.len() as u64, Ordering::Relaxed);
        tracing::trace!(
            width = buffer.width(),
            height = buffer.height(),
            "video frame out"
        );
    }

    fn send_audio(&self, frame: &Frame) {
        self.audio_frames.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(bytes = frame.data.len(), "audio frame out");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{AudioMeta, PixelFormat};
    use crate::pool::PixelBufferPool;
    use bytes::Bytes;
    use std::time::Duration;

    #[test]
    fn test_session_lifecycle() {
        let transport = LoggingTransport::new();
        assert!(!transport.is_active());

        transport.start("demo").unwrap();
        assert!(transport.is_active());

        transport.stop();
        assert!(!transport.is_active());
    }

    #[test]
    fn test_frame_accounting() {
        let transport = LoggingTransport::new();
        transport.start("demo").unwrap();

        let pool = PixelBufferPool::new(2, 2, PixelFormat::Bgra32, 1);
        let buffer = pool.acquire().unwrap();
        transport.send_video(&buffer);
        transport.send_video(&buffer);

        let audio = Frame::audio(
            Duration::ZERO,
            Bytes::from_static(&[0u8; 4]),
            AudioMeta {
                sample_rate: 48_000,
                channels: 1,
                samples: 2,
            },
        );
        transport.send_audio(&audio);

        assert_eq!(transport.video_frames(), 2);
        assert_eq!(transport.audio_frames(), 1);
    }
}
