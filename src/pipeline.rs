//! Frame pipeline
//!
//! Fan-out point for captured media. Every video frame goes to the recorder
//! as-is and through the bounded renderer toward the network; depth maps stop
//! at the recorder; audio bypasses rendering entirely. A frame that cannot
//! enter the render stage (pool exhausted, render rejected) is dropped and
//! counted; capture never stalls on a slow consumer.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::frame::{Frame, FrameMeta, PixelFormat};
use crate::orchestrator::FrameSink;
use crate::recorder::Recorder;
use crate::render::{BokehParams, BoundedRenderer, RenderRequest};
use crate::sender::DistributionSender;

/// Routes captured frames into recording and distribution
pub struct FramePipeline {
    renderer: Arc<BoundedRenderer>,
    sender: Arc<DistributionSender>,
    recorder: Arc<Recorder>,
    bokeh: Mutex<Option<BokehParams>>,
    frames_dropped: AtomicU64,
}

impl FramePipeline {
    pub fn new(
        renderer: Arc<BoundedRenderer>,
        sender: Arc<DistributionSender>,
        recorder: Arc<Recorder>,
    ) -> Self {
        Self {
            renderer,
            sender,
            recorder,
            bokeh: Mutex::new(None),
            frames_dropped: AtomicU64::new(0),
        }
    }

    /// Video frames dropped before reaching the compositor
    pub fn frames_dropped(&self) -> u64 {
        self.frames_dropped.load(Ordering::Relaxed)
    }

    /// Replace the bokeh filter applied to outgoing video; `None` disables it
    pub fn set_bokeh(&self, params: Option<BokehParams>) {
        *self.bokeh.lock().unwrap() = params;
    }

    pub fn bokeh(&self) -> Option<BokehParams> {
        *self.bokeh.lock().unwrap()
    }

    fn deliver_video(&self, frame: Frame) {
        self.recorder.record(frame.clone());

        let request = RenderRequest {
            frame,
            filter: self.bokeh(),
        };
        let sender = Arc::clone(&self.sender);
        if let Err(e) = self
            .renderer
            .render(request, move |buffer| sender.send_video(&buffer))
        {
            self.frames_dropped.fetch_add(1, Ordering::Relaxed);
            tracing::warn!(error = %e, "video frame dropped");
        }
    }

    fn deliver_audio(&self, frame: Frame) {
        self.recorder.record(frame.clone());
        self.sender.send_audio(&frame);
    }
}

impl FrameSink for FramePipeline {
    fn deliver(&self, frame: Frame) {
        match frame.meta {
            // Depth maps are archived but never composited for the network.
            FrameMeta::Video(meta) if meta.format == PixelFormat::Depth32 => {
                self.recorder.record(frame);
            }
            FrameMeta::Video(_) => self.deliver_video(frame),
            FrameMeta::Audio(_) => self.deliver_audio(frame),
        }
    }
}
