//! Captured media frames
//!
//! A [`Frame`] is one unit of captured media: an opaque payload plus a
//! presentation timestamp and per-kind metadata. Frames are transient; they
//! make one pass through the processing pipeline and are only retained past
//! that when explicitly handed to the recorder or a send call. The payload is
//! reference-counted (`Bytes`), so those hand-offs are cheap clones rather
//! than copies.

use std::time::Duration;

use bytes::Bytes;

/// Media kind of a captured frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Video,
    Audio,
}

/// Pixel layout of a video frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// 8-bit BGRA, 4 bytes per pixel
    Bgra32,
    /// 4:2:0 biplanar luma/chroma, 12 bits per pixel
    Nv12,
    /// 32-bit float depth map, 4 bytes per pixel
    Depth32,
}

impl PixelFormat {
    /// Byte size of one full frame at the given dimensions
    pub fn frame_size(&self, width: u32, height: u32) -> usize {
        let pixels = width as usize * height as usize;
        match self {
            PixelFormat::Bgra32 => pixels * 4,
            PixelFormat::Nv12 => pixels * 3 / 2,
            PixelFormat::Depth32 => pixels * 4,
        }
    }
}

/// Sensor orientation of a video frame relative to upright
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    Upright,
    RotatedLeft,
    RotatedRight,
    UpsideDown,
}

impl Orientation {
    /// Clockwise quarter turns needed to bring the frame upright
    pub fn quarter_turns(&self) -> u32 {
        match self {
            Orientation::Upright => 0,
            Orientation::RotatedLeft => 1,
            Orientation::RotatedRight => 3,
            Orientation::UpsideDown => 2,
        }
    }

    /// Output dimensions after orientation correction
    pub fn corrected_dimensions(&self, width: u32, height: u32) -> (u32, u32) {
        match self.quarter_turns() % 2 {
            0 => (width, height),
            _ => (height, width),
        }
    }
}

/// Metadata carried by a video frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VideoMeta {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub orientation: Orientation,
}

/// Metadata carried by an audio frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioMeta {
    pub sample_rate: u32,
    pub channels: u16,
    pub samples: u32,
}

/// Per-kind frame metadata
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameMeta {
    Video(VideoMeta),
    Audio(AudioMeta),
}

/// One captured media frame
#[derive(Debug, Clone)]
pub struct Frame {
    /// Presentation timestamp relative to capture start
    pub pts: Duration,

    /// Opaque payload (pixel data or PCM samples)
    pub data: Bytes,

    /// Kind-specific metadata
    pub meta: FrameMeta,
}

impl Frame {
    /// Create a video frame
    pub fn video(pts: Duration, data: Bytes, meta: VideoMeta) -> Self {
        Self {
            pts,
            data,
            meta: FrameMeta::Video(meta),
        }
    }

    /// Create an audio frame
    pub fn audio(pts: Duration, data: Bytes, meta: AudioMeta) -> Self {
        Self {
            pts,
            data,
            meta: FrameMeta::Audio(meta),
        }
    }

    /// Media kind of this frame
    pub fn kind(&self) -> MediaKind {
        match self.meta {
            FrameMeta::Video(_) => MediaKind::Video,
            FrameMeta::Audio(_) => MediaKind::Audio,
        }
    }

    /// Video metadata, if this is a video frame
    pub fn video_meta(&self) -> Option<&VideoMeta> {
        match &self.meta {
            FrameMeta::Video(meta) => Some(meta),
            FrameMeta::Audio(_) => None,
        }
    }

    /// Audio metadata, if this is an audio frame
    pub fn audio_meta(&self) -> Option<&AudioMeta> {
        match &self.meta {
            FrameMeta::Audio(meta) => Some(meta),
            FrameMeta::Video(_) => None,
        }
    }
}
