//! Segment file recording backend
//!
//! Serializes captured frames into a simple tagged container, one recording
//! per file. The layout is length-prefixed so a reader can skip tags it does
//! not understand:
//!
//! ```text
//! +============+=======+=======+
//! | Header(6B) | Tag 1 | Tag 2 | ...
//! +============+=======+=======+
//!
//! Header: "CCAP" + Version(1) + Flags(1)
//!
//! Video tag:
//! +--------+---------+-----------+----------+-----------+-----------+---------+
//! | Type(1)| Size(4) | PtsMs(4)  | Width(4) | Height(4) | Format(1) | Payload |
//! +--------+---------+-----------+----------+-----------+-----------+---------+
//!
//! Audio tag:
//! +--------+---------+-----------+---------+-------------+------------+---------+
//! | Type(1)| Size(4) | PtsMs(4)  | Rate(4) | Channels(2) | Samples(4) | Payload |
//! +--------+---------+-----------+---------+-------------+------------+---------+
//! ```
//!
//! All integers are big-endian. Timestamps are normalized so the first tag in
//! a file starts at zero regardless of how long capture ran before the
//! recording began.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::Result;
use crate::frame::{Frame, FrameMeta, PixelFormat};
use crate::recorder::{ContainerWriter, WriterFactory};

/// Segment file signature: "CCAP" in ASCII
const SEGMENT_SIGNATURE: [u8; 4] = [0x43, 0x43, 0x41, 0x50];

/// Segment format version
const SEGMENT_VERSION: u8 = 1;

/// Flags bit 0: the file may contain audio tags
const FLAG_HAS_AUDIO: u8 = 0x01;

/// Header is signature + version + flags
const SEGMENT_HEADER_SIZE: u64 = 6;

/// Tag type codes
const TAG_AUDIO: u8 = 8;
const TAG_VIDEO: u8 = 9;

/// Fixed bytes before the payload, per tag type
const VIDEO_TAG_HEADER_SIZE: u64 = 18;
const AUDIO_TAG_HEADER_SIZE: u64 = 19;

fn format_code(format: PixelFormat) -> u8 {
    match format {
        PixelFormat::Bgra32 => 0,
        PixelFormat::Nv12 => 1,
        PixelFormat::Depth32 => 2,
    }
}

/// Creates [`SegmentWriter`]s for the recorder
#[derive(Debug, Default)]
pub struct SegmentWriterFactory;

impl SegmentWriterFactory {
    pub fn new() -> Self {
        Self
    }
}

impl WriterFactory for SegmentWriterFactory {
    fn create(&self, path: &Path, has_audio: bool) -> Result<Box<dyn ContainerWriter>> {
        Ok(Box::new(SegmentWriter::create(path, has_audio)?))
    }

    fn file_extension(&self) -> &'static str {
        "cap"
    }
}

/// Writes frames into one segment file
pub struct SegmentWriter {
    out: BufWriter<File>,
    path: PathBuf,
    first_pts: Option<Duration>,
    video_frames: u64,
    audio_frames: u64,
    bytes_written: u64,
}

impl SegmentWriter {
    /// Create the file at `path` and write the segment header
    pub fn create(path: &Path, has_audio: bool) -> Result<Self> {
        let file = File::create(path)?;
        let mut out = BufWriter::new(file);

        let flags = if has_audio { FLAG_HAS_AUDIO } else { 0 };
        out.write_all(&SEGMENT_SIGNATURE)?;
        out.write_all(&[SEGMENT_VERSION, flags])?;

        Ok(Self {
            out,
            path: path.to_path_buf(),
            first_pts: None,
            video_frames: 0,
            audio_frames: 0,
            bytes_written: SEGMENT_HEADER_SIZE,
        })
    }

    /// Stored timestamps are relative to the first appended frame
    fn relative_pts_ms(&mut self, pts: Duration) -> u32 {
        let first = *self.first_pts.get_or_insert(pts);
        pts.checked_sub(first).unwrap_or(Duration::ZERO).as_millis() as u32
    }
}

impl ContainerWriter for SegmentWriter {
    fn append(&mut self, frame: &Frame) -> Result<()> {
        let pts_ms = self.relative_pts_ms(frame.pts);
        let size = frame.data.len() as u32;

        match &frame.meta {
            FrameMeta::Video(meta) => {
                self.out.write_all(&[TAG_VIDEO])?;
                self.out.write_all(&size.to_be_bytes())?;
                self.out.write_all(&pts_ms.to_be_bytes())?;
                self.out.write_all(&meta.width.to_be_bytes())?;
                self.out.write_all(&meta.height.to_be_bytes())?;
                self.out.write_all(&[format_code(meta.format)])?;
                self.out.write_all(&frame.data)?;

                self.video_frames += 1;
                self.bytes_written += VIDEO_TAG_HEADER_SIZE + frame.data.len() as u64;
            }
            FrameMeta::Audio(meta) => {
                self.out.write_all(&[TAG_AUDIO])?;
                self.out.write_all(&size.to_be_bytes())?;
                self.out.write_all(&pts_ms.to_be_bytes())?;
                self.out.write_all(&meta.sample_rate.to_be_bytes())?;
                self.out.write_all(&meta.channels.to_be_bytes())?;
                self.out.write_all(&meta.samples.to_be_bytes())?;
                self.out.write_all(&frame.data)?;

                self.audio_frames += 1;
                self.bytes_written += AUDIO_TAG_HEADER_SIZE + frame.data.len() as u64;
            }
        }

        Ok(())
    }

    fn finish(mut self: Box<Self>) -> Result<()> {
        self.out.flush()?;
        tracing::info!(
            path = %self.path.display(),
            video_frames = self.video_frames,
            audio_frames = self.audio_frames,
            bytes = self.bytes_written,
            "segment closed"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{AudioMeta, Orientation, VideoMeta};
    use bytes::Bytes;

    fn video_frame(pts_ms: u64, payload: &'static [u8]) -> Frame {
        Frame::video(
            Duration::from_millis(pts_ms),
            Bytes::from_static(payload),
            VideoMeta {
                width: 2,
                height: 1,
                format: PixelFormat::Bgra32,
                orientation: Orientation::Upright,
            },
        )
    }

    fn audio_frame(pts_ms: u64, payload: &'static [u8]) -> Frame {
        Frame::audio(
            Duration::from_millis(pts_ms),
            Bytes::from_static(payload),
            AudioMeta {
                sample_rate: 48_000,
                channels: 1,
                samples: 4,
            },
        )
    }

    #[test]
    fn test_header_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("header.cap");

        let writer = SegmentWriter::create(&path, true).unwrap();
        Box::new(writer).finish().unwrap();

        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(&bytes, b"CCAP\x01\x01");

        let silent = dir.path().join("silent.cap");
        let writer = SegmentWriter::create(&silent, false).unwrap();
        Box::new(writer).finish().unwrap();

        let bytes = std::fs::read(&silent).unwrap();
        assert_eq!(&bytes, b"CCAP\x01\x00");
    }

    #[test]
    fn test_video_tag_layout() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("video.cap");

        let mut writer = SegmentWriter::create(&path, false).unwrap();
        writer
            .append(&video_frame(500, &[1, 2, 3, 4, 5, 6, 7, 8]))
            .unwrap();
        Box::new(writer).finish().unwrap();

        let bytes = std::fs::read(&path).unwrap();
        let tag = &bytes[SEGMENT_HEADER_SIZE as usize..];

        assert_eq!(tag[0], TAG_VIDEO);
        assert_eq!(&tag[1..5], &8u32.to_be_bytes()); // payload size
        assert_eq!(&tag[5..9], &0u32.to_be_bytes()); // pts normalized to 0
        assert_eq!(&tag[9..13], &2u32.to_be_bytes()); // width
        assert_eq!(&tag[13..17], &1u32.to_be_bytes()); // height
        assert_eq!(tag[17], 0); // Bgra32
        assert_eq!(&tag[18..], &[1, 2, 3, 4, 5, 6, 7, 8]);
    }

    #[test]
    fn test_audio_tag_layout() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audio.cap");

        let mut writer = SegmentWriter::create(&path, true).unwrap();
        writer.append(&audio_frame(0, &[9, 9, 9, 9])).unwrap();
        Box::new(writer).finish().unwrap();

        let bytes = std::fs::read(&path).unwrap();
        let tag = &bytes[SEGMENT_HEADER_SIZE as usize..];

        assert_eq!(tag[0], TAG_AUDIO);
        assert_eq!(&tag[1..5], &4u32.to_be_bytes());
        assert_eq!(&tag[5..9], &0u32.to_be_bytes());
        assert_eq!(&tag[9..13], &48_000u32.to_be_bytes());
        assert_eq!(&tag[13..15], &1u16.to_be_bytes());
        assert_eq!(&tag[15..19], &4u32.to_be_bytes());
        assert_eq!(&tag[19..], &[9, 9, 9, 9]);
    }

    #[test]
    fn test_pts_normalized_to_first_frame() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pts.cap");

        let mut writer = SegmentWriter::create(&path, false).unwrap();
        writer.append(&video_frame(500, &[0; 8])).unwrap();
        writer.append(&video_frame(533, &[0; 8])).unwrap();
        Box::new(writer).finish().unwrap();

        let bytes = std::fs::read(&path).unwrap();
        let first = SEGMENT_HEADER_SIZE as usize;
        let second = first + VIDEO_TAG_HEADER_SIZE as usize + 8;

        assert_eq!(&bytes[first + 5..first + 9], &0u32.to_be_bytes());
        assert_eq!(&bytes[second + 5..second + 9], &33u32.to_be_bytes());
    }

    #[test]
    fn test_factory_creates_growing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("factory.cap");

        let factory = SegmentWriterFactory;
        assert_eq!(factory.file_extension(), "cap");

        let mut writer = factory.create(&path, true).unwrap();
        writer.append(&video_frame(0, &[0; 8])).unwrap();
        writer.append(&audio_frame(10, &[0; 4])).unwrap();
        writer.finish().unwrap();

        let len = std::fs::metadata(&path).unwrap().len();
        assert_eq!(
            len,
            SEGMENT_HEADER_SIZE + VIDEO_TAG_HEADER_SIZE + 8 + AUDIO_TAG_HEADER_SIZE + 4
        );
    }
}
