//! Software compositor
//!
//! CPU implementation of the image compositor: orientation correction by
//! quarter-turn pixel remapping, then the optional bokeh approximation (a
//! single-pass horizontal box blur plus a brightness multiply). Completions
//! run inline on the submitting thread.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::{EngineError, Result};
use crate::frame::PixelFormat;
use crate::pool::PooledBuffer;
use crate::render::{BokehParams, ImageCompositor, RenderCompletion, RenderRequest};

const MAX_BLUR_RADIUS: usize = 64;
const BYTES_PER_PIXEL: usize = 4;

/// CPU compositor over BGRA frames
pub struct SoftwareCompositor {
    renders: AtomicU64,
}

impl SoftwareCompositor {
    pub fn new() -> Self {
        Self {
            renders: AtomicU64::new(0),
        }
    }

    /// Renders completed since creation
    pub fn renders(&self) -> u64 {
        self.renders.load(Ordering::Relaxed)
    }
}

impl Default for SoftwareCompositor {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageCompositor for SoftwareCompositor {
    fn submit(
        &self,
        request: RenderRequest,
        target: PooledBuffer,
        completion: RenderCompletion,
    ) -> Result<()> {
        let meta = request
            .frame
            .video_meta()
            .ok_or_else(|| EngineError::RenderFailed("frame carries no video".to_string()))?;
        if meta.format != PixelFormat::Bgra32 {
            return Err(EngineError::RenderFailed(format!(
                "unsupported pixel format {:?}",
                meta.format
            )));
        }

        let (width, height) = meta.orientation.corrected_dimensions(meta.width, meta.height);
        if (target.width(), target.height()) != (width, height)
            || target.format() != meta.format
        {
            return Err(EngineError::RenderFailed(format!(
                "target {}x{} does not fit output {}x{}",
                target.width(),
                target.height(),
                width,
                height
            )));
        }

        let expected = meta.format.frame_size(meta.width, meta.height);
        if request.frame.data.len() != expected {
            return Err(EngineError::RenderFailed(format!(
                "frame payload is {} bytes, expected {expected}",
                request.frame.data.len()
            )));
        }

        target.with_data(|dst| {
            rotate_into(
                &request.frame.data,
                dst,
                meta.width as usize,
                meta.height as usize,
                meta.orientation.quarter_turns(),
            );
            if let Some(params) = request.filter {
                apply_bokeh(dst, width as usize, height as usize, params);
            }
        });

        self.renders.fetch_add(1, Ordering::Relaxed);
        completion(Ok(()));
        Ok(())
    }
}

/// Map source pixels into the upright output
fn rotate_into(src: &[u8], dst: &mut [u8], src_w: usize, src_h: usize, quarter_turns: u32) {
    if quarter_turns == 0 {
        dst.copy_from_slice(src);
        return;
    }

    let (dst_w, dst_h) = match quarter_turns {
        1 | 3 => (src_h, src_w),
        _ => (src_w, src_h),
    };

    for y in 0..dst_h {
        for x in 0..dst_w {
            let (sx, sy) = match quarter_turns {
                1 => (y, src_h - 1 - x),
                2 => (src_w - 1 - x, src_h - 1 - y),
                _ => (src_w - 1 - y, x),
            };
            let s = (sy * src_w + sx) * BYTES_PER_PIXEL;
            let d = (y * dst_w + x) * BYTES_PER_PIXEL;
            dst[d..d + BYTES_PER_PIXEL].copy_from_slice(&src[s..s + BYTES_PER_PIXEL]);
        }
    }
}

/// Blur-and-brighten approximation of a bokeh filter
fn apply_bokeh(data: &mut [u8], width: usize, height: usize, params: BokehParams) {
    let radius = (params.radius.round().max(0.0) as usize).min(MAX_BLUR_RADIUS);
    if radius > 0 {
        let mut row = vec![0u8; width * BYTES_PER_PIXEL];
        for y in 0..height {
            let base = y * width * BYTES_PER_PIXEL;
            row.copy_from_slice(&data[base..base + width * BYTES_PER_PIXEL]);
            for x in 0..width {
                let lo = x.saturating_sub(radius);
                let hi = (x + radius).min(width - 1);
                let count = (hi - lo + 1) as u32;
                for channel in 0..3 {
                    let sum: u32 = (lo..=hi)
                        .map(|i| row[i * BYTES_PER_PIXEL + channel] as u32)
                        .sum();
                    data[base + x * BYTES_PER_PIXEL + channel] = (sum / count) as u8;
                }
            }
        }
    }

    if params.brightness != 1.0 {
        for pixel in data.chunks_exact_mut(BYTES_PER_PIXEL) {
            for channel in &mut pixel[..3] {
                *channel = (*channel as f64 * params.brightness).clamp(0.0, 255.0) as u8;
            }
        }
    }
}
