//! Bounded frame rendering
//!
//! [`BoundedRenderer`] turns one video [`Frame`] into a [`PooledBuffer`] via
//! the image compositor while capping the number of renders in flight. The
//! sequence per frame: take a gate slot (blocking when the cap is reached),
//! fetch the buffer pool for the frame's corrected dimensions (rebuilt on a
//! dimension change, never grown), check a buffer out, submit the render, and
//! release the slot when the compositor signals completion.
//!
//! The gate slot is released on every exit path. Submission failures release
//! it before the error propagates, and a compositor that drops the completion
//! callback without calling it releases it through the permit's drop handler.

use std::sync::Arc;

use crate::error::{EngineError, Result};
use crate::frame::Frame;
use crate::gate::{GatePermit, RenderGate};
use crate::pool::{PooledBuffer, SharedBufferPool};

/// Bokeh filter parameters applied during a render
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BokehParams {
    /// Blur radius in pixels
    pub radius: f64,

    /// Brightness multiplier applied after the blur
    pub brightness: f64,
}

/// One render submission
#[derive(Debug, Clone)]
pub struct RenderRequest {
    /// Source video frame; its orientation metadata drives the correction
    pub frame: Frame,

    /// Optional filter applied after orientation correction
    pub filter: Option<BokehParams>,
}

/// Callback invoked exactly once per accepted render submission
pub type RenderCompletion = Box<dyn FnOnce(Result<()>) + Send>;

/// GPU/CPU image compositing engine
///
/// `submit` must either return an error without having invoked `completion`,
/// or return `Ok` and invoke `completion` exactly once when the render
/// finishes (successfully or not). Completion may be invoked on any thread.
pub trait ImageCompositor: Send + Sync {
    fn submit(
        &self,
        request: RenderRequest,
        target: PooledBuffer,
        completion: RenderCompletion,
    ) -> Result<()>;
}

/// Converts processed frames into pooled buffers under a concurrency cap
pub struct BoundedRenderer {
    compositor: Arc<dyn ImageCompositor>,
    pools: Arc<SharedBufferPool>,
    gate: Arc<RenderGate>,
}

impl BoundedRenderer {
    /// Create a renderer with `slots` concurrent renders allowed
    pub fn new(
        compositor: Arc<dyn ImageCompositor>,
        pools: Arc<SharedBufferPool>,
        slots: usize,
    ) -> Self {
        Self {
            compositor,
            pools,
            gate: RenderGate::new(slots),
        }
    }

    /// The render gate, for observing in-flight counts
    pub fn gate(&self) -> &Arc<RenderGate> {
        &self.gate
    }

    /// The pool set this renderer draws target buffers from
    pub fn pools(&self) -> &Arc<SharedBufferPool> {
        &self.pools
    }

    /// Render one frame and hand the finished buffer to `deliver`
    ///
    /// Blocks while all render slots are in flight. `deliver` runs on the
    /// compositor's completion thread and only for successful renders; failed
    /// renders are logged and dropped.
    pub fn render<F>(&self, request: RenderRequest, deliver: F) -> Result<()>
    where
        F: FnOnce(PooledBuffer) + Send + 'static,
    {
        let meta = request
            .frame
            .video_meta()
            .ok_or_else(|| EngineError::RenderFailed("not a video frame".to_string()))?;
        let (width, height) = meta
            .orientation
            .corrected_dimensions(meta.width, meta.height);

        let permit = self.gate.acquire();

        let target = match self.pools.for_dimensions(width, height).acquire() {
            Ok(target) => target,
            Err(e) => {
                // Permit drops here, returning the slot.
                return Err(e);
            }
        };

        let completion = self.completion_for(permit.clone(), target.clone(), deliver);
        match self.compositor.submit(request, target, completion) {
            Ok(()) => Ok(()),
            Err(e) => {
                permit.release();
                Err(e)
            }
        }
    }

    fn completion_for<F>(
        &self,
        permit: GatePermit,
        target: PooledBuffer,
        deliver: F,
    ) -> RenderCompletion
    where
        F: FnOnce(PooledBuffer) + Send + 'static,
    {
        Box::new(move |result| {
            // Free the slot before delivery so downstream send latency never
            // holds a render slot.
            permit.release();
            match result {
                Ok(()) => deliver(target),
                Err(e) => {
                    tracing::warn!(error = %e, "render failed; frame dropped");
                }
            }
        })
    }
}
