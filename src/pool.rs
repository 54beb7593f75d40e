//! Pixel buffer pool
//!
//! A fixed-capacity pool of reusable image buffers, all sized to one
//! resolution and pixel format. Buffers are preallocated up front so the
//! per-frame render path never allocates; checking out more buffers than the
//! pool holds fails with [`EngineError::PoolAllocationFailed`] instead of
//! growing.
//!
//! Dimension changes rebuild the pool rather than resizing it:
//! [`SharedBufferPool`] swaps in a fresh pool and the old one is torn down as
//! its outstanding buffers drain. A [`PooledBuffer`] returns its storage to
//! its own pool when the last holder drops it; buffers from a superseded pool
//! simply free their storage.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Weak};

use crate::error::{EngineError, Result};
use crate::frame::PixelFormat;

/// Fixed-capacity pool of image buffers at one resolution
pub struct PixelBufferPool {
    width: u32,
    height: u32,
    format: PixelFormat,
    buffer_size: usize,
    free: Mutex<Vec<Box<[u8]>>>,
    in_flight: AtomicUsize,
}

impl PixelBufferPool {
    /// Create a pool and preallocate `capacity` buffers
    pub fn new(width: u32, height: u32, format: PixelFormat, capacity: usize) -> Arc<Self> {
        let buffer_size = format.frame_size(width, height);
        let free = (0..capacity)
            .map(|_| vec![0u8; buffer_size].into_boxed_slice())
            .collect();

        tracing::debug!(
            width,
            height,
            capacity,
            buffer_bytes = buffer_size,
            "pixel buffer pool created"
        );

        Arc::new(Self {
            width,
            height,
            format,
            buffer_size,
            free: Mutex::new(free),
            in_flight: AtomicUsize::new(0),
        })
    }

    /// Buffer width in pixels
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Buffer height in pixels
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Pixel format of all buffers in this pool
    pub fn format(&self) -> PixelFormat {
        self.format
    }

    /// Number of buffers currently checked out
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Number of buffers available for checkout
    pub fn available(&self) -> usize {
        self.free.lock().unwrap().len()
    }

    /// Check out one buffer
    ///
    /// Fails when every preallocated buffer is already in flight.
    pub fn acquire(self: &Arc<Self>) -> Result<PooledBuffer> {
        let storage = {
            let mut free = self.free.lock().unwrap();
            free.pop().ok_or_else(|| {
                EngineError::PoolAllocationFailed(format!(
                    "all {} buffers in flight at {}x{}",
                    self.in_flight.load(Ordering::Acquire),
                    self.width,
                    self.height
                ))
            })?
        };
        self.in_flight.fetch_add(1, Ordering::AcqRel);

        Ok(PooledBuffer {
            inner: Arc::new(PooledInner {
                storage: Mutex::new(storage),
                pool: Arc::downgrade(self),
                width: self.width,
                height: self.height,
                format: self.format,
            }),
        })
    }

    fn recycle(&self, storage: Box<[u8]>) {
        // Storage from a pool rebuilt at other dimensions never comes back
        // here; the weak reference in PooledInner is already dead by then.
        debug_assert_eq!(storage.len(), self.buffer_size);
        self.free.lock().unwrap().push(storage);
        self.in_flight.fetch_sub(1, Ordering::AcqRel);
    }
}

struct PooledInner {
    storage: Mutex<Box<[u8]>>,
    pool: Weak<PixelBufferPool>,
    width: u32,
    height: u32,
    format: PixelFormat,
}

impl Drop for PooledInner {
    fn drop(&mut self) {
        if let Some(pool) = self.pool.upgrade() {
            let storage = match self.storage.get_mut() {
                Ok(storage) => std::mem::take(storage),
                Err(poisoned) => std::mem::take(poisoned.into_inner()),
            };
            pool.recycle(storage);
        }
    }
}

/// One buffer checked out of a [`PixelBufferPool`]
///
/// Clones share the same storage; the buffer returns to its pool when the
/// last clone drops.
#[derive(Clone)]
pub struct PooledBuffer {
    inner: Arc<PooledInner>,
}

impl PooledBuffer {
    /// Buffer width in pixels
    pub fn width(&self) -> u32 {
        self.inner.width
    }

    /// Buffer height in pixels
    pub fn height(&self) -> u32 {
        self.inner.height
    }

    /// Pixel format
    pub fn format(&self) -> PixelFormat {
        self.inner.format
    }

    /// Byte length of the backing storage
    pub fn len(&self) -> usize {
        self.inner.format.frame_size(self.inner.width, self.inner.height)
    }

    /// True when the backing storage is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Run `f` with exclusive access to the pixel data
    pub fn with_data<R>(&self, f: impl FnOnce(&mut [u8]) -> R) -> R {
        let mut guard = self.inner.storage.lock().unwrap();
        f(&mut guard)
    }

    /// Copy the current contents out
    pub fn snapshot(&self) -> Vec<u8> {
        self.with_data(|data| data.to_vec())
    }
}

impl std::fmt::Debug for PooledBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledBuffer")
            .field("width", &self.inner.width)
            .field("height", &self.inner.height)
            .field("format", &self.inner.format)
            .finish()
    }
}

/// Shared handle to the current pool, rebuilt on dimension changes
pub struct SharedBufferPool {
    format: PixelFormat,
    capacity: usize,
    current: Mutex<Option<Arc<PixelBufferPool>>>,
}

impl SharedBufferPool {
    /// Create with no pool built yet
    pub fn new(format: PixelFormat, capacity: usize) -> Self {
        Self {
            format,
            capacity,
            current: Mutex::new(None),
        }
    }

    /// Pool capacity used for every (re)build
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// The current pool, if one has been built
    pub fn current(&self) -> Option<Arc<PixelBufferPool>> {
        self.current.lock().unwrap().clone()
    }

    /// Dimensions of the current pool
    pub fn dimensions(&self) -> Option<(u32, u32)> {
        self.current
            .lock()
            .unwrap()
            .as_ref()
            .map(|pool| (pool.width(), pool.height()))
    }

    /// Fetch the pool for the given dimensions, rebuilding on mismatch
    pub fn for_dimensions(&self, width: u32, height: u32) -> Arc<PixelBufferPool> {
        let mut current = self.current.lock().unwrap();
        match current.as_ref() {
            Some(pool) if pool.width() == width && pool.height() == height => Arc::clone(pool),
            previous => {
                if let Some(pool) = previous {
                    tracing::info!(
                        old_width = pool.width(),
                        old_height = pool.height(),
                        width,
                        height,
                        "rebuilding pixel buffer pool"
                    );
                }
                let pool = PixelBufferPool::new(width, height, self.format, self.capacity);
                *current = Some(Arc::clone(&pool));
                pool
            }
        }
    }

    /// Unconditionally rebuild the pool at the given dimensions
    pub fn rebuild(&self, width: u32, height: u32) -> Arc<PixelBufferPool> {
        let pool = PixelBufferPool::new(width, height, self.format, self.capacity);
        *self.current.lock().unwrap() = Some(Arc::clone(&pool));
        pool
    }
}
