//! Counting render gate
//!
//! Caps the number of concurrently in-flight render tasks. The capture thread
//! blocks in [`RenderGate::acquire`] when all slots are taken, which is the
//! single permitted blocking point on the frame path: it trades latency for a
//! hard bound on GPU queue depth and pool usage.
//!
//! A [`GatePermit`] releases its slot exactly once, either through an explicit
//! [`GatePermit::release`] (typically from a render completion callback) or
//! when the last clone of the permit is dropped. A completion handler that
//! errors, or a compositor that silently drops the callback, therefore cannot
//! leak a slot.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};

/// Counting gate with a fixed number of slots
pub struct RenderGate {
    capacity: usize,
    available: Mutex<usize>,
    slot_freed: Condvar,
}

impl RenderGate {
    /// Create a gate with the given number of slots
    pub fn new(capacity: usize) -> Arc<Self> {
        Arc::new(Self {
            capacity,
            available: Mutex::new(capacity),
            slot_freed: Condvar::new(),
        })
    }

    /// Total number of slots
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of slots currently free
    pub fn available(&self) -> usize {
        *self.available.lock().unwrap()
    }

    /// Acquire one slot, blocking until one is free
    pub fn acquire(self: &Arc<Self>) -> GatePermit {
        let mut available = self.available.lock().unwrap();
        while *available == 0 {
            available = self.slot_freed.wait(available).unwrap();
        }
        *available -= 1;
        GatePermit::new(Arc::clone(self))
    }

    /// Acquire one slot without blocking
    pub fn try_acquire(self: &Arc<Self>) -> Option<GatePermit> {
        let mut available = self.available.lock().unwrap();
        if *available == 0 {
            return None;
        }
        *available -= 1;
        Some(GatePermit::new(Arc::clone(self)))
    }

    fn release_one(&self) {
        let mut available = self.available.lock().unwrap();
        *available += 1;
        self.slot_freed.notify_one();
    }
}

struct PermitInner {
    gate: Arc<RenderGate>,
    released: AtomicBool,
}

impl Drop for PermitInner {
    fn drop(&mut self) {
        // Last holder went away without an explicit release.
        if !self.released.load(Ordering::Acquire) {
            self.gate.release_one();
        }
    }
}

/// Handle to one acquired gate slot
///
/// Clones share the slot; the slot is returned on the first explicit
/// [`release`](GatePermit::release), or when the last clone drops.
#[derive(Clone)]
pub struct GatePermit {
    inner: Arc<PermitInner>,
}

impl GatePermit {
    fn new(gate: Arc<RenderGate>) -> Self {
        Self {
            inner: Arc::new(PermitInner {
                gate,
                released: AtomicBool::new(false),
            }),
        }
    }

    /// Return the slot to the gate
    ///
    /// Safe to call more than once; only the first call releases.
    pub fn release(&self) {
        if !self.inner.released.swap(true, Ordering::AcqRel) {
            self.inner.gate.release_one();
        }
    }
}
