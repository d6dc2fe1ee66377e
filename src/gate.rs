// SPDX-License-Identifier: Apache-2.0

//! Single-slot admission control for background frame analysis.
//!
//! Each analysis kind owns one [`AdmissionGate`]. A frame only starts a task
//! when the gate is free; frames arriving while a task is in flight are
//! dropped for that kind rather than queued.

use std::sync::{
    atomic::{AtomicBool, AtomicU64, Ordering},
    Arc,
};
use tracing::trace;

/// A non-blocking, single-slot gate.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use viewfinder::gate::AdmissionGate;
///
/// let gate = Arc::new(AdmissionGate::new("barcode"));
/// let permit = gate.try_acquire().expect("gate starts free");
/// assert!(gate.try_acquire().is_none());
/// drop(permit);
/// assert!(gate.try_acquire().is_some());
/// ```
#[derive(Debug)]
pub struct AdmissionGate {
    name: &'static str,
    busy: AtomicBool,
    rejected: AtomicU64,
}

impl AdmissionGate {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            busy: AtomicBool::new(false),
            rejected: AtomicU64::new(0),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Claims the slot if it is free.
    ///
    /// Returns `None` without waiting when a permit is already outstanding.
    /// The slot is released when the returned [`GatePermit`] is dropped,
    /// including during a panic unwind.
    pub fn try_acquire(self: &Arc<Self>) -> Option<GatePermit> {
        if self
            .busy
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
        {
            Some(GatePermit {
                gate: Arc::clone(self),
            })
        } else {
            self.rejected.fetch_add(1, Ordering::Relaxed);
            trace!(gate = self.name, "gate busy, work rejected");
            None
        }
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Number of acquisitions refused since the gate was created.
    pub fn rejected(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }
}

/// Proof of holding an [`AdmissionGate`] slot.
#[derive(Debug)]
pub struct GatePermit {
    gate: Arc<AdmissionGate>,
}

impl GatePermit {
    pub fn gate(&self) -> &AdmissionGate {
        &self.gate
    }
}

impl Drop for GatePermit {
    fn drop(&mut self) {
        self.gate.busy.store(false, Ordering::Release);
        trace!(gate = self.gate.name, "gate released");
    }
}
