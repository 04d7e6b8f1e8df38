//! Stats Module - per-cycle and cumulative collector statistics

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use parking_lot::Mutex;
use serde::Serialize;

use crate::relocate::RelocationStats;

/// What one collection did
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CycleStats {
    /// Cycle number, starting at 1
    pub cycle: u64,
    /// Objects reached through strong edges
    pub marked_objects: usize,
    /// Slots decoded by the tracer
    pub scanned_slots: u64,
    /// Weak slots found in live objects
    pub weak_slots_seen: usize,
    /// Weak slots transitioned to the cleared sentinel
    pub weak_cleared: u64,
    /// Objects released by the sweep
    pub freed_objects: usize,
    pub freed_bytes: usize,
    pub relocation: RelocationStats,
    pub duration_us: u64,
}

/// GcStats - cumulative counters across cycles
pub struct GcStats {
    total_cycles: AtomicU64,
    total_weak_cleared: AtomicU64,
    total_freed_bytes: AtomicUsize,
    last_cycle: Mutex<Option<CycleStats>>,
}

impl GcStats {
    pub fn new() -> Self {
        Self {
            total_cycles: AtomicU64::new(0),
            total_weak_cleared: AtomicU64::new(0),
            total_freed_bytes: AtomicUsize::new(0),
            last_cycle: Mutex::new(None),
        }
    }

    /// Record a finished cycle
    pub fn record(&self, cycle: &CycleStats) {
        self.total_cycles.fetch_add(1, Ordering::Relaxed);
        self.total_weak_cleared
            .fetch_add(cycle.weak_cleared, Ordering::Relaxed);
        self.total_freed_bytes
            .fetch_add(cycle.freed_bytes, Ordering::Relaxed);
        *self.last_cycle.lock() = Some(cycle.clone());
    }

    pub fn total_cycles(&self) -> u64 {
        self.total_cycles.load(Ordering::Relaxed)
    }

    pub fn total_weak_cleared(&self) -> u64 {
        self.total_weak_cleared.load(Ordering::Relaxed)
    }

    pub fn total_freed_bytes(&self) -> usize {
        self.total_freed_bytes.load(Ordering::Relaxed)
    }

    pub fn last_cycle(&self) -> Option<CycleStats> {
        self.last_cycle.lock().clone()
    }

    /// Last cycle as JSON, for dumping from tools
    pub fn last_cycle_json(&self) -> Option<String> {
        self.last_cycle()
            .and_then(|cycle| serde_json::to_string(&cycle).ok())
    }
}

impl Default for GcStats {
    fn default() -> Self {
        Self::new()
    }
}
