//! GC Core Module - Stop-the-World Collection Cycle
//!
//! One cycle runs four phases with the heap write lock held:
//!
//! ```text
//! Idle -> Marking -> ClearingWeak -> Sweeping -> Relocating -> Idle
//! ```
//!
//! - Marking: trace strong edges from the roots, record weak edges
//! - ClearingWeak: turn every weak slot whose target went unmarked into the
//!   cleared sentinel, before anything is freed
//! - Sweeping: free unmarked objects
//! - Relocating: slide survivors together, rewriting slots in place
//!
//! `ClearPhase` tokens can only be minted while the phase cell reads
//! `ClearingWeak`, which is what confines clearing to the collector.

use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use serde::Serialize;

use crate::barrier::WriteBarrier;
use crate::config::GcConfig;
use crate::error::{FgcError, Result};
use crate::heap::{Heap, SlotKind};
use crate::logging::{self, GcEvent, GcLogger, GcLoggerConfig, LogLevel};
use crate::marker::{MarkResult, Marker};
use crate::object::{Address, ClearPhase, TaggedReference};
use crate::relocate::{RelocationStats, Relocator};
use crate::stats::{CycleStats, GcStats};
use crate::verify;

/// GC cycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
#[repr(u8)]
pub enum GcState {
    /// Idle - no GC in progress
    Idle = 0,
    /// Marking phase - identifying live objects
    Marking = 1,
    /// Weak slots to dead objects are being cleared
    ClearingWeak = 2,
    /// Unmarked objects are being freed
    Sweeping = 3,
    /// Relocating phase - moving objects
    Relocating = 4,
}

impl GcState {
    pub fn name(self) -> &'static str {
        match self {
            GcState::Idle => "idle",
            GcState::Marking => "marking",
            GcState::ClearingWeak => "clearing-weak",
            GcState::Sweeping => "sweeping",
            GcState::Relocating => "relocating",
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            1 => GcState::Marking,
            2 => GcState::ClearingWeak,
            3 => GcState::Sweeping,
            4 => GcState::Relocating,
            _ => GcState::Idle,
        }
    }
}

/// Current collector phase, readable without the heap lock
#[derive(Debug)]
pub struct PhaseCell(AtomicU8);

impl PhaseCell {
    pub fn new(state: GcState) -> Self {
        Self(AtomicU8::new(state as u8))
    }

    pub fn get(&self) -> GcState {
        GcState::from_u8(self.0.load(Ordering::Acquire))
    }

    pub(crate) fn set(&self, state: GcState) {
        self.0.store(state as u8, Ordering::Release);
    }
}

/// Puts the phase cell back to `Idle` when dropped, including on unwind
struct IdleOnDrop<'a>(&'a PhaseCell);

impl Drop for IdleOnDrop<'_> {
    fn drop(&mut self) {
        self.0.set(GcState::Idle);
    }
}

/// Collector - owns the heap and runs collection cycles
///
/// ## Thread Safety
///
/// Mutator operations take the heap read lock, `allocate` and `collect` take
/// the write lock. Slot loads are atomic, so readers holding the read lock
/// never observe a torn word.
pub struct Collector {
    heap: RwLock<Heap>,
    config: Arc<GcConfig>,
    state: PhaseCell,
    cycle_count: AtomicU64,
    stats: GcStats,
    logger: GcLogger,
}

impl Collector {
    /// Create a collector with a fresh heap
    pub fn new(config: GcConfig) -> Result<Self> {
        let heap = Heap::new(&config)?;
        let logger = GcLogger::new(GcLoggerConfig {
            level: LogLevel::Trace,
            console: config.verbose,
            ..Default::default()
        });

        log::debug!(
            "collector created: heap {:#x}..{:#x}, compression {}",
            heap.start(),
            heap.end(),
            config.pointer_compression
        );

        Ok(Self {
            heap: RwLock::new(heap),
            config: Arc::new(config),
            state: PhaseCell::new(GcState::Idle),
            cycle_count: AtomicU64::new(0),
            stats: GcStats::new(),
            logger,
        })
    }

    /// Create a collector configured from `FGC_*` environment variables
    pub fn from_env() -> Result<Self> {
        Self::new(GcConfig::from_env())
    }

    pub fn config(&self) -> &GcConfig {
        &self.config
    }

    pub fn heap(&self) -> RwLockReadGuard<'_, Heap> {
        self.heap.read()
    }

    pub fn heap_mut(&self) -> RwLockWriteGuard<'_, Heap> {
        self.heap.write()
    }

    pub fn state(&self) -> GcState {
        self.state.get()
    }

    pub fn is_collecting(&self) -> bool {
        self.state() != GcState::Idle
    }

    pub fn cycle_count(&self) -> u64 {
        self.cycle_count.load(Ordering::Relaxed)
    }

    pub fn stats(&self) -> &GcStats {
        &self.stats
    }

    pub fn logger(&self) -> &GcLogger {
        &self.logger
    }

    /// Allocate an object with one field per entry of `layout`
    pub fn allocate(&self, layout: &[SlotKind]) -> Result<Address> {
        self.heap.write().allocate(layout)
    }

    pub fn register_root(&self, address: Address) -> Result<()> {
        self.heap.write().register_root(address)
    }

    pub fn unregister_root(&self, address: Address) -> Result<()> {
        self.heap.write().unregister_root(address)
    }

    /// Store through the write barrier
    pub fn store(&self, host: Address, index: usize, value: TaggedReference) -> Result<()> {
        let heap = self.heap.read();
        WriteBarrier::new(&heap).store(host, index, value)
    }

    pub fn load(&self, host: Address, index: usize) -> Result<TaggedReference> {
        self.heap.read().load(host, index)
    }

    /// Run one full collection cycle
    ///
    /// # Panics
    /// When heap verification is on and the heap is inconsistent afterwards.
    pub fn collect(&self) -> Result<CycleStats> {
        let mut heap = self.heap.write();

        let current = self.state.get();
        if current != GcState::Idle {
            return Err(FgcError::InvalidState {
                expected: GcState::Idle.name().to_string(),
                actual: current.name().to_string(),
            });
        }

        let cycle = self.cycle_count.fetch_add(1, Ordering::Relaxed) + 1;
        let start = Instant::now();
        self.logger.log(GcEvent::CycleStart {
            cycle,
            reason: "explicit".to_string(),
        });

        let result = {
            let _idle = IdleOnDrop(&self.state);
            self.execute_cycle(&mut heap, cycle)
        };
        let mut stats = result?;

        if self.config.verify_heap && verify::verify_enabled() {
            if let Err(errors) = verify::verify(&heap) {
                let report = verify::report(&errors);
                let failure = GcEvent::VerifyFailure {
                    cycle,
                    message: report.clone(),
                };
                // The collector's own log may not outlive the panic
                logging::log_event(failure.clone());
                self.logger.log(failure);
                panic!("{}", report);
            }
        }

        stats.duration_us = start.elapsed().as_micros() as u64;
        self.stats.record(&stats);
        self.logger.log(GcEvent::CycleEnd {
            cycle,
            duration_ms: start.elapsed().as_secs_f64() * 1000.0,
            reclaimed_bytes: stats.freed_bytes,
        });

        Ok(stats)
    }

    fn execute_cycle(&self, heap: &mut Heap, cycle: u64) -> Result<CycleStats> {
        let mark = self.run_phase(GcState::Marking, cycle, || Marker::new(heap).trace());

        let weak_cleared = self.run_phase(GcState::ClearingWeak, cycle, || {
            self.clear_dead_weak_slots(heap, &mark)
        });
        self.logger.log(GcEvent::ReferenceStats {
            cycle,
            weak_seen: mark.weak_edges.len(),
            weak_cleared,
        });

        let (freed_objects, freed_bytes) =
            self.run_phase(GcState::Sweeping, cycle, || Self::sweep(heap, &mark))?;

        let relocation = if self.config.compact {
            let relocation =
                self.run_phase(GcState::Relocating, cycle, || Relocator::compact(heap))?;
            self.logger.log(GcEvent::RelocateStats {
                cycle,
                relocated_count: relocation.moved_objects,
                bytes_moved: relocation.bytes_moved,
                updated_slots: relocation.updated_slots,
            });
            relocation
        } else {
            RelocationStats::default()
        };

        Ok(CycleStats {
            cycle,
            marked_objects: mark.marked.len(),
            scanned_slots: mark.scanned_slots,
            weak_slots_seen: mark.weak_edges.len(),
            weak_cleared,
            freed_objects,
            freed_bytes,
            relocation,
            duration_us: 0,
        })
    }

    fn run_phase<T>(&self, phase: GcState, cycle: u64, body: impl FnOnce() -> T) -> T {
        self.state.set(phase);
        self.logger.log(GcEvent::PhaseStart { cycle, phase });

        let start = Instant::now();
        let result = body();

        self.logger.log(GcEvent::PhaseEnd {
            cycle,
            phase,
            duration_ms: start.elapsed().as_secs_f64() * 1000.0,
        });
        result
    }

    fn clear_dead_weak_slots(&self, heap: &Heap, mark: &MarkResult) -> u64 {
        let phase = ClearPhase::new(&self.state);
        let ctx = heap.context();
        let mut cleared = 0;

        for edge in mark.dead_weak_edges() {
            let Ok(slot) = heap.slot(edge.host, edge.index) else {
                continue;
            };
            // Only the value the trace saw is cleared
            if slot.load(ctx).heap_object_if_weak() == Some(edge.target) {
                slot.clear_weak(&phase, ctx);
                cleared += 1;
            }
        }

        log::debug!("cleared {} weak slots", cleared);
        cleared
    }

    fn sweep(heap: &mut Heap, mark: &MarkResult) -> Result<(usize, usize)> {
        let dead: Vec<Address> = heap
            .objects()
            .map(|object| object.address())
            .filter(|address| !mark.is_marked(*address))
            .collect();

        let mut freed_bytes = 0;
        for &address in &dead {
            freed_bytes += heap.free(address)?.size();
        }

        log::debug!("swept {} objects ({} bytes)", dead.len(), freed_bytes);
        Ok((dead.len(), freed_bytes))
    }
}
