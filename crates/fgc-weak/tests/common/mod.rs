//! Test Utilities for the fgc-weak Test Suite
//!
//! Fixtures build a collector over a small heap; helpers assert on slot
//! contents with messages that name the slot and what it actually held.

#![allow(dead_code)]

use fgc_weak::{
    Address, Collector, CycleStats, Decoded, GcConfig, GcState, SlotKind, TaggedReference,
};

/// Heap size for tests (256KB)
pub const TEST_HEAP_SIZE: usize = 256 * 1024;

/// Cage base used by compressed fixtures
pub const TEST_CAGE_BASE: usize = 0x0000_2000_0000_0000;

// ============================================================================
// HEAP FIXTURE
// ============================================================================

/// Test fixture owning a collector and its heap
pub struct HeapFixture {
    pub gc: Collector,
    pub config: GcConfig,
}

impl HeapFixture {
    /// Compressed heap with verification on
    ///
    /// **Bug this finds:** Cage encoding bugs, verifier findings after a cycle
    pub fn with_defaults() -> Self {
        Self::with_config(GcConfig {
            heap_size: TEST_HEAP_SIZE,
            cage_base: TEST_CAGE_BASE,
            verify_heap: true,
            ..Default::default()
        })
    }

    /// Full-pointer heap
    ///
    /// **Bug this finds:** Code paths that assume compression
    pub fn uncompressed() -> Self {
        Self::with_config(GcConfig {
            heap_size: TEST_HEAP_SIZE,
            pointer_compression: false,
            verify_heap: true,
            ..Default::default()
        })
    }

    pub fn with_config(config: GcConfig) -> Self {
        let gc = Collector::new(config.clone())
            .expect("collector initialization should succeed with valid config");
        Self { gc, config }
    }

    /// Both addressing modes, for tests that must hold in each
    pub fn each_mode() -> [Self; 2] {
        [Self::with_defaults(), Self::uncompressed()]
    }

    pub fn object(&self, layout: &[SlotKind]) -> Address {
        self.gc
            .allocate(layout)
            .unwrap_or_else(|e| panic!("allocation of {} slots failed: {}", layout.len(), e))
    }

    /// Allocate and register as a root
    pub fn root(&self, layout: &[SlotKind]) -> Address {
        let address = self.object(layout);
        self.gc.register_root(address).expect("root registration");
        address
    }

    pub fn store_strong(&self, host: Address, index: usize, target: Address) {
        self.gc
            .store(host, index, TaggedReference::from_strong_target(target))
            .expect("strong store");
    }

    pub fn store_weak(&self, host: Address, index: usize, target: Address) {
        let weak = TaggedReference::make_weak(TaggedReference::from_strong_target(target));
        self.gc.store(host, index, weak).expect("weak store");
    }

    pub fn decode(&self, host: Address, index: usize) -> Decoded {
        self.gc.load(host, index).expect("slot load").decode()
    }

    /// Current address of the `n`th registered root
    pub fn root_at(&self, n: usize) -> Address {
        self.gc.heap().roots()[n]
    }

    /// Run one cycle and check the collector went back to idle
    ///
    /// **Bug this finds:** Phase state left behind after a cycle
    pub fn collect(&self) -> CycleStats {
        let stats = self.gc.collect().expect("collection should succeed");
        assert_eq!(
            self.gc.state(),
            GcState::Idle,
            "collector stuck in {:?} after cycle {}",
            self.gc.state(),
            stats.cycle
        );
        stats
    }
}

// ============================================================================
// STRICT ASSERTION HELPERS
// ============================================================================

/// Assert that exactly one classification predicate holds
///
/// **Tolerance:** ZERO - two kinds at once breaks every consumer
#[track_caller]
pub fn assert_exclusive(value: TaggedReference, context: &str) {
    let kinds = [
        value.is_smi(),
        value.is_strong(),
        value.is_weak(),
        value.is_cleared(),
    ];
    assert_eq!(
        kinds.iter().filter(|k| **k).count(),
        1,
        "{}: {:?} classified as {:?} (smi, strong, weak, cleared)",
        context,
        value,
        kinds
    );
}

#[track_caller]
pub fn assert_slot(fixture: &HeapFixture, host: Address, index: usize, expected: Decoded) {
    let actual = fixture.decode(host, index);
    assert_eq!(
        actual, expected,
        "slot {:#x}[{}] holds {:?}, expected {:?}",
        host, index, actual, expected
    );
}

#[track_caller]
pub fn assert_cleared(fixture: &HeapFixture, host: Address, index: usize) {
    let value = fixture.gc.load(host, index).expect("slot load");
    assert!(
        value.is_cleared(),
        "slot {:#x}[{}] should be cleared, holds {:?}",
        host,
        index,
        value
    );
    assert_eq!(value.heap_object(), None, "cleared slot decoded to an address");
}
