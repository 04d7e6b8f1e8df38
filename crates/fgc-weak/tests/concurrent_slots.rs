//! Concurrency Tests - Torn Reads on Slots
//!
//! Slot writes are single aligned word stores. These tests hammer a slot from
//! one writer while several readers decode it, and fail on any word that is
//! neither the old nor the new value. Clearing races are covered next to
//! `Slot::clear_weak`, where the phase token can be built.

mod common;

use std::sync::atomic::{AtomicBool, Ordering};

use common::HeapFixture;
use fgc_weak::{Decoded, GcConfig, PointerCage, Slot, SlotKind, TaggedReference};

const READERS: usize = 4;

/// **Bug this finds:** Non-atomic relocation updates exposing half-written words
/// **Invariant verified:** Readers only ever see `Weak(a)` or `Weak(b)`
#[test]
fn test_update_never_tears() {
    let base = 0x0000_4000_0000_0000;
    let cage = PointerCage::new(base);
    let a = base + 0x0000_0040;
    let b = base + 0xFFFF_FF00;
    let slot = Slot::with_value(
        &cage,
        TaggedReference::make_weak(TaggedReference::from_strong_target(a)),
    );
    let done = AtomicBool::new(false);

    crossbeam::scope(|s| {
        for _ in 0..READERS {
            s.spawn(|_| {
                let mut observed = 0u64;
                while !done.load(Ordering::Acquire) {
                    let value = slot.load(&cage).decode();
                    assert!(
                        value == Decoded::Weak(a) || value == Decoded::Weak(b),
                        "reader saw torn or foreign value {:?}",
                        value
                    );
                    observed += 1;
                }
                observed
            });
        }

        s.spawn(|_| {
            for i in 0..50_000 {
                slot.update(&cage, if i % 2 == 0 { b } else { a });
            }
            done.store(true, Ordering::Release);
        });
    })
    .unwrap();
}

/// **Bug this finds:** Mutator loads slipping into the middle of a cycle
/// **Invariant verified:** `collect` holds the heap write lock, so a load sees
/// the heap as it was before the cycle or after it, never in between
#[test]
fn test_loads_serialize_with_collection() {
    let fixture = HeapFixture::with_config(GcConfig {
        heap_size: common::TEST_HEAP_SIZE,
        compact: false,
        verify_heap: true,
        ..Default::default()
    });
    let holder = fixture.root(&[SlotKind::MaybeWeak]);
    let x = fixture.object(&[]);
    fixture.store_weak(holder, 0, x);
    let done = AtomicBool::new(false);

    crossbeam::scope(|s| {
        for _ in 0..READERS {
            s.spawn(|_| {
                let mut saw_cleared = false;
                while !done.load(Ordering::Acquire) || !saw_cleared {
                    match fixture.decode(holder, 0) {
                        Decoded::Weak(target) => {
                            assert!(!saw_cleared, "cleared slot became weak again");
                            assert_eq!(target, x);
                        }
                        Decoded::Cleared => saw_cleared = true,
                        other => panic!("reader saw {:?}", other),
                    }
                }
            });
        }

        s.spawn(|_| {
            let stats = fixture.gc.collect().expect("collection");
            assert_eq!(stats.weak_cleared, 1);
            done.store(true, Ordering::Release);
        });
    })
    .unwrap();

    assert!(fixture.decode(holder, 0) == Decoded::Cleared);
}
