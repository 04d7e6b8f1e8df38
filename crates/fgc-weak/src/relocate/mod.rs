//! Relocate Module - Object Relocation & Reference Rewriting
//!
//! Moving an object invalidates every slot that points at it. Relocation
//! rewrites those slots with [`Slot::update`](crate::object::Slot::update),
//! which changes only the address bits: a weak slot stays weak, a strong slot
//! stays strong. Smis and cleared slots are never touched.
//!
//! Two entry points:
//! - [`Relocator::compact`] slides all live objects to the bottom of the heap
//! - [`Relocator::evacuate`] moves a single object to the top of the heap

pub mod forwarding;

pub use forwarding::ForwardingTable;

use serde::Serialize;

use crate::error::{FgcError, Result};
use crate::heap::Heap;
use crate::object::{Address, Decoded};

/// Relocation statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RelocationStats {
    pub moved_objects: usize,
    pub bytes_moved: usize,
    pub updated_slots: usize,
    pub updated_roots: usize,
}

/// Stateless driver for relocation passes
pub struct Relocator;

impl Relocator {
    /// Slide every live object down to close gaps left by sweeping
    pub fn compact(heap: &mut Heap) -> Result<RelocationStats> {
        let (moves, top) = heap.plan_compaction();
        let table = ForwardingTable::new(heap.start(), heap.capacity());

        let mut stats = RelocationStats::default();
        for &(old, new) in &moves {
            if !table.add_entry(old, new) {
                return Err(FgcError::RelocationFailed(format!(
                    "forwarding {:#x} -> {:#x} rejected",
                    old, new
                )));
            }
            stats.moved_objects += 1;
            stats.bytes_moved += heap.object(old)?.size();
        }
        table.set_complete();

        heap.apply_compaction(|old| table.forward(old), top);
        stats.updated_slots = Self::update_slots(heap, &table);
        stats.updated_roots = Self::update_roots(heap, &table);

        log::debug!(
            "compacted {} objects ({} bytes), {} slots rewritten",
            stats.moved_objects,
            stats.bytes_moved,
            stats.updated_slots
        );
        Ok(stats)
    }

    /// Move the object at `old` and rewrite every reference to it
    pub fn evacuate(heap: &mut Heap, old: Address) -> Result<Address> {
        let size = heap.object(old)?.size();
        let new = heap.move_object(old)?;

        let table = ForwardingTable::new(heap.start(), heap.capacity());
        if !table.add_entry(old, new) {
            return Err(FgcError::RelocationFailed(format!(
                "forwarding {:#x} -> {:#x} rejected",
                old, new
            )));
        }
        table.set_complete();

        let updated = Self::update_slots(heap, &table) + Self::update_roots(heap, &table);
        log::trace!(
            "evacuated {:#x} -> {:#x} ({} bytes, {} references)",
            old,
            new,
            size,
            updated
        );
        Ok(new)
    }

    /// Rewrite every strong or weak slot whose target moved
    ///
    /// # Returns
    /// Number of slots rewritten
    pub fn update_slots(heap: &Heap, table: &ForwardingTable) -> usize {
        let ctx = heap.context();
        let mut updated = 0;

        for object in heap.objects() {
            for (_, _, slot) in object.slots() {
                let target = match slot.load(ctx).decode() {
                    Decoded::Strong(target) | Decoded::Weak(target) => target,
                    Decoded::Smi(_) | Decoded::Cleared => continue,
                };
                if let Some(new) = table.lookup(target) {
                    slot.update(ctx, new);
                    updated += 1;
                }
            }
        }

        updated
    }

    fn update_roots(heap: &mut Heap, table: &ForwardingTable) -> usize {
        let mut updated = 0;
        for root in heap.roots_mut().iter_mut() {
            if let Some(new) = table.lookup(*root) {
                *root = new;
                updated += 1;
            }
        }
        updated
    }
}
