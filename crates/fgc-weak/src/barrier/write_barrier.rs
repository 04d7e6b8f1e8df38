//! Write Barrier - checked stores into heap fields
//!
//! Stores are single word writes into the slot, so a store never races a
//! concurrent reader into a torn value. The barrier assumes it is the only
//! writer of the slot; the collector holds the heap lock while writing.

use crate::error::{Result, TaggedError};
use crate::heap::{Heap, SlotKind};
use crate::object::{Address, Decoded, Smi, TaggedReference};

/// Store barrier bound to one heap
pub struct WriteBarrier<'h> {
    heap: &'h Heap,
}

impl<'h> WriteBarrier<'h> {
    pub fn new(heap: &'h Heap) -> Self {
        Self { heap }
    }

    /// Store `value` into field `index` of `host`
    ///
    /// # Errors
    /// `InvalidPointer` if `host` is not allocated, `BoundsCheckFailed` if the
    /// object has no field `index`, `InvalidAddress` if a referenced address
    /// cannot be encoded by the heap's addressing context.
    ///
    /// # Panics
    /// On a weak or cleared value for a strong-only field, and on a cleared
    /// value for any field. In debug builds also on a reference to an object
    /// that is not allocated.
    pub fn store(&self, host: Address, index: usize, value: TaggedReference) -> Result<()> {
        let object = self.heap.object(host)?;
        let slot = self.heap.slot(host, index)?;
        let kind = object.kind(index).unwrap_or(SlotKind::Strong);

        match value.decode() {
            Decoded::Smi(_) => {}
            Decoded::Strong(target) => self.check_target(target)?,
            Decoded::Weak(target) => {
                assert!(
                    kind == SlotKind::MaybeWeak,
                    "weak reference stored into strong-only field {:#x}[{}]",
                    host,
                    index
                );
                self.check_target(target)?;
            }
            Decoded::Cleared => {
                panic!(
                    "cleared sentinel stored by the mutator into {:#x}[{}]",
                    host, index
                );
            }
        }

        slot.store(self.heap.context(), value);
        Ok(())
    }

    pub fn store_smi(&self, host: Address, index: usize, value: Smi) -> Result<()> {
        self.store(host, index, TaggedReference::from_smi(value))
    }

    pub fn store_strong(&self, host: Address, index: usize, target: Address) -> Result<()> {
        self.store(host, index, TaggedReference::from_strong_target(target))
    }

    /// Store a weak reference to `target`; `index` must be a maybe-weak field
    pub fn store_weak(&self, host: Address, index: usize, target: Address) -> Result<()> {
        let weak = TaggedReference::make_weak(TaggedReference::from_strong_target(target));
        self.store(host, index, weak)
    }

    fn check_target(&self, target: Address) -> Result<()> {
        if !self.heap.context().is_valid_address(target) {
            return Err(TaggedError::InvalidAddress { address: target }.into());
        }
        debug_assert!(
            self.heap.is_allocated(target),
            "store of reference to unallocated object {:#x}",
            target
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GcConfig;
    use crate::error::FgcError;

    fn heap() -> Heap {
        Heap::new(&GcConfig {
            heap_size: 64 * 1024,
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_store_each_kind() {
        let mut heap = heap();
        let host = heap
            .allocate(&[SlotKind::Strong, SlotKind::MaybeWeak, SlotKind::MaybeWeak])
            .unwrap();
        let target = heap.allocate(&[]).unwrap();
        let barrier = WriteBarrier::new(&heap);

        barrier.store_strong(host, 0, target).unwrap();
        barrier.store_weak(host, 1, target).unwrap();
        barrier.store_smi(host, 2, Smi::new(-5)).unwrap();

        assert_eq!(heap.load(host, 0).unwrap().decode(), Decoded::Strong(target));
        assert_eq!(heap.load(host, 1).unwrap().decode(), Decoded::Weak(target));
        assert_eq!(
            heap.load(host, 2).unwrap().decode(),
            Decoded::Smi(Smi::new(-5))
        );
    }

    #[test]
    fn test_store_errors() {
        let mut heap = heap();
        let host = heap.allocate(&[SlotKind::Strong]).unwrap();
        let barrier = WriteBarrier::new(&heap);

        assert!(matches!(
            barrier.store_smi(host, 3, Smi::ZERO),
            Err(FgcError::BoundsCheckFailed { index: 3, length: 1 })
        ));
        assert!(matches!(
            barrier.store_smi(host + 8, 0, Smi::ZERO),
            Err(FgcError::InvalidPointer { .. })
        ));
    }

    #[test]
    fn test_store_rejects_address_outside_cage() {
        let mut heap = heap();
        let host = heap.allocate(&[SlotKind::Strong]).unwrap();
        let outside = heap.start() + crate::compression::CAGE_SIZE + 0x40;
        let result = WriteBarrier::new(&heap).store_strong(host, 0, outside);
        assert!(matches!(
            result,
            Err(FgcError::Tagged(TaggedError::InvalidAddress { .. }))
        ));
        assert_eq!(heap.load(host, 0).unwrap().decode(), Decoded::Smi(Smi::ZERO));
    }

    #[test]
    #[should_panic(expected = "weak reference stored into strong-only field")]
    fn test_weak_into_strong_field_panics() {
        let mut heap = heap();
        let host = heap.allocate(&[SlotKind::Strong]).unwrap();
        let target = heap.allocate(&[]).unwrap();
        let _ = WriteBarrier::new(&heap).store_weak(host, 0, target);
    }

    #[test]
    #[should_panic(expected = "cleared sentinel stored by the mutator")]
    fn test_cleared_store_panics() {
        let mut heap = heap();
        let host = heap.allocate(&[SlotKind::MaybeWeak]).unwrap();
        let cleared = heap.context().cleared_value();
        let _ = WriteBarrier::new(&heap).store(host, 0, cleared);
    }

    #[test]
    #[should_panic(expected = "unallocated object")]
    #[cfg(debug_assertions)]
    fn test_store_to_freed_target_panics() {
        let mut heap = heap();
        let host = heap.allocate(&[SlotKind::Strong]).unwrap();
        let target = heap.allocate(&[]).unwrap();
        heap.free(target).unwrap();
        let _ = WriteBarrier::new(&heap).store_strong(host, 0, target);
    }
}
