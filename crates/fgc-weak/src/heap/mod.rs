//! Heap Module - arena of tagged-slot objects
//!
//! Objects are bookkeeping records keyed by their address; references between
//! them are plain addresses stored in slots, never reference-counted pointers,
//! so cycles cost nothing and are reclaimed by tracing.
//!
//! Memory layout of the reservation:
//!
//! ```text
//! start                start + HEAP_RESERVED                  top          end
//! ┌──────────────────┬──────────────────────────────────────┬────────────┐
//! │ reserved header  │ objects (bump allocated, ascending)  │    free    │
//! └──────────────────┴──────────────────────────────────────┴────────────┘
//! ```
//!
//! The reserved header keeps every object off the cage's null offset, which
//! is what the cleared sentinel encodes.

use indexmap::IndexMap;

use crate::compression::{self, AddressingContext};
use crate::config::GcConfig;
use crate::error::{FgcError, Result};
use crate::object::{
    is_object_aligned, Address, Slot, TaggedReference, OBJECT_ALIGNMENT, WORD_SIZE,
};

/// Header words preceding the slots of every object
pub const HEADER_SIZE: usize = WORD_SIZE;

/// Bytes at the start of the reservation that never hold an object
pub const HEAP_RESERVED: usize = 0x40;

/// Declared kind of an object field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SlotKind {
    /// Holds Smis and strong references only
    Strong,
    /// May also hold weak references and the cleared sentinel
    MaybeWeak,
}

/// Size in bytes of an object with `slot_count` fields
pub const fn object_size(slot_count: usize) -> usize {
    align_up(HEADER_SIZE + slot_count * WORD_SIZE, OBJECT_ALIGNMENT)
}

const fn align_up(value: usize, alignment: usize) -> usize {
    (value + alignment - 1) & !(alignment - 1)
}

/// One allocated object
#[derive(Debug)]
pub struct HeapObject {
    address: Address,
    kinds: Box<[SlotKind]>,
    slots: Box<[Slot]>,
}

impl HeapObject {
    pub fn address(&self) -> Address {
        self.address
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn size(&self) -> usize {
        object_size(self.slots.len())
    }

    pub fn slot(&self, index: usize) -> Option<&Slot> {
        self.slots.get(index)
    }

    pub fn kind(&self, index: usize) -> Option<SlotKind> {
        self.kinds.get(index).copied()
    }

    /// Iterate fields as `(index, kind, slot)`
    pub fn slots(&self) -> impl Iterator<Item = (usize, SlotKind, &Slot)> {
        self.kinds
            .iter()
            .zip(self.slots.iter())
            .enumerate()
            .map(|(index, (kind, slot))| (index, *kind, slot))
    }
}

/// Arena heap
///
/// Insertion order of `objects` is address order: allocation bumps upward,
/// moves re-insert at the top, and compaction rebuilds the map in order.
pub struct Heap {
    ctx: Box<dyn AddressingContext>,
    start: Address,
    end: Address,
    top: Address,
    used: usize,
    objects: IndexMap<Address, HeapObject>,
    roots: Vec<Address>,
}

impl Heap {
    /// Reserve a heap described by `config`
    pub fn new(config: &GcConfig) -> Result<Self> {
        config.validate()?;

        let start = config.cage_base;
        Ok(Self {
            ctx: compression::for_config(config),
            start,
            end: start + config.heap_size,
            top: start + HEAP_RESERVED,
            used: 0,
            objects: IndexMap::new(),
            roots: Vec::new(),
        })
    }

    /// Addressing context slots of this heap are encoded with
    pub fn context(&self) -> &dyn AddressingContext {
        &*self.ctx
    }

    pub fn start(&self) -> Address {
        self.start
    }

    pub fn end(&self) -> Address {
        self.end
    }

    pub fn top(&self) -> Address {
        self.top
    }

    pub fn capacity(&self) -> usize {
        self.end - self.start
    }

    /// Bytes held by live objects
    pub fn used_bytes(&self) -> usize {
        self.used
    }

    /// Bytes left for bump allocation
    pub fn available_bytes(&self) -> usize {
        self.end.saturating_sub(self.top)
    }

    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    /// Allocate an object with one field per entry of `layout`
    ///
    /// Fields start as Smi zero.
    pub fn allocate(&mut self, layout: &[SlotKind]) -> Result<Address> {
        let size = object_size(layout.len());
        let address = self.bump(size)?;

        let slots = layout.iter().map(|_| Slot::new()).collect();
        self.objects.insert(
            address,
            HeapObject {
                address,
                kinds: layout.into(),
                slots,
            },
        );
        self.used += size;

        log::trace!("allocated {} bytes at {:#x}", size, address);
        Ok(address)
    }

    fn bump(&mut self, size: usize) -> Result<Address> {
        let address = place(self.top);
        match address.checked_add(size) {
            Some(new_top) if new_top <= self.end => {
                self.top = new_top;
                Ok(address)
            }
            _ => Err(FgcError::OutOfMemory {
                requested: size,
                available: self.available_bytes(),
            }),
        }
    }

    /// Release the object at `address`
    ///
    /// Slots elsewhere that still point here become dangling; the collector
    /// only frees objects no strong slot reaches and clears weak ones first.
    pub fn free(&mut self, address: Address) -> Result<HeapObject> {
        let object = self
            .objects
            .shift_remove(&address)
            .ok_or(FgcError::InvalidPointer { address })?;
        self.used -= object.size();
        self.roots.retain(|root| *root != address);
        Ok(object)
    }

    /// Check if `address` is the start of a live object
    pub fn is_allocated(&self, address: Address) -> bool {
        self.objects.contains_key(&address)
    }

    pub fn object(&self, address: Address) -> Result<&HeapObject> {
        self.objects
            .get(&address)
            .ok_or(FgcError::InvalidPointer { address })
    }

    pub fn slot(&self, host: Address, index: usize) -> Result<&Slot> {
        let object = self.object(host)?;
        object.slot(index).ok_or(FgcError::BoundsCheckFailed {
            index,
            length: object.len(),
        })
    }

    /// Read one field, decompressed
    pub fn load(&self, host: Address, index: usize) -> Result<TaggedReference> {
        Ok(self.slot(host, index)?.load(self.context()))
    }

    /// Live objects in address order
    pub fn objects(&self) -> impl Iterator<Item = &HeapObject> {
        self.objects.values()
    }

    /// Move one object to the top of the heap
    ///
    /// Slot contents travel with the object unchanged. References to the old
    /// address are left for the caller to rewrite.
    pub fn move_object(&mut self, old: Address) -> Result<Address> {
        let size = self.object(old)?.size();
        let new = self.bump(size)?;

        let mut object = self
            .objects
            .shift_remove(&old)
            .ok_or(FgcError::InvalidPointer { address: old })?;
        object.address = new;
        self.objects.insert(new, object);

        log::trace!("moved object {:#x} -> {:#x}", old, new);
        Ok(new)
    }

    /// Plan a sliding compaction
    ///
    /// Returns `(old, new)` for every object that changes address, plus the
    /// new allocation top.
    pub(crate) fn plan_compaction(&self) -> (Vec<(Address, Address)>, Address) {
        let mut moves = Vec::new();
        let mut cursor = self.start + HEAP_RESERVED;

        for object in self.objects.values() {
            let new = place(cursor);
            if new != object.address {
                moves.push((object.address, new));
            }
            cursor = new + object.size();
        }

        (moves, cursor)
    }

    /// Rekey every object through `forward` and reset the allocation top
    pub(crate) fn apply_compaction(&mut self, forward: impl Fn(Address) -> Address, top: Address) {
        let objects = std::mem::take(&mut self.objects);
        self.objects = objects
            .into_iter()
            .map(|(old, mut object)| {
                let new = forward(old);
                object.address = new;
                (new, object)
            })
            .collect();
        self.top = top;
    }

    // ------------------------------------------------------------------------
    // Roots
    // ------------------------------------------------------------------------

    /// Register a strong root
    pub fn register_root(&mut self, address: Address) -> Result<()> {
        if !is_object_aligned(address) {
            return Err(FgcError::AlignmentError {
                address,
                alignment: OBJECT_ALIGNMENT,
            });
        }
        if !self.is_allocated(address) {
            return Err(FgcError::InvalidPointer { address });
        }
        if !self.roots.contains(&address) {
            self.roots.push(address);
        }
        Ok(())
    }

    pub fn unregister_root(&mut self, address: Address) -> Result<()> {
        let before = self.roots.len();
        self.roots.retain(|root| *root != address);
        if self.roots.len() == before {
            return Err(FgcError::InvalidPointer { address });
        }
        Ok(())
    }

    pub fn roots(&self) -> &[Address] {
        &self.roots
    }

    pub(crate) fn roots_mut(&mut self) -> &mut Vec<Address> {
        &mut self.roots
    }
}

/// First usable object address at or after `cursor`
///
/// Skips 4GB boundaries: an object there would share the cleared sentinel's
/// low 32 bits.
fn place(cursor: Address) -> Address {
    if cursor as u32 == 0 {
        cursor + HEAP_RESERVED
    } else {
        cursor
    }
}
