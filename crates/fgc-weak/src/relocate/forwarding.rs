//! Forwarding Table - Address Mapping During Relocation
//!
//! Maps the old address of every moved object to its new address. Built
//! before any slot is rewritten, then consulted once per pointer-bearing slot.
//!
//! Usage:
//! 1. Create a table covering the heap reservation
//! 2. Add an entry per moved object
//! 3. Look up each strong or weak slot target
//! 4. Drop the table when relocation is complete

use std::sync::atomic::{AtomicBool, Ordering};

use indexmap::IndexMap;
use parking_lot::RwLock;

use crate::object::{Address, OBJECT_ALIGNMENT};

/// ForwardingTable - mapping old addresses to new addresses
///
/// Entries are keyed by offset from the start of the covered range.
pub struct ForwardingTable {
    /// Start address of the covered range
    range_start: Address,

    /// Size of the covered range
    range_size: usize,

    /// Forwarding entries: old_offset -> new_address
    entries: RwLock<IndexMap<usize, Address>>,

    /// Table is complete (no more additions)
    complete: AtomicBool,
}

impl ForwardingTable {
    /// Create forwarding table for `[range_start, range_start + range_size)`
    pub fn new(range_start: Address, range_size: usize) -> Self {
        Self {
            range_start,
            range_size,
            entries: RwLock::new(IndexMap::new()),
            complete: AtomicBool::new(false),
        }
    }

    /// Add forwarding entry
    ///
    /// Rejects and logs entries with a null or misaligned new address, an old
    /// address outside the covered range, or arriving after `set_complete`.
    ///
    /// # Returns
    /// `true` if the entry was recorded
    pub fn add_entry(&self, old_address: Address, new_address: Address) -> bool {
        if self.is_complete() {
            log::warn!(
                "add_entry after completion: {:#x} -> {:#x}",
                old_address,
                new_address
            );
            return false;
        }

        if new_address == 0 {
            log::warn!("add_entry: new_address is null (old_address={:#x})", old_address);
            return false;
        }

        if new_address % OBJECT_ALIGNMENT != 0 {
            log::warn!(
                "add_entry: new_address {:#x} is not aligned to {} bytes",
                new_address,
                OBJECT_ALIGNMENT
            );
            return false;
        }

        let offset = match self.offset_of(old_address) {
            Some(offset) => offset,
            None => {
                log::warn!(
                    "add_entry: old_address {:#x} outside [{:#x}, +{:#x})",
                    old_address,
                    self.range_start,
                    self.range_size
                );
                return false;
            }
        };

        self.entries.write().insert(offset, new_address);
        true
    }

    /// Lookup the new address for `old_address`
    ///
    /// Returns `None` for addresses that did not move.
    pub fn lookup(&self, old_address: Address) -> Option<Address> {
        let offset = self.offset_of(old_address)?;
        self.entries.read().get(&offset).copied()
    }

    /// Map `address` through the table, returning it unchanged if it did not move
    pub fn forward(&self, address: Address) -> Address {
        self.lookup(address).unwrap_or(address)
    }

    fn offset_of(&self, address: Address) -> Option<usize> {
        let offset = address.checked_sub(self.range_start)?;
        (offset < self.range_size).then_some(offset)
    }

    /// Check if table is complete
    pub fn is_complete(&self) -> bool {
        self.complete.load(Ordering::Acquire)
    }

    /// Mark table as complete
    pub fn set_complete(&self) {
        self.complete.store(true, Ordering::Release);
    }

    /// Number of forwarded objects
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// All entries as `(old_address, new_address)`
    pub fn entries(&self) -> Vec<(Address, Address)> {
        self.entries
            .read()
            .iter()
            .map(|(offset, new)| (self.range_start + offset, *new))
            .collect()
    }
}
