//! Addressing contexts - how tagged words are stored in slots
//!
//! A context maps decompressed `TaggedReference` words to the word actually
//! kept in a slot and back, and owns the cleared sentinel for its range.
//! Tag bits survive compression unchanged, so weakness can be tested on the
//! stored word as well as on the decompressed one.
//!
//! Two contexts ship with the crate:
//! - [`FullPointers`]: slots hold full machine words
//! - [`PointerCage`]: slots hold the low 32 bits; heap references are
//!   rebuilt by OR-ing the 4GB-aligned cage base back in

use crate::config::GcConfig;
use crate::object::{
    is_object_aligned, Address, TaggedReference, CLEARED_WEAK_HEAP_OBJECT_LOWER32, SMI_TAG,
    SMI_TAG_MASK,
};

/// Size and alignment of a pointer cage
pub const CAGE_SIZE: usize = 1 << 32;

/// Highest canonical user-space address
const MAX_USER_ADDRESS: usize = 0x0000_7FFF_FFFF_FFFF;

/// Mapping between in-slot words and full heap addresses
pub trait AddressingContext: Send + Sync {
    /// Base of the address range; the cleared sentinel's upper bits
    fn base(&self) -> Address;

    /// Check if `address` lies in the range this context can encode
    fn contains(&self, address: Address) -> bool;

    /// Word to store in a slot for the decompressed word `word`
    fn compress(&self, word: usize) -> usize;

    /// Decompressed word for the slot content `stored`
    fn decompress(&self, stored: usize) -> usize;

    /// Canonical cleared sentinel; never aliases an object in this context
    fn cleared_value(&self) -> TaggedReference {
        TaggedReference::from_raw(self.base() | CLEARED_WEAK_HEAP_OBJECT_LOWER32 as usize)
    }

    /// Check if `address` can start an object in this context
    fn is_valid_address(&self, address: Address) -> bool {
        is_object_aligned(address) && self.contains(address)
    }
}

/// Uncompressed addressing; slots hold full words
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FullPointers;

impl AddressingContext for FullPointers {
    fn base(&self) -> Address {
        0
    }

    fn contains(&self, address: Address) -> bool {
        address != 0 && address <= MAX_USER_ADDRESS
    }

    #[inline]
    fn compress(&self, word: usize) -> usize {
        word
    }

    #[inline]
    fn decompress(&self, stored: usize) -> usize {
        stored
    }
}

/// 4GB pointer cage; slots hold 32-bit offsets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PointerCage {
    base: Address,
}

impl PointerCage {
    /// Create a cage at `base`
    ///
    /// # Panics
    ///
    /// Panics if `base` is not 4GB aligned. `GcConfig::validate` rejects such
    /// bases before a heap is built.
    pub fn new(base: Address) -> Self {
        assert!(
            base % CAGE_SIZE == 0,
            "cage base {:#x} is not 4GB aligned",
            base
        );
        Self { base }
    }
}

impl AddressingContext for PointerCage {
    fn base(&self) -> Address {
        self.base
    }

    fn contains(&self, address: Address) -> bool {
        address & !(CAGE_SIZE - 1) == self.base
    }

    #[inline]
    fn compress(&self, word: usize) -> usize {
        debug_assert!(
            word & SMI_TAG_MASK == SMI_TAG || word & !(CAGE_SIZE - 1) == self.base,
            "word {:#x} points outside cage {:#x}",
            word,
            self.base
        );
        word as u32 as usize
    }

    #[inline]
    fn decompress(&self, stored: usize) -> usize {
        let lower = stored as u32;
        if lower as usize & SMI_TAG_MASK == SMI_TAG {
            lower as i32 as isize as usize
        } else {
            self.base | lower as usize
        }
    }
}

/// Build the context selected by `config`
pub fn for_config(config: &GcConfig) -> Box<dyn AddressingContext> {
    if config.pointer_compression {
        Box::new(PointerCage::new(config.cage_base))
    } else {
        Box::new(FullPointers)
    }
}
