//! Object Module - tagged words and the slots that hold them
//!
//! Every heap field is one machine word. The low two bits say what the word is:
//!
//! ```text
//! ┌──────────────────────────────────────────────┬────┬────┐
//! │              payload / address               │ b1 │ b0 │
//! └──────────────────────────────────────────────┴────┴────┘
//!   b0 = 0        Smi, 31-bit payload in bits 1..32
//!   b1 b0 = 01    strong heap reference
//!   b1 b0 = 11    weak heap reference
//!   low 32 = 0b11 cleared weak reference (weak tag, null cage offset)
//! ```
//!
//! Object addresses are 8-byte aligned and never have zero low 32 bits, so
//! the cleared sentinel cannot alias a weak pointer to a real object.

pub mod reference;
pub mod slot;
pub mod smi;
pub mod tagged;

pub use reference::HeapObjectReference;
pub use slot::{ClearPhase, Slot};
pub use smi::Smi;
pub use tagged::{Decoded, ReferenceType, TaggedReference};

/// Full machine address of a heap object
pub type Address = usize;

/// Size of one tagged word
pub const WORD_SIZE: usize = std::mem::size_of::<usize>();

/// Object start alignment
pub const OBJECT_ALIGNMENT: usize = 8;

/// Bit 0 clear marks a Smi
pub const SMI_TAG_MASK: usize = 0b01;
pub const SMI_TAG: usize = 0b00;

/// Both low bits discriminate heap references
pub const HEAP_OBJECT_TAG_MASK: usize = 0b11;
pub const HEAP_OBJECT_TAG: usize = 0b01;
pub const WEAK_HEAP_OBJECT_TAG: usize = 0b11;

/// The single bit separating weak from strong references
pub const WEAK_HEAP_OBJECT_MASK: usize = 0b10;

/// Low 32 bits of every cleared sentinel
pub const CLEARED_WEAK_HEAP_OBJECT_LOWER32: u32 = 0b11;

#[cfg(not(target_pointer_width = "64"))]
compile_error!("fgc-weak requires a 64-bit target");

/// Check that an address could start an object without consulting any context
///
/// Aligned, and not sharing its low 32 bits with the cleared sentinel's null offset.
#[inline]
pub const fn is_object_aligned(address: Address) -> bool {
    address % OBJECT_ALIGNMENT == 0 && (address as u32) != 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tags_fit_alignment() {
        assert_eq!(OBJECT_ALIGNMENT & HEAP_OBJECT_TAG_MASK, 0);
        assert_eq!(WEAK_HEAP_OBJECT_TAG, HEAP_OBJECT_TAG | WEAK_HEAP_OBJECT_MASK);
    }

    #[test]
    fn test_is_object_aligned() {
        assert!(is_object_aligned(0x1000_0000_0040));
        assert!(!is_object_aligned(0x1000_0000_0044));
        assert!(!is_object_aligned(0x1000_0000_0000));
        assert!(!is_object_aligned(0));
    }
}
