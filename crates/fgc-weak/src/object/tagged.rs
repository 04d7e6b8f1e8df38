//! TaggedReference - one word that is a Smi, a strong reference, a weak
//! reference, or a cleared weak reference
//!
//! Weakness is folded into the pointer's own bits, so the tracer and the write
//! barrier decide it with one mask-and-compare. Classification never needs an
//! addressing context: every bit pattern satisfies exactly one of
//! `is_smi`, `is_strong`, `is_weak`, `is_cleared`.

use std::fmt;

use crate::compression::AddressingContext;
use crate::error::TaggedError;
use crate::object::{
    is_object_aligned, Address, Smi, CLEARED_WEAK_HEAP_OBJECT_LOWER32, HEAP_OBJECT_TAG,
    HEAP_OBJECT_TAG_MASK, SMI_TAG, SMI_TAG_MASK, WEAK_HEAP_OBJECT_MASK, WEAK_HEAP_OBJECT_TAG,
};

/// Strength of a heap reference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReferenceType {
    /// Contributes to reachability
    Strong,
    /// Does not keep the target alive
    Weak,
}

/// The four things a tagged word can be
///
/// Consumers match on this instead of probing predicates one by one, so a
/// missing case is a compile error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Decoded {
    Smi(Smi),
    Strong(Address),
    Weak(Address),
    Cleared,
}

/// A decompressed tagged word
///
/// Non-owning: holding a strong `TaggedReference` in a local does not keep
/// anything alive. Only a heap slot or a root contributes to reachability.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct TaggedReference(usize);

impl TaggedReference {
    #[inline]
    pub const fn from_raw(raw: usize) -> Self {
        TaggedReference(raw)
    }

    #[inline]
    pub const fn raw(self) -> usize {
        self.0
    }

    /// Build the Smi variant
    #[inline]
    pub const fn from_smi(smi: Smi) -> Self {
        TaggedReference(smi.to_word())
    }

    /// Build a strong reference to the object at `address`
    ///
    /// `address` must be the start of a live object. Nothing is checked in
    /// release builds.
    #[inline]
    pub fn from_strong_target(address: Address) -> Self {
        debug_assert!(
            is_object_aligned(address),
            "strong target {:#x} is not an object address",
            address
        );
        TaggedReference(address | HEAP_OBJECT_TAG)
    }

    /// Turn a pointer-bearing reference into a weak one with the same target
    ///
    /// # Panics
    ///
    /// Panics if `value` is a Smi. Small integers cannot be weakened, and a
    /// silently produced weak word would point at garbage.
    #[inline]
    pub fn make_weak(value: Self) -> Self {
        assert!(!value.is_smi(), "cannot weaken small integer {:?}", value);
        TaggedReference(value.0 | WEAK_HEAP_OBJECT_MASK)
    }

    /// Checked form of [`TaggedReference::make_weak`]
    pub fn try_make_weak(value: Self) -> Result<Self, TaggedError> {
        if value.is_smi() {
            return Err(TaggedError::WeakenSmi { raw: value.0 });
        }
        Ok(TaggedReference(value.0 | WEAK_HEAP_OBJECT_MASK))
    }

    /// Canonical cleared sentinel for `ctx`
    #[inline]
    pub fn cleared_value<C: AddressingContext + ?Sized>(ctx: &C) -> Self {
        ctx.cleared_value()
    }

    #[inline]
    pub const fn is_smi(self) -> bool {
        self.0 & SMI_TAG_MASK == SMI_TAG
    }

    #[inline]
    pub const fn is_strong(self) -> bool {
        self.0 & HEAP_OBJECT_TAG_MASK == HEAP_OBJECT_TAG
    }

    #[inline]
    pub const fn is_weak(self) -> bool {
        self.0 & HEAP_OBJECT_TAG_MASK == WEAK_HEAP_OBJECT_TAG && !self.is_cleared()
    }

    #[inline]
    pub const fn is_cleared(self) -> bool {
        self.0 as u32 == CLEARED_WEAK_HEAP_OBJECT_LOWER32
    }

    #[inline]
    pub const fn is_strong_or_weak(self) -> bool {
        !self.is_smi() && !self.is_cleared()
    }

    #[inline]
    pub const fn is_weak_or_cleared(self) -> bool {
        self.0 & HEAP_OBJECT_TAG_MASK == WEAK_HEAP_OBJECT_TAG
    }

    #[inline]
    const fn address_bits(self) -> Address {
        self.0 & !HEAP_OBJECT_TAG_MASK
    }

    pub fn decode(self) -> Decoded {
        if self.is_smi() {
            Decoded::Smi(Smi::from_word(self.0))
        } else if self.is_cleared() {
            Decoded::Cleared
        } else if self.is_weak() {
            Decoded::Weak(self.address_bits())
        } else {
            Decoded::Strong(self.address_bits())
        }
    }

    /// Target of a strong or weak reference; `None` for Smi and Cleared
    pub fn heap_object(self) -> Option<Address> {
        match self.decode() {
            Decoded::Strong(address) | Decoded::Weak(address) => Some(address),
            Decoded::Smi(_) | Decoded::Cleared => None,
        }
    }

    pub fn heap_object_if_strong(self) -> Option<Address> {
        match self.decode() {
            Decoded::Strong(address) => Some(address),
            _ => None,
        }
    }

    pub fn heap_object_if_weak(self) -> Option<Address> {
        match self.decode() {
            Decoded::Weak(address) => Some(address),
            _ => None,
        }
    }

    /// Target of a reference already known to be weak
    pub fn heap_object_assume_weak(self) -> Address {
        debug_assert!(self.is_weak(), "expected a weak reference, got {:?}", self);
        self.address_bits()
    }

    pub fn to_smi(self) -> Option<Smi> {
        match self.decode() {
            Decoded::Smi(smi) => Some(smi),
            _ => None,
        }
    }

    /// Strength of a live reference; `None` for Smi and Cleared
    pub fn reference_type(self) -> Option<ReferenceType> {
        match self.decode() {
            Decoded::Strong(_) => Some(ReferenceType::Strong),
            Decoded::Weak(_) => Some(ReferenceType::Weak),
            Decoded::Smi(_) | Decoded::Cleared => None,
        }
    }
}

impl From<Smi> for TaggedReference {
    fn from(smi: Smi) -> Self {
        TaggedReference::from_smi(smi)
    }
}

impl fmt::Debug for TaggedReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.decode() {
            Decoded::Smi(smi) => write!(f, "Smi({})", smi),
            Decoded::Strong(address) => write!(f, "Strong({:#x})", address),
            Decoded::Weak(address) => write!(f, "Weak({:#x})", address),
            Decoded::Cleared => write!(f, "Cleared({:#x})", self.0),
        }
    }
}
