//! HeapObjectReference - the pointer-only subset of tagged words
//!
//! Strong, weak, or cleared. Never a Smi.

use crate::compression::AddressingContext;
use crate::error::TaggedError;
use crate::object::{Address, ReferenceType, Slot, TaggedReference};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct HeapObjectReference(TaggedReference);

impl HeapObjectReference {
    pub fn strong(address: Address) -> Self {
        Self(TaggedReference::from_strong_target(address))
    }

    pub fn weak(address: Address) -> Self {
        Self(TaggedReference::make_weak(
            TaggedReference::from_strong_target(address),
        ))
    }

    pub fn from(address: Address, kind: ReferenceType) -> Self {
        match kind {
            ReferenceType::Strong => Self::strong(address),
            ReferenceType::Weak => Self::weak(address),
        }
    }

    pub fn cleared_value<C: AddressingContext + ?Sized>(ctx: &C) -> Self {
        Self(ctx.cleared_value())
    }

    /// Point `slot` at `address`, keeping its strength
    ///
    /// See [`Slot::update`].
    pub fn update<C: AddressingContext + ?Sized>(slot: &Slot, ctx: &C, address: Address) {
        slot.update(ctx, address);
    }

    /// Target address; `None` once cleared
    pub fn target(self) -> Option<Address> {
        self.0.heap_object()
    }

    pub fn is_cleared(self) -> bool {
        self.0.is_cleared()
    }

    pub fn reference_type(self) -> Option<ReferenceType> {
        self.0.reference_type()
    }

    pub fn as_tagged(self) -> TaggedReference {
        self.0
    }
}

impl From<HeapObjectReference> for TaggedReference {
    fn from(reference: HeapObjectReference) -> Self {
        reference.0
    }
}

impl TryFrom<TaggedReference> for HeapObjectReference {
    type Error = TaggedError;

    fn try_from(value: TaggedReference) -> Result<Self, Self::Error> {
        if value.is_smi() {
            return Err(TaggedError::NotAPointer { raw: value.raw() });
        }
        Ok(Self(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compression::PointerCage;
    use crate::object::{Decoded, Smi};

    const BASE: usize = 0x0000_1000_0000_0000;
    const X: Address = BASE + 0x80;

    #[test]
    fn test_from_reference_type() {
        let strong = HeapObjectReference::from(X, ReferenceType::Strong);
        let weak = HeapObjectReference::from(X, ReferenceType::Weak);
        assert_eq!(strong, HeapObjectReference::strong(X));
        assert_eq!(weak.as_tagged().decode(), Decoded::Weak(X));
        assert_eq!(weak.target(), Some(X));
    }

    #[test]
    fn test_cleared_has_no_target() {
        let cleared = HeapObjectReference::cleared_value(&PointerCage::new(BASE));
        assert!(cleared.is_cleared());
        assert_eq!(cleared.target(), None);
        assert_eq!(cleared.reference_type(), None);
    }

    #[test]
    fn test_try_from_rejects_smi() {
        let smi = TaggedReference::from_smi(Smi::new(3));
        assert_eq!(
            HeapObjectReference::try_from(smi),
            Err(TaggedError::NotAPointer { raw: 6 })
        );

        let strong = TaggedReference::from_strong_target(X);
        assert_eq!(
            TaggedReference::from(HeapObjectReference::try_from(strong).unwrap()),
            strong
        );
    }

    #[test]
    fn test_update_through_reference() {
        let cage = PointerCage::new(BASE);
        let slot = Slot::with_value(&cage, HeapObjectReference::weak(X).into());
        HeapObjectReference::update(&slot, &cage, X + 0x100);
        assert_eq!(slot.load(&cage).decode(), Decoded::Weak(X + 0x100));
    }
}
