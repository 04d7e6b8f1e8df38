//! Slot - one in-place heap field holding a tagged word
//!
//! Slots store the compressed form of a `TaggedReference` in an `AtomicUsize`.
//! Every write is one aligned word store, so concurrent readers see either the
//! old or the new value, never a torn mix. Writers are serialized by the
//! write barrier; this type assumes at most one writer per slot.
//!
//! Two operations change what a slot points at without a fresh value store:
//! - [`Slot::update`] rewrites the address bits, keeping strong/weak intact
//! - [`Slot::clear_weak`] turns a weak reference into the cleared sentinel and
//!   needs a [`ClearPhase`] token that only the collector can mint

use std::sync::atomic::{AtomicUsize, Ordering};

use crate::compression::AddressingContext;
use crate::gc::{GcState, PhaseCell};
use crate::object::{Address, TaggedReference, HEAP_OBJECT_TAG, WEAK_HEAP_OBJECT_MASK};

/// Proof that the collector is in its weak-clearing phase
///
/// Only the collector constructs one, and only while its phase is
/// `GcState::ClearingWeak`.
pub struct ClearPhase<'a> {
    state: &'a PhaseCell,
}

impl<'a> ClearPhase<'a> {
    pub(crate) fn new(state: &'a PhaseCell) -> Self {
        debug_assert_eq!(state.get(), GcState::ClearingWeak);
        Self { state }
    }

    pub fn is_active(&self) -> bool {
        self.state.get() == GcState::ClearingWeak
    }
}

/// In-place storage for one tagged word
#[derive(Debug, Default)]
pub struct Slot {
    word: AtomicUsize,
}

impl Slot {
    /// Create a slot holding Smi zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a slot holding `value`
    pub fn with_value<C: AddressingContext + ?Sized>(ctx: &C, value: TaggedReference) -> Self {
        Self {
            word: AtomicUsize::new(ctx.compress(value.raw())),
        }
    }

    /// Load and decompress
    #[inline]
    pub fn load<C: AddressingContext + ?Sized>(&self, ctx: &C) -> TaggedReference {
        TaggedReference::from_raw(ctx.decompress(self.word.load(Ordering::Acquire)))
    }

    /// Compress and store
    #[inline]
    pub fn store<C: AddressingContext + ?Sized>(&self, ctx: &C, value: TaggedReference) {
        self.word.store(ctx.compress(value.raw()), Ordering::Release);
    }

    /// Word as it sits in memory, still compressed
    #[inline]
    pub fn raw(&self) -> usize {
        self.word.load(Ordering::Acquire)
    }

    /// Point the slot at `new_target`, keeping its strong/weak discriminant
    ///
    /// Used when the target moved and for plain re-stores of a reference of
    /// the same strength. Never used to clear: the slot must hold a strong or
    /// weak reference and `new_target` must be a valid live address.
    pub fn update<C: AddressingContext + ?Sized>(&self, ctx: &C, new_target: Address) {
        let old = self.load(ctx);
        debug_assert!(
            old.is_strong_or_weak(),
            "update on a slot holding {:?}",
            old
        );
        debug_assert!(
            ctx.is_valid_address(new_target),
            "update to invalid address {:#x}",
            new_target
        );
        let updated = TaggedReference::from_raw(
            (old.raw() & WEAK_HEAP_OBJECT_MASK) | new_target | HEAP_OBJECT_TAG,
        );
        self.store(ctx, updated);
    }

    /// Replace a weak reference with the cleared sentinel
    ///
    /// Called once per weak slot whose target the trace proved unreachable.
    pub fn clear_weak<C: AddressingContext + ?Sized>(&self, phase: &ClearPhase<'_>, ctx: &C) {
        debug_assert!(
            phase.is_active(),
            "weak slot cleared outside the weak-clearing phase"
        );
        debug_assert!(
            self.load(ctx).is_weak(),
            "clear_weak on a slot holding {:?}",
            self.load(ctx)
        );
        self.word
            .store(ctx.compress(ctx.cleared_value().raw()), Ordering::Release);
    }
}
