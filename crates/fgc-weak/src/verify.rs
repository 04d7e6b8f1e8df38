//! Heap Verifier
//!
//! Walks every slot of every live object and checks the weak-reference
//! contract:
//! - Strong slots point at allocated objects
//! - Weak slots point at allocated objects; Cleared is fine, dangling is not
//! - Cleared sentinels never look like a valid address
//! - Strong-only fields never hold Weak or Cleared values
//!
//! Roots are checked as well. Findings are collected, not short-circuited, so
//! a report shows every problem from one walk.

use std::fmt::Write as _;

use thiserror::Error;

use crate::heap::{Heap, SlotKind};
use crate::object::{Address, Decoded, HEAP_OBJECT_TAG_MASK};

/// One inconsistency found by [`verify`]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VerifyError {
    #[error("strong slot {host:#x}[{index}] points at unallocated {target:#x}")]
    DanglingStrong {
        host: Address,
        index: usize,
        target: Address,
    },

    #[error("weak slot {host:#x}[{index}] points at unallocated {target:#x} and was not cleared")]
    DanglingWeak {
        host: Address,
        index: usize,
        target: Address,
    },

    #[error("cleared sentinel in {host:#x}[{index}] decodes to a valid address")]
    ClearedIsValidAddress { host: Address, index: usize },

    #[error("strong-only field {host:#x}[{index}] holds a {found} value")]
    WeakInStrongField {
        host: Address,
        index: usize,
        found: &'static str,
    },

    #[error("root {address:#x} is not an allocated object")]
    DanglingRoot { address: Address },
}

/// Whether the collector verifies after each cycle in this build
pub const fn verify_enabled() -> bool {
    cfg!(any(debug_assertions, feature = "verify-heap"))
}

/// Check every slot and root of `heap`
pub fn verify(heap: &Heap) -> Result<(), Vec<VerifyError>> {
    let ctx = heap.context();
    let mut errors = Vec::new();

    for &root in heap.roots() {
        if !heap.is_allocated(root) {
            errors.push(VerifyError::DanglingRoot { address: root });
        }
    }

    for object in heap.objects() {
        let host = object.address();
        for (index, kind, slot) in object.slots() {
            let value = slot.load(ctx);
            match value.decode() {
                Decoded::Smi(_) => {}
                Decoded::Strong(target) => {
                    if !heap.is_allocated(target) {
                        errors.push(VerifyError::DanglingStrong {
                            host,
                            index,
                            target,
                        });
                    }
                }
                Decoded::Weak(target) => {
                    if kind == SlotKind::Strong {
                        errors.push(VerifyError::WeakInStrongField {
                            host,
                            index,
                            found: "weak",
                        });
                    }
                    if !heap.is_allocated(target) {
                        errors.push(VerifyError::DanglingWeak {
                            host,
                            index,
                            target,
                        });
                    }
                }
                Decoded::Cleared => {
                    if kind == SlotKind::Strong {
                        errors.push(VerifyError::WeakInStrongField {
                            host,
                            index,
                            found: "cleared",
                        });
                    }
                    if ctx.is_valid_address(value.raw() & !HEAP_OBJECT_TAG_MASK) {
                        errors.push(VerifyError::ClearedIsValidAddress { host, index });
                    }
                }
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Render findings one per line
pub fn report(errors: &[VerifyError]) -> String {
    let mut out = format!("heap verification found {} problem(s)", errors.len());
    for error in errors {
        let _ = write!(out, "\n  - {}", error);
    }
    out
}

/// Verify and panic with the full report on any finding
pub fn verify_or_abort(heap: &Heap) {
    if let Err(errors) = verify(heap) {
        panic!("{}", report(&errors));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GcConfig;
    use crate::object::{Smi, TaggedReference};

    fn heap() -> Heap {
        Heap::new(&GcConfig {
            heap_size: 64 * 1024,
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_consistent_heap_passes() {
        let mut heap = heap();
        let a = heap.allocate(&[SlotKind::Strong, SlotKind::MaybeWeak, SlotKind::MaybeWeak]).unwrap();
        let b = heap.allocate(&[]).unwrap();
        let ctx = heap.context();
        let strong = TaggedReference::from_strong_target(b);
        heap.slot(a, 0).unwrap().store(ctx, strong);
        heap.slot(a, 1).unwrap().store(ctx, TaggedReference::make_weak(strong));
        heap.slot(a, 2).unwrap().store(ctx, ctx.cleared_value());
        heap.register_root(a).unwrap();

        assert_eq!(verify(&heap), Ok(()));
    }

    #[test]
    fn test_dangling_weak_detected() {
        let mut heap = heap();
        let a = heap.allocate(&[SlotKind::MaybeWeak]).unwrap();
        let b = heap.allocate(&[]).unwrap();
        heap.slot(a, 0).unwrap().store(
            heap.context(),
            TaggedReference::make_weak(TaggedReference::from_strong_target(b)),
        );
        heap.free(b).unwrap();

        assert_eq!(
            verify(&heap),
            Err(vec![VerifyError::DanglingWeak {
                host: a,
                index: 0,
                target: b
            }])
        );
    }

    #[test]
    fn test_weak_in_strong_field_detected() {
        let mut heap = heap();
        let a = heap.allocate(&[SlotKind::Strong, SlotKind::Strong]).unwrap();
        let b = heap.allocate(&[]).unwrap();
        let ctx = heap.context();
        heap.slot(a, 0).unwrap().store(
            ctx,
            TaggedReference::make_weak(TaggedReference::from_strong_target(b)),
        );
        heap.slot(a, 1).unwrap().store(ctx, ctx.cleared_value());

        let errors = verify(&heap).unwrap_err();
        assert_eq!(errors.len(), 2);
        assert!(errors
            .iter()
            .all(|e| matches!(e, VerifyError::WeakInStrongField { .. })));
    }

    #[test]
    fn test_all_findings_reported() {
        let mut heap = heap();
        let a = heap.allocate(&[SlotKind::Strong, SlotKind::Strong]).unwrap();
        let b = heap.allocate(&[]).unwrap();
        let ctx = heap.context();
        heap.slot(a, 0)
            .unwrap()
            .store(ctx, TaggedReference::from_strong_target(b));
        heap.slot(a, 1)
            .unwrap()
            .store(ctx, TaggedReference::from_smi(Smi::new(4)));
        heap.register_root(b).unwrap();
        heap.free(b).unwrap();
        heap.roots_mut().push(b);

        let errors = verify(&heap).unwrap_err();
        assert_eq!(errors.len(), 2);
        let text = report(&errors);
        assert!(text.starts_with("heap verification found 2 problem(s)"));
        assert!(text.contains("root"));
        assert!(text.contains("strong slot"));
    }

    #[test]
    #[should_panic(expected = "heap verification found")]
    fn test_verify_or_abort_panics() {
        let mut heap = heap();
        let a = heap.allocate(&[SlotKind::Strong]).unwrap();
        let b = heap.allocate(&[]).unwrap();
        heap.slot(a, 0)
            .unwrap()
            .store(heap.context(), TaggedReference::from_strong_target(b));
        heap.free(b).unwrap();
        verify_or_abort(&heap);
    }
}
