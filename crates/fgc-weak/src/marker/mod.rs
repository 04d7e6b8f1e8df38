//! Marker Module - Tracing with weak edges
//!
//! The marker walks the object graph from the roots. Each slot is decoded and
//! handed to a [`SlotVisitor`]:
//! - Strong edges are followed and their targets marked
//! - Weak edges are recorded but not followed
//! - Smis and cleared sentinels are skipped
//!
//! After tracing, a weak edge whose target is unmarked points at garbage and
//! the collector clears it before anything is freed.

use indexmap::IndexSet;

use crate::heap::{Heap, HeapObject};
use crate::object::{Address, Decoded, Smi};

/// Per-slot callbacks for a heap trace
///
/// One method per kind of tagged word, so a visitor states what it does with
/// each of them.
pub trait SlotVisitor {
    fn visit_smi(&mut self, _host: Address, _index: usize, _value: Smi) {}

    fn visit_strong(&mut self, host: Address, index: usize, target: Address);

    fn visit_weak(&mut self, host: Address, index: usize, target: Address);

    fn visit_cleared(&mut self, _host: Address, _index: usize) {}
}

/// Decode every slot of `object` and dispatch it to `visitor`
pub fn visit_object<V: SlotVisitor + ?Sized>(heap: &Heap, object: &HeapObject, visitor: &mut V) {
    let ctx = heap.context();
    let host = object.address();

    for (index, _, slot) in object.slots() {
        match slot.load(ctx).decode() {
            Decoded::Smi(value) => visitor.visit_smi(host, index, value),
            Decoded::Strong(target) => visitor.visit_strong(host, index, target),
            Decoded::Weak(target) => visitor.visit_weak(host, index, target),
            Decoded::Cleared => visitor.visit_cleared(host, index),
        }
    }
}

/// Location of a weak slot and the target it held when traced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WeakEdge {
    pub host: Address,
    pub index: usize,
    pub target: Address,
}

/// Outcome of one trace
#[derive(Debug, Default)]
pub struct MarkResult {
    /// Objects reachable through strong edges
    pub marked: IndexSet<Address>,

    /// Weak slots found in marked objects
    pub weak_edges: Vec<WeakEdge>,

    /// Slots decoded
    pub scanned_slots: u64,

    /// Strong edges whose target was not an allocated object
    pub dangling_strong: u64,
}

impl MarkResult {
    pub fn is_marked(&self, address: Address) -> bool {
        self.marked.contains(&address)
    }

    /// Weak edges whose targets did not survive
    pub fn dead_weak_edges(&self) -> impl Iterator<Item = &WeakEdge> + '_ {
        self.weak_edges
            .iter()
            .filter(move |edge| !self.marked.contains(&edge.target))
    }
}

/// Stop-the-world marker
pub struct Marker<'h> {
    heap: &'h Heap,
    worklist: Vec<Address>,
    result: MarkResult,
}

impl<'h> Marker<'h> {
    pub fn new(heap: &'h Heap) -> Self {
        Self {
            heap,
            worklist: Vec::new(),
            result: MarkResult::default(),
        }
    }

    /// Mark everything reachable from the heap's roots
    pub fn trace(mut self) -> MarkResult {
        let heap = self.heap;

        for &root in heap.roots() {
            self.mark(root);
        }

        while let Some(address) = self.worklist.pop() {
            // Marked only after an allocation check, so the lookup succeeds
            if let Ok(object) = heap.object(address) {
                visit_object(heap, object, &mut self);
            }
        }

        log::debug!(
            "trace finished: {} marked, {} slots scanned, {} weak edges",
            self.result.marked.len(),
            self.result.scanned_slots,
            self.result.weak_edges.len()
        );
        self.result
    }

    fn mark(&mut self, address: Address) {
        if !self.heap.is_allocated(address) {
            log::warn!("skipping edge to unallocated address {:#x}", address);
            self.result.dangling_strong += 1;
            return;
        }
        if self.result.marked.insert(address) {
            self.worklist.push(address);
        }
    }
}

impl SlotVisitor for Marker<'_> {
    fn visit_smi(&mut self, _host: Address, _index: usize, _value: Smi) {
        self.result.scanned_slots += 1;
    }

    fn visit_strong(&mut self, _host: Address, _index: usize, target: Address) {
        self.result.scanned_slots += 1;
        self.mark(target);
    }

    fn visit_weak(&mut self, host: Address, index: usize, target: Address) {
        self.result.scanned_slots += 1;
        self.result.weak_edges.push(WeakEdge {
            host,
            index,
            target,
        });
    }

    fn visit_cleared(&mut self, _host: Address, _index: usize) {
        self.result.scanned_slots += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GcConfig;
    use crate::heap::SlotKind;
    use crate::object::TaggedReference;

    fn heap() -> Heap {
        Heap::new(&GcConfig {
            heap_size: 64 * 1024,
            ..Default::default()
        })
        .unwrap()
    }

    fn link(heap: &Heap, host: Address, index: usize, value: TaggedReference) {
        heap.slot(host, index).unwrap().store(heap.context(), value);
    }

    #[test]
    fn test_strong_edges_are_followed() {
        let mut heap = heap();
        let a = heap.allocate(&[SlotKind::Strong]).unwrap();
        let b = heap.allocate(&[SlotKind::Strong]).unwrap();
        let c = heap.allocate(&[]).unwrap();
        link(&heap, a, 0, TaggedReference::from_strong_target(b));
        link(&heap, b, 0, TaggedReference::from_strong_target(c));
        heap.register_root(a).unwrap();

        let result = Marker::new(&heap).trace();
        assert!(result.is_marked(a) && result.is_marked(b) && result.is_marked(c));
        assert_eq!(result.scanned_slots, 2);
    }

    #[test]
    fn test_weak_edges_are_recorded_not_followed() {
        let mut heap = heap();
        let a = heap.allocate(&[SlotKind::MaybeWeak]).unwrap();
        let b = heap.allocate(&[]).unwrap();
        link(
            &heap,
            a,
            0,
            TaggedReference::make_weak(TaggedReference::from_strong_target(b)),
        );
        heap.register_root(a).unwrap();

        let result = Marker::new(&heap).trace();
        assert!(!result.is_marked(b));
        assert_eq!(
            result.weak_edges,
            vec![WeakEdge {
                host: a,
                index: 0,
                target: b
            }]
        );
        assert_eq!(result.dead_weak_edges().count(), 1);
    }

    #[test]
    fn test_weak_target_kept_by_other_strong_edge() {
        let mut heap = heap();
        let a = heap.allocate(&[SlotKind::MaybeWeak, SlotKind::Strong]).unwrap();
        let b = heap.allocate(&[]).unwrap();
        link(
            &heap,
            a,
            0,
            TaggedReference::make_weak(TaggedReference::from_strong_target(b)),
        );
        link(&heap, a, 1, TaggedReference::from_strong_target(b));
        heap.register_root(a).unwrap();

        let result = Marker::new(&heap).trace();
        assert!(result.is_marked(b));
        assert_eq!(result.dead_weak_edges().count(), 0);
    }

    #[test]
    fn test_cycles_terminate() {
        let mut heap = heap();
        let a = heap.allocate(&[SlotKind::Strong]).unwrap();
        let b = heap.allocate(&[SlotKind::Strong]).unwrap();
        link(&heap, a, 0, TaggedReference::from_strong_target(b));
        link(&heap, b, 0, TaggedReference::from_strong_target(a));
        heap.register_root(a).unwrap();

        let result = Marker::new(&heap).trace();
        assert_eq!(result.marked.len(), 2);
    }

    #[test]
    fn test_dangling_strong_edge_counted() {
        let mut heap = heap();
        let a = heap.allocate(&[SlotKind::Strong]).unwrap();
        let b = heap.allocate(&[]).unwrap();
        link(&heap, a, 0, TaggedReference::from_strong_target(b));
        heap.register_root(a).unwrap();
        heap.free(b).unwrap();

        let result = Marker::new(&heap).trace();
        assert_eq!(result.dangling_strong, 1);
        assert_eq!(result.marked.len(), 1);
    }

    struct Counter {
        kinds: [usize; 4],
    }

    impl SlotVisitor for Counter {
        fn visit_smi(&mut self, _: Address, _: usize, _: Smi) {
            self.kinds[0] += 1;
        }
        fn visit_strong(&mut self, _: Address, _: usize, _: Address) {
            self.kinds[1] += 1;
        }
        fn visit_weak(&mut self, _: Address, _: usize, _: Address) {
            self.kinds[2] += 1;
        }
        fn visit_cleared(&mut self, _: Address, _: usize) {
            self.kinds[3] += 1;
        }
    }

    #[test]
    fn test_visit_object_dispatches_each_kind() {
        let mut heap = heap();
        let a = heap.allocate(&[SlotKind::MaybeWeak; 4]).unwrap();
        let b = heap.allocate(&[]).unwrap();
        let strong = TaggedReference::from_strong_target(b);
        link(&heap, a, 1, strong);
        link(&heap, a, 2, TaggedReference::make_weak(strong));
        link(&heap, a, 3, heap.context().cleared_value());

        let mut counter = Counter { kinds: [0; 4] };
        visit_object(&heap, heap.object(a).unwrap(), &mut counter);
        assert_eq!(counter.kinds, [1, 1, 1, 1]);
    }
}
