//! Raw memory access bridge
//!
//! Translates field and array reads into single typed loads on the host
//! arena. The bridge performs one bounds-respecting, kind-correctly-sized
//! load per call and nothing else; deciding whether a load is *eligible*
//! (stability, fold safety, receiver shape) is the reflection provider's
//! job, and a load the provider should have excluded simply yields `None`.

use crate::ci::constant::{PrimitiveConstant, PrimitiveKind};
use crate::ci::meta::FieldKind;
use crate::vm::heap::{decode_ref, Heap, HeapCell, HeapRef, SharedHeap};

/// The raw memory-access collaborator consumed by the reflection layer.
pub trait MemoryAccess: Send + Sync {
    /// Perform a single kind-sized primitive load at `base + offset`.
    fn read_primitive(
        &self,
        base: HeapRef,
        offset: u64,
        kind: PrimitiveKind,
    ) -> Option<PrimitiveConstant>;

    /// Perform a single reference load at `base + offset`. The outer
    /// `Option` reports whether the load could be performed; the inner one
    /// is the loaded reference (`None` for null).
    #[allow(clippy::option_option)]
    fn read_reference(&self, base: HeapRef, offset: u64) -> Option<Option<HeapRef>>;
}

/// Slot-aligned field offsets: 8 bytes per slot.
const SLOT_SIZE: u64 = 8;

fn slot_index(offset: u64) -> Option<usize> {
    (offset % SLOT_SIZE == 0).then(|| (offset / SLOT_SIZE) as usize)
}

/// Typed primitive load over a borrowed heap. Used by the provider while
/// it already holds the heap lock.
pub(crate) fn raw_read_primitive(
    heap: &Heap,
    base: HeapRef,
    offset: u64,
    kind: PrimitiveKind,
) -> Option<PrimitiveConstant> {
    match heap.get(base)? {
        HeapCell::Instance { fields, .. } => {
            let bits = *fields.get(slot_index(offset)?)?;
            Some(PrimitiveConstant::from_raw_bits(kind, bits))
        }
        HeapCell::TypeMirror { statics, .. } => {
            let bits = *statics.get(slot_index(offset)?)?;
            Some(PrimitiveConstant::from_raw_bits(kind, bits))
        }
        HeapCell::Array {
            component,
            elements,
        } => {
            // The load must use the array's own component kind and land on
            // an element boundary.
            match component.as_field_kind() {
                FieldKind::Primitive(k) if k == kind => {
                    let size = kind.byte_size();
                    if offset % size != 0 {
                        return None;
                    }
                    let bits = *elements.get((offset / size) as usize)?;
                    Some(PrimitiveConstant::from_raw_bits(kind, bits))
                }
                _ => None,
            }
        }
        HeapCell::Boxed(value) => {
            (offset == 0 && value.kind() == kind).then(|| *value)
        }
        HeapCell::Str(_) | HeapCell::MethodHandle(_) => None,
    }
}

/// Reference load over a borrowed heap.
#[allow(clippy::option_option)]
pub(crate) fn raw_read_reference(
    heap: &Heap,
    base: HeapRef,
    offset: u64,
) -> Option<Option<HeapRef>> {
    let bits = match heap.get(base)? {
        HeapCell::Instance { fields, .. } => *fields.get(slot_index(offset)?)?,
        HeapCell::TypeMirror { statics, .. } => *statics.get(slot_index(offset)?)?,
        HeapCell::Array {
            component,
            elements,
        } => match component.as_field_kind() {
            FieldKind::Reference => *elements.get(slot_index(offset)?)?,
            FieldKind::Primitive(_) => return None,
        },
        HeapCell::Str(_) | HeapCell::Boxed(_) | HeapCell::MethodHandle(_) => return None,
    };
    Some(decode_ref(bits))
}

/// Heap-backed implementation of [`MemoryAccess`].
pub struct HeapMemoryAccess {
    heap: SharedHeap,
}

impl HeapMemoryAccess {
    /// Bridge over a shared heap.
    pub fn new(heap: SharedHeap) -> Self {
        Self { heap }
    }
}

impl MemoryAccess for HeapMemoryAccess {
    fn read_primitive(
        &self,
        base: HeapRef,
        offset: u64,
        kind: PrimitiveKind,
    ) -> Option<PrimitiveConstant> {
        raw_read_primitive(&self.heap.read(), base, offset, kind)
    }

    fn read_reference(&self, base: HeapRef, offset: u64) -> Option<Option<HeapRef>> {
        raw_read_reference(&self.heap.read(), base, offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ci::meta::ResolvedType;
    use crate::vm::heap::encode_ref;

    fn heap_with_pair() -> (Heap, HeapRef) {
        let mut heap = Heap::new();
        let class = heap.register_class("Pair", None, 2, 0);
        let obj = heap.alloc_instance(class);
        heap.write_field(obj, 0, PrimitiveConstant::i32(-3).bits())
            .unwrap();
        (heap, obj)
    }

    #[test]
    fn test_field_load_is_slot_aligned() {
        let (heap, obj) = heap_with_pair();
        let v = raw_read_primitive(&heap, obj, 0, PrimitiveKind::I32).unwrap();
        assert_eq!(v.as_i32(), Some(-3));
        // Unaligned and out-of-range offsets do not load.
        assert!(raw_read_primitive(&heap, obj, 4, PrimitiveKind::I32).is_none());
        assert!(raw_read_primitive(&heap, obj, 16, PrimitiveKind::I32).is_none());
    }

    #[test]
    fn test_array_load_uses_component_size() {
        let mut heap = Heap::new();
        let arr = heap.alloc_array(ResolvedType::Primitive(PrimitiveKind::Char), 4);
        heap.write_element(arr, 3, 0x41).unwrap();

        let v = raw_read_primitive(&heap, arr, 6, PrimitiveKind::Char).unwrap();
        assert_eq!(v.as_char(), Some(0x41));
        // Wrong kind for the component, or a mid-element offset: no load.
        assert!(raw_read_primitive(&heap, arr, 6, PrimitiveKind::I32).is_none());
        assert!(raw_read_primitive(&heap, arr, 5, PrimitiveKind::Char).is_none());
    }

    #[test]
    fn test_reference_load_decodes_null() {
        let mut heap = Heap::new();
        let class = heap.register_class("Node", None, 1, 0);
        let a = heap.alloc_instance(class);
        let b = heap.alloc_instance(class);
        heap.write_field(a, 0, encode_ref(Some(b))).unwrap();

        assert_eq!(raw_read_reference(&heap, a, 0), Some(Some(b)));
        assert_eq!(raw_read_reference(&heap, b, 0), Some(None));
        // A primitive array has no reference slots.
        let arr = heap.alloc_array(ResolvedType::Primitive(PrimitiveKind::I64), 1);
        assert_eq!(raw_read_reference(&heap, arr, 0), None);
    }

    #[test]
    fn test_boxed_load_at_offset_zero() {
        let mut heap = Heap::new();
        let b = heap.box_value(PrimitiveConstant::i64(900));
        let v = raw_read_primitive(&heap, b, 0, PrimitiveKind::I64).unwrap();
        assert_eq!(v.as_i64(), Some(900));
        assert!(raw_read_primitive(&heap, b, 0, PrimitiveKind::I32).is_none());
        assert!(raw_read_primitive(&heap, b, 8, PrimitiveKind::I64).is_none());
    }

    #[test]
    fn test_bridge_locks_per_load() {
        let (heap, obj) = heap_with_pair();
        let shared = heap.into_shared();
        let bridge = HeapMemoryAccess::new(shared);
        let v = bridge.read_primitive(obj, 0, PrimitiveKind::I32).unwrap();
        assert_eq!(v.as_i32(), Some(-3));
    }
}
