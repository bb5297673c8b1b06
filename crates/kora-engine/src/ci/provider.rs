//! Constant reflection provider
//!
//! The orchestrator of the constant reflection layer: the JIT holds a
//! [`Constant`] and asks the provider to read a field or array element;
//! the provider consults field/type metadata to decide eligibility,
//! delegates the physical load to the memory bridge, and wraps the raw
//! value as a new constant for the compiler's IR.
//!
//! The provider is stateless: every operation is a pure function of its
//! arguments plus the heap state observed at call time, safe to invoke
//! concurrently from parallel compiler worker threads. Two result
//! channels are kept strictly apart: `None` means "no statically known
//! value" (a normal negative), while [`CiError::InvalidArgument`] flags
//! caller misuse that would otherwise mask a compiler-side bug.

use crate::ci::constant::{Constant, ObjectConstant};
use crate::ci::embed::{EmbeddingPolicy, HostEmbeddingPolicy};
use crate::ci::memory::{raw_read_primitive, raw_read_reference, HeapMemoryAccess};
use crate::ci::meta::{FieldKind, ResolvedField, ResolvedType};
use crate::ci::method_handle::HostMethodHandleAccess;
use crate::ci::CiError;
use crate::vm::heap::{decode_ref, Heap, HeapCell, HeapRef, SharedHeap};
use std::sync::Arc;

/// Compiler-facing service for reading live-heap values into foldable
/// constants.
pub struct ConstantReflectionProvider {
    heap: SharedHeap,
    memory: HeapMemoryAccess,
    method_handles: HostMethodHandleAccess,
    policy: Arc<dyn EmbeddingPolicy>,
}

impl ConstantReflectionProvider {
    /// Provider over a shared heap with the host embedding policy.
    pub fn new(heap: SharedHeap) -> Self {
        Self::with_policy(heap, Arc::new(HostEmbeddingPolicy))
    }

    /// Provider with an embedding policy injected by the code-generation
    /// backend.
    pub fn with_policy(heap: SharedHeap, policy: Arc<dyn EmbeddingPolicy>) -> Self {
        Self {
            memory: HeapMemoryAccess::new(heap.clone()),
            method_handles: HostMethodHandleAccess::new(heap.clone()),
            heap,
            policy,
        }
    }

    /// Wrap a runtime reference, including null, into a constant. Never
    /// fails for live handles.
    ///
    /// # Panics
    ///
    /// Panics on a dangling handle: the arena handed out an identity
    /// outside its documented domain, which aborts the compilation unit.
    pub fn for_object(&self, reference: Option<HeapRef>) -> Constant {
        match reference {
            None => Constant::Null,
            Some(handle) => Self::wrap(&self.heap.read(), handle),
        }
    }

    /// Allocate a host string and wrap it; the constant's textual form
    /// quotes the content.
    pub fn for_string(&self, s: &str) -> Constant {
        let mut heap = self.heap.write();
        let handle = heap.alloc_string(s);
        Self::wrap(&heap, handle)
    }

    /// Constant equality: primitives by (kind, bits), null only to null,
    /// objects by referent identity. Mismatched variants are never equal.
    /// Not substitutable for value equality on objects.
    pub fn constant_equals(&self, a: &Constant, b: &Constant) -> bool {
        a == b
    }

    /// Length of the array `array` refers to.
    ///
    /// Fails with [`CiError::InvalidArgument`] if the constant is null or
    /// not array-shaped: that is caller misuse, not a "value unknown"
    /// negative.
    pub fn read_array_length(&self, array: &Constant) -> Result<i32, CiError> {
        let object = array.as_object().ok_or_else(|| {
            CiError::InvalidArgument(format!("{} is not an array constant", array))
        })?;
        match self.heap.read().get(object.handle()) {
            Some(HeapCell::Array { elements, .. }) => Ok(elements.len() as i32),
            _ => Err(CiError::InvalidArgument(format!(
                "{} does not refer to an array",
                array
            ))),
        }
    }

    /// Element `index` of the array, or `None` when there is no statically
    /// known value: the constant is not a resolvable array, or the index
    /// is outside `[0, length)`.
    pub fn read_array_element(&self, array: &Constant, index: i64) -> Option<Constant> {
        Self::read_array_element_in(&self.heap.read(), array, index)
    }

    /// Current value of `field` on `receiver`, or `None` if the field
    /// cannot presently be read (unresolvable or incompatible receiver).
    ///
    /// Instance fields require a non-null receiver; a null receiver fails
    /// with [`CiError::InvalidArgument`]. Static fields ignore the
    /// receiver entirely.
    pub fn read_field_value(
        &self,
        field: &ResolvedField,
        receiver: &Constant,
    ) -> Result<Option<Constant>, CiError> {
        Self::read_field_in(&self.heap.read(), field, receiver)
    }

    /// As [`Self::read_field_value`], but when the field is declared
    /// stable and the value is an array, the result carries the stable
    /// dimension discovered by walking nested array constants.
    /// `is_default_stable` is threaded to every nested level and controls
    /// whether unwritten slots count as legitimate stable values.
    pub fn read_stable_field_value(
        &self,
        field: &ResolvedField,
        receiver: &Constant,
        is_default_stable: bool,
    ) -> Result<Option<Constant>, CiError> {
        Self::read_stable_in(&self.heap.read(), field, receiver, is_default_stable)
    }

    /// The safe-to-fold gate: returns a value only if folding it is sound.
    ///
    /// A field that is neither final nor stable never folds, regardless of
    /// current heap content — a snapshot of a mutable field would bake a
    /// stale value into generated code. Stable fields fold only non-default
    /// values; final fields fold their current value.
    pub fn read_constant_field_value(
        &self,
        field: &ResolvedField,
        receiver: &Constant,
    ) -> Result<Option<Constant>, CiError> {
        let heap = self.heap.read();
        if field.is_stable {
            match Self::read_stable_in(&heap, field, receiver, false)? {
                Some(value) if !value.is_default_value() => Ok(Some(value)),
                _ => Ok(None),
            }
        } else if field.is_final {
            Self::read_field_in(&heap, field, receiver)
        } else {
            // Not foldable; the receiver contract still holds.
            if !field.is_static && receiver.is_null() {
                return Err(Self::null_receiver(field));
            }
            Ok(None)
        }
    }

    /// Fold-safe array element read: folds only out of a stable array,
    /// honoring the element's stability dimension. Default-valued slots
    /// fold only when the array is default-stable; nested arrays inherit
    /// one dimension less.
    pub fn read_constant_array_element(&self, array: &Constant, index: i64) -> Option<Constant> {
        let object = array.as_object()?;
        if object.stable_dimension() == 0 {
            return None;
        }
        let heap = self.heap.read();
        let element = Self::read_array_element_in(&heap, array, index)?;
        if element.is_default_value() && !object.is_default_stable() {
            return None;
        }
        if let Constant::Object(inner) = &element {
            if object.stable_dimension() > 1
                && matches!(heap.get(inner.handle()), Some(HeapCell::Array { .. }))
            {
                return Some(Constant::Object(inner.with_stable(
                    object.stable_dimension() - 1,
                    object.is_default_stable(),
                )));
            }
        }
        Some(element)
    }

    /// As [`Self::read_constant_array_element`], addressing the element by
    /// byte offset. `None` unless the offset lands exactly on an element
    /// boundary for the array's component kind.
    pub fn read_constant_array_element_for_offset(
        &self,
        array: &Constant,
        byte_offset: i64,
    ) -> Option<Constant> {
        let object = array.as_object()?;
        let size = match self.heap.read().get(object.handle())? {
            HeapCell::Array { component, .. } => component.as_field_kind().byte_size(),
            _ => return None,
        };
        if byte_offset < 0 || byte_offset as u64 % size != 0 {
            return None;
        }
        self.read_constant_array_element(array, byte_offset / size as i64)
    }

    /// The resolved type a reflective type-token constant denotes; `None`
    /// for non-type constants.
    pub fn as_type(&self, constant: &Constant) -> Option<ResolvedType> {
        let object = constant.as_object()?;
        match self.heap.read().get(object.handle())? {
            HeapCell::TypeMirror { ty, .. } => Some(ty.clone()),
            _ => None,
        }
    }

    /// The canonical boxed-object constant for a primitive; `None` if
    /// `constant` is not primitive. Small integral values intern through
    /// the heap's box cache and come back pinned.
    pub fn box_primitive(&self, constant: &Constant) -> Option<Constant> {
        let value = *constant.as_primitive()?;
        let mut heap = self.heap.write();
        let handle = heap.box_value(value);
        Some(Self::wrap(&heap, handle))
    }

    /// The primitive inside a boxed-primitive wrapper; `None` if the
    /// constant is not a recognized box.
    pub fn unbox_primitive(&self, constant: &Constant) -> Option<Constant> {
        let object = constant.as_object()?;
        match self.heap.read().get(object.handle())? {
            HeapCell::Boxed(value) => Some(Constant::Primitive(*value)),
            _ => None,
        }
    }

    /// Whether the constant may be encoded directly in generated code, per
    /// the injected embedding policy. A correctness gate for code
    /// generation, not an optimization hint.
    pub fn is_embeddable(&self, constant: &Constant) -> bool {
        self.policy.is_embeddable(&self.heap.read(), constant)
    }

    /// The raw memory-access collaborator.
    pub fn memory_access(&self) -> &HeapMemoryAccess {
        &self.memory
    }

    /// The method-handle introspection collaborator.
    pub fn method_handle_access(&self) -> &HostMethodHandleAccess {
        &self.method_handles
    }

    // ========================================================================
    // Internals (single heap lock per public operation)
    // ========================================================================

    fn wrap(heap: &Heap, handle: HeapRef) -> Constant {
        let cell = heap
            .get(handle)
            .unwrap_or_else(|| panic!("dangling heap handle {}", handle.index()));
        let type_name: Arc<str> = match cell {
            HeapCell::Instance { class, .. } => heap.class(*class).name.clone(),
            HeapCell::Array { component, .. } => Arc::from(format!("{}[]", component.name())),
            HeapCell::Str(s) => Arc::from(format!("{:?}", s)),
            HeapCell::Boxed(value) => Arc::from(format!("Boxed<{}>", value.kind().name())),
            HeapCell::TypeMirror { ty, .. } => Arc::from(format!("Type<{}>", ty.name())),
            HeapCell::MethodHandle(_) => Arc::from("MethodHandle"),
        };
        Constant::Object(ObjectConstant::new(handle, type_name))
    }

    fn null_receiver(field: &ResolvedField) -> CiError {
        CiError::InvalidArgument(format!(
            "reading instance field {} requires a non-null receiver",
            field.name
        ))
    }

    fn read_array_element_in(heap: &Heap, array: &Constant, index: i64) -> Option<Constant> {
        let object = array.as_object()?;
        let (component, len) = match heap.get(object.handle())? {
            HeapCell::Array {
                component,
                elements,
            } => (component, elements.len()),
            _ => return None,
        };
        if index < 0 || index as usize >= len {
            return None;
        }
        let index = index as u64;
        match component.as_field_kind() {
            FieldKind::Primitive(kind) => {
                raw_read_primitive(heap, object.handle(), index * kind.byte_size(), kind)
                    .map(Constant::Primitive)
            }
            FieldKind::Reference => {
                match raw_read_reference(heap, object.handle(), index * 8)? {
                    Some(element) => Some(Self::wrap(heap, element)),
                    None => Some(Constant::Null),
                }
            }
        }
    }

    fn read_field_in(
        heap: &Heap,
        field: &ResolvedField,
        receiver: &Constant,
    ) -> Result<Option<Constant>, CiError> {
        let base = if field.is_static {
            heap.mirror_of(field.declaring_class)
        } else {
            match receiver {
                Constant::Null => return Err(Self::null_receiver(field)),
                Constant::Object(o) => o.handle(),
                // A primitive receiver has no fields to read; there is no
                // statically known value.
                Constant::Primitive(_) => return Ok(None),
            }
        };
        if !field.is_static {
            match heap.get(base) {
                Some(HeapCell::Instance { class, .. })
                    if heap.is_subclass_of(*class, field.declaring_class) => {}
                _ => return Ok(None),
            }
        }
        Ok(match field.kind {
            FieldKind::Primitive(kind) => {
                raw_read_primitive(heap, base, field.offset, kind).map(Constant::Primitive)
            }
            FieldKind::Reference => {
                raw_read_reference(heap, base, field.offset).map(|reference| match reference {
                    Some(handle) => Self::wrap(heap, handle),
                    None => Constant::Null,
                })
            }
        })
    }

    fn read_stable_in(
        heap: &Heap,
        field: &ResolvedField,
        receiver: &Constant,
        is_default_stable: bool,
    ) -> Result<Option<Constant>, CiError> {
        let value = Self::read_field_in(heap, field, receiver)?;
        if !field.is_stable {
            return Ok(value);
        }
        Ok(value.map(|constant| match constant {
            Constant::Object(o)
                if matches!(heap.get(o.handle()), Some(HeapCell::Array { .. })) =>
            {
                let mut seen = Vec::new();
                let dimension =
                    Self::stable_array_dimension(heap, o.handle(), is_default_stable, &mut seen);
                Constant::Object(o.with_stable(dimension, is_default_stable))
            }
            other => other,
        }))
    }

    /// How many nested array levels stability certifiably extends to,
    /// judged from the observed heap: a null element is eligible only
    /// under `default_stable`, a non-null element only if it is itself an
    /// array, and the nested dimension is the minimum over elements. A
    /// repeated handle counts as depth exhaustion, so the walk terminates
    /// on cyclic structures.
    fn stable_array_dimension(
        heap: &Heap,
        handle: HeapRef,
        default_stable: bool,
        seen: &mut Vec<HeapRef>,
    ) -> u8 {
        if seen.contains(&handle) {
            return 0;
        }
        let (component, elements) = match heap.get(handle) {
            Some(HeapCell::Array {
                component,
                elements,
            }) => (component, elements),
            _ => return 0,
        };
        if !matches!(component.as_field_kind(), FieldKind::Reference) {
            return 1;
        }
        seen.push(handle);
        let mut nested = u8::MAX;
        let mut any_nested = false;
        let mut blocked = false;
        for &slot in elements {
            match decode_ref(slot) {
                None if default_stable => {}
                None => {
                    blocked = true;
                    break;
                }
                Some(element) => {
                    if matches!(heap.get(element), Some(HeapCell::Array { .. })) {
                        any_nested = true;
                        nested = nested.min(Self::stable_array_dimension(
                            heap,
                            element,
                            default_stable,
                            seen,
                        ));
                    } else {
                        blocked = true;
                        break;
                    }
                }
            }
        }
        seen.pop();
        if blocked || !any_nested {
            1
        } else {
            1u8.saturating_add(nested)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ci::constant::{PrimitiveConstant, PrimitiveKind};
    use crate::vm::heap::encode_ref;

    fn i32_array(heap: &mut Heap, values: &[i32]) -> HeapRef {
        let arr = heap.alloc_array(ResolvedType::Primitive(PrimitiveKind::I32), values.len());
        for (i, v) in values.iter().enumerate() {
            heap.write_element(arr, i, PrimitiveConstant::i32(*v).bits())
                .unwrap();
        }
        arr
    }

    fn ref_array(heap: &mut Heap, component: ResolvedType, refs: &[Option<HeapRef>]) -> HeapRef {
        let arr = heap.alloc_array(component, refs.len());
        for (i, r) in refs.iter().enumerate() {
            heap.write_element(arr, i, encode_ref(*r)).unwrap();
        }
        arr
    }

    #[test]
    fn test_stable_dimension_flat_primitive_array() {
        let mut heap = Heap::new();
        let arr = i32_array(&mut heap, &[1, 2]);
        let mut seen = Vec::new();
        assert_eq!(
            ConstantReflectionProvider::stable_array_dimension(&heap, arr, true, &mut seen),
            1
        );
    }

    #[test]
    fn test_stable_dimension_nested() {
        let mut heap = Heap::new();
        let inner_a = i32_array(&mut heap, &[1]);
        let inner_b = i32_array(&mut heap, &[2]);
        let i32_ty = ResolvedType::Primitive(PrimitiveKind::I32);
        let outer = ref_array(&mut heap, i32_ty.array_of(), &[Some(inner_a), Some(inner_b)]);
        let mut seen = Vec::new();
        assert_eq!(
            ConstantReflectionProvider::stable_array_dimension(&heap, outer, false, &mut seen),
            2
        );
    }

    #[test]
    fn test_stable_dimension_null_slot_needs_default_stable() {
        let mut heap = Heap::new();
        let inner = i32_array(&mut heap, &[1]);
        let i32_ty = ResolvedType::Primitive(PrimitiveKind::I32);
        let outer = ref_array(&mut heap, i32_ty.array_of(), &[Some(inner), None]);
        let mut seen = Vec::new();
        assert_eq!(
            ConstantReflectionProvider::stable_array_dimension(&heap, outer, false, &mut seen),
            1
        );
        seen.clear();
        assert_eq!(
            ConstantReflectionProvider::stable_array_dimension(&heap, outer, true, &mut seen),
            2
        );
    }

    #[test]
    fn test_stable_dimension_non_array_element_stops_walk() {
        let mut heap = Heap::new();
        let s = heap.alloc_string("x");
        let class = heap.register_class("Obj", None, 0, 0);
        let obj_ty = ResolvedType::Class {
            id: class,
            name: heap.class(class).name.clone(),
        };
        let outer = ref_array(&mut heap, obj_ty, &[Some(s)]);
        let mut seen = Vec::new();
        assert_eq!(
            ConstantReflectionProvider::stable_array_dimension(&heap, outer, true, &mut seen),
            1
        );
    }

    #[test]
    fn test_stable_dimension_cycle_terminates() {
        let mut heap = Heap::new();
        let i32_ty = ResolvedType::Primitive(PrimitiveKind::I32);
        let outer = ref_array(&mut heap, i32_ty.array_of(), &[None]);
        // Tie the array to itself.
        heap.write_element(outer, 0, encode_ref(Some(outer))).unwrap();
        let mut seen = Vec::new();
        assert_eq!(
            ConstantReflectionProvider::stable_array_dimension(&heap, outer, true, &mut seen),
            1
        );
    }

    #[test]
    fn test_all_null_reference_array_stops_at_one() {
        let mut heap = Heap::new();
        let i32_ty = ResolvedType::Primitive(PrimitiveKind::I32);
        let outer = ref_array(&mut heap, i32_ty.array_of(), &[None, None]);
        let mut seen = Vec::new();
        assert_eq!(
            ConstantReflectionProvider::stable_array_dimension(&heap, outer, true, &mut seen),
            1
        );
    }
}
