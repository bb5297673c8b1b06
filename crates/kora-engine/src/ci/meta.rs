//! Resolved field and type descriptors
//!
//! Read-only metadata supplied by the runtime's class system and consumed
//! by the reflection provider: field offsets, staticness and stability
//! flags, and type identity. The provider treats these as facts; a
//! descriptor outside its documented domain (an unregistered class id, an
//! offset that cannot tile the declaring layout) is a host bug.

use crate::ci::constant::PrimitiveKind;
use std::fmt;
use std::sync::Arc;

/// Index into the heap's class registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClassId(u32);

impl ClassId {
    /// Rebuild an id from a registry index.
    pub fn from_index(index: usize) -> Self {
        ClassId(index as u32)
    }

    /// The registry index.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Storage kind of a field or array component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    /// A primitive slot of the given kind
    Primitive(PrimitiveKind),
    /// A reference slot (handle-encoded, 8 bytes)
    Reference,
}

impl FieldKind {
    /// Element width in bytes: the primitive's natural size, or 8 for a
    /// reference slot.
    pub fn byte_size(self) -> u64 {
        match self {
            FieldKind::Primitive(k) => k.byte_size(),
            FieldKind::Reference => 8,
        }
    }
}

/// Identity of a class, array, or primitive type.
///
/// Result of the provider's `as_type`; also names array components so the
/// heap can size and render elements.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedType {
    /// A primitive type
    Primitive(PrimitiveKind),
    /// A registered class
    Class {
        /// Registry id of the class
        id: ClassId,
        /// The class's qualified name
        name: Arc<str>,
    },
    /// An array type
    Array {
        /// The component type
        component: Box<ResolvedType>,
    },
}

impl ResolvedType {
    /// An array of this type.
    pub fn array_of(self) -> Self {
        ResolvedType::Array {
            component: Box::new(self),
        }
    }

    /// Storage kind of a value of this type.
    pub fn as_field_kind(&self) -> FieldKind {
        match self {
            ResolvedType::Primitive(k) => FieldKind::Primitive(*k),
            ResolvedType::Class { .. } | ResolvedType::Array { .. } => FieldKind::Reference,
        }
    }

    /// Rendered type name: `i32`, `Point`, `Point[]`, `i32[][]`.
    pub fn name(&self) -> String {
        match self {
            ResolvedType::Primitive(k) => k.name().to_string(),
            ResolvedType::Class { name, .. } => name.to_string(),
            ResolvedType::Array { component } => format!("{}[]", component.name()),
        }
    }
}

impl fmt::Display for ResolvedType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

/// A resolved field: where it lives and what may be assumed about it.
///
/// Offsets are byte offsets over 8-byte field slots (`offset % 8 == 0`).
/// Static field slots live on the declaring class's type mirror. Stability
/// is a declared promise: once the field is written (or from its default,
/// when the read says so), the value at that location will not change in
/// any way observable to correct programs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedField {
    /// Field name, for diagnostics
    pub name: Arc<str>,
    /// The class declaring this field
    pub declaring_class: ClassId,
    /// Storage kind of the field
    pub kind: FieldKind,
    /// Byte offset into the declaring layout (slot-aligned)
    pub offset: u64,
    /// Whether the field is static
    pub is_static: bool,
    /// Whether the field is final (immutable by construction)
    pub is_final: bool,
    /// Whether the field carries the stability promise
    pub is_stable: bool,
}

impl ResolvedField {
    /// A plain mutable instance field.
    pub fn new(name: &str, declaring_class: ClassId, kind: FieldKind, offset: u64) -> Self {
        Self {
            name: Arc::from(name),
            declaring_class,
            kind,
            offset,
            is_static: false,
            is_final: false,
            is_stable: false,
        }
    }

    /// This field, as a static field.
    pub fn as_static(mut self) -> Self {
        self.is_static = true;
        self
    }

    /// This field, declared final.
    pub fn as_final(mut self) -> Self {
        self.is_final = true;
        self
    }

    /// This field, carrying the stability promise.
    pub fn as_stable(mut self) -> Self {
        self.is_stable = true;
        self
    }
}

/// A resolved method, as exposed by method-handle introspection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedMethod {
    /// The class declaring the method
    pub declaring_class: ClassId,
    /// Method name
    pub name: Arc<str>,
}

impl ResolvedMethod {
    /// Descriptor for a method of `declaring_class`.
    pub fn new(declaring_class: ClassId, name: &str) -> Self {
        Self {
            declaring_class,
            name: Arc::from(name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_names() {
        let i32_ty = ResolvedType::Primitive(PrimitiveKind::I32);
        assert_eq!(i32_ty.name(), "i32");
        assert_eq!(i32_ty.clone().array_of().name(), "i32[]");
        assert_eq!(i32_ty.array_of().array_of().name(), "i32[][]");

        let class = ResolvedType::Class {
            id: ClassId::from_index(0),
            name: Arc::from("Point"),
        };
        assert_eq!(class.clone().array_of().name(), "Point[]");
        assert_eq!(class.as_field_kind(), FieldKind::Reference);
    }

    #[test]
    fn test_element_widths() {
        assert_eq!(FieldKind::Primitive(PrimitiveKind::Char).byte_size(), 2);
        assert_eq!(FieldKind::Primitive(PrimitiveKind::F32).byte_size(), 4);
        assert_eq!(FieldKind::Reference.byte_size(), 8);
    }

    #[test]
    fn test_field_flags() {
        let f = ResolvedField::new("cache", ClassId::from_index(1), FieldKind::Reference, 16)
            .as_static()
            .as_stable();
        assert!(f.is_static);
        assert!(f.is_stable);
        assert!(!f.is_final);
        assert_eq!(f.offset, 16);
    }
}
