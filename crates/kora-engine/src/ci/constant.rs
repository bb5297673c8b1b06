//! Compile-time constant value model
//!
//! A [`Constant`] is a compile-time-visible datum the JIT derived from the
//! live heap or from a literal: a primitive with an exact bit pattern, the
//! null reference, or an opaque handle to a heap-resident object. Constants
//! are immutable; reads through the reflection provider produce new ones.

use crate::vm::heap::HeapRef;
use std::fmt;
use std::sync::Arc;

/// The eight primitive kinds of the Kora VM.
///
/// `Char` is a UTF-16 code unit and is two bytes wide. The enum is closed:
/// every consumption site matches exhaustively, so adding a kind is a
/// compile-time error everywhere it matters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveKind {
    /// Boolean, stored as 0 or 1
    Bool,
    /// Signed 8-bit integer
    I8,
    /// Signed 16-bit integer
    I16,
    /// UTF-16 code unit (unsigned 16-bit)
    Char,
    /// Signed 32-bit integer
    I32,
    /// Signed 64-bit integer
    I64,
    /// IEEE-754 single precision float
    F32,
    /// IEEE-754 double precision float
    F64,
}

impl PrimitiveKind {
    /// All kinds, in declaration order.
    pub const ALL: [PrimitiveKind; 8] = [
        PrimitiveKind::Bool,
        PrimitiveKind::I8,
        PrimitiveKind::I16,
        PrimitiveKind::Char,
        PrimitiveKind::I32,
        PrimitiveKind::I64,
        PrimitiveKind::F32,
        PrimitiveKind::F64,
    ];

    /// Width of a value of this kind in memory, in bytes.
    pub fn byte_size(self) -> u64 {
        match self {
            PrimitiveKind::Bool | PrimitiveKind::I8 => 1,
            PrimitiveKind::I16 | PrimitiveKind::Char => 2,
            PrimitiveKind::I32 | PrimitiveKind::F32 => 4,
            PrimitiveKind::I64 | PrimitiveKind::F64 => 8,
        }
    }

    /// Lowercase type name as it appears in diagnostics.
    pub fn name(self) -> &'static str {
        match self {
            PrimitiveKind::Bool => "bool",
            PrimitiveKind::I8 => "i8",
            PrimitiveKind::I16 => "i16",
            PrimitiveKind::Char => "char",
            PrimitiveKind::I32 => "i32",
            PrimitiveKind::I64 => "i64",
            PrimitiveKind::F32 => "f32",
            PrimitiveKind::F64 => "f64",
        }
    }

    /// True for the integral kinds (everything except `F32`/`F64`).
    pub fn is_integral(self) -> bool {
        !matches!(self, PrimitiveKind::F32 | PrimitiveKind::F64)
    }
}

impl fmt::Display for PrimitiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A primitive constant: a kind plus the exact bit encoding of the value.
///
/// Integral kinds are stored sign-extended to 64 bits (`Bool` as 0/1,
/// `Char` zero-extended); floats are stored as their raw IEEE-754 bits,
/// `F32` in the low 32 bits. Two primitive constants are equal iff kind and
/// bit pattern match exactly — NaNs compare by bits, not IEEE equality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PrimitiveConstant {
    kind: PrimitiveKind,
    bits: u64,
}

impl PrimitiveConstant {
    /// Create a boolean constant.
    pub fn bool(v: bool) -> Self {
        Self {
            kind: PrimitiveKind::Bool,
            bits: v as u64,
        }
    }

    /// Create an i8 constant.
    pub fn i8(v: i8) -> Self {
        Self {
            kind: PrimitiveKind::I8,
            bits: v as i64 as u64,
        }
    }

    /// Create an i16 constant.
    pub fn i16(v: i16) -> Self {
        Self {
            kind: PrimitiveKind::I16,
            bits: v as i64 as u64,
        }
    }

    /// Create a char constant from a UTF-16 code unit.
    pub fn char(code: u16) -> Self {
        Self {
            kind: PrimitiveKind::Char,
            bits: code as u64,
        }
    }

    /// Create an i32 constant.
    pub fn i32(v: i32) -> Self {
        Self {
            kind: PrimitiveKind::I32,
            bits: v as i64 as u64,
        }
    }

    /// Create an i64 constant.
    pub fn i64(v: i64) -> Self {
        Self {
            kind: PrimitiveKind::I64,
            bits: v as u64,
        }
    }

    /// Create an f32 constant from the value's raw bits.
    pub fn f32(v: f32) -> Self {
        Self {
            kind: PrimitiveKind::F32,
            bits: v.to_bits() as u64,
        }
    }

    /// Create an f64 constant from the value's raw bits.
    pub fn f64(v: f64) -> Self {
        Self {
            kind: PrimitiveKind::F64,
            bits: v.to_bits(),
        }
    }

    /// Reconstruct a constant of `kind` from a raw 64-bit memory slot,
    /// normalizing to the kind's canonical encoding (masking to the kind's
    /// width, then sign- or zero-extending as the kind requires).
    pub fn from_raw_bits(kind: PrimitiveKind, raw: u64) -> Self {
        let bits = match kind {
            PrimitiveKind::Bool => raw & 1,
            PrimitiveKind::I8 => raw as i8 as i64 as u64,
            PrimitiveKind::I16 => raw as i16 as i64 as u64,
            PrimitiveKind::Char => raw & 0xFFFF,
            PrimitiveKind::I32 => raw as i32 as i64 as u64,
            PrimitiveKind::I64 => raw,
            PrimitiveKind::F32 => raw & 0xFFFF_FFFF,
            PrimitiveKind::F64 => raw,
        };
        Self { kind, bits }
    }

    /// The constant's kind.
    pub fn kind(&self) -> PrimitiveKind {
        self.kind
    }

    /// The exact 64-bit encoding of the value.
    pub fn bits(&self) -> u64 {
        self.bits
    }

    /// True if the bits are the kind's default (all-zero) value.
    pub fn is_default(&self) -> bool {
        self.bits == 0
    }

    /// Extract a boolean value.
    pub fn as_bool(&self) -> Option<bool> {
        (self.kind == PrimitiveKind::Bool).then(|| self.bits != 0)
    }

    /// Extract an i8 value.
    pub fn as_i8(&self) -> Option<i8> {
        (self.kind == PrimitiveKind::I8).then(|| self.bits as i8)
    }

    /// Extract an i16 value.
    pub fn as_i16(&self) -> Option<i16> {
        (self.kind == PrimitiveKind::I16).then(|| self.bits as i16)
    }

    /// Extract a char code unit.
    pub fn as_char(&self) -> Option<u16> {
        (self.kind == PrimitiveKind::Char).then(|| self.bits as u16)
    }

    /// Extract an i32 value.
    pub fn as_i32(&self) -> Option<i32> {
        (self.kind == PrimitiveKind::I32).then(|| self.bits as i32)
    }

    /// Extract an i64 value.
    pub fn as_i64(&self) -> Option<i64> {
        (self.kind == PrimitiveKind::I64).then(|| self.bits as i64)
    }

    /// Extract an f32 value (decoded from the stored bits).
    pub fn as_f32(&self) -> Option<f32> {
        (self.kind == PrimitiveKind::F32).then(|| f32::from_bits(self.bits as u32))
    }

    /// Extract an f64 value (decoded from the stored bits).
    pub fn as_f64(&self) -> Option<f64> {
        (self.kind == PrimitiveKind::F64).then(|| f64::from_bits(self.bits))
    }
}

impl fmt::Display for PrimitiveConstant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            PrimitiveKind::Bool => write!(f, "bool:{}", self.bits != 0),
            PrimitiveKind::I8 => write!(f, "i8:{}", self.bits as i8),
            PrimitiveKind::I16 => write!(f, "i16:{}", self.bits as i16),
            PrimitiveKind::Char => match char::from_u32(self.bits as u32) {
                Some(c) => write!(f, "char:'{}'", c),
                None => write!(f, "char:{:#06x}", self.bits),
            },
            PrimitiveKind::I32 => write!(f, "i32:{}", self.bits as i32),
            PrimitiveKind::I64 => write!(f, "i64:{}", self.bits as i64),
            PrimitiveKind::F32 => write!(f, "f32:{}", f32::from_bits(self.bits as u32)),
            PrimitiveKind::F64 => write!(f, "f64:{}", f64::from_bits(self.bits)),
        }
    }
}

/// An opaque, non-dereferenceable handle to a heap-resident object.
///
/// Carries the arena handle, a display tag captured when the reflection
/// provider wrapped the reference, and the stable-array annotation attached
/// by stable reads. The handle is borrowed from the host arena and is valid
/// for the duration of one compilation; the constant never exposes the
/// referent itself — all interaction goes through offset/index reads.
///
/// Equality is referent identity (same handle, same compressed form). Two
/// distinct heap objects with equal contents are *not* equal.
#[derive(Debug, Clone)]
pub struct ObjectConstant {
    handle: HeapRef,
    type_name: Arc<str>,
    compressed: bool,
    stable_dimension: u8,
    default_stable: bool,
}

impl ObjectConstant {
    /// Wrap an arena handle with its display tag. Stable annotation starts
    /// empty; the compressed flag starts clear.
    pub fn new(handle: HeapRef, type_name: Arc<str>) -> Self {
        Self {
            handle,
            type_name,
            compressed: false,
            stable_dimension: 0,
            default_stable: false,
        }
    }

    /// The arena handle of the referent.
    pub fn handle(&self) -> HeapRef {
        self.handle
    }

    /// The display tag captured at wrap time.
    pub fn type_name(&self) -> &Arc<str> {
        &self.type_name
    }

    /// Whether this is the compressed form of the reference.
    pub fn is_compressed(&self) -> bool {
        self.compressed
    }

    /// The compressed form of this reference.
    pub fn compress(&self) -> Self {
        Self {
            compressed: true,
            ..self.clone()
        }
    }

    /// The uncompressed form of this reference.
    pub fn uncompress(&self) -> Self {
        Self {
            compressed: false,
            ..self.clone()
        }
    }

    /// How many nested array levels are treated as immutable. Zero means
    /// the referent carries no stability promise.
    pub fn stable_dimension(&self) -> u8 {
        self.stable_dimension
    }

    /// Whether an unwritten (all-zero / null) slot counts as a legitimate
    /// stable value rather than "not yet initialized".
    pub fn is_default_stable(&self) -> bool {
        self.default_stable
    }

    /// A copy of this constant carrying a stable-array annotation.
    pub fn with_stable(&self, dimension: u8, default_stable: bool) -> Self {
        Self {
            stable_dimension: dimension,
            default_stable,
            ..self.clone()
        }
    }
}

impl PartialEq for ObjectConstant {
    fn eq(&self, other: &Self) -> bool {
        // Referent identity; the stable annotation is read-time metadata
        // and does not participate.
        self.handle == other.handle && self.compressed == other.compressed
    }
}

impl Eq for ObjectConstant {}

impl std::hash::Hash for ObjectConstant {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.handle.hash(state);
        self.compressed.hash(state);
    }
}

/// A compile-time constant: primitive, null, or heap object reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Constant {
    /// A primitive value with an exact bit pattern
    Primitive(PrimitiveConstant),
    /// The null reference; equal only to itself
    Null,
    /// An opaque reference to a heap-resident object
    Object(ObjectConstant),
}

impl Constant {
    /// True for the null constant.
    pub fn is_null(&self) -> bool {
        matches!(self, Constant::Null)
    }

    /// True for null and for all-zero primitives: the value an unwritten
    /// memory slot holds.
    pub fn is_default_value(&self) -> bool {
        match self {
            Constant::Primitive(p) => p.is_default(),
            Constant::Null => true,
            Constant::Object(_) => false,
        }
    }

    /// The primitive payload, if this is a primitive constant.
    pub fn as_primitive(&self) -> Option<&PrimitiveConstant> {
        match self {
            Constant::Primitive(p) => Some(p),
            _ => None,
        }
    }

    /// The object payload, if this is an object constant.
    pub fn as_object(&self) -> Option<&ObjectConstant> {
        match self {
            Constant::Object(o) => Some(o),
            _ => None,
        }
    }
}

impl From<PrimitiveConstant> for Constant {
    fn from(p: PrimitiveConstant) -> Self {
        Constant::Primitive(p)
    }
}

impl From<ObjectConstant> for Constant {
    fn from(o: ObjectConstant) -> Self {
        Constant::Object(o)
    }
}

impl fmt::Display for Constant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constant::Primitive(p) => p.fmt(f),
            Constant::Null => f.write_str("null"),
            Constant::Object(o) => write!(f, "Object[{}@{}]", o.type_name, o.handle.index()),
        }
    }
}
