//! Kora Compiler Interface
//!
//! The services the optimizing JIT uses to observe the live runtime:
//! - Constant value model (`constant` module)
//! - Resolved field/type metadata descriptors (`meta` module)
//! - Raw memory-access bridge (`memory` module)
//! - Constant reflection provider (`provider` module)
//! - Embedding policy and method-handle introspection collaborators
//!
//! The centerpiece is [`ConstantReflectionProvider`], the fold-safety
//! gatekeeper between the compiler and the mutable heap.

pub mod constant;
pub mod embed;
pub mod memory;
pub mod meta;
pub mod method_handle;
pub mod provider;

pub use constant::{Constant, ObjectConstant, PrimitiveConstant, PrimitiveKind};
pub use embed::{EmbeddingPolicy, HostEmbeddingPolicy};
pub use memory::{HeapMemoryAccess, MemoryAccess};
pub use meta::{ClassId, FieldKind, ResolvedField, ResolvedMethod, ResolvedType};
pub use method_handle::{HostMethodHandleAccess, MethodHandleAccess};
pub use provider::ConstantReflectionProvider;

/// Compiler-interface errors.
///
/// Only caller misuse surfaces here; "no statically known value" is an
/// ordinary `None` and never an error.
#[derive(Debug, thiserror::Error)]
pub enum CiError {
    /// The caller violated an operation's contract (null receiver for an
    /// instance field read, non-array constant where an array is required)
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

/// Compiler-interface result.
pub type CiResult<T> = Result<T, CiError>;
