//! Kora Language Engine
//!
//! This crate provides the Kora runtime's heap model and the compiler
//! interface its optimizing JIT consults during compilation:
//! - **VM**: arena heap, class registry, and object model (`vm` module)
//! - **CI**: constant model, metadata descriptors, memory bridge, and the
//!   constant reflection provider (`ci` module)
//!
//! # Example
//!
//! ```rust,ignore
//! use kora_engine::ci::{ConstantReflectionProvider, PrimitiveConstant};
//! use kora_engine::vm::Heap;
//!
//! let heap = Heap::new().into_shared();
//! let provider = ConstantReflectionProvider::new(heap);
//!
//! let boxed = provider
//!     .box_primitive(&PrimitiveConstant::i32(7).into())
//!     .unwrap();
//! assert!(provider.is_embeddable(&boxed));
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

// ============================================================================
// Core Modules
// ============================================================================

/// VM module: arena heap, classes, and object model
pub mod vm;

/// Compiler interface module: constants, metadata, and the reflection
/// provider
pub mod ci;

// ============================================================================
// Re-exports
// ============================================================================

pub use ci::{
    // Constant model
    Constant, ObjectConstant, PrimitiveConstant, PrimitiveKind,
    // Metadata descriptors
    ClassId, FieldKind, ResolvedField, ResolvedMethod, ResolvedType,
    // Collaborators
    EmbeddingPolicy, HostEmbeddingPolicy, HeapMemoryAccess, MemoryAccess,
    HostMethodHandleAccess, MethodHandleAccess,
    // Provider
    CiError, CiResult, ConstantReflectionProvider,
};

pub use vm::{Heap, HeapCell, HeapError, HeapOptions, HeapRef, SharedHeap};
