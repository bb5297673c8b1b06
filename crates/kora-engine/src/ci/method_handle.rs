//! Method-handle introspection
//!
//! Exposes the bound target of a method-handle constant so the compiler
//! can devirtualize invocations through it. Consumed opaquely by the
//! reflection provider's accessor; the heap cell is the source of truth.

use crate::ci::constant::Constant;
use crate::ci::meta::ResolvedMethod;
use crate::vm::heap::{HeapCell, SharedHeap};

/// The method-handle introspection collaborator.
pub trait MethodHandleAccess: Send + Sync {
    /// The target method a method-handle constant is bound to, or `None`
    /// if the constant is not a method handle.
    fn resolve_invoke_target(&self, constant: &Constant) -> Option<ResolvedMethod>;
}

/// Heap-backed implementation of [`MethodHandleAccess`].
pub struct HostMethodHandleAccess {
    heap: SharedHeap,
}

impl HostMethodHandleAccess {
    /// Introspection over a shared heap.
    pub fn new(heap: SharedHeap) -> Self {
        Self { heap }
    }
}

impl MethodHandleAccess for HostMethodHandleAccess {
    fn resolve_invoke_target(&self, constant: &Constant) -> Option<ResolvedMethod> {
        let object = constant.as_object()?;
        match self.heap.read().get(object.handle())? {
            HeapCell::MethodHandle(target) => Some(target.clone()),
            _ => None,
        }
    }
}
