//! Kora VM runtime
//!
//! Host-side runtime state observed by the compiler interface:
//! - Arena heap, object/array cells, and class registry (`heap` module)

pub mod heap;

pub use heap::{
    decode_ref, encode_ref, ClassInfo, Heap, HeapCell, HeapError, HeapOptions, HeapRef, SharedHeap,
};
