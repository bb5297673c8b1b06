//! Arena heap for the Kora runtime
//!
//! The heap owns every runtime object the reflection layer can observe:
//! class instances, arrays, strings, boxed primitives, type mirrors, and
//! method handles. Cells are addressed by opaque [`HeapRef`] handles; the
//! compiler-facing layer borrows handles for the duration of one
//! compilation and never assumes ownership.
//!
//! Static field storage lives on each class's type mirror, so a static
//! read is an ordinary mirror read. Boxed small integral values are
//! interned through the box cache and pinned, which makes them eligible
//! for direct embedding in generated code.

use crate::ci::constant::{PrimitiveConstant, PrimitiveKind};
use crate::ci::meta::{ClassId, ResolvedMethod, ResolvedType};
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::sync::Arc;

/// Opaque handle to a heap cell.
///
/// Valid for the lifetime of the arena; the reflection layer treats it as
/// non-dereferenceable and routes every access through the memory bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HeapRef(u32);

impl HeapRef {
    /// Rebuild a handle from an arena index.
    pub fn from_index(index: usize) -> Self {
        HeapRef(index as u32)
    }

    /// The arena index of this handle.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Encode a reference for storage in a 64-bit slot: null is 0, a handle is
/// its index plus one.
pub fn encode_ref(reference: Option<HeapRef>) -> u64 {
    match reference {
        None => 0,
        Some(h) => h.0 as u64 + 1,
    }
}

/// Decode a 64-bit slot into a reference.
pub fn decode_ref(bits: u64) -> Option<HeapRef> {
    if bits == 0 {
        None
    } else {
        Some(HeapRef((bits - 1) as u32))
    }
}

/// A heap-resident cell.
///
/// Instances and mirrors store one 8-byte slot per field; arrays store one
/// slot per element, addressed by component-sized byte offsets.
#[derive(Debug, Clone)]
pub enum HeapCell {
    /// A class instance
    Instance {
        /// The instance's class
        class: ClassId,
        /// Field slots, one per declared field
        fields: Vec<u64>,
    },
    /// An array
    Array {
        /// Component type (sizes and renders the elements)
        component: ResolvedType,
        /// Element slots
        elements: Vec<u64>,
    },
    /// An immutable string
    Str(String),
    /// A boxed primitive wrapper
    Boxed(PrimitiveConstant),
    /// A class/primitive/array type mirror; holds the static slots for
    /// class mirrors
    TypeMirror {
        /// The mirrored type
        ty: ResolvedType,
        /// Static field slots (class mirrors only)
        statics: Vec<u64>,
    },
    /// A method handle bound to a target method
    MethodHandle(ResolvedMethod),
}

/// Errors from host-side heap mutation.
#[derive(Debug, thiserror::Error)]
pub enum HeapError {
    /// The handle does not name a live cell
    #[error("unknown heap handle {0}")]
    UnknownHandle(usize),

    /// The cell is not the shape the operation requires
    #[error("cell {handle} is not {expected}")]
    WrongCellShape {
        /// Arena index of the offending cell
        handle: usize,
        /// The shape the operation required
        expected: &'static str,
    },

    /// Slot index outside the cell's storage
    #[error("slot index {index} out of bounds (cell has {len} slots)")]
    SlotOutOfBounds {
        /// The requested slot
        index: usize,
        /// Number of slots in the cell
        len: usize,
    },
}

/// Heap configuration.
#[derive(Debug, Clone)]
pub struct HeapOptions {
    /// Upper bound of the interned box range for signed integral kinds
    /// (the lower bound is fixed at -128). `Bool` and `Char` cache their
    /// full small range regardless.
    pub box_cache_max: i64,
}

impl Default for HeapOptions {
    fn default() -> Self {
        Self { box_cache_max: 127 }
    }
}

/// Registered class metadata.
#[derive(Debug, Clone)]
pub struct ClassInfo {
    /// Qualified class name
    pub name: Arc<str>,
    /// Parent class, if any
    pub parent: Option<ClassId>,
    /// Number of instance field slots (including inherited)
    pub field_slots: usize,
    /// The class's type mirror cell (holds static slots)
    pub mirror: HeapRef,
}

struct Allocation {
    cell: HeapCell,
    pinned: bool,
}

/// The arena heap.
pub struct Heap {
    options: HeapOptions,
    cells: Vec<Allocation>,
    classes: Vec<ClassInfo>,
    class_by_name: FxHashMap<Arc<str>, ClassId>,
    box_cache: FxHashMap<(PrimitiveKind, u64), HeapRef>,
}

/// Heap shared between the runtime and compiler worker threads.
pub type SharedHeap = Arc<RwLock<Heap>>;

impl Heap {
    /// Create an empty heap with default options.
    pub fn new() -> Self {
        Self::with_options(HeapOptions::default())
    }

    /// Create an empty heap.
    pub fn with_options(options: HeapOptions) -> Self {
        Self {
            options,
            cells: Vec::new(),
            classes: Vec::new(),
            class_by_name: FxHashMap::default(),
            box_cache: FxHashMap::default(),
        }
    }

    /// Wrap this heap for shared access.
    pub fn into_shared(self) -> SharedHeap {
        Arc::new(RwLock::new(self))
    }

    /// Number of live cells.
    pub fn allocation_count(&self) -> usize {
        self.cells.len()
    }

    // ========================================================================
    // Class registry
    // ========================================================================

    /// Register a class and allocate its (pinned) type mirror.
    pub fn register_class(
        &mut self,
        name: &str,
        parent: Option<ClassId>,
        field_slots: usize,
        static_slots: usize,
    ) -> ClassId {
        let id = ClassId::from_index(self.classes.len());
        let name: Arc<str> = Arc::from(name);
        let mirror = self.alloc_pinned(HeapCell::TypeMirror {
            ty: ResolvedType::Class {
                id,
                name: name.clone(),
            },
            statics: vec![0; static_slots],
        });
        self.classes.push(ClassInfo {
            name: name.clone(),
            parent,
            field_slots,
            mirror,
        });
        self.class_by_name.insert(name, id);
        id
    }

    /// Metadata of a registered class.
    ///
    /// # Panics
    ///
    /// Panics on an unregistered id: the metadata oracle handed out an
    /// identity outside its documented domain, which aborts the
    /// compilation unit.
    pub fn class(&self, id: ClassId) -> &ClassInfo {
        self.classes
            .get(id.index())
            .unwrap_or_else(|| panic!("unregistered class id {}", id.index()))
    }

    /// Look up a class by name.
    pub fn lookup_class(&self, name: &str) -> Option<ClassId> {
        self.class_by_name.get(name).copied()
    }

    /// The type mirror of a class.
    pub fn mirror_of(&self, id: ClassId) -> HeapRef {
        self.class(id).mirror
    }

    /// Whether `sub` is `ancestor` or a subclass of it.
    pub fn is_subclass_of(&self, sub: ClassId, ancestor: ClassId) -> bool {
        let mut current = Some(sub);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.class(id).parent;
        }
        false
    }

    // ========================================================================
    // Allocation
    // ========================================================================

    /// Allocate a cell.
    pub fn alloc(&mut self, cell: HeapCell) -> HeapRef {
        let handle = HeapRef(self.cells.len() as u32);
        self.cells.push(Allocation {
            cell,
            pinned: false,
        });
        handle
    }

    fn alloc_pinned(&mut self, cell: HeapCell) -> HeapRef {
        let handle = self.alloc(cell);
        self.cells[handle.index()].pinned = true;
        handle
    }

    /// Allocate an instance of `class` with zeroed fields.
    pub fn alloc_instance(&mut self, class: ClassId) -> HeapRef {
        let field_slots = self.class(class).field_slots;
        self.alloc(HeapCell::Instance {
            class,
            fields: vec![0; field_slots],
        })
    }

    /// Allocate an array of `len` zeroed elements.
    pub fn alloc_array(&mut self, component: ResolvedType, len: usize) -> HeapRef {
        self.alloc(HeapCell::Array {
            component,
            elements: vec![0; len],
        })
    }

    /// Allocate a string cell.
    pub fn alloc_string(&mut self, s: &str) -> HeapRef {
        self.alloc(HeapCell::Str(s.to_string()))
    }

    /// Allocate a (pinned) mirror for a primitive or array type. Class
    /// mirrors are created by [`Heap::register_class`].
    pub fn alloc_mirror(&mut self, ty: ResolvedType) -> HeapRef {
        self.alloc_pinned(HeapCell::TypeMirror {
            ty,
            statics: Vec::new(),
        })
    }

    /// Allocate a method handle bound to `target`.
    pub fn alloc_method_handle(&mut self, target: ResolvedMethod) -> HeapRef {
        self.alloc(HeapCell::MethodHandle(target))
    }

    /// Box a primitive value, interning small integral values through the
    /// box cache. Cached boxes are pinned.
    pub fn box_value(&mut self, value: PrimitiveConstant) -> HeapRef {
        if self.is_cacheable(value) {
            let key = (value.kind(), value.bits());
            if let Some(&handle) = self.box_cache.get(&key) {
                return handle;
            }
            let handle = self.alloc_pinned(HeapCell::Boxed(value));
            self.box_cache.insert(key, handle);
            handle
        } else {
            self.alloc(HeapCell::Boxed(value))
        }
    }

    fn is_cacheable(&self, value: PrimitiveConstant) -> bool {
        match value.kind() {
            PrimitiveKind::Bool => true,
            PrimitiveKind::Char => value.bits() <= 127,
            k if k.is_integral() => {
                let v = value.bits() as i64;
                (-128..=self.options.box_cache_max).contains(&v)
            }
            _ => false,
        }
    }

    // ========================================================================
    // Access
    // ========================================================================

    /// The cell behind a handle.
    pub fn get(&self, handle: HeapRef) -> Option<&HeapCell> {
        self.cells.get(handle.index()).map(|a| &a.cell)
    }

    /// Whether the cell is pinned (its address survives relocation).
    pub fn is_pinned(&self, handle: HeapRef) -> bool {
        self.cells
            .get(handle.index())
            .is_some_and(|a| a.pinned)
    }

    /// Pin a cell.
    pub fn pin(&mut self, handle: HeapRef) -> Result<(), HeapError> {
        let alloc = self
            .cells
            .get_mut(handle.index())
            .ok_or(HeapError::UnknownHandle(handle.index()))?;
        alloc.pinned = true;
        Ok(())
    }

    // ========================================================================
    // Host-side writes (runtime and test construction)
    // ========================================================================

    fn cell_mut(&mut self, handle: HeapRef) -> Result<&mut HeapCell, HeapError> {
        self.cells
            .get_mut(handle.index())
            .map(|a| &mut a.cell)
            .ok_or(HeapError::UnknownHandle(handle.index()))
    }

    fn write_slot(slots: &mut [u64], index: usize, bits: u64) -> Result<(), HeapError> {
        let len = slots.len();
        *slots
            .get_mut(index)
            .ok_or(HeapError::SlotOutOfBounds { index, len })? = bits;
        Ok(())
    }

    /// Write an instance field slot.
    pub fn write_field(
        &mut self,
        handle: HeapRef,
        slot: usize,
        bits: u64,
    ) -> Result<(), HeapError> {
        match self.cell_mut(handle)? {
            HeapCell::Instance { fields, .. } => Self::write_slot(fields, slot, bits),
            _ => Err(HeapError::WrongCellShape {
                handle: handle.index(),
                expected: "an instance",
            }),
        }
    }

    /// Write an array element slot.
    pub fn write_element(
        &mut self,
        handle: HeapRef,
        index: usize,
        bits: u64,
    ) -> Result<(), HeapError> {
        match self.cell_mut(handle)? {
            HeapCell::Array { elements, .. } => Self::write_slot(elements, index, bits),
            _ => Err(HeapError::WrongCellShape {
                handle: handle.index(),
                expected: "an array",
            }),
        }
    }

    /// Write a static field slot of `class`.
    pub fn write_static(
        &mut self,
        class: ClassId,
        slot: usize,
        bits: u64,
    ) -> Result<(), HeapError> {
        let mirror = self.mirror_of(class);
        match self.cell_mut(mirror)? {
            HeapCell::TypeMirror { statics, .. } => Self::write_slot(statics, slot, bits),
            _ => Err(HeapError::WrongCellShape {
                handle: mirror.index(),
                expected: "a type mirror",
            }),
        }
    }
}

impl Default for Heap {
    fn default() -> Self {
        Self::new()
    }
}
