/// Machine word size on the i386 target. Every stack slot and field
/// occupies one word regardless of its size class.
pub const WORD: u64 = 4;

/// Object header: one word for the vtable pointer.
pub const OBJECT_OVERHEAD: u64 = WORD;

/// Array header: vtable pointer, length, element type-info pointer.
pub const ARRAY_OVERHEAD: u64 = 3 * WORD;

/// Offset of the length word in an array object.
pub const ARRAY_LENGTH_OFFSET: u64 = WORD;

/// Offset of the element type-info word in an array object.
pub const ARRAY_ELEM_INFO_OFFSET: u64 = 2 * WORD;

/// Leading vtable slots: static type-info slot pointer, itable pointer.
pub const VTABLE_OVERHEAD: u64 = 2 * WORD;

pub const JOOS_ENTRY: &str = "_entry";
pub const JOOS_START: &str = "_start";
pub const JOOS_MALLOC: &str = "_joos_malloc";
pub const JOOS_THROW: &str = "_joos_throw";
pub const JOOS_STATIC_INIT: &str = "_static_init";

/// Exit code used for every reported compile error.
pub const EXIT_COMPILE_ERROR: i32 = 42;

/// Exit code reserved for internal compiler failures.
pub const EXIT_INTERNAL_ERROR: i32 = 1;

/// Discriminants passed to `_joos_throw`. The runtime maps these to
/// exception names when printing a trace.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Exception {
    NullPointer = 0,
    OutOfBounds = 1,
    NegativeArraySize = 2,
    ClassCast = 3,
    ArrayStore = 4,
    Arithmetic = 5,
}
