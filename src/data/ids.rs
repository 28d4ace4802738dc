use std::fmt;

/// Stable identifier for a Joos type: a base paired with the number of
/// array dimensions. `int[][]` is `(Int.base, 2)`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TypeId {
    pub base: u64,
    pub ndims: u64,
}

impl TypeId {
    pub const UNASSIGNED_BASE: u64 = 0;
    pub const ERROR_BASE: u64 = 1;
    pub const NULL_BASE: u64 = 2;
    pub const VOID_BASE: u64 = 3;
    pub const BOOL_BASE: u64 = 4;
    pub const BYTE_BASE: u64 = 5;
    pub const CHAR_BASE: u64 = 6;
    pub const SHORT_BASE: u64 = 7;
    pub const INT_BASE: u64 = 8;

    /// User-declared types are assigned bases starting here.
    pub const FIRST_REF_BASE: u64 = 16;

    pub const UNASSIGNED: TypeId = TypeId::base(Self::UNASSIGNED_BASE);
    pub const ERROR: TypeId = TypeId::base(Self::ERROR_BASE);
    pub const NULL: TypeId = TypeId::base(Self::NULL_BASE);
    pub const VOID: TypeId = TypeId::base(Self::VOID_BASE);
    pub const BOOL: TypeId = TypeId::base(Self::BOOL_BASE);
    pub const BYTE: TypeId = TypeId::base(Self::BYTE_BASE);
    pub const CHAR: TypeId = TypeId::base(Self::CHAR_BASE);
    pub const SHORT: TypeId = TypeId::base(Self::SHORT_BASE);
    pub const INT: TypeId = TypeId::base(Self::INT_BASE);

    pub const fn base(base: u64) -> Self {
        TypeId { base, ndims: 0 }
    }

    pub const fn array(self) -> Self {
        TypeId {
            base: self.base,
            ndims: self.ndims + 1,
        }
    }

    /// The element type of an array type.
    pub fn element(self) -> Self {
        debug_assert!(self.ndims > 0);
        TypeId {
            base: self.base,
            ndims: self.ndims - 1,
        }
    }

    pub fn is_unassigned(self) -> bool {
        self.base == Self::UNASSIGNED_BASE
    }

    pub fn is_error(self) -> bool {
        self.base == Self::ERROR_BASE
    }

    pub fn is_valid(self) -> bool {
        !self.is_unassigned() && !self.is_error()
    }

    pub fn is_array(self) -> bool {
        self.ndims > 0
    }

    pub fn is_null(self) -> bool {
        self.base == Self::NULL_BASE && self.ndims == 0
    }

    pub fn is_void(self) -> bool {
        self.base == Self::VOID_BASE && self.ndims == 0
    }

    /// A numeric primitive: byte, char, short, or int.
    pub fn is_numeric(self) -> bool {
        self.ndims == 0
            && matches!(
                self.base,
                Self::BYTE_BASE | Self::CHAR_BASE | Self::SHORT_BASE | Self::INT_BASE
            )
    }

    pub fn is_bool(self) -> bool {
        self.base == Self::BOOL_BASE && self.ndims == 0
    }

    pub fn is_primitive(self) -> bool {
        self.ndims == 0 && self.base >= Self::BOOL_BASE && self.base <= Self::INT_BASE
    }

    /// Arrays, declared types, and null are reference types.
    pub fn is_reference(self) -> bool {
        self.ndims > 0 || self.base >= Self::FIRST_REF_BASE || self.is_null()
    }
}

impl fmt::Display for TypeId {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        write!(fmt, "t{}", self.base)?;
        for _ in 0..self.ndims {
            write!(fmt, "[]")?;
        }
        Ok(())
    }
}

macro_rules! id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
                write!(fmt, "{}", self.0)
            }
        }
    };
}

id! {
    /// Stable identifier for a declared field.
    FieldId
}
id! {
    /// Stable identifier for a declared or synthesized method.
    MethodId
}
id! {
    /// Identifier for a local variable within one method body.
    LocalVarId
}
id! {
    /// Numbered label local to one IR stream.
    LabelId
}
id! {
    /// Identifier for a typed stack slot within one IR stream.
    MemId
}
id! {
    /// Identifier for an interned constant string.
    StringId
}

impl FieldId {
    pub const ERROR: FieldId = FieldId(0);
    /// The implicit `length` field of every array type.
    pub const ARRAY_LENGTH: FieldId = FieldId(1);
    pub const FIRST: FieldId = FieldId(16);
}

impl MethodId {
    pub const ERROR: MethodId = MethodId(0);
    /// Synthesized per-type instance initializer.
    pub const INSTANCE_INIT: MethodId = MethodId(1);
    /// Synthesized per-type static-field initializer.
    pub const STATIC_INIT: MethodId = MethodId(2);
    /// Synthesized per-type runtime type-info initializer.
    pub const TYPE_INIT: MethodId = MethodId(3);
    pub const FIRST: MethodId = MethodId(16);
}

impl MemId {
    /// Sentinel for "no mem"; used to mark static field accesses.
    pub const INVALID: MemId = MemId(0);
    pub const FIRST: MemId = MemId(1);
}

/// Whether a declared type is a class or an interface.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum TypeKind {
    Class,
    Interface,
}
