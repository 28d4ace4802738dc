mod abi;
mod assemble;
mod check;
mod constants;
pub mod data;
mod emit;
mod error;
mod lex;
mod parse;
mod weed;

pub use constants::EXIT_COMPILE_ERROR;
pub use constants::EXIT_INTERNAL_ERROR;
pub use error::Error;
pub use error::ErrorList;
pub use error::Report;

pub(crate) type Map<K, V> = indexmap::IndexMap<K, V>;
pub(crate) type Set<T> = indexmap::IndexSet<T>;

pub mod api {
    pub use crate::abi::mangle;
    pub use crate::abi::OffsetTable;
    pub use crate::abi::RuntimeLinkIds;
    pub use crate::assemble::write_boot;
    pub use crate::assemble::write_unit;
    pub use crate::assemble::FrameTable;
    pub use crate::check::check;
    pub use crate::check::ConstStringMap;
    pub use crate::check::TypeInfoMap;
    pub use crate::check::TypeSet;
    pub use crate::check::TypeSetBuilder;
    pub use crate::emit::emit_program;
    pub use crate::emit::emit_unit;
    pub use crate::lex::lex;
    pub use crate::parse::parse;
    pub use crate::weed::weed;
}
