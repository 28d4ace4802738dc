pub mod layout;
pub mod link;
pub mod mangle;

pub use layout::OffsetTable;
pub use link::RuntimeLinkIds;
