mod boot;
mod writer;

pub use boot::write_boot;
pub use writer::write_unit;
pub use writer::FrameTable;
