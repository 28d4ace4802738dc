mod emitter;
mod stream;

pub use emitter::emit_program;
pub use emitter::emit_unit;
pub use stream::Mem;
pub use stream::StreamBuilder;
