//! Label naming scheme shared by the IR generator, the offset table,
//! and the assembly writer. Every symbol the generated program exports
//! or references is produced here, so the scheme lives in one place.

use crate::data::ids::FieldId;
use crate::data::ids::MethodId;
use crate::data::ids::StringId;
use crate::data::ids::TypeId;
use crate::data::span::FileId;

/// `_t<tid>_m<mid>`: one label per compiled method.
pub fn method(tid: TypeId, mid: MethodId) -> String {
    format!("_t{}_m{}", tid.base, mid)
}

/// `vtable_t<tid>`: class dispatch table.
pub fn vtable(tid: TypeId) -> String {
    format!("vtable_t{}", tid.base)
}

/// The shared vtable of every array object.
pub fn array_vtable() -> String {
    "vtable_array".to_string()
}

/// `itable_t<tid>`: interface dispatch table.
pub fn itable(tid: TypeId) -> String {
    format!("itable_t{}", tid.base)
}

/// `static_t<tid>_f<fid>`: backing storage for one static field.
pub fn static_field(tid: TypeId, fid: FieldId) -> String {
    format!("static_t{}_f{}", tid.base, fid)
}

/// `string<id>`: an interned constant `java.lang.String` object.
pub fn string(sid: StringId) -> String {
    format!("string{}", sid)
}

/// The backing `char[]` object of an interned string.
pub fn string_chars(sid: StringId) -> String {
    format!("string{}_chars", sid)
}

/// `src_file<fid>`: a source filename rendered as a string object.
pub fn src_file(file: FileId) -> String {
    format!("src_file{}", file)
}

/// `types<tid>`: a type name rendered as a string object.
pub fn type_name(tid: TypeId) -> String {
    format!("types{}", tid.base)
}

/// `methods<mid>`: a method name rendered as a string object.
pub fn method_name(mid: MethodId) -> String {
    format!("methods{}", mid)
}

/// `sf<n>`: one stack-frame metadata record per call or check site.
pub fn stack_frame(index: usize) -> String {
    format!("sf{}", index)
}

/// `NATIVE<qualified method name>`: externally-provided native code.
pub fn native(qualified_type: &str, method: &str) -> String {
    format!("NATIVE{}.{}", qualified_type, method)
}

/// Per-unit output file name.
pub fn unit_file(file: FileId) -> String {
    format!("f{}.s", file)
}
