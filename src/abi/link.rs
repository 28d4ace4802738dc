use crate::check::MethodSignature;
use crate::check::TypeInfoMap;
use crate::check::TypeSet;
use crate::data::ids::FieldId;
use crate::data::ids::MethodId;
use crate::data::ids::TypeId;
use crate::data::symbol;
use crate::Map;

/// The ids of well-known standard-library entities the code generator
/// and runtime agree on. Resolved once after the tables are
/// sealed; consumed by the IR generator and the assembly writer.
///
/// Programs compiled without the standard library leave the missing
/// entries as error ids; generating code that touches them is a bug in
/// the caller.
#[derive(Clone, Debug)]
pub struct RuntimeLinkIds {
    pub object: TypeId,
    pub string: TypeId,
    pub type_info: TypeId,
    pub array: TypeId,
    pub stack_frame: TypeId,

    /// `TypeInfo(int tid, TypeInfo[] parents)`.
    pub type_info_ctor: MethodId,
    /// `static boolean InstanceOf(TypeInfo target, TypeInfo of)`.
    pub type_info_instance_of: MethodId,
    /// `static int num_types`.
    pub type_info_num_types: FieldId,

    /// `void Print()` on a stack-frame record.
    pub stack_frame_print: MethodId,
    /// `static void PrintException(int code)`.
    pub stack_frame_print_exception: MethodId,

    /// `String.concat(String)`.
    pub string_concat: MethodId,
    /// `static String.valueOf(...)` overloads, keyed by parameter type.
    pub string_value_of: Map<TypeId, MethodId>,
    /// The `char[]` field backing a `String`.
    pub string_chars: FieldId,

    /// Synthesized per-type static slot holding the runtime `TypeInfo`
    /// instance, assigned here because the slots exist only for the
    /// runtime's benefit.
    typeinfo_slots: Map<u64, FieldId>,
    typeinfo_slot_owners: Map<FieldId, u64>,
}

impl RuntimeLinkIds {
    pub fn resolve(set: &TypeSet, tinfo: &TypeInfoMap) -> Self {
        let lookup = |name: &str| set.get(name).unwrap_or(TypeId::ERROR);

        let object = lookup("java.lang.Object");
        let string = lookup("java.lang.String");
        let type_info = lookup("__joos_internal__.TypeInfo");
        let array = lookup("__joos_internal__.Array");
        let stack_frame = lookup("__joos_internal__.StackFrame");

        let method = |tid: TypeId, is_constructor: bool, name: &str, params: &[TypeId]| {
            tinfo
                .get(tid)
                .and_then(|info| {
                    info.methods.resolve(&MethodSignature {
                        is_constructor,
                        name: symbol::intern(name),
                        params: params.to_vec(),
                    })
                })
                .map(|minfo| minfo.mid)
                .unwrap_or(MethodId::ERROR)
        };

        let field = |tid: TypeId, name: &str| {
            tinfo
                .get(tid)
                .and_then(|info| info.fields.resolve(symbol::intern(name)))
                .map(|finfo| finfo.fid)
                .unwrap_or(FieldId::ERROR)
        };

        let type_info_ctor = method(
            type_info,
            true,
            "TypeInfo",
            &[TypeId::INT, type_info.array()],
        );
        let type_info_instance_of =
            method(type_info, false, "InstanceOf", &[type_info, type_info]);
        let type_info_num_types = field(type_info, "num_types");

        let stack_frame_print = method(stack_frame, false, "Print", &[]);
        let stack_frame_print_exception =
            method(stack_frame, false, "PrintException", &[TypeId::INT]);

        let string_concat = method(string, false, "concat", &[string]);

        let mut string_value_of = Map::default();
        for param in [TypeId::INT, TypeId::CHAR, TypeId::BOOL, object] {
            let mid = method(string, false, "valueOf", &[param]);
            if mid != MethodId::ERROR {
                string_value_of.insert(param, mid);
            }
        }

        // The char[] field of String: resolved structurally so the
        // library is free to name it.
        let string_chars = tinfo
            .get(string)
            .and_then(|info| {
                info.fields
                    .iter()
                    .find(|finfo| finfo.tid == TypeId::CHAR.array() && !finfo.mods.is_static())
            })
            .map(|finfo| finfo.fid)
            .unwrap_or(FieldId::ERROR);

        // One static type-info slot per declared type, numbered after
        // every declared field.
        let mut next = tinfo
            .iter()
            .flat_map(|info| info.fields.iter())
            .map(|finfo| finfo.fid.0 + 1)
            .max()
            .unwrap_or(FieldId::FIRST.0);
        let mut typeinfo_slots = Map::default();
        let mut typeinfo_slot_owners = Map::default();
        for info in tinfo.iter() {
            let fid = FieldId(next);
            next += 1;
            typeinfo_slots.insert(info.tid.base, fid);
            typeinfo_slot_owners.insert(fid, info.tid.base);
        }

        RuntimeLinkIds {
            object,
            string,
            type_info,
            array,
            stack_frame,
            type_info_ctor,
            type_info_instance_of,
            type_info_num_types,
            stack_frame_print,
            stack_frame_print_exception,
            string_concat,
            string_value_of,
            string_chars,
            typeinfo_slots,
            typeinfo_slot_owners,
        }
    }

    /// The static slot holding `tid`'s runtime type info.
    pub fn typeinfo_slot(&self, tid: TypeId) -> FieldId {
        self.typeinfo_slots
            .get(&tid.base)
            .copied()
            .unwrap_or(FieldId::ERROR)
    }

    /// Reverse lookup used by the assembly writer when a static field
    /// reference is a synthesized type-info slot.
    pub fn typeinfo_slot_owner(&self, fid: FieldId) -> Option<TypeId> {
        self.typeinfo_slot_owners
            .get(&fid)
            .map(|base| TypeId::base(*base))
    }

    /// Picks the `String.valueOf` overload for an operand type.
    pub fn value_of(&self, tid: TypeId) -> MethodId {
        let key = if tid.is_reference() || tid.is_null() {
            self.object
        } else if tid.is_bool() {
            TypeId::BOOL
        } else if tid == TypeId::CHAR {
            TypeId::CHAR
        } else {
            TypeId::INT
        };
        self.string_value_of
            .get(&key)
            .copied()
            .unwrap_or(MethodId::ERROR)
    }
}
