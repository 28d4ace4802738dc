use crate::check::TypeInfoMap;
use crate::constants;
use crate::data::ids::FieldId;
use crate::data::ids::MethodId;
use crate::data::ids::TypeId;
use crate::data::ids::TypeKind;
use crate::data::ir::SizeClass;
use crate::Map;

/// One class's virtual dispatch table: `(owning type, method)` per
/// slot, parent prefix first. The two leading reserved slots (static
/// type-info slot pointer, itable pointer) are not represented here;
/// offsets account for them.
pub type Vtable = Vec<(TypeId, MethodId)>;

/// One class's interface dispatch table: `(byte offset, owning type,
/// method)` triples, sparse over the global interface-method index.
pub type Itable = Vec<(u64, TypeId, MethodId)>;

/// Concrete byte layout for the sealed type world: instance
/// sizes, field offsets, vtable and itable slots, static backing
/// fields, and native symbols. Built once; read-only afterwards.
#[derive(Debug, Default)]
pub struct OffsetTable {
    type_sizes: Map<TypeId, u64>,
    field_offsets: Map<FieldId, u64>,
    method_offsets: Map<MethodId, (u64, TypeKind)>,
    vtables: Map<TypeId, Vtable>,
    itables: Map<TypeId, Itable>,
    statics: Map<TypeId, Vec<(FieldId, SizeClass)>>,
    natives: Map<MethodId, String>,
}

impl OffsetTable {
    pub fn build(tinfo: &TypeInfoMap) -> Self {
        let mut table = OffsetTable::default();

        // Global interface-method slot index: assigned once per
        // interface-method declaration, shared by every implementor.
        let mut next_islot: u64 = 0;

        // Per-class vtable slot of each root method id.
        let mut slots: Map<TypeId, Map<MethodId, usize>> = Map::default();

        for info in tinfo.iter() {
            let tid = info.tid;

            if info.kind == TypeKind::Interface {
                for minfo in info.methods.iter() {
                    if minfo.owner != tid || minfo.signature.is_constructor {
                        continue;
                    }
                    let offset = next_islot * constants::WORD;
                    next_islot += 1;
                    table
                        .method_offsets
                        .insert(minfo.mid, (offset, TypeKind::Interface));
                }
                table.statics.insert(tid, Vec::new());
                continue;
            }

            // Instance fields: ancestor layout is a strict prefix, so
            // every inherited field keeps its offset under upcast.
            let parent = info.extends.iter().copied().find(|parent| {
                tinfo
                    .get(*parent)
                    .map(|pinfo| pinfo.kind == TypeKind::Class)
                    .unwrap_or(false)
            });

            let mut size = parent
                .and_then(|parent| table.type_sizes.get(&parent))
                .copied()
                .unwrap_or(0);
            for finfo in info.fields.iter() {
                if finfo.owner != tid || finfo.mods.is_static() {
                    continue;
                }
                table.field_offsets.insert(finfo.fid, size);
                size += constants::WORD;
            }
            table.type_sizes.insert(tid, size);

            // Vtable: parent prefix, overrides in place, then newly
            // introduced methods.
            let mut vtable = parent
                .and_then(|parent| table.vtables.get(&parent))
                .cloned()
                .unwrap_or_default();
            let mut slot_map = parent
                .and_then(|parent| slots.get(&parent))
                .cloned()
                .unwrap_or_default();

            for minfo in info.methods.iter() {
                if minfo.signature.is_constructor || minfo.mods.is_static() {
                    continue;
                }
                // Methods inherited from a class parent already hold
                // their slots; interface-declared entries dispatch
                // through the itable instead.
                if minfo.owner != tid {
                    continue;
                }

                let root = minfo.overrides.unwrap_or(minfo.mid);
                let slot = match slot_map.get(&root) {
                    Some(slot) => {
                        vtable[*slot] = (tid, minfo.mid);
                        *slot
                    }
                    None => {
                        vtable.push((tid, minfo.mid));
                        vtable.len() - 1
                    }
                };
                slot_map.insert(root, slot);
                if minfo.overrides.is_some() {
                    slot_map.insert(minfo.mid, slot);
                }

                table.method_offsets.insert(
                    minfo.mid,
                    (
                        constants::VTABLE_OVERHEAD + slot as u64 * constants::WORD,
                        TypeKind::Class,
                    ),
                );
            }

            slots.insert(tid, slot_map);
            table.vtables.insert(tid, vtable);

            // Itable: every instance entry that satisfies an
            // interface declaration lands in that declaration's
            // globally-indexed slot.
            let mut itable: Itable = Vec::new();
            for minfo in info.methods.iter() {
                if minfo.signature.is_constructor || minfo.mods.is_static() {
                    continue;
                }
                for imid in &minfo.interface_mids {
                    if let Some((offset, TypeKind::Interface)) =
                        table.method_offsets.get(imid).copied()
                    {
                        itable.push((offset, tid, minfo.mid));
                    }
                }
                // A class entry whose own declaration is an interface
                // (inherited, unimplemented in an abstract class)
                // occupies its own slot with no target.
            }
            itable.sort();
            table.itables.insert(tid, itable);

            // Static fields in declaration order.
            let statics = info
                .fields
                .iter()
                .filter(|finfo| finfo.owner == tid && finfo.mods.is_static())
                .map(|finfo| (finfo.fid, SizeClass::from_tid(finfo.tid)))
                .collect();
            table.statics.insert(tid, statics);

            // Native methods resolve to externally-provided symbols.
            for minfo in info.methods.iter() {
                if minfo.owner == tid && minfo.mods.is_native() {
                    table.natives.insert(
                        minfo.mid,
                        crate::abi::mangle::native(
                            &info.qualified,
                            minfo.signature.name.as_str(),
                        ),
                    );
                }
            }
        }

        log::debug!(
            "laid out {} types, {} interface-method slots",
            table.type_sizes.len(),
            table.itable_len()
        );
        table
    }

    /// Instance size in bytes, including the object header.
    pub fn size_of(&self, tid: TypeId) -> u64 {
        debug_assert!(tid.ndims == 0);
        self.type_sizes.get(&tid).copied().unwrap_or(0) + constants::OBJECT_OVERHEAD
    }

    /// Byte offset of a field within its object, including the header.
    pub fn offset_of_field(&self, fid: FieldId) -> u64 {
        self.field_offsets
            .get(&fid)
            .copied()
            .map(|offset| offset + constants::OBJECT_OVERHEAD)
            .unwrap_or_else(|| panic!("no layout for field {}", fid))
    }

    /// Byte offset of a method in its dispatch table, and whether the
    /// table is a vtable or an itable.
    pub fn offset_of_method(&self, mid: MethodId) -> (u64, TypeKind) {
        self.method_offsets
            .get(&mid)
            .copied()
            .unwrap_or_else(|| panic!("no dispatch slot for method {}", mid))
    }

    pub fn vtable_of(&self, tid: TypeId) -> &[(TypeId, MethodId)] {
        self.vtables.get(&tid).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn itable_of(&self, tid: TypeId) -> &[(u64, TypeId, MethodId)] {
        self.itables.get(&tid).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn statics_of(&self, tid: TypeId) -> &[(FieldId, SizeClass)] {
        self.statics.get(&tid).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn native_symbol(&self, mid: MethodId) -> Option<&str> {
        self.natives.get(&mid).map(String::as_str)
    }

    /// Total number of interface-method slots; every itable is padded
    /// to this length with null entries.
    pub fn itable_len(&self) -> u64 {
        self.method_offsets
            .values()
            .filter(|(_, kind)| *kind == TypeKind::Interface)
            .count() as u64
    }
}
