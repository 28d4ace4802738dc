use petgraph::algo::tarjan_scc;
use petgraph::graphmap::DiGraphMap;

use crate::check::decl::RawType;
use crate::check::info::FieldTable;
use crate::check::info::MethodInfo;
use crate::check::info::MethodSignature;
use crate::check::info::MethodTable;
use crate::check::info::TypeInfo;
use crate::check::info::TypeInfoMap;
use crate::check::type_set::TypeSet;
use crate::check::Error;
use crate::check::ErrorKind;
use crate::data::ast::Modifiers;
use crate::data::ids::FieldId;
use crate::data::ids::MethodId;
use crate::data::ids::TypeId;
use crate::data::ids::TypeKind;
use crate::data::span::Span;
use crate::data::symbol::Symbol;
use crate::ErrorList;
use crate::Map;
use crate::Set;

/// Builds the sealed type world: validates the supertype graph,
/// topologically sorts it, and merges every type's declared members
/// with its inherited ones under the Joos overriding rules.
pub struct TypeInfoMapBuilder {
    raw: Vec<RawType>,
}

impl TypeInfoMapBuilder {
    pub fn new(raw: Vec<RawType>) -> Self {
        TypeInfoMapBuilder { raw }
    }

    pub fn build(self, set: &TypeSet, errors: &mut ErrorList) -> TypeInfoMap {
        let object = set.get("java.lang.Object");

        let mut raw: Map<TypeId, RawType> = self
            .raw
            .into_iter()
            .map(|entry| (entry.info.tid, entry))
            .collect();

        validate_supertypes(&mut raw, errors);

        let (order, cycle_bad) = sort_types(&raw, errors);

        let mut sealed: Map<TypeId, TypeInfo> = Map::default();
        let mut next_mid = MethodId::FIRST;
        let mut next_fid = FieldId::FIRST;
        // Parents found broken while sealing a child; their tables are
        // replaced with error tables at the end.
        let mut parent_bad: Set<TypeId> = Set::default();

        for (index, tid) in order.iter().copied().enumerate() {
            let mut entry = raw
                .shift_remove(&tid)
                .expect("topological order covers every type");
            entry.info.top_sort_index = index;

            if cycle_bad.contains(&tid) {
                entry.info.fields = FieldTable::error_table();
                entry.info.methods = MethodTable::error_table();
                sealed.insert(tid, entry.info);
                continue;
            }

            build_method_table(
                &mut entry,
                &sealed,
                object,
                &mut next_mid,
                &mut parent_bad,
                errors,
            );
            build_field_table(&mut entry, &sealed, &mut next_fid, errors);

            sealed.insert(tid, entry.info);
        }

        for tid in parent_bad {
            if let Some(info) = sealed.get_mut(&tid) {
                info.methods = MethodTable::error_table();
            }
        }

        TypeInfoMap::new(sealed)
    }
}

/// Resolves each extends/implements edge against the declared kind of
/// its target, dropping edges that are not legal inheritance.
fn validate_supertypes(raw: &mut Map<TypeId, RawType>, errors: &mut ErrorList) {
    let kinds: Map<TypeId, (TypeKind, bool)> = raw
        .values()
        .map(|entry| {
            (
                entry.info.tid,
                (entry.info.kind, entry.info.mods.is_final()),
            )
        })
        .collect();

    for entry in raw.values_mut() {
        let pos = entry.info.pos;
        let kind = entry.info.kind;

        entry.info.extends.retain(|parent| {
            match (kind, kinds.get(parent)) {
                (_, None) => false,
                (TypeKind::Class, Some((TypeKind::Interface, _))) => {
                    errors.append(Error::new(pos, ErrorKind::ExtendInterface));
                    false
                }
                (TypeKind::Class, Some((TypeKind::Class, true))) => {
                    errors.append(Error::new(pos, ErrorKind::ExtendFinal));
                    false
                }
                (TypeKind::Interface, Some((TypeKind::Class, _))) => {
                    errors.append(Error::new(pos, ErrorKind::InterfaceExtendsClass));
                    false
                }
                _ => true,
            }
        });

        entry.info.implements.retain(|parent| match kinds.get(parent) {
            None => false,
            Some((TypeKind::Class, _)) => {
                errors.append(Error::new(pos, ErrorKind::ImplementClass));
                false
            }
            Some((TypeKind::Interface, _)) => true,
        });
    }
}

/// Topologically sorts the extends+implements graph, reporting each
/// cycle distinctly. The returned order lists parents before children
/// and is deterministic in the type-id order of the input.
fn sort_types(raw: &Map<TypeId, RawType>, errors: &mut ErrorList) -> (Vec<TypeId>, Set<TypeId>) {
    let mut graph: DiGraphMap<u64, ()> = DiGraphMap::new();

    let mut tids: Vec<TypeId> = raw.keys().copied().collect();
    tids.sort();

    for tid in &tids {
        graph.add_node(tid.base);
    }
    for tid in &tids {
        for parent in raw[tid].info.parents() {
            if raw.contains_key(&parent) {
                graph.add_edge(tid.base, parent.base, ());
            }
        }
    }

    // With child -> parent edges, Tarjan yields components in
    // topological order of the condensation: parents first.
    let mut order = Vec::with_capacity(tids.len());
    let mut bad = Set::default();

    for component in tarjan_scc(&graph) {
        if component.len() == 1 && !graph.contains_edge(component[0], component[0]) {
            order.push(TypeId::base(component[0]));
            continue;
        }

        let members: Vec<TypeId> = component.iter().map(|base| TypeId::base(*base)).collect();
        errors.append(Error::all(
            members.iter().map(|tid| raw[tid].info.pos).collect(),
            ErrorKind::InheritanceCycle,
        ));
        for member in members {
            bad.insert(member);
            order.push(member);
        }
    }

    (order, bad)
}

/// Interface members are implicitly public and abstract.
fn fix_mods(kind: TypeKind, mut mods: Modifiers, pos: Span) -> Modifiers {
    if kind == TypeKind::Interface {
        mods.public.get_or_insert(pos);
        mods.abstract_.get_or_insert(pos);
    }
    mods
}

fn build_method_table(
    entry: &mut RawType,
    sealed: &Map<TypeId, TypeInfo>,
    object: Option<TypeId>,
    next_mid: &mut MethodId,
    parent_bad: &mut Set<TypeId>,
    errors: &mut ErrorList,
) {
    let tid = entry.info.tid;
    let kind = entry.info.kind;
    let type_name = entry.info.name;
    let type_pos = entry.info.pos;
    let abstract_class = entry.info.mods.is_abstract();
    let parents: Vec<TypeId> = entry.info.parents().collect();
    let implicit_object = kind == TypeKind::Interface && entry.info.extends.is_empty();

    let mut table = MethodTable::default();

    // Declared methods first: constructor-name checks, duplicate
    // detection, and deterministic id assignment in declaration order.
    let mut declared: Map<MethodSignature, MethodInfo> = Map::default();
    let mut duplicates: Map<MethodSignature, Vec<Span>> = Map::default();

    for method in &entry.methods {
        let mut method = method.clone();
        method.mods = fix_mods(kind, method.mods, method.pos);

        if method.signature.is_constructor && method.signature.name != type_name {
            errors.append(Error::new(method.pos, ErrorKind::ConstructorName));
            table.blacklist(method.signature.name);
            continue;
        }

        match declared.get(&method.signature) {
            None => {
                method.mid = *next_mid;
                next_mid.0 += 1;
                declared.insert(method.signature.clone(), method);
            }
            Some(first) => {
                let first_pos = first.pos;
                duplicates
                    .entry(method.signature.clone())
                    .or_insert_with(|| vec![first_pos])
                    .push(method.pos);
            }
        }
    }

    for (signature, positions) in duplicates {
        errors.append(Error::all(positions, ErrorKind::DuplicateDefinition));
        declared.shift_remove(&signature);
        table.blacklist(signature.name);
    }

    // Synthesize the implicit default constructor.
    if kind == TypeKind::Class
        && !declared
            .values()
            .any(|method| method.signature.is_constructor)
    {
        let signature = MethodSignature {
            is_constructor: true,
            name: type_name,
            params: Vec::new(),
        };
        let mid = *next_mid;
        next_mid.0 += 1;
        declared.insert(
            signature.clone(),
            MethodInfo {
                mid,
                owner: tid,
                mods: Modifiers {
                    public: Some(type_pos),
                    ..Modifiers::default()
                },
                ret: TypeId::VOID,
                pos: type_pos,
                signature,
                overrides: None,
                interface_mids: Vec::new(),
            },
        );
    }

    // Inherited entries that no declared method replaces.
    let mut inherited: Map<MethodSignature, MethodInfo> = Map::default();

    // Merge in every parent's sealed table. An interface with no
    // superinterfaces implicitly declares abstract versions of
    // Object's public instance methods.
    let mut merge_parents = parents.clone();
    if let Some(object) = object.filter(|_| implicit_object) {
        merge_parents.push(object);
    }

    for parent in merge_parents {
        let pinfo = match sealed.get(&parent) {
            Some(pinfo) => pinfo,
            None => continue,
        };

        if pinfo.methods.all_blacklisted {
            entry.info.fields = FieldTable::error_table();
            entry.info.methods = MethodTable::error_table();
            return;
        }

        let mut parent_has_default_ctor = false;
        let from_implicit_object = implicit_object && Some(parent) == object;

        for pminfo in pinfo.methods.iter() {
            // Constructors are not inherited.
            if pminfo.signature.is_constructor {
                if pminfo.signature.params.is_empty() {
                    parent_has_default_ctor = true;
                }
                continue;
            }

            let pminfo = if from_implicit_object {
                if pminfo.mods.is_static() || !pminfo.mods.is_public() {
                    continue;
                }
                let mut abstracted = pminfo.clone();
                abstracted.mods.abstract_.get_or_insert(pminfo.pos);
                abstracted
            } else {
                pminfo.clone()
            };

            if table.is_blacklisted(pminfo.signature.name) {
                continue;
            }

            let minfo = match declared.get_mut(&pminfo.signature) {
                Some(minfo) => minfo,
                None => {
                    // Nothing declared here: inherit the parent entry,
                    // keeping its id so dispatch slots are shared.
                    match inherited.get(&pminfo.signature) {
                        // Diamond: the same declaration reached us
                        // through two paths.
                        Some(existing) if existing.mid == pminfo.mid => {}
                        Some(existing) => {
                            let existing = existing.clone();
                            if let Some(merged) = merge_inherited(
                                &mut table, existing, pminfo, type_pos, errors,
                            ) {
                                inherited.insert(merged.signature.clone(), merged);
                            }
                        }
                        None => {
                            inherited.insert(pminfo.signature.clone(), pminfo);
                        }
                    }
                    continue;
                }
            };

            if pminfo.mid == minfo.mid {
                continue;
            }

            // Overriding rules, checked in the order the diagnostics
            // are most useful.
            if pminfo.ret != minfo.ret {
                errors.append(Error::all(
                    vec![minfo.pos, pminfo.pos],
                    ErrorKind::OverrideReturnType,
                ));
                table.blacklist(minfo.signature.name);
                continue;
            }

            if pminfo.mods.is_static() != minfo.mods.is_static() {
                errors.append(Error::all(
                    vec![minfo.pos, pminfo.pos],
                    ErrorKind::OverrideStatic,
                ));
                table.blacklist(minfo.signature.name);
                continue;
            }

            let both_abstract = pminfo.mods.is_abstract() && minfo.mods.is_abstract();

            if pminfo.mods.is_public() && minfo.mods.is_protected() && !both_abstract {
                errors.append(Error::all(
                    vec![minfo.pos, pminfo.pos],
                    ErrorKind::OverrideAccess,
                ));
                table.blacklist(minfo.signature.name);
                continue;
            }

            if pminfo.mods.is_final() {
                errors.append(Error::all(
                    vec![minfo.pos, pminfo.pos],
                    ErrorKind::OverrideFinal,
                ));
                table.blacklist(minfo.signature.name);
                continue;
            }

            // Protected abstract promoted to public when a public
            // abstract version is inherited alongside it.
            if both_abstract && pminfo.mods.is_public() {
                minfo.mods.protected = None;
                minfo.mods.public.get_or_insert(pminfo.pos);
            }

            // Share dispatch slots with the overridden declaration.
            let powner_kind = sealed
                .get(&TypeId::base(pminfo.owner.base))
                .map(|powner| powner.kind);
            match powner_kind {
                Some(TypeKind::Interface) => {
                    for shared in pminfo
                        .interface_mids
                        .iter()
                        .copied()
                        .chain(std::iter::once(pminfo.mid))
                    {
                        if !minfo.interface_mids.contains(&shared) {
                            minfo.interface_mids.push(shared);
                        }
                    }
                }
                _ => {
                    minfo.overrides =
                        minfo.overrides.or(pminfo.overrides).or(Some(pminfo.mid));
                    for shared in pminfo.interface_mids.iter().copied() {
                        if !minfo.interface_mids.contains(&shared) {
                            minfo.interface_mids.push(shared);
                        }
                    }
                }
            }
        }

        if kind == TypeKind::Class
            && pinfo.kind == TypeKind::Class
            && !parent_has_default_ctor
            && !parent_bad.contains(&pinfo.tid)
        {
            errors.append(Error::all(
                vec![pinfo.pos, type_pos],
                ErrorKind::ParentNoDefaultConstructor,
            ));
            parent_bad.insert(pinfo.tid);
        }

        // Union the parent's disallowed names.
        for name in pinfo.methods.blacklisted() {
            table.blacklist(name);
        }
    }

    for minfo in inherited.into_values() {
        if !table.is_blacklisted(minfo.signature.name) {
            table.insert(minfo);
        }
    }
    for minfo in declared.into_values() {
        if !table.is_blacklisted(minfo.signature.name) {
            table.insert(minfo);
        }
    }

    // Abstract coverage for concrete classes.
    if kind == TypeKind::Class && !abstract_class {
        for minfo in table.iter() {
            if !minfo.mods.is_abstract() {
                continue;
            }
            if minfo.owner == tid {
                errors.append(Error::all(
                    vec![type_pos, minfo.pos],
                    ErrorKind::NeedAbstractClass,
                ));
            } else {
                errors.append(Error::all(
                    vec![type_pos, minfo.pos],
                    ErrorKind::AbstractMethodNotImplemented,
                ));
            }
        }
    }

    entry.info.methods = table;
}

/// Two inherited declarations of the same signature meet in a type
/// that declares neither (e.g. a class method satisfying an interface
/// method). Keeps the implementation and records slot sharing.
fn merge_inherited(
    table: &mut MethodTable,
    existing: MethodInfo,
    incoming: MethodInfo,
    type_pos: Span,
    errors: &mut ErrorList,
) -> Option<MethodInfo> {
    if incoming.ret != existing.ret {
        errors.append(Error::all(
            vec![type_pos, existing.pos, incoming.pos],
            ErrorKind::OverrideReturnType,
        ));
        table.blacklist(existing.signature.name);
        return None;
    }

    if incoming.mods.is_static() || existing.mods.is_static() {
        errors.append(Error::all(
            vec![type_pos, existing.pos, incoming.pos],
            ErrorKind::OverrideStatic,
        ));
        table.blacklist(existing.signature.name);
        return None;
    }

    // Keep whichever side has an implementation; tie goes to the
    // entry already merged.
    let (mut kept, other) = if existing.mods.is_abstract() && !incoming.mods.is_abstract() {
        (incoming.clone(), existing)
    } else {
        (existing, incoming)
    };

    for shared in other
        .interface_mids
        .iter()
        .copied()
        .chain(std::iter::once(other.mid).filter(|_| other.owner != kept.owner))
    {
        if !kept.interface_mids.contains(&shared) {
            kept.interface_mids.push(shared);
        }
    }

    Some(kept)
}

fn build_field_table(
    entry: &mut RawType,
    sealed: &Map<TypeId, TypeInfo>,
    next_fid: &mut FieldId,
    errors: &mut ErrorList,
) {
    if entry.info.fields.all_blacklisted {
        return;
    }

    let tid = entry.info.tid;
    let parents: Vec<TypeId> = entry.info.parents().collect();

    let mut table = FieldTable::default();
    let mut duplicates: Map<Symbol, Vec<Span>> = Map::default();

    for field in &entry.fields {
        let mut field = field.clone();
        match table.resolve(field.name) {
            None => {
                field.fid = *next_fid;
                next_fid.0 += 1;
                table.insert(field);
            }
            Some(first) => {
                let first_pos = first.pos;
                duplicates
                    .entry(field.name)
                    .or_insert_with(|| vec![first_pos])
                    .push(field.pos);
            }
        }
    }

    for (name, positions) in duplicates {
        errors.append(Error::all(positions, ErrorKind::DuplicateDefinition));
        table.blacklist(name);
    }

    for parent in parents {
        let pinfo = match sealed.get(&parent) {
            Some(pinfo) => pinfo,
            None => continue,
        };

        if pinfo.fields.all_blacklisted {
            entry.info.fields = FieldTable::error_table();
            return;
        }

        let mut shadow_errors = Vec::new();
        for pfinfo in pinfo.fields.iter() {
            if table.is_blacklisted(pfinfo.name) {
                continue;
            }
            match table.resolve(pfinfo.name) {
                None => table.insert(pfinfo.clone()),
                // Shadowing keeps the child's field, but only at the
                // same declared type.
                Some(finfo) if finfo.owner == tid && finfo.tid != pfinfo.tid => {
                    shadow_errors.push((finfo.pos, pfinfo.pos, pfinfo.name));
                }
                Some(_) => {}
            }
        }
        for (child_pos, parent_pos, name) in shadow_errors {
            errors.append(Error::all(
                vec![child_pos, parent_pos],
                ErrorKind::OverrideFieldType,
            ));
            table.blacklist(name);
        }

        for name in pinfo.fields.blacklisted() {
            table.blacklist(name);
        }
    }

    entry.info.fields = table;
}
