use crate::check::info::FieldInfo;
use crate::check::info::MethodInfo;
use crate::check::info::MethodSignature;
use crate::check::info::MethodTable;
use crate::check::info::FieldTable;
use crate::check::info::TypeInfo;
use crate::check::info::TypeInfoMap;
use crate::check::type_set::ScopedTypeSet;
use crate::check::type_set::TypeSet;
use crate::data::ast;
use crate::data::ids::FieldId;
use crate::data::ids::MethodId;
use crate::data::ids::TypeId;
use crate::data::ids::TypeKind;
use crate::ErrorList;

/// A type declaration after name resolution: the raw `TypeInfo`
/// plus its member entries, before any table merging.
#[derive(Clone, Debug)]
pub struct RawType {
    pub info: TypeInfo,
    pub fields: Vec<FieldInfo>,
    pub methods: Vec<MethodInfo>,
}

/// Resolves a syntactic type reference against a unit's scope.
pub(super) fn resolve_type(
    scoped: &ScopedTypeSet,
    ty: &ast::Type,
    errors: &mut ErrorList,
) -> TypeId {
    match ty {
        ast::Type::Primitive(tid, _) => *tid,
        ast::Type::Void(_) => TypeId::VOID,
        ast::Type::Reference(name) => scoped.get(&name.qualified(), name.span, errors),
        ast::Type::Array(inner, _) => resolve_type(scoped, inner, errors).array(),
    }
}

/// Walks every type declaration, resolving supertype references and
/// member types into raw `TypeInfo` entries. Overriding rules and
/// transitive tables are left to the table builder.
pub fn resolve_decls(
    program: &mut ast::Program,
    set: &TypeSet,
    errors: &mut ErrorList,
) -> Vec<RawType> {
    let object = set.get("java.lang.Object");
    let mut raw = Vec::new();

    for unit in &mut program.units {
        let scoped = set.view(unit, errors);
        let package = unit.package_name();

        for decl in &mut unit.decls {
            let qualified = if package.is_empty() {
                decl.name.symbol.as_str().to_string()
            } else {
                format!("{}.{}", package, decl.name.symbol)
            };

            // Duplicate declarations were dropped from the set; their
            // bodies are skipped entirely.
            let tid = match set.get(&qualified) {
                Some(tid) => tid,
                None => continue,
            };

            let mut extends = Vec::new();
            for name in &decl.extends {
                let parent = scoped.get(&name.qualified(), name.span, errors);
                if parent.is_valid() {
                    extends.push(parent);
                }
            }

            // Every class other than java.lang.Object itself extends
            // Object when no superclass is named.
            if decl.kind == TypeKind::Class && extends.is_empty() {
                if let Some(object) = object.filter(|object| *object != tid) {
                    extends.push(object);
                }
            }

            let mut implements = Vec::new();
            for name in &decl.implements {
                let parent = scoped.get(&name.qualified(), name.span, errors);
                if parent.is_valid() {
                    implements.push(parent);
                }
            }

            let mut fields = Vec::new();
            let mut methods = Vec::new();

            for member in &mut decl.members {
                match member {
                    ast::Member::Field(field) => {
                        field.tid = resolve_type(&scoped, &field.ty, errors);
                        fields.push(FieldInfo {
                            fid: FieldId::ERROR,
                            owner: tid,
                            mods: field.mods.clone(),
                            tid: field.tid,
                            pos: field.name.span,
                            name: field.name.symbol,
                        });
                    }
                    ast::Member::Method(method) => {
                        method.ret_tid = match &method.ret {
                            Some(ty) => resolve_type(&scoped, ty, errors),
                            None => TypeId::VOID,
                        };
                        let mut params = Vec::new();
                        for param in &mut method.params {
                            param.tid = resolve_type(&scoped, &param.ty, errors);
                            params.push(param.tid);
                        }
                        methods.push(MethodInfo {
                            mid: MethodId::ERROR,
                            owner: tid,
                            mods: method.mods.clone(),
                            ret: method.ret_tid,
                            pos: method.name.span,
                            signature: MethodSignature {
                                is_constructor: method.is_constructor(),
                                name: method.name.symbol,
                                params,
                            },
                            overrides: None,
                            interface_mids: Vec::new(),
                        });
                    }
                }
            }

            raw.push(RawType {
                info: TypeInfo {
                    tid,
                    kind: decl.kind,
                    mods: decl.mods.clone(),
                    name: decl.name.symbol,
                    package: package.clone(),
                    qualified,
                    pos: decl.name.span,
                    file: unit.file,
                    extends,
                    implements,
                    fields: FieldTable::default(),
                    methods: MethodTable::default(),
                    top_sort_index: 0,
                },
                fields,
                methods,
            });
        }
    }

    raw
}

/// Backfills the ids the table builder assigned into the AST member
/// declarations, so later phases can go from a declaration to its
/// table entry directly.
pub fn assign_member_ids(program: &mut ast::Program, set: &TypeSet, tinfo_map: &TypeInfoMap) {
    for unit in &mut program.units {
        let package = unit.package_name();
        for decl in &mut unit.decls {
            let qualified = if package.is_empty() {
                decl.name.symbol.as_str().to_string()
            } else {
                format!("{}.{}", package, decl.name.symbol)
            };
            let info = match set.get(&qualified).and_then(|tid| tinfo_map.get(tid)) {
                Some(info) => info,
                None => continue,
            };

            for member in &mut decl.members {
                match member {
                    ast::Member::Field(field) => {
                        if let Some(entry) = info
                            .fields
                            .resolve(field.name.symbol)
                            .filter(|entry| entry.owner == info.tid)
                        {
                            field.fid = entry.fid;
                        }
                    }
                    ast::Member::Method(method) => {
                        let signature = MethodSignature {
                            is_constructor: method.is_constructor(),
                            name: method.name.symbol,
                            params: method.params.iter().map(|param| param.tid).collect(),
                        };
                        if let Some(entry) = info
                            .methods
                            .resolve(&signature)
                            .filter(|entry| entry.owner == info.tid)
                        {
                            method.mid = entry.mid;
                        }
                    }
                }
            }
        }
    }
}
