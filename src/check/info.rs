use crate::data::ast::Modifiers;
use crate::data::ids::FieldId;
use crate::data::ids::MethodId;
use crate::data::ids::TypeId;
use crate::data::ids::TypeKind;
use crate::data::span::FileId;
use crate::data::span::Span;
use crate::data::symbol::Symbol;
use crate::Map;
use crate::Set;

/// A method's identity for overload and override resolution: name plus
/// ordered parameter types. Return types never participate.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MethodSignature {
    pub is_constructor: bool,
    pub name: Symbol,
    pub params: Vec<TypeId>,
}

#[derive(Clone, Debug)]
pub struct MethodInfo {
    pub mid: MethodId,
    /// Type whose declaration introduced this method.
    pub owner: TypeId,
    pub mods: Modifiers,
    pub ret: TypeId,
    pub pos: Span,
    pub signature: MethodSignature,
    /// Root class declaration this method overrides; vtable slots are
    /// shared through it.
    pub overrides: Option<MethodId>,
    /// Interface declarations this method implements; itable slots
    /// are shared through them.
    pub interface_mids: Vec<MethodId>,
}

#[derive(Clone, Debug)]
pub struct FieldInfo {
    pub fid: FieldId,
    /// Type whose declaration introduced this field.
    pub owner: TypeId,
    pub mods: Modifiers,
    pub tid: TypeId,
    pub pos: Span,
    pub name: Symbol,
}

/// Closed method table for one type: declared methods merged with
/// every inherited method. Names that failed a merge rule are kept in
/// a blacklist so later stages can keep going without cascading
/// diagnostics.
#[derive(Clone, Debug, Default)]
pub struct MethodTable {
    signatures: Map<MethodSignature, MethodId>,
    infos: Map<MethodId, MethodInfo>,
    blacklist: Set<Symbol>,
    pub all_blacklisted: bool,
}

impl MethodTable {
    pub fn error_table() -> Self {
        MethodTable {
            all_blacklisted: true,
            ..Self::default()
        }
    }

    pub fn insert(&mut self, info: MethodInfo) {
        self.signatures.insert(info.signature.clone(), info.mid);
        self.infos.insert(info.mid, info);
    }

    pub fn blacklist(&mut self, name: Symbol) {
        self.blacklist.insert(name);
    }

    pub fn is_blacklisted(&self, name: Symbol) -> bool {
        self.all_blacklisted || self.blacklist.contains(&name)
    }

    pub fn blacklisted(&self) -> impl Iterator<Item = Symbol> + '_ {
        self.blacklist.iter().copied()
    }

    pub fn resolve(&self, signature: &MethodSignature) -> Option<&MethodInfo> {
        self.signatures
            .get(signature)
            .and_then(|mid| self.infos.get(mid))
    }

    pub fn get(&self, mid: MethodId) -> Option<&MethodInfo> {
        self.infos.get(&mid)
    }

    pub fn iter(&self) -> impl Iterator<Item = &MethodInfo> {
        self.infos.values()
    }

    /// Candidates for diagnostics and arity-based resolution.
    pub fn with_name(
        &self,
        name: Symbol,
        is_constructor: bool,
    ) -> impl Iterator<Item = &MethodInfo> {
        self.infos.values().filter(move |info| {
            info.signature.name == name && info.signature.is_constructor == is_constructor
        })
    }

    pub fn len(&self) -> usize {
        self.infos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.infos.is_empty()
    }
}

/// Closed field table for one type: declared fields merged with every
/// inherited non-shadowed field.
#[derive(Clone, Debug, Default)]
pub struct FieldTable {
    names: Map<Symbol, FieldInfo>,
    blacklist: Set<Symbol>,
    pub all_blacklisted: bool,
}

impl FieldTable {
    pub fn error_table() -> Self {
        FieldTable {
            all_blacklisted: true,
            ..Self::default()
        }
    }

    pub fn insert(&mut self, info: FieldInfo) {
        self.names.insert(info.name, info);
    }

    pub fn blacklist(&mut self, name: Symbol) {
        self.blacklist.insert(name);
    }

    pub fn is_blacklisted(&self, name: Symbol) -> bool {
        self.all_blacklisted || self.blacklist.contains(&name)
    }

    pub fn blacklisted(&self) -> impl Iterator<Item = Symbol> + '_ {
        self.blacklist.iter().copied()
    }

    pub fn resolve(&self, name: Symbol) -> Option<&FieldInfo> {
        self.names.get(&name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldInfo> {
        self.names.values()
    }
}

/// Everything the rest of the compiler knows about one declared type.
/// Created raw by the declaration resolver and sealed by the table
/// builder; immutable afterwards.
#[derive(Clone, Debug)]
pub struct TypeInfo {
    pub tid: TypeId,
    pub kind: TypeKind,
    pub mods: Modifiers,
    pub name: Symbol,
    pub package: String,
    pub qualified: String,
    pub pos: Span,
    pub file: FileId,
    pub extends: Vec<TypeId>,
    pub implements: Vec<TypeId>,
    pub fields: FieldTable,
    pub methods: MethodTable,
    /// Position in the topological order of the inheritance graph;
    /// supertypes sort before subtypes.
    pub top_sort_index: usize,
}

impl TypeInfo {
    pub fn parents(&self) -> impl Iterator<Item = TypeId> + '_ {
        self.extends.iter().chain(self.implements.iter()).copied()
    }
}

/// The sealed world of declared types, iterable in topological order.
#[derive(Clone, Debug, Default)]
pub struct TypeInfoMap {
    types: Map<TypeId, TypeInfo>,
}

impl TypeInfoMap {
    pub(super) fn new(types: Map<TypeId, TypeInfo>) -> Self {
        TypeInfoMap { types }
    }

    pub fn get(&self, tid: TypeId) -> Option<&TypeInfo> {
        debug_assert!(tid.ndims == 0);
        self.types.get(&tid)
    }

    pub fn lookup(&self, tid: TypeId) -> &TypeInfo {
        self.get(tid)
            .unwrap_or_else(|| panic!("unbound type {}", tid))
    }

    /// Types in topological order: every supertype before its subtypes.
    pub fn iter(&self) -> impl Iterator<Item = &TypeInfo> {
        self.types.values()
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Reflexive-transitive supertype check over extends+implements.
    /// Array types are ancestors only through their element relation
    /// plus `java.lang.Object`.
    pub fn is_ancestor(&self, sub: TypeId, sup: TypeId) -> bool {
        if sub == sup {
            return true;
        }
        if sub.ndims > 0 || sup.ndims > 0 {
            return false;
        }
        let info = match self.get(sub) {
            Some(info) => info,
            None => return false,
        };
        info.parents().any(|parent| self.is_ancestor(parent, sup))
    }

    pub fn qualified_name(&self, tid: TypeId) -> String {
        let mut name = match tid.base {
            TypeId::BOOL_BASE => "boolean".to_string(),
            TypeId::BYTE_BASE => "byte".to_string(),
            TypeId::CHAR_BASE => "char".to_string(),
            TypeId::SHORT_BASE => "short".to_string(),
            TypeId::INT_BASE => "int".to_string(),
            TypeId::VOID_BASE => "void".to_string(),
            TypeId::NULL_BASE => "null".to_string(),
            _ => self
                .get(TypeId::base(tid.base))
                .map(|info| info.qualified.clone())
                .unwrap_or_else(|| format!("t{}", tid.base)),
        };
        for _ in 0..tid.ndims {
            name.push_str("[]");
        }
        name
    }
}
