use crate::check::Error;
use crate::check::ErrorKind;
use crate::data::ast;
use crate::data::ids::TypeId;
use crate::data::span::FileId;
use crate::data::span::Span;
use crate::data::symbol::Symbol;
use crate::ErrorList;
use crate::Map;
use crate::Set;

/// One declared type in the global directory.
#[derive(Clone, Debug)]
struct Entry {
    simple: Symbol,
    package: String,
    qualified: String,
    pos: Span,
    tid: TypeId,
}

/// Global directory of fully-qualified type names. Built once per
/// compilation; per-unit lookups go through [`ScopedTypeSet`] views
/// that honour the unit's package and imports.
#[derive(Clone, Debug, Default)]
pub struct TypeSet {
    /// Qualified name -> entry, sorted by name.
    qualified: Map<String, Entry>,
    /// Package name -> members, for wildcard imports and package scope.
    packages: Map<String, Vec<(Symbol, TypeId)>>,
}

impl TypeSet {
    /// Whole-name lookup. Primitive names and `void` resolve here too.
    pub fn get(&self, name: &str) -> Option<TypeId> {
        match name {
            "boolean" => Some(TypeId::BOOL),
            "byte" => Some(TypeId::BYTE),
            "char" => Some(TypeId::CHAR),
            "short" => Some(TypeId::SHORT),
            "int" => Some(TypeId::INT),
            "void" => Some(TypeId::VOID),
            "error" => Some(TypeId::ERROR),
            name => self.qualified.get(name).map(|entry| entry.tid),
        }
    }

    pub fn qualified_name(&self, tid: TypeId) -> Option<&str> {
        self.qualified
            .values()
            .find(|entry| entry.tid.base == tid.base)
            .map(|entry| entry.qualified.as_str())
    }

    fn package_member(&self, package: &str, simple: Symbol) -> Option<TypeId> {
        self.packages
            .get(package)?
            .iter()
            .find(|(name, _)| *name == simple)
            .map(|(_, tid)| tid)
            .copied()
    }

    /// A scoped view for lookups inside `unit`, honouring the unit's
    /// package, single-type imports, and wildcard imports.
    pub fn view(&self, unit: &ast::CompUnit, errors: &mut ErrorList) -> ScopedTypeSet {
        let package = unit.package_name();
        let mut unit_scope: Map<Symbol, (TypeId, Span)> = Map::default();
        let mut wildcards: Vec<String> = Vec::new();

        // Names declared by the unit itself bind tightest.
        for decl in &unit.decls {
            let qualified = qualify(&package, decl.name.symbol);
            if let Some(entry) = self.qualified.get(&qualified) {
                unit_scope.insert(decl.name.symbol, (entry.tid, decl.name.span));
            }
        }

        for import in &unit.imports {
            if import.wildcard {
                let name = import.name.qualified();
                if !wildcards.contains(&name) {
                    wildcards.push(name);
                }
                continue;
            }

            let qualified = import.name.qualified();
            let simple = import.name.simple();
            match self.qualified.get(&qualified) {
                None => {
                    errors.append(Error::new(import.span, ErrorKind::UnknownImport));
                }
                Some(entry) => match unit_scope.get(&simple) {
                    // Importing a name already bound to the same type
                    // is a no-op, not a collision.
                    Some((tid, _)) if *tid == entry.tid => {}
                    Some((_, prev)) => {
                        errors.append(Error::all(
                            vec![import.span, *prev],
                            ErrorKind::DuplicateCompUnitNames,
                        ));
                    }
                    None => {
                        unit_scope.insert(simple, (entry.tid, import.span));
                    }
                },
            }
        }

        ScopedTypeSet {
            set: self,
            package,
            unit_scope,
            wildcards,
        }
    }
}

fn qualify(package: &str, simple: Symbol) -> String {
    if package.is_empty() {
        simple.as_str().to_string()
    } else {
        format!("{}.{}", package, simple)
    }
}

/// A per-compilation-unit view of the [`TypeSet`]. Simple names
/// resolve through, in order: the unit scope (own declarations and
/// single-type imports), the unit's package, explicit wildcard
/// imports, and finally the implicit `java.lang.*`.
pub struct ScopedTypeSet<'set> {
    set: &'set TypeSet,
    package: String,
    unit_scope: Map<Symbol, (TypeId, Span)>,
    wildcards: Vec<String>,
}

impl<'set> ScopedTypeSet<'set> {
    /// Resolve a type name, reporting `UnknownType` or `AmbiguousType`
    /// on failure.
    pub fn get(&self, name: &str, pos: Span, errors: &mut ErrorList) -> TypeId {
        match self.lookup(name) {
            Ok(Some(tid)) => tid,
            Ok(None) => {
                errors.append(Error::new(pos, ErrorKind::UnknownType));
                TypeId::ERROR
            }
            Err(()) => {
                errors.append(Error::new(pos, ErrorKind::AmbiguousType));
                TypeId::ERROR
            }
        }
    }

    /// Non-reporting variant of [`Self::get`].
    pub fn try_get(&self, name: &str) -> Option<TypeId> {
        self.lookup(name).ok().flatten()
    }

    /// Resolves the shortest prefix of `parts` that names a type,
    /// returning the type and the number of consumed segments. Used
    /// for field-access chains such as `pkg.Type.staticField.length`.
    pub fn get_prefix(&self, parts: &[Symbol]) -> Option<(TypeId, usize)> {
        let mut name = String::new();
        for (index, part) in parts.iter().enumerate() {
            if index > 0 {
                name.push('.');
            }
            name.push_str(part.as_str());
            if let Some(tid) = self.try_get(&name) {
                return Some((tid, index + 1));
            }
        }
        None
    }

    /// `Ok(None)` for unknown, `Err(())` for wildcard ambiguity.
    fn lookup(&self, name: &str) -> Result<Option<TypeId>, ()> {
        if name.contains('.') {
            return Ok(self.set.get(name));
        }
        if let Some(tid) = self.set.get(name).filter(|tid| tid.is_primitive() || tid.is_void()) {
            return Ok(Some(tid));
        }

        let simple = crate::data::symbol::intern(name);

        if let Some((tid, _)) = self.unit_scope.get(&simple) {
            return Ok(Some(*tid));
        }

        if let Some(tid) = self.set.package_member(&self.package, simple) {
            return Ok(Some(tid));
        }

        // Ambiguity between two distinct wildcard imports surfaces
        // only at lookup time.
        let mut found: Option<TypeId> = None;
        for package in &self.wildcards {
            if let Some(tid) = self.set.package_member(package, simple) {
                match found {
                    Some(prev) if prev != tid => return Err(()),
                    _ => found = Some(tid),
                }
            }
        }
        if let Some(tid) = found {
            return Ok(Some(tid));
        }

        Ok(self.set.package_member("java.lang", simple))
    }
}

/// Builds the global type directory from every declaration in the
/// program.
#[derive(Debug, Default)]
pub struct TypeSetBuilder {
    decls: Vec<(String, Symbol, Span, FileId)>,
}

impl TypeSetBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_program(program: &ast::Program) -> Self {
        let mut builder = Self::new();
        for unit in &program.units {
            let package = unit.package_name();
            for decl in &unit.decls {
                builder.add(&package, decl.name.symbol, decl.name.span, unit.file);
            }
        }
        builder
    }

    pub fn add(&mut self, package: &str, simple: Symbol, pos: Span, file: FileId) {
        self.decls
            .push((package.to_string(), simple, pos, file));
    }

    pub fn build(self, errors: &mut ErrorList) -> TypeSet {
        let mut entries: Vec<Entry> = self
            .decls
            .into_iter()
            .map(|(package, simple, pos, _)| Entry {
                simple,
                qualified: qualify(&package, simple),
                package,
                pos,
                tid: TypeId::UNASSIGNED,
            })
            .collect();

        entries.sort_by(|lhs, rhs| {
            (&lhs.qualified, lhs.pos).cmp(&(&rhs.qualified, rhs.pos))
        });

        // Duplicate fully-qualified names: one error naming every
        // declaration site.
        let mut deduped: Vec<Entry> = Vec::with_capacity(entries.len());
        let mut index = 0;
        while index < entries.len() {
            let mut end = index + 1;
            while end < entries.len() && entries[end].qualified == entries[index].qualified {
                end += 1;
            }
            if end - index > 1 {
                errors.append(Error::all(
                    entries[index..end].iter().map(|entry| entry.pos).collect(),
                    ErrorKind::TypeDuplicateDefinition,
                ));
            } else {
                deduped.push(entries[index].clone());
            }
            index = end;
        }

        // A type whose name is a proper prefix of another type's name
        // would shadow that subpackage.
        let names: Set<String> = deduped
            .iter()
            .map(|entry| entry.qualified.clone())
            .collect();
        for entry in &deduped {
            let prefix = format!("{}.", entry.qualified);
            if names.iter().any(|name| name.starts_with(&prefix)) {
                errors.append(Error::new(entry.pos, ErrorKind::TypeShadowsPackagePrefix));
            }
        }

        // Bases are dense from FIRST_REF_BASE in name order, which
        // makes every downstream id assignment deterministic.
        let mut qualified = Map::default();
        let mut packages: Map<String, Vec<(Symbol, TypeId)>> = Map::default();
        for (index, mut entry) in deduped.into_iter().enumerate() {
            entry.tid = TypeId::base(TypeId::FIRST_REF_BASE + index as u64);
            packages
                .entry(entry.package.clone())
                .or_default()
                .push((entry.simple, entry.tid));
            qualified.insert(entry.qualified.clone(), entry);
        }

        TypeSet {
            qualified,
            packages,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::span::Point;
    use crate::data::symbol;

    fn span(file: FileId, lo: u32) -> Span {
        Span {
            file,
            lo: Point {
                index: lo,
                row: 1,
                col: lo + 1,
            },
            hi: Point {
                index: lo + 3,
                row: 1,
                col: lo + 4,
            },
        }
    }

    #[test]
    fn duplicate_definition() {
        let mut builder = TypeSetBuilder::new();
        builder.add("foo", symbol::intern("Foo"), span(0, 26), 0);
        builder.add("foo", symbol::intern("Foo"), span(1, 26), 1);
        let mut errors = ErrorList::new();
        builder.build(&mut errors);
        assert_eq!(errors.len(), 1);
        assert_eq!(
            errors.errors()[0].to_string(),
            "TypeDuplicateDefinition: [0:26-29,1:26-29,]",
        );
    }

    #[test]
    fn type_shadows_package_prefix() {
        let mut builder = TypeSetBuilder::new();
        builder.add("foo", symbol::intern("Bar"), span(0, 0), 0);
        builder.add("foo.Bar", symbol::intern("Baz"), span(1, 0), 1);
        let mut errors = ErrorList::new();
        builder.build(&mut errors);
        assert_eq!(errors.len(), 1);
        assert!(errors.errors()[0]
            .to_string()
            .starts_with("TypeShadowsPackagePrefix"));
    }

    #[test]
    fn deterministic_bases() {
        let build = || {
            let mut builder = TypeSetBuilder::new();
            builder.add("b", symbol::intern("B"), span(0, 0), 0);
            builder.add("a", symbol::intern("A"), span(1, 0), 1);
            let mut errors = ErrorList::new();
            builder.build(&mut errors)
        };
        let first = build();
        let second = build();
        assert_eq!(first.get("a.A"), second.get("a.A"));
        assert_eq!(first.get("a.A"), Some(TypeId::base(TypeId::FIRST_REF_BASE)));
        assert_eq!(
            first.get("b.B"),
            Some(TypeId::base(TypeId::FIRST_REF_BASE + 1))
        );
    }

    #[test]
    fn primitives_preinserted() {
        let set = TypeSetBuilder::new().build(&mut ErrorList::new());
        assert_eq!(set.get("int"), Some(TypeId::INT));
        assert_eq!(set.get("boolean"), Some(TypeId::BOOL));
        assert_eq!(set.get("void"), Some(TypeId::VOID));
    }
}
