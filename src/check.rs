mod checker;
mod decl;
mod flow;
mod fold;
mod info;
mod symbol_table;
mod table;
mod type_set;

use std::fmt;

pub use checker::check_unit;
pub use decl::assign_member_ids;
pub use decl::resolve_decls;
pub use flow::analyze;
pub use fold::ConstStringMap;
pub use info::FieldInfo;
pub use info::FieldTable;
pub use info::MethodInfo;
pub use info::MethodSignature;
pub use info::MethodTable;
pub use info::TypeInfo;
pub use info::TypeInfoMap;
pub use symbol_table::SymbolTable;
pub use table::TypeInfoMapBuilder;
pub use type_set::ScopedTypeSet;
pub use type_set::TypeSet;
pub use type_set::TypeSetBuilder;

use crate::data::ast;
use crate::data::span::Span;
use crate::error;
use crate::error::Report;
use crate::ErrorList;

/// Runs the whole middle end over a parsed, weeded program: the global
/// type set, declaration resolution, inheritance tables, and the type
/// checker with folding and flow analysis.
///
/// On success the program's expressions all carry valid type ids and
/// every member declaration carries its assigned field or method id.
pub fn check(
    program: &mut ast::Program,
    errors: &mut ErrorList,
) -> Option<(TypeSet, TypeInfoMap, ConstStringMap)> {
    let type_set = TypeSetBuilder::from_program(program).build(errors);
    if errors.is_fatal() {
        return None;
    }

    let raw = resolve_decls(program, &type_set, errors);
    if errors.is_fatal() {
        return None;
    }

    let tinfo_map = TypeInfoMapBuilder::new(raw).build(&type_set, errors);
    if errors.is_fatal() {
        return None;
    }
    log::debug!("sealed {} types", tinfo_map.len());

    decl::assign_member_ids(program, &type_set, &tinfo_map);

    let mut strings = ConstStringMap::default();
    for unit in &mut program.units {
        check_unit(unit, &type_set, &tinfo_map, &mut strings, errors);
    }
    if errors.is_fatal() {
        return None;
    }

    for unit in &program.units {
        flow::analyze(unit, errors);
    }
    if errors.is_fatal() {
        return None;
    }

    Some((type_set, tinfo_map, strings))
}

#[derive(Clone, Debug)]
pub struct Error {
    pub spans: Vec<Span>,
    pub kind: ErrorKind,
}

impl Error {
    pub fn new(span: Span, kind: ErrorKind) -> Self {
        Error {
            spans: vec![span],
            kind,
        }
    }

    pub fn all(spans: Vec<Span>, kind: ErrorKind) -> Self {
        debug_assert!(!spans.is_empty());
        Error { spans, kind }
    }

    fn span(&self) -> Span {
        self.spans[0]
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    // Type set
    TypeDuplicateDefinition,
    TypeShadowsPackagePrefix,
    UnknownImport,
    AmbiguousType,
    DuplicateCompUnitNames,
    UnknownType,

    // Inheritance
    ExtendInterface,
    ExtendFinal,
    ImplementClass,
    InterfaceExtendsClass,
    OverrideFieldType,
    InheritanceCycle,
    DuplicateDefinition,
    ConstructorName,
    OverrideReturnType,
    OverrideAccess,
    OverrideFinal,
    OverrideStatic,
    AbstractMethodNotImplemented,
    NeedAbstractClass,
    ParentNoDefaultConstructor,

    // Type check
    TypeMismatch,
    IndexNonArray,
    UndefinedReference,
    DuplicateVarDecl,
    VariableInitializerSelfReference,
    AmbiguousMethod,
    NoMatchingMethod,
    NoMatchingConstructor,
    IllegalCast,
    InvalidInstanceOf,
    NewAbstractClass,
    NewInterface,
    StaticMemberFromInstance,
    InstanceMemberFromStatic,
    ProtectedAccess,
    ThisInStaticContext,
    CallOnNonReference,
    FieldOnNonReference,
    Unreachable,
    MissingReturn,
    NotDefinitelyAssigned,
}

impl ErrorKind {
    fn name(&self) -> &'static str {
        match self {
            ErrorKind::TypeDuplicateDefinition => "TypeDuplicateDefinition",
            ErrorKind::TypeShadowsPackagePrefix => "TypeShadowsPackagePrefix",
            ErrorKind::UnknownImport => "UnknownImport",
            ErrorKind::AmbiguousType => "AmbiguousType",
            ErrorKind::DuplicateCompUnitNames => "DuplicateCompUnitNames",
            ErrorKind::UnknownType => "UnknownType",
            ErrorKind::ExtendInterface => "ExtendInterface",
            ErrorKind::ExtendFinal => "ExtendFinal",
            ErrorKind::ImplementClass => "ImplementClass",
            ErrorKind::InterfaceExtendsClass => "InterfaceExtendsClass",
            ErrorKind::OverrideFieldType => "OverrideFieldType",
            ErrorKind::InheritanceCycle => "InheritanceCycle",
            ErrorKind::DuplicateDefinition => "DuplicateDefinition",
            ErrorKind::ConstructorName => "ConstructorName",
            ErrorKind::OverrideReturnType => "OverrideReturnType",
            ErrorKind::OverrideAccess => "OverrideAccess",
            ErrorKind::OverrideFinal => "OverrideFinal",
            ErrorKind::OverrideStatic => "OverrideStatic",
            ErrorKind::AbstractMethodNotImplemented => "AbstractMethodNotImplemented",
            ErrorKind::NeedAbstractClass => "NeedAbstractClass",
            ErrorKind::ParentNoDefaultConstructor => "ParentNoDefaultConstructor",
            ErrorKind::TypeMismatch => "TypeMismatch",
            ErrorKind::IndexNonArray => "IndexNonArray",
            ErrorKind::UndefinedReference => "UndefinedReference",
            ErrorKind::DuplicateVarDecl => "DuplicateVarDecl",
            ErrorKind::VariableInitializerSelfReference => "VariableInitializerSelfReference",
            ErrorKind::AmbiguousMethod => "AmbiguousMethod",
            ErrorKind::NoMatchingMethod => "NoMatchingMethod",
            ErrorKind::NoMatchingConstructor => "NoMatchingConstructor",
            ErrorKind::IllegalCast => "IllegalCast",
            ErrorKind::InvalidInstanceOf => "InvalidInstanceOf",
            ErrorKind::NewAbstractClass => "NewAbstractClass",
            ErrorKind::NewInterface => "NewInterface",
            ErrorKind::StaticMemberFromInstance => "StaticMemberFromInstance",
            ErrorKind::InstanceMemberFromStatic => "InstanceMemberFromStatic",
            ErrorKind::ProtectedAccess => "ProtectedAccess",
            ErrorKind::ThisInStaticContext => "ThisInStaticContext",
            ErrorKind::CallOnNonReference => "CallOnNonReference",
            ErrorKind::FieldOnNonReference => "FieldOnNonReference",
            ErrorKind::Unreachable => "Unreachable",
            ErrorKind::MissingReturn => "MissingReturn",
            ErrorKind::NotDefinitelyAssigned => "NotDefinitelyAssigned",
        }
    }

    fn message(&self) -> &'static str {
        match self {
            ErrorKind::TypeDuplicateDefinition => "Type was declared multiple times",
            ErrorKind::TypeShadowsPackagePrefix => "Type name shadows a package",
            ErrorKind::UnknownImport => "Import does not name a known type",
            ErrorKind::AmbiguousType => "Type name is ambiguous between wildcard imports",
            ErrorKind::DuplicateCompUnitNames => "Name is already bound in this compilation unit",
            ErrorKind::UnknownType => "Unknown type",
            ErrorKind::ExtendInterface => "A class may not extend an interface",
            ErrorKind::ExtendFinal => "A class may not extend a final class",
            ErrorKind::ImplementClass => "A class may not implement a class",
            ErrorKind::InterfaceExtendsClass => "An interface may not extend a class",
            ErrorKind::OverrideFieldType => {
                "Cannot shadow an inherited field with a different type"
            }
            ErrorKind::InheritanceCycle => "Inheritance hierarchy forms a cycle",
            ErrorKind::DuplicateDefinition => "Member was declared multiple times",
            ErrorKind::ConstructorName => "Constructors must have the same name as their class",
            ErrorKind::OverrideReturnType => "Cannot override a method with a different return type",
            ErrorKind::OverrideAccess => "Cannot lower the visibility of an inherited method",
            ErrorKind::OverrideFinal => "Cannot override a final method",
            ErrorKind::OverrideStatic => "Cannot mix static and instance methods in an override",
            ErrorKind::AbstractMethodNotImplemented => {
                "A concrete class must implement every inherited abstract method"
            }
            ErrorKind::NeedAbstractClass => "A class with abstract methods must be abstract",
            ErrorKind::ParentNoDefaultConstructor => {
                "An inherited class must have a zero-argument constructor"
            }
            ErrorKind::TypeMismatch => "Type mismatch",
            ErrorKind::IndexNonArray => "Only arrays can be indexed",
            ErrorKind::UndefinedReference => "Undefined reference",
            ErrorKind::DuplicateVarDecl => "Variable was declared multiple times",
            ErrorKind::VariableInitializerSelfReference => {
                "Variable initializer refers to the variable being declared"
            }
            ErrorKind::AmbiguousMethod => "Method call is ambiguous",
            ErrorKind::NoMatchingMethod => "No method matches these arguments",
            ErrorKind::NoMatchingConstructor => "No constructor matches these arguments",
            ErrorKind::IllegalCast => "Cast between unrelated types",
            ErrorKind::InvalidInstanceOf => "Left side of instanceof must be a reference",
            ErrorKind::NewAbstractClass => "Cannot instantiate an abstract class",
            ErrorKind::NewInterface => "Cannot instantiate an interface",
            ErrorKind::StaticMemberFromInstance => {
                "Static member accessed through an instance"
            }
            ErrorKind::InstanceMemberFromStatic => {
                "Instance member accessed without an instance"
            }
            ErrorKind::ProtectedAccess => "Protected member is not accessible here",
            ErrorKind::ThisInStaticContext => "'this' cannot appear in a static context",
            ErrorKind::CallOnNonReference => "Methods can only be called on reference types",
            ErrorKind::FieldOnNonReference => "Fields can only be accessed on reference types",
            ErrorKind::Unreachable => "Unreachable statement",
            ErrorKind::MissingReturn => "Missing return statement",
            ErrorKind::NotDefinitelyAssigned => "Variable may not have been assigned",
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        match self.spans.as_slice() {
            [span] => error::simple(fmt, self.kind.name(), *span),
            spans => error::simple_all(fmt, self.kind.name(), spans),
        }
    }
}

impl Report for Error {
    fn report(&self) -> ariadne::ReportBuilder<Span> {
        use ariadne::Span as _;
        let span = self.span();
        let mut report =
            ariadne::Report::build(ariadne::ReportKind::Error, *span.source(), span.start())
                .with_message(self.kind.message())
                .with_label(ariadne::Label::new(span).with_message(self.kind.message()));
        for other in self.spans.iter().skip(1) {
            report = report
                .with_label(ariadne::Label::new(*other).with_message("Related declaration here"));
        }
        report
    }
}
