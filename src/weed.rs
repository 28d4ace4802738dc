mod weeder;

use std::fmt;

pub use weeder::weed_unit;

use crate::data::ast;
use crate::data::span::Span;
use crate::error;
use crate::error::Report;
use crate::ErrorList;

/// Runs every post-parse syntactic check over the program. The weeder
/// accumulates; it never stops at the first finding.
pub fn weed(program: &ast::Program, errors: &mut ErrorList) {
    for unit in &program.units {
        weed_unit(unit, errors);
    }
}

#[derive(Clone, Debug)]
pub struct Error {
    pub span: Span,
    pub kind: ErrorKind,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidLHS,
    InvalidVoidType,
    InvalidInstanceOfType,
    AbstractFinalClass,
    ConflictingAccessMod,
    MissingAccessMod,
    ClassMethodEmpty,
    ClassMethodNotEmpty,
    ClassMethodStaticFinal,
    ClassMethodNativeNotStatic,
    ClassMethodAbstractStatic,
    ClassMethodAbstractFinal,
    InterfaceMethodImpl,
    InterfaceMethodModifier,
    InterfaceFieldDecl,
    InterfaceConstructor,
    FieldFinal,
}

impl ErrorKind {
    fn name(&self) -> &'static str {
        match self {
            ErrorKind::InvalidLHS => "InvalidLHS",
            ErrorKind::InvalidVoidType => "InvalidVoidType",
            ErrorKind::InvalidInstanceOfType => "InvalidInstanceOfType",
            ErrorKind::AbstractFinalClass => "AbstractFinalClass",
            ErrorKind::ConflictingAccessMod => "ConflictingAccessMod",
            ErrorKind::MissingAccessMod => "MissingAccessMod",
            ErrorKind::ClassMethodEmpty => "ClassMethodEmpty",
            ErrorKind::ClassMethodNotEmpty => "ClassMethodNotEmpty",
            ErrorKind::ClassMethodStaticFinal => "ClassMethodStaticFinal",
            ErrorKind::ClassMethodNativeNotStatic => "ClassMethodNativeNotStatic",
            ErrorKind::ClassMethodAbstractStatic => "ClassMethodAbstractStatic",
            ErrorKind::ClassMethodAbstractFinal => "ClassMethodAbstractFinal",
            ErrorKind::InterfaceMethodImpl => "InterfaceMethodImpl",
            ErrorKind::InterfaceMethodModifier => "InterfaceMethodModifier",
            ErrorKind::InterfaceFieldDecl => "InterfaceFieldDecl",
            ErrorKind::InterfaceConstructor => "InterfaceConstructor",
            ErrorKind::FieldFinal => "FieldFinal",
        }
    }

    fn message(&self) -> &'static str {
        match self {
            ErrorKind::InvalidLHS => "Left side of assignment must be a variable, field, or array element",
            ErrorKind::InvalidVoidType => "'void' can only be used as a method return type",
            ErrorKind::InvalidInstanceOfType => "Right side of instanceof must be a reference type",
            ErrorKind::AbstractFinalClass => "A class may not be both abstract and final",
            ErrorKind::ConflictingAccessMod => "A declaration may not be both public and protected",
            ErrorKind::MissingAccessMod => "A declaration must be public or protected",
            ErrorKind::ClassMethodEmpty => "A method must have a body unless it is abstract or native",
            ErrorKind::ClassMethodNotEmpty => "An abstract or native method may not have a body",
            ErrorKind::ClassMethodStaticFinal => "A static method may not be final",
            ErrorKind::ClassMethodNativeNotStatic => "A native method must be static",
            ErrorKind::ClassMethodAbstractStatic => "An abstract method may not be static",
            ErrorKind::ClassMethodAbstractFinal => "An abstract method may not be final",
            ErrorKind::InterfaceMethodImpl => "An interface method may not have a body",
            ErrorKind::InterfaceMethodModifier => "An interface method may not be static, final, or native",
            ErrorKind::InterfaceFieldDecl => "An interface may not declare fields",
            ErrorKind::InterfaceConstructor => "An interface may not declare constructors",
            ErrorKind::FieldFinal => "A field may not be final",
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        error::simple(fmt, self.kind.name(), self.span)
    }
}

impl Report for Error {
    fn report(&self) -> ariadne::ReportBuilder<Span> {
        use ariadne::Span as _;
        ariadne::Report::build(
            ariadne::ReportKind::Error,
            *self.span.source(),
            self.span.start(),
        )
        .with_message(self.kind.message())
        .with_label(ariadne::Label::new(self.span).with_message(self.kind.message()))
    }
}
