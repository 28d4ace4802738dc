mod parser;

use std::fmt;

pub use parser::Parser;

use crate::data::ast;
use crate::data::span::FileId;
use crate::data::span::Span;
use crate::data::token::Token;
use crate::error;
use crate::error::Report;
use crate::ErrorList;

/// Parses one token stream into a compilation unit. A syntax error
/// aborts the unit; recovery is per-file, not per-declaration.
pub fn parse(
    file: FileId,
    tokens: &[(Token, Span)],
    errors: &mut ErrorList,
) -> Option<ast::CompUnit> {
    match Parser::new(file, tokens).comp_unit() {
        Ok(unit) => Some(unit),
        Err(error) => {
            errors.append(error);
            None
        }
    }
}

#[derive(Clone, Debug)]
pub struct Error {
    pub span: Span,
    pub kind: ErrorKind,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    UnexpectedToken(Option<Token>),
    IntegerOutOfRange,
}

impl ErrorKind {
    fn name(&self) -> &'static str {
        match self {
            ErrorKind::UnexpectedToken(_) => "UnexpectedToken",
            ErrorKind::IntegerOutOfRange => "IntegerOutOfRange",
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
        let message = match &self.kind {
            ErrorKind::UnexpectedToken(Some(token)) => format!("Unexpected token '{}'", token),
            ErrorKind::UnexpectedToken(None) => "Unexpected end of file".to_string(),
            ErrorKind::IntegerOutOfRange => {
                "Integer literal does not fit in 32 bits".to_string()
            }
        };
        ariadne::Report::build(
            ariadne::ReportKind::Error,
            *self.span.source(),
            self.span.start(),
        )
        .with_message(&message)
        .with_label(ariadne::Label::new(self.span).with_message(message))
    }
}
