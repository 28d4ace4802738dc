mod lexer;

use std::fmt;

pub use lexer::Lexer;

use crate::data::span::FileId;
use crate::data::span::Span;
use crate::data::token::Token;
use crate::error;
use crate::error::Report;
use crate::ErrorList;

/// Lexes one source file into a token stream with position ranges.
/// Skippable tokens (whitespace, comments) are filtered out. Lexing
/// continues past errors so that every lexical error in the file is
/// reported.
pub fn lex(file: FileId, source: &str, errors: &mut ErrorList) -> Vec<(Token, Span)> {
    let mut tokens = Vec::new();
    for spanned in Lexer::new(file, source) {
        match spanned {
            Ok(token) => tokens.push(token),
            Err(error) => errors.append(error),
        }
    }
    tokens
}

#[derive(Clone, Debug)]
pub struct Error {
    pub span: Span,
    pub kind: ErrorKind,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    UnexpectedChar,
    UnclosedStringLit,
    UnclosedCharLit,
    UnclosedBlockComment,
    InvalidEscape,
    IntegerOutOfRange,
}

impl ErrorKind {
    fn name(&self) -> &'static str {
        match self {
            ErrorKind::UnexpectedChar => "UnexpectedChar",
            ErrorKind::UnclosedStringLit => "UnclosedStringLit",
            ErrorKind::UnclosedCharLit => "UnclosedCharLit",
            ErrorKind::UnclosedBlockComment => "UnclosedBlockComment",
            ErrorKind::InvalidEscape => "InvalidEscape",
            ErrorKind::IntegerOutOfRange => "IntegerOutOfRange",
        }
    }

    fn message(&self) -> &'static str {
        match self {
            ErrorKind::UnexpectedChar => "Unexpected character",
            ErrorKind::UnclosedStringLit => "String literal is missing a closing quote",
            ErrorKind::UnclosedCharLit => "Character literal is missing a closing quote",
            ErrorKind::UnclosedBlockComment => "Block comment is missing a closing delimiter",
            ErrorKind::InvalidEscape => "Invalid escape sequence",
            ErrorKind::IntegerOutOfRange => "Integer literal does not fit in 32 bits",
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
