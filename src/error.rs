use std::fmt;
use std::io::Write;

use crate::check;
use crate::data::span::FileCache;
use crate::data::span::Span;
use crate::lex;
use crate::parse;
use crate::weed;

/// Rich diagnostic rendering. Every phase error can build an
/// [`ariadne`] report with labeled spans; the simple form used by
/// tests goes through [`fmt::Display`] instead.
pub trait Report {
    fn report(&self) -> ariadne::ReportBuilder<Span>;
}

#[derive(Debug)]
pub enum Error {
    Io(std::io::Error),
    Lexical(lex::Error),
    Syntactic(parse::Error),
    Weed(weed::Error),
    Semantic(check::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Io(error) => write!(fmt, "{}", error),
            Error::Lexical(error) => write!(fmt, "{}", error),
            Error::Syntactic(error) => write!(fmt, "{}", error),
            Error::Weed(error) => write!(fmt, "{}", error),
            Error::Semantic(error) => write!(fmt, "{}", error),
        }
    }
}

impl Report for Error {
    fn report(&self) -> ariadne::ReportBuilder<Span> {
        match self {
            Error::Io(error) => {
                ariadne::Report::build(ariadne::ReportKind::Error, 0usize, 0).with_message(error)
            }
            Error::Lexical(error) => error.report(),
            Error::Syntactic(error) => error.report(),
            Error::Weed(error) => error.report(),
            Error::Semantic(error) => error.report(),
        }
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(error: std::io::Error) -> Self {
        Error::Io(error)
    }
}

impl From<lex::Error> for Error {
    fn from(error: lex::Error) -> Self {
        Error::Lexical(error)
    }
}

impl From<parse::Error> for Error {
    fn from(error: parse::Error) -> Self {
        Error::Syntactic(error)
    }
}

impl From<weed::Error> for Error {
    fn from(error: weed::Error) -> Self {
        Error::Weed(error)
    }
}

impl From<check::Error> for Error {
    fn from(error: check::Error) -> Self {
        Error::Semantic(error)
    }
}

/// Value-accumulating list of diagnostics. Stages append as they go
/// and consult `is_fatal` at their own boundary; the pipeline stops at
/// the first fatal stage.
#[derive(Debug, Default)]
pub struct ErrorList {
    errors: Vec<Error>,
}

impl ErrorList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, error: impl Into<Error>) {
        self.errors.push(error.into());
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn is_fatal(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn errors(&self) -> &[Error] {
        &self.errors
    }

    /// Renders every diagnostic in the canonical simple form, one per
    /// line.
    pub fn print_simple<W: Write>(&self, out: &mut W) -> std::io::Result<()> {
        for error in &self.errors {
            writeln!(out, "{}", error)?;
        }
        Ok(())
    }

    /// Renders every diagnostic with source excerpts and underlines.
    pub fn print_rich<W: Write>(&self, cache: &FileCache, out: &mut W) -> std::io::Result<()> {
        for error in &self.errors {
            error.report().finish().write(cache, &mut *out)?;
        }
        Ok(())
    }
}

impl Extend<Error> for ErrorList {
    fn extend<I: IntoIterator<Item = Error>>(&mut self, iter: I) {
        self.errors.extend(iter);
    }
}

/// Formats the simple form shared by every single-position diagnostic.
pub(crate) fn simple(fmt: &mut fmt::Formatter, name: &str, span: Span) -> fmt::Result {
    write!(fmt, "{}({})", name, span)
}

/// Formats the simple form shared by every multi-position diagnostic.
pub(crate) fn simple_all(fmt: &mut fmt::Formatter, name: &str, spans: &[Span]) -> fmt::Result {
    write!(fmt, "{}: [", name)?;
    for span in spans {
        write!(fmt, "{},", span)?;
    }
    write!(fmt, "]")
}
