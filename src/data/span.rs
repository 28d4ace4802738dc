use std::fmt;

use crate::Map;

/// Index of a source file in the compilation's file list.
pub type FileId = usize;

/// Represents a single point in a source file.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Point {
    pub index: u32,
    pub row: u32,
    pub col: u32,
}

impl Point {
    pub fn new(index: usize, row: usize, col: usize) -> Self {
        Point {
            index: index as u32,
            row: row as u32,
            col: col as u32,
        }
    }

    /// Constructs the next point in the program.
    /// Assumes that the current character is ASCII.
    pub fn bump(&self) -> Self {
        Point {
            index: self.index + 1,
            row: self.row,
            col: self.col + 1,
        }
    }
}

/// Represents a span of text in a source file.
///
/// `Display` renders the canonical simple form `<file>:<lo>-<hi>` used
/// by simple-mode diagnostics; rich diagnostics go through [`ariadne`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Span {
    pub file: FileId,
    pub lo: Point,
    pub hi: Point,
}

impl Span {
    pub fn new(file: FileId, lo: Point, hi: Point) -> Self {
        Span { file, lo, hi }
    }

    /// The smallest span covering both `self` and `other`.
    pub fn merge(&self, other: Span) -> Span {
        Span {
            file: self.file,
            lo: self.lo.min(other.lo),
            hi: self.hi.max(other.hi),
        }
    }
}

impl fmt::Display for Span {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        write!(fmt, "{}:{}-{}", self.file, self.lo.index, self.hi.index)
    }
}

impl ariadne::Span for Span {
    type SourceId = FileId;

    fn source(&self) -> &Self::SourceId {
        &self.file
    }

    fn start(&self) -> usize {
        self.lo.index as usize
    }

    fn end(&self) -> usize {
        self.hi.index as usize
    }
}

/// In-memory cache of source files, keyed by file id.
#[derive(Default)]
pub struct FileCache {
    names: Vec<String>,
    sources: Map<FileId, ariadne::Source>,
}

impl FileCache {
    pub fn add(&mut self, name: impl Into<String>, source: &str) -> FileId {
        let file = self.names.len();
        self.names.push(name.into());
        self.sources.insert(file, ariadne::Source::from(source));
        file
    }

    pub fn name(&self, file: FileId) -> &str {
        &self.names[file]
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl ariadne::Cache<FileId> for &FileCache {
    fn fetch(&mut self, id: &FileId) -> Result<&ariadne::Source, Box<dyn fmt::Debug + '_>> {
        self.sources
            .get(id)
            .ok_or_else(|| Box::new(format!("unknown file id {}", id)) as _)
    }

    fn display<'a>(&self, id: &'a FileId) -> Option<Box<dyn fmt::Display + 'a>> {
        self.names.get(*id).cloned().map(|name| Box::new(name) as _)
    }
}
