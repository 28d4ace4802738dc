use std::borrow::Cow;
use std::fmt;

use pretty::Arena;
use pretty::DocAllocator;
use pretty::DocBuilder;

use crate::data::ir;

/// S-expression rendering of IR streams, written behind the `--ir`
/// flag for debugging.
#[derive(Clone, Debug)]
pub enum Sexp {
    Atom(Cow<'static, str>),
    List(Vec<Sexp>),
}

impl fmt::Display for Sexp {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        let arena = Arena::new();
        self.to_doc(&arena).render_fmt(80, fmt)
    }
}

impl Sexp {
    fn to_doc<'a, A>(&self, allocator: &'a A) -> DocBuilder<'a, A, ()>
    where
        A: DocAllocator<'a, ()>,
        A::Doc: Clone,
    {
        match self {
            Sexp::Atom(atom) => allocator.text(atom.clone()),
            Sexp::List(list) => allocator
                .intersperse(
                    list.iter().map(|sexp| sexp.to_doc(allocator).nest(4)),
                    allocator.line(),
                )
                .parens()
                .group(),
        }
    }

    pub fn write<W: std::io::Write>(&self, width: usize, writer: &mut W) -> std::io::Result<()> {
        let arena = Arena::new();
        self.to_doc(&arena).render(width, writer)
    }
}

fn atom(string: impl Into<Cow<'static, str>>) -> Sexp {
    Sexp::Atom(string.into())
}

pub trait Serialize {
    fn sexp(&self) -> Sexp;
}

impl Serialize for u64 {
    fn sexp(&self) -> Sexp {
        atom(self.to_string())
    }
}

impl Serialize for ir::Stream {
    fn sexp(&self) -> Sexp {
        let mut ops = vec![
            atom("stream"),
            atom(format!("t{}", self.tid.base)),
            atom(format!("m{}", self.mid)),
        ];
        ops.extend(self.ops.iter().map(|op| {
            let mut parts = vec![atom(format!("{:?}", op.ty))];
            parts.extend(self.args_of(op).iter().map(Serialize::sexp));
            Sexp::List(parts)
        }));
        Sexp::List(ops)
    }
}

impl Serialize for ir::CompUnit {
    fn sexp(&self) -> Sexp {
        let mut parts = vec![atom("unit"), atom(self.filename.clone())];
        parts.extend(
            self.types
                .iter()
                .flat_map(|ty| &ty.streams)
                .map(Serialize::sexp),
        );
        Sexp::List(parts)
    }
}

impl Serialize for ir::Program {
    fn sexp(&self) -> Sexp {
        let mut parts = vec![atom("program")];
        parts.extend(self.units.iter().map(Serialize::sexp));
        Sexp::List(parts)
    }
}
