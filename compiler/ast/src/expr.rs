//! The desugared expression tree.

use crate::{sums::Sum, symbols::SymbolSource, Ast, Name, ScopedTypeVar};
use span::Span;
use std::{collections::BTreeMap, sync::Arc};
use utility::Atom;

/// A desugared expression with its source region and flag bits.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Expr {
    pub span: Span,
    pub flags: u8,
    pub bare: BareExpr,
}

impl Expr {
    pub fn new(span: Span, bare: BareExpr) -> Self {
        Self { span, flags: 0, bare }
    }

    #[must_use]
    pub fn flagged(mut self, flags: u8) -> Self {
        self.flags |= flags;
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BareExpr {
    /// A free variable, resolved by qualified name in later passes.
    VarRef {
        name: Atom,
    },
    Literal(Literal),
    /// A single-argument function.
    Lambda {
        binder: Atom,
        /// Location of the binder itself.
        token: Span,
        body: Box<Expr>,
    },
    /// Curried application.
    App {
        function: Box<Expr>,
        argument: Box<Expr>,
    },
    /// A recursive let block.
    DefMap(DefMap),
    Match(Match),
    /// A type annotation.
    Ascribe {
        signature: Ast,
        body: Box<Expr>,
    },
    /// A primitive reference; name resolution is the evaluator's.
    Prim {
        name: Atom,
    },
    /// Apply the constructor of the given sum alternative.
    Construct {
        sum: Arc<Sum>,
        ctor: usize,
    },
    /// Project the `field`-th slot out of the given alternative.
    Get {
        sum: Arc<Sum>,
        ctor: usize,
        field: usize,
    },
    /// Subscription to a topic, aggregated at evaluation time.
    Subscribe {
        name: Atom,
    },
}

impl BareExpr {
    pub fn at(self, span: Span) -> Expr {
        Expr::new(span, self)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Literal {
    pub value: Atom,
    pub kind: LiteralKind,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LiteralKind {
    String,
    Integer,
    Double,
    Regex,
}

/// One binding inside a [`DefMap`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DefValue {
    pub location: Span,
    pub body: Expr,
    pub type_vars: Vec<ScopedTypeVar>,
}

impl DefValue {
    pub fn new(location: Span, body: Expr) -> Self {
        Self { location, body, type_vars: Vec::new() }
    }
}

/// A recursive let block: simultaneous bindings, imports and a body.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct DefMap {
    pub defs: BTreeMap<Name, DefValue>,
    pub imports: Imports,
    pub body: Option<Box<Expr>>,
}

impl DefMap {
    pub fn is_trivial(&self) -> bool {
        self.defs.is_empty() && self.imports.is_empty()
    }
}

/// The import tables of a file or block.
///
/// Plain `from P import x` lands in `mixed`; `from P import def x`
/// targets the definition namespace specifically, and so on. A wildcard
/// `from P import _` records the whole package.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct Imports {
    pub mixed: BTreeMap<Name, SymbolSource>,
    pub defs: BTreeMap<Name, SymbolSource>,
    pub types: BTreeMap<Name, SymbolSource>,
    pub topics: BTreeMap<Name, SymbolSource>,
    pub import_all: Vec<Atom>,
}

impl Imports {
    pub fn is_empty(&self) -> bool {
        self.mixed.is_empty()
            && self.defs.is_empty()
            && self.types.is_empty()
            && self.topics.is_empty()
            && self.import_all.is_empty()
    }
}

/// A pattern match over one or more scrutinees.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Match {
    pub args: Vec<Expr>,
    pub patterns: Vec<MatchClause>,
    pub otherwise: Option<Box<Expr>>,
    /// `require` matches may fail at runtime.
    pub refutable: bool,
}

impl Match {
    pub fn new() -> Self {
        Self {
            args: Vec::new(),
            patterns: Vec::new(),
            otherwise: None,
            refutable: false,
        }
    }

    pub fn refutable() -> Self {
        Self { refutable: true, ..Self::new() }
    }
}

impl Default for Match {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MatchClause {
    pub pattern: Ast,
    pub expr: Expr,
    pub guard: Option<Expr>,
}
