//! The desugared syntax trees.
//!
//! Two languages live here: the [`Ast`] sublanguage used for patterns,
//! type expressions and constructor heads, and the desugared expression
//! tree ([`Expr`]) that the evaluator consumes. Surface constructs are
//! expanded into a small core of lambdas, applications, matches,
//! constructions and ascriptions by the lowerer.

use span::Span;
use std::fmt;
use utility::Atom;

pub use expr::{DefMap, DefValue, Expr, Imports, Literal, LiteralKind, Match, MatchClause};
pub use sums::{Constructor, Sum};
pub use symbols::{Conflict, SymbolSource, Symbols, SYM_LEAF};

pub mod expr;
mod format;
pub mod sums;
pub mod symbols;

/// Original-syntax node (as opposed to one invented by lowering).
pub const FLAG_AST: u8 = 1 << 0;
/// Visit-once marker for relabeling passes.
pub const FLAG_TOUCHED: u8 = 1 << 1;
/// Generated accessor or other synthesized binding.
pub const FLAG_SYNTHETIC: u8 = 1 << 2;

/// An interned name ordered by its text.
///
/// `Atom` deliberately has no `Ord`; map keys opt into string ordering
/// through this wrapper so symbol tables iterate deterministically and
/// independently of insertion order.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Name(pub Atom);

impl Name {
    pub fn as_str(self) -> &'static str {
        self.0.to_str()
    }
}

impl PartialOrd for Name {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Name {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.to_str().cmp(other.0.to_str())
    }
}

impl From<Atom> for Name {
    fn from(atom: Atom) -> Self {
        Self(atom)
    }
}

impl From<&str> for Name {
    fn from(name: &str) -> Self {
        Self(Atom::from(name))
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl fmt::Debug for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A type variable scoped to the definition that introduced it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScopedTypeVar {
    pub name: Atom,
    pub location: Span,
}

/// A node of the pattern/type sublanguage.
///
/// `tag` carries the field label in `name : Type` positions; a `name` of
/// `_` is the wildcard pattern; an empty `name` marks the synthetic root
/// of a multi-scrutinee pattern list.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Ast {
    /// The head identifier's own location.
    pub token: Span,
    /// The whole subtree's location.
    pub region: Span,
    pub name: Atom,
    pub tag: Option<Atom>,
    pub ty: Option<Box<Ast>>,
    pub args: Vec<Ast>,
}

impl Ast {
    pub fn new(token: Span, name: Atom) -> Self {
        Self {
            token,
            region: token,
            name,
            tag: None,
            ty: None,
            args: Vec::new(),
        }
    }

    pub fn with_args(token: Span, name: Atom, args: Vec<Ast>) -> Self {
        Self {
            token,
            region: token,
            name,
            tag: None,
            ty: None,
            args,
        }
    }

    /// The anonymous root used for multi-scrutinee pattern rows.
    pub fn anonymous(token: Span) -> Self {
        Self::new(token, Atom::from(""))
    }

    pub fn is_anonymous(&self) -> bool {
        self.name.to_str().is_empty()
    }

    /// Collect the type variables introduced by this node's ascriptions.
    pub fn type_vars(&self, out: &mut Vec<ScopedTypeVar>) {
        if let Some(ty) = &self.ty {
            ty.collect_vars(out);
        }
        for arg in &self.args {
            arg.type_vars(out);
        }
    }

    fn collect_vars(&self, out: &mut Vec<ScopedTypeVar>) {
        let name = self.name.to_str();
        if self.args.is_empty()
            && name
                .chars()
                .next()
                .map_or(false, |character| character.is_lowercase() || character == '_')
            && name != "_"
        {
            out.push(ScopedTypeVar { name: self.name, location: self.token });
        }
        for arg in &self.args {
            arg.collect_vars(out);
        }
    }
}
