//! Algebraic data types.

use crate::Ast;
use span::Span;
use utility::Atom;

/// A sum type: a head plus its alternatives.
///
/// Shared immutably (via `Arc`) by every `Construct`/`Get` expression
/// referring to it; a sum never refers back to expressions, so the
/// sharing is acyclic.
#[derive(Debug, PartialEq, Eq)]
pub struct Sum {
    pub name: Atom,
    pub token: Span,
    pub region: Span,
    /// Type argument names, in declaration order.
    pub args: Vec<Atom>,
    pub members: Vec<Constructor>,
}

impl Sum {
    pub fn new(head: Ast) -> Self {
        Self {
            name: head.name,
            token: head.token,
            region: head.region,
            args: head.args.iter().map(|arg| arg.name).collect(),
            members: Vec::new(),
        }
    }

    pub fn add_constructor(&mut self, ast: Ast) {
        let index = self.members.len();
        self.members.push(Constructor { ast, index });
    }
}

/// One alternative of a [`Sum`]; `sum.members[index]` is this value.
#[derive(Debug, PartialEq, Eq)]
pub struct Constructor {
    pub ast: Ast,
    pub index: usize,
}

impl Constructor {
    pub fn arity(&self) -> usize {
        self.ast.args.len()
    }
}
