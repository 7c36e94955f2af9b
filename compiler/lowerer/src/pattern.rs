//! Pattern extraction, literal guard lifting and placeholder relabeling.

use crate::Lowerer;
use ast::{
    expr::{BareExpr, Literal, LiteralKind, Match, MatchClause},
    Ast, Expr, FLAG_TOUCHED,
};
use cst::{CstElement, NodeKind};
use lexer::{name_kind, NameKind};
use span::Span;
use utility::Atom;

/// Shared state while reading one pattern row.
pub(crate) struct PatternState {
    /// Literals are permitted and lifted to guards (`match`/`require`).
    pub(crate) literals: bool,
    /// The lifted literal expressions, in `_ k<i>` binder order.
    pub(crate) guards: Vec<Expr>,
    /// The pattern was a parenthesized group at the top level, which
    /// allows operator names as definition heads.
    pub(crate) top_paren: bool,
}

impl PatternState {
    pub(crate) fn new(literals: bool) -> Self {
        Self { literals, guards: Vec::new(), top_paren: false }
    }
}

impl Lowerer<'_> {
    /// Read a pattern (or an annotated binder list) from the CST.
    pub(crate) fn parse_pattern(&self, root: &CstElement<'_>, state: &mut PatternState) -> Ast {
        match root.node_kind() {
            Some(NodeKind::Id) => {
                state.top_paren = false;
                Ast::new(root.span(), self.identifier(root))
            }
            Some(NodeKind::Hole) => {
                state.top_paren = false;
                Ast::new(root.span(), Atom::UNDERSCORE)
            }
            Some(NodeKind::Binary) => {
                state.top_paren = false;
                let mut child = root.first_child_node();
                let lhs = child;
                child.next_sibling_node();
                let operator = self.identifier(&child);
                let token = child.span();
                child.next_sibling_node();

                if operator.to_str() == ":" {
                    // an annotation: the right-hand side is a type
                    let mut binder = self.parse_pattern(&lhs, state);
                    binder.ty = Some(Box::new(self.parse_type(&child)));
                    binder.region = root.span();
                    binder
                } else {
                    let left = self.parse_pattern(&lhs, state);
                    let right = self.parse_pattern(&child, state);
                    let name = Atom::from(format!("binary {operator}"));
                    let mut out = Ast::with_args(token, name, vec![left, right]);
                    out.region = root.span();
                    out
                }
            }
            Some(NodeKind::Unary) => {
                state.top_paren = false;
                let mut child = root.first_child_node();
                let operator = self.identifier(&child);
                let token = child.span();
                child.next_sibling_node();
                let operand = self.parse_pattern(&child, state);

                let name = Atom::from(format!("unary {operator}"));
                let mut out = Ast::with_args(token, name, vec![operand]);
                out.region = root.span();
                out
            }
            Some(NodeKind::App) => {
                let mut child = root.first_child_node();
                let mut lhs = self.parse_pattern(&child, state);
                child.next_sibling_node();
                let rhs = self.parse_pattern(&child, state);

                if name_kind(lhs.name.to_str()) == NameKind::Operator {
                    self.error(
                        root.span(),
                        format!("cannot supply additional constructor arguments to ‘{}’", lhs.name),
                    );
                }

                lhs.args.push(rhs);
                lhs.region = root.span();
                state.top_paren = false;
                lhs
            }
            Some(NodeKind::Paren) => {
                let child = root.first_child_node();
                if child.empty() {
                    self.error(root.span(), "empty pattern".into());
                    return Ast::new(root.span(), Atom::UNDERSCORE);
                }
                let mut out = self.parse_pattern(&child, state);
                out.region = root.span();
                state.top_paren = true;
                out
            }
            Some(NodeKind::Literal) | Some(NodeKind::Interpolate) if state.literals => {
                // lift the literal to a fresh binder plus a guard
                let binder = Atom::from(format!("_ k{}", state.guards.len()));
                let literal = self.lower_expr(root);
                state.guards.push(literal);
                state.top_paren = false;
                Ast::new(root.span(), binder)
            }
            Some(NodeKind::Error) => Ast::new(root.span(), Atom::UNDERSCORE),
            _ => {
                self.error(
                    root.span(),
                    format!(
                        "patterns forbid {}",
                        lexer::printable_quote(self.content(root)),
                    ),
                );
                Ast::new(root.span(), Atom::UNDERSCORE)
            }
        }
    }

    /// Unroll an application chain into a row of patterns, for
    /// multi-scrutinee matches and target subkeys.
    pub(crate) fn pattern_row(&self, root: &CstElement<'_>, state: &mut PatternState) -> Vec<Ast> {
        match root.node_kind() {
            Some(NodeKind::App) => {
                let mut child = root.first_child_node();
                let mut row = self.pattern_row(&child, state);
                child.next_sibling_node();
                row.push(self.parse_pattern(&child, state));
                row
            }
            _ => vec![self.parse_pattern(root, state)],
        }
    }

    /// Patterns may only destructure through upper-case or operator
    /// constructors; a lower-case or wildcard head with arguments is an
    /// error.
    pub(crate) fn check_constructors(&self, ast: &Ast) {
        for arg in &ast.args {
            if !arg.args.is_empty() && name_kind(arg.name.to_str()) != NameKind::Operator {
                let head = arg.name.to_str();
                if head == "_" || name_kind(head) == NameKind::Lower {
                    self.error(
                        arg.token,
                        format!("pattern constructor ‘{head}’ must be upper-case or an operator"),
                    );
                }
            }
            self.check_constructors(arg);
        }
    }

    /// Combine lifted literal patterns into the clause guard: each
    /// literal compares against its `_ k<i>` binder with the primitive
    /// appropriate to its type, and `EQ` falls through to the previous
    /// guard.
    pub(crate) fn add_literal_guards(
        &self,
        mut guard: Option<Expr>,
        state: &PatternState,
    ) -> Option<Expr> {
        for (index, literal) in state.guards.iter().enumerate() {
            let comparison = match &literal.bare {
                BareExpr::Literal(Literal { kind: LiteralKind::Integer, .. }) => Atom::ICMP,
                BareExpr::Literal(Literal { kind: LiteralKind::Double, .. }) => Atom::DCMP_NAN_LT,
                BareExpr::Literal(Literal { kind: LiteralKind::Regex, .. }) => Atom::RCMP,
                _ => Atom::SCMP,
            };
            let at = literal.span;

            let previous =
                guard.unwrap_or_else(|| BareExpr::VarRef { name: Atom::TRUE_AT_WAKE }.at(at));

            let compare = apply(
                apply(
                    lambda("_", lambda("_", BareExpr::Prim { name: comparison }.at(at), at), at),
                    literal.clone(),
                    at,
                ),
                BareExpr::VarRef { name: Atom::from(format!("_ k{index}")) }.at(at),
                at,
            );

            let mut lifted = Match::new();
            lifted.args.push(compare);
            lifted.patterns.push(MatchClause {
                pattern: Ast::new(at, Atom::LT_AT_WAKE),
                expr: BareExpr::VarRef { name: Atom::FALSE_AT_WAKE }.at(at),
                guard: None,
            });
            lifted.patterns.push(MatchClause {
                pattern: Ast::new(at, Atom::GT_AT_WAKE),
                expr: BareExpr::VarRef { name: Atom::FALSE_AT_WAKE }.at(at),
                guard: None,
            });
            lifted.patterns.push(MatchClause {
                pattern: Ast::new(at, Atom::EQ_AT_WAKE),
                expr: previous,
                guard: None,
            });

            guard = Some(BareExpr::Match(lifted).at(at));
        }

        guard
    }
}

pub(crate) fn lambda(binder: &str, body: Expr, at: Span) -> Expr {
    BareExpr::Lambda {
        binder: Atom::from(binder),
        token: Span::default(),
        body: Box::new(body),
    }
    .at(at)
}

pub(crate) fn apply(function: Expr, argument: Expr, at: Span) -> Expr {
    BareExpr::App {
        function: Box::new(function),
        argument: Box::new(argument),
    }
    .at(at)
}

/// Number the `_` placeholders of an expression and wrap it in that many
/// lambdas (outermost binds the lowest index). The descent visits every
/// node at most once and stops at binding constructs.
pub(crate) fn relabel_anon(mut expr: Expr) -> Expr {
    let count = relabel_descend(&mut expr, 0);
    for index in (1..=count).rev() {
        let at = expr.span;
        expr = lambda(&format!("_ {index}"), expr, at);
    }
    expr
}

fn relabel_descend(expr: &mut Expr, index: u32) -> u32 {
    if expr.flags & FLAG_TOUCHED != 0 {
        return index;
    }
    expr.flags |= FLAG_TOUCHED;

    match &mut expr.bare {
        BareExpr::VarRef { name } => {
            if name.to_str() != "_" {
                return index;
            }
            let index = index + 1;
            *name = Atom::from(format!("_ {index}"));
            index
        }
        BareExpr::App { function, argument } => {
            let index = relabel_descend(function, index);
            relabel_descend(argument, index)
        }
        BareExpr::Lambda { body, .. } => relabel_descend(body, index),
        BareExpr::Match(match_) => {
            let mut index = index;
            for arg in &mut match_.args {
                index = relabel_descend(arg, index);
            }
            index
        }
        BareExpr::Ascribe { body, .. } => relabel_descend(body, index),
        // defmaps, literals and primitives do not participate
        _ => index,
    }
}
