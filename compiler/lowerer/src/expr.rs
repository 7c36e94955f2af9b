//! Expression lowering: CST expression nodes into the desugared core.

use crate::{
    pattern::{apply, lambda, relabel_anon, PatternState},
    Lowerer,
};
use ast::{
    expr::{BareExpr, DefMap, Literal, LiteralKind, Match, MatchClause},
    Ast, Expr, FLAG_AST,
};
use cst::{CstElement, NodeKind};
use lexer::{name_kind, NameKind};
use token::TokenKind;
use utility::Atom;

impl Lowerer<'_> {
    /// Lower one expression node.
    pub(crate) fn lower_expr(&self, root: &CstElement<'_>) -> Expr {
        let at = root.span();

        match root.node_kind() {
            Some(NodeKind::Id) => BareExpr::VarRef { name: self.identifier(root) }
                .at(at)
                .flagged(FLAG_AST),
            Some(NodeKind::Hole) => BareExpr::VarRef { name: Atom::UNDERSCORE }
                .at(at)
                .flagged(FLAG_AST),
            Some(NodeKind::Literal) => self.lower_literal(root).flagged(FLAG_AST),
            Some(NodeKind::Interpolate) => self.lower_interpolate(root).flagged(FLAG_AST),
            Some(NodeKind::App) => {
                let mut child = root.first_child_node();
                let function = self.lower_expr(&child);
                child.next_sibling_node();
                let argument = self.lower_expr(&child);
                apply(function, argument, at).flagged(FLAG_AST)
            }
            Some(NodeKind::Binary) => {
                let mut child = root.first_child_node();
                let lhs = child;
                child.next_sibling_node();
                let operator = self.identifier(&child);
                let token = child.span();
                child.next_sibling_node();

                if operator.to_str() == ":" {
                    let signature = self.parse_type(&child);
                    self.check_constructors(&signature);
                    BareExpr::Ascribe {
                        signature,
                        body: Box::new(self.lower_expr(&lhs)),
                    }
                    .at(at)
                } else {
                    let name = Atom::from(format!("binary {operator}"));
                    let op = BareExpr::VarRef { name }.at(token).flagged(FLAG_AST);
                    let inner = apply(op, self.lower_expr(&lhs), at);
                    apply(inner, self.lower_expr(&child), at).flagged(FLAG_AST)
                }
            }
            Some(NodeKind::Unary) => {
                let mut child = root.first_child_node();
                let operator = self.identifier(&child);
                let token = child.span();
                child.next_sibling_node();

                let name = Atom::from(format!("unary {operator}"));
                let op = BareExpr::VarRef { name }.at(token).flagged(FLAG_AST);
                apply(op, self.lower_expr(&child), at).flagged(FLAG_AST)
            }
            Some(NodeKind::Paren) => {
                let child = root.first_child_node();
                if child.empty() {
                    self.error(at, "empty parenthesized expression".into());
                    return bad(at, "bad unary");
                }
                let mut out = self.lower_body(&child);
                out.span = at;
                if matches!(out.bare, BareExpr::Lambda { .. }) {
                    out.flags |= FLAG_AST;
                }
                out
            }
            Some(NodeKind::Block) => self.lower_block(root),
            Some(NodeKind::Lambda) => self.lower_lambda(root),
            Some(NodeKind::Match) => self.lower_match(root),
            Some(NodeKind::If) => self.lower_if(root),
            Some(NodeKind::Prim) => {
                let child = root.first_child_node();
                let name = if child.empty() {
                    Atom::BAD_PRIM
                } else {
                    self.literal_text(&child)
                };
                BareExpr::Prim { name }.at(at).flagged(FLAG_AST)
            }
            Some(NodeKind::Subscribe) => {
                let child = root.first_child_node();
                let name = if child.empty() {
                    Atom::UNDEF
                } else {
                    self.identifier(&child)
                };
                BareExpr::Subscribe { name }.at(at)
            }
            Some(NodeKind::Error) => bad(at, "bad unary"),
            _ => {
                self.error(
                    at,
                    format!(
                        "expected an expression, got {}",
                        lexer::printable_quote(self.content(root)),
                    ),
                );
                bad(at, "bad unary")
            }
        }
    }

    /// Lower a body position: an indented block or a plain expression
    /// whose `_` placeholders become lambda binders.
    pub(crate) fn lower_body(&self, root: &CstElement<'_>) -> Expr {
        if root.node_kind() == Some(NodeKind::Block) {
            self.lower_block(root)
        } else {
            relabel_anon(self.lower_expr(root))
        }
    }

    fn lower_literal(&self, root: &CstElement<'_>) -> Expr {
        let at = root.span();
        let content = self.content(root);
        let token = root.first_child_element().token_kind();

        let literal = match token {
            Some(TokenKind::Integer) => Literal {
                value: Atom::from(lexer::relex_integer(content)),
                kind: LiteralKind::Integer,
            },
            Some(TokenKind::Double) => Literal {
                value: Atom::from(lexer::relex_double(content)),
                kind: LiteralKind::Double,
            },
            Some(kind @ (TokenKind::StrRaw | TokenKind::StrSingle)) => {
                let (value, ok) = lexer::relex_string_value(kind, content);
                if !ok {
                    self.error(at, "invalid escape sequence in string literal".into());
                }
                Literal { value: Atom::from(value), kind: LiteralKind::String }
            }
            Some(TokenKind::RegSingle) => {
                let (value, _) = lexer::relex_regex_value(TokenKind::RegSingle, content);
                Literal { value: Atom::from(value), kind: LiteralKind::Regex }
            }
            Some(TokenKind::Here) => Literal {
                value: Atom::from(self.file.directory()),
                kind: LiteralKind::String,
            },
            _ => {
                self.error(at, "malformed literal".into());
                Literal { value: Atom::from("bad literal"), kind: LiteralKind::String }
            }
        };

        BareExpr::Literal(literal).at(at)
    }

    /// The decoded text of a plain string literal node (`prim` operands).
    pub(crate) fn literal_text(&self, root: &CstElement<'_>) -> Atom {
        let content = self.content(root);
        match root.first_child_element().token_kind() {
            Some(kind @ (TokenKind::StrRaw | TokenKind::StrSingle)) => {
                Atom::from(lexer::relex_string_value(kind, content).0)
            }
            _ => Atom::BAD_PRIM,
        }
    }

    /// `"a{x}b"` folds left into `cat` applications over the pieces,
    /// formatting each interpolated expression.
    fn lower_interpolate(&self, root: &CstElement<'_>) -> Expr {
        let at = root.span();
        let mut acc: Option<Expr> = None;

        let mut child = root.first_child_node();
        while !child.empty() {
            let piece = match child.node_kind() {
                Some(NodeKind::Literal) => {
                    let content = self.content(&child);
                    match child.first_child_element().token_kind() {
                        Some(
                            kind @ (TokenKind::StrOpen
                            | TokenKind::StrMid
                            | TokenKind::StrClose
                            | TokenKind::StrSingle),
                        ) => {
                            let (value, ok) = lexer::relex_string_value(kind, content);
                            if !ok {
                                self.error(
                                    child.span(),
                                    "invalid escape sequence in string literal".into(),
                                );
                            }
                            BareExpr::Literal(Literal {
                                value: Atom::from(value),
                                kind: LiteralKind::String,
                            })
                            .at(child.span())
                        }
                        Some(
                            kind @ (TokenKind::RegOpen | TokenKind::RegMid | TokenKind::RegClose),
                        ) => {
                            let (value, _) = lexer::relex_regex_value(kind, content);
                            BareExpr::Literal(Literal {
                                value: Atom::from(value),
                                kind: LiteralKind::Regex,
                            })
                            .at(child.span())
                        }
                        _ => self.lower_expr(&child),
                    }
                }
                _ => {
                    // an embedded expression renders through `format`
                    let value = self.lower_expr(&child);
                    apply(
                        BareExpr::VarRef { name: Atom::FORMAT }.at(child.span()),
                        value,
                        child.span(),
                    )
                }
            };

            acc = Some(match acc {
                None => piece,
                Some(acc) => {
                    let cat = lambda(
                        "_",
                        lambda("_", BareExpr::Prim { name: Atom::CAT }.at(at), at),
                        at,
                    );
                    apply(apply(cat, acc, at), piece, at)
                }
            });

            child.next_sibling_node();
        }

        acc.unwrap_or_else(|| bad(at, "bad interpolation"))
    }

    fn lower_lambda(&self, root: &CstElement<'_>) -> Expr {
        let at = root.span();
        let mut child = root.first_child_node();

        let mut state = PatternState::new(false);
        let ast = self.parse_pattern(&child, &mut state);
        self.check_constructors(&ast);
        child.next_sibling_node();
        let body = self.lower_expr(&child);

        let out = match name_kind(ast.name.to_str()) {
            NameKind::Upper | NameKind::Operator => {
                // destructure through a fresh binder
                let mut lowered = Match::new();
                lowered
                    .args
                    .push(BareExpr::VarRef { name: Atom::from("_ xx") }.at(ast.region));
                lowered.patterns.push(MatchClause { pattern: ast, expr: body, guard: None });
                lambda("_ xx", BareExpr::Match(lowered).at(at), at)
            }
            NameKind::Lower if ast.ty.is_some() => {
                // shadow the annotated binder through an ascription
                let mut map = DefMap::default();
                let signature = *ast.ty.unwrap();
                map.defs.insert(
                    ast.name.into(),
                    ast::DefValue::new(
                        ast.region,
                        BareExpr::Ascribe {
                            signature,
                            body: Box::new(
                                BareExpr::VarRef { name: Atom::from("_ typed") }.at(ast.region),
                            ),
                        }
                        .at(ast.region),
                    ),
                );
                map.body = Some(Box::new(body));
                lambda("_ typed", BareExpr::DefMap(map).at(at), at)
            }
            NameKind::Lower => {
                let mut out = lambda(ast.name.to_str(), body, at);
                if let BareExpr::Lambda { token, .. } = &mut out.bare {
                    *token = ast.token;
                }
                out
            }
        };

        out.flagged(FLAG_AST)
    }

    fn lower_match(&self, root: &CstElement<'_>) -> Expr {
        let at = root.span();
        let mut lowered = Match::new();

        // scrutinees come first, cases after
        let mut child = root.first_child_node();
        while !child.empty() && child.node_kind() != Some(NodeKind::Case) {
            if child.node_kind() != Some(NodeKind::Error) {
                lowered.args.push(self.lower_expr(&child));
            }
            child.next_sibling_node();
        }

        let multiarg = lowered.args.len() > 1;

        while !child.empty() {
            if child.node_kind() != Some(NodeKind::Case) {
                child.next_sibling_node();
                continue;
            }

            let mut part = child.first_child_node();
            let mut state = PatternState::new(true);

            let pattern = if multiarg {
                let row = self.pattern_row(&part, &mut state);
                let mut root_ast = Ast::anonymous(part.span());
                root_ast.args = row;
                root_ast.region = part.span();
                root_ast
            } else {
                self.parse_pattern(&part, &mut state)
            };
            self.check_constructors(&pattern);
            part.next_sibling_node();

            let user_guard = if part.node_kind() == Some(NodeKind::Guard) {
                let guard = self.lower_body(&part.first_child_node());
                part.next_sibling_node();
                Some(guard)
            } else {
                None
            };
            let guard = self.add_literal_guards(user_guard, &state);

            let expr = if part.empty() {
                bad(child.span(), "bad case")
            } else {
                self.lower_body(&part)
            };

            lowered.patterns.push(MatchClause { pattern, expr, guard });
            child.next_sibling_node();
        }

        if lowered.patterns.is_empty() {
            self.error(at, "match has no cases".into());
            return bad(at, "bad match");
        }

        BareExpr::Match(lowered).at(at)
    }

    fn lower_if(&self, root: &CstElement<'_>) -> Expr {
        let at = root.span();
        let mut child = root.first_child_node();

        let condition = self.lower_body(&child);
        child.next_sibling_node();
        let then = self.lower_body(&child);
        child.next_sibling_node();
        let otherwise = self.lower_body(&child);

        let mut lowered = Match::new();
        lowered.args.push(condition);
        lowered.patterns.push(MatchClause {
            pattern: Ast::new(at, Atom::TRUE_AT_WAKE),
            expr: then,
            guard: None,
        });
        lowered.patterns.push(MatchClause {
            pattern: Ast::new(at, Atom::FALSE_AT_WAKE),
            expr: otherwise,
            guard: None,
        });

        BareExpr::Match(lowered).at(at).flagged(FLAG_AST)
    }

    /// Lower an indented block: leading definitions and imports collect
    /// into a `DefMap`; a `require` folds the rest of the block into its
    /// match.
    pub(crate) fn lower_block(&self, root: &CstElement<'_>) -> Expr {
        let mut children = Vec::new();
        let mut child = root.first_child_node();
        while !child.empty() {
            children.push(child);
            child.next_sibling_node();
        }

        self.lower_block_tail(root, &children)
    }

    fn lower_block_tail(&self, root: &CstElement<'_>, children: &[CstElement<'_>]) -> Expr {
        let at = root.span();
        let mut map = DefMap::default();
        let mut body: Option<Expr> = None;

        for (index, child) in children.iter().enumerate() {
            match child.node_kind() {
                Some(NodeKind::Def) => {
                    for definition in self.parse_def(child, map.defs.len(), false, false) {
                        self.bind_def(&mut map, definition, None, None);
                    }
                }
                Some(NodeKind::Target) => {
                    self.bind_target(child, &mut map, None, None);
                }
                Some(NodeKind::Import) => self.parse_import(child, &mut map.imports),
                Some(NodeKind::Require) => {
                    let rest = self.lower_block_tail(root, &children[index + 1..]);
                    body = Some(self.lower_require(child, rest));
                    break;
                }
                Some(NodeKind::Error) => {}
                _ => {
                    body = Some(relabel_anon(self.lower_expr(child)));
                    break;
                }
            }
        }

        let body = body.unwrap_or_else(|| {
            // the parser already complained about the malformed block
            bad(at, "bad block")
        });

        if map.is_trivial() {
            body
        } else {
            map.body = Some(Box::new(body));
            BareExpr::DefMap(map).at(at)
        }
    }

    fn lower_require(&self, root: &CstElement<'_>, rest: Expr) -> Expr {
        let at = root.span();
        let mut child = root.first_child_node();

        let mut state = PatternState::new(true);
        let pattern = self.parse_pattern(&child, &mut state);
        self.check_constructors(&pattern);
        let guard = self.add_literal_guards(None, &state);
        child.next_sibling_node();

        let value = if child.empty() {
            bad(at, "bad require")
        } else {
            self.lower_body(&child)
        };
        child.next_sibling_node();

        let otherwise = if child.empty() {
            None
        } else {
            Some(Box::new(self.lower_body(&child)))
        };

        let mut lowered = Match::refutable();
        lowered.args.push(value);
        lowered.patterns.push(MatchClause { pattern, expr: rest, guard });
        lowered.otherwise = otherwise;

        BareExpr::Match(lowered).at(at)
    }
}

/// The neutral placeholder for positions whose source was invalid.
pub(crate) fn bad(at: span::Span, what: &str) -> Expr {
    BareExpr::Literal(Literal {
        value: Atom::from(what),
        kind: LiteralKind::String,
    })
    .at(at)
}
