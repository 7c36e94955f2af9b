//! Extraction of type expressions from the CST into the `Ast`
//! sublanguage.

use crate::Lowerer;
use ast::Ast;
use cst::{CstElement, NodeKind};
use lexer::{name_kind, NameKind};
use utility::Atom;

impl Lowerer<'_> {
    /// Read a type expression. Errors yield `BadType` so signatures stay
    /// structurally present.
    pub(crate) fn parse_type(&self, root: &CstElement<'_>) -> Ast {
        match root.node_kind() {
            Some(NodeKind::Binary) => {
                let mut child = root.first_child_node();
                let lhs = self.parse_type(&child);
                child.next_sibling_node();
                let operator = self.identifier(&child);
                let location = child.span();
                child.next_sibling_node();
                let mut rhs = self.parse_type(&child);

                if operator.to_str() == ":" {
                    if !lhs.args.is_empty() || name_kind(lhs.name.to_str()) == NameKind::Operator {
                        self.error(
                            lhs.region,
                            format!(
                                "tag-name for a type must be a simple lower-case identifier, \
                                 not ‘{}’",
                                lhs.name,
                            ),
                        );
                        return rhs;
                    }
                    rhs.tag = Some(lhs.name);
                    rhs.region = root.span();
                    rhs
                } else {
                    let name = Atom::from(format!("binary {operator}"));
                    let mut out = Ast::with_args(location, name, vec![lhs, rhs]);
                    out.region = root.span();
                    out
                }
            }
            Some(NodeKind::Unary) => {
                let mut child = root.first_child_node();
                let mut args = Vec::new();

                // the operand may precede the operator (postfix form)
                if child.node_kind() != Some(NodeKind::Op) {
                    args.push(self.parse_type(&child));
                    child.next_sibling_node();
                }
                let operator = self.identifier(&child);
                let location = child.span();
                child.next_sibling_node();
                if args.is_empty() {
                    args.push(self.parse_type(&child));
                }

                let name = Atom::from(format!("unary {operator}"));
                let mut out = Ast::with_args(location, name, args);
                out.region = root.span();
                out
            }
            Some(NodeKind::Id) => Ast::new(root.span(), self.identifier(root)),
            Some(NodeKind::Paren) => {
                let child = root.first_child_node();
                if child.empty() {
                    self.error(root.span(), "empty type expression".into());
                    return Ast::new(root.span(), Atom::from("BadType"));
                }
                let mut out = self.parse_type(&child);
                out.region = root.span();
                out
            }
            Some(NodeKind::App) => {
                let mut child = root.first_child_node();
                let mut lhs = self.parse_type(&child);
                child.next_sibling_node();
                let rhs = self.parse_type(&child);

                match name_kind(lhs.name.to_str()) {
                    NameKind::Lower => self.error(
                        lhs.token,
                        format!(
                            "lower-case identifier ‘{}’ cannot be used as a type constructor",
                            lhs.name,
                        ),
                    ),
                    NameKind::Operator => self.error(
                        rhs.region,
                        format!("excess type argument supplied to ‘{}’", lhs.name),
                    ),
                    NameKind::Upper => {}
                }

                lhs.args.push(rhs);
                lhs.region = root.span();
                lhs
            }
            Some(NodeKind::Error) => Ast::new(root.span(), Atom::from("BadType")),
            _ => {
                self.error(
                    root.span(),
                    format!(
                        "type signatures forbid {}",
                        lexer::printable_quote(self.content(root)),
                    ),
                );
                Ast::new(root.span(), Atom::from("BadType"))
            }
        }
    }

    /// Report open type variables; topic signatures must be closed.
    pub(crate) fn check_closed_type(&self, ast: &Ast) {
        if ast.args.is_empty()
            && name_kind(ast.name.to_str()) == NameKind::Lower
            && ast.name.to_str() != "BadType"
        {
            self.error(
                ast.token,
                format!("topic type may not contain the type variable ‘{}’", ast.name),
            );
        }
        for arg in &ast.args {
            self.check_closed_type(arg);
        }
    }
}
