//! Textual rendering of the desugared trees.
//!
//! A compact, fully-parenthesized form meant for tests and debug dumps,
//! not for end users.

use crate::{
    expr::{BareExpr, DefMap, Literal, LiteralKind, Match},
    Ast, Expr,
};
use std::fmt;

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.bare {
            BareExpr::VarRef { name } => write!(f, "{name}"),
            BareExpr::Literal(literal) => literal.fmt(f),
            BareExpr::Lambda { binder, body, .. } => write!(f, "(\\{binder} {body})"),
            BareExpr::App { function, argument } => write!(f, "({function} {argument})"),
            BareExpr::DefMap(map) => map.fmt(f),
            BareExpr::Match(match_) => match_.fmt(f),
            BareExpr::Ascribe { signature, body } => write!(f, "({body} : {signature})"),
            BareExpr::Prim { name } => write!(f, "(prim {name})"),
            BareExpr::Construct { sum, ctor } => {
                write!(f, "Construct({}, {})", sum.name, sum.members[*ctor].ast.name)
            }
            BareExpr::Get { sum, ctor, field } => {
                write!(f, "Get({}, {}, {field})", sum.name, sum.members[*ctor].ast.name)
            }
            BareExpr::Subscribe { name } => write!(f, "(subscribe {name})"),
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            LiteralKind::String => write!(f, "\"{}\"", self.value),
            LiteralKind::Integer | LiteralKind::Double => write!(f, "{}", self.value),
            LiteralKind::Regex => write!(f, "`{}`", self.value),
        }
    }
}

impl fmt::Display for DefMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(def")?;
        for package in &self.imports.import_all {
            write!(f, " [import {package} _]")?;
        }
        for (name, source) in self
            .imports
            .mixed
            .iter()
            .chain(&self.imports.defs)
            .chain(&self.imports.types)
            .chain(&self.imports.topics)
        {
            match &source.qualified {
                Some(qualified) => write!(f, " [import {name} = {qualified}]")?,
                None => write!(f, " [import {name}]")?,
            }
        }
        for (name, value) in &self.defs {
            write!(f, " {name} = {};", value.body)?;
        }
        match &self.body {
            Some(body) => write!(f, " in {body})"),
            None => write!(f, ")"),
        }
    }
}

impl fmt::Display for Match {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(match{}", if self.refutable { "!" } else { "" })?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        write!(f, " {{")?;
        for clause in &self.patterns {
            write!(f, " {}", clause.pattern)?;
            if let Some(guard) = &clause.guard {
                write!(f, " if {guard}")?;
            }
            write!(f, " = {};", clause.expr)?;
        }
        write!(f, " }}")?;
        if let Some(otherwise) = &self.otherwise {
            write!(f, " else {otherwise}")?;
        }
        write!(f, ")")
    }
}

impl fmt::Display for Ast {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(tag) = &self.tag {
            write!(f, "{tag}: ")?;
        }

        let name = if self.is_anonymous() { "·" } else { self.name.to_str() };

        if self.args.is_empty() && self.ty.is_none() {
            return write!(f, "{name}");
        }

        write!(f, "({name}")?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        if let Some(ty) = &self.ty {
            write!(f, " : {ty}")?;
        }
        write!(f, ")")
    }
}
