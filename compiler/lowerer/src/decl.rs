//! Declaration lowering: imports, exports, topics, data, tuples and
//! definitions.

use crate::{
    expr::bad,
    pattern::{apply, lambda, PatternState},
    Lowerer,
};
use ast::{
    expr::{BareExpr, DefMap, DefValue, Imports, Literal, LiteralKind, Match, MatchClause},
    Ast, Expr, ScopedTypeVar, SymbolSource, Symbols, FLAG_SYNTHETIC,
};
use cst::{CstElement, NodeKind};
use lexer::{name_kind, NameKind};
use session::{special, Package, Topic};
use span::Span;
use std::sync::Arc;
use utility::Atom;

/// One binding produced by `def`/`target`/`publish` lowering.
pub(crate) struct Definition {
    pub(crate) name: Atom,
    pub(crate) location: Span,
    pub(crate) body: Expr,
    pub(crate) type_vars: Vec<ScopedTypeVar>,
}

#[derive(Clone, Copy, Default)]
struct ImportArity {
    unary: bool,
    binary: bool,
}

impl ImportArity {
    fn any(self) -> bool {
        self.unary || self.binary
    }

    /// Rewrite an operator name to its arity-qualified spelling.
    fn prefix(self, name: &str) -> String {
        if self.unary {
            format!("unary {name}")
        } else if self.binary {
            format!("binary {name}")
        } else {
            format!("op {name}")
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Namespace {
    Mixed,
    Defs,
    Types,
    Topics,
}

impl Namespace {
    fn describe(self) -> &'static str {
        match self {
            Self::Mixed => "symbol",
            Self::Defs => "definition",
            Self::Types => "type",
            Self::Topics => "topic",
        }
    }
}

impl Lowerer<'_> {
    fn parse_arity(&self, child: &mut CstElement<'_>) -> ImportArity {
        let mut arity = ImportArity::default();

        if child.node_kind() == Some(NodeKind::Arity) {
            match child.first_child_element().token_kind() {
                Some(token::TokenKind::Unary) => arity.unary = true,
                Some(token::TokenKind::Binary) => arity.binary = true,
                _ => {}
            }
            child.next_sibling_node();
        }

        arity
    }

    fn parse_kind(&self, child: &mut CstElement<'_>) -> Option<Namespace> {
        if child.node_kind() != Some(NodeKind::Kind) {
            return None;
        }

        let namespace = match child.first_child_element().token_kind() {
            Some(token::TokenKind::Def) => Namespace::Defs,
            Some(token::TokenKind::Type) => Namespace::Types,
            Some(token::TokenKind::Topic) => Namespace::Topics,
            _ => Namespace::Mixed,
        };
        child.next_sibling_node();
        Some(namespace)
    }

    /// `from P import kind? arity? (_ | clauses…)`
    pub(crate) fn parse_import(&self, topdef: &CstElement<'_>, imports: &mut Imports) {
        let mut child = topdef.first_child_node();
        let pkgname = self.identifier(&child);
        child.next_sibling_node();

        let namespace = self.parse_kind(&mut child).unwrap_or(Namespace::Mixed);
        let arity = self.parse_arity(&mut child);

        // wildcard import: no clause nodes at all
        if child.empty() {
            imports.import_all.push(pkgname);
            return;
        }

        while !child.empty() {
            if child.node_kind() != Some(NodeKind::IdEq) {
                child.next_sibling_node();
                continue;
            }

            if let Some((name, source)) = self.parse_clause(&child, pkgname, arity, true) {
                let target = match namespace {
                    Namespace::Mixed => &mut imports.mixed,
                    Namespace::Defs => &mut imports.defs,
                    Namespace::Types => &mut imports.types,
                    Namespace::Topics => &mut imports.topics,
                };

                match target.entry(name.into()) {
                    std::collections::btree_map::Entry::Vacant(entry) => {
                        entry.insert(SymbolSource::imported(child.span(), source));
                    }
                    std::collections::btree_map::Entry::Occupied(entry) => {
                        self.previously(
                            child.span(),
                            format!(
                                "{} ‘{name}’ was previously imported",
                                namespace.describe(),
                            ),
                            entry.get().location,
                        );
                    }
                }
            }

            child.next_sibling_node();
        }
    }

    /// Read one `name` / `name = source` clause, applying the operator
    /// arity rewriting.
    fn parse_clause(
        &self,
        clause: &CstElement<'_>,
        pkgname: Atom,
        arity: ImportArity,
        import: bool,
    ) -> Option<(Atom, Atom)> {
        let mut ideq = clause.first_child_node();
        let first_op = ideq.node_kind() == Some(NodeKind::Op);
        let first = self.identifier(&ideq);
        ideq.next_sibling_node();

        let (local_op, source_op, local_name, source_name) = if ideq.empty() {
            (first_op, first_op, first, first)
        } else {
            let second_op = ideq.node_kind() == Some(NodeKind::Op);
            let second = self.identifier(&ideq);
            if second_op == first_op || arity.any() {
                (first_op, second_op, first, second)
            } else if import {
                // changing between word and operator spelling needs an
                // explicit arity
                self.error(
                    clause.span(),
                    format!(
                        "keyword ‘binary’ or ‘unary’ required when changing symbol type for {}",
                        lexer::printable_quote(self.content(clause)),
                    ),
                );
                (second_op, second_op, second, second)
            } else {
                (first_op, second_op, first, second)
            }
        };

        if !import && (local_op || source_op) && !arity.any() {
            self.error(
                clause.span(),
                format!(
                    "export of {} must specify ‘unary’ or ‘binary’",
                    lexer::printable_quote(self.content(clause)),
                ),
            );
            return None;
        }

        let local = if local_op {
            Atom::from(arity.prefix(local_name.to_str()))
        } else {
            local_name
        };
        let source = if source_op {
            Atom::from(arity.prefix(&format!("{source_name}@{pkgname}")))
        } else {
            Atom::from(format!("{source_name}@{pkgname}"))
        };

        Some((local, source))
    }

    /// `from P export kind arity? clauses…` — mirrors an import but also
    /// re-exports the names.
    pub(crate) fn parse_export(&self, topdef: &CstElement<'_>, package: &mut Package) {
        let mut child = topdef.first_child_node();
        let pkgname = self.identifier(&child);
        child.next_sibling_node();

        let Some(namespace) = self.parse_kind(&mut child) else {
            self.error(
                child.span(),
                "‘from … export’ must be followed by ‘def’, ‘type’, or ‘topic’".into(),
            );
            return;
        };
        let arity = self.parse_arity(&mut child);

        let Package { exports, files, .. } = package;
        let local_scope = &mut files.last_mut().expect("package without a file").local;

        let (exports, local) = match namespace {
            Namespace::Defs => (&mut exports.defs, &mut local_scope.defs),
            Namespace::Types => (&mut exports.types, &mut local_scope.types),
            Namespace::Topics | Namespace::Mixed => (&mut exports.topics, &mut local_scope.topics),
        };

        while !child.empty() {
            if child.node_kind() != Some(NodeKind::IdEq) {
                child.next_sibling_node();
                continue;
            }

            if let Some((name, source)) = self.parse_clause(&child, pkgname, arity, false) {
                exports
                    .entry(name.into())
                    .or_insert_with(|| SymbolSource::imported(child.span(), source));
                // duplicates are detected as file-local conflicts

                match local.entry(name.into()) {
                    std::collections::btree_map::Entry::Vacant(entry) => {
                        entry.insert(SymbolSource::imported(child.span(), source));
                    }
                    std::collections::btree_map::Entry::Occupied(entry) => {
                        self.previously(
                            child.span(),
                            format!(
                                "{} ‘{name}’ was previously defined",
                                namespace.describe(),
                            ),
                            entry.get().location,
                        );
                    }
                }
            }

            child.next_sibling_node();
        }
    }

    /// `flags? topic t: τ`
    pub(crate) fn parse_topic(
        &self,
        topdef: &CstElement<'_>,
        package: &mut Package,
        globals: &mut Symbols,
    ) {
        let mut child = topdef.first_child_node();
        let flags = self.parse_flags(&mut child);

        let id = self.identifier(&child);
        let location = child.span();
        if name_kind(id.to_str()) != NameKind::Lower {
            self.error(location, format!("topic identifier ‘{id}’ is not lower-case"));
            return;
        }
        child.next_sibling_node();

        let signature = self.parse_type(&child);
        // topics may not leave type variables open
        self.check_closed_type(&signature);

        let file = package.files.last_mut().expect("package without a file");
        match file.topics.entry(id.into()) {
            std::collections::btree_map::Entry::Vacant(entry) => {
                entry.insert(Topic { location, signature });
            }
            std::collections::btree_map::Entry::Occupied(entry) => {
                self.previously(
                    location,
                    format!("topic ‘{id}’ was previously defined"),
                    entry.get().location,
                );
                return;
            }
        }

        if flags.export {
            package
                .exports
                .topics
                .entry(id.into())
                .or_insert_with(|| SymbolSource::leaf(location));
        }
        if flags.global {
            globals
                .topics
                .entry(id.into())
                .or_insert_with(|| SymbolSource::leaf(location));
        }
    }

    /// Bind a type name into the package scope plus the requested
    /// export/global scopes.
    fn bind_type(
        &self,
        package_types: &mut ast::symbols::SymbolMap,
        exports: Option<&mut Symbols>,
        globals: Option<&mut Symbols>,
        name: Atom,
        location: Span,
    ) {
        if let Some(globals) = globals {
            globals
                .types
                .entry(name.into())
                .or_insert_with(|| SymbolSource::leaf(location));
        }
        if let Some(exports) = exports {
            exports
                .types
                .entry(name.into())
                .or_insert_with(|| SymbolSource::leaf(location));
        }

        match package_types.entry(name.into()) {
            std::collections::btree_map::Entry::Vacant(entry) => {
                entry.insert(SymbolSource::leaf(location));
            }
            std::collections::btree_map::Entry::Occupied(entry) => {
                self.previously(
                    location,
                    format!("type ‘{name}’ was previously defined"),
                    entry.get().location,
                );
            }
        }
    }

    /// `flags? data T a … = C1 … | C2 …`
    pub(crate) fn parse_data(
        &self,
        topdef: &CstElement<'_>,
        package: &mut Package,
        globals: &mut Symbols,
    ) {
        let mut child = topdef.first_child_node();
        let flags = self.parse_flags(&mut child);

        let mut sum = ast::Sum::new(self.parse_type(&child));
        if sum.args.is_empty() && name_kind(sum.name.to_str()) == NameKind::Lower {
            self.error(
                child.span(),
                format!("data type ‘{}’ must be upper-case or an operator", sum.name),
            );
        }
        child.next_sibling_node();

        while !child.empty() {
            if child.node_kind() == Some(NodeKind::Error) {
                child.next_sibling_node();
                continue;
            }
            let cons = self.parse_type(&child);
            if let Some(tag) = &cons.tag {
                self.error(
                    cons.region,
                    format!("constructor ‘{}’ should not be tagged with ‘{tag}’", cons.name),
                );
            }
            if cons.args.is_empty() && name_kind(cons.name.to_str()) == NameKind::Lower {
                self.error(
                    cons.token,
                    format!("constructor ‘{}’ must be upper-case or an operator", cons.name),
                );
            }
            sum.add_constructor(cons);
            child.next_sibling_node();
        }

        let sum = Arc::new(sum);
        let Package { name, exports, package: scope, files } = package;
        let file = files.last_mut().expect("package without a file");

        self.bind_type(
            &mut scope.types,
            flags.export.then_some(&mut *exports),
            flags.global.then_some(&mut *globals),
            sum.name,
            sum.token,
        );

        for constructor in &sum.members {
            let token = constructor.ast.token;
            let mut construct = BareExpr::Construct {
                sum: Arc::clone(&sum),
                ctor: constructor.index,
            }
            .at(token);
            for _ in 0..constructor.arity() {
                construct = lambda("_", construct, token);
            }

            self.bind_def(
                &mut file.content,
                Definition {
                    name: constructor.ast.name,
                    location: token,
                    body: construct,
                    type_vars: Vec::new(),
                },
                flags.export.then_some(&mut *exports),
                flags.global.then_some(&mut *globals),
            );
        }

        if *name == Some(Atom::WAKE) {
            special::check_special(&sum);
        }
    }

    /// `flags? tuple T a … = field: τ | …` with per-field visibility and
    /// synthesized `get`/`set`/`edit` accessors.
    pub(crate) fn parse_tuple(
        &self,
        topdef: &CstElement<'_>,
        package: &mut Package,
        globals: &mut Symbols,
    ) {
        let mut child = topdef.first_child_node();
        let flags = self.parse_flags(&mut child);

        let mut sum = ast::Sum::new(self.parse_type(&child));
        if name_kind(sum.name.to_str()) != NameKind::Upper {
            self.error(
                child.span(),
                format!("tuple type ‘{}’ must be upper-case", sum.name),
            );
        }
        child.next_sibling_node();

        let mut tuple = Ast::new(sum.token, sum.name);
        tuple.region = sum.region;
        let mut member_flags = Vec::new();

        while !child.empty() {
            if child.node_kind() != Some(NodeKind::TupleElt) {
                child.next_sibling_node();
                continue;
            }
            let mut elt = child.first_child_node();
            member_flags.push(self.parse_flags(&mut elt));
            let field = self.parse_type(&elt);
            if field.tag.is_none() {
                self.error(field.region, "tuple field must be tagged with a field name".into());
            }
            tuple.args.push(field);
            child.next_sibling_node();
        }

        sum.add_constructor(tuple);
        let sum = Arc::new(sum);
        let constructor = &sum.members[0];
        let members = constructor.ast.args.len();

        let mut construct = BareExpr::Construct { sum: Arc::clone(&sum), ctor: 0 }
            .at(constructor.ast.token);
        for index in (0..members).rev() {
            let binder = constructor.ast.args[index]
                .tag
                .map_or("_", |tag| tag.to_str());
            construct = lambda(binder, construct, constructor.ast.token);
        }

        let Package { name, exports, package: scope, files } = package;
        let file = files.last_mut().expect("package without a file");

        self.bind_type(
            &mut scope.types,
            flags.export.then_some(&mut *exports),
            flags.global.then_some(&mut *globals),
            sum.name,
            sum.token,
        );
        self.bind_def(
            &mut file.content,
            Definition {
                name: sum.name,
                location: constructor.ast.token,
                body: construct,
                type_vars: Vec::new(),
            },
            flags.export.then_some(&mut *exports),
            flags.global.then_some(&mut *globals),
        );

        if *name == Some(Atom::WAKE) {
            special::check_special(&sum);
        }

        // synthesize the get/set/edit accessors
        for (index, field_flags) in member_flags.iter().enumerate() {
            let field = &sum.members[0].ast.args[index];
            let Some(tag) = field.tag else { continue };
            if name_kind(tag.to_str()) != NameKind::Upper {
                continue;
            }
            let token = field.region;
            let type_name = sum.name;

            // getTF = \_ Get(T, i)
            let get = lambda(
                "_",
                BareExpr::Get { sum: Arc::clone(&sum), ctor: 0, field: index }.at(token),
                token,
            )
            .flagged(FLAG_SYNTHETIC);
            self.bind_def(
                &mut file.content,
                Definition {
                    name: Atom::from(format!("get{type_name}{tag}")),
                    location: token,
                    body: get,
                    type_vars: Vec::new(),
                },
                field_flags.export.then_some(&mut *exports),
                field_flags.global.then_some(&mut *globals),
            );

            // editTF fn v rebuilds v with slot i passed through fn
            let mut edit_map = DefMap {
                body: Some(Box::new(
                    BareExpr::Construct { sum: Arc::clone(&sum), ctor: 0 }.at(token),
                )),
                ..DefMap::default()
            };
            for inner in 0..members {
                let mut select =
                    BareExpr::Get { sum: Arc::clone(&sum), ctor: 0, field: inner }.at(token);
                if inner == index {
                    select = apply(
                        BareExpr::VarRef { name: Atom::from(format!("fn{tag}")) }.at(token),
                        apply(
                            lambda("_", select, token),
                            BareExpr::VarRef { name: Atom::from("_ x") }.at(token),
                            token,
                        ),
                        token,
                    );
                }
                edit_map.defs.insert(
                    Atom::from(format!("_ a{:04}", members - inner)).into(),
                    DefValue::new(token, select),
                );
            }
            let edit = lambda(
                &format!("fn{tag}"),
                lambda("_ x", BareExpr::DefMap(edit_map).at(token), token),
                token,
            )
            .flagged(FLAG_SYNTHETIC);
            self.bind_def(
                &mut file.content,
                Definition {
                    name: Atom::from(format!("edit{type_name}{tag}")),
                    location: token,
                    body: edit,
                    type_vars: Vec::new(),
                },
                field_flags.export.then_some(&mut *exports),
                field_flags.global.then_some(&mut *globals),
            );

            // setTF x v rebuilds v with slot i replaced by x
            let mut set_map = DefMap {
                body: Some(Box::new(
                    BareExpr::Construct { sum: Arc::clone(&sum), ctor: 0 }.at(token),
                )),
                ..DefMap::default()
            };
            for inner in 0..members {
                let select = if inner == index {
                    BareExpr::VarRef { name: tag }.at(token)
                } else {
                    BareExpr::Get { sum: Arc::clone(&sum), ctor: 0, field: inner }.at(token)
                };
                set_map.defs.insert(
                    Atom::from(format!("_ a{:04}", members - inner)).into(),
                    DefValue::new(token, select),
                );
            }
            let set = lambda(
                tag.to_str(),
                lambda("_ x", BareExpr::DefMap(set_map).at(token), token),
                token,
            )
            .flagged(FLAG_SYNTHETIC);
            self.bind_def(
                &mut file.content,
                Definition {
                    name: Atom::from(format!("set{type_name}{tag}")),
                    location: token,
                    body: set,
                    type_vars: Vec::new(),
                },
                field_flags.export.then_some(&mut *exports),
                field_flags.global.then_some(&mut *globals),
            );
        }
    }

    /// Top-level `def`/`target`/`publish`.
    pub(crate) fn parse_top_def(
        &self,
        topdef: &CstElement<'_>,
        package: &mut Package,
        globals: &mut Symbols,
    ) {
        let mut child = topdef.first_child_node();
        let flags = self.parse_flags(&mut child);

        let Package { exports, files, .. } = package;
        let file = files.last_mut().expect("package without a file");
        let map = &mut file.content;

        match topdef.node_kind() {
            Some(NodeKind::Def) => {
                let index = map.defs.len();
                for definition in self.parse_def_parts(child, index, false, false) {
                    self.bind_def(
                        map,
                        definition,
                        flags.export.then_some(&mut *exports),
                        flags.global.then_some(&mut *globals),
                    );
                }
            }
            Some(NodeKind::Target) => {
                self.bind_target_parts(
                    child,
                    map,
                    flags.export.then_some(&mut *exports),
                    flags.global.then_some(&mut *globals),
                );
            }
            Some(NodeKind::Publish) => {
                let mut defs = self.parse_def_parts(child, 0, false, true);
                if let Some(mut definition) = defs.pop() {
                    // publishes stack up; each gets a fresh unlexable name
                    definition.name = Atom::from(format!(
                        "publish {} {}",
                        definition.name,
                        map.defs.len(),
                    ));
                    self.bind_def(map, definition, None, None);
                }
            }
            _ => {}
        }
    }

    /// Lower a `target` statement: the table binding plus the memoized
    /// definition.
    pub(crate) fn bind_target(
        &self,
        topdef: &CstElement<'_>,
        map: &mut DefMap,
        exports: Option<&mut Symbols>,
        globals: Option<&mut Symbols>,
    ) {
        let child = topdef.first_child_node();
        self.bind_target_parts(child, map, exports, globals);
    }

    fn bind_target_parts(
        &self,
        child: CstElement<'_>,
        map: &mut DefMap,
        exports: Option<&mut Symbols>,
        globals: Option<&mut Symbols>,
    ) {
        let mut defs = self.parse_def_parts(child, 0, true, false);
        let Some(definition) = defs.pop() else { return };

        // the process-wide memo table, created once per target
        let at = definition.body.span;
        let table = apply(
            lambda("_", BareExpr::Prim { name: Atom::TNEW }.at(at), at),
            BareExpr::Literal(Literal {
                value: Atom::from(self.file.location(at).to_string()),
                kind: LiteralKind::String,
            })
            .at(at),
            at,
        );
        self.bind_def(
            map,
            Definition {
                name: Atom::from(format!("table {}", definition.name)),
                location: at,
                body: table,
                type_vars: Vec::new(),
            },
            None,
            None,
        );

        self.bind_def(map, definition, exports, globals);
    }

    /// Bind one definition into a `DefMap`, registering export/global
    /// visibility; anonymous `_` definitions get fresh names.
    pub(crate) fn bind_def(
        &self,
        map: &mut DefMap,
        mut def: Definition,
        exports: Option<&mut Symbols>,
        globals: Option<&mut Symbols>,
    ) {
        if def.name != Atom::UNDERSCORE {
            if let Some(globals) = globals {
                globals
                    .defs
                    .entry(def.name.into())
                    .or_insert_with(|| SymbolSource::leaf(def.location));
            }
            if let Some(exports) = exports {
                exports
                    .defs
                    .entry(def.name.into())
                    .or_insert_with(|| SymbolSource::leaf(def.location));
            }
            // duplicates are detected as file-local conflicts
        } else {
            def.name = Atom::from(format!("_{} _", map.defs.len()));
        }

        let at = def.body.span;
        match map.defs.entry(def.name.into()) {
            std::collections::btree_map::Entry::Vacant(entry) => {
                let mut value = DefValue::new(def.location, def.body);
                value.type_vars = def.type_vars;
                entry.insert(value);
            }
            std::collections::btree_map::Entry::Occupied(entry) => {
                self.previously(
                    at,
                    format!("definition ‘{}’ was previously defined", def.name),
                    entry.get().body.span,
                );
            }
        }
    }

    /// The shared `def`/`target`/`publish` lowering, fed the cursor just
    /// past the flag nodes.
    pub(crate) fn parse_def(
        &self,
        topdef: &CstElement<'_>,
        index: usize,
        target: bool,
        publish: bool,
    ) -> Vec<Definition> {
        self.parse_def_parts(topdef.first_child_node(), index, target, publish)
    }

    fn parse_def_parts(
        &self,
        mut child: CstElement<'_>,
        index: usize,
        target: bool,
        publish: bool,
    ) -> Vec<Definition> {
        let mut state = PatternState::new(false);
        let mut ast = self.parse_pattern(&child, &mut state);
        if ast.name.to_str().is_empty() {
            ast.name = Atom::UNDEF;
        }
        let name = ast.name;
        ast.name = Atom::from("");
        self.check_constructors(&ast);
        child.next_sibling_node();

        let mut extract = match name_kind(name.to_str()) {
            NameKind::Upper => true,
            NameKind::Operator => state.top_paren,
            NameKind::Lower => false,
        };
        if extract && (target || publish) {
            self.error(
                ast.token,
                "upper-case identifier cannot be used as a target or publish name".into(),
            );
            extract = false;
        }

        // for targets, arguments before `\` form the cache key
        let tohash = ast.args.len();
        if target && child.node_kind() == Some(NodeKind::Lambda) {
            let sub = child.first_child_node();
            let mut substate = PatternState::new(false);
            let row = self.pattern_row(&sub, &mut substate);
            ast.args.extend(row);
            ast.region = ast.region.merge(&child.span());
            child.next_sibling_node();
        }

        let head = ast.region;

        let body = if child.empty() {
            bad(head, "bad def")
        } else {
            self.lower_body(&child)
        };

        // record type variables before the ascriptions are ripped apart
        let mut type_vars = Vec::new();
        ast.type_vars(&mut type_vars);

        if extract {
            ast.name = name;
            let mut out = Vec::new();
            let mut counter = index;
            self.extract_def(&mut out, &mut counter, ast, &type_vars, body);
            return out;
        }

        // a pattern match is needed when any argument destructures;
        // annotated arguments shadow through an ascription instead
        let pattern = ast.args.iter().any(|arg| {
            matches!(
                name_kind(arg.name.to_str()),
                NameKind::Operator | NameKind::Upper
            )
        });
        let typed = ast.args.iter().any(|arg| arg.ty.is_some());

        let signature = ast.ty.take();
        let token = ast.token;
        let mut args: Vec<(Atom, Span)> = Vec::new();
        let mut body = body;

        if pattern {
            let nargs = ast.args.len();
            let mut lowered = Match::new();
            let clause_pattern = if nargs > 1 {
                ast
            } else {
                ast.args.into_iter().next().expect("patterned def without arguments")
            };
            for position in 0..nargs {
                let binder = Atom::from(format!("_ {position}"));
                args.push((binder, Span::default()));
                lowered
                    .args
                    .push(BareExpr::VarRef { name: binder }.at(head));
            }
            lowered.patterns.push(MatchClause {
                pattern: clause_pattern,
                expr: body,
                guard: None,
            });
            body = BareExpr::Match(lowered).at(head);
        } else if typed {
            let mut shadow = DefMap::default();
            for arg in &mut ast.args {
                args.push((arg.name, arg.token));
                if let Some(ty) = arg.ty.take() {
                    shadow.defs.insert(
                        Atom::from(format!("_type {}", arg.name)).into(),
                        DefValue::new(
                            arg.region,
                            BareExpr::Ascribe {
                                signature: *ty,
                                body: Box::new(
                                    BareExpr::VarRef { name: arg.name }.at(arg.token),
                                ),
                            }
                            .at(arg.region),
                        ),
                    );
                }
            }
            shadow.body = Some(Box::new(body));
            body = BareExpr::DefMap(shadow).at(head);
        } else {
            for arg in &ast.args {
                args.push((arg.name, arg.token));
            }
        }

        if let Some(signature) = signature {
            let at = body.span;
            body = BareExpr::Ascribe { signature: *signature, body: Box::new(body) }.at(at);
        }

        if target {
            if tohash == 0 {
                self.error(
                    head,
                    "target definition must have at least one hashed argument".into(),
                );
            }
            let at = body.span;

            let mut hash = BareExpr::Prim { name: Atom::HASH }.at(at);
            for _ in 0..tohash {
                hash = lambda("_", hash, at);
            }
            for (binder, _) in &args[..tohash.min(args.len())] {
                hash = apply(hash, BareExpr::VarRef { name: *binder }.at(at), at);
            }

            let mut subhash = BareExpr::Prim { name: Atom::HASH }.at(at);
            for _ in tohash..args.len() {
                subhash = lambda("_", subhash, at);
            }
            for (binder, _) in &args[tohash.min(args.len())..] {
                subhash = apply(subhash, BareExpr::VarRef { name: *binder }.at(at), at);
            }

            let generator = lambda("_", body, at);
            let tget = lambda("_fn", BareExpr::Prim { name: Atom::TGET }.at(at), at);
            body = apply(
                apply(
                    apply(
                        apply(
                            lambda("_target", lambda("_hash", lambda("_subhash", tget, at), at), at),
                            BareExpr::VarRef { name: Atom::from(format!("table {name}")) }.at(at),
                            at,
                        ),
                        hash,
                        at,
                    ),
                    subhash,
                    at,
                ),
                generator,
                at,
            );
        }

        if publish && !args.is_empty() {
            self.error(head, "publish definition may not be a function".into());
        } else {
            for (binder, binder_token) in args.into_iter().rev() {
                let at = head;
                let mut wrapped = lambda(binder.to_str(), body, at);
                if let BareExpr::Lambda { token: slot, .. } = &mut wrapped.bare {
                    *slot = binder_token;
                }
                body = wrapped;
            }
        }

        vec![Definition { name, location: token, body, type_vars }]
    }

    /// Destructuring definitions: `def Pair x y = e` extracts each
    /// component through a generated match.
    fn extract_def(
        &self,
        out: &mut Vec<Definition>,
        counter: &mut usize,
        mut ast: Ast,
        type_vars: &[ScopedTypeVar],
        body: Expr,
    ) {
        *counter += 1;
        let key = Atom::from(format!("_ extract {counter}"));
        let body_span = body.span;
        out.push(Definition {
            name: key,
            location: ast.token,
            body,
            type_vars: type_vars.to_vec(),
        });

        let parent_name = ast.name;
        let mut parent_ty = ast.ty.take();
        let region = ast.region;
        let members = std::mem::take(&mut ast.args);
        let arity = members.len();

        for (position, mut member) in members.into_iter().enumerate() {
            let mut pattern = Ast::new(region, parent_name);
            pattern.region = region;
            pattern.ty = parent_ty.take();

            let shadow = Atom::from(format!("_{}", member.name));
            for inner in 0..arity {
                let mut hole = Ast::new(member.token, Atom::UNDERSCORE);
                if inner == position {
                    hole.name = shadow;
                    hole.ty = member.ty.take();
                }
                pattern.args.push(hole);
            }

            let mut projection = Match::new();
            projection
                .args
                .push(BareExpr::VarRef { name: key }.at(body_span));
            projection.patterns.push(MatchClause {
                pattern,
                expr: BareExpr::VarRef { name: shadow }.at(member.token),
                guard: None,
            });
            let projection = BareExpr::Match(projection).at(member.token);

            match name_kind(member.name.to_str()) {
                NameKind::Upper | NameKind::Operator => {
                    self.extract_def(out, counter, member, type_vars, projection);
                }
                NameKind::Lower => {
                    out.push(Definition {
                        name: member.name,
                        location: member.token,
                        body: projection,
                        type_vars: type_vars.to_vec(),
                    });
                }
            }
        }
    }
}
