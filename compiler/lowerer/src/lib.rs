//! The lowering stage (CST desugaring and early validation).
//!
//! Walks a file's CST and builds the desugared model: packages, symbol
//! tables and a small expression core. Surface constructs are rewritten:
//!
//! * `data`/`tuple` into sums with synthesized constructor values and
//!   `get`/`set`/`edit` accessors,
//! * `def`/`target`/`publish` into (possibly memoized) lambda chains,
//! * `match`/`require`/`if`/`\` into the single `Match` primitive,
//! * `_` placeholder sections into wrapping lambdas,
//! * string interpolation into `cat` chains.
//!
//! Lowering never aborts: every error is reported and replaced by a
//! neutral placeholder so the rest of the file still produces a `Top`.

use ast::{Name, SymbolSource, Symbols, SYM_LEAF};
use cst::{Cst, CstElement, NodeKind};
use diagnostics::{Diagnostic, Reporter};
use session::{Package, Top};
use span::{SourceFile, Span};
use utility::Atom;

mod decl;
mod expr;
mod pattern;
#[cfg(test)]
mod test;
mod ty;

/// Desugar one parsed file into the given `Top`, returning the package
/// name the file landed in.
pub fn lower(cst: &Cst, file: &SourceFile, top: &mut Top, reporter: &Reporter) -> Atom {
    let lowerer = Lowerer { file, reporter };
    lowerer.lower_top(cst.root(), top)
}

/// The state of the lowering pass over one file.
struct Lowerer<'a> {
    file: &'a SourceFile,
    reporter: &'a Reporter,
}

struct TopFlags {
    export: bool,
    global: bool,
}

impl<'a> Lowerer<'a> {
    fn error(&self, span: Span, message: String) {
        Diagnostic::error()
            .message(message)
            .unlabeled_span(span)
            .report(self.reporter);
    }

    fn previously(&self, span: Span, message: String, previous: Span) {
        Diagnostic::error()
            .message(message)
            .unlabeled_span(span)
            .secondary_span(previous, "previously defined here")
            .report(self.reporter);
    }

    /// The identifier spelled by a `CST_ID`/`CST_OP` node.
    fn identifier(&self, element: &CstElement<'_>) -> Atom {
        let leaf = element.first_child_element();
        Atom::from(lexer::relex_id(leaf.content(self.file.bytes())))
    }

    fn content(&self, element: &CstElement<'_>) -> &[u8] {
        element.content(self.file.bytes())
    }

    /// Read leading `CST_FLAG_GLOBAL`/`CST_FLAG_EXPORT` children.
    fn parse_flags(&self, child: &mut CstElement<'_>) -> TopFlags {
        let mut flags = TopFlags { export: false, global: false };

        loop {
            match child.node_kind() {
                Some(NodeKind::FlagGlobal) if !flags.global => flags.global = true,
                Some(NodeKind::FlagExport) if !flags.export => flags.export = true,
                _ => break,
            }
            child.next_sibling_node();
        }

        flags
    }

    fn lower_top(&self, root: CstElement<'_>, top: &mut Top) -> Atom {
        let mut package = Package::with_file();
        let mut globals = Symbols::default();

        let mut topdef = root.first_child_node();
        while !topdef.empty() {
            match topdef.node_kind() {
                Some(NodeKind::Package) => self.parse_package(&topdef, &mut package),
                Some(NodeKind::Import) => {
                    self.parse_import(&topdef, &mut package.file().content.imports);
                }
                Some(NodeKind::Export) => self.parse_export(&topdef, &mut package),
                Some(NodeKind::Topic) => self.parse_topic(&topdef, &mut package, &mut globals),
                Some(NodeKind::Data) => self.parse_data(&topdef, &mut package, &mut globals),
                Some(NodeKind::Tuple) => self.parse_tuple(&topdef, &mut package, &mut globals),
                Some(NodeKind::Def) | Some(NodeKind::Target) | Some(NodeKind::Publish) => {
                    self.parse_top_def(&topdef, &mut package, &mut globals);
                }
                // error nodes do not poison their siblings
                Some(NodeKind::Error) | None => {}
                Some(other) => {
                    self.error(
                        topdef.span(),
                        format!("unexpected {other:?} node at the top level"),
                    );
                }
            }
            topdef.next_sibling_node();
        }

        // a file without imports sees the standard package
        if package.file().content.imports.is_empty() {
            package.file().content.imports.import_all.push(Atom::WAKE);
        }

        // a file without a package declaration names one after itself
        let name = package
            .name
            .unwrap_or_else(|| Atom::from(self.file.stem()));
        package.name = Some(name);

        package.exports.set_package(name);
        globals.set_package(name);

        for conflict in top.globals.join(globals) {
            self.previously(
                conflict.location,
                format!("global ‘{}’ was previously defined", conflict.name),
                conflict.previous,
            );
        }

        self.qualify(&mut package, name);
        self.merge(top, package, name);

        name
    }

    fn parse_package(&self, topdef: &CstElement<'_>, package: &mut Package) {
        let child = topdef.first_child_node();
        let id = self.identifier(&child);

        if id == Atom::BUILTIN {
            self.error(child.span(), "package name ‘builtin’ is illegal".into());
        } else if let Some(previous) = package.name {
            self.error(
                topdef.span(),
                format!("package name redefined from ‘{previous}’ to ‘{id}’"),
            );
        } else {
            package.name = Some(id);
        }
    }

    /// Promote the file's top-level symbols to their qualified forms
    /// (`name@package`) and record them in the local scope.
    fn qualify(&self, package: &mut Package, name: Atom) {
        let file = package.files.last_mut().expect("package without a file");

        // definitions
        let defs = std::mem::take(&mut file.content.defs);
        for (def_name, value) in defs {
            let qualified = Atom::from(format!("{def_name}@{name}"));
            match file.local.defs.entry(def_name) {
                std::collections::btree_map::Entry::Vacant(entry) => {
                    entry.insert(SymbolSource::qualified_leaf(value.location, qualified));
                }
                std::collections::btree_map::Entry::Occupied(mut entry) => {
                    if entry.get().qualified == Some(qualified) {
                        // the definition behind an export of the same name:
                        // it becomes the leaf, shadowing the re-export
                        entry.get_mut().location = value.location;
                        entry.get_mut().flags |= SYM_LEAF;
                        if let Some(export) = package.exports.defs.get_mut(&def_name) {
                            export.flags |= SYM_LEAF;
                        }
                    } else {
                        self.previously(
                            value.location,
                            format!("definition ‘{def_name}’ was previously defined"),
                            entry.get().location,
                        );
                    }
                }
            }
            file.content.defs.insert(Name(qualified), value);
        }

        // topics
        for (topic_name, topic) in &file.topics {
            let qualified = Atom::from(format!("{topic_name}@{name}"));
            match file.local.topics.entry(*topic_name) {
                std::collections::btree_map::Entry::Vacant(entry) => {
                    entry.insert(SymbolSource::qualified_leaf(topic.location, qualified));
                }
                std::collections::btree_map::Entry::Occupied(mut entry) => {
                    if entry.get().qualified == Some(qualified) {
                        entry.get_mut().location = topic.location;
                        entry.get_mut().flags |= SYM_LEAF;
                        if let Some(export) = package.exports.topics.get_mut(topic_name) {
                            export.flags |= SYM_LEAF;
                        }
                    } else {
                        self.previously(
                            topic.location,
                            format!("topic ‘{topic_name}’ was previously defined"),
                            entry.get().location,
                        );
                    }
                }
            }
        }

        // types
        for (type_name, source) in &package.package.types {
            let qualified = Atom::from(format!("{type_name}@{name}"));
            match file.local.types.entry(*type_name) {
                std::collections::btree_map::Entry::Vacant(entry) => {
                    entry.insert(SymbolSource::qualified_leaf(source.location, qualified));
                }
                std::collections::btree_map::Entry::Occupied(mut entry) => {
                    if entry.get().qualified == Some(qualified) {
                        entry.get_mut().location = source.location;
                        entry.get_mut().flags |= SYM_LEAF;
                        if let Some(export) = package.exports.types.get_mut(type_name) {
                            export.flags |= SYM_LEAF;
                        }
                    } else {
                        self.previously(
                            source.location,
                            format!("type ‘{type_name}’ was previously defined"),
                            entry.get().location,
                        );
                    }
                }
            }
        }
    }

    /// Merge the file's package into the compilation root. Several files
    /// may share one package name; their scopes combine.
    fn merge(&self, top: &mut Top, mut package: Package, name: Atom) {
        match top.packages.entry(Name(name)) {
            std::collections::btree_map::Entry::Vacant(entry) => {
                package.package = package.files.last().expect("file").local.clone();
                entry.insert(package);
            }
            std::collections::btree_map::Entry::Occupied(mut entry) => {
                let existing = entry.get_mut();
                let file = package.files.pop().expect("file");
                for conflict in existing.package.join(file.local.clone()) {
                    self.previously(
                        conflict.location,
                        format!(
                            "package-local symbol ‘{}’ was previously defined",
                            conflict.name
                        ),
                        conflict.previous,
                    );
                }
                // duplicated exports were already reported as
                // package-local duplicates
                let _ = existing.exports.join(package.exports);
                existing.files.push(file);
            }
        }
    }
}
