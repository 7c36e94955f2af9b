//! Symbol tables.
//!
//! Three ordered maps per scope (definitions, types, topics). Iteration
//! order is independent of insertion order and duplicate detection is
//! first-wins: the second occurrence is the one reported.

use crate::Name;
use span::Span;
use std::collections::BTreeMap;
use utility::Atom;

/// Marks a [`SymbolSource`] as the defining binding rather than an
/// import or re-export.
pub const SYM_LEAF: u8 = 1 << 0;

/// Where a name in scope comes from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SymbolSource {
    pub location: Span,
    /// The canonical `name@package` identity; filled in once the package
    /// name is known for defining bindings.
    pub qualified: Option<Atom>,
    pub flags: u8,
}

impl SymbolSource {
    /// An imported or re-exported name with a known qualified source.
    pub fn imported(location: Span, qualified: Atom) -> Self {
        Self { location, qualified: Some(qualified), flags: 0 }
    }

    /// The defining binding itself; qualification happens later.
    pub fn leaf(location: Span) -> Self {
        Self { location, qualified: None, flags: SYM_LEAF }
    }

    pub fn qualified_leaf(location: Span, qualified: Atom) -> Self {
        Self { location, qualified: Some(qualified), flags: SYM_LEAF }
    }
}

pub type SymbolMap = BTreeMap<Name, SymbolSource>;

/// A scope's symbol tables.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct Symbols {
    pub defs: SymbolMap,
    pub types: SymbolMap,
    pub topics: SymbolMap,
}

/// A duplicate found while [joining](Symbols::join) two scopes.
#[derive(Debug, PartialEq, Eq)]
pub struct Conflict {
    pub name: Name,
    pub location: Span,
    pub previous: Span,
}

impl Symbols {
    pub fn is_empty(&self) -> bool {
        self.defs.is_empty() && self.types.is_empty() && self.topics.is_empty()
    }

    /// Qualify every defining binding as `name@package`.
    pub fn set_package(&mut self, package: Atom) {
        for map in [&mut self.defs, &mut self.types, &mut self.topics] {
            for (name, source) in map.iter_mut() {
                if source.qualified.is_none() {
                    source.qualified = Some(Atom::from(format!("{name}@{package}")));
                }
            }
        }
    }

    /// Merge `other` into `self`, first entry wins.
    ///
    /// The returned conflicts are only meaningful to report when the two
    /// scopes must be disjoint; re-exports of the same qualified source
    /// are not conflicts.
    pub fn join(&mut self, other: Symbols) -> Vec<Conflict> {
        let mut conflicts = Vec::new();

        for (target, source) in [
            (&mut self.defs, other.defs),
            (&mut self.types, other.types),
            (&mut self.topics, other.topics),
        ] {
            for (name, symbol) in source {
                match target.entry(name) {
                    std::collections::btree_map::Entry::Vacant(entry) => {
                        entry.insert(symbol);
                    }
                    std::collections::btree_map::Entry::Occupied(entry) => {
                        if entry.get().qualified != symbol.qualified
                            || entry.get().qualified.is_none()
                        {
                            conflicts.push(Conflict {
                                name,
                                location: symbol.location,
                                previous: entry.get().location,
                            });
                        }
                    }
                }
            }
        }

        conflicts
    }
}

#[cfg(test)]
mod test {
    use super::{SymbolSource, Symbols};
    use span::span;
    use utility::Atom;

    #[test]
    fn join_reports_the_second_location() {
        let mut first = Symbols::default();
        first
            .defs
            .insert("x".into(), SymbolSource::leaf(span(0, 1)));

        let mut second = Symbols::default();
        second
            .defs
            .insert("x".into(), SymbolSource::leaf(span(10, 11)));
        second
            .defs
            .insert("y".into(), SymbolSource::leaf(span(12, 13)));

        let conflicts = first.join(second);
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].name, "x".into());
        assert_eq!(conflicts[0].location, span(10, 11));
        assert_eq!(conflicts[0].previous, span(0, 1));
        // first wins
        assert_eq!(first.defs.get(&"x".into()).unwrap().location, span(0, 1));
        assert!(first.defs.contains_key(&"y".into()));
    }

    #[test]
    fn reexports_of_the_same_source_do_not_conflict() {
        let qualified = Atom::from("x@p");

        let mut first = Symbols::default();
        first
            .defs
            .insert("x".into(), SymbolSource::imported(span(0, 1), qualified));

        let mut second = Symbols::default();
        second
            .defs
            .insert("x".into(), SymbolSource::imported(span(5, 6), qualified));

        assert!(first.join(second).is_empty());
    }

    #[test]
    fn set_package_qualifies_leaves_only() {
        let mut symbols = Symbols::default();
        symbols.defs.insert("f".into(), SymbolSource::leaf(span(0, 1)));
        symbols.defs.insert(
            "g".into(),
            SymbolSource::imported(span(2, 3), Atom::from("g@other")),
        );

        symbols.set_package(Atom::from("p"));

        assert_eq!(
            symbols.defs.get(&"f".into()).unwrap().qualified,
            Some(Atom::from("f@p")),
        );
        assert_eq!(
            symbols.defs.get(&"g".into()).unwrap().qualified,
            Some(Atom::from("g@other")),
        );
    }
}
