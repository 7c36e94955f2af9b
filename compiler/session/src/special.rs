//! The builtin-package registry.
//!
//! When the package named `wake` is desugared, its specially designated
//! sums (booleans, orderings, lists, options, results, pairs, unit) are
//! recorded process-wide so the desugarer's literal lowerings and the
//! evaluator can find them by name (`True@wake`, `LT@wake`, …).

use ast::Sum;
use std::sync::{Arc, Mutex, OnceLock};
use utility::{Atom, HashMap};

const SPECIAL: [Atom; 7] = [
    Atom::BOOLEAN,
    Atom::ORDER,
    Atom::LIST,
    Atom::OPTION,
    Atom::RESULT,
    Atom::PAIR,
    Atom::UNIT,
];

fn registry() -> &'static Mutex<HashMap<Atom, Arc<Sum>>> {
    static REGISTRY: OnceLock<Mutex<HashMap<Atom, Arc<Sum>>>> = OnceLock::new();

    REGISTRY.get_or_init(|| Mutex::new(HashMap::default()))
}

/// Record a sum of the builtin package if its name is specially
/// designated. Later registrations win so a re-run sees fresh trees.
pub fn check_special(sum: &Arc<Sum>) {
    if SPECIAL.contains(&sum.name) {
        registry().lock().unwrap().insert(sum.name, Arc::clone(sum));
    }
}

/// Look up a specially designated sum by name.
pub fn find_special(name: Atom) -> Option<Arc<Sum>> {
    registry().lock().unwrap().get(&name).cloned()
}

#[cfg(test)]
mod test {
    use super::{check_special, find_special};
    use ast::{Ast, Sum};
    use span::span;
    use std::sync::Arc;
    use utility::Atom;

    #[test]
    fn designated_sums_are_recorded() {
        let mut sum = Sum::new(Ast::new(span(0, 7), Atom::BOOLEAN));
        sum.add_constructor(Ast::new(span(10, 14), Atom::from("True")));
        sum.add_constructor(Ast::new(span(17, 22), Atom::from("False")));
        let sum = Arc::new(sum);

        check_special(&sum);
        let found = find_special(Atom::BOOLEAN).expect("Boolean should be registered");
        assert_eq!(found.members.len(), 2);
    }

    #[test]
    fn other_sums_are_ignored() {
        let sum = Arc::new(Sum::new(Ast::new(span(0, 5), Atom::from("Shape"))));
        check_special(&sum);
        assert!(find_special(Atom::from("Shape")).is_none());
    }
}
