use crate::HashMap;
use std::{
    fmt,
    sync::{Mutex, OnceLock},
};

/// An interned string.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Atom(u32);

impl Atom {
    pub fn to_str(self) -> &'static str {
        Interner::the().lock().unwrap().get(self)
    }
}

impl From<&str> for Atom {
    fn from(value: &str) -> Self {
        Interner::the().lock().unwrap().intern_borrowed(value)
    }
}

impl From<String> for Atom {
    fn from(value: String) -> Self {
        Interner::the().lock().unwrap().intern_owned(value)
    }
}

impl fmt::Debug for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_str())
    }
}

impl fmt::Display for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_str())
    }
}

// Comparison by index would be fast but highly unintuitive and in most cases
// not what the user wants. Comparison by string has to be an explicit opt-in
// via `Atom::to_str`.

struct Interner {
    atoms: HashMap<&'static str, Atom>,
    strings: Vec<&'static str>,
}

impl Interner {
    fn the() -> &'static Mutex<Self> {
        static SELF: OnceLock<Mutex<Interner>> = OnceLock::new();

        SELF.get_or_init(|| Mutex::new(Interner::new()))
    }

    fn with(values: Vec<&'static str>) -> Self {
        Self {
            atoms: values
                .iter()
                .zip(0..)
                .map(|(&string, atom)| (string, Atom(atom)))
                .collect(),
            strings: values,
        }
    }

    fn intern_borrowed(&mut self, value: &str) -> Atom {
        if let Some(&atom) = self.atoms.get(value) {
            return atom;
        }

        self.insert(Box::leak(Box::from(value)))
    }

    fn intern_owned(&mut self, value: String) -> Atom {
        if let Some(&atom) = self.atoms.get(&*value) {
            return atom;
        }

        self.insert(String::leak(value))
    }

    fn insert(&mut self, value: &'static str) -> Atom {
        let atom = Atom(self.strings.len().try_into().unwrap());
        self.strings.push(value);
        self.atoms.insert(value, atom);
        atom
    }

    fn get(&self, atom: Atom) -> &'static str {
        self.strings[atom.0 as usize]
    }
}

macro_rules! atoms {
    ($( $atom:ident => $string:literal ),* $(,)?) => {
        impl Atom {
            atoms!(@consts 0; $( $atom => $string ),*);
        }

        impl Interner {
            fn new() -> Self {
                Self::with(vec![
                    $( $string ),*
                ])
            }
        }
    };
    (@consts $index:expr; $atom:ident => $string:literal $(, $rest:ident => $restring:literal )*) => {
        pub const $atom: Self = Self($index);
        atoms!(@consts $index + 1; $( $rest => $restring ),*);
    };
    (@consts $index:expr;) => {};
}

atoms! {
    UNDERSCORE => "_",
    WAKE => "wake",
    BUILTIN => "builtin",
    TRUE_AT_WAKE => "True@wake",
    FALSE_AT_WAKE => "False@wake",
    LT_AT_WAKE => "LT@wake",
    GT_AT_WAKE => "GT@wake",
    EQ_AT_WAKE => "EQ@wake",
    FORMAT => "format",
    CAT => "cat",
    HASH => "hash",
    TNEW => "tnew",
    TGET => "tget",
    ICMP => "icmp",
    DCMP_NAN_LT => "dcmp_nan_lt",
    RCMP => "rcmp",
    SCMP => "scmp",
    BAD_PRIM => "bad_prim",
    UNDEF => "undef",
    BOOLEAN => "Boolean",
    ORDER => "Order",
    LIST => "List",
    OPTION => "Option",
    RESULT => "Result",
    PAIR => "Pair",
    UNIT => "Unit",
}

#[cfg(test)]
mod test {
    use super::Atom;

    #[test]
    fn prefilled_atoms_resolve() {
        assert_eq!(Atom::UNDERSCORE.to_str(), "_");
        assert_eq!(Atom::WAKE.to_str(), "wake");
        assert_eq!(Atom::from("wake"), Atom::WAKE);
    }

    #[test]
    fn interning_is_idempotent() {
        let first = Atom::from("getPointX");
        let second = Atom::from("getPointX".to_owned());
        assert_eq!(first, second);
        assert_eq!(first.to_str(), "getPointX");
    }
}
