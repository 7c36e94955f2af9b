//! Utility functionality and definitions.

use colored::Colorize;
use difference::{Changeset, Difference};
use std::fmt;

pub use atom::Atom;
pub use rustc_hash::{FxHashMap as HashMap, FxHashSet as HashSet};
pub use smallvec::smallvec;

pub mod atom;

pub const FILE_EXTENSION: &str = "wake";

pub type Str = std::borrow::Cow<'static, str>;

pub type SmallVec<T, const N: usize> = smallvec::SmallVec<[T; N]>;

#[macro_export]
macro_rules! obtain {
    ($expr:expr, $pat:pat $( if $guard:expr )? => $mapping:expr $(,)?) => {
        match $expr {
            $pat $( if $guard )? => Some($mapping),
            _ => None,
        }
    };
}

pub fn default<T: Default>() -> T {
    T::default()
}

pub trait GetFromEndExt {
    type Item;

    fn get_from_end(&self, index: usize) -> Option<&Self::Item>;
}

impl<T> GetFromEndExt for [T] {
    type Item = T;

    fn get_from_end(&self, index: usize) -> Option<&Self::Item> {
        self.get(self.len().checked_sub(index.checked_add(1)?)?)
    }
}

/// Render the difference between two multi-line strings for test output.
pub fn difference(original: &str, edit: &str, split: &str) -> String {
    use std::io::Write;

    let mut buffer = Vec::new();

    // the provided Display implementation for Changesets is unreadable when whitespace differs
    for difference in Changeset::new(original, edit, split).diffs {
        match difference {
            Difference::Same(lines) => {
                for line in lines.lines() {
                    writeln!(buffer, "{} {line}", " ".on_bright_white()).unwrap();
                }
            }
            Difference::Add(lines) => {
                for line in lines.lines().chain(lines.is_empty().then_some("")) {
                    writeln!(buffer, "{} {}", "+".black().on_green(), line.green()).unwrap();
                }
            }
            Difference::Rem(lines) => {
                for line in lines.lines().chain(lines.is_empty().then_some("")) {
                    writeln!(buffer, "{} {}", "-".black().on_red(), line.red()).unwrap();
                }
            }
        }
    }

    String::from_utf8(buffer).unwrap()
}

pub trait ListingExt {
    fn list(self, conjunction: Conjunction) -> String;
}

impl<I> ListingExt for I
where
    I: Iterator + Clone,
    I::Item: Clone + fmt::Display,
{
    fn list(self, conjunction: Conjunction) -> String {
        let mut this = self.peekable();
        let mut first = true;
        let mut result = String::new();

        while let Some(item) = this.next() {
            if !first {
                if this.peek().is_some() {
                    result += ", ";
                } else {
                    use std::fmt::Write;
                    write!(result, " {conjunction} ").unwrap();
                }
            }

            result += &item.to_string();
            first = false;
        }

        result
    }
}

#[derive(Clone, Copy)]
pub enum Conjunction {
    And,
    Or,
}

impl fmt::Display for Conjunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::And => "and",
            Self::Or => "or",
        })
    }
}

/// Use the singular or the plural form of the given word depending on the given amount.
///
/// # Examples
///
/// ```
/// # fn main() {
/// assert_eq!(utility::pluralize!(1, "factor"), "factor");
/// assert_eq!(utility::pluralize!(15, "factor"), "factors");
/// assert_eq!(utility::pluralize!(0, "person", "people"), "people");
/// # }
/// ```
#[macro_export]
macro_rules! pluralize {
    ($amount:expr, $singular:expr, $plural:expr $(,)?) => {
        match $amount {
            1 => std::borrow::Cow::<'_, str>::from($singular),
            _ => $plural.into(),
        }
    };
    ($amount:expr, $singular:literal $(,)?) => {
        match $amount {
            1 => $singular,
            _ => concat!($singular, "s"),
        }
    };
}

pub trait QuoteExt {
    fn quote(self) -> String;
}

impl<D: fmt::Display> QuoteExt for D {
    fn quote(self) -> String {
        format!("‘{self}’")
    }
}

#[macro_export]
macro_rules! quoted {
    ($code:expr) => {
        concat!("‘", $code, "’")
    };
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn listing_no_elements() {
        assert_eq!(std::iter::empty::<u32>().list(Conjunction::And), "");
    }

    #[test]
    fn listing_one_element() {
        assert_eq!(std::iter::once(1).list(Conjunction::Or), "1");
    }

    #[test]
    fn listing_two_elements() {
        assert_eq!([false, true].into_iter().list(Conjunction::And), "false and true");
    }

    #[test]
    fn listing_three_elements() {
        assert_eq!([1, 2, 3].into_iter().list(Conjunction::Or), "1, 2 or 3");
    }

    #[test]
    fn get_from_end() {
        let values = [1, 2, 3];
        assert_eq!(values.get_from_end(0), Some(&3));
        assert_eq!(values.get_from_end(2), Some(&1));
        assert_eq!(values.get_from_end(3), None);
    }
}
