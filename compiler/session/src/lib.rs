//! Packages, files and the per-compilation root.

use ast::{Ast, DefMap, Name, Symbols};
use span::Span;
use std::collections::BTreeMap;
use utility::Atom;

pub mod special;

/// A declared topic: a typed multi-writer channel whose cross-file
/// aggregation is the evaluator's job.
#[derive(Debug, PartialEq, Eq)]
pub struct Topic {
    pub location: Span,
    pub signature: Ast,
}

/// A single source unit.
#[derive(Debug, Default)]
pub struct File {
    pub content: DefMap,
    pub topics: BTreeMap<Name, Topic>,
    pub local: Symbols,
}

/// A package: possibly several files sharing one name.
///
/// `package` is their combined local scope, `exports` the union of their
/// exported names.
#[derive(Debug, Default)]
pub struct Package {
    pub name: Option<Atom>,
    pub exports: Symbols,
    pub package: Symbols,
    pub files: Vec<File>,
}

impl Package {
    /// A package under construction holding one file being desugared.
    pub fn with_file() -> Self {
        Self {
            files: vec![File::default()],
            ..Self::default()
        }
    }

    pub fn file(&mut self) -> &mut File {
        self.files.last_mut().expect("package without a file")
    }
}

/// The root of one compilation: every desugared package plus the
/// process-global names.
#[derive(Debug, Default)]
pub struct Top {
    pub packages: BTreeMap<Name, Package>,
    pub globals: Symbols,
}
