//! The diagnostic reporter.

use super::{Diagnostic, Severity};
use span::SourceFile;
use std::{
    cell::{Cell, RefCell},
    rc::Rc,
};

/// A callback receiving `(severity code, rendered location, message)`.
///
/// Severity codes are fixed: `1` error, `2` warning, `3` info.
pub type Callback = Box<dyn Fn(u8, Option<String>, &str)>;

/// A sink for diagnostics.
///
/// One reporter serves a whole compilation; the file under processing is
/// swapped in so locations can be rendered.
pub struct Reporter {
    kind: ReporterKind,
    file: RefCell<Option<Rc<SourceFile>>>,
    errors: Cell<usize>,
}

impl Reporter {
    fn new(kind: ReporterKind) -> Self {
        Self {
            kind,
            file: RefCell::new(None),
            errors: Cell::new(0),
        }
    }

    pub fn silent() -> Self {
        Self::new(ReporterKind::Silent)
    }

    pub fn buffer(diagnostics: Buffer) -> Self {
        Self::new(ReporterKind::Buffer(diagnostics))
    }

    pub fn stderr() -> Self {
        Self::new(ReporterKind::Stderr)
    }

    pub fn callback(callback: Callback) -> Self {
        Self::new(ReporterKind::Callback(callback))
    }

    #[must_use]
    pub fn with_file(self, file: Rc<SourceFile>) -> Self {
        *self.file.borrow_mut() = Some(file);
        self
    }

    /// Swap in the file whose diagnostics are reported next.
    pub fn set_file(&self, file: Rc<SourceFile>) {
        *self.file.borrow_mut() = Some(file);
    }

    /// The number of error-severity diagnostics reported so far.
    ///
    /// The caller decides from this whether the produced `Top` is fit for
    /// evaluation.
    pub fn error_count(&self) -> usize {
        self.errors.get()
    }

    pub fn reported_any_errors(&self) -> bool {
        self.errors.get() != 0
    }

    pub(super) fn report(&self, diagnostic: Diagnostic) {
        if diagnostic.severity == Severity::Error {
            self.errors.set(self.errors.get() + 1);
        }

        let file = self.file.borrow();
        let file = file.as_deref();

        match &self.kind {
            ReporterKind::Silent => {}
            ReporterKind::Buffer(diagnostics) => diagnostics.borrow_mut().push(diagnostic),
            ReporterKind::Stderr => {
                eprintln!("{}", diagnostic.format(file));
            }
            ReporterKind::Callback(callback) => {
                let location = diagnostic
                    .location()
                    .zip(file)
                    .map(|(span, file)| file.location(span).to_string());
                let message = diagnostic
                    .message
                    .as_deref()
                    .unwrap_or("unspecified diagnostic");
                callback(diagnostic.severity.code(), location, message);
            }
        }
    }
}

enum ReporterKind {
    Silent,
    Buffer(Buffer),
    Stderr,
    Callback(Callback),
}

pub type Buffer = Rc<RefCell<Vec<Diagnostic>>>;
