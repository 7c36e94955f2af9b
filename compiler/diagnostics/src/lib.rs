//! The diagnostics system.

pub use reporter::{Buffer, Reporter};
use span::{SourceFile, Span, Spanning};
use utility::Str;

mod render;
pub mod reporter;

/// A structured diagnostic message, optionally with source locations.
///
/// The pipeline never aborts on a diagnostic: every component records it,
/// synthesizes a placeholder, and continues.
#[derive(PartialEq, Eq, Debug)]
#[must_use]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: Option<Str>,
    pub highlights: Vec<Highlight>,
    pub notes: Vec<Str>,
}

impl Diagnostic {
    fn new(severity: Severity) -> Self {
        Self {
            severity,
            message: None,
            highlights: Vec::new(),
            notes: Vec::new(),
        }
    }

    /// Create a diagnostic for a user error.
    pub fn error() -> Self {
        Self::new(Severity::Error)
    }

    pub fn warning() -> Self {
        Self::new(Severity::Warning)
    }

    pub fn info() -> Self {
        Self::new(Severity::Info)
    }

    /// Add a text message describing the issue.
    ///
    /// The message should not contain line breaks, not start with an upper
    /// case letter and not end in a punctuation mark. Source code snippets
    /// are surrounded by directional single quotation marks.
    pub fn message(mut self, message: impl Into<Str>) -> Self {
        self.message = Some(message.into());
        self
    }

    fn highlight(mut self, spanning: impl Spanning, label: Option<Str>, role: Role) -> Self {
        self.highlights.push(Highlight {
            span: spanning.span(),
            label,
            role,
        });
        self
    }

    /// Reference a code snippet as one of the focal points of the diagnostic.
    pub fn unlabeled_span(self, spanning: impl Spanning) -> Self {
        self.highlight(spanning, None, Role::Primary)
    }

    /// Reference and label a code snippet as one of the focal points of the diagnostic.
    pub fn span(self, spanning: impl Spanning, label: impl Into<Str>) -> Self {
        self.highlight(spanning, Some(label.into()), Role::Primary)
    }

    /// Reference and label a code snippet as auxiliary information.
    pub fn secondary_span(self, spanning: impl Spanning, label: impl Into<Str>) -> Self {
        self.highlight(spanning, Some(label.into()), Role::Secondary)
    }

    /// Add further clarifying information.
    pub fn note(mut self, message: impl Into<Str>) -> Self {
        self.notes.push(message.into());
        self
    }

    pub fn with(self, builder: impl FnOnce(Self) -> Self) -> Self {
        builder(self)
    }

    /// Report the diagnostic.
    pub fn report(self, reporter: &Reporter) {
        reporter.report(self);
    }

    pub fn format(&self, file: Option<&SourceFile>) -> String {
        render::render(self, file)
    }

    /// The primary location of the diagnostic, if any.
    pub fn location(&self) -> Option<Span> {
        self.highlights
            .iter()
            .find(|highlight| highlight.role == Role::Primary)
            .or(self.highlights.first())
            .map(|highlight| highlight.span)
    }
}

/// Level of severity of a diagnostic.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug)]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl Severity {
    /// The numeric code of the severity on the reporting interface.
    pub const fn code(self) -> u8 {
        match self {
            Self::Error => 1,
            Self::Warning => 2,
            Self::Info => 3,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warning => "warning",
            Self::Info => "info",
        }
    }
}

/// A highlighted code snippet.
#[derive(PartialEq, Eq, Debug)]
pub struct Highlight {
    pub span: Span,
    pub role: Role,
    pub label: Option<Str>,
}

/// The role of a highlighted code snippet.
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub enum Role {
    /// A focal point of the diagnostic.
    Primary,
    /// An auxiliary note of the diagnostic.
    Secondary,
}
