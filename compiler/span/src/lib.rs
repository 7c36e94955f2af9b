//! Data structures and procedures for handling source locations.

use std::{fmt, ops::Range};

pub use source::{FileName, SourceFile};

pub mod source;

/// A file-local byte index.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug, Hash, Default)]
pub struct ByteIndex(pub u32);

impl ByteIndex {
    pub const fn new(index: u32) -> Self {
        Self(index)
    }
}

impl std::ops::Add<u32> for ByteIndex {
    type Output = Self;

    fn add(self, offset: u32) -> Self::Output {
        Self(self.0 + offset)
    }
}

impl std::ops::Add<char> for ByteIndex {
    type Output = Self;

    fn add(self, character: char) -> Self::Output {
        self + character.len_utf8() as u32
    }
}

impl std::ops::Sub<u32> for ByteIndex {
    type Output = Self;

    fn sub(self, offset: u32) -> Self::Output {
        Self(self.0 - offset)
    }
}

impl TryFrom<usize> for ByteIndex {
    type Error = std::num::TryFromIntError;

    fn try_from(index: usize) -> Result<Self, Self::Error> {
        Ok(Self(index.try_into()?))
    }
}

impl From<ByteIndex> for usize {
    fn from(index: ByteIndex) -> Self {
        index.0 as usize
    }
}

/// A byte span of source code inside a single source file.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Span {
    /// The start of the span, inclusive.
    pub start: ByteIndex,
    /// The end of the span, exclusive.
    pub end: ByteIndex,
}

impl Span {
    #[cfg_attr(debug_assertions, track_caller)]
    pub fn new(start: ByteIndex, end: ByteIndex) -> Self {
        debug_assert!(start <= end, "span start ({}) > span end ({})", start.0, end.0);

        Self { start, end }
    }

    /// Create an empty span at the given index.
    pub fn empty(index: ByteIndex) -> Self {
        Self::new(index, index)
    }

    pub fn with_length(start: ByteIndex, length: u32) -> Self {
        Self::new(start, ByteIndex(start.0 + length))
    }

    pub fn length(self) -> u32 {
        self.end.0 - self.start.0
    }

    pub fn is_empty(self) -> bool {
        self.start == self.end
    }

    pub fn contains(self, index: ByteIndex) -> bool {
        self.start <= index && index <= self.end
    }

    pub fn start(self) -> Self {
        Self::empty(self.start)
    }

    pub fn end(self) -> Self {
        Self::empty(self.end)
    }

    pub fn set_end(&mut self, index: ByteIndex) {
        self.end = index;
    }

    #[must_use]
    pub fn trim(self, amount: u32) -> Self {
        self.trim_start(amount).trim_end(amount)
    }

    #[must_use]
    pub fn trim_start(self, amount: u32) -> Self {
        Self::new(self.start + amount, self.end)
    }

    #[must_use]
    pub fn trim_end(self, amount: u32) -> Self {
        Self::new(self.start, self.end - amount)
    }

    #[must_use]
    pub fn merge(self, other: &impl PossiblySpanning) -> Self {
        match other.possible_span() {
            Some(other) => Self::new(self.start, other.end),
            None => self,
        }
    }

    #[must_use]
    pub fn merge_into(self, other: &impl PossiblySpanning) -> Self {
        match other.possible_span() {
            Some(other) => Self::new(other.start, self.end),
            None => self,
        }
    }

    /// Similar to [`Self::merge`] except that the spans do not need to be disjoint.
    #[must_use]
    pub fn fit_end(self, other: &impl PossiblySpanning) -> Self {
        match other.possible_span() {
            Some(other) => Self::new(self.start, other.end),
            None => self,
        }
    }
}

impl fmt::Debug for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start.0, self.end.0)
    }
}

impl Spanning for Span {
    fn span(&self) -> Self {
        *self
    }
}

impl From<Span> for Range<usize> {
    fn from(span: Span) -> Self {
        span.start.into()..span.end.into()
    }
}

/// Convenience function for constructing a span in test code.
pub fn span(start: u32, end: u32) -> Span {
    Span::new(ByteIndex::new(start), ByteIndex::new(end))
}

pub trait Spanning: PossiblySpanning {
    fn span(&self) -> Span;
}

impl<S: Spanning> Spanning for &S {
    fn span(&self) -> Span {
        (**self).span()
    }
}

pub trait PossiblySpanning {
    fn possible_span(&self) -> Option<Span>;
}

impl<S: Spanning> PossiblySpanning for S {
    fn possible_span(&self) -> Option<Span> {
        Some(self.span())
    }
}

impl<S: Spanning> PossiblySpanning for Vec<S> {
    fn possible_span(&self) -> Option<Span> {
        self.first().map(|item| {
            let mut span = item.span();
            if let Some(last) = self.last() {
                span.end = last.span().end;
            }
            span
        })
    }
}

impl<S: PossiblySpanning> PossiblySpanning for Option<S> {
    fn possible_span(&self) -> Option<Span> {
        self.as_ref().and_then(PossiblySpanning::possible_span)
    }
}

/// A value with a source location attached.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Spanned<Bare> {
    pub bare: Bare,
    pub span: Span,
}

impl<Bare> Spanned<Bare> {
    pub const fn new(span: Span, bare: Bare) -> Self {
        Self { bare, span }
    }

    pub fn bare(bare: Bare) -> Self {
        Self { bare, span: Span::default() }
    }

    pub fn map<Output>(self, mapper: impl FnOnce(Bare) -> Output) -> Spanned<Output> {
        Spanned { bare: mapper(self.bare), span: self.span }
    }

    pub fn remap<Output>(self, bare: Output) -> Spanned<Output> {
        Spanned { bare, span: self.span }
    }

    pub const fn as_ref(&self) -> Spanned<&Bare> {
        Spanned { bare: &self.bare, span: self.span }
    }
}

impl<Bare> Spanning for Spanned<Bare> {
    fn span(&self) -> Span {
        self.span
    }
}

impl<Bare: fmt::Debug> fmt::Debug for Spanned<Bare> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} {:?}", self.bare, self.span)
    }
}

impl<Bare: fmt::Display> fmt::Display for Spanned<Bare> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.bare.fmt(f)
    }
}

/// A 1-indexed line/column pair.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Coordinates {
    pub line: u32,
    pub column: u32,
}

impl fmt::Display for Coordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}
