use super::{ByteIndex, Coordinates, Span, Spanning};
use std::{cell::RefCell, fmt, io, ops::Range, path::PathBuf};

/// A source file.
///
/// Owns the content bytes and the newline table which maps byte offsets
/// to line/column coordinates. The newline table is filled in by the
/// offside processor as it passes each line break and must be cleared
/// before the file is lexed a second time.
pub struct SourceFile {
    name: FileName,
    content: String,
    newlines: RefCell<Vec<u32>>,
}

impl SourceFile {
    pub fn new(name: impl Into<FileName>, content: String) -> Self {
        Self {
            name: name.into(),
            content,
            newlines: RefCell::new(Vec::new()),
        }
    }

    /// Read a file from disk in full.
    pub fn load(path: PathBuf) -> io::Result<Self> {
        let content = std::fs::read_to_string(&path)?;
        Ok(Self::new(FileName::Path(path), content))
    }

    pub fn name(&self) -> &FileName {
        &self.name
    }

    /// The package name a file without a `package` declaration defaults to.
    pub fn stem(&self) -> &str {
        match &self.name {
            FileName::Path(path) => path
                .file_stem()
                .and_then(|stem| stem.to_str())
                .unwrap_or("anonymous"),
            FileName::Stdin => "stdin",
            FileName::Anonymous => "anonymous",
            FileName::Virtual(name) => name,
        }
    }

    /// The directory of the file, for `here` expressions.
    pub fn directory(&self) -> String {
        match &self.name {
            FileName::Path(path) => match path.parent() {
                Some(parent) if parent.as_os_str().is_empty() => ".".into(),
                Some(parent) => parent.display().to_string(),
                None => ".".into(),
            },
            _ => ".".into(),
        }
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn bytes(&self) -> &[u8] {
        self.content.as_bytes()
    }

    pub fn span(&self) -> Span {
        Span::with_length(ByteIndex::new(0), self.content.len() as u32)
    }

    /// Register a line break. `start_of_line` is the byte offset of the
    /// first column of the following line.
    ///
    /// Offsets at or before the last registered one are ignored which keeps
    /// the table strictly increasing.
    pub fn add_newline(&self, start_of_line: ByteIndex) {
        let mut newlines = self.newlines.borrow_mut();
        if newlines.last().map_or(true, |&last| last < start_of_line.0) {
            newlines.push(start_of_line.0);
        }
    }

    /// Reset the newline table. Must be called before a re-lex.
    pub fn clear_newlines(&self) {
        self.newlines.borrow_mut().clear();
    }

    /// Map a byte offset to 1-indexed line/column coordinates by binary
    /// search over the newline table.
    pub fn coordinates(&self, index: ByteIndex) -> Coordinates {
        let newlines = self.newlines.borrow();
        let line = newlines.partition_point(|&start| start <= index.0);
        let start_of_line = if line == 0 { 0 } else { newlines[line - 1] };

        Coordinates {
            line: line as u32 + 1,
            column: index.0 - start_of_line + 1,
        }
    }

    /// Format a span as `path:line:column[-line:column]`.
    pub fn location(&self, span: Span) -> Location<'_> {
        Location { file: self, span }
    }
}

impl Spanning for SourceFile {
    fn span(&self) -> Span {
        self.span()
    }
}

impl std::ops::Index<Span> for SourceFile {
    type Output = str;

    fn index(&self, index: Span) -> &Self::Output {
        &self.content[Range::from(index)]
    }
}

pub struct Location<'a> {
    file: &'a SourceFile,
    span: Span,
}

impl fmt::Display for Location<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let start = self.file.coordinates(self.span.start);
        // report the final contained position, not the exclusive end
        let end = self.file.coordinates(if self.span.end > self.span.start {
            self.span.end - 1
        } else {
            self.span.end
        });

        write!(f, "{}:{start}", self.file.name())?;
        if end != start {
            write!(f, "-{end}")?;
        }
        Ok(())
    }
}

#[derive(PartialEq, Eq, Debug)]
pub enum FileName {
    Anonymous,
    Stdin,
    Path(PathBuf),
    Virtual(&'static str),
}

impl fmt::Display for FileName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Anonymous => f.write_str("<anonymous>"),
            Self::Stdin => f.write_str("<stdin>"),
            Self::Path(path) => path.display().fmt(f),
            Self::Virtual(name) => f.write_str(name),
        }
    }
}

impl From<PathBuf> for FileName {
    fn from(path: PathBuf) -> Self {
        Self::Path(path)
    }
}

impl From<&'static str> for FileName {
    fn from(name: &'static str) -> Self {
        Self::Virtual(name)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::span;

    fn file(content: &str) -> SourceFile {
        let file = SourceFile::new("test", content.to_owned());
        let mut offset = 0;
        for line in content.split_inclusive('\n') {
            offset += line.len() as u32;
            if line.ends_with('\n') {
                file.add_newline(ByteIndex::new(offset));
            }
        }
        file
    }

    #[test]
    fn coordinates_of_first_line() {
        let file = file("abc\ndef\n");
        assert_eq!(file.coordinates(ByteIndex::new(0)), Coordinates { line: 1, column: 1 });
        assert_eq!(file.coordinates(ByteIndex::new(2)), Coordinates { line: 1, column: 3 });
    }

    #[test]
    fn coordinates_of_later_lines() {
        let file = file("abc\ndef\nghi\n");
        assert_eq!(file.coordinates(ByteIndex::new(4)), Coordinates { line: 2, column: 1 });
        assert_eq!(file.coordinates(ByteIndex::new(9)), Coordinates { line: 3, column: 2 });
    }

    #[test]
    fn newline_table_stays_strictly_increasing() {
        let file = SourceFile::new("test", "a\nb\n".to_owned());
        file.add_newline(ByteIndex::new(2));
        file.add_newline(ByteIndex::new(2));
        file.add_newline(ByteIndex::new(4));
        assert_eq!(file.coordinates(ByteIndex::new(3)), Coordinates { line: 2, column: 2 });
        assert_eq!(file.coordinates(ByteIndex::new(4)), Coordinates { line: 3, column: 1 });
    }

    #[test]
    fn clearing_supports_a_relex() {
        let file = file("a\nb\n");
        file.clear_newlines();
        assert_eq!(file.coordinates(ByteIndex::new(3)), Coordinates { line: 1, column: 4 });
    }

    #[test]
    fn location_spans_multiple_lines() {
        let file = file("abc\ndef\n");
        assert_eq!(file.location(span(2, 6)).to_string(), "test:1:3-2:2");
        assert_eq!(file.location(span(0, 1)).to_string(), "test:1:1");
    }
}
