//! Diagnostic formatting.

use super::{Diagnostic, Role, Severity};
use colored::{Color, Colorize};
use span::{SourceFile, Span};
use std::fmt::Write;
use unicode_width::UnicodeWidthStr;

const fn color(severity: Severity) -> Color {
    match severity {
        Severity::Error => Color::Red,
        Severity::Warning => Color::Yellow,
        Severity::Info => Color::Blue,
    }
}

pub(super) fn render(diagnostic: &Diagnostic, file: Option<&SourceFile>) -> String {
    let mut output = String::new();

    let severity = diagnostic.severity.name().color(color(diagnostic.severity)).bold();
    let _ = write!(output, "{severity}");

    if let Some(message) = &diagnostic.message {
        let _ = write!(output, ": {}", message.bold());
    }

    for highlight in &diagnostic.highlights {
        let Some(file) = file else {
            let _ = write!(output, "\n --> {:?}", highlight.span);
            continue;
        };

        let _ = write!(output, "\n --> {}", file.location(highlight.span));

        if let Some(line) = snippet_line(file, highlight.span) {
            let number = file.coordinates(highlight.span.start).line.to_string();
            let gutter = " ".repeat(number.len());
            let marker = match highlight.role {
                Role::Primary => "^",
                Role::Secondary => "-",
            };
            let underline_offset = line.before.width();
            let underline_width = line.content.width().max(1);

            let _ = write!(output, "\n {gutter} |");
            let _ = write!(output, "\n {number} | {}{}{}", line.before, line.content, line.after);
            let underline = marker.repeat(underline_width);
            let _ = write!(
                output,
                "\n {gutter} | {}{}",
                " ".repeat(underline_offset),
                underline.as_str().color(color(diagnostic.severity)),
            );

            if let Some(label) = &highlight.label {
                let _ = write!(output, " {label}");
            }
        } else if let Some(label) = &highlight.label {
            let _ = write!(output, "\n     {label}");
        }
    }

    for note in &diagnostic.notes {
        let _ = write!(output, "\n {}: {note}", "note".bold());
    }

    output
}

struct SnippetLine<'a> {
    before: &'a str,
    content: &'a str,
    after: &'a str,
}

/// The line containing the start of the span, split around the highlighted
/// part. Highlights that span several lines are clipped to the first.
fn snippet_line(file: &SourceFile, span: Span) -> Option<SnippetLine<'_>> {
    let content = file.content();
    let start: usize = span.start.into();
    let end: usize = span.end.into();

    if start > content.len() {
        return None;
    }

    let line_start = content[..start].rfind('\n').map_or(0, |index| index + 1);
    let line_end = content[start..]
        .find('\n')
        .map_or(content.len(), |index| start + index);
    let end = end.min(line_end).max(start);

    Some(SnippetLine {
        before: &content[line_start..start],
        content: &content[start..end],
        after: &content[end..line_end],
    })
}

#[cfg(test)]
mod test {
    use crate::Diagnostic;
    use span::{span, SourceFile};

    #[test]
    fn renders_location_and_caret() {
        colored::control::set_override(false);

        let file = SourceFile::new("demo.wake", "def sign x = x\n".to_owned());
        let rendered = Diagnostic::error()
            .message("something is off")
            .span(span(4, 8), "this name")
            .format(Some(&file));

        assert_eq!(
            rendered,
            "error: something is off\n \
             --> demo.wake:1:5-1:8\n   \
             |\n \
             1 | def sign x = x\n   \
             |     ^^^^ this name"
        );
    }

    #[test]
    fn renders_notes_without_a_file() {
        colored::control::set_override(false);

        let rendered = Diagnostic::warning()
            .message("heads up")
            .note("further details")
            .format(None);

        assert_eq!(rendered, "warning: heads up\n note: further details");
    }
}
