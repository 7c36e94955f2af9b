//! The offside (indentation) processor.
//!
//! Sits between the lexer and the grammar driver. Whitespace-induced
//! lexical scope is inherently not context-free, so `NL WS?` sequences
//! between significant tokens are post-processed into synthetic `INDENT`,
//! `DEDENT` and `NL` terminals here. Empty and comment-only lines never
//! change the indentation level.

use crate::grammar::Grammar;
use diagnostics::{Diagnostic, Reporter};
use lexer::{lex_regex_resume, lex_source, lex_string_resume, printable_quote, Scan};
use span::{ByteIndex, SourceFile, Span};
use token::TokenKind;

#[derive(Clone, Copy, PartialEq, Eq)]
enum State {
    Idle,
    Nl,
    NlWs,
}

pub(crate) fn ingest(file: &SourceFile, grammar: &mut Grammar<'_>, reporter: &Reporter) {
    let bytes = file.bytes();

    let mut indent = String::new();
    let mut indent_stack: Vec<usize> = Vec::new();

    let mut state = State::Idle;
    // span of the newline opening the current indentation sequence
    let mut nl = Span::default();
    // end of the whitespace run after that newline
    let mut ws_end = ByteIndex::new(0);
    let mut tindent = Span::default();

    let mut cursor = ByteIndex::new(0);

    loop {
        let start = cursor;

        // A `}` might resume either a string, a regexp or a `{}`
        // expression. The grammar driver's shift table decides.
        let scan = if bytes.get(start.0 as usize) == Some(&b'}') {
            if grammar.shifts(TokenKind::StrClose) {
                lex_string_resume(bytes, start)
            } else if grammar.shifts(TokenKind::RegClose) {
                lex_regex_resume(bytes, start)
            } else {
                lex_source(bytes, start)
            }
        } else {
            lex_source(bytes, start)
        };

        let Scan { kind, end, ok } = scan;
        let span = Span::new(start, end);
        cursor = end;

        if !ok {
            let content = &bytes[start.0 as usize..end.0 as usize];
            Diagnostic::error()
                .message(format!(
                    "syntax error; found illegal token {}, but handling it like {}",
                    printable_quote(content),
                    kind.example(),
                ))
                .unlabeled_span(span)
                .report(reporter);
        }

        match state {
            State::Idle => {
                if kind == TokenKind::Ws || kind == TokenKind::Comment {
                    // whitespace wastes the lookahead token; discard it
                    continue;
                }
                if kind == TokenKind::Nl {
                    file.add_newline(end);
                    nl = span;
                    ws_end = end;
                    tindent = span;
                    state = State::Nl;
                    continue;
                }
            }
            State::Nl => {
                if kind == TokenKind::Ws {
                    // record the whitespace, process it on the next token
                    ws_end = end;
                    state = State::NlWs;
                    continue;
                }
                ws_end = nl.end;
                reconcile_indentation(
                    file,
                    grammar,
                    reporter,
                    &mut indent,
                    &mut indent_stack,
                    nl,
                    ws_end,
                    tindent,
                );
                state = State::Idle;
            }
            State::NlWs => match kind {
                TokenKind::Nl => {
                    // a completely empty line does not adjust indentation
                    file.add_newline(end);
                    nl = span;
                    ws_end = end;
                    tindent = span;
                    state = State::Nl;
                    continue;
                }
                TokenKind::Comment => {
                    // a comment-only line does not adjust indentation
                    state = State::Idle;
                    continue;
                }
                _ => {
                    reconcile_indentation(
                        file,
                        grammar,
                        reporter,
                        &mut indent,
                        &mut indent_stack,
                        nl,
                        ws_end,
                        tindent,
                    );
                    state = State::Idle;
                }
            },
        }

        if kind == TokenKind::EndOfInput {
            while let Some(level) = indent_stack.pop() {
                indent.truncate(level);
                grammar.parse(TokenKind::Dedent, span);
            }
            if grammar.shifts(TokenKind::Nl) {
                grammar.parse(TokenKind::Nl, span);
            }
            grammar.parse(TokenKind::EndOfInput, span);
            break;
        }

        // illegal tokens were already reported above; there is nothing
        // sensible to hand to the grammar for them
        if kind != TokenKind::Error {
            grammar.parse(kind, span);
        }
    }
}

/// Process the whitespace after a line break for a change in indentation;
/// the pending token is dispatched by the caller afterwards.
#[allow(clippy::too_many_arguments)]
fn reconcile_indentation(
    file: &SourceFile,
    grammar: &mut Grammar<'_>,
    reporter: &Reporter,
    indent: &mut String,
    indent_stack: &mut Vec<usize>,
    nl: Span,
    ws_end: ByteIndex,
    tindent: Span,
) {
    let newdent =
        std::str::from_utf8(&file.bytes()[nl.end.0 as usize..ws_end.0 as usize]).unwrap_or("");

    if newdent.contains('\t') {
        Diagnostic::error()
            .message("tabs are forbidden in indentation")
            .unlabeled_span(Span::new(nl.end, ws_end))
            .report(reporter);
    }

    // pop indentation scopes until the enclosing indent prefixes the new one
    while !newdent.starts_with(indent.as_str()) {
        grammar.parse(TokenKind::Dedent, tindent);
        let level = indent_stack.pop().unwrap_or(0);
        indent.truncate(level);
    }

    // a longer indent opens a new scope
    if newdent.len() > indent.len() {
        grammar.parse(TokenKind::Indent, tindent);
        indent_stack.push(indent.len());
        indent.clear();
        indent.push_str(newdent);
    }

    // line breaks are whitespace, but some constructs are terminated by
    // one; provide it only where the grammar can shift it
    if grammar.shifts(TokenKind::Nl) {
        grammar.parse(TokenKind::Nl, tindent);
    }
}
