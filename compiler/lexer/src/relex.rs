//! Re-lexing helpers for the lowerer.
//!
//! The CST records token starts only, so the content slice handed out for
//! a leaf may extend past the token's lexical end (into trailing trivia).
//! These helpers re-scan a single token from the start of such a slice and
//! decode its value.

use crate::{is_identifier_continue, is_identifier_start, Scanner};
use span::ByteIndex;
use token::TokenKind;

/// The identifier or operator spelled at the start of the slice.
pub fn relex_id(bytes: &[u8]) -> &str {
    let mut scanner = Scanner::new(bytes, ByteIndex::new(0));

    match scanner.peek() {
        Some(character) if is_identifier_start(character) => {
            scanner.take_while(is_identifier_continue);
        }
        Some(character) if token::is_symbol(character) => {
            scanner.take_while(token::is_symbol);
        }
        _ => {}
    }

    scanner.source_from(ByteIndex::new(0))
}

/// The lexical text of an integer literal at the start of the slice.
pub fn relex_integer(bytes: &[u8]) -> &str {
    relex_number(bytes)
}

/// The lexical text of a double literal at the start of the slice.
pub fn relex_double(bytes: &[u8]) -> &str {
    relex_number(bytes)
}

fn relex_number(bytes: &[u8]) -> &str {
    let scan = crate::lex_source(bytes, ByteIndex::new(0));
    std::str::from_utf8(&bytes[..scan.end.0 as usize]).unwrap_or("")
}

/// Decode the value of a string token (any of the five string forms).
///
/// Returns the decoded text and whether every escape was valid.
pub fn relex_string_value(kind: TokenKind, bytes: &[u8]) -> (String, bool) {
    let interior = string_interior(kind, bytes);

    match kind {
        TokenKind::StrRaw => unescape_raw(interior),
        _ => unescape(interior),
    }
}

/// Decode the value of a regex token. Only `` \` `` is an escape of the
/// literal itself; everything else belongs to the regular expression.
pub fn relex_regex_value(kind: TokenKind, bytes: &[u8]) -> (String, bool) {
    let interior = regex_interior(kind, bytes);

    let mut value = String::with_capacity(interior.len());
    let mut characters = interior.chars().peekable();
    while let Some(character) = characters.next() {
        if character == '\\' && characters.peek() == Some(&'`') {
            value.push('`');
            characters.next();
        } else {
            value.push(character);
        }
    }

    (value, true)
}

/// The text between the delimiters of a string token, found by re-scanning
/// from the slice start.
fn string_interior(kind: TokenKind, bytes: &[u8]) -> &str {
    let scan = match kind {
        TokenKind::StrRaw | TokenKind::StrSingle | TokenKind::StrOpen => {
            crate::lex_source(bytes, ByteIndex::new(0))
        }
        _ => crate::lex_string_resume(bytes, ByteIndex::new(0)),
    };

    // the leading `"`/`'`/`}` and the trailing `"`/`'`/`{` are delimiters;
    // an unterminated literal has no trailing delimiter
    let tail = if scan.ok { 1 } else { 0 };
    interior_slice(bytes, scan.end.0 as usize, tail)
}

fn regex_interior(kind: TokenKind, bytes: &[u8]) -> &str {
    let scan = match kind {
        TokenKind::RegSingle | TokenKind::RegOpen => crate::lex_source(bytes, ByteIndex::new(0)),
        _ => crate::lex_regex_resume(bytes, ByteIndex::new(0)),
    };

    let tail = if !scan.ok {
        0
    } else if matches!(kind, TokenKind::RegOpen | TokenKind::RegMid) {
        2 // `${`
    } else {
        1 // backtick
    };
    interior_slice(bytes, scan.end.0 as usize, tail)
}

fn interior_slice(bytes: &[u8], end: usize, tail: usize) -> &str {
    let interior = bytes
        .get(1..end.saturating_sub(tail).max(1))
        .unwrap_or(b"");
    std::str::from_utf8(interior).unwrap_or("")
}

fn unescape_raw(interior: &str) -> (String, bool) {
    let mut value = String::with_capacity(interior.len());
    let mut characters = interior.chars().peekable();

    while let Some(character) = characters.next() {
        if character == '\\' && matches!(characters.peek(), Some('\'' | '\\')) {
            value.push(characters.next().unwrap());
        } else {
            value.push(character);
        }
    }

    (value, true)
}

fn unescape(interior: &str) -> (String, bool) {
    let mut value = String::with_capacity(interior.len());
    let mut ok = true;
    let mut characters = interior.chars();

    while let Some(character) = characters.next() {
        if character != '\\' {
            value.push(character);
            continue;
        }

        let Some(escape) = characters.next() else {
            ok = false;
            break;
        };

        match escape {
            '\\' => value.push('\\'),
            '"' => value.push('"'),
            '\'' => value.push('\''),
            '{' => value.push('{'),
            '}' => value.push('}'),
            'a' => value.push('\u{7}'),
            'b' => value.push('\u{8}'),
            'f' => value.push('\u{c}'),
            'n' => value.push('\n'),
            'r' => value.push('\r'),
            't' => value.push('\t'),
            'v' => value.push('\u{b}'),
            '0' => value.push('\0'),
            'x' => push_coded(&mut value, &mut characters, 2, &mut ok),
            'u' => push_coded(&mut value, &mut characters, 4, &mut ok),
            'U' => push_coded(&mut value, &mut characters, 8, &mut ok),
            _ => {
                // unknown escape: keep the character, flag the literal
                value.push(escape);
                ok = false;
            }
        }
    }

    (value, ok)
}

fn push_coded(value: &mut String, characters: &mut std::str::Chars<'_>, width: usize, ok: &mut bool) {
    let mut digits = String::with_capacity(width);
    for _ in 0..width {
        match characters.next() {
            Some(digit) if digit.is_ascii_hexdigit() => digits.push(digit),
            _ => {
                *ok = false;
                return;
            }
        }
    }

    match u32::from_str_radix(&digits, 16).ok().and_then(char::from_u32) {
        Some(character) => value.push(character),
        None => *ok = false,
    }
}
