//! The lexical analyzer (lexer).
//!
//! Three context-sensitive entry points share one scanner: [`lex_source`]
//! for ordinary source, [`lex_string_resume`] for the continuation of an
//! interpolated string after a `}` and [`lex_regex_resume`] for the
//! continuation of an interpolated regular expression. The token supplier
//! decides which one to call by peeking the grammar driver's shift table;
//! this is the only place parser state affects lexing.
//!
//! Every entry point returns a [`Scan`]: the token kind, the exclusive end
//! offset and a validity flag. A scan never fails outright; malformed
//! input yields the best-guess kind with `ok` cleared and the caller
//! reports it.

use span::ByteIndex;
use token::TokenKind;

pub use relex::{
    relex_double, relex_id, relex_integer, relex_regex_value, relex_string_value,
};

mod relex;
#[cfg(test)]
mod test;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Scan {
    pub kind: TokenKind,
    pub end: ByteIndex,
    pub ok: bool,
}

impl Scan {
    const fn new(kind: TokenKind, end: ByteIndex) -> Self {
        Self { kind, end, ok: true }
    }

    const fn bad(kind: TokenKind, end: ByteIndex) -> Self {
        Self { kind, end, ok: false }
    }
}

/// Lex one token of ordinary source.
pub fn lex_source(bytes: &[u8], start: ByteIndex) -> Scan {
    let mut scanner = Scanner::new(bytes, start);

    let Some(byte) = scanner.peek_byte() else {
        return Scan::new(TokenKind::EndOfInput, scanner.index());
    };

    match byte {
        b'\n' => {
            scanner.bump(1);
            Scan::new(TokenKind::Nl, scanner.index())
        }
        b'\r' => {
            scanner.bump(1);
            if scanner.peek_byte() == Some(b'\n') {
                scanner.bump(1);
                Scan::new(TokenKind::Nl, scanner.index())
            } else {
                // a stray carriage return still separates lines
                Scan::bad(TokenKind::Nl, scanner.index())
            }
        }
        b' ' | b'\t' => {
            scanner.take_bytes_while(|byte| byte == b' ' || byte == b'\t');
            Scan::new(TokenKind::Ws, scanner.index())
        }
        b'#' => {
            scanner.take_bytes_while(|byte| byte != b'\n');
            Scan::new(TokenKind::Comment, scanner.index())
        }
        b'\'' => lex_raw_string(scanner),
        b'"' => {
            scanner.bump(1);
            lex_string_piece(scanner, TokenKind::StrSingle, TokenKind::StrOpen)
        }
        b'`' => {
            scanner.bump(1);
            lex_regex_piece(scanner, TokenKind::RegSingle, TokenKind::RegOpen)
        }
        b'(' => scanner.single(TokenKind::ParenOpen),
        b')' => scanner.single(TokenKind::ParenClose),
        b'[' => scanner.single(TokenKind::BracketOpen),
        b']' => scanner.single(TokenKind::BracketClose),
        b'{' => scanner.single(TokenKind::BraceOpen),
        b'}' => scanner.single(TokenKind::BraceClose),
        b'\\' => scanner.single(TokenKind::Backslash),
        byte if byte.is_ascii_digit() => lex_number(scanner),
        _ => match scanner.peek() {
            Some(character) if is_identifier_start(character) => lex_identifier(scanner),
            Some(character) if token::is_symbol(character) => lex_symbol(scanner),
            Some(character) => {
                scanner.bump(character.len_utf8());
                Scan::bad(TokenKind::Error, scanner.index())
            }
            // malformed UTF-8: resynchronize one byte at a time
            None => {
                scanner.bump(1);
                Scan::bad(TokenKind::Error, scanner.index())
            }
        },
    }
}

/// Continue an interpolated string after the `}` closing an embedded
/// expression. Yields `STR_MID` or `STR_CLOSE`.
pub fn lex_string_resume(bytes: &[u8], start: ByteIndex) -> Scan {
    let mut scanner = Scanner::new(bytes, start);
    debug_assert_eq!(scanner.peek_byte(), Some(b'}'));
    scanner.bump(1);
    lex_string_piece(scanner, TokenKind::StrClose, TokenKind::StrMid)
}

/// Continue an interpolated regular expression after the `}` closing an
/// embedded expression. Yields `REG_MID` or `REG_CLOSE`.
pub fn lex_regex_resume(bytes: &[u8], start: ByteIndex) -> Scan {
    let mut scanner = Scanner::new(bytes, start);
    debug_assert_eq!(scanner.peek_byte(), Some(b'}'));
    scanner.bump(1);
    lex_regex_piece(scanner, TokenKind::RegClose, TokenKind::RegMid)
}

/// Advance exactly one codepoint. `ok` reports whether it decoded and is
/// fit for verbatim output; the diagnostics quoter escapes the rest.
pub fn lex_printable(bytes: &[u8], start: ByteIndex) -> Scan {
    let mut scanner = Scanner::new(bytes, start);

    match scanner.peek() {
        Some(character) => {
            scanner.bump(character.len_utf8());
            let printable = !character.is_control();
            Scan {
                kind: TokenKind::Ws,
                end: scanner.index(),
                ok: printable,
            }
        }
        None => {
            scanner.bump(1);
            Scan::bad(TokenKind::Ws, scanner.index())
        }
    }
}

/// Quote arbitrary source bytes for a diagnostic, eliding the middle of
/// long content and escaping anything unprintable.
pub fn printable_quote(bytes: &[u8]) -> String {
    use std::fmt::Write;

    let mut codepoints = 0;
    let mut cursor = ByteIndex::new(0);
    while (cursor.0 as usize) < bytes.len() {
        cursor = lex_printable(bytes, cursor).end;
        codepoints += 1;
    }

    // at most 10 codepoints at the start and 10 at the end
    let (skip_start, skip_end) = if codepoints > 20 {
        (9, codepoints - 9)
    } else {
        (codepoints, codepoints)
    };

    let mut output = String::from("'");
    let mut cursor = ByteIndex::new(0);
    let mut codepoint = 0;
    while (cursor.0 as usize) < bytes.len() {
        let scan = lex_printable(bytes, cursor);
        let piece = &bytes[cursor.0 as usize..scan.end.0 as usize];

        if codepoint < skip_start || codepoint >= skip_end {
            if scan.ok {
                output.push_str(std::str::from_utf8(piece).unwrap_or("\u{fffd}"));
            } else {
                match decode(bytes, cursor.0 as usize) {
                    Some('\u{7}') => output.push_str("\\a"),
                    Some('\u{8}') => output.push_str("\\b"),
                    Some('\u{c}') => output.push_str("\\f"),
                    Some('\n') => output.push_str("\\n"),
                    Some('\r') => output.push_str("\\r"),
                    Some('\t') => output.push_str("\\t"),
                    Some('\u{b}') => output.push_str("\\v"),
                    Some(character) if (character as u32) > 0xffff => {
                        let _ = write!(output, "\\U{:08x}", character as u32);
                    }
                    Some(character) if (character as u32) > 0xff => {
                        let _ = write!(output, "\\u{:04x}", character as u32);
                    }
                    Some(character) => {
                        let _ = write!(output, "\\x{:02x}", character as u32);
                    }
                    None => {
                        let _ = write!(output, "\\x{:02x}", piece[0]);
                    }
                }
            }
        } else if codepoint == skip_start {
            output.push_str("..");
        }

        cursor = scan.end;
        codepoint += 1;
    }
    output.push('\'');

    output
}

/// Classification of a name, deciding whether it binds or matches.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum NameKind {
    Lower,
    Upper,
    Operator,
}

pub fn name_kind(name: &str) -> NameKind {
    match name.chars().next() {
        Some(character) if token::is_symbol(character) => NameKind::Operator,
        Some(character) if character.is_uppercase() => NameKind::Upper,
        _ => NameKind::Lower,
    }
}

/// The state of a single scan.
struct Scanner<'a> {
    bytes: &'a [u8],
    index: usize,
}

impl<'a> Scanner<'a> {
    fn new(bytes: &'a [u8], start: ByteIndex) -> Self {
        Self { bytes, index: start.0 as usize }
    }

    fn index(&self) -> ByteIndex {
        ByteIndex::new(self.index.min(self.bytes.len()) as u32)
    }

    fn peek_byte(&self) -> Option<u8> {
        self.bytes.get(self.index).copied()
    }

    fn peek(&self) -> Option<char> {
        decode(self.bytes, self.index)
    }

    fn bump(&mut self, width: usize) {
        self.index += width;
    }

    fn single(&mut self, kind: TokenKind) -> Scan {
        self.bump(1);
        Scan::new(kind, self.index())
    }

    fn take_bytes_while(&mut self, predicate: impl Fn(u8) -> bool) {
        while self.peek_byte().map_or(false, &predicate) {
            self.bump(1);
        }
    }

    fn take_while(&mut self, predicate: impl Fn(char) -> bool) {
        while let Some(character) = self.peek() {
            if !predicate(character) {
                break;
            }
            self.bump(character.len_utf8());
        }
    }

    fn source_from(&self, start: ByteIndex) -> &'a str {
        std::str::from_utf8(&self.bytes[start.0 as usize..self.index.min(self.bytes.len())])
            .unwrap_or("")
    }
}

/// Decode the UTF-8 codepoint at the given offset.
fn decode(bytes: &[u8], index: usize) -> Option<char> {
    let window = &bytes[index..bytes.len().min(index + 4)];
    let lead = *window.first()?;
    let width = match lead {
        0x00..=0x7f => 1,
        0xc0..=0xdf => 2,
        0xe0..=0xef => 3,
        0xf0..=0xf7 => 4,
        _ => return None,
    };
    let piece = window.get(..width)?;
    std::str::from_utf8(piece).ok()?.chars().next()
}

fn is_identifier_start(character: char) -> bool {
    character == '_' || unicode_ident::is_xid_start(character)
}

fn is_identifier_continue(character: char) -> bool {
    unicode_ident::is_xid_continue(character)
}

fn lex_identifier(mut scanner: Scanner<'_>) -> Scan {
    let start = scanner.index();
    scanner.take_while(is_identifier_continue);

    let kind = match scanner.source_from(start) {
        "_" => TokenKind::Hole,
        source => keyword(source).unwrap_or(TokenKind::Id),
    };

    Scan::new(kind, scanner.index())
}

fn keyword(source: &str) -> Option<TokenKind> {
    use TokenKind::*;

    Some(match source {
        "package" => Package,
        "from" => From,
        "import" => Import,
        "export" => Export,
        "def" => Def,
        "type" => Type,
        "topic" => Topic,
        "data" => Data,
        "tuple" => Tuple,
        "target" => Target,
        "publish" => Publish,
        "match" => Match,
        "if" => If,
        "then" => Then,
        "else" => Else,
        "require" => Require,
        "global" => Global,
        "unary" => Unary,
        "binary" => Binary,
        "prim" => Prim,
        "here" => Here,
        "subscribe" => Subscribe,
        _ => return None,
    })
}

fn lex_symbol(mut scanner: Scanner<'_>) -> Scan {
    let start = scanner.index();
    scanner.take_while(token::is_symbol);

    Scan::new(token::classify_operator(scanner.source_from(start)), scanner.index())
}

fn lex_number(mut scanner: Scanner<'_>) -> Scan {
    if scanner.peek_byte() == Some(b'0') {
        scanner.bump(1);
        match scanner.peek_byte() {
            Some(b'x' | b'X') => {
                scanner.bump(1);
                scanner.take_bytes_while(|byte| byte.is_ascii_hexdigit() || byte == b'_');
                return Scan::new(TokenKind::Integer, scanner.index());
            }
            Some(b'b' | b'B') => {
                scanner.bump(1);
                scanner.take_bytes_while(|byte| matches!(byte, b'0' | b'1' | b'_'));
                return Scan::new(TokenKind::Integer, scanner.index());
            }
            Some(b'o' | b'O') => {
                scanner.bump(1);
                scanner.take_bytes_while(|byte| matches!(byte, b'0'..=b'7' | b'_'));
                return Scan::new(TokenKind::Integer, scanner.index());
            }
            _ => {}
        }
    }

    scanner.take_bytes_while(|byte| byte.is_ascii_digit() || byte == b'_');

    let mut kind = TokenKind::Integer;

    // a dot only belongs to the number when a digit follows it
    if scanner.peek_byte() == Some(b'.')
        && scanner
            .bytes
            .get(scanner.index + 1)
            .map_or(false, u8::is_ascii_digit)
    {
        scanner.bump(1);
        scanner.take_bytes_while(|byte| byte.is_ascii_digit() || byte == b'_');
        kind = TokenKind::Double;
    }

    if let Some(b'e' | b'E') = scanner.peek_byte() {
        let mut lookahead = scanner.index + 1;
        if let Some(b'+' | b'-') = scanner.bytes.get(lookahead).copied() {
            lookahead += 1;
        }
        if scanner.bytes.get(lookahead).map_or(false, u8::is_ascii_digit) {
            scanner.index = lookahead;
            scanner.take_bytes_while(|byte| byte.is_ascii_digit() || byte == b'_');
            kind = TokenKind::Double;
        }
    }

    Scan::new(kind, scanner.index())
}

fn lex_raw_string(mut scanner: Scanner<'_>) -> Scan {
    scanner.bump(1);

    loop {
        match scanner.peek_byte() {
            None | Some(b'\n') => return Scan::bad(TokenKind::StrRaw, scanner.index()),
            Some(b'\'') => {
                scanner.bump(1);
                return Scan::new(TokenKind::StrRaw, scanner.index());
            }
            Some(b'\\') => {
                scanner.bump(1);
                if matches!(scanner.peek_byte(), Some(b'\'' | b'\\')) {
                    scanner.bump(1);
                }
            }
            Some(_) => scanner.bump(1),
        }
    }
}

/// Scan the body of a double-quoted string from just after its opening
/// delimiter, stopping at the closing `"` or at an interpolation `{`.
fn lex_string_piece(mut scanner: Scanner<'_>, closed: TokenKind, open: TokenKind) -> Scan {
    loop {
        match scanner.peek_byte() {
            None | Some(b'\n') => return Scan::bad(closed, scanner.index()),
            Some(b'"') => {
                scanner.bump(1);
                return Scan::new(closed, scanner.index());
            }
            Some(b'{') => {
                scanner.bump(1);
                return Scan::new(open, scanner.index());
            }
            Some(b'\\') => {
                scanner.bump(1);
                if scanner.peek_byte().is_some() {
                    scanner.bump(1);
                }
            }
            Some(_) => scanner.bump(1),
        }
    }
}

/// Scan a regular expression body. Interpolation opens with `${` since a
/// bare `{` is a quantifier.
fn lex_regex_piece(mut scanner: Scanner<'_>, closed: TokenKind, open: TokenKind) -> Scan {
    loop {
        match scanner.peek_byte() {
            None | Some(b'\n') => return Scan::bad(closed, scanner.index()),
            Some(b'`') => {
                scanner.bump(1);
                return Scan::new(closed, scanner.index());
            }
            Some(b'$') if scanner.bytes.get(scanner.index + 1) == Some(&b'{') => {
                scanner.bump(2);
                return Scan::new(open, scanner.index());
            }
            Some(b'\\') => {
                scanner.bump(1);
                if scanner.peek_byte().is_some() {
                    scanner.bump(1);
                }
            }
            Some(_) => scanner.bump(1),
        }
    }
}
