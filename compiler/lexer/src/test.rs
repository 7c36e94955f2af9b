use crate::{
    lex_printable, lex_regex_resume, lex_source, lex_string_resume, printable_quote, relex_id,
    relex_string_value,
};
use span::{span, ByteIndex, Spanned};
use token::{Token, TokenKind, TokenKind::*};
use utility::difference;

/// Lex a whole source without parser feedback (`}` stays a brace).
fn lex(source: &str) -> Vec<Token> {
    let bytes = source.as_bytes();
    let mut tokens = Vec::new();
    let mut index = ByteIndex::new(0);

    loop {
        let scan = lex_source(bytes, index);
        tokens.push(Spanned::new(span(index.0, scan.end.0), scan.kind));
        if scan.kind == EndOfInput {
            break;
        }
        index = scan.end;
    }

    tokens
}

#[track_caller]
fn assert_lex_eq(source: &str, expected: Vec<Token>) {
    let actual = lex(source);
    if actual != expected {
        panic!(
            "the output of the lexer does not match the expected one:\n{}",
            difference(&format!("{expected:#?}"), &format!("{actual:#?}"), "\n"),
        );
    }
}

#[test]
fn keywords_and_identifiers() {
    assert_lex_eq(
        "def sign x",
        vec![
            Spanned::new(span(0, 3), Def),
            Spanned::new(span(3, 4), Ws),
            Spanned::new(span(4, 8), Id),
            Spanned::new(span(8, 9), Ws),
            Spanned::new(span(9, 10), Id),
            Spanned::new(span(10, 10), EndOfInput),
        ],
    );
}

#[test]
fn underscore_is_a_hole_but_not_in_identifiers() {
    assert_lex_eq(
        "_ _x x_",
        vec![
            Spanned::new(span(0, 1), Hole),
            Spanned::new(span(1, 2), Ws),
            Spanned::new(span(2, 4), Id),
            Spanned::new(span(4, 5), Ws),
            Spanned::new(span(5, 7), Id),
            Spanned::new(span(7, 7), EndOfInput),
        ],
    );
}

#[test]
fn operators_are_bucketed_by_first_codepoint() {
    assert_lex_eq(
        "a + b == c $ d",
        vec![
            Spanned::new(span(0, 1), Id),
            Spanned::new(span(1, 2), Ws),
            Spanned::new(span(2, 3), OpAddSub),
            Spanned::new(span(3, 4), Ws),
            Spanned::new(span(4, 5), Id),
            Spanned::new(span(5, 6), Ws),
            Spanned::new(span(6, 8), OpInequal),
            Spanned::new(span(8, 9), Ws),
            Spanned::new(span(9, 10), Id),
            Spanned::new(span(10, 11), Ws),
            Spanned::new(span(11, 12), OpDollar),
            Spanned::new(span(12, 13), Ws),
            Spanned::new(span(13, 14), Id),
            Spanned::new(span(14, 14), EndOfInput),
        ],
    );
}

#[test]
fn exact_punctuation() {
    assert_lex_eq(
        "= : \\ , =>",
        vec![
            Spanned::new(span(0, 1), Equals),
            Spanned::new(span(1, 2), Ws),
            Spanned::new(span(2, 3), Colon),
            Spanned::new(span(3, 4), Ws),
            Spanned::new(span(4, 5), Backslash),
            Spanned::new(span(5, 6), Ws),
            Spanned::new(span(6, 7), OpComma),
            Spanned::new(span(7, 8), Ws),
            Spanned::new(span(8, 10), OpEqualArrow),
            Spanned::new(span(10, 10), EndOfInput),
        ],
    );
}

#[test]
fn number_literals() {
    assert_lex_eq(
        "42 0xff 3.14 1e9 1.5e-3 2.toString",
        vec![
            Spanned::new(span(0, 2), Integer),
            Spanned::new(span(2, 3), Ws),
            Spanned::new(span(3, 7), Integer),
            Spanned::new(span(7, 8), Ws),
            Spanned::new(span(8, 12), Double),
            Spanned::new(span(12, 13), Ws),
            Spanned::new(span(13, 16), Double),
            Spanned::new(span(16, 17), Ws),
            Spanned::new(span(17, 23), Double),
            Spanned::new(span(23, 24), Ws),
            Spanned::new(span(24, 25), Integer),
            Spanned::new(span(25, 26), OpDot),
            Spanned::new(span(26, 34), Id),
            Spanned::new(span(34, 34), EndOfInput),
        ],
    );
}

#[test]
fn comments_run_to_end_of_line() {
    assert_lex_eq(
        "x # note\ny",
        vec![
            Spanned::new(span(0, 1), Id),
            Spanned::new(span(1, 2), Ws),
            Spanned::new(span(2, 8), Comment),
            Spanned::new(span(8, 9), Nl),
            Spanned::new(span(9, 10), Id),
            Spanned::new(span(10, 10), EndOfInput),
        ],
    );
}

#[test]
fn crlf_is_one_line_break() {
    assert_lex_eq(
        "x\r\ny",
        vec![
            Spanned::new(span(0, 1), Id),
            Spanned::new(span(1, 3), Nl),
            Spanned::new(span(3, 4), Id),
            Spanned::new(span(4, 4), EndOfInput),
        ],
    );
}

#[test]
fn string_literals() {
    assert_lex_eq(
        r#"'raw' "plain""#,
        vec![
            Spanned::new(span(0, 5), StrRaw),
            Spanned::new(span(5, 6), Ws),
            Spanned::new(span(6, 13), StrSingle),
            Spanned::new(span(13, 13), EndOfInput),
        ],
    );
}

#[test]
fn unterminated_string_is_flagged() {
    let scan = lex_source(b"\"oops\n", ByteIndex::new(0));
    assert_eq!(scan.kind, StrSingle);
    assert_eq!(scan.end, ByteIndex::new(5));
    assert!(!scan.ok);
}

#[test]
fn interpolated_string_chain() {
    let source = br#""a{x}b{y}c""#;

    let open = lex_source(source, ByteIndex::new(0));
    assert_eq!((open.kind, open.end.0), (StrOpen, 3));

    let expression = lex_source(source, open.end);
    assert_eq!((expression.kind, expression.end.0), (Id, 4));

    let mid = lex_string_resume(source, expression.end);
    assert_eq!((mid.kind, mid.end.0), (StrMid, 7));

    let expression = lex_source(source, mid.end);
    assert_eq!((expression.kind, expression.end.0), (Id, 8));

    let close = lex_string_resume(source, expression.end);
    assert_eq!((close.kind, close.end.0), (StrClose, 11));
    assert!(close.ok);
}

#[test]
fn regex_interpolation_opens_with_dollar_brace() {
    let source = b"`a{2}${x}b`";

    let open = lex_source(source, ByteIndex::new(0));
    assert_eq!((open.kind, open.end.0), (RegOpen, 7));

    let expression = lex_source(source, open.end);
    assert_eq!((expression.kind, expression.end.0), (Id, 8));

    let close = lex_regex_resume(source, expression.end);
    assert_eq!((close.kind, close.end.0), (RegClose, 11));
}

#[test]
fn malformed_utf8_resynchronizes_bytewise() {
    let source = b"a \xff\xfe b";
    let first = lex_source(source, ByteIndex::new(0));
    assert_eq!((first.kind, first.end.0), (Id, 1));

    let ws = lex_source(source, first.end);
    let bad = lex_source(source, ws.end);
    assert_eq!((bad.kind, bad.end.0, bad.ok), (Error, 3, false));

    let bad = lex_source(source, bad.end);
    assert_eq!((bad.kind, bad.end.0, bad.ok), (Error, 4, false));
}

#[test]
fn printable_advances_one_codepoint() {
    let scan = lex_printable("ä".as_bytes(), ByteIndex::new(0));
    assert_eq!(scan.end, ByteIndex::new(2));
    assert!(scan.ok);

    let scan = lex_printable(b"\n", ByteIndex::new(0));
    assert_eq!(scan.end, ByteIndex::new(1));
    assert!(!scan.ok);
}

#[test]
fn quoting_escapes_and_elides() {
    assert_eq!(printable_quote(b"ab\ncd"), r"'ab\ncd'");
    assert_eq!(
        printable_quote(b"abcdefghijklmnopqrstuvwxyz"),
        "'abcdefghi..rstuvwxyz'"
    );
}

#[test]
fn relex_recovers_tokens_from_padded_content() {
    assert_eq!(relex_id(b"sign x = 1"), "sign");
    assert_eq!(relex_id(b"++ more"), "++");

    let (value, ok) = relex_string_value(StrSingle, b"\"a\\nb\" trailing");
    assert_eq!(value, "a\nb");
    assert!(ok);

    let (value, ok) = relex_string_value(StrRaw, b"'no\\nescape'");
    assert_eq!(value, "no\\nescape");
    assert!(ok);
}
