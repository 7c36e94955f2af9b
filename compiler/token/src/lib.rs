//! The tokens emitted by the lexer.

use span::Spanned;
use std::fmt;

pub type Token = Spanned<TokenKind>;

/// The closed set of terminals.
///
/// Operator tokens are pre-bucketed by precedence class: the grammar never
/// re-inspects an operator's spelling to determine how tightly it binds,
/// only to name it.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum TokenKind {
    // Trivia. Emitted by the lexer, filtered before the grammar.
    Ws,
    Comment,

    // Synthetic tokens produced by the offside processor.
    Nl,
    Indent,
    Dedent,

    Id,

    // Keywords.
    Package,
    From,
    Import,
    Export,
    Def,
    Type,
    Topic,
    Data,
    Tuple,
    Target,
    Publish,
    Match,
    If,
    Then,
    Else,
    Require,
    Global,
    Unary,
    Binary,
    Prim,
    Here,
    Subscribe,

    // Punctuation.
    Equals,
    Colon,
    Backslash,
    ParenOpen,
    ParenClose,
    BracketOpen,
    BracketClose,
    BraceOpen,
    BraceClose,
    Hole,

    // Operator classes, bucketed by the first codepoint of the operator.
    OpDot,
    OpQuant,
    OpExp,
    OpMulDiv,
    OpAddSub,
    OpCompare,
    OpInequal,
    OpAnd,
    OpOr,
    OpDollar,
    OpLeftArrow,
    OpEqualArrow,
    OpComma,

    // Literals.
    Integer,
    Double,
    StrRaw,
    StrSingle,
    StrOpen,
    StrMid,
    StrClose,
    RegSingle,
    RegOpen,
    RegMid,
    RegClose,

    EndOfInput,
    Error,
}

impl TokenKind {
    /// An example rendering used in diagnostics.
    pub const fn example(self) -> &'static str {
        use TokenKind::*;

        match self {
            Ws => "whitespace",
            Comment => "#-comment",
            Nl => "newline",
            Indent => "increased-indentation",
            Dedent => "decreased-indentation",
            Id => "identifier",
            Package => "package",
            From => "from",
            Import => "import",
            Export => "export",
            Def => "def",
            Type => "type",
            Topic => "topic",
            Data => "data",
            Tuple => "tuple",
            Target => "target",
            Publish => "publish",
            Match => "match",
            If => "if",
            Then => "then",
            Else => "else",
            Require => "require",
            Global => "global",
            Unary => "unary",
            Binary => "binary",
            Prim => "prim",
            Here => "here",
            Subscribe => "subscribe",
            Equals => "=",
            Colon => ":",
            Backslash => "\\",
            ParenOpen => "(",
            ParenClose => ")",
            BracketOpen => "[",
            BracketClose => "]",
            BraceOpen => "{",
            BraceClose => "}",
            Hole => "_",
            OpDot => ".",
            OpQuant => "quantifier",
            OpExp => "^",
            OpMulDiv => "*/%",
            OpAddSub => "+-~",
            OpCompare => "<>",
            OpInequal => "!=",
            OpAnd => "&",
            OpOr => "|",
            OpDollar => "$",
            OpLeftArrow => "left-arrow",
            OpEqualArrow => "equal-arrow",
            OpComma => ",;",
            Integer => "42",
            Double => "3.1415",
            StrRaw => "'string'",
            StrSingle => "\"string\"",
            StrOpen => "\"string{",
            StrMid => "}string{",
            StrClose => "}string\"",
            RegSingle => "`regexp`",
            RegOpen => "`regexp${",
            RegMid => "}regexp${",
            RegClose => "}regexp`",
            EndOfInput => "end of input",
            Error => "illegal token",
        }
    }

    pub const fn is_operator(self) -> bool {
        use TokenKind::*;

        matches!(
            self,
            OpDot
                | OpQuant
                | OpExp
                | OpMulDiv
                | OpAddSub
                | OpCompare
                | OpInequal
                | OpAnd
                | OpOr
                | OpDollar
                | OpLeftArrow
                | OpEqualArrow
                | OpComma
        )
    }

    /// Test if the token may start an expression operand.
    pub const fn starts_term(self) -> bool {
        use TokenKind::*;

        matches!(
            self,
            Id | Hole
                | Integer
                | Double
                | StrRaw
                | StrSingle
                | StrOpen
                | RegSingle
                | RegOpen
                | ParenOpen
                | BracketOpen
                | Match
                | If
                | Backslash
                | Prim
                | Here
                | Subscribe
        )
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use TokenKind::*;

        match self {
            Ws | Comment | Nl | Indent | Dedent | Id | OpQuant | OpLeftArrow | OpEqualArrow
            | EndOfInput | Error => f.write_str(self.example()),
            Package | From | Import | Export | Def | Type | Topic | Data | Tuple | Target
            | Publish | Match | If | Then | Else | Require | Global | Unary | Binary | Prim
            | Here | Subscribe => write!(f, "keyword ‘{}’", self.example()),
            _ => write!(f, "‘{}’", self.example()),
        }
    }
}

/// Binding strength of an operator class. Application binds tighter than
/// every binary operator.
///
/// Only the eight classes from `^` down to `$` have a documented
/// relative order; the positions of `.`, the quantifiers, `:`, the
/// arrows and `,` are this table's own choice (DESIGN.md, decision 4).
pub const APP_PRECEDENCE: u8 = 14;

/// The loosest precedence, used for `match`/`if`/`\`/`prim`/`subscribe`
/// heads which swallow everything to their right.
pub const LOW_PRECEDENCE: u8 = 0;

pub const fn binary_precedence(kind: TokenKind) -> Option<u8> {
    use TokenKind::*;

    Some(match kind {
        OpDot => 13,
        OpQuant => 12,
        OpExp => 11,
        OpMulDiv => 10,
        OpAddSub => 9,
        OpCompare => 8,
        OpInequal => 7,
        OpAnd => 6,
        OpOr => 5,
        OpDollar => 4,
        Colon => 3,
        OpLeftArrow | OpEqualArrow => 2,
        OpComma => 1,
        _ => return None,
    })
}

/// Associativity is read off the operator's spelling: a trailing `$` makes
/// it right-associative. Comma and the arrow classes are right-associative
/// regardless so that lists and function types nest to the right.
pub fn is_right_associative(kind: TokenKind, source: &str) -> bool {
    use TokenKind::*;

    matches!(kind, OpComma | OpLeftArrow | OpEqualArrow) || source.ends_with('$')
}

/// Test if the codepoint may appear in an operator.
pub const fn is_symbol(character: char) -> bool {
    #[rustfmt::skip]
    let ascii = matches!(
        character,
        '.' | ':' | '+' | '-' | '~' | '=' | '<' | '>' | '*' | '^' |
        '!' | '?' | '|' | '/' | '&' | '%' | '$' | '@' | ',' | ';'
    );

    ascii
        || matches!(character, '×' | '÷' | '¬')
        || matches!(character, '\u{2190}'..='\u{21ff}') // arrows
        || matches!(character, '\u{2200}'..='\u{22ff}') // mathematical operators
        || matches!(character, '\u{2a00}'..='\u{2aff}') // supplemental operators
}

/// Bucket an operator spelling into its terminal.
///
/// Exact-match punctuation wins over the first-codepoint classification.
pub fn classify_operator(source: &str) -> TokenKind {
    use TokenKind::*;

    match source {
        "=" => return Equals,
        ":" => return Colon,
        "." => return OpDot,
        "<-" => return OpLeftArrow,
        "=>" => return OpEqualArrow,
        _ => {}
    }

    let Some(first) = source.chars().next() else {
        return Error;
    };

    match first {
        '.' => OpDot,
        ':' => Colon,
        '^' => OpExp,
        '*' | '/' | '%' | '×' | '÷' => OpMulDiv,
        '+' | '-' | '~' | '¬' => OpAddSub,
        '<' | '>' | '≤' | '≥' => OpCompare,
        '!' | '=' | '≠' => OpInequal,
        '&' | '∧' | '⋀' => OpAnd,
        '|' | '∨' | '⋁' => OpOr,
        '$' => OpDollar,
        ',' | ';' => OpComma,
        '←' | '⇐' | '⟵' | '↢' => OpLeftArrow,
        '→' | '⇒' | '⟶' | '↣' => OpEqualArrow,
        _ => OpQuant,
    }
}

#[cfg(test)]
mod test {
    use super::{classify_operator, is_right_associative, TokenKind::*};

    #[test]
    fn exact_punctuation_beats_classes() {
        assert_eq!(classify_operator("="), Equals);
        assert_eq!(classify_operator("=="), OpInequal);
        assert_eq!(classify_operator("=>"), OpEqualArrow);
        assert_eq!(classify_operator("<-"), OpLeftArrow);
        assert_eq!(classify_operator("<="), OpCompare);
        assert_eq!(classify_operator("."), OpDot);
    }

    #[test]
    fn first_codepoint_selects_the_bucket() {
        assert_eq!(classify_operator("+"), OpAddSub);
        assert_eq!(classify_operator("++"), OpAddSub);
        assert_eq!(classify_operator("-$"), OpAddSub);
        assert_eq!(classify_operator("∀"), OpQuant);
        assert_eq!(classify_operator("|>"), OpOr);
    }

    #[test]
    fn trailing_dollar_is_right_associative() {
        assert!(is_right_associative(OpDollar, "$"));
        assert!(is_right_associative(OpAddSub, "+$"));
        assert!(!is_right_associative(OpAddSub, "+"));
        assert!(is_right_associative(OpComma, ","));
        assert!(is_right_associative(OpEqualArrow, "=>"));
    }
}
