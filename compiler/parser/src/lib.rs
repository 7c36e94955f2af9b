//! The syntactic analyzer (parser).
//!
//! Two cooperating layers turn a token stream into a packed CST:
//!
//! * the [offside processor](offside) converts `NL WS?` sequences between
//!   significant tokens into synthetic `INDENT`/`DEDENT`/`NL` terminals
//!   and registers newlines with the source file, and
//! * the [grammar driver](grammar) consumes one terminal at a time,
//!   emitting CST nodes as it reduces.
//!
//! The driver exposes a `shifts(terminal)` lookahead predicate. The token
//! supplier peeks it in exactly two places: to decide whether a `}`
//! resumes an interpolated string or regular expression, and to decide
//! whether a line break is wanted as a terminator. Parsing never aborts:
//! a syntax error is reported, the offending region is covered by an
//! error node and parsing continues at the next line.

use cst::Cst;
use diagnostics::Reporter;
use span::SourceFile;

mod grammar;
mod offside;
#[cfg(test)]
mod test;

/// Parse one source file into a CST.
///
/// Diagnostics go to the reporter; the returned tree is complete even in
/// the presence of syntax errors (error nodes cover the bad regions).
pub fn parse(file: &SourceFile, reporter: &Reporter) -> Cst {
    file.clear_newlines();
    let mut grammar = grammar::Grammar::new(file, reporter);
    offside::ingest(file, &mut grammar, reporter);
    grammar.finish()
}
