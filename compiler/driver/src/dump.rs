//! Debug dumps of the intermediate stages.

use cst::{Cst, CstElement};
use lexer::lex_source;
use session::Top;
use span::{ByteIndex, SourceFile};
use token::TokenKind;

pub(crate) fn tokens(file: &SourceFile) {
    let bytes = file.bytes();
    let mut index = ByteIndex::new(0);

    loop {
        let scan = lex_source(bytes, index);
        println!(
            "{:>6}..{:<6} {:?}{}",
            index.0,
            scan.end.0,
            scan.kind,
            if scan.ok { "" } else { " (invalid)" },
        );
        if scan.kind == TokenKind::EndOfInput {
            break;
        }
        index = scan.end;
    }
}

pub(crate) fn cst(cst: &Cst, file: &SourceFile) {
    print_element(cst.root(), file, 0);
}

fn print_element(element: CstElement<'_>, file: &SourceFile, depth: usize) {
    let span = element.span();
    let indent = "  ".repeat(depth);

    match element.node_kind() {
        Some(kind) => {
            println!("{indent}{kind:?} {:?}", span);
            let mut child = element.first_child_node();
            while !child.empty() {
                print_element(child, file, depth + 1);
                child.next_sibling_node();
            }
        }
        None => {
            if let Some(kind) = element.token_kind() {
                let content = String::from_utf8_lossy(element.content(file.bytes()));
                println!("{indent}{kind:?} {:?} {content:?}", span);
            }
        }
    }
}

pub(crate) fn dst(top: &Top) {
    for (name, package) in &top.packages {
        println!("package {name}");
        for file in &package.files {
            for (def, value) in &file.content.defs {
                println!("  {def} = {}", value.body);
            }
            for (topic, value) in &file.topics {
                println!("  topic {topic}: {}", value.signature);
            }
        }
    }
}
