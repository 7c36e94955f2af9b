use crate::{Cst, CstBuilder, CstElement, NodeKind};
use span::span;
use token::TokenKind;

/// Build the tree for `(a + b)`:
///
/// ```text
/// TOP
/// └── PAREN           [0,7)
///     ├── '('
///     ├── BINARY      [1,6)
///     │   ├── ID 'a'
///     │   ├── OP '+'
///     │   └── ID 'b'
///     └── ')'
/// ```
fn example() -> Cst {
    let source = "(a + b)";
    let mut builder = CstBuilder::new(source.len() as u32);

    builder.add_token(TokenKind::ParenOpen, span(0, 1));

    builder.add_token(TokenKind::Id, span(1, 2));
    builder.add_node(NodeKind::Id, 0, Some(span(1, 2)), None);

    builder.add_token(TokenKind::OpAddSub, span(3, 4));
    builder.add_node(NodeKind::Op, 0, Some(span(3, 4)), None);

    builder.add_token(TokenKind::Id, span(5, 6));
    builder.add_node(NodeKind::Id, 0, Some(span(5, 6)), None);

    builder.add_node(NodeKind::Binary, 3, None, None);

    builder.add_token(TokenKind::ParenClose, span(6, 7));
    builder.add_node(NodeKind::Paren, 1, Some(span(0, 1)), Some(span(6, 7)));

    builder.add_node(NodeKind::Top, 1, Some(span(0, 0)), Some(span(7, 7)));

    builder.freeze()
}

#[test]
fn cursor_walks_nodes_and_tokens() {
    let cst = example();

    let root = cst.root();
    assert_eq!(root.node_kind(), Some(NodeKind::Top));
    assert_eq!(root.span(), span(0, 7));

    let paren = root.first_child_node();
    assert_eq!(paren.node_kind(), Some(NodeKind::Paren));
    assert_eq!(paren.span(), span(0, 7));

    let mut element = paren.first_child_element();
    assert_eq!(element.token_kind(), Some(TokenKind::ParenOpen));

    element.next_sibling_element();
    assert_eq!(element.node_kind(), Some(NodeKind::Binary));
    assert_eq!(element.span(), span(1, 6));

    element.next_sibling_element();
    assert_eq!(element.token_kind(), Some(TokenKind::ParenClose));

    element.next_sibling_element();
    assert!(element.empty());
}

#[test]
fn node_iteration_skips_tokens() {
    let cst = example();
    let binary = cst.root().first_child_node().first_child_node();
    assert_eq!(binary.node_kind(), Some(NodeKind::Binary));

    let mut child = binary.first_child_node();
    assert_eq!(child.node_kind(), Some(NodeKind::Id));
    assert_eq!(child.content(b"(a + b)"), b"a "); // extends to the next token start

    child.next_sibling_node();
    assert_eq!(child.node_kind(), Some(NodeKind::Op));

    child.next_sibling_node();
    assert_eq!(child.node_kind(), Some(NodeKind::Id));
    assert_eq!(child.span(), span(5, 6));

    child.next_sibling_node();
    assert!(child.empty());
}

/// Every node's range contains its children's ranges and siblings are
/// ordered by source position.
fn check_coverage(element: CstElement<'_>) {
    let parent = element.span();
    let mut child = element.first_child_node();
    let mut previous_end = parent.start;

    while !child.empty() {
        let span = child.span();
        assert!(parent.start <= span.start && span.end <= parent.end);
        assert!(previous_end <= span.start);
        previous_end = span.end;

        check_coverage(child);
        child.next_sibling_node();
    }
}

#[test]
fn coverage_invariant_holds() {
    let cst = example();
    check_coverage(cst.root());
}

#[test]
fn del_nodes_pops_whole_subtrees() {
    let mut builder = CstBuilder::new(4);

    builder.add_token(TokenKind::Id, span(0, 1));
    builder.add_node(NodeKind::Id, 0, Some(span(0, 1)), None);

    builder.add_token(TokenKind::Id, span(2, 3));
    builder.add_node(NodeKind::Id, 0, Some(span(2, 3)), None);
    assert_eq!(builder.entries(), 2);

    builder.del_nodes(1);
    assert_eq!(builder.entries(), 1);
    builder.add_node(NodeKind::Error, 0, Some(span(2, 3)), None);

    builder.add_node(NodeKind::Top, 2, Some(span(0, 0)), Some(span(4, 4)));
    let cst = builder.freeze();

    let mut child = cst.root().first_child_node();
    assert_eq!(child.node_kind(), Some(NodeKind::Id));
    child.next_sibling_node();
    assert_eq!(child.node_kind(), Some(NodeKind::Error));
    child.next_sibling_node();
    assert!(child.empty());
}

#[test]
fn wildcard_style_nodes_can_be_empty_of_children() {
    let mut builder = CstBuilder::new(2);
    builder.add_token(TokenKind::Id, span(0, 1));
    builder.add_node(NodeKind::Id, 0, Some(span(0, 1)), None);
    builder.add_node(NodeKind::Import, 1, None, Some(span(1, 2)));
    builder.add_node(NodeKind::Top, 1, Some(span(0, 0)), Some(span(2, 2)));
    let cst = builder.freeze();

    let import = cst.root().first_child_node();
    assert_eq!(import.node_kind(), Some(NodeKind::Import));

    let mut child = import.first_child_node();
    assert_eq!(child.node_kind(), Some(NodeKind::Id));
    child.next_sibling_node();
    assert!(child.empty());
}
