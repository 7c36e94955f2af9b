use crate::parse;
use cst::{Cst, CstElement, NodeKind, NodeKind::*};
use diagnostics::{Buffer, Reporter, Severity};
use span::{span, SourceFile};

fn parse_source(source: &str) -> (Cst, Buffer) {
    let file = SourceFile::new("test", source.to_owned());
    let buffer = Buffer::default();
    let reporter = Reporter::buffer(buffer.clone());
    let cst = parse(&file, &reporter);
    (cst, buffer)
}

#[track_caller]
fn parse_clean(source: &str) -> Cst {
    let (cst, buffer) = parse_source(source);
    let diagnostics = buffer.borrow();
    assert!(
        diagnostics.is_empty(),
        "expected a clean parse, got diagnostics: {:?}",
        diagnostics
            .iter()
            .map(|diagnostic| diagnostic.message.clone())
            .collect::<Vec<_>>(),
    );
    drop(diagnostics);
    cst
}

fn child_kinds(element: CstElement<'_>) -> Vec<NodeKind> {
    let mut kinds = Vec::new();
    let mut child = element.first_child_node();
    while !child.empty() {
        kinds.push(child.node_kind().unwrap());
        child.next_sibling_node();
    }
    kinds
}

fn nth_child<'a>(element: CstElement<'a>, index: usize) -> CstElement<'a> {
    let mut child = element.first_child_node();
    for _ in 0..index {
        child.next_sibling_node();
    }
    child
}

#[test]
fn package_and_import() {
    let cst = parse_clean("package p\nfrom q import x\n");
    let root = cst.root();
    assert_eq!(root.node_kind(), Some(Top));
    assert_eq!(child_kinds(root), [Package, Import]);

    let import = nth_child(root, 1);
    assert_eq!(child_kinds(import), [Id, IdEq]);
    assert_eq!(child_kinds(nth_child(import, 1)), [Id]);
}

#[test]
fn import_with_kind_arity_and_renaming() {
    let cst = parse_clean("from q import def unary - = ~\n");
    let import = nth_child(cst.root(), 0);
    assert_eq!(child_kinds(import), [Id, Kind, Arity, IdEq]);
    assert_eq!(child_kinds(nth_child(import, 3)), [Op, Op]);
}

#[test]
fn wildcard_import_has_no_clauses() {
    let cst = parse_clean("from wake import _\n");
    let import = nth_child(cst.root(), 0);
    assert_eq!(child_kinds(import), [Id]);
}

#[test]
fn inline_data_with_pipes() {
    let cst = parse_clean("data Maybe a = Some a | None\n");
    let data = nth_child(cst.root(), 0);
    assert_eq!(data.node_kind(), Some(Data));
    assert_eq!(child_kinds(data), [App, App, Id]);
}

#[test]
fn block_data_with_newlines() {
    let cst = parse_clean("data Order =\n  LT\n  EQ\n  GT\n");
    let data = nth_child(cst.root(), 0);
    assert_eq!(child_kinds(data), [Id, Id, Id, Id]);
}

#[test]
fn tuple_with_tagged_fields() {
    let cst = parse_clean("tuple Point = X: Integer | Y: Integer\n");
    let tuple = nth_child(cst.root(), 0);
    assert_eq!(child_kinds(tuple), [Id, TupleElt, TupleElt]);

    let field = nth_child(tuple, 1);
    assert_eq!(child_kinds(field), [Binary]);
    assert_eq!(child_kinds(nth_child(field, 0)), [Id, Op, Id]);
}

#[test]
fn tuple_fields_carry_their_own_flags() {
    let cst = parse_clean("tuple Point =\n  global X: Integer\n  export Y: Integer\n");
    let tuple = nth_child(cst.root(), 0);
    assert_eq!(child_kinds(tuple), [Id, TupleElt, TupleElt]);
    assert_eq!(child_kinds(nth_child(tuple, 1)), [FlagGlobal, Binary]);
    assert_eq!(child_kinds(nth_child(tuple, 2)), [FlagExport, Binary]);
}

#[test]
fn global_export_flags_precede_declarations() {
    let cst = parse_clean("global export def f = 1\n");
    let root = cst.root();
    assert_eq!(child_kinds(root), [Def]);
    assert_eq!(
        child_kinds(nth_child(root, 0)),
        [FlagGlobal, FlagExport, Id, Literal]
    );
}

#[test]
fn if_parses_into_a_conditional_node() {
    let cst = parse_clean("def sign x = if x < 0 then -1 else 1\n");
    let def = nth_child(cst.root(), 0);
    assert_eq!(child_kinds(def), [App, If]);

    let conditional = nth_child(def, 1);
    assert_eq!(child_kinds(conditional), [Binary, Unary, Literal]);
}

#[test]
fn match_with_cases() {
    let cst = parse_clean("def f x = match x\n  0 = \"zero\"\n  _ = \"other\"\n");
    let def = nth_child(cst.root(), 0);
    assert_eq!(child_kinds(def), [App, Match]);

    let match_ = nth_child(def, 1);
    assert_eq!(child_kinds(match_), [Id, Case, Case]);
    assert_eq!(child_kinds(nth_child(match_, 1)), [Literal, Literal]);
    assert_eq!(child_kinds(nth_child(match_, 2)), [Hole, Literal]);
}

#[test]
fn match_case_with_guard() {
    let cst = parse_clean("def f x = match x\n  y if y < 0 = y\n  _ = x\n");
    let match_ = nth_child(nth_child(cst.root(), 0), 1);
    assert_eq!(child_kinds(nth_child(match_, 1)), [Id, Guard, Id]);
}

#[test]
fn interpolated_string_alternates_pieces_and_expressions() {
    let cst = parse_clean("def s x y = \"a{x}b{y}c\"\n");
    let def = nth_child(cst.root(), 0);
    let interpolate = nth_child(def, 1);
    assert_eq!(interpolate.node_kind(), Some(Interpolate));
    assert_eq!(child_kinds(interpolate), [Literal, Id, Literal, Id, Literal]);
}

#[test]
fn lambda_and_application() {
    let cst = parse_clean("def twice f x = f (f x)\n");
    let def = nth_child(cst.root(), 0);
    assert_eq!(child_kinds(def), [App, App]);

    let cst = parse_clean("def id = \\x x\n");
    let def = nth_child(cst.root(), 0);
    assert_eq!(child_kinds(def), [Id, Lambda]);
    assert_eq!(child_kinds(nth_child(def, 1)), [Id, Id]);
}

#[test]
fn target_with_subkey_arguments() {
    let cst = parse_clean("target build x \\ y = x\n");
    let target = nth_child(cst.root(), 0);
    assert_eq!(target.node_kind(), Some(Target));
    assert_eq!(child_kinds(target), [App, Lambda, Id]);
}

#[test]
fn block_body_with_require() {
    let cst = parse_clean("def f x =\n  require Some y = x\n  y\n");
    let def = nth_child(cst.root(), 0);
    assert_eq!(child_kinds(def), [App, Block]);

    let block = nth_child(def, 1);
    assert_eq!(child_kinds(block), [Require, Id]);
    assert_eq!(child_kinds(nth_child(block, 0)), [App, Id]);
}

#[test]
fn topic_declaration() {
    let cst = parse_clean("topic events: List String\n");
    let topic = nth_child(cst.root(), 0);
    assert_eq!(child_kinds(topic), [Id, App]);
}

#[test]
fn continuation_lines_extend_expressions() {
    let cst = parse_clean("def x = 1 +\n    2\ndef y = 3\n");
    let root = cst.root();
    assert_eq!(child_kinds(root), [Def, Def]);
    assert_eq!(child_kinds(nth_child(root, 0)), [Id, Binary]);
}

#[test]
fn operator_precedence_shapes_the_tree() {
    // `a + b * c` parses as `a + (b * c)`
    let cst = parse_clean("def x = a + b * c\n");
    let binary = nth_child(nth_child(cst.root(), 0), 1);
    assert_eq!(child_kinds(binary), [Id, Op, Binary]);

    // `a $ b $ c` is right-associative
    let cst = parse_clean("def x = a $ b $ c\n");
    let binary = nth_child(nth_child(cst.root(), 0), 1);
    assert_eq!(child_kinds(binary), [Id, Op, Binary]);

    // `a - b - c` is left-associative
    let cst = parse_clean("def x = a - b - c\n");
    let binary = nth_child(nth_child(cst.root(), 0), 1);
    assert_eq!(child_kinds(binary), [Binary, Op, Id]);
}

#[test]
fn offsides_stay_balanced_through_nesting() {
    let source =
        "def outer x =\n  def inner y =\n    y\n  match x\n    0 = inner 1\n    _ = inner 2\n";
    let cst = parse_clean(source);

    let root = cst.root();
    // every indent was matched by a dedent before the end of input and
    // the root covers the whole file
    assert_eq!(root.span(), span(0, source.len() as u32));

    let def = nth_child(root, 0);
    assert_eq!(child_kinds(def), [App, Block]);
    assert_eq!(child_kinds(nth_child(def, 1)), [Def, Match]);
}

#[test]
fn syntax_error_recovers_at_the_next_line() {
    let (cst, buffer) = parse_source("def f = 1\n)\ndef g = 2\n");
    assert!(buffer
        .borrow()
        .iter()
        .any(|diagnostic| diagnostic.severity == Severity::Error));

    let root = cst.root();
    assert_eq!(child_kinds(root), [Def, Error, Def]);
}

#[test]
fn misaligned_block_reports_but_keeps_other_items() {
    let (cst, buffer) = parse_source("def f =\n  1 +\ndef g = 2\n");
    assert!(buffer
        .borrow()
        .iter()
        .any(|diagnostic| diagnostic.severity == Severity::Error));

    let kinds = child_kinds(cst.root());
    assert!(kinds.contains(&Def));
    assert_eq!(*kinds.last().unwrap(), Def);
}

#[test]
fn tabs_in_indentation_are_reported() {
    let (_, buffer) = parse_source("def f =\n\tx\n");
    assert!(buffer.borrow().iter().any(|diagnostic| {
        diagnostic.message.as_deref() == Some("tabs are forbidden in indentation")
    }));
}

#[test]
fn unterminated_interpolation_is_reported() {
    let (_, buffer) = parse_source("def s = \"a{x\"\n");
    assert!(!buffer.borrow().is_empty());
}
