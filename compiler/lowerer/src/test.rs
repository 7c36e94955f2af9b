use crate::lower;
use ast::{Name, FLAG_SYNTHETIC, SYM_LEAF};
use diagnostics::{Buffer, Reporter, Severity};
use session::{special, Top};
use span::SourceFile;
use utility::Atom;

fn lower_into(source: &str, top: &mut Top) -> Buffer {
    let file = SourceFile::new("test", source.to_owned());
    let buffer = Buffer::default();
    let reporter = Reporter::buffer(buffer.clone());
    let cst = parser::parse(&file, &reporter);
    lower(&cst, &file, top, &reporter);
    buffer
}

fn lower_source(source: &str) -> (Top, Buffer) {
    let mut top = Top::default();
    let buffer = lower_into(source, &mut top);
    (top, buffer)
}

#[track_caller]
fn lower_clean(source: &str) -> Top {
    let (top, buffer) = lower_source(source);
    let diagnostics = buffer.borrow();
    assert!(
        diagnostics.is_empty(),
        "expected clean lowering, got: {:?}",
        diagnostics
            .iter()
            .map(|diagnostic| diagnostic.message.clone())
            .collect::<Vec<_>>(),
    );
    drop(diagnostics);
    top
}

#[track_caller]
fn def_body(top: &Top, package: &str, name: &str) -> String {
    let package = top
        .packages
        .get(&Name::from(package))
        .unwrap_or_else(|| panic!("package {package} missing"));
    let value = package.files[0]
        .content
        .defs
        .get(&Name::from(name))
        .unwrap_or_else(|| {
            panic!(
                "definition {name} missing; present: {:?}",
                package.files[0].content.defs.keys().collect::<Vec<_>>(),
            )
        });
    value.body.to_string()
}

fn errors(buffer: &Buffer) -> usize {
    buffer
        .borrow()
        .iter()
        .filter(|diagnostic| diagnostic.severity == Severity::Error)
        .count()
}

#[test]
fn package_and_import_basics() {
    let top = lower_clean("package p\nfrom q import x\nfrom q import def y\n");

    let package = top.packages.get(&Name::from("p")).expect("package p");
    let imports = &package.files[0].content.imports;

    let x = imports.mixed.get(&Name::from("x")).expect("import x");
    assert_eq!(x.qualified, Some(Atom::from("x@q")));

    let y = imports.defs.get(&Name::from("y")).expect("import y");
    assert_eq!(y.qualified, Some(Atom::from("y@q")));
}

#[test]
fn files_without_imports_see_the_standard_package() {
    let top = lower_clean("def f = 1\n");
    let package = top.packages.get(&Name::from("test")).expect("default package");
    assert_eq!(
        package.files[0].content.imports.import_all,
        vec![Atom::WAKE],
    );
}

#[test]
fn data_desugars_into_constructors() {
    let top = lower_clean("data Maybe a = Some a | None\n");

    assert_eq!(
        def_body(&top, "test", "Some@test"),
        "(\\_ Construct(Maybe, Some))",
    );
    assert_eq!(def_body(&top, "test", "None@test"), "Construct(Maybe, None)");

    let package = top.packages.get(&Name::from("test")).unwrap();
    assert!(package.files[0].local.types.contains_key(&Name::from("Maybe")));
}

#[test]
fn tuple_synthesizes_accessors() {
    let top = lower_clean("tuple Point = X: Integer | Y: Integer\n");
    let package = top.packages.get(&Name::from("test")).unwrap();
    let defs = &package.files[0].content.defs;

    for name in [
        "Point@test",
        "getPointX@test",
        "getPointY@test",
        "setPointX@test",
        "setPointY@test",
        "editPointX@test",
        "editPointY@test",
    ] {
        assert!(defs.contains_key(&Name::from(name)), "{name} missing");
    }

    // all synthetic except the constructor itself
    assert_eq!(defs.get(&Name::from("Point@test")).unwrap().body.flags & FLAG_SYNTHETIC, 0);
    for name in ["getPointX@test", "setPointY@test", "editPointX@test"] {
        assert_ne!(
            defs.get(&Name::from(name)).unwrap().body.flags & FLAG_SYNTHETIC,
            0,
            "{name} should be synthetic",
        );
    }

    assert_eq!(
        def_body(&top, "test", "getPointX@test"),
        "(\\_ Get(Point, Point, 0))",
    );
    assert_eq!(
        def_body(&top, "test", "getPointY@test"),
        "(\\_ Get(Point, Point, 1))",
    );

    // the constructor binds the fields by their tags, outermost first
    assert_eq!(
        def_body(&top, "test", "Point@test"),
        "(\\X (\\Y Construct(Point, Point)))",
    );

    // set rebuilds every slot, substituting the changed one
    let set = def_body(&top, "test", "setPointX@test");
    assert!(set.starts_with("(\\X (\\_ x (def"), "{set}");
    assert!(set.contains("_ a0001 = Get(Point, Point, 1)"), "{set}");
    assert!(set.contains("_ a0002 = X"), "{set}");

    let edit = def_body(&top, "test", "editPointX@test");
    assert!(edit.starts_with("(\\fnX"), "{edit}");
    assert!(edit.contains("(fnX ((\\_ Get(Point, Point, 0)) _ x))"), "{edit}");
}

#[test]
fn if_lowers_to_a_boolean_match() {
    let top = lower_clean("def sign x = if x < 0 then -1 else 1\n");

    assert_eq!(
        def_body(&top, "test", "sign@test"),
        "(\\x (match ((binary < x) 0) { True@wake = (unary - 1); False@wake = 1; }))",
    );
}

#[test]
fn literal_patterns_lift_to_guards() {
    let top = lower_clean("def f x = match x\n  0 = \"zero\"\n  _ = \"other\"\n");
    let body = def_body(&top, "test", "f@test");

    // the literal became a fresh binder with an icmp guard against it
    assert!(body.contains("_ k0"), "{body}");
    assert!(body.contains("(prim icmp)"), "{body}");
    assert!(body.contains("LT@wake = False@wake"), "{body}");
    assert!(body.contains("EQ@wake = True@wake"), "{body}");
    assert!(body.contains("\"zero\""), "{body}");
    assert!(body.ends_with("_ = \"other\"; }))"), "{body}");
}

#[test]
fn match_guards_compose_with_literal_guards() {
    let top = lower_clean("def f x y = match x y\n  1 z if z = \"a\"\n  _ _ = \"b\"\n");
    let body = def_body(&top, "test", "f@test");

    // the user guard sits in EQ position of the lifted comparison
    assert!(body.contains("EQ@wake = z"), "{body}");
}

#[test]
fn require_lowers_to_a_refutable_match() {
    let top = lower_clean("def f x =\n  require Some y = x\n  y\n");

    assert_eq!(
        def_body(&top, "test", "f@test"),
        "(\\x (match! x { (Some y) = y; }))",
    );
}

#[test]
fn require_else_becomes_otherwise() {
    let top = lower_clean("def f x =\n  require Some y = x else 0\n  y\n");
    let body = def_body(&top, "test", "f@test");
    assert!(body.ends_with("else 0))"), "{body}");
}

#[test]
fn lambda_binders_desugar_by_shape() {
    // plain binder
    let top = lower_clean("def id = \\x x\n");
    assert_eq!(def_body(&top, "test", "id@test"), "(\\x x)");

    // constructor binder destructures through a fresh name
    let top = lower_clean("def first = \\(Pair a b) a\n");
    assert_eq!(
        def_body(&top, "test", "first@test"),
        "(\\_ xx (match _ xx { (Pair a b) = a; }))",
    );

    // annotated binder shadows through an ascription
    let top = lower_clean("def f = \\(x: Integer) x\n");
    let body = def_body(&top, "test", "f@test");
    assert!(body.starts_with("(\\_ typed (def x = (_ typed : Integer);"), "{body}");
}

#[test]
fn operator_sections_wrap_in_lambdas() {
    let top = lower_clean("def inc = (_ + 1)\n");
    assert_eq!(
        def_body(&top, "test", "inc@test"),
        "(\\_ 1 ((binary + _ 1) 1))",
    );

    let top = lower_clean("def sub = (_ - _)\n");
    assert_eq!(
        def_body(&top, "test", "sub@test"),
        "(\\_ 1 (\\_ 2 ((binary - _ 1) _ 2)))",
    );
}

#[test]
fn pattern_arguments_lower_through_a_match() {
    let top = lower_clean("def fst (Pair a b) = a\n");
    assert_eq!(
        def_body(&top, "test", "fst@test"),
        "(\\_ 0 (match _ 0 { (Pair a b) = a; }))",
    );
}

#[test]
fn annotated_arguments_shadow_their_binders() {
    let top = lower_clean("def f (x: Integer) = x\n");
    let body = def_body(&top, "test", "f@test");
    assert!(body.contains("_type x = (x : Integer)"), "{body}");
}

#[test]
fn top_level_ascription_survives() {
    let top = lower_clean("def n: Integer = 42\n");
    assert_eq!(def_body(&top, "test", "n@test"), "(42 : Integer)");
}

#[test]
fn destructuring_definitions_extract_components() {
    let top = lower_clean("def Pair x y = p\n");
    let package = top.packages.get(&Name::from("test")).unwrap();
    let defs = &package.files[0].content.defs;

    assert!(defs.contains_key(&Name::from("_ extract 1@test")));
    assert_eq!(
        def_body(&top, "test", "x@test"),
        "(match _ extract 1 { (Pair _x _) = _x; })",
    );
    assert_eq!(
        def_body(&top, "test", "y@test"),
        "(match _ extract 1 { (Pair _ _y) = _y; })",
    );
}

#[test]
fn target_memoizes_through_tget() {
    let top = lower_clean("target build x \\ y = x\n");
    let package = top.packages.get(&Name::from("test")).unwrap();
    let defs = &package.files[0].content.defs;

    let table = defs.get(&Name::from("table build@test")).expect("table binding");
    assert!(table.body.to_string().contains("(prim tnew)"));

    let body = def_body(&top, "test", "build@test");
    assert!(body.contains("(prim tget)"), "{body}");
    assert!(body.contains("table build"), "{body}");
    assert!(body.contains("(prim hash)"), "{body}");
    // cache key over x, subkey over y
    assert!(body.contains("((\\_ (prim hash)) x)"), "{body}");
    assert!(body.contains("((\\_ (prim hash)) y)"), "{body}");
}

#[test]
fn target_without_hashed_arguments_is_an_error() {
    let (_, buffer) = lower_source("target build \\ y = 1\n");
    assert!(errors(&buffer) >= 1);
}

#[test]
fn string_interpolation_folds_through_cat() {
    let top = lower_clean("def s x = \"a{x}b\"\n");
    let body = def_body(&top, "test", "s@test");

    assert!(body.contains("(prim cat)"), "{body}");
    assert!(body.contains("(format x)"), "{body}");
    assert!(body.contains("\"a\""), "{body}");
    assert!(body.contains("\"b\""), "{body}");
}

#[test]
fn subscribe_and_topics() {
    let top = lower_clean("topic events: List String\ndef s = subscribe events\n");

    let package = top.packages.get(&Name::from("test")).unwrap();
    assert!(package.files[0].topics.contains_key(&Name::from("events")));
    assert_eq!(def_body(&top, "test", "s@test"), "(subscribe events)");
}

#[test]
fn publishes_are_recorded_without_exporting() {
    let top = lower_clean("topic events: List String\npublish events = 42\n");
    let package = top.packages.get(&Name::from("test")).unwrap();
    let published: Vec<_> = package.files[0]
        .content
        .defs
        .keys()
        .filter(|name| name.as_str().starts_with("publish events"))
        .collect();
    assert_eq!(published.len(), 1);
}

#[test]
fn publish_may_not_be_a_function() {
    let (_, buffer) = lower_source("topic t: Integer\npublish t x = x\n");
    assert!(errors(&buffer) >= 1);
}

#[test]
fn builtin_package_name_is_reserved() {
    let (_, buffer) = lower_source("package builtin\n");
    assert!(errors(&buffer) >= 1);
}

#[test]
fn upper_case_topics_are_rejected() {
    let (_, buffer) = lower_source("topic Events: Integer\n");
    assert!(errors(&buffer) >= 1);
}

#[test]
fn duplicate_definitions_report_the_second() {
    let (top, buffer) = lower_source("def f = 1\ndef f = 2\n");
    assert_eq!(errors(&buffer), 1);
    // first wins
    assert_eq!(def_body(&top, "test", "f@test"), "1");
}

#[test]
fn lower_case_data_types_are_rejected() {
    let (_, buffer) = lower_source("data maybe = None\n");
    assert!(errors(&buffer) >= 1);
}

#[test]
fn operator_imports_require_arity_when_changing_spelling() {
    let (_, buffer) = lower_source("from q import plus = +\n");
    assert!(errors(&buffer) >= 1);

    let top = lower_clean("from q import binary + = plus\n");
    let package = top.packages.get(&Name::from("test")).unwrap();
    let imports = &package.files[0].content.imports;
    let import = imports.mixed.get(&Name::from("binary +")).expect("binary + import");
    assert_eq!(import.qualified, Some(Atom::from("plus@q")));
}

#[test]
fn exported_definitions_become_leaves() {
    let top = lower_clean("package p\nfrom p export def f\ndef f = 1\n");
    let package = top.packages.get(&Name::from("p")).unwrap();

    let export = package.exports.defs.get(&Name::from("f")).expect("export f");
    assert_ne!(export.flags & SYM_LEAF, 0);

    let local = package.files[0].local.defs.get(&Name::from("f")).unwrap();
    assert_ne!(local.flags & SYM_LEAF, 0);
    assert_eq!(local.qualified, Some(Atom::from("f@p")));
}

#[test]
fn several_files_share_a_package() {
    let mut top = Top::default();
    let first = lower_into("package m\ndef f = 1\n", &mut top);
    let second = lower_into("package m\ndef g = 2\n", &mut top);
    assert!(first.borrow().is_empty() && second.borrow().is_empty());

    let package = top.packages.get(&Name::from("m")).unwrap();
    assert_eq!(package.files.len(), 2);
    assert!(package.package.defs.contains_key(&Name::from("f")));
    assert!(package.package.defs.contains_key(&Name::from("g")));
}

#[test]
fn cross_file_duplicates_conflict() {
    let mut top = Top::default();
    lower_into("package m\ndef f = 1\n", &mut top);
    let second = lower_into("package m\ndef f = 2\n", &mut top);
    assert!(errors(&second) >= 1);
}

#[test]
fn globals_collect_across_files() {
    let mut top = Top::default();
    lower_into("package a\nglobal def f = 1\n", &mut top);
    let second = lower_into("package b\nglobal def f = 2\n", &mut top);
    // the same global from two packages collides
    assert!(errors(&second) >= 1);
    assert!(top.globals.defs.contains_key(&Name::from("f")));
}

#[test]
fn wake_package_registers_special_sums() {
    lower_clean("package wake\ndata Boolean = True | False\n");
    let sum = special::find_special(Atom::BOOLEAN).expect("Boolean registered");
    assert_eq!(sum.members.len(), 2);
    assert_eq!(sum.members[0].ast.name, Atom::from("True"));
}

#[test]
fn desugaring_is_idempotent() {
    let source = "package p\ndata Maybe a = Some a | None\ndef f x = if x then 1 else 0\n";

    let file = SourceFile::new("test", source.to_owned());
    let reporter = Reporter::silent();
    let cst = parser::parse(&file, &reporter);

    let mut first = Top::default();
    lower(&cst, &file, &mut first, &reporter);
    let mut second = Top::default();
    lower(&cst, &file, &mut second, &reporter);

    let render = |top: &Top| {
        let package = top.packages.get(&Name::from("p")).unwrap();
        package.files[0]
            .content
            .defs
            .iter()
            .map(|(name, value)| format!("{name} = {}", value.body))
            .collect::<Vec<_>>()
            .join("\n")
    };
    assert_eq!(render(&first), render(&second));
}

#[test]
fn recovery_keeps_the_remaining_items() {
    let (top, buffer) = lower_source("def f = 1\n)\ndef g = 2\n");
    assert!(errors(&buffer) >= 1);

    let package = top.packages.get(&Name::from("test")).unwrap();
    assert!(package.files[0].content.defs.contains_key(&Name::from("f@test")));
    assert!(package.files[0].content.defs.contains_key(&Name::from("g@test")));
}

#[test]
fn tuple_accessor_laws_hold_by_construction() {
    // `get (set x v)` reads back the stored slot and `edit g v` wraps the
    // read of the same slot; the synthesized bodies pin this shape
    let top = lower_clean("tuple Box = Value: Integer\n");

    let get = def_body(&top, "test", "getBoxValue@test");
    let set = def_body(&top, "test", "setBoxValue@test");
    let edit = def_body(&top, "test", "editBoxValue@test");

    assert_eq!(get, "(\\_ Get(Box, Box, 0))");
    // set stores the new value in the only slot
    assert_eq!(set, "(\\Value (\\_ x (def _ a0001 = Value; in Construct(Box, Box))))");
    // edit applies the function to the read of that slot
    assert_eq!(
        edit,
        "(\\fnValue (\\_ x (def _ a0001 = (fnValue ((\\_ Get(Box, Box, 0)) _ x)); \
         in Construct(Box, Box))))",
    );
}
