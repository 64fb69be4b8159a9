//! Running compiled programs on the reference evaluator.

use kestrel::ast::{Expr, MethodDecl, Program, SourceFile, TypeDecl, TypeRef};
use kestrel::{CompileOptions, Compiler, KestrelError, RuntimeError, Span};

fn int() -> TypeRef {
    TypeRef::named("Int")
}

fn println(value: Expr) -> Expr {
    Expr::call("println", vec![value])
}

fn run(file: SourceFile) -> kestrel::Result<kestrel::Execution> {
    Compiler::default().run(&Program::new("main").with_file(file))
}

fn output(file: SourceFile) -> String {
    run(file).unwrap().output
}

/// `i` counts from 0 to `n`, printing nothing.
fn counting_loop(n: i128) -> SourceFile {
    SourceFile::new("main").with_statement(Expr::block(vec![
        Expr::let_("i", None, Expr::int(0)),
        Expr::while_(
            Expr::binary(Expr::local("i"), "<", Expr::int(n)),
            Expr::assign("i", Expr::binary(Expr::local("i"), "+", Expr::int(1))),
        ),
    ]))
}

#[test]
fn prints_every_primitive() {
    let out = output(
        SourceFile::new("main")
            .with_statement(println(Expr::int(7)))
            .with_statement(println(Expr::bool(true)))
            .with_statement(println(Expr::float(2.5)))
            .with_statement(println(Expr::str("text")))
            .with_statement(println(Expr::binary(Expr::str("a"), "+", Expr::str("b")))),
    );
    assert_eq!(out, "7\ntrue\n2.5\ntext\nab\n");
}

#[test]
fn loop_cost_is_linear_in_iterations() {
    let steps = |n| run(counting_loop(n)).unwrap().steps;
    let per_iteration = steps(3) - steps(2);
    assert!(per_iteration > 0);
    assert_eq!(steps(10) - steps(2), 8 * per_iteration);
}

#[test]
fn same_program_costs_the_same_every_run() {
    let first = run(counting_loop(5)).unwrap();
    let second = run(counting_loop(5)).unwrap();
    assert_eq!(first, second);
}

#[test]
fn imported_file_runs_once() {
    let program = Program::new("main")
        .with_file(
            SourceFile::new("main")
                .with_statement(Expr::import("lib"))
                .with_statement(Expr::import("lib"))
                .with_statement(println(Expr::str("main"))),
        )
        .with_file(SourceFile::new("lib").with_statement(println(Expr::str("lib"))));
    let execution = Compiler::default().run(&program).unwrap();
    assert_eq!(execution.output, "lib\nmain\n");
}

#[test]
fn value_types_and_generic_classes() {
    let out = output(
        SourceFile::new("main")
            .with_type(
                TypeDecl::structure("Pair")
                    .with_field("a", int())
                    .with_field("b", int()),
            )
            .with_type(
                TypeDecl::class("Box")
                    .with_generics(&["T"])
                    .with_field("value", TypeRef::named("T")),
            )
            .with_statement(Expr::let_(
                "p",
                None,
                Expr::new_object(TypeRef::named("Pair"), vec![Expr::int(1), Expr::int(2)]),
            ))
            .with_statement(println(Expr::field(Expr::local("p"), "b")))
            .with_statement(Expr::let_(
                "b",
                None,
                Expr::new_object(TypeRef::generic("Box", vec![int()]), vec![Expr::int(9)]),
            ))
            .with_statement(Expr::set_field(Expr::local("b"), "value", Expr::int(10)))
            .with_statement(println(Expr::field(Expr::local("b"), "value"))),
    );
    assert_eq!(out, "2\n10\n");
}

#[test]
fn value_type_results_come_back_whole() {
    let out = output(
        SourceFile::new("main")
            .with_type(
                TypeDecl::structure("Pair")
                    .with_field("a", int())
                    .with_field("b", TypeRef::named("Int64")),
            )
            .with_function(
                MethodDecl::function("make")
                    .with_param("x", int())
                    .returns(TypeRef::named("Pair"))
                    .with_body(Expr::ret(Some(Expr::new_object(
                        TypeRef::named("Pair"),
                        vec![Expr::local("x"), Expr::int(40)],
                    )))),
            )
            .with_statement(Expr::let_("p", None, Expr::call("make", vec![Expr::int(2)])))
            .with_statement(println(Expr::field(Expr::local("p"), "a")))
            .with_statement(println(Expr::field(Expr::local("p"), "b"))),
    );
    assert_eq!(out, "2\n40\n");
}

#[test]
fn overrides_dispatch_on_the_receiver() {
    let name = |text: &str| {
        MethodDecl::new("name")
            .returns(TypeRef::named("String"))
            .with_body(Expr::ret(Some(Expr::str(text))))
    };
    let out = output(
        SourceFile::new("main")
            .with_type(TypeDecl::class("Base").with_method(name("base")))
            .with_type(
                TypeDecl::class("Derived")
                    .with_parent(TypeRef::named("Base"))
                    .with_method(name("derived")),
            )
            .with_statement(Expr::let_(
                "b",
                Some(TypeRef::named("Base")),
                Expr::new_object(TypeRef::named("Derived"), vec![]),
            ))
            .with_statement(println(Expr::method(Expr::local("b"), "name", vec![]))),
    );
    assert_eq!(out, "derived\n");
}

#[test]
fn generic_methods_are_instantiated_per_argument_list() {
    let out = output(
        SourceFile::new("main")
            .with_function(
                MethodDecl::function("id")
                    .with_generics(&["T"])
                    .with_param("x", TypeRef::named("T"))
                    .returns(TypeRef::named("T"))
                    .with_body(Expr::ret(Some(Expr::local("x")))),
            )
            .with_statement(println(Expr::generic_call("id", vec![int()], vec![Expr::int(7)])))
            .with_statement(println(Expr::generic_call(
                "id",
                vec![TypeRef::named("String")],
                vec![Expr::str("seven")],
            ))),
    );
    assert_eq!(out, "7\nseven\n");
}

#[test]
fn integer_arithmetic_wraps() {
    let out = output(
        SourceFile::new("main")
            .with_statement(Expr::let_("x", Some(TypeRef::named("Int8")), Expr::int(127)))
            .with_statement(println(Expr::binary(Expr::local("x"), "+", Expr::int(1)))),
    );
    assert_eq!(out, "-128\n");
}

#[test]
fn runaway_recursion_is_stack_exhaustion() {
    let err = run(SourceFile::new("main")
        .with_function(MethodDecl::function("spin").with_body(Expr::call("spin", vec![])))
        .with_statement(Expr::call("spin", vec![])))
    .unwrap_err();
    let KestrelError::Runtime(RuntimeError::StackExhausted { trace }) = err else {
        panic!("expected stack exhaustion, got {err:?}");
    };
    assert!(trace.len() > 1);
    assert_eq!(trace[0].type_name, "main");
    assert_eq!(trace[0].method, "spin");
    assert_eq!(trace.last().map(|f| f.method.as_str()), Some("main"));
}

#[test]
fn division_by_zero_is_a_host_fault() {
    let err = run(SourceFile::new("main")
        .with_statement(Expr::let_("zero", None, Expr::int(0)))
        .with_statement(println(Expr::binary(Expr::int(1), "/", Expr::local("zero")))))
    .unwrap_err();
    match err {
        KestrelError::Runtime(RuntimeError::Host { class, message, trace }) => {
            assert_eq!(class, "java.lang.ArithmeticException");
            assert_eq!(message, "/ by zero");
            assert_eq!(trace.len(), 1);
        }
        other => panic!("expected a host fault, got {other:?}"),
    }
}

#[test]
fn line_numbers_are_optional() {
    let program = Program::new("main").with_file(
        SourceFile::new("main")
            .with_statement(println(Expr::int(1)).at(Span::new(3, 1, 10)))
            .with_statement(println(Expr::int(2)).at(Span::new(4, 1, 10))),
    );
    let with = Compiler::default().compile(&program).unwrap();
    let without = Compiler::new(CompileOptions::new().with_line_numbers(false))
        .compile(&program)
        .unwrap();
    let files = |set: &kestrel::ArtifactSet| {
        set.iter()
            .find(|(name, _)| name.ends_with("/Files"))
            .map(|(_, bytes)| bytes.len())
            .unwrap()
    };
    assert!(files(&with) > files(&without));
}

#[test]
fn native_string_length_calls_the_host() {
    let out = output(SourceFile::new("main").with_statement(println(Expr::method(
        Expr::str("kestrel"),
        "length",
        vec![],
    ))));
    assert_eq!(out, "7\n");
}

#[test]
fn unsigned_values_print_as_numbers() {
    let out = output(
        SourceFile::new("main")
            .with_statement(Expr::let_("c", Some(TypeRef::named("UInt16")), Expr::int(65)))
            .with_statement(println(Expr::local("c")))
            .with_statement(Expr::let_("b", Some(TypeRef::named("UInt8")), Expr::int(200)))
            .with_statement(println(Expr::local("b"))),
    );
    assert_eq!(out, "65\n200\n");
}

#[test]
fn value_types_copy_safely_onto_themselves() {
    let swapped = |place: Expr, ty: &str| {
        Expr::new_object(
            TypeRef::named(ty),
            vec![Expr::field(place.clone(), "b"), Expr::field(place, "a")],
        )
    };
    let out = output(
        SourceFile::new("main")
            .with_type(
                TypeDecl::structure("Pair")
                    .with_field("a", int())
                    .with_field("b", int()),
            )
            .with_type(
                TypeDecl::structure("Wide")
                    .with_field("a", TypeRef::named("Int64"))
                    .with_field("b", TypeRef::named("Int64")),
            )
            .with_type(
                TypeDecl::class("Holder")
                    .with_field("wide", TypeRef::named("Wide")),
            )
            .with_statement(Expr::let_(
                "p",
                None,
                Expr::new_object(TypeRef::named("Pair"), vec![Expr::int(1), Expr::int(2)]),
            ))
            .with_statement(Expr::assign("p", swapped(Expr::local("p"), "Pair")))
            .with_statement(println(Expr::field(Expr::local("p"), "a")))
            .with_statement(println(Expr::field(Expr::local("p"), "b")))
            .with_statement(Expr::let_(
                "h",
                None,
                Expr::new_object(
                    TypeRef::named("Holder"),
                    vec![Expr::new_object(
                        TypeRef::named("Wide"),
                        vec![Expr::int(3), Expr::int(4)],
                    )],
                ),
            ))
            .with_statement(Expr::set_field(
                Expr::local("h"),
                "wide",
                swapped(Expr::field(Expr::local("h"), "wide"), "Wide"),
            ))
            .with_statement(println(Expr::field(Expr::field(Expr::local("h"), "wide"), "a")))
            .with_statement(println(Expr::field(Expr::field(Expr::local("h"), "wide"), "b"))),
    );
    assert_eq!(out, "2\n1\n4\n3\n");
}
