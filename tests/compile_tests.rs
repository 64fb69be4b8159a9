//! End-to-end compile tests: parse trees in, class files out.

use kestrel::ast::{Expr, MethodDecl, Program, SourceFile, TypeDecl, TypeRef};
use kestrel::{CompilationError, CompileOptions, Compiler, KestrelError, SessionId};
use tempdir::TempDir;

fn int() -> TypeRef {
    TypeRef::named("Int")
}

fn println(value: Expr) -> Expr {
    Expr::call("println", vec![value])
}

fn single_file(file: SourceFile) -> Program {
    Program::new("main").with_file(file)
}

fn compile_error(program: &Program) -> CompilationError {
    match Compiler::default().compile(program) {
        Err(KestrelError::Compilation(err)) => err,
        other => panic!("expected a compilation error, got {other:?}"),
    }
}

fn shapes_program() -> Program {
    single_file(
        SourceFile::new("main")
            .with_type(
                TypeDecl::structure("Point")
                    .with_field("x", int())
                    .with_field("y", int())
                    .with_method(
                        MethodDecl::new("sum").returns(int()).with_body(Expr::ret(Some(
                            Expr::binary(
                                Expr::field(Expr::this(), "x"),
                                "+",
                                Expr::field(Expr::this(), "y"),
                            ),
                        ))),
                    ),
            )
            .with_type(
                TypeDecl::class("Box")
                    .with_generics(&["T"])
                    .with_field("value", TypeRef::named("T"))
                    .with_method(
                        MethodDecl::new("get")
                            .returns(TypeRef::named("T"))
                            .with_body(Expr::ret(Some(Expr::field(Expr::this(), "value")))),
                    ),
            )
            .with_statement(Expr::let_(
                "p",
                None,
                Expr::new_object(TypeRef::named("Point"), vec![Expr::int(3), Expr::int(4)]),
            ))
            .with_statement(println(Expr::method(Expr::local("p"), "sum", vec![])))
            .with_statement(Expr::let_(
                "b",
                None,
                Expr::new_object(TypeRef::generic("Box", vec![int()]), vec![Expr::int(5)]),
            ))
            .with_statement(println(Expr::method(Expr::local("b"), "get", vec![])))
            .with_statement(Expr::let_(
                "s",
                None,
                Expr::new_object(
                    TypeRef::generic("Box", vec![TypeRef::named("String")]),
                    vec![Expr::str("five")],
                ),
            ))
            .with_statement(println(Expr::method(Expr::local("s"), "get", vec![]))),
    )
}

#[test]
fn same_input_gives_identical_bytes() {
    let program = shapes_program();
    let first = Compiler::default().compile(&program).unwrap();
    let second = Compiler::default().compile(&program).unwrap();

    assert_eq!(first.digest(), second.digest());
    let names: Vec<&str> = first.iter().map(|(name, _)| name).collect();
    let again: Vec<&str> = second.iter().map(|(name, _)| name).collect();
    assert_eq!(names, again);
    for (name, bytes) in first.iter() {
        assert_eq!(Some(bytes), second.get(name), "class {name} differs");
    }
}

#[test]
fn every_class_file_has_the_expected_header() {
    let artifacts = Compiler::default().compile(&shapes_program()).unwrap();
    for (name, bytes) in artifacts.iter() {
        assert_eq!(&bytes[..4], &[0xCA, 0xFE, 0xBA, 0xBE], "magic of {name}");
        // minor 0, major 49
        assert_eq!(&bytes[4..8], &[0, 0, 0, 49], "version of {name}");
    }
}

#[test]
fn each_instantiation_gets_its_own_class() {
    let artifacts = Compiler::default().compile(&shapes_program()).unwrap();
    let boxes = artifacts
        .iter()
        .filter(|(name, _)| name.rsplit('/').next().is_some_and(|n| n.starts_with("Box$")))
        .count();
    assert_eq!(boxes, 2);
    assert!(artifacts.iter().any(|(name, _)| name.ends_with("/Point")));
    assert!(artifacts.get(artifacts.entry_class()).is_some());
}

#[test]
fn sessions_namespace_class_names() {
    let program = shapes_program();
    let one = Compiler::new(CompileOptions::new().with_session(SessionId(1)))
        .compile(&program)
        .unwrap();
    let two = Compiler::new(CompileOptions::new().with_session(SessionId(2)))
        .compile(&program)
        .unwrap();
    assert_eq!(one.entry_class(), "kestrel/s1/Entry");
    assert_eq!(two.entry_class(), "kestrel/s2/Entry");
    assert!(one.iter().all(|(name, _)| two.get(name).is_none()));
}

#[test]
fn package_prefixes_every_class() {
    let artifacts = Compiler::new(CompileOptions::new().with_package("app"))
        .compile(&shapes_program())
        .unwrap();
    assert!(artifacts.iter().all(|(name, _)| name.starts_with("app/")));
}

#[test]
fn artifacts_are_written_in_class_path_layout() {
    let dir = TempDir::new("kestrel").unwrap();
    let artifacts = Compiler::default()
        .compile_to_dir(&shapes_program(), dir.path())
        .unwrap();
    for (name, bytes) in artifacts.iter() {
        let written = std::fs::read(dir.path().join(format!("{name}.class"))).unwrap();
        assert_eq!(written, bytes);
    }
}

#[test]
fn most_specific_overload_is_chosen() {
    let program = single_file(
        SourceFile::new("main")
            .with_function(
                MethodDecl::function("f")
                    .with_param("a", int())
                    .with_param("b", int())
                    .with_body(println(Expr::str("int"))),
            )
            .with_function(
                MethodDecl::function("f")
                    .with_param("a", TypeRef::named("Any"))
                    .with_param("b", int())
                    .with_body(println(Expr::str("any"))),
            )
            .with_statement(Expr::call("f", vec![Expr::int(1), Expr::int(2)])),
    );
    let execution = Compiler::default().run(&program).unwrap();
    assert_eq!(execution.output, "int\n");
}

#[test]
fn crossed_overloads_are_ambiguous() {
    let program = single_file(
        SourceFile::new("main")
            .with_function(
                MethodDecl::function("g")
                    .with_param("a", int())
                    .with_param("b", TypeRef::named("String")),
            )
            .with_function(
                MethodDecl::function("g")
                    .with_param("a", TypeRef::named("String"))
                    .with_param("b", int()),
            )
            .with_statement(Expr::call("g", vec![Expr::int(1), Expr::str("x")])),
    );
    assert!(matches!(
        compile_error(&program),
        CompilationError::AmbiguousMethod { name, .. } if name == "g"
    ));
}

#[test]
fn unbounded_generic_expansion_fails_at_the_depth_bound() {
    let nested = TypeRef::generic(
        "Node",
        vec![TypeRef::generic("Node", vec![TypeRef::named("T")])],
    );
    let program = single_file(
        SourceFile::new("main")
            .with_type(
                TypeDecl::class("Node")
                    .with_generics(&["T"])
                    .with_field("next", nested),
            )
            .with_function(
                MethodDecl::function("use")
                    .with_param("n", TypeRef::generic("Node", vec![int()])),
            ),
    );
    let compiler = Compiler::new(CompileOptions::new().with_max_instantiation_depth(12));
    match compiler.compile(&program) {
        Err(KestrelError::Compilation(CompilationError::InstantiationTooDeep { chain, .. })) => {
            assert!(chain.len() > 12);
            assert!(chain.iter().any(|frame| frame.contains("Node<Int>")));
            assert!(chain.iter().any(|frame| frame.contains("Node<Node<Int>>")));
        }
        other => panic!("expected a depth failure, got {other:?}"),
    }
}

#[test]
fn unknown_types_and_imports_are_reported() {
    let unknown = single_file(
        SourceFile::new("main")
            .with_function(MethodDecl::function("f").with_param("x", TypeRef::named("Nope"))),
    );
    assert!(matches!(
        compile_error(&unknown),
        CompilationError::UnknownType { name, .. } if name == "Nope"
    ));

    let missing = single_file(SourceFile::new("main").with_statement(Expr::import("lib")));
    assert!(matches!(
        compile_error(&missing),
        CompilationError::Import { file, .. } if file == "lib"
    ));
}

#[test]
fn duplicate_declarations_are_rejected() {
    let program = single_file(
        SourceFile::new("main")
            .with_type(TypeDecl::class("A"))
            .with_type(TypeDecl::class("A")),
    );
    assert!(matches!(
        compile_error(&program),
        CompilationError::AlreadyDeclared { name, .. } if name == "A"
    ));
}

fn marker() -> TypeDecl {
    TypeDecl::class("Marker")
        .with_field("unit", TypeRef::named("Unit"))
}

#[test]
fn locals_declared_in_field_values_end_with_the_new() {
    let program = single_file(
        SourceFile::new("main")
            .with_type(marker())
            .with_statement(Expr::let_(
                "m",
                None,
                Expr::new_object(
                    TypeRef::named("Marker"),
                    vec![Expr::let_("x", None, Expr::int(5))],
                ),
            ))
            .with_statement(println(Expr::local("x"))),
    );
    assert!(matches!(
        compile_error(&program),
        CompilationError::UndeclaredVariable { name, .. } if name == "x"
    ));
}

#[test]
fn field_value_locals_can_be_redeclared_after_the_new() {
    let program = single_file(
        SourceFile::new("main")
            .with_type(marker())
            .with_statement(Expr::let_(
                "m",
                None,
                Expr::new_object(
                    TypeRef::named("Marker"),
                    vec![Expr::let_("x", None, Expr::int(5))],
                ),
            ))
            .with_statement(Expr::let_("x", None, Expr::int(6)))
            .with_statement(println(Expr::local("x"))),
    );
    let execution = Compiler::default().run(&program).unwrap();
    assert_eq!(execution.output, "6\n");
}
