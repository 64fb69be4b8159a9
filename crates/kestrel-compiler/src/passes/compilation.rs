//! Compilation Pass - instantiate, check bodies and lower to class models.
//!
//! Runs after registration. Instantiation is demand driven: the pass seeds
//! the pool with every non-generic definition, checks each file's top level,
//! then drains the queue of method bodies that instantiation produced. Each
//! checked body can instantiate more types and methods, which queue more
//! bodies, until the program is closed.
//!
//! ```text
//! ┌──────────────────────┐     ┌──────────────────────┐
//! │ seed non-generic defs│ ──▶ │ check file top levels│
//! └──────────────────────┘     └──────────────────────┘
//!                                         │
//!                                         ▼
//! ┌──────────────────────┐     ┌──────────────────────┐
//! │ layouts, names, lower│ ◀── │ drain pending bodies │ ◀─┐
//! └──────────────────────┘     └──────────────────────┘   │
//!                                         └─ new instances┘
//! ```

use kestrel_core::{CompilationError, FileId, InstanceId, MethodInstanceId, Span};
use kestrel_registry::{DefKind, Registry};
use tracing::debug;

use crate::backend::{self, LoweredProgram, Symbols};
use crate::check::{self, TypedBody};
use crate::layout;
use crate::options::CompileSession;
use crate::template::TypePool;
use crate::types::{MethodDef, Type, TypeDefKind};

/// Output from the compilation pass.
#[derive(Debug)]
pub struct CompilationOutput {
    pub program: LoweredProgram,
    pub types_instantiated: usize,
    pub methods_checked: usize,
}

/// Pass 2: everything between a registry and lowered class models.
pub struct CompilationPass<'r> {
    registry: &'r Registry,
    session: &'r CompileSession,
    pool: TypePool<'r>,
    files: Vec<(FileId, TypedBody)>,
    methods_checked: usize,
}

impl<'r> CompilationPass<'r> {
    pub fn new(
        registry: &'r Registry,
        session: &'r CompileSession,
    ) -> Result<Self, CompilationError> {
        Ok(Self {
            registry,
            session,
            pool: TypePool::new(registry, session)?,
            files: Vec::new(),
            methods_checked: 0,
        })
    }

    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn run(mut self) -> Result<CompilationOutput, CompilationError> {
        let main = self.main_file()?;
        self.seed()?;
        self.check_files()?;
        self.drain_bodies()?;
        self.check_implementations()?;
        self.compute_layouts()?;

        let symbols = Symbols::build(&self.pool, self.session);
        let program = backend::lower_program(&self.pool, &symbols, &self.files, main);
        debug!(
            types = self.pool.types().len(),
            methods = self.methods_checked,
            classes = program.classes.len(),
            "compilation complete"
        );
        Ok(CompilationOutput {
            program,
            types_instantiated: self.pool.types().len(),
            methods_checked: self.methods_checked,
        })
    }

    fn main_file(&self) -> Result<FileId, CompilationError> {
        let name = &self.session.main_file;
        match self.registry.file_by_name(name) {
            Some(entry) => Ok(entry.id),
            None => Err(CompilationError::Import {
                file: name.clone(),
                reason: "main file is not part of the program".to_string(),
                span: Span::default(),
            }),
        }
    }

    /// Instantiate every definition that needs no generic arguments.
    fn seed(&mut self) -> Result<(), CompilationError> {
        let registry = self.registry;
        for def in registry.definitions() {
            let user_defined = matches!(
                def.kind,
                DefKind::Class | DefKind::Struct | DefKind::Interface | DefKind::Module(Some(_))
            );
            if user_defined && !def.is_generic() {
                self.pool.instantiate(def.id, Vec::new(), def.span)?;
            }
        }
        Ok(())
    }

    fn check_files(&mut self) -> Result<(), CompilationError> {
        let registry = self.registry;
        self.pool.set_current_body(None);
        for entry in registry.files() {
            let body = check::check_file(&mut self.pool, entry.id)?;
            self.files.push((entry.id, body));
        }
        Ok(())
    }

    /// Check queued method bodies until no new ones appear.
    fn drain_bodies(&mut self) -> Result<(), CompilationError> {
        while let Some(id) = self.pool.next_pending() {
            if !self.pool.method_mut(id).body.begin() {
                continue;
            }
            self.check_body(id)?;
        }
        self.pool.set_current_body(None);
        Ok(())
    }

    fn check_body(&mut self, id: MethodInstanceId) -> Result<(), CompilationError> {
        self.pool.set_current_body(Some(id));
        let body = check::check_method(&mut self.pool, id)?;
        self.pool.method_mut(id).body.fill(body);
        self.methods_checked += 1;
        Ok(())
    }

    /// Every class provides each method of each interface it names.
    fn check_implementations(&self) -> Result<(), CompilationError> {
        let pool = &self.pool;
        for def in pool.types() {
            if def.kind != TypeDefKind::Class || def.open {
                continue;
            }
            let mut pending = def.interfaces.clone();
            while let Some(interface) = pending.pop() {
                let Some(interface_def) = pool.type_def(interface) else {
                    continue;
                };
                pending.extend(interface_def.interfaces.iter().copied());
                for required in &interface_def.methods {
                    let required = pool.method(*required);
                    if required.is_static {
                        continue;
                    }
                    if !self.provides(def.id, required) {
                        return Err(CompilationError::type_checking(
                            self.registry.get(def.def).span,
                            format!(
                                "'{}' does not implement '{}.{}'",
                                def.name, interface_def.name, required.name
                            ),
                        ));
                    }
                }
            }
        }
        Ok(())
    }

    /// Whether `class` or one of its parents has a matching instance method.
    fn provides(&self, class: InstanceId, required: &MethodDef) -> bool {
        let pool = &self.pool;
        let mut current = Some(Type::Basic(class));
        while let Some(ty) = current {
            let Some(def) = pool.type_def(ty) else {
                return false;
            };
            let found = def.methods.iter().map(|m| pool.method(*m)).any(|method| {
                !method.is_static
                    && method.name == required.name
                    && method.generic_arity == required.generic_arity
                    && method.params == required.params
                    && pool.is_subtype(method.ret, required.ret)
            });
            if found {
                return true;
            }
            current = def.supertype;
        }
        false
    }

    /// Slot counts of every instance, so value types that contain
    /// themselves fail here rather than during lowering.
    fn compute_layouts(&mut self) -> Result<(), CompilationError> {
        let ids: Vec<InstanceId> = self
            .pool
            .types()
            .iter()
            .filter(|def| !def.open)
            .map(|def| def.id)
            .collect();
        for id in ids {
            layout::compute_slots(&mut self.pool, Type::Basic(id))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interp::{Interpreter, Value};
    use crate::options::CompileOptions;
    use crate::passes::RegistrationPass;
    use kestrel_core::ast::{Expr, MethodDecl, Program, SourceFile, TypeDecl, TypeRef};

    fn compile(
        program: &Program,
        options: CompileOptions,
    ) -> Result<CompilationOutput, CompilationError> {
        let (registry, _) = RegistrationPass::new(program).run()?;
        let session = CompileSession::new(options, &program.main);
        CompilationPass::new(&registry, &session)?.run()
    }

    fn println(value: Expr) -> Expr {
        Expr::call("println", vec![value])
    }

    #[test]
    fn imports_run_once() {
        let program = Program::new("main")
            .with_file(
                SourceFile::new("main")
                    .with_statement(Expr::import("lib"))
                    .with_statement(Expr::import("lib")),
            )
            .with_file(SourceFile::new("lib").with_statement(println(Expr::str("hi"))));
        let options = CompileOptions::default();
        let session = CompileSession::new(options.clone(), "main");
        let output = compile(&program, options).unwrap();

        let mut interp = Interpreter::new(&output.program);
        interp.run().unwrap();
        assert_eq!(interp.output(), "hi\n");
        assert_eq!(
            interp.get_static(&session.files_class(), "imported$1"),
            Some(Value::Int(1))
        );
    }

    #[test]
    fn free_functions_are_checked_and_callable() {
        let program = Program::new("main").with_file(
            SourceFile::new("main")
                .with_function(
                    MethodDecl::function("twice")
                        .with_param("x", TypeRef::named("Int"))
                        .returns(TypeRef::named("Int"))
                        .with_body(Expr::ret(Some(Expr::binary(
                            Expr::local("x"),
                            "+",
                            Expr::local("x"),
                        )))),
                )
                .with_statement(println(Expr::call("twice", vec![Expr::int(21)]))),
        );
        let output = compile(&program, CompileOptions::default()).unwrap();
        assert_eq!(output.methods_checked, 1);

        let mut interp = Interpreter::new(&output.program);
        interp.run().unwrap();
        assert_eq!(interp.output(), "42\n");
        assert!(interp.steps() > 0);
    }

    #[test]
    fn missing_main_file() {
        let program = Program::new("main").with_file(SourceFile::new("lib"));
        let err = compile(&program, CompileOptions::default()).unwrap_err();
        assert!(matches!(err, CompilationError::Import { file, .. } if file == "main"));
    }

    #[test]
    fn main_file_option_overrides_program() {
        let program = Program::new("main")
            .with_file(SourceFile::new("main").with_statement(println(Expr::str("main"))))
            .with_file(SourceFile::new("tool").with_statement(println(Expr::str("tool"))));
        let output = compile(&program, CompileOptions::new().with_main_file("tool")).unwrap();
        let mut interp = Interpreter::new(&output.program);
        interp.run().unwrap();
        assert_eq!(interp.output(), "tool\n");
    }

    #[test]
    fn unimplemented_interface_method() {
        let program = Program::new("main").with_file(
            SourceFile::new("main")
                .with_type(
                    TypeDecl::interface("Shape").with_method(
                        MethodDecl::new("area")
                            .returns(TypeRef::named("Int"))
                            .abstract_(),
                    ),
                )
                .with_type(TypeDecl::class("Square").with_interface(TypeRef::named("Shape"))),
        );
        let err = compile(&program, CompileOptions::default()).unwrap_err();
        assert!(matches!(
            err,
            CompilationError::TypeChecking { message, .. } if message.contains("Shape.area")
        ));
    }

    #[test]
    fn inherited_method_satisfies_interface() {
        let area = MethodDecl::new("area")
            .returns(TypeRef::named("Int"))
            .with_body(Expr::ret(Some(Expr::int(4))));
        let program = Program::new("main").with_file(
            SourceFile::new("main")
                .with_type(
                    TypeDecl::interface("Shape").with_method(
                        MethodDecl::new("area")
                            .returns(TypeRef::named("Int"))
                            .abstract_(),
                    ),
                )
                .with_type(TypeDecl::class("Base").with_method(area))
                .with_type(
                    TypeDecl::class("Square")
                        .with_parent(TypeRef::named("Base"))
                        .with_interface(TypeRef::named("Shape")),
                ),
        );
        let output = compile(&program, CompileOptions::default()).unwrap();
        assert!(output.program.classes.iter().any(|c| c.is_interface()));
    }
}
