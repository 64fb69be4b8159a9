//! Kestrel
//!
//! Compiles a parsed Kestrel program into class files for a JVM-style host.
//!
//! The parse tree comes from an external front end; see [`ast`] for its
//! shape. Everything after parsing lives in the workspace crates:
//!
//! - `kestrel-core`: spans, ids, the parse tree and the error taxonomy
//! - `kestrel-registry`: definitions, scopes and the builtin prelude
//! - `kestrel-compiler`: instantiation, checking, lowering and class files
//!
//! # Example
//!
//! ```
//! use kestrel::ast::{Expr, Program, SourceFile};
//! use kestrel::{CompileOptions, Compiler};
//!
//! let program = Program::new("main").with_file(
//!     SourceFile::new("main").with_statement(Expr::call("println", vec![Expr::int(42)])),
//! );
//! let compiler = Compiler::new(CompileOptions::default());
//! let artifacts = compiler.compile(&program).unwrap();
//! assert!(artifacts.get(artifacts.entry_class()).is_some());
//!
//! let execution = compiler.run(&program).unwrap();
//! assert_eq!(execution.output, "42\n");
//! ```

use std::path::Path;

use kestrel_core::ast::Program;
use tracing::debug;

pub use kestrel_compiler::options::DEFAULT_MAX_INSTANTIATION_DEPTH;
pub use kestrel_compiler::{
    ArtifactSet, CompileOptions, Interpreter, LoweredProgram, NameTable, compile, lower,
};
pub use kestrel_core::ast;
pub use kestrel_core::{
    CompilationError, FileId, FrontEndError, HostFault, HostFaultKind, HostFrame, KestrelError,
    RuntimeError, SessionId, SourceFrame, Span,
};

/// Result type used throughout the facade.
pub type Result<T> = std::result::Result<T, KestrelError>;

/// What a program did when run on the reference evaluator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Execution {
    /// Lines printed with `println`.
    pub output: String,
    /// Value of the step counter after `run()` returned.
    pub steps: i64,
}

/// Compiles programs with one set of options.
#[derive(Debug, Clone, Default)]
pub struct Compiler {
    options: CompileOptions,
}

impl Compiler {
    pub fn new(options: CompileOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &CompileOptions {
        &self.options
    }

    /// Compile a program into class files.
    pub fn compile(&self, program: &Program) -> Result<ArtifactSet> {
        Ok(compile(program, self.options.clone())?)
    }

    /// Compile a front-end result, passing its failure through untouched.
    pub fn compile_parsed(
        &self,
        parsed: std::result::Result<Program, FrontEndError>,
    ) -> Result<ArtifactSet> {
        self.compile(&parsed?)
    }

    /// Compile and write every class below `dir` in class-path layout.
    pub fn compile_to_dir(&self, program: &Program, dir: &Path) -> Result<ArtifactSet> {
        let artifacts = self.compile(program)?;
        artifacts.write_to_dir(dir)?;
        Ok(artifacts)
    }

    /// Compile, then run the entry point on the reference evaluator.
    ///
    /// Faults raised by the program come back as [`RuntimeError`]s named in
    /// source terms.
    pub fn run(&self, program: &Program) -> Result<Execution> {
        let lowered = lower(program, self.options.clone())?;
        let mut interpreter = Interpreter::new(&lowered);
        if let Err(err) = interpreter.run() {
            let fault = err.into_fault();
            debug!(?fault, "program faulted");
            return Err(lowered.names.translate_fault(&fault).into());
        }
        Ok(Execution {
            output: interpreter.output().to_string(),
            steps: interpreter.steps(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ast::{Expr, SourceFile};

    #[test]
    fn front_end_errors_pass_through() {
        let failure = FrontEndError::new("main", Span::default(), "unexpected token");
        let err = Compiler::default().compile_parsed(Err(failure.clone())).unwrap_err();
        assert!(matches!(err, KestrelError::FrontEnd(e) if e == failure));
    }

    #[test]
    fn compile_errors_are_wrapped() {
        let program = Program::new("main")
            .with_file(SourceFile::new("main").with_statement(Expr::local("missing")));
        let err = Compiler::default().compile(&program).unwrap_err();
        assert!(err.is_compilation());
    }
}
