//! Kestrel Compiler
//!
//! A 2-pass monomorphizing compiler from the Kestrel parse tree to class
//! files.
//!
//! ## Architecture
//!
//! - **Pass 1 (Registration)**: declare every definition and resolve signatures
//! - **Pass 2 (Compilation)**: instantiate on demand, check bodies, lower to
//!   class models, then serialize
//!
//! ## Modules
//!
//! - [`backend`]: class models per instance, names, artifacts
//! - [`check`]: typed expression tree and constant folding
//! - [`classfile`]: class-file models and the binary writer
//! - [`emit`]: typed bodies to cost-accounted code blocks
//! - [`interp`]: reference evaluator for lowered programs
//! - [`ir`]: instructions and code blocks
//! - [`layout`]: value-type flattening and slot counts
//! - [`options`]: compile options and the session
//! - [`overload`]: overload resolution by specificity
//! - [`passes`]: the registration and compilation passes
//! - [`scope`]: local slot allocation
//! - [`template`]: the type pool and instantiation
//! - [`type_resolver`]: textual type references to resolved types
//! - [`types`]: concrete type and method definitions

pub mod backend;
pub mod check;
pub mod classfile;
pub mod emit;
pub mod interp;
pub mod ir;
pub mod layout;
pub mod options;
pub mod overload;
pub mod passes;
pub mod scope;
pub mod template;
pub mod type_resolver;
pub mod types;

pub use backend::{ArtifactSet, LoweredProgram, NameTable};
pub use interp::{InterpError, Interpreter};
pub use options::{CompileOptions, CompileSession};
pub use passes::{CompilationOutput, CompilationPass, RegistrationOutput, RegistrationPass};
pub use template::TypePool;
pub use types::{Type, TypeDef, TypeDefKind};

// Re-export CompilationError from core for convenience
pub use kestrel_core::CompilationError;

use kestrel_core::ast::Program;
use tracing::debug;

/// Run both passes, stopping before serialization.
#[cfg_attr(feature = "profiling", profiling::function)]
pub fn lower(
    program: &Program,
    options: CompileOptions,
) -> Result<LoweredProgram, CompilationError> {
    let (registry, registered) = RegistrationPass::new(program).run()?;
    let session = CompileSession::new(options, &program.main);
    debug!(
        main = %session.main_file,
        files = registered.files_registered,
        "compiling program"
    );
    let output = CompilationPass::new(&registry, &session)?.run()?;
    Ok(output.program)
}

/// Compile a program into its class files.
///
/// Any error aborts the whole compile; there is no partial output.
pub fn compile(
    program: &Program,
    options: CompileOptions,
) -> Result<ArtifactSet, CompilationError> {
    let artifacts = lower(program, options)?.write()?;
    debug!(
        classes = artifacts.len(),
        entry = artifacts.entry_class(),
        digest = artifacts.digest(),
        "compile finished"
    );
    Ok(artifacts)
}
