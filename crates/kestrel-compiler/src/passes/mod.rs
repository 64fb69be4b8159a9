//! Compiler passes.
//!
//! - [`registration`]: Pass 1 - declare every definition and resolve its signature
//! - [`compilation`]: Pass 2 - instantiate, check bodies and lower to class files

pub mod compilation;
pub mod registration;

pub use compilation::{CompilationOutput, CompilationPass};
pub use registration::{RegistrationOutput, RegistrationPass};
