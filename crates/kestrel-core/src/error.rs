//! Error types for every stage of a compilation.
//!
//! ## Error Hierarchy
//!
//! ```text
//! KestrelError (top-level wrapper)
//! ├── FrontEndError    - parse failures, propagated unchanged
//! ├── CompilationError - user-facing compile errors, each with a span
//! ├── RuntimeError     - host faults translated into source terms
//! └── Io               - writing artifacts to disk
//! ```
//!
//! Broken internal invariants are not errors: they go through
//! [`internal_fault`] and abort the process.

use std::fmt;

use thiserror::Error;

use crate::Span;

// ============================================================================
// Front-end Errors
// ============================================================================

/// A failure reported by the front end while producing the parse tree.
///
/// The core never constructs these itself; it only carries them through.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{file}:{span}: {message}")]
pub struct FrontEndError {
    pub file: String,
    pub span: Span,
    pub message: String,
}

impl FrontEndError {
    pub fn new(file: impl Into<String>, span: Span, message: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            span,
            message: message.into(),
        }
    }
}

// ============================================================================
// Compilation Errors
// ============================================================================

/// User-facing compile errors. Any one of them aborts the compilation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CompilationError {
    /// A type name is not visible from the referencing scope.
    #[error("at {span}: unknown type '{name}'")]
    UnknownType { name: String, span: Span },

    /// A name or method signature is declared twice in one scope.
    #[error("at {span}: '{name}' is already declared")]
    AlreadyDeclared { name: String, span: Span },

    /// A local variable is used without a visible declaration.
    #[error("at {span}: undeclared variable '{name}'")]
    UndeclaredVariable { name: String, span: Span },

    /// A generic definition or method applied to the wrong number of arguments.
    #[error("at {span}: '{name}' expects {expected} generic argument(s), got {got}")]
    GenericCountMismatch {
        name: String,
        expected: usize,
        got: usize,
        span: Span,
    },

    /// No candidate method has a matching name and arity.
    #[error("at {span}: no suitable method '{name}({args})'")]
    NoSuitableMethod {
        name: String,
        args: String,
        span: Span,
    },

    /// More than one candidate survives specificity comparison.
    #[error("at {span}: too many suitable methods for '{name}': {candidates}")]
    AmbiguousMethod {
        name: String,
        candidates: String,
        span: Span,
    },

    /// Any typing failure, including integer literals outside their range.
    #[error("at {span}: {message}")]
    TypeChecking { message: String, span: Span },

    /// `import` names a file that is not part of the program.
    #[error("at {span}: cannot import '{file}': {reason}")]
    Import {
        file: String,
        reason: String,
        span: Span,
    },

    /// Generic expansion exceeded the configured depth bound.
    #[error("at {span}: instantiation too deep:\n  {}", chain.join("\n  "))]
    InstantiationTooDeep { chain: Vec<String>, span: Span },

    /// A method body does not fit the target's branch offset range.
    #[error("at {span}: code of method '{method}' is too large")]
    CodeTooLarge { method: String, span: Span },
}

impl CompilationError {
    /// Get the span where this error occurred.
    pub fn span(&self) -> Span {
        match self {
            CompilationError::UnknownType { span, .. } => *span,
            CompilationError::AlreadyDeclared { span, .. } => *span,
            CompilationError::UndeclaredVariable { span, .. } => *span,
            CompilationError::GenericCountMismatch { span, .. } => *span,
            CompilationError::NoSuitableMethod { span, .. } => *span,
            CompilationError::AmbiguousMethod { span, .. } => *span,
            CompilationError::TypeChecking { span, .. } => *span,
            CompilationError::Import { span, .. } => *span,
            CompilationError::InstantiationTooDeep { span, .. } => *span,
            CompilationError::CodeTooLarge { span, .. } => *span,
        }
    }

    /// Shorthand for a [`CompilationError::TypeChecking`] error.
    pub fn type_checking(span: Span, message: impl Into<String>) -> Self {
        CompilationError::TypeChecking {
            message: message.into(),
            span,
        }
    }
}

// ============================================================================
// Runtime Errors
// ============================================================================

/// One frame of a translated stack trace, named in source terms.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFrame {
    pub type_name: String,
    pub method: String,
    pub line: Option<u32>,
}

impl fmt::Display for SourceFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.line {
            Some(line) => write!(f, "{}.{} (line {line})", self.type_name, self.method),
            None => write!(f, "{}.{}", self.type_name, self.method),
        }
    }
}

/// Failures of compiled code, after translation out of host terms.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RuntimeError {
    #[error("cannot cast '{from}' to '{to}'")]
    InvalidCast {
        from: String,
        to: String,
        trace: Vec<SourceFrame>,
    },

    #[error("stack exhausted")]
    StackExhausted { trace: Vec<SourceFrame> },

    /// Any other host fault, passed through with its message.
    #[error("{class}: {message}")]
    Host {
        class: String,
        message: String,
        trace: Vec<SourceFrame>,
    },
}

impl RuntimeError {
    /// Frames of compiled user code, innermost first.
    pub fn trace(&self) -> &[SourceFrame] {
        match self {
            RuntimeError::InvalidCast { trace, .. } => trace,
            RuntimeError::StackExhausted { trace } => trace,
            RuntimeError::Host { trace, .. } => trace,
        }
    }
}

// ============================================================================
// Top-level Error
// ============================================================================

/// Any error the pipeline can report.
#[derive(Debug, Error)]
pub enum KestrelError {
    #[error(transparent)]
    FrontEnd(#[from] FrontEndError),

    #[error(transparent)]
    Compilation(#[from] CompilationError),

    #[error(transparent)]
    Runtime(#[from] RuntimeError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl KestrelError {
    pub fn is_compilation(&self) -> bool {
        matches!(self, KestrelError::Compilation(_))
    }

    pub fn is_runtime(&self) -> bool {
        matches!(self, KestrelError::Runtime(_))
    }
}

/// Abort on a broken internal invariant.
///
/// Used for conditions earlier stages guarantee cannot happen, such as a
/// local declared twice in one scope after checking succeeded.
#[cold]
#[track_caller]
pub fn internal_fault(message: impl fmt::Display) -> ! {
    panic!("internal compiler fault: {message}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compilation_error_display() {
        let err = CompilationError::UnknownType {
            name: "Foo".into(),
            span: Span::new(2, 7, 3),
        };
        assert_eq!(err.to_string(), "at 2:7: unknown type 'Foo'");
        assert_eq!(err.span(), Span::new(2, 7, 3));
    }

    #[test]
    fn too_deep_lists_chain() {
        let err = CompilationError::InstantiationTooDeep {
            chain: vec!["Node<Int>".into(), "Node<Node<Int>>".into()],
            span: Span::new(1, 1, 1),
        };
        let text = err.to_string();
        assert!(text.contains("Node<Int>"));
        assert!(text.contains("Node<Node<Int>>"));
    }

    #[test]
    fn wraps_into_top_level() {
        let err: KestrelError = CompilationError::type_checking(Span::default(), "bad").into();
        assert!(err.is_compilation());
        assert_eq!(err.to_string(), "at <generated>: bad");
    }

    #[test]
    #[should_panic(expected = "internal compiler fault")]
    fn internal_fault_panics() {
        internal_fault("duplicate local 'x'");
    }
}
