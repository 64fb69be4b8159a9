//! Compile configuration and the per-compile session built from it.

use kestrel_core::SessionId;

/// Default bound on nested instantiations before compilation gives up.
pub const DEFAULT_MAX_INSTANTIATION_DEPTH: usize = 64;

/// User-facing knobs for one compile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileOptions {
    /// Namespaces generated class names; concurrent compiles sharing one
    /// class namespace need distinct sessions.
    pub session_id: SessionId,
    pub max_instantiation_depth: usize,
    /// Overrides the program's declared main file.
    pub main_file: Option<String>,
    /// First segment of every generated class name.
    pub package: String,
    pub emit_line_numbers: bool,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            session_id: SessionId::default(),
            max_instantiation_depth: DEFAULT_MAX_INSTANTIATION_DEPTH,
            main_file: None,
            package: "kestrel".to_string(),
            emit_line_numbers: true,
        }
    }
}

impl CompileOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_session(mut self, session_id: SessionId) -> Self {
        self.session_id = session_id;
        self
    }

    pub fn with_max_instantiation_depth(mut self, depth: usize) -> Self {
        self.max_instantiation_depth = depth;
        self
    }

    pub fn with_main_file(mut self, file: impl Into<String>) -> Self {
        self.main_file = Some(file.into());
        self
    }

    pub fn with_package(mut self, package: impl Into<String>) -> Self {
        self.package = package.into();
        self
    }

    pub fn with_line_numbers(mut self, emit: bool) -> Self {
        self.emit_line_numbers = emit;
        self
    }
}

/// Everything a compile needs to know about itself, threaded through every
/// stage instead of living in globals.
#[derive(Debug, Clone)]
pub struct CompileSession {
    pub options: CompileOptions,
    pub main_file: String,
    prefix: String,
}

impl CompileSession {
    pub fn new(options: CompileOptions, declared_main: &str) -> Self {
        let main_file = options
            .main_file
            .clone()
            .unwrap_or_else(|| declared_main.to_string());
        let prefix = format!("{}/{}", options.package, options.session_id);
        Self {
            options,
            main_file,
            prefix,
        }
    }

    pub fn max_depth(&self) -> usize {
        self.options.max_instantiation_depth
    }

    /// Qualify a generated class name with package and session.
    pub fn class_name(&self, simple: &str) -> String {
        format!("{}/{}", self.prefix, simple)
    }

    /// The runtime entry class.
    pub fn entry_class(&self) -> String {
        self.class_name("Entry")
    }

    /// The class holding every file's guarded import.
    pub fn files_class(&self) -> String {
        self.class_name("Files")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let options = CompileOptions::default();
        assert_eq!(options.max_instantiation_depth, 64);
        assert_eq!(options.package, "kestrel");
        assert!(options.emit_line_numbers);
    }

    #[test]
    fn session_namespaces_class_names() {
        let session = CompileSession::new(
            CompileOptions::new().with_session(SessionId(7)),
            "main",
        );
        assert_eq!(session.entry_class(), "kestrel/s7/Entry");
        assert_eq!(session.class_name("Point"), "kestrel/s7/Point");
        assert_eq!(session.main_file, "main");
    }

    #[test]
    fn main_file_override() {
        let session = CompileSession::new(CompileOptions::new().with_main_file("app"), "main");
        assert_eq!(session.main_file, "app");
    }
}
