//! Host-side faults as the embedding runtime reports them.
//!
//! A [`HostFault`] is named entirely in runtime terms: internal class names
//! such as `kestrel/s3/List$00ab...` and mangled method names. Translation into
//! a [`RuntimeError`](crate::RuntimeError) happens against the name table of
//! the artifact set that produced the code.

/// What went wrong on the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostFaultKind {
    /// A checked cast failed. Both names are runtime class names.
    ClassCast { from: String, to: String },
    /// The host call stack overflowed.
    StackOverflow,
    /// Any other throwable, identified by its class.
    Other { class: String, message: String },
}

/// One host stack frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostFrame {
    /// Internal class name, `/`-separated.
    pub class: String,
    pub method: String,
    pub line: Option<u32>,
}

impl HostFrame {
    pub fn new(class: impl Into<String>, method: impl Into<String>, line: Option<u32>) -> Self {
        Self {
            class: class.into(),
            method: method.into(),
            line,
        }
    }
}

/// A fault raised while running generated code, innermost frame first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostFault {
    pub kind: HostFaultKind,
    pub frames: Vec<HostFrame>,
}

impl HostFault {
    pub fn new(kind: HostFaultKind) -> Self {
        Self {
            kind,
            frames: Vec::new(),
        }
    }

    pub fn with_frame(mut self, frame: HostFrame) -> Self {
        self.frames.push(frame);
        self
    }
}
