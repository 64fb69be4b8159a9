//! Compiled output and the boundary back into source terms.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::Path;

use kestrel_core::{HostFault, HostFaultKind, HostFrame, RuntimeError, SourceFrame};
use rustc_hash::FxHashMap;
use tracing::debug;
use xxhash_rust::xxh64::Xxh64;

/// Source names of generated classes and methods.
#[derive(Debug, Clone, Default)]
pub struct NameTable {
    classes: FxHashMap<String, String>,
    /// Keyed by (runtime class, runtime method).
    methods: FxHashMap<(String, String), String>,
}

impl NameTable {
    pub fn add_class(&mut self, runtime: &str, source: &str) {
        self.classes.insert(runtime.to_string(), source.to_string());
    }

    pub fn add_method(&mut self, class: &str, runtime: &str, source: &str) {
        self.methods
            .insert((class.to_string(), runtime.to_string()), source.to_string());
    }

    /// Source name of a runtime class; host classes keep their dotted name.
    pub fn class(&self, runtime: &str) -> String {
        match self.classes.get(runtime) {
            Some(source) => source.clone(),
            None => runtime.replace('/', "."),
        }
    }

    /// The frame in source terms, or `None` for frames outside compiled code.
    pub fn frame(&self, frame: &HostFrame) -> Option<SourceFrame> {
        let method = self
            .methods
            .get(&(frame.class.clone(), frame.method.clone()))?;
        Some(SourceFrame {
            type_name: self.class(&frame.class),
            method: method.clone(),
            line: frame.line,
        })
    }

    /// Rewrite a host fault in source terms, keeping only compiled frames.
    pub fn translate_fault(&self, fault: &HostFault) -> RuntimeError {
        let trace: Vec<SourceFrame> = fault.frames.iter().filter_map(|f| self.frame(f)).collect();
        match &fault.kind {
            HostFaultKind::ClassCast { from, to } => RuntimeError::InvalidCast {
                from: self.class(from),
                to: self.class(to),
                trace,
            },
            HostFaultKind::StackOverflow => RuntimeError::StackExhausted { trace },
            HostFaultKind::Other { class, message } => RuntimeError::Host {
                class: self.class(class),
                message: message.clone(),
                trace,
            },
        }
    }
}

/// Class-file bytes by internal class name.
#[derive(Debug, Clone)]
pub struct ArtifactSet {
    classes: BTreeMap<String, Vec<u8>>,
    entry: String,
    names: NameTable,
}

impl ArtifactSet {
    pub fn new(classes: BTreeMap<String, Vec<u8>>, entry: String, names: NameTable) -> Self {
        Self {
            classes,
            entry,
            names,
        }
    }

    /// The class implementing the runtime entry interface.
    pub fn entry_class(&self) -> &str {
        &self.entry
    }

    pub fn get(&self, class: &str) -> Option<&[u8]> {
        self.classes.get(class).map(Vec::as_slice)
    }

    /// Classes in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[u8])> {
        self.classes
            .iter()
            .map(|(name, bytes)| (name.as_str(), bytes.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    pub fn names(&self) -> &NameTable {
        &self.names
    }

    /// Hash of every name and byte, in name order.
    pub fn digest(&self) -> u64 {
        let mut hasher = Xxh64::new(0);
        for (name, bytes) in &self.classes {
            hasher.update(name.as_bytes());
            hasher.update(&[0]);
            hasher.update(&(bytes.len() as u64).to_le_bytes());
            hasher.update(bytes);
        }
        hasher.digest()
    }

    pub fn translate_fault(&self, fault: &HostFault) -> RuntimeError {
        self.names.translate_fault(fault)
    }

    /// Write every class as `<name>.class` below `dir`, one directory per
    /// package segment.
    pub fn write_to_dir(&self, dir: &Path) -> io::Result<()> {
        for (name, bytes) in &self.classes {
            let path = dir.join(format!("{name}.class"));
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&path, bytes)?;
        }
        debug!(dir = %dir.display(), classes = self.classes.len(), "wrote artifacts");
        Ok(())
    }
}
