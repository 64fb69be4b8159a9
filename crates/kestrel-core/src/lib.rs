//! Kestrel core types
//!
//! Shared vocabulary for every stage of the compiler: source spans,
//! deterministic type hashes, table ids, primitive kinds, resolved type
//! references, the consumed parse tree and the error taxonomy.
//!
//! ## Modules
//!
//! - [`ast`]: parse tree handed over by the front end
//! - [`error`]: compile, runtime and front-end errors
//! - [`fault`]: host faults prior to translation
//! - [`type_hash`]: structured identifiers behind generated names

pub mod ast;
pub mod error;
pub mod fault;
mod ids;
mod primitive;
mod resolved;
mod span;
pub mod type_hash;

pub use error::{
    CompilationError, FrontEndError, KestrelError, RuntimeError, SourceFrame, internal_fault,
};
pub use fault::{HostFault, HostFaultKind, HostFrame};
pub use ids::{DefId, FileId, InstanceId, MethodInstanceId, SessionId};
pub use primitive::{PrimitiveKind, StackKind};
pub use resolved::ResolvedType;
pub use span::Span;
pub use type_hash::TypeHash;
