//! Monomorphization.
//!
//! Turns resolved, possibly generic type references into concrete cached
//! instances, and binds generic methods per distinct argument list.
//!
//! ## Components
//!
//! - [`TypePool`]: owns every instance and method of a compile
//! - [`InstanceCache`]: `(definition, args)` and `(method, args)` keys
//! - [`GenericEnv`]: generic bindings used while resolving a reference

mod cache;
mod instantiation;
mod pool;

pub use cache::InstanceCache;
pub(crate) use instantiation::sanitize;
pub use pool::{GenericEnv, TypePool};
