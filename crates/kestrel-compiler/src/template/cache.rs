//! Instance cache.
//!
//! Maps instantiation keys to the instance created for them, so that every
//! `(definition, args)` key is instantiated exactly once per compile.

use kestrel_core::{DefId, InstanceId, MethodInstanceId};
use rustc_hash::FxHashMap;

use crate::types::Type;

/// Cache for type and generic-method instances.
#[derive(Debug, Default, Clone)]
pub struct InstanceCache {
    /// (definition, args) → type instance
    type_instances: FxHashMap<(DefId, Vec<Type>), InstanceId>,
    /// (unbound generic method, args) → method instance
    method_instances: FxHashMap<(MethodInstanceId, Vec<Type>), MethodInstanceId>,
}

impl InstanceCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cache_type_instance(&mut self, def: DefId, args: Vec<Type>, instance: InstanceId) {
        self.type_instances.insert((def, args), instance);
    }

    pub fn get_type_instance(&self, def: DefId, args: &[Type]) -> Option<InstanceId> {
        self.type_instances.get(&(def, args.to_vec())).copied()
    }

    pub fn cache_method_instance(
        &mut self,
        method: MethodInstanceId,
        args: Vec<Type>,
        instance: MethodInstanceId,
    ) {
        self.method_instances.insert((method, args), instance);
    }

    pub fn get_method_instance(
        &self,
        method: MethodInstanceId,
        args: &[Type],
    ) -> Option<MethodInstanceId> {
        self.method_instances.get(&(method, args.to_vec())).copied()
    }

    pub fn type_instance_count(&self) -> usize {
        self.type_instances.len()
    }

    pub fn method_instance_count(&self) -> usize {
        self.method_instances.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_new_is_empty() {
        let cache = InstanceCache::new();
        assert_eq!(cache.type_instance_count(), 0);
        assert_eq!(cache.method_instance_count(), 0);
    }

    #[test]
    fn cache_distinguishes_args() {
        let mut cache = InstanceCache::new();
        let list = DefId::new(20);
        let int = Type::Basic(InstanceId::new(4));
        let string = Type::Basic(InstanceId::new(11));

        cache.cache_type_instance(list, vec![int], InstanceId::new(30));
        cache.cache_type_instance(list, vec![string], InstanceId::new(31));

        assert_eq!(cache.get_type_instance(list, &[int]), Some(InstanceId::new(30)));
        assert_eq!(cache.get_type_instance(list, &[string]), Some(InstanceId::new(31)));
        assert_eq!(cache.get_type_instance(list, &[]), None);
        assert_eq!(cache.type_instance_count(), 2);
    }

    #[test]
    fn method_instances_keyed_by_args() {
        let mut cache = InstanceCache::new();
        let generic = MethodInstanceId::new(3);
        cache.cache_method_instance(generic, vec![Type::Generic(0)], MethodInstanceId::new(9));
        assert_eq!(
            cache.get_method_instance(generic, &[Type::Generic(0)]),
            Some(MethodInstanceId::new(9))
        );
        assert_eq!(cache.get_method_instance(generic, &[]), None);
    }
}
