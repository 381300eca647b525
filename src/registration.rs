//! Ordered, append-only service registry.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

use crate::descriptors::ServiceDescriptor;
use crate::error::DiResult;
use crate::key::ServiceKey;
use crate::provider::ResolverContext;

// Type-erased Arc for storage
pub(crate) type AnyArc = Arc<dyn Any + Send + Sync>;

pub(crate) type Ctor = Arc<dyn for<'a> Fn(&ResolverContext<'a>) -> DiResult<AnyArc> + Send + Sync>;

/// Service registry holding all descriptors.
///
/// Descriptors keep global registration order; `by_type` indexes them per
/// service type, also in registration order. A descriptor's position in its
/// type's list is its implementation index.
#[derive(Default, Clone)]
pub(crate) struct Registry {
    descriptors: Vec<ServiceDescriptor>,
    by_type: HashMap<TypeId, Vec<usize>>,
}

impl Registry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Appends a descriptor, returning its implementation index.
    pub(crate) fn add(&mut self, descriptor: ServiceDescriptor) -> usize {
        let slots = self.by_type.entry(descriptor.service_type_id()).or_default();
        slots.push(self.descriptors.len());
        self.descriptors.push(descriptor);
        slots.len() - 1
    }

    /// All descriptors for a type in registration order, with their cache keys.
    pub(crate) fn descriptors_for(
        &self,
        type_id: TypeId,
    ) -> impl Iterator<Item = (ServiceKey, &ServiceDescriptor)> + '_ {
        self.by_type
            .get(&type_id)
            .map(|slots| slots.as_slice())
            .unwrap_or(&[])
            .iter()
            .enumerate()
            .map(move |(index, &slot)| {
                let descriptor = &self.descriptors[slot];
                (descriptor.service_key().at(index), descriptor)
            })
    }

    /// The last-registered descriptor for a type, which wins single resolution.
    #[inline]
    pub(crate) fn last_for(&self, type_id: TypeId) -> Option<(ServiceKey, &ServiceDescriptor)> {
        let slots = self.by_type.get(&type_id)?;
        let slot = *slots.last()?;
        let descriptor = &self.descriptors[slot];
        Some((descriptor.service_key().at(slots.len() - 1), descriptor))
    }

    #[inline]
    pub(crate) fn contains(&self, type_id: TypeId) -> bool {
        self.by_type.contains_key(&type_id)
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &ServiceDescriptor> {
        self.descriptors.iter()
    }

    pub(crate) fn len(&self) -> usize {
        self.descriptors.len()
    }
}
