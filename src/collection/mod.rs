//! Service collection module for dependency injection.
//!
//! This module contains the ServiceCollection type, the fluent registration
//! surface used at composition time to build a [`ServiceProvider`].

use std::sync::Arc;

use tracing::trace;

use crate::config::ContainerOptions;
use crate::descriptors::ServiceDescriptor;
use crate::error::DiResult;
use crate::key::ServiceKey;
use crate::lifetime::Lifetime;
use crate::provider::{ResolverContext, ServiceProvider};
use crate::registration::Registry;
use crate::traits::{Injectable, IntoService};

/// Ordered, append-only set of service registrations.
///
/// Every method appends a descriptor and returns the collection for
/// chaining. Nothing is ever replaced or removed: with several registrations
/// for one service type, single resolution uses the last one and
/// `resolve_all` returns all of them in registration order.
///
/// [`build`](ServiceCollection::build) consumes the collection, so the
/// registry is frozen once a provider exists.
///
/// # Examples
///
/// ```rust
/// use ferrous_host::{ServiceCollection, Resolver, DiResult};
/// use std::sync::Arc;
///
/// trait Greeter: Send + Sync { fn greet(&self) -> &'static str; }
/// struct Hello;
/// impl Greeter for Hello { fn greet(&self) -> &'static str { "hello" } }
/// struct Hola;
/// impl Greeter for Hola { fn greet(&self) -> &'static str { "hola" } }
///
/// # fn main() -> DiResult<()> {
/// let mut services = ServiceCollection::new();
/// services
///     .add_singleton_instance::<dyn Greeter>(Arc::new(Hello))
///     .add_transient_factory::<dyn Greeter, _>(|_| Ok(Arc::new(Hola) as Arc<dyn Greeter>));
///
/// let provider = services.build();
/// assert_eq!(provider.resolve_required::<dyn Greeter>()?.greet(), "hola");
/// assert_eq!(provider.resolve_all::<dyn Greeter>()?.len(), 2);
/// # Ok(())
/// # }
/// ```
#[derive(Default)]
pub struct ServiceCollection {
    registry: Registry,
}

impl ServiceCollection {
    /// Creates a new empty service collection.
    pub fn new() -> Self {
        Self {
            registry: Registry::new(),
        }
    }

    /// Appends a pre-built descriptor.
    pub fn add(&mut self, descriptor: ServiceDescriptor) -> &mut Self {
        let index = self.registry.add(descriptor);
        trace!(index, "service registered");
        self
    }

    // ----- Singleton -----

    /// Registers `I` as the singleton implementation of `S`, built on first
    /// request through [`Injectable`].
    pub fn add_singleton<S, I>(&mut self) -> &mut Self
    where
        S: ?Sized + Send + Sync + 'static,
        I: Injectable + IntoService<S>,
    {
        self.add(ServiceDescriptor::constructed::<S, I>(Lifetime::Singleton))
    }

    /// Registers a pre-built instance as a singleton of `S`.
    ///
    /// ```rust
    /// use ferrous_host::{ServiceCollection, Resolver, DiResult};
    /// use std::sync::Arc;
    ///
    /// trait Clock: Send + Sync { fn now(&self) -> u64; }
    /// struct Fixed;
    /// impl Clock for Fixed { fn now(&self) -> u64 { 42 } }
    ///
    /// # fn main() -> DiResult<()> {
    /// let mut services = ServiceCollection::new();
    /// services.add_singleton_instance::<dyn Clock>(Arc::new(Fixed));
    /// let provider = services.build();
    /// assert_eq!(provider.resolve_required::<dyn Clock>()?.now(), 42);
    /// # Ok(())
    /// # }
    /// ```
    pub fn add_singleton_instance<S>(&mut self, instance: Arc<S>) -> &mut Self
    where
        S: ?Sized + Send + Sync + 'static,
    {
        self.add(ServiceDescriptor::instance(instance))
    }

    /// Registers a value as a singleton of its own type.
    pub fn add_instance<T: Send + Sync + 'static>(&mut self, value: T) -> &mut Self {
        self.add_singleton_instance::<T>(Arc::new(value))
    }

    /// Registers a singleton factory, invoked once on first request.
    pub fn add_singleton_factory<S, F>(&mut self, factory: F) -> &mut Self
    where
        S: ?Sized + Send + Sync + 'static,
        F: Fn(&ResolverContext<'_>) -> DiResult<Arc<S>> + Send + Sync + 'static,
    {
        self.add(ServiceDescriptor::factory::<S, F>(Lifetime::Singleton, factory))
    }

    // ----- Scoped -----

    /// Registers `I` as the scoped implementation of `S`.
    pub fn add_scoped<S, I>(&mut self) -> &mut Self
    where
        S: ?Sized + Send + Sync + 'static,
        I: Injectable + IntoService<S>,
    {
        self.add(ServiceDescriptor::constructed::<S, I>(Lifetime::Scoped))
    }

    /// Registers a scoped factory, invoked once per scope.
    pub fn add_scoped_factory<S, F>(&mut self, factory: F) -> &mut Self
    where
        S: ?Sized + Send + Sync + 'static,
        F: Fn(&ResolverContext<'_>) -> DiResult<Arc<S>> + Send + Sync + 'static,
    {
        self.add(ServiceDescriptor::factory::<S, F>(Lifetime::Scoped, factory))
    }

    // ----- Transient -----

    /// Registers `I` as the transient implementation of `S`.
    pub fn add_transient<S, I>(&mut self) -> &mut Self
    where
        S: ?Sized + Send + Sync + 'static,
        I: Injectable + IntoService<S>,
    {
        self.add(ServiceDescriptor::constructed::<S, I>(Lifetime::Transient))
    }

    /// Registers a transient factory, invoked on every resolution.
    pub fn add_transient_factory<S, F>(&mut self, factory: F) -> &mut Self
    where
        S: ?Sized + Send + Sync + 'static,
        F: Fn(&ResolverContext<'_>) -> DiResult<Arc<S>> + Send + Sync + 'static,
    {
        self.add(ServiceDescriptor::factory::<S, F>(Lifetime::Transient, factory))
    }

    // ----- Introspection -----

    /// All descriptors registered for `S`, in registration order.
    pub fn descriptors_for<S: ?Sized + 'static>(&self) -> Vec<&ServiceDescriptor> {
        self.registry
            .descriptors_for(ServiceKey::of::<S>().type_id())
            .map(|(_, descriptor)| descriptor)
            .collect()
    }

    /// Whether `S` has at least one registration.
    pub fn contains<S: ?Sized + 'static>(&self) -> bool {
        self.registry.contains(ServiceKey::of::<S>().type_id())
    }

    /// Snapshot of every descriptor in global registration order.
    pub fn get_service_descriptors(&self) -> Vec<ServiceDescriptor> {
        self.registry.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.registry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registry.len() == 0
    }

    /// Freezes the registrations into a root provider with default options.
    pub fn build(self) -> ServiceProvider {
        self.build_with(ContainerOptions::default())
    }

    /// Freezes the registrations into a root provider.
    pub fn build_with(self, options: ContainerOptions) -> ServiceProvider {
        ServiceProvider::new(self.registry, options)
    }
}

impl std::fmt::Debug for ServiceCollection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.registry.iter()).finish()
    }
}
