//! Module system: discovery, dependency ordering and lifecycle.
//!
//! A module is a unit of composition that registers services and wires
//! pipeline components. Modules name the modules they depend on through
//! [`Module::depends_on`]; the loader orders them so every dependency is
//! configured and initialized before its dependents, and shut down after
//! them.
//!
//! Lifecycle, each phase run across all modules before the next starts:
//!
//! 1. `pre_configure`, `configure`, `post_configure` against the
//!    [`ServiceCollection`]
//! 2. the container is built
//! 3. `pre_initialize`, `initialize`, `post_initialize` against the built
//!    provider and the pipeline builder
//! 4. `shutdown`, in reverse order
//!
//! # Examples
//!
//! ```
//! use ferrous_host::modularity::{Application, Module, ModuleId, ModuleList, ServiceConfigurationContext};
//! use ferrous_host::{BoxError, Resolver};
//!
//! #[derive(Default)]
//! struct CoreModule;
//! impl Module for CoreModule {
//!     fn configure(&self, ctx: &mut ServiceConfigurationContext<'_>) -> Result<(), BoxError> {
//!         ctx.services().add_instance(String::from("core"));
//!         Ok(())
//!     }
//! }
//!
//! #[derive(Default)]
//! struct WebModule;
//! impl Module for WebModule {
//!     fn depends_on() -> Vec<ModuleId> {
//!         vec![ModuleId::of::<CoreModule>()]
//!     }
//! }
//!
//! # fn main() -> Result<(), BoxError> {
//! let package = ModuleList::new("app").with::<WebModule>().with::<CoreModule>();
//! let mut app = Application::create(&[&package])?;
//! app.initialize()?;
//!
//! assert_eq!(app.modules().len(), 2);
//! assert!(app.modules()[0].ends_with("CoreModule"));
//! assert_eq!(*app.provider().resolve_required::<String>()?, "core");
//!
//! assert!(app.shutdown().is_empty());
//! # Ok(())
//! # }
//! ```

use std::any::TypeId;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, trace};

use crate::collection::ServiceCollection;
use crate::error::BoxError;
use crate::pipeline::PipelineBuilder;
use crate::provider::ServiceProvider;

mod application;
mod graph;
mod loader;

pub use application::{Application, LoadedModules};
pub use graph::{DroppedDependency, ModuleGraph, SortedModules};
pub use loader::{ModuleFailure, ModuleLoader};

/// Identity of a module type.
#[derive(Clone, Copy)]
pub struct ModuleId {
    type_id: TypeId,
    name: &'static str,
}

impl ModuleId {
    pub fn of<M: Module>() -> Self {
        Self {
            type_id: TypeId::of::<M>(),
            name: std::any::type_name::<M>(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for ModuleId {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

impl Eq for ModuleId {}

impl std::hash::Hash for ModuleId {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.type_id.hash(state);
    }
}

impl fmt::Debug for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Context for the three configuration phases.
pub struct ServiceConfigurationContext<'a> {
    services: &'a mut ServiceCollection,
}

impl<'a> ServiceConfigurationContext<'a> {
    pub(crate) fn new(services: &'a mut ServiceCollection) -> Self {
        Self { services }
    }

    /// The collection every module registers into.
    pub fn services(&mut self) -> &mut ServiceCollection {
        self.services
    }
}

/// Context for the three initialization phases.
pub struct ApplicationInitializationContext<'a> {
    provider: &'a ServiceProvider,
    pipeline: &'a mut PipelineBuilder,
}

impl<'a> ApplicationInitializationContext<'a> {
    pub(crate) fn new(provider: &'a ServiceProvider, pipeline: &'a mut PipelineBuilder) -> Self {
        Self { provider, pipeline }
    }

    /// The built root container.
    pub fn provider(&self) -> &ServiceProvider {
        self.provider
    }

    /// The application pipeline, in the order modules add to it.
    pub fn pipeline(&mut self) -> &mut PipelineBuilder {
        self.pipeline
    }
}

/// Context for the shutdown phase.
pub struct ApplicationShutdownContext<'a> {
    provider: &'a ServiceProvider,
}

impl<'a> ApplicationShutdownContext<'a> {
    pub(crate) fn new(provider: &'a ServiceProvider) -> Self {
        Self { provider }
    }

    /// The root container, not yet disposed.
    pub fn provider(&self) -> &ServiceProvider {
        self.provider
    }
}

/// A unit of composition with a fixed lifecycle. Every hook defaults to a
/// no-op.
///
/// Each hook has an `_async` twin used by the asynchronous lifecycle
/// ([`Application::create_async`] and friends). The twins default to calling
/// the synchronous hook, so a module overrides whichever form suits it.
///
/// After configuration the module instance is registered in the container
/// as a singleton of its own type, and also under `dyn Module` in activation
/// order.
#[async_trait]
pub trait Module: Send + Sync + 'static {
    /// Modules that must be configured and initialized before this one.
    /// Dependencies missing from the discovered set are ignored with a
    /// warning.
    fn depends_on() -> Vec<ModuleId>
    where
        Self: Sized,
    {
        Vec::new()
    }

    fn pre_configure(&self, _ctx: &mut ServiceConfigurationContext<'_>) -> Result<(), BoxError> {
        Ok(())
    }

    fn configure(&self, _ctx: &mut ServiceConfigurationContext<'_>) -> Result<(), BoxError> {
        Ok(())
    }

    fn post_configure(&self, _ctx: &mut ServiceConfigurationContext<'_>) -> Result<(), BoxError> {
        Ok(())
    }

    fn pre_initialize(
        &self,
        _ctx: &mut ApplicationInitializationContext<'_>,
    ) -> Result<(), BoxError> {
        Ok(())
    }

    fn initialize(&self, _ctx: &mut ApplicationInitializationContext<'_>) -> Result<(), BoxError> {
        Ok(())
    }

    fn post_initialize(
        &self,
        _ctx: &mut ApplicationInitializationContext<'_>,
    ) -> Result<(), BoxError> {
        Ok(())
    }

    fn shutdown(&self, _ctx: &ApplicationShutdownContext<'_>) -> Result<(), BoxError> {
        Ok(())
    }

    async fn pre_configure_async(
        &self,
        ctx: &mut ServiceConfigurationContext<'_>,
    ) -> Result<(), BoxError> {
        self.pre_configure(ctx)
    }

    async fn configure_async(&self, ctx: &mut ServiceConfigurationContext<'_>) -> Result<(), BoxError> {
        self.configure(ctx)
    }

    async fn post_configure_async(
        &self,
        ctx: &mut ServiceConfigurationContext<'_>,
    ) -> Result<(), BoxError> {
        self.post_configure(ctx)
    }

    async fn pre_initialize_async(
        &self,
        ctx: &mut ApplicationInitializationContext<'_>,
    ) -> Result<(), BoxError> {
        self.pre_initialize(ctx)
    }

    async fn initialize_async(
        &self,
        ctx: &mut ApplicationInitializationContext<'_>,
    ) -> Result<(), BoxError> {
        self.initialize(ctx)
    }

    async fn post_initialize_async(
        &self,
        ctx: &mut ApplicationInitializationContext<'_>,
    ) -> Result<(), BoxError> {
        self.post_initialize(ctx)
    }

    async fn shutdown_async(&self, ctx: &ApplicationShutdownContext<'_>) -> Result<(), BoxError> {
        self.shutdown(ctx)
    }
}

/// A freshly built module and the callback exposing it as a service of its
/// concrete type.
pub(crate) struct ModuleInstance {
    pub(crate) module: Arc<dyn Module>,
    pub(crate) expose: Box<dyn Fn(&mut ServiceCollection) + Send + Sync>,
}

/// Everything needed to order and instantiate one module type, without
/// instantiating it.
#[derive(Clone, Copy)]
pub struct ModuleDescriptor {
    id: ModuleId,
    dependencies: fn() -> Vec<ModuleId>,
    factory: fn() -> ModuleInstance,
}

fn instantiate<M: Module + Default>() -> ModuleInstance {
    let module = Arc::new(M::default());
    ModuleInstance {
        module: module.clone(),
        expose: Box::new(move |services| {
            services.add_singleton_instance::<M>(module.clone());
        }),
    }
}

impl ModuleDescriptor {
    pub fn of<M: Module + Default>() -> Self {
        Self {
            id: ModuleId::of::<M>(),
            dependencies: M::depends_on,
            factory: instantiate::<M>,
        }
    }

    pub fn id(&self) -> ModuleId {
        self.id
    }

    pub fn name(&self) -> &'static str {
        self.id.name
    }

    /// Declared dependencies, in declaration order.
    pub fn dependencies(&self) -> Vec<ModuleId> {
        (self.dependencies)()
    }

    pub(crate) fn instantiate(&self) -> ModuleInstance {
        (self.factory)()
    }
}

impl fmt::Debug for ModuleDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleDescriptor")
            .field("id", &self.id)
            .field("dependencies", &self.dependencies())
            .finish()
    }
}

/// A named set of module types to scan, the unit of discovery.
pub trait ModulePackage {
    fn name(&self) -> &'static str;

    /// Module types defined by this package, in declaration order.
    fn modules(&self) -> Vec<ModuleDescriptor>;
}

/// Package built from an explicit list of module types.
#[derive(Debug, Clone)]
pub struct ModuleList {
    name: &'static str,
    modules: Vec<ModuleDescriptor>,
}

impl ModuleList {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            modules: Vec::new(),
        }
    }

    pub fn with<M: Module + Default>(mut self) -> Self {
        self.modules.push(ModuleDescriptor::of::<M>());
        self
    }
}

impl ModulePackage for ModuleList {
    fn name(&self) -> &'static str {
        self.name
    }

    fn modules(&self) -> Vec<ModuleDescriptor> {
        self.modules.clone()
    }
}

/// Module types discovered across packages, in discovery order and without
/// duplicates.
#[derive(Debug, Default, Clone)]
pub struct ModuleCatalog {
    modules: Vec<ModuleDescriptor>,
}

impl ModuleCatalog {
    /// Scans packages in order. A module type found twice keeps its first
    /// position.
    pub fn scan(packages: &[&dyn ModulePackage]) -> Self {
        let mut catalog = Self::default();
        for package in packages {
            let found = package.modules();
            debug!(package = package.name(), modules = found.len(), "scanning module package");
            for descriptor in found {
                catalog.add(descriptor);
            }
        }
        catalog
    }

    /// Adds one module type unless it is already known. Returns whether it
    /// was added.
    pub fn add(&mut self, descriptor: ModuleDescriptor) -> bool {
        if self.contains(descriptor.id()) {
            trace!(module = descriptor.name(), "module already discovered");
            return false;
        }
        self.modules.push(descriptor);
        true
    }

    pub fn contains(&self, id: ModuleId) -> bool {
        self.modules.iter().any(|m| m.id() == id)
    }

    pub fn modules(&self) -> &[ModuleDescriptor] {
        &self.modules
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}
