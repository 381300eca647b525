//! Module instantiation and lifecycle execution.

use std::sync::Arc;

use tracing::{debug, error, info, instrument};

use super::{
    ApplicationInitializationContext, ApplicationShutdownContext, DroppedDependency, Module,
    ModuleDescriptor, ModuleGraph, ModuleInstance, ServiceConfigurationContext,
};
use crate::collection::ServiceCollection;
use crate::error::{BoxError, DiError, DiResult};
use crate::pipeline::PipelineBuilder;
use crate::provider::ServiceProvider;

/// A module whose `shutdown` hook failed.
#[derive(Debug)]
pub struct ModuleFailure {
    pub module: &'static str,
    pub error: BoxError,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    PreConfigure,
    Configure,
    PostConfigure,
    PreInitialize,
    Initialize,
    PostInitialize,
}

impl Phase {
    const CONFIGURE: [Phase; 3] = [Phase::PreConfigure, Phase::Configure, Phase::PostConfigure];
    const INITIALIZE: [Phase; 3] = [Phase::PreInitialize, Phase::Initialize, Phase::PostInitialize];

    fn name(self) -> &'static str {
        match self {
            Phase::PreConfigure => "pre_configure",
            Phase::Configure => "configure",
            Phase::PostConfigure => "post_configure",
            Phase::PreInitialize => "pre_initialize",
            Phase::Initialize => "initialize",
            Phase::PostInitialize => "post_initialize",
        }
    }

    fn run_configure(self, module: &dyn Module, ctx: &mut ServiceConfigurationContext<'_>) -> Result<(), BoxError> {
        match self {
            Phase::PreConfigure => module.pre_configure(ctx),
            Phase::Configure => module.configure(ctx),
            _ => module.post_configure(ctx),
        }
    }

    async fn run_configure_async(
        self,
        module: &dyn Module,
        ctx: &mut ServiceConfigurationContext<'_>,
    ) -> Result<(), BoxError> {
        match self {
            Phase::PreConfigure => module.pre_configure_async(ctx).await,
            Phase::Configure => module.configure_async(ctx).await,
            _ => module.post_configure_async(ctx).await,
        }
    }

    fn run_initialize(
        self,
        module: &dyn Module,
        ctx: &mut ApplicationInitializationContext<'_>,
    ) -> Result<(), BoxError> {
        match self {
            Phase::PreInitialize => module.pre_initialize(ctx),
            Phase::Initialize => module.initialize(ctx),
            _ => module.post_initialize(ctx),
        }
    }

    async fn run_initialize_async(
        self,
        module: &dyn Module,
        ctx: &mut ApplicationInitializationContext<'_>,
    ) -> Result<(), BoxError> {
        match self {
            Phase::PreInitialize => module.pre_initialize_async(ctx).await,
            Phase::Initialize => module.initialize_async(ctx).await,
            _ => module.post_initialize_async(ctx).await,
        }
    }
}

struct LoadedModule {
    name: &'static str,
    instance: ModuleInstance,
}

impl LoadedModule {
    fn module(&self) -> &dyn Module {
        self.instance.module.as_ref()
    }

    fn failed(&self, phase: Phase, source: BoxError) -> DiError {
        DiError::Module {
            module: self.name,
            phase: phase.name(),
            source,
        }
    }
}

/// Instantiated modules in dependency order, driving their lifecycle.
pub struct ModuleLoader {
    modules: Vec<LoadedModule>,
    dropped: Vec<DroppedDependency>,
}

impl ModuleLoader {
    /// Orders `discovered`, instantiates every module once, and runs the
    /// three configuration phases against `services`. Each module is then
    /// registered as a singleton of its own type and under `dyn Module`.
    ///
    /// The first failing hook aborts loading with
    /// [`DiError::Module`]; a dependency cycle aborts it with
    /// [`DiError::CyclicDependency`] before any module is instantiated.
    #[instrument(skip_all, fields(discovered = discovered.len()))]
    pub fn load(discovered: &[ModuleDescriptor], services: &mut ServiceCollection) -> DiResult<Self> {
        let loader = Self::instantiate(discovered)?;
        let mut ctx = ServiceConfigurationContext::new(services);
        for phase in Phase::CONFIGURE {
            for module in &loader.modules {
                debug!(module = module.name, phase = phase.name(), "running module hook");
                phase
                    .run_configure(module.module(), &mut ctx)
                    .map_err(|source| module.failed(phase, source))?;
            }
        }
        loader.expose(services);
        Ok(loader)
    }

    /// [`load`](ModuleLoader::load) through the asynchronous hooks.
    #[instrument(skip_all, fields(discovered = discovered.len()))]
    pub async fn load_async(
        discovered: &[ModuleDescriptor],
        services: &mut ServiceCollection,
    ) -> DiResult<Self> {
        let loader = Self::instantiate(discovered)?;
        let mut ctx = ServiceConfigurationContext::new(services);
        for phase in Phase::CONFIGURE {
            for module in &loader.modules {
                debug!(module = module.name, phase = phase.name(), "running module hook");
                phase
                    .run_configure_async(module.module(), &mut ctx)
                    .await
                    .map_err(|source| module.failed(phase, source))?;
            }
        }
        loader.expose(services);
        Ok(loader)
    }

    /// Runs the three initialization phases against the built container.
    #[instrument(skip_all, fields(modules = self.modules.len()))]
    pub fn initialize(&self, provider: &ServiceProvider, pipeline: &mut PipelineBuilder) -> DiResult<()> {
        let mut ctx = ApplicationInitializationContext::new(provider, pipeline);
        for phase in Phase::INITIALIZE {
            for module in &self.modules {
                debug!(module = module.name, phase = phase.name(), "running module hook");
                phase
                    .run_initialize(module.module(), &mut ctx)
                    .map_err(|source| module.failed(phase, source))?;
            }
        }
        info!("modules initialized");
        Ok(())
    }

    /// [`initialize`](ModuleLoader::initialize) through the asynchronous
    /// hooks.
    #[instrument(skip_all, fields(modules = self.modules.len()))]
    pub async fn initialize_async(
        &self,
        provider: &ServiceProvider,
        pipeline: &mut PipelineBuilder,
    ) -> DiResult<()> {
        let mut ctx = ApplicationInitializationContext::new(provider, pipeline);
        for phase in Phase::INITIALIZE {
            for module in &self.modules {
                debug!(module = module.name, phase = phase.name(), "running module hook");
                phase
                    .run_initialize_async(module.module(), &mut ctx)
                    .await
                    .map_err(|source| module.failed(phase, source))?;
            }
        }
        info!("modules initialized");
        Ok(())
    }

    /// Shuts modules down in reverse dependency order.
    ///
    /// A failing module is logged and recorded; the remaining modules still
    /// shut down.
    #[instrument(skip_all, fields(modules = self.modules.len()))]
    pub fn shutdown(&self, provider: &ServiceProvider) -> Vec<ModuleFailure> {
        let ctx = ApplicationShutdownContext::new(provider);
        let mut failures = Vec::new();
        for module in self.modules.iter().rev() {
            debug!(module = module.name, "shutting down module");
            if let Err(err) = module.module().shutdown(&ctx) {
                failures.push(Self::shutdown_failed(module, err));
            }
        }
        info!(failed = failures.len(), "modules shut down");
        failures
    }

    /// [`shutdown`](ModuleLoader::shutdown) through the asynchronous hooks.
    #[instrument(skip_all, fields(modules = self.modules.len()))]
    pub async fn shutdown_async(&self, provider: &ServiceProvider) -> Vec<ModuleFailure> {
        let ctx = ApplicationShutdownContext::new(provider);
        let mut failures = Vec::new();
        for module in self.modules.iter().rev() {
            debug!(module = module.name, "shutting down module");
            if let Err(err) = module.module().shutdown_async(&ctx).await {
                failures.push(Self::shutdown_failed(module, err));
            }
        }
        info!(failed = failures.len(), "modules shut down");
        failures
    }

    /// Loaded module names, in activation order.
    pub fn modules(&self) -> Vec<&'static str> {
        self.modules.iter().map(|m| m.name).collect()
    }

    /// Loaded module instances, in activation order.
    pub fn instances(&self) -> Vec<Arc<dyn Module>> {
        self.modules.iter().map(|m| m.instance.module.clone()).collect()
    }

    /// Dependencies that were ignored while ordering.
    pub fn dropped(&self) -> &[DroppedDependency] {
        &self.dropped
    }

    fn instantiate(discovered: &[ModuleDescriptor]) -> DiResult<Self> {
        let sorted = ModuleGraph::sort(discovered)?;
        let modules = sorted
            .order
            .iter()
            .map(|descriptor| {
                debug!(module = descriptor.name(), "instantiating module");
                LoadedModule {
                    name: descriptor.name(),
                    instance: descriptor.instantiate(),
                }
            })
            .collect();
        Ok(Self {
            modules,
            dropped: sorted.dropped,
        })
    }

    fn expose(&self, services: &mut ServiceCollection) {
        for module in &self.modules {
            (module.instance.expose)(services);
            services.add_singleton_instance::<dyn Module>(module.instance.module.clone());
        }
        info!(modules = self.modules.len(), "modules configured");
    }

    fn shutdown_failed(module: &LoadedModule, error: BoxError) -> ModuleFailure {
        error!(module = module.name, error = %error, "module shutdown failed");
        ModuleFailure {
            module: module.name,
            error,
        }
    }
}

impl std::fmt::Debug for ModuleLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleLoader")
            .field("modules", &self.modules())
            .field("dropped", &self.dropped)
            .finish()
    }
}
