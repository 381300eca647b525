//! Composition root tying modules, container and pipeline together.

use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{error, info, trace};

use super::{ModuleCatalog, ModuleFailure, ModuleLoader, ModulePackage};
use crate::collection::ServiceCollection;
use crate::config::ContainerOptions;
use crate::error::{DiError, DiResult};
use crate::pipeline::{Pipeline, PipelineBuilder};
use crate::provider::ServiceProvider;

/// Names of the loaded modules in activation order, registered as a
/// singleton so services can inspect what the host is made of.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedModules(Vec<&'static str>);

impl LoadedModules {
    pub fn names(&self) -> &[&'static str] {
        &self.0
    }
}

/// A modular application.
///
/// [`create`](Application::create) discovers, orders and configures modules
/// and builds the container. [`initialize`](Application::initialize) runs
/// the initialization phases and builds the pipeline.
/// [`shutdown`](Application::shutdown) shuts modules down in reverse order,
/// then disposes the container. Each step has an `_async` form driving the
/// modules' asynchronous hooks.
///
/// Initialization runs at most once. If a hook or the pipeline build fails,
/// the modules that already ran are not run again: later calls return
/// [`DiError::InitializationFailed`].
pub struct Application {
    loader: ModuleLoader,
    provider: ServiceProvider,
    module_names: Vec<&'static str>,
    pipeline: Option<Pipeline>,
    initialization_failed: bool,
    shut_down: AtomicBool,
}

impl Application {
    pub fn create(packages: &[&dyn ModulePackage]) -> DiResult<Self> {
        Self::create_with(packages, ContainerOptions::default())
    }

    /// Creates the application with explicit container options.
    pub fn create_with(packages: &[&dyn ModulePackage], options: ContainerOptions) -> DiResult<Self> {
        let catalog = ModuleCatalog::scan(packages);
        let mut services = ServiceCollection::new();
        let loader = ModuleLoader::load(catalog.modules(), &mut services)?;
        Ok(Self::assemble(loader, services, options))
    }

    /// [`create`](Application::create) through the asynchronous hooks.
    pub async fn create_async(packages: &[&dyn ModulePackage]) -> DiResult<Self> {
        Self::create_async_with(packages, ContainerOptions::default()).await
    }

    pub async fn create_async_with(
        packages: &[&dyn ModulePackage],
        options: ContainerOptions,
    ) -> DiResult<Self> {
        let catalog = ModuleCatalog::scan(packages);
        let mut services = ServiceCollection::new();
        let loader = ModuleLoader::load_async(catalog.modules(), &mut services).await?;
        Ok(Self::assemble(loader, services, options))
    }

    fn assemble(loader: ModuleLoader, mut services: ServiceCollection, options: ContainerOptions) -> Self {
        let module_names = loader.modules();
        services.add_instance(LoadedModules(module_names.clone()));
        let provider = services.build_with(options);
        info!(modules = module_names.len(), "application created");

        Self {
            loader,
            provider,
            module_names,
            pipeline: None,
            initialization_failed: false,
            shut_down: AtomicBool::new(false),
        }
    }

    /// Runs the initialization phases and builds the pipeline the modules
    /// contributed to. Calling it again returns the existing pipeline.
    pub fn initialize(&mut self) -> DiResult<&Pipeline> {
        self.ensure_initializable()?;
        match self.pipeline {
            Some(ref pipeline) => Ok(pipeline),
            None => {
                let mut builder = PipelineBuilder::new(self.provider.clone());
                let outcome = self
                    .loader
                    .initialize(&self.provider, &mut builder)
                    .and_then(|()| builder.build());
                self.complete_initialization(outcome)
            }
        }
    }

    /// [`initialize`](Application::initialize) through the asynchronous
    /// hooks.
    pub async fn initialize_async(&mut self) -> DiResult<&Pipeline> {
        self.ensure_initializable()?;
        match self.pipeline {
            Some(ref pipeline) => Ok(pipeline),
            None => {
                let mut builder = PipelineBuilder::new(self.provider.clone());
                let outcome = match self.loader.initialize_async(&self.provider, &mut builder).await {
                    Ok(()) => builder.build(),
                    Err(err) => Err(err),
                };
                self.complete_initialization(outcome)
            }
        }
    }

    fn ensure_initializable(&self) -> DiResult<()> {
        if self.is_shut_down() {
            return Err(DiError::Disposed {
                container: "application",
            });
        }
        if self.initialization_failed {
            return Err(DiError::InitializationFailed);
        }
        Ok(())
    }

    fn complete_initialization(&mut self, outcome: DiResult<Pipeline>) -> DiResult<&Pipeline> {
        match outcome {
            Ok(pipeline) => {
                info!(components = pipeline.len(), "application initialized");
                Ok(&*self.pipeline.insert(pipeline))
            }
            Err(err) => {
                error!(error = %err, "application initialization failed");
                self.initialization_failed = true;
                Err(err)
            }
        }
    }

    /// Shuts modules down in reverse order, then disposes the container.
    /// Returns the modules whose shutdown failed. Idempotent: later calls do
    /// nothing and return no failures.
    pub fn shutdown(&self) -> Vec<ModuleFailure> {
        if !self.begin_shutdown() {
            return Vec::new();
        }
        let failures = self.loader.shutdown(&self.provider);
        self.finish_shutdown(failures)
    }

    /// [`shutdown`](Application::shutdown) through the asynchronous hooks.
    pub async fn shutdown_async(&self) -> Vec<ModuleFailure> {
        if !self.begin_shutdown() {
            return Vec::new();
        }
        let failures = self.loader.shutdown_async(&self.provider).await;
        self.finish_shutdown(failures)
    }

    fn begin_shutdown(&self) -> bool {
        if self.shut_down.swap(true, Ordering::AcqRel) {
            trace!("application already shut down");
            return false;
        }
        true
    }

    fn finish_shutdown(&self, failures: Vec<ModuleFailure>) -> Vec<ModuleFailure> {
        self.provider.dispose();
        info!(failed = failures.len(), "application shut down");
        failures
    }

    pub fn provider(&self) -> &ServiceProvider {
        &self.provider
    }

    /// The pipeline, once [`initialize`](Application::initialize) succeeded.
    pub fn pipeline(&self) -> Option<&Pipeline> {
        self.pipeline.as_ref()
    }

    /// Loaded module names, in activation order.
    pub fn modules(&self) -> &[&'static str] {
        &self.module_names
    }

    pub fn loader(&self) -> &ModuleLoader {
        &self.loader
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::Acquire)
    }
}

impl std::fmt::Debug for Application {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Application")
            .field("modules", &self.module_names)
            .field("initialized", &self.pipeline.is_some())
            .field("initialization_failed", &self.initialization_failed)
            .field("shut_down", &self.is_shut_down())
            .finish()
    }
}
