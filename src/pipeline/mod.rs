//! Onion-model request pipeline.
//!
//! Components are added in order with a [`PipelineBuilder`] and folded from
//! the last one to the first onto a terminal handler that does nothing. The
//! first component added is therefore the outermost layer: it sees the
//! request first and the response last.
//!
//! # Examples
//!
//! ```
//! use ferrous_host::{
//!     async_trait, ExecutionContext, Middleware, Next, PipelineBuilder, PipelineResult,
//!     Request, ServiceCollection,
//! };
//! use std::sync::Arc;
//!
//! struct Tag(&'static str);
//!
//! #[async_trait]
//! impl Middleware for Tag {
//!     async fn handle(&self, ctx: &mut ExecutionContext, next: Next<'_>) -> PipelineResult {
//!         ctx.response_mut().write(format!("<{}>", self.0));
//!         next.run(ctx).await?;
//!         ctx.response_mut().write(format!("</{}>", self.0));
//!         Ok(())
//!     }
//! }
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let provider = ServiceCollection::new().build();
//! let mut builder = PipelineBuilder::new(provider);
//! builder
//!     .use_middleware(Arc::new(Tag("a")))
//!     .use_middleware(Arc::new(Tag("b")));
//! let pipeline = builder.build()?;
//!
//! let ctx = pipeline.handle(Request::new("GET", "/")).await?;
//! assert_eq!(ctx.response().body_text(), "<a><b></b></a>");
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use tracing::{debug, trace};

use crate::cancellation::CancellationToken;
use crate::error::{DiError, DiResult, PipelineError, PipelineResult};
use crate::key::ServiceKey;
use crate::provider::{Scope, ServiceProvider};
use crate::traits::{Resolver, ResolverCore};

mod context;
mod middleware;

pub use context::{ExecutionContext, InvocationState, Request, Response};
pub use middleware::{BoxFuture, ErrorBoundary, Middleware, Next};
use middleware::FnMiddleware;

type ResolveFn = fn(&Scope) -> DiResult<Arc<dyn Middleware>>;

fn resolve_component<M: Middleware>(scope: &Scope) -> DiResult<Arc<dyn Middleware>> {
    let component: Arc<dyn Middleware> = scope.resolve_required::<M>()?;
    Ok(component)
}

enum Component {
    /// Resolved from the invocation's scope every time the chain runs.
    Resolved { service: ServiceKey, resolve: ResolveFn },
    /// Shared, pre-built component.
    Instance(Arc<dyn Middleware>),
}

impl Component {
    fn resolve(&self, scope: &Scope) -> DiResult<Arc<dyn Middleware>> {
        match self {
            Component::Resolved { resolve, .. } => resolve(scope),
            Component::Instance(component) => Ok(component.clone()),
        }
    }
}

/// One node of the folded chain.
pub(crate) struct Link {
    index: usize,
    component: Component,
    next: Option<Box<Link>>,
}

impl Link {
    fn invoke<'a>(&'a self, ctx: &'a mut ExecutionContext) -> BoxFuture<'a, PipelineResult> {
        Box::pin(async move {
            ctx.enter(self.index);
            let result = match ctx.check_cancelled() {
                Err(cancelled) => Err(PipelineError::from(cancelled)),
                Ok(()) => match self.component.resolve(ctx.scope()) {
                    Ok(component) => {
                        trace!(index = self.index, component = component.name(), "entering component");
                        let next = Next {
                            link: self.next.as_deref(),
                        };
                        component.handle(ctx, next).await
                    }
                    Err(err) => Err(PipelineError::from(err)),
                },
            };
            if result.is_err() {
                ctx.mark_faulted();
            }
            result
        })
    }
}

/// Collects pipeline components in order.
pub struct PipelineBuilder {
    provider: ServiceProvider,
    components: Vec<Component>,
}

impl PipelineBuilder {
    pub fn new(provider: ServiceProvider) -> Self {
        Self {
            provider,
            components: Vec::new(),
        }
    }

    /// Adds a component resolved from the container. `M` must be registered
    /// (under its own type) by the time [`build`](PipelineBuilder::build)
    /// runs.
    pub fn use_component<M: Middleware>(&mut self) -> &mut Self {
        self.components.push(Component::Resolved {
            service: ServiceKey::of::<M>(),
            resolve: resolve_component::<M>,
        });
        self
    }

    /// Adds a pre-built component shared by every invocation.
    pub fn use_middleware(&mut self, component: Arc<dyn Middleware>) -> &mut Self {
        self.components.push(Component::Instance(component));
        self
    }

    /// Adds a closure component.
    ///
    /// ```
    /// use ferrous_host::{PipelineBuilder, Request, ServiceCollection};
    ///
    /// # #[tokio::main(flavor = "current_thread")]
    /// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// let mut builder = PipelineBuilder::new(ServiceCollection::new().build());
    /// builder.use_fn(|ctx, _next| {
    ///     Box::pin(async move {
    ///         ctx.response_mut().status = 404;
    ///         Ok(())
    ///     })
    /// });
    ///
    /// let ctx = builder.build()?.handle(Request::new("GET", "/missing")).await?;
    /// assert_eq!(ctx.response().status, 404);
    /// # Ok(())
    /// # }
    /// ```
    pub fn use_fn<F>(&mut self, f: F) -> &mut Self
    where
        F: for<'c> Fn(&'c mut ExecutionContext, Next<'c>) -> BoxFuture<'c, PipelineResult>
            + Send
            + Sync
            + 'static,
    {
        self.use_middleware(Arc::new(FnMiddleware::new(f)))
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// Folds the components into a chain.
    ///
    /// Fails with [`DiError::UnresolvedService`] when a container-resolved
    /// component has no registration, unless
    /// [`ContainerOptions::validate_pipeline_on_build`](crate::ContainerOptions)
    /// is turned off.
    pub fn build(self) -> DiResult<Pipeline> {
        if self.provider.options().validate_pipeline_on_build {
            for component in &self.components {
                if let Component::Resolved { service, .. } = component {
                    if !self.provider.contains_key(service) {
                        return Err(DiError::UnresolvedService {
                            service: service.type_name(),
                        });
                    }
                }
            }
        }

        let len = self.components.len();
        let head = self
            .components
            .into_iter()
            .enumerate()
            .rev()
            .fold(None, |next, (index, component)| {
                Some(Box::new(Link {
                    index,
                    component,
                    next,
                }))
            });
        debug!(components = len, "pipeline built");

        Ok(Pipeline {
            provider: self.provider,
            head,
            len,
        })
    }
}

/// A built, immutable chain of components. Safe to share between concurrent
/// invocations; each one brings its own [`ExecutionContext`].
pub struct Pipeline {
    provider: ServiceProvider,
    head: Option<Box<Link>>,
    len: usize,
}

impl Pipeline {
    /// Runs the chain against `ctx`, which must not have been used before.
    /// Leaves the final [`InvocationState`] on the context.
    pub async fn invoke(&self, ctx: &mut ExecutionContext) -> PipelineResult {
        if ctx.state() != InvocationState::NotStarted {
            return Err(PipelineError::ContextReused);
        }
        let next = Next {
            link: self.head.as_deref(),
        };
        let result = next.run(ctx).await;
        ctx.finish();
        trace!(state = ?ctx.state(), "pipeline invocation finished");
        result
    }

    /// Handles one unit of work: opens a fresh scope and context, runs the
    /// chain, then disposes the scope.
    pub async fn handle(&self, request: Request) -> PipelineResult<ExecutionContext> {
        self.handle_with_token(request, CancellationToken::new()).await
    }

    /// Like [`handle`](Pipeline::handle), observing a caller-owned token.
    pub async fn handle_with_token(
        &self,
        request: Request,
        token: CancellationToken,
    ) -> PipelineResult<ExecutionContext> {
        let mut ctx = ExecutionContext::new(request, self.provider.create_scope()).with_token(token);
        let result = self.invoke(&mut ctx).await;
        ctx.scope().dispose();
        result.map(|()| ctx)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn provider(&self) -> &ServiceProvider {
        &self.provider
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline").field("components", &self.len).finish()
    }
}
