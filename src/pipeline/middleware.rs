//! Pipeline components and the continuation handed to them.

use std::future::Future;
use std::pin::Pin;
use std::time::Instant;

use async_trait::async_trait;
use tracing::{error, info};

use super::context::ExecutionContext;
use super::Link;
use crate::error::{DiResult, PipelineResult};
use crate::provider::ResolverContext;
use crate::traits::Injectable;

/// Boxed future returned by closure components.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// One layer of the onion.
///
/// A component runs its own logic, then decides whether to continue by
/// awaiting [`Next::run`]. Code after that await runs on the way back out,
/// after every inner component has finished. Returning without calling
/// `next` short-circuits the rest of the chain.
///
/// # Examples
///
/// ```
/// use ferrous_host::{async_trait, ExecutionContext, Middleware, Next, PipelineResult};
///
/// struct RequireApiKey;
///
/// #[async_trait]
/// impl Middleware for RequireApiKey {
///     async fn handle(&self, ctx: &mut ExecutionContext, next: Next<'_>) -> PipelineResult {
///         if ctx.request().header("x-api-key").is_none() {
///             ctx.response_mut().status = 401;
///             return Ok(());
///         }
///         next.run(ctx).await
///     }
/// }
/// ```
#[async_trait]
pub trait Middleware: Send + Sync + 'static {
    async fn handle(&self, ctx: &mut ExecutionContext, next: Next<'_>) -> PipelineResult;

    /// Name used in logs.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// The rest of the chain after the current component.
pub struct Next<'a> {
    pub(super) link: Option<&'a Link>,
}

impl<'a> Next<'a> {
    /// Runs the remaining components, then the terminal handler.
    pub async fn run(self, ctx: &mut ExecutionContext) -> PipelineResult {
        match self.link {
            Some(link) => link.invoke(ctx).await,
            None => {
                ctx.mark_terminal();
                Ok(())
            }
        }
    }

    /// Whether any component remains before the terminal handler.
    pub fn is_terminal(&self) -> bool {
        self.link.is_none()
    }
}

/// Adapter turning a closure into a component.
pub(crate) struct FnMiddleware<F> {
    f: F,
}

impl<F> FnMiddleware<F> {
    pub(crate) fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<F> Middleware for FnMiddleware<F>
where
    F: for<'c> Fn(&'c mut ExecutionContext, Next<'c>) -> BoxFuture<'c, PipelineResult>
        + Send
        + Sync
        + 'static,
{
    async fn handle(&self, ctx: &mut ExecutionContext, next: Next<'_>) -> PipelineResult {
        (self.f)(ctx, next).await
    }

    fn name(&self) -> &'static str {
        "closure"
    }
}

/// Outermost safety net: logs every request with its elapsed time and turns
/// any error from inner components into a `500` response.
///
/// The invocation still ends in
/// [`InvocationState::Faulted`](super::InvocationState::Faulted) when an
/// inner component failed.
#[derive(Debug, Default, Clone, Copy)]
pub struct ErrorBoundary;

impl Injectable for ErrorBoundary {
    fn construct(_: &ResolverContext<'_>) -> DiResult<Self> {
        Ok(ErrorBoundary)
    }
}

#[async_trait]
impl Middleware for ErrorBoundary {
    async fn handle(&self, ctx: &mut ExecutionContext, next: Next<'_>) -> PipelineResult {
        let started = Instant::now();
        let method = ctx.request().method.clone();
        let path = ctx.request().path.clone();
        info!(%method, %path, "request started");

        match next.run(ctx).await {
            Ok(()) => {
                info!(
                    %method,
                    %path,
                    status = ctx.response().status,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "request completed"
                );
            }
            Err(err) => {
                error!(
                    %method,
                    %path,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    error = %err,
                    "request failed"
                );
                let response = ctx.response_mut();
                response.status = 500;
                response.body.clear();
                response.write(format!("Internal Server Error: {}", err));
            }
        }
        Ok(())
    }
}
