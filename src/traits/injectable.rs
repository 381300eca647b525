//! Two-phase construction for implementation types.

use std::sync::Arc;

use crate::error::DiResult;
use crate::provider::ResolverContext;
use crate::traits::Dispose;

/// An implementation type the container knows how to build on its own.
///
/// Construction happens in two fixed phases:
///
/// 1. [`construct`](Injectable::construct) receives the required dependencies.
///    Pull them with [`ResolverContext::dependency`]; a missing one fails the
///    whole resolution with [`DiError::UnresolvedDependency`](crate::DiError::UnresolvedDependency).
/// 2. [`inject`](Injectable::inject) fills optional members. Pull them with
///    [`ResolverContext::optional`]; missing ones are skipped.
///
/// # Examples
///
/// ```
/// use ferrous_host::{Injectable, ResolverContext, ServiceCollection, Resolver, DiResult};
/// use std::sync::Arc;
///
/// #[derive(Default)]
/// struct Clock;
/// impl Injectable for Clock {
///     fn construct(_: &ResolverContext<'_>) -> DiResult<Self> { Ok(Clock) }
/// }
///
/// struct Metrics;
///
/// struct OrderService {
///     clock: Arc<Clock>,
///     metrics: Option<Arc<Metrics>>,
/// }
///
/// impl Injectable for OrderService {
///     fn construct(ctx: &ResolverContext<'_>) -> DiResult<Self> {
///         Ok(OrderService { clock: ctx.dependency::<Clock>()?, metrics: None })
///     }
///
///     fn inject(&mut self, ctx: &ResolverContext<'_>) -> DiResult<()> {
///         self.metrics = ctx.optional::<Metrics>()?;
///         Ok(())
///     }
/// }
///
/// # fn main() -> DiResult<()> {
/// let mut services = ServiceCollection::new();
/// services.add_singleton::<Clock, Clock>();
/// services.add_transient::<OrderService, OrderService>();
///
/// let provider = services.build();
/// let orders = provider.resolve_required::<OrderService>()?;
/// assert!(orders.metrics.is_none());
/// # Ok(())
/// # }
/// ```
pub trait Injectable: Sized + Send + Sync + 'static {
    /// Constructor injection: build the value from its required dependencies.
    fn construct(ctx: &ResolverContext<'_>) -> DiResult<Self>;

    /// Member injection, run once right after `construct`.
    fn inject(&mut self, _ctx: &ResolverContext<'_>) -> DiResult<()> {
        Ok(())
    }

    /// Disposal hook for the built instance. Types implementing [`Dispose`]
    /// return `Some(this.clone())` so the owning container disposes them.
    fn disposer(_this: &Arc<Self>) -> Option<Arc<dyn Dispose>> {
        None
    }
}

/// Upcast from an implementation to the service type it is registered as.
///
/// Every type is its own service. Binding an implementation to a trait
/// object takes a one-line impl:
///
/// ```
/// use ferrous_host::IntoService;
/// use std::sync::Arc;
///
/// trait Greeter: Send + Sync { fn greet(&self) -> String; }
/// struct English;
/// impl Greeter for English { fn greet(&self) -> String { "hello".into() } }
///
/// impl IntoService<dyn Greeter> for English {
///     fn into_service(self: Arc<Self>) -> Arc<dyn Greeter> { self }
/// }
/// ```
pub trait IntoService<S: ?Sized> {
    fn into_service(self: Arc<Self>) -> Arc<S>;
}

impl<T: Send + Sync + 'static> IntoService<T> for T {
    fn into_service(self: Arc<Self>) -> Arc<T> {
        self
    }
}
