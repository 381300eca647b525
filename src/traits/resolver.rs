//! Resolver traits for service resolution.

use std::any::Any;
use std::sync::Arc;

use crate::error::{DiError, DiResult};
use crate::key::ServiceKey;

/// Core resolver trait for object-safe service resolution.
///
/// Implemented by the root [`ServiceProvider`](crate::ServiceProvider), by
/// every [`Scope`](crate::Scope) and by the
/// [`ResolverContext`](crate::ResolverContext) handed to factories. Most code
/// uses the generic [`Resolver`] methods built on top of it.
pub trait ResolverCore: Send + Sync {
    /// Resolves the last descriptor registered for `key`'s service type.
    ///
    /// * `Ok(None)` - no descriptor is registered for the type
    /// * `Err(DiError)` - a descriptor exists but could not be built, or the
    ///   container has been disposed
    fn resolve_any(&self, key: &ServiceKey) -> DiResult<Option<Arc<dyn Any + Send + Sync>>>;

    /// Resolves every descriptor registered for `key`'s service type, in
    /// registration order. Descriptors that fail to build are skipped.
    fn resolve_many(&self, key: &ServiceKey) -> DiResult<Vec<Arc<dyn Any + Send + Sync>>>;

    /// Whether at least one descriptor exists for `key`'s service type.
    fn contains_key(&self, key: &ServiceKey) -> bool;
}

/// High-level resolver interface with generic methods.
///
/// Both `ServiceProvider` and `Scope` implement this trait, making them
/// interchangeable for service resolution within their respective contexts.
///
/// # Examples
///
/// ```
/// use ferrous_host::{ServiceCollection, Resolver, DiResult};
/// use std::sync::Arc;
///
/// trait Logger: Send + Sync {
///     fn log(&self, msg: &str) -> String;
/// }
///
/// struct ConsoleLogger;
/// impl Logger for ConsoleLogger {
///     fn log(&self, msg: &str) -> String { format!("LOG: {}", msg) }
/// }
///
/// # fn main() -> DiResult<()> {
/// let mut collection = ServiceCollection::new();
/// collection.add_instance(42usize);
/// collection.add_singleton_instance::<dyn Logger>(Arc::new(ConsoleLogger));
///
/// let provider = collection.build();
///
/// assert_eq!(*provider.resolve_required::<usize>()?, 42);
/// let logger = provider.resolve_required::<dyn Logger>()?;
/// assert_eq!(logger.log("ready"), "LOG: ready");
///
/// // Unregistered types are not an error for `resolve`
/// assert!(provider.resolve::<String>()?.is_none());
/// # Ok(())
/// # }
/// ```
pub trait Resolver: ResolverCore {
    /// Resolves `S`, returning `Ok(None)` when nothing is registered for it.
    ///
    /// With several descriptors for `S`, the last registered one wins.
    fn resolve<S>(&self) -> DiResult<Option<Arc<S>>>
    where
        S: ?Sized + Send + Sync + 'static,
    {
        match self.resolve_any(&ServiceKey::of::<S>())? {
            Some(any) => downcast::<S>(any).map(Some),
            None => Ok(None),
        }
    }

    /// Resolves `S`, failing with [`DiError::UnresolvedService`] when nothing
    /// is registered for it.
    fn resolve_required<S>(&self) -> DiResult<Arc<S>>
    where
        S: ?Sized + Send + Sync + 'static,
    {
        self.resolve::<S>()?.ok_or(DiError::UnresolvedService {
            service: std::any::type_name::<S>(),
        })
    }

    /// Resolves every registration of `S` in registration order.
    ///
    /// Best-effort: a descriptor that fails to build is logged and skipped,
    /// the remaining ones are still returned.
    ///
    /// ```
    /// use ferrous_host::{ServiceCollection, Resolver, DiError, DiResult};
    /// use std::sync::Arc;
    ///
    /// trait Plugin: Send + Sync { fn name(&self) -> &'static str; }
    /// struct A;
    /// impl Plugin for A { fn name(&self) -> &'static str { "a" } }
    /// struct C;
    /// impl Plugin for C { fn name(&self) -> &'static str { "c" } }
    ///
    /// # fn main() -> DiResult<()> {
    /// let mut services = ServiceCollection::new();
    /// services.add_singleton_instance::<dyn Plugin>(Arc::new(A));
    /// services.add_transient_factory::<dyn Plugin, _>(|_| {
    ///     Err(DiError::construction::<dyn Plugin>("broken plugin"))
    /// });
    /// services.add_singleton_instance::<dyn Plugin>(Arc::new(C));
    ///
    /// let provider = services.build();
    /// let names: Vec<_> = provider
    ///     .resolve_all::<dyn Plugin>()?
    ///     .iter()
    ///     .map(|p| p.name())
    ///     .collect();
    /// assert_eq!(names, ["a", "c"]);
    /// # Ok(())
    /// # }
    /// ```
    fn resolve_all<S>(&self) -> DiResult<Vec<Arc<S>>>
    where
        S: ?Sized + Send + Sync + 'static,
    {
        self.resolve_many(&ServiceKey::of::<S>())?
            .into_iter()
            .map(downcast::<S>)
            .collect()
    }

    /// Whether `S` has at least one registration.
    fn is_registered<S: ?Sized + 'static>(&self) -> bool {
        self.contains_key(&ServiceKey::of::<S>())
    }
}

/// Instances are stored as `Arc<Arc<S>>` behind `dyn Any` so sized types and
/// trait objects share one representation.
fn downcast<S>(any: Arc<dyn Any + Send + Sync>) -> DiResult<Arc<S>>
where
    S: ?Sized + Send + Sync + 'static,
{
    any.downcast::<Arc<S>>()
        .map(|boxed| (*boxed).clone())
        .map_err(|_| DiError::TypeMismatch(std::any::type_name::<S>()))
}
