//! Resolver context for dependency injection.
//!
//! This module contains the ResolverContext type which provides
//! the interface for factories and constructors to resolve dependencies.

use std::any::Any;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::trace;

use crate::error::{DiError, DiResult};
use crate::internal::DisposeBag;
use crate::key::ServiceKey;
use crate::traits::{Dispose, Resolver, ResolverCore};

/// Context passed to factories and [`Injectable`](crate::Injectable)
/// constructors for resolving dependencies.
///
/// It resolves against the container that owns the instance being built:
/// the root provider for singletons, the resolving scope otherwise. Disposal
/// hooks registered through it go to that same owner.
///
/// # Examples
///
/// ```
/// use ferrous_host::{ServiceCollection, Resolver, DiResult};
/// use std::sync::Arc;
///
/// struct Database { url: String }
/// struct UserService { db: Arc<Database> }
///
/// # fn main() -> DiResult<()> {
/// let mut services = ServiceCollection::new();
/// services.add_instance(Database { url: "postgres://localhost".to_string() });
/// services.add_transient_factory::<UserService, _>(|ctx| {
///     Ok(Arc::new(UserService { db: ctx.dependency::<Database>()? }))
/// });
///
/// let provider = services.build();
/// let users = provider.resolve_required::<UserService>()?;
/// assert_eq!(users.db.url, "postgres://localhost");
/// # Ok(())
/// # }
/// ```
pub struct ResolverContext<'a> {
    resolver: &'a dyn ResolverCore,
    disposers: Option<&'a Mutex<DisposeBag>>,
    building: &'static str,
}

impl<'a> ResolverContext<'a> {
    pub(crate) fn new(
        resolver: &'a dyn ResolverCore,
        disposers: Option<&'a Mutex<DisposeBag>>,
        building: &'static str,
    ) -> Self {
        Self {
            resolver,
            disposers,
            building,
        }
    }

    /// Name of the type currently being built.
    pub fn building(&self) -> &'static str {
        self.building
    }

    /// Resolves a required dependency of the type being built.
    ///
    /// A missing or failing dependency is reported as
    /// [`DiError::UnresolvedDependency`] naming both types. Cycles, depth
    /// overruns and disposed containers pass through unchanged.
    pub fn dependency<D>(&self) -> DiResult<Arc<D>>
    where
        D: ?Sized + Send + Sync + 'static,
    {
        self.resolve_required::<D>().map_err(|err| {
            if err.is_structural() {
                err
            } else {
                DiError::UnresolvedDependency {
                    for_type: self.building,
                    parameter: std::any::type_name::<D>(),
                    source: Box::new(err),
                }
            }
        })
    }

    /// Resolves an optional member. Unregistered members yield `None`.
    pub fn optional<D>(&self) -> DiResult<Option<Arc<D>>>
    where
        D: ?Sized + Send + Sync + 'static,
    {
        self.resolve::<D>()
    }

    /// Registers a service for disposal with the container that owns it.
    ///
    /// For transient services there is no owner and the hook is dropped:
    /// disposing transients is the caller's responsibility.
    pub fn register_disposer<T: Dispose>(&self, service: Arc<T>) {
        self.track_disposer(service);
    }

    pub(crate) fn track_disposer(&self, service: Arc<dyn Dispose>) {
        match self.disposers {
            Some(bag) => bag.lock().push(Box::new(move || service.dispose())),
            None => trace!(service = self.building, "transient disposer not tracked"),
        }
    }
}

impl<'a> ResolverCore for ResolverContext<'a> {
    fn resolve_any(&self, key: &ServiceKey) -> DiResult<Option<Arc<dyn Any + Send + Sync>>> {
        self.resolver.resolve_any(key)
    }

    fn resolve_many(&self, key: &ServiceKey) -> DiResult<Vec<Arc<dyn Any + Send + Sync>>> {
        self.resolver.resolve_many(key)
    }

    fn contains_key(&self, key: &ServiceKey) -> bool {
        self.resolver.contains_key(key)
    }
}

impl<'a> Resolver for ResolverContext<'a> {}
