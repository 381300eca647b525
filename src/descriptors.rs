//! Service descriptors: immutable registration records.

use std::any::TypeId;
use std::fmt;
use std::sync::Arc;

use crate::error::DiResult;
use crate::key::ServiceKey;
use crate::lifetime::Lifetime;
use crate::provider::ResolverContext;
use crate::registration::{AnyArc, Ctor};
use crate::traits::{Injectable, IntoService};

/// How a descriptor produces its instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// The implementation type builds itself through [`Injectable`].
    Constructed { implementation: &'static str },
    /// A construction callback receiving a [`ResolverContext`].
    Factory,
    /// A pre-built value. Always a singleton.
    Instance,
}

/// Immutable record describing how to produce one registered service.
///
/// Descriptors are created once at composition time and never change. The
/// registry assigns each one its position among the descriptors of the same
/// service type when it is added.
///
/// # Examples
///
/// ```rust
/// use ferrous_host::{ServiceCollection, ServiceDescriptor, Lifetime, Strategy, DiResult};
/// use std::sync::Arc;
///
/// struct Database { url: String }
/// struct Repository;
///
/// let mut services = ServiceCollection::new();
/// services.add_instance(Database { url: "postgres://localhost".to_string() });
/// services.add_scoped_factory::<Repository, _>(|_| Ok(Arc::new(Repository)));
///
/// let descriptors = services.get_service_descriptors();
/// assert_eq!(descriptors.len(), 2);
///
/// let db = &descriptors[0];
/// assert!(db.service_type_name().contains("Database"));
/// assert_eq!(db.lifetime(), Lifetime::Singleton);
/// assert_eq!(db.strategy(), Strategy::Instance);
///
/// assert_eq!(descriptors[1].lifetime(), Lifetime::Scoped);
/// assert_eq!(descriptors[1].strategy(), Strategy::Factory);
/// ```
#[derive(Clone)]
pub struct ServiceDescriptor {
    service: ServiceKey,
    lifetime: Lifetime,
    strategy: Strategy,
    pub(crate) ctor: Ctor,
}

impl ServiceDescriptor {
    /// Descriptor built by `I`'s two-phase construction and exposed as `S`.
    pub fn constructed<S, I>(lifetime: Lifetime) -> Self
    where
        S: ?Sized + Send + Sync + 'static,
        I: Injectable + IntoService<S>,
    {
        let ctor = |ctx: &ResolverContext<'_>| -> DiResult<AnyArc> {
            let mut value = I::construct(ctx)?;
            value.inject(ctx)?;
            let value = Arc::new(value);
            if let Some(disposer) = I::disposer(&value) {
                ctx.track_disposer(disposer);
            }
            let service: Arc<S> = <I as IntoService<S>>::into_service(value);
            Ok(Arc::new(service) as AnyArc)
        };
        Self {
            service: ServiceKey::of::<S>(),
            lifetime,
            strategy: Strategy::Constructed {
                implementation: std::any::type_name::<I>(),
            },
            ctor: Arc::new(ctor),
        }
    }

    /// Descriptor built by a construction callback.
    pub fn factory<S, F>(lifetime: Lifetime, factory: F) -> Self
    where
        S: ?Sized + Send + Sync + 'static,
        F: Fn(&ResolverContext<'_>) -> DiResult<Arc<S>> + Send + Sync + 'static,
    {
        let ctor = move |ctx: &ResolverContext<'_>| -> DiResult<AnyArc> {
            let service = factory(ctx)?;
            Ok(Arc::new(service) as AnyArc)
        };
        Self {
            service: ServiceKey::of::<S>(),
            lifetime,
            strategy: Strategy::Factory,
            ctor: Arc::new(ctor),
        }
    }

    /// Descriptor wrapping a pre-built value. Instance descriptors are always
    /// singletons; the caller keeps ownership of the value's teardown.
    pub fn instance<S>(value: Arc<S>) -> Self
    where
        S: ?Sized + Send + Sync + 'static,
    {
        let stored: AnyArc = Arc::new(value);
        let ctor = move |_: &ResolverContext<'_>| -> DiResult<AnyArc> { Ok(stored.clone()) };
        Self {
            service: ServiceKey::of::<S>(),
            lifetime: Lifetime::Singleton,
            strategy: Strategy::Instance,
            ctor: Arc::new(ctor),
        }
    }

    /// Type-level key of the service this descriptor provides.
    pub fn service_key(&self) -> ServiceKey {
        self.service
    }

    pub fn service_type_id(&self) -> TypeId {
        self.service.type_id()
    }

    pub fn service_type_name(&self) -> &'static str {
        self.service.type_name()
    }

    /// Implementation type name, known only for constructed descriptors.
    pub fn implementation_type_name(&self) -> Option<&'static str> {
        match self.strategy {
            Strategy::Constructed { implementation } => Some(implementation),
            _ => None,
        }
    }

    pub fn lifetime(&self) -> Lifetime {
        self.lifetime
    }

    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    pub(crate) fn create(&self, ctx: &ResolverContext<'_>) -> DiResult<AnyArc> {
        (self.ctor)(ctx)
    }
}

impl fmt::Debug for ServiceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceDescriptor")
            .field("service", &self.service.type_name())
            .field("lifetime", &self.lifetime)
            .field("strategy", &self.strategy)
            .finish()
    }
}
