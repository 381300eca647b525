//! Service provider module for dependency injection.
//!
//! This module contains the root [`ServiceProvider`], child [`Scope`]s and
//! the [`ResolverContext`] handed to factories.

use std::any::Any;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use crate::config::ContainerOptions;
use crate::descriptors::ServiceDescriptor;
use crate::error::{DiError, DiResult};
use crate::internal::{DisposeBag, InstanceCache, StackGuard};
use crate::key::ServiceKey;
use crate::lifetime::Lifetime;
use crate::registration::{AnyArc, Registry};
use crate::traits::{Resolver, ResolverCore};

pub mod context;
pub mod scope;
pub use context::ResolverContext;
pub use scope::Scope;

/// Root container resolving services from a built registry.
///
/// The provider owns the singleton cache shared by every scope it creates,
/// and acts as its own scope for scoped services resolved directly from it.
/// Cloning is cheap and yields a handle to the same container.
///
/// # Thread Safety
///
/// `ServiceProvider` is `Send + Sync`. Concurrent first resolution of a
/// singleton constructs exactly one instance.
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
/// let mut collection = ServiceCollection::new();
/// collection.add_instance(Database { url: "postgres://localhost".to_string() });
/// collection.add_transient_factory::<UserService, _>(|ctx| {
///     Ok(Arc::new(UserService { db: ctx.dependency::<Database>()? }))
/// });
///
/// let provider = collection.build();
/// let user_service = provider.resolve_required::<UserService>()?;
/// assert_eq!(user_service.db.url, "postgres://localhost");
///
/// provider.dispose();
/// assert!(provider.resolve::<Database>().is_err());
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct ServiceProvider {
    inner: Arc<ProviderInner>,
}

pub(crate) struct ProviderInner {
    registry: Registry,
    options: ContainerOptions,
    singletons: InstanceCache,
    singleton_disposers: Mutex<DisposeBag>,
    root_scope: ScopeState,
    disposed: AtomicBool,
}

/// Per-container scoped state: the root's own and one per [`Scope`].
pub(crate) struct ScopeState {
    label: &'static str,
    instances: InstanceCache,
    disposers: Mutex<DisposeBag>,
    disposed: AtomicBool,
}

impl ScopeState {
    pub(crate) fn new(label: &'static str) -> Self {
        Self {
            label,
            instances: InstanceCache::new(),
            disposers: Mutex::new(DisposeBag::default()),
            disposed: AtomicBool::new(false),
        }
    }

    #[inline]
    fn ensure_live(&self) -> DiResult<()> {
        if self.disposed.load(Ordering::Acquire) {
            Err(DiError::Disposed { container: self.label })
        } else {
            Ok(())
        }
    }

    pub(crate) fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    pub(crate) fn has_pending_disposers(&self) -> bool {
        !self.disposers.lock().is_empty()
    }

    /// Runs the disposal hooks once. Returns `None` on repeated calls.
    pub(crate) fn dispose(&self) -> Option<usize> {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return None;
        }
        let bag = self.disposers.lock().take();
        let count = bag.run_all_reverse();
        self.instances.clear();
        Some(count)
    }

    pub(crate) fn cached(&self) -> usize {
        self.instances.len()
    }
}

impl ProviderInner {
    fn dispose(&self) -> Option<(usize, usize)> {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return None;
        }
        let scoped = self.root_scope.dispose().unwrap_or(0);
        let bag = self.singleton_disposers.lock().take();
        let singletons = bag.run_all_reverse();
        self.singletons.clear();
        Some((scoped, singletons))
    }
}

impl Drop for ProviderInner {
    fn drop(&mut self) {
        if let Some((scoped, singletons)) = self.dispose() {
            if scoped + singletons > 0 {
                debug!(scoped, singletons, "service provider dropped without dispose(); ran disposers");
            }
        }
    }
}

impl ServiceProvider {
    pub(crate) fn new(registry: Registry, options: ContainerOptions) -> Self {
        debug!(
            descriptors = registry.len(),
            max_depth = options.max_resolution_depth,
            "service provider built"
        );
        Self {
            inner: Arc::new(ProviderInner {
                registry,
                options,
                singletons: InstanceCache::new(),
                singleton_disposers: Mutex::new(DisposeBag::default()),
                root_scope: ScopeState::new("root"),
                disposed: AtomicBool::new(false),
            }),
        }
    }

    /// Creates a new scope sharing this provider's registry and singletons,
    /// with a fresh, empty scoped cache.
    ///
    /// # Examples
    ///
    /// ```
    /// use ferrous_host::{ServiceCollection, Resolver, DiResult};
    /// use std::sync::Arc;
    /// use std::sync::atomic::{AtomicUsize, Ordering};
    ///
    /// struct RequestId(usize);
    ///
    /// # fn main() -> DiResult<()> {
    /// let counter = Arc::new(AtomicUsize::new(0));
    /// let c = counter.clone();
    ///
    /// let mut collection = ServiceCollection::new();
    /// collection.add_scoped_factory::<RequestId, _>(move |_| {
    ///     Ok(Arc::new(RequestId(c.fetch_add(1, Ordering::SeqCst))))
    /// });
    ///
    /// let provider = collection.build();
    /// let scope1 = provider.create_scope();
    /// let scope2 = provider.create_scope();
    ///
    /// let a = scope1.resolve_required::<RequestId>()?;
    /// let b = scope1.resolve_required::<RequestId>()?;
    /// let c = scope2.resolve_required::<RequestId>()?;
    ///
    /// assert!(Arc::ptr_eq(&a, &b));
    /// assert!(!Arc::ptr_eq(&a, &c));
    /// # Ok(())
    /// # }
    /// ```
    pub fn create_scope(&self) -> Scope {
        trace!("scope created");
        Scope::new(self.clone())
    }

    /// Disposes the root: first the scoped instances held by the root itself,
    /// then every tracked singleton, both in LIFO order.
    ///
    /// Idempotent. Any later resolution, from the root or from one of its
    /// scopes, fails with [`DiError::Disposed`].
    pub fn dispose(&self) {
        match self.inner.dispose() {
            Some((scoped, singletons)) => {
                debug!(scoped, singletons, "service provider disposed");
            }
            None => trace!("service provider already disposed"),
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::Acquire)
    }

    pub fn options(&self) -> &ContainerOptions {
        &self.inner.options
    }

    /// Registered descriptors in registration order.
    pub fn descriptors(&self) -> impl Iterator<Item = &ServiceDescriptor> {
        self.inner.registry.iter()
    }

    /// Number of singleton instances built so far.
    pub fn singleton_count(&self) -> usize {
        self.inner.singletons.len()
    }

    #[inline]
    fn ensure_live(&self) -> DiResult<()> {
        if self.is_disposed() {
            Err(DiError::Disposed { container: "root" })
        } else {
            Ok(())
        }
    }

    /// Builds or fetches the instance for one descriptor on behalf of
    /// `current`, whose scoped state is `state`.
    pub(crate) fn resolve_descriptor(
        &self,
        current: &dyn ResolverCore,
        state: &ScopeState,
        key: ServiceKey,
        descriptor: &ServiceDescriptor,
    ) -> DiResult<AnyArc> {
        self.ensure_live()?;
        state.ensure_live()?;
        let _guard = StackGuard::enter(key, self.inner.options.max_resolution_depth)?;
        let building = descriptor
            .implementation_type_name()
            .unwrap_or_else(|| descriptor.service_type_name());

        match descriptor.lifetime() {
            Lifetime::Singleton => self.inner.singletons.get_or_try_init(key, || {
                trace!(service = %key, "building singleton");
                build_owned(
                    &self.inner.singleton_disposers,
                    &self.inner.disposed,
                    "root",
                    |pending| descriptor.create(&ResolverContext::new(self, Some(pending), building)),
                )
            }),
            Lifetime::Scoped => state.instances.get_or_try_init(key, || {
                trace!(service = %key, scope = state.label, "building scoped instance");
                build_owned(&state.disposers, &state.disposed, state.label, |pending| {
                    descriptor.create(&ResolverContext::new(current, Some(pending), building))
                })
            }),
            Lifetime::Transient => {
                let ctx = ResolverContext::new(current, None, building);
                descriptor.create(&ctx)
            }
        }
    }

    pub(crate) fn resolve_last(
        &self,
        current: &dyn ResolverCore,
        state: &ScopeState,
        key: &ServiceKey,
    ) -> DiResult<Option<AnyArc>> {
        self.ensure_live()?;
        state.ensure_live()?;
        match self.inner.registry.last_for(key.type_id()) {
            Some((key, descriptor)) => self
                .resolve_descriptor(current, state, key, descriptor)
                .map(Some),
            None => Ok(None),
        }
    }

    pub(crate) fn resolve_every(
        &self,
        current: &dyn ResolverCore,
        state: &ScopeState,
        key: &ServiceKey,
    ) -> DiResult<Vec<AnyArc>> {
        self.ensure_live()?;
        state.ensure_live()?;
        let mut values = Vec::new();
        for (key, descriptor) in self.inner.registry.descriptors_for(key.type_id()) {
            match self.resolve_descriptor(current, state, key, descriptor) {
                Ok(value) => values.push(value),
                Err(err) => {
                    warn!(service = %key, error = %err, "skipping registration that failed to resolve");
                }
            }
        }
        Ok(values)
    }

    pub(crate) fn has_descriptor(&self, key: &ServiceKey) -> bool {
        self.inner.registry.contains(key.type_id())
    }
}

/// Builds one owned instance with its disposal hooks collected aside, then
/// hands them to `owner`.
///
/// The handoff happens under the owner's lock, and disposal flips `disposed`
/// before taking that lock, so hooks either reach the bag disposal drains or
/// are run here. An owner disposed mid-build gets its hooks run at once and
/// the build fails with [`DiError::Disposed`], keeping the instance out of
/// the cleared cache.
fn build_owned<F>(
    owner: &Mutex<DisposeBag>,
    disposed: &AtomicBool,
    container: &'static str,
    build: F,
) -> DiResult<AnyArc>
where
    F: FnOnce(&Mutex<DisposeBag>) -> DiResult<AnyArc>,
{
    let pending = Mutex::new(DisposeBag::default());
    let built = build(&pending);
    let pending = pending.into_inner();

    let mut bag = owner.lock();
    if disposed.load(Ordering::Acquire) {
        drop(bag);
        let ran = pending.run_all_reverse();
        debug!(container, disposers = ran, "container disposed while building; instance discarded");
        return Err(DiError::Disposed { container });
    }
    bag.append(pending);
    built
}

impl ResolverCore for ServiceProvider {
    fn resolve_any(&self, key: &ServiceKey) -> DiResult<Option<Arc<dyn Any + Send + Sync>>> {
        self.resolve_last(self, &self.inner.root_scope, key)
    }

    fn resolve_many(&self, key: &ServiceKey) -> DiResult<Vec<Arc<dyn Any + Send + Sync>>> {
        self.resolve_every(self, &self.inner.root_scope, key)
    }

    fn contains_key(&self, key: &ServiceKey) -> bool {
        self.has_descriptor(key)
    }
}

impl Resolver for ServiceProvider {}

impl std::fmt::Debug for ServiceProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceProvider")
            .field("descriptors", &self.inner.registry.len())
            .field("singletons", &self.inner.singletons.len())
            .field("root_scoped", &self.inner.root_scope.cached())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}
