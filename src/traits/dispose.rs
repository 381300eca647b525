//! Disposal trait for resource cleanup.

/// Trait for synchronous resource disposal.
///
/// Implement this for services that need structured teardown (flushing
/// buffers, closing connections). Hooks run in LIFO order when the owning
/// container is disposed: a scope for scoped services, the root provider for
/// singletons. Transient instances are never tracked.
///
/// # Examples
///
/// ```
/// use ferrous_host::{Dispose, ServiceCollection, Resolver, DiResult};
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicBool, Ordering};
///
/// struct Cache {
///     flushed: AtomicBool,
/// }
///
/// impl Dispose for Cache {
///     fn dispose(&self) {
///         self.flushed.store(true, Ordering::SeqCst);
///     }
/// }
///
/// # fn main() -> DiResult<()> {
/// let mut services = ServiceCollection::new();
/// services.add_scoped_factory::<Cache, _>(|r| {
///     let cache = Arc::new(Cache { flushed: AtomicBool::new(false) });
///     r.register_disposer(cache.clone());
///     Ok(cache)
/// });
///
/// let provider = services.build();
/// let scope = provider.create_scope();
/// let cache = scope.resolve_required::<Cache>()?;
/// scope.dispose();
/// assert!(cache.flushed.load(Ordering::SeqCst));
/// # Ok(())
/// # }
/// ```
pub trait Dispose: Send + Sync + 'static {
    /// Perform synchronous cleanup of resources.
    fn dispose(&self);
}
