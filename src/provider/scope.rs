//! Scoped service resolution and lifecycle management.

use std::any::Any;
use std::sync::Arc;

use tracing::{debug, trace};

use super::{ScopeState, ServiceProvider};
use crate::error::DiResult;
use crate::key::ServiceKey;
use crate::traits::{Resolver, ResolverCore};

/// Child container for one logical unit of work.
///
/// A scope shares the registry and the singleton cache of its root provider
/// but owns a private scoped cache and its own disposal hooks.
///
/// # Lifetime Behavior
///
/// - **Singleton**: resolved and cached in the root provider
/// - **Scoped**: resolved and cached within this scope
/// - **Transient**: created fresh on every resolution
///
/// A scope belongs to a single unit of work and must not be resolved from by
/// two workers at once. Dropping a scope disposes it.
///
/// # Examples
///
/// ```
/// use ferrous_host::{ServiceCollection, Resolver, DiResult};
/// use std::sync::Arc;
///
/// struct DatabaseConnection(String);
/// struct UserService { db: Arc<DatabaseConnection> }
///
/// # fn main() -> DiResult<()> {
/// let mut collection = ServiceCollection::new();
/// collection.add_scoped_factory::<DatabaseConnection, _>(|_| {
///     Ok(Arc::new(DatabaseConnection("connection-123".to_string())))
/// });
/// collection.add_transient_factory::<UserService, _>(|ctx| {
///     Ok(Arc::new(UserService { db: ctx.dependency::<DatabaseConnection>()? }))
/// });
///
/// let provider = collection.build();
/// let scope = provider.create_scope();
///
/// let user1 = scope.resolve_required::<UserService>()?;
/// let user2 = scope.resolve_required::<UserService>()?;
/// assert!(!Arc::ptr_eq(&user1, &user2));
/// assert!(Arc::ptr_eq(&user1.db, &user2.db));
///
/// scope.dispose();
/// assert!(scope.resolve::<UserService>().is_err());
/// # Ok(())
/// # }
/// ```
pub struct Scope {
    root: ServiceProvider,
    state: ScopeState,
}

impl Scope {
    pub(crate) fn new(root: ServiceProvider) -> Self {
        Self {
            root,
            state: ScopeState::new("scope"),
        }
    }

    /// The root provider this scope belongs to.
    pub fn root(&self) -> &ServiceProvider {
        &self.root
    }

    /// Creates a sibling scope of the same root, with its own empty cache.
    pub fn create_scope(&self) -> Scope {
        self.root.create_scope()
    }

    /// Disposes every disposable scoped instance in LIFO order and clears the
    /// scoped cache. Idempotent; later resolutions fail with
    /// [`DiError::Disposed`](crate::DiError::Disposed).
    pub fn dispose(&self) {
        match self.state.dispose() {
            Some(count) => trace!(disposed = count, "scope disposed"),
            None => trace!("scope already disposed"),
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.state.is_disposed()
    }

    /// Number of scoped instances built in this scope so far.
    pub fn cached_count(&self) -> usize {
        self.state.cached()
    }
}

impl Drop for Scope {
    fn drop(&mut self) {
        if !self.state.is_disposed() && self.state.has_pending_disposers() {
            debug!("scope dropped without dispose(); disposing");
        }
        self.state.dispose();
    }
}

impl ResolverCore for Scope {
    fn resolve_any(&self, key: &ServiceKey) -> DiResult<Option<Arc<dyn Any + Send + Sync>>> {
        self.root.resolve_last(self, &self.state, key)
    }

    fn resolve_many(&self, key: &ServiceKey) -> DiResult<Vec<Arc<dyn Any + Send + Sync>>> {
        self.root.resolve_every(self, &self.state, key)
    }

    fn contains_key(&self, key: &ServiceKey) -> bool {
        self.root.has_descriptor(key)
    }
}

impl Resolver for Scope {}

impl std::fmt::Debug for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scope")
            .field("cached", &self.state.cached())
            .field("disposed", &self.state.is_disposed())
            .finish()
    }
}
