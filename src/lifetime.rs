//! Service lifetime definitions.

/// Service lifetimes controlling instance caching behavior.
///
/// # Examples
///
/// ```rust
/// use ferrous_host::{ServiceCollection, Resolver, DiResult};
/// use std::sync::Arc;
///
/// struct Database { url: String }
/// struct Repository { db_url: String }
/// struct RequestModel { id: u32 }
///
/// # fn main() -> DiResult<()> {
/// let mut services = ServiceCollection::new();
///
/// // Singleton: one instance for the entire application
/// services.add_instance(Database { url: "postgres://localhost".to_string() });
///
/// // Scoped: one instance per scope
/// services.add_scoped_factory::<Repository, _>(|r| {
///     let db = r.resolve_required::<Database>()?;
///     Ok(Arc::new(Repository { db_url: db.url.clone() }))
/// });
///
/// // Transient: new instance every time
/// services.add_transient_factory::<RequestModel, _>(|_| Ok(Arc::new(RequestModel { id: 7 })));
///
/// let provider = services.build();
///
/// let db1 = provider.resolve_required::<Database>()?;
/// let scope1 = provider.create_scope();
/// let db2 = scope1.resolve_required::<Database>()?;
/// assert!(Arc::ptr_eq(&db1, &db2));
///
/// let repo1a = scope1.resolve_required::<Repository>()?;
/// let repo1b = scope1.resolve_required::<Repository>()?;
/// assert!(Arc::ptr_eq(&repo1a, &repo1b));
///
/// let scope2 = provider.create_scope();
/// let repo2 = scope2.resolve_required::<Repository>()?;
/// assert!(!Arc::ptr_eq(&repo1a, &repo2));
///
/// let model1 = scope1.resolve_required::<RequestModel>()?;
/// let model2 = scope1.resolve_required::<RequestModel>()?;
/// assert!(!Arc::ptr_eq(&model1, &model2));
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lifetime {
    /// Single instance per root provider, cached until the root is disposed.
    ///
    /// Created lazily on first resolution, built against the root provider
    /// and shared by every scope and thread.
    Singleton,
    /// Single instance per scope, cached until that scope is disposed.
    Scoped,
    /// New instance per resolution, never cached and never disposed by the
    /// container.
    Transient,
}

impl std::fmt::Display for Lifetime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Lifetime::Singleton => "singleton",
            Lifetime::Scoped => "scoped",
            Lifetime::Transient => "transient",
        };
        f.write_str(name)
    }
}
