//! # ferrous-host
//!
//! A small application-framework core: a lifetime-aware service container,
//! an ordered module host and an onion-model request pipeline.
//!
//! ## Features
//!
//! - **Lifetimes**: Singleton, Scoped and Transient services
//! - **Multi-binding**: several registrations per service type, last one
//!   wins for single resolution, all of them for `resolve_all`
//! - **Trait objects**: register and resolve `dyn Trait` services
//! - **Thread-safe**: singletons are built exactly once under concurrency
//! - **Scoped disposal**: LIFO disposal hooks per scope and for the root
//! - **Modules**: dependency-ordered configuration, initialization and
//!   reverse-order shutdown
//! - **Pipeline**: async components wrapping each other around a terminal
//!   handler
//!
//! ## Quick Start
//!
//! ```rust
//! use ferrous_host::{ServiceCollection, Resolver, DiResult};
//! use std::sync::Arc;
//!
//! struct Database {
//!     connection_string: String,
//! }
//!
//! struct UserService {
//!     db: Arc<Database>,
//! }
//!
//! # fn main() -> DiResult<()> {
//! let mut services = ServiceCollection::new();
//! services.add_instance(Database {
//!     connection_string: "postgres://localhost".to_string(),
//! });
//! services.add_transient_factory::<UserService, _>(|ctx| {
//!     Ok(Arc::new(UserService {
//!         db: ctx.dependency::<Database>()?,
//!     }))
//! });
//!
//! let provider = services.build();
//! let user_service = provider.resolve_required::<UserService>()?;
//! assert_eq!(user_service.db.connection_string, "postgres://localhost");
//! # Ok(())
//! # }
//! ```
//!
//! ## Service Lifetimes
//!
//! - **Singleton**: created once and shared across the entire application
//! - **Scoped**: created once per scope (one scope per request)
//! - **Transient**: created fresh on every resolution
//!
//! ## Scoped Services
//!
//! ```rust
//! use ferrous_host::{ServiceCollection, Resolver, DiResult};
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//!
//! struct RequestId(usize);
//!
//! # fn main() -> DiResult<()> {
//! let counter = Arc::new(AtomicUsize::new(0));
//! let next = counter.clone();
//!
//! let mut services = ServiceCollection::new();
//! services.add_scoped_factory::<RequestId, _>(move |_| {
//!     Ok(Arc::new(RequestId(next.fetch_add(1, Ordering::SeqCst))))
//! });
//!
//! let provider = services.build();
//! let scope1 = provider.create_scope();
//! let scope2 = provider.create_scope();
//!
//! assert_eq!(scope1.resolve_required::<RequestId>()?.0, 0);
//! assert_eq!(scope1.resolve_required::<RequestId>()?.0, 0);
//! assert_eq!(scope2.resolve_required::<RequestId>()?.0, 1);
//! # Ok(())
//! # }
//! ```

pub mod cancellation;
pub mod collection;
pub mod config;
pub mod descriptors;
pub mod error;
pub mod key;
pub mod keyed;
pub mod lifetime;
pub mod modularity;
pub mod options;
pub mod pipeline;
pub mod provider;
pub mod traits;

// Internal modules
mod internal;
mod registration;

pub use async_trait::async_trait;

pub use cancellation::{CancellationError, CancellationToken};
pub use collection::ServiceCollection;
pub use config::ContainerOptions;
pub use descriptors::{ServiceDescriptor, Strategy};
pub use error::{BoxError, DiError, DiResult, PipelineError, PipelineResult};
pub use key::ServiceKey;
pub use keyed::KeyedFactoryRegistry;
pub use lifetime::Lifetime;
pub use modularity::{Application, Module, ModuleId, ModulePackage};
pub use options::{Options, OptionsBuilder};
pub use pipeline::{
    ErrorBoundary, ExecutionContext, InvocationState, Middleware, Next, Pipeline, PipelineBuilder,
    Request, Response,
};
pub use provider::{ResolverContext, Scope, ServiceProvider};
pub use traits::{Dispose, Injectable, IntoService, Resolver, ResolverCore};

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn singleton_resolution() {
        let mut services = ServiceCollection::new();
        services.add_instance(42usize);

        let provider = services.build();
        let a = provider.resolve_required::<usize>().unwrap();
        let b = provider.resolve_required::<usize>().unwrap();
        assert_eq!(*a, 42);
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn transient_resolution() {
        let mut services = ServiceCollection::new();
        services.add_transient_factory::<String, _>(|_| Ok(Arc::new("fresh".to_string())));

        let provider = services.build();
        let a = provider.resolve_required::<String>().unwrap();
        let b = provider.resolve_required::<String>().unwrap();
        assert_eq!(*a, "fresh");
        assert!(!Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn scoped_resolution() {
        let mut services = ServiceCollection::new();
        services.add_scoped_factory::<Vec<u8>, _>(|_| Ok(Arc::new(vec![1, 2, 3])));

        let provider = services.build();
        let scope1 = provider.create_scope();
        let scope2 = provider.create_scope();

        let a = scope1.resolve_required::<Vec<u8>>().unwrap();
        let b = scope1.resolve_required::<Vec<u8>>().unwrap();
        let c = scope2.resolve_required::<Vec<u8>>().unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &c));
    }

    #[test]
    fn trait_resolution() {
        trait Value: Send + Sync {
            fn get(&self) -> i32;
        }
        struct Fixed;
        impl Value for Fixed {
            fn get(&self) -> i32 {
                7
            }
        }

        let mut services = ServiceCollection::new();
        services.add_singleton_instance::<dyn Value>(Arc::new(Fixed));

        let provider = services.build();
        assert_eq!(provider.resolve_required::<dyn Value>().unwrap().get(), 7);
    }
}
