//! Core traits for the dependency injection container.

mod dispose;
mod injectable;
mod resolver;

pub use dispose::Dispose;
pub use injectable::{Injectable, IntoService};
pub use resolver::{Resolver, ResolverCore};
