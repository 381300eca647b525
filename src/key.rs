//! Service key types for the dependency injection container.

use std::any::TypeId;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Key for service storage and lookup.
///
/// A key is a service type plus an optional implementation index. The index
/// tells apart multiple descriptors registered for the same service type:
/// descriptor `i` of a type caches its instances under `key.at(i)`.
///
/// Works for sized types and for trait objects alike.
///
/// # Examples
///
/// ```rust
/// use ferrous_host::ServiceKey;
///
/// trait Logger: Send + Sync {}
///
/// let plain = ServiceKey::of::<String>();
/// assert_eq!(plain.type_name(), "alloc::string::String");
/// assert_eq!(plain.index(), None);
///
/// let second = ServiceKey::of::<dyn Logger>().at(1);
/// assert_eq!(second.index(), Some(1));
/// assert_ne!(second, ServiceKey::of::<dyn Logger>());
/// ```
#[derive(Debug, Clone, Copy)]
pub struct ServiceKey {
    type_id: TypeId,
    type_name: &'static str,
    index: Option<usize>,
}

impl ServiceKey {
    /// Type-level key for `S` (no implementation index).
    #[inline]
    pub fn of<S: ?Sized + 'static>() -> Self {
        Self {
            type_id: TypeId::of::<S>(),
            type_name: std::any::type_name::<S>(),
            index: None,
        }
    }

    /// The same service type, addressing descriptor `index`.
    #[inline]
    pub fn at(self, index: usize) -> Self {
        Self {
            index: Some(index),
            ..self
        }
    }

    /// The type-level key this key belongs to.
    #[inline]
    pub fn without_index(self) -> Self {
        Self { index: None, ..self }
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Human-readable type name, the `std::any::type_name` result.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn index(&self) -> Option<usize> {
        self.index
    }
}

// Names are for diagnostics only; identity is the TypeId plus index.
impl PartialEq for ServiceKey {
    #[inline(always)]
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id && self.index == other.index
    }
}

impl Eq for ServiceKey {}

impl Hash for ServiceKey {
    #[inline(always)]
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.type_id.hash(state);
        self.index.hash(state);
    }
}

impl fmt::Display for ServiceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.index {
            Some(index) => write!(f, "{}[{}]", self.type_name, index),
            None => f.write_str(self.type_name),
        }
    }
}
