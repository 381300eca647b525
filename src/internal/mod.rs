//! Internal implementation details.

pub(crate) mod circular;
pub(crate) mod dispose_bag;
pub(crate) mod instance_cache;

pub(crate) use circular::StackGuard;
pub(crate) use dispose_bag::DisposeBag;
pub(crate) use instance_cache::InstanceCache;
