//! Circular dependency detection infrastructure.

use std::cell::RefCell;

use crate::error::{DiError, DiResult};
use crate::key::ServiceKey;

// Thread-local resolution stack. Resolution is synchronous, so the stack of a
// thread is exactly the chain of services currently being built on it.
thread_local! {
    static RESOLUTION_STACK: RefCell<Vec<ServiceKey>> = const { RefCell::new(Vec::new()) };
}

/// Guard for one frame of the thread-local resolution stack. Pops on drop.
pub(crate) struct StackGuard {
    key: ServiceKey,
}

impl StackGuard {
    /// Pushes `key`, failing if it is already being built on this thread or
    /// if the stack is `max_depth` deep.
    pub(crate) fn enter(key: ServiceKey, max_depth: usize) -> DiResult<Self> {
        RESOLUTION_STACK.with(|stack| {
            let mut stack = stack.borrow_mut();

            if stack.contains(&key) {
                let mut path: Vec<&'static str> = stack.iter().map(|k| k.type_name()).collect();
                path.push(key.type_name());
                // Trim the prefix that leads into the cycle.
                if let Some(start) = stack.iter().position(|k| *k == key) {
                    path.drain(..start);
                }
                return Err(DiError::Circular(path));
            }

            if stack.len() >= max_depth {
                return Err(DiError::DepthExceeded(max_depth));
            }

            stack.push(key);
            Ok(Self { key })
        })
    }
}

impl Drop for StackGuard {
    fn drop(&mut self) {
        RESOLUTION_STACK.with(|stack| {
            let popped = stack.borrow_mut().pop();
            debug_assert_eq!(popped, Some(self.key));
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct A;
    struct B;

    #[test]
    fn reentering_a_key_reports_the_cycle() {
        let a = ServiceKey::of::<A>().at(0);
        let b = ServiceKey::of::<B>().at(0);

        let _ga = StackGuard::enter(a, 16).unwrap();
        let _gb = StackGuard::enter(b, 16).unwrap();
        match StackGuard::enter(a, 16) {
            Err(DiError::Circular(path)) => assert_eq!(path.len(), 3),
            other => panic!("expected cycle, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn guards_pop_on_drop() {
        let a = ServiceKey::of::<A>().at(0);
        {
            let _g = StackGuard::enter(a, 16).unwrap();
        }
        assert!(StackGuard::enter(a, 16).is_ok());
    }

    #[test]
    fn depth_is_capped() {
        let _ga = StackGuard::enter(ServiceKey::of::<A>().at(0), 1).unwrap();
        assert!(matches!(
            StackGuard::enter(ServiceKey::of::<B>().at(0), 1),
            Err(DiError::DepthExceeded(1))
        ));
    }
}
