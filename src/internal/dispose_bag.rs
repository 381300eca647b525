//! Internal disposal bag for managing cleanup hooks.

/// Container for disposal hooks with LIFO execution order.
#[derive(Default)]
pub(crate) struct DisposeBag {
    hooks: Vec<Box<dyn FnOnce() + Send>>,
}

impl DisposeBag {
    pub(crate) fn push(&mut self, f: Box<dyn FnOnce() + Send>) {
        self.hooks.push(f);
    }

    /// Takes every hook out of the bag, leaving it empty. Callers run the
    /// returned bag after releasing the lock that guards this one, so a hook
    /// may touch its container without deadlocking.
    pub(crate) fn take(&mut self) -> DisposeBag {
        std::mem::take(self)
    }

    /// Moves every hook of `other` to the end of this bag, keeping order.
    pub(crate) fn append(&mut self, mut other: DisposeBag) {
        self.hooks.append(&mut other.hooks);
    }

    /// Execute all hooks in reverse registration order (LIFO).
    pub(crate) fn run_all_reverse(mut self) -> usize {
        let count = self.hooks.len();
        while let Some(f) = self.hooks.pop() {
            (f)();
        }
        count
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }
}
