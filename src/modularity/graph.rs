//! Dependency ordering of discovered modules.

use std::collections::{HashMap, VecDeque};

use tracing::{debug, warn};

use super::{ModuleDescriptor, ModuleId};
use crate::error::{DiError, DiResult};

/// A declared dependency on a module type that was never discovered.
///
/// Such edges are dropped from the graph rather than failing the sort.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DroppedDependency {
    pub module: ModuleId,
    pub dependency: ModuleId,
}

/// Result of ordering modules.
#[derive(Debug, Clone)]
pub struct SortedModules {
    /// Modules with every dependency ahead of its dependents.
    pub order: Vec<ModuleDescriptor>,
    /// Edges ignored because their target was not discovered.
    pub dropped: Vec<DroppedDependency>,
}

impl SortedModules {
    pub fn names(&self) -> Vec<&'static str> {
        self.order.iter().map(|m| m.name()).collect()
    }
}

/// Topological ordering over a set of discovered modules.
pub struct ModuleGraph;

impl ModuleGraph {
    /// Orders `modules` with Kahn's algorithm.
    ///
    /// Modules with no pending dependency are released in discovery order,
    /// so the result is deterministic. Dependencies on undiscovered modules
    /// are dropped with a warning. If some modules can never be released the
    /// graph has a cycle: the error names every module left unsorted, in
    /// discovery order.
    ///
    /// # Examples
    ///
    /// ```
    /// use ferrous_host::modularity::{Module, ModuleDescriptor, ModuleGraph, ModuleId};
    ///
    /// #[derive(Default)] struct X;
    /// #[derive(Default)] struct Y;
    /// #[derive(Default)] struct Z;
    /// impl Module for X { fn depends_on() -> Vec<ModuleId> { vec![ModuleId::of::<Y>()] } }
    /// impl Module for Y { fn depends_on() -> Vec<ModuleId> { vec![ModuleId::of::<Z>()] } }
    /// impl Module for Z {}
    ///
    /// let discovered = [ModuleDescriptor::of::<X>(), ModuleDescriptor::of::<Y>(), ModuleDescriptor::of::<Z>()];
    /// let sorted = ModuleGraph::sort(&discovered).unwrap();
    /// let order: Vec<_> = sorted.order.iter().map(|m| m.id()).collect();
    /// assert_eq!(order, [ModuleId::of::<Z>(), ModuleId::of::<Y>(), ModuleId::of::<X>()]);
    /// ```
    pub fn sort(modules: &[ModuleDescriptor]) -> DiResult<SortedModules> {
        let position: HashMap<ModuleId, usize> = modules
            .iter()
            .enumerate()
            .map(|(i, m)| (m.id(), i))
            .collect();

        let mut in_degree = vec![0usize; modules.len()];
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); modules.len()];
        let mut dropped = Vec::new();

        for (i, module) in modules.iter().enumerate() {
            for dependency in module.dependencies() {
                match position.get(&dependency) {
                    Some(&j) => {
                        dependents[j].push(i);
                        in_degree[i] += 1;
                    }
                    None => {
                        warn!(
                            module = module.name(),
                            dependency = dependency.name(),
                            "ignoring dependency on undiscovered module"
                        );
                        dropped.push(DroppedDependency {
                            module: module.id(),
                            dependency,
                        });
                    }
                }
            }
        }

        let mut ready: VecDeque<usize> = (0..modules.len()).filter(|&i| in_degree[i] == 0).collect();
        let mut order = Vec::with_capacity(modules.len());

        while let Some(i) = ready.pop_front() {
            order.push(modules[i]);
            for &dependent in &dependents[i] {
                in_degree[dependent] -= 1;
                if in_degree[dependent] == 0 {
                    ready.push_back(dependent);
                }
            }
        }

        if order.len() < modules.len() {
            let unsorted: Vec<&'static str> = modules
                .iter()
                .enumerate()
                .filter(|(i, _)| in_degree[*i] > 0)
                .map(|(_, m)| m.name())
                .collect();
            return Err(DiError::CyclicDependency { modules: unsorted });
        }

        debug!(
            modules = order.len(),
            dropped = dropped.len(),
            "module dependency order resolved"
        );
        Ok(SortedModules { order, dropped })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modularity::Module;

    #[derive(Default)]
    struct Alone;
    impl Module for Alone {}

    #[derive(Default)]
    struct SelfLoop;
    impl Module for SelfLoop {
        fn depends_on() -> Vec<ModuleId> {
            vec![ModuleId::of::<SelfLoop>()]
        }
    }

    #[derive(Default)]
    struct TwiceAlone;
    impl Module for TwiceAlone {
        fn depends_on() -> Vec<ModuleId> {
            vec![ModuleId::of::<Alone>(), ModuleId::of::<Alone>()]
        }
    }

    #[test]
    fn empty_set_sorts_to_empty() {
        let sorted = ModuleGraph::sort(&[]).unwrap();
        assert!(sorted.order.is_empty());
        assert!(sorted.dropped.is_empty());
    }

    #[test]
    fn self_dependency_is_a_cycle() {
        let err = ModuleGraph::sort(&[ModuleDescriptor::of::<Alone>(), ModuleDescriptor::of::<SelfLoop>()])
            .unwrap_err();
        match err {
            DiError::CyclicDependency { modules } => {
                assert_eq!(modules, vec![std::any::type_name::<SelfLoop>()]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn repeated_edges_are_counted_consistently() {
        let sorted = ModuleGraph::sort(&[ModuleDescriptor::of::<TwiceAlone>(), ModuleDescriptor::of::<Alone>()])
            .unwrap();
        assert_eq!(
            sorted.names(),
            vec![std::any::type_name::<Alone>(), std::any::type_name::<TwiceAlone>()]
        );
    }
}
